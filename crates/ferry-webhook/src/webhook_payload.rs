//! Webhook envelope parsing into canonical inbound events.
//!
//! The envelope is `{"events": [...]}`. Records that are not message events
//! or are missing required fields are skipped, not fatal: one malformed
//! record must not block the rest of the batch.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use ferry_bridge::{InboundEvent, InboundPayload, SourceContext};

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    #[serde(default)]
    events: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WebhookEventRecord {
    #[serde(rename = "type", default)]
    event_type: String,
    #[serde(default)]
    source: Option<WebhookSource>,
    #[serde(default)]
    delivery_context: Option<WebhookDeliveryContext>,
    #[serde(default)]
    message: Option<WebhookMessageRecord>,
}

#[derive(Debug, Deserialize)]
struct WebhookSource {
    #[serde(rename = "type", default)]
    source_type: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    group_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookDeliveryContext {
    #[serde(default)]
    is_redelivery: bool,
}

#[derive(Debug, Deserialize)]
struct WebhookMessageRecord {
    id: String,
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    sticker_id: Option<String>,
    #[serde(default)]
    package_id: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    file_name: Option<String>,
}

/// Parse outcome for one webhook call.
#[derive(Debug)]
pub struct ParsedWebhook {
    pub events: Vec<InboundEvent>,
    pub skipped: usize,
}

/// Parses a raw webhook body. An unparseable envelope is an error (the
/// caller answers HTTP 500); unusable individual records are counted and
/// skipped.
pub fn parse_webhook_payload(raw: &str) -> Result<ParsedWebhook> {
    let envelope: WebhookEnvelope =
        serde_json::from_str(raw).context("webhook payload is not a valid event envelope")?;
    let mut events = Vec::new();
    let mut skipped = 0usize;
    for value in envelope.events {
        let record = match serde_json::from_value::<WebhookEventRecord>(value) {
            Ok(record) => record,
            Err(error) => {
                debug!("skipping webhook record that does not deserialize: {error}");
                skipped += 1;
                continue;
            }
        };
        match convert_event(record) {
            Some(event) => events.push(event),
            None => skipped += 1,
        }
    }
    Ok(ParsedWebhook { events, skipped })
}

fn convert_event(record: WebhookEventRecord) -> Option<InboundEvent> {
    if record.event_type != "message" {
        debug!("skipping non-message webhook event '{}'", record.event_type);
        return None;
    }
    let message = record.message?;
    let source = record.source?;
    let sender_id = source
        .user_id
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())?;
    let context = match source.source_type.as_str() {
        "group" => SourceContext::Group {
            group_id: source.group_id?,
        },
        "user" => SourceContext::DirectUser,
        other => {
            debug!("skipping webhook event with unsupported source type '{other}'");
            return None;
        }
    };

    let payload = match message.message_type.as_str() {
        "text" => InboundPayload::Text {
            body: message.text.unwrap_or_default(),
        },
        "image" => InboundPayload::Image {
            content_ref: message.id.clone(),
        },
        "sticker" => InboundPayload::Sticker {
            sticker_id: message.sticker_id?,
            package_id: message.package_id?,
            keywords: message.keywords,
        },
        "video" => InboundPayload::Video {
            content_ref: message.id.clone(),
        },
        "audio" => InboundPayload::Audio {
            content_ref: message.id.clone(),
        },
        "file" => InboundPayload::File {
            content_ref: message.id.clone(),
            file_name: message.file_name,
        },
        other => {
            debug!("skipping webhook message with unsupported type '{other}'");
            return None;
        }
    };

    Some(InboundEvent {
        event_id: message.id,
        sender_id,
        context,
        is_redelivery: record
            .delivery_context
            .unwrap_or_default()
            .is_redelivery,
        payload,
    })
}
