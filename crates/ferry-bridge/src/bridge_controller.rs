//! Wires the inbound pipeline together and exposes the reverse relay.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use thiserror::Error;
use tracing::{debug, info};

use crate::bridge_contract::{InboundEvent, SourceApiClient};
use crate::bridge_dedup::DedupCache;
use crate::bridge_delivery::DeliveryHandle;
use crate::bridge_normalize::NormalizationPipeline;

/// Errors surfaced to the target-side user invoking the outbound relay.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no source group is configured for outbound relay")]
    NotConfigured,
    #[error("failed to push the relayed message to the source platform: {0}")]
    SendFailed(#[source] anyhow::Error),
}

/// What happened to one inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundDisposition {
    Relayed,
    DuplicateSkipped,
    OwnMessageSkipped,
}

impl InboundDisposition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relayed => "relayed",
            Self::DuplicateSkipped => "duplicate_skipped",
            Self::OwnMessageSkipped => "own_message_skipped",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BridgeControllerConfig {
    /// Destination group on the source platform for the outbound relay.
    /// `None` makes `relay_outbound_command` fail with `NotConfigured`.
    pub source_group_id: Option<String>,
    /// Label prefixed to relayed outbound text, e.g. `[Relay] Alice: hi`.
    pub relay_origin_label: String,
}

impl Default for BridgeControllerConfig {
    fn default() -> Self {
        Self {
            source_group_id: None,
            relay_origin_label: "Relay".to_string(),
        }
    }
}

/// Routes admitted webhook events through normalization into delivery, and
/// pushes target-issued relay commands back to the source platform.
pub struct BridgeController {
    config: BridgeControllerConfig,
    dedup: DedupCache,
    pipeline: NormalizationPipeline,
    delivery: DeliveryHandle,
    source_api: Arc<dyn SourceApiClient>,
    // Learned asynchronously when the target connection first becomes
    // ready; events arriving before that are not self-filtered.
    own_sender_id: ArcSwapOption<String>,
}

impl BridgeController {
    pub fn new(
        config: BridgeControllerConfig,
        dedup: DedupCache,
        pipeline: NormalizationPipeline,
        delivery: DeliveryHandle,
        source_api: Arc<dyn SourceApiClient>,
    ) -> Self {
        Self {
            config,
            dedup,
            pipeline,
            delivery,
            source_api,
            own_sender_id: ArcSwapOption::empty(),
        }
    }

    pub fn record_own_sender_id(&self, sender_id: String) {
        info!("source bot user id learned: {sender_id}");
        self.own_sender_id.store(Some(Arc::new(sender_id)));
    }

    pub fn own_sender_id(&self) -> Option<String> {
        self.own_sender_id
            .load_full()
            .map(|value| value.as_ref().clone())
    }

    /// Dedup admission happens before any blocking work so redeliveries
    /// arriving during a slow download are still rejected.
    pub async fn process_inbound_event(&self, event: InboundEvent) -> InboundDisposition {
        if self.dedup.seen_or_record(&event.event_id) {
            debug!("skipping duplicate event {}", event.event_id);
            return InboundDisposition::DuplicateSkipped;
        }

        if let Some(own_id) = self.own_sender_id.load_full() {
            if own_id.as_ref() == &event.sender_id {
                debug!("skipping event {} sent by the bridge itself", event.event_id);
                return InboundDisposition::OwnMessageSkipped;
            }
        }

        let message = self.pipeline.normalize(&event).await;
        self.delivery.deliver(message);
        InboundDisposition::Relayed
    }

    /// Pushes `"[<label>] {author}: {text}"` into the configured source
    /// group. Errors are surfaced: the invoker is waiting for a response.
    pub async fn relay_outbound_command(&self, author: &str, text: &str) -> Result<(), RelayError> {
        let group_id = self
            .config
            .source_group_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(RelayError::NotConfigured)?;

        let rendered = format!("[{}] {author}: {text}", self.config.relay_origin_label);
        self.source_api
            .push_text(group_id, &rendered)
            .await
            .map_err(RelayError::SendFailed)?;
        info!("relayed target command from {author} to source group");
        Ok(())
    }
}
