//! Canonical data model and capability contracts for the bridge core.
//!
//! Every inbound webhook notification becomes an [`InboundEvent`] before it
//! reaches the pipeline, and everything the bridge posts into the target
//! channel is an [`OutboundMessage`]. The platform SDKs themselves stay
//! behind [`SourceApiClient`] and [`TargetChannelSender`] so the core can be
//! exercised against fakes.

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Conversation scope an inbound event originated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceContext {
    Group { group_id: String },
    DirectUser,
}

impl SourceContext {
    /// Stable key used by the display-name cache.
    pub fn cache_key(&self) -> String {
        match self {
            Self::Group { group_id } => format!("group:{}", group_id.trim()),
            Self::DirectUser => "direct".to_string(),
        }
    }
}

/// Variant payload of an inbound source event. The union is closed: a new
/// inbound message type is a new variant plus an exhaustive-match arm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundPayload {
    Text {
        body: String,
    },
    Image {
        content_ref: String,
    },
    Sticker {
        sticker_id: String,
        package_id: String,
        #[serde(default)]
        keywords: Vec<String>,
    },
    Video {
        content_ref: String,
    },
    Audio {
        content_ref: String,
    },
    File {
        content_ref: String,
        #[serde(default)]
        file_name: Option<String>,
    },
}

impl InboundPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Sticker { .. } => "sticker",
            Self::Video { .. } => "video",
            Self::Audio { .. } => "audio",
            Self::File { .. } => "file",
        }
    }
}

/// One inbound notification from the source platform.
///
/// `event_id` is unique per physical delivery attempt but repeats across
/// platform-level redelivery retries of the same logical event; the dedup
/// cache keys on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub event_id: String,
    pub sender_id: String,
    pub context: SourceContext,
    #[serde(default)]
    pub is_redelivery: bool,
    pub payload: InboundPayload,
}

/// Attachment staged as a local temp file, carried by an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundAttachment {
    pub local_path: PathBuf,
    pub label: String,
}

/// Canonical relay unit sent to the target channel.
///
/// Constructed by the normalization pipeline and consumed exactly once by
/// the delivery layer; the staged attachment file is removed after a
/// successful send or after the message is abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutboundMessage {
    pub body: String,
    pub attachment: Option<OutboundAttachment>,
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(body: impl Into<String>, attachment: OutboundAttachment) -> Self {
        Self {
            body: body.into(),
            attachment: Some(attachment),
        }
    }
}

/// Binary content downloaded from the source platform for a content ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Source-platform API capabilities the bridge consumes.
#[async_trait]
pub trait SourceApiClient: Send + Sync {
    /// Display name of a member as seen within a specific group.
    async fn group_member_display_name(&self, group_id: &str, user_id: &str) -> Result<String>;

    /// Display name from the user's own profile.
    async fn user_display_name(&self, user_id: &str) -> Result<String>;

    /// The bridge bot's own user id on the source platform.
    async fn bot_user_id(&self) -> Result<String>;

    /// Binary content for a message content reference.
    async fn fetch_content(&self, content_ref: &str) -> Result<FetchedContent>;

    /// Push a text message into a source conversation.
    async fn push_text(&self, to: &str, text: &str) -> Result<()>;
}

/// Target-channel send capability the delivery layer consumes.
#[async_trait]
pub trait TargetChannelSender: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Post text and a local file as one message.
    async fn send_attachment(&self, text: &str, local_path: &Path) -> Result<()>;
}
