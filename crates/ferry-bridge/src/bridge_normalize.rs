//! Maps heterogeneous inbound events to canonical outbound messages.
//!
//! Called only after dedup admission and self-message filtering. Every
//! failure inside the pipeline degrades to a text-only notice naming the
//! sender and the attempted type; nothing propagates to the webhook layer.

use tracing::warn;

use crate::bridge_attachment::{
    AttachmentFetcher, AttachmentNameHint, MIME_AUDIO_DEFAULT, MIME_BINARY_DEFAULT,
    MIME_VIDEO_DEFAULT,
};
use crate::bridge_contract::{InboundEvent, InboundPayload, OutboundAttachment, OutboundMessage};
use crate::bridge_display_name::DisplayNameResolver;

pub const MAX_ATTACHMENT_BYTES_DEFAULT: u64 = 25 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
enum MediaKind {
    Video,
    Voice,
    File,
}

impl MediaKind {
    fn label(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Voice => "voice",
            Self::File => "file",
        }
    }

    fn sent_phrase(self) -> &'static str {
        match self {
            Self::Video => "sent a video",
            Self::Voice => "sent a voice message",
            Self::File => "sent a file",
        }
    }

    fn fallback_mime(self) -> &'static str {
        match self {
            Self::Video => MIME_VIDEO_DEFAULT,
            Self::Voice => MIME_AUDIO_DEFAULT,
            Self::File => MIME_BINARY_DEFAULT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizationConfig {
    pub max_attachment_bytes: u64,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            max_attachment_bytes: MAX_ATTACHMENT_BYTES_DEFAULT,
        }
    }
}

/// Normalizes admitted inbound events into outbound messages.
pub struct NormalizationPipeline {
    resolver: DisplayNameResolver,
    fetcher: AttachmentFetcher,
    config: NormalizationConfig,
}

impl NormalizationPipeline {
    pub fn new(
        resolver: DisplayNameResolver,
        fetcher: AttachmentFetcher,
        config: NormalizationConfig,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            config,
        }
    }

    /// Total function: always produces an outbound message, degrading to a
    /// failure notice when attachment handling fails.
    pub async fn normalize(&self, event: &InboundEvent) -> OutboundMessage {
        let name = self.resolver.resolve(&event.sender_id, &event.context).await;
        match &event.payload {
            InboundPayload::Text { body } => {
                OutboundMessage::text(format!("**{name}**:\n{body}"))
            }
            InboundPayload::Image { content_ref } => {
                self.normalize_image(&name, content_ref).await
            }
            InboundPayload::Sticker {
                sticker_id,
                package_id,
                keywords,
            } => sticker_notice(&name, sticker_id, package_id, keywords),
            InboundPayload::Video { content_ref } => {
                self.normalize_media(&name, MediaKind::Video, content_ref, None, event.is_redelivery)
                    .await
            }
            InboundPayload::Audio { content_ref } => {
                self.normalize_media(&name, MediaKind::Voice, content_ref, None, false)
                    .await
            }
            InboundPayload::File {
                content_ref,
                file_name,
            } => {
                self.normalize_media(
                    &name,
                    MediaKind::File,
                    content_ref,
                    file_name.as_deref(),
                    false,
                )
                .await
            }
        }
    }

    async fn normalize_image(&self, name: &str, content_ref: &str) -> OutboundMessage {
        // Images keep the legacy fixed .jpg naming, no MIME sniffing.
        match self
            .fetcher
            .fetch(content_ref, &AttachmentNameHint::FixedExtension("jpg"))
            .await
        {
            Ok(staged) => OutboundMessage::with_attachment(
                format!("**{name}**:\nsent an image"),
                OutboundAttachment {
                    local_path: staged.local_path,
                    label: "image".to_string(),
                },
            ),
            Err(error) => {
                warn!("image attachment handling failed for {content_ref}: {error}");
                OutboundMessage::text(format!(
                    "**{name}**:\nsent an image, but it could not be relayed: {error}"
                ))
            }
        }
    }

    async fn normalize_media(
        &self,
        name: &str,
        kind: MediaKind,
        content_ref: &str,
        declared_file_name: Option<&str>,
        is_redelivery: bool,
    ) -> OutboundMessage {
        // A redelivered video is skipped before any download so platform
        // retries do not re-fetch a large file.
        if matches!(kind, MediaKind::Video) && is_redelivery {
            return OutboundMessage::text(format!(
                "**{name}**:\n{} (large file, possibly a redelivery)",
                kind.sent_phrase()
            ));
        }

        let hint = match declared_file_name {
            Some(file_name) if !file_name.trim().is_empty() => {
                AttachmentNameHint::DeclaredFileName(file_name.to_string())
            }
            _ => AttachmentNameHint::FromContentType {
                fallback_mime: kind.fallback_mime(),
            },
        };

        let staged = match self.fetcher.fetch(content_ref, &hint).await {
            Ok(staged) => staged,
            Err(error) => {
                warn!(
                    "{} attachment handling failed for {content_ref}: {error}",
                    kind.label()
                );
                return OutboundMessage::text(format!(
                    "**{name}**:\n{}, but it could not be relayed: {error}",
                    kind.sent_phrase()
                ));
            }
        };

        if staged.size_bytes > self.config.max_attachment_bytes {
            if let Err(error) = tokio::fs::remove_file(&staged.local_path).await {
                warn!(
                    "failed to remove oversize attachment {}: {error}",
                    staged.local_path.display()
                );
            }
            let limit_mib = self.config.max_attachment_bytes / (1024 * 1024);
            return OutboundMessage::text(format!(
                "**{name}**:\n{} (over {limit_mib} MiB, not relayed)",
                kind.sent_phrase()
            ));
        }

        OutboundMessage::with_attachment(
            format!("**{name}**:\n{}", kind.sent_phrase()),
            OutboundAttachment {
                local_path: staged.local_path,
                label: kind.label().to_string(),
            },
        )
    }
}

fn sticker_notice(
    name: &str,
    sticker_id: &str,
    package_id: &str,
    keywords: &[String],
) -> OutboundMessage {
    let mut body = format!(
        "**{name}**:\nsent a sticker (sticker id: {sticker_id}, package id: {package_id})"
    );
    if !keywords.is_empty() {
        body.push_str(&format!(" [{}]", keywords.join(", ")));
    }
    OutboundMessage::text(body)
}
