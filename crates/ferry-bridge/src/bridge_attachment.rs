//! Attachment download and temp-file staging.
//!
//! Downloads binary content for a content ref, writes it under the scoped
//! temp directory and reports the staged size. Admission (size ceilings) is
//! the caller's policy; this layer only names, writes and stats the file.
//! Partial files never survive the error path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::bridge_contract::SourceApiClient;

pub const MIME_VIDEO_DEFAULT: &str = "video/mp4";
pub const MIME_AUDIO_DEFAULT: &str = "audio/m4a";
pub const MIME_BINARY_DEFAULT: &str = "application/octet-stream";

const FALLBACK_EXTENSION: &str = "bin";

/// How a staged temp file should be named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentNameHint {
    /// `<uuid>_<declared_name>`, for file payloads carrying an original name.
    DeclaredFileName(String),
    /// `<uuid>.<ext>` with a fixed extension. Images use `jpg` here without
    /// MIME sniffing (legacy behavior).
    FixedExtension(&'static str),
    /// `<uuid>.<ext>` derived from the response content type, with a
    /// per-kind default MIME when the response does not advertise one.
    FromContentType { fallback_mime: &'static str },
}

/// A downloaded attachment staged on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAttachment {
    pub local_path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Debug, Error)]
pub enum AttachmentFetchError {
    #[error("content download failed for {content_ref}: {source}")]
    Download {
        content_ref: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to stage attachment at {path}: {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Downloads content refs into a scoped temp directory.
pub struct AttachmentFetcher {
    api: Arc<dyn SourceApiClient>,
    temp_dir: PathBuf,
}

impl AttachmentFetcher {
    pub fn new(api: Arc<dyn SourceApiClient>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            api,
            temp_dir: temp_dir.into(),
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub async fn fetch(
        &self,
        content_ref: &str,
        hint: &AttachmentNameHint,
    ) -> Result<FetchedAttachment, AttachmentFetchError> {
        let content = self.api.fetch_content(content_ref).await.map_err(|source| {
            AttachmentFetchError::Download {
                content_ref: content_ref.to_string(),
                source,
            }
        })?;

        let local_path = self
            .temp_dir
            .join(temp_file_name(hint, content.content_type.as_deref()));
        if let Err(source) = stage_bytes(&local_path, &content.bytes).await {
            let _ = tokio::fs::remove_file(&local_path).await;
            return Err(AttachmentFetchError::Stage {
                path: local_path,
                source,
            });
        }

        let size_bytes = match tokio::fs::metadata(&local_path).await {
            Ok(metadata) => metadata.len(),
            Err(source) => {
                let _ = tokio::fs::remove_file(&local_path).await;
                return Err(AttachmentFetchError::Stage {
                    path: local_path,
                    source,
                });
            }
        };

        Ok(FetchedAttachment {
            local_path,
            size_bytes,
        })
    }
}

async fn stage_bytes(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}

fn temp_file_name(hint: &AttachmentNameHint, content_type: Option<&str>) -> String {
    let unique = Uuid::new_v4();
    match hint {
        AttachmentNameHint::DeclaredFileName(name) => {
            format!("{unique}_{}", sanitize_file_name(name))
        }
        AttachmentNameHint::FixedExtension(extension) => format!("{unique}.{extension}"),
        AttachmentNameHint::FromContentType { fallback_mime } => {
            let mime = content_type
                .map(normalize_mime)
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| (*fallback_mime).to_string());
            let extension = extension_for_mime(&mime).unwrap_or(FALLBACK_EXTENSION);
            format!("{unique}.{extension}")
        }
    }
}

fn normalize_mime(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or(raw)
        .trim()
        .to_ascii_lowercase()
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "video/mp4" => Some("mp4"),
        "video/quicktime" => Some("mov"),
        "video/webm" => Some("webm"),
        "audio/m4a" | "audio/x-m4a" | "audio/mp4" => Some("m4a"),
        "audio/mpeg" => Some("mp3"),
        "audio/ogg" => Some("ogg"),
        "audio/wav" | "audio/x-wav" => Some("wav"),
        "application/pdf" => Some("pdf"),
        "application/zip" => Some("zip"),
        "text/plain" => Some("txt"),
        _ => None,
    }
}

fn sanitize_file_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let tail = trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
        .trim();
    if tail.is_empty() {
        "attachment".to_string()
    } else {
        tail.to_string()
    }
}
