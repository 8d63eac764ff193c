//! Live REST sender for the fixed target channel.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;

use ferry_bridge::TargetChannelSender;

pub const TARGET_REQUEST_TIMEOUT_MS_DEFAULT: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct GatewayRestClientConfig {
    pub api_base: String,
    pub bot_token: String,
    pub channel_id: String,
    pub request_timeout_ms: u64,
}

/// Posts messages into one target channel over the platform REST API.
pub struct GatewayRestClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    channel_id: String,
}

impl GatewayRestClient {
    pub fn new(config: GatewayRestClientConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("ferry-bridge"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed to create target api client")?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.trim().to_string(),
            channel_id: config.channel_id.trim().to_string(),
        })
    }

    fn messages_endpoint(&self) -> String {
        format!("{}/channels/{}/messages", self.api_base, self.channel_id)
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.bot_token)
    }
}

#[async_trait]
impl TargetChannelSender for GatewayRestClient {
    async fn send_text(&self, text: &str) -> Result<()> {
        self.http
            .post(self.messages_endpoint())
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(&json!({ "content": text }))
            .send()
            .await
            .context("target channel message request failed")?
            .error_for_status()
            .context("target channel message request rejected")?;
        Ok(())
    }

    async fn send_attachment(&self, text: &str, local_path: &Path) -> Result<()> {
        let bytes = tokio::fs::read(local_path).await.with_context(|| {
            format!("failed to read staged attachment {}", local_path.display())
        })?;
        let file_name = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("attachment.bin")
            .to_string();
        let form = reqwest::multipart::Form::new()
            .text("payload_json", json!({ "content": text }).to_string())
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            );
        self.http
            .post(self.messages_endpoint())
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .multipart(form)
            .send()
            .await
            .context("target channel attachment request failed")?
            .error_for_status()
            .context("target channel attachment request rejected")?;
        Ok(())
    }
}
