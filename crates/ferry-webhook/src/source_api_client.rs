//! Live REST client for the source platform API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use ferry_bridge::{FetchedContent, SourceApiClient};

pub const SOURCE_REQUEST_TIMEOUT_MS_DEFAULT: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct SourceRestClientConfig {
    pub api_base: String,
    pub access_token: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct ProfileResponse {
    display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct BotInfoResponse {
    user_id: String,
}

/// Bearer-token REST client implementing [`SourceApiClient`].
pub struct SourceRestClient {
    http: reqwest::Client,
    api_base: String,
    access_token: String,
}

impl SourceRestClient {
    pub fn new(config: SourceRestClientConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("ferry-bridge"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed to create source api client")?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            access_token: config.access_token.trim().to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, label: &str, url: String) -> Result<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .with_context(|| format!("{label} request failed"))?
            .error_for_status()
            .with_context(|| format!("{label} request rejected"))?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("{label} response was not valid json"))
    }
}

#[async_trait]
impl SourceApiClient for SourceRestClient {
    async fn group_member_display_name(&self, group_id: &str, user_id: &str) -> Result<String> {
        let profile: ProfileResponse = self
            .get_json(
                "group member profile",
                format!(
                    "{}/groups/{}/members/{}",
                    self.api_base,
                    group_id.trim(),
                    user_id.trim()
                ),
            )
            .await?;
        Ok(profile.display_name)
    }

    async fn user_display_name(&self, user_id: &str) -> Result<String> {
        let profile: ProfileResponse = self
            .get_json(
                "user profile",
                format!("{}/profile/{}", self.api_base, user_id.trim()),
            )
            .await?;
        Ok(profile.display_name)
    }

    async fn bot_user_id(&self) -> Result<String> {
        let info: BotInfoResponse = self
            .get_json("bot info", format!("{}/bot/info", self.api_base))
            .await?;
        Ok(info.user_id)
    }

    async fn fetch_content(&self, content_ref: &str) -> Result<FetchedContent> {
        let response = self
            .http
            .get(format!("{}/content/{}", self.api_base, content_ref.trim()))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("content download request failed")?
            .error_for_status()
            .context("content download request rejected")?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .context("content download failed mid-stream")?;
        Ok(FetchedContent {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    async fn push_text(&self, to: &str, text: &str) -> Result<()> {
        let payload = json!({
            "to": to,
            "messages": [{ "type": "text", "text": text }],
        });
        self.http
            .post(format!("{}/messages/push", self.api_base))
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .context("push message request failed")?
            .error_for_status()
            .context("push message request rejected")?;
        Ok(())
    }
}
