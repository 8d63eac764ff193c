//! HTTP ingress for source-platform webhook callbacks.
//!
//! `POST /callback` verifies the body signature, parses the envelope and
//! routes each event through the bridge controller. Once the signature has
//! passed, downstream failures degrade inside the pipeline and the call
//! still answers 200 so the platform does not start a retry storm; only an
//! unparseable envelope answers 500.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use ferry_bridge::BridgeController;

use crate::webhook_payload::parse_webhook_payload;
use crate::webhook_signature::{verify_webhook_signature, WEBHOOK_SIGNATURE_HEADER};

const STATUS_BODY: &str = "ferry bridge is running; point the source webhook at POST /callback";

#[derive(Debug, Clone)]
pub struct WebhookServerConfig {
    pub bind: String,
    pub channel_secret: String,
}

struct WebhookServerState {
    controller: Arc<BridgeController>,
    channel_secret: String,
}

pub fn build_webhook_router(
    controller: Arc<BridgeController>,
    channel_secret: impl Into<String>,
) -> Router {
    Router::new()
        .route("/callback", post(handle_callback))
        .route("/", get(handle_index))
        .with_state(Arc::new(WebhookServerState {
            controller,
            channel_secret: channel_secret.into(),
        }))
}

async fn handle_index() -> &'static str {
    STATUS_BODY
}

async fn handle_callback(
    State(state): State<Arc<WebhookServerState>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, &'static str) {
    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or("");
    if let Err(error) = verify_webhook_signature(&state.channel_secret, body.as_bytes(), signature)
    {
        warn!("rejecting webhook call: {error:#}");
        return (StatusCode::BAD_REQUEST, "invalid signature");
    }

    let parsed = match parse_webhook_payload(&body) {
        Ok(parsed) => parsed,
        Err(error) => {
            error!("webhook envelope could not be processed: {error:#}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "processing error");
        }
    };
    if parsed.skipped > 0 {
        debug!("skipped {} unusable webhook records", parsed.skipped);
    }

    for event in parsed.events {
        let event_id = event.event_id.clone();
        let disposition = state.controller.process_inbound_event(event).await;
        debug!("webhook event {event_id}: {}", disposition.as_str());
    }

    (StatusCode::OK, "OK")
}

pub async fn run_webhook_server(
    config: WebhookServerConfig,
    controller: Arc<BridgeController>,
) -> Result<()> {
    let listener = TcpListener::bind(config.bind.as_str())
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve webhook bound address")?;
    info!("webhook server listening on {local_addr}");

    let app = build_webhook_router(controller, config.channel_secret);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("webhook server exited unexpectedly")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use tempfile::tempdir;
    use tokio::net::TcpListener;

    use ferry_bridge::{
        AttachmentFetcher, BridgeController, BridgeControllerConfig, DedupCache, DeliveryCommand,
        DeliveryManager, DisplayNameResolver, FetchedContent, NormalizationConfig,
        NormalizationPipeline, SourceApiClient,
    };

    use super::build_webhook_router;
    use crate::webhook_signature::{sign_webhook_body, WEBHOOK_SIGNATURE_HEADER};

    const SECRET: &str = "test-channel-secret";

    struct UnreachableSourceApi;

    #[async_trait]
    impl SourceApiClient for UnreachableSourceApi {
        async fn group_member_display_name(&self, _: &str, _: &str) -> Result<String> {
            Err(anyhow!("profile api unavailable"))
        }

        async fn user_display_name(&self, _: &str) -> Result<String> {
            Err(anyhow!("profile api unavailable"))
        }

        async fn bot_user_id(&self) -> Result<String> {
            Err(anyhow!("bot info unavailable"))
        }

        async fn fetch_content(&self, _: &str) -> Result<FetchedContent> {
            Err(anyhow!("content api unavailable"))
        }

        async fn push_text(&self, _: &str, _: &str) -> Result<()> {
            Err(anyhow!("push api unavailable"))
        }
    }

    async fn spawn_server(
        temp_dir: &std::path::Path,
    ) -> (
        String,
        tokio::sync::mpsc::UnboundedReceiver<DeliveryCommand>,
    ) {
        let api: Arc<dyn SourceApiClient> = Arc::new(UnreachableSourceApi);
        let (_, handle, rx) = DeliveryManager::with_handle();
        let pipeline = NormalizationPipeline::new(
            DisplayNameResolver::new(api.clone()),
            AttachmentFetcher::new(api.clone(), temp_dir),
            NormalizationConfig::default(),
        );
        let controller = Arc::new(BridgeController::new(
            BridgeControllerConfig::default(),
            DedupCache::default(),
            pipeline,
            handle,
            api,
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let app = build_webhook_router(controller, SECRET);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{addr}"), rx)
    }

    fn delivered_count(
        rx: &mut tokio::sync::mpsc::UnboundedReceiver<DeliveryCommand>,
    ) -> usize {
        let mut count = 0;
        while let Ok(command) = rx.try_recv() {
            if matches!(command, DeliveryCommand::Deliver(_)) {
                count += 1;
            }
        }
        count
    }

    fn text_event_body(event_id: &str) -> String {
        format!(
            r#"{{
                "events": [{{
                    "type": "message",
                    "source": {{ "type": "group", "group_id": "g1", "user_id": "u1" }},
                    "message": {{ "id": "{event_id}", "type": "text", "text": "hi" }}
                }}]
            }}"#
        )
    }

    #[tokio::test]
    async fn integration_callback_rejects_bad_signature() {
        let scratch = tempdir().expect("tempdir");
        let (base_url, mut rx) = spawn_server(scratch.path()).await;

        let response = reqwest::Client::new()
            .post(format!("{base_url}/callback"))
            .header(WEBHOOK_SIGNATURE_HEADER, "bm90IHRoZSBzaWduYXR1cmU=")
            .body(text_event_body("m1"))
            .send()
            .await
            .expect("request");
        assert_eq!(response.status().as_u16(), 400);
        assert_eq!(delivered_count(&mut rx), 0);
    }

    #[tokio::test]
    async fn integration_replayed_payload_yields_no_second_message() {
        let scratch = tempdir().expect("tempdir");
        let (base_url, mut rx) = spawn_server(scratch.path()).await;
        let body = text_event_body("m1");
        let signature = sign_webhook_body(SECRET, body.as_bytes()).expect("sign");
        let client = reqwest::Client::new();

        for _ in 0..2 {
            let response = client
                .post(format!("{base_url}/callback"))
                .header(WEBHOOK_SIGNATURE_HEADER, signature.clone())
                .body(body.clone())
                .send()
                .await
                .expect("request");
            assert_eq!(response.status().as_u16(), 200);
            assert_eq!(response.text().await.expect("body"), "OK");
        }

        assert_eq!(delivered_count(&mut rx), 1);
    }

    #[tokio::test]
    async fn integration_unparseable_envelope_answers_500() {
        let scratch = tempdir().expect("tempdir");
        let (base_url, mut rx) = spawn_server(scratch.path()).await;
        let body = "definitely not json";
        let signature = sign_webhook_body(SECRET, body.as_bytes()).expect("sign");

        let response = reqwest::Client::new()
            .post(format!("{base_url}/callback"))
            .header(WEBHOOK_SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .expect("request");
        assert_eq!(response.status().as_u16(), 500);
        assert_eq!(delivered_count(&mut rx), 0);
    }

    #[tokio::test]
    async fn integration_index_reports_status_without_side_effects() {
        let scratch = tempdir().expect("tempdir");
        let (base_url, mut rx) = spawn_server(scratch.path()).await;

        let response = reqwest::Client::new()
            .get(&base_url)
            .send()
            .await
            .expect("request");
        assert_eq!(response.status().as_u16(), 200);
        assert!(response.text().await.expect("body").contains("running"));
        assert_eq!(delivered_count(&mut rx), 0);
    }
}
