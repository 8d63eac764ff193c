//! Reconnecting runtime for the target gateway connection.
//!
//! One session at a time: connect, identify, then react to frames until the
//! stream ends. Every ready transition hands the REST channel to the
//! delivery layer (which flushes its replay buffer) and refreshes the
//! source bot id used for self-message filtering.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use ferry_bridge::{BridgeController, DeliveryHandle, SourceApiClient, TargetChannelSender};

use crate::gateway_session::{
    command_response_frame, identify_frame, parse_gateway_frame, GatewayServerFrame,
    GATEWAY_COMMAND_RELAY,
};

pub const RECONNECT_DELAY_MS_DEFAULT: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct GatewayRuntimeConfig {
    pub websocket_url: String,
    pub bot_token: String,
    pub reconnect_delay_ms: u64,
}

enum SessionEnd {
    Disconnected,
    ShutdownRequested,
}

/// Runs gateway sessions until ctrl-c, reconnecting after a delay when a
/// session drops or errors.
pub async fn run_gateway_bridge(
    config: GatewayRuntimeConfig,
    controller: Arc<BridgeController>,
    delivery: DeliveryHandle,
    channel: Arc<dyn TargetChannelSender>,
    source_api: Arc<dyn SourceApiClient>,
) -> Result<()> {
    let reconnect_delay = Duration::from_millis(config.reconnect_delay_ms.max(1));
    loop {
        match run_gateway_session(&config, &controller, &delivery, &channel, &source_api).await {
            Ok(SessionEnd::ShutdownRequested) => {
                info!("gateway shutdown requested");
                return Ok(());
            }
            Ok(SessionEnd::Disconnected) => warn!("gateway session ended; reconnecting"),
            Err(error) => warn!("gateway session error: {error:#}"),
        }
        delivery.channel_lost();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("gateway shutdown requested");
                return Ok(());
            }
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }
}

async fn run_gateway_session(
    config: &GatewayRuntimeConfig,
    controller: &Arc<BridgeController>,
    delivery: &DeliveryHandle,
    channel: &Arc<dyn TargetChannelSender>,
    source_api: &Arc<dyn SourceApiClient>,
) -> Result<SessionEnd> {
    let (stream, _response) = connect_async(config.websocket_url.as_str())
        .await
        .context("failed to connect target gateway websocket")?;
    let (mut sink, mut source) = stream.split();
    sink.send(WsMessage::Text(identify_frame(&config.bot_token).into()))
        .await
        .context("failed to send gateway identify frame")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(SessionEnd::ShutdownRequested),
            maybe_message = source.next() => {
                let Some(message_result) = maybe_message else {
                    return Ok(SessionEnd::Disconnected);
                };
                let message = message_result.context("failed reading gateway websocket message")?;
                let frame = match parse_gateway_frame(&message) {
                    Ok(Some(frame)) => frame,
                    Ok(None) => continue,
                    Err(error) => {
                        warn!("ignoring malformed gateway frame: {error:#}");
                        continue;
                    }
                };
                match frame {
                    GatewayServerFrame::Ready { bot_user_id } => {
                        info!("target gateway ready (bot user {bot_user_id})");
                        // The source bot id only becomes interesting once the
                        // target side can receive messages; events processed
                        // before the first ready are not self-filtered.
                        match source_api.bot_user_id().await {
                            Ok(own_id) => controller.record_own_sender_id(own_id),
                            Err(error) => warn!(
                                "source bot info unavailable, continuing without self-message filtering: {error:#}"
                            ),
                        }
                        delivery.channel_ready(channel.clone());
                    }
                    GatewayServerFrame::Command(invocation) => {
                        if invocation.name != GATEWAY_COMMAND_RELAY {
                            debug!("ignoring unknown gateway command '{}'", invocation.name);
                            continue;
                        }
                        let reply = match controller
                            .relay_outbound_command(
                                &invocation.author_display_name,
                                &invocation.text,
                            )
                            .await
                        {
                            Ok(()) => command_response_frame(
                                &invocation.command_id,
                                true,
                                &format!("relayed to the source group: {}", invocation.text),
                            ),
                            Err(error) => command_response_frame(
                                &invocation.command_id,
                                false,
                                &error.to_string(),
                            ),
                        };
                        if let Err(error) = sink.send(WsMessage::Text(reply.into())).await {
                            warn!("failed to answer gateway command: {error}");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use futures_util::{SinkExt, StreamExt};
    use serde_json::Value;
    use tempfile::tempdir;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    use ferry_bridge::{
        AttachmentFetcher, BridgeController, BridgeControllerConfig, DedupCache, DeliveryCommand,
        DeliveryManager, DisplayNameResolver, FetchedContent, NormalizationConfig,
        NormalizationPipeline, SourceApiClient, TargetChannelSender,
    };

    use super::{run_gateway_bridge, GatewayRuntimeConfig};

    struct BotInfoOnlySourceApi;

    #[async_trait]
    impl SourceApiClient for BotInfoOnlySourceApi {
        async fn group_member_display_name(&self, _: &str, _: &str) -> Result<String> {
            Err(anyhow!("profile api unavailable"))
        }

        async fn user_display_name(&self, _: &str) -> Result<String> {
            Err(anyhow!("profile api unavailable"))
        }

        async fn bot_user_id(&self) -> Result<String> {
            Ok("source-bot-1".to_string())
        }

        async fn fetch_content(&self, _: &str) -> Result<FetchedContent> {
            Err(anyhow!("content api unavailable"))
        }

        async fn push_text(&self, to: &str, _: &str) -> Result<()> {
            if to == "g1" {
                Ok(())
            } else {
                Err(anyhow!("unknown destination"))
            }
        }
    }

    struct NoopTargetSender;

    #[async_trait]
    impl TargetChannelSender for NoopTargetSender {
        async fn send_text(&self, _: &str) -> Result<()> {
            Ok(())
        }

        async fn send_attachment(&self, _: &str, _: &std::path::Path) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn integration_session_identifies_flushes_and_answers_relay_command() {
        let scratch = tempdir().expect("tempdir");
        let api: Arc<dyn SourceApiClient> = Arc::new(BotInfoOnlySourceApi);
        let (_, handle, mut rx) = DeliveryManager::with_handle();
        let pipeline = NormalizationPipeline::new(
            DisplayNameResolver::new(api.clone()),
            AttachmentFetcher::new(api.clone(), scratch.path()),
            NormalizationConfig::default(),
        );
        let controller = Arc::new(BridgeController::new(
            BridgeControllerConfig {
                source_group_id: Some("g1".to_string()),
                relay_origin_label: "Relay".to_string(),
            },
            DedupCache::default(),
            pipeline,
            handle.clone(),
            api.clone(),
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.expect("accept");
            let mut websocket = accept_async(tcp).await.expect("handshake");

            let identify = websocket
                .next()
                .await
                .expect("identify frame")
                .expect("ws message");
            let identify: Value = match identify {
                WsMessage::Text(raw) => serde_json::from_str(raw.as_str()).expect("json"),
                other => panic!("unexpected frame: {other:?}"),
            };
            assert_eq!(identify["type"], "identify");
            assert_eq!(identify["token"], "gateway-token");

            websocket
                .send(WsMessage::Text(
                    r#"{"type":"ready","bot_user_id":"target-bot"}"#.into(),
                ))
                .await
                .expect("send ready");
            websocket
                .send(WsMessage::Text(
                    r#"{"type":"command","command_id":"c1","name":"relay","author_display_name":"Alice","text":"hi"}"#
                        .into(),
                ))
                .await
                .expect("send command");

            let response = websocket
                .next()
                .await
                .expect("command response")
                .expect("ws message");
            match response {
                WsMessage::Text(raw) => {
                    serde_json::from_str::<Value>(raw.as_str()).expect("json")
                }
                other => panic!("unexpected frame: {other:?}"),
            }
        });

        let runtime = tokio::spawn(run_gateway_bridge(
            GatewayRuntimeConfig {
                websocket_url: format!("ws://{addr}"),
                bot_token: "gateway-token".to_string(),
                reconnect_delay_ms: 50,
            },
            controller.clone(),
            handle,
            Arc::new(NoopTargetSender),
            api,
        ));

        let response = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server should finish")
            .expect("server task");
        assert_eq!(response["type"], "command_response");
        assert_eq!(response["command_id"], "c1");
        assert_eq!(response["ok"], true);
        runtime.abort();

        // Ready must have handed the channel to delivery and learned the
        // source bot id.
        let mut saw_channel_ready = false;
        while let Ok(command) = rx.try_recv() {
            if matches!(command, DeliveryCommand::ChannelReady(_)) {
                saw_channel_ready = true;
            }
        }
        assert!(saw_channel_ready);
        assert_eq!(
            controller.own_sender_id(),
            Some("source-bot-1".to_string())
        );
    }
}
