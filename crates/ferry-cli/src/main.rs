//! `ferry` binary: configuration, logging bootstrap and task wiring.
//!
//! Spawns the delivery loop, the webhook server and the temp sweep, then
//! drives the target gateway runtime on the main task until ctrl-c.

mod cli_log_time;
mod temp_sweep;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use ferry_bridge::{
    AttachmentFetcher, BridgeController, BridgeControllerConfig, DedupCache, DeliveryManager,
    DisplayNameResolver, NormalizationConfig, NormalizationPipeline, SourceApiClient,
    TargetChannelSender,
};
use ferry_gateway::{
    run_gateway_bridge, GatewayRestClient, GatewayRestClientConfig, GatewayRuntimeConfig,
    RECONNECT_DELAY_MS_DEFAULT,
};
use ferry_webhook::{
    run_webhook_server, SourceRestClient, SourceRestClientConfig, WebhookServerConfig,
};

use crate::cli_log_time::{parse_log_timezone, ZonedLogTimer};
use crate::temp_sweep::run_temp_sweep;

/// Bridges a push-webhook chat platform into a persistent-connection chat
/// platform, and relays one target-side command back out.
#[derive(Debug, Parser)]
#[command(name = "ferry", version, about)]
struct FerryArgs {
    /// Access token for the source platform REST API.
    #[arg(long, env = "FERRY_SOURCE_ACCESS_TOKEN")]
    source_access_token: String,

    /// Channel secret used to verify webhook signatures.
    #[arg(long, env = "FERRY_SOURCE_CHANNEL_SECRET")]
    source_channel_secret: String,

    /// Base URL of the source platform REST API.
    #[arg(long, env = "FERRY_SOURCE_API_BASE")]
    source_api_base: String,

    /// Source group receiving relayed target commands. Without it the relay
    /// command answers "not configured".
    #[arg(long, env = "FERRY_SOURCE_GROUP_ID")]
    source_group_id: Option<String>,

    /// Bot token for the target platform.
    #[arg(long, env = "FERRY_TARGET_BOT_TOKEN")]
    target_bot_token: String,

    /// Base URL of the target platform REST API.
    #[arg(long, env = "FERRY_TARGET_API_BASE")]
    target_api_base: String,

    /// Websocket URL of the target gateway.
    #[arg(long, env = "FERRY_TARGET_GATEWAY_URL")]
    target_gateway_url: String,

    /// Target channel receiving relayed source messages.
    #[arg(long, env = "FERRY_TARGET_CHANNEL_ID")]
    target_channel_id: String,

    /// Label prefixed to text relayed back to the source platform.
    #[arg(long, env = "FERRY_RELAY_ORIGIN_LABEL", default_value = "Relay")]
    relay_origin_label: String,

    /// Webhook listener bind address.
    #[arg(long, env = "FERRY_BIND", default_value = "0.0.0.0:8000")]
    bind: String,

    /// Directory for staged attachment files.
    #[arg(long, env = "FERRY_TEMP_DIR", default_value = "temp-attachments")]
    temp_dir: PathBuf,

    /// IANA timezone used for log timestamps.
    #[arg(long, env = "FERRY_LOG_TIMEZONE", default_value = "UTC")]
    log_timezone: String,

    /// Timeout for platform API requests, in milliseconds.
    #[arg(long, env = "FERRY_REQUEST_TIMEOUT_MS", default_value_t = 10_000)]
    request_timeout_ms: u64,

    /// Delay between gateway reconnect attempts, in milliseconds.
    #[arg(long, env = "FERRY_RECONNECT_DELAY_MS", default_value_t = RECONNECT_DELAY_MS_DEFAULT)]
    reconnect_delay_ms: u64,
}

fn init_tracing(timezone: chrono_tz::Tz) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_timer(ZonedLogTimer::new(timezone))
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = FerryArgs::parse();
    let timezone = parse_log_timezone(&args.log_timezone)?;
    init_tracing(timezone);
    info!("log timestamps use timezone {timezone}");

    std::fs::create_dir_all(&args.temp_dir)
        .with_context(|| format!("failed to create temp dir {}", args.temp_dir.display()))?;

    let source_api: Arc<dyn SourceApiClient> =
        Arc::new(SourceRestClient::new(SourceRestClientConfig {
            api_base: args.source_api_base.clone(),
            access_token: args.source_access_token.clone(),
            request_timeout_ms: args.request_timeout_ms,
        })?);
    let target_channel: Arc<dyn TargetChannelSender> =
        Arc::new(GatewayRestClient::new(GatewayRestClientConfig {
            api_base: args.target_api_base.clone(),
            bot_token: args.target_bot_token.clone(),
            channel_id: args.target_channel_id.clone(),
            request_timeout_ms: args.request_timeout_ms,
        })?);

    let (delivery_manager, delivery_handle, delivery_rx) = DeliveryManager::with_handle();
    let pipeline = NormalizationPipeline::new(
        DisplayNameResolver::new(source_api.clone()),
        AttachmentFetcher::new(source_api.clone(), &args.temp_dir),
        NormalizationConfig::default(),
    );
    let controller = Arc::new(BridgeController::new(
        BridgeControllerConfig {
            source_group_id: args.source_group_id.clone(),
            relay_origin_label: args.relay_origin_label.clone(),
        },
        DedupCache::default(),
        pipeline,
        delivery_handle.clone(),
        source_api.clone(),
    ));

    let delivery_task = tokio::spawn(delivery_manager.run(delivery_rx));
    let sweep_task = tokio::spawn(run_temp_sweep(args.temp_dir.clone()));
    let webhook_task = tokio::spawn(run_webhook_server(
        WebhookServerConfig {
            bind: args.bind.clone(),
            channel_secret: args.source_channel_secret.clone(),
        },
        controller.clone(),
    ));

    let gateway_result = run_gateway_bridge(
        GatewayRuntimeConfig {
            websocket_url: args.target_gateway_url.clone(),
            bot_token: args.target_bot_token.clone(),
            reconnect_delay_ms: args.reconnect_delay_ms,
        },
        controller,
        delivery_handle,
        target_channel,
        source_api,
    )
    .await;

    webhook_task.abort();
    sweep_task.abort();
    delivery_task.abort();
    gateway_result
}
