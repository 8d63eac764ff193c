//! Websocket framing for the target gateway session.
//!
//! The session speaks JSON text frames: an `identify` frame after connect,
//! a `ready` frame from the platform once the connection is usable, and
//! `command` / `command_response` frames for user-invoked actions.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message as WsMessage;

pub const GATEWAY_COMMAND_RELAY: &str = "relay";

/// A relay command invoked by a target-side user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayCommandInvocation {
    pub command_id: String,
    pub name: String,
    #[serde(default)]
    pub author_display_name: String,
    #[serde(default)]
    pub text: String,
}

/// Frames the runtime reacts to. Anything else is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayServerFrame {
    Ready { bot_user_id: String },
    Command(GatewayCommandInvocation),
}

/// Decodes one websocket message. Non-text frames and unknown frame types
/// parse to `None`; malformed known frames are errors.
pub fn parse_gateway_frame(message: &WsMessage) -> Result<Option<GatewayServerFrame>> {
    let WsMessage::Text(raw) = message else {
        return Ok(None);
    };
    let value: Value =
        serde_json::from_str(raw.as_str()).context("gateway frame is not valid json")?;
    match value.get("type").and_then(Value::as_str) {
        Some("ready") => {
            let bot_user_id = value
                .get("bot_user_id")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            Ok(Some(GatewayServerFrame::Ready { bot_user_id }))
        }
        Some("command") => {
            let invocation: GatewayCommandInvocation = serde_json::from_value(value)
                .context("gateway command frame is missing required fields")?;
            Ok(Some(GatewayServerFrame::Command(invocation)))
        }
        _ => Ok(None),
    }
}

pub fn identify_frame(bot_token: &str) -> String {
    json!({ "type": "identify", "token": bot_token }).to_string()
}

pub fn command_response_frame(command_id: &str, ok: bool, message: &str) -> String {
    json!({
        "type": "command_response",
        "command_id": command_id,
        "ok": ok,
        "message": message,
    })
    .to_string()
}
