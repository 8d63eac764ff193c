//! Target-platform connector: gateway websocket runtime and REST sender.
//!
//! The runtime keeps a reconnecting websocket session to the target
//! platform, hands the channel to the delivery layer on every ready
//! transition (triggering a replay flush) and answers relay commands issued
//! by target-side users. The REST client is the live
//! [`ferry_bridge::TargetChannelSender`] implementation.

pub mod gateway_rest_client;
pub mod gateway_runtime;
pub mod gateway_session;

pub use gateway_rest_client::*;
pub use gateway_runtime::*;
pub use gateway_session::*;
