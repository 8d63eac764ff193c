//! Source-platform connector: webhook ingress and the live REST client.
//!
//! The webhook server verifies signed callbacks, parses the event envelope
//! and feeds admitted events into the bridge controller. The REST client is
//! the live [`ferry_bridge::SourceApiClient`] implementation (profiles, bot
//! info, content download, push messages).

pub mod source_api_client;
pub mod webhook_payload;
pub mod webhook_server;
pub mod webhook_signature;

pub use source_api_client::*;
pub use webhook_payload::*;
pub use webhook_server::*;
pub use webhook_signature::*;
