//! Bridging core between a push-webhook chat platform and a
//! persistent-connection chat platform.
//!
//! Inbound webhook events are deduplicated, normalized into a canonical
//! outbound representation (sender name resolution, attachment staging,
//! size policy) and handed to the delivery layer, which sends into the
//! target channel or buffers for replay while the channel is down. The
//! reverse path pushes a target-issued relay command back to the source
//! platform. Platform SDK concerns stay behind the capability traits in
//! [`bridge_contract`].

pub mod bridge_attachment;
pub mod bridge_contract;
pub mod bridge_controller;
pub mod bridge_dedup;
pub mod bridge_delivery;
pub mod bridge_display_name;
pub mod bridge_normalize;

pub use bridge_attachment::*;
pub use bridge_contract::*;
pub use bridge_controller::*;
pub use bridge_dedup::*;
pub use bridge_delivery::*;
pub use bridge_display_name::*;
pub use bridge_normalize::*;

#[cfg(test)]
pub(crate) mod test_support;
