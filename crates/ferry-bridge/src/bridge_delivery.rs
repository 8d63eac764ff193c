//! Outbound delivery with buffering and replay across channel outages.
//!
//! The manager runs as a single task on the target-connection execution
//! context and consumes [`DeliveryCommand`]s from an unbounded channel. That
//! serializes every buffer mutation and preserves FIFO enqueue order between
//! sends initiated from the webhook context. The replay buffer is unbounded
//! while the channel is down.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::bridge_contract::{OutboundMessage, TargetChannelSender};

/// Work items marshaled onto the delivery task.
pub enum DeliveryCommand {
    Deliver(OutboundMessage),
    ChannelReady(Arc<dyn TargetChannelSender>),
    ChannelLost,
}

/// Cloneable handle used by request-handling code to enqueue delivery work.
#[derive(Clone)]
pub struct DeliveryHandle {
    tx: mpsc::UnboundedSender<DeliveryCommand>,
}

impl DeliveryHandle {
    pub fn deliver(&self, message: OutboundMessage) {
        if self.tx.send(DeliveryCommand::Deliver(message)).is_err() {
            warn!("delivery task is gone; dropping outbound message");
        }
    }

    pub fn channel_ready(&self, sender: Arc<dyn TargetChannelSender>) {
        if self.tx.send(DeliveryCommand::ChannelReady(sender)).is_err() {
            warn!("delivery task is gone; dropping channel-ready transition");
        }
    }

    pub fn channel_lost(&self) {
        if self.tx.send(DeliveryCommand::ChannelLost).is_err() {
            warn!("delivery task is gone; dropping channel-lost transition");
        }
    }
}

/// Owns the target-channel handle and the replay buffer.
pub struct DeliveryManager {
    channel: Option<Arc<dyn TargetChannelSender>>,
    replay_buffer: VecDeque<OutboundMessage>,
}

impl DeliveryManager {
    pub fn new() -> Self {
        Self {
            channel: None,
            replay_buffer: VecDeque::new(),
        }
    }

    /// Builds the manager together with the handle/receiver pair feeding it.
    pub fn with_handle() -> (Self, DeliveryHandle, mpsc::UnboundedReceiver<DeliveryCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(), DeliveryHandle { tx }, rx)
    }

    /// Consumes delivery commands until every handle is dropped.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<DeliveryCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                DeliveryCommand::Deliver(message) => self.deliver(message).await,
                DeliveryCommand::ChannelReady(sender) => {
                    self.channel = Some(sender);
                    self.flush_on_connect().await;
                }
                DeliveryCommand::ChannelLost => {
                    self.channel = None;
                }
            }
        }
    }

    /// Sends now when the channel is up, otherwise appends to the replay
    /// buffer. A failed send also buffers; the attachment file survives in
    /// both cases so a replay can still post it.
    pub async fn deliver(&mut self, message: OutboundMessage) {
        let Some(channel) = self.channel.clone() else {
            info!("target channel not ready; buffering outbound message");
            self.replay_buffer.push_back(message);
            return;
        };
        match send_outbound(channel.as_ref(), &message).await {
            Ok(()) => remove_attachment_file(&message).await,
            Err(error) => {
                warn!("target channel send failed, buffering for replay: {error:#}");
                self.replay_buffer.push_back(message);
            }
        }
    }

    /// One replay pass, run on every transition to ready. Entries that fail
    /// again are dropped (abandoned), not re-queued; abandoned attachments
    /// have their staged files removed.
    pub async fn flush_on_connect(&mut self) {
        if self.replay_buffer.is_empty() {
            return;
        }
        let Some(channel) = self.channel.clone() else {
            return;
        };
        let pending = std::mem::take(&mut self.replay_buffer);
        info!("replaying {} buffered outbound messages", pending.len());
        for message in pending {
            match send_outbound(channel.as_ref(), &message).await {
                Ok(()) => remove_attachment_file(&message).await,
                Err(error) => {
                    warn!("replay send failed, dropping buffered message: {error:#}");
                    remove_attachment_file(&message).await;
                }
            }
        }
    }

    pub fn set_channel(&mut self, sender: Arc<dyn TargetChannelSender>) {
        self.channel = Some(sender);
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    pub fn replay_buffer_len(&self) -> usize {
        self.replay_buffer.len()
    }
}

impl Default for DeliveryManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn send_outbound(
    channel: &dyn TargetChannelSender,
    message: &OutboundMessage,
) -> anyhow::Result<()> {
    match &message.attachment {
        Some(attachment) => {
            channel
                .send_attachment(&message.body, &attachment.local_path)
                .await
        }
        None => channel.send_text(&message.body).await,
    }
}

async fn remove_attachment_file(message: &OutboundMessage) {
    let Some(attachment) = &message.attachment else {
        return;
    };
    if let Err(error) = tokio::fs::remove_file(&attachment.local_path).await {
        warn!(
            "failed to remove staged attachment {}: {error}",
            attachment.local_path.display()
        );
    }
}
