//! Event delivery seam.
//!
//! The scan core's obligation ends at handing one pass's events to an
//! [`EventSink`]; batching, retries, and ordering beyond a single pass are
//! entirely the sink's business. [`ChannelSink`] is the in-process reference
//! sink, fanning each batch out over a broadcast channel.

use crate::watch::DescriptorEvent;
use tokio::sync::broadcast;

/// Receives the events produced by one scan pass.
pub trait EventSink {
    /// Hand over one pass's events. Called at most once per pass.
    fn deliver(&self, events: Vec<DescriptorEvent>);
}

/// Broadcast-backed sink for in-process consumers.
#[derive(Debug)]
pub struct ChannelSink {
    sender: broadcast::Sender<Vec<DescriptorEvent>>,
}

impl ChannelSink {
    /// Create a sink with the given channel capacity.
    ///
    /// # Returns
    /// A tuple of (sink, receiver) where the receiver gets event batches.
    pub fn new(buffer_size: usize) -> (Self, broadcast::Receiver<Vec<DescriptorEvent>>) {
        let (sender, receiver) = broadcast::channel(buffer_size);
        (Self { sender }, receiver)
    }

    /// Subscribe an additional receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<DescriptorEvent>> {
        self.sender.subscribe()
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, events: Vec<DescriptorEvent>) {
        // Ignore errors if no receivers are attached.
        let _ = self.sender.send(events);
    }
}
