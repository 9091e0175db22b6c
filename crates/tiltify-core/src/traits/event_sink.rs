// # Event Sink Trait
//
// The host event bus, seen from the engine: a place to hand emitted
// donation events to. Filters and variable accessors run on the consumer side.

use async_trait::async_trait;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;

use crate::event::DonationEvent;

/// Trait for event sink implementations
///
/// # Delivery
///
/// `emit` returning `Ok` means the event was handed over. The engine records
/// the donation as delivered only after that, so an error leaves the donation
/// eligible for the next tick.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one donation event
    async fn emit(&self, event: DonationEvent) -> Result<(), crate::Error>;
}

/// Event sink backed by a bounded tokio channel
///
/// `emit` waits for capacity instead of dropping, so a slow consumer slows
/// the tick down rather than losing donations.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::Sender<DonationEvent>,
}

impl ChannelEventSink {
    /// Create a sink and the receiver its events arrive on
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<DonationEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Create a sink whose events are exposed as a stream
    pub fn with_stream(
        capacity: usize,
    ) -> (Self, Pin<Box<dyn Stream<Item = DonationEvent> + Send + 'static>>) {
        let (sink, rx) = Self::new(capacity);
        (sink, Box::pin(ReceiverStream::new(rx)))
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn emit(&self, event: DonationEvent) -> Result<(), crate::Error> {
        self.tx
            .send(event)
            .await
            .map_err(|_| crate::Error::event_sink("event receiver dropped"))
    }
}
