use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio::sync::mpsc;

/// Receives row notifications emitted by `exec` while a statement runs.
///
/// Called from a database worker thread, in row order, before the `exec`
/// callback fires.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &str, payload: JsonValue);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &str, _payload: JsonValue) {}
}

/// One row delivered out of band.
#[derive(Debug, Clone, PartialEq)]
pub struct RowEvent {
    pub name: String,
    pub row: JsonValue,
}

/// Forwards events into a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<RowEvent>,
}

impl ChannelEventSink {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RowEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: &str, payload: JsonValue) {
        if self
            .sender
            .send(RowEvent {
                name: event.to_owned(),
                row: payload,
            })
            .is_err()
        {
            tracing::debug!(event, "row event receiver dropped");
        }
    }
}

pub(crate) type SharedEventSink = Arc<dyn EventSink>;
