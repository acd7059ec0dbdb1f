//! Replication channel between nodes

use std::sync::Arc;

use parking_lot::Mutex;

use daycycle_player::{ExplicitEvent, NetworkSnapshot};

/// Outbound side of a node's session link.
///
/// Explicit events must arrive reliably and in order; snapshots may be
/// dropped, delayed or reordered.
pub trait Transport: Send {
    fn send_reliable_ordered(&mut self, event: ExplicitEvent);

    fn publish_snapshot(&mut self, snapshot: NetworkSnapshot);

    /// Estimated one-way latency to the authority, in seconds
    fn one_way_latency(&self) -> f32 {
        0.0
    }
}

/// Transport that records everything it is asked to send.
///
/// Clones share the same record, so a test can keep one while the host owns
/// the other.
#[derive(Clone, Debug, Default)]
pub struct RecordingTransport {
    record: Arc<Mutex<Record>>,
    latency: f32,
}

#[derive(Debug, Default)]
struct Record {
    events: Vec<ExplicitEvent>,
    snapshots: Vec<NetworkSnapshot>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: f32) -> Self {
        RecordingTransport {
            latency,
            ..Default::default()
        }
    }

    pub fn take_events(&self) -> Vec<ExplicitEvent> {
        std::mem::take(&mut self.record.lock().events)
    }

    pub fn take_snapshots(&self) -> Vec<NetworkSnapshot> {
        std::mem::take(&mut self.record.lock().snapshots)
    }

    pub fn latest_snapshot(&self) -> Option<NetworkSnapshot> {
        self.record.lock().snapshots.last().copied()
    }
}

impl Transport for RecordingTransport {
    fn send_reliable_ordered(&mut self, event: ExplicitEvent) {
        self.record.lock().events.push(event);
    }

    fn publish_snapshot(&mut self, snapshot: NetworkSnapshot) {
        self.record.lock().snapshots.push(snapshot);
    }

    fn one_way_latency(&self) -> f32 {
        self.latency
    }
}
