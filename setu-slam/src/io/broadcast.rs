//! Outbound publication seam.
//!
//! Everything the session emits (transforms, fiducial markers, graph
//! snapshots, drag previews) goes through [`Broadcaster`]. The in-crate
//! implementation queues onto a bounded channel and drops on overflow so
//! a slow consumer never stalls the SLAM thread.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::loop_closure::{GraphSnapshot, ScanPreview};
use crate::session::{FiducialMarker, StampedTransform};

pub trait Broadcaster: Send + Sync {
    fn send_transforms(&self, transforms: Vec<StampedTransform>);
    fn send_markers(&self, markers: Vec<FiducialMarker>);
    fn send_graph(&self, snapshot: GraphSnapshot);
    fn send_scan_preview(&self, preview: ScanPreview);
}

#[derive(Debug, Clone)]
pub enum Broadcast {
    Transforms(Vec<StampedTransform>),
    Markers(Vec<FiducialMarker>),
    Graph(GraphSnapshot),
    ScanPreview(ScanPreview),
}

impl Broadcast {
    pub fn kind(&self) -> &'static str {
        match self {
            Broadcast::Transforms(_) => "transforms",
            Broadcast::Markers(_) => "markers",
            Broadcast::Graph(_) => "graph",
            Broadcast::ScanPreview(_) => "scan_preview",
        }
    }
}

#[derive(Clone)]
pub struct ChannelBroadcaster {
    tx: Sender<Broadcast>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> (Self, Receiver<Broadcast>) {
        let (tx, rx) = bounded(capacity.max(1));
        (Self { tx }, rx)
    }

    fn push(&self, msg: Broadcast) {
        match self.tx.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(msg)) => {
                log::trace!("Broadcast queue full, dropping {}", msg.kind());
            }
            Err(TrySendError::Disconnected(msg)) => {
                log::trace!("No broadcast consumer, dropping {}", msg.kind());
            }
        }
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn send_transforms(&self, transforms: Vec<StampedTransform>) {
        self.push(Broadcast::Transforms(transforms));
    }

    fn send_markers(&self, markers: Vec<FiducialMarker>) {
        self.push(Broadcast::Markers(markers));
    }

    fn send_graph(&self, snapshot: GraphSnapshot) {
        self.push(Broadcast::Graph(snapshot));
    }

    fn send_scan_preview(&self, preview: ScanPreview) {
        self.push(Broadcast::ScanPreview(preview));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_drops_newest() {
        let (broadcaster, rx) = ChannelBroadcaster::new(1);
        broadcaster.send_markers(Vec::new());
        broadcaster.send_transforms(Vec::new());

        assert!(matches!(rx.try_recv(), Ok(Broadcast::Markers(_))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_without_consumer_is_silent() {
        let (broadcaster, rx) = ChannelBroadcaster::new(4);
        drop(rx);
        broadcaster.send_transforms(Vec::new());
    }
}
