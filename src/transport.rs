use tokio::sync::mpsc;
use tracing::warn;

use crate::protocol::Envelope;

/// Outbound side of the frame boundary.
///
/// Posting is fire-and-forget: implementations never report delivery back to
/// the bridge.
pub trait HostPort {
    fn post(&self, envelope: Envelope);
}

/// Host port backed by an unbounded tokio channel.
pub struct ChannelPort {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl ChannelPort {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl HostPort for ChannelPort {
    fn post(&self, envelope: Envelope) {
        if self.tx.send(envelope).is_err() {
            warn!(target: "bridge", "host port closed; dropping outbound message");
        }
    }
}
