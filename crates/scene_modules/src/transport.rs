//! Outbound transport seam.
//!
//! Send handlers never touch sockets. They hand [`OutboundMessage`]s to a
//! [`ClientTransport`], which must queue without blocking; reliability,
//! retransmission and wire encoding live behind it.

use crate::messages::OutboundMessage;
use dashmap::DashMap;
use interest_engine::{PresenceId, SendError};
use tokio::sync::mpsc;
use tracing::{debug, trace};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No connection is registered for the presence
    #[error("Presence {0} has no open connection")]
    NotConnected(PresenceId),

    /// The connection's receiving side has gone away
    #[error("Connection for presence {0} is closed")]
    Closed(PresenceId),
}

impl From<TransportError> for SendError {
    fn from(err: TransportError) -> Self {
        SendError::Transport(err.to_string())
    }
}

/// Non-blocking per-presence message sink.
pub trait ClientTransport: Send + Sync {
    fn deliver(&self, presence: PresenceId, message: OutboundMessage) -> Result<(), TransportError>;
}

/// In-process transport: one unbounded tokio channel per connected presence.
///
/// ```rust
/// use scene_modules::transport::{ChannelTransport, ClientTransport};
/// use scene_modules::messages::OutboundMessage;
/// use interest_engine::PresenceId;
///
/// let transport = ChannelTransport::new();
/// let presence = PresenceId::new();
/// let mut inbox = transport.connect(presence);
///
/// transport.deliver(presence, OutboundMessage::KillObjects { local_ids: vec![1] })?;
/// assert_eq!(inbox.try_recv().map(|m| m.kind()), Ok("kill_objects"));
/// # Ok::<(), scene_modules::transport::TransportError>(())
/// ```
#[derive(Debug, Default)]
pub struct ChannelTransport {
    connections: DashMap<PresenceId, mpsc::UnboundedSender<OutboundMessage>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens (or replaces) the connection for `presence`, returning the
    /// receiving end of its outbound queue.
    pub fn connect(&self, presence: PresenceId) -> mpsc::UnboundedReceiver<OutboundMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.connections.insert(presence, tx).is_some() {
            debug!("🔌 Replaced outbound queue for presence {}", presence);
        }
        rx
    }

    pub fn disconnect(&self, presence: PresenceId) -> bool {
        self.connections.remove(&presence).is_some()
    }

    pub fn is_connected(&self, presence: PresenceId) -> bool {
        self.connections.contains_key(&presence)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl ClientTransport for ChannelTransport {
    fn deliver(&self, presence: PresenceId, message: OutboundMessage) -> Result<(), TransportError> {
        let sender = self
            .connections
            .get(&presence)
            .ok_or(TransportError::NotConnected(presence))?;

        trace!("📤 {} -> presence {}", message.kind(), presence);
        sender
            .send(message)
            .map_err(|_| TransportError::Closed(presence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deliver_requires_a_connection() {
        let transport = ChannelTransport::new();
        let presence = PresenceId::new();

        let result = transport.deliver(presence, OutboundMessage::KillObjects { local_ids: vec![] });
        assert!(matches!(result, Err(TransportError::NotConnected(id)) if id == presence));
    }

    #[test]
    fn dropped_receiver_reports_closed() {
        let transport = ChannelTransport::new();
        let presence = PresenceId::new();
        drop(transport.connect(presence));

        let result = transport.deliver(presence, OutboundMessage::KillObjects { local_ids: vec![] });
        assert!(matches!(result, Err(TransportError::Closed(_))));

        let err: SendError = result.unwrap_err().into();
        assert!(matches!(err, SendError::Transport(_)));
    }

    #[test]
    fn messages_arrive_in_delivery_order() {
        let transport = ChannelTransport::new();
        let presence = PresenceId::new();
        let mut inbox = transport.connect(presence);

        for id in 1..=3 {
            transport
                .deliver(presence, OutboundMessage::KillObjects { local_ids: vec![id] })
                .unwrap();
        }
        let received: Vec<OutboundMessage> = std::iter::from_fn(|| inbox.try_recv().ok()).collect();
        assert_eq!(
            received,
            (1..=3)
                .map(|id| OutboundMessage::KillObjects { local_ids: vec![id] })
                .collect::<Vec<_>>()
        );

        assert!(transport.disconnect(presence));
        assert!(!transport.is_connected(presence));
    }
}
