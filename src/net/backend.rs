//! Abstract realtime-backend collaborator and its event delivery channel
//!
//! The client core never blocks on the backend: control calls are
//! fire-and-forget, and results (handshake outcome, subscription application,
//! row changes) arrive later as [`BackendEvent`]s through the [`EventBuffer`],
//! which the frame loop drains once per displayed frame.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::warn;

use crate::net::protocol::{
    BackendEvent, ConnectError, ConnectRequest, QueryPredicate, RemoteAction, SubscriptionId,
};

/// The realtime backend, as the client core sees it
///
/// Implementations are transport adapters: they translate these structured
/// calls into whatever the wire protocol is and push resulting notifications
/// into the [`EventBuffer`] handed to them at construction.
pub trait Backend {
    /// Begin a connection attempt. Non-blocking; the outcome arrives as a
    /// `Connected` or `ConnectFailed` event.
    fn connect(&mut self, request: ConnectRequest) -> Result<(), ConnectError>;

    /// Issue a subscription for the given predicates. Rows start flowing
    /// asynchronously; a `SubscriptionApplied` event confirms the handle.
    fn subscribe(&mut self, predicates: Vec<QueryPredicate>) -> SubscriptionId;

    /// Release a subscription handle
    fn unsubscribe(&mut self, id: SubscriptionId);

    /// Fire-and-forget intent call
    fn call_action(&mut self, action: RemoteAction);

    /// Tear the connection down; a `Disconnected` event follows
    fn disconnect(&mut self);
}

/// Bounded channel carrying backend notifications into the frame loop.
///
/// Transport callbacks fire at arbitrary times relative to rendering; they
/// push here without blocking, and the frame loop drains everything pending
/// at the start of each frame. A full buffer drops the event with a warning
/// rather than stalling the transport.
pub struct EventBuffer {
    sender: Sender<BackendEvent>,
    receiver: Receiver<BackendEvent>,
}

/// Cloneable producer handle given to transport adapters
#[derive(Clone)]
pub struct EventSender {
    sender: Sender<BackendEvent>,
}

impl EventSender {
    pub fn send(&self, event: BackendEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!("backend event buffer full, dropping {:?}", kind_of(&event));
            }
            Err(TrySendError::Disconnected(_)) => {
                // Frame loop is gone; nothing to deliver to
            }
        }
    }
}

impl EventBuffer {
    /// Capacity should cover the burst of rows a subscription swap can
    /// deliver between two frames
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    /// Drain every event pending this frame
    pub fn drain(&self) -> Vec<BackendEvent> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new(4096)
    }
}

fn kind_of(event: &BackendEvent) -> &'static str {
    match event {
        BackendEvent::Connected { .. } => "Connected",
        BackendEvent::ConnectFailed { .. } => "ConnectFailed",
        BackendEvent::Disconnected => "Disconnected",
        BackendEvent::SubscriptionApplied { .. } => "SubscriptionApplied",
        BackendEvent::Row(_) => "Row",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::entities::{Bit, Color};
    use crate::world::events::{RowEvent, TableEvent};
    use crate::util::vec2::Vec2;

    fn row_event(id: u64) -> BackendEvent {
        BackendEvent::Row(TableEvent::Bit(RowEvent::Inserted(Bit {
            id,
            position: Vec2::ZERO,
            size: 1.0,
            color: Color::WHITE,
        })))
    }

    #[test]
    fn test_drain_returns_pending_in_order() {
        let buffer = EventBuffer::new(16);
        let sender = buffer.sender();
        sender.send(row_event(1));
        sender.send(row_event(2));

        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        match &drained[0] {
            BackendEvent::Row(TableEvent::Bit(RowEvent::Inserted(bit))) => assert_eq!(bit.id, 1),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn test_full_buffer_drops_instead_of_blocking() {
        let buffer = EventBuffer::new(1);
        let sender = buffer.sender();
        sender.send(row_event(1));
        sender.send(row_event(2)); // dropped, must not block
        assert_eq!(buffer.drain().len(), 1);
    }

    #[test]
    fn test_senders_are_independent() {
        let buffer = EventBuffer::new(8);
        let a = buffer.sender();
        let b = a.clone();
        a.send(BackendEvent::Disconnected);
        b.send(BackendEvent::Disconnected);
        assert_eq!(buffer.drain().len(), 2);
    }
}
