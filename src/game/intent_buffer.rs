//! Lock-free intent queue between the transport layer and the tick loop
//!
//! Connection handlers push intents through cloned `IntentSender` handles;
//! the game loop drains everything pending once at the start of each tick
//! and applies it in arrival order. Nothing else mutates the simulation.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::game::constants::tick::INTENT_CAPACITY;
use crate::game::entity::PlayerId;

/// A request from a client session
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Join { player_id: PlayerId, name: String },
    MoveTarget { player_id: PlayerId, x: f32, y: f32 },
    Boost { player_id: PlayerId },
    Respawn { player_id: PlayerId, name: String },
    Leave { player_id: PlayerId },
}

impl Intent {
    pub fn player_id(&self) -> PlayerId {
        match self {
            Intent::Join { player_id, .. }
            | Intent::MoveTarget { player_id, .. }
            | Intent::Boost { player_id }
            | Intent::Respawn { player_id, .. }
            | Intent::Leave { player_id } => *player_id,
        }
    }
}

/// Bounded intent queue
pub struct IntentBuffer {
    /// Sender side - cloned to each connection handler
    sender: Sender<Intent>,
    /// Receiver side - used by game loop
    receiver: Receiver<Intent>,
    capacity: usize,
}

impl IntentBuffer {
    /// Create a buffer holding at most `capacity` pending intents
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Create a new sender handle for a connection
    pub fn sender(&self) -> IntentSender {
        IntentSender {
            sender: self.sender.clone(),
        }
    }

    /// Submit directly, without a sender handle
    #[inline]
    pub fn try_submit(&self, intent: Intent) -> Result<(), IntentBufferError> {
        self.sender.try_send(intent).map_err(IntentBufferError::from)
    }

    /// Drain all pending intents in FIFO order
    pub fn drain(&self) -> Vec<Intent> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for IntentBuffer {
    fn default() -> Self {
        Self::new(INTENT_CAPACITY)
    }
}

/// Clonable sender handle for connection handlers
#[derive(Clone)]
pub struct IntentSender {
    sender: Sender<Intent>,
}

impl IntentSender {
    /// Submit an intent (non-blocking). Fails when the queue is full
    /// (backpressure) or the game loop has gone away.
    #[inline]
    pub fn try_send(&self, intent: Intent) -> Result<(), IntentBufferError> {
        self.sender.try_send(intent).map_err(IntentBufferError::from)
    }
}

/// Intent submission errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IntentBufferError {
    #[error("intent buffer is full")]
    Full,
    #[error("game loop is no longer receiving intents")]
    Disconnected,
}

impl<T> From<TrySendError<T>> for IntentBufferError {
    fn from(err: TrySendError<T>) -> Self {
        match err {
            TrySendError::Full(_) => IntentBufferError::Full,
            TrySendError::Disconnected(_) => IntentBufferError::Disconnected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn move_to(player_id: PlayerId, x: f32) -> Intent {
        Intent::MoveTarget { player_id, x, y: 0.0 }
    }

    #[test]
    fn test_submit_and_drain_fifo() {
        let buffer = IntentBuffer::new(10);
        let id = Uuid::new_v4();

        buffer.try_submit(Intent::Join { player_id: id, name: "A".to_string() }).unwrap();
        buffer.try_submit(move_to(id, 1.0)).unwrap();
        buffer.try_submit(Intent::Boost { player_id: id }).unwrap();
        assert_eq!(buffer.pending_count(), 3);

        let intents = buffer.drain();
        assert_eq!(intents.len(), 3);
        assert!(matches!(intents[0], Intent::Join { .. }));
        assert_eq!(intents[1], move_to(id, 1.0));
        assert!(matches!(intents[2], Intent::Boost { .. }));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_backpressure() {
        let buffer = IntentBuffer::new(2);
        let id = Uuid::new_v4();

        assert!(buffer.try_submit(move_to(id, 1.0)).is_ok());
        assert!(buffer.try_submit(move_to(id, 2.0)).is_ok());
        assert_eq!(buffer.try_submit(move_to(id, 3.0)), Err(IntentBufferError::Full));

        buffer.drain();
        assert!(buffer.try_submit(move_to(id, 3.0)).is_ok());
    }

    #[test]
    fn test_sender_clones_share_queue() {
        let buffer = IntentBuffer::new(10);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let s1 = buffer.sender();
        let s2 = s1.clone();
        s1.try_send(move_to(a, 1.0)).unwrap();
        s2.try_send(Intent::Leave { player_id: b }).unwrap();

        let ids: Vec<PlayerId> = buffer.drain().iter().map(Intent::player_id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_disconnected_after_buffer_dropped() {
        let buffer = IntentBuffer::new(4);
        let sender = buffer.sender();
        drop(buffer);

        let err = sender.try_send(Intent::Leave { player_id: Uuid::new_v4() });
        assert_eq!(err, Err(IntentBufferError::Disconnected));
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(IntentBuffer::default().capacity(), INTENT_CAPACITY);
    }
}
