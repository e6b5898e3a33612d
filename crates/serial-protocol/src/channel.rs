//! Message Channel
//!
//! Single-producer/single-consumer queue from the port reader to whoever drains
//! it. The channel outlives individual connections: each session's reader gets
//! a sender tagged with its [`SessionId`], and the consumer keeps one receiver
//! for its lifetime. Events still queued when a session closes carry the old
//! id, so the consumer can tell them apart from the next session's.

use crate::error::SerialError;
use crate::message::Message;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Default number of in-flight events before the reader waits
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Identifier of one open..close session, unique per adapter
pub type SessionId = u64;

/// Item carried from the reader to the consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortEvent {
    /// A completed frame
    Message(Message),
    /// The read loop stopped on EOF or an I/O failure
    ConnectionLost { reason: String },
}

/// A [`PortEvent`] and the session that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub session: SessionId,
    pub event: PortEvent,
}

/// Create a channel pair
pub fn message_channel(capacity: usize) -> (MessageSender, MessageReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (MessageSender { tx, session: 0 }, MessageReceiver { rx })
}

/// Producer half, held by the port reader
#[derive(Debug, Clone)]
pub struct MessageSender {
    tx: mpsc::Sender<SessionEvent>,
    session: SessionId,
}

impl MessageSender {
    /// Sender on the same channel whose events are tagged with `session`
    pub fn for_session(&self, session: SessionId) -> Self {
        Self {
            tx: self.tx.clone(),
            session,
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Queue a message, waiting for room unless the session is cancelled.
    ///
    /// A closed channel silently drops the message.
    pub async fn emit(&self, message: Message, cancel: &CancellationToken) -> Result<(), SerialError> {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(SerialError::Cancelled),

            sent = self.tx.send(self.tag(PortEvent::Message(message))) => {
                if sent.is_err() {
                    trace!("Message channel closed, dropping frame");
                }
                Ok(())
            }
        }
    }

    /// Report that the reader died on its own
    pub async fn connection_lost(&self, reason: String) {
        let event = self.tag(PortEvent::ConnectionLost { reason });
        if self.tx.send(event).await.is_err() {
            trace!("Message channel closed, dropping connection-lost notice");
        }
    }

    /// Whether the consumer has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn tag(&self, event: PortEvent) -> SessionEvent {
        SessionEvent {
            session: self.session,
            event,
        }
    }
}

/// Consumer half
#[derive(Debug)]
pub struct MessageReceiver {
    rx: mpsc::Receiver<SessionEvent>,
}

impl MessageReceiver {
    /// Wait for the next event; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    /// Take an event if one is ready
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let (tx, mut rx) = message_channel(8);
        let cancel = CancellationToken::new();

        for payload in [b"one".to_vec(), b"two".to_vec(), b"three".to_vec()] {
            tx.emit(Message::received(payload), &cancel).await.unwrap();
        }

        for expected in [&b"one"[..], b"two", b"three"] {
            match rx.recv().await {
                Some(SessionEvent {
                    event: PortEvent::Message(m),
                    ..
                }) => assert_eq!(m.payload(), expected),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_events_carry_session() {
        let (tx, mut rx) = message_channel(4);
        let cancel = CancellationToken::new();
        let session = tx.for_session(7);
        assert_eq!(session.session(), 7);

        session.emit(Message::received(vec![1]), &cancel).await.unwrap();
        session.connection_lost("gone".to_string()).await;

        let first = rx.recv().await.unwrap();
        assert_eq!(first.session, 7);
        assert!(matches!(first.event, PortEvent::Message(_)));
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent {
                session: 7,
                event: PortEvent::ConnectionLost {
                    reason: "gone".to_string()
                },
            }
        );
    }

    #[tokio::test]
    async fn test_emit_after_cancel_is_refused() {
        let (tx, mut rx) = message_channel(1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = tx.emit(Message::received(b"x".to_vec()), &cancel).await;
        assert_eq!(result, Err(SerialError::Cancelled));
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_cancel_unblocks_full_channel() {
        let (tx, _rx) = message_channel(1);
        let cancel = CancellationToken::new();
        tx.emit(Message::received(vec![1]), &cancel).await.unwrap();

        let pending = {
            let tx = tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { tx.emit(Message::received(vec![2]), &cancel).await })
        };
        cancel.cancel();

        assert_eq!(pending.await.unwrap(), Err(SerialError::Cancelled));
    }

    #[tokio::test]
    async fn test_closed_channel_drops_silently() {
        let (tx, rx) = message_channel(4);
        drop(rx);
        assert!(tx.is_closed());

        let cancel = CancellationToken::new();
        assert!(tx.emit(Message::received(vec![1]), &cancel).await.is_ok());
    }
}
