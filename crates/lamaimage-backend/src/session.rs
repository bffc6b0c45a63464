//! Process-wide session observable.
//!
//! One hub per backend instance, created at startup. Consumers subscribe
//! through a watch channel instead of registering per-component callbacks;
//! dropping the receiver unsubscribes.

use tokio::sync::watch;

use lamaimage_core::Session;

/// Shared "current identity" observable.
#[derive(Debug, Clone)]
pub struct SessionHub {
    tx: watch::Sender<Option<Session>>,
}

impl SessionHub {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        SessionHub { tx }
    }

    /// Current identity snapshot.
    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    /// Publish a new identity state. No-op observers are fine; the channel
    /// keeps only the latest value.
    pub fn set(&self, session: Option<Session>) {
        // send_replace never fails even with zero receivers.
        self.tx.send_replace(session);
    }

    /// Subscribe to identity changes. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_sees_changes() {
        let hub = SessionHub::new();
        let mut rx = hub.subscribe();
        assert!(rx.borrow().is_none());

        hub.set(Some(Session::new("u1", "u1@example.com")));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().unwrap().user_id, "u1");

        hub.set(None);
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }

    #[test]
    fn test_set_without_subscribers_is_fine() {
        let hub = SessionHub::new();
        hub.set(Some(Session::new("u1", "u1@example.com")));
        assert_eq!(hub.current().unwrap().user_id, "u1");
    }
}
