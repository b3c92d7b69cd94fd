use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

/// Handle to one live connection's outbound channel. The `conn_id`
/// distinguishes channel instances so a stale disconnect can be told apart
/// from the channel currently registered for the same subject.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    conn_id: Uuid,
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelHandle {
    /// Fresh channel plus the receiving end its connection task drains.
    pub fn open() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                conn_id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    /// Queue a payload for the owning connection. Returns false when the
    /// connection task has already dropped its receiver.
    pub fn push(&self, payload: String) -> bool {
        self.tx.send(payload).is_ok()
    }
}

/// Maps a subject to its single live delivery channel. Explicitly
/// constructed at startup and handed to session handlers; exclusively owns
/// the mapping table.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<i64, ChannelHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert or overwrite the mapping for a subject. The displaced
    /// channel, if any, is not closed here; its connection detects closure
    /// on its own.
    pub async fn register(&self, subject_id: i64, channel: ChannelHandle) {
        self.inner.write().await.insert(subject_id, channel);
    }

    /// Compare-and-remove: drops the mapping only while `channel` is still
    /// the registered instance, so a late disconnect of a replaced
    /// connection never evicts its successor.
    pub async fn unregister(&self, subject_id: i64, channel: &ChannelHandle) {
        let mut map = self.inner.write().await;
        if let Some(current) = map.get(&subject_id) {
            if current.conn_id == channel.conn_id {
                map.remove(&subject_id);
            }
        }
    }

    pub async fn is_registered(&self, subject_id: i64) -> bool {
        self.inner.read().await.contains_key(&subject_id)
    }

    pub async fn lookup(&self, subject_id: i64) -> Option<ChannelHandle> {
        self.inner.read().await.get(&subject_id).cloned()
    }

    /// Best-effort push: writes the payload if the subject has a live
    /// channel and reports whether delivery was attempted. Nothing is
    /// queued or retried for absent subjects.
    pub async fn deliver(&self, subject_id: i64, payload: String) -> bool {
        match self.inner.read().await.get(&subject_id) {
            Some(channel) => channel.push(payload),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_overwrites_previous_channel() {
        let registry = ConnectionRegistry::new();
        let (c1, _rx1) = ChannelHandle::open();
        let (c2, _rx2) = ChannelHandle::open();

        registry.register(7, c1).await;
        registry.register(7, c2.clone()).await;

        let current = registry.lookup(7).await.unwrap();
        assert_eq!(current.conn_id(), c2.conn_id());
    }

    #[tokio::test]
    async fn stale_unregister_is_a_noop() {
        let registry = ConnectionRegistry::new();
        let (c1, _rx1) = ChannelHandle::open();
        let (c2, _rx2) = ChannelHandle::open();

        registry.register(7, c1.clone()).await;
        registry.register(7, c2.clone()).await;
        registry.unregister(7, &c1).await;

        assert!(registry.is_registered(7).await);
        assert_eq!(registry.lookup(7).await.unwrap().conn_id(), c2.conn_id());

        registry.unregister(7, &c2).await;
        assert!(!registry.is_registered(7).await);
    }

    #[tokio::test]
    async fn deliver_to_unregistered_subject_is_false() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.deliver(42, "hello".into()).await);
    }

    #[tokio::test]
    async fn deliver_reaches_the_registered_channel() {
        let registry = ConnectionRegistry::new();
        let (channel, mut rx) = ChannelHandle::open();
        registry.register(1, channel).await;

        assert!(registry.deliver(1, "hi".into()).await);
        assert_eq!(rx.try_recv().unwrap(), "hi");
    }
}
