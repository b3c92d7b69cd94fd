use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use courier_db::Database;
use courier_types::events::Envelope;

use crate::registry::ConnectionRegistry;

/// Per-frame dispatch failures. None of these end the session; the
/// connection loop reports them to the sender and keeps reading.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("message requires exactly one of text or photo")]
    InvalidEnvelope,

    #[error("message {0} not found")]
    NotFound(i64),

    #[error("storage failure: {0}")]
    Persistence(#[from] anyhow::Error),
}

/// Interprets inbound action envelopes: persists the change and pushes
/// delivery events through the registry.
#[derive(Clone)]
pub struct MessageDispatcher {
    db: Arc<Database>,
    registry: ConnectionRegistry,
}

impl MessageDispatcher {
    pub fn new(db: Arc<Database>, registry: ConnectionRegistry) -> Self {
        Self { db, registry }
    }

    /// Handle one parsed envelope from `subject_id`'s connection. Frames
    /// from a single connection arrive here strictly sequentially.
    pub async fn dispatch(
        &self,
        subject_id: i64,
        envelope: Envelope,
    ) -> Result<(), DispatchError> {
        match envelope {
            Envelope::Create {
                text,
                photo,
                sender_id,
                receiver_id,
            } => {
                self.create(subject_id, sender_id, receiver_id, text, photo)
                    .await
            }
            Envelope::Update { id, text } => self.update(subject_id, id, text).await,
            Envelope::Delete { id } => self.delete(id).await,
        }
    }

    async fn create(
        &self,
        subject_id: i64,
        sender_id: i64,
        receiver_id: i64,
        text: Option<String>,
        photo: Option<String>,
    ) -> Result<(), DispatchError> {
        // Validated before any persistence is attempted.
        let payload = match (&text, &photo) {
            (Some(_), Some(_)) | (None, None) => return Err(DispatchError::InvalidEnvelope),
            (Some(text), None) => text.clone(),
            (None, Some(photo)) => photo.clone(),
        };

        // Run blocking DB insert off the async runtime
        let db = self.db.clone();
        let row = tokio::task::spawn_blocking(move || {
            db.create_message(sender_id, receiver_id, text.as_deref(), photo.as_deref())
        })
        .await
        .map_err(join_error)??;
        debug!("message {} stored ({} -> {})", row.id, sender_id, receiver_id);

        // Echo to the sender's own channel, then best-effort live push to
        // the recipient. A disconnected recipient just misses the push.
        self.registry.deliver(subject_id, payload.clone()).await;
        if receiver_id != subject_id {
            self.registry.deliver(receiver_id, payload).await;
        }
        Ok(())
    }

    async fn update(&self, subject_id: i64, id: i64, text: String) -> Result<(), DispatchError> {
        let db = self.db.clone();
        let echo = text.clone();
        let row = tokio::task::spawn_blocking(move || db.update_message(id, &text))
            .await
            .map_err(join_error)??;

        match row {
            Some(row) => {
                debug!("message {} updated", row.id);
                self.registry.deliver(subject_id, echo).await;
                Ok(())
            }
            None => Err(DispatchError::NotFound(id)),
        }
    }

    async fn delete(&self, id: i64) -> Result<(), DispatchError> {
        let db = self.db.clone();
        let removed = tokio::task::spawn_blocking(move || db.delete_message(id))
            .await
            .map_err(join_error)??;

        if removed {
            debug!("message {} deleted", id);
            Ok(())
        } else {
            Err(DispatchError::NotFound(id))
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> DispatchError {
    DispatchError::Persistence(anyhow::anyhow!("storage task failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ChannelHandle;

    fn fixture() -> (MessageDispatcher, ConnectionRegistry, Arc<Database>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.create_user("alice", "hash-a", "user", false).unwrap();
        db.create_user("bob", "hash-b", "user", false).unwrap();
        let registry = ConnectionRegistry::new();
        let dispatcher = MessageDispatcher::new(db.clone(), registry.clone());
        (dispatcher, registry, db)
    }

    #[tokio::test]
    async fn create_persists_and_echoes_to_sender() {
        let (dispatcher, registry, db) = fixture();
        let (channel, mut rx) = ChannelHandle::open();
        registry.register(1, channel).await;

        dispatcher
            .dispatch(
                1,
                Envelope::Create {
                    text: Some("hi".into()),
                    photo: None,
                    sender_id: 1,
                    receiver_id: 2,
                },
            )
            .await
            .unwrap();

        assert_eq!(rx.try_recv().unwrap(), "hi");
        let rows = db.list_messages(1, 2).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sender, 1);
        assert_eq!(rows[0].receiver, 2);
        assert_eq!(rows[0].text.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn create_pushes_to_a_connected_recipient() {
        let (dispatcher, registry, _db) = fixture();
        let (receiver_channel, mut receiver_rx) = ChannelHandle::open();
        registry.register(2, receiver_channel).await;

        dispatcher
            .dispatch(
                1,
                Envelope::Create {
                    text: None,
                    photo: Some("cat.png".into()),
                    sender_id: 1,
                    receiver_id: 2,
                },
            )
            .await
            .unwrap();

        // Photo messages deliver the photo reference.
        assert_eq!(receiver_rx.try_recv().unwrap(), "cat.png");
    }

    #[tokio::test]
    async fn both_text_and_photo_is_rejected_before_persistence() {
        let (dispatcher, _registry, db) = fixture();
        let result = dispatcher
            .dispatch(
                1,
                Envelope::Create {
                    text: Some("hi".into()),
                    photo: Some("cat.png".into()),
                    sender_id: 1,
                    receiver_id: 2,
                },
            )
            .await;

        assert!(matches!(result, Err(DispatchError::InvalidEnvelope)));
        assert!(db.list_messages(1, 2).unwrap().is_empty());

        let neither = dispatcher
            .dispatch(
                1,
                Envelope::Create {
                    text: None,
                    photo: None,
                    sender_id: 1,
                    receiver_id: 2,
                },
            )
            .await;
        assert!(matches!(neither, Err(DispatchError::InvalidEnvelope)));
    }

    #[tokio::test]
    async fn update_echoes_new_text_and_missing_id_is_not_found() {
        let (dispatcher, registry, db) = fixture();
        let (channel, mut rx) = ChannelHandle::open();
        registry.register(1, channel).await;

        let row = db.create_message(1, 2, Some("hi"), None).unwrap();
        dispatcher
            .dispatch(1, Envelope::Update { id: row.id, text: "edited".into() })
            .await
            .unwrap();
        assert_eq!(rx.try_recv().unwrap(), "edited");
        assert_eq!(
            db.get_message(row.id).unwrap().unwrap().text.as_deref(),
            Some("edited")
        );

        let missing = dispatcher
            .dispatch(1, Envelope::Update { id: 9999, text: "x".into() })
            .await;
        assert!(matches!(missing, Err(DispatchError::NotFound(9999))));
    }

    #[tokio::test]
    async fn delete_removes_row_and_missing_id_is_not_found() {
        let (dispatcher, _registry, db) = fixture();
        let row = db.create_message(1, 2, Some("bye"), None).unwrap();

        dispatcher
            .dispatch(1, Envelope::Delete { id: row.id })
            .await
            .unwrap();
        assert!(db.get_message(row.id).unwrap().is_none());

        let missing = dispatcher.dispatch(1, Envelope::Delete { id: 99 }).await;
        assert!(matches!(missing, Err(DispatchError::NotFound(99))));
    }
}
