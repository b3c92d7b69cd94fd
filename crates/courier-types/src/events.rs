use serde::{Deserialize, Serialize};

/// One inbound unit of the live message protocol, discriminated by field
/// shape rather than an explicit tag. Variants are tried in declaration
/// order, so `{id, text}` resolves to `Update` before `Delete` can claim
/// the bare `{id}` shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    Update {
        id: i64,
        text: String,
    },
    Create {
        text: Option<String>,
        photo: Option<String>,
        sender_id: i64,
        receiver_id: i64,
    },
    Delete {
        id: i64,
    },
}

/// Pushed to the offending sender when a frame dispatches with an error.
/// The connection itself stays open.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

impl ErrorReply {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_shape() {
        let frame = r#"{"text":"hi","photo":null,"sender_id":1,"receiver_id":2}"#;
        match serde_json::from_str::<Envelope>(frame).unwrap() {
            Envelope::Create { text, photo, sender_id, receiver_id } => {
                assert_eq!(text.as_deref(), Some("hi"));
                assert!(photo.is_none());
                assert_eq!(sender_id, 1);
                assert_eq!(receiver_id, 2);
            }
            other => panic!("expected Create, got {:?}", other),
        }
    }

    #[test]
    fn update_shape_wins_over_delete() {
        let frame = r#"{"id":7,"text":"edited"}"#;
        match serde_json::from_str::<Envelope>(frame).unwrap() {
            Envelope::Update { id, text } => {
                assert_eq!(id, 7);
                assert_eq!(text, "edited");
            }
            other => panic!("expected Update, got {:?}", other),
        }
    }

    #[test]
    fn bare_id_is_delete() {
        let frame = r#"{"id":99}"#;
        match serde_json::from_str::<Envelope>(frame).unwrap() {
            Envelope::Delete { id } => assert_eq!(id, 99),
            other => panic!("expected Delete, got {:?}", other),
        }
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(serde_json::from_str::<Envelope>(r#"{"hello":"world"}"#).is_err());
        assert!(serde_json::from_str::<Envelope>("not json").is_err());
    }
}
