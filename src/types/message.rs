//! Minimal view of an incoming message, as seen by the access controller.

use serde::{Deserialize, Serialize};

/// Kind of an incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Request,
    OneWay,
    Reply,
    SubscriptionRequest,
    BroadcastSubscriptionRequest,
    MulticastSubscriptionRequest,
    SubscriptionReply,
    SubscriptionStop,
    Publication,
    Multicast,
}

impl MessageType {
    /// Replies and publications are matched by request/subscription id and
    /// are never checked against access control entries.
    pub fn requires_permission_check(&self) -> bool {
        !matches!(
            self,
            MessageType::Reply
                | MessageType::SubscriptionReply
                | MessageType::Publication
                | MessageType::Multicast
        )
    }
}

/// An already-deserialized message envelope with an undecoded payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImmutableMessage {
    pub id: String,
    pub message_type: MessageType,
    /// User id of the message creator.
    pub creator: String,
    pub sender: String,
    pub recipient: String,
    pub payload: Vec<u8>,
}

impl ImmutableMessage {
    pub fn new(
        message_type: MessageType,
        creator: impl Into<String>,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            message_type,
            creator: creator.into(),
            sender: sender.into(),
            recipient: recipient.into(),
            payload: payload.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replies_skip_permission_check() {
        assert!(!MessageType::Reply.requires_permission_check());
        assert!(!MessageType::Publication.requires_permission_check());
        assert!(MessageType::Request.requires_permission_check());
        assert!(MessageType::SubscriptionStop.requires_permission_check());
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = ImmutableMessage::new(MessageType::Request, "u", "s", "r", b"{}".to_vec());
        let b = ImmutableMessage::new(MessageType::Request, "u", "s", "r", b"{}".to_vec());
        assert_ne!(a.id, b.id);
    }
}
