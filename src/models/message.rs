/// Message model for the Circl inbox client.
/// Represents one direct message between the local user and a counterparty.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use uuid::Uuid;

use super::int_or_string;
use crate::timefmt;

/// Server-assigned ids are integers; optimistic sends carry a local UUID
/// until the server confirms them, so the two can never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageId {
    Server(i64),
    Pending(Uuid),
}

impl MessageId {
    pub fn pending() -> Self {
        MessageId::Pending(Uuid::new_v4())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, MessageId::Pending(_))
    }

    pub fn server_id(&self) -> Option<i64> {
        match self {
            MessageId::Server(id) => Some(*id),
            MessageId::Pending(_) => None,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Server(id) => write!(f, "{}", id),
            MessageId::Pending(uuid) => write!(f, "pending-{}", uuid.simple()),
        }
    }
}

/// Where an outgoing message is in its round trip to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Came from a server fetch or a confirmed send.
    Confirmed,
    /// Request in flight.
    Sending,
    /// Server accepted it but did not echo the stored message back.
    Sent,
    /// Request failed; kept visible until retried or discarded.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub is_read: bool,
    pub delivery: Delivery,
    timestamp: String,
    sent_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Create a message as returned by the server
    pub fn from_server(
        id: i64,
        sender_id: i64,
        receiver_id: i64,
        content: impl Into<String>,
        timestamp: impl Into<String>,
        is_read: bool,
    ) -> Self {
        let timestamp = timestamp.into();
        Message {
            id: MessageId::Server(id),
            sender_id,
            receiver_id,
            content: content.into(),
            is_read,
            delivery: Delivery::Confirmed,
            sent_at: timefmt::parse_timestamp(&timestamp),
            timestamp,
        }
    }

    /// Create a local, not yet confirmed message stamped at `now`
    pub fn outgoing(
        sender_id: i64,
        receiver_id: i64,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Message {
            id: MessageId::pending(),
            sender_id,
            receiver_id,
            content: content.into(),
            is_read: false,
            delivery: Delivery::Sending,
            timestamp: timefmt::format_timestamp(now),
            sent_at: Some(now),
        }
    }

    /// Raw timestamp as received or stamped
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Parsed instant, `None` if the server sent something unparseable
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.sent_at
    }

    /// The other participant, relative to `local_user_id`
    pub fn counterparty(&self, local_user_id: i64) -> i64 {
        if self.sender_id == local_user_id {
            self.receiver_id
        } else {
            self.sender_id
        }
    }

    pub fn is_from(&self, user_id: i64) -> bool {
        self.sender_id == user_id
    }

    /// Relative display time ("5 minutes", "just now")
    pub fn relative_time(&self, now: DateTime<Utc>) -> String {
        match self.sent_at {
            Some(at) => timefmt::relative_time((now - at).num_seconds()),
            None => timefmt::JUST_NOW.to_string(),
        }
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Message {}

/// Message as it appears on the wire
#[derive(Debug, Clone, Deserialize)]
pub struct MessageRecord {
    #[serde(deserialize_with = "int_or_string")]
    pub id: i64,
    #[serde(deserialize_with = "int_or_string")]
    pub sender_id: i64,
    #[serde(deserialize_with = "int_or_string")]
    pub receiver_id: i64,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub is_read: bool,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Message::from_server(
            record.id,
            record.sender_id,
            record.receiver_id,
            record.content,
            record.timestamp,
            record.is_read,
        )
    }
}
