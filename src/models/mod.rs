/// Data models for the Circl inbox client.
/// Defines Message, NetworkUser, ForumPost and their wire records.

pub mod message;
pub mod post;
pub mod user;

pub use message::{Delivery, Message, MessageId, MessageRecord};
pub use post::ForumPost;
pub use user::NetworkUser;

use serde::de::{self, Deserializer};
use serde::Deserialize;

/// Accept an id as either a JSON integer or a numeric string.
///
/// The backend is inconsistent about this across endpoints.
pub(crate) fn int_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(value) => Ok(value),
        Raw::Str(value) => value
            .trim()
            .parse::<i64>()
            .map_err(|_| de::Error::custom(format!("expected numeric id, got {:?}", value))),
    }
}
