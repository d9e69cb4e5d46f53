/// Network user model.
/// A connection of the local user; used to put a name and avatar on a conversation.

use serde::Deserialize;

use super::int_or_string;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkUser {
    #[serde(deserialize_with = "int_or_string")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
}

impl NetworkUser {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        NetworkUser {
            id,
            name: name.into(),
            username: None,
            company: None,
            profile_image: None,
        }
    }

    /// Case-insensitive match on name, username or company
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        [Some(&self.name), self.username.as_ref(), self.company.as_ref()]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&query))
    }
}
