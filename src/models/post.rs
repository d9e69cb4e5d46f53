/// Forum post model.

use serde::Deserialize;

use super::int_or_string;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ForumPost {
    #[serde(deserialize_with = "int_or_string")]
    pub id: i64,
    #[serde(deserialize_with = "int_or_string")]
    pub author_id: i64,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub comments: u32,
    #[serde(default)]
    pub liked_by_user: bool,
}

impl ForumPost {
    /// Flip the like state and adjust the counter to match
    pub fn toggle_like(&mut self) {
        self.liked_by_user = !self.liked_by_user;
        if self.liked_by_user {
            self.likes = self.likes.saturating_add(1);
        } else {
            self.likes = self.likes.saturating_sub(1);
        }
    }
}
