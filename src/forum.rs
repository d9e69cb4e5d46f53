//! Forum feed state with optimistic likes
//!
//! A like flips locally before the request goes out. The server's count, when
//! it answers, overwrites the local guess; a failed request puts the post
//! back the way it was.

use crate::error::{ClientError, Result};
use crate::models::ForumPost;

/// What the server said after a like toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeAck {
    pub likes: u32,
    pub liked: Option<bool>,
}

#[derive(Debug, Default)]
pub struct Feed {
    posts: Vec<ForumPost>,
}

impl Feed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posts(&self) -> &[ForumPost] {
        &self.posts
    }

    pub fn post(&self, post_id: i64) -> Option<&ForumPost> {
        self.posts.iter().find(|p| p.id == post_id)
    }

    pub fn replace(&mut self, posts: Vec<ForumPost>) {
        self.posts = posts;
    }

    fn post_mut(&mut self, post_id: i64) -> Result<&mut ForumPost> {
        self.posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or_else(|| ClientError::NotFound(format!("Post {}", post_id)))
    }

    /// Flip the like locally; returns the post's new state
    pub fn toggle_like(&mut self, post_id: i64) -> Result<ForumPost> {
        let post = self.post_mut(post_id)?;
        post.toggle_like();
        Ok(post.clone())
    }

    /// Apply the server's answer to a toggle
    pub fn confirm_like(&mut self, post_id: i64, ack: LikeAck) -> Result<()> {
        let post = self.post_mut(post_id)?;
        post.likes = ack.likes;
        if let Some(liked) = ack.liked {
            post.liked_by_user = liked;
        }
        Ok(())
    }

    /// Undo a toggle whose request failed by restoring `before`.
    ///
    /// Only applies while the post still shows the `optimistic` state; a feed
    /// refresh in the meantime already carries the server's view. Returns
    /// whether the post was restored.
    pub fn revert_like(&mut self, before: &ForumPost, optimistic: &ForumPost) -> bool {
        match self.posts.iter_mut().find(|p| p.id == before.id) {
            Some(post)
                if post.liked_by_user == optimistic.liked_by_user
                    && post.likes == optimistic.likes =>
            {
                post.liked_by_user = before.liked_by_user;
                post.likes = before.likes;
                true
            }
            _ => false,
        }
    }
}
