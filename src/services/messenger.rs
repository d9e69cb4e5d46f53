/// Messenger - coordinates the REST client with local inbox and feed state.
/// All state changes go through the inbox lock in short synchronous sections,
/// so the inbox behaves like a single actor no matter which task drives it.

use crate::api::ServerApi;
use crate::config::{ApiConfig, Session};
use crate::error::{ClientError, Result};
use crate::forum::Feed;
use crate::inbox::{ConversationSummary, Inbox};
use crate::models::{ForumPost, Message, MessageId, NetworkUser};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;

pub struct Messenger {
    api: Arc<ServerApi>,
    inbox: Mutex<Inbox>,
    feed: Mutex<Feed>,
    revision: watch::Sender<u64>,
}

impl Messenger {
    pub fn new(session: Arc<Session>, config: ApiConfig) -> Result<Self> {
        let api = ServerApi::new(session, config)?;
        Ok(Self::with_api(api))
    }

    pub fn with_api(api: ServerApi) -> Self {
        let local_user_id = api.session().user_id;
        let (revision, _) = watch::channel(0);
        Messenger {
            api: Arc::new(api),
            inbox: Mutex::new(Inbox::new(local_user_id)),
            feed: Mutex::new(Feed::new()),
            revision,
        }
    }

    pub fn local_user_id(&self) -> i64 {
        self.api.session().user_id
    }

    /// Revision counter bumped after every visible state change
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// Read access to the inbox; do not hold across an await
    pub async fn inbox(&self) -> MutexGuard<'_, Inbox> {
        self.inbox.lock().await
    }

    pub async fn feed(&self) -> MutexGuard<'_, Feed> {
        self.feed.lock().await
    }

    /// Replace the inbox with the server's full message list.
    ///
    /// Returns `false` when a newer fetch has already been applied. On error
    /// the previous state is untouched.
    pub async fn refresh(&self) -> Result<bool> {
        let ticket = self.inbox.lock().await.issue_fetch();
        let messages = self.api.fetch_messages().await?;
        let count = messages.len();

        let applied = self.inbox.lock().await.apply_fetch(ticket, messages);
        if applied {
            log::debug!("Applied fetch {} with {} messages", ticket, count);
            self.bump();
        }
        Ok(applied)
    }

    /// Reload the network directory used to name conversations
    pub async fn refresh_network(&self) -> Result<usize> {
        let users = self.api.fetch_network().await?;
        let count = users.len();
        self.inbox.lock().await.set_network(users);
        self.bump();
        Ok(count)
    }

    pub async fn refresh_feed(&self) -> Result<usize> {
        let posts = self.api.fetch_feed().await?;
        let count = posts.len();
        self.feed.lock().await.replace(posts);
        self.bump();
        Ok(count)
    }

    /// Send a message, showing it locally before the server answers.
    ///
    /// Blank content fails with `Validation` and nothing is sent. A failed
    /// request leaves the message in the thread marked failed.
    pub async fn send(&self, recipient_id: i64, content: &str) -> Result<MessageId> {
        let staged = self
            .inbox
            .lock()
            .await
            .begin_send(recipient_id, content, Utc::now())?;
        self.bump();
        self.deliver(staged).await
    }

    /// Resend a failed message
    pub async fn retry(&self, pending_id: MessageId) -> Result<MessageId> {
        let staged = self.inbox.lock().await.retry(pending_id)?;
        self.bump();
        self.deliver(staged).await
    }

    /// Drop a failed or unconfirmed send
    pub async fn discard(&self, pending_id: MessageId) -> Result<Message> {
        let removed = self.inbox.lock().await.discard(pending_id)?;
        self.bump();
        Ok(removed)
    }

    async fn deliver(&self, staged: Message) -> Result<MessageId> {
        match self.api.send_message(staged.receiver_id, &staged.content).await {
            Ok(confirmed) => {
                let id = confirmed.as_ref().map(|m| m.id).unwrap_or(staged.id);
                self.inbox.lock().await.confirm_send(staged.id, confirmed);
                self.bump();
                log::info!("Message to {} delivered as {}", staged.receiver_id, id);
                Ok(id)
            }
            Err(e) => {
                log::warn!("Message to {} failed: {}", staged.receiver_id, e);
                self.inbox.lock().await.fail_send(staged.id, e.to_string());
                self.bump();
                Err(e)
            }
        }
    }

    /// Mark a conversation read locally and tell the server in the background.
    ///
    /// The local change is kept even if the server call fails.
    pub async fn mark_read(&self, counterparty_id: i64) -> (usize, JoinHandle<()>) {
        let flipped = self.inbox.lock().await.mark_read(counterparty_id);
        if flipped > 0 {
            self.bump();
        }

        let api = Arc::clone(&self.api);
        let handle = tokio::spawn(async move {
            match api.mark_messages_read(counterparty_id).await {
                Ok(()) => log::debug!("Server marked conversation {} read", counterparty_id),
                Err(e) => log::warn!("Mark read for {} failed: {}", counterparty_id, e),
            }
        });
        (flipped, handle)
    }

    /// Like or unlike a post; the server's count replaces the local guess and
    /// a failed request restores the post as it was before the toggle.
    pub async fn toggle_like(&self, post_id: i64) -> Result<ForumPost> {
        let (before, optimistic) = {
            let mut feed = self.feed.lock().await;
            let before = feed
                .post(post_id)
                .cloned()
                .ok_or_else(|| ClientError::NotFound(format!("Post {}", post_id)))?;
            (before, feed.toggle_like(post_id)?)
        };
        self.bump();

        let outcome = self.api.toggle_like(post_id).await;
        let post = {
            let mut feed = self.feed.lock().await;
            match outcome {
                Ok(ack) => {
                    if let Err(e) = feed.confirm_like(post_id, ack) {
                        log::debug!("Like on post {} confirmed after it left the feed: {}", post_id, e);
                    }
                    Ok(feed.post(post_id).cloned())
                }
                Err(e) => {
                    log::warn!("Like toggle on post {} failed: {}", post_id, e);
                    if !feed.revert_like(&before, &optimistic) {
                        log::debug!("Post {} changed during the request, keeping the feed copy", post_id);
                    }
                    Err(e)
                }
            }
        };
        self.bump();

        post?.ok_or_else(|| ClientError::NotFound(format!("Post {}", post_id)))
    }

    /// Connections matching a search query, for starting a conversation
    pub async fn search_network(&self, query: &str) -> Vec<NetworkUser> {
        self.inbox
            .lock()
            .await
            .search_network(query)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn unread_badge(&self) -> usize {
        self.inbox.lock().await.unread_badge()
    }

    pub async fn summaries(&self) -> Vec<ConversationSummary> {
        self.inbox.lock().await.summaries(Utc::now())
    }

    /// Thread with one counterparty, oldest first
    pub async fn thread(&self, counterparty_id: i64) -> Vec<Message> {
        self.inbox
            .lock()
            .await
            .conversation(counterparty_id)
            .map(|c| c.thread().into_iter().cloned().collect())
            .unwrap_or_default()
    }
}
