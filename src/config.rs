/// Configuration for the inbox client.
/// The session is an explicit value handed to each component; nothing here is
/// read from ambient global state.

use crate::error::{ClientError, Result};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Logged-in user context for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub base_url: String,
    pub user_id: i64,
    pub auth_token: Option<String>,
}

impl Session {
    pub fn new(base_url: &str, user_id: i64) -> Self {
        Session {
            base_url: base_url.to_string(),
            user_id,
            auth_token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Parse the base URL, normalised to end in `/` so relative joins keep
    /// any path prefix (e.g. `https://host/api/`).
    pub fn base(&self) -> Result<Url> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = Url::parse(&raw)?;
        if url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "Base URL cannot carry paths: {}",
                self.base_url
            )));
        }
        Ok(url)
    }
}

/// Remote endpoints the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Messages,
    SendMessage,
    MarkRead,
    Network,
    ForumFeed,
    ToggleLike,
}

impl Endpoint {
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Messages => "messages",
            Endpoint::SendMessage => "send_message",
            Endpoint::MarkRead => "mark_messages_read",
            Endpoint::Network => "network",
            Endpoint::ForumFeed => "forum_feed",
            Endpoint::ToggleLike => "toggle_like",
        }
    }
}

/// Whether a request carries the session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthPolicy {
    /// Refuse to send the request without a token.
    Required,
    /// Attach the token when the session has one.
    #[default]
    Optional,
    /// Never attach the token.
    Anonymous,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub timeout: Duration,
    auth: HashMap<Endpoint, AuthPolicy>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            timeout: Duration::from_secs(30),
            auth: HashMap::new(),
        }
    }
}

impl ApiConfig {
    pub fn with_auth(mut self, endpoint: Endpoint, policy: AuthPolicy) -> Self {
        self.auth.insert(endpoint, policy);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn auth_policy(&self, endpoint: Endpoint) -> AuthPolicy {
        self.auth.get(&endpoint).copied().unwrap_or_default()
    }
}

/// Polling cadence for the background refresher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Delay before the first fetch once the inbox becomes active.
    pub initial_delay: Duration,
    pub interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        RefreshConfig {
            initial_delay: Duration::from_secs(1),
            interval: Duration::from_secs(45),
        }
    }
}
