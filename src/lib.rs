/// Circl Inbox Client Library
/// Conversation grouping, unread tracking, optimistic sends and background
/// polling for the Circl direct-message API

pub mod api;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod error;
pub mod forum;
pub mod inbox;
pub mod models;
pub mod services;
pub mod storage;
pub mod timefmt;
pub mod unread;

pub use config::Session;
pub use conversation::{Conversation, ConversationIndex};
pub use error::{ClientError, Result};
pub use inbox::{ConversationSummary, Inbox};
pub use services::{Messenger, Refresher};
