//! Inbox state for one messaging screen
//!
//! Holds the conversation index plus the optimistic sends that the server has
//! not yet reflected back. Local mutations (send, mark-read) land here first;
//! each fetch rebuilds the index wholesale and then reconciles the
//! outstanding sends against what the server returned.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

use crate::conversation::{Conversation, ConversationIndex};
use crate::error::{ClientError, Result};
use crate::models::{Delivery, Message, MessageId, NetworkUser};
use crate::unread;

/// How far a server timestamp may trail the local send stamp and still be
/// taken as the echo of that send.
const CLOCK_SKEW_SECS: i64 = 120;

/// One row of the conversation list
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub counterparty: NetworkUser,
    pub preview: String,
    pub unread: usize,
    pub last_activity: Option<DateTime<Utc>>,
    pub relative_time: String,
    /// A send in this conversation failed and has not been retried
    pub has_failed_send: bool,
}

#[derive(Debug)]
pub struct Inbox {
    local_user_id: i64,
    index: ConversationIndex,
    /// Pending ids whose messages live in `index` awaiting reconciliation.
    outstanding: Vec<MessageId>,
    /// Sends confirmed with a body that no fetch has shown yet, each with the
    /// last fetch ticket issued at confirmation time.
    confirmed: Vec<(MessageId, u64)>,
    network: Vec<NetworkUser>,
    issued_fetches: u64,
    last_applied_fetch: Option<u64>,
}

impl Inbox {
    pub fn new(local_user_id: i64) -> Self {
        Inbox {
            local_user_id,
            index: ConversationIndex::new(local_user_id),
            outstanding: Vec::new(),
            confirmed: Vec::new(),
            network: Vec::new(),
            issued_fetches: 0,
            last_applied_fetch: None,
        }
    }

    pub fn local_user_id(&self) -> i64 {
        self.local_user_id
    }

    pub fn index(&self) -> &ConversationIndex {
        &self.index
    }

    pub fn conversation(&self, counterparty_id: i64) -> Option<&Conversation> {
        self.index.get(counterparty_id)
    }

    pub fn network(&self) -> &[NetworkUser] {
        &self.network
    }

    pub fn set_network(&mut self, users: Vec<NetworkUser>) {
        self.network = users;
    }

    pub fn user(&self, user_id: i64) -> Option<&NetworkUser> {
        self.network.iter().find(|u| u.id == user_id)
    }

    /// Connections whose name, username or company contains `query`;
    /// a blank query lists everyone
    pub fn search_network(&self, query: &str) -> Vec<&NetworkUser> {
        self.network.iter().filter(|u| u.matches(query)).collect()
    }

    /// Sends not yet seen in a server fetch, in send order
    pub fn outstanding(&self) -> Vec<&Message> {
        self.outstanding
            .iter()
            .filter_map(|id| self.index.find(*id))
            .collect()
    }

    /// Hand out the ticket for a fetch about to be sent
    pub fn issue_fetch(&mut self) -> u64 {
        self.issued_fetches = self.issued_fetches.max(self.last_applied_fetch.unwrap_or(0)) + 1;
        self.issued_fetches
    }

    /// Replace the index with a fresh server snapshot.
    ///
    /// `ticket` orders overlapping fetches: a snapshot older than the last
    /// applied one is discarded and `false` is returned. Confirmed sends the
    /// snapshot does not contain are kept unless the fetch was issued after
    /// they were confirmed.
    pub fn apply_fetch(&mut self, ticket: u64, messages: Vec<Message>) -> bool {
        if self.last_applied_fetch.is_some_and(|last| ticket <= last) {
            log::debug!(
                "Discarding stale fetch {} (last applied {:?})",
                ticket,
                self.last_applied_fetch
            );
            return false;
        }
        self.last_applied_fetch = Some(ticket);

        let pending: Vec<Message> = self
            .outstanding
            .iter()
            .filter_map(|id| self.index.find(*id).cloned())
            .collect();
        let carried: Vec<(Message, u64)> = self
            .confirmed
            .iter()
            .filter_map(|(id, mark)| self.index.find(*id).cloned().map(|m| (m, *mark)))
            .collect();

        self.index = ConversationIndex::build(messages, self.local_user_id);
        self.outstanding.clear();
        self.confirmed.clear();

        let mut claimed = HashSet::new();
        let mut late = Vec::new();
        for (message, mark) in carried {
            let Some(server_id) = message.id.server_id() else {
                continue;
            };
            claimed.insert(server_id);
            if self.index.find(message.id).is_some() {
                continue;
            }
            if ticket > mark && ticket <= self.issued_fetches {
                log::debug!(
                    "Message {} missing from fetch {} issued after its confirmation",
                    message.id,
                    ticket
                );
                continue;
            }
            late.push((message, mark));
        }

        for message in pending {
            match self.find_echo(&message, &claimed) {
                Some(server_id) => {
                    log::debug!("Send {} reconciled as message {}", message.id, server_id);
                    claimed.insert(server_id);
                }
                None => {
                    self.outstanding.push(message.id);
                    self.index.insert(message);
                }
            }
        }

        for (message, mark) in late {
            log::debug!("Fetch {} predates confirmed message {}, keeping it", ticket, message.id);
            self.confirmed.push((message.id, mark));
            self.index.insert(message);
        }
        true
    }

    /// Server message that corresponds to a local send, if the fetch has it
    fn find_echo(&self, pending: &Message, claimed: &HashSet<i64>) -> Option<i64> {
        let earliest = pending
            .sent_at()
            .map(|at| at - Duration::seconds(CLOCK_SKEW_SECS));

        self.index
            .get(pending.receiver_id)?
            .messages()
            .iter()
            .filter(|m| m.sender_id == pending.sender_id && m.receiver_id == pending.receiver_id)
            .filter(|m| m.content == pending.content)
            .filter(|m| match (earliest, m.sent_at()) {
                (Some(earliest), Some(at)) => at >= earliest,
                _ => false,
            })
            .filter_map(|m| m.id.server_id())
            .find(|id| !claimed.contains(id))
    }

    /// Stage an outgoing message so it shows before the server answers.
    ///
    /// Blank content is rejected and nothing is staged.
    pub fn begin_send(
        &mut self,
        recipient_id: i64,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Message> {
        if content.trim().is_empty() {
            return Err(ClientError::Validation("Cannot send empty message".to_string()));
        }

        let message = Message::outgoing(self.local_user_id, recipient_id, content, now);
        self.outstanding.push(message.id);
        self.index.insert(message.clone());
        Ok(message)
    }

    /// Record a successful send.
    ///
    /// With the stored message echoed back, the optimistic entry is replaced
    /// in place; otherwise it waits for the next fetch as `Sent`.
    pub fn confirm_send(&mut self, pending_id: MessageId, confirmed: Option<Message>) -> bool {
        if !self.outstanding.contains(&pending_id) {
            log::debug!("Send {} already reconciled", pending_id);
            return false;
        }

        match confirmed {
            Some(mut confirmed) => {
                confirmed.delivery = Delivery::Confirmed;
                let server_id = confirmed.id;
                if self.index.find(server_id).is_some() {
                    self.index.remove(pending_id);
                } else if let Some(slot) = self.index.find_mut(pending_id) {
                    *slot = confirmed;
                    self.confirmed.push((server_id, self.issued_fetches));
                }
                self.outstanding.retain(|id| *id != pending_id);
            }
            None => {
                if let Some(slot) = self.index.find_mut(pending_id) {
                    slot.delivery = Delivery::Sent;
                }
            }
        }
        true
    }

    /// Record a failed send; the entry stays visible as failed
    pub fn fail_send(&mut self, pending_id: MessageId, reason: impl Into<String>) -> bool {
        if !self.outstanding.contains(&pending_id) {
            return false;
        }
        match self.index.find_mut(pending_id) {
            Some(slot) => {
                slot.delivery = Delivery::Failed(reason.into());
                true
            }
            None => false,
        }
    }

    /// Move a failed send back to in-flight and hand it out for resending
    pub fn retry(&mut self, pending_id: MessageId) -> Result<Message> {
        let message = self
            .index
            .find_mut(pending_id)
            .filter(|m| matches!(m.delivery, Delivery::Failed(_)))
            .ok_or_else(|| ClientError::NotFound(format!("No failed send {}", pending_id)))?;
        message.delivery = Delivery::Sending;
        Ok(message.clone())
    }

    /// Drop an outstanding send from view
    pub fn discard(&mut self, pending_id: MessageId) -> Result<Message> {
        if !self.outstanding.contains(&pending_id) {
            return Err(ClientError::NotFound(format!("No outstanding send {}", pending_id)));
        }
        self.outstanding.retain(|id| *id != pending_id);
        self.index
            .remove(pending_id)
            .ok_or_else(|| ClientError::NotFound(format!("No outstanding send {}", pending_id)))
    }

    /// Mark a conversation read locally; returns how many messages flipped
    pub fn mark_read(&mut self, counterparty_id: i64) -> usize {
        match self.index.get_mut(counterparty_id) {
            Some(conversation) => unread::mark_read(conversation, self.local_user_id),
            None => 0,
        }
    }

    pub fn unread_count(&self, counterparty_id: i64) -> usize {
        self.index
            .get(counterparty_id)
            .map(|c| unread::unread_count(c, self.local_user_id))
            .unwrap_or(0)
    }

    pub fn unread_badge(&self) -> usize {
        unread::global_unread_count(&self.index, self.local_user_id)
    }

    /// Conversation list rows, most recent first.
    ///
    /// Conversations with a counterparty missing from the network directory
    /// are left out.
    pub fn summaries(&self, now: DateTime<Utc>) -> Vec<ConversationSummary> {
        self.index
            .ordered()
            .into_iter()
            .filter_map(|conversation| {
                let counterparty = self.user(conversation.counterparty_id())?.clone();
                let last = conversation.last_message();
                Some(ConversationSummary {
                    counterparty,
                    preview: last
                        .map(|m| m.content.clone())
                        .unwrap_or_else(|| "No messages".to_string()),
                    unread: unread::unread_count(conversation, self.local_user_id),
                    last_activity: conversation.last_activity(),
                    relative_time: last
                        .map(|m| m.relative_time(now))
                        .unwrap_or_default(),
                    has_failed_send: conversation
                        .messages()
                        .iter()
                        .any(|m| matches!(m.delivery, Delivery::Failed(_))),
                })
            })
            .collect()
    }
}
