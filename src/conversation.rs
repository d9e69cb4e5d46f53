//! Conversation index
//!
//! Groups a flat message list by counterparty. The index is rebuilt from
//! scratch on every successful fetch; between fetches it only grows by
//! optimistic sends.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::models::{Message, MessageId};

/// All messages exchanged with one counterparty
#[derive(Debug, Clone)]
pub struct Conversation {
    counterparty_id: i64,
    /// Insertion (fetch) order, not time order.
    messages: Vec<Message>,
}

impl Conversation {
    fn new(counterparty_id: i64) -> Self {
        Conversation {
            counterparty_id,
            messages: Vec::new(),
        }
    }

    pub fn counterparty_id(&self) -> i64 {
        self.counterparty_id
    }

    /// Messages in the order they were fetched or appended
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages ascending by parsed timestamp, for chat-thread display.
    ///
    /// Unparseable timestamps sort first (oldest). Equal timestamps keep
    /// fetch order.
    pub fn thread(&self) -> Vec<&Message> {
        let mut thread: Vec<&Message> = self.messages.iter().collect();
        thread.sort_by_key(|m| m.sent_at());
        thread
    }

    /// Most recent message, i.e. the last entry of [`Conversation::thread`]
    pub fn last_message(&self) -> Option<&Message> {
        // max_by_key keeps the last of equal maxima, matching the stable sort.
        self.messages.iter().max_by_key(|m| m.sent_at())
    }

    /// Sort key for the conversation list
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_message().and_then(Message::sent_at)
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub(crate) fn messages_mut(&mut self) -> impl Iterator<Item = &mut Message> {
        self.messages.iter_mut()
    }
}

/// Messages grouped by counterparty for one local user
#[derive(Debug, Clone)]
pub struct ConversationIndex {
    local_user_id: i64,
    conversations: Vec<Conversation>,
    positions: HashMap<i64, usize>,
}

impl ConversationIndex {
    pub fn new(local_user_id: i64) -> Self {
        ConversationIndex {
            local_user_id,
            conversations: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Build an index from a full message list
    pub fn build<I>(messages: I, local_user_id: i64) -> Self
    where
        I: IntoIterator<Item = Message>,
    {
        let mut index = ConversationIndex::new(local_user_id);
        for message in messages {
            index.insert(message);
        }
        index
    }

    pub fn local_user_id(&self) -> i64 {
        self.local_user_id
    }

    /// Append a message to its counterparty's conversation
    pub fn insert(&mut self, message: Message) {
        let counterparty = message.counterparty(self.local_user_id);
        let slot = match self.positions.get(&counterparty) {
            Some(&slot) => slot,
            None => {
                self.conversations.push(Conversation::new(counterparty));
                let slot = self.conversations.len() - 1;
                self.positions.insert(counterparty, slot);
                slot
            }
        };
        self.conversations[slot].messages.push(message);
    }

    pub fn get(&self, counterparty_id: i64) -> Option<&Conversation> {
        self.positions
            .get(&counterparty_id)
            .map(|&slot| &self.conversations[slot])
    }

    pub(crate) fn get_mut(&mut self, counterparty_id: i64) -> Option<&mut Conversation> {
        match self.positions.get(&counterparty_id) {
            Some(&slot) => Some(&mut self.conversations[slot]),
            None => None,
        }
    }

    /// Conversations in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.iter()
    }

    /// Conversations for the list view: most recent activity first.
    ///
    /// Conversations with no parseable timestamp sort last. Ties keep
    /// first-seen order; the backend gives no secondary key.
    pub fn ordered(&self) -> Vec<&Conversation> {
        let mut ordered: Vec<&Conversation> = self.conversations.iter().collect();
        ordered.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
        ordered
    }

    /// Every message across all conversations
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.conversations.iter().flat_map(|c| c.messages.iter())
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn message_count(&self) -> usize {
        self.conversations.iter().map(Conversation::len).sum()
    }

    pub fn find(&self, id: MessageId) -> Option<&Message> {
        self.messages().find(|m| m.id == id)
    }

    pub(crate) fn find_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.conversations
            .iter_mut()
            .flat_map(|c| c.messages.iter_mut())
            .find(|m| m.id == id)
    }

    /// Remove a message; an emptied conversation is dropped with it
    pub(crate) fn remove(&mut self, id: MessageId) -> Option<Message> {
        let slot = self
            .conversations
            .iter()
            .position(|c| c.messages.iter().any(|m| m.id == id))?;
        let conversation = &mut self.conversations[slot];
        let at = conversation.messages.iter().position(|m| m.id == id)?;
        let removed = conversation.messages.remove(at);

        if conversation.messages.is_empty() {
            self.conversations.remove(slot);
            self.reindex();
        }
        Some(removed)
    }

    fn reindex(&mut self) {
        self.positions = self
            .conversations
            .iter()
            .enumerate()
            .map(|(slot, c)| (c.counterparty_id, slot))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: i64, sender: i64, receiver: i64, ts: &str) -> Message {
        Message::from_server(id, sender, receiver, format!("m{}", id), ts, false)
    }

    fn ids(messages: &[&Message]) -> Vec<i64> {
        messages.iter().filter_map(|m| m.id.server_id()).collect()
    }

    #[test]
    fn test_groups_by_counterparty() {
        let index = ConversationIndex::build(
            vec![
                msg(1, 7, 9, "2024-01-01T10:00:00Z"),
                msg(2, 9, 7, "2024-01-01T10:01:00Z"),
                msg(3, 4, 7, "2024-01-01T10:02:00Z"),
                msg(4, 7, 4, "2024-01-01T10:03:00Z"),
            ],
            7,
        );

        assert_eq!(index.len(), 2);
        assert_eq!(index.get(9).unwrap().len(), 2);
        assert_eq!(index.get(4).unwrap().len(), 2);
        assert!(index.get(7).is_none());
        assert_eq!(index.message_count(), 4);

        // Every input message lands in exactly one group, nothing added.
        let mut all: Vec<i64> = index.messages().filter_map(|m| m.id.server_id()).collect();
        all.sort_unstable();
        assert_eq!(all, vec![1, 2, 3, 4]);
        for id in 1..=4 {
            let holders = index
                .iter()
                .filter(|c| c.get(MessageId::Server(id)).is_some())
                .count();
            assert_eq!(holders, 1, "message {} should be in one conversation", id);
        }
    }

    #[test]
    fn test_repeated_build_keeps_input_multiset() {
        let input = vec![
            msg(10, 7, 9, "2024-01-01T10:00:00Z"),
            msg(11, 9, 7, "2024-01-01T10:00:00Z"),
            msg(12, 9, 7, "bad"),
            msg(13, 3, 7, "2024-01-01T10:00:00Z"),
        ];
        let mut expected: Vec<i64> = input.iter().filter_map(|m| m.id.server_id()).collect();
        expected.sort_unstable();

        let index = ConversationIndex::build(input, 7);
        let mut grouped: Vec<i64> = index
            .iter()
            .flat_map(|c| c.messages().iter().filter_map(|m| m.id.server_id()))
            .collect();
        grouped.sort_unstable();

        assert_eq!(grouped, expected);
    }

    #[test]
    fn test_thread_is_ascending() {
        let index = ConversationIndex::build(
            vec![
                msg(1, 7, 9, "2024-01-01T10:00:00.000Z"),
                msg(2, 9, 7, "2024-01-01T10:05:00.000Z"),
                msg(3, 9, 7, "2024-01-01T09:00:00.000Z"),
            ],
            7,
        );

        let conversation = index.get(9).unwrap();
        assert_eq!(ids(&conversation.thread()), vec![3, 1, 2]);
        assert_eq!(conversation.last_message().unwrap().id, MessageId::Server(2));
    }

    #[test]
    fn test_ordered_by_last_activity_desc() {
        let index = ConversationIndex::build(
            vec![
                msg(1, 9, 7, "2024-01-01T10:00:00Z"),
                msg(2, 4, 7, "2024-01-02T10:00:00Z"),
                msg(3, 5, 7, "2024-01-01T12:00:00Z"),
            ],
            7,
        );

        let order: Vec<i64> = index.ordered().iter().map(|c| c.counterparty_id()).collect();
        assert_eq!(order, vec![4, 5, 9]);
    }

    #[test]
    fn test_unparseable_sorts_least_recent() {
        let index = ConversationIndex::build(
            vec![
                msg(1, 9, 7, "not-a-time"),
                msg(2, 4, 7, "2020-01-01T00:00:00Z"),
            ],
            7,
        );

        let order: Vec<i64> = index.ordered().iter().map(|c| c.counterparty_id()).collect();
        assert_eq!(order, vec![4, 9]);
    }

    #[test]
    fn test_offset_timestamps_order_by_instant() {
        // String order would put 9 first.
        let index = ConversationIndex::build(
            vec![
                msg(1, 9, 7, "2024-01-01T10:30:00+02:00"),
                msg(2, 4, 7, "2024-01-01T09:00:00Z"),
            ],
            7,
        );

        let order: Vec<i64> = index.ordered().iter().map(|c| c.counterparty_id()).collect();
        assert_eq!(order, vec![4, 9]);
    }

    #[test]
    fn test_ties_keep_fetch_order() {
        let ts = "2024-01-01T10:00:00Z";
        let index = ConversationIndex::build(
            vec![msg(1, 9, 7, ts), msg(2, 4, 7, ts), msg(3, 5, 7, ts)],
            7,
        );

        let order: Vec<i64> = index.ordered().iter().map(|c| c.counterparty_id()).collect();
        assert_eq!(order, vec![9, 4, 5]);
    }

    #[test]
    fn test_remove_drops_empty_conversation() {
        let mut index = ConversationIndex::build(
            vec![msg(1, 9, 7, "2024-01-01T10:00:00Z"), msg(2, 4, 7, "2024-01-01T11:00:00Z")],
            7,
        );

        let removed = index.remove(MessageId::Server(1)).unwrap();
        assert_eq!(removed.sender_id, 9);
        assert!(index.get(9).is_none());
        assert_eq!(index.get(4).unwrap().len(), 1);

        index.insert(msg(3, 9, 7, "2024-01-01T12:00:00Z"));
        assert_eq!(index.get(9).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_index() {
        let index = ConversationIndex::build(Vec::new(), 7);
        assert!(index.is_empty());
        assert!(index.ordered().is_empty());
        assert_eq!(index.local_user_id(), 7);
    }
}
