//! Unread tracking
//!
//! A message is unread for the local user when it was addressed to them,
//! has not been read, and was not sent by them.

use crate::conversation::{Conversation, ConversationIndex};
use crate::models::Message;

pub fn is_unread_for(message: &Message, local_user_id: i64) -> bool {
    message.receiver_id == local_user_id && !message.is_read && message.sender_id != local_user_id
}

/// Unread messages in one conversation
pub fn unread_count(conversation: &Conversation, local_user_id: i64) -> usize {
    conversation
        .messages()
        .iter()
        .filter(|m| is_unread_for(m, local_user_id))
        .count()
}

/// Badge count: unread messages summed over every conversation
pub fn global_unread_count(index: &ConversationIndex, local_user_id: i64) -> usize {
    index.iter().map(|c| unread_count(c, local_user_id)).sum()
}

/// Flip every message addressed to the local user as read.
///
/// Returns how many messages changed; a second call returns zero.
pub fn mark_read(conversation: &mut Conversation, local_user_id: i64) -> usize {
    let mut flipped = 0;
    for message in conversation.messages_mut() {
        if message.receiver_id == local_user_id && !message.is_read {
            message.is_read = true;
            flipped += 1;
        }
    }
    flipped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: i64, sender: i64, receiver: i64, read: bool) -> Message {
        Message::from_server(id, sender, receiver, "x", "2024-01-01T10:00:00Z", read)
    }

    fn sample() -> Vec<Message> {
        vec![
            msg(1, 7, 9, false),
            msg(2, 9, 7, false),
            msg(3, 9, 7, true),
            msg(4, 4, 7, false),
            msg(5, 4, 7, false),
            msg(6, 7, 4, false),
        ]
    }

    #[test]
    fn test_own_messages_never_unread() {
        let own = msg(1, 7, 9, false);
        assert!(!is_unread_for(&own, 7));

        // Self-addressed notes still do not count.
        let note = msg(2, 7, 7, false);
        assert!(!is_unread_for(&note, 7));
    }

    #[test]
    fn test_per_conversation_counts() {
        let index = ConversationIndex::build(sample(), 7);
        assert_eq!(unread_count(index.get(9).unwrap(), 7), 1);
        assert_eq!(unread_count(index.get(4).unwrap(), 7), 2);
    }

    #[test]
    fn test_global_equals_flat_predicate() {
        let messages = sample();
        let flat = messages.iter().filter(|m| is_unread_for(m, 7)).count();
        let index = ConversationIndex::build(messages, 7);

        assert_eq!(global_unread_count(&index, 7), 3);
        assert_eq!(global_unread_count(&index, 7), flat);
    }

    #[test]
    fn test_mark_read_is_idempotent() {
        let mut index = ConversationIndex::build(sample(), 7);
        let conversation = index.get_mut(4).unwrap();

        assert_eq!(mark_read(conversation, 7), 2);
        assert_eq!(unread_count(conversation, 7), 0);
        assert_eq!(mark_read(conversation, 7), 0);
        assert_eq!(unread_count(conversation, 7), 0);

        // The outgoing message is not the receiver's to mark.
        let outgoing = conversation.messages().iter().find(|m| m.sender_id == 7).unwrap();
        assert!(!outgoing.is_read);
    }
}
