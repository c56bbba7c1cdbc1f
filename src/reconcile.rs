// Pure merge and denormalization logic. No I/O, no locking: the cache store
// calls into this module while holding its own lock, and tests drive it
// directly with plain values.

use crate::models::{Chat, LastMessage, Message};

/// Stable ascending sort by timestamp. Equal timestamps keep their
/// existing relative order, so an optimistic record and its confirmation
/// cannot leapfrog each other.
pub fn sort_messages(messages: &mut [Message]) {
    messages.sort_by_key(|m| m.timestamp);
}

/// Drop duplicate message ids, first occurrence wins.
pub fn dedupe_messages(messages: Vec<Message>) -> Vec<Message> {
    let mut seen = std::collections::HashSet::with_capacity(messages.len());
    messages
        .into_iter()
        .filter(|m| seen.insert(m.id.clone()))
        .collect()
}

/// Drop duplicate chat ids, first occurrence wins. Ordering is left to the
/// presentation layer; this only guarantees uniqueness.
pub fn dedupe_chats(chats: Vec<Chat>) -> Vec<Chat> {
    let mut seen = std::collections::HashSet::with_capacity(chats.len());
    chats
        .into_iter()
        .filter(|c| seen.insert(c.id.clone()))
        .collect()
}

/// The newest message by timestamp, if any.
pub fn newest_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().max_by_key(|m| m.timestamp)
}

/// Recompute a chat's denormalized last-message fields from its cached
/// message list. An empty list is a no-op: a server-provided summary stays
/// in place until messages are actually cached for the chat.
pub fn refresh_chat_summary(chat: &mut Chat, messages: &[Message]) {
    if let Some(newest) = newest_message(messages) {
        chat.last_message = Some(LastMessage {
            id: newest.id.clone(),
            text: newest.text.clone().unwrap_or_default(),
            timestamp: newest.timestamp,
        });
        chat.last_message_date = newest.timestamp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageStatus;
    use chrono::{TimeZone, Utc};

    fn message(id: &str, millis: i64) -> Message {
        Message {
            id: id.to_string(),
            chat_id: "c1".to_string(),
            sender_id: "u1".to_string(),
            text: Some(format!("message {}", id)),
            image_url: None,
            file_url: None,
            timestamp: Utc.timestamp_millis_opt(millis).unwrap(),
            is_read: false,
            status: MessageStatus::Sent,
        }
    }

    fn chat(id: &str) -> Chat {
        Chat {
            id: id.to_string(),
            participants: vec!["u1".to_string(), "u2".to_string()],
            last_message: None,
            last_message_date: Utc.timestamp_millis_opt(0).unwrap(),
            unread_count: 0,
            is_pinned: false,
            created_at: Utc.timestamp_millis_opt(0).unwrap(),
        }
    }

    #[test]
    fn sort_is_ascending_and_stable() {
        let mut list = vec![message("a", 300), message("b", 100), message("c", 100)];
        sort_messages(&mut list);
        let ids: Vec<&str> = list.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let list = vec![message("a", 100), message("a", 999), message("b", 200)];
        let deduped = dedupe_messages(list);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].timestamp.timestamp_millis(), 100);
    }

    #[test]
    fn dedupe_chats_keeps_first_occurrence() {
        let chats = dedupe_chats(vec![chat("c1"), chat("c2"), chat("c1")]);
        let ids: Vec<&str> = chats.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c1", "c2"]);
    }

    #[test]
    fn summary_tracks_newest_message() {
        let mut c = chat("c1");
        let list = vec![message("a", 100), message("b", 300), message("c", 200)];
        refresh_chat_summary(&mut c, &list);
        let last = c.last_message.expect("summary should be set");
        assert_eq!(last.id, "b");
        assert_eq!(c.last_message_date.timestamp_millis(), 300);
    }

    #[test]
    fn summary_untouched_for_empty_list() {
        let mut c = chat("c1");
        c.last_message = Some(LastMessage {
            id: "server".to_string(),
            text: "from the chat list".to_string(),
            timestamp: Utc.timestamp_millis_opt(500).unwrap(),
        });
        c.last_message_date = Utc.timestamp_millis_opt(500).unwrap();
        refresh_chat_summary(&mut c, &[]);
        assert_eq!(c.last_message.as_ref().unwrap().id, "server");
        assert_eq!(c.last_message_date.timestamp_millis(), 500);
    }

    #[test]
    fn textless_newest_message_projects_empty_text() {
        let mut c = chat("c1");
        let mut img = message("a", 100);
        img.text = None;
        img.image_url = Some("http://example.com/a.png".to_string());
        refresh_chat_summary(&mut c, &[img]);
        assert_eq!(c.last_message.as_ref().unwrap().text, "");
    }
}
