//! In-memory transcript of the current session.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSender {
    Client,
    Avatar,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub id: u64,
    pub sender: MessageSender,
    pub content: String,
}

/// Message list built from streamed transcript chunks.
///
/// Consecutive chunks from the sender who is still talking extend the last
/// message; an end-of-message event closes it so the next chunk starts a new
/// one.
#[derive(Debug, Clone, Default)]
pub struct MessageHistory {
    messages: Vec<ChatMessage>,
    current_sender: Option<MessageSender>,
    next_id: u64,
}

impl MessageHistory {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn handle_user_talking_message(&mut self, chunk: &str) {
        self.append(MessageSender::Client, chunk);
    }

    pub fn handle_streaming_talking_message(&mut self, chunk: &str) {
        self.append(MessageSender::Avatar, chunk);
    }

    pub fn handle_end_message(&mut self) {
        self.current_sender = None;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.current_sender = None;
    }

    fn append(&mut self, sender: MessageSender, chunk: &str) {
        if self.current_sender == Some(sender) {
            if let Some(last) = self.messages.last_mut() {
                last.content.push_str(chunk);
                return;
            }
        }
        self.current_sender = Some(sender);
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id: self.next_id,
            sender,
            content: chunk.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_from_same_sender_are_joined() {
        let mut history = MessageHistory::default();
        history.handle_user_talking_message("Привет, ");
        history.handle_user_talking_message("как дела?");
        history.handle_streaming_talking_message("Хорошо");

        let messages = history.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, MessageSender::Client);
        assert_eq!(messages[0].content, "Привет, как дела?");
        assert_eq!(messages[1].sender, MessageSender::Avatar);
        assert_eq!(messages[1].content, "Хорошо");
    }

    #[test]
    fn test_end_message_starts_a_new_entry() {
        let mut history = MessageHistory::default();
        history.handle_streaming_talking_message("First.");
        history.handle_end_message();
        history.handle_streaming_talking_message("Second.");

        let messages = history.messages();
        assert_eq!(messages.len(), 2);
        assert_ne!(messages[0].id, messages[1].id);
        assert_eq!(messages[1].content, "Second.");
    }

    #[test]
    fn test_clear_empties_history() {
        let mut history = MessageHistory::default();
        history.handle_user_talking_message("hello");
        history.clear();
        assert!(history.messages().is_empty());

        // A chunk after clearing never extends a dropped message.
        history.handle_user_talking_message("again");
        assert_eq!(history.messages().len(), 1);
        assert_eq!(history.messages()[0].content, "again");
    }
}
