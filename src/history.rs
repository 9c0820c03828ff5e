//! Ordered list of displayed messages

use crate::types::{Message, MessageId, Sender};

/// Text shown while a reply is pending
pub const PLACEHOLDER_TEXT: &str = "...";

/// Displayed messages, oldest first
#[derive(Debug, Clone, Default)]
pub struct MessageList {
    messages: Vec<Message>,
    last_id: MessageId,
}

impl MessageList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id from the wall clock, bumped so ids never repeat or go back.
    fn next_id(&mut self) -> MessageId {
        let now = chrono::Utc::now().timestamp_millis();
        self.last_id = now.max(self.last_id + 1);
        self.last_id
    }

    /// Add a message and return its id
    pub fn push(&mut self, sender: Sender, text: impl Into<String>) -> MessageId {
        let id = self.next_id();
        self.messages.push(Message {
            id,
            text: text.into(),
            sender,
        });
        id
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> MessageId {
        self.push(Sender::User, text)
    }

    pub fn push_bot(&mut self, text: impl Into<String>) -> MessageId {
        self.push(Sender::Bot, text)
    }

    /// First phase of a turn: show a bot placeholder.
    pub fn append_pending(&mut self) -> MessageId {
        self.push_bot(PLACEHOLDER_TEXT)
    }

    /// Replace the text of a pending message in place.
    ///
    /// Falls back to appending a new bot message when the placeholder is
    /// gone, so a reply is never lost.
    pub fn resolve(&mut self, id: MessageId, text: impl Into<String>) -> MessageId {
        let text = text.into();
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.text = text;
                id
            }
            None => self.push_bot(text),
        }
    }

    /// Drop a message. Returns whether it was present.
    pub fn remove(&mut self, id: MessageId) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.id != id);
        self.messages.len() != before
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
