use chrono::Utc;

use crate::models::chat::{ ChatRequest, Role, WireMessage };

/// Appended as its own message when a reply cannot be completed.
pub const FAILURE_NOTICE: &str = "Sorry, there was an error processing your request.";

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: i64,
    pub role: Role,
    pub content: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    ImageAttached {
        id: i64,
        url: String,
    },
    TextAppended {
        id: i64,
        text: String,
    },
    StreamFinished,
    StreamFailed,
}

/// What a successful [`Conversation::submit`] asks the caller to send.
#[derive(Debug, Clone)]
pub struct Submission {
    /// The placeholder message the reply streams into.
    pub assistant_id: i64,
    pub request: ChatRequest,
}

/// Ordered chat history plus the reply currently being streamed.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    streaming: Option<i64>,
    last_id: i64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_greeting(greeting: &str) -> Self {
        let mut conversation = Self::new();
        let id = conversation.next_id();
        conversation.messages.push(Message {
            id,
            role: Role::Assistant,
            content: greeting.to_string(),
            image_url: None,
        });
        conversation
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

    pub fn is_busy(&self) -> bool {
        self.streaming.is_some()
    }

    /// Id of the assistant message a reply is streaming into, if any.
    pub fn streaming_id(&self) -> Option<i64> {
        self.streaming
    }

    /// Starts a new exchange.
    ///
    /// Blank input and input while a reply is streaming are ignored. Otherwise
    /// the user message and an empty assistant placeholder are appended.
    pub fn submit(&mut self, text: &str) -> Option<Submission> {
        let text = text.trim();
        if text.is_empty() || self.is_busy() {
            return None;
        }

        let user_id = self.next_id();
        self.messages.push(Message {
            id: user_id,
            role: Role::User,
            content: text.to_string(),
            image_url: None,
        });
        let request = ChatRequest {
            messages: self.messages
                .iter()
                .map(|m| WireMessage { role: m.role, content: m.content.clone() })
                .collect(),
        };

        let assistant_id = self.next_id();
        self.messages.push(Message {
            id: assistant_id,
            role: Role::Assistant,
            content: String::new(),
            image_url: None,
        });
        self.streaming = Some(assistant_id);

        Some(Submission { assistant_id, request })
    }

    pub fn apply(&mut self, event: ConversationEvent) {
        match event {
            ConversationEvent::ImageAttached { id, url } => {
                if let Some(message) = self.streaming_message(id) {
                    if message.image_url.is_none() {
                        message.image_url = Some(url);
                    }
                }
            }
            ConversationEvent::TextAppended { id, text } => {
                if let Some(message) = self.streaming_message(id) {
                    message.content.push_str(&text);
                }
            }
            ConversationEvent::StreamFinished => {
                self.streaming = None;
            }
            ConversationEvent::StreamFailed => {
                if self.streaming.take().is_some() {
                    let id = self.next_id();
                    self.messages.push(Message {
                        id,
                        role: Role::Assistant,
                        content: FAILURE_NOTICE.to_string(),
                        image_url: None,
                    });
                }
            }
        }
    }

    fn streaming_message(&mut self, id: i64) -> Option<&mut Message> {
        if self.streaming != Some(id) {
            return None;
        }
        self.messages.iter_mut().rev().find(|m| m.id == id)
    }

    /// Millisecond timestamps, bumped so ids stay strictly increasing.
    fn next_id(&mut self) -> i64 {
        let id = Utc::now().timestamp_millis().max(self.last_id + 1);
        self.last_id = id;
        id
    }
}
