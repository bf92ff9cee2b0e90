use futures::StreamExt;
use log::warn;
use tokio::sync::watch;

use crate::protocol::decoder::{ DecodedChunk, StreamDecoder };
use super::state::{ Conversation, ConversationEvent, Submission };
use super::transport::{ ByteStream, ChatTransport };

/// Drives a [`Conversation`] against a chat server.
///
/// Every state change is published on a watch channel, so a renderer can
/// follow a reply chunk by chunk.
pub struct ChatSession<T> {
    transport: T,
    state: watch::Sender<Conversation>,
}

impl<T: ChatTransport> ChatSession<T> {
    pub fn new(transport: T, conversation: Conversation) -> Self {
        let (state, _) = watch::channel(conversation);
        Self { transport, state }
    }

    pub fn subscribe(&self) -> watch::Receiver<Conversation> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Conversation {
        self.state.borrow().clone()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends `text` and streams the reply into the conversation.
    ///
    /// Returns `false` without touching the network when the input is blank
    /// or another reply is still streaming.
    pub async fn submit(&self, text: &str) -> bool {
        let mut submission = None;
        self.state.send_if_modified(|conversation| {
            submission = conversation.submit(text);
            submission.is_some()
        });
        let Some(Submission { assistant_id, request }) = submission else {
            return false;
        };

        match self.transport.open(&request).await {
            Ok(body) => self.read_reply(assistant_id, body).await,
            Err(e) => {
                warn!("Chat request failed: {}", e);
                self.apply(ConversationEvent::StreamFailed);
            }
        }
        true
    }

    async fn read_reply(&self, id: i64, mut body: ByteStream) {
        let mut decoder = StreamDecoder::new();

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => self.publish(id, decoder.push(&bytes)),
                Err(e) => {
                    warn!("Reply stream broke off: {}", e);
                    self.publish(id, decoder.finish());
                    self.apply(ConversationEvent::StreamFailed);
                    return;
                }
            }
        }

        self.publish(id, decoder.finish());
        self.apply(ConversationEvent::StreamFinished);
    }

    fn publish(&self, id: i64, chunk: DecodedChunk) {
        if chunk.is_empty() {
            return;
        }
        self.state.send_modify(|conversation| {
            if let Some(url) = chunk.image_url {
                conversation.apply(ConversationEvent::ImageAttached { id, url });
            }
            if !chunk.text.is_empty() {
                conversation.apply(ConversationEvent::TextAppended { id, text: chunk.text });
            }
        });
    }

    fn apply(&self, event: ConversationEvent) {
        self.state.send_modify(|conversation| conversation.apply(event));
    }
}
