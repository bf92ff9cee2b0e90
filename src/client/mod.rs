//! Chat client: conversation state, the HTTP transport and the session that
//! streams replies into the conversation.

pub mod session;
pub mod state;
pub mod transport;

pub use session::ChatSession;
pub use state::{ Conversation, ConversationEvent, Message, Submission, FAILURE_NOTICE };
pub use transport::{ ByteStream, ChatTransport, HttpTransport, TransportError };
