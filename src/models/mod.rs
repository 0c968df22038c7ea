pub mod conversation;
pub mod message;

pub use conversation::{Conversation, ConversationSummary};
pub use message::{Message, MessageStatus};
