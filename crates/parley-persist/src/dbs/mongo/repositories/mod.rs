pub mod conversation;

pub use conversation::MongoConversationStore;
