pub mod client;
pub mod repositories;

pub use client::MongoDatabase;
pub use repositories::MongoConversationStore;
