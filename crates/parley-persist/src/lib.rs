pub mod models;
pub mod trait_client;
pub mod dbs;
pub mod error;
pub mod builder;

pub use models::{Conversation, ContentBlock, ImageRef, Role, Turn, DEFAULT_MAX_MESSAGES};
pub use trait_client::ConversationStore;
pub use dbs::memory::InMemoryConversationStore;
pub use error::PersistError;
pub use builder::ConversationStoreBuilder;

#[cfg(feature = "mongodb")]
pub use dbs::mongo::{MongoConversationStore, MongoDatabase};
