use mongodb::{bson::doc, Client, Database};

use crate::dbs::mongo::repositories::MongoConversationStore;
use crate::error::{PersistError, Result};

/// Connected MongoDB handle, created once at startup and shared
///
/// The driver pools its own connections, so clones of the handle can be
/// used from any number of tasks.
#[derive(Clone)]
pub struct MongoDatabase {
    database: Database,
}

impl MongoDatabase {
    /// Connect to MongoDB, select `database` and ping it
    ///
    /// The driver connects lazily, so the ping is what surfaces an
    /// unreachable server here instead of on the first query.
    pub async fn connect(mongodb_uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;

        let database = client.database(database);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;

        tracing::info!(database = %database.name(), "Connected to MongoDB");

        Ok(Self { database })
    }

    /// The selected database; never reconnects
    pub fn handle(&self) -> &Database {
        &self.database
    }

    /// Conversation store over `collection` in this database
    pub fn conversations(&self, collection: &str) -> MongoConversationStore {
        MongoConversationStore::new(self.handle(), collection)
    }
}
