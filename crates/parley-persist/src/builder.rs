use crate::error::{PersistError, Result};

pub const DEFAULT_DATABASE: &str = "slack-gpt";
pub const DEFAULT_COLLECTION: &str = "conversations";

pub struct ConversationStoreBuilder {
    mongodb_uri: Option<String>,
    database: String,
    collection: String,
    ensure_indexes: bool,
}

impl ConversationStoreBuilder {
    pub fn new() -> Self {
        Self {
            mongodb_uri: None,
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            ensure_indexes: true,
        }
    }

    pub fn mongodb_uri(mut self, uri: impl Into<String>) -> Self {
        self.mongodb_uri = Some(uri.into());
        self
    }

    pub fn database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn ensure_indexes(mut self, ensure: bool) -> Self {
        self.ensure_indexes = ensure;
        self
    }

    fn validate(&self) -> Result<&str> {
        let uri = self
            .mongodb_uri
            .as_deref()
            .ok_or_else(|| PersistError::InvalidConfig("mongodb_uri is required".to_string()))?;
        if self.database.is_empty() {
            return Err(PersistError::InvalidConfig("database must not be empty".to_string()));
        }
        if self.collection.is_empty() {
            return Err(PersistError::InvalidConfig("collection must not be empty".to_string()));
        }
        Ok(uri)
    }

    #[cfg(feature = "mongodb")]
    pub async fn build(
        self,
    ) -> Result<(crate::MongoDatabase, crate::MongoConversationStore)> {
        let uri = self.validate()?;
        let database = crate::MongoDatabase::connect(uri, &self.database).await?;
        let store = database.conversations(&self.collection);
        if self.ensure_indexes {
            store.ensure_indexes().await?;
        }
        Ok((database, store))
    }
}

impl Default for ConversationStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
