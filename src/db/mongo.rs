use async_trait::async_trait;
use futures::StreamExt;
use mongodb::{
    Client, Collection,
    bson::{Bson, Document, doc},
    options::ClientOptions,
};

use super::{
    DbError, DbResult, EXPIRATION_FIELD, FILES_COLLECTION, FilesRepo, IDENTIFIER_FIELD,
    IdentifierStream, METADATA_COLLECTION,
};
use crate::config::MongoDbConfig;

/// [`FilesRepo`] backed by the official MongoDB driver.
#[derive(Debug, Clone)]
pub struct MongoFilesRepo {
    client: Client,
    metadata: Collection<Document>,
    files: Collection<Document>,
}

impl MongoFilesRepo {
    /// Build a client from the configured connection string.
    ///
    /// The driver connects lazily, so this only fails on a malformed
    /// connection string or unresolvable SRV record. Use
    /// [`check_connection`](super::check_connection) to verify reachability.
    pub async fn connect(config: &MongoDbConfig) -> DbResult<Self> {
        let mut options = ClientOptions::parse(&config.url).await?;
        options.app_name = Some(crate::APP_NAME.to_string());
        options.connect_timeout = Some(config.timeout());
        options.server_selection_timeout = Some(config.timeout());

        let client = Client::with_options(options)?;
        let database = client.database(&config.database);

        Ok(Self {
            metadata: database.collection(METADATA_COLLECTION),
            files: database.collection(FILES_COLLECTION),
            client,
        })
    }
}

fn identifier_filter(identifiers: &[Bson]) -> Document {
    doc! { IDENTIFIER_FIELD: { "$in": identifiers.to_vec() } }
}

#[async_trait]
impl FilesRepo for MongoFilesRepo {
    async fn ping(&self) -> DbResult<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    async fn find_expired_identifiers(&self, now: f64) -> DbResult<IdentifierStream> {
        let cursor = self
            .metadata
            .find(doc! { EXPIRATION_FIELD: { "$lte": now } })
            .projection(doc! { IDENTIFIER_FIELD: 1, "_id": 0 })
            .await?;

        let identifiers = cursor.filter_map(|record| async move {
            match record {
                Ok(mut record) => match record.remove(IDENTIFIER_FIELD) {
                    Some(identifier) => Some(Ok(identifier)),
                    None => {
                        tracing::warn!(
                            collection = METADATA_COLLECTION,
                            "Skipping expired record without an identifier"
                        );
                        None
                    }
                },
                Err(e) => Some(Err(DbError::from(e))),
            }
        });

        Ok(identifiers.boxed())
    }

    async fn delete_metadata(&self, identifiers: &[Bson]) -> DbResult<u64> {
        let result = self
            .metadata
            .delete_many(identifier_filter(identifiers))
            .await?;
        Ok(result.deleted_count)
    }

    async fn delete_files(&self, identifiers: &[Bson]) -> DbResult<u64> {
        let result = self
            .files
            .delete_many(identifier_filter(identifiers))
            .await?;
        Ok(result.deleted_count)
    }
}
