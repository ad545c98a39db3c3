//! MongoDB client and collection wrapper
//!
//! Pattern adapted from holo-host/rust/util_libs/db/src/mongodb

use bson::{doc, oid::ObjectId, DateTime, Document};
use futures::{StreamExt, TryStreamExt};
use mongodb::{error::ErrorKind, options::IndexOptions, Client, Collection, IndexModel};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info, warn};

use crate::types::{redact_credentials, TaxonomyError};

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas carrying `createdAt`/`updatedAt`
pub trait Timestamped {
    fn stamp(&mut self, now: DateTime);
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, TaxonomyError> {
        info!("Connecting to MongoDB at {}", redact_credentials(uri));

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri).await.map_err(|e| {
            TaxonomyError::Database(format!(
                "Failed to connect to MongoDB: {}",
                redact_credentials(&e.to_string())
            ))
        })?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| {
                TaxonomyError::Database(format!(
                    "MongoDB ping failed: {}",
                    redact_credentials(&e.to_string())
                ))
            })?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection, applying its indexes
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, TaxonomyError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + Timestamped,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Which documents of an unordered bulk insert were rejected
#[derive(Debug, Clone, Default)]
pub struct BulkInsertReport {
    /// Input positions refused by the server with a per-document write error
    pub failed_indices: Vec<usize>,
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + Timestamped,
{
    /// Create a new collection and apply indexes
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, TaxonomyError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<(), TaxonomyError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| TaxonomyError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, setting timestamps on the caller's copy
    pub async fn insert_one(&self, item: &mut T) -> Result<ObjectId, TaxonomyError> {
        item.stamp(DateTime::now());

        let result = self.inner.insert_one(&*item).await?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| TaxonomyError::Database("Failed to get inserted ID".into()))
    }

    /// Unordered bulk insert. Per-document write errors are reported, not
    /// raised; anything else (network, write concern) fails the whole call.
    pub async fn insert_many_unordered(
        &self,
        items: &mut [T],
    ) -> Result<BulkInsertReport, TaxonomyError> {
        if items.is_empty() {
            return Ok(BulkInsertReport::default());
        }

        let now = DateTime::now();
        for item in items.iter_mut() {
            item.stamp(now);
        }

        match self.inner.insert_many(items.iter()).ordered(false).await {
            Ok(_) => Ok(BulkInsertReport::default()),
            Err(e) => match e.kind.as_ref() {
                ErrorKind::InsertMany(failure) if failure.write_concern_error.is_none() => {
                    let failed_indices: Vec<usize> = failure
                        .write_errors
                        .iter()
                        .flatten()
                        .map(|we| {
                            warn!(
                                "Bulk insert rejected document {} (code {}): {}",
                                we.index, we.code, we.message
                            );
                            we.index
                        })
                        .collect();
                    Ok(BulkInsertReport { failed_indices })
                }
                _ => Err(e.into()),
            },
        }
    }

    /// Find one document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, TaxonomyError> {
        self.inner.find_one(filter).await.map_err(Into::into)
    }

    /// Find many documents by filter, in natural order
    pub async fn find_many(&self, filter: Document) -> Result<Vec<T>, TaxonomyError> {
        let cursor = self.inner.find(filter).await?;
        Self::collect_readable(cursor).await
    }

    /// Sorted, capped find over raw documents. Nothing is decoded, so every
    /// matching document is counted.
    pub async fn find_raw_sorted(
        &self,
        filter: Document,
        sort: Document,
        limit: i64,
    ) -> Result<Vec<Document>, TaxonomyError> {
        let cursor = self
            .inner
            .clone_with_type::<Document>()
            .find(filter)
            .sort(sort)
            .limit(limit)
            .await?;
        cursor.try_collect::<Vec<Document>>().await.map_err(Into::into)
    }

    /// Documents that fail to deserialize are logged and skipped; any other
    /// cursor error fails the read
    async fn collect_readable(mut cursor: mongodb::Cursor<T>) -> Result<Vec<T>, TaxonomyError> {
        let mut items = Vec::new();
        while let Some(next) = cursor.next().await {
            match next {
                Ok(item) => items.push(item),
                Err(e) if is_decode_error(&e) => {
                    error!("Skipping unreadable document: {}", e);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(items)
    }
}

fn is_decode_error(e: &mongodb::error::Error) -> bool {
    matches!(e.kind.as_ref(), ErrorKind::BsonDeserialization(_))
}
