use std::sync::Arc;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::doc,
    options::FindOptions,
    Client, Collection, Database,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{event, instrument, Level};

use crate::{
    domain::{Listing, ListingAttributes, ListingId},
    query::{FindWindow, ListingFilter},
};

#[derive(Debug)]
pub struct MongoDbInitializationInfo {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("mongodb error: {0}")]
    MongoDb(#[from] mongodb::error::Error),

    #[error("listing fields cannot be stored: {0}")]
    Encoding(#[from] mongodb::bson::ser::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsertOutcome {
    pub id: ListingId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpsertOutcome {
    pub matched: u64,
    pub modified: u64,
    /// Set when the id matched nothing and a new listing was created under it.
    pub upserted_id: Option<ListingId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeleteOutcome {
    pub deleted: u64,
}

/// Data access for the listing collection. Every call is one round trip to the store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn find(
        &self,
        filter: &ListingFilter,
        window: &FindWindow,
    ) -> Result<Vec<Listing>, StoreError>;
    async fn find_one(&self, id: ListingId) -> Result<Option<Listing>, StoreError>;
    async fn insert(&self, attributes: ListingAttributes) -> Result<InsertOutcome, StoreError>;
    /// Replaces every listing field of `id`, creating the listing under that id if absent.
    async fn upsert(
        &self,
        id: ListingId,
        attributes: ListingAttributes,
    ) -> Result<UpsertOutcome, StoreError>;
    /// Deleting a missing listing reports zero deleted.
    async fn delete(&self, id: ListingId) -> Result<DeleteOutcome, StoreError>;
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Listings kept in insertion order, which stands in for the store's natural order.
#[derive(Clone, Default)]
pub struct InMemoryListingRepository {
    listings: Arc<Mutex<Vec<Listing>>>,
}

impl InMemoryListingRepository {
    pub fn new() -> Self {
        InMemoryListingRepository::default()
    }
}

#[async_trait]
impl ListingRepository for InMemoryListingRepository {
    async fn find(
        &self,
        filter: &ListingFilter,
        window: &FindWindow,
    ) -> Result<Vec<Listing>, StoreError> {
        let lock = self.listings.lock().await;
        let mut matching: Vec<Listing> = lock
            .iter()
            .filter(|listing| filter.matches(&listing.attributes))
            .cloned()
            .collect();

        if let Some(sort) = window.sort {
            matching.sort_by(|a, b| sort.compare(&a.attributes, &b.attributes));
        }

        let skip = usize::try_from(window.skip).unwrap_or(usize::MAX);
        let limit = window
            .limit
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));

        Ok(matching.into_iter().skip(skip).take(limit).collect())
    }

    async fn find_one(&self, id: ListingId) -> Result<Option<Listing>, StoreError> {
        let lock = self.listings.lock().await;
        Ok(lock.iter().find(|listing| listing.listing_id() == id).cloned())
    }

    async fn insert(&self, attributes: ListingAttributes) -> Result<InsertOutcome, StoreError> {
        let id = ListingId::new();
        let mut lock = self.listings.lock().await;
        lock.push(Listing {
            id: id.object_id(),
            attributes: attributes.without_identity(),
        });
        Ok(InsertOutcome { id })
    }

    async fn upsert(
        &self,
        id: ListingId,
        attributes: ListingAttributes,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut lock = self.listings.lock().await;

        match lock.iter_mut().find(|listing| listing.listing_id() == id) {
            Some(existing) => {
                let before = existing.attributes.clone();
                existing.attributes.replace_fields(attributes);
                Ok(UpsertOutcome {
                    matched: 1,
                    modified: u64::from(before != existing.attributes),
                    upserted_id: None,
                })
            }
            None => {
                let mut created = ListingAttributes::default();
                created.replace_fields(attributes);
                lock.push(Listing {
                    id: id.object_id(),
                    attributes: created,
                });
                Ok(UpsertOutcome {
                    matched: 0,
                    modified: 0,
                    upserted_id: Some(id),
                })
            }
        }
    }

    async fn delete(&self, id: ListingId) -> Result<DeleteOutcome, StoreError> {
        let mut lock = self.listings.lock().await;
        let before = lock.len();
        lock.retain(|listing| listing.listing_id() != id);
        Ok(DeleteOutcome {
            deleted: (before - lock.len()) as u64,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        event!(Level::INFO, "InMemoryListingRepository is always reachable");
        Ok(())
    }
}

#[derive(Clone)]
pub struct MongoDbListingRepository {
    database: Database,
    listing_collection: Collection<Listing>,
}

impl MongoDbListingRepository {
    pub fn new(info: &MongoDbInitializationInfo, client: &Client) -> Self {
        let database = client.database(&info.database);

        MongoDbListingRepository {
            listing_collection: database.collection(&info.collection),
            database,
        }
    }
}

#[async_trait]
impl ListingRepository for MongoDbListingRepository {
    #[instrument(skip(self))]
    async fn find(
        &self,
        filter: &ListingFilter,
        window: &FindWindow,
    ) -> Result<Vec<Listing>, StoreError> {
        let mut options = FindOptions::default();
        options.sort = window.sort.map(|sort| sort.to_document());
        options.skip = (window.skip > 0).then_some(window.skip);
        options.limit = window
            .limit
            .map(|limit| i64::try_from(limit).unwrap_or(i64::MAX));

        let cursor = self
            .listing_collection
            .find(filter.to_document())
            .with_options(options)
            .await?;
        let listings: Vec<Listing> = cursor.try_collect().await?;

        event!(Level::DEBUG, count = listings.len(), "found listings");
        Ok(listings)
    }

    #[instrument(skip(self))]
    async fn find_one(&self, id: ListingId) -> Result<Option<Listing>, StoreError> {
        let listing = self
            .listing_collection
            .find_one(doc! { "_id": id.object_id() })
            .await?;
        Ok(listing)
    }

    #[instrument(skip(self, attributes))]
    async fn insert(&self, attributes: ListingAttributes) -> Result<InsertOutcome, StoreError> {
        let id = ListingId::new();
        let listing = Listing {
            id: id.object_id(),
            attributes: attributes.without_identity(),
        };

        self.listing_collection.insert_one(&listing).await?;

        event!(Level::INFO, listing_id = %id, "listing created");
        Ok(InsertOutcome { id })
    }

    #[instrument(skip(self, attributes))]
    async fn upsert(
        &self,
        id: ListingId,
        attributes: ListingAttributes,
    ) -> Result<UpsertOutcome, StoreError> {
        let replacement = attributes.replacement_document()?;
        let result = self
            .listing_collection
            .update_one(
                doc! { "_id": id.object_id() },
                doc! { "$set": replacement },
            )
            .upsert(true)
            .await?;

        event!(
            Level::INFO,
            listing_id = %id,
            matched = result.matched_count,
            modified = result.modified_count,
            "listing upserted"
        );

        Ok(UpsertOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted_id: result
                .upserted_id
                .and_then(|upserted| upserted.as_object_id())
                .map(ListingId::from),
        })
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: ListingId) -> Result<DeleteOutcome, StoreError> {
        let result = self
            .listing_collection
            .delete_one(doc! { "_id": id.object_id() })
            .await?;

        event!(Level::INFO, listing_id = %id, deleted = result.deleted_count, "listing delete");
        Ok(DeleteOutcome {
            deleted: result.deleted_count,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
