use serde::{Deserialize, Serialize};

use crate::{
    domain::{Listing, ListingAttributes},
    repositories::{DeleteOutcome, InsertOutcome, UpsertOutcome},
};

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct ListingResponse {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub attributes: ListingAttributes,
}

impl From<Listing> for ListingResponse {
    fn from(listing: Listing) -> Self {
        ListingResponse {
            id: listing.id.to_hex(),
            attributes: listing.attributes,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneResponse {
    pub acknowledged: bool,
    pub inserted_id: String,
}

impl From<InsertOutcome> for InsertOneResponse {
    fn from(outcome: InsertOutcome) -> Self {
        InsertOneResponse {
            acknowledged: true,
            inserted_id: outcome.id.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_count: u64,
    pub upserted_id: Option<String>,
}

impl From<UpsertOutcome> for UpdateResponse {
    fn from(outcome: UpsertOutcome) -> Self {
        UpdateResponse {
            acknowledged: true,
            matched_count: outcome.matched,
            modified_count: outcome.modified,
            upserted_count: u64::from(outcome.upserted_id.is_some()),
            upserted_id: outcome.upserted_id.map(|id| id.to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

impl From<DeleteOutcome> for DeleteResponse {
    fn from(outcome: DeleteOutcome) -> Self {
        DeleteResponse {
            acknowledged: true,
            deleted_count: outcome.deleted,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: bool,
    pub message: String,
}
