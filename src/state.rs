use std::sync::Arc;

use crate::{auth::TokenService, repositories::ListingRepository};

#[derive(Clone)]
pub struct AppState {
    pub listing_repository: Arc<dyn ListingRepository>,
    pub token_service: TokenService,
}

impl AppState {
    pub fn new(listing_repository: Arc<dyn ListingRepository>, token_service: TokenService) -> Self {
        AppState {
            listing_repository,
            token_service,
        }
    }
}
