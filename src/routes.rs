use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Json, Path, Query, State,
    },
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Extension, Router,
};
use serde_json::{Map, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{event, Level};

use crate::{
    auth::{self, Principal},
    domain::{ListingAttributes, ListingId},
    dtos::{DeleteResponse, InsertOneResponse, ListingResponse, TokenResponse, UpdateResponse},
    errors::ApiError,
    query::{FindWindow, ListingFilter, ListingParams},
    state::AppState,
};

type ListingsResult = Result<Json<Vec<ListingResponse>>, ApiError>;

pub fn router(state: Arc<AppState>) -> Router {
    let require_token = || from_fn_with_state(state.clone(), auth::authentication_middleware);

    // route_layer only wraps the methods registered before it, so reads stay public.
    Router::new()
        .route("/", get(index))
        .route("/jwt", post(issue_token))
        .route(
            "/products",
            post(create_listing)
                .route_layer(require_token())
                .get(get_listings),
        )
        .route(
            "/products/{id}",
            put(upsert_listing)
                .delete(delete_listing)
                .route_layer(require_token())
                .get(get_listing),
        )
        .route("/products/toy-name/{text}", get(search_by_name))
        .route("/products/category/{text}", get(search_by_category))
        .route(
            "/added-toys",
            get(get_added_listings).route_layer(require_token()),
        )
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

pub async fn index() -> &'static str {
    "server is running"
}

pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(payload) = payload?;
    let token = state.token_service.issue(payload)?;
    Ok(Json(TokenResponse { token }))
}

/// One page of listings, `page`/`limit` plus optional `sort`/`asc`.
pub async fn get_listings(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListingParams>, QueryRejection>,
) -> ListingsResult {
    let Query(params) = params?;
    let window = FindWindow::page(params.pagination()?, params.sort_key()?);
    find_listings(&state, ListingFilter::All, window).await
}

pub async fn get_listing(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ListingResponse>, ApiError> {
    let id = ListingId::parse(&id)?;

    match state.listing_repository.find_one(id).await? {
        Some(listing) => Ok(Json(ListingResponse::from(listing))),
        None => Err(ApiError::NotFound(id)),
    }
}

pub async fn search_by_name(
    State(state): State<Arc<AppState>>,
    Path(text): Path<String>,
) -> ListingsResult {
    let filter = ListingFilter::NameContains(text);
    find_listings(&state, filter, FindWindow::default()).await
}

pub async fn search_by_category(
    State(state): State<Arc<AppState>>,
    Path(text): Path<String>,
) -> ListingsResult {
    let filter = ListingFilter::CategoryContains(text);
    find_listings(&state, filter, FindWindow::default()).await
}

/// Seller dashboard. Without `email` this returns every seller's listings.
pub async fn get_added_listings(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListingParams>, QueryRejection>,
) -> ListingsResult {
    let Query(params) = params?;
    let window = FindWindow::sorted(params.sort_key()?);
    find_listings(&state, params.owner_filter(), window).await
}

pub async fn create_listing(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    attributes: Result<Json<ListingAttributes>, JsonRejection>,
) -> Result<(StatusCode, Json<InsertOneResponse>), ApiError> {
    let Json(attributes) = attributes?;
    let attributes = attributes.with_default_seller(principal.email());

    let outcome = state.listing_repository.insert(attributes).await?;
    event!(
        Level::INFO,
        listing_id = %outcome.id,
        seller = principal.email().unwrap_or_default(),
        "listing added"
    );

    Ok((StatusCode::CREATED, Json(InsertOneResponse::from(outcome))))
}

pub async fn upsert_listing(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    attributes: Result<Json<ListingAttributes>, JsonRejection>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let id = ListingId::parse(&id)?;
    let Json(attributes) = attributes?;
    let attributes = attributes.with_default_seller(principal.email());

    let outcome = state.listing_repository.upsert(id, attributes).await?;
    Ok(Json(UpdateResponse::from(outcome)))
}

pub async fn delete_listing(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = ListingId::parse(&id)?;
    let outcome = state.listing_repository.delete(id).await?;
    Ok(Json(DeleteResponse::from(outcome)))
}

async fn find_listings(state: &AppState, filter: ListingFilter, window: FindWindow) -> ListingsResult {
    let listings = state.listing_repository.find(&filter, &window).await?;
    Ok(Json(listings.into_iter().map(ListingResponse::from).collect()))
}
