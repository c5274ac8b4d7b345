use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{event, Level};

use crate::{errors::ApiError, state::AppState};

/// Tokens stay valid for 30 days from issuance.
pub const TOKEN_LIFETIME_DAYS: i64 = 30;

/// The only message an auth failure ever shows to the client.
pub const UNAUTHORIZED_MESSAGE: &str = "unauthorized access";

#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("no authorization header")]
    MissingHeader,

    #[error("authorization header is not valid text")]
    MalformedHeader,

    #[error("token rejected: {0}")]
    InvalidToken(String),
}

/// Token body: whatever object the caller asked to sign, plus the timestamps we add.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Claims {
    #[serde(flatten)]
    pub payload: Map<String, Value>,
    pub iat: i64,
    pub exp: i64,
}

/// Decoded token payload of the caller, attached to the request by the middleware.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub payload: Map<String, Value>,
}

impl Principal {
    pub fn email(&self) -> Option<&str> {
        self.payload.get("email").and_then(Value::as_str)
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Principal {
            payload: claims.payload,
        }
    }
}

/// Issues and verifies HS256 bearer tokens with one shared secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        TokenService {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue(&self, payload: Map<String, Value>) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_at(payload, Utc::now())
    }

    pub fn issue_at(
        &self,
        mut payload: Map<String, Value>,
        issued_at: DateTime<Utc>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        payload.remove("iat");
        payload.remove("exp");

        let claims = Claims {
            payload,
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::days(TOKEN_LIFETIME_DAYS)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(format!("{}", e)))
    }
}

pub async fn authentication_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())?;
    let claims = state.token_service.verify(token)?;

    event!(Level::DEBUG, "Auth middleware successful!");
    request.extensions_mut().insert(Principal::from(claims));

    Ok(next.run(request).await)
}

// Takes the final part of 'Bearer <token>'.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers.get(AUTHORIZATION).ok_or(AuthError::MissingHeader)?;
    let header = header.to_str().map_err(|_| AuthError::MalformedHeader)?;

    header
        .split_whitespace()
        .last()
        .ok_or_else(|| AuthError::InvalidToken(String::from("empty authorization header")))
}
