//! Resolving the caller's identity from the `X-API-Token` header

use crate::api::error::ApiError;
use crate::api::rest::AppState;
use crate::config::SharedConfig;
use crate::service::Identity;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::collections::HashMap;
use std::sync::Arc;

pub const API_TOKEN_HEADER: &str = "x-api-token";

/// Maps an API token to the username it was issued to
pub trait IdentityProvider: Send + Sync {
    fn resolve(&self, token: &str) -> Option<String>;
}

/// Tokens from the `api_tokens` setting; picks up changes on reload
pub struct ConfigTokens {
    config: SharedConfig,
}

impl ConfigTokens {
    pub fn new(config: SharedConfig) -> Self {
        Self { config }
    }
}

impl IdentityProvider for ConfigTokens {
    fn resolve(&self, token: &str) -> Option<String> {
        self.config.token_owner(token)
    }
}

/// Fixed token table
#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    tokens: HashMap<String, String>,
}

impl StaticTokens {
    pub fn with_token(mut self, token: impl Into<String>, username: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), username.into());
        self
    }
}

impl IdentityProvider for StaticTokens {
    fn resolve(&self, token: &str) -> Option<String> {
        self.tokens.get(token).cloned()
    }
}

/// Extractor for the authenticated caller
pub struct AuthUser(pub Identity);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(API_TOKEN_HEADER)
            .ok_or(ApiError::MissingToken)?
            .to_str()
            .map_err(|_| ApiError::InvalidToken)?;

        let username = state.identities.resolve(token).ok_or_else(|| {
            tracing::debug!("rejected unknown api token");
            ApiError::InvalidToken
        })?;

        let identity = Identity::new(username).map_err(|_| ApiError::InvalidToken)?;
        Ok(AuthUser(identity))
    }
}
