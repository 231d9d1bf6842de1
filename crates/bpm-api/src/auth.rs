//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs signed with the shared `JWT_SECRET`. The verified
//! claims become the [`Identity`] every operation receives explicitly.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use bpm_core::{Error, Identity, IdentityResolver, Result};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;

pub type SharedResolver = Arc<dyn IdentityResolver>;

/// JWT claims carried by admin tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub username: String,
    pub user_id: i64,
    /// 0 marks a global administrator.
    pub organization_id: i64,
    pub exp: u64,
}

/// Verifies HS256 tokens against a shared secret.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 30;
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl IdentityResolver for JwtVerifier {
    fn resolve(&self, credential: &str) -> Result<Identity> {
        let data = decode::<Claims>(credential, &self.key, &self.validation)
            .map_err(|e| Error::Unauthorized(format!("invalid token: {}", e)))?;
        let claims = data.claims;

        if claims.organization_id < 0 {
            return Err(Error::Unauthorized(format!(
                "invalid organization_id {}",
                claims.organization_id
            )));
        }
        let username = if claims.username.trim().is_empty() {
            claims.sub.unwrap_or_default()
        } else {
            claims.username
        };
        Ok(Identity::new(username, claims.user_id, claims.organization_id))
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct Caller(pub Identity);

fn bearer_token(parts: &Parts) -> Result<&str> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| Error::Unauthorized("missing Authorization header".to_string()))?;
    let value = header
        .to_str()
        .map_err(|_| Error::Unauthorized("malformed Authorization header".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::Unauthorized("expected a Bearer token".to_string()))
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    SharedResolver: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> std::result::Result<Self, ApiError> {
        let resolver = SharedResolver::from_ref(state);
        let identity = bearer_token(parts).and_then(|token| resolver.resolve(token));
        match identity {
            Ok(identity) => Ok(Caller(identity)),
            Err(e) => {
                debug!(
                    subsystem = "api",
                    component = "auth",
                    path = %parts.uri.path(),
                    error = %e,
                    "Request not authenticated"
                );
                Err(ApiError(e))
            }
        }
    }
}
