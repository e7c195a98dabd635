//! Bearer-token authentication. Tokens are issued elsewhere; this layer
//! only resolves a presented token to the caller it was issued for,
//! consulting the redis cache first and falling back to the store.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use warp::Filter;

use models::errors::{PortalError, PortalResult};
use models::user::AuthContext;
use storage::{PortalStorage, RedisCache};

use crate::handlers::ApiError;

/// Resolves a bearer token to its caller. A trait seam so route tests can
/// plug in a fixed verifier.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> PortalResult<AuthContext>;
}

/// Store-backed verifier with a best-effort redis read-through.
pub struct SessionVerifier {
    store: Arc<dyn PortalStorage>,
    cache: RedisCache,
}

impl SessionVerifier {
    pub fn new(store: Arc<dyn PortalStorage>, cache: RedisCache) -> Self {
        SessionVerifier { store, cache }
    }
}

#[async_trait]
impl TokenVerifier for SessionVerifier {
    async fn verify(&self, token: &str) -> PortalResult<AuthContext> {
        if let Some(session) = self.cache.get_session(token).await {
            return Ok(session.context);
        }
        let session = self
            .store
            .get_session(token)
            .await?
            .ok_or_else(|| PortalError::Auth("unknown or expired token".to_string()))?;
        if let Err(e) = self.cache.put_session(&session).await {
            debug!("[AUTH] session cache write failed: {}", e);
        }
        Ok(session.context)
    }
}

/// Extracts the caller from the `Authorization: Bearer <token>` header,
/// rejecting with a 401 when it is missing or does not resolve.
pub fn with_auth(
    verifier: Arc<dyn TokenVerifier>,
) -> impl Filter<Extract = (AuthContext,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(
        move |header: Option<String>| {
            let verifier = verifier.clone();
            async move {
                let token = header
                    .as_deref()
                    .and_then(bearer_token)
                    .ok_or_else(|| {
                        warp::reject::custom(ApiError(PortalError::Auth(
                            "missing bearer token".to_string(),
                        )))
                    })?;
                verifier
                    .verify(token)
                    .await
                    .map_err(|e| warp::reject::custom(ApiError(e)))
            }
        },
    )
}

fn bearer_token(header: &str) -> Option<&str> {
    let rest = header.strip_prefix("Bearer ").or_else(|| header.strip_prefix("bearer "))?;
    let rest = rest.trim();
    if rest.is_empty() {
        None
    } else {
        Some(rest)
    }
}
