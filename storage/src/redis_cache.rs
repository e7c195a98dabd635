use std::sync::Arc;

use log::{debug, warn};
use redis::AsyncCommands;
use tokio::sync::Mutex;

use models::errors::PortalResult;

use crate::portal_storage::Session;

const SESSION_TTL_SECS: u64 = 900;

/// Best-effort session cache in front of the store. Every failure path
/// degrades to a cache miss; the portal never depends on redis for
/// correctness, and adjudication never reads through it.
#[derive(Clone)]
pub struct RedisCache {
    connection: Option<Arc<Mutex<redis::aio::MultiplexedConnection>>>,
}

impl RedisCache {
    /// Connects if a URL is configured; otherwise (or on any connect
    /// failure) returns a no-op cache.
    pub async fn connect(redis_url: Option<&str>) -> Self {
        let Some(url) = redis_url else {
            debug!("[CACHE] no redis URL configured, running without cache");
            return RedisCache { connection: None };
        };
        let client = match redis::Client::open(url) {
            Ok(c) => c,
            Err(e) => {
                warn!("[CACHE] bad redis URL, running without cache: {}", e);
                return RedisCache { connection: None };
            }
        };
        match client.get_multiplexed_async_connection().await {
            Ok(conn) => RedisCache {
                connection: Some(Arc::new(Mutex::new(conn))),
            },
            Err(e) => {
                warn!("[CACHE] redis unavailable, running without cache: {}", e);
                RedisCache { connection: None }
            }
        }
    }

    pub fn disabled() -> Self {
        RedisCache { connection: None }
    }

    fn key(token: &str) -> String {
        format!("session:{}", token)
    }

    pub async fn get_session(&self, token: &str) -> Option<Session> {
        let conn = self.connection.as_ref()?;
        let mut conn = conn.lock().await;
        let raw: Option<String> = match conn.get(Self::key(token)).await {
            Ok(v) => v,
            Err(e) => {
                debug!("[CACHE] session read failed, treating as miss: {}", e);
                return None;
            }
        };
        raw.and_then(|s| serde_json::from_str(&s).ok())
    }

    pub async fn put_session(&self, session: &Session) -> PortalResult<()> {
        let Some(conn) = self.connection.as_ref() else {
            return Ok(());
        };
        let raw = serde_json::to_string(session)?;
        let mut conn = conn.lock().await;
        if let Err(e) = conn
            .set_ex::<_, _, ()>(Self::key(&session.token), raw, SESSION_TTL_SECS)
            .await
        {
            debug!("[CACHE] session write failed, skipping: {}", e);
        }
        Ok(())
    }
}
