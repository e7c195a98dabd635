//! Fixed-window per-IP rate limiting. A window is one minute; once a
//! client exhausts its allowance the remaining requests in that window
//! are answered with 429.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::warn;
use tokio::sync::Mutex;
use warp::Filter;

use crate::handlers::RateLimited;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Clone)]
pub struct RateLimiter {
    limit: u32,
    windows: Arc<Mutex<HashMap<IpAddr, Window>>>,
}

impl RateLimiter {
    pub fn new(limit: u32) -> Self {
        RateLimiter {
            limit,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Records a request from `ip` and reports whether it is still within
    /// this window's allowance.
    pub async fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now()).await
    }

    async fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut windows = self.windows.lock().await;
        // Drop expired windows so the map does not grow with every
        // distinct client IP ever seen.
        windows.retain(|_, w| now.duration_since(w.started) < WINDOW);
        let window = windows.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });
        window.count += 1;
        window.count <= self.limit
    }

    #[cfg(test)]
    async fn tracked_clients(&self) -> usize {
        self.windows.lock().await.len()
    }
}

/// Warp filter that rejects over-limit requests before they reach any
/// handler. Requests with no resolvable peer address share one bucket.
pub fn with_rate_limit(
    limiter: RateLimiter,
) -> impl Filter<Extract = (), Error = warp::Rejection> + Clone {
    warp::addr::remote()
        .and_then(move |addr: Option<SocketAddr>| {
            let limiter = limiter.clone();
            async move {
                let ip = addr
                    .map(|a| a.ip())
                    .unwrap_or(IpAddr::from([0, 0, 0, 0]));
                if limiter.check(ip).await {
                    Ok(())
                } else {
                    warn!("[RATE] throttling {}", ip);
                    Err(warp::reject::custom(RateLimited))
                }
            }
        })
        .untuple_one()
}
