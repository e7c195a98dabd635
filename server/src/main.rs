//! AfyaLink portal API server entry point. Wires configuration, storage,
//! services and the warp route tree, then serves until SIGINT/SIGTERM.

mod auth;
mod config;
mod handlers;
mod rate_limit;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use log::{info, warn};
use tokio::signal::unix::{signal, SignalKind};
use uuid::Uuid;

use models::user::{AuthContext, Role};
use portal::{
    AnalyticsService, ClaimsService, EligibilityService, EnrollmentService, MembersService,
};
use storage::{
    InMemoryStorage, PortalStorage, PostgresStorage, RedisCache, Session, StorageKind,
};

use crate::auth::SessionVerifier;
use crate::config::{CliArgs, ServerConfig};
use crate::handlers::Services;
use crate::rate_limit::RateLimiter;

async fn shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!("[SERVER] failed to install SIGTERM handler: {}", e);
            return std::future::pending().await;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            warn!("[SERVER] failed to install SIGINT handler: {}", e);
            return std::future::pending().await;
        }
    };
    tokio::select! {
        _ = sigterm.recv() => info!("[SERVER] received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("[SERVER] received SIGINT, shutting down"),
    }
}

async fn build_store(config: &ServerConfig) -> Result<Arc<dyn PortalStorage>> {
    let store: Arc<dyn PortalStorage> = match config.storage.kind {
        StorageKind::Postgres => Arc::new(
            PostgresStorage::new(&config.storage)
                .await
                .context("failed to open postgres storage")?,
        ),
        StorageKind::Memory => Arc::new(InMemoryStorage::new(&config.storage)),
    };
    store
        .connect()
        .await
        .context("failed to initialize storage")?;
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = CliArgs::parse();
    let config = ServerConfig::load(&args)?;

    let store = build_store(&config).await?;
    info!(
        "[SERVER] storage backend {:?} ready",
        config.storage.kind
    );

    if let Some(token) = &config.bootstrap_admin_token {
        store
            .put_session(Session {
                token: token.clone(),
                context: AuthContext::new(Uuid::new_v4(), Role::Admin),
                created_at: Utc::now(),
            })
            .await
            .context("failed to write bootstrap admin session")?;
        warn!("[SERVER] bootstrap admin token installed; do not use in production");
    }

    let cache = RedisCache::connect(config.storage.redis_url.as_deref()).await;
    let verifier = Arc::new(SessionVerifier::new(store.clone(), cache));

    let services = Services {
        eligibility: Arc::new(EligibilityService::new(store.clone())),
        claims: Arc::new(ClaimsService::new(store.clone())),
        enrollment: Arc::new(EnrollmentService::new(store.clone())),
        analytics: Arc::new(AnalyticsService::new(store.clone())),
        members: Arc::new(MembersService::new(store.clone())),
    };
    let limiter = RateLimiter::new(config.rate_limit_per_minute);
    let api = routes::api(services, verifier, limiter);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;
    info!("[SERVER] listening on {}", addr);

    let (_addr, serving) = warp::serve(api).bind_with_graceful_shutdown(addr, shutdown_signal());
    serving.await;

    store.close().await.ok();
    info!("[SERVER] stopped");
    Ok(())
}
