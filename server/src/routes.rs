//! Route tree for the portal API. Everything under `/api` is bearer-token
//! authenticated and rate limited; `/health` is open.

use std::convert::Infallible;
use std::sync::Arc;

use uuid::Uuid;
use warp::Filter;

use models::user::AuthContext;

use crate::auth::{with_auth, TokenVerifier};
use crate::handlers::{self, Services};
use crate::rate_limit::{with_rate_limit, RateLimiter};

fn with_services(
    services: Services,
) -> impl Filter<Extract = (Services,), Error = Infallible> + Clone {
    warp::any().map(move || services.clone())
}

pub fn api(
    services: Services,
    verifier: Arc<dyn TokenVerifier>,
    limiter: RateLimiter,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone {
    let auth = with_auth(verifier);
    let guarded = with_rate_limit(limiter)
        .and(with_services(services))
        .and(auth);

    let health = warp::path!("health")
        .and(warp::get())
        .and_then(handlers::health);

    let verify_eligibility = warp::path!("api" / "providers" / "verify-eligibility")
        .and(warp::post())
        .and(guarded.clone())
        .and(warp::body::json())
        .and_then(handlers::verify_eligibility);

    let submit_claim = warp::path!("api" / "claims")
        .and(warp::post())
        .and(guarded.clone())
        .and(warp::body::json())
        .and_then(handlers::submit_claim);

    let list_claims = warp::path!("api" / "claims")
        .and(warp::get())
        .and(guarded.clone())
        .and(warp::query::<handlers::ClaimListQuery>())
        .and_then(handlers::list_claims);

    let get_claim = warp::path!("api" / "claims" / Uuid)
        .and(warp::get())
        .and(guarded.clone())
        .and_then(
            |id: Uuid, services: Services, ctx: AuthContext| async move {
                handlers::get_claim(id, services, ctx).await
            },
        );

    let update_claim = warp::path!("api" / "claims" / Uuid)
        .and(warp::put())
        .and(guarded.clone())
        .and(warp::body::json())
        .and_then(
            |id: Uuid, services: Services, ctx: AuthContext, req| async move {
                handlers::update_claim(id, services, ctx, req).await
            },
        );

    let process_claim = warp::path!("api" / "claims" / Uuid / "process")
        .and(warp::put())
        .and(guarded.clone())
        .and(warp::body::json())
        .and_then(
            |id: Uuid, services: Services, ctx: AuthContext, decision| async move {
                handlers::process_claim(id, services, ctx, decision).await
            },
        );

    let get_policy = warp::path!("api" / "policies" / Uuid)
        .and(warp::get())
        .and(guarded.clone())
        .and_then(
            |id: Uuid, services: Services, ctx: AuthContext| async move {
                handlers::get_policy(id, services, ctx).await
            },
        );

    let get_member = warp::path!("api" / "members" / Uuid)
        .and(warp::get())
        .and(guarded.clone())
        .and_then(
            |id: Uuid, services: Services, ctx: AuthContext| async move {
                handlers::get_member(id, services, ctx).await
            },
        );

    let enroll_policy = warp::path!("api" / "policies" / "enroll")
        .and(warp::post())
        .and(guarded.clone())
        .and(warp::body::json())
        .and_then(handlers::enroll_policy);

    let admin_dashboard = warp::path!("api" / "admin" / "dashboard")
        .and(warp::get())
        .and(guarded.clone())
        .and_then(handlers::admin_dashboard);

    let claims_analytics = warp::path!("api" / "admin" / "analytics")
        .and(warp::get())
        .and(guarded.clone())
        .and_then(handlers::claims_analytics);

    let provider_stats = warp::path!("api" / "providers" / "stats")
        .and(warp::get())
        .and(guarded)
        .and_then(handlers::provider_stats);

    health
        .or(verify_eligibility)
        .or(submit_claim)
        .or(list_claims)
        .or(process_claim)
        .or(get_claim)
        .or(update_claim)
        .or(enroll_policy)
        .or(get_policy)
        .or(get_member)
        .or(admin_dashboard)
        .or(claims_analytics)
        .or(provider_stats)
        .recover(handlers::handle_rejection)
}
