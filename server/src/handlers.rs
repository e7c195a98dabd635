//! Request handlers and the response envelope. Every endpoint answers
//! `{ "success": bool, "message"?: string, "data"?: ... }`; errors carry
//! the same shape with `success: false`.

use std::convert::Infallible;
use std::sync::Arc;

use log::error;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use models::claim::{AdjudicationDecision, ClaimStatus};
use models::errors::PortalError;
use models::user::AuthContext;
use portal::{
    AnalyticsService, ClaimsService, EligibilityService, EnrollmentService, MembersService,
    EnrollPolicyRequest, SubmitClaimRequest, UpdateClaimRequest, VerifyEligibilityRequest,
};

/// A portal error surfaced through warp's rejection machinery.
#[derive(Debug)]
pub struct ApiError(pub PortalError);

impl warp::reject::Reject for ApiError {}

/// Marker rejection for over-limit clients.
#[derive(Debug)]
pub struct RateLimited;

impl warp::reject::Reject for RateLimited {}

#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

fn ok<T: Serialize>(data: T) -> warp::reply::WithStatus<warp::reply::Json> {
    let body = Envelope {
        success: true,
        message: None,
        data: Some(data),
    };
    warp::reply::with_status(warp::reply::json(&body), StatusCode::OK)
}

fn created<T: Serialize>(data: T) -> warp::reply::WithStatus<warp::reply::Json> {
    let body = Envelope {
        success: true,
        message: None,
        data: Some(data),
    };
    warp::reply::with_status(warp::reply::json(&body), StatusCode::CREATED)
}

fn reject(e: PortalError) -> Rejection {
    warp::reject::custom(ApiError(e))
}

/// All services a handler can reach, shared across the route tree.
#[derive(Clone)]
pub struct Services {
    pub eligibility: Arc<EligibilityService>,
    pub claims: Arc<ClaimsService>,
    pub enrollment: Arc<EnrollmentService>,
    pub analytics: Arc<AnalyticsService>,
    pub members: Arc<MembersService>,
}

#[derive(Debug, Deserialize)]
pub struct ClaimListQuery {
    pub status: Option<ClaimStatus>,
}

pub async fn verify_eligibility(
    services: Services,
    _ctx: AuthContext,
    req: VerifyEligibilityRequest,
) -> Result<impl Reply, Rejection> {
    let report = services.eligibility.verify(&req).await.map_err(reject)?;
    // Eligibility answers carry the verdict at the top level as well.
    let body = json!({
        "success": true,
        "eligible": report.eligible,
        "data": report,
    });
    Ok(warp::reply::with_status(
        warp::reply::json(&body),
        StatusCode::OK,
    ))
}

pub async fn submit_claim(
    services: Services,
    ctx: AuthContext,
    req: SubmitClaimRequest,
) -> Result<impl Reply, Rejection> {
    let claim = services.claims.submit(&ctx, req).await.map_err(reject)?;
    Ok(created(claim))
}

pub async fn list_claims(
    services: Services,
    ctx: AuthContext,
    query: ClaimListQuery,
) -> Result<impl Reply, Rejection> {
    let claims = services
        .claims
        .list(&ctx, query.status)
        .await
        .map_err(reject)?;
    Ok(ok(claims))
}

pub async fn get_claim(
    id: Uuid,
    services: Services,
    ctx: AuthContext,
) -> Result<impl Reply, Rejection> {
    let claim = services.claims.get(&ctx, id).await.map_err(reject)?;
    Ok(ok(claim))
}

pub async fn update_claim(
    id: Uuid,
    services: Services,
    ctx: AuthContext,
    req: UpdateClaimRequest,
) -> Result<impl Reply, Rejection> {
    let claim = services
        .claims
        .update(&ctx, id, req)
        .await
        .map_err(reject)?;
    Ok(ok(claim))
}

pub async fn process_claim(
    id: Uuid,
    services: Services,
    ctx: AuthContext,
    decision: AdjudicationDecision,
) -> Result<impl Reply, Rejection> {
    let claim = services
        .claims
        .process(&ctx, id, decision)
        .await
        .map_err(reject)?;
    Ok(ok(claim))
}

pub async fn enroll_policy(
    services: Services,
    ctx: AuthContext,
    req: EnrollPolicyRequest,
) -> Result<impl Reply, Rejection> {
    let policy = services
        .enrollment
        .enroll(&ctx, req)
        .await
        .map_err(reject)?;
    Ok(created(policy))
}

pub async fn get_policy(
    id: Uuid,
    services: Services,
    ctx: AuthContext,
) -> Result<impl Reply, Rejection> {
    let policy = services
        .enrollment
        .get_policy(&ctx, id)
        .await
        .map_err(reject)?;
    Ok(ok(policy))
}

pub async fn get_member(
    id: Uuid,
    services: Services,
    ctx: AuthContext,
) -> Result<impl Reply, Rejection> {
    let member = services.members.get(&ctx, id).await.map_err(reject)?;
    Ok(ok(member))
}

pub async fn admin_dashboard(
    services: Services,
    ctx: AuthContext,
) -> Result<impl Reply, Rejection> {
    let dashboard = services
        .analytics
        .admin_dashboard(&ctx)
        .await
        .map_err(reject)?;
    Ok(ok(dashboard))
}

pub async fn claims_analytics(
    services: Services,
    ctx: AuthContext,
) -> Result<impl Reply, Rejection> {
    let analytics = services
        .analytics
        .claims_analytics(&ctx)
        .await
        .map_err(reject)?;
    Ok(ok(analytics))
}

pub async fn provider_stats(
    services: Services,
    ctx: AuthContext,
) -> Result<impl Reply, Rejection> {
    let stats = services
        .analytics
        .provider_stats(&ctx)
        .await
        .map_err(reject)?;
    Ok(ok(stats))
}

pub async fn health() -> Result<impl Reply, Infallible> {
    Ok(ok(json!({"status": "up"})))
}

/// Maps rejections to the envelope. Unexpected errors are masked; their
/// detail goes to the log, not the client.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "resource not found".to_string())
    } else if let Some(ApiError(e)) = err.find::<ApiError>() {
        match e {
            PortalError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
            PortalError::Validation(_)
            | PortalError::InvalidTransition(_)
            | PortalError::BusinessRule(_) => (StatusCode::BAD_REQUEST, e.to_string()),
            PortalError::Conflict(_) => (StatusCode::CONFLICT, e.to_string()),
            PortalError::Auth(_) => (StatusCode::UNAUTHORIZED, e.to_string()),
            PortalError::Forbidden(_) => (StatusCode::FORBIDDEN, e.to_string()),
            other => {
                error!("[HTTP] internal error: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        }
    } else if err.find::<RateLimited>().is_some() {
        (
            StatusCode::TOO_MANY_REQUESTS,
            "rate limit exceeded".to_string(),
        )
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "method not allowed".to_string(),
        )
    } else {
        error!("[HTTP] unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal server error".to_string(),
        )
    };

    let body = Envelope::<serde_json::Value> {
        success: false,
        message: Some(message),
        data: None,
    };
    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}
