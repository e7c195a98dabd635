pub mod analytics;
pub mod claims;
pub mod eligibility;
pub mod enrollment;
pub mod members;

pub use analytics::analytics_service::AnalyticsService;
pub use claims::claims_service::{ClaimsService, SubmitClaimRequest, UpdateClaimRequest};
pub use eligibility::eligibility_service::{
    EligibilityReport, EligibilityService, VerifyEligibilityRequest,
};
pub use enrollment::enrollment_service::{EnrollPolicyRequest, EnrollmentService};
pub use members::members_service::MembersService;

#[cfg(test)]
pub(crate) mod fixtures;
