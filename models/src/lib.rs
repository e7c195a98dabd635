pub mod claim;
pub mod dashboard;
pub mod errors;
pub mod identifiers;
pub mod member;
pub mod policy;
pub mod provider;
pub mod user;

pub use claim::{AdjudicationDecision, Claim, ClaimStatus, ClaimType};
pub use errors::{PortalError, PortalResult};
pub use identifiers::{MemberRef, Npi, PolicyNumber};
pub use member::Member;
pub use policy::{PlanTier, Policy, PolicyStatus};
pub use provider::{Provider, ProviderStatus};
pub use user::{AuthContext, Role, User};
