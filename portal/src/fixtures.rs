//! Shared builders for service tests against the in-memory store.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use models::claim::{Claim, ClaimStatus, ClaimType};
use models::identifiers::{Npi, PolicyNumber};
use models::member::Member;
use models::policy::{PlanTier, Policy, PolicyStatus};
use models::provider::{Provider, ProviderStatus};
use models::user::{AuthContext, Role, User};
use storage::{InMemoryStorage, PortalStorage};

pub fn store() -> Arc<dyn PortalStorage> {
    Arc::new(InMemoryStorage::default())
}

pub fn user(role: Role) -> User {
    let id = Uuid::new_v4();
    User {
        id,
        email: format!("{}@example.test", id.simple()),
        full_name: "Test User".to_string(),
        role,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        deleted_at: None,
    }
}

pub fn member(user_id: Uuid, dob: NaiveDate) -> Member {
    Member {
        id: Uuid::new_v4(),
        user_id,
        date_of_birth: dob,
        phone: None,
        address: None,
        enrolled_at: Utc::now(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        deleted_at: None,
    }
}

pub fn provider(user_id: Uuid, status: ProviderStatus) -> Provider {
    Provider {
        id: Uuid::new_v4(),
        user_id,
        npi: "1234567890".parse::<Npi>().unwrap(),
        specialty: "General Practice".to_string(),
        status,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        deleted_at: None,
    }
}

// Offset keeps seeded numbers clear of the small sequence values the
// enrollment service generates during the same test run.
static POLICY_SEQ: AtomicU32 = AtomicU32::new(900_000);

pub fn policy(member_id: Uuid, plan: PlanTier, status: PolicyStatus) -> Policy {
    Policy {
        id: Uuid::new_v4(),
        member_id,
        policy_number: PolicyNumber::new(2025, POLICY_SEQ.fetch_add(1, Ordering::Relaxed)),
        plan,
        status,
        premium_amount: 4_500.0,
        deductible: 20_000.0,
        coverage_limit: 1_000_000.0,
        start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        deleted_at: None,
    }
}

pub fn claim(policy_id: Uuid, provider_id: Option<Uuid>, status: ClaimStatus) -> Claim {
    Claim {
        id: Uuid::new_v4(),
        policy_id,
        provider_id,
        status,
        claim_type: ClaimType::Medical,
        diagnosis_codes: vec!["J06.9".to_string()],
        procedure_codes: vec!["99213".to_string()],
        total_amount: 12_000.0,
        approved_amount: None,
        patient_responsibility: None,
        service_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        notes: None,
        version: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        deleted_at: None,
    }
}

pub fn admin_ctx() -> AuthContext {
    AuthContext::new(Uuid::new_v4(), Role::Admin)
}

pub fn member_ctx(member_id: Uuid) -> AuthContext {
    let mut ctx = AuthContext::new(Uuid::new_v4(), Role::Member);
    ctx.member_id = Some(member_id);
    ctx
}

pub fn provider_ctx(provider_id: Uuid) -> AuthContext {
    let mut ctx = AuthContext::new(Uuid::new_v4(), Role::Provider);
    ctx.provider_id = Some(provider_id);
    ctx
}

pub fn adjudicator_ctx() -> AuthContext {
    AuthContext::new(Uuid::new_v4(), Role::Adjudicator)
}
