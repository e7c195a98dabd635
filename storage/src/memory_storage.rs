use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use tokio::sync::Mutex as TokioMutex;
use uuid::Uuid;

use models::claim::{Claim, ClaimStatus};
use models::dashboard::{MonthlyTrendPoint, ProviderStats, StatusCount, TypeCount};
use models::errors::{PortalError, PortalResult};
use models::member::Member;
use models::policy::Policy;
use models::provider::Provider;
use models::user::User;

use crate::portal_storage::{ClaimFilter, PortalStorage, Session, StorageConfig};

/// Hash-map backed store for tests and the `--storage memory` dev mode.
/// Keeps the same soft-delete and versioning semantics as the postgres
/// implementation so service tests exercise the real rules.
#[derive(Debug)]
pub struct InMemoryStorage {
    #[allow(dead_code)]
    config: StorageConfig,
    users: TokioMutex<HashMap<Uuid, User>>,
    members: TokioMutex<HashMap<Uuid, Member>>,
    providers: TokioMutex<HashMap<Uuid, Provider>>,
    policies: TokioMutex<HashMap<Uuid, Policy>>,
    claims: TokioMutex<HashMap<Uuid, Claim>>,
    sessions: TokioMutex<HashMap<String, Session>>,
}

impl InMemoryStorage {
    pub fn new(config: &StorageConfig) -> Self {
        InMemoryStorage {
            config: config.clone(),
            users: TokioMutex::new(HashMap::new()),
            members: TokioMutex::new(HashMap::new()),
            providers: TokioMutex::new(HashMap::new()),
            policies: TokioMutex::new(HashMap::new()),
            claims: TokioMutex::new(HashMap::new()),
            sessions: TokioMutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new(&StorageConfig::default())
    }
}

fn live<'a, T, F>(map: &'a HashMap<Uuid, T>, is_live: F) -> impl Iterator<Item = &'a T>
where
    F: Fn(&T) -> bool + 'a,
{
    map.values().filter(move |v| is_live(v))
}

#[async_trait]
impl PortalStorage for InMemoryStorage {
    async fn connect(&self) -> PortalResult<()> {
        Ok(())
    }

    async fn close(&self) -> PortalResult<()> {
        Ok(())
    }

    async fn create_user(&self, user: User) -> PortalResult<()> {
        let mut users = self.users.lock().await;
        if users.values().any(|u| u.email == user.email && u.deleted_at.is_none()) {
            return Err(PortalError::Conflict(format!(
                "user with email {} already exists",
                user.email
            )));
        }
        users.insert(user.id, user);
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> PortalResult<Option<User>> {
        let users = self.users.lock().await;
        Ok(users.get(&id).filter(|u| u.deleted_at.is_none()).cloned())
    }

    async fn create_member(&self, member: Member) -> PortalResult<()> {
        self.members.lock().await.insert(member.id, member);
        Ok(())
    }

    async fn get_member(&self, id: Uuid) -> PortalResult<Option<Member>> {
        let members = self.members.lock().await;
        Ok(members.get(&id).filter(|m| m.deleted_at.is_none()).cloned())
    }

    async fn find_member_by_prefix(
        &self,
        hex_prefix: &str,
        date_of_birth: NaiveDate,
    ) -> PortalResult<Option<Member>> {
        let members = self.members.lock().await;
        let found = live(&members, |m: &Member| m.deleted_at.is_none())
            .find(|m| {
                m.date_of_birth == date_of_birth
                    && m.id.simple().to_string().starts_with(hex_prefix)
            })
            .cloned();
        Ok(found)
    }

    async fn create_provider(&self, provider: Provider) -> PortalResult<()> {
        let mut providers = self.providers.lock().await;
        if providers
            .values()
            .any(|p| p.npi == provider.npi && p.deleted_at.is_none())
        {
            return Err(PortalError::Conflict(format!(
                "provider with NPI {} already exists",
                provider.npi
            )));
        }
        providers.insert(provider.id, provider);
        Ok(())
    }

    async fn get_provider(&self, id: Uuid) -> PortalResult<Option<Provider>> {
        let providers = self.providers.lock().await;
        Ok(providers.get(&id).filter(|p| p.deleted_at.is_none()).cloned())
    }

    async fn get_provider_by_user(&self, user_id: Uuid) -> PortalResult<Option<Provider>> {
        let providers = self.providers.lock().await;
        let found = live(&providers, |p: &Provider| p.deleted_at.is_none())
            .find(|p| p.user_id == user_id)
            .cloned();
        Ok(found)
    }

    async fn create_policy(&self, policy: Policy) -> PortalResult<()> {
        let mut policies = self.policies.lock().await;
        if policies
            .values()
            .any(|p| p.policy_number == policy.policy_number)
        {
            return Err(PortalError::Conflict(format!(
                "policy number {} already exists",
                policy.policy_number
            )));
        }
        policies.insert(policy.id, policy);
        Ok(())
    }

    async fn get_policy(&self, id: Uuid) -> PortalResult<Option<Policy>> {
        let policies = self.policies.lock().await;
        Ok(policies.get(&id).filter(|p| p.deleted_at.is_none()).cloned())
    }

    async fn policies_for_member(&self, member_id: Uuid) -> PortalResult<Vec<Policy>> {
        let policies = self.policies.lock().await;
        Ok(live(&policies, |p: &Policy| p.deleted_at.is_none())
            .filter(|p| p.member_id == member_id)
            .cloned()
            .collect())
    }

    async fn active_policy_for_member(&self, member_id: Uuid) -> PortalResult<Option<Policy>> {
        let policies = self.policies.lock().await;
        let found = live(&policies, |p: &Policy| p.deleted_at.is_none())
            .find(|p| p.member_id == member_id && p.is_active())
            .cloned();
        Ok(found)
    }

    async fn count_policies(&self) -> PortalResult<u64> {
        let policies = self.policies.lock().await;
        Ok(policies.values().filter(|p| p.deleted_at.is_none()).count() as u64)
    }

    async fn create_claim(&self, claim: Claim) -> PortalResult<()> {
        self.claims.lock().await.insert(claim.id, claim);
        Ok(())
    }

    async fn get_claim(&self, id: Uuid) -> PortalResult<Option<Claim>> {
        let claims = self.claims.lock().await;
        Ok(claims.get(&id).filter(|c| c.deleted_at.is_none()).cloned())
    }

    async fn list_claims(&self, filter: ClaimFilter) -> PortalResult<Vec<Claim>> {
        let claims = self.claims.lock().await;
        let mut out: Vec<Claim> = live(&claims, |c: &Claim| c.deleted_at.is_none())
            .filter(|c| match &filter.policy_ids {
                Some(ids) => ids.contains(&c.policy_id),
                None => true,
            })
            .filter(|c| match filter.provider_id {
                Some(pid) => c.provider_id == Some(pid),
                None => true,
            })
            .filter(|c| match filter.status {
                Some(s) => c.status == s,
                None => true,
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn update_claim(&self, claim: Claim) -> PortalResult<()> {
        let mut claims = self.claims.lock().await;
        match claims.get(&claim.id) {
            Some(existing) if existing.deleted_at.is_none() => {
                claims.insert(claim.id, claim);
                Ok(())
            }
            _ => Err(PortalError::NotFound(format!("claim {}", claim.id))),
        }
    }

    async fn adjudicate_claim(
        &self,
        id: Uuid,
        expected_version: u32,
        status: ClaimStatus,
        approved_amount: Option<f64>,
        patient_responsibility: Option<f64>,
        notes: Option<String>,
    ) -> PortalResult<Claim> {
        let mut claims = self.claims.lock().await;
        let claim = claims
            .get_mut(&id)
            .filter(|c| c.deleted_at.is_none())
            .ok_or_else(|| PortalError::NotFound(format!("claim {}", id)))?;
        if claim.version != expected_version {
            return Err(PortalError::Conflict(format!(
                "claim {} was adjudicated concurrently (version {} != {})",
                id, claim.version, expected_version
            )));
        }
        claim.status = status;
        claim.approved_amount = approved_amount;
        claim.patient_responsibility = patient_responsibility;
        if notes.is_some() {
            claim.notes = notes;
        }
        claim.version += 1;
        claim.updated_at = Utc::now();
        Ok(claim.clone())
    }

    async fn put_session(&self, session: Session) -> PortalResult<()> {
        self.sessions.lock().await.insert(session.token.clone(), session);
        Ok(())
    }

    async fn get_session(&self, token: &str) -> PortalResult<Option<Session>> {
        Ok(self.sessions.lock().await.get(token).cloned())
    }

    async fn count_users(&self) -> PortalResult<u64> {
        Ok(self.users.lock().await.values().filter(|u| u.deleted_at.is_none()).count() as u64)
    }

    async fn count_members(&self) -> PortalResult<u64> {
        Ok(self.members.lock().await.values().filter(|m| m.deleted_at.is_none()).count() as u64)
    }

    async fn count_providers(&self) -> PortalResult<u64> {
        Ok(self
            .providers
            .lock()
            .await
            .values()
            .filter(|p| p.deleted_at.is_none())
            .count() as u64)
    }

    async fn count_active_policies(&self) -> PortalResult<u64> {
        Ok(self
            .policies
            .lock()
            .await
            .values()
            .filter(|p| p.is_active())
            .count() as u64)
    }

    async fn claim_status_counts(&self) -> PortalResult<Vec<StatusCount>> {
        let claims = self.claims.lock().await;
        let mut counts: HashMap<ClaimStatus, u64> = HashMap::new();
        for c in claims.values().filter(|c| c.deleted_at.is_none()) {
            *counts.entry(c.status).or_default() += 1;
        }
        let mut out: Vec<StatusCount> = counts
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect();
        out.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(out)
    }

    async fn claim_type_counts(&self) -> PortalResult<Vec<TypeCount>> {
        let claims = self.claims.lock().await;
        let mut counts: HashMap<models::claim::ClaimType, u64> = HashMap::new();
        for c in claims.values().filter(|c| c.deleted_at.is_none()) {
            *counts.entry(c.claim_type).or_default() += 1;
        }
        let mut out: Vec<TypeCount> = counts
            .into_iter()
            .map(|(claim_type, count)| TypeCount { claim_type, count })
            .collect();
        out.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(out)
    }

    async fn claim_amount_totals(&self) -> PortalResult<(f64, f64)> {
        let claims = self.claims.lock().await;
        let mut billed = 0.0;
        let mut approved = 0.0;
        for c in claims.values().filter(|c| c.deleted_at.is_none()) {
            billed += c.total_amount;
            approved += c.approved_amount.unwrap_or(0.0);
        }
        Ok((billed, approved))
    }

    async fn monthly_claim_trend(&self) -> PortalResult<Vec<MonthlyTrendPoint>> {
        let claims = self.claims.lock().await;
        let mut months: HashMap<String, (u64, f64)> = HashMap::new();
        for c in claims.values().filter(|c| c.deleted_at.is_none()) {
            let key = format!("{:04}-{:02}", c.service_date.year(), c.service_date.month());
            let entry = months.entry(key).or_default();
            entry.0 += 1;
            entry.1 += c.total_amount;
        }
        let mut out: Vec<MonthlyTrendPoint> = months
            .into_iter()
            .map(|(month, (claim_count, billed_amount))| MonthlyTrendPoint {
                month,
                claim_count,
                billed_amount,
            })
            .collect();
        out.sort_by(|a, b| a.month.cmp(&b.month));
        Ok(out)
    }

    async fn provider_claim_stats(&self, provider_id: Uuid) -> PortalResult<ProviderStats> {
        let claims = self.claims.lock().await;
        let mut pending = 0u64;
        let mut pending_value = 0.0;
        let mut revenue = 0.0;
        let mut decided = 0u64;
        let mut won = 0u64;
        for c in claims
            .values()
            .filter(|c| c.deleted_at.is_none() && c.provider_id == Some(provider_id))
        {
            match c.status {
                ClaimStatus::Submitted
                | ClaimStatus::Received
                | ClaimStatus::UnderReview
                | ClaimStatus::Appealed => {
                    pending += 1;
                    pending_value += c.total_amount;
                }
                ClaimStatus::Approved => {
                    decided += 1;
                    won += 1;
                }
                ClaimStatus::Paid => {
                    decided += 1;
                    won += 1;
                    revenue += c.approved_amount.unwrap_or(0.0);
                }
                ClaimStatus::Rejected => {
                    decided += 1;
                }
            }
        }
        let approval_rate = if decided == 0 {
            0.0
        } else {
            won as f64 / decided as f64
        };
        Ok(ProviderStats {
            pending_claims: pending,
            pending_value,
            revenue_to_date: revenue,
            approval_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryStorage;
    use chrono::{NaiveDate, Utc};
    use models::claim::{Claim, ClaimStatus, ClaimType};
    use models::errors::PortalError;
    use models::identifiers::PolicyNumber;
    use models::member::Member;
    use models::policy::{PlanTier, Policy, PolicyStatus};
    use models::user::{Role, User};
    use crate::portal_storage::PortalStorage;
    use uuid::Uuid;

    fn user(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: "Test User".to_string(),
            role: Role::Member,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn claim(status: ClaimStatus) -> Claim {
        Claim {
            id: Uuid::new_v4(),
            policy_id: Uuid::new_v4(),
            provider_id: None,
            status,
            claim_type: ClaimType::Medical,
            diagnosis_codes: vec![],
            procedure_codes: vec![],
            total_amount: 5_000.0,
            approved_amount: None,
            patient_responsibility: None,
            service_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            notes: None,
            version: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn policy(number: PolicyNumber) -> Policy {
        Policy {
            id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            policy_number: number,
            plan: PlanTier::Gold,
            status: PolicyStatus::Active,
            premium_amount: 5_000.0,
            deductible: 20_000.0,
            coverage_limit: 1_000_000.0,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn should_reject_duplicate_live_email() {
        let store = InMemoryStorage::default();
        store.create_user(user("dup@example.test")).await.unwrap();
        let err = store.create_user(user("dup@example.test")).await.unwrap_err();
        assert!(matches!(err, PortalError::Conflict(_)));
    }

    #[tokio::test]
    async fn should_reject_duplicate_policy_number() {
        let store = InMemoryStorage::default();
        store
            .create_policy(policy(PolicyNumber::new(2025, 42)))
            .await
            .unwrap();
        let err = store
            .create_policy(policy(PolicyNumber::new(2025, 42)))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Conflict(_)));
    }

    #[tokio::test]
    async fn should_hide_soft_deleted_members() {
        let store = InMemoryStorage::default();
        let u = user("m@example.test");
        store.create_user(u.clone()).await.unwrap();
        let member = Member {
            id: Uuid::new_v4(),
            user_id: u.id,
            date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
            phone: None,
            address: None,
            enrolled_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: Some(Utc::now()),
        };
        store.create_member(member.clone()).await.unwrap();
        assert!(store.get_member(member.id).await.unwrap().is_none());
        assert_eq!(store.count_members().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn should_bump_version_on_adjudication_write() {
        let store = InMemoryStorage::default();
        let c = claim(ClaimStatus::UnderReview);
        store.create_claim(c.clone()).await.unwrap();

        let updated = store
            .adjudicate_claim(c.id, 0, ClaimStatus::Approved, Some(4_000.0), None, None)
            .await
            .unwrap();
        assert_eq!(updated.version, 1);
        assert_eq!(updated.status, ClaimStatus::Approved);

        let err = store
            .adjudicate_claim(c.id, 0, ClaimStatus::Rejected, None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Conflict(_)));
    }

    #[tokio::test]
    async fn should_keep_notes_when_decision_carries_none() {
        let store = InMemoryStorage::default();
        let mut c = claim(ClaimStatus::UnderReview);
        c.notes = Some("initial note".to_string());
        store.create_claim(c.clone()).await.unwrap();

        let updated = store
            .adjudicate_claim(c.id, 0, ClaimStatus::Approved, Some(4_000.0), None, None)
            .await
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("initial note"));
    }
}
