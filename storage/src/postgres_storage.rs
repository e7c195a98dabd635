use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls, Row};
use uuid::Uuid;

use models::claim::{Claim, ClaimStatus};
use models::dashboard::{MonthlyTrendPoint, ProviderStats, StatusCount, TypeCount};
use models::errors::{PortalError, PortalResult};
use models::identifiers::{Npi, PolicyNumber};
use models::member::Member;
use models::policy::Policy;
use models::provider::Provider;
use models::user::{AuthContext, User};

use crate::portal_storage::{ClaimFilter, PortalStorage, Session, StorageConfig};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY,
    email TEXT NOT NULL,
    full_name TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    deleted_at TIMESTAMPTZ
);
CREATE UNIQUE INDEX IF NOT EXISTS users_email_live
    ON users (email) WHERE deleted_at IS NULL;
CREATE TABLE IF NOT EXISTS members (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES users (id),
    date_of_birth DATE NOT NULL,
    phone TEXT,
    address TEXT,
    enrolled_at TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    deleted_at TIMESTAMPTZ
);
CREATE TABLE IF NOT EXISTS providers (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES users (id),
    npi TEXT NOT NULL,
    specialty TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    deleted_at TIMESTAMPTZ
);
CREATE UNIQUE INDEX IF NOT EXISTS providers_npi_live
    ON providers (npi) WHERE deleted_at IS NULL;
CREATE TABLE IF NOT EXISTS policies (
    id UUID PRIMARY KEY,
    member_id UUID NOT NULL REFERENCES members (id),
    policy_number TEXT NOT NULL UNIQUE,
    plan TEXT NOT NULL,
    status TEXT NOT NULL,
    premium_amount DOUBLE PRECISION NOT NULL,
    deductible DOUBLE PRECISION NOT NULL,
    coverage_limit DOUBLE PRECISION NOT NULL,
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    deleted_at TIMESTAMPTZ
);
CREATE TABLE IF NOT EXISTS claims (
    id UUID PRIMARY KEY,
    policy_id UUID NOT NULL REFERENCES policies (id),
    provider_id UUID REFERENCES providers (id),
    status TEXT NOT NULL,
    claim_type TEXT NOT NULL,
    diagnosis_codes TEXT[] NOT NULL,
    procedure_codes TEXT[] NOT NULL,
    total_amount DOUBLE PRECISION NOT NULL,
    approved_amount DOUBLE PRECISION,
    patient_responsibility DOUBLE PRECISION,
    service_date DATE NOT NULL,
    notes TEXT,
    version INTEGER NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    deleted_at TIMESTAMPTZ
);
CREATE INDEX IF NOT EXISTS claims_policy ON claims (policy_id);
CREATE INDEX IF NOT EXISTS claims_provider ON claims (provider_id);
CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY,
    context JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
";

/// Postgres-backed store over a single async client.
#[derive(Debug)]
pub struct PostgresStorage {
    client: Arc<Mutex<Client>>,
}

fn storage_err(e: tokio_postgres::Error) -> PortalError {
    PortalError::Storage(e.to_string())
}

/// Enum variants are stored as their serde snake_case names.
fn to_db_enum<T: Serialize>(v: &T) -> PortalResult<String> {
    serde_json::to_value(v)
        .map_err(|e| PortalError::Serialization(e.to_string()))?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| PortalError::Serialization("enum did not serialize to a string".into()))
}

fn from_db_enum<T: DeserializeOwned>(s: &str) -> PortalResult<T> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|e| PortalError::Serialization(format!("bad enum value '{}': {}", s, e)))
}

fn user_from_row(row: &Row) -> PortalResult<User> {
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        full_name: row.get("full_name"),
        role: from_db_enum(row.get::<_, &str>("role"))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    })
}

fn member_from_row(row: &Row) -> Member {
    Member {
        id: row.get("id"),
        user_id: row.get("user_id"),
        date_of_birth: row.get("date_of_birth"),
        phone: row.get("phone"),
        address: row.get("address"),
        enrolled_at: row.get("enrolled_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    }
}

fn provider_from_row(row: &Row) -> PortalResult<Provider> {
    Ok(Provider {
        id: row.get("id"),
        user_id: row.get("user_id"),
        npi: row.get::<_, &str>("npi").parse::<Npi>()?,
        specialty: row.get("specialty"),
        status: from_db_enum(row.get::<_, &str>("status"))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    })
}

fn policy_from_row(row: &Row) -> PortalResult<Policy> {
    Ok(Policy {
        id: row.get("id"),
        member_id: row.get("member_id"),
        policy_number: row.get::<_, &str>("policy_number").parse::<PolicyNumber>()?,
        plan: from_db_enum(row.get::<_, &str>("plan"))?,
        status: from_db_enum(row.get::<_, &str>("status"))?,
        premium_amount: row.get("premium_amount"),
        deductible: row.get("deductible"),
        coverage_limit: row.get("coverage_limit"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    })
}

fn claim_from_row(row: &Row) -> PortalResult<Claim> {
    Ok(Claim {
        id: row.get("id"),
        policy_id: row.get("policy_id"),
        provider_id: row.get("provider_id"),
        status: from_db_enum(row.get::<_, &str>("status"))?,
        claim_type: from_db_enum(row.get::<_, &str>("claim_type"))?,
        diagnosis_codes: row.get("diagnosis_codes"),
        procedure_codes: row.get("procedure_codes"),
        total_amount: row.get("total_amount"),
        approved_amount: row.get("approved_amount"),
        patient_responsibility: row.get("patient_responsibility"),
        service_date: row.get("service_date"),
        notes: row.get("notes"),
        version: row.get::<_, i32>("version") as u32,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    })
}

impl PostgresStorage {
    pub async fn new(config: &StorageConfig) -> PortalResult<Self> {
        let conn_str = config.connection_string.as_ref().ok_or_else(|| {
            PortalError::Configuration("postgres connection string is required".to_string())
        })?;
        let (client, connection) = tokio_postgres::connect(conn_str, NoTls)
            .await
            .map_err(|e| PortalError::Storage(format!("failed to connect to postgres: {}", e)))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                log::error!("[STORE] postgres connection task ended: {}", e);
            }
        });
        let storage = PostgresStorage {
            client: Arc::new(Mutex::new(client)),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> PortalResult<()> {
        let client = self.client.lock().await;
        client.batch_execute(SCHEMA).await.map_err(storage_err)?;
        info!("[STORE] schema ready");
        Ok(())
    }
}

#[async_trait]
impl PortalStorage for PostgresStorage {
    async fn connect(&self) -> PortalResult<()> {
        // Connection is established during initialization
        Ok(())
    }

    async fn close(&self) -> PortalResult<()> {
        Ok(())
    }

    async fn create_user(&self, user: User) -> PortalResult<()> {
        let client = self.client.lock().await;
        client
            .execute(
                "INSERT INTO users (id, email, full_name, role, created_at, updated_at, deleted_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
                &[
                    &user.id,
                    &user.email,
                    &user.full_name,
                    &to_db_enum(&user.role)?,
                    &user.created_at,
                    &user.updated_at,
                    &user.deleted_at,
                ],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&tokio_postgres::error::SqlState::UNIQUE_VIOLATION) {
                    PortalError::Conflict(format!("user with email {} already exists", user.email))
                } else {
                    storage_err(e)
                }
            })?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> PortalResult<Option<User>> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL",
                &[&id],
            )
            .await
            .map_err(storage_err)?;
        rows.first().map(user_from_row).transpose()
    }

    async fn create_member(&self, member: Member) -> PortalResult<()> {
        let client = self.client.lock().await;
        client
            .execute(
                "INSERT INTO members (id, user_id, date_of_birth, phone, address, enrolled_at,
                                      created_at, updated_at, deleted_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                &[
                    &member.id,
                    &member.user_id,
                    &member.date_of_birth,
                    &member.phone,
                    &member.address,
                    &member.enrolled_at,
                    &member.created_at,
                    &member.updated_at,
                    &member.deleted_at,
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn get_member(&self, id: Uuid) -> PortalResult<Option<Member>> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT * FROM members WHERE id = $1 AND deleted_at IS NULL",
                &[&id],
            )
            .await
            .map_err(storage_err)?;
        Ok(rows.first().map(member_from_row))
    }

    async fn find_member_by_prefix(
        &self,
        hex_prefix: &str,
        date_of_birth: NaiveDate,
    ) -> PortalResult<Option<Member>> {
        let client = self.client.lock().await;
        // The first 6 chars of the canonical UUID form are plain hex.
        let rows = client
            .query(
                "SELECT * FROM members
                 WHERE lower(left(id::text, 6)) = $1
                   AND date_of_birth = $2
                   AND deleted_at IS NULL
                 LIMIT 1",
                &[&hex_prefix, &date_of_birth],
            )
            .await
            .map_err(storage_err)?;
        Ok(rows.first().map(member_from_row))
    }

    async fn create_provider(&self, provider: Provider) -> PortalResult<()> {
        let client = self.client.lock().await;
        client
            .execute(
                "INSERT INTO providers (id, user_id, npi, specialty, status,
                                        created_at, updated_at, deleted_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                &[
                    &provider.id,
                    &provider.user_id,
                    &provider.npi.as_str(),
                    &provider.specialty,
                    &to_db_enum(&provider.status)?,
                    &provider.created_at,
                    &provider.updated_at,
                    &provider.deleted_at,
                ],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&tokio_postgres::error::SqlState::UNIQUE_VIOLATION) {
                    PortalError::Conflict(format!(
                        "provider with NPI {} already exists",
                        provider.npi
                    ))
                } else {
                    storage_err(e)
                }
            })?;
        Ok(())
    }

    async fn get_provider(&self, id: Uuid) -> PortalResult<Option<Provider>> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT * FROM providers WHERE id = $1 AND deleted_at IS NULL",
                &[&id],
            )
            .await
            .map_err(storage_err)?;
        rows.first().map(provider_from_row).transpose()
    }

    async fn get_provider_by_user(&self, user_id: Uuid) -> PortalResult<Option<Provider>> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT * FROM providers WHERE user_id = $1 AND deleted_at IS NULL LIMIT 1",
                &[&user_id],
            )
            .await
            .map_err(storage_err)?;
        rows.first().map(provider_from_row).transpose()
    }

    async fn create_policy(&self, policy: Policy) -> PortalResult<()> {
        let client = self.client.lock().await;
        client
            .execute(
                "INSERT INTO policies (id, member_id, policy_number, plan, status,
                                       premium_amount, deductible, coverage_limit,
                                       start_date, end_date, created_at, updated_at, deleted_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
                &[
                    &policy.id,
                    &policy.member_id,
                    &policy.policy_number.as_str(),
                    &to_db_enum(&policy.plan)?,
                    &to_db_enum(&policy.status)?,
                    &policy.premium_amount,
                    &policy.deductible,
                    &policy.coverage_limit,
                    &policy.start_date,
                    &policy.end_date,
                    &policy.created_at,
                    &policy.updated_at,
                    &policy.deleted_at,
                ],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&tokio_postgres::error::SqlState::UNIQUE_VIOLATION) {
                    PortalError::Conflict(format!(
                        "policy number {} already exists",
                        policy.policy_number
                    ))
                } else {
                    storage_err(e)
                }
            })?;
        Ok(())
    }

    async fn get_policy(&self, id: Uuid) -> PortalResult<Option<Policy>> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT * FROM policies WHERE id = $1 AND deleted_at IS NULL",
                &[&id],
            )
            .await
            .map_err(storage_err)?;
        rows.first().map(policy_from_row).transpose()
    }

    async fn policies_for_member(&self, member_id: Uuid) -> PortalResult<Vec<Policy>> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT * FROM policies WHERE member_id = $1 AND deleted_at IS NULL
                 ORDER BY created_at DESC",
                &[&member_id],
            )
            .await
            .map_err(storage_err)?;
        rows.iter().map(policy_from_row).collect()
    }

    async fn active_policy_for_member(&self, member_id: Uuid) -> PortalResult<Option<Policy>> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT * FROM policies
                 WHERE member_id = $1 AND status = 'active' AND deleted_at IS NULL
                 LIMIT 1",
                &[&member_id],
            )
            .await
            .map_err(storage_err)?;
        rows.first().map(policy_from_row).transpose()
    }

    async fn count_policies(&self) -> PortalResult<u64> {
        let client = self.client.lock().await;
        let row = client
            .query_one("SELECT COUNT(*) FROM policies WHERE deleted_at IS NULL", &[])
            .await
            .map_err(storage_err)?;
        Ok(row.get::<_, i64>(0) as u64)
    }

    async fn create_claim(&self, claim: Claim) -> PortalResult<()> {
        let client = self.client.lock().await;
        client
            .execute(
                "INSERT INTO claims (id, policy_id, provider_id, status, claim_type,
                                     diagnosis_codes, procedure_codes, total_amount,
                                     approved_amount, patient_responsibility, service_date,
                                     notes, version, created_at, updated_at, deleted_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
                &[
                    &claim.id,
                    &claim.policy_id,
                    &claim.provider_id,
                    &to_db_enum(&claim.status)?,
                    &to_db_enum(&claim.claim_type)?,
                    &claim.diagnosis_codes,
                    &claim.procedure_codes,
                    &claim.total_amount,
                    &claim.approved_amount,
                    &claim.patient_responsibility,
                    &claim.service_date,
                    &claim.notes,
                    &(claim.version as i32),
                    &claim.created_at,
                    &claim.updated_at,
                    &claim.deleted_at,
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn get_claim(&self, id: Uuid) -> PortalResult<Option<Claim>> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT * FROM claims WHERE id = $1 AND deleted_at IS NULL",
                &[&id],
            )
            .await
            .map_err(storage_err)?;
        rows.first().map(claim_from_row).transpose()
    }

    async fn list_claims(&self, filter: ClaimFilter) -> PortalResult<Vec<Claim>> {
        let client = self.client.lock().await;
        let status = filter.status.map(|s| to_db_enum(&s)).transpose()?;
        let rows = client
            .query(
                "SELECT * FROM claims
                 WHERE deleted_at IS NULL
                   AND ($1::uuid[] IS NULL OR policy_id = ANY($1))
                   AND ($2::uuid IS NULL OR provider_id = $2)
                   AND ($3::text IS NULL OR status = $3)
                 ORDER BY created_at DESC",
                &[&filter.policy_ids, &filter.provider_id, &status],
            )
            .await
            .map_err(storage_err)?;
        rows.iter().map(claim_from_row).collect()
    }

    async fn update_claim(&self, claim: Claim) -> PortalResult<()> {
        let client = self.client.lock().await;
        let n = client
            .execute(
                "UPDATE claims
                 SET diagnosis_codes = $1, procedure_codes = $2, notes = $3, updated_at = $4
                 WHERE id = $5 AND deleted_at IS NULL",
                &[
                    &claim.diagnosis_codes,
                    &claim.procedure_codes,
                    &claim.notes,
                    &claim.updated_at,
                    &claim.id,
                ],
            )
            .await
            .map_err(storage_err)?;
        if n == 0 {
            return Err(PortalError::NotFound(format!("claim {}", claim.id)));
        }
        Ok(())
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
        let client = self.client.lock().await;
        let rows = client
            .query(
                "UPDATE claims
                 SET status = $1,
                     approved_amount = $2,
                     patient_responsibility = $3,
                     notes = COALESCE($4, notes),
                     version = version + 1,
                     updated_at = now()
                 WHERE id = $5 AND version = $6 AND deleted_at IS NULL
                 RETURNING *",
                &[
                    &to_db_enum(&status)?,
                    &approved_amount,
                    &patient_responsibility,
                    &notes,
                    &id,
                    &(expected_version as i32),
                ],
            )
            .await
            .map_err(storage_err)?;
        if let Some(row) = rows.first() {
            return claim_from_row(row);
        }
        // Zero rows: either the claim is gone or a concurrent write bumped
        // the version first.
        let exists = client
            .query(
                "SELECT version FROM claims WHERE id = $1 AND deleted_at IS NULL",
                &[&id],
            )
            .await
            .map_err(storage_err)?;
        match exists.first() {
            Some(row) => Err(PortalError::Conflict(format!(
                "claim {} was adjudicated concurrently (version {} != {})",
                id,
                row.get::<_, i32>("version"),
                expected_version
            ))),
            None => Err(PortalError::NotFound(format!("claim {}", id))),
        }
    }

    async fn put_session(&self, session: Session) -> PortalResult<()> {
        let client = self.client.lock().await;
        let context = serde_json::to_value(&session.context)
            .map_err(|e| PortalError::Serialization(e.to_string()))?;
        client
            .execute(
                "INSERT INTO sessions (token, context, created_at)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (token) DO UPDATE SET context = $2",
                &[&session.token, &context, &session.created_at],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn get_session(&self, token: &str) -> PortalResult<Option<Session>> {
        let client = self.client.lock().await;
        let rows = client
            .query("SELECT * FROM sessions WHERE token = $1", &[&token])
            .await
            .map_err(storage_err)?;
        rows.first()
            .map(|row| {
                let context: AuthContext =
                    serde_json::from_value(row.get::<_, serde_json::Value>("context"))
                        .map_err(|e| PortalError::Serialization(e.to_string()))?;
                Ok(Session {
                    token: row.get("token"),
                    context,
                    created_at: row.get("created_at"),
                })
            })
            .transpose()
    }

    async fn count_users(&self) -> PortalResult<u64> {
        let client = self.client.lock().await;
        let row = client
            .query_one("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL", &[])
            .await
            .map_err(storage_err)?;
        Ok(row.get::<_, i64>(0) as u64)
    }

    async fn count_members(&self) -> PortalResult<u64> {
        let client = self.client.lock().await;
        let row = client
            .query_one("SELECT COUNT(*) FROM members WHERE deleted_at IS NULL", &[])
            .await
            .map_err(storage_err)?;
        Ok(row.get::<_, i64>(0) as u64)
    }

    async fn count_providers(&self) -> PortalResult<u64> {
        let client = self.client.lock().await;
        let row = client
            .query_one("SELECT COUNT(*) FROM providers WHERE deleted_at IS NULL", &[])
            .await
            .map_err(storage_err)?;
        Ok(row.get::<_, i64>(0) as u64)
    }

    async fn count_active_policies(&self) -> PortalResult<u64> {
        let client = self.client.lock().await;
        let row = client
            .query_one(
                "SELECT COUNT(*) FROM policies WHERE status = 'active' AND deleted_at IS NULL",
                &[],
            )
            .await
            .map_err(storage_err)?;
        Ok(row.get::<_, i64>(0) as u64)
    }

    async fn claim_status_counts(&self) -> PortalResult<Vec<StatusCount>> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT status, COUNT(*) AS n FROM claims
                 WHERE deleted_at IS NULL GROUP BY status ORDER BY n DESC",
                &[],
            )
            .await
            .map_err(storage_err)?;
        rows.iter()
            .map(|row| {
                Ok(StatusCount {
                    status: from_db_enum(row.get::<_, &str>("status"))?,
                    count: row.get::<_, i64>("n") as u64,
                })
            })
            .collect()
    }

    async fn claim_type_counts(&self) -> PortalResult<Vec<TypeCount>> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT claim_type, COUNT(*) AS n FROM claims
                 WHERE deleted_at IS NULL GROUP BY claim_type ORDER BY n DESC",
                &[],
            )
            .await
            .map_err(storage_err)?;
        rows.iter()
            .map(|row| {
                Ok(TypeCount {
                    claim_type: from_db_enum(row.get::<_, &str>("claim_type"))?,
                    count: row.get::<_, i64>("n") as u64,
                })
            })
            .collect()
    }

    async fn claim_amount_totals(&self) -> PortalResult<(f64, f64)> {
        let client = self.client.lock().await;
        let row = client
            .query_one(
                "SELECT COALESCE(SUM(total_amount), 0)::float8 AS billed,
                        COALESCE(SUM(approved_amount), 0)::float8 AS approved
                 FROM claims WHERE deleted_at IS NULL",
                &[],
            )
            .await
            .map_err(storage_err)?;
        Ok((row.get("billed"), row.get("approved")))
    }

    async fn monthly_claim_trend(&self) -> PortalResult<Vec<MonthlyTrendPoint>> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT to_char(service_date, 'YYYY-MM') AS month,
                        COUNT(*) AS n,
                        COALESCE(SUM(total_amount), 0)::float8 AS billed
                 FROM claims WHERE deleted_at IS NULL
                 GROUP BY 1 ORDER BY 1",
                &[],
            )
            .await
            .map_err(storage_err)?;
        Ok(rows
            .iter()
            .map(|row| MonthlyTrendPoint {
                month: row.get("month"),
                claim_count: row.get::<_, i64>("n") as u64,
                billed_amount: row.get("billed"),
            })
            .collect())
    }

    async fn provider_claim_stats(&self, provider_id: Uuid) -> PortalResult<ProviderStats> {
        let client = self.client.lock().await;
        let row = client
            .query_one(
                "SELECT
                    COUNT(*) FILTER (WHERE status IN ('submitted','received','under_review','appealed')) AS pending,
                    COALESCE(SUM(total_amount) FILTER (WHERE status IN ('submitted','received','under_review','appealed')), 0)::float8 AS pending_value,
                    COALESCE(SUM(approved_amount) FILTER (WHERE status = 'paid'), 0)::float8 AS revenue,
                    COUNT(*) FILTER (WHERE status IN ('approved','paid','rejected')) AS decided,
                    COUNT(*) FILTER (WHERE status IN ('approved','paid')) AS won
                 FROM claims
                 WHERE provider_id = $1 AND deleted_at IS NULL",
                &[&provider_id],
            )
            .await
            .map_err(storage_err)?;
        let decided: i64 = row.get("decided");
        let won: i64 = row.get("won");
        Ok(ProviderStats {
            pending_claims: row.get::<_, i64>("pending") as u64,
            pending_value: row.get("pending_value"),
            revenue_to_date: row.get("revenue"),
            approval_rate: if decided == 0 {
                0.0
            } else {
                won as f64 / decided as f64
            },
        })
    }
}
