//! Member profile lookup for the dashboards. Members read themselves;
//! admins read anyone.

use std::sync::Arc;

use uuid::Uuid;

use models::errors::{PortalError, PortalResult};
use models::member::Member;
use models::user::{AuthContext, Role};
use storage::PortalStorage;

pub struct MembersService {
    store: Arc<dyn PortalStorage>,
}

impl MembersService {
    pub fn new(store: Arc<dyn PortalStorage>) -> Self {
        MembersService { store }
    }

    pub async fn get(&self, ctx: &AuthContext, id: Uuid) -> PortalResult<Member> {
        let allowed = match ctx.role {
            Role::Admin => true,
            Role::Member => ctx.member_id == Some(id),
            _ => false,
        };
        if !allowed {
            return Err(PortalError::Forbidden(
                "member profiles are visible to the member themselves and admins".to_string(),
            ));
        }
        self.store
            .get_member(id)
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("member {}", id)))
    }
}
