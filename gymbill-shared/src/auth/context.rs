/// Tenant context carried by every authenticated request
///
/// The billing core never infers tenant identity: callers pass the
/// `tenant_id` from this context into every service call.

use super::jwt::Claims;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of the authenticated user within the tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Gym owner/manager; may run billing manually
    Admin,

    /// Front-desk staff; registers payments and operates the drawer
    Staff,
}

/// Authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
}

impl TenantContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<Claims> for TenantContext {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            tenant_id: claims.tenant_id,
            role: claims.role,
        }
    }
}
