use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Role, User};
use crate::error::{ApiError, ApiResult};

/// Authenticated caller, with the user row loaded fresh from the store
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,

    pub user: User,

    /// ID of the presented access token
    pub jti: Uuid,

    pub expires_at: DateTime<Utc>,
}

impl AuthContext {
    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }

    /// 403 unless the caller has one of `roles`.
    pub fn require_role(&self, roles: &[Role]) -> ApiResult<()> {
        if roles.contains(&self.user.role) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "This action requires one of: {}",
                roles
                    .iter()
                    .map(Role::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )))
        }
    }

    /// 403 unless the caller is `owner` or an admin.
    pub fn require_owner_or_admin(&self, owner: Uuid) -> ApiResult<()> {
        if self.user_id == owner || self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("You do not have access to this resource"))
        }
    }
}
