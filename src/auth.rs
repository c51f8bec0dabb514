//! Identity collaborator interface.
//!
//! Authentication and session management live in an upstream identity
//! provider; by the time a request reaches this service the gateway has
//! already verified the session and attached the caller's id and role as
//! trusted headers. This module only reads them and gates admin-only
//! operations.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

use crate::errors::ServiceError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Guest,
    Operator,
    Admin,
}

impl Role {
    pub fn from_str(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            "operator" => Role::Operator,
            _ => Role::Guest,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::Operator)
    }
}

/// Caller identity extracted from the gateway-supplied headers.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: Option<String>,
    pub role: Role,
}

impl AuthSession {
    /// Fails with `Forbidden` unless the caller carries an admin/operator role.
    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "administrator role required".to_string(),
            ))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(Role::from_str)
            .unwrap_or(Role::Guest);

        Ok(AuthSession { user_id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing() {
        assert_eq!(Role::from_str("admin"), Role::Admin);
        assert_eq!(Role::from_str("operator"), Role::Operator);
        assert_eq!(Role::from_str("anything-else"), Role::Guest);
    }

    #[test]
    fn admin_gate() {
        let admin = AuthSession {
            user_id: Some("u1".into()),
            role: Role::Admin,
        };
        assert!(admin.require_admin().is_ok());

        let guest = AuthSession {
            user_id: None,
            role: Role::Guest,
        };
        assert!(guest.require_admin().is_err());
    }
}
