//! Trusted identity assertion.
//!
//! Token verification happens upstream; by the time a request reaches a
//! handler the `x-user-id` / `x-user-role` headers carry an
//! already-authenticated identity. Handlers only branch on the role.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Admin,
    Customer,
    Anonymous,
}

#[derive(Clone, Copy, Debug)]
pub struct Identity {
    pub user_id: Option<Uuid>,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_user(&self) -> Result<Uuid, ApiError> {
        self.user_id.ok_or(ApiError::Unauthorized)
    }

    pub fn require_admin(&self) -> Result<Uuid, ApiError> {
        if self.role != Role::Admin {
            return Err(ApiError::Forbidden);
        }
        self.require_user()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok());
        let role = match parts.headers.get("x-user-role").and_then(|v| v.to_str().ok()) {
            Some("admin") => Role::Admin,
            _ if user_id.is_some() => Role::Customer,
            _ => Role::Anonymous,
        };
        Ok(Identity { user_id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn identity_for(headers: &[(&str, &str)]) -> Identity {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        Identity::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn missing_headers_mean_anonymous() {
        let identity = identity_for(&[]).await;
        assert_eq!(identity.role, Role::Anonymous);
        assert!(identity.require_user().is_err());
    }

    #[tokio::test]
    async fn user_id_alone_makes_a_customer() {
        let identity = identity_for(&[("x-user-id", "018f0e3c-0000-7000-8000-000000000001")]).await;
        assert_eq!(identity.role, Role::Customer);
        assert!(identity.require_admin().is_err());
    }

    #[tokio::test]
    async fn admin_role_header_is_honored() {
        let identity = identity_for(&[
            ("x-user-id", "018f0e3c-0000-7000-8000-000000000001"),
            ("x-user-role", "admin"),
        ])
        .await;
        assert!(identity.is_admin());
        assert!(identity.require_admin().is_ok());
    }

    #[tokio::test]
    async fn malformed_user_id_is_ignored() {
        let identity = identity_for(&[("x-user-id", "not-a-uuid")]).await;
        assert_eq!(identity.role, Role::Anonymous);
        assert!(identity.user_id.is_none());
    }
}
