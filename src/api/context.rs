//! Caller identity forwarded by the authenticating edge proxy.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::CommerceError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";
pub const ROLE_HEADER: &str = "x-user-role";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Role {
    #[default]
    Customer,
    Seller,
    Admin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestContext {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
}

impl RequestContext {
    pub fn is_admin(&self) -> bool { self.role == Role::Admin }

    pub fn require_admin(&self) -> Result<(), CommerceError> {
        if self.is_admin() { Ok(()) } else { Err(CommerceError::Forbidden("admin role required".into())) }
    }

    pub fn require_seller_or_admin(&self) -> Result<(), CommerceError> {
        match self.role {
            Role::Seller | Role::Admin => Ok(()),
            Role::Customer => Err(CommerceError::Forbidden("seller or admin role required".into())),
        }
    }

    /// Customers may only act on their own records.
    pub fn require_owner_or_admin(&self, owner: Uuid) -> Result<(), CommerceError> {
        if self.is_admin() || self.user_id == owner { Ok(()) } else { Err(CommerceError::Forbidden("not your resource".into())) }
    }
}

fn header_uuid(parts: &Parts, name: &str) -> Result<Uuid, CommerceError> {
    let raw = parts
        .headers
        .get(name)
        .ok_or_else(|| CommerceError::Unauthorized(format!("missing {name} header")))?;
    raw.to_str()
        .ok()
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or_else(|| CommerceError::Unauthorized(format!("malformed {name} header")))
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = CommerceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = header_uuid(parts, TENANT_HEADER)?;
        let user_id = header_uuid(parts, USER_HEADER)?;
        let role = match parts.headers.get(ROLE_HEADER).and_then(|v| v.to_str().ok()).map(str::trim) {
            None | Some("") | Some("customer") => Role::Customer,
            Some("seller") => Role::Seller,
            Some("admin") => Role::Admin,
            Some(other) => return Err(CommerceError::Unauthorized(format!("unknown role {other}"))),
        };
        Ok(Self { tenant_id, user_id, role })
    }
}
