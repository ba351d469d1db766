//! Request context extraction.
//!
//! Identity is resolved upstream (gateway or auth proxy) and forwarded in
//! headers:
//! - `x-user-id` (required)
//! - `x-company-id` (optional)
//! - `x-user-role` (required: owner, admin, trader or member)

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::types::{RequestContext, Role};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const COMPANY_ID_HEADER: &str = "x-company-id";
pub const ROLE_HEADER: &str = "x-user-role";

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized("missing x-user-id".to_string()))?;

        let role: Role = header(parts, ROLE_HEADER)
            .ok_or_else(|| AppError::Unauthorized("missing x-user-role".to_string()))?
            .parse()
            .map_err(AppError::Unauthorized)?;

        let company_id = header(parts, COMPANY_ID_HEADER).map(str::to_string);

        Ok(RequestContext::new(user_id, company_id, role))
    }
}
