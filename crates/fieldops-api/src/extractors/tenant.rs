//! `TenantContext` extractor: resolves the tenant and acting user from headers.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use fieldops_core::TenantId;
use fieldops_core::error::AppError;
use fieldops_service::context::RequestContext;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the acting user's id.
pub const USER_HEADER: &str = "x-user-id";

/// Tenant-scoped request context available in handlers.
#[derive(Debug, Clone)]
pub struct TenantContext(pub RequestContext);

impl TenantContext {
    /// Returns the inner `RequestContext`.
    pub fn context(&self) -> &RequestContext {
        &self.0
    }
}

impl std::ops::Deref for TenantContext {
    type Target = RequestContext;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Reads the tenant from `tenant_header`.
///
/// A missing header is an authentication failure; a malformed code is a
/// validation failure.
pub fn resolve_tenant(headers: &HeaderMap, tenant_header: &str) -> Result<TenantId, AppError> {
    let raw = headers
        .get(tenant_header)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::authentication(format!("Missing {tenant_header} header")))?;
    TenantId::parse(raw)
}

impl FromRequestParts<AppState> for TenantContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let tenant = resolve_tenant(&parts.headers, &state.config.plugins.tenant_header)?;

        let user_id = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);

        Ok(TenantContext(RequestContext::new(tenant, user_id)))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use fieldops_core::error::ErrorKind;

    use super::*;

    #[test]
    fn test_resolve_tenant() {
        let mut headers = HeaderMap::new();
        let err = resolve_tenant(&headers, "x-tenant-id").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);

        headers.insert("x-tenant-id", HeaderValue::from_static("T1"));
        assert_eq!(resolve_tenant(&headers, "x-tenant-id").unwrap().as_str(), "T1");

        headers.insert("x-tenant-id", HeaderValue::from_static("T 1"));
        let err = resolve_tenant(&headers, "x-tenant-id").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
