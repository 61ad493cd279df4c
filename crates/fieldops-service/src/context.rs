//! Request context carrying the tenant and the acting user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fieldops_core::TenantId;

/// Context for the current request.
///
/// Built by the API layer and passed into service methods so that every
/// operation knows *which* tenant it runs for and *who* is acting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Tenant the request is for.
    pub tenant: TenantId,
    /// Acting user, when the caller supplied one.
    pub user_id: Option<String>,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a new request context.
    pub fn new(tenant: TenantId, user_id: Option<String>) -> Self {
        Self {
            tenant,
            user_id,
            request_time: Utc::now(),
        }
    }
}
