//! Tenant configuration for the time clock.

use serde::{Deserialize, Serialize};

/// Per-tenant settings, read from the installation's configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeClockConfig {
    /// Worked minutes are rounded up to a multiple of this; `0` disables rounding.
    #[serde(default)]
    pub rounding_minutes: u32,
    /// Whether clocking in requires a ticket reference.
    #[serde(default)]
    pub require_ticket: bool,
}
