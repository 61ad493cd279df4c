//! Tenant identifier.
//!
//! Tenants are addressed by their company code, a short slug that also
//! namespaces tenant data. Unlike catalog ids, a company code is chosen by
//! people, so it is validated on construction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Maximum length of a company code.
const MAX_LEN: usize = 64;

/// A validated tenant (company) code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Parse and validate a company code.
    pub fn parse(value: impl Into<String>) -> Result<Self, AppError> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(AppError::validation("Tenant id must not be empty"));
        }
        if trimmed.len() > MAX_LEN {
            return Err(AppError::validation(format!(
                "Tenant id must be at most {MAX_LEN} characters"
            )));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        {
            return Err(AppError::validation(format!(
                "Tenant id '{trimmed}' contains invalid characters"
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Return the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TenantId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TenantId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> String {
        id.0
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_accepts_slugs() {
        let id = TenantId::parse("  ACME_01 ").unwrap();
        assert_eq!(id.as_str(), "ACME_01");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(TenantId::parse("").is_err());
        assert!(TenantId::parse("acme corp").is_err());
        assert!(TenantId::parse("../etc").is_err());
        assert!(TenantId::parse("x".repeat(65)).is_err());
    }

    #[test]
    fn test_serde_validates() {
        let ok: TenantId = serde_json::from_str("\"T1\"").unwrap();
        assert_eq!(ok.to_string(), "T1");
        assert!(serde_json::from_str::<TenantId>("\"bad id\"").is_err());
    }
}
