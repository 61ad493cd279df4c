//! Request DTOs with validation.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use fieldops_core::error::AppError;

use crate::error::ApiError;

/// Install request body. The whole body is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct InstallPluginRequest {
    /// Tenant configuration to store with the installation.
    #[validate(custom(function = "validate_configuration"))]
    pub configuration: Option<serde_json::Value>,
}

/// Configure request body.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ConfigurePluginRequest {
    /// New tenant configuration.
    #[validate(custom(function = "validate_configuration"))]
    pub configuration: serde_json::Value,
}

fn validate_configuration(value: &serde_json::Value) -> Result<(), ValidationError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(ValidationError::new("configuration")
            .with_message("configuration must be a JSON object".into()))
    }
}

/// Parses and validates a JSON body; an empty body yields the default.
pub fn parse_optional<T>(body: &[u8]) -> Result<T, ApiError>
where
    T: DeserializeOwned + Default + Validate,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    parse_required(body)
}

/// Parses and validates a JSON body.
pub fn parse_required<T>(body: &[u8]) -> Result<T, ApiError>
where
    T: DeserializeOwned + Validate,
{
    let value: T = serde_json::from_slice(body)
        .map_err(|e| AppError::validation(format!("Invalid request body: {e}")))?;
    value
        .validate()
        .map_err(|e| AppError::validation(format!("Invalid request body: {e}")))?;
    Ok(value)
}
