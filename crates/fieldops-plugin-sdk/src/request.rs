//! Typed access to request bodies and plugin configuration.

use serde::de::DeserializeOwned;

use fieldops_plugin::{PluginError, PluginRequest};

/// Deserialize the request body; an empty body reads as `{}`.
pub fn body_as<T: DeserializeOwned>(request: &PluginRequest) -> Result<T, PluginError> {
    let body = if request.body.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        request.body.clone()
    };
    Ok(serde_json::from_value(body)?)
}

/// Deserialize tenant configuration; a missing configuration reads as `{}`.
pub fn config_as<T: DeserializeOwned>(config: &serde_json::Value) -> Result<T, PluginError> {
    let value = if config.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        config.clone()
    };
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Settings {
        #[serde(default)]
        rounding_minutes: u32,
    }

    #[test]
    fn test_config_defaults_when_missing() {
        let parsed: Settings = config_as(&serde_json::Value::Null).unwrap();
        assert_eq!(parsed, Settings { rounding_minutes: 0 });

        let parsed: Settings = config_as(&json!({ "rounding_minutes": 15 })).unwrap();
        assert_eq!(parsed.rounding_minutes, 15);

        assert!(config_as::<Settings>(&json!({ "rounding_minutes": "x" })).is_err());
    }
}
