//! CLI command implementations

pub mod configure;
pub mod document;
pub mod objects;
pub mod password;
pub mod schema;

use std::path::PathBuf;

use serde_json::Value;

use crate::api::{ApiClient, ApiError};
use crate::cli::config::ProfileStore;
use crate::cli::error::CliError;

/// Global options shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit profile file, overriding the default location
    pub config_path: Option<PathBuf>,
    pub profile: String,
}

impl Context {
    pub fn profile_store(&self) -> Result<ProfileStore, CliError> {
        let path = match &self.config_path {
            Some(path) => path.clone(),
            None => ProfileStore::default_path()?,
        };
        ProfileStore::load(&path)
    }

    /// Log in with the active profile
    pub fn connect(&self) -> Result<ApiClient, CliError> {
        let profile = self.profile_store()?.resolve(&self.profile)?;
        tracing::debug!("Connecting with profile '{}': {:?}", self.profile, profile);
        Ok(ApiClient::connect(profile.client_config())?)
    }
}

/// The `url` field of an API object
pub fn url_of(object: &Value) -> Result<String, CliError> {
    object
        .get("url")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            CliError::Api(ApiError::Protocol {
                endpoint: object
                    .get("id")
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
                message: "object has no 'url'".to_string(),
            })
        })
}

/// Parse a JSON command-line argument
pub fn json_arg(name: &str, raw: &str) -> Result<Value, CliError> {
    serde_json::from_str(raw)
        .map_err(|e| CliError::InvalidArgument(format!("--{} is not valid JSON: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_of() {
        assert_eq!(url_of(&json!({"url": "https://x/v1/queues/1"})).unwrap(), "https://x/v1/queues/1");
        assert!(url_of(&json!({"id": 1})).is_err());
    }

    #[test]
    fn test_json_arg() {
        assert_eq!(json_arg("values", r#"{"a": 1}"#).unwrap(), json!({"a": 1}));
        assert!(matches!(json_arg("values", "{"), Err(CliError::InvalidArgument(_))));
    }
}
