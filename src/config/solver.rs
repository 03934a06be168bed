use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SolverError};

/// Reference to a single key inside a namespaced secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKeySelector {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub key: String,
}

/// Per-issuer solver configuration carried in the challenge request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default, rename = "usernameKeySecretRef")]
    pub username_secret_ref: SecretKeySelector,
    #[serde(default, rename = "passwordKeySecretRef")]
    pub password_secret_ref: SecretKeySelector,
}

/// Decodes the raw config blob. A missing blob yields the empty config.
pub fn load_config(raw: Option<&Value>) -> Result<SolverConfig> {
    match raw {
        None | Some(Value::Null) => Ok(SolverConfig::default()),
        Some(value) => SolverConfig::deserialize(value).map_err(SolverError::Config),
    }
}
