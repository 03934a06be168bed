use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;

use super::SecretStore;

type SecretData = BTreeMap<String, Vec<u8>>;

/// Secrets held in process memory, keyed by namespace and name.
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<(String, String), SecretData>>,
}

impl fmt::Debug for MemorySecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secrets = self.secrets.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("MemorySecretStore")
            .field("secrets", &secrets.len())
            .finish()
    }
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, namespace: &str, name: &str, key: &str, value: impl Into<Vec<u8>>) {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((namespace.to_string(), name.to_string()))
            .or_default()
            .insert(key.to_string(), value.into());
    }

    /// Loads secrets from a JSON file shaped as
    /// `{"<namespace>/<name>": {"<key>": "<value>"}}`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read secrets file: {}", path.display()))?;

        let file: HashMap<String, BTreeMap<String, String>> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse secrets file: {}", path.display()))?;

        let store = Self::new();
        for (location, data) in file {
            let (namespace, name) = location.split_once('/').ok_or_else(|| {
                anyhow!(
                    "Invalid secret location {:?} in {}: expected <namespace>/<name>",
                    location,
                    path.display()
                )
            })?;
            for (key, value) in data {
                store.insert(namespace, name, &key, value);
            }
        }

        Ok(store)
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<SecretData> {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("secrets \"{}\" not found", name))
    }
}
