mod kube_store;
mod memory;

pub use kube_store::KubeSecretStore;
pub use memory::MemorySecretStore;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::config::{SecretKeySelector, SolverConfig};
use crate::dns::Credentials;
use crate::error::{Result, SolverError};

/// Read-only access to namespaced secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the data of secret `name` in `namespace`
    async fn get(&self, namespace: &str, name: &str) -> anyhow::Result<BTreeMap<String, Vec<u8>>>;
}

/// Returns the value stored under `selector.key` in secret `selector.name`.
///
/// Errors name the namespace, secret and key. They never carry secret data.
pub async fn load_secret_key(
    store: &dyn SecretStore,
    selector: &SecretKeySelector,
    namespace: &str,
) -> Result<Vec<u8>> {
    let mut data = store
        .get(namespace, &selector.name)
        .await
        .map_err(|source| SolverError::SecretNotFound {
            namespace: namespace.to_string(),
            name: selector.name.clone(),
            source,
        })?;

    data.remove(&selector.key).ok_or_else(|| SolverError::Credential {
        namespace: namespace.to_string(),
        name: selector.name.clone(),
        key: selector.key.clone(),
    })
}

/// Resolves the provider login referenced by `cfg`.
pub async fn get_credentials(
    store: &dyn SecretStore,
    cfg: &SolverConfig,
    namespace: &str,
) -> Result<Credentials> {
    let username = load_secret_key(store, &cfg.username_secret_ref, namespace).await?;
    let password = load_secret_key(store, &cfg.password_secret_ref, namespace).await?;

    Ok(Credentials::new(
        String::from_utf8_lossy(&username),
        String::from_utf8_lossy(&password),
    ))
}
