//! Error types returned by the solver to its host.
//!
//! Every variant carries only non-sensitive context: namespaces, secret
//! names and keys may appear, secret values never do.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SolverError>;

#[derive(Error, Debug)]
pub enum SolverError {
    /// The provider configuration blob could not be decoded
    #[error("error decoding solver config: {0}")]
    Config(#[source] serde_json::Error),

    /// The referenced secret could not be loaded
    #[error("failed to load secret \"{namespace}/{name}\": {source}")]
    SecretNotFound {
        namespace: String,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// The secret exists but does not hold the referenced key
    #[error("no key \"{key}\" in secret \"{namespace}/{name}\"")]
    Credential {
        namespace: String,
        name: String,
        key: String,
    },

    #[error("fqdn \"{fqdn}\" is not within zone \"{zone}\"")]
    NotWithinZone { fqdn: String, zone: String },

    /// Authentication or API failure at the DNS provider
    #[error("allinkl: {0:#}")]
    Provider(#[source] anyhow::Error),

    /// CleanUp was asked to remove a record this process never created
    #[error("unknown record ID for \"{fqdn}\"")]
    UnknownRecordId { fqdn: String },

    #[error("solver used before initialize")]
    NotInitialized,

    /// Building the cluster client failed during initialize
    #[error("failed to create kubernetes client: {0}")]
    Cluster(#[source] kube::Error),
}

impl SolverError {
    pub fn provider(err: anyhow::Error) -> Self {
        Self::Provider(err)
    }
}
