use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Login for the DNS provider. Only lives for one solver call.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Authenticated provider context returned by [`DnsProvider::authenticate`].
#[derive(Clone)]
pub struct Session {
    pub login: String,
    pub token: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("login", &"<redacted>")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Provider-assigned identifier of a single DNS record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A TXT record to be created, named relative to its zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxtRecord {
    pub name: String,
    pub data: String,
}

impl TxtRecord {
    pub fn new(name: &str, data: &str) -> Self {
        Self {
            name: name.to_string(),
            data: data.to_string(),
        }
    }
}

/// A record as reported by the provider's zone listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsRecord {
    pub id: RecordId,
    pub zone: String,
    pub name: String,
    pub record_type: String,
    pub data: String,
}

#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Log in and obtain a session for subsequent calls
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session>;

    /// Create a TXT record in `zone` and return its identifier
    async fn add_record(&self, session: &Session, zone: &str, record: &TxtRecord)
        -> Result<RecordId>;

    /// List every record of `zone`
    async fn list_records(&self, session: &Session, zone: &str) -> Result<Vec<DnsRecord>>;

    /// Delete a record by identifier
    async fn delete_record(&self, session: &Session, id: &RecordId) -> Result<()>;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;
}
