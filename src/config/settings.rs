use anyhow::{bail, Result};

pub const DEFAULT_GROUP_NAME: &str = "acme.johanneskueber.com";

const GROUP_NAME_ENV: &str = "GROUP_NAME";

/// Process-level settings resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// API group the webhook is registered under
    pub group_name: String,
    pub log_level: String,
}

impl Settings {
    /// Resolves settings from an explicit group name, falling back to the
    /// `GROUP_NAME` environment variable and then to the built-in default.
    pub fn load(group_name: Option<&str>, log_level: &str) -> Result<Self> {
        let env_group = std::env::var(GROUP_NAME_ENV).ok();
        Self::resolve(group_name, env_group.as_deref(), log_level)
    }

    fn resolve(explicit: Option<&str>, env_group: Option<&str>, log_level: &str) -> Result<Self> {
        let group_name = match explicit {
            Some(group) => group.trim().to_string(),
            None => env_group
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .unwrap_or(DEFAULT_GROUP_NAME)
                .to_string(),
        };

        if group_name.is_empty() {
            bail!("{} must be set/non-empty", GROUP_NAME_ENV);
        }

        Ok(Self {
            group_name,
            log_level: log_level.to_string(),
        })
    }
}
