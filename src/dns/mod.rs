mod allinkl;
mod name;
mod provider;
mod soap;

pub use allinkl::AllinklProvider;
pub use name::{relative_name, APEX};
pub use provider::{Credentials, DnsProvider, DnsRecord, RecordId, Session, TxtRecord};

use anyhow::{anyhow, Result};
use std::sync::Arc;

pub fn create_provider(name: &str) -> Result<Arc<dyn DnsProvider>> {
    match name.to_lowercase().as_str() {
        "allinkl" | "all-inkl" | "kas" => Ok(Arc::new(AllinklProvider::new()?)),
        _ => Err(anyhow!("Unknown DNS provider: {}", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_known_provider() {
        let provider = create_provider("AllInkl").unwrap();
        assert_eq!(provider.provider_name(), "allinkl");
    }

    #[test]
    fn test_create_unknown_provider() {
        let err = create_provider("route53").err().unwrap();
        assert_eq!(err.to_string(), "Unknown DNS provider: route53");
    }
}
