mod cache;
mod challenge;

pub use cache::RecordCache;
pub use challenge::{
    ChallengeAction, ChallengePayload, ChallengeRequest, ChallengeResponse, ChallengeStatus,
};

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::load_config;
use crate::dns::{create_provider, relative_name, DnsProvider, DnsRecord, Session, TxtRecord};
use crate::error::{Result, SolverError};
use crate::secrets::{get_credentials, KubeSecretStore, SecretStore};

pub const SOLVER_NAME: &str = "allinkl";

/// Contract between the certificate controller and a DNS-01 solver.
#[async_trait]
pub trait Solver: Send + Sync {
    /// Must match the issuer's `solverName`
    fn name(&self) -> &str;

    /// One-time setup before any challenge is handled. Not safe to call
    /// concurrently with other methods.
    async fn initialize(&mut self, cluster: kube::Config, stop: watch::Receiver<bool>)
        -> Result<()>;

    /// Publish the challenge TXT record
    async fn present(&self, request: &ChallengeRequest) -> Result<()>;

    /// Remove the TXT record published by [`Solver::present`]
    async fn cleanup(&self, request: &ChallengeRequest) -> Result<()>;
}

/// DNS-01 solver for zones hosted at All-Inkl.
///
/// Credentials are resolved and a fresh provider session is opened on every
/// call. Identifiers of created records are remembered per FQDN so CleanUp
/// can delete exactly the record Present created.
#[derive(Default)]
pub struct AllinklSolver {
    secrets: Option<Arc<dyn SecretStore>>,
    provider: Option<Arc<dyn DnsProvider>>,
    records: RecordCache,
}

impl AllinklSolver {
    /// Returns an uninitialized solver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a solver that is ready to use with the given collaborators.
    pub fn with_parts(secrets: Arc<dyn SecretStore>, provider: Arc<dyn DnsProvider>) -> Self {
        Self {
            secrets: Some(secrets),
            provider: Some(provider),
            records: RecordCache::new(),
        }
    }

    pub fn records(&self) -> &RecordCache {
        &self.records
    }

    /// Decodes the config, resolves credentials and opens a provider session.
    async fn login(&self, request: &ChallengeRequest) -> Result<(&dyn DnsProvider, Session)> {
        let (Some(secrets), Some(provider)) = (self.secrets.as_deref(), self.provider.as_deref())
        else {
            return Err(SolverError::NotInitialized);
        };

        let cfg = load_config(request.config.as_ref())?;
        let credentials = get_credentials(secrets, &cfg, &request.resource_namespace).await?;

        let session = provider
            .authenticate(&credentials)
            .await
            .map_err(SolverError::provider)?;
        debug!("Authenticated with {}", provider.provider_name());

        Ok((provider, session))
    }

    /// Lists the TXT records currently present in the request's zone.
    pub async fn txt_records(&self, request: &ChallengeRequest) -> Result<Vec<DnsRecord>> {
        let (provider, session) = self.login(request).await?;

        let records = provider
            .list_records(&session, &request.resolved_zone)
            .await
            .map_err(SolverError::provider)?;

        Ok(records
            .into_iter()
            .filter(|r| r.record_type.eq_ignore_ascii_case("TXT"))
            .collect())
    }
}

#[async_trait]
impl Solver for AllinklSolver {
    fn name(&self) -> &str {
        SOLVER_NAME
    }

    async fn initialize(
        &mut self,
        cluster: kube::Config,
        _stop: watch::Receiver<bool>,
    ) -> Result<()> {
        let secrets = KubeSecretStore::from_config(cluster).map_err(SolverError::Cluster)?;
        let provider = create_provider(SOLVER_NAME).map_err(SolverError::provider)?;

        self.secrets = Some(Arc::new(secrets));
        self.provider = Some(provider);
        Ok(())
    }

    async fn present(&self, request: &ChallengeRequest) -> Result<()> {
        let (provider, session) = self.login(request).await?;
        let name = relative_name(&request.resolved_fqdn, &request.resolved_zone)?;

        info!(
            "Presenting TXT record {} in zone {} for {}",
            name, request.resolved_zone, request.resolved_fqdn
        );

        let id = provider
            .add_record(
                &session,
                &request.resolved_zone,
                &TxtRecord::new(&name, &request.key),
            )
            .await
            .map_err(SolverError::provider)?;

        debug!("Created record {} for {}", id, request.resolved_fqdn);
        self.records.record(&request.resolved_fqdn, id);
        Ok(())
    }

    async fn cleanup(&self, request: &ChallengeRequest) -> Result<()> {
        let (provider, session) = self.login(request).await?;

        let id = self
            .records
            .lookup(&request.resolved_fqdn)
            .ok_or_else(|| SolverError::UnknownRecordId {
                fqdn: request.resolved_fqdn.clone(),
            })?;

        info!(
            "Cleaning up TXT record {} for {}",
            id, request.resolved_fqdn
        );

        provider
            .delete_record(&session, &id)
            .await
            .map_err(SolverError::provider)
    }
}
