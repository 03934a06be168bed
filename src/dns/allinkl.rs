use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use super::provider::{Credentials, DnsProvider, DnsRecord, RecordId, Session, TxtRecord};
use super::soap::{self, KasValue, SoapResponse};

const KAS_AUTH_URL: &str = "https://kasapi.kasserver.com/soap/KasAuth.php";
const KAS_API_URL: &str = "https://kasapi.kasserver.com/soap/KasApi.php";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SESSION_LIFETIME_SECS: u32 = 60;
const MAX_FLOOD_DELAY: Duration = Duration::from_secs(5);

/// DNS provider for zones hosted at All-Inkl, driven through the KAS SOAP API.
///
/// Every KAS reply announces a flood delay; the next request made through
/// the same provider waits until it has passed, for at most
/// `MAX_FLOOD_DELAY`.
pub struct AllinklProvider {
    client: Client,
    auth_url: String,
    api_url: String,
    flood_until: Mutex<Option<Instant>>,
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    kas_login: &'a str,
    kas_auth_type: &'static str,
    kas_auth_data: &'a str,
    session_lifetime: u32,
    session_update_lifetime: &'static str,
}

#[derive(Serialize)]
struct ApiRequest<'a, P> {
    kas_login: &'a str,
    kas_auth_type: &'static str,
    kas_auth_data: &'a str,
    kas_action: &'a str,
    #[serde(rename = "KasRequestParams")]
    params: P,
}

#[derive(Serialize)]
struct AddDnsSettings<'a> {
    zone_host: &'a str,
    record_type: &'static str,
    record_name: &'a str,
    record_data: &'a str,
}

#[derive(Serialize)]
struct GetDnsSettings<'a> {
    zone_host: &'a str,
    record_id: &'static str,
}

#[derive(Serialize)]
struct DeleteDnsSettings<'a> {
    record_id: &'a str,
}

impl AllinklProvider {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            auth_url: KAS_AUTH_URL.to_string(),
            api_url: KAS_API_URL.to_string(),
            flood_until: Mutex::new(None),
        })
    }

    pub fn with_endpoints(mut self, auth_url: impl Into<String>, api_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self.api_url = api_url.into();
        self
    }

    async fn wait_for_flood_delay(&self) {
        let until = *self.flood_until.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(until) = until {
            tokio::time::sleep_until(until).await;
        }
    }

    fn note_flood_delay(&self, response: &KasValue) {
        let delay = response
            .get("KasFloodDelay")
            .and_then(KasValue::as_text)
            .and_then(|d| d.parse::<f64>().ok())
            .and_then(|d| Duration::try_from_secs_f64(d).ok())
            .map(|d| d.min(MAX_FLOOD_DELAY));

        if let Some(until) = delay.and_then(|d| Instant::now().checked_add(d)) {
            *self.flood_until.lock().unwrap_or_else(PoisonError::into_inner) = Some(until);
        }
    }

    async fn post<T: Serialize>(&self, url: &str, operation: &str, params: &T) -> Result<KasValue> {
        let params = serde_json::to_string(params).context("Failed to encode KAS request")?;

        self.wait_for_flood_delay().await;

        let response = self
            .client
            .post(url)
            .header("Content-Type", "text/xml; charset=utf-8")
            .body(soap::envelope(operation, &params))
            .send()
            .await
            .with_context(|| format!("Failed to send {} request to KAS", operation))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read KAS response")?;

        match soap::parse_response(&body) {
            Ok(SoapResponse::Return(value)) if status.is_success() => Ok(value),
            Ok(SoapResponse::Fault(reason)) => Err(anyhow!("{}", reason)),
            _ => Err(anyhow!("KAS API error ({}): {}", status, body)),
        }
    }

    /// Runs one KAS action and returns its `Response` map.
    async fn call<P: Serialize>(&self, session: &Session, action: &str, params: P) -> Result<KasValue> {
        debug!("KAS action {}", action);

        let request = ApiRequest {
            kas_login: &session.login,
            kas_auth_type: "session",
            kas_auth_data: &session.token,
            kas_action: action,
            params,
        };

        let value = self
            .post(&self.api_url, "KasApi", &request)
            .await
            .with_context(|| format!("{} failed", action))?;

        let response = value
            .get("Response")
            .cloned()
            .ok_or_else(|| anyhow!("{} returned no Response", action))?;

        self.note_flood_delay(&response);
        Ok(response)
    }
}

fn return_string<'a>(response: &'a KasValue, action: &str) -> Result<&'a str> {
    response
        .get("ReturnString")
        .and_then(KasValue::as_text)
        .ok_or_else(|| anyhow!("{} returned no ReturnString", action))
}

fn field(item: &KasValue, key: &str) -> String {
    item.get(key)
        .and_then(KasValue::as_text)
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl DnsProvider for AllinklProvider {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session> {
        let request = AuthRequest {
            kas_login: &credentials.username,
            kas_auth_type: "plain",
            kas_auth_data: &credentials.password,
            session_lifetime: SESSION_LIFETIME_SECS,
            session_update_lifetime: "Y",
        };

        let value = self
            .post(&self.auth_url, "KasAuth", &request)
            .await
            .context("authentication failed")?;

        let token = value
            .as_text()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("authentication failed: no session token returned"))?;

        Ok(Session {
            login: credentials.username.clone(),
            token: token.to_string(),
        })
    }

    async fn add_record(
        &self,
        session: &Session,
        zone: &str,
        record: &TxtRecord,
    ) -> Result<RecordId> {
        let response = self
            .call(
                session,
                "add_dns_settings",
                AddDnsSettings {
                    zone_host: zone,
                    record_type: "TXT",
                    record_name: &record.name,
                    record_data: &record.data,
                },
            )
            .await?;

        let id = return_string(&response, "add_dns_settings")?;
        if id.is_empty() {
            bail!("add_dns_settings returned an empty record id");
        }

        Ok(RecordId::new(id))
    }

    async fn list_records(&self, session: &Session, zone: &str) -> Result<Vec<DnsRecord>> {
        let response = self
            .call(
                session,
                "get_dns_settings",
                GetDnsSettings {
                    zone_host: zone,
                    record_id: "",
                },
            )
            .await?;

        let records = response
            .get("ReturnInfo")
            .map(KasValue::items)
            .unwrap_or_default()
            .iter()
            .map(|item| DnsRecord {
                id: RecordId::new(field(item, "record_id")),
                zone: field(item, "record_zone"),
                name: field(item, "record_name"),
                record_type: field(item, "record_type"),
                data: field(item, "record_data"),
            })
            .collect();

        Ok(records)
    }

    async fn delete_record(&self, session: &Session, id: &RecordId) -> Result<()> {
        let response = self
            .call(
                session,
                "delete_dns_settings",
                DeleteDnsSettings {
                    record_id: id.as_str(),
                },
            )
            .await?;

        match return_string(&response, "delete_dns_settings")? {
            "TRUE" => Ok(()),
            other => Err(anyhow!("delete_dns_settings for record {} returned {}", id, other)),
        }
    }

    fn provider_name(&self) -> &'static str {
        "allinkl"
    }
}
