//! Wire types exchanged with the certificate controller.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const API_VERSION: &str = "webhook.acme.cert-manager.io/v1alpha1";
pub const KIND: &str = "ChallengePayload";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeAction {
    Present,
    CleanUp,
}

/// A single DNS-01 challenge as handed to the solver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ChallengeAction>,
    #[serde(default, rename = "type")]
    pub challenge_type: String,
    #[serde(default)]
    pub dns_name: String,
    /// TXT record value
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub resource_namespace: String,
    #[serde(default, rename = "resolvedFQDN")]
    pub resolved_fqdn: String,
    #[serde(default)]
    pub resolved_zone: String,
    #[serde(default)]
    pub allow_ambient_credentials: bool,
    /// Solver-specific configuration from the issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChallengeStatus {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub uid: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ChallengeStatus>,
}

impl ChallengeResponse {
    pub fn success(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            success: true,
            status: None,
        }
    }

    pub fn failure(uid: &str, message: impl Into<String>) -> Self {
        Self {
            uid: uid.to_string(),
            success: false,
            status: Some(ChallengeStatus {
                status: "Failure".to_string(),
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengePayload {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<ChallengeRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ChallengeResponse>,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_kind() -> String {
    KIND.to_string()
}

impl ChallengePayload {
    pub fn response(response: ChallengeResponse) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            request: None,
            response: Some(response),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload() {
        let payload: ChallengePayload = serde_json::from_str(
            r#"{
                "apiVersion": "webhook.acme.cert-manager.io/v1alpha1",
                "kind": "ChallengePayload",
                "request": {
                    "uid": "4f1c",
                    "action": "Present",
                    "type": "dns-01",
                    "dnsName": "example.com",
                    "key": "LoqXcYV8q5ONbJQxbmR7SCTNo3tiAXDfowyjxAjEuX0",
                    "resourceNamespace": "cert-manager",
                    "resolvedFQDN": "_acme-challenge.example.com.",
                    "resolvedZone": "example.com.",
                    "allowAmbientCredentials": false,
                    "config": {"usernameKeySecretRef": {"name": "allinkl", "key": "username"}}
                }
            }"#,
        )
        .unwrap();

        let request = payload.request.unwrap();
        assert_eq!(request.action, Some(ChallengeAction::Present));
        assert_eq!(request.resolved_fqdn, "_acme-challenge.example.com.");
        assert_eq!(request.resolved_zone, "example.com.");
        assert_eq!(request.resource_namespace, "cert-manager");
        assert!(request.config.is_some());
    }

    #[test]
    fn test_failure_response_json() {
        let payload = ChallengePayload::response(ChallengeResponse::failure("4f1c", "boom"));
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["kind"], "ChallengePayload");
        assert_eq!(json["response"]["success"], false);
        assert_eq!(json["response"]["status"]["message"], "boom");
        assert!(json.get("request").is_none());
    }
}
