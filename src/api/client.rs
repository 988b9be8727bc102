//! Authenticated JSON-over-HTTPS client for the Porkbun API.

use super::{DnsRecord, Envelope, RecordType, RecordsPayload, SslBundle};
use super::STATUS_SUCCESS;
use crate::config::{Config, Credentials};
use crate::error::{PorkbunError, Result};
use reqwest::header::ACCEPT;
use serde_json::{json, Map, Value};
use std::time::Duration;

pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sole network egress to the registrar API.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl ApiClient {
    /// Create a client for the configured host and API root.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_base_url(
            config.credentials.clone(),
            format!("{}{}", config.host, config.api_root),
        )
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(credentials: Credentials, base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// POST `body` to `endpoint` and return the envelope if its status is SUCCESS.
    pub async fn call(&self, endpoint: &str, body: Option<Map<String, Value>>) -> Result<Envelope> {
        let endpoint = endpoint.trim_start_matches('/');
        let url = format!("{}/{}", self.base_url, endpoint);
        let body = body.unwrap_or_default();

        let shown = Value::Object(body.clone());
        tracing::debug!("POST {} body={}", endpoint, shown);

        let mut payload = body;
        payload.insert(
            "apikey".to_string(),
            Value::String(self.credentials.api_key.clone()),
        );
        payload.insert(
            "secretapikey".to_string(),
            Value::String(self.credentials.secret_api_key.clone()),
        );

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                PorkbunError::Transport(format!("failed to fetch {}: {}", endpoint, e))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            PorkbunError::Transport(format!("failed to fetch {}: {}", endpoint, e))
        })?;

        tracing::debug!("{} -> HTTP {} {}", endpoint, status, text);

        parse_envelope(endpoint, &text)
    }

    /// Call `ping` and return the caller's address as seen by the API.
    pub async fn ping(&self) -> Result<String> {
        let envelope = self.call("ping", None).await?;

        envelope
            .get_str("yourIp")
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                PorkbunError::Transport("ping response has no yourIp".to_string())
            })
    }

    /// List records of `record_type` for `subdomain` under `domain`.
    pub async fn retrieve_records(
        &self,
        domain: &str,
        record_type: RecordType,
        subdomain: &str,
    ) -> Result<Vec<DnsRecord>> {
        let endpoint = by_name_type("dns/retrieveByNameType", domain, record_type, subdomain);
        let payload: RecordsPayload = self.call(&endpoint, None).await?.payload()?;
        Ok(payload.records)
    }

    /// Create a new record.
    pub async fn create_record(
        &self,
        domain: &str,
        record_type: RecordType,
        subdomain: &str,
        content: &str,
        ttl: u32,
    ) -> Result<()> {
        let body = json!({
            "name": subdomain,
            "type": record_type.as_str(),
            "content": content,
            "ttl": ttl.to_string(),
        });
        self.call(&format!("dns/create/{}", domain), object(body))
            .await?;
        Ok(())
    }

    /// Replace the content of every record matching name and type.
    pub async fn edit_record(
        &self,
        domain: &str,
        record_type: RecordType,
        subdomain: &str,
        content: &str,
        ttl: u32,
    ) -> Result<()> {
        let endpoint = by_name_type("dns/editByNameType", domain, record_type, subdomain);
        let body = json!({
            "content": content,
            "ttl": ttl.to_string(),
        });
        self.call(&endpoint, object(body)).await?;
        Ok(())
    }

    /// Fetch the certificate bundle for `domain`.
    pub async fn retrieve_ssl(&self, domain: &str) -> Result<SslBundle> {
        self.call(&format!("ssl/retrieve/{}", domain), None)
            .await?
            .payload()
    }
}

/// Validate a raw response body.
///
/// Bodies that are empty or do not open with `{` are transport failures and are
/// never handed to the JSON parser.
pub fn parse_envelope(endpoint: &str, text: &str) -> Result<Envelope> {
    let trimmed = text.trim_start();
    if !trimmed.starts_with('{') {
        return Err(PorkbunError::Transport(format!(
            "failed to fetch {}",
            endpoint
        )));
    }

    let fields: Map<String, Value> = serde_json::from_str(trimmed).map_err(|e| {
        PorkbunError::Transport(format!("malformed response from {}: {}", endpoint, e))
    })?;

    match fields.get("status").and_then(Value::as_str) {
        Some(STATUS_SUCCESS) => Ok(Envelope::new(fields)),
        status => {
            let message = fields
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| {
                    format!(
                        "{} returned status {}",
                        endpoint,
                        status.unwrap_or("(missing)")
                    )
                });
            Err(PorkbunError::Api { message })
        }
    }
}

fn by_name_type(prefix: &str, domain: &str, record_type: RecordType, subdomain: &str) -> String {
    if subdomain.is_empty() {
        format!("{}/{}/{}", prefix, domain, record_type)
    } else {
        format!("{}/{}/{}/{}", prefix, domain, record_type, subdomain)
    }
}

fn object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_is_transport_error() {
        let err = parse_envelope("ping", "").unwrap_err();
        assert!(matches!(err, PorkbunError::Transport(ref m) if m == "failed to fetch ping"));
    }

    #[test]
    fn test_html_body_is_transport_error() {
        let err = parse_envelope("ping", "<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, PorkbunError::Transport(_)));
    }

    #[test]
    fn test_truncated_object_is_transport_error() {
        let err = parse_envelope("ping", "{\"status\": \"SUC").unwrap_err();
        assert!(matches!(err, PorkbunError::Transport(_)));
    }

    #[test]
    fn test_error_status_surfaces_message() {
        let err = parse_envelope(
            "ping",
            r#"{"status":"ERROR","message":"Invalid API key. (002)"}"#,
        )
        .unwrap_err();
        match err {
            PorkbunError::Api { message } => assert_eq!(message, "Invalid API key. (002)"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_status_is_api_error() {
        let err = parse_envelope("ping", r#"{"yourIp":"1.2.3.4"}"#).unwrap_err();
        assert!(matches!(err, PorkbunError::Api { .. }));
    }

    #[test]
    fn test_success_keeps_payload() {
        let envelope =
            parse_envelope("ping", "\n {\"status\":\"SUCCESS\",\"yourIp\":\"1.2.3.4\"}").unwrap();
        assert_eq!(envelope.get_str("yourIp"), Some("1.2.3.4"));
    }

    #[test]
    fn test_by_name_type_paths() {
        assert_eq!(
            by_name_type("dns/retrieveByNameType", "example.com", RecordType::A, "home"),
            "dns/retrieveByNameType/example.com/A/home"
        );
        assert_eq!(
            by_name_type("dns/editByNameType", "example.com", RecordType::AAAA, ""),
            "dns/editByNameType/example.com/AAAA"
        );
    }
}
