//! Public IP resolution.
//!
//! Each family is looked up from its configured plain-text provider when one
//! is set. Otherwise IPv4 falls back to the API `ping` endpoint and IPv6 to the
//! host's own global /128 addresses.

use crate::api::{ApiClient, CONNECT_TIMEOUT, REQUEST_TIMEOUT};
use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;
use std::net::{IpAddr, Ipv6Addr};
use std::path::PathBuf;

const IF_INET6: &str = "/proc/net/if_inet6";

// Address scope and flag bits as printed in /proc/net/if_inet6.
const SCOPE_GLOBAL: u32 = 0x00;
const IFA_F_DEPRECATED: u32 = 0x20;
const IFA_F_TENTATIVE: u32 = 0x40;

/// Source of the caller's current public addresses.
///
/// `Ok(None)` means the family could not be determined; `Err` is reserved for
/// failures that abort the whole command.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IpResolve: Send + Sync {
    async fn resolve_ipv4(&self) -> Result<Option<String>>;
    async fn resolve_ipv6(&self) -> Result<Option<String>>;
}

/// Resolver backed by provider URLs, the API and local interfaces.
pub struct IpResolver {
    client: reqwest::Client,
    api: ApiClient,
    ipv4_provider: Option<String>,
    ipv6_provider: Option<String>,
    if_inet6: PathBuf,
}

impl IpResolver {
    /// Create a resolver from configuration.
    pub fn new(config: &Config, api: ApiClient) -> Result<Self> {
        Self::with_providers(
            api,
            config.ipv4_provider.clone(),
            config.ipv6_provider.clone(),
        )
    }

    pub fn with_providers(
        api: ApiClient,
        ipv4_provider: Option<String>,
        ipv6_provider: Option<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api,
            ipv4_provider,
            ipv6_provider,
            if_inet6: PathBuf::from(IF_INET6),
        })
    }

    /// Read local addresses from another file (for testing).
    pub fn with_if_inet6(mut self, path: impl Into<PathBuf>) -> Self {
        self.if_inet6 = path.into();
        self
    }

    /// Fetch a provider URL as plain text.
    async fn fetch_text(&self, url: &str) -> Option<String> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("IP provider {} failed: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!("IP provider {} returned HTTP {}", url, response.status());
            return None;
        }

        match response.text().await {
            Ok(text) => {
                let ip = text.trim();
                if ip.is_empty() {
                    tracing::warn!("IP provider {} returned an empty body", url);
                    None
                } else {
                    tracing::debug!("Resolved {} from {}", ip, url);
                    Some(ip.to_string())
                }
            }
            Err(e) => {
                tracing::warn!("IP provider {} failed: {}", url, e);
                None
            }
        }
    }

    fn local_ipv6(&self) -> Option<String> {
        match std::fs::read_to_string(&self.if_inet6) {
            Ok(content) => {
                let ip = parse_if_inet6(&content);
                if ip.is_none() {
                    tracing::debug!("No global /128 IPv6 address on this host");
                }
                ip.map(|ip| ip.to_string())
            }
            Err(e) => {
                tracing::debug!("Cannot read {}: {}", self.if_inet6.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl IpResolve for IpResolver {
    async fn resolve_ipv4(&self) -> Result<Option<String>> {
        let ip = match &self.ipv4_provider {
            Some(url) => self
                .fetch_text(url)
                .await
                .and_then(|text| accept_family(&text, Family::V4, url)),
            None => accept_family(&self.api.ping().await?, Family::V4, "ping"),
        };
        Ok(ip)
    }

    async fn resolve_ipv6(&self) -> Result<Option<String>> {
        let ip = match &self.ipv6_provider {
            Some(url) => self
                .fetch_text(url)
                .await
                .and_then(|text| accept_family(&text, Family::V6, url)),
            None => self.local_ipv6(),
        };
        Ok(ip)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    V4,
    V6,
}

/// Keep `text` only if it is an address of the wanted family.
fn accept_family(text: &str, family: Family, source: &str) -> Option<String> {
    let ip = match text.parse::<IpAddr>() {
        Ok(ip) => ip,
        Err(_) => {
            tracing::warn!("{} did not return an IP address: {:?}", source, text);
            return None;
        }
    };

    let (matches, label) = match family {
        Family::V4 => (ip.is_ipv4(), "IPv4"),
        Family::V6 => (ip.is_ipv6(), "IPv6"),
    };
    if !matches {
        tracing::warn!("{} returned {} for an {} lookup", source, ip, label);
        return None;
    }

    Some(ip.to_string())
}

/// First usable global-scope /128 address in `/proc/net/if_inet6` format.
///
/// Each line is `address ifindex prefixlen scope flags name`, all hex.
pub fn parse_if_inet6(content: &str) -> Option<Ipv6Addr> {
    content.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            return None;
        }

        let addr = u128::from_str_radix(fields[0], 16).ok()?;
        let prefix_len = u32::from_str_radix(fields[2], 16).ok()?;
        let scope = u32::from_str_radix(fields[3], 16).ok()?;
        let flags = u32::from_str_radix(fields[4], 16).ok()?;

        let usable = prefix_len == 128
            && scope == SCOPE_GLOBAL
            && flags & (IFA_F_DEPRECATED | IFA_F_TENTATIVE) == 0;

        usable.then(|| Ipv6Addr::from(addr))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const IF_INET6_SAMPLE: &str = "\
00000000000000000000000000000001 01 80 10 80       lo
fe80000000000000021122fffe334455 02 40 20 80     eth0
20010db8000000000000000000000042 02 40 00 00     eth0
20010db80000000000000000000000aa 02 80 00 20     eth0
20010db8000000000000000000000abc 02 80 00 00     eth0
";

    fn api(server_uri: &str) -> ApiClient {
        ApiClient::with_base_url(
            Credentials {
                api_key: "pk1".to_string(),
                secret_api_key: "sk1".to_string(),
            },
            format!("{}/api/json/v3", server_uri),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_if_inet6_picks_global_128() {
        let ip = parse_if_inet6(IF_INET6_SAMPLE).unwrap();
        assert_eq!(ip.to_string(), "2001:db8::abc");
    }

    #[test]
    fn test_parse_if_inet6_none() {
        let content = "00000000000000000000000000000001 01 80 10 80       lo\n";
        assert!(parse_if_inet6(content).is_none());
        assert!(parse_if_inet6("").is_none());
        assert!(parse_if_inet6("garbage line\n").is_none());
    }

    #[tokio::test]
    async fn test_ipv4_from_provider() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ip"))
            .respond_with(ResponseTemplate::new(200).set_body_string("198.51.100.23\n"))
            .mount(&mock_server)
            .await;

        let resolver = IpResolver::with_providers(
            api(&mock_server.uri()),
            Some(format!("{}/ip", mock_server.uri())),
            None,
        )
        .unwrap();

        let ip = resolver.resolve_ipv4().await.unwrap();
        assert_eq!(ip.as_deref(), Some("198.51.100.23"));
    }

    #[tokio::test]
    async fn test_ipv4_falls_back_to_ping() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/json/v3/ping"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "SUCCESS", "yourIp": "203.0.113.1"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let resolver = IpResolver::with_providers(api(&mock_server.uri()), None, None).unwrap();

        let ip = resolver.resolve_ipv4().await.unwrap();
        assert_eq!(ip.as_deref(), Some("203.0.113.1"));
    }

    #[tokio::test]
    async fn test_failing_provider_is_absent() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ip6"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let resolver = IpResolver::with_providers(
            api(&mock_server.uri()),
            None,
            Some(format!("{}/ip6", mock_server.uri())),
        )
        .unwrap();

        assert_eq!(resolver.resolve_ipv6().await.unwrap(), None);
    }

    async fn resolver_with_provider(
        mock_server: &MockServer,
        body: &str,
        ipv4: bool,
    ) -> IpResolver {
        Mock::given(method("GET"))
            .and(path("/ip"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(mock_server)
            .await;

        let url = Some(format!("{}/ip", mock_server.uri()));
        let (v4, v6) = if ipv4 { (url, None) } else { (None, url) };
        IpResolver::with_providers(api(&mock_server.uri()), v4, v6).unwrap()
    }

    #[tokio::test]
    async fn test_ipv4_provider_returning_ipv6_is_absent() {
        let mock_server = MockServer::start().await;
        let resolver = resolver_with_provider(&mock_server, "2001:db8::1\n", true).await;

        assert_eq!(resolver.resolve_ipv4().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_provider_returning_html_is_absent() {
        let mock_server = MockServer::start().await;
        let resolver =
            resolver_with_provider(&mock_server, "<html>captive portal login</html>", true).await;

        assert_eq!(resolver.resolve_ipv4().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ipv6_provider_returning_ipv4_is_absent() {
        let mock_server = MockServer::start().await;
        let resolver = resolver_with_provider(&mock_server, "198.51.100.23", false).await;

        assert_eq!(resolver.resolve_ipv6().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ipv6_provider_text_is_normalized() {
        let mock_server = MockServer::start().await;
        let resolver =
            resolver_with_provider(&mock_server, "2001:0db8:0000::0042\n", false).await;

        let ip = resolver.resolve_ipv6().await.unwrap();
        assert_eq!(ip.as_deref(), Some("2001:db8::42"));
    }

    #[tokio::test]
    async fn test_ping_returning_ipv6_is_absent_for_ipv4() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/json/v3/ping"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "SUCCESS", "yourIp": "2001:db8::99"})),
            )
            .mount(&mock_server)
            .await;

        let resolver = IpResolver::with_providers(api(&mock_server.uri()), None, None).unwrap();

        assert_eq!(resolver.resolve_ipv4().await.unwrap(), None);
    }

    #[test]
    fn test_accept_family() {
        assert_eq!(
            accept_family("203.0.113.7", Family::V4, "test").as_deref(),
            Some("203.0.113.7")
        );
        assert_eq!(accept_family("203.0.113.7", Family::V6, "test"), None);
        assert_eq!(accept_family("not an ip", Family::V4, "test"), None);
        assert_eq!(accept_family("", Family::V6, "test"), None);
    }

    #[tokio::test]
    async fn test_ipv6_from_local_interfaces() {
        let path = std::env::temp_dir().join(format!("porkbun-dns-if_inet6-{}", std::process::id()));
        std::fs::write(&path, IF_INET6_SAMPLE).unwrap();

        let resolver = IpResolver::with_providers(api("http://127.0.0.1:1"), None, None)
            .unwrap()
            .with_if_inet6(&path);

        let ip = resolver.resolve_ipv6().await.unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(ip.as_deref(), Some("2001:db8::abc"));
    }

    #[tokio::test]
    async fn test_ipv6_missing_interface_file() {
        let resolver = IpResolver::with_providers(api("http://127.0.0.1:1"), None, None)
            .unwrap()
            .with_if_inet6("/nonexistent/if_inet6");

        assert_eq!(resolver.resolve_ipv6().await.unwrap(), None);
    }
}
