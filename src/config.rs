//! Configuration management for porkbun-dns.
//!
//! Settings come from three layers, applied in order: environment variables,
//! the TOML config file, then command-line flags. [`Config::assemble`] merges
//! and validates them once; the resulting [`Config`] is never mutated.

use crate::error::{PorkbunError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Token replaced by the root domain in certificate/key paths.
pub const DOMAIN_PLACEHOLDER: &str = "@DOMAIN@";

const DEFAULT_HOST: &str = "https://api.porkbun.com";
const DEFAULT_API_ROOT: &str = "/api/json/v3";
const DEFAULT_TTL: u32 = 600;
const DEFAULT_CERT_PATH: &str = "/etc/porkbun-dns/@DOMAIN@/certificate.pem";
const DEFAULT_KEY_PATH: &str = "/etc/porkbun-dns/@DOMAIN@/private.key";

/// Which address families dyndns keeps in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpType {
    Ipv4,
    Ipv6,
    Both,
}

impl IpType {
    pub fn wants_ipv4(self) -> bool {
        matches!(self, IpType::Ipv4 | IpType::Both)
    }

    pub fn wants_ipv6(self) -> bool {
        matches!(self, IpType::Ipv6 | IpType::Both)
    }
}

impl FromStr for IpType {
    type Err = PorkbunError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ipv4" => Ok(IpType::Ipv4),
            "ipv6" => Ok(IpType::Ipv6),
            "both" => Ok(IpType::Both),
            other => Err(PorkbunError::Config(format!(
                "ip_type must be one of ipv4, ipv6, both (got {:?})",
                other
            ))),
        }
    }
}

impl fmt::Display for IpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IpType::Ipv4 => "ipv4",
            IpType::Ipv6 => "ipv6",
            IpType::Both => "both",
        };
        f.write_str(s)
    }
}

/// API key pair. `Debug` never prints the values.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub secret_api_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("secret_api_key", &"<redacted>")
            .finish()
    }
}

/// TTL as written in a layer; validated during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TtlValue {
    Seconds(i64),
    Text(String),
}

/// One source of settings. Every field is optional; later layers win.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    /// API host, e.g. `https://api.porkbun.com`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Path prefix of the JSON API on the host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_root: Option<String>,
    /// API key (or `$VAR` to read it from the environment).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Secret API key (or `$VAR`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_api_key: Option<String>,
    /// Root domain, e.g. `example.com`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// `ipv4`, `ipv6` or `both`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_type: Option<String>,
    /// Plain-text service returning the public IPv4 address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_provider: Option<String>,
    /// Plain-text service returning the public IPv6 address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_provider: Option<String>,
    /// Record name below the root domain; empty for the apex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<TtlValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
}

impl ConfigLayer {
    /// Read the `PORKBUN_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a layer from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            host: lookup("PORKBUN_HOST"),
            api_root: lookup("PORKBUN_API_ROOT"),
            api_key: lookup("PORKBUN_API_KEY"),
            secret_api_key: lookup("PORKBUN_SECRET_API_KEY"),
            domain: lookup("PORKBUN_DOMAIN"),
            ip_type: lookup("PORKBUN_IP_TYPE"),
            ipv4_provider: lookup("PORKBUN_IPV4_PROVIDER"),
            ipv6_provider: lookup("PORKBUN_IPV6_PROVIDER"),
            subdomain: lookup("PORKBUN_SUBDOMAIN"),
            ttl: lookup("PORKBUN_TTL").map(TtlValue::Text),
            cert_path: lookup("PORKBUN_CERT_PATH"),
            key_path: lookup("PORKBUN_KEY_PATH"),
            log_file: lookup("PORKBUN_LOG_FILE"),
        }
    }

    /// Load a layer from a TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PorkbunError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let layer: ConfigLayer = toml::from_str(&content)?;
        Ok(layer)
    }

    /// Write this layer as TOML. The file may hold credentials, so it is owner-only.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PorkbunError::filesystem(parent, e))?;
        }

        let content = toml::to_string_pretty(self)?;
        crate::ssl::write_with_mode(path, content.as_bytes(), 0o600)
    }

    /// Overlay `other` on top of `self`.
    pub fn merge(self, other: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            host: other.host.or(self.host),
            api_root: other.api_root.or(self.api_root),
            api_key: other.api_key.or(self.api_key),
            secret_api_key: other.secret_api_key.or(self.secret_api_key),
            domain: other.domain.or(self.domain),
            ip_type: other.ip_type.or(self.ip_type),
            ipv4_provider: other.ipv4_provider.or(self.ipv4_provider),
            ipv6_provider: other.ipv6_provider.or(self.ipv6_provider),
            subdomain: other.subdomain.or(self.subdomain),
            ttl: other.ttl.or(self.ttl),
            cert_path: other.cert_path.or(self.cert_path),
            key_path: other.key_path.or(self.key_path),
            log_file: other.log_file.or(self.log_file),
        }
    }

    /// Generate example configuration.
    pub fn example() -> Self {
        Self {
            host: Some(DEFAULT_HOST.to_string()),
            api_root: Some(DEFAULT_API_ROOT.to_string()),
            api_key: Some("$PORKBUN_API_KEY".to_string()),
            secret_api_key: Some("$PORKBUN_SECRET_API_KEY".to_string()),
            domain: Some("example.com".to_string()),
            ip_type: Some(IpType::Ipv4.to_string()),
            ipv4_provider: None,
            ipv6_provider: None,
            subdomain: Some("home".to_string()),
            ttl: Some(TtlValue::Seconds(DEFAULT_TTL as i64)),
            cert_path: Some(DEFAULT_CERT_PATH.to_string()),
            key_path: Some(DEFAULT_KEY_PATH.to_string()),
            log_file: None,
        }
    }
}

/// Validated, immutable configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub api_root: String,
    pub credentials: Credentials,
    /// Root domain; may be empty for commands that do not need one.
    pub domain: String,
    pub ip_type: IpType,
    pub ipv4_provider: Option<String>,
    pub ipv6_provider: Option<String>,
    pub subdomain: String,
    pub ttl: u32,
    pub cert_path: String,
    pub key_path: String,
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Get the default config file path.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| PorkbunError::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("porkbun-dns").join("config.toml"))
    }

    /// Config file locations searched when none is given explicitly.
    pub fn candidate_paths() -> Vec<PathBuf> {
        [
            Self::default_path().ok(),
            Some(PathBuf::from("/etc/porkbun-dns/config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Read the file layer: an explicit path must exist, implicit ones are optional.
    pub fn file_layer(explicit: Option<&Path>) -> Result<ConfigLayer> {
        if let Some(path) = explicit {
            return ConfigLayer::load_from(path);
        }

        match Self::candidate_paths().into_iter().find(|p| p.exists()) {
            Some(path) => {
                tracing::debug!("Using config file {}", path.display());
                ConfigLayer::load_from(&path)
            }
            None => Ok(ConfigLayer::default()),
        }
    }

    /// Merge `env`, `file` and `flags` (in that precedence order) and validate.
    pub fn assemble(env: ConfigLayer, file: ConfigLayer, flags: ConfigLayer) -> Result<Self> {
        let merged = env.merge(file).merge(flags);

        let api_key = required_secret("api_key", merged.api_key)?;
        let secret_api_key = required_secret("secret_api_key", merged.secret_api_key)?;

        let ip_type = match merged.ip_type {
            Some(value) => value.parse()?,
            None => IpType::Ipv4,
        };

        let ttl = match merged.ttl {
            Some(value) => parse_ttl(&value)?,
            None => DEFAULT_TTL,
        };

        Ok(Config {
            host: non_blank(merged.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_root: normalize_root(
                &non_blank(merged.api_root).unwrap_or_else(|| DEFAULT_API_ROOT.to_string()),
            ),
            credentials: Credentials {
                api_key,
                secret_api_key,
            },
            domain: merged.domain.unwrap_or_default().trim().to_string(),
            ip_type,
            ipv4_provider: non_blank(merged.ipv4_provider),
            ipv6_provider: non_blank(merged.ipv6_provider),
            subdomain: merged.subdomain.unwrap_or_default().trim().to_string(),
            ttl,
            cert_path: non_blank(merged.cert_path).unwrap_or_else(|| DEFAULT_CERT_PATH.to_string()),
            key_path: non_blank(merged.key_path).unwrap_or_else(|| DEFAULT_KEY_PATH.to_string()),
            log_file: non_blank(merged.log_file).map(PathBuf::from),
        })
    }

    /// Root domain, or a config error when it is not set.
    pub fn require_domain(&self) -> Result<&str> {
        if self.domain.is_empty() {
            return Err(PorkbunError::Config("domain is not set".to_string()));
        }
        Ok(&self.domain)
    }

    /// Display name of the managed record (subdomain.domain).
    pub fn display_name(&self) -> String {
        if self.subdomain.is_empty() {
            self.domain.clone()
        } else {
            format!("{}.{}", self.subdomain, self.domain)
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_root(root: &str) -> String {
    let trimmed = root.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

fn required_secret(name: &str, value: Option<String>) -> Result<String> {
    let value = non_blank(value)
        .ok_or_else(|| PorkbunError::Config(format!("{} is not set", name)))?;
    let resolved = resolve_env(name, &value)?;
    if resolved.trim().is_empty() {
        return Err(PorkbunError::Config(format!("{} is blank", name)));
    }
    Ok(resolved)
}

/// Resolve environment variable references (values starting with $).
fn resolve_env(name: &str, value: &str) -> Result<String> {
    match value.strip_prefix('$') {
        Some(var_name) => std::env::var(var_name).map_err(|_| {
            PorkbunError::Config(format!(
                "{} refers to environment variable {} which is not set",
                name, var_name
            ))
        }),
        None => Ok(value.to_string()),
    }
}

fn parse_ttl(value: &TtlValue) -> Result<u32> {
    let seconds = match value {
        TtlValue::Seconds(n) => *n,
        TtlValue::Text(s) => s.trim().parse::<i64>().map_err(|_| {
            PorkbunError::Config(format!("ttl must be a positive integer (got {:?})", s))
        })?,
    };

    u32::try_from(seconds)
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| {
            PorkbunError::Config(format!("ttl must be a positive integer (got {})", seconds))
        })
}
