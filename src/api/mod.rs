//! Porkbun JSON API: response envelope, record types and the HTTP client.

mod client;

pub use client::{parse_envelope, ApiClient};
pub(crate) use client::{CONNECT_TIMEOUT, REQUEST_TIMEOUT};

use crate::error::{PorkbunError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Status value of a successful envelope.
pub const STATUS_SUCCESS: &str = "SUCCESS";

/// A successful API response: `status == SUCCESS` plus payload fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    fields: Map<String, Value>,
}

impl Envelope {
    pub(crate) fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Raw payload field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String payload field.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Decode the envelope into a typed payload.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|e| {
            PorkbunError::Transport(format!("unexpected response shape: {}", e))
        })
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// DNS record types managed by dyndns.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
    A,
    AAAA,
}

impl RecordType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::AAAA => "AAAA",
        }
    }

    /// Address family this record type carries.
    pub fn family(self) -> &'static str {
        match self {
            RecordType::A => "IPv4",
            RecordType::AAAA => "IPv6",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of `dns/retrieveByNameType`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecordsPayload {
    #[serde(default)]
    pub records: Vec<DnsRecord>,
}

/// Certificate chain and private key returned by `ssl/retrieve`.
#[derive(Clone, Deserialize)]
pub struct SslBundle {
    #[serde(rename = "certificatechain")]
    pub certificate_chain: String,
    #[serde(rename = "privatekey")]
    pub private_key: String,
}

impl fmt::Debug for SslBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SslBundle")
            .field("certificate_chain", &self.certificate_chain.len())
            .field("private_key", &"<redacted>")
            .finish()
    }
}
