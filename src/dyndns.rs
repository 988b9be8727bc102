//! Dynamic DNS reconciliation.
//!
//! Each requested address family runs independently through
//! resolve → fetch existing record → compare → apply → report.
//! A family whose address cannot be resolved is reported as failed without
//! touching the other family; API and transport errors abort the run.

use crate::api::{ApiClient, RecordType};
use crate::config::{Config, IpType};
use crate::error::{PorkbunError, Result};
use crate::eventlog::EventLog;
use crate::resolver::IpResolve;
use std::fmt;
use std::net::IpAddr;

/// What happened to one record.
#[derive(Debug)]
pub enum Outcome {
    /// No record existed; one was created.
    Created { ip: String },
    /// The record pointed elsewhere and was edited.
    Updated { previous: String, ip: String },
    /// The record already matched; nothing was written.
    Unchanged { ip: String },
    /// The address for this family could not be resolved.
    Failed { error: PorkbunError },
}

impl Outcome {
    pub fn is_write(&self) -> bool {
        matches!(self, Outcome::Created { .. } | Outcome::Updated { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

/// Result for one address family.
#[derive(Debug)]
pub struct FamilyReport {
    pub record_type: RecordType,
    pub name: String,
    pub outcome: Outcome,
}

impl fmt::Display for FamilyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Created { ip } => {
                write!(f, "{} {}: created ({})", self.record_type, self.name, ip)
            }
            Outcome::Updated { previous, ip } => write!(
                f,
                "{} {}: updated ({} -> {})",
                self.record_type, self.name, previous, ip
            ),
            Outcome::Unchanged { ip } => {
                write!(f, "{} {}: unchanged ({})", self.record_type, self.name, ip)
            }
            Outcome::Failed { error } => {
                write!(f, "{} {}: failed - {}", self.record_type, self.name, error)
            }
        }
    }
}

/// Reports of one dyndns run, in family order (A first).
#[derive(Debug, Default)]
pub struct RunReport {
    pub families: Vec<FamilyReport>,
}

impl RunReport {
    pub fn writes(&self) -> usize {
        self.families.iter().filter(|r| r.outcome.is_write()).count()
    }

    pub fn failures(&self) -> usize {
        self.families.iter().filter(|r| r.outcome.is_failure()).count()
    }

    /// True when families were requested and none of them succeeded.
    pub fn all_failed(&self) -> bool {
        !self.families.is_empty() && self.failures() == self.families.len()
    }
}

/// Keeps the A/AAAA records of one name in sync with the resolved addresses.
pub struct Reconciler {
    api: ApiClient,
    resolver: Box<dyn IpResolve>,
    domain: String,
    subdomain: String,
    name: String,
    ttl: u32,
    ip_type: IpType,
    events: EventLog,
}

impl Reconciler {
    /// Create a reconciler for the configured root domain and subdomain.
    pub fn new(
        config: &Config,
        api: ApiClient,
        resolver: Box<dyn IpResolve>,
        events: EventLog,
    ) -> Result<Self> {
        let domain = config.require_domain()?.to_string();

        Ok(Self {
            api,
            resolver,
            domain,
            subdomain: config.subdomain.clone(),
            name: config.display_name(),
            ttl: config.ttl,
            ip_type: config.ip_type,
            events,
        })
    }

    /// Reconcile every family the IP type policy asks for.
    pub async fn run(&self) -> Result<RunReport> {
        let mut report = RunReport::default();

        if self.ip_type.wants_ipv4() {
            report.families.push(self.reconcile(RecordType::A).await?);
        }
        if self.ip_type.wants_ipv6() {
            report.families.push(self.reconcile(RecordType::AAAA).await?);
        }

        Ok(report)
    }

    /// Reconcile a single record type.
    pub async fn reconcile(&self, record_type: RecordType) -> Result<FamilyReport> {
        let name = self.name.clone();

        let resolved = match record_type {
            RecordType::A => self.resolver.resolve_ipv4().await?,
            RecordType::AAAA => self.resolver.resolve_ipv6().await?,
        };

        let Some(ip) = resolved else {
            let report = FamilyReport {
                record_type,
                name,
                outcome: Outcome::Failed {
                    error: PorkbunError::Resolution {
                        family: record_type.family(),
                    },
                },
            };
            self.events.record(&report.to_string());
            return Ok(report);
        };

        tracing::debug!("Current {} address: {}", record_type.family(), ip);

        let records = self
            .api
            .retrieve_records(&self.domain, record_type, &self.subdomain)
            .await?;

        let outcome = match records.first() {
            None => {
                self.api
                    .create_record(&self.domain, record_type, &self.subdomain, &ip, self.ttl)
                    .await?;
                Outcome::Created { ip }
            }
            Some(existing) if same_address(&existing.content, &ip) => Outcome::Unchanged { ip },
            Some(existing) => {
                self.api
                    .edit_record(&self.domain, record_type, &self.subdomain, &ip, self.ttl)
                    .await?;
                Outcome::Updated {
                    previous: existing.content.clone(),
                    ip,
                }
            }
        };

        let report = FamilyReport {
            record_type,
            name,
            outcome,
        };
        self.events.record(&report.to_string());
        Ok(report)
    }
}

/// Compare addresses semantically so `2001:db8::1` equals `2001:0db8:0:0::1`.
fn same_address(a: &str, b: &str) -> bool {
    match (a.trim().parse::<IpAddr>(), b.trim().parse::<IpAddr>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.trim() == b.trim(),
    }
}
