//! SSL certificate bundle retrieval.

use crate::api::ApiClient;
use crate::config::{Config, DOMAIN_PLACEHOLDER};
use crate::error::{PorkbunError, Result};
use crate::eventlog::EventLog;
use std::io::Write;
use std::path::{Path, PathBuf};

const DIR_MODE: u32 = 0o700;
const CERT_MODE: u32 = 0o664;
const KEY_MODE: u32 = 0o600;

/// Where a retrieved bundle was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedBundle {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Downloads the certificate chain and private key of the root domain.
pub struct SslRetriever {
    api: ApiClient,
    domain: String,
    events: EventLog,
}

impl SslRetriever {
    pub fn new(config: &Config, api: ApiClient, events: EventLog) -> Result<Self> {
        Ok(Self {
            api,
            domain: config.require_domain()?.to_string(),
            events,
        })
    }

    /// Fetch the bundle and write it to the two path templates.
    pub async fn retrieve(&self, cert_template: &str, key_template: &str) -> Result<SavedBundle> {
        let cert_path = expand_domain(cert_template, &self.domain);
        let key_path = expand_domain(key_template, &self.domain);

        let bundle = self.api.retrieve_ssl(&self.domain).await?;

        create_parent(&cert_path)?;
        create_parent(&key_path)?;

        write_with_mode(&cert_path, bundle.certificate_chain.as_bytes(), CERT_MODE)?;
        write_with_mode(&key_path, bundle.private_key.as_bytes(), KEY_MODE)?;

        self.events.record(&format!(
            "Saved certificate for {} to {} (key {})",
            self.domain,
            cert_path.display(),
            key_path.display()
        ));

        Ok(SavedBundle {
            cert_path,
            key_path,
        })
    }
}

/// Replace the domain placeholder in a path template.
pub fn expand_domain(template: &str, domain: &str) -> PathBuf {
    PathBuf::from(template.replace(DOMAIN_PLACEHOLDER, domain))
}

fn create_parent(path: &Path) -> Result<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };

    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }

    builder
        .create(parent)
        .map_err(|e| PorkbunError::filesystem(parent, e))
}

/// Write `contents` to `path` with exactly `mode`, whatever the umask.
///
/// The file is created with `mode` (so the umask can only narrow it), then
/// chmod-ed to `mode` before any content is written.
pub(crate) fn write_with_mode(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }

    let mut file = options
        .open(path)
        .map_err(|e| PorkbunError::filesystem(path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(mode))
            .map_err(|e| PorkbunError::filesystem(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    file.write_all(contents)
        .map_err(|e| PorkbunError::filesystem(path, e))
}
