//! Append-only event log: one `<RFC3339 timestamp>\t<message>` line per event.

use chrono::{DateTime, SecondsFormat, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Event log sink. Disabled when no path is configured.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    path: Option<PathBuf>,
}

impl EventLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Append an event. Write failures are logged and otherwise ignored.
    pub fn record(&self, message: &str) {
        tracing::info!("{}", message);

        let Some(path) = &self.path else {
            return;
        };

        if let Err(e) = append_line(path, &format_line(Utc::now(), message)) {
            tracing::warn!("Cannot write event log {}: {}", path.display(), e);
        }
    }
}

fn format_line(at: DateTime<Utc>, message: &str) -> String {
    // Keep one event per line.
    let message = message.replace(['\n', '\r'], " ");
    format!(
        "{}\t{}\n",
        at.to_rfc3339_opts(SecondsFormat::Secs, true),
        message
    )
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(line.as_bytes())
}
