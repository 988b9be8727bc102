//! Default command implied by the executable name.

use std::path::Path;

/// Command selected when the binary is invoked under an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultCommand {
    Ping,
    Sslcert,
    Dyndns,
}

impl DefaultCommand {
    /// Map `argv[0]` to a command, e.g. a `porkbun-ddns` symlink runs dyndns.
    pub fn from_invocation(argv0: &str) -> Option<Self> {
        let stem = Path::new(argv0).file_stem()?.to_str()?;

        match stem {
            "porkbun-ping" => Some(DefaultCommand::Ping),
            "porkbun-sslcert" => Some(DefaultCommand::Sslcert),
            "porkbun-ddns" | "porkbun-dyndns" => Some(DefaultCommand::Dyndns),
            _ => None,
        }
    }
}
