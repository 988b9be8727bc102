//! # porkbun-dns
//!
//! A command-line client for the Porkbun DNS API.
//!
//! ## Features
//!
//! - `ping`: report the public IP address the API sees
//! - `sslcert`: download the domain's certificate chain and private key
//! - `dyndns`: keep A/AAAA records in sync with the current public addresses
//! - `raw`: call any API endpoint with an optional JSON body
//!
//! ## Usage
//!
//! ```bash
//! # Check credentials and current IP
//! porkbun-dns ping
//!
//! # Update home.example.com from a timer
//! porkbun-dns --subdomain home dyndns
//!
//! # Save the certificate bundle
//! porkbun-dns sslcert /etc/ssl/@DOMAIN@/cert.pem /etc/ssl/@DOMAIN@/key.pem
//! ```

pub mod api;
pub mod command;
pub mod config;
pub mod dyndns;
pub mod error;
pub mod eventlog;
pub mod resolver;
pub mod ssl;

pub use api::ApiClient;
pub use config::Config;
pub use error::{PorkbunError, Result};
pub use resolver::IpResolver;
