//! porkbun-dns - Porkbun API client for ping, SSL bundles and dynamic DNS.

use anyhow::Context;
use clap::{Parser, Subcommand};
use porkbun_dns::command::DefaultCommand;
use porkbun_dns::config::{Config, ConfigLayer, TtlValue};
use porkbun_dns::dyndns::Reconciler;
use porkbun_dns::eventlog::EventLog;
use porkbun_dns::ssl::SslRetriever;
use porkbun_dns::{ApiClient, IpResolver, PorkbunError};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "porkbun-dns")]
#[command(about = "Porkbun API client: ping, SSL certificate retrieval and dynamic DNS")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print API requests and responses to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// API host, e.g. https://api.porkbun.com
    #[arg(long, global = true)]
    host: Option<String>,

    /// Root domain
    #[arg(long, global = true)]
    domain: Option<String>,

    /// Record name below the root domain (empty for the apex)
    #[arg(long, global = true)]
    subdomain: Option<String>,

    /// TTL in seconds for created/edited records
    #[arg(long, global = true)]
    ttl: Option<String>,

    /// Address families to update: ipv4, ipv6 or both
    #[arg(long, global = true)]
    ip_type: Option<String>,

    /// Append significant events to this file
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the public IP address seen by the API
    Ping,

    /// Download the certificate chain and private key of the domain
    Sslcert {
        /// Certificate path (@DOMAIN@ is replaced by the domain)
        cert_path: Option<String>,
        /// Private key path (@DOMAIN@ is replaced by the domain)
        key_path: Option<String>,
    },

    /// Point the A/AAAA record at the current public address
    Dyndns,

    /// Call an API endpoint directly
    Raw {
        /// Endpoint path, e.g. dns/retrieve/example.com
        endpoint: String,
        /// JSON object to send as the request body
        json: Option<String>,
    },

    /// Write an example configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

impl From<DefaultCommand> for Commands {
    fn from(command: DefaultCommand) -> Self {
        match command {
            DefaultCommand::Ping => Commands::Ping,
            DefaultCommand::Sslcert => Commands::Sslcert {
                cert_path: None,
                key_path: None,
            },
            DefaultCommand::Dyndns => Commands::Dyndns,
        }
    }
}

fn invocation_default() -> Option<Commands> {
    let argv0 = std::env::args_os().next()?;
    DefaultCommand::from_invocation(&argv0.to_string_lossy()).map(Commands::from)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "porkbun_dns=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let mut cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command.take().or_else(invocation_default) else {
        eprintln!("error: no command given (try --help)");
        return ExitCode::from(2);
    };

    match run(cli, command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn exit_code(e: &anyhow::Error) -> u8 {
    e.downcast_ref::<PorkbunError>()
        .map(PorkbunError::exit_code)
        .unwrap_or(1)
}

fn flag_layer(cli: &Cli) -> ConfigLayer {
    ConfigLayer {
        host: cli.host.clone(),
        domain: cli.domain.clone(),
        subdomain: cli.subdomain.clone(),
        ttl: cli.ttl.clone().map(TtlValue::Text),
        ip_type: cli.ip_type.clone(),
        log_file: cli.log_file.clone(),
        ..ConfigLayer::default()
    }
}

async fn run(cli: Cli, command: Commands) -> anyhow::Result<()> {
    if let Commands::Init { force } = command {
        return cmd_init(cli.config, force);
    }

    let file = Config::file_layer(cli.config.as_deref()).context("loading configuration")?;
    let config = Config::assemble(ConfigLayer::from_env(), file, flag_layer(&cli))?;
    tracing::debug!("Configuration: {:?}", config);

    let events = EventLog::new(config.log_file.clone());
    let api = ApiClient::new(&config)?;

    let result = match command {
        Commands::Ping => cmd_ping(&api).await,
        Commands::Sslcert {
            cert_path,
            key_path,
        } => cmd_sslcert(&config, api, events.clone(), cert_path, key_path).await,
        Commands::Dyndns => cmd_dyndns(&config, api, events.clone()).await,
        Commands::Raw { endpoint, json } => cmd_raw(&api, &endpoint, json.as_deref()).await,
        Commands::Init { .. } => Ok(()),
    };

    if let Err(e) = &result {
        events.record(&format!("error: {:#}", e));
    }
    result
}

fn cmd_init(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = match path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if path.exists() && !force {
        return Err(PorkbunError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ))
        .into());
    }

    ConfigLayer::example().save_to(&path)?;
    println!("Wrote example configuration to {}", path.display());
    Ok(())
}

async fn cmd_ping(api: &ApiClient) -> anyhow::Result<()> {
    let ip = api.ping().await?;
    println!("{}", ip);
    Ok(())
}

async fn cmd_sslcert(
    config: &Config,
    api: ApiClient,
    events: EventLog,
    cert_path: Option<String>,
    key_path: Option<String>,
) -> anyhow::Result<()> {
    let retriever = SslRetriever::new(config, api, events)?;
    let cert_template = cert_path.unwrap_or_else(|| config.cert_path.clone());
    let key_template = key_path.unwrap_or_else(|| config.key_path.clone());

    let saved = retriever.retrieve(&cert_template, &key_template).await?;
    println!("Certificate: {}", saved.cert_path.display());
    println!("Private key: {}", saved.key_path.display());
    Ok(())
}

async fn cmd_dyndns(config: &Config, api: ApiClient, events: EventLog) -> anyhow::Result<()> {
    let resolver = IpResolver::new(config, api.clone())?;
    let reconciler = Reconciler::new(config, api, Box::new(resolver), events)?;

    let report = reconciler.run().await?;
    for family in &report.families {
        println!("{}", family);
    }

    if report.all_failed() {
        let family = match report.families.as_slice() {
            [only] => only.record_type.family(),
            _ => "IPv4 or IPv6",
        };
        return Err(PorkbunError::Resolution { family }.into());
    }
    if report.failures() > 0 {
        tracing::warn!(
            "{} of {} address families could not be updated",
            report.failures(),
            report.families.len()
        );
    }

    Ok(())
}

async fn cmd_raw(api: &ApiClient, endpoint: &str, json: Option<&str>) -> anyhow::Result<()> {
    let body = match json {
        None => None,
        Some(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => {
                return Err(PorkbunError::Config("JSON body must be an object".to_string()).into())
            }
            Err(e) => {
                return Err(PorkbunError::Config(format!("invalid JSON body: {}", e)).into())
            }
        },
    };

    let envelope = api.call(endpoint, body).await?;
    println!("{}", serde_json::to_string_pretty(&envelope.into_value())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_through_context() {
        let err = anyhow::Error::from(PorkbunError::Config("ttl".to_string()))
            .context("loading configuration");
        assert_eq!(exit_code(&err), 2);
        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
    }

    #[test]
    fn test_flag_layer() {
        let cli = Cli::parse_from(["porkbun-dns", "--ttl", "abc", "--subdomain", "home", "dyndns"]);
        let layer = flag_layer(&cli);
        assert_eq!(layer.ttl, Some(TtlValue::Text("abc".to_string())));
        assert_eq!(layer.subdomain.as_deref(), Some("home"));
        assert!(layer.api_key.is_none());
    }

    #[test]
    fn test_sslcert_positional_paths() {
        let cli = Cli::parse_from(["porkbun-dns", "sslcert", "/tmp/c.pem", "/tmp/k.pem"]);
        match cli.command {
            Some(Commands::Sslcert {
                cert_path,
                key_path,
            }) => {
                assert_eq!(cert_path.as_deref(), Some("/tmp/c.pem"));
                assert_eq!(key_path.as_deref(), Some("/tmp/k.pem"));
            }
            _ => panic!("expected sslcert"),
        }
    }

    #[test]
    fn test_invalid_ttl_fails_before_network() {
        let cli = Cli::parse_from(["porkbun-dns", "--ttl", "abc", "--host", "http://127.0.0.1:1", "ping"]);
        let env = ConfigLayer {
            api_key: Some("pk1".to_string()),
            secret_api_key: Some("sk1".to_string()),
            ..ConfigLayer::default()
        };
        let err = Config::assemble(env, ConfigLayer::default(), flag_layer(&cli)).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_raw_rejects_non_object_body() {
        let api = ApiClient::with_base_url(
            porkbun_dns::config::Credentials {
                api_key: "pk1".to_string(),
                secret_api_key: "sk1".to_string(),
            },
            "http://127.0.0.1:1".to_string(),
        )
        .unwrap();

        let err = tokio_test::block_on(cmd_raw(&api, "ping", Some("[1, 2]"))).unwrap_err();
        assert_eq!(exit_code(&err), 2);
    }
}
