//! Ceph Provider operator CLI
//!
//! Exercises the provider outside of an orchestration host: dump schemas,
//! check credentials, import objects and run data-source lookups.
//!
//! ```text
//! ceph-provider --config provider.yaml login
//! ceph-provider schema
//! ceph-provider import ceph_auth client.admin
//! ceph-provider read-data ceph_mgr_module_config '{"module_name": "dashboard"}'
//! ```
//!
//! Results go to stdout as JSON; logs go to stderr.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ceph_provider::{CephProvider, OpContext, ProviderConfig, Schema, PROVIDER_NAME};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Ceph Provider - declarative Ceph management through the Manager dashboard
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Provider options file (YAML)
    #[arg(long, short, env = "CEPH_PROVIDER_CONFIG")]
    config: Option<PathBuf>,

    /// Dashboard endpoint, e.g. https://mgr-a:8443
    #[arg(long, env = "CEPH_DASHBOARD_ENDPOINT")]
    endpoint: Option<String>,

    /// Additional endpoints, comma separated
    #[arg(long, env = "CEPH_DASHBOARD_ENDPOINTS", value_delimiter = ',')]
    endpoints: Vec<String>,

    #[arg(long, env = "CEPH_DASHBOARD_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "CEPH_DASHBOARD_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Pre-issued bearer token
    #[arg(long, env = "CEPH_DASHBOARD_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Accept self-signed dashboard certificates
    #[arg(long, env = "CEPH_DASHBOARD_INSECURE")]
    insecure_skip_verify: bool,

    /// Deadline for the whole command, in seconds
    #[arg(long, default_value = "300")]
    timeout_secs: u64,

    /// Print sensitive attributes instead of redacting them
    #[arg(long)]
    show_sensitive: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the provider, resource, data source and ephemeral schemas
    Schema,
    /// Log in and report the selected endpoint
    Login,
    /// Import an existing object by its natural identifier
    Import {
        /// Resource type, e.g. ceph_pool
        type_name: String,
        id: String,
    },
    /// Run a data-source lookup
    ReadData {
        /// Data source type, e.g. ceph_config_value
        type_name: String,
        /// Lookup document as JSON
        config: String,
    },
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let provider = CephProvider::new();
    if let Command::Schema = args.command {
        return print_json(&serde_json::to_value(provider.schema())?);
    }

    let ctx = OpContext::with_timeout(Duration::from_secs(args.timeout_secs));
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling");
            interrupt.cancel();
        }
    });

    let config = provider_config(&args)?;
    info!("Starting {} provider {}", PROVIDER_NAME, ceph_provider::VERSION);
    provider
        .configure(&ctx, config)
        .await
        .context("configuring provider")?;

    match &args.command {
        Command::Schema => Ok(()),
        Command::Login => {
            let client = provider.client()?;
            print_json(&serde_json::json!({ "endpoint": client.endpoint().as_str() }))
        }
        Command::Import { type_name, id } => {
            let resource = provider.resource(type_name)?;
            let state = resource
                .import(&ctx, id)
                .await
                .with_context(|| format!("importing {} {}", type_name, id))?;
            print_json(&redact(state, &resource.schema(), args.show_sensitive))
        }
        Command::ReadData { type_name, config } => {
            let data_source = provider.data_source(type_name)?;
            let config: Value = serde_json::from_str(config).context("parsing lookup document")?;
            let result = data_source
                .read(&ctx, config)
                .await
                .with_context(|| format!("reading {}", type_name))?;
            print_json(&redact(result, &data_source.schema(), args.show_sensitive))
        }
    }
}

/// File options first, then flags and environment on top
fn provider_config(args: &Args) -> anyhow::Result<ProviderConfig> {
    let mut config = match &args.config {
        Some(path) => ProviderConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ProviderConfig::default(),
    };

    if args.endpoint.is_some() {
        config.endpoint = args.endpoint.clone();
    }
    if !args.endpoints.is_empty() {
        config.endpoints = args.endpoints.clone();
    }
    if args.token.is_some() {
        config.token = args.token.clone();
    }
    if args.username.is_some() {
        config.username = args.username.clone();
    }
    if args.password.is_some() {
        config.password = args.password.clone();
    }
    config.insecure_skip_verify |= args.insecure_skip_verify;

    if config.all_endpoints().is_empty() {
        bail!("no dashboard endpoint: pass --endpoint or set CEPH_DASHBOARD_ENDPOINT");
    }
    Ok(config)
}

fn redact(mut doc: Value, schema: &Schema, show_sensitive: bool) -> Value {
    if show_sensitive {
        return doc;
    }
    if let Some(object) = doc.as_object_mut() {
        for name in schema.sensitive_attributes() {
            if let Some(value) = object.get_mut(name) {
                if !value.is_null() {
                    *value = Value::String("<sensitive>".into());
                }
            }
        }
    }
    doc
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},hyper=warn,reqwest=warn,rustls=warn", level)));

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
