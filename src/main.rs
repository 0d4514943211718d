//! rpcbase — JSON-RPC 2.0 server over newline-delimited TCP
//!
//! Serves a small set of demonstration methods through the dispatch core.
//! An optional service schema document (JSON) supplies per-method params and
//! result schemas and enables `rpc.discover`.
//!
//! Usage:
//!   rpcbase                                  # Default port 7070
//!   rpcbase --port 0                         # OS-assigned port
//!   rpcbase --schema service.json --debug    # Validate params and results

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use rpcbase_protocol::{MethodError, RequestContext};
use rpcbase_server::{JsonRpcService, MethodSchema, ServiceConfig, ServiceSchema};
use rpcbase_transport::{TransportConfig, TransportServer};
use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rpcbase", about = "JSON-RPC 2.0 server over newline-delimited TCP")]
struct Cli {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "7070")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// Service schema document (JSON-Schema with definitions.methods)
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Validate method results against their result schemas
    #[arg(long)]
    debug: bool,

    /// Accept requests that omit the "jsonrpc" field
    #[arg(long)]
    legacy_version: bool,

    /// Maximum concurrent connections
    #[arg(long, default_value = "32")]
    max_connections: usize,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to a file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(cli: &Cli) -> Result<()> {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if let Some(ref log_path) = cli.log_file {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .with_context(|| format!("opening log file {}", log_path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();

        eprintln!("Logging to {}", log_path.display());
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn load_schema(path: &Path) -> Result<ServiceSchema> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading schema {}", path.display()))?;
    let document: Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing schema {}", path.display()))?;
    ServiceSchema::from_value(document).with_context(|| format!("loading schema {}", path.display()))
}

fn numbers(params: &Option<Value>) -> Result<Vec<f64>, MethodError> {
    let items = match params {
        Some(Value::Array(items)) => items,
        _ => return Err(MethodError::invalid_params("expected an array of numbers")),
    };
    items
        .iter()
        .map(|v| v.as_f64().ok_or_else(|| MethodError::invalid_params("expected an array of numbers")))
        .collect()
}

fn register_methods(service: &mut JsonRpcService<RequestContext>) -> Result<()> {
    service.register("echo", |params, _ctx| Ok(params.unwrap_or(Value::Null)), None)?;

    service.register(
        "sum",
        |params, _ctx| Ok(json!(numbers(&params)?.iter().sum::<f64>())),
        Some(MethodSchema::params(json!({
            "type": "array",
            "items": { "type": "number" }
        }))),
    )?;

    service.register(
        "subtract",
        |params, _ctx| match numbers(&params)?.as_slice() {
            [a, b] => Ok(json!(a - b)),
            _ => Err(MethodError::invalid_params("expected exactly two numbers")),
        },
        None,
    )?;

    service.register(
        "whoami",
        |_params, ctx: &RequestContext| {
            Ok(json!({ "clientId": ctx.client_id, "peer": ctx.peer_addr }))
        },
        None,
    )?;

    service.register(
        "fail",
        |params, _ctx| {
            let code = params
                .as_ref()
                .and_then(|p| p.get("code"))
                .and_then(Value::as_i64)
                .and_then(|c| i32::try_from(c).ok());
            let err = MethodError::server("requested failure");
            Err(match code {
                Some(code) => err.with_code(code),
                None => err,
            })
        },
        Some(MethodSchema::params(json!({
            "type": "object",
            "properties": { "code": { "type": "integer", "minimum": -32099, "maximum": -32000 } }
        }))),
    )?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config = ServiceConfig::default()
        .with_debug(cli.debug)
        .with_missing_version_allowed(cli.legacy_version);

    let mut service = JsonRpcService::<RequestContext>::with_config(config);
    if let Some(ref path) = cli.schema {
        let schema = load_schema(path)?;
        info!("Loaded service schema with {} methods", schema.method_names().len());
        service.set_schema(schema)?;
    }
    register_methods(&mut service)?;

    let transport_config = TransportConfig {
        port: cli.port,
        hostname: cli.hostname.clone(),
        max_connections: Some(cli.max_connections),
    };

    let mut transport = TransportServer::start(transport_config, service)
        .await
        .context("starting transport")?;

    println!();
    println!("  rpcbase listening on tcp://{}:{}", cli.hostname, transport.port());
    println!("  One JSON-RPC payload per line. Press Ctrl+C to stop.");
    println!();

    tokio::signal::ctrl_c().await.context("waiting for Ctrl+C")?;

    println!("  Shutting down...");
    transport.stop().await;
    Ok(())
}
