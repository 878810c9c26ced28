//! Finboard CLI
//!
//! Command-line access to the Finboard backend through the shared client.
//!
//! # Configuration
//!
//! Environment variables:
//! - `FINBOARD_API_URL`: Backend base address (default: http://localhost:8000)
//! - `FINBOARD_TIMEOUT_MS`: Per-call timeout (default: 10000)
//! - `FINBOARD_ENV`: `development` or `production`
//! - `FINBOARD_STORAGE_PATH`: File holding the stored bearer token
//! - `RUST_LOG`: Log filter (default: the configured level)

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use finboard::config::{generate_default_config, Config};
use finboard::{AppContext, Method, OperationDescriptor};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "finboard", version, about = "Call the Finboard backend through the shared client")]
struct Cli {
    /// Config file (defaults to the standard locations)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute one remote operation and print its payload
    Call {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE, ...)
        method: Method,
        /// Path relative to the base address, or an absolute URL
        path: String,
        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
        /// Extra header as `Name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        /// Query parameter as `key=value` (repeatable)
        #[arg(short, long = "param")]
        params: Vec<String>,
        /// Component name attached to tracked errors
        #[arg(long)]
        component: Option<String>,
    },
    /// Store a bearer token
    Login { token: String },
    /// Remove the stored bearer token
    Logout,
    /// Show transport and session settings
    Status,
    /// Print a commented default config file
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };

    init_logging(&config);

    match cli.command {
        Command::InitConfig => {
            print!("{}", generate_default_config());
            Ok(())
        }
        Command::Login { token } => {
            let ctx = AppContext::new(&config)?;
            ctx.session().login(&token)?;
            println!("Token stored in {}", config.storage.path);
            Ok(())
        }
        Command::Logout => {
            let ctx = AppContext::new(&config)?;
            ctx.session().logout()?;
            println!("Logged out");
            Ok(())
        }
        Command::Status => {
            let ctx = AppContext::new(&config)?;
            let transport = ctx.transport();
            println!("base url:      {}", transport.base_url());
            println!("timeout:       {} ms", transport.config().timeout_ms);
            println!("environment:   {:?}", config.environment);
            println!("authenticated: {}", ctx.session().is_authenticated());
            println!("storage:       {}", config.storage.path);
            Ok(())
        }
        Command::Call {
            method,
            path,
            data,
            headers,
            params,
            component,
        } => {
            let ctx = AppContext::new(&config)?;
            ctx.install_panic_hook();

            let mut descriptor = OperationDescriptor::new(method, path);
            if let Some(data) = data {
                let body = serde_json::from_str(&data).context("--data is not valid JSON")?;
                descriptor = descriptor.body(body);
            }
            for header in &headers {
                let (name, value) = split_pair(header, ':')?;
                descriptor = descriptor.header(name, value);
            }
            for param in &params {
                let (key, value) = split_pair(param, '=')?;
                descriptor = descriptor.param(key, value);
            }

            let mut operation = ctx.operation::<serde_json::Value>(descriptor);
            if let Some(component) = component {
                operation = operation.with_component(component);
            }

            match operation.execute().await {
                Ok(response) => {
                    tracing::info!(status = response.status, "Call succeeded");
                    println!("{}", serde_json::to_string_pretty(&response.data)?);
                    Ok(())
                }
                Err(e) => {
                    for record in ctx.sink().get_logs() {
                        eprintln!("{}", serde_json::to_string(&record)?);
                    }
                    let message = operation.error().unwrap_or_else(|| e.to_string());
                    Err(anyhow!(message))
                }
            }
        }
    }
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("finboard={}", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn split_pair(raw: &str, separator: char) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once(separator)
        .ok_or_else(|| anyhow!("expected `key{}value`, got {:?}", separator, raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("empty key in {:?}", raw));
    }
    Ok((key.to_string(), value.trim().to_string()))
}
