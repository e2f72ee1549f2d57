//! Command-line surface.

use crate::doctor;
use crate::server;
use crate::token::read_token_file;
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use sandgate_commons::TokenResponse;
use sandgate_config::{ConfigBuilder, ConfigManager};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "sandgate")]
#[command(about = "Sandboxed filesystem and command gateway for local tooling")]
#[command(version)]
pub struct Cli {
    /// Sandbox root directory (defaults to $SANDBOX_ROOT or the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Configuration file (defaults to sandgate.toml in the sandbox root)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override a configuration key, e.g. `--set rate_limit.max_requests=500` (repeatable)
    #[arg(long = "set", global = true, value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub overrides: Vec<(String, String)>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Run the gateway (the default)
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Loopback address to bind
        #[arg(long)]
        host: Option<String>,

        /// Serve the token to same-origin callers at /bridge-token
        #[arg(long)]
        expose_token_endpoint: bool,
    },
    /// Check whether a gateway is up and its token file is in place
    Doctor {
        /// Gateway base URL (defaults to the configured host and port)
        #[arg(long)]
        url: Option<String>,
    },
    /// Print the current token as JSON
    Token,
}

fn parse_key_value(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("override key must not be empty"));
    }
    Ok((key.to_owned(), value.to_owned()))
}

/// Merge defaults, files, environment and flags into a validated config.
pub fn load_config(cli: &Cli) -> Result<ConfigManager> {
    let mut builder = ConfigBuilder::new();
    if let Some(root) = &cli.root {
        builder = builder
            .workspace(root)
            .cli_override("sandbox.root", root.display().to_string());
    }
    if let Some(file) = &cli.config {
        builder = builder.config_file(file);
    }
    if let Some(Commands::Serve {
        port,
        host,
        expose_token_endpoint,
    }) = &cli.command
    {
        if let Some(port) = port {
            builder = builder.cli_override("server.port", i64::from(*port));
        }
        if let Some(host) = host {
            builder = builder.cli_override("server.host", host.clone());
        }
        if *expose_token_endpoint {
            builder = builder.cli_override("server.expose_token_endpoint", true);
        }
    }
    builder.cli_overrides(&cli.overrides).build()
}

pub async fn dispatch(command: Option<Commands>, manager: &ConfigManager) -> Result<()> {
    let config = manager.config();
    let root = manager.sandbox_root();

    match command {
        None | Some(Commands::Serve { .. }) => server::run(config, &root).await,
        Some(Commands::Doctor { url }) => {
            let url = url.unwrap_or_else(|| {
                format!("http://{}:{}", config.server.host, config.server.port)
            });
            let report = doctor::run_doctor(&url, config.sandbox.token_path(&root)).await?;
            println!("{report}");
            if report.is_healthy() {
                Ok(())
            } else {
                Err(anyhow!("gateway at {url} is not ready"))
            }
        }
        Some(Commands::Token) => {
            let path = config.sandbox.token_path(&root);
            let token = read_token_file(&path)?
                .with_context(|| format!("No token file at {}", path.display()))?;
            println!("{}", serde_json::to_string(&TokenResponse { token })?);
            Ok(())
        }
    }
}
