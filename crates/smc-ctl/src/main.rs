// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SMC Control CLI
//!
//! Operator tool for the SMC management server.
//!
//! Usage:
//!   smc-ctl [connection options] <command>
//!
//! Commands:
//!   report templates|designs|files|create-design|generate|export|run|schedule
//!   nodes wait-ready --engine <name>      Wait for every node of an engine to be READY
//!   routes import --engine <name> --file <path>
//!
//! Connection options fall back to `SMC_*` environment variables; a `.env`
//! file in the working directory is loaded first.

use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use smc_sdk::{Credentials, SdkConfig, Session};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod nodes;
mod report;
mod routes;

/// SMC operator CLI
#[derive(Parser, Debug)]
#[command(name = "smc-ctl")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

/// How to reach and authenticate against the management server.
#[derive(Args, Debug, Clone)]
struct ConnectionArgs {
    /// SMC API url like https://192.168.1.1:8082
    #[arg(long, global = true, env = "SMC_API_URL")]
    api_url: Option<String>,

    /// API version to use (discovered when omitted)
    #[arg(long, global = true, env = "SMC_API_VERSION")]
    api_version: Option<String>,

    /// API client key
    #[arg(long, global = true, env = "SMC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Administrator login
    #[arg(long, global = true, env = "SMC_USER")]
    smc_user: Option<String>,

    /// Administrator password
    #[arg(long, global = true, env = "SMC_PWD", hide_env_values = true)]
    smc_pwd: Option<String>,
}

impl ConnectionArgs {
    fn credentials(&self) -> Result<Credentials> {
        match (&self.api_key, &self.smc_user, &self.smc_pwd) {
            (Some(key), _, _) => Ok(Credentials::ApiKey(key.clone())),
            (None, Some(user), Some(password)) => Ok(Credentials::Login {
                user: user.clone(),
                password: password.clone(),
            }),
            _ => bail!("either --api-key or both --smc-user and --smc-pwd are required"),
        }
    }

    fn config(&self) -> Result<SdkConfig> {
        let url = self
            .api_url
            .as_deref()
            .context("--api-url (or SMC_API_URL) is required")?;
        let mut config = SdkConfig::new(url, self.credentials()?)?;
        if let Some(version) = &self.api_version {
            config = config.with_api_version(version);
        }
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Report templates, designs and generated reports
    Report {
        #[command(subcommand)]
        command: report::ReportCommand,
    },

    /// Engine node operations
    Nodes {
        #[command(subcommand)]
        command: nodes::NodesCommand,
    },

    /// Static route migration
    Routes {
        #[command(subcommand)]
        command: routes::RoutesCommand,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("smc_ctl=info,smc_sdk=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.connection.config()?;
    let session = Session::open(config).context("failed to log in")?;

    let code = match cli.command {
        Commands::Report { command } => report::handle_command(&session, command)?,
        Commands::Nodes { command } => nodes::handle_command(&session, command)?,
        Commands::Routes { command } => routes::handle_command(&session, command)?,
    };

    session.close().context("logout failed")?;
    Ok(code)
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_api_key_wins_over_login() {
        let args = ConnectionArgs {
            api_url: Some("https://smc:8082".into()),
            api_version: Some("6.10".into()),
            api_key: Some("k".into()),
            smc_user: Some("admin".into()),
            smc_pwd: Some("pwd".into()),
        };
        assert!(matches!(args.credentials().unwrap(), Credentials::ApiKey(_)));
        let config = args.config().unwrap();
        assert_eq!(config.api_version.as_deref(), Some("6.10"));
    }

    #[test]
    fn test_missing_credentials() {
        let args = ConnectionArgs {
            api_url: Some("https://smc:8082".into()),
            api_version: None,
            api_key: None,
            smc_user: Some("admin".into()),
            smc_pwd: None,
        };
        assert!(args.credentials().is_err());
    }

    #[test]
    fn test_parse_routes_import() {
        let cli = Cli::try_parse_from([
            "smc-ctl",
            "--api-url",
            "http://172.18.1.150:8082",
            "routes",
            "import",
            "--engine",
            "mcafee2",
            "--file",
            "routes.txt",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Routes { .. }));
        assert_eq!(cli.connection.api_url.as_deref(), Some("http://172.18.1.150:8082"));
    }
}
