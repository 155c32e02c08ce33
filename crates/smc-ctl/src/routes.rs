// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! `routes` subcommands: static route migration from `cf static query`
//! output.
//!
//! Input lines look like:
//!
//! ```text
//! route add route=10.10.10.0/255.255.255.0 gateway=10.2.11.7 distance=1 description=''
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use regex::Regex;
use smc_sdk::{Element, Engine, Session};
use tracing::{error, info};

#[derive(Subcommand, Debug)]
pub enum RoutesCommand {
    /// Add every route of a route dump to an engine
    Import {
        /// Engine name
        #[arg(long)]
        engine: String,
        /// Route dump file
        #[arg(long)]
        file: PathBuf,
    },
}

/// One static route to add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticRoute {
    /// Destination in CIDR notation.
    pub network: String,
    pub gateway: String,
}

/// Convert `10.0.0.0/255.255.255.0` to `10.0.0.0/24`.
///
/// Prefix lengths are accepted as-is. Non-contiguous masks are rejected.
pub fn mask_to_cidr(network_and_mask: &str) -> Result<String> {
    let (network, mask) = network_and_mask
        .split_once('/')
        .with_context(|| format!("missing mask in {}", network_and_mask))?;

    if !mask.contains('.') {
        let prefix: u8 = mask
            .parse()
            .with_context(|| format!("invalid prefix length in {}", network_and_mask))?;
        if prefix > 32 {
            bail!("invalid prefix length in {}", network_and_mask);
        }
        return Ok(format!("{}/{}", network, prefix));
    }

    let octets = mask
        .split('.')
        .map(|o| o.parse::<u8>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("invalid netmask in {}", network_and_mask))?;
    if octets.len() != 4 {
        bail!("invalid netmask in {}", network_and_mask);
    }

    let bits = u32::from_be_bytes([octets[0], octets[1], octets[2], octets[3]]);
    let prefix = bits.leading_ones();
    if bits.checked_shl(prefix).unwrap_or(0) != 0 {
        bail!("non-contiguous netmask in {}", network_and_mask);
    }
    Ok(format!("{}/{}", network, prefix))
}

/// Parses route dump lines.
pub struct RouteParser {
    pattern: Regex,
}

impl RouteParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(r"route=(\S+)\s+gateway=(\S+)")?,
        })
    }

    /// Parse one line. Lines without a route are `None`.
    pub fn parse_line(&self, line: &str) -> Option<Result<StaticRoute>> {
        let caps = self.pattern.captures(line)?;
        Some(mask_to_cidr(&caps[1]).map(|network| StaticRoute {
            network,
            gateway: caps[2].to_string(),
        }))
    }
}

fn import(session: &Session, engine: &str, file: &Path) -> Result<ExitCode> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let engine = Engine::find(session, engine)?;
    let parser = RouteParser::new()?;

    let mut added = 0usize;
    let mut failed = 0usize;
    for (lineno, line) in content.lines().enumerate() {
        let route = match parser.parse_line(line) {
            None => continue,
            Some(Ok(route)) => route,
            Some(Err(e)) => {
                error!(line = lineno + 1, error = %e, "Skipping malformed route");
                failed += 1;
                continue;
            }
        };

        info!(network = %route.network, gateway = %route.gateway, "Adding route");
        match engine.add_route(session, &route.gateway, &route.network) {
            Ok(()) => {
                info!(network = %route.network, gateway = %route.gateway, "Route added");
                added += 1;
            }
            Err(e) => {
                error!(
                    network = %route.network,
                    gateway = %route.gateway,
                    reason = %e,
                    "Failed adding route"
                );
                failed += 1;
            }
        }
    }

    println!(
        "{}: {} routes added, {} failed",
        engine.name().unwrap_or(engine.href()),
        added,
        failed
    );
    Ok(if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

pub fn handle_command(session: &Session, command: RoutesCommand) -> Result<ExitCode> {
    match command {
        RoutesCommand::Import { engine, file } => import(session, &engine, &file),
    }
}
