// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! `nodes` subcommands.

use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use clap::Subcommand;
use smc_sdk::{Element, Engine, Node, OperationPoller, PollResult, Session, StatusProbe};
use tracing::{error, info, warn};

#[derive(Subcommand, Debug)]
pub enum NodesCommand {
    /// Wait until every node of an engine reports READY
    WaitReady {
        /// Engine name
        #[arg(long)]
        engine: String,
        /// Trigger initial contact on every node first
        #[arg(long)]
        initial_contact: bool,
        /// Seconds between status checks
        #[arg(long, default_value_t = 5)]
        poll_secs: u64,
        /// Give up after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

/// Outcome of waiting on one node.
#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeOutcome {
    Ready,
    Failed(String),
    TimedOut,
}

/// Drive `poller` to a terminal state, retrying status checks that fail
/// before the server answers.
fn wait_with_retry<P: StatusProbe>(
    poller: &OperationPoller<P>,
    interval: Duration,
    timeout: Option<Duration>,
) -> NodeOutcome {
    let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
    loop {
        let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
        match poller.wait(interval, remaining) {
            Ok(PollResult::Succeeded { .. }) => return NodeOutcome::Ready,
            Ok(PollResult::Failed { reason, .. }) => return NodeOutcome::Failed(reason),
            Ok(PollResult::Pending) => return NodeOutcome::TimedOut,
            Err(e) => {
                warn!(error = %e, "Status check failed, retrying");
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    return NodeOutcome::TimedOut;
                }
                std::thread::sleep(interval);
            }
        }
    }
}

fn wait_ready(
    session: &Session,
    engine: &str,
    initial_contact: bool,
    interval: Duration,
    timeout: Option<Duration>,
) -> Result<ExitCode> {
    let engine = Engine::find(session, engine)?;
    let nodes = engine.nodes(session)?;
    if nodes.is_empty() {
        bail!("{} has no nodes", engine);
    }

    let mut handles = Vec::with_capacity(nodes.len());
    let mut failures = 0usize;
    for node in &nodes {
        if initial_contact {
            match node.initial_contact(session) {
                Ok(handle) => handles.push((node.clone(), handle)),
                Err(e) => {
                    error!(node = %node, error = %e, "Initial contact failed");
                    failures += 1;
                }
            }
        } else {
            handles.push((node.clone(), node.readiness_handle("wait_ready")));
        }
    }

    info!(count = handles.len(), "Waiting for nodes to be READY");
    let transport = session.transport();
    let outcomes: Vec<(Node, NodeOutcome)> = std::thread::scope(|s| {
        let workers: Vec<_> = handles
            .into_iter()
            .map(|(node, handle)| {
                s.spawn(move || {
                    let poller = Node::readiness_poller(transport, handle);
                    let name = node.to_string();
                    poller.on_complete(move |result| info!(node = %name, ?result, "Node settled"));
                    let outcome = wait_with_retry(&poller, interval, timeout);
                    (node, outcome)
                })
            })
            .collect();
        workers
            .into_iter()
            .filter_map(|w| w.join().ok())
            .collect()
    });

    // workers that panicked
    failures += nodes.len().saturating_sub(failures + outcomes.len());
    for (node, outcome) in &outcomes {
        match outcome {
            NodeOutcome::Ready => println!("{}\tREADY", node.name().unwrap_or(node.href())),
            NodeOutcome::Failed(reason) => {
                failures += 1;
                println!("{}\tFAILED\t{}", node.name().unwrap_or(node.href()), reason);
            }
            NodeOutcome::TimedOut => {
                failures += 1;
                println!("{}\tTIMEOUT", node.name().unwrap_or(node.href()));
            }
        }
    }

    if failures > 0 {
        error!(failures, "Not every node became READY");
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

pub fn handle_command(session: &Session, command: NodesCommand) -> Result<ExitCode> {
    match command {
        NodesCommand::WaitReady {
            engine,
            initial_contact,
            poll_secs,
            timeout_secs,
        } => wait_ready(
            session,
            &engine,
            initial_contact,
            Duration::from_secs(poll_secs.max(1)),
            timeout_secs.map(Duration::from_secs),
        ),
    }
}
