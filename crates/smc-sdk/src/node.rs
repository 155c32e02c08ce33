// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Engines, their nodes, and node readiness tracking.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::element::{Element, ElementKind, RemoteRef, element_type, find_link, parse_listing};
use crate::error::{Result, SdkError};
use crate::operation::{OperationHandle, PollResult};
use crate::poller::{OperationPoller, StatusProbe};
use crate::transport::{ActionRequest, Transport};

/// A firewall engine (single or cluster).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Engine(RemoteRef);

impl Element for Engine {
    const KIND: ElementKind = ElementKind::Engine;

    fn from_ref_unchecked(remote: RemoteRef) -> Self {
        Self(remote)
    }

    fn remote_ref(&self) -> &RemoteRef {
        &self.0
    }

    // Engines come in many type tags (single_fw, fw_cluster, ...).
    fn accepts(kind: &ElementKind) -> bool {
        matches!(kind, ElementKind::Engine | ElementKind::Other(_))
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl Engine {
    /// Nodes of this engine, following its `nodes` link.
    #[instrument(skip(self, transport), fields(engine = %self))]
    pub fn nodes<T: Transport + ?Sized>(&self, transport: &T) -> Result<Vec<Node>> {
        let doc = self.attributes(transport)?;
        let link = find_link(&doc, "nodes").ok_or_else(|| SdkError::ActionNotFound {
            action: "nodes".to_string(),
            target: self.to_string(),
        })?;
        let nodes: Vec<Node> = parse_listing(&transport.read(&link.href)?)?
            .into_iter()
            .map(|r| {
                Node::from_ref_unchecked(RemoteRef::new(
                    ElementKind::Node,
                    r.href(),
                    r.name().map(str::to_string),
                ))
            })
            .collect();
        debug!(count = nodes.len(), "Engine nodes listed");
        Ok(nodes)
    }

    /// Add a static route to `network` (CIDR notation) via `gateway`.
    ///
    /// The server attaches the route to the interface whose network
    /// contains the gateway.
    #[instrument(skip(self, transport), fields(engine = %self))]
    pub fn add_route<T: Transport + ?Sized>(
        &self,
        transport: &T,
        gateway: &str,
        network: &str,
    ) -> Result<()> {
        let request = ActionRequest::post()
            .with_param("gateway", gateway)
            .with_param("network", network);
        transport
            .invoke(&self.0, "add_route", &request)
            .map_err(|e| match e {
                SdkError::Server { message, .. } => SdkError::SubmissionFailed {
                    operation: "add_route".to_string(),
                    target: self.to_string(),
                    reason: message,
                },
                other => other,
            })?;
        Ok(())
    }
}

element_type! {
    /// A single member of an engine.
    Node => ElementKind::Node
}

/// Appliance status as reported by a node's `status` action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NodeStatus {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub monitoring_state: Option<String>,
    #[serde(default)]
    pub monitoring_status: Option<String>,
    #[serde(default)]
    pub configuration_status: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl Node {
    /// Current appliance status.
    pub fn status<T: Transport + ?Sized>(&self, transport: &T) -> Result<NodeStatus> {
        let doc: Value = transport
            .invoke(&self.0, "status", &ActionRequest::get())?
            .json()?;
        Ok(serde_json::from_value(doc)?)
    }

    /// Trigger initial contact and return a handle for readiness polling.
    ///
    /// The server answers with the node's initial configuration right
    /// away; becoming `READY` happens later and is tracked through
    /// [`Node::readiness_poller`].
    #[instrument(skip(self, transport), fields(node = %self))]
    pub fn initial_contact<T: Transport + ?Sized>(&self, transport: &T) -> Result<OperationHandle> {
        transport
            .invoke(&self.0, "initial_contact", &ActionRequest::post())
            .map_err(|e| match e {
                SdkError::Server { message, .. } => SdkError::SubmissionFailed {
                    operation: "initial_contact".to_string(),
                    target: self.to_string(),
                    reason: message,
                },
                other => other,
            })?;
        info!("Initial contact requested");
        Ok(self.readiness_handle("initial_contact"))
    }

    /// Handle for tracking readiness without triggering anything.
    pub fn readiness_handle(&self, operation: &str) -> OperationHandle {
        OperationHandle::new(self.0.clone(), operation, self.0.href())
    }

    /// Poller that waits for this node to report `READY`.
    pub fn readiness_poller<T: Transport>(
        transport: T,
        handle: OperationHandle,
    ) -> OperationPoller<NodeReadinessProbe<T>> {
        OperationPoller::new(NodeReadinessProbe::new(transport), handle)
    }
}

/// Maps a node's `monitoring_state` onto [`PollResult`].
#[derive(Debug, Clone)]
pub struct NodeReadinessProbe<T> {
    transport: T,
}

impl<T: Transport> NodeReadinessProbe<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

/// Classify a monitoring state.
pub fn readiness(node: &RemoteRef, monitoring_state: Option<&str>) -> PollResult {
    match monitoring_state {
        Some("READY") => PollResult::Succeeded {
            resources: vec![node.clone()],
        },
        Some(state @ ("ERROR" | "SERVER_ERROR" | "DELETED")) => PollResult::Failed {
            reason: format!("{} reported monitoring state {}", node, state),
            code: None,
        },
        Some(
            "NO_STATUS" | "TIMEOUT" | "UNKNOWN" | "CONFIGURED" | "INITIAL" | "OFFLINE",
        ) => PollResult::Pending,
        other => {
            warn!(node = %node, state = ?other, "Unrecognized monitoring state, treating as pending");
            PollResult::Pending
        }
    }
}

impl<T: Transport> StatusProbe for NodeReadinessProbe<T> {
    fn probe(&self, handle: &OperationHandle) -> Result<PollResult> {
        let node = Node::from_ref_unchecked(handle.target.clone());
        let status = node.status(&self.transport)?;
        debug!(node = %node, state = ?status.monitoring_state, "Node status");
        Ok(readiness(&handle.target, status.monitoring_state.as_deref()))
    }
}
