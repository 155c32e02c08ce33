// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Asynchronous operation handles and status snapshots.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::element::RemoteRef;
use crate::error::{Result, SdkError};

/// Snapshot of an asynchronous operation's status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PollResult {
    /// Still running (or status not yet known).
    #[default]
    Pending,
    /// Finished; the produced resources in server order.
    Succeeded { resources: Vec<RemoteRef> },
    /// Finished unsuccessfully, as reported by the server.
    Failed { reason: String, code: Option<i64> },
}

impl PollResult {
    /// Whether no further state change can occur.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollResult::Pending)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PollResult::Succeeded { .. })
    }

    /// Resources produced by a successful operation.
    pub fn resources(&self) -> &[RemoteRef] {
        match self {
            PollResult::Succeeded { resources } => resources,
            _ => &[],
        }
    }

    /// Convert a terminal snapshot into a `Result`, naming the operation.
    ///
    /// `Pending` becomes `SdkError::Timeout` with the given wait duration.
    pub fn into_result(self, operation: &str, waited_ms: u64) -> Result<Vec<RemoteRef>> {
        match self {
            PollResult::Succeeded { resources } => Ok(resources),
            PollResult::Failed { reason, code } => Err(SdkError::OperationFailed {
                operation: operation.to_string(),
                reason,
                code,
            }),
            PollResult::Pending => Err(SdkError::Timeout {
                operation: operation.to_string(),
                waited_ms,
            }),
        }
    }
}

/// Local token for a submitted operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    /// When the submission was accepted.
    pub submitted_at: DateTime<Utc>,
    /// Server-assigned job identifier (the status document href).
    pub job_id: String,
    /// Element the operation was started on.
    pub target: RemoteRef,
    /// Action name, e.g. `generate`.
    pub operation: String,
    /// Status reported in the submission response.
    pub initial: PollResult,
}

impl OperationHandle {
    pub fn new(target: RemoteRef, operation: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            submitted_at: Utc::now(),
            job_id: job_id.into(),
            target,
            operation: operation.into(),
            initial: PollResult::Pending,
        }
    }

    pub fn with_initial(mut self, initial: PollResult) -> Self {
        self.initial = initial;
        self
    }
}

/// Task document returned by action submissions and their followers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskStatus {
    /// Href to poll for progress.
    #[serde(default)]
    pub follower: Option<String>,
    #[serde(default)]
    pub in_progress: Option<bool>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub progress: Option<i64>,
    #[serde(default)]
    pub error_code: Option<i64>,
    /// Hrefs of produced elements.
    #[serde(default)]
    pub resource: Vec<String>,
}

impl TaskStatus {
    pub fn parse(doc: &Value) -> Result<Self> {
        if !doc.is_object() {
            return Err(SdkError::UnexpectedResponse(
                "expected a task document".to_string(),
            ));
        }
        Ok(serde_json::from_value(doc.clone())?)
    }

    /// Map the task vocabulary onto a [`PollResult`].
    ///
    /// Documents that match no known combination are treated as pending.
    pub fn to_poll_result(&self) -> PollResult {
        match (self.in_progress, self.success) {
            (Some(true), _) => PollResult::Pending,
            (Some(false), Some(true)) => PollResult::Succeeded {
                resources: self.resource.iter().map(RemoteRef::from_href).collect(),
            },
            (Some(false), Some(false)) => PollResult::Failed {
                reason: self
                    .last_message
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "task failed without message".to_string()),
                code: self.error_code,
            },
            (in_progress, success) => {
                warn!(?in_progress, ?success, "Unrecognized task status, treating as pending");
                PollResult::Pending
            }
        }
    }
}
