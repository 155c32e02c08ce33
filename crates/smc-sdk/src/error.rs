// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for smc-sdk.

use std::fmt;

use thiserror::Error;

/// Result type using SdkError.
pub type Result<T> = std::result::Result<T, SdkError>;

/// Errors that can occur when using the SDK.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Configuration error (missing or invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Network or transport failure talking to the management server.
    #[error("connection error: {0}")]
    Connection(String),

    /// Server answered with a non-success status.
    #[error("server error [{status}]: {message}")]
    Server { status: u16, message: String },

    /// Unexpected response from server.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// No element of the given kind carries this name.
    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },

    /// The element does not expose the requested action link.
    #[error("action '{action}' not available on {target}")]
    ActionNotFound { action: String, target: String },

    /// Invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Local I/O error (exported files).
    #[error("io error: {0}")]
    Io(String),

    /// The server rejected the request that starts an operation.
    #[error("{operation} on {target} rejected: {reason}")]
    SubmissionFailed {
        operation: String,
        target: String,
        reason: String,
    },

    /// The server reported that an operation finished unsuccessfully.
    #[error("{operation} failed: {reason}{}", code_suffix(.code))]
    OperationFailed {
        operation: String,
        reason: String,
        code: Option<i64>,
    },

    /// The resource cannot be exported in its current state or format.
    #[error("export of {target} failed: {reason}")]
    ExportFailed { target: String, reason: String },

    /// A wait ended without the operation reaching a terminal state.
    #[error("{operation} still pending after {waited_ms}ms")]
    Timeout { operation: String, waited_ms: u64 },

    /// Status check failed before the server could answer.
    #[error(transparent)]
    Poll(#[from] PollError),

    /// Failure attributed to one stage of a multi-step workflow.
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: Box<SdkError>,
    },
}

fn code_suffix(code: &Option<i64>) -> String {
    code.map(|c| format!(" (code {})", c)).unwrap_or_default()
}

impl SdkError {
    /// Attach a pipeline stage to this error.
    pub fn at_stage(self, stage: PipelineStage) -> Self {
        SdkError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Stage this error was raised in, if any.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            SdkError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SdkError {
    fn from(err: std::io::Error) -> Self {
        SdkError::Io(err.to_string())
    }
}

impl From<url::ParseError> for SdkError {
    fn from(err: url::ParseError) -> Self {
        SdkError::Config(format!("invalid url: {}", err))
    }
}

/// A status check that could not be completed.
///
/// This is a local, usually transient condition: the operation itself may
/// still be running on the server. Retry `poll_once` with the same handle.
#[derive(Debug, Error)]
#[error("status check for {job_id} failed: {source}")]
pub struct PollError {
    /// Server-assigned job identifier of the polled operation.
    pub job_id: String,
    /// Underlying transport or decoding error.
    #[source]
    pub source: Box<SdkError>,
}

impl PollError {
    pub fn new(job_id: impl Into<String>, source: SdkError) -> Self {
        Self {
            job_id: job_id.into(),
            source: Box::new(source),
        }
    }
}

/// Steps of the template → design → report → export workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    CreateDesign,
    Generate,
    Wait,
    Export,
    Cleanup,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateDesign => "create_design",
            Self::Generate => "generate",
            Self::Wait => "wait",
            Self::Export => "export",
            Self::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
