// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SMC SDK
//!
//! Client SDK for the SMC management server's REST API.
//!
//! The server runs long operations (report generation, node initial
//! contact) asynchronously. Starting one returns an [`OperationHandle`];
//! an [`OperationPoller`] tracks it to a terminal [`PollResult`] with a
//! resource specific [`StatusProbe`].
//!
//! # Architecture
//!
//! - [`Session`] logs in, and logs out again when dropped.
//! - [`Transport`] is the request/response boundary. [`HttpTransport`] is
//!   the blocking implementation; every operation takes a transport
//!   explicitly.
//! - Typed element wrappers ([`ReportTemplate`], [`ReportDesign`],
//!   [`ReportFile`], [`ReportOperation`], [`Engine`], [`Node`]) carry the
//!   actions of each element kind.
//! - [`ReportPipeline`] runs template → design → report → export with
//!   stage-tagged errors.
//!
//! Pollers never spawn threads. To track several operations at once, run
//! one poller per handle on its own thread.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use smc_sdk::{Element, ExportFormat, GenerateOptions, ReportDesign, Session};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::from_env()?;
//!
//! let design = ReportDesign::find(&session, "Application and Web Security")?;
//! let poller = design.generate(&session, &GenerateOptions::new())?;
//! poller.on_complete(|result| println!("finished: {:?}", result));
//!
//! let result = poller.wait(Duration::from_secs(3), Some(Duration::from_secs(600)))?;
//! if let Some(report) = result.resources().first() {
//!     let file = smc_sdk::ReportFile::from_ref(report.clone())?;
//!     file.export(&session, ExportFormat::Pdf, Some("/tmp/report.pdf".as_ref()))?;
//! }
//!
//! session.close()?;
//! # Ok(())
//! # }
//! ```

mod config;
mod element;
mod error;
mod http;
mod node;
mod operation;
mod pipeline;
mod poller;
mod reports;
mod session;
mod submit;
mod transport;

#[cfg(test)]
mod testing;

pub use config::{Credentials, SdkConfig};
pub use element::{Element, ElementKind, Link, RemoteRef, find_link, parse_listing};
pub use error::{PipelineStage, PollError, Result, SdkError};
pub use http::HttpTransport;
pub use node::{Engine, Node, NodeReadinessProbe, NodeStatus, readiness};
pub use operation::{OperationHandle, PollResult, TaskStatus};
pub use pipeline::{ExportTarget, PipelineOutput, ReportPipeline};
pub use poller::{OperationPoller, PollerState, StatusProbe};
pub use reports::{
    ExportFormat, ExportOutput, ReportArtifact, ReportDesign, ReportFile, ReportOperation,
    ReportOperationOptions, ReportResource, ReportTemplate, ReportTimestamps,
};
pub use session::Session;
pub use submit::{GenerateOptions, TaskPoller, TaskProbe, submit, task_poller};
pub use transport::{ActionRequest, Method, RawResponse, Transport};
