// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Report templates, designs, generated report files and report operations.
//!
//! ```text
//! ReportTemplate --create_design--> ReportDesign --generate--> TaskPoller
//!                                        |                        |
//!                                        +--report_files--> ReportFile --export--> bytes
//! ```

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::element::{Element, ElementKind, RemoteRef, element_type, parse_listing};
use crate::error::{Result, SdkError};
use crate::submit::{GenerateOptions, TaskPoller, submit, task_poller};
use crate::transport::{ActionRequest, Transport};

element_type! {
    /// Template from which report designs are created.
    ReportTemplate => ElementKind::ReportTemplate
}

element_type! {
    /// Report definition that can be generated on demand.
    ReportDesign => ElementKind::ReportDesign
}

element_type! {
    /// A generated report stored on the server.
    ReportFile => ElementKind::ReportFile
}

element_type! {
    /// Scheduled report generation task.
    ReportOperation => ElementKind::ReportOperation
}

/// Any report element, dispatched on the reference's kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportResource {
    Template(ReportTemplate),
    Design(ReportDesign),
    File(ReportFile),
    Operation(ReportOperation),
}

impl ReportResource {
    pub fn from_ref(remote: RemoteRef) -> Result<Self> {
        Ok(match remote.kind() {
            ElementKind::ReportTemplate => Self::Template(ReportTemplate::from_ref_unchecked(remote)),
            ElementKind::ReportDesign => Self::Design(ReportDesign::from_ref_unchecked(remote)),
            ElementKind::ReportFile => Self::File(ReportFile::from_ref_unchecked(remote)),
            ElementKind::ReportOperation => {
                Self::Operation(ReportOperation::from_ref_unchecked(remote))
            }
            _ => {
                return Err(SdkError::InvalidInput(format!(
                    "{} is not a report element",
                    remote
                )));
            }
        })
    }

    pub fn remote_ref(&self) -> &RemoteRef {
        match self {
            Self::Template(t) => t.remote_ref(),
            Self::Design(d) => d.remote_ref(),
            Self::File(f) => f.remote_ref(),
            Self::Operation(o) => o.remote_ref(),
        }
    }
}

fn rejected(operation: &str, target: &dyn std::fmt::Display) -> impl FnOnce(SdkError) -> SdkError {
    let operation = operation.to_string();
    let target = target.to_string();
    move |e| match e {
        SdkError::Server { status, message } => SdkError::SubmissionFailed {
            operation,
            target,
            reason: format!("{} (http {})", message, status),
        },
        other => other,
    }
}

impl ReportTemplate {
    /// Create a report design named `name` from this template.
    #[instrument(skip(self, transport), fields(template = %self))]
    pub fn create_design<T: Transport + ?Sized>(
        &self,
        transport: &T,
        name: &str,
    ) -> Result<ReportDesign> {
        let request = ActionRequest::post().with_param("name", name);
        let response = transport
            .invoke(&self.0, "create_design", &request)
            .map_err(rejected("create_design", self))?;

        let href = response.location.ok_or_else(|| SdkError::SubmissionFailed {
            operation: "create_design".to_string(),
            target: self.to_string(),
            reason: "server returned no location for the new design".to_string(),
        })?;
        info!(design = %name, href = %href, "Report design created");
        Ok(ReportDesign(RemoteRef::new(
            ElementKind::ReportDesign,
            href,
            Some(name.to_string()),
        )))
    }
}

impl ReportDesign {
    /// Start generating a report; the returned poller tracks the task.
    #[instrument(skip(self, transport, options), fields(design = %self))]
    pub fn generate<T: Transport>(
        &self,
        transport: T,
        options: &GenerateOptions,
    ) -> Result<TaskPoller<T>> {
        let handle = submit(&transport, &self.0, "generate", &options.to_request())?;
        Ok(task_poller(transport, handle))
    }

    /// Reports generated from this design, in server order.
    pub fn report_files<T: Transport + ?Sized>(&self, transport: &T) -> Result<Vec<ReportFile>> {
        let listing = transport
            .invoke(&self.0, "report_files", &ActionRequest::get())?
            .json()?;
        Ok(parse_listing(&listing)?
            .into_iter()
            .map(|r| {
                ReportFile(RemoteRef::new(
                    ElementKind::ReportFile,
                    r.href(),
                    r.name().map(str::to_string),
                ))
            })
            .collect())
    }
}

/// Time information of a generated report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportTimestamps {
    pub creation_time: DateTime<Utc>,
    pub period_begin: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

/// A generated report together with its timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    pub file: ReportFile,
    pub creation_time: DateTime<Utc>,
    pub period_begin: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

/// Export formats supported by report files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Pdf,
    Text,
    Html,
}

impl ExportFormat {
    pub fn accept(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Text => "text/plain",
            Self::Html => "text/html",
        }
    }

    /// Value of the `format` query parameter, if one is sent.
    pub fn format_param(&self) -> Option<&'static str> {
        match self {
            Self::Pdf => None,
            Self::Text => Some("txt"),
            Self::Html => Some("html"),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "txt",
            Self::Html => "html",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "txt" | "text" => Ok(Self::Text),
            "html" => Ok(Self::Html),
            other => Err(SdkError::InvalidInput(format!(
                "unsupported export format: {}",
                other
            ))),
        }
    }
}

/// Result of an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutput {
    /// Content was written to a local file.
    Written { path: PathBuf, bytes: u64 },
    /// Content returned in memory.
    Content(Vec<u8>),
}

fn millis_field(doc: &Value, field: &str) -> Result<DateTime<Utc>> {
    let ms = doc
        .get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| SdkError::UnexpectedResponse(format!("report has no {}", field)))?;
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| SdkError::UnexpectedResponse(format!("{} out of range: {}", field, ms)))
}

impl ReportFile {
    /// Creation and period timestamps, as reported by the server.
    pub fn timestamps<T: Transport + ?Sized>(&self, transport: &T) -> Result<ReportTimestamps> {
        let doc = self.attributes(transport)?;
        Ok(ReportTimestamps {
            creation_time: millis_field(&doc, "creation_time")?,
            period_begin: millis_field(&doc, "period_begin")?,
            period_end: millis_field(&doc, "period_end")?,
        })
    }

    pub fn artifact<T: Transport + ?Sized>(&self, transport: &T) -> Result<ReportArtifact> {
        let ts = self.timestamps(transport)?;
        Ok(ReportArtifact {
            file: self.clone(),
            creation_time: ts.creation_time,
            period_begin: ts.period_begin,
            period_end: ts.period_end,
        })
    }

    /// Export the report.
    ///
    /// With a `destination` the content overwrites that file and nothing is
    /// returned in memory. The file is only created once the server has
    /// answered successfully, and is removed again if writing fails.
    #[instrument(skip(self, transport), fields(report = %self))]
    pub fn export<T: Transport + ?Sized>(
        &self,
        transport: &T,
        format: ExportFormat,
        destination: Option<&Path>,
    ) -> Result<ExportOutput> {
        let mut request = ActionRequest::get().with_accept(format.accept());
        if let Some(value) = format.format_param() {
            request = request.with_param("format", value);
        }

        let response = transport
            .invoke(&self.0, "export", &request)
            .map_err(|e| match e {
                SdkError::Server { status, message } => SdkError::ExportFailed {
                    target: self.to_string(),
                    reason: format!("{} (http {})", message, status),
                },
                SdkError::ActionNotFound { .. } => SdkError::ExportFailed {
                    target: self.to_string(),
                    reason: "report cannot be exported in its current state".to_string(),
                },
                SdkError::UnexpectedResponse(reason) => SdkError::ExportFailed {
                    target: self.to_string(),
                    reason,
                },
                other => other,
            })?;
        debug!(bytes = response.body.len(), "Export received");

        match destination {
            None => Ok(ExportOutput::Content(response.body)),
            Some(path) => {
                write_file(path, &response.body)?;
                info!(path = %path.display(), "Report exported");
                Ok(ExportOutput::Written {
                    path: path.to_path_buf(),
                    bytes: response.body.len() as u64,
                })
            }
        }
    }
}

fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    if let Err(e) = file.write_all(content).and_then(|_| file.sync_all()) {
        drop(file);
        if let Err(cleanup) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %cleanup, "Could not remove partial export");
        }
        return Err(e.into());
    }
    Ok(())
}

/// Settings of a scheduled report operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportOperationOptions {
    /// Launch time, epoch seconds.
    pub launch_time: Option<i64>,
    /// Period duration in seconds.
    pub overriding_duration: Option<i64>,
    pub report_design: Option<ReportDesign>,
    pub report_per_sender: Option<bool>,
    pub use_elasticsearch: bool,
    pub export_in_txt: bool,
    pub export_in_pdf: bool,
    pub export_in_html: bool,
    pub stored: bool,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl ReportOperationOptions {
    fn to_body(&self) -> Value {
        let mut body = json!({
            "launch_time": self.launch_time,
            "report_design_ref": self.report_design.as_ref().map(|d| d.href().to_string()),
            "overriding_duration": self.overriding_duration,
            "report_per_sender": self.report_per_sender,
            "use_elasticsearch": self.use_elasticsearch,
            "export_in_txt": self.export_in_txt,
            "export_in_pdf": self.export_in_pdf,
            "export_in_html": self.export_in_html,
            "stored": self.stored,
            "email": self.email,
        });
        if let (Some(name), Some(map)) = (&self.name, body.as_object_mut()) {
            map.insert("name".into(), Value::String(name.clone()));
        }
        body
    }
}

impl ReportOperation {
    /// Create a report operation.
    pub fn create<T: Transport + ?Sized>(
        transport: &T,
        options: &ReportOperationOptions,
    ) -> Result<Self> {
        let remote = transport
            .create(&Self::KIND, &options.to_body())
            .map_err(rejected("create", &Self::KIND))?;
        info!(href = %remote.href(), "Report operation created");
        Ok(Self(remote))
    }

    /// Raw status document of the operation.
    pub fn status<T: Transport + ?Sized>(&self, transport: &T) -> Result<Value> {
        transport
            .invoke(&self.0, "status", &ActionRequest::get())?
            .json()
    }
}
