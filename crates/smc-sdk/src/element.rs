// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! References to server-side elements.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SdkError};
use crate::transport::Transport;

/// Type tag of a server-side element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementKind {
    ReportDesign,
    ReportTemplate,
    ReportFile,
    ReportOperation,
    Engine,
    Node,
    /// A type the SDK does not model; the server's tag is preserved.
    Other(String),
}

impl ElementKind {
    /// Server type tag (collection name under `/elements`).
    pub fn as_str(&self) -> &str {
        match self {
            Self::ReportDesign => "report_design",
            Self::ReportTemplate => "report_template",
            Self::ReportFile => "report_file",
            Self::ReportOperation => "report_operation",
            Self::Engine => "engine_clusters",
            Self::Node => "node",
            Self::Other(tag) => tag,
        }
    }

    /// Classify a server type tag.
    pub fn from_type_tag(tag: &str) -> Self {
        match tag {
            "report_design" => Self::ReportDesign,
            "report_template" => Self::ReportTemplate,
            "report_file" => Self::ReportFile,
            "report_operation" => Self::ReportOperation,
            "engine_clusters" => Self::Engine,
            "node" => Self::Node,
            t if t.ends_with("_node") => Self::Node,
            t => Self::Other(t.to_string()),
        }
    }

    /// Guess the kind from the collection segment of an element href.
    pub fn from_href(href: &str) -> Self {
        let path = href.split('?').next().unwrap_or(href);
        let mut segments = path.trim_end_matches('/').rsplit('/');
        // .../elements/<type>/<id>
        let _id = segments.next();
        match segments.next() {
            Some(tag) if !tag.is_empty() => Self::from_type_tag(tag),
            _ => Self::Other(String::new()),
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pointer to an element living on the management server.
///
/// Never dereferenced locally: reading the element goes through a
/// [`Transport`](crate::Transport).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteRef {
    kind: ElementKind,
    href: String,
    name: Option<String>,
}

impl RemoteRef {
    pub fn new(kind: ElementKind, href: impl Into<String>, name: Option<String>) -> Self {
        Self {
            kind,
            href: href.into(),
            name,
        }
    }

    /// Reference known only by its href, e.g. a task resource.
    pub fn from_href(href: impl Into<String>) -> Self {
        let href = href.into();
        Self {
            kind: ElementKind::from_href(&href),
            href,
            name: None,
        }
    }

    /// Parse an `{href, name, type}` listing entry.
    pub fn from_listing(entry: &Value) -> Result<Self> {
        let listing: ListingEntry = serde_json::from_value(entry.clone())?;
        let kind = match listing.kind {
            Some(tag) => ElementKind::from_type_tag(&tag),
            None => ElementKind::from_href(&listing.href),
        };
        Ok(Self::new(kind, listing.href, listing.name))
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Same reference with a known display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}(name={})", self.kind, name),
            None => write!(f, "{}({})", self.kind, self.href),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListingEntry {
    href: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// Action link advertised in an element's `link` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(default)]
    pub method: Option<String>,
}

/// Find the link named `rel` in an element document.
pub fn find_link(attributes: &Value, rel: &str) -> Option<Link> {
    attributes
        .get("link")?
        .as_array()?
        .iter()
        .filter_map(|l| serde_json::from_value::<Link>(l.clone()).ok())
        .find(|l| l.rel == rel)
}

/// Parse the `result` array of a listing response (or a bare array).
pub fn parse_listing(body: &Value) -> Result<Vec<RemoteRef>> {
    let entries = match body {
        Value::Array(entries) => entries,
        Value::Object(map) => match map.get("result") {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(SdkError::UnexpectedResponse(
                    "listing without result array".to_string(),
                ));
            }
        },
        _ => {
            return Err(SdkError::UnexpectedResponse(
                "expected a listing".to_string(),
            ));
        }
    };
    entries.iter().map(RemoteRef::from_listing).collect()
}

/// Capability shared by the typed element wrappers.
pub trait Element: Sized {
    /// Server type tag of this wrapper.
    const KIND: ElementKind;

    /// Wrap a reference without checking its kind.
    fn from_ref_unchecked(remote: RemoteRef) -> Self;

    fn remote_ref(&self) -> &RemoteRef;

    /// Whether a reference of `kind` can be wrapped.
    fn accepts(kind: &ElementKind) -> bool {
        *kind == Self::KIND
    }

    /// Wrap `remote`, rejecting references of another kind.
    fn from_ref(remote: RemoteRef) -> Result<Self> {
        if Self::accepts(remote.kind()) {
            Ok(Self::from_ref_unchecked(remote))
        } else {
            Err(SdkError::InvalidInput(format!(
                "{} is not a {}",
                remote,
                Self::KIND
            )))
        }
    }

    fn href(&self) -> &str {
        self.remote_ref().href()
    }

    fn name(&self) -> Option<&str> {
        self.remote_ref().name()
    }

    /// Look up the element named exactly `name`.
    fn find<T: Transport + ?Sized>(transport: &T, name: &str) -> Result<Self> {
        transport
            .lookup(&Self::KIND, name)
            .map(Self::from_ref_unchecked)
    }

    /// Every element of this kind, in server order.
    fn all<T: Transport + ?Sized>(transport: &T) -> Result<Vec<Self>> {
        Ok(transport
            .list(&Self::KIND)?
            .into_iter()
            .map(Self::from_ref_unchecked)
            .collect())
    }

    /// Full attribute document of the element.
    fn attributes<T: Transport + ?Sized>(&self, transport: &T) -> Result<Value> {
        transport.read(self.href())
    }
}

/// Declare a newtype wrapper over [`RemoteRef`] implementing [`Element`].
macro_rules! element_type {
    ($(#[$meta:meta])* $name:ident => $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name($crate::element::RemoteRef);

        impl $crate::element::Element for $name {
            const KIND: $crate::element::ElementKind = $kind;

            fn from_ref_unchecked(remote: $crate::element::RemoteRef) -> Self {
                Self(remote)
            }

            fn remote_ref(&self) -> &$crate::element::RemoteRef {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

pub(crate) use element_type;
