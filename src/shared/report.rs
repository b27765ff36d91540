//! Report Data Structures
//!
//! This module defines the report payload submitted to the Remote Report
//! Store, the captured components it carries, and the queued form of a
//! payload that is held on the device while it cannot be delivered.
//!
//! Captured components are serialized the same way the server stores them:
//!
//! ```json
//! { "type": "text", "title": "Notes", "text": "ok" }
//! { "type": "image", "title": "Photo", "image": "data:image/jpeg;base64,..." }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::SharedError;

/// Kind of a template component, and of the value captured for it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    /// Base64 image (usually a data URL)
    Image,
    /// Free text
    Text,
    /// Free-text progress note
    Progress,
    /// Free-text issue list
    Issues,
}

impl ComponentKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Image => "image",
            ComponentKind::Text => "text",
            ComponentKind::Progress => "progress",
            ComponentKind::Issues => "issues",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" => Ok(ComponentKind::Image),
            "text" => Ok(ComponentKind::Text),
            "progress" => Ok(ComponentKind::Progress),
            "issues" => Ok(ComponentKind::Issues),
            other => Err(SharedError::validation(
                "type",
                format!("Unknown component type '{}'", other),
            )),
        }
    }
}

/// One captured value, tagged with the kind of component it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CapturedComponent {
    /// Captured photo
    Image {
        #[serde(default)]
        title: String,
        image: String,
    },
    /// Captured text
    Text {
        #[serde(default)]
        title: String,
        text: String,
    },
    /// Captured progress note
    Progress {
        #[serde(default)]
        title: String,
        progress: String,
    },
    /// Captured issues
    Issues {
        #[serde(default)]
        title: String,
        issues: String,
    },
}

impl CapturedComponent {
    /// Build a component of the given kind
    pub fn new(kind: ComponentKind, title: impl Into<String>, value: impl Into<String>) -> Self {
        let title = title.into();
        let value = value.into();
        match kind {
            ComponentKind::Image => CapturedComponent::Image { title, image: value },
            ComponentKind::Text => CapturedComponent::Text { title, text: value },
            ComponentKind::Progress => CapturedComponent::Progress { title, progress: value },
            ComponentKind::Issues => CapturedComponent::Issues { title, issues: value },
        }
    }

    /// Shorthand for a text component
    pub fn text(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(ComponentKind::Text, title, value)
    }

    pub fn kind(&self) -> ComponentKind {
        match self {
            CapturedComponent::Image { .. } => ComponentKind::Image,
            CapturedComponent::Text { .. } => ComponentKind::Text,
            CapturedComponent::Progress { .. } => ComponentKind::Progress,
            CapturedComponent::Issues { .. } => ComponentKind::Issues,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            CapturedComponent::Image { title, .. }
            | CapturedComponent::Text { title, .. }
            | CapturedComponent::Progress { title, .. }
            | CapturedComponent::Issues { title, .. } => title,
        }
    }

    /// The captured value: base64 image data or free text depending on kind
    pub fn value(&self) -> &str {
        match self {
            CapturedComponent::Image { image, .. } => image,
            CapturedComponent::Text { text, .. } => text,
            CapturedComponent::Progress { progress, .. } => progress,
            CapturedComponent::Issues { issues, .. } => issues,
        }
    }

    /// A component whose value is empty or whitespace only
    pub fn is_blank(&self) -> bool {
        self.value().trim().is_empty()
    }
}

/// Captured values keyed by component identifier
pub type CapturedData = BTreeMap<String, CapturedComponent>;

/// Body of `POST /api/reports`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    /// Template this capture was made from
    pub template_id: String,
    /// Free-form job/site identifier
    pub job_id: Option<String>,
    /// Captured values keyed by component identifier
    pub captured_data: CapturedData,
    /// When the capture happened
    pub timestamp: DateTime<Utc>,
}

impl ReportPayload {
    /// Create a payload; a blank job id is stored as `None`
    pub fn new(
        template_id: impl Into<String>,
        job_id: Option<String>,
        captured_data: CapturedData,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            template_id: template_id.into(),
            job_id: job_id.filter(|id| !id.trim().is_empty()),
            captured_data,
            timestamp,
        }
    }

    /// Drop blank captured fields and reject what cannot be submitted
    ///
    /// Fails with a validation error when the template id is blank or when no
    /// captured field remains once blank ones are removed.
    pub fn validated(mut self) -> Result<Self, SharedError> {
        if self.template_id.trim().is_empty() {
            return Err(SharedError::validation("templateId", "Template ID is required"));
        }

        self.captured_data.retain(|_, component| !component.is_blank());
        if self.captured_data.is_empty() {
            return Err(SharedError::validation(
                "capturedData",
                "Please fill in at least one field before saving",
            ));
        }

        Ok(self)
    }
}

/// A payload held in the Local Durable Queue until the server confirms it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedReport {
    /// Client-assigned primary key, immutable
    pub local_id: String,
    pub template_id: String,
    pub job_id: Option<String>,
    pub captured_data: CapturedData,
    pub timestamp: DateTime<Utc>,
    /// True only once the Remote Report Store confirmed persistence
    pub synced: bool,
    /// Store-assigned identifier, set together with `synced`
    pub server_id: Option<String>,
    /// Milliseconds since the Unix epoch at enqueue time, for local ordering
    pub created_at: i64,
}

impl QueuedReport {
    /// Wrap a payload as a fresh unsynced entry
    pub fn new(local_id: String, payload: ReportPayload, created_at: i64) -> Self {
        Self {
            local_id,
            template_id: payload.template_id,
            job_id: payload.job_id,
            captured_data: payload.captured_data,
            timestamp: payload.timestamp,
            synced: false,
            server_id: None,
            created_at,
        }
    }

    /// The payload to resubmit for this entry
    pub fn payload(&self) -> ReportPayload {
        ReportPayload {
            template_id: self.template_id.clone(),
            job_id: self.job_id.clone(),
            captured_data: self.captured_data.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// Successful response of `POST /api/reports`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SubmitReceipt {
    /// Server identifier, if the response carried a usable one
    pub fn server_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.trim().is_empty())
    }
}

/// Error body returned by the API on non-2xx responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    pub message: String,
}

/// Report as listed by `GET /api/reports`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub id: String,
    pub template_id: String,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub captured_data: CapturedData,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}
