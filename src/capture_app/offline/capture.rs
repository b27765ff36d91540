//! # Capture Form Controller
//!
//! `CaptureForm` holds what the user typed, page by page, for one template.
//! `CaptureController` validates the resulting payload and routes it: straight
//! to the Remote Report Store when online, into the local queue otherwise or
//! when the store cannot take it. Captured data is never dropped on a remote
//! failure.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::ReportQueue;
use crate::capture_app::api::ReportStore;
use crate::capture_app::error::{CaptureError, RemoteError};
use crate::capture_app::sync::network_monitor::ConnectivityMonitor;
use crate::shared::{
    CapturedComponent, CapturedData, QueuedReport, ReportPayload, SharedError, Template,
};

type Page = BTreeMap<String, String>;

/// Form state for one capture
#[derive(Debug, Clone)]
pub struct CaptureForm {
    template: Template,
    job_id: String,
    pages: Vec<Page>,
    current_page: usize,
}

impl CaptureForm {
    /// Empty form with a single page
    pub fn new(template: Template) -> Self {
        let first = empty_page(&template);
        Self {
            template,
            job_id: String::new(),
            pages: vec![first],
            current_page: 0,
        }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn set_job_id(&mut self, job_id: impl Into<String>) {
        self.job_id = job_id.into();
    }

    /// Set a field on the current page
    ///
    /// Fails when the template declares no component with that id.
    pub fn set_field(
        &mut self,
        component_id: &str,
        value: impl Into<String>,
    ) -> Result<(), SharedError> {
        if self.template.component(component_id).is_none() {
            return Err(SharedError::validation(
                component_id,
                format!("Template '{}' has no such component", self.template.id),
            ));
        }
        self.pages[self.current_page].insert(component_id.to_string(), value.into());
        Ok(())
    }

    /// Value of a field on the current page
    pub fn field(&self, component_id: &str) -> Option<&str> {
        self.pages[self.current_page].get(component_id).map(String::as_str)
    }

    /// Append an empty page and make it current; returns its index
    pub fn add_page(&mut self) -> usize {
        self.pages.push(empty_page(&self.template));
        self.current_page = self.pages.len() - 1;
        self.current_page
    }

    /// Switch pages; out-of-range indices are ignored
    pub fn go_to_page(&mut self, index: usize) -> bool {
        if index >= self.pages.len() {
            return false;
        }
        self.current_page = index;
        true
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Assemble the submission payload
    ///
    /// Keys are `"{page}_{component}"`. Blank fields are left out, and a form
    /// with nothing filled in is a validation error.
    pub fn build_payload(&self, timestamp: DateTime<Utc>) -> Result<ReportPayload, SharedError> {
        let mut captured = CapturedData::new();
        for (page_index, page) in self.pages.iter().enumerate() {
            for component in &self.template.components {
                let Some(value) = page.get(&component.id) else {
                    continue;
                };
                if value.trim().is_empty() {
                    continue;
                }
                captured.insert(
                    format!("{}_{}", page_index, component.id),
                    CapturedComponent::new(component.kind, component.title(), value.as_str()),
                );
            }
        }

        ReportPayload::new(
            self.template.id.clone(),
            Some(self.job_id.clone()),
            captured,
            timestamp,
        )
        .validated()
    }

    /// Back to a single empty page and no job id
    pub fn reset(&mut self) {
        self.job_id.clear();
        self.pages = vec![empty_page(&self.template)];
        self.current_page = 0;
    }
}

fn empty_page(template: &Template) -> Page {
    template
        .components
        .iter()
        .map(|c| (c.id.clone(), String::new()))
        .collect()
}

/// Where a submission ended up
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Accepted by the Remote Report Store
    Saved { server_id: String },
    /// Held in the local queue; `cause` is set when a remote attempt failed
    SavedOffline {
        report: QueuedReport,
        cause: Option<RemoteError>,
    },
}

impl SubmitOutcome {
    pub fn server_id(&self) -> Option<&str> {
        match self {
            SubmitOutcome::Saved { server_id } => Some(server_id),
            SubmitOutcome::SavedOffline { .. } => None,
        }
    }

    pub fn is_saved_offline(&self) -> bool {
        matches!(self, SubmitOutcome::SavedOffline { .. })
    }

    /// Confirmation shown to the user
    pub fn message(&self) -> String {
        match self {
            SubmitOutcome::Saved { server_id } => {
                format!("Report saved successfully. Report ID: {}", server_id)
            }
            SubmitOutcome::SavedOffline { cause: None, .. } => {
                "Saved offline. Report will sync when you're back online.".to_string()
            }
            SubmitOutcome::SavedOffline { cause: Some(cause), .. } => format!(
                "Could not reach the server ({}). Report saved offline and will sync later.",
                cause
            ),
        }
    }
}

/// Routes submissions to the Remote Report Store or the local queue
#[derive(Debug)]
pub struct CaptureController<Q, S> {
    queue: Arc<Q>,
    store: Arc<S>,
    monitor: ConnectivityMonitor,
}

impl<Q, S> CaptureController<Q, S>
where
    Q: ReportQueue,
    S: ReportStore,
{
    pub fn new(queue: Arc<Q>, store: Arc<S>, monitor: ConnectivityMonitor) -> Self {
        Self { queue, store, monitor }
    }

    /// Submit the form, resetting it once the report is stored somewhere
    ///
    /// On error the form is left untouched so nothing typed is lost.
    pub async fn submit(&self, form: &mut CaptureForm) -> Result<SubmitOutcome, CaptureError> {
        let payload = form.build_payload(Utc::now())?;
        let outcome = self.submit_payload(payload).await?;
        form.reset();
        Ok(outcome)
    }

    /// Validate and route an already assembled payload
    pub async fn submit_payload(
        &self,
        payload: ReportPayload,
    ) -> Result<SubmitOutcome, CaptureError> {
        let payload = payload.validated()?;

        if !self.monitor.is_online() {
            let report = self.queue.enqueue(payload).await?;
            info!(local_id = %report.local_id, "Offline, report queued");
            return Ok(SubmitOutcome::SavedOffline { report, cause: None });
        }

        match self.store.submit_report(&payload).await {
            Ok(server_id) => {
                info!(%server_id, "Report saved");
                Ok(SubmitOutcome::Saved { server_id })
            }
            Err(cause) => {
                warn!(error = %cause, "Submit failed, falling back to local queue");
                let report = self.queue.enqueue(payload).await?;
                Ok(SubmitOutcome::SavedOffline {
                    report,
                    cause: Some(cause),
                })
            }
        }
    }
}
