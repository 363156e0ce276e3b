//! Upload-and-diagnose workflow.
//!
//! ```text
//! Idle -> PatientChosen -> FileStaged -> Submitting -> Succeeded
//!                               ^                  \-> Failed
//!                               +---- acknowledge ------/
//! ```
//!
//! Preview derivation and submission are independent tasks. They share only
//! the workflow state, and neither waits for the other.

mod image;

pub use image::*;

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::gateway::{GatewayError, ImagePayload};
use crate::models::{DiagnosticSubmission, Patient, PatientId};
use crate::queries::ClinicalQueries;

/// Workflow errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Patient {0} is not in the current roster")]
    UnknownPatient(PatientId),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("A submission is already in progress")]
    Busy,

    #[error("Submit action no longer matches the staged file")]
    StaleAction,

    #[error("Submission failed: {0}")]
    Submission(#[from] GatewayError),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    Idle,
    PatientChosen,
    /// A file is staged; the patient may still be missing
    FileStaged,
    Submitting,
    Succeeded(DiagnosticSubmission),
    Failed(WorkflowError),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PreviewState {
    #[default]
    None,
    Pending,
    /// `data:` URL of the staged image
    Ready(String),
    Failed(String),
}

/// Permission to submit the currently staged file. Consumed by
/// [`DiagnosticWorkflow::submit`].
#[derive(Debug, PartialEq, Eq)]
pub struct SubmitAction {
    patient: PatientId,
    staging_id: Uuid,
}

impl SubmitAction {
    pub fn patient(&self) -> PatientId {
        self.patient
    }
}

#[derive(Debug)]
struct StagedFile {
    id: Uuid,
    payload: ImagePayload,
}

#[derive(Debug)]
struct Inner {
    state: WorkflowState,
    patient: Option<PatientId>,
    staged: Option<StagedFile>,
    preview: PreviewState,
    open: bool,
}

impl Inner {
    /// Editing state implied by the current selections.
    fn settle(&mut self) {
        self.state = match (self.patient, &self.staged) {
            (_, Some(_)) => WorkflowState::FileStaged,
            (Some(_), None) => WorkflowState::PatientChosen,
            (None, None) => WorkflowState::Idle,
        };
    }

    fn ensure_editable(&self) -> WorkflowResult<()> {
        match self.state {
            WorkflowState::Submitting => Err(WorkflowError::Busy),
            _ => Ok(()),
        }
    }
}

/// Returns an abandoned submission to the editing state.
struct SubmitGuard<'a> {
    inner: &'a Mutex<Inner>,
    armed: bool,
}

impl SubmitGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.state == WorkflowState::Submitting {
            warn!("submission abandoned before completion");
            inner.settle();
        }
    }
}

/// Orchestrates one upload-and-diagnose surface.
#[derive(Clone)]
pub struct DiagnosticWorkflow {
    queries: ClinicalQueries,
    inner: Arc<Mutex<Inner>>,
}

impl DiagnosticWorkflow {
    pub fn new(queries: ClinicalQueries) -> Self {
        Self {
            queries,
            inner: Arc::new(Mutex::new(Inner {
                state: WorkflowState::Idle,
                patient: None,
                staged: None,
                preview: PreviewState::None,
                open: true,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> WorkflowState {
        self.lock().state.clone()
    }

    pub fn patient(&self) -> Option<PatientId> {
        self.lock().patient
    }

    pub fn staged_file_name(&self) -> Option<String> {
        self.lock().staged.as_ref().map(|f| f.payload.file_name.clone())
    }

    pub fn preview_state(&self) -> PreviewState {
        self.lock().preview.clone()
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Pick the patient the image belongs to. Must be in `roster`.
    pub fn choose_patient(&self, patient: PatientId, roster: &[Patient]) -> WorkflowResult<()> {
        if !roster.iter().any(|p| p.id == patient) {
            return Err(WorkflowError::UnknownPatient(patient));
        }

        let mut inner = self.lock();
        inner.ensure_editable()?;
        inner.patient = Some(patient);
        inner.settle();
        debug!(%patient, "workflow patient chosen");
        Ok(())
    }

    /// Stage an image and start deriving its preview in the background.
    ///
    /// Must be called from within a tokio runtime. Staging replaces any
    /// previously staged file; a late preview for the old file is dropped.
    pub fn stage_file(&self, bytes: Bytes, file_name: &str) -> WorkflowResult<()> {
        let payload = validate_image(bytes, file_name)?;
        let id = Uuid::new_v4();
        let preview_bytes = payload.bytes.clone();

        {
            let mut inner = self.lock();
            inner.ensure_editable()?;
            inner.staged = Some(StagedFile { id, payload });
            inner.preview = PreviewState::Pending;
            inner.settle();
        }
        debug!(%id, file_name, "file staged");

        let shared = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let preview = tokio::task::spawn_blocking(move || derive_preview(&preview_bytes))
                .await
                .unwrap_or_else(|e| Err(format!("preview task failed: {}", e)));

            let mut inner = shared.lock().unwrap_or_else(|e| e.into_inner());
            if inner.staged.as_ref().map(|f| f.id) != Some(id) {
                debug!(%id, "discarding preview for replaced file");
                return;
            }
            inner.preview = match preview {
                Ok(url) => PreviewState::Ready(url),
                Err(e) => {
                    warn!(%id, error = %e, "preview derivation failed");
                    PreviewState::Failed(e)
                }
            };
        });
        Ok(())
    }

    /// Token for submitting; `None` unless a patient and a file are staged.
    pub fn submit_action(&self) -> Option<SubmitAction> {
        let inner = self.lock();
        if inner.state != WorkflowState::FileStaged {
            return None;
        }
        Some(SubmitAction {
            patient: inner.patient?,
            staging_id: inner.staged.as_ref()?.id,
        })
    }

    /// Upload the staged file. Exactly one request; never retried.
    ///
    /// Dropping the future before it resolves leaves the patient and file
    /// staged, as if the submission had never started.
    pub async fn submit(&self, action: SubmitAction) -> WorkflowResult<DiagnosticSubmission> {
        let payload = {
            let mut inner = self.lock();
            inner.ensure_editable()?;
            let staged = inner
                .staged
                .as_ref()
                .filter(|f| f.id == action.staging_id && inner.patient == Some(action.patient))
                .ok_or(WorkflowError::StaleAction)?;
            let payload = staged.payload.clone();
            inner.state = WorkflowState::Submitting;
            payload
        };

        let guard = SubmitGuard {
            inner: &self.inner,
            armed: true,
        };
        info!(patient = %action.patient, file = %payload.file_name, "submitting diagnostic image");
        let result = self.queries.submit_diagnostic(action.patient, &payload).await;
        guard.disarm();

        let mut inner = self.lock();
        match result {
            Ok(outcome) => {
                inner.staged = None;
                inner.preview = PreviewState::None;
                inner.state = WorkflowState::Succeeded(outcome.value.clone());
                inner.open = false;
                Ok(outcome.value)
            }
            Err(e) => {
                let error = WorkflowError::Submission(e);
                inner.state = WorkflowState::Failed(error.clone());
                Err(error)
            }
        }
    }

    /// Leave `Failed`, keeping the patient, file and preview.
    pub fn acknowledge_failure(&self) {
        let mut inner = self.lock();
        if matches!(inner.state, WorkflowState::Failed(_)) {
            inner.settle();
        }
    }

    /// Show the surface again; a finished workflow starts over.
    pub fn open(&self) {
        let mut inner = self.lock();
        inner.open = true;
        if matches!(inner.state, WorkflowState::Succeeded(_)) {
            inner.patient = None;
            inner.settle();
        }
    }

    /// Clear everything back to `Idle`. Ignored while submitting.
    pub fn reset(&self) {
        let mut inner = self.lock();
        if inner.ensure_editable().is_err() {
            return;
        }
        inner.patient = None;
        inner.staged = None;
        inner.preview = PreviewState::None;
        inner.open = true;
        inner.settle();
    }
}

impl std::fmt::Debug for DiagnosticWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticWorkflow")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
