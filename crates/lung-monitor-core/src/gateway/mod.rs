//! Remote data gateway for the clinical API.
//!
//! Typed request/response functions only: no caching and no retries. Caching
//! and retry policy live in [`crate::sync`].

mod assets;
mod http;
mod wire;

pub use assets::*;
pub use http::*;
pub use wire::*;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::models::{
    DashboardStats, DiagnosticSubmission, ModelError, NewPatient, Patient, PatientId,
    ReportHistory, VitalsFeed, VitalsHistory,
};

/// Gateway errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Ordering contract violated: {0}")]
    Ordering(ModelError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Decode(e.to_string())
    }
}

impl From<ModelError> for GatewayError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Ordering { .. } => GatewayError::Ordering(e),
            other => GatewayError::InvalidRequest(other.to_string()),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Raw image bytes ready for the multipart upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub bytes: Bytes,
    pub file_name: String,
    pub mime: &'static str,
}

/// Operations exposed by the clinical API.
///
/// Sequences of reports and vitals are returned most recent first; the
/// gateway rejects responses that break that order.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// All patients, ordered by name.
    async fn list_patients(&self) -> GatewayResult<Vec<Patient>>;

    /// Recent vitals for one patient.
    async fn patient_vitals(&self, patient_id: PatientId) -> GatewayResult<VitalsFeed>;

    /// Diagnostic reports for one patient.
    async fn patient_reports(&self, patient_id: PatientId) -> GatewayResult<ReportHistory>;

    async fn facility_stats(&self) -> GatewayResult<DashboardStats>;

    /// Most recent vitals across every patient.
    async fn recent_vitals(&self) -> GatewayResult<VitalsHistory>;

    async fn create_patient(&self, patient: &NewPatient) -> GatewayResult<Patient>;

    /// Upload an X-ray and run the prediction model on it.
    async fn submit_diagnostic_image(
        &self,
        patient_id: PatientId,
        image: &ImagePayload,
    ) -> GatewayResult<DiagnosticSubmission>;
}
