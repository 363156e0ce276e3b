//! JSON envelopes used by the clinical API.

use serde::{Deserialize, Serialize};

use crate::models::{
    DiagnosticReport, DiagnosticSubmission, ModelError, Patient, ReportHistory, VitalsFeed,
    VitalsHistory, VitalsSample,
};

/// `GET /api/patients`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientsEnvelope {
    pub patients: Vec<Patient>,
}

/// `GET /api/vitals/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VitalsEnvelope {
    pub patient: Patient,
    pub vitals: Vec<VitalsSample>,
    pub latest: Option<VitalsSample>,
}

impl TryFrom<VitalsEnvelope> for VitalsFeed {
    type Error = ModelError;

    fn try_from(envelope: VitalsEnvelope) -> Result<Self, Self::Error> {
        Ok(VitalsFeed {
            patient: envelope.patient,
            latest: envelope.latest,
            history: VitalsHistory::from_server(envelope.vitals)?,
        })
    }
}

/// `GET /api/vitals/all`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentVitalsEnvelope {
    pub vitals: Vec<VitalsSample>,
}

/// `GET /api/xray-reports/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsEnvelope {
    pub reports: Vec<DiagnosticReport>,
}

impl TryFrom<ReportsEnvelope> for ReportHistory {
    type Error = ModelError;

    fn try_from(envelope: ReportsEnvelope) -> Result<Self, Self::Error> {
        ReportHistory::from_server(envelope.reports)
    }
}

/// `POST /api/patients`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedPatientEnvelope {
    pub status: String,
    pub patient: Patient,
}

/// `POST /api/xray/predict`
///
/// The server also echoes the raw model output under `result`; the client
/// only relies on the persisted report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionEnvelope {
    pub status: String,
    pub report: DiagnosticReport,
    pub heatmap: Option<String>,
}

impl From<PredictionEnvelope> for DiagnosticSubmission {
    fn from(envelope: PredictionEnvelope) -> Self {
        DiagnosticSubmission {
            report: envelope.report,
            heatmap: envelope.heatmap,
        }
    }
}

/// Error body returned with 4xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
