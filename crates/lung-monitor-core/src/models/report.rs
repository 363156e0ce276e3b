//! Diagnostic report models.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{check_newest_first, ModelError, PatientId};

/// Prediction label counted as a positive finding.
pub const PNEUMONIA_LABEL: &str = "Pneumonia";

/// Model confidence as a percentage in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub fn new(percent: f64) -> Result<Self, ModelError> {
        if percent.is_finite() && (0.0..=100.0).contains(&percent) {
            Ok(Self(percent))
        } else {
            Err(ModelError::ConfidenceOutOfRange(percent))
        }
    }

    pub fn percent(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Confidence {
    type Error = ModelError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(c: Confidence) -> Self {
        c.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.0)
    }
}

/// A CNN prediction for one uploaded X-ray.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagnosticReport {
    /// Server ID
    pub id: i64,
    /// Owning patient
    pub patient_id: PatientId,
    /// Source image, relative to the asset origin
    pub image_path: String,
    /// Predicted class label
    pub prediction: String,
    /// Confidence percentage
    pub confidence: Confidence,
    /// Severity label (only some classes carry one)
    pub severity: Option<String>,
    /// Grad-CAM heat map, relative to the asset origin
    pub heatmap_path: Option<String>,
    /// Creation timestamp (UTC)
    pub created_at: NaiveDateTime,
}

impl DiagnosticReport {
    /// Severity reported by the server, if it carries information.
    ///
    /// Blank strings and the server's "N/A" placeholder count as absent.
    pub fn reported_severity(&self) -> Option<&str> {
        self.severity
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("N/A"))
    }

    /// Heat-map reference, if the server produced one.
    pub fn heatmap(&self) -> Option<&str> {
        self.heatmap_path.as_deref().filter(|p| !p.trim().is_empty())
    }

    pub fn is_pneumonia(&self) -> bool {
        self.prediction.trim().eq_ignore_ascii_case(PNEUMONIA_LABEL)
    }
}

/// Reports for one patient, most recent first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportHistory(Vec<DiagnosticReport>);

impl ReportHistory {
    pub fn from_server(reports: Vec<DiagnosticReport>) -> Result<Self, ModelError> {
        check_newest_first(&reports, "reports", |r| r.created_at)?;
        Ok(Self(reports))
    }

    /// Position 0 of the server order.
    pub fn latest(&self) -> Option<&DiagnosticReport> {
        self.0.first()
    }

    pub fn find(&self, report_id: i64) -> Option<&DiagnosticReport> {
        self.0.iter().find(|r| r.id == report_id)
    }

    pub fn as_slice(&self) -> &[DiagnosticReport] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of a diagnostic image submission.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticSubmission {
    pub report: DiagnosticReport,
    pub heatmap: Option<String>,
}
