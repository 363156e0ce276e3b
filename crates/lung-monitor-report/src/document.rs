//! The document region captured into a report.

use chrono::{DateTime, Utc};
use lung_monitor_core::gateway::AssetResolver;
use lung_monitor_core::models::{Confidence, DiagnosticReport, Patient};
use lung_monitor_core::surface::{classify, Classification};
use serde::Serialize;
use url::Url;

pub const REPORT_TITLE: &str = "Chest X-Ray Diagnostic Report";
pub const DISCLAIMER: &str =
    "AI-assisted analysis. Findings must be confirmed by a qualified clinician.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientBlock {
    pub id: i64,
    pub name: String,
    pub age: u32,
    pub gender: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentImage {
    pub caption: &'static str,
    pub url: Url,
}

/// Everything that appears in the captured region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDocument {
    pub title: &'static str,
    pub patient: PatientBlock,
    pub report_id: i64,
    pub finding: String,
    pub classification: Classification,
    pub confidence: Confidence,
    /// Source X-ray first, then the heat map or its fallback
    pub images: Vec<DocumentImage>,
    pub disclaimer: &'static str,
    pub generated_at: DateTime<Utc>,
}

impl ReportDocument {
    pub fn compose(
        report: &DiagnosticReport,
        patient: &Patient,
        resolver: &AssetResolver,
        generated_at: DateTime<Utc>,
    ) -> Result<Self, url::ParseError> {
        let source = resolver.source_image(report)?;
        let overlay = match report.heatmap() {
            Some(heatmap) => DocumentImage {
                caption: "Grad-CAM Heat Map",
                url: resolver.resolve(heatmap)?,
            },
            None => DocumentImage {
                caption: "Heat map unavailable (source image shown)",
                url: source.clone(),
            },
        };

        Ok(Self {
            title: REPORT_TITLE,
            patient: PatientBlock {
                id: patient.id.0,
                name: patient.name.clone(),
                age: patient.age,
                gender: patient.gender.clone(),
            },
            report_id: report.id,
            finding: report.prediction.clone(),
            classification: classify(report),
            confidence: report.confidence,
            images: vec![
                DocumentImage {
                    caption: "Source X-Ray",
                    url: source,
                },
                overlay,
            ],
            disclaimer: DISCLAIMER,
            generated_at,
        })
    }

    /// Text content in reading order.
    pub fn lines(&self) -> Vec<String> {
        vec![
            self.title.to_string(),
            format!("Patient: {} (ID {})", self.patient.name, self.patient.id),
            format!("Age: {}  Gender: {}", self.patient.age, self.patient.gender),
            format!("Report #{}", self.report_id),
            format!("Finding: {}", self.finding),
            format!("Confidence: {}", self.confidence),
            format!("Severity: {}", self.classification.severity),
            self.disclaimer.to_string(),
            format!("Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M UTC")),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use lung_monitor_core::models::PatientId;

    fn fixtures() -> (DiagnosticReport, Patient, AssetResolver) {
        let created = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let report = DiagnosticReport {
            id: 12,
            patient_id: PatientId(1),
            image_path: "uploads/x.png".into(),
            prediction: "Pneumonia".into(),
            confidence: Confidence::new(97.42).unwrap(),
            severity: None,
            heatmap_path: None,
            created_at: created,
        };
        let patient = Patient {
            id: PatientId(1),
            name: "A. Kumar".into(),
            age: 54,
            gender: "Female".into(),
            created_at: created,
        };
        let resolver = AssetResolver::new(
            Url::parse("http://ward.local:5001/").unwrap(),
            Url::parse("http://ward.local:5001/static/").unwrap(),
        );
        (report, patient, resolver)
    }

    #[test]
    fn test_compose_falls_back_to_source_image() {
        let (report, patient, resolver) = fixtures();
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 10, 30, 0).unwrap();
        let doc = ReportDocument::compose(&report, &patient, &resolver, now).unwrap();

        assert_eq!(doc.images.len(), 2);
        assert_eq!(doc.images[0].url, doc.images[1].url);
        assert!(doc.classification.positive);

        let lines = doc.lines();
        assert!(lines.contains(&"Confidence: 97.42%".to_string()));
        assert!(lines.contains(&"Severity: Requires Clinical Review".to_string()));
        assert_eq!(lines.last().unwrap(), "Generated: 2024-03-02 10:30 UTC");
    }

    #[test]
    fn test_compose_uses_heatmap() {
        let (mut report, patient, resolver) = fixtures();
        report.heatmap_path = Some("heatmaps/heatmap_x.png".into());
        let doc = ReportDocument::compose(&report, &patient, &resolver, Utc::now()).unwrap();
        assert_eq!(
            doc.images[1].url.as_str(),
            "http://ward.local:5001/static/heatmaps/heatmap_x.png"
        );
    }
}
