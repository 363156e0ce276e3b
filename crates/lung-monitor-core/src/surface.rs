//! Presentation transforms over synchronized data.
//!
//! Everything here is pure: inputs are borrowed and never modified, and no
//! clinical threshold is computed locally. Alert state comes from the server.

use serde::Serialize;

use crate::models::{DiagnosticReport, VitalMetric, VitalsSample};

/// Fallback when a positive report carries no severity.
pub const POSITIVE_FALLBACK: &str = "Requires Clinical Review";
/// Fallback when a negative report carries no severity.
pub const NEGATIVE_FALLBACK: &str = "No Acute Findings";

/// One point of a vitals chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    /// Capture time as `HH:MM:SS`
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SeverityLabel {
    Reported(String),
    Fallback(&'static str),
}

impl SeverityLabel {
    pub fn as_str(&self) -> &str {
        match self {
            SeverityLabel::Reported(s) => s,
            SeverityLabel::Fallback(s) => s,
        }
    }
}

impl std::fmt::Display for SeverityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub positive: bool,
    pub severity: SeverityLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertLevel {
    Normal,
    Alert,
}

/// Most recent sample in server order.
pub fn latest(samples: &[VitalsSample]) -> Option<&VitalsSample> {
    samples.first()
}

/// Chart series in ascending time for one metric.
pub fn for_chart(samples: &[VitalsSample], metric: VitalMetric) -> Vec<ChartPoint> {
    samples
        .iter()
        .rev()
        .map(|s| ChartPoint {
            label: s.recorded_at.format("%H:%M:%S").to_string(),
            value: metric.read(s),
        })
        .collect()
}

pub fn classify(report: &DiagnosticReport) -> Classification {
    let positive = report.is_pneumonia();
    let severity = match report.reported_severity() {
        Some(label) => SeverityLabel::Reported(label.to_string()),
        None if positive => SeverityLabel::Fallback(POSITIVE_FALLBACK),
        None => SeverityLabel::Fallback(NEGATIVE_FALLBACK),
    };
    Classification { positive, severity }
}

pub fn alert_level(sample: &VitalsSample) -> AlertLevel {
    if sample.alert {
        AlertLevel::Alert
    } else {
        AlertLevel::Normal
    }
}

/// Alerting samples, in server order.
pub fn active_alerts(samples: &[VitalsSample]) -> Vec<&VitalsSample> {
    samples.iter().filter(|s| s.alert).collect()
}

/// Image reference to show for a report: heat map, else the source X-ray.
pub fn display_image(report: &DiagnosticReport) -> &str {
    report.heatmap().unwrap_or(&report.image_path)
}
