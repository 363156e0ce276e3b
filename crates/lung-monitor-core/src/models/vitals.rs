//! Vitals samples reported by bedside devices.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{check_newest_first, ModelError, Patient, PatientId};

/// One device reading. The alert flag is computed by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VitalsSample {
    /// Server ID
    pub id: i64,
    /// Owning patient
    pub patient_id: PatientId,
    /// Oxygen saturation (%)
    pub spo2: f64,
    /// Body temperature (°C)
    pub temperature: f64,
    /// Heart rate (BPM)
    pub heart_rate: u32,
    /// Originating device, e.g. "ESP32_01"
    pub device_id: Option<String>,
    /// Capture timestamp (UTC)
    pub recorded_at: NaiveDateTime,
    /// Server-side emergency flag
    pub alert: bool,
}

/// A numeric channel that can be charted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VitalMetric {
    Spo2,
    Temperature,
    HeartRate,
}

impl VitalMetric {
    pub const ALL: [VitalMetric; 3] = [Self::Spo2, Self::Temperature, Self::HeartRate];

    /// Read this metric from a sample.
    pub fn read(self, sample: &VitalsSample) -> f64 {
        match self {
            Self::Spo2 => sample.spo2,
            Self::Temperature => sample.temperature,
            Self::HeartRate => f64::from(sample.heart_rate),
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::Spo2 => "%",
            Self::Temperature => "°C",
            Self::HeartRate => "BPM",
        }
    }
}

/// Samples in server order: most recent first.
///
/// Only constructible through [`VitalsHistory::from_server`], which rejects
/// sequences that break the ordering contract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VitalsHistory(Vec<VitalsSample>);

impl VitalsHistory {
    pub fn from_server(samples: Vec<VitalsSample>) -> Result<Self, ModelError> {
        check_newest_first(&samples, "vitals", |s| s.recorded_at)?;
        Ok(Self(samples))
    }

    /// Most recent sample, if any.
    pub fn latest(&self) -> Option<&VitalsSample> {
        self.0.first()
    }

    pub fn as_slice(&self) -> &[VitalsSample] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Vitals view for one patient.
#[derive(Debug, Clone, PartialEq)]
pub struct VitalsFeed {
    pub patient: Patient,
    /// Latest sample as reported by the server
    pub latest: Option<VitalsSample>,
    /// Recent samples, newest first
    pub history: VitalsHistory,
}
