//! In-memory gateway for scenario tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use lung_monitor_core::gateway::{Gateway, GatewayError, GatewayResult, ImagePayload};
use lung_monitor_core::models::{
    Confidence, DashboardStats, DiagnosticReport, DiagnosticSubmission, NewPatient, Patient,
    PatientId, ReportHistory, VitalsFeed, VitalsHistory, VitalsSample,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Call {
    ListPatients,
    Vitals(PatientId),
    Reports(PatientId),
    Stats,
    RecentVitals,
    CreatePatient,
    Submit(PatientId),
}

pub fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

pub fn patient(id: i64, name: &str) -> Patient {
    Patient {
        id: PatientId(id),
        name: name.to_string(),
        age: 54,
        gender: "F".to_string(),
        created_at: at(7, 0, 0),
    }
}

pub fn sample(id: i64, patient: i64, recorded_at: NaiveDateTime, alert: bool) -> VitalsSample {
    VitalsSample {
        id,
        patient_id: PatientId(patient),
        spo2: if alert { 88.0 } else { 97.5 },
        temperature: 36.8,
        heart_rate: 82,
        device_id: Some("ESP32_01".to_string()),
        recorded_at,
        alert,
    }
}

pub fn report(id: i64, patient: i64, prediction: &str) -> DiagnosticReport {
    DiagnosticReport {
        id,
        patient_id: PatientId(patient),
        image_path: format!("uploads/xray_{}.png", id),
        prediction: prediction.to_string(),
        confidence: Confidence::new(93.21).unwrap(),
        severity: None,
        heatmap_path: Some(format!("heatmaps/heatmap_{}.png", id)),
        created_at: at(9, 0, id as u32 % 60),
    }
}

/// Scripted gateway that records every call.
#[derive(Default)]
pub struct FakeGateway {
    pub roster: Vec<Patient>,
    pub reports: HashMap<PatientId, Vec<DiagnosticReport>>,
    pub fail_submit: bool,
    /// Submissions never complete
    pub hang_submit: bool,
    calls: Mutex<Vec<Call>>,
}

impl FakeGateway {
    pub fn with_roster(roster: Vec<Patient>) -> Self {
        Self {
            roster,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn find(&self, id: PatientId) -> GatewayResult<Patient> {
        self.roster
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(GatewayError::Status {
                status: 404,
                message: "Patient not found".to_string(),
            })
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn list_patients(&self) -> GatewayResult<Vec<Patient>> {
        self.record(Call::ListPatients);
        Ok(self.roster.clone())
    }

    async fn patient_vitals(&self, patient_id: PatientId) -> GatewayResult<VitalsFeed> {
        self.record(Call::Vitals(patient_id));
        let history = vec![
            sample(2, patient_id.0, at(8, 0, 3), true),
            sample(1, patient_id.0, at(8, 0, 0), false),
        ];
        Ok(VitalsFeed {
            patient: self.find(patient_id)?,
            latest: history.first().cloned(),
            history: VitalsHistory::from_server(history)?,
        })
    }

    async fn patient_reports(&self, patient_id: PatientId) -> GatewayResult<ReportHistory> {
        self.record(Call::Reports(patient_id));
        let reports = self.reports.get(&patient_id).cloned().unwrap_or_default();
        Ok(ReportHistory::from_server(reports)?)
    }

    async fn facility_stats(&self) -> GatewayResult<DashboardStats> {
        self.record(Call::Stats);
        Ok(DashboardStats {
            total_patients: self.roster.len() as u64,
            ..DashboardStats::default()
        })
    }

    async fn recent_vitals(&self) -> GatewayResult<VitalsHistory> {
        self.record(Call::RecentVitals);
        Ok(VitalsHistory::default())
    }

    async fn create_patient(&self, new: &NewPatient) -> GatewayResult<Patient> {
        self.record(Call::CreatePatient);
        Ok(patient(self.roster.len() as i64 + 1, &new.name))
    }

    async fn submit_diagnostic_image(
        &self,
        patient_id: PatientId,
        _image: &ImagePayload,
    ) -> GatewayResult<DiagnosticSubmission> {
        self.record(Call::Submit(patient_id));
        if self.hang_submit {
            futures::future::pending::<()>().await;
        }
        if self.fail_submit {
            return Err(GatewayError::Status {
                status: 500,
                message: "Model not loaded".to_string(),
            });
        }
        let report = report(99, patient_id.0, "Pneumonia");
        Ok(DiagnosticSubmission {
            heatmap: report.heatmap_path.clone(),
            report,
        })
    }
}
