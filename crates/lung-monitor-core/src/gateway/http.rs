//! HTTP implementation of the gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::wire::{
    CreatedPatientEnvelope, ErrorBody, PatientsEnvelope, PredictionEnvelope, RecentVitalsEnvelope,
    ReportsEnvelope, VitalsEnvelope,
};
use super::{AssetResolver, Gateway, GatewayError, GatewayResult, ImagePayload};
use crate::config::ClientConfig;
use crate::models::{
    DashboardStats, DiagnosticSubmission, NewPatient, Patient, PatientId, ReportHistory,
    VitalsFeed, VitalsHistory,
};

/// Gateway backed by the clinical REST API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    api_base: Url,
}

impl HttpGateway {
    pub fn new(api_base: Url, timeout: Duration) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: AssetResolver::with_trailing_slash(&api_base),
        })
    }

    pub fn from_config(config: &ClientConfig) -> GatewayResult<Self> {
        Self::new(config.api_base.clone(), config.request_timeout())
    }

    fn endpoint(&self, path: &str) -> GatewayResult<Url> {
        self.api_base
            .join(path)
            .map_err(|e| GatewayError::InvalidRequest(format!("Bad endpoint '{}': {}", path, e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> GatewayResult<T> {
        let url = self.endpoint(path)?;
        debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        Self::handle_response(response).await
    }

    /// Map non-2xx responses to `Status`, using the server's error body if any.
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> GatewayResult<T> {
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            return Ok(serde_json::from_slice(&body)?);
        }

        let message = serde_json::from_slice::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
        warn!(status = status.as_u16(), %message, "API request failed");

        Err(GatewayError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn list_patients(&self) -> GatewayResult<Vec<Patient>> {
        let envelope: PatientsEnvelope = self.get_json("api/patients").await?;
        Ok(envelope.patients)
    }

    async fn patient_vitals(&self, patient_id: PatientId) -> GatewayResult<VitalsFeed> {
        let envelope: VitalsEnvelope = self.get_json(&format!("api/vitals/{}", patient_id)).await?;
        Ok(VitalsFeed::try_from(envelope)?)
    }

    async fn patient_reports(&self, patient_id: PatientId) -> GatewayResult<ReportHistory> {
        let envelope: ReportsEnvelope = self
            .get_json(&format!("api/xray-reports/{}", patient_id))
            .await?;
        Ok(ReportHistory::try_from(envelope)?)
    }

    async fn facility_stats(&self) -> GatewayResult<DashboardStats> {
        self.get_json("api/stats").await
    }

    async fn recent_vitals(&self) -> GatewayResult<VitalsHistory> {
        let envelope: RecentVitalsEnvelope = self.get_json("api/vitals/all").await?;
        Ok(VitalsHistory::from_server(envelope.vitals)?)
    }

    async fn create_patient(&self, patient: &NewPatient) -> GatewayResult<Patient> {
        let url = self.endpoint("api/patients")?;
        debug!(%url, name = %patient.name, "POST patient");
        let response = self.client.post(url).json(patient).send().await?;
        let envelope: CreatedPatientEnvelope = Self::handle_response(response).await?;
        Ok(envelope.patient)
    }

    async fn submit_diagnostic_image(
        &self,
        patient_id: PatientId,
        image: &ImagePayload,
    ) -> GatewayResult<DiagnosticSubmission> {
        let url = self.endpoint("api/xray/predict")?;
        let part = Part::bytes(image.bytes.to_vec())
            .file_name(image.file_name.clone())
            .mime_str(image.mime)
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
        let form = Form::new()
            .text("patient_id", patient_id.to_string())
            .part("xray", part);

        debug!(%url, %patient_id, bytes = image.bytes.len(), "POST diagnostic image");
        let response = self.client.post(url).multipart(form).send().await?;
        let envelope: PredictionEnvelope = Self::handle_response(response).await?;
        Ok(envelope.into())
    }
}
