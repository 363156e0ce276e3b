//! The query catalog: which views exist, how they are keyed, and what each
//! mutation invalidates.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tracing::info;

use crate::config::{ClientConfig, RefreshPolicy};
use crate::gateway::{Gateway, GatewayResult, HttpGateway, ImagePayload};
use crate::models::{
    DashboardStats, DiagnosticReport, DiagnosticSubmission, NewPatient, Patient, PatientId,
    ReportHistory, VitalsFeed, VitalsHistory,
};
use crate::sync::{
    fetcher, KeySelector, MutationOutcome, QueryOptions, QuerySnapshot, Subscription, SyncManager,
};
use crate::MonitorResult;

/// Key builders for every synchronized view.
pub mod keys {
    use crate::models::PatientId;
    use crate::sync::QueryKey;

    pub fn roster() -> QueryKey {
        QueryKey::new("patients")
    }

    pub fn stats() -> QueryKey {
        QueryKey::new("stats")
    }

    pub fn vitals(patient: PatientId) -> QueryKey {
        QueryKey::new("vitals").id(patient.0)
    }

    pub fn reports(patient: PatientId) -> QueryKey {
        QueryKey::new("reports").id(patient.0)
    }

    /// Facility-wide feed. Shares the `vitals` prefix with per-patient keys.
    pub fn recent_vitals() -> QueryKey {
        QueryKey::new("vitals").name("recent")
    }
}

/// Value stored in a cache entry.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Roster(Vec<Patient>),
    Stats(DashboardStats),
    Vitals(VitalsFeed),
    Reports(ReportHistory),
    RecentVitals(VitalsHistory),
}

impl QueryValue {
    pub fn as_roster(&self) -> Option<&Vec<Patient>> {
        match self {
            QueryValue::Roster(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_stats(&self) -> Option<&DashboardStats> {
        match self {
            QueryValue::Stats(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vitals(&self) -> Option<&VitalsFeed> {
        match self {
            QueryValue::Vitals(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_reports(&self) -> Option<&ReportHistory> {
        match self {
            QueryValue::Reports(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_recent_vitals(&self) -> Option<&VitalsHistory> {
        match self {
            QueryValue::RecentVitals(v) => Some(v),
            _ => None,
        }
    }
}

/// Writes against the clinical API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    CreatePatient,
    SubmitDiagnostic { patient: PatientId },
}

impl Mutation {
    /// Keys to invalidate once the write succeeds.
    pub fn invalidations(self) -> Vec<KeySelector> {
        match self {
            Mutation::CreatePatient => vec![KeySelector::Exact(keys::roster())],
            Mutation::SubmitDiagnostic { patient } => vec![
                KeySelector::Exact(keys::stats()),
                KeySelector::Exact(keys::reports(patient)),
            ],
        }
    }
}

/// Binds the gateway to the sync manager for each view.
#[derive(Clone)]
pub struct ClinicalQueries {
    gateway: Arc<dyn Gateway>,
    sync: SyncManager<QueryValue>,
    policy: RefreshPolicy,
}

impl ClinicalQueries {
    pub fn new(gateway: Arc<dyn Gateway>, sync: SyncManager<QueryValue>, policy: RefreshPolicy) -> Self {
        Self {
            gateway,
            sync,
            policy,
        }
    }

    pub fn from_config(gateway: Arc<dyn Gateway>, config: &ClientConfig) -> Self {
        Self::new(
            gateway,
            SyncManager::new(config.retry_delay()),
            config.refresh_policy(),
        )
    }

    /// Catalog over the HTTP gateway described by `config`.
    pub fn connect(config: &ClientConfig) -> MonitorResult<Self> {
        config.validate()?;
        let gateway = Arc::new(HttpGateway::from_config(config)?);
        Ok(Self::from_config(gateway, config))
    }

    pub fn sync(&self) -> &SyncManager<QueryValue> {
        &self.sync
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn roster(&self) -> Subscription<QueryValue> {
        let gateway = Arc::clone(&self.gateway);
        self.sync.subscribe(
            keys::roster(),
            fetcher(move || {
                let gateway = Arc::clone(&gateway);
                async move { gateway.list_patients().await.map(QueryValue::Roster) }
            }),
            QueryOptions::refresh(self.policy.roster),
        )
    }

    pub fn stats(&self) -> Subscription<QueryValue> {
        let gateway = Arc::clone(&self.gateway);
        self.sync.subscribe(
            keys::stats(),
            fetcher(move || {
                let gateway = Arc::clone(&gateway);
                async move { gateway.facility_stats().await.map(QueryValue::Stats) }
            }),
            QueryOptions::refresh(self.policy.stats),
        )
    }

    pub fn recent_vitals(&self) -> Subscription<QueryValue> {
        let gateway = Arc::clone(&self.gateway);
        self.sync.subscribe(
            keys::recent_vitals(),
            fetcher(move || {
                let gateway = Arc::clone(&gateway);
                async move { gateway.recent_vitals().await.map(QueryValue::RecentVitals) }
            }),
            QueryOptions::refresh(self.policy.recent_vitals),
        )
    }

    pub fn vitals(&self, patient: PatientId) -> Subscription<QueryValue> {
        let gateway = Arc::clone(&self.gateway);
        self.sync.subscribe(
            keys::vitals(patient),
            fetcher(move || {
                let gateway = Arc::clone(&gateway);
                async move { gateway.patient_vitals(patient).await.map(QueryValue::Vitals) }
            }),
            QueryOptions::refresh(self.policy.vitals),
        )
    }

    pub fn reports(&self, patient: PatientId) -> Subscription<QueryValue> {
        let gateway = Arc::clone(&self.gateway);
        self.sync.subscribe(
            keys::reports(patient),
            fetcher(move || {
                let gateway = Arc::clone(&gateway);
                async move { gateway.patient_reports(patient).await.map(QueryValue::Reports) }
            }),
            QueryOptions::refresh(self.policy.reports),
        )
    }

    /// Add a patient; refreshes the roster on success.
    pub async fn create_patient(&self, patient: NewPatient) -> GatewayResult<MutationOutcome<Patient>> {
        let outcome = self
            .sync
            .mutate(self.gateway.create_patient(&patient), |_| {
                Mutation::CreatePatient.invalidations()
            })
            .await?;
        info!(patient_id = %outcome.value.id, name = %outcome.value.name, "patient created");
        Ok(outcome)
    }

    /// Check the form fields, then create the patient.
    pub async fn register_patient(&self, name: &str, age: u32, gender: &str) -> MonitorResult<Patient> {
        let patient = NewPatient::new(name, age, gender)?;
        Ok(self.create_patient(patient).await?.value)
    }

    /// Upload an X-ray; refreshes stats and that patient's reports on success.
    pub async fn submit_diagnostic(
        &self,
        patient: PatientId,
        image: &ImagePayload,
    ) -> GatewayResult<MutationOutcome<DiagnosticSubmission>> {
        let outcome = self
            .sync
            .mutate(self.gateway.submit_diagnostic_image(patient, image), |_| {
                Mutation::SubmitDiagnostic { patient }.invalidations()
            })
            .await?;
        info!(
            %patient,
            report_id = outcome.value.report.id,
            prediction = %outcome.value.report.prediction,
            "diagnostic submitted"
        );
        Ok(outcome)
    }
}

impl std::fmt::Debug for ClinicalQueries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClinicalQueries")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Dashboard state: facility views plus the selected patient's views.
///
/// With no patient selected the per-patient views hold no subscription, so
/// nothing is fetched for them.
#[derive(Debug)]
pub struct MonitorSession {
    queries: ClinicalQueries,
    roster: Subscription<QueryValue>,
    stats: Subscription<QueryValue>,
    recent_vitals: Subscription<QueryValue>,
    selected: Option<Selection>,
}

#[derive(Debug)]
struct Selection {
    patient: PatientId,
    vitals: Subscription<QueryValue>,
    reports: Subscription<QueryValue>,
    report_id: Option<i64>,
}

impl MonitorSession {
    pub fn new(queries: ClinicalQueries) -> Self {
        Self {
            roster: queries.roster(),
            stats: queries.stats(),
            recent_vitals: queries.recent_vitals(),
            queries,
            selected: None,
        }
    }

    pub fn queries(&self) -> &ClinicalQueries {
        &self.queries
    }

    pub fn selected_patient(&self) -> Option<PatientId> {
        self.selected.as_ref().map(|s| s.patient)
    }

    /// Switch the per-patient views. The previous patient's keys lose their
    /// subscriber, which stops their polling and discards in-flight fetches.
    pub fn select_patient(&mut self, patient: Option<PatientId>) {
        if self.selected_patient() == patient {
            return;
        }
        // Release the old keys before subscribing the new ones
        self.selected = None;
        self.selected = patient.map(|patient| Selection {
            patient,
            vitals: self.queries.vitals(patient),
            reports: self.queries.reports(patient),
            report_id: None,
        });
    }

    /// Pin a report from the history; `None` follows the latest one.
    pub fn select_report(&mut self, report_id: Option<i64>) {
        if let Some(selection) = self.selected.as_mut() {
            selection.report_id = report_id;
        }
    }

    pub fn roster(&self) -> QuerySnapshot<Vec<Patient>> {
        self.roster.snapshot().project(|v| v.as_roster().cloned())
    }

    pub fn stats(&self) -> QuerySnapshot<DashboardStats> {
        self.stats.snapshot().project(|v| v.as_stats().cloned())
    }

    pub fn recent_vitals(&self) -> QuerySnapshot<VitalsHistory> {
        self.recent_vitals
            .snapshot()
            .project(|v| v.as_recent_vitals().cloned())
    }

    pub fn vitals(&self) -> QuerySnapshot<VitalsFeed> {
        self.selected
            .as_ref()
            .map(|s| s.vitals.snapshot().project(|v| v.as_vitals().cloned()))
            .unwrap_or_default()
    }

    pub fn reports(&self) -> QuerySnapshot<ReportHistory> {
        self.selected
            .as_ref()
            .map(|s| s.reports.snapshot().project(|v| v.as_reports().cloned()))
            .unwrap_or_default()
    }

    /// The pinned report if it is still in the history, else the latest.
    pub fn active_report(&self) -> Option<DiagnosticReport> {
        let selection = self.selected.as_ref()?;
        let history = self.reports().value?;
        selection
            .report_id
            .and_then(|id| history.find(id))
            .or_else(|| history.latest())
            .cloned()
    }

    /// The selected patient's record, from the vitals feed or the roster.
    pub fn active_patient(&self) -> Option<Patient> {
        let patient = self.selected_patient()?;
        if let Some(feed) = self.vitals().value {
            if feed.patient.id == patient {
                return Some(feed.patient);
            }
        }
        self.roster()
            .value?
            .into_iter()
            .find(|p| p.id == patient)
    }

    /// Wait until any view publishes a new snapshot.
    pub async fn changed(&mut self) {
        let mut pending: Vec<BoxFuture<'_, ()>> = vec![
            self.roster.changed().map(drop).boxed(),
            self.stats.changed().map(drop).boxed(),
            self.recent_vitals.changed().map(drop).boxed(),
        ];
        if let Some(selection) = self.selected.as_mut() {
            pending.push(selection.vitals.changed().map(drop).boxed());
            pending.push(selection.reports.changed().map(drop).boxed());
        }
        futures::future::select_all(pending).await;
    }

    /// Refetch every view that is currently shown.
    pub fn refresh(&self) {
        self.roster.refetch();
        self.stats.refetch();
        self.recent_vitals.refetch();
        if let Some(selection) = &self.selected {
            selection.vitals.refetch();
            selection.reports.refetch();
        }
    }
}
