//! Lung Monitor Core Library
//!
//! Client-side synchronization and workflow orchestration for the lung
//! monitoring dashboard.
//!
//! # Architecture
//!
//! ```text
//!                    Clinical REST API
//!                           │
//!                    ┌──────▼──────┐
//!                    │   Gateway   │  typed calls, ordering contract
//!                    └──────┬──────┘
//!                           │
//!              ┌────────────▼────────────┐
//!              │      SyncManager        │  keyed cache, polling,
//!              │  generation-guarded     │  invalidation
//!              └──┬─────────┬─────────┬──┘
//!                 │         │         │
//!                 ▼         ▼         ▼
//!             Dashboard   Vitals   Diagnostic ──mutate──┐
//!             (stats,     surface  workflow             │
//!              roster)                 ▲                │
//!                                      └── invalidate ──┘
//! ```
//!
//! # Core Principle
//!
//! **Server state is the source of truth.** Alerts, confidences and orderings
//! come from the API and are never re-derived locally.
//!
//! # Modules
//!
//! - [`gateway`]: Remote data gateway (`Gateway` trait, HTTP implementation)
//! - [`models`]: Domain types (Patient, VitalsSample, DiagnosticReport, etc.)
//! - [`sync`]: Keyed query cache with generation-guarded updates
//! - [`queries`]: Query keys, invalidation table, dashboard session
//! - [`surface`]: Pure vitals/report transforms
//! - [`workflow`]: Upload-and-diagnose state machine
//! - [`config`]: Client configuration

pub mod config;
pub mod gateway;
pub mod logging;
pub mod models;
pub mod queries;
pub mod surface;
pub mod sync;
pub mod workflow;

// Re-export commonly used types
pub use config::{ClientConfig, ConfigError, RefreshPolicy};
pub use gateway::{AssetResolver, Gateway, GatewayError, GatewayResult, HttpGateway, ImagePayload};
pub use models::{
    Confidence, DashboardStats, DiagnosticReport, DiagnosticSubmission, ModelError, NewPatient,
    Patient, PatientId, ReportHistory, VitalMetric, VitalsFeed, VitalsHistory, VitalsSample,
};
pub use queries::{ClinicalQueries, MonitorSession, Mutation, QueryValue};
pub use sync::{KeySelector, QueryKey, QueryOptions, QuerySnapshot, Refresh, Subscription, SyncManager};
pub use workflow::{DiagnosticWorkflow, PreviewState, SubmitAction, WorkflowError, WorkflowState};

/// Any error surfaced by the client core.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Invalid input: {0}")]
    Model(#[from] ModelError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
}

pub type MonitorResult<T> = Result<T, MonitorError>;
