//! Facility-wide statistics.

use serde::{Deserialize, Serialize};

/// Aggregate snapshot. Always replaced wholesale, never merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_patients: u64,
    pub total_reports: u64,
    /// Reports predicted as pneumonia
    pub pneumonia_count: u64,
    /// Distinct device IDs that have reported vitals
    pub active_devices: u64,
}
