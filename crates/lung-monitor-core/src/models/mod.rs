//! Domain models for the lung monitoring client.

mod patient;
mod report;
mod stats;
mod vitals;

pub use patient::*;
pub use report::*;
pub use stats::*;
pub use vitals::*;

use thiserror::Error;

/// Model validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid patient: {0}")]
    InvalidPatient(String),

    #[error("Confidence {0} outside [0, 100]")]
    ConfidenceOutOfRange(f64),

    #[error("{sequence} not newest-first at position {index}")]
    Ordering {
        sequence: &'static str,
        index: usize,
    },
}

/// Check that timestamps are non-increasing (newest first).
pub(crate) fn check_newest_first<T, F>(
    items: &[T],
    sequence: &'static str,
    timestamp: F,
) -> Result<(), ModelError>
where
    F: Fn(&T) -> chrono::NaiveDateTime,
{
    for (index, pair) in items.windows(2).enumerate() {
        if timestamp(&pair[0]) < timestamp(&pair[1]) {
            return Err(ModelError::Ordering {
                sequence,
                index: index + 1,
            });
        }
    }
    Ok(())
}
