//! Patient models.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::ModelError;

/// Server-assigned patient identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(pub i64);

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PatientId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A registered patient as returned by the roster endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Server ID
    pub id: PatientId,
    /// Display name
    pub name: String,
    /// Age in years
    pub age: u32,
    /// Male / Female / Other (free text on the server)
    pub gender: String,
    /// Creation timestamp (UTC)
    pub created_at: NaiveDateTime,
}

impl Patient {
    /// Name usable as one file name component: path separators, reserved
    /// characters and control characters count as whitespace, and whitespace
    /// runs collapse to `separator`.
    pub fn slug(&self, separator: &str) -> String {
        self.name
            .split(|c: char| {
                c.is_whitespace()
                    || c.is_control()
                    || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
            })
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(separator)
    }
}

/// Request body for the roster-add mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPatient {
    pub name: String,
    pub age: u32,
    pub gender: String,
}

impl NewPatient {
    /// Build a validated request. The server rejects blank names and genders,
    /// so we refuse them before any transport call.
    pub fn new(name: &str, age: u32, gender: &str) -> Result<Self, ModelError> {
        let name = name.trim();
        let gender = gender.trim();

        if name.is_empty() {
            return Err(ModelError::InvalidPatient("name is required".into()));
        }
        if gender.is_empty() {
            return Err(ModelError::InvalidPatient("gender is required".into()));
        }

        Ok(Self {
            name: name.to_string(),
            age,
            gender: gender.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_patient_trims() {
        let patient = NewPatient::new("  A. Kumar ", 54, " Male").unwrap();
        assert_eq!(patient.name, "A. Kumar");
        assert_eq!(patient.gender, "Male");
    }

    #[test]
    fn test_new_patient_requires_name() {
        let err = NewPatient::new("   ", 54, "Male").unwrap_err();
        assert!(matches!(err, ModelError::InvalidPatient(_)));
    }

    #[test]
    fn test_patient_deserializes_server_shape() {
        let json = r#"{"id": 1, "name": "A. Kumar", "age": 54, "gender": "Male",
                       "created_at": "2024-03-01T09:15:02.123456"}"#;
        let patient: Patient = serde_json::from_str(json).unwrap();
        assert_eq!(patient.id, PatientId(1));
        assert_eq!(patient.slug("_"), "A._Kumar");
    }

    #[test]
    fn test_slug_collapses_whitespace() {
        let json = r#"{"id": 2, "name": "Mary   Ann\tLee", "age": 30, "gender": "Female",
                       "created_at": "2024-03-01T09:15:02"}"#;
        let patient: Patient = serde_json::from_str(json).unwrap();
        assert_eq!(patient.slug("_"), "Mary_Ann_Lee");
    }

    #[test]
    fn test_slug_drops_path_characters() {
        let json = r#"{"id": 3, "name": "A/B Kumar", "age": 30, "gender": "Male",
                       "created_at": "2024-03-01T09:15:02"}"#;
        let mut patient: Patient = serde_json::from_str(json).unwrap();
        assert_eq!(patient.slug("_"), "A_B_Kumar");

        patient.name = "../..\\escaped:<x>|\u{7}".into();
        assert_eq!(patient.slug("_"), ".._.._escaped_x");
    }
}
