//! Report synthesis: compose, capture, paginate, save.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lung_monitor_core::config::ClientConfig;
use lung_monitor_core::gateway::AssetResolver;
use lung_monitor_core::models::{DiagnosticReport, Patient};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::{Origin, Url};

use crate::document::ReportDocument;
use crate::pdf::paginate;
use crate::render::{RegionRenderer, RenderError, CAPTURE_SCALE};

/// Synthesis errors. Any of them means no file was written.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("No active report or patient to synthesize")]
    NoData,

    #[error("Image is not served from an allowed origin: {0}")]
    CrossOriginImage(Url),

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error("Assembly failed: {0}")]
    Assembly(String),

    #[error("Write failed: {0}")]
    Write(#[from] std::io::Error),
}

pub type SynthesisResult<T> = Result<T, SynthesisError>;

/// `Report_<name>_<YYYY-MM-DD>.pdf`, with the name reduced to a single
/// path component by [`Patient::slug`].
pub fn report_file_name(patient: &Patient, generated_at: DateTime<Utc>) -> String {
    format!(
        "Report_{}_{}.pdf",
        patient.slug("_"),
        generated_at.format("%Y-%m-%d")
    )
}

pub struct ReportSynthesizer<R> {
    renderer: R,
    resolver: AssetResolver,
    allowed_origins: Vec<Origin>,
    output_dir: PathBuf,
}

impl<R: RegionRenderer> ReportSynthesizer<R> {
    pub fn new(renderer: R, resolver: AssetResolver, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            renderer,
            resolver,
            allowed_origins: Vec::new(),
            output_dir: output_dir.into(),
        }
    }

    /// Uses the configured asset origin, CORS allow-list and report directory.
    pub fn from_config(renderer: R, config: &ClientConfig) -> Self {
        let allowed = config
            .cors_origins
            .iter()
            .filter_map(|origin| match Url::parse(origin) {
                Ok(url) => Some(url.origin()),
                Err(e) => {
                    warn!(%origin, error = %e, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        Self::new(renderer, config.asset_resolver(), config.report_dir.clone())
            .with_allowed_origins(allowed)
    }

    pub fn with_allowed_origins(mut self, origins: Vec<Origin>) -> Self {
        self.allowed_origins = origins;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Synthesize the active report for `patient`, timestamped now.
    pub async fn synthesize(
        &self,
        report: Option<&DiagnosticReport>,
        patient: Option<&Patient>,
    ) -> SynthesisResult<PathBuf> {
        self.synthesize_at(report, patient, Utc::now()).await
    }

    pub async fn synthesize_at(
        &self,
        report: Option<&DiagnosticReport>,
        patient: Option<&Patient>,
        generated_at: DateTime<Utc>,
    ) -> SynthesisResult<PathBuf> {
        let (Some(report), Some(patient)) = (report, patient) else {
            debug!("synthesis requested without an active report");
            return Err(SynthesisError::NoData);
        };

        let document = ReportDocument::compose(report, patient, &self.resolver, generated_at)
            .map_err(|e| SynthesisError::Assembly(format!("bad image reference: {}", e)))?;
        self.check_origins(&document)?;

        let raster = self.renderer.render(&document, CAPTURE_SCALE).await?;
        debug!(
            report_id = report.id,
            width = raster.width(),
            height = raster.height(),
            "region captured"
        );

        let pdf = paginate(&raster, document.title).map_err(SynthesisError::Assembly)?;
        let path = self.output_dir.join(report_file_name(patient, generated_at));
        write_atomically(&self.output_dir, &path, &pdf)?;

        info!(report_id = report.id, path = %path.display(), "report synthesized");
        Ok(path)
    }

    fn check_origins(&self, document: &ReportDocument) -> SynthesisResult<()> {
        let asset_origin = self.resolver.asset_origin();
        for image in &document.images {
            let origin = image.url.origin();
            if origin != asset_origin && !self.allowed_origins.contains(&origin) {
                warn!(url = %image.url, "refusing cross-origin image");
                return Err(SynthesisError::CrossOriginImage(image.url.clone()));
            }
        }
        Ok(())
    }
}

/// Write into a temporary file in `dir`, then rename over `path`.
fn write_atomically(dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use lung_monitor_core::models::PatientId;

    #[test]
    fn test_report_file_name() {
        let patient = Patient {
            id: PatientId(1),
            name: "  Anil   Kumar Rao ".into(),
            age: 54,
            gender: "Male".into(),
            created_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        };
        let at = Utc.with_ymd_and_hms(2024, 3, 2, 23, 59, 0).unwrap();
        assert_eq!(report_file_name(&patient, at), "Report_Anil_Kumar_Rao_2024-03-02.pdf");
    }

    #[test]
    fn test_report_file_name_strips_path_characters() {
        let mut patient = Patient {
            id: PatientId(2),
            name: "A/B Kumar".into(),
            age: 40,
            gender: "Female".into(),
            created_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        };
        let at = Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap();
        assert_eq!(report_file_name(&patient, at), "Report_A_B_Kumar_2024-03-02.pdf");

        patient.name = "../..\\escaped:\t\"x\"".into();
        let name = report_file_name(&patient, at);
        assert_eq!(name, "Report_.._.._escaped_x_2024-03-02.pdf");
        assert_eq!(std::path::Path::new(&name).components().count(), 1);
    }

    #[test]
    fn test_write_atomically_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        write_atomically(dir.path(), &path, b"first").unwrap();
        write_atomically(dir.path(), &path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
