//! Lung Monitor Report Synthesis
//!
//! Turns the active diagnostic report into a paginated A4 PDF.
//!
//! ```text
//! DiagnosticReport + Patient
//!          │ compose
//!          ▼
//!   ReportDocument ──origin check──▶ RegionRenderer (2x) ──▶ Raster
//!                                                              │ paginate
//!                                                              ▼
//!                                              temp file ──persist──▶ Report_<name>_<date>.pdf
//! ```
//!
//! Nothing is written unless every step succeeds.

pub mod document;
pub mod pdf;
pub mod render;
pub mod synthesis;

pub use document::{DocumentImage, PatientBlock, ReportDocument};
pub use render::{Raster, RegionRenderer, RenderError, CAPTURE_SCALE};
pub use synthesis::{report_file_name, ReportSynthesizer, SynthesisError, SynthesisResult};
