//! Static asset resolution.
//!
//! Image and heat-map references in reports are relative paths. They are
//! resolved against the configured asset origin, never against whatever
//! origin the client happens to run on.

use url::{Origin, Url};

use crate::models::DiagnosticReport;

#[derive(Debug, Clone, PartialEq)]
pub struct AssetResolver {
    api_base: Url,
    asset_base: Url,
}

impl AssetResolver {
    pub fn new(api_base: Url, asset_base: Url) -> Self {
        Self {
            api_base: Self::with_trailing_slash(&api_base),
            asset_base: Self::with_trailing_slash(&asset_base),
        }
    }

    /// `Url::join` replaces the last path segment unless the base ends in `/`.
    pub fn with_trailing_slash(url: &Url) -> Url {
        let mut url = url.clone();
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url
    }

    /// Resolve an asset reference. Absolute URLs pass through unchanged.
    pub fn resolve(&self, reference: &str) -> Result<Url, url::ParseError> {
        match Url::parse(reference) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                self.asset_base.join(reference.trim_start_matches('/'))
            }
            Err(e) => Err(e),
        }
    }

    /// Source X-ray for a report.
    pub fn source_image(&self, report: &DiagnosticReport) -> Result<Url, url::ParseError> {
        self.resolve(&report.image_path)
    }

    /// Heat map when present, otherwise the source image.
    pub fn display_image(&self, report: &DiagnosticReport) -> Result<Url, url::ParseError> {
        self.resolve(report.heatmap().unwrap_or(&report.image_path))
    }

    /// Server-rendered PDF for a report.
    pub fn report_download(&self, report_id: i64) -> Result<Url, url::ParseError> {
        self.api_base.join(&format!("download-report/{}", report_id))
    }

    pub fn asset_origin(&self) -> Origin {
        self.asset_base.origin()
    }

    pub fn asset_base(&self) -> &Url {
        &self.asset_base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> AssetResolver {
        AssetResolver::new(
            Url::parse("http://ward.local:5001").unwrap(),
            Url::parse("http://ward.local:5001/static").unwrap(),
        )
    }

    #[test]
    fn test_resolve_relative() {
        let url = resolver().resolve("uploads/abc.png").unwrap();
        assert_eq!(url.as_str(), "http://ward.local:5001/static/uploads/abc.png");

        let url = resolver().resolve("/heatmaps/heatmap_abc.png").unwrap();
        assert_eq!(url.as_str(), "http://ward.local:5001/static/heatmaps/heatmap_abc.png");
    }

    #[test]
    fn test_absolute_passthrough() {
        let url = resolver().resolve("https://cdn.example.org/x.png").unwrap();
        assert_eq!(url.host_str(), Some("cdn.example.org"));
    }

    #[test]
    fn test_report_download() {
        let url = resolver().report_download(12).unwrap();
        assert_eq!(url.as_str(), "http://ward.local:5001/download-report/12");
    }
}
