//! Rasterization seam.

use async_trait::async_trait;
use thiserror::Error;

use crate::document::ReportDocument;

/// Scale factor used for report captures.
pub const CAPTURE_SCALE: f32 = 2.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Capture failed: {0}")]
    Capture(String),

    #[error("Raster is {width}x{height} but carries {len} bytes")]
    InvalidRaster { width: u32, height: u32, len: usize },
}

/// Packed 8-bit RGB pixels, row-major, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

impl Raster {
    pub fn new(width: u32, height: u32, rgb: Vec<u8>) -> Result<Self, RenderError> {
        let expected = width as usize * height as usize * 3;
        if width == 0 || height == 0 || rgb.len() != expected {
            return Err(RenderError::InvalidRaster {
                width,
                height,
                len: rgb.len(),
            });
        }
        Ok(Self { width, height, rgb })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes of rows `start..end`.
    pub fn rows(&self, start: u32, end: u32) -> &[u8] {
        let stride = self.width as usize * 3;
        &self.rgb[start as usize * stride..end as usize * stride]
    }
}

/// Turns a composed document into pixels.
///
/// Implementations must not fetch anything outside the image URLs named in
/// the document.
#[async_trait]
pub trait RegionRenderer: Send + Sync {
    async fn render(&self, document: &ReportDocument, scale: f32) -> Result<Raster, RenderError>;
}
