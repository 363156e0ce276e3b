//! A4 pagination of a captured raster.

use std::io::BufWriter;
use std::ops::Range;

use printpdf::{
    ColorBits, ColorSpace, Image, ImageTransform, ImageXObject, Mm, PdfDocument, Px,
};

use crate::render::Raster;

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;

/// Row ranges that fill one A4 page each once the raster is scaled to page
/// width. The last range may be shorter.
pub fn page_ranges(width: u32, height: u32) -> Vec<Range<u32>> {
    let rows_per_page = ((width as f32 * PAGE_HEIGHT_MM / PAGE_WIDTH_MM).floor() as u32).max(1);
    (0..height)
        .step_by(rows_per_page as usize)
        .map(|start| start..(start + rows_per_page).min(height))
        .collect()
}

/// Build the whole PDF in memory.
pub fn paginate(raster: &Raster, title: &str) -> Result<Vec<u8>, String> {
    let ranges = page_ranges(raster.width(), raster.height());
    let mm_per_px = PAGE_WIDTH_MM / raster.width() as f32;
    let dpi = raster.width() as f32 * 25.4 / PAGE_WIDTH_MM;

    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");

    for (i, rows) in ranges.into_iter().enumerate() {
        let layer = if i == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(
                Mm(PAGE_WIDTH_MM),
                Mm(PAGE_HEIGHT_MM),
                format!("Layer {}", i + 1),
            );
            doc.get_page(page).get_layer(layer)
        };

        let slice_height = rows.end - rows.start;
        let image = Image::from(ImageXObject {
            width: Px(raster.width() as usize),
            height: Px(slice_height as usize),
            color_space: ColorSpace::Rgb,
            bits_per_component: ColorBits::Bit8,
            interpolate: true,
            image_data: raster.rows(rows.start, rows.end).to_vec(),
            image_filter: None,
            smask: None,
            clipping_bbox: None,
        });

        // Anchor each slice to the top edge of its page
        let slice_height_mm = slice_height as f32 * mm_per_px;
        image.add_to_layer(
            layer,
            ImageTransform {
                translate_x: Some(Mm(0.0)),
                translate_y: Some(Mm(PAGE_HEIGHT_MM - slice_height_mm)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| format!("PDF save error: {}", e))?;
    buf.into_inner()
        .map_err(|e| format!("PDF buffer error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_page_when_short() {
        assert_eq!(page_ranges(210, 100), vec![0..100]);
    }

    #[test]
    fn test_tall_raster_splits() {
        // 100 px wide -> 141 rows per page
        assert_eq!(page_ranges(100, 300), vec![0..141, 141..282, 282..300]);
    }

    #[test]
    fn test_paginate_produces_pdf() {
        let raster = Raster::new(20, 60, vec![255; 20 * 60 * 3]).unwrap();
        let bytes = paginate(&raster, "Report").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    proptest! {
        #[test]
        fn prop_ranges_cover_every_row_once(width in 1u32..2000, height in 1u32..5000) {
            let ranges = page_ranges(width, height);
            prop_assert_eq!(ranges.first().map(|r| r.start), Some(0));
            prop_assert_eq!(ranges.last().map(|r| r.end), Some(height));
            for pair in ranges.windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].start);
            }
        }
    }
}
