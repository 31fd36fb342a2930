// SPDX-License-Identifier: GPL-3.0-only

//! Frame visualization
//!
//! Turns a normalized depth frame (or the enhanced region crop) into an
//! ocean-colored RGB image with candidate outlines, index labels and the
//! frame counter burned in. The same image is shown on the display surface
//! and written out as the debug snapshot.

pub mod colormap;

pub use colormap::{ocean, ocean_lut};

use crate::config::DisplayConfig;
use crate::constants::display;
use crate::depth::{DepthFrame, Roi};
use crate::detect::{CandidateBox, Detection, scale_to_u8};
use crate::errors::{AppError, AppResult};
use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;
use tracing::{debug, info, warn};

/// DejaVu Sans Mono, used when no label font is configured
const BUNDLED_FONT: &[u8] = include_bytes!("../../resources/fonts/DejaVuSansMono.ttf");

/// Annotated frame ready for display
#[derive(Debug, Clone)]
pub struct DisplayFrame {
    pub image: RgbImage,
    /// Candidates outlined in the image, full-frame coordinates
    pub candidates: Vec<CandidateBox>,
    /// Region the detector searched, if one is set
    pub region: Option<Roi>,
    pub frame_counter: u64,
    /// Labels and counter are part of the image
    pub labels_burned: bool,
}

/// `saturate(round(v / scaling))` over a whole frame
pub fn to_8bit(frame: &DepthFrame, scaling: f64) -> Vec<u8> {
    frame.data.iter().map(|&v| scale_to_u8(v, scaling)).collect()
}

/// Draws frames, burning in labels unless disabled
pub struct Renderer {
    font: Option<FontArc>,
}

impl Renderer {
    /// Load the configured label font, falling back to the bundled one
    pub fn new(config: &DisplayConfig) -> Self {
        if !config.burn_labels {
            info!("Burned-in labels disabled, labels drawn by the display surface only");
            return Self { font: None };
        }

        let font = config
            .label_font
            .as_deref()
            .and_then(load_font)
            .or_else(bundled_font);
        Self { font }
    }

    /// Render one frame
    ///
    /// With a detection, the enhanced crop is drawn at the region position on
    /// a black canvas of the full frame size. Otherwise the normalized frame
    /// is shown as is.
    pub fn render(
        &self,
        normalized: &DepthFrame,
        detection: Option<&Detection>,
        scaling: f64,
        frame_counter: u64,
    ) -> DisplayFrame {
        let mut image = RgbImage::new(normalized.width, normalized.height);

        match detection {
            Some(detection) => {
                let region = detection.region;
                let crop = &detection.enhanced;
                for (i, &v) in crop.data.iter().enumerate() {
                    let x = region.x + (i as u32 % crop.width);
                    let y = region.y + (i as u32 / crop.width);
                    if x < image.width() && y < image.height() {
                        image.put_pixel(x, y, Rgb(ocean(scale_to_u8(v, scaling))));
                    }
                }
            }
            None => {
                for (pixel, v) in image.pixels_mut().zip(to_8bit(normalized, scaling)) {
                    *pixel = Rgb(ocean(v));
                }
            }
        }

        let candidates = detection
            .map(|d| d.candidates.clone())
            .unwrap_or_default();
        for candidate in &candidates {
            let rect = candidate.rect;
            draw_hollow_rect_mut(
                &mut image,
                Rect::at(rect.x as i32, rect.y as i32).of_size(rect.width, rect.height),
                Rgb(display::BOX_COLOR),
            );
        }

        if let Some(font) = &self.font {
            let scale = PxScale::from(display::LABEL_SCALE);
            let color = Rgb(display::LABEL_COLOR);

            for (index, candidate) in candidates.iter().enumerate() {
                let (x, y) = label_position(&candidate.rect);
                draw_text_mut(&mut image, color, x, y, scale, font, &index.to_string());
            }

            let (cx, cy) = display::COUNTER_POSITION;
            draw_text_mut(&mut image, color, cx, cy, scale, font, &frame_counter.to_string());
        }

        DisplayFrame {
            image,
            candidates,
            region: detection.map(|d| d.region),
            frame_counter,
            labels_burned: self.font.is_some(),
        }
    }
}

/// Label anchor just above the box, or inside it at the top edge
pub fn label_position(rect: &Roi) -> (i32, i32) {
    let above = rect.y as i32 - display::LABEL_SCALE as i32;
    (rect.x as i32, above.max(0))
}

fn load_font(path: &Path) -> Option<FontArc> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read label font");
            return None;
        }
    };

    match FontArc::try_from_vec(bytes) {
        Ok(font) => {
            debug!(path = %path.display(), "Loaded label font");
            Some(font)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Invalid label font");
            None
        }
    }
}

fn bundled_font() -> Option<FontArc> {
    FontArc::try_from_slice(BUNDLED_FONT)
        .inspect_err(|e| warn!(error = %e, "Bundled label font is invalid"))
        .ok()
}

/// Write the annotated image to disk
pub fn save_snapshot(frame: &DisplayFrame, path: &Path) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Snapshot(format!("{}: {}", parent.display(), e)))?;
    }

    frame
        .image
        .save(path)
        .map_err(|e| AppError::Snapshot(format!("{}: {}", path.display(), e)))?;

    info!(
        path = %path.display(),
        frame = frame.frame_counter,
        candidates = frame.candidates.len(),
        "Saved debug snapshot"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unlabeled() -> Renderer {
        Renderer::new(&DisplayConfig {
            burn_labels: false,
            ..Default::default()
        })
    }

    /// Pixels in a `size`-square window at `(x, y)` that differ from `background`
    fn changed_pixels(
        image: &RgbImage,
        (x, y): (i32, i32),
        size: u32,
        background: [u8; 3],
    ) -> usize {
        let (x, y) = (x.max(0) as u32, y.max(0) as u32);
        (y..(y + size).min(image.height()))
            .flat_map(|py| (x..(x + size).min(image.width())).map(move |px| (px, py)))
            .filter(|&(px, py)| image.get_pixel(px, py).0 != background)
            .count()
    }

    fn detection(region: Roi, value: u16, candidates: Vec<CandidateBox>) -> Detection {
        Detection {
            region,
            enhanced: DepthFrame::filled(region.width, region.height, value),
            candidates,
        }
    }

    #[test]
    fn test_to_8bit() {
        let frame = DepthFrame::new(3, 1, vec![0, 500, 5000]).unwrap();
        assert_eq!(to_8bit(&frame, 5.0), vec![0, 100, 255]);
    }

    #[test]
    fn test_full_frame_without_region() {
        let renderer = unlabeled();
        let frame = DepthFrame::filled(8, 6, 1275);
        let out = renderer.render(&frame, None, 5.0, 1);

        assert_eq!(out.image.dimensions(), (8, 6));
        assert!(out.image.pixels().all(|p| p.0 == ocean(255)));
        assert!(out.candidates.is_empty());
        assert!(out.region.is_none());
    }

    #[test]
    fn test_region_drawn_on_black_canvas() {
        let renderer = unlabeled();
        let frame = DepthFrame::filled(20, 20, 0);
        let region = Roi::new(5, 5, 4, 4);
        let out = renderer.render(&frame, Some(&detection(region, 1275, vec![])), 5.0, 7);

        assert_eq!(out.image.get_pixel(6, 6).0, ocean(255));
        assert_eq!(out.image.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(out.region, Some(region));
        assert_eq!(out.frame_counter, 7);
    }

    #[test]
    fn test_candidate_outline() {
        let renderer = unlabeled();
        let frame = DepthFrame::filled(40, 40, 0);
        let region = Roi::new(0, 0, 40, 40);
        let candidate = CandidateBox::new(Roi::new(10, 10, 16, 16));
        let out = renderer.render(&frame, Some(&detection(region, 0, vec![candidate])), 5.0, 1);

        assert_eq!(out.image.get_pixel(10, 10).0, display::BOX_COLOR);
        assert_eq!(out.image.get_pixel(25, 25).0, display::BOX_COLOR);
        assert_ne!(out.image.get_pixel(17, 17).0, display::BOX_COLOR);
        assert!(!out.labels_burned);
    }

    #[test]
    fn test_labels_and_counter_burned_in() {
        let frame = DepthFrame::filled(200, 120, 0);
        let region = Roi::new(0, 0, 200, 120);
        let rect = Roi::new(100, 40, 16, 16);
        let detection = detection(region, 0, vec![CandidateBox::new(rect)]);
        let background = ocean(0);
        let size = display::LABEL_SCALE as u32;

        let renderer = Renderer::new(&DisplayConfig::default());
        let out = renderer.render(&frame, Some(&detection), 5.0, 42);
        assert!(out.labels_burned);
        assert!(changed_pixels(&out.image, label_position(&rect), size, background) > 0);
        assert!(changed_pixels(&out.image, display::COUNTER_POSITION, size, background) > 0);

        let plain = unlabeled().render(&frame, Some(&detection), 5.0, 42);
        assert!(!plain.labels_burned);
        assert_eq!(changed_pixels(&plain.image, label_position(&rect), size, background), 0);
        assert_eq!(
            changed_pixels(&plain.image, display::COUNTER_POSITION, size, background),
            0
        );
    }

    #[test]
    fn test_missing_font_falls_back_to_bundled() {
        let config = DisplayConfig {
            label_font: Some("/nonexistent/font.ttf".into()),
            ..Default::default()
        };
        let out = Renderer::new(&config).render(&DepthFrame::filled(64, 32, 0), None, 5.0, 7);

        assert!(out.labels_burned);
        assert!(changed_pixels(&out.image, display::COUNTER_POSITION, 14, ocean(0)) > 0);
    }

    #[test]
    fn test_label_position_clamped() {
        assert_eq!(label_position(&Roi::new(3, 2, 10, 10)), (3, 0));
        assert_eq!(label_position(&Roi::new(3, 40, 10, 10)), (3, 26));
    }

    #[test]
    fn test_snapshot_written() {
        let dir = std::env::temp_dir().join(format!("depth-roi-snapshot-{}", std::process::id()));
        let path = dir.join("snap.png");
        let frame = unlabeled().render(&DepthFrame::filled(4, 4, 100), None, 5.0, 100);

        save_snapshot(&frame, &path).unwrap();
        let loaded = image::open(&path).unwrap().into_rgb8();
        assert_eq!(loaded, frame.image);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
