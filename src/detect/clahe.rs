// SPDX-License-Identifier: GPL-3.0-only

//! Contrast-limited adaptive histogram equalization for 16-bit depth
//!
//! The crop is split into a grid of tiles. Each tile gets a clipped,
//! equalized 65536-entry lookup table, and every sample is remapped by
//! bilinear interpolation between the four nearest tile tables. The grid
//! never shrinks. When either side of the crop is not a multiple of the
//! grid, both sides are padded (reflect-101) by up to one tile, matching
//! OpenCV, so every tile is one sample larger than the plain quotient.

use crate::depth::DepthFrame;

const HIST_SIZE: usize = 1 << 16;

/// CLAHE operator with a fixed tile grid and clip limit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clahe {
    tiles: u32,
    clip_limit: f64,
}

impl Clahe {
    /// `tiles` per axis; a `clip_limit` of 0 or less disables clipping
    pub fn new(tiles: u32, clip_limit: f64) -> Self {
        Self {
            tiles: tiles.max(1),
            clip_limit,
        }
    }

    /// Equalize `frame` in place
    pub fn apply(&self, frame: &mut DepthFrame) {
        if frame.pixel_count() == 0 {
            return;
        }

        let tiles_x = self.tiles as usize;
        let tiles_y = self.tiles as usize;
        let (width, height) = (frame.width as usize, frame.height as usize);

        let (tile_w, tile_h) = tile_size(width, height, self.tiles as usize);
        let tile_area = tile_w * tile_h;

        let clip = if self.clip_limit > 0.0 {
            Some(((self.clip_limit * tile_area as f64 / HIST_SIZE as f64) as u32).max(1))
        } else {
            None
        };
        let lut_scale = (HIST_SIZE - 1) as f32 / tile_area as f32;

        let mut luts = vec![0u16; tiles_x * tiles_y * HIST_SIZE];
        let mut hist = vec![0u32; HIST_SIZE];

        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                hist.fill(0);
                for y in ty * tile_h..(ty + 1) * tile_h {
                    let row = reflect101(y, height) * width;
                    for x in tx * tile_w..(tx + 1) * tile_w {
                        let v = frame.data[row + reflect101(x, width)];
                        hist[v as usize] += 1;
                    }
                }

                if let Some(clip) = clip {
                    clip_histogram(&mut hist, clip);
                }

                let lut = &mut luts[(ty * tiles_x + tx) * HIST_SIZE..][..HIST_SIZE];
                let mut sum = 0u32;
                for (entry, &count) in lut.iter_mut().zip(&hist) {
                    sum += count;
                    *entry = (sum as f32 * lut_scale).round().min(u16::MAX as f32) as u16;
                }
            }
        }

        let inv_tw = 1.0 / tile_w as f32;
        let inv_th = 1.0 / tile_h as f32;
        let lut_at = |tx: usize, ty: usize, v: u16| -> f32 {
            luts[(ty * tiles_x + tx) * HIST_SIZE + v as usize] as f32
        };

        let x_weights: Vec<(usize, usize, f32)> = (0..width)
            .map(|x| interpolation_weights(x, inv_tw, tiles_x))
            .collect();

        for y in 0..height {
            let (ty1, ty2, ya) = interpolation_weights(y, inv_th, tiles_y);
            let row = y * width;
            for (x, &(tx1, tx2, xa)) in x_weights.iter().enumerate() {
                let v = frame.data[row + x];
                let top = lut_at(tx1, ty1, v) * (1.0 - xa) + lut_at(tx2, ty1, v) * xa;
                let bottom = lut_at(tx1, ty2, v) * (1.0 - xa) + lut_at(tx2, ty2, v) * xa;
                let res = top * (1.0 - ya) + bottom * ya;
                frame.data[row + x] = res.round().clamp(0.0, u16::MAX as f32) as u16;
            }
        }
    }
}

/// Tile width and height for a `width` x `height` crop on a square grid
fn tile_size(width: usize, height: usize, tiles: usize) -> (usize, usize) {
    if width % tiles == 0 && height % tiles == 0 {
        (width / tiles, height / tiles)
    } else {
        (width / tiles + 1, height / tiles + 1)
    }
}

/// Mirror an index past the end of `len` samples without repeating the edge
///
/// Indices more than one period out keep bouncing between the ends.
fn reflect101(i: usize, len: usize) -> usize {
    if i < len {
        return i;
    }
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let m = i % period;
    if m < len { m } else { period - m }
}

/// Neighbouring tiles of a pixel and the weight of the second one
fn interpolation_weights(pos: usize, inv_tile: f32, tiles: usize) -> (usize, usize, f32) {
    let f = pos as f32 * inv_tile - 0.5;
    let first = f.floor();
    let weight = f - first;
    let first = first as i64;
    let t1 = first.max(0) as usize;
    let t2 = ((first + 1) as usize).min(tiles - 1);
    (t1, t2, weight)
}

/// Clip every bin to `clip` and spread the excess over all bins
fn clip_histogram(hist: &mut [u32], clip: u32) {
    let mut clipped = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip {
            clipped += *bin - clip;
            *bin = clip;
        }
    }

    let batch = clipped / HIST_SIZE as u32;
    let residual = clipped as usize - batch as usize * HIST_SIZE;
    for bin in hist.iter_mut() {
        *bin += batch;
    }

    if residual > 0 {
        let step = (HIST_SIZE / residual).max(1);
        for bin in hist.iter_mut().step_by(step).take(residual) {
            *bin += 1;
        }
    }
}
