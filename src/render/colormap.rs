// SPDX-License-Identifier: GPL-3.0-only

//! Ocean colormap
//!
//! Deep blue for low values through cyan to white for high values. Channel
//! ramps follow the classic gnuplot "ocean" formulae:
//! - red: `3t - 2`
//! - green: `|(3t - 1) / 2|`
//! - blue: `t`
//!
//! each clamped to 0..1.

use std::sync::OnceLock;

#[inline]
fn ocean_rgb(t: f32) -> [u8; 3] {
    let r = (3.0 * t - 2.0).clamp(0.0, 1.0);
    let g = ((3.0 * t - 1.0) / 2.0).abs().clamp(0.0, 1.0);
    let b = t.clamp(0.0, 1.0);
    [
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    ]
}

/// 256-entry ocean lookup table
pub fn ocean_lut() -> &'static [[u8; 3]; 256] {
    static LUT: OnceLock<[[u8; 3]; 256]> = OnceLock::new();
    LUT.get_or_init(|| {
        let mut lut = [[0u8; 3]; 256];
        for (i, entry) in lut.iter_mut().enumerate() {
            *entry = ocean_rgb(i as f32 / 255.0);
        }
        lut
    })
}

/// Color for one 8-bit intensity
#[inline]
pub fn ocean(value: u8) -> [u8; 3] {
    ocean_lut()[value as usize]
}
