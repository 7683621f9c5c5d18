/// Luma conversion for camera frames and uploaded images
/// Y = 0.299*R + 0.587*G + 0.114*B
/// Uses fast integer arithmetic: Y = (76*R + 150*G + 29*B) >> 8
///
/// Frames at or above `PARALLEL_PIXEL_THRESHOLD` pixels are converted
/// row-parallel with rayon; smaller ones stay on the calling thread.
use rayon::prelude::*;

/// Coefficients for grayscale conversion: Y = (76*R + 150*G + 29*B) >> 8
const COEF_R: u32 = 76;
const COEF_G: u32 = 150;
const COEF_B: u32 = 29;

/// Pixel count above which conversion is split across rayon workers
pub const PARALLEL_PIXEL_THRESHOLD: usize = 640 * 480;

#[inline(always)]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let lum = (COEF_R * r as u32 + COEF_G * g as u32 + COEF_B * b as u32) >> 8;
    lum.min(255) as u8
}

/// Convert packed pixels with `channels` bytes per pixel (3 or 4) into luma.
fn convert_rows(src: &[u8], width: usize, height: usize, channels: usize) -> Vec<u8> {
    let pixel_count = width * height;
    let mut gray = vec![0u8; pixel_count];
    if pixel_count == 0 {
        return gray;
    }

    let convert_row = |(y, row): (usize, &mut [u8])| {
        let row_start = y * width * channels;
        let src_row = &src[row_start..row_start + width * channels];
        for (dst, px) in row.iter_mut().zip(src_row.chunks_exact(channels)) {
            *dst = luma(px[0], px[1], px[2]);
        }
    };

    if pixel_count >= PARALLEL_PIXEL_THRESHOLD {
        gray.par_chunks_mut(width).enumerate().for_each(convert_row);
    } else {
        gray.chunks_mut(width).enumerate().for_each(convert_row);
    }

    gray
}

/// Convert RGB image to grayscale
pub fn rgb_to_grayscale(rgb: &[u8], width: usize, height: usize) -> Vec<u8> {
    assert!(rgb.len() >= width * height * 3, "RGB buffer too small");
    convert_rows(rgb, width, height, 3)
}

/// Convert RGBA image to grayscale (ignores alpha channel)
pub fn rgba_to_grayscale(rgba: &[u8], width: usize, height: usize) -> Vec<u8> {
    assert!(rgba.len() >= width * height * 4, "RGBA buffer too small");
    convert_rows(rgba, width, height, 4)
}

/// Summary statistics for grayscale data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LumaStats {
    /// Minimum grayscale value.
    pub min: u8,
    /// Maximum grayscale value.
    pub max: u8,
    /// Average grayscale value.
    pub mean: u8,
}

/// Compute min/max/mean for grayscale values.
pub fn luma_stats(gray: &[u8]) -> LumaStats {
    if gray.is_empty() {
        return LumaStats {
            min: 0,
            max: 0,
            mean: 0,
        };
    }
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    let mut sum: u64 = 0;
    for &v in gray {
        min = min.min(v);
        max = max.max(v);
        sum += v as u64;
    }
    LumaStats {
        min,
        max,
        mean: (sum / gray.len() as u64) as u8,
    }
}
