//! Geometric transforms used by the static-image preprocessor.

use image::DynamicImage;
use image::imageops::FilterType;

/// Quarter-turn rotations applied to recover capture orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    /// 90 degrees clockwise
    Cw90,
    /// 180 degrees
    Cw180,
    /// 270 degrees clockwise
    Cw270,
}

impl Rotation {
    /// All rotations in the order they are tried
    pub const ALL: [Rotation; 3] = [Rotation::Cw90, Rotation::Cw180, Rotation::Cw270];

    /// Rotation in degrees
    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }
}

/// Rotate an image by a quarter turn.
pub fn rotate(image: &DynamicImage, rotation: Rotation) -> DynamicImage {
    match rotation {
        Rotation::Cw90 => image.rotate90(),
        Rotation::Cw180 => image.rotate180(),
        Rotation::Cw270 => image.rotate270(),
    }
}

/// Largest raster an upscale may produce (16 MP)
pub const MAX_UPSCALE_PIXELS: u64 = 16_000_000;

/// Dimensions after scaling so the short side reaches `floor`, or `None` when
/// the image already meets it, is empty, or the result would exceed
/// [`MAX_UPSCALE_PIXELS`] (thin strips and banners).
pub fn upscale_dimensions(width: u32, height: u32, floor: u32) -> Option<(u32, u32)> {
    let short = width.min(height);
    if short == 0 || short >= floor {
        return None;
    }
    let scale = floor as f64 / short as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).max(floor);
    let dims = if width <= height {
        (floor, scaled(height))
    } else {
        (scaled(width), floor)
    };
    if dims.0 as u64 * dims.1 as u64 > MAX_UPSCALE_PIXELS {
        return None;
    }
    Some(dims)
}

/// Nearest-neighbour upscale to a short-side floor.
///
/// Nearest sampling keeps module edges hard; any smoothing filter blurs the
/// code grid.
pub fn upscale_nearest(image: &DynamicImage, floor: u32) -> Option<DynamicImage> {
    let (w, h) = upscale_dimensions(image.width(), image.height(), floor)?;
    Some(image.resize_exact(w, h, FilterType::Nearest))
}
