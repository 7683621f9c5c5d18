//! Static-image preprocessing: an ordered list of raster variants that raise
//! the odds of a decode on photos, screenshots and projector captures.

use image::DynamicImage;
use rayon::prelude::*;

use crate::error::ScanError;
use crate::models::Frame;
use crate::utils::contrast::{linear_stretch, stretch_and_threshold};
use crate::utils::transform::{Rotation, rotate, upscale_dimensions, upscale_nearest};

/// Default short-side floor for the upscale candidates
pub const DEFAULT_UPSCALE_FLOOR: u32 = 800;

/// How a candidate was derived from the original
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateKind {
    /// Unmodified
    Original,
    /// Grayscale, contrast stretch, hard threshold
    Enhanced,
    /// Nearest-neighbour upscale to the short-side floor
    Upscaled,
    /// Upscaled and contrast-stretched
    UpscaledEnhanced,
    /// Quarter-turn rotation of the original
    Rotated(Rotation),
}

/// One raster to try
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Derivation
    pub kind: CandidateKind,
    /// Pixels
    pub frame: Frame,
}

/// Builds candidate lists for uploaded images
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    upscale_floor: u32,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_UPSCALE_FLOOR)
    }
}

impl Preprocessor {
    /// Preprocessor with a custom upscale floor
    pub fn new(upscale_floor: u32) -> Self {
        Self {
            upscale_floor: upscale_floor.max(1),
        }
    }

    /// Decode uploaded bytes into an image
    pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage, ScanError> {
        Ok(image::load_from_memory(bytes)?)
    }

    /// Kinds `prepare` would produce for an image of this size, in order
    pub fn plan(&self, width: u32, height: u32) -> Vec<CandidateKind> {
        let mut kinds = vec![CandidateKind::Original, CandidateKind::Enhanced];
        if upscale_dimensions(width, height, self.upscale_floor).is_some() {
            kinds.push(CandidateKind::Upscaled);
            kinds.push(CandidateKind::UpscaledEnhanced);
        }
        kinds.extend(Rotation::ALL.iter().map(|&r| CandidateKind::Rotated(r)));
        kinds
    }

    /// Ordered candidates for `image`
    pub fn prepare(&self, image: &DynamicImage) -> Vec<Candidate> {
        let original = Frame::new(image.clone());
        let (w, h) = (original.width(), original.height());
        let luma = original.luma();

        let enhanced = luma_frame(w, h, stretch_and_threshold(&luma), &original);
        let mut candidates = vec![
            Candidate {
                kind: CandidateKind::Original,
                frame: original.clone(),
            },
            Candidate {
                kind: CandidateKind::Enhanced,
                frame: enhanced,
            },
        ];

        if let Some(upscaled) = upscale_nearest(image, self.upscale_floor) {
            // Stretch before scaling: nearest sampling only repeats pixels, so
            // the result matches stretching the large image at a fraction of
            // the cost.
            let stretched = DynamicImage::ImageLuma8(
                luma_frame(w, h, linear_stretch(&luma), &original).to_gray_image(),
            );
            let upscaled_stretched =
                upscale_nearest(&stretched, self.upscale_floor).unwrap_or_else(|| stretched.clone());
            candidates.push(Candidate {
                kind: CandidateKind::Upscaled,
                frame: Frame::new(upscaled),
            });
            candidates.push(Candidate {
                kind: CandidateKind::UpscaledEnhanced,
                frame: Frame::new(upscaled_stretched),
            });
        }

        let rotated: Vec<Candidate> = Rotation::ALL
            .par_iter()
            .map(|&rotation| Candidate {
                kind: CandidateKind::Rotated(rotation),
                frame: Frame::new(rotate(image, rotation)),
            })
            .collect();
        candidates.extend(rotated);

        candidates
    }
}

fn luma_frame(width: u32, height: u32, luma: Vec<u8>, fallback: &Frame) -> Frame {
    Frame::from_luma(width, height, luma).unwrap_or_else(|| fallback.clone())
}
