//! Utility functions for image processing
//!
//! This module provides the raster helpers behind preprocessing and the
//! contrast-enhanced decode pass:
//! - Grayscale conversion (RGB/RGBA to luminance) and luma statistics
//! - Contrast stretch and thresholding (Otsu's method)
//! - Geometric transforms (nearest-neighbour upscale, quarter-turn rotation)

pub mod contrast;
pub mod grayscale;
pub mod transform;
