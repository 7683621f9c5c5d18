use image::{DynamicImage, GrayImage, RgbaImage};

use crate::utils::contrast::linear_stretch;
use crate::utils::grayscale::{luma_stats, rgb_to_grayscale, rgba_to_grayscale};

/// One raster handed to a decode strategy: a video frame or a static-image
/// candidate.
#[derive(Debug, Clone)]
pub struct Frame {
    image: DynamicImage,
}

impl Frame {
    /// Wrap a decoded image
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    /// Build from tightly packed 8-bit luma; `None` if the buffer size is wrong
    pub fn from_luma(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        GrayImage::from_raw(width, height, data).map(|img| Self::new(DynamicImage::ImageLuma8(img)))
    }

    /// Build from tightly packed RGBA; `None` if the buffer size is wrong
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, data).map(|img| Self::new(DynamicImage::ImageRgba8(img)))
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Shorter of width and height
    pub fn short_side(&self) -> u32 {
        self.width().min(self.height())
    }

    /// Underlying image
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// 8-bit luma, row-major
    pub fn luma(&self) -> Vec<u8> {
        let (w, h) = (self.width() as usize, self.height() as usize);
        match &self.image {
            DynamicImage::ImageLuma8(gray) => gray.as_raw().clone(),
            DynamicImage::ImageRgb8(rgb) => rgb_to_grayscale(rgb.as_raw(), w, h),
            DynamicImage::ImageRgba8(rgba) => rgba_to_grayscale(rgba.as_raw(), w, h),
            other => rgba_to_grayscale(other.to_rgba8().as_raw(), w, h),
        }
    }

    /// Luma as an image buffer
    pub fn to_gray_image(&self) -> GrayImage {
        match &self.image {
            DynamicImage::ImageLuma8(gray) => gray.clone(),
            _ => GrayImage::from_raw(self.width(), self.height(), self.luma())
                .unwrap_or_else(|| GrayImage::new(self.width(), self.height())),
        }
    }

    /// Mean luma, used as the brightness reading
    pub fn mean_luma(&self) -> u8 {
        luma_stats(&self.luma()).mean
    }

    /// Grayscale + linear contrast stretch copy of this frame
    pub fn contrast_enhanced(&self) -> Frame {
        let stretched = linear_stretch(&self.luma());
        Frame::from_luma(self.width(), self.height(), stretched)
            .unwrap_or_else(|| self.clone())
    }
}

impl From<DynamicImage> for Frame {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_luma_rejects_wrong_size() {
        assert!(Frame::from_luma(4, 4, vec![0; 15]).is_none());
        assert!(Frame::from_luma(4, 4, vec![0; 16]).is_some());
    }

    #[test]
    fn test_contrast_enhanced_stretches() {
        let frame = Frame::from_luma(2, 1, vec![120, 140]).expect("frame");
        let enhanced = frame.contrast_enhanced();
        assert_eq!(enhanced.luma(), vec![0, 255]);
    }

    #[test]
    fn test_rgba_luma_and_brightness() {
        let frame = Frame::from_rgba(1, 2, vec![0, 0, 0, 255, 255, 255, 255, 255]).expect("frame");
        assert_eq!(frame.luma(), vec![0, 254]);
        assert_eq!(frame.mean_luma(), 127);
        assert_eq!(frame.short_side(), 1);
    }
}
