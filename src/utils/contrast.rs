//! Contrast enhancement and hard thresholding on 8-bit luma buffers.

/// Fraction of pixels ignored at each end of the histogram when stretching.
pub const STRETCH_CLIP: f32 = 0.01;

fn histogram(gray: &[u8]) -> [u32; 256] {
    let mut histogram = [0u32; 256];
    for &pixel in gray {
        histogram[pixel as usize] += 1;
    }
    histogram
}

/// Find the luma levels below/above which `clip` of the pixels fall.
fn clipped_bounds(histogram: &[u32; 256], total: usize, clip: f32) -> (u8, u8) {
    let cut = (total as f32 * clip.clamp(0.0, 0.49)) as u64;

    let mut acc = 0u64;
    let mut low = 0u8;
    for (level, &count) in histogram.iter().enumerate() {
        acc += count as u64;
        if acc > cut {
            low = level as u8;
            break;
        }
    }

    acc = 0;
    let mut high = 255u8;
    for (level, &count) in histogram.iter().enumerate().rev() {
        acc += count as u64;
        if acc > cut {
            high = level as u8;
            break;
        }
    }

    (low, high)
}

/// Linearly stretch luma so the clipped range spans 0..=255.
///
/// Flat images (no spread between the clipped bounds) are returned unchanged.
pub fn linear_stretch(gray: &[u8]) -> Vec<u8> {
    linear_stretch_clipped(gray, STRETCH_CLIP)
}

/// [`linear_stretch`] with an explicit clip fraction.
pub fn linear_stretch_clipped(gray: &[u8], clip: f32) -> Vec<u8> {
    if gray.is_empty() {
        return Vec::new();
    }
    let (low, high) = clipped_bounds(&histogram(gray), gray.len(), clip);
    if high <= low {
        return gray.to_vec();
    }

    let span = (high - low) as u32;
    let mut lut = [0u8; 256];
    for (level, slot) in lut.iter_mut().enumerate() {
        let level = level as u32;
        *slot = if level <= low as u32 {
            0
        } else if level >= high as u32 {
            255
        } else {
            (((level - low as u32) * 255 + span / 2) / span) as u8
        };
    }

    gray.iter().map(|&v| lut[v as usize]).collect()
}

/// Calculate Otsu's optimal threshold
pub fn otsu_threshold(gray: &[u8]) -> u8 {
    if gray.is_empty() {
        return 128;
    }
    let histogram = histogram(gray);
    let total = gray.len() as f64;
    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * count as f64)
        .sum();

    // Running class sums; class 1 holds levels strictly below the threshold.
    let mut class1_pixels = 0.0f64;
    let mut class1_sum = 0.0f64;
    let mut max_variance = 0.0f64;
    let mut optimal_threshold = 128u8;

    for threshold in 1..=255usize {
        let count = histogram[threshold - 1] as f64;
        class1_pixels += count;
        class1_sum += (threshold - 1) as f64 * count;

        let class2_pixels = total - class1_pixels;
        if class1_pixels == 0.0 || class2_pixels == 0.0 {
            continue;
        }

        let class1_mean = class1_sum / class1_pixels;
        let class2_mean = (weighted_total - class1_sum) / class2_pixels;
        let weight1 = class1_pixels / total;
        let weight2 = class2_pixels / total;
        let variance = weight1 * weight2 * (class1_mean - class2_mean).powi(2);

        if variance > max_variance {
            max_variance = variance;
            optimal_threshold = threshold as u8;
        }
    }

    optimal_threshold
}

/// Hard threshold: pixels below `threshold` become black (0), the rest white (255)
pub fn threshold(gray: &[u8], threshold: u8) -> Vec<u8> {
    gray.iter()
        .map(|&v| if v < threshold { 0 } else { 255 })
        .collect()
}

/// Stretch, then threshold at the Otsu level of the stretched image.
pub fn stretch_and_threshold(gray: &[u8]) -> Vec<u8> {
    let stretched = linear_stretch(gray);
    let level = otsu_threshold(&stretched);
    threshold(&stretched, level)
}
