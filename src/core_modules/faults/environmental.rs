// THEORY:
// Environmental faults: optical and atmospheric conditions between the
// scene and the sensor. Blur is the one transform with a structural
// precondition (the kernel must fit the frame), so it is the only fallible
// function in this family.

use image::RgbImage;
use imageproc::filter::gaussian_blur_f32;
use rand::Rng;

use super::TransformError;
use crate::core_modules::intensity::{FaultConfig, IntensityLevel};
use crate::core_modules::registry::FaultKind;

/// Gaussian smoothing with a kernel size taken from configuration, forced
/// odd and at least 3. Sigma follows the conventional kernel-to-sigma
/// schedule so a configured kernel size keeps its familiar strength.
pub fn blur(
    image: &RgbImage,
    level: IntensityLevel,
    config: &FaultConfig,
) -> Result<RgbImage, TransformError> {
    let mut kernel = config.lookup(FaultKind::Blur, level).scalar().max(0.0) as u32;
    if kernel % 2 == 0 {
        kernel += 1;
    }
    kernel = kernel.max(3);

    let (width, height) = image.dimensions();
    if kernel > width.min(height) {
        return Err(TransformError::KernelExceedsImage { kernel, width, height });
    }

    let sigma = 0.3 * ((kernel as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    Ok(gaussian_blur_f32(image, sigma))
}

/// Multiplies every channel by the configured factor plus a small upward
/// jitter.
pub fn brightness(
    image: &RgbImage,
    level: IntensityLevel,
    config: &FaultConfig,
    rng: &mut impl Rng,
) -> RgbImage {
    let factor =
        (config.lookup(FaultKind::Brightness, level).scalar() + rng.gen_range(0.0..0.2)) as f32;
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = (f32::from(*channel) * factor).clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Blends the frame with a constant mid-gray overlay.
pub fn fog(
    image: &RgbImage,
    level: IntensityLevel,
    config: &FaultConfig,
    rng: &mut impl Rng,
) -> RgbImage {
    const OVERLAY: f32 = 200.0;
    let alpha = (config.lookup(FaultKind::Fog, level).scalar() + rng.gen_range(-0.05..0.05)) as f32;
    let keep = 1.0 - alpha;

    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = (keep * f32::from(*channel) + alpha * OVERLAY)
                .round()
                .clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Adds a filled circular highlight at the frame center, radius half of
/// half the smaller dimension, weighted by the configured alpha.
pub fn glare(
    image: &RgbImage,
    level: IntensityLevel,
    config: &FaultConfig,
    rng: &mut impl Rng,
) -> RgbImage {
    let alpha = (config.lookup(FaultKind::Glare, level).scalar() + rng.gen_range(-0.05..0.05)) as f32;
    let boost = alpha * 255.0;

    let (width, height) = image.dimensions();
    let center_x = i64::from(width / 2);
    let center_y = i64::from(height / 2);
    let radius = i64::from((width / 2).min(height / 2) / 2);
    let radius_sq = radius * radius;

    let mut out = image.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let dx = i64::from(x) - center_x;
        let dy = i64::from(y) - center_y;
        if dx * dx + dy * dy > radius_sq {
            continue;
        }
        for channel in pixel.0.iter_mut() {
            *channel = (f32::from(*channel) + boost).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn blur_rejects_kernels_larger_than_the_image() {
        let image = RgbImage::from_pixel(8, 8, Rgb([100, 100, 100]));
        let config = FaultConfig::default();
        // The extreme kernel (13) cannot fit an 8x8 frame.
        let err = blur(&image, IntensityLevel::Extreme, &config).unwrap_err();
        assert!(matches!(err, TransformError::KernelExceedsImage { kernel: 13, .. }));
    }

    #[test]
    fn glare_brightens_the_center_and_leaves_corners_alone() {
        let image = RgbImage::from_pixel(100, 100, Rgb([50, 50, 50]));
        let config = FaultConfig::default();
        let mut rng = StdRng::seed_from_u64(11);
        let out = glare(&image, IntensityLevel::Medium, &config, &mut rng);
        assert!(out.get_pixel(50, 50).0[0] > 50);
        assert_eq!(out.get_pixel(0, 0).0[0], 50);
    }
}
