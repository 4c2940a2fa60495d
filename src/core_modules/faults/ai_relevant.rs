// THEORY:
// AI-relevant faults: perturbations chosen for their effect on downstream
// models rather than for physical realism. `spatial_jitter` resamples every
// output pixel independently and is the most expensive transform in the
// library; its cost scales with image area.

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp, Interpolation, Projection};
use rand::Rng;

use super::TransformError;
use crate::core_modules::intensity::{FaultConfig, IntensityLevel};
use crate::core_modules::registry::FaultKind;

/// For every output pixel, samples a displaced source coordinate within a
/// +/- jitter window (independently per axis), clamped to the image bounds.
pub fn spatial_jitter(
    image: &RgbImage,
    level: IntensityLevel,
    config: &FaultConfig,
    rng: &mut impl Rng,
) -> RgbImage {
    let jitter = config.lookup(FaultKind::SpatialJitter, level).scalar().max(0.0) as i32;
    let (width, height) = image.dimensions();
    let max_x = width as i32 - 1;
    let max_y = height as i32 - 1;

    let mut out = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let src_y = (y as i32 + rng.gen_range(-jitter..=jitter)).clamp(0, max_y) as u32;
            let src_x = (x as i32 + rng.gen_range(-jitter..=jitter)).clamp(0, max_x) as u32;
            out.put_pixel(x, y, *image.get_pixel(src_x, src_y));
        }
    }
    out
}

/// Overwrites N random rectangular patches (each dimension in [10, 30))
/// with uniformly random pixel values. Patches must fit entirely within
/// the image.
pub fn random_patch_noise(
    image: &RgbImage,
    level: IntensityLevel,
    config: &FaultConfig,
    rng: &mut impl Rng,
) -> Result<RgbImage, TransformError> {
    let count = config.lookup(FaultKind::RandomPatchNoise, level).scalar().max(0.0) as u32;
    let (width, height) = image.dimensions();
    let mut out = image.clone();

    for _ in 0..count {
        let patch_height = rng.gen_range(10u32..30);
        let patch_width = rng.gen_range(10u32..30);
        if patch_height >= height || patch_width >= width {
            return Err(TransformError::PatchExceedsImage {
                patch_width,
                patch_height,
                width,
                height,
            });
        }
        let top = rng.gen_range(0..height - patch_height);
        let left = rng.gen_range(0..width - patch_width);
        for y in top..top + patch_height {
            for x in left..left + patch_width {
                let noise = Rgb([
                    rng.gen_range(0..=255u8),
                    rng.gen_range(0..=255u8),
                    rng.gen_range(0..=255u8),
                ]);
                out.put_pixel(x, y, noise);
            }
        }
    }

    Ok(out)
}

/// Resamples the image through a randomly perturbed 3-point affine
/// transform: the corners (0,0), (w-1,0), (0,h-1) are each displaced by up
/// to the configured factor. Exposed regions fill black.
pub fn warping(
    image: &RgbImage,
    level: IntensityLevel,
    config: &FaultConfig,
    rng: &mut impl Rng,
) -> Result<RgbImage, TransformError> {
    let factor = config.lookup(FaultKind::Warping, level).scalar().max(1.0) as u32;
    let (width, height) = image.dimensions();
    if width < 2 || height < 2 {
        return Err(TransformError::ImageTooSmallToWarp);
    }

    let w1 = (width - 1) as f32;
    let h1 = (height - 1) as f32;

    // Displaced images of the three reference corners, drawn in a fixed
    // order so a seeded run reproduces the same matrix.
    let dst_origin = (rng.gen_range(0..factor) as f32, rng.gen_range(0..factor) as f32);
    let dst_right = (w1 - rng.gen_range(0..factor) as f32, rng.gen_range(0..factor) as f32);
    let dst_down = (rng.gen_range(0..factor) as f32, h1 - rng.gen_range(0..factor) as f32);

    // The reference corners form an axis-aligned triangle, so the affine
    // solve reduces to two difference quotients per row.
    let a = (dst_right.0 - dst_origin.0) / w1;
    let b = (dst_down.0 - dst_origin.0) / h1;
    let c = dst_origin.0;
    let d = (dst_right.1 - dst_origin.1) / w1;
    let e = (dst_down.1 - dst_origin.1) / h1;
    let f = dst_origin.1;

    let projection = Projection::from_matrix([a, b, c, d, e, f, 0.0, 0.0, 1.0])
        .ok_or(TransformError::DegenerateWarp)?;

    Ok(warp(image, &projection, Interpolation::Bilinear, Rgb([0, 0, 0])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn patches_refuse_images_they_cannot_fit() {
        let image = RgbImage::from_pixel(12, 12, Rgb([30, 30, 30]));
        let config = FaultConfig::default();
        let mut rng = StdRng::seed_from_u64(3);
        // Patch dimensions start at 10 and frequently exceed 12; the
        // extreme level draws enough patches to guarantee a refusal.
        let result = random_patch_noise(&image, IntensityLevel::Extreme, &config, &mut rng);
        assert!(matches!(result, Err(TransformError::PatchExceedsImage { .. })));
    }

    #[test]
    fn warping_keeps_the_canvas_size() {
        let image = RgbImage::from_pixel(64, 48, Rgb([120, 120, 120]));
        let config = FaultConfig::default();
        let mut rng = StdRng::seed_from_u64(4);
        let out = warping(&image, IntensityLevel::Extreme, &config, &mut rng).unwrap();
        assert_eq!(out.dimensions(), (64, 48));
    }
}
