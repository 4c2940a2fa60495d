// THEORY:
// Hardware faults: sensor and readout failures. These are the simplest
// transforms in the library, mostly global scaling and point defects, and
// two of them (blackout, frame_drop) are fully deterministic given their
// configured parameter.

use image::{Rgb, RgbImage};
use rand::Rng;

use crate::core_modules::intensity::{FaultConfig, IntensityLevel};
use crate::core_modules::registry::FaultKind;

/// Scales every component by (1 - strength). Strength 1 yields an all-zero
/// frame.
pub fn blackout(image: &RgbImage, level: IntensityLevel, config: &FaultConfig) -> RgbImage {
    let strength = config.lookup(FaultKind::Blackout, level).scalar().clamp(0.0, 1.0);
    scale_components(image, (1.0 - strength) as f32)
}

/// Scales every component by the configured visibility factor.
pub fn frame_drop(image: &RgbImage, level: IntensityLevel, config: &FaultConfig) -> RgbImage {
    let visibility = config.lookup(FaultKind::FrameDrop, level).scalar().max(0.0);
    scale_components(image, visibility as f32)
}

fn scale_components(image: &RgbImage, factor: f32) -> RgbImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = (f32::from(*channel) * factor).clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Sets density * pixel-count random coordinates to pure black. Draws are
/// independent and may collide.
pub fn dead_pixels(
    image: &RgbImage,
    level: IntensityLevel,
    config: &FaultConfig,
    rng: &mut impl Rng,
) -> RgbImage {
    stuck_pixels(image, config.lookup(FaultKind::DeadPixels, level).scalar(), Rgb([0, 0, 0]), rng)
}

/// Sets density * pixel-count random coordinates to pure white. Draws are
/// independent and may collide.
pub fn hot_pixels(
    image: &RgbImage,
    level: IntensityLevel,
    config: &FaultConfig,
    rng: &mut impl Rng,
) -> RgbImage {
    stuck_pixels(
        image,
        config.lookup(FaultKind::HotPixels, level).scalar(),
        Rgb([255, 255, 255]),
        rng,
    )
}

fn stuck_pixels(image: &RgbImage, density: f64, value: Rgb<u8>, rng: &mut impl Rng) -> RgbImage {
    let (width, height) = image.dimensions();
    let count = (density.max(0.0) * f64::from(width) * f64::from(height)) as u64;
    let mut out = image.clone();
    for _ in 0..count {
        let x = rng.gen_range(0..width);
        let y = rng.gen_range(0..height);
        out.put_pixel(x, y, value);
    }
    out
}

/// Zeroes a 2-pixel band at each of N random rows or columns, coin-flipped
/// per draw. Bands near the far edge are truncated by the image bounds.
pub fn line_dropout(
    image: &RgbImage,
    level: IntensityLevel,
    config: &FaultConfig,
    rng: &mut impl Rng,
) -> RgbImage {
    const BAND: u32 = 2;
    let lines = config.lookup(FaultKind::LineDropout, level).scalar().max(0.0) as u32;
    let (width, height) = image.dimensions();
    let mut out = image.clone();

    for _ in 0..lines {
        if rng.gen_bool(0.5) {
            let row = rng.gen_range(0..height);
            for y in row..(row + BAND).min(height) {
                for x in 0..width {
                    out.put_pixel(x, y, Rgb([0, 0, 0]));
                }
            }
        } else {
            let col = rng.gen_range(0..width);
            for x in col..(col + BAND).min(width) {
                for y in 0..height {
                    out.put_pixel(x, y, Rgb([0, 0, 0]));
                }
            }
        }
    }

    out
}
