// THEORY:
// Electromagnetic-interference faults: banding, channel distortion, signal
// desaturation, readout skew, and impulse noise. These are the transforms
// where stochastic placement matters most; every random draw comes from the
// caller's per-unit generator.

use image::{Rgb, RgbImage};
use rand::Rng;

use crate::core_modules::intensity::{FaultConfig, IntensityLevel};
use crate::core_modules::registry::FaultKind;

/// Draws randomly oriented stripes, each attenuated by a random factor.
/// Stripes compose sequentially on the same buffer, so a later stripe dims
/// the output of an earlier one. Attenuated values are clamped to [1, 255]
/// so a stripe never produces pure black.
pub fn flicker(
    image: &RgbImage,
    level: IntensityLevel,
    config: &FaultConfig,
    rng: &mut impl Rng,
) -> RgbImage {
    let stripes = config.lookup(FaultKind::Flicker, level).scalar().max(0.0) as u32;
    let (width, height) = image.dimensions();
    let mut out = image.clone();

    for _ in 0..stripes {
        let horizontal = rng.gen_bool(0.5);
        let alpha: f32 = rng.gen_range(0.2..0.6);
        let thickness = rng.gen_range(3u32..10);

        if horizontal {
            let start = rng.gen_range(0..height);
            let end = (start + thickness).min(height);
            for y in start..end {
                for x in 0..width {
                    attenuate(out.get_pixel_mut(x, y), alpha);
                }
            }
        } else {
            let start = rng.gen_range(0..width);
            let end = (start + thickness).min(width);
            for x in start..end {
                for y in 0..height {
                    attenuate(out.get_pixel_mut(x, y), alpha);
                }
            }
        }
    }

    out
}

fn attenuate(pixel: &mut Rgb<u8>, alpha: f32) {
    for channel in pixel.0.iter_mut() {
        *channel = (f32::from(*channel) * alpha).clamp(1.0, 255.0) as u8;
    }
}

/// Pushes the red channel up and the blue channel down by the configured
/// magnitude plus a small jitter. Green is untouched.
pub fn color_shift(
    image: &RgbImage,
    level: IntensityLevel,
    config: &FaultConfig,
    rng: &mut impl Rng,
) -> RgbImage {
    let (red_base, blue_base) = config.lookup(FaultKind::ColorShift, level).pair();
    let red_shift = red_base as i16 + rng.gen_range(-5i16..5);
    let blue_shift = -(blue_base as i16) + rng.gen_range(-5i16..5);

    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel.0[0] = (i16::from(pixel.0[0]) + red_shift).clamp(0, 255) as u8;
        pixel.0[2] = (i16::from(pixel.0[2]) + blue_shift).clamp(0, 255) as u8;
    }
    out
}

/// Blends the image with its BT.601 grayscale replica.
pub fn desaturation(
    image: &RgbImage,
    level: IntensityLevel,
    config: &FaultConfig,
    rng: &mut impl Rng,
) -> RgbImage {
    let alpha =
        (config.lookup(FaultKind::Desaturation, level).scalar() + rng.gen_range(-0.05..0.05)) as f32;
    let keep = 1.0 - alpha;

    let (width, height) = image.dimensions();
    let mut out = RgbImage::new(width, height);
    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let gray = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
        let blended = pixel.0.map(|c| {
            (keep * f32::from(c) + alpha * gray).round().clamp(0.0, 255.0) as u8
        });
        out.put_pixel(x, y, Rgb(blended));
    }
    out
}

/// Shifts each row horizontally on a sinusoidal schedule over the row index
/// (one full period across the image height) plus per-row jitter. Vacated
/// columns stay black; nothing wraps.
pub fn rolling_shutter_skew(
    image: &RgbImage,
    level: IntensityLevel,
    config: &FaultConfig,
    rng: &mut impl Rng,
) -> RgbImage {
    let max_shift = config.lookup(FaultKind::RollingShutterSkew, level).scalar();
    let (width, height) = image.dimensions();
    let mut out = RgbImage::new(width, height);

    for y in 0..height {
        let phase = f64::from(y) / f64::from(height) * std::f64::consts::TAU;
        let jitter = f64::from(rng.gen_range(-2i32..3));
        let shift = ((phase.sin() + 1.0) / 2.0 * max_shift + jitter) as i64;

        if shift >= 0 {
            let shift = (shift as u32).min(width);
            for x in shift..width {
                out.put_pixel(x, y, *image.get_pixel(x - shift, y));
            }
        } else {
            let shift = ((-shift) as u32).min(width);
            for x in 0..width - shift {
                out.put_pixel(x, y, *image.get_pixel(x + shift, y));
            }
        }
    }

    out
}

/// Sets random pixels to pure white and pure black, half the density each,
/// sampled with replacement. Density is an area fraction, not an exact
/// count.
pub fn salt_pepper_noise(
    image: &RgbImage,
    level: IntensityLevel,
    config: &FaultConfig,
    rng: &mut impl Rng,
) -> RgbImage {
    let density = config.lookup(FaultKind::SaltPepperNoise, level).scalar().max(0.0);
    let (width, height) = image.dimensions();
    let pixels = f64::from(width) * f64::from(height);
    let draws = (density * pixels * 0.5) as u64;

    let mut out = image.clone();
    for _ in 0..draws {
        let x = rng.gen_range(0..width);
        let y = rng.gen_range(0..height);
        out.put_pixel(x, y, Rgb([255, 255, 255]));
    }
    for _ in 0..draws {
        let x = rng.gen_range(0..width);
        let y = rng.gen_range(0..height);
        out.put_pixel(x, y, Rgb([0, 0, 0]));
    }
    out
}
