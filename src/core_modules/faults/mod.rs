// THEORY:
// The `faults` module is the transform library: one pure function per
// registered fault, grouped into a file per simulated cause, dispatched
// exhaustively through `FaultKind::apply`.
//
// Key architectural principles:
// 1.  **Pure Transforms**: every transform borrows its input immutably and
//     allocates its own output of identical dimensions. Concurrent
//     applications against the same source frame can never race on shared
//     pixel data.
// 2.  **Private Randomness**: the stochastic parameters of a call come from
//     a random source owned by that call. The caller constructs a fresh
//     `StdRng` per unit, which makes a seeded run byte-reproducible and
//     removes any cross-task contention on a global generator.
// 3.  **Honest Outcomes**: faults that are not implemented yet return a
//     tagged `Stub` carrying an annotated copy of the input, never silently
//     wrong pixel data. Structural failures (a kernel or patch that cannot
//     fit the image) are typed errors the orchestrator records per unit.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use rand::Rng;
use thiserror::Error;

use crate::core_modules::intensity::{FaultConfig, IntensityLevel};
use crate::core_modules::registry::FaultKind;

pub mod ai_relevant;
pub mod emi;
pub mod environmental;
pub mod hardware;

/// Structural reasons a transform can refuse an image. Recoverable per
/// unit; the batch keeps going.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("image has no pixels")]
    EmptyImage,

    #[error("blur kernel {kernel} exceeds image dimensions {width}x{height}")]
    KernelExceedsImage { kernel: u32, width: u32, height: u32 },

    #[error("noise patch {patch_width}x{patch_height} does not fit image {width}x{height}")]
    PatchExceedsImage {
        patch_width: u32,
        patch_height: u32,
        width: u32,
        height: u32,
    },

    #[error("image too small to warp")]
    ImageTooSmallToWarp,

    #[error("randomized affine matrix is degenerate")]
    DegenerateWarp,
}

/// The result of one fault application.
#[derive(Debug, Clone)]
pub enum FaultOutcome {
    /// The transform ran and produced degraded pixel data.
    Applied(RgbImage),
    /// The fault is registered but not implemented; the image is an
    /// annotated copy of the input so consumers can filter it out.
    Stub(RgbImage),
}

impl FaultOutcome {
    pub fn is_stub(&self) -> bool {
        matches!(self, FaultOutcome::Stub(_))
    }

    pub fn image(&self) -> &RgbImage {
        match self {
            FaultOutcome::Applied(image) | FaultOutcome::Stub(image) => image,
        }
    }

    pub fn into_image(self) -> RgbImage {
        match self {
            FaultOutcome::Applied(image) | FaultOutcome::Stub(image) => image,
        }
    }
}

impl FaultKind {
    /// Applies this fault to a frame. The input is never mutated; the
    /// output always has identical dimensions. `rng` must be private to
    /// this call.
    pub fn apply(
        self,
        image: &RgbImage,
        level: IntensityLevel,
        config: &FaultConfig,
        rng: &mut impl Rng,
    ) -> Result<FaultOutcome, TransformError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(TransformError::EmptyImage);
        }

        let rendered = match self {
            FaultKind::Flicker => emi::flicker(image, level, config, rng),
            FaultKind::ColorShift => emi::color_shift(image, level, config, rng),
            FaultKind::Desaturation => emi::desaturation(image, level, config, rng),
            FaultKind::RollingShutterSkew => emi::rolling_shutter_skew(image, level, config, rng),
            FaultKind::SaltPepperNoise => emi::salt_pepper_noise(image, level, config, rng),
            FaultKind::Blur => environmental::blur(image, level, config)?,
            FaultKind::Brightness => environmental::brightness(image, level, config, rng),
            FaultKind::Fog => environmental::fog(image, level, config, rng),
            FaultKind::Glare => environmental::glare(image, level, config, rng),
            FaultKind::Blackout => hardware::blackout(image, level, config),
            FaultKind::FrameDrop => hardware::frame_drop(image, level, config),
            FaultKind::DeadPixels => hardware::dead_pixels(image, level, config, rng),
            FaultKind::HotPixels => hardware::hot_pixels(image, level, config, rng),
            FaultKind::LineDropout => hardware::line_dropout(image, level, config, rng),
            FaultKind::SpatialJitter => ai_relevant::spatial_jitter(image, level, config, rng),
            FaultKind::RandomPatchNoise => {
                ai_relevant::random_patch_noise(image, level, config, rng)?
            }
            FaultKind::Warping => ai_relevant::warping(image, level, config, rng)?,
            FaultKind::Raindrop | FaultKind::LensDirt | FaultKind::TemporalLag => {
                return Ok(FaultOutcome::Stub(annotated_copy(image)));
            }
        };

        Ok(FaultOutcome::Applied(rendered))
    }
}

/// Builds the placeholder output for an unimplemented fault: a copy of the
/// input with a red frame, visually distinct but structurally identical.
fn annotated_copy(image: &RgbImage) -> RgbImage {
    const MARKER: Rgb<u8> = Rgb([255, 0, 0]);
    let mut copy = image.clone();
    let (width, height) = copy.dimensions();
    for inset in 0..3u32 {
        if width <= inset * 2 || height <= inset * 2 {
            break;
        }
        let rect = Rect::at(inset as i32, inset as i32).of_size(width - inset * 2, height - inset * 2);
        draw_hollow_rect_mut(&mut copy, rect, MARKER);
    }
    copy
}
