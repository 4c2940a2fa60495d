//! Property tests for the transform library.
//!
//! These verify the contracts every fault must honor:
//! - output shape always matches input shape
//! - density-bounded faults modify roughly density * pixel-count pixels
//! - deterministic faults hit their exact definition (blackout at full
//!   strength zeroes the frame)
//! - a seeded random source reproduces byte-identical output

use image::{Rgb, RgbImage};
use rand::SeedableRng;
use rand::rngs::StdRng;

use fault_forge::pipeline::{FaultConfig, FaultKind, IntensityLevel};

fn uniform_frame(width: u32, height: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([value, value, value]))
}

fn changed_pixels(before: &RgbImage, after: &RgbImage) -> usize {
    before
        .pixels()
        .zip(after.pixels())
        .filter(|(a, b)| a != b)
        .count()
}

#[test]
fn every_fault_preserves_shape_at_every_level() {
    let config = FaultConfig::default();
    let frame = uniform_frame(64, 48, 128);

    for fault in FaultKind::ALL {
        for level in IntensityLevel::ALL {
            let mut rng = StdRng::seed_from_u64(99);
            let outcome = fault
                .apply(&frame, level, &config, &mut rng)
                .unwrap_or_else(|err| panic!("{} at {}: {err}", fault.identifier(), level.label()));
            assert_eq!(
                outcome.image().dimensions(),
                frame.dimensions(),
                "{} at {} changed the frame shape",
                fault.identifier(),
                level.label()
            );
        }
    }
}

#[test]
fn salt_pepper_noise_respects_its_density_bound() {
    let config = FaultConfig::default();
    let frame = uniform_frame(100, 100, 128);
    let mut rng = StdRng::seed_from_u64(7);

    // Medium density is 0.008: two draw sets of 40 each, sampled with
    // replacement, so at most 80 distinct pixels change.
    let outcome = FaultKind::SaltPepperNoise
        .apply(&frame, IntensityLevel::Medium, &config, &mut rng)
        .unwrap();
    let changed = changed_pixels(&frame, outcome.image());
    assert!(changed <= 80, "changed {changed} pixels, expected at most 80");
    assert!(changed >= 70, "changed {changed} pixels, expected close to 80");
}

#[test]
fn dead_and_hot_pixels_respect_their_density_bound() {
    let config = FaultConfig::default();
    let frame = uniform_frame(100, 100, 128);

    // Medium density is 0.001: ten draws over ten thousand pixels.
    for (fault, value) in [(FaultKind::DeadPixels, 0u8), (FaultKind::HotPixels, 255u8)] {
        let mut rng = StdRng::seed_from_u64(13);
        let outcome = fault
            .apply(&frame, IntensityLevel::Medium, &config, &mut rng)
            .unwrap();
        let changed = changed_pixels(&frame, outcome.image());
        assert!(changed <= 10, "{}: changed {changed}", fault.identifier());
        assert!(changed >= 9, "{}: changed {changed}", fault.identifier());
        let stuck = outcome
            .image()
            .pixels()
            .filter(|p| p.0 == [value, value, value])
            .count();
        assert_eq!(stuck, changed);
    }
}

#[test]
fn blackout_at_full_strength_zeroes_the_frame() {
    let config = FaultConfig::default();
    let frame = uniform_frame(32, 32, 128);
    let mut rng = StdRng::seed_from_u64(1);

    // The extreme strength is 1.0.
    let outcome = FaultKind::Blackout
        .apply(&frame, IntensityLevel::Extreme, &config, &mut rng)
        .unwrap();
    assert!(outcome.image().pixels().all(|p| p.0 == [0, 0, 0]));
}

#[test]
fn line_dropout_zeroes_the_requested_number_of_bands() {
    let config = FaultConfig::default();
    let frame = uniform_frame(100, 100, 255);
    let mut rng = StdRng::seed_from_u64(21);

    // The medium parameter is 10 bands of 2 pixels each.
    let outcome = FaultKind::LineDropout
        .apply(&frame, IntensityLevel::Medium, &config, &mut rng)
        .unwrap();
    let out = outcome.image();

    let zero_rows = (0..100)
        .filter(|&y| (0..100).all(|x| out.get_pixel(x, y).0 == [0, 0, 0]))
        .count();
    let zero_cols = (0..100)
        .filter(|&x| (0..100).all(|y| out.get_pixel(x, y).0 == [0, 0, 0]))
        .count();
    assert!(
        zero_rows + zero_cols >= 10,
        "only {zero_rows} zero rows and {zero_cols} zero columns"
    );
}

#[test]
fn frame_drop_scales_every_component() {
    let config = FaultConfig::default();
    let frame = uniform_frame(16, 16, 200);
    let mut rng = StdRng::seed_from_u64(1);

    // The extreme visibility factor is 0.1.
    let outcome = FaultKind::FrameDrop
        .apply(&frame, IntensityLevel::Extreme, &config, &mut rng)
        .unwrap();
    assert!(outcome.image().pixels().all(|p| p.0 == [20, 20, 20]));
}

#[test]
fn seeded_stochastic_faults_are_byte_reproducible() {
    let config = FaultConfig::default();
    let frame = uniform_frame(64, 64, 100);

    for fault in [
        FaultKind::Flicker,
        FaultKind::SaltPepperNoise,
        FaultKind::SpatialJitter,
        FaultKind::RandomPatchNoise,
        FaultKind::Warping,
    ] {
        let mut first_rng = StdRng::seed_from_u64(424242);
        let mut second_rng = StdRng::seed_from_u64(424242);
        let first = fault
            .apply(&frame, IntensityLevel::Medium, &config, &mut first_rng)
            .unwrap();
        let second = fault
            .apply(&frame, IntensityLevel::Medium, &config, &mut second_rng)
            .unwrap();
        assert_eq!(
            first.image().as_raw(),
            second.image().as_raw(),
            "{} is not reproducible under a fixed seed",
            fault.identifier()
        );
    }
}

#[test]
fn transforms_never_mutate_their_input() {
    let config = FaultConfig::default();
    let frame = uniform_frame(64, 48, 128);
    let reference = frame.clone();

    for fault in FaultKind::ALL {
        let mut rng = StdRng::seed_from_u64(5);
        let _ = fault.apply(&frame, IntensityLevel::Extreme, &config, &mut rng);
        assert_eq!(
            frame.as_raw(),
            reference.as_raw(),
            "{} mutated the caller's frame",
            fault.identifier()
        );
    }
}
