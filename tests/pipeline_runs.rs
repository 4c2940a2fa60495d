//! End-to-end tests for the batch engines: unit counting, progress and log
//! contracts, cancellation cutoffs, output naming, artifact writing, and
//! agreement between the sequential and concurrent paths under a fixed
//! seed.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use image::{Rgb, RgbImage};

use fault_forge::core_modules::metadata::{self, UnitStatus};
use fault_forge::error::GenerationError;
use fault_forge::parallel_pipeline::ParallelPipeline;
use fault_forge::pipeline::{
    FaultConfig, GenerationPipeline, GenerationRequest, IntensityLevel, OutputMode, RunCallbacks,
    RunStatus,
};

struct Fixture {
    input_dir: PathBuf,
    output_dir: PathBuf,
}

impl Fixture {
    /// Builds an input directory holding `image_count` small PNGs and an
    /// empty slot for outputs, unique per test.
    fn new(tag: &str, image_count: u32) -> Fixture {
        let root = std::env::temp_dir().join(format!("fault_forge_{}_{}", tag, std::process::id()));
        let input_dir = root.join("input");
        let output_dir = root.join("output");
        fs::remove_dir_all(&root).ok();
        fs::create_dir_all(&input_dir).unwrap();
        for index in 0..image_count {
            let frame = RgbImage::from_pixel(64, 48, Rgb([100 + index as u8, 100, 100]));
            frame.save(input_dir.join(format!("frame{index:02}.png"))).unwrap();
        }
        Fixture { input_dir, output_dir }
    }

    fn request(&self, levels: Vec<IntensityLevel>, faults: &[&str]) -> GenerationRequest {
        GenerationRequest {
            input_dir: self.input_dir.clone(),
            output_dir: self.output_dir.clone(),
            levels,
            selected_faults: faults.iter().map(|id| id.to_string()).collect(),
            mode: OutputMode::Materialize,
            resize: false,
            seed: Some(7),
        }
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        if let Some(root) = self.input_dir.parent() {
            fs::remove_dir_all(root).ok();
        }
    }
}

fn recording_callbacks() -> (RunCallbacks, Arc<Mutex<Vec<(usize, usize)>>>, Arc<Mutex<Vec<String>>>) {
    let progress = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::new(Mutex::new(Vec::new()));
    let progress_sink = Arc::clone(&progress);
    let log_sink = Arc::clone(&log);
    let callbacks = RunCallbacks {
        progress: Some(Box::new(move |completed, total| {
            progress_sink.lock().unwrap().push((completed, total));
        })),
        log: Some(Box::new(move |message| {
            log_sink.lock().unwrap().push(message.to_string());
        })),
    };
    (callbacks, progress, log)
}

#[test]
fn sequential_run_covers_the_full_cartesian_product() {
    let fixture = Fixture::new("seq_full", 2);
    let request = fixture.request(
        vec![IntensityLevel::Low, IntensityLevel::Medium],
        &["flicker", "blur", "dead_pixels"],
    );
    let (callbacks, progress, log) = recording_callbacks();

    let pipeline = GenerationPipeline::new(FaultConfig::default());
    let output = pipeline.run(&request, &callbacks).unwrap();

    assert_eq!(output.status, RunStatus::Completed);
    // 2 images x 2 levels x 3 faults.
    let progress = progress.lock().unwrap();
    assert_eq!(progress.len(), 12);
    assert_eq!(*progress.last().unwrap(), (12, 12));
    assert!(progress.windows(2).all(|w| w[0].0 <= w[1].0));

    // One record per (image, level), one log line each, in source order.
    assert_eq!(output.summary.len(), 4);
    assert_eq!(log.lock().unwrap().len(), 4);
    assert_eq!(output.summary[0].base_name, "frame00");
    assert_eq!(output.summary[0].level, IntensityLevel::Low);

    // Units attach in canonical category order and every file exists under
    // the compatibility naming scheme.
    for record in &output.summary {
        let names: Vec<&str> = record.faults.iter().map(|f| f.fault.as_str()).collect();
        assert_eq!(names, vec!["flicker", "blur", "dead_pixels"]);
        for fault in &record.faults {
            assert!(fixture.output_dir.join(&fault.filename).exists());
        }
    }
    assert!(output
        .summary
        .iter()
        .flat_map(|r| &r.faults)
        .all(|f| f.status == UnitStatus::Applied));

    // The provenance artifacts flatten the same data.
    metadata::write_summary_json(&fixture.output_dir, &output.summary).unwrap();
    metadata::write_summary_csv(&fixture.output_dir, &output.summary).unwrap();
    let csv = fs::read_to_string(fixture.output_dir.join(metadata::CSV_SUMMARY_FILE)).unwrap();
    assert_eq!(csv.lines().count(), 1 + 12);
}

#[test]
fn unknown_fault_fails_fast_with_zero_output_files() {
    let fixture = Fixture::new("seq_unknown", 1);
    let request = fixture.request(vec![IntensityLevel::Low], &["blur", "lens_flare"]);
    let (callbacks, progress, _) = recording_callbacks();

    let pipeline = GenerationPipeline::new(FaultConfig::default());
    let err = pipeline.run(&request, &callbacks).unwrap_err();

    assert!(matches!(err, GenerationError::UnknownFault(name) if name == "lens_flare"));
    assert!(progress.lock().unwrap().is_empty());
    assert!(!fixture.output_dir.exists());
}

#[test]
fn cancellation_before_the_first_image_yields_an_empty_summary() {
    let fixture = Fixture::new("seq_cancel_early", 2);
    let request = fixture.request(vec![IntensityLevel::Low], &["blur"]);
    let (callbacks, progress, _) = recording_callbacks();

    let pipeline = GenerationPipeline::new(FaultConfig::default());
    pipeline.cancel_flag().cancel();
    let output = pipeline.run(&request, &callbacks).unwrap();

    assert_eq!(output.status, RunStatus::Cancelled);
    assert!(output.summary.is_empty());
    assert!(progress.lock().unwrap().is_empty());
}

#[test]
fn mid_run_cancellation_keeps_only_fully_completed_images() {
    let fixture = Fixture::new("seq_cancel_mid", 3);
    let request = fixture.request(vec![IntensityLevel::Low], &["flicker", "blur"]);

    let pipeline = GenerationPipeline::new(FaultConfig::default());
    let cancel = pipeline.cancel_flag();
    let callbacks = RunCallbacks {
        // Request cancellation once the first image's two units finish.
        progress: Some(Box::new(move |completed, _| {
            if completed == 2 {
                cancel.cancel();
            }
        })),
        log: None,
    };
    let output = pipeline.run(&request, &callbacks).unwrap();

    assert_eq!(output.status, RunStatus::Cancelled);
    assert_eq!(output.summary.len(), 1);
    assert_eq!(output.summary[0].base_name, "frame00");
    assert_eq!(output.summary[0].faults.len(), 2);
}

#[test]
fn in_memory_mode_buffers_instead_of_writing() {
    let fixture = Fixture::new("seq_memory", 1);
    let mut request = fixture.request(vec![IntensityLevel::Low], &["blur", "fog"]);
    request.mode = OutputMode::InMemory;

    let pipeline = GenerationPipeline::new(FaultConfig::default());
    let output = pipeline.run(&request, &RunCallbacks::default()).unwrap();

    assert_eq!(output.buffered.len(), 2);
    assert_eq!(output.buffered[0].filename, "frame00_blur_Environmental_low.jpg");
    let written: Vec<_> = fs::read_dir(&fixture.output_dir).unwrap().collect();
    assert!(written.is_empty());
}

#[test]
fn stub_faults_are_tagged_in_the_summary() {
    let fixture = Fixture::new("seq_stub", 1);
    let mut request = fixture.request(vec![IntensityLevel::Low], &["raindrop", "blur"]);
    request.mode = OutputMode::InMemory;

    let pipeline = GenerationPipeline::new(FaultConfig::default());
    let output = pipeline.run(&request, &RunCallbacks::default()).unwrap();

    let record = &output.summary[0];
    // Canonical category order puts blur first.
    assert_eq!(record.faults[0].fault, "blur");
    assert_eq!(record.faults[0].status, UnitStatus::Applied);
    assert_eq!(record.faults[1].fault, "raindrop");
    assert_eq!(record.faults[1].status, UnitStatus::Stub);
}

#[test]
fn structural_transform_failures_do_not_abort_the_batch() {
    let fixture = Fixture::new("seq_failure", 1);
    // The extreme blur kernel (13) cannot fit the 8x8 frame written here.
    fs::remove_dir_all(&fixture.input_dir).unwrap();
    fs::create_dir_all(&fixture.input_dir).unwrap();
    RgbImage::from_pixel(8, 8, Rgb([90, 90, 90]))
        .save(fixture.input_dir.join("tiny.png"))
        .unwrap();

    let mut request = fixture.request(vec![IntensityLevel::Extreme], &["blur", "fog"]);
    request.mode = OutputMode::InMemory;

    let pipeline = GenerationPipeline::new(FaultConfig::default());
    let output = pipeline.run(&request, &RunCallbacks::default()).unwrap();

    assert_eq!(output.status, RunStatus::Completed);
    let record = &output.summary[0];
    assert_eq!(record.faults[0].fault, "blur");
    assert_eq!(record.faults[0].status, UnitStatus::Failed);
    assert!(record.faults[0].reason.as_deref().unwrap().contains("kernel"));
    assert_eq!(record.faults[1].status, UnitStatus::Applied);
    // Only the fog output was buffered.
    assert_eq!(output.buffered.len(), 1);
}

#[test]
fn unreadable_images_are_skipped_and_logged() {
    let fixture = Fixture::new("seq_unreadable", 1);
    fs::write(fixture.input_dir.join("broken.jpg"), b"not an image").unwrap();

    let request = fixture.request(vec![IntensityLevel::Low], &["blur"]);
    let (callbacks, progress, log) = recording_callbacks();

    let pipeline = GenerationPipeline::new(FaultConfig::default());
    let output = pipeline.run(&request, &callbacks).unwrap();

    assert_eq!(output.status, RunStatus::Completed);
    // Only the readable frame is recorded; the final progress total shrank
    // to match what could actually run.
    assert_eq!(output.summary.len(), 1);
    assert_eq!(output.summary[0].base_name, "frame00");
    assert_eq!(*progress.lock().unwrap().last().unwrap(), (1, 1));
    assert!(log.lock().unwrap().iter().any(|m| m.contains("broken.jpg")));
}

#[tokio::test]
async fn parallel_run_matches_the_unit_count_invariant() {
    let fixture = Fixture::new("par_full", 2);
    let request = fixture.request(
        vec![IntensityLevel::Low],
        &["flicker", "blur", "hot_pixels", "warping"],
    );
    let (callbacks, progress, _) = recording_callbacks();

    let pipeline = ParallelPipeline::with_workers(FaultConfig::default(), 3);
    let output = pipeline.run(&request, &callbacks).await.unwrap();

    assert_eq!(output.status, RunStatus::Completed);
    assert_eq!(*progress.lock().unwrap().last().unwrap(), (8, 8));
    assert_eq!(output.summary.len(), 2);
    for record in &output.summary {
        // Attach order is selection order even under concurrency.
        let names: Vec<&str> = record.faults.iter().map(|f| f.fault.as_str()).collect();
        assert_eq!(names, vec!["flicker", "blur", "hot_pixels", "warping"]);
        for fault in &record.faults {
            assert!(fixture.output_dir.join(&fault.filename).exists());
        }
    }
}

#[tokio::test]
async fn parallel_cancellation_before_start_yields_an_empty_summary() {
    let fixture = Fixture::new("par_cancel", 2);
    let request = fixture.request(vec![IntensityLevel::Low], &["blur"]);

    let pipeline = ParallelPipeline::with_workers(FaultConfig::default(), 2);
    pipeline.cancel_flag().cancel();
    let output = pipeline.run(&request, &RunCallbacks::default()).await.unwrap();

    assert_eq!(output.status, RunStatus::Cancelled);
    assert!(output.summary.is_empty());
}

#[tokio::test]
async fn sequential_and_parallel_agree_under_a_fixed_seed() {
    let fixture = Fixture::new("par_agree", 1);
    let mut request = fixture.request(
        vec![IntensityLevel::Medium],
        &["flicker", "salt_pepper_noise", "spatial_jitter"],
    );
    request.mode = OutputMode::InMemory;

    let sequential = GenerationPipeline::new(FaultConfig::default())
        .run(&request, &RunCallbacks::default())
        .unwrap();
    let parallel = ParallelPipeline::with_workers(FaultConfig::default(), 2)
        .run(&request, &RunCallbacks::default())
        .await
        .unwrap();

    assert_eq!(sequential.buffered.len(), parallel.buffered.len());
    for (a, b) in sequential.buffered.iter().zip(parallel.buffered.iter()) {
        assert_eq!(a.filename, b.filename);
        assert_eq!(a.image.as_raw(), b.image.as_raw());
    }
}
