// THEORY:
// The `pipeline` module is the top-level API for batch generation. It
// drives the full image x level x fault cartesian product to completion or
// cancellation, reporting progress as it goes and assembling the
// provenance summary that the metadata writers persist.
//
// Key architectural principles:
// 1.  **Fail Fast**: the whole fault selection is resolved through the
//     registry before any image is touched. An unknown identifier aborts
//     the run with zero output files.
// 2.  **Per-Image Cutoff**: cancellation is checked at image boundaries.
//     Images that completed stay in the summary; the current image is
//     never partially recorded.
// 3.  **Absorb What Can Be Absorbed**: an unreadable input is logged and
//     skipped, a transform that refuses an image is recorded as a failed
//     unit, and a broken config file was already replaced by defaults
//     upstream. Only output-write failures and selection problems abort.
// 4.  **Reproducible Streams**: each unit gets a random source derived
//     from an optional base seed and the unit's coordinates, so a seeded
//     run reproduces its pixel output exactly while an unseeded run draws
//     from entropy.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;
use image::RgbImage;
use image::imageops::FilterType;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::core_modules::frame_io;
use crate::error::GenerationError;

// Re-export key data structures for the public API.
pub use crate::core_modules::faults::{FaultOutcome, TransformError};
pub use crate::core_modules::intensity::{FaultConfig, FaultParam, IntensityLevel, LevelRow};
pub use crate::core_modules::metadata::{
    FaultResult, GenerationRecord, GenerationSummary, UnitStatus,
};
pub use crate::core_modules::registry::{FaultCategory, FaultKind};

/// Whether outputs are written to the output directory or kept in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Materialize,
    InMemory,
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
}

/// A run request: where to read, what to apply, where to write.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Levels in selection order.
    pub levels: Vec<IntensityLevel>,
    /// Fault identifiers; resolved against the registry before any work.
    pub selected_faults: Vec<String>,
    pub mode: OutputMode,
    /// Resize each input to the configured dimensions before transforming.
    pub resize: bool,
    /// Base seed for reproducible runs. `None` draws from entropy.
    pub seed: Option<u64>,
}

pub type ProgressFn = dyn Fn(usize, usize) + Send + Sync;
pub type LogFn = dyn Fn(&str) + Send + Sync;

/// Optional observer hooks. `progress` fires at least once per completed
/// unit with (completed, total); `log` fires once per completed
/// (image, level) group and once per skipped unreadable image.
#[derive(Default)]
pub struct RunCallbacks {
    pub progress: Option<Box<ProgressFn>>,
    pub log: Option<Box<LogFn>>,
}

impl RunCallbacks {
    pub(crate) fn emit_progress(&self, completed: usize, total: usize) {
        if let Some(hook) = &self.progress {
            hook(completed, total);
        }
    }

    pub(crate) fn emit_log(&self, message: &str) {
        if let Some(hook) = &self.log {
            hook(message);
        }
    }
}

/// Cooperative cancellation handle shared between the caller and a run.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An output kept in memory instead of written to disk.
#[derive(Debug, Clone)]
pub struct BufferedFrame {
    pub filename: String,
    pub image: RgbImage,
}

/// Everything a run hands back: the provenance summary, the terminal
/// status, and any in-memory outputs.
#[derive(Debug)]
pub struct RunOutput {
    pub summary: GenerationSummary,
    pub status: RunStatus,
    pub buffered: Vec<BufferedFrame>,
}

/// The sequential batch engine. One instance holds the configuration for
/// the runs it drives; the configuration is read-only while a run is in
/// flight.
pub struct GenerationPipeline {
    config: FaultConfig,
    cancel: CancelFlag,
}

impl GenerationPipeline {
    pub fn new(config: FaultConfig) -> Self {
        GenerationPipeline {
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// The handle a front end uses to request cancellation mid-run.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn run(
        &self,
        request: &GenerationRequest,
        callbacks: &RunCallbacks,
    ) -> Result<RunOutput, GenerationError> {
        let plan = resolve_selection(&request.selected_faults)?;
        if request.levels.is_empty() {
            return Err(GenerationError::NoLevels);
        }

        let images = frame_io::list_images(&request.input_dir).map_err(|source| {
            GenerationError::InputList {
                path: request.input_dir.clone(),
                source,
            }
        })?;

        fs::create_dir_all(&request.output_dir).map_err(|source| GenerationError::OutputWrite {
            path: request.output_dir.clone(),
            source,
        })?;

        let units_per_image = request.levels.len() * plan.len();
        let mut total = images.len() * units_per_image;
        let mut completed = 0usize;
        let mut summary = GenerationSummary::new();
        let mut buffered = Vec::new();
        let mut status = RunStatus::Completed;

        for (image_index, path) in images.iter().enumerate() {
            if self.cancel.is_cancelled() {
                status = RunStatus::Cancelled;
                break;
            }

            let frame = match frame_io::load_rgb(path) {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable image");
                    callbacks.emit_log(&format!("Skipped unreadable image: {}", path.display()));
                    // The skipped units leave the run, so later progress
                    // reports stay consistent with what can still finish.
                    total -= units_per_image;
                    continue;
                }
            };
            let frame = self.prepare_frame(frame, request);
            let base_name = frame_io::base_name(path);

            for (level_index, &level) in request.levels.iter().enumerate() {
                let mut results = Vec::with_capacity(plan.len());

                for (unit_index, &fault) in plan.iter().enumerate() {
                    let mut rng = unit_rng(request.seed, image_index, level_index, unit_index);
                    let filename = output_filename(&base_name, fault, level);

                    let result = match fault.apply(&frame, level, &self.config, &mut rng) {
                        Ok(outcome) => {
                            let unit_status = if outcome.is_stub() {
                                UnitStatus::Stub
                            } else {
                                UnitStatus::Applied
                            };
                            self.persist_unit(
                                outcome.into_image(),
                                &filename,
                                request,
                                &mut buffered,
                            )?;
                            FaultResult::new(fault, filename, unit_status, None)
                        }
                        Err(err) => {
                            warn!(fault = fault.identifier(), error = %err, "transform failed");
                            FaultResult::new(
                                fault,
                                filename,
                                UnitStatus::Failed,
                                Some(err.to_string()),
                            )
                        }
                    };
                    results.push(result);

                    completed += 1;
                    callbacks.emit_progress(completed, total);
                }

                callbacks.emit_log(&format!(
                    "Processed: {} - {} ({} faults)",
                    base_name,
                    level.label(),
                    results.len()
                ));
                summary.push(GenerationRecord {
                    base_name: base_name.clone(),
                    level,
                    timestamp: Local::now().to_rfc3339(),
                    faults: results,
                });
            }
        }

        info!(
            records = summary.len(),
            cancelled = (status == RunStatus::Cancelled),
            "run finished"
        );
        Ok(RunOutput {
            summary,
            status,
            buffered,
        })
    }

    fn prepare_frame(&self, frame: RgbImage, request: &GenerationRequest) -> RgbImage {
        if request.resize {
            image::imageops::resize(
                &frame,
                self.config.resize_width,
                self.config.resize_height,
                FilterType::Triangle,
            )
        } else {
            frame
        }
    }

    fn persist_unit(
        &self,
        rendered: RgbImage,
        filename: &str,
        request: &GenerationRequest,
        buffered: &mut Vec<BufferedFrame>,
    ) -> Result<(), GenerationError> {
        match request.mode {
            OutputMode::Materialize => {
                let out_path = request.output_dir.join(filename);
                frame_io::save_jpeg(&out_path, &rendered).map_err(|err| {
                    GenerationError::OutputWrite {
                        path: out_path.clone(),
                        source: io::Error::other(err),
                    }
                })
            }
            OutputMode::InMemory => {
                buffered.push(BufferedFrame {
                    filename: filename.to_string(),
                    image: rendered,
                });
                Ok(())
            }
        }
    }
}

/// Resolves and orders a fault selection: canonical category order first,
/// selection order within a category, duplicates dropped. Fails on the
/// first unknown identifier.
pub(crate) fn resolve_selection(identifiers: &[String]) -> Result<Vec<FaultKind>, GenerationError> {
    if identifiers.is_empty() {
        return Err(GenerationError::NoFaults);
    }
    let mut selected = Vec::with_capacity(identifiers.len());
    for identifier in identifiers {
        selected.push(FaultKind::resolve(identifier)?);
    }

    let mut plan = Vec::with_capacity(selected.len());
    for category in FaultCategory::ALL {
        for &fault in &selected {
            if fault.category() == category && !plan.contains(&fault) {
                plan.push(fault);
            }
        }
    }
    Ok(plan)
}

/// Derives a unit's random source. With a base seed the stream is a pure
/// function of the unit's coordinates (splitmix finalizer); without one it
/// comes from entropy.
pub(crate) fn unit_rng(
    seed: Option<u64>,
    image_index: usize,
    level_index: usize,
    unit_index: usize,
) -> StdRng {
    match seed {
        Some(base) => {
            let mut z = base
                ^ ((image_index as u64) << 40)
                ^ ((level_index as u64) << 20)
                ^ unit_index as u64;
            z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
            z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
            StdRng::seed_from_u64(z ^ (z >> 31))
        }
        None => StdRng::from_entropy(),
    }
}

/// The output naming scheme downstream consumers depend on.
pub(crate) fn output_filename(base_name: &str, fault: FaultKind, level: IntensityLevel) -> String {
    format!(
        "{}_{}_{}_{}.jpg",
        base_name,
        fault.identifier(),
        fault.category().label(),
        level.label()
    )
}
