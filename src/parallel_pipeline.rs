// THEORY:
// The `parallel_pipeline` module fans the fault applications of a single
// (image, level) group out across a long-lived bounded worker pool. The
// front end runs the whole thing on a background task so its own thread
// stays responsive; the pool bounds how many CPU-bound transforms run at
// once.
//
// Key architectural principles:
// 1.  **Bounded Workers, Round-Robin Dispatch**: a fixed set of worker
//     tasks each own a receive channel; a dispatcher task distributes
//     units across them in rotation.
// 2.  **Stable Attach Order**: units are submitted in selection order and
//     their results are collected in submission order, so the provenance
//     record is deterministic even when completions interleave.
// 3.  **Per-Unit Cancellation**: every worker checks the cancellation
//     token before starting a unit, not merely between images. A unit that
//     was already in flight finishes; pending units in the same group are
//     skipped, and a group containing a skipped unit is discarded rather
//     than partially recorded.
// 4.  **Per-Unit Deadline**: each unit's result is awaited under a
//     timeout. The pixel-displacement transforms scale with image area,
//     and a unit that blows the deadline is recorded as failed instead of
//     stalling the run.

use std::fs;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use image::RgbImage;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::{info, warn};

use crate::core_modules::frame_io;
use crate::core_modules::intensity::{FaultConfig, IntensityLevel};
use crate::core_modules::metadata::{FaultResult, GenerationRecord, GenerationSummary, UnitStatus};
use crate::core_modules::registry::FaultKind;
use crate::error::GenerationError;
use crate::pipeline::{
    output_filename, resolve_selection, unit_rng, BufferedFrame, CancelFlag, GenerationRequest,
    OutputMode, RunCallbacks, RunOutput, RunStatus,
};

const DEFAULT_UNIT_DEADLINE: Duration = Duration::from_secs(30);

/// One queued fault application.
struct FaultTask {
    frame: Arc<RgbImage>,
    fault: FaultKind,
    level: IntensityLevel,
    rng: StdRng,
    result_sender: oneshot::Sender<UnitOutput>,
}

/// What a worker hands back for one unit.
enum UnitOutput {
    Rendered { image: RgbImage, stub: bool },
    Failed(String),
    Skipped,
}

struct WorkerPool {
    task_sender: mpsc::UnboundedSender<FaultTask>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    fn new(config: Arc<FaultConfig>, cancel: CancelFlag, worker_count: usize) -> Self {
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<FaultTask>();

        // Create a single dispatcher that distributes tasks to workers
        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<FaultTask>())
            .unzip();

        // Spawn dispatcher
        tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                let _ = worker_senders[worker_idx].send(task);
                worker_idx = (worker_idx + 1) % worker_count;
            }
        });

        // Spawn workers
        let mut workers = Vec::new();
        for mut worker_receiver in worker_receivers {
            let worker_config = Arc::clone(&config);
            let worker_cancel = cancel.clone();

            let worker = tokio::spawn(async move {
                while let Some(task) = worker_receiver.recv().await {
                    // Token checked before every unit; an in-flight unit is
                    // always allowed to finish.
                    if worker_cancel.is_cancelled() {
                        let _ = task.result_sender.send(UnitOutput::Skipped);
                        continue;
                    }

                    let FaultTask {
                        frame,
                        fault,
                        level,
                        mut rng,
                        result_sender,
                    } = task;

                    let output = match fault.apply(&frame, level, &worker_config, &mut rng) {
                        Ok(outcome) => {
                            let stub = outcome.is_stub();
                            UnitOutput::Rendered {
                                image: outcome.into_image(),
                                stub,
                            }
                        }
                        Err(err) => UnitOutput::Failed(err.to_string()),
                    };
                    let _ = result_sender.send(output);
                }
            });

            workers.push(worker);
        }

        Self {
            task_sender,
            workers,
        }
    }
}

/// The concurrent batch engine. Owns a worker pool for the lifetime of the
/// instance; the configuration is shared read-only with every worker.
pub struct ParallelPipeline {
    pool: WorkerPool,
    config: Arc<FaultConfig>,
    cancel: CancelFlag,
    unit_deadline: Duration,
}

impl ParallelPipeline {
    pub fn new(config: FaultConfig) -> Self {
        Self::with_workers(config, num_cpus::get().max(1))
    }

    pub fn with_workers(config: FaultConfig, worker_count: usize) -> Self {
        let config = Arc::new(config);
        let cancel = CancelFlag::new();
        let pool = WorkerPool::new(Arc::clone(&config), cancel.clone(), worker_count.max(1));
        ParallelPipeline {
            pool,
            config,
            cancel,
            unit_deadline: DEFAULT_UNIT_DEADLINE,
        }
    }

    /// Bounds the wall-clock cost of a single fault application.
    pub fn with_unit_deadline(mut self, deadline: Duration) -> Self {
        self.unit_deadline = deadline;
        self
    }

    /// The handle a front end uses to request cancellation mid-run.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub async fn run(
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

        'images: for (image_index, path) in images.iter().enumerate() {
            if self.cancel.is_cancelled() {
                status = RunStatus::Cancelled;
                break;
            }

            let frame = match frame_io::load_rgb(path) {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable image");
                    callbacks.emit_log(&format!("Skipped unreadable image: {}", path.display()));
                    total -= units_per_image;
                    continue;
                }
            };
            let frame = if request.resize {
                image::imageops::resize(
                    &frame,
                    self.config.resize_width,
                    self.config.resize_height,
                    image::imageops::FilterType::Triangle,
                )
            } else {
                frame
            };
            let frame = Arc::new(frame);
            let base_name = frame_io::base_name(path);

            for (level_index, &level) in request.levels.iter().enumerate() {
                // Submit the whole group, then collect in submission order.
                let mut pending = Vec::with_capacity(plan.len());
                for (unit_index, &fault) in plan.iter().enumerate() {
                    let (result_sender, result_receiver) = oneshot::channel();
                    let task = FaultTask {
                        frame: Arc::clone(&frame),
                        fault,
                        level,
                        rng: unit_rng(request.seed, image_index, level_index, unit_index),
                        result_sender,
                    };
                    self.pool
                        .task_sender
                        .send(task)
                        .map_err(|_| GenerationError::PoolClosed)?;
                    pending.push((fault, result_receiver));
                }

                let deadline = self.unit_deadline;
                let waits = pending.into_iter().map(|(fault, receiver)| async move {
                    (fault, time::timeout(deadline, receiver).await)
                });
                let outputs = futures::future::join_all(waits).await;

                let mut group_cancelled = false;
                let mut group: Vec<(FaultResult, Option<RgbImage>)> =
                    Vec::with_capacity(plan.len());

                for (fault, awaited) in outputs {
                    let filename = output_filename(&base_name, fault, level);
                    let output = match awaited {
                        Ok(Ok(output)) => output,
                        Ok(Err(_)) => UnitOutput::Failed("worker dropped the unit".to_string()),
                        Err(_) => UnitOutput::Failed(format!(
                            "unit exceeded the {:?} deadline",
                            deadline
                        )),
                    };

                    match output {
                        UnitOutput::Rendered { image, stub } => {
                            let unit_status = if stub { UnitStatus::Stub } else { UnitStatus::Applied };
                            group.push((
                                FaultResult::new(fault, filename, unit_status, None),
                                Some(image),
                            ));
                            completed += 1;
                            callbacks.emit_progress(completed, total);
                        }
                        UnitOutput::Failed(reason) => {
                            warn!(fault = fault.identifier(), reason = %reason, "transform failed");
                            group.push((
                                FaultResult::new(fault, filename, UnitStatus::Failed, Some(reason)),
                                None,
                            ));
                            completed += 1;
                            callbacks.emit_progress(completed, total);
                        }
                        UnitOutput::Skipped => {
                            group_cancelled = true;
                        }
                    }
                }

                if group_cancelled {
                    // The group is incomplete; nothing from this image is
                    // recorded or persisted.
                    status = RunStatus::Cancelled;
                    break 'images;
                }

                let mut results = Vec::with_capacity(group.len());
                for (result, rendered) in group {
                    if let Some(rendered) = rendered {
                        match request.mode {
                            OutputMode::Materialize => {
                                let out_path = request.output_dir.join(&result.filename);
                                frame_io::save_jpeg(&out_path, &rendered).map_err(|err| {
                                    GenerationError::OutputWrite {
                                        path: out_path.clone(),
                                        source: io::Error::other(err),
                                    }
                                })?;
                            }
                            OutputMode::InMemory => buffered.push(BufferedFrame {
                                filename: result.filename.clone(),
                                image: rendered,
                            }),
                        }
                    }
                    results.push(result);
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
            workers = self.pool.workers.len(),
            "parallel run finished"
        );
        Ok(RunOutput {
            summary,
            status,
            buffered,
        })
    }
}
