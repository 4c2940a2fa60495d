// THEORY:
// The error taxonomy splits along one line: errors that must stop a run
// before or during execution, and conditions the engine absorbs so a batch
// keeps going. Only the former live here. Config-load failures fall back to
// built-in defaults, unreadable images are logged and skipped, and a
// transform that fails for a structural reason is recorded in the summary
// as a failed unit. None of those ever surface as a `GenerationError`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions for a generation run. Raised before any unit of work
/// starts (selection problems) or as soon as an output write fails.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// A selected fault identifier has no registered transform.
    #[error("fault '{0}' is not implemented")]
    UnknownFault(String),

    /// The run was requested with an empty level selection.
    #[error("no intensity levels selected")]
    NoLevels,

    /// The run was requested with an empty fault selection.
    #[error("no faults selected")]
    NoFaults,

    /// The input directory could not be enumerated.
    #[error("failed to list input images in {path}: {source}")]
    InputList {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Output directory creation or a file/artifact write failed.
    #[error("failed to write output at {path}: {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The worker pool's task channel closed while units were pending.
    #[error("worker pool is no longer accepting work")]
    PoolClosed,
}
