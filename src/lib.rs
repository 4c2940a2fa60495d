// THEORY:
// This file is the main entry point for the `fault_forge` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the
// public API that will be exposed to external consumers (like a GUI front
// end or a dataset build script).
//
// The primary goal is to export the two batch engines
// (`GenerationPipeline`, `ParallelPipeline`) and their associated data
// structures (`GenerationRequest`, `RunOutput`, the fault taxonomy, the
// intensity configuration) as the clean, high-level interface for the
// whole fault-injection engine. The internal modules (`core_modules`) stay
// encapsulated behind them.

pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;
