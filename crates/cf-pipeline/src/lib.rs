//! # cf-pipeline
//!
//! The constrained transcoding pipeline.
//!
//! - **[`build_filters`]** -- ordered `fps`/`scale`/`setsar` chain per kind.
//! - **[`apply_loop_safety`]** -- duration, width and frame-rate clamps for
//!   loops.
//! - **[`TranscodeExecutor`]** -- audio, video and two-pass palette encodes.
//! - **[`ConvergenceLoop`]** -- shrink and re-encode until the size fits.
//! - **[`JobPipeline`]** -- fetch, converge and guaranteed source cleanup.

pub mod converge;
pub mod filters;
pub mod job;
pub mod safety;
pub mod transcode;

pub use converge::{shrink, CandidateGuard, ConvergenceLoop, MIN_DIMENSION};
pub use filters::{build_filters, Filter, FilterChain};
pub use job::{JobPipeline, SourceGuard};
pub use safety::apply_loop_safety;
pub use transcode::{TranscodeAttempt, TranscodeExecutor, Trim};
