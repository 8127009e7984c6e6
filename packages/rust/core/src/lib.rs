//! Normalization orchestrator: hashing, dispatch, index artifacts, and the
//! end-to-end run pipeline.

pub mod dispatcher;
pub mod hashing;
pub mod index;
pub mod pipeline;

pub use dispatcher::dispatch;
pub use hashing::digest_file;
pub use index::{IndexArtifacts, write_artifacts};
pub use pipeline::{ProgressReporter, RunConfig, RunSummary, SilentProgress, run};
