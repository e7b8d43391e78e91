//! Ingestion orchestration for CourseGraph.
//!
//! - [`pipeline`]: the three-stage `ingest` run and its outcomes
//! - [`adapters`]: the parser / graph / index contracts the pipeline drives
//! - [`backends`]: those contracts wired to the Markdown parser and libSQL
//! - [`console`]: the operator transcript
//! - [`confirm`]: the clear-before-load prompt

pub mod adapters;
pub mod backends;
pub mod confirm;
pub mod console;
pub mod pipeline;

pub use adapters::{BackendProvider, CorpusParser, GraphLoader, IndexLoader, SampleHit};
pub use backends::{SmokeTestedIndex, StorageBackends};
pub use confirm::{Confirm, FixedAnswer, PromptConfirm, is_affirmative};
pub use console::Console;
pub use pipeline::{
    PipelineOutcome, PipelineReporter, SilentReporter, Stage, StageOutcome, StageState,
    run_ingest,
};
