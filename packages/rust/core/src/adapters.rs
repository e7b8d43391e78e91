//! Contracts between the orchestrator and its collaborators.
//!
//! The pipeline only ever talks to these traits. [`crate::backends`] wires
//! them to the Markdown parser and the libSQL stores; tests substitute
//! recording mocks.

use std::path::Path;

use async_trait::async_trait;
use coursegraph_shared::{ParsedCorpus, Result};

/// Turns a textbook tree into a corpus. Must be deterministic.
#[async_trait]
pub trait CorpusParser: Send + Sync {
    async fn parse_all(&self, root: &Path) -> Result<ParsedCorpus>;
}

/// Writes a corpus into the graph store.
#[async_trait]
pub trait GraphLoader: Send {
    /// Remove all existing graph state. Total: an empty store is fine.
    async fn clear(&mut self) -> Result<()>;

    async fn create_indexes(&mut self) -> Result<()>;

    /// Load every record. Returns a one-line summary for the transcript.
    async fn import_all(&mut self, corpus: &ParsedCorpus) -> Result<String>;

    async fn close(&mut self) -> Result<()>;
}

/// One smoke-test hit from the search index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleHit {
    pub query: String,
    pub title: String,
}

/// Writes a corpus into the full-text index.
#[async_trait]
pub trait IndexLoader: Send {
    /// Idempotent.
    async fn create_indexes(&mut self) -> Result<()>;

    /// Load every record. Returns a one-line summary for the transcript.
    async fn import_all(&mut self, corpus: &ParsedCorpus) -> Result<String>;

    /// Run a few sample queries against the loaded index.
    async fn test_search(&mut self) -> Result<Vec<SampleHit>>;

    async fn close(&mut self) -> Result<()>;
}

/// Constructs the load adapters on demand, one per stage.
#[async_trait]
pub trait BackendProvider: Send + Sync {
    async fn open_graph(&self) -> Result<Box<dyn GraphLoader>>;
    async fn open_index(&self) -> Result<Box<dyn IndexLoader>>;
}
