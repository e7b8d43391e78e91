//! Shared types, error model, and configuration for CourseGraph.
//!
//! This crate is the foundation depended on by all other CourseGraph crates.
//! It provides:
//! - [`CourseGraphError`]: the unified error type
//! - Corpus record types ([`ParsedCorpus`], [`Textbook`], [`Chapter`], [`KnowledgePoint`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, GraphConfig, IndexConfig, ProjectConfig, RelabelConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_config_path,
};
pub use error::{CourseGraphError, Result};
pub use types::{
    Chapter, CorpusStats, KnowledgePoint, ParsedCorpus, Relation, RelationKind, Textbook,
};
