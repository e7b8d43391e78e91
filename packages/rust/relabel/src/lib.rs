//! Bulk graph-label rewriting across a source tree.
//!
//! The rewriter replaces legacy node labels with their new names, but only in
//! the three places a label can appear inside an embedded graph query:
//! after `:`, after `(`, and between backticks. Prose mentioning a label is
//! left alone.
//!
//! - [`LabelMapping`]: the validated old→new table ([`default_mapping`] is the built-in one)
//! - [`substitute`]: the pure text transformation
//! - [`Rewriter`]: the file-tree walk with per-file outcome reporting

mod mapping;
mod rewriter;
mod substitute;

pub use mapping::{DEFAULT_LABELS, LabelMapping, default_mapping};
pub use rewriter::{
    FileFailure, FileRecord, RewriteReport, RewriteReporter, Rewriter, SilentRewrite, rewrite,
    rewrite_default,
};
pub use substitute::{Context, Substitution, substitute};
