//! File-tree rewriting with per-file outcome reporting.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use coursegraph_shared::{CourseGraphError, RelabelConfig, Result};

use crate::mapping::{LabelMapping, default_mapping};
use crate::substitute::{Substitution, substitute};

// ---------------------------------------------------------------------------
// FileRecord
// ---------------------------------------------------------------------------

/// One candidate file, from open to write-back.
#[derive(Debug)]
pub struct FileRecord {
    path: PathBuf,
    original: Vec<u8>,
    rewritten: Option<String>,
}

impl FileRecord {
    /// Read the whole file into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let original = std::fs::read(path).map_err(|e| CourseGraphError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            original,
            rewritten: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` once [`apply`](Self::apply) produced different bytes.
    pub fn is_modified(&self) -> bool {
        self.rewritten.is_some()
    }

    /// Run `mapping` over the content.
    ///
    /// Returns `None` when no key occurs in the file at all. The record is
    /// marked modified only if a substitution fired and the bytes changed.
    pub fn apply(&mut self, mapping: &LabelMapping) -> Result<Option<Substitution>> {
        let text = std::str::from_utf8(&self.original).map_err(|_| CourseGraphError::Encoding {
            path: self.path.clone(),
        })?;

        if !mapping.mentions_any(text) {
            return Ok(None);
        }

        let result = substitute(text, mapping);
        if result.triggered() && result.content.as_bytes() != self.original.as_slice() {
            self.rewritten = Some(result.content.clone());
        }
        Ok(Some(result))
    }

    /// Replace the file on disk if modified. Returns whether a write happened.
    pub fn write_back(self) -> Result<bool> {
        match self.rewritten {
            Some(content) => {
                std::fs::write(&self.path, content)
                    .map_err(|e| CourseGraphError::io(&self.path, e))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// Callback for per-file outcomes while a tree is rewritten.
pub trait RewriteReporter: Send + Sync {
    /// A file was rewritten on disk.
    fn file_modified(&self, path: &Path, substitutions: usize);
    /// A file could not be read, decoded, or written.
    fn file_failed(&self, path: &Path, error: &CourseGraphError);
}

/// No-op reporter for headless/test usage.
pub struct SilentRewrite;

impl RewriteReporter for SilentRewrite {
    fn file_modified(&self, _path: &Path, _substitutions: usize) {}
    fn file_failed(&self, _path: &Path, _error: &CourseGraphError) {}
}

/// A file the rewriter gave up on.
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Summary of one rewrite run over a root.
#[derive(Debug, Clone, Default)]
pub struct RewriteReport {
    /// Candidate files opened.
    pub scanned: usize,
    /// Files rewritten on disk, in traversal order.
    pub modified: Vec<PathBuf>,
    /// Files that failed; the scan went on past each of them.
    pub failed: Vec<FileFailure>,
    /// Replacements across all modified files.
    pub substitutions: usize,
}

impl RewriteReport {
    /// Fold another root's report into this one.
    pub fn merge(&mut self, other: RewriteReport) {
        self.scanned += other.scanned;
        self.modified.extend(other.modified);
        self.failed.extend(other.failed);
        self.substitutions += other.substitutions;
    }
}

// ---------------------------------------------------------------------------
// Rewriter
// ---------------------------------------------------------------------------

/// File classification rules plus the tree walk.
#[derive(Debug, Clone)]
pub struct Rewriter {
    candidate_suffix: String,
    cache_segment: String,
}

impl Rewriter {
    pub fn new(candidate_suffix: impl Into<String>, cache_segment: impl Into<String>) -> Self {
        Self {
            candidate_suffix: candidate_suffix.into(),
            cache_segment: cache_segment.into(),
        }
    }

    /// `true` if any component of `path` is the reserved cache directory.
    pub fn is_reserved(&self, path: &Path) -> bool {
        path.components()
            .any(|c| c.as_os_str() == OsStr::new(&self.cache_segment))
    }

    /// `true` if the file name carries the candidate suffix.
    pub fn is_candidate(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(self.candidate_suffix.as_str()))
    }

    /// Rewrite every candidate file under `root`.
    ///
    /// Only an unreadable `root` is an error. Anything that goes wrong with
    /// a single file lands in [`RewriteReport::failed`] and the walk continues.
    #[instrument(skip(self, mapping, reporter), fields(root = %root.display()))]
    pub fn rewrite(
        &self,
        root: &Path,
        mapping: &LabelMapping,
        reporter: &dyn RewriteReporter,
    ) -> Result<RewriteReport> {
        std::fs::read_dir(root).map_err(|e| CourseGraphError::io(root, e))?;

        let mut report = RewriteReport::default();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !(e.file_type().is_dir() && self.is_reserved(e.path())));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    let error = CourseGraphError::io(&path, std::io::Error::from(e));
                    self.record_failure(&mut report, &path, error, reporter);
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file() || !self.is_candidate(path) {
                continue;
            }
            if self.is_reserved(path) {
                debug!(path = %path.display(), "skipping cache path");
                continue;
            }

            report.scanned += 1;
            match self.rewrite_file(path, mapping) {
                Ok(Some(count)) => {
                    reporter.file_modified(path, count);
                    report.modified.push(path.to_path_buf());
                    report.substitutions += count;
                }
                Ok(None) => {}
                Err(error) => self.record_failure(&mut report, path, error, reporter),
            }
        }

        info!(
            scanned = report.scanned,
            modified = report.modified.len(),
            failed = report.failed.len(),
            substitutions = report.substitutions,
            "rewrite complete"
        );

        Ok(report)
    }

    /// Rewrite each of `roots` (relative to `project_root`) and merge the reports.
    ///
    /// A root that does not exist is skipped with a warning; one that exists
    /// but cannot be read stops the run.
    pub fn rewrite_roots<S: AsRef<str>>(
        &self,
        project_root: &Path,
        roots: &[S],
        mapping: &LabelMapping,
        reporter: &dyn RewriteReporter,
    ) -> Result<RewriteReport> {
        let mut total = RewriteReport::default();
        for root in roots {
            let dir = project_root.join(root.as_ref());
            if !dir.exists() {
                warn!(root = %dir.display(), "rewrite root does not exist, skipping");
                continue;
            }
            total.merge(self.rewrite(&dir, mapping, reporter)?);
        }
        Ok(total)
    }

    /// Returns the substitution count if the file was rewritten.
    fn rewrite_file(&self, path: &Path, mapping: &LabelMapping) -> Result<Option<usize>> {
        let mut record = FileRecord::open(path)?;
        let Some(result) = record.apply(mapping)? else {
            return Ok(None);
        };

        for (label, context, count) in &result.hits {
            debug!(path = %path.display(), label, context = context.name(), count, "label hit");
        }

        if record.write_back()? {
            Ok(Some(result.total()))
        } else {
            Ok(None)
        }
    }

    fn record_failure(
        &self,
        report: &mut RewriteReport,
        path: &Path,
        error: CourseGraphError,
        reporter: &dyn RewriteReporter,
    ) {
        warn!(path = %path.display(), error = %error, "file skipped");
        reporter.file_failed(path, &error);
        report.failed.push(FileFailure {
            path: path.to_path_buf(),
            error: error.to_string(),
        });
    }
}

impl From<&RelabelConfig> for Rewriter {
    fn from(config: &RelabelConfig) -> Self {
        Self::new(&config.candidate_suffix, &config.cache_segment)
    }
}

impl Default for Rewriter {
    fn default() -> Self {
        Self::from(&RelabelConfig::default())
    }
}

/// Rewrite `root` with the default classification rules and no reporting.
///
/// Returns the paths that were modified.
pub fn rewrite(root: &Path, mapping: &LabelMapping) -> Result<Vec<PathBuf>> {
    Rewriter::default()
        .rewrite(root, mapping, &SilentRewrite)
        .map(|report| report.modified)
}

/// Same as [`rewrite`] with the built-in mapping.
pub fn rewrite_default(root: &Path) -> Result<Vec<PathBuf>> {
    rewrite(root, default_mapping())
}
