//! Markdown textbook parser: a textbook tree in, a [`ParsedCorpus`] out.
//!
//! Files are visited in sorted path order and every identifier is a hash of
//! the record's position, so parsing the same tree twice yields identical
//! corpora.

mod parser;

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path};

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use coursegraph_shared::{
    Chapter, CourseGraphError, KnowledgePoint, ParsedCorpus, Relation, RelationKind, Result,
    Textbook,
};

use crate::parser::{TextbookDoc, parse_textbook, title_from_stem};

/// Subject used when neither front matter nor directory layout names one.
pub const DEFAULT_SUBJECT: &str = "general";

/// Parses every textbook file under a root.
#[derive(Debug, Clone)]
pub struct TextbookParser {
    extension: String,
}

impl Default for TextbookParser {
    fn default() -> Self {
        Self {
            extension: "md".to_string(),
        }
    }
}

impl TextbookParser {
    /// Parser for files with the given extension (without the dot).
    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    /// Parse all textbooks under `root`.
    ///
    /// Fails if `root` is missing or not a directory, if any textbook cannot
    /// be read as UTF-8, or if there are no textbook files at all.
    #[instrument(skip(self), fields(root = %root.display()))]
    pub fn parse_all(&self, root: &Path) -> Result<ParsedCorpus> {
        let meta = std::fs::metadata(root).map_err(|e| CourseGraphError::io(root, e))?;
        if !meta.is_dir() {
            return Err(CourseGraphError::validation(format!(
                "textbook root {} is not a directory",
                root.display()
            )));
        }

        let files = self.discover(root)?;
        if files.is_empty() {
            return Err(CourseGraphError::validation(format!(
                "no textbook files (*.{}) found under {}",
                self.extension,
                root.display()
            )));
        }

        let mut corpus = ParsedCorpus {
            root: root.to_path_buf(),
            ..Default::default()
        };

        for (rel_path, path) in &files {
            let bytes = std::fs::read(path).map_err(|e| CourseGraphError::io(path, e))?;
            let content = String::from_utf8(bytes)
                .map_err(|_| CourseGraphError::Encoding { path: path.clone() })?;

            let doc = parse_textbook(&content);
            debug!(
                path = %rel_path,
                chapters = doc.chapters.len(),
                "parsed textbook"
            );
            append_textbook(&mut corpus, rel_path, &content, doc);
        }

        info!(stats = %corpus.stats(), "textbooks parsed");
        Ok(corpus)
    }

    /// Textbook files under `root` as `(relative /-path, absolute path)`, sorted.
    fn discover(&self, root: &Path) -> Result<Vec<(String, std::path::PathBuf)>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                CourseGraphError::io(path, std::io::Error::from(e))
            })?;

            let path = entry.path();
            let matches = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(self.extension.as_str()));
            if !entry.file_type().is_file() || !matches {
                continue;
            }

            let rel = path.strip_prefix(root).unwrap_or(path);
            files.push((to_slash_path(rel), path.to_path_buf()));
        }

        Ok(files)
    }
}

/// Convenience wrapper using the default `.md` parser.
pub fn parse_all(root: &Path) -> Result<ParsedCorpus> {
    TextbookParser::default().parse_all(root)
}

// ---------------------------------------------------------------------------
// Corpus assembly
// ---------------------------------------------------------------------------

/// Convert one parsed file into records and append them to the corpus.
fn append_textbook(corpus: &mut ParsedCorpus, rel_path: &str, content: &str, doc: TextbookDoc) {
    let textbook_id = format!("tb-{}", short_hash(&["textbook", rel_path]));
    let stem = rel_path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.').map(|(s, _)| s))
        .unwrap_or(rel_path);

    let subject = doc
        .subject
        .clone()
        .or_else(|| {
            rel_path
                .split_once('/')
                .map(|(dir, _)| dir.to_string())
        })
        .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());

    corpus.textbooks.push(Textbook {
        id: textbook_id.clone(),
        title: doc.title.clone().unwrap_or_else(|| title_from_stem(stem)),
        subject,
        summary: doc.summary.clone(),
        source_path: rel_path.to_string(),
        content_hash: full_hash(content),
    });

    // Title → id within this textbook, for [[...]] resolution.
    let mut by_title: HashMap<String, String> = HashMap::new();
    let mut pending_refs: Vec<(String, Vec<String>)> = Vec::new();

    // An implicit chapter is always first and takes ordinal 0.
    let first_ordinal = match doc.chapters.first() {
        Some(c) if c.implicit => 0,
        _ => 1,
    };

    for (ci, chapter) in doc.chapters.into_iter().enumerate() {
        let ordinal = ci as u32 + first_ordinal;
        let chapter_id = format!("ch-{}", short_hash(&[&textbook_id, "chapter", &ci.to_string()]));

        corpus.chapters.push(Chapter {
            id: chapter_id.clone(),
            textbook_id: textbook_id.clone(),
            ordinal,
            title: chapter.title,
            summary: chapter.summary,
        });
        corpus.relations.push(Relation {
            from: textbook_id.clone(),
            to: chapter_id.clone(),
            kind: RelationKind::Contains,
        });

        for (pi, point) in chapter.points.into_iter().enumerate() {
            let point_id = format!("kp-{}", short_hash(&[&chapter_id, "point", &pi.to_string()]));

            by_title
                .entry(normalize_title(&point.title))
                .or_insert_with(|| point_id.clone());
            if !point.references.is_empty() {
                pending_refs.push((point_id.clone(), point.references));
            }

            corpus.points.push(KnowledgePoint {
                id: point_id.clone(),
                chapter_id: chapter_id.clone(),
                textbook_id: textbook_id.clone(),
                ordinal: pi as u32 + 1,
                title: point.title,
                body: point.body,
                keywords: point.keywords,
            });
            corpus.relations.push(Relation {
                from: chapter_id.clone(),
                to: point_id,
                kind: RelationKind::Contains,
            });
        }
    }

    let mut seen = HashSet::new();
    for (from, references) in pending_refs {
        for reference in references {
            match by_title.get(&normalize_title(&reference)) {
                Some(to) if *to != from => {
                    if seen.insert((from.clone(), to.clone())) {
                        corpus.relations.push(Relation {
                            from: from.clone(),
                            to: to.clone(),
                            kind: RelationKind::References,
                        });
                    }
                }
                Some(_) => {}
                None => {
                    warn!(
                        textbook = %rel_path,
                        reference = %reference,
                        "unresolved cross reference"
                    );
                }
            }
        }
    }
}

fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

fn to_slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// First 16 hex chars of SHA-256 over the NUL-joined parts.
fn short_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0u8]);
        }
        hasher.update(part.as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

fn full_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
