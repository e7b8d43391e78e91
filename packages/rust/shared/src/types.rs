//! Corpus record types shared by the textbook parser and both load adapters.
//!
//! Identifiers are content-derived strings produced by the parser, so the
//! same textbook tree always yields the same corpus.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One Markdown textbook file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Textbook {
    /// Deterministic identifier.
    pub id: String,
    /// Display title (H1, front matter, or file stem).
    pub title: String,
    /// Subject area, e.g. `polymer-physics`.
    pub subject: String,
    /// Blockquote summary under the title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Path relative to the textbook root, `/`-separated.
    pub source_path: String,
    /// SHA-256 of the file content.
    pub content_hash: String,
}

/// A `##` section of a textbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub textbook_id: String,
    /// 1-based position within the textbook (0 for the implicit chapter).
    pub ordinal: u32,
    pub title: String,
    /// Prose between the chapter heading and its first knowledge point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// A `###` section: the smallest unit of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgePoint {
    pub id: String,
    pub chapter_id: String,
    pub textbook_id: String,
    /// 1-based position within the chapter.
    pub ordinal: u32,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

/// Edge kinds between records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationKind {
    /// Textbook → chapter, chapter → knowledge point.
    Contains,
    /// Knowledge point → knowledge point, from a `[[Title]]` link.
    References,
}

impl RelationKind {
    /// Relationship type name as stored in the graph.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "CONTAINS",
            Self::References => "REFERENCES",
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed edge between two record ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub from: String,
    pub to: String,
    pub kind: RelationKind,
}

// ---------------------------------------------------------------------------
// ParsedCorpus
// ---------------------------------------------------------------------------

/// Everything the parser extracted from one textbook root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCorpus {
    /// The textbook root that was parsed.
    pub root: PathBuf,
    pub textbooks: Vec<Textbook>,
    pub chapters: Vec<Chapter>,
    pub points: Vec<KnowledgePoint>,
    pub relations: Vec<Relation>,
}

/// Record counts, for transcripts and logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorpusStats {
    pub textbooks: usize,
    pub chapters: usize,
    pub points: usize,
    pub relations: usize,
}

impl ParsedCorpus {
    /// Count the records in each collection.
    pub fn stats(&self) -> CorpusStats {
        CorpusStats {
            textbooks: self.textbooks.len(),
            chapters: self.chapters.len(),
            points: self.points.len(),
            relations: self.relations.len(),
        }
    }

    /// `true` when no textbook was parsed.
    pub fn is_empty(&self) -> bool {
        self.textbooks.is_empty()
    }

    /// Look up the textbook a chapter or point belongs to.
    pub fn textbook(&self, id: &str) -> Option<&Textbook> {
        self.textbooks.iter().find(|t| t.id == id)
    }
}

impl std::fmt::Display for CorpusStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} textbooks, {} chapters, {} knowledge points, {} relations",
            self.textbooks, self.chapters, self.points, self.relations
        )
    }
}
