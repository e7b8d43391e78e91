//! The old→new label table.

use std::collections::HashSet;
use std::sync::LazyLock;

use coursegraph_shared::{CourseGraphError, Result};

/// Legacy `mfx_` labels of the study app and their `gfz_` replacements.
pub const DEFAULT_LABELS: &[(&str, &str)] = &[
    ("mfx_Student", "gfz_Student"),
    ("mfx_Textbook", "gfz_Textbook"),
    ("mfx_Chapter", "gfz_Chapter"),
    ("mfx_KnowledgePoint", "gfz_KnowledgePoint"),
    ("mfx_Ability", "gfz_Ability"),
    ("mfx_Concept", "gfz_Concept"),
    ("mfx_Formula", "gfz_Formula"),
    ("mfx_Theory", "gfz_Theory"),
    ("mfx_Case", "gfz_Case"),
    ("mfx_Event", "gfz_Event"),
    ("mfx_Person", "gfz_Person"),
    ("mfx_Dynasty", "gfz_Dynasty"),
];

static DEFAULT_MAPPING: LazyLock<LabelMapping> = LazyLock::new(|| {
    LabelMapping::new(DEFAULT_LABELS.iter().copied()).expect("built-in label table is valid")
});

/// The built-in mapping, validated once on first use.
pub fn default_mapping() -> &'static LabelMapping {
    &DEFAULT_MAPPING
}

/// An ordered, validated mapping from old label to new label.
///
/// Guarantees that make substitution order irrelevant and reruns no-ops:
/// keys are unique and non-empty, no key is a prefix of another key, no
/// value starts with any key, and nothing spans a line break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMapping {
    entries: Vec<(String, String)>,
}

impl LabelMapping {
    /// Build a mapping, rejecting tables that break the invariants above.
    pub fn new<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let mut seen = HashSet::new();
        for (old, new) in &entries {
            if old.is_empty() || new.is_empty() {
                return Err(CourseGraphError::validation(format!(
                    "empty label in mapping entry '{old}' -> '{new}'"
                )));
            }
            if old.contains(['\n', '\r']) || new.contains(['\n', '\r']) {
                return Err(CourseGraphError::validation(format!(
                    "label '{}' spans a line break",
                    old.escape_debug()
                )));
            }
            if !seen.insert(old.as_str()) {
                return Err(CourseGraphError::validation(format!(
                    "duplicate label '{old}' in mapping"
                )));
            }
        }

        for (old, _) in &entries {
            for (other, other_new) in &entries {
                if old != other && other.starts_with(old.as_str()) {
                    return Err(CourseGraphError::validation(format!(
                        "label '{old}' is a prefix of '{other}'"
                    )));
                }
                if other_new.starts_with(old.as_str()) {
                    return Err(CourseGraphError::validation(format!(
                        "replacement '{other_new}' starts with label '{old}'"
                    )));
                }
            }
        }

        Ok(Self { entries })
    }

    /// Iterate `(old, new)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(o, n)| (o.as_str(), n.as_str()))
    }

    /// Replacement for `old`, if mapped.
    pub fn get(&self, old: &str) -> Option<&str> {
        self.iter().find(|(o, _)| *o == old).map(|(_, n)| n)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `true` if any key occurs anywhere in `text`, in any context.
    pub fn mentions_any(&self, text: &str) -> bool {
        self.iter().any(|(old, _)| text.contains(old))
    }
}
