//! Context-restricted literal substitution.
//!
//! A label is only rewritten where an embedded query would use it as a
//! label: `:Label`, `(Label`, or `` `Label` ``. Each context is a plain
//! literal replacement; there is deliberately no regex over word
//! boundaries, so bare mentions in comments and docs survive untouched.

use crate::mapping::LabelMapping;

/// Where a label occurrence sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    /// `:Label`, the label position in a node or relationship pattern.
    Colon,
    /// `(Label`, a node pattern without a variable.
    OpenParen,
    /// `` `Label` ``, a quoted identifier.
    Backtick,
}

impl Context {
    /// All contexts, in the order they are applied.
    pub const ALL: [Context; 3] = [Context::Colon, Context::OpenParen, Context::Backtick];

    /// Render `label` in this context.
    pub fn wrap(&self, label: &str) -> String {
        match self {
            Self::Colon => format!(":{label}"),
            Self::OpenParen => format!("({label}"),
            Self::Backtick => format!("`{label}`"),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Colon => "colon",
            Self::OpenParen => "paren",
            Self::Backtick => "backtick",
        }
    }
}

/// Outcome of running a mapping over one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    /// The rewritten text.
    pub content: String,
    /// Per-hit tally: `(old label, context, occurrences replaced)`.
    pub hits: Vec<(String, Context, usize)>,
}

impl Substitution {
    /// Total replacements across all labels and contexts.
    pub fn total(&self) -> usize {
        self.hits.iter().map(|(_, _, n)| n).sum()
    }

    /// `true` if at least one replacement was made.
    pub fn triggered(&self) -> bool {
        !self.hits.is_empty()
    }
}

/// Apply every `(old, new)` pair of `mapping` to `text`.
///
/// Labels absent from the text are skipped before any context is tried.
pub fn substitute(text: &str, mapping: &LabelMapping) -> Substitution {
    let mut content = text.to_string();
    let mut hits = Vec::new();

    for (old, new) in mapping.iter() {
        if !content.contains(old) {
            continue;
        }

        for context in Context::ALL {
            let needle = context.wrap(old);
            let count = content.matches(needle.as_str()).count();
            if count > 0 {
                content = content.replace(needle.as_str(), &context.wrap(new));
                hits.push((old.to_string(), context, count));
            }
        }
    }

    Substitution { content, hits }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> LabelMapping {
        LabelMapping::new([("mfx_Student", "gfz_Student")]).unwrap()
    }

    #[test]
    fn bare_mention_is_untouched() {
        let out = substitute("mfx_Student note", &student());
        assert_eq!(out.content, "mfx_Student note");
        assert!(!out.triggered());
    }

    #[test]
    fn colon_context() {
        assert_eq!(substitute(":mfx_Student", &student()).content, ":gfz_Student");
    }

    #[test]
    fn paren_context() {
        assert_eq!(substitute("(mfx_Student)", &student()).content, "(gfz_Student)");
    }

    #[test]
    fn backtick_context() {
        assert_eq!(substitute("`mfx_Student`", &student()).content, "`gfz_Student`");
    }

    #[test]
    fn multiple_hits_per_line_are_counted() {
        let text = "MATCH (s:mfx_Student)-[:KNOWS]->(t:mfx_Student) RETURN `mfx_Student`";
        let out = substitute(text, &student());
        assert_eq!(
            out.content,
            "MATCH (s:gfz_Student)-[:KNOWS]->(t:gfz_Student) RETURN `gfz_Student`"
        );
        assert_eq!(out.total(), 3);
        assert_eq!(
            out.hits,
            vec![
                ("mfx_Student".to_string(), Context::Colon, 2),
                ("mfx_Student".to_string(), Context::Backtick, 1),
            ]
        );
    }

    #[test]
    fn mixed_prose_and_query() {
        let text = "# mfx_Student is a legacy label\nq = \"MATCH (n:mfx_Student) RETURN n\"\n";
        let out = substitute(text, &student());
        assert_eq!(
            out.content,
            "# mfx_Student is a legacy label\nq = \"MATCH (n:gfz_Student) RETURN n\"\n"
        );
    }

    #[test]
    fn order_of_entries_does_not_matter() {
        let text = "(:mfx_Textbook)-[:HAS]->(mfx_Chapter) `mfx_Student`";
        let forward = LabelMapping::new([
            ("mfx_Textbook", "gfz_Textbook"),
            ("mfx_Chapter", "gfz_Chapter"),
            ("mfx_Student", "gfz_Student"),
        ])
        .unwrap();
        let reverse = LabelMapping::new([
            ("mfx_Student", "gfz_Student"),
            ("mfx_Chapter", "gfz_Chapter"),
            ("mfx_Textbook", "gfz_Textbook"),
        ])
        .unwrap();
        assert_eq!(
            substitute(text, &forward).content,
            substitute(text, &reverse).content
        );
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let first = substitute("MATCH (s:mfx_Student)", &student());
        let second = substitute(&first.content, &student());
        assert_eq!(second.content, first.content);
        assert!(!second.triggered());
    }
}
