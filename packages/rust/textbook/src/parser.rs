//! Textbook Markdown parser.
//!
//! Layout understood by [`parse_textbook`]:
//! - Optional front matter between `---` lines (`title:`, `subject:`)
//! - `# Title`, then an optional `> summary` blockquote
//! - `## Chapter` headings
//! - `### Knowledge point` headings followed by body text
//! - `Keywords: a, b, c` inside a knowledge point
//! - `[[Other point]]` cross references inside a knowledge point body
//!
//! Headings inside fenced code blocks are body text.

use std::sync::LazyLock;

use regex::Regex;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Parsed representation of one textbook file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TextbookDoc {
    /// The H1 title, or the front-matter `title:`.
    pub title: Option<String>,
    /// Front-matter `subject:`.
    pub subject: Option<String>,
    /// Blockquote summary under the title.
    pub summary: Option<String>,
    pub chapters: Vec<ChapterDoc>,
}

/// A `##` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ChapterDoc {
    pub title: String,
    /// Created for knowledge points that precede any `##` heading.
    pub implicit: bool,
    pub summary: Option<String>,
    pub points: Vec<PointDoc>,
}

/// A `###` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PointDoc {
    pub title: String,
    pub body: String,
    pub keywords: Vec<String>,
    /// Raw `[[...]]` targets, in order of first appearance.
    pub references: Vec<String>,
}

/// Title given to the implicit chapter.
pub(crate) const IMPLICIT_CHAPTER: &str = "General";

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

static H1_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#\s+(.+)$").expect("H1 regex"));

static H2_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^##\s+(.+)$").expect("H2 regex"));

static H3_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^###\s+(.+)$").expect("H3 regex"));

static BLOCKQUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^>\s*(.*)$").expect("blockquote regex"));

/// `key: value` inside front matter.
static FRONT_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_]+)\s*:\s*(.+)$").expect("front matter regex"));

/// `Keywords: a, b` (also accepts the full-width colon).
static KEYWORDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)keywords\s*[:：]\s*(.*)$").expect("keywords regex"));

static WIKILINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\[\]]+)\]\]").expect("wikilink regex"));

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Where plain text lines currently go.
enum Target {
    /// Before the first chapter: only the summary blockquote is kept.
    Preamble,
    Chapter,
    Point,
}

/// Parse one textbook file. Never fails: unknown lines are ignored.
pub(crate) fn parse_textbook(content: &str) -> TextbookDoc {
    let mut doc = TextbookDoc::default();
    let mut lines = content.lines().peekable();

    // --- Front matter ---
    if lines.peek().is_some_and(|l| l.trim() == "---") {
        lines.next();
        for line in lines.by_ref() {
            let trimmed = line.trim();
            if trimmed == "---" {
                break;
            }
            if let Some(caps) = FRONT_KEY_RE.captures(trimmed) {
                let value = unquote(caps[2].trim()).to_string();
                match caps[1].to_ascii_lowercase().as_str() {
                    "title" => doc.title = Some(value),
                    "subject" => doc.subject = Some(value),
                    _ => {}
                }
            }
        }
    }

    let mut target = Target::Preamble;
    let mut seen_h1 = false;
    let mut in_fence = false;
    let mut summary_parts: Vec<String> = Vec::new();
    let mut text: Vec<&str> = Vec::new();

    for line in lines {
        let trimmed = line.trim();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            text.push(line);
            continue;
        }
        if in_fence {
            text.push(line);
            continue;
        }

        // Order matters: `###` also matches the looser patterns.
        if let Some(caps) = H3_RE.captures(trimmed) {
            flush(&mut doc, &target, &mut text);
            if doc.chapters.is_empty() {
                doc.chapters.push(ChapterDoc {
                    title: IMPLICIT_CHAPTER.to_string(),
                    implicit: true,
                    ..Default::default()
                });
            }
            if let Some(chapter) = doc.chapters.last_mut() {
                chapter.points.push(PointDoc {
                    title: clean_heading(&caps[1]),
                    ..Default::default()
                });
            }
            target = Target::Point;
            continue;
        }

        // A second H1 is demoted to a chapter heading.
        let chapter_heading = H2_RE
            .captures(trimmed)
            .or_else(|| if seen_h1 { H1_RE.captures(trimmed) } else { None });
        if let Some(caps) = chapter_heading {
            flush(&mut doc, &target, &mut text);
            doc.chapters.push(ChapterDoc {
                title: clean_heading(&caps[1]),
                ..Default::default()
            });
            target = Target::Chapter;
            continue;
        }

        if let Some(caps) = H1_RE.captures(trimmed) {
            seen_h1 = true;
            doc.title = Some(clean_heading(&caps[1]));
            continue;
        }

        match target {
            Target::Preamble => {
                if let Some(caps) = BLOCKQUOTE_RE.captures(trimmed) {
                    let part = caps[1].trim();
                    if !part.is_empty() {
                        summary_parts.push(part.to_string());
                    }
                }
            }
            Target::Point => {
                if let Some(caps) = KEYWORDS_RE.captures(trimmed) {
                    if let Some(point) = current_point(&mut doc) {
                        point.keywords.extend(split_keywords(&caps[1]));
                    }
                } else {
                    text.push(line);
                }
            }
            Target::Chapter => text.push(line),
        }
    }

    flush(&mut doc, &target, &mut text);

    if !summary_parts.is_empty() {
        doc.summary = Some(summary_parts.join(" "));
    }

    doc
}

/// Move buffered text lines into the record `target` points at.
fn flush(doc: &mut TextbookDoc, target: &Target, text: &mut Vec<&str>) {
    let body = join_block(text);
    text.clear();
    if body.is_empty() {
        return;
    }

    match target {
        Target::Preamble => {}
        Target::Chapter => {
            if let Some(chapter) = doc.chapters.last_mut() {
                chapter.summary = Some(body);
            }
        }
        Target::Point => {
            if let Some(point) = current_point(doc) {
                for caps in WIKILINK_RE.captures_iter(&body) {
                    let reference = caps[1].trim().to_string();
                    if !point.references.contains(&reference) {
                        point.references.push(reference);
                    }
                }
                point.body = WIKILINK_RE.replace_all(&body, "$1").into_owned();
            }
        }
    }
}

fn current_point(doc: &mut TextbookDoc) -> Option<&mut PointDoc> {
    doc.chapters.last_mut().and_then(|c| c.points.last_mut())
}

/// Join lines, dropping leading and trailing blank lines.
fn join_block(lines: &[&str]) -> String {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(s), Some(e)) => lines[s..=e]
            .iter()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// Strip trailing `#`s from closed ATX headings.
fn clean_heading(raw: &str) -> String {
    raw.trim().trim_end_matches('#').trim().to_string()
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Split on ASCII and full-width commas and semicolons.
fn split_keywords(raw: &str) -> Vec<String> {
    raw.split([',', ';', '，', '；', '、'])
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

/// Extract a human-readable title from a file stem.
pub(crate) fn title_from_stem(stem: &str) -> String {
    stem.replace(['-', '_'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(c) => {
                    let upper: String = c.to_uppercase().collect();
                    format!("{upper}{}", chars.collect::<String>())
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
