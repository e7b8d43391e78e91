//! Operator transcript for `ingest`: banners, stage markers, checklists.

use std::io::Write;
use std::sync::Mutex;

use crate::pipeline::{PipelineOutcome, PipelineReporter, Stage, StageOutcome};

/// Width of banners and separators.
pub const RULE_WIDTH: usize = 70;

/// Writes the pipeline transcript to `W` (stdout in the CLI, a buffer in tests).
pub struct Console<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> Console<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Give back the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, lines: &[String]) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        let written = lines
            .iter()
            .try_for_each(|line| writeln!(out, "{line}"))
            .and_then(|()| out.flush());
        if let Err(e) = written {
            tracing::warn!(error = %e, "could not write to console");
        }
    }
}

pub fn banner() -> String {
    "=".repeat(RULE_WIDTH)
}

pub fn separator() -> String {
    "-".repeat(RULE_WIDTH)
}

/// `✓ summary`, `✗ cause` plus checklist, or `✗ skipped: reason`.
fn outcome_lines(outcome: &StageOutcome) -> Vec<String> {
    match outcome {
        StageOutcome::Succeeded { summary } => vec![format!("✓ {summary}")],
        StageOutcome::Failed { cause, hints } => {
            let mut lines = vec![format!("✗ {cause}"), "  Checklist:".to_string()];
            lines.extend(hints.iter().map(|hint| format!("    - {hint}")));
            lines
        }
        StageOutcome::Skipped { reason } => vec![format!("✗ skipped: {reason}")],
    }
}

fn marker(outcome: &StageOutcome) -> &'static str {
    if outcome.is_success() { "✓" } else { "✗" }
}

impl<W: Write + Send> PipelineReporter for Console<W> {
    fn stage_started(&self, stage: Stage) {
        self.emit(&[
            banner(),
            format!("[{}/3] {}", stage.number(), stage.title()),
            banner(),
        ]);
    }

    fn progress(&self, _stage: Stage, message: &str) {
        self.emit(&[format!("  {message}")]);
    }

    fn stage_finished(&self, stage: Stage, outcome: &StageOutcome) {
        // Skipped stages never printed a banner of their own.
        let mut lines = match outcome {
            StageOutcome::Skipped { .. } => {
                vec![format!("[{}/3] {}", stage.number(), stage.title())]
            }
            _ => Vec::new(),
        };
        lines.extend(outcome_lines(outcome));
        lines.push(separator());
        self.emit(&lines);
    }

    fn finished(&self, outcome: &PipelineOutcome) {
        let summary = Stage::ALL
            .iter()
            .map(|s| format!("{} {}", marker(outcome.outcome(*s)), s))
            .collect::<Vec<_>>()
            .join("  ");
        self.emit(&[
            banner(),
            format!("Pipeline finished in {:.1}s", outcome.elapsed.as_secs_f64()),
            banner(),
            summary,
        ]);
    }
}
