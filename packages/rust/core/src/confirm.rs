//! The operator's yes/no answer before the graph is cleared.

use std::io::{BufRead, Write};

/// Asks the operator a yes/no question. `false` unless they clearly said yes.
pub trait Confirm: Send {
    fn confirm(&mut self, question: &str) -> bool;
}

/// Only `yes`, in any letter case and surrounding whitespace, is affirmative.
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("yes")
}

/// Prompts on a writer and reads one line from a reader.
pub struct PromptConfirm<R, W> {
    input: R,
    output: W,
    echo: bool,
}

impl<R: BufRead, W: Write> PromptConfirm<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            echo: false,
        }
    }

    /// Write the answer back after the prompt. Use when the input is not a
    /// terminal, so the prompt line is ended like an interactive one.
    pub fn echoing(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    fn end_prompt(&mut self, answer: &str) {
        if !self.echo {
            return;
        }
        let written =
            writeln!(self.output, "{}", answer.trim_end()).and_then(|()| self.output.flush());
        if let Err(e) = written {
            tracing::warn!(error = %e, "could not write prompt");
        }
    }
}

impl<R: BufRead + Send, W: Write + Send> Confirm for PromptConfirm<R, W> {
    fn confirm(&mut self, question: &str) -> bool {
        let prompted = write!(self.output, "{question} [yes/no] (default: no): ")
            .and_then(|()| self.output.flush());
        if let Err(e) = prompted {
            tracing::warn!(error = %e, "could not write prompt");
        }

        let mut line = String::new();
        let answer = match self.input.read_line(&mut line) {
            Ok(0) => {
                tracing::debug!("no answer (EOF), treating as no");
                false
            }
            Ok(_) => is_affirmative(&line),
            Err(e) => {
                tracing::warn!(error = %e, "could not read answer, treating as no");
                line.clear();
                false
            }
        };
        self.end_prompt(&line);
        answer
    }
}

/// A canned answer, for headless runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&mut self, _question: &str) -> bool {
        self.0
    }
}
