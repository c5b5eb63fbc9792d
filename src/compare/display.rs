//! Plain-text console output for comparison runs.

use crate::models::{PrefbenchError, Result};
use std::fmt::Display;
use std::io::Write;

/// Width of separator rules.
pub const SEPARATOR_WIDTH: usize = 70;

/// A rule of `ch` repeated `width` times.
pub fn separator(ch: char, width: usize) -> String {
    std::iter::repeat_n(ch, width).collect()
}

/// Line-oriented writer over any `Write` sink.
pub struct Console<W: Write> {
    out: W,
}

impl<W: Write> Console<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Write one line.
    pub fn line(&mut self, text: impl Display) -> Result<()> {
        writeln!(self.out, "{text}").map_err(|e| PrefbenchError::io("writing to console", e))
    }

    pub fn blank(&mut self) -> Result<()> {
        self.line("")
    }

    /// Write `text` without a newline and flush, for input prompts.
    pub fn prompt(&mut self, text: impl Display) -> Result<()> {
        write!(self.out, "{text}").map_err(|e| PrefbenchError::io("writing to console", e))?;
        self.out
            .flush()
            .map_err(|e| PrefbenchError::io("flushing console", e))
    }

    /// Full-width rule.
    pub fn separator(&mut self, ch: char) -> Result<()> {
        self.line(separator(ch, SEPARATOR_WIDTH))
    }

    /// Section header: two blank lines, a `=` rule, the indented title,
    /// another rule and a blank line.
    pub fn section(&mut self, title: impl Display) -> Result<()> {
        self.blank()?;
        self.blank()?;
        self.separator('=')?;
        self.line(format_args!("  {title}"))?;
        self.separator('=')?;
        self.blank()
    }

    /// Write `text` with every line indented by three spaces.
    pub fn indented(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return self.line("   ");
        }
        for line in text.lines() {
            self.line(format_args!("   {line}"))?;
        }
        Ok(())
    }
}
