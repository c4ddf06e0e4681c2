//! Interactive selection between ambiguous matches

use anyhow::Result;
use std::io::{self, BufRead, Write};

/// Presents labels and returns the one picked, or `None` when cancelled
pub trait Chooser {
    fn choose(&mut self, prompt: &str, labels: &[String]) -> Result<Option<String>>;
}

/// Numbered menu on stderr, answer read from stdin
///
/// Reads a single line; anything that is not a listed number cancels.
pub struct TerminalChooser<R = io::StdinLock<'static>, W = io::Stderr> {
    input: R,
    output: W,
}

impl TerminalChooser {
    pub fn new() -> Self {
        Self {
            input: io::stdin().lock(),
            output: io::stderr(),
        }
    }
}

impl Default for TerminalChooser {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: BufRead, W: Write> TerminalChooser<R, W> {
    pub fn with_io(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Chooser for TerminalChooser<R, W> {
    fn choose(&mut self, prompt: &str, labels: &[String]) -> Result<Option<String>> {
        writeln!(self.output, "{}", prompt)?;
        for (i, label) in labels.iter().enumerate() {
            writeln!(self.output, "  {}) {}", i + 1, label)?;
        }
        write!(self.output, "Choice [1-{}, empty to cancel]: ", labels.len())?;
        self.output.flush()?;

        let mut input = String::new();
        self.input.read_line(&mut input)?;

        let choice = input
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| labels.get(i))
            .cloned();
        Ok(choice)
    }
}
