//! User interaction operations (confirmation prompts).

use anyhow::Result;
use std::io::{self, BufRead, Write};

use super::RealRuntime;

/// Ask `prompt` on `output` and read a single answer line from `input`.
pub(crate) fn confirm_with_io<R: BufRead, W: Write>(
    prompt: &str,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    write!(output, "{} [y/N] ", prompt)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

impl RealRuntime {
    pub(crate) fn confirm_impl(&self, prompt: &str) -> Result<bool> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        confirm_with_io(prompt, &mut stdin.lock(), &mut stdout)
    }
}
