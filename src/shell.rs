//! `Shell`, the per-process owner of the executable index and the cwd, and
//! the per-line `tokenize → parse → execute` drive (§2's data flow).
//!
//! Grounded on the source's `Shell` struct (`shell.rs`), which owns process
//! state plus a persistent subprocess and exposes a `ShellError` composed
//! via `#[from]` from its sub-module errors; here `Shell` owns the
//! executable index handle instead of a bash subprocess, and `ShellError`
//! wraps `LexError`/`ParseError` the same way.

use crate::exec_index::ExecutableIndexHandle;
use crate::executor;
use crate::lexer::{self, LexError};
use crate::parser::{self, ParseError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// One shell session. Lives for the whole process; the executable index is
/// built once on a background worker at construction time (§4.2) and never
/// rebuilt (§3's Lifecycles: "callers accept a possibly stale view").
pub struct Shell {
    index: Arc<ExecutableIndexHandle>,
    pub last_status: i32,
}

impl Shell {
    pub fn new() -> Self {
        Shell {
            index: Arc::new(ExecutableIndexHandle::spawn()),
            last_status: 0,
        }
    }

    /// A shared handle to the executable index, for collaborators (the
    /// REPL's tab-completion helper) that need to query it without owning
    /// the `Shell` itself.
    pub fn executable_index(&self) -> Arc<ExecutableIndexHandle> {
        Arc::clone(&self.index)
    }

    /// Runs one prompt iteration's worth of input: tokenize, parse, execute.
    /// A lex or parse failure aborts only the current line (§7); the caller
    /// prints the diagnostic and re-prompts.
    pub fn run_line(&mut self, line: &str) -> Result<(), ShellError> {
        let tokens = lexer::tokenize(line)?;
        let commands = parser::parse(tokens)?;
        if commands.is_empty() {
            return Ok(());
        }
        self.last_status = executor::execute(&commands, &self.index);
        Ok(())
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_is_a_no_op() {
        let mut shell = Shell::new();
        assert!(shell.run_line("").is_ok());
        assert!(shell.run_line("   ").is_ok());
    }

    #[test]
    fn syntax_error_is_reported_not_panicked() {
        let mut shell = Shell::new();
        assert!(shell.run_line("echo 'unterminated").is_err());
    }
}
