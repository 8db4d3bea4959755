//! REPL glue (§2): the `$ ` prompt, rustyline wiring for line editing and
//! tab completion, and the per-iteration arena reset.
//!
//! Grounded on the source's `HsabHelper` (`repl.rs`), which implements
//! rustyline's `Helper`/`Completer`/`Hinter`/`Highlighter`/`Validator` bundle
//! and completes by rescanning PATH directly on every keystroke. Here
//! completion instead walks the pre-built, pre-sorted executable index via
//! `prefix_first` — exactly the perf rationale §4.2 gives for building the
//! index on a background worker in the first place, rather than a helper
//! that does its own directory scan per call.

use crate::arena::BumpArena;
use crate::exec_index::ExecutableIndexHandle;
use crate::shell::Shell;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::sync::Arc;

const PROMPT: &str = "$ ";

/// Arena size reserved per prompt iteration (§4.1's Bump arena). The
/// tokenizer and parser never retain anything past the line they're given,
/// so this is scratch headroom rather than a tuned allocation budget.
const PROMPT_ARENA_SIZE: usize = 4096;

struct ShellHelper {
    index: Arc<ExecutableIndexHandle>,
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = line[..pos]
            .rfind(|c: char| c.is_whitespace())
            .map(|i| i + 1)
            .unwrap_or(0);
        let prefix = &line[start..pos];
        if prefix.is_empty() {
            return Ok((start, Vec::new()));
        }

        let mut candidates = Vec::new();
        if let Some(first) = self.index.prefix_first(prefix) {
            for name in self.index.names_from(first) {
                if !name.starts_with(prefix) {
                    break;
                }
                candidates.push(Pair {
                    display: name.to_string(),
                    replacement: name.to_string(),
                });
            }
        }
        Ok((start, candidates))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}

/// Drives the REPL until end-of-input (§6's CLI contract: no arguments,
/// line-by-line stdin with a `$ ` prompt, terminate on EOF).
pub fn run() -> i32 {
    let mut shell = Shell::new();
    // Shares the one worker `Shell::new()` already spawned (§4.2: built
    // once, consumed through a barrier) instead of scanning PATH twice.
    let index = shell.executable_index();
    let mut editor: Editor<ShellHelper, rustyline::history::DefaultHistory> =
        match Editor::new() {
            Ok(editor) => editor,
            Err(err) => {
                eprintln!("mysh: {}", err);
                return 1;
            }
        };
    editor.set_helper(Some(ShellHelper { index }));

    let mut arena = BumpArena::init(PROMPT_ARENA_SIZE);

    loop {
        arena.reset();
        match editor.readline(PROMPT) {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());

                // Copy the line into the per-prompt scratch arena with a
                // trailing double NUL (§3's Line buffer), then hand the
                // tokenizer that copy rather than the editor's own buffer —
                // the arena reset above already scopes it to one prompt
                // iteration; this is what actually lands in it.
                let bytes = line.as_bytes();
                let region = arena.push(1, bytes.len() + 2);
                region[..bytes.len()].copy_from_slice(bytes);
                region[bytes.len()] = 0;
                region[bytes.len() + 1] = 0;
                let scratch_line = std::str::from_utf8(&region[..bytes.len()])
                    .expect("line buffer copy preserves the original's valid UTF-8");

                if let Err(e) = shell.run_line(scratch_line) {
                    eprintln!("{}", e);
                }
            }
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(err) => {
                eprintln!("mysh: {}", err);
                break;
            }
        }
    }

    shell.last_status
}
