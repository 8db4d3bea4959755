//! mysh — an interactive POSIX-ish shell.
//!
//! Reads a line, tokenizes it ([`lexer`]), groups tokens into commands
//! ([`parser`]), and runs them ([`executor`]) either as a built-in
//! ([`builtins`]) or as an external program resolved through the
//! [`exec_index`]. [`repl`] drives the read-tokenize-parse-execute cycle;
//! [`shell`] owns the per-process state threaded through it; [`arena`] backs
//! the REPL's per-prompt scratch copy of the input line and the executable
//! index's permanent string storage, and [`token`] is the tokenizer's
//! output type.
//!
//! # Example
//!
//! ```rust
//! use mysh::{lexer, parser};
//!
//! let tokens = lexer::tokenize("echo 'a  b' \"c\\\"d\"").unwrap();
//! let commands = parser::parse(tokens).unwrap();
//! assert_eq!(commands[0].argv, vec!["echo", "a  b", "c\"d"]);
//! ```

pub mod arena;
pub mod builtins;
pub mod exec_index;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod shell;
pub mod token;

pub use exec_index::{ExecutableIndexHandle, BUILTIN_SENTINEL};
pub use executor::{execute, ExecError};
pub use lexer::{tokenize, LexError};
pub use parser::{parse, Command, ParseError, Redirection};
pub use shell::{Shell, ShellError};
pub use token::Token;
