//! mysh — entry point (§6: no arguments, line-by-line stdin with a `$ `
//! prompt, terminate on end-of-input).

use std::process::ExitCode;

fn main() -> ExitCode {
    let status = mysh::repl::run();
    ExitCode::from(status as u8)
}
