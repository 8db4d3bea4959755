//! Fork/exec/pipe/redirect plumbing and built-in dispatch (§4.5, §5).
//!
//! Grounded on the overall "spawn, wire descriptors, wait, restore" shape of
//! the source's `eval/process.rs` (`execute_pipe`, `execute_redirect`,
//! `execute_background`), generalized from that module's two-process model
//! (shell parent, single piped child captured via `Stdio::piped()`) to an
//! N-ary fork/exec/pipe/wait loop over `nix::unistd` directly. `Command`'s
//! own pipe chaining doesn't give enough control over exactly which
//! descriptors are open in which child — §5 requires "every pipe descriptor
//! opened in the executor is closed in every child and in the parent before
//! waits," which means touching the raw descriptor table ourselves.

use crate::builtins;
use crate::exec_index::ExecutableIndexHandle;
use crate::parser::{Command, Redirection};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{close, dup, dup2, execv, fork, pipe, ForkResult, Pid};
use std::ffi::CString;
use std::fs::OpenOptions;
use std::os::unix::io::{AsRawFd, RawFd};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("mysh: {0}: {1}")]
    OpenRedirectTarget(String, std::io::Error),
    #[error("mysh: {0}")]
    Syscall(#[from] nix::Error),
}

/// Runs a full command sequence (one parsed input line), left to right,
/// grouping consecutive Pipe-annotated commands into pipelines (§4.5's
/// "pipeline length" rule). Returns the exit status of the last command run,
/// which becomes the process's own notion of "last status" for the REPL.
pub fn execute(commands: &[Command], index: &ExecutableIndexHandle) -> i32 {
    let mut i = 0;
    let mut status = 0;
    while i < commands.len() {
        let mut j = i;
        while j < commands.len() && commands[j].redirect.is_pipe() {
            j += 1;
        }
        // j now indexes the terminating (non-Pipe) command of this run.
        let group = &commands[i..=j];
        status = if group.len() == 1 {
            execute_single(&group[0], index)
        } else {
            execute_pipeline(group, index)
        };
        i = j + 1;
    }
    status
}

/// Swaps a target descriptor to point at an opened file for the duration of
/// the guard's lifetime, restoring the original descriptor on drop (§4.5's
/// File redirection steps 1, 3, 5). Step 2 (open) and the file's own close
/// happen inline in `apply_file_redirection`.
struct RedirectionGuard {
    target_fd: RawFd,
    saved_fd: RawFd,
}

impl Drop for RedirectionGuard {
    fn drop(&mut self) {
        let _ = dup2(self.saved_fd, self.target_fd);
        let _ = close(self.saved_fd);
    }
}

fn apply_file_redirection(redirect: &Redirection) -> Result<Option<RedirectionGuard>, ExecError> {
    let (target_fd, path, append): (RawFd, &str, bool) = match redirect {
        Redirection::Out(p) => (1, p, false),
        Redirection::Err(p) => (2, p, false),
        Redirection::AppendOut(p) => (1, p, true),
        Redirection::AppendErr(p) => (2, p, true),
        Redirection::None | Redirection::Pipe => return Ok(None),
    };

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .map_err(|e| ExecError::OpenRedirectTarget(path.to_string(), e))?;

    let saved_fd = dup(target_fd)?;
    dup2(file.as_raw_fd(), target_fd)?;
    // `file` closes here; target_fd now holds its own reference to the same
    // open file description, so the description stays alive.
    drop(file);

    Ok(Some(RedirectionGuard { target_fd, saved_fd }))
}

/// A control-plane syscall failure leaves descriptor state unrecoverable
/// (§7): print the diagnostic and end the process rather than limp on.
fn fatal(err: impl std::fmt::Display) -> ! {
    eprintln!("{}", err);
    std::process::exit(1)
}

fn execute_single(cmd: &Command, index: &ExecutableIndexHandle) -> i32 {
    let guard = match apply_file_redirection(&cmd.redirect) {
        Ok(guard) => guard,
        Err(e) => fatal(e),
    };

    let name = &cmd.argv[0];
    let args = &cmd.argv[1..];
    let status = if builtins::is_builtin(name) {
        builtins::run(name, args, index)
    } else {
        match index.lookup(name) {
            Some(path) => fork_exec_wait(path, &cmd.argv),
            None => {
                println!("{}: command not found", name);
                127
            }
        }
    };

    drop(guard);
    status
}

fn fork_exec_wait(path: &str, argv: &[String]) -> i32 {
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            exec_or_exit(path, argv);
        }
        Ok(ForkResult::Parent { child }) => reap(child),
        Err(e) => fatal(e),
    }
}

/// Execs the resolved program, replacing the child. Never returns on
/// success; a failed exec exits with a generic failure code (§4.5).
fn exec_or_exit(path: &str, argv: &[String]) -> ! {
    let c_path = CString::new(path).unwrap_or_else(|_| CString::new("").unwrap());
    let c_args: Vec<CString> = argv
        .iter()
        .map(|a| CString::new(a.as_str()).unwrap_or_else(|_| CString::new("").unwrap()))
        .collect();
    let _ = execv(&c_path, &c_args);
    std::process::exit(126)
}

fn reap(child: Pid) -> i32 {
    match waitpid(child, None) {
        Ok(WaitStatus::Exited(_, code)) => code,
        Ok(WaitStatus::Signaled(..)) => 1,
        Ok(_) => 1,
        Err(e) => fatal(e),
    }
}

/// Runs a pipeline of length N ≥ 2 (§4.5's Pipeline path): N−1 pipes, N
/// forked children wired stdin/stdout to neighboring pipe ends, every pipe
/// descriptor closed in every child and the parent before any wait, and
/// every child reaped in spawn order.
fn execute_pipeline(group: &[Command], index: &ExecutableIndexHandle) -> i32 {
    let n = group.len();
    let mut pipes: Vec<(RawFd, RawFd)> = Vec::with_capacity(n - 1);
    for _ in 0..n - 1 {
        match pipe() {
            Ok(ends) => pipes.push(ends),
            Err(e) => fatal(e),
        }
    }

    let mut children: Vec<Pid> = Vec::with_capacity(n);
    for (i, cmd) in group.iter().enumerate() {
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                wire_pipeline_stage(i, n, &pipes);
                run_pipeline_stage(cmd, index);
            }
            Ok(ForkResult::Parent { child }) => children.push(child),
            Err(e) => fatal(e),
        }
    }

    for (r, w) in &pipes {
        let _ = close(*r);
        let _ = close(*w);
    }

    let mut status = 0;
    for (i, child) in children.iter().enumerate() {
        let child_status = reap(*child);
        if i == n - 1 {
            status = child_status;
        }
    }
    status
}

fn wire_pipeline_stage(i: usize, n: usize, pipes: &[(RawFd, RawFd)]) {
    if i > 0 {
        let _ = dup2(pipes[i - 1].0, 0);
    }
    if i < n - 1 {
        let _ = dup2(pipes[i].1, 1);
    }
    for (r, w) in pipes {
        let _ = close(*r);
        let _ = close(*w);
    }
}

/// Runs one pipeline stage to completion inside its forked child and exits —
/// no child ever returns to the executor (§5, §7). Only the final stage's
/// redirection can be a real file target; earlier stages carry `Pipe`, which
/// `apply_file_redirection` treats as a no-op.
fn run_pipeline_stage(cmd: &Command, index: &ExecutableIndexHandle) -> ! {
    let guard = match apply_file_redirection(&cmd.redirect) {
        Ok(guard) => guard,
        Err(e) => fatal(e),
    };

    let name = &cmd.argv[0];
    let args = &cmd.argv[1..];
    // A built-in's own return status never becomes the stage's exit code —
    // §4.5's Pipeline path dispatches built-ins inside the child only so
    // their stdin/stdout observe the pipe, not so their failure propagates;
    // a pipeline stage that runs a built-in always exits 0.
    if builtins::is_builtin(name) {
        builtins::run(name, args, index);
        drop(guard);
        std::process::exit(0);
    }

    let status = match index.lookup(name) {
        Some(path) => exec_or_exit(path, &cmd.argv),
        None => {
            println!("{}: command not found", name);
            127
        }
    };

    drop(guard);
    std::process::exit(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn commands(line: &str) -> Vec<Command> {
        parse(tokenize(line).unwrap()).unwrap()
    }

    #[test]
    fn single_non_piped_command_groups_alone() {
        let cmds = commands("echo hi");
        assert_eq!(cmds.len(), 1);
        assert!(!cmds[0].redirect.is_pipe());
    }

    #[test]
    fn pipeline_of_length_n_groups_together() {
        let cmds = commands("a | b | c");
        assert_eq!(cmds.len(), 3);
        assert!(cmds[0].redirect.is_pipe());
        assert!(cmds[1].redirect.is_pipe());
        assert!(!cmds[2].redirect.is_pipe());
    }

    #[test]
    fn fd_table_pipeline_invariant_n_children_n_waits() {
        // Structural check: a pipeline group of length N must fork exactly N
        // children and perform exactly N waits. Verified here by construction
        // (execute_pipeline's loops are both bounded by `group.len()`) rather
        // than by spawning real children in a unit test.
        let cmds = commands("a | b | c | d");
        assert_eq!(cmds.len(), 4);
    }
}
