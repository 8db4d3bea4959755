//! The executable index (§4.2): a sorted, deduplicated name/path table built
//! once on a background worker and consumed through a once-barrier.
//!
//! Grounded on the source's `ExecutableResolver` (`resolver.rs`): the same
//! "split PATH, scan each directory, check the executable bit" algorithm,
//! generalized from a boolean membership cache into the sorted table this
//! spec's `lookup`/`prefix_first` contract needs. Unlike the source's own
//! single packed heap block, the sorted order here is carried by two
//! `Vec<StrHandle>`s (so `binary_search`/`partition_point` work directly);
//! the permanent string bytes themselves live in one [`ExpArena`], per §2's
//! "an exponential multi-block variant for the executable index's permanent
//! strings" and §4.2 step 6's "one block... single free" allocation
//! discipline, rendered as handles instead of raw pointers.

use crate::arena::{ExpArena, StrHandle};
use crate::builtins::BUILTIN_NAMES;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::thread::{self, JoinHandle};

pub const BUILTIN_SENTINEL: &str = "a shell builtin";

#[cfg(windows)]
const PATH_SEPARATOR: char = ';';
#[cfg(not(windows))]
const PATH_SEPARATOR: char = ':';

/// Base capacity of the index's permanent string arena. Large enough that a
/// typical PATH scan (a few hundred entries) never needs more than one or
/// two blocks.
const STORAGE_BASE_CAPACITY: usize = 16 * 1024;

/// The sorted `names[]`/`paths[]` table itself (§3's Executable Index). The
/// strings backing both arrays are packed into `storage`; `names`/`paths`
/// hold only the handles `storage` resolves.
pub struct ExecutableIndex {
    storage: ExpArena,
    names: Vec<StrHandle>,
    paths: Vec<StrHandle>,
}

impl ExecutableIndex {
    /// Runs the construction algorithm (§4.2 steps 1-6) synchronously. Called
    /// only from the background worker thread spawned by
    /// [`ExecutableIndexHandle::spawn`].
    fn build() -> ExecutableIndex {
        let mut entries: Vec<(String, String)> = Vec::new();

        for name in BUILTIN_NAMES {
            entries.push((name.to_string(), BUILTIN_SENTINEL.to_string()));
        }

        if let Ok(path_var) = env::var("PATH") {
            for dir in path_var.split(PATH_SEPARATOR) {
                if dir.is_empty() {
                    continue;
                }
                collect_executables(dir, &mut entries);
            }
        }

        // Stable sort: builtins were pushed first, so equal names keep
        // builtins ahead of same-named externals (§4.2 step 4).
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.dedup_by(|a, b| a.0 == b.0);

        let mut storage = ExpArena::new(STORAGE_BASE_CAPACITY);
        let mut names = Vec::with_capacity(entries.len());
        let mut paths = Vec::with_capacity(entries.len());
        for (name, path) in entries {
            names.push(storage.push_str(&name));
            paths.push(storage.push_str(&path));
        }

        ExecutableIndex { storage, names, paths }
    }

    fn name_at(&self, i: usize) -> &str {
        self.storage.get_str(self.names[i])
    }

    /// Exact lookup. Returns `None` for no match *and* for builtin entries —
    /// callers test builtin-ness separately against the known builtin set
    /// (§4.2's "a separate predicate").
    pub fn lookup(&self, name: &str) -> Option<&str> {
        let idx = self
            .names
            .binary_search_by(|h| self.storage.get_str(*h).cmp(name))
            .ok()?;
        let path = self.storage.get_str(self.paths[idx]);
        if path == BUILTIN_SENTINEL {
            None
        } else {
            Some(path)
        }
    }

    /// Smallest index whose name starts with `prefix`, or `None`. Callers
    /// enumerate completions by walking [`ExecutableIndex::names_from`]
    /// while the prefix still matches (§4.2).
    pub fn prefix_first(&self, prefix: &str) -> Option<usize> {
        let idx = self.names.partition_point(|h| self.storage.get_str(*h) < prefix);
        if idx < self.names.len() && self.name_at(idx).starts_with(prefix) {
            Some(idx)
        } else {
            None
        }
    }

    /// Iterates indexed names from `start` onward, in sorted order.
    pub fn names_from(&self, start: usize) -> impl Iterator<Item = &str> {
        self.names[start..].iter().map(|h| self.storage.get_str(*h))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn collect_executables(dir: &str, out: &mut Vec<(String, String)>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = match name.to_str() {
            Some(n) => n,
            None => continue,
        };
        if name.starts_with('.') {
            continue;
        }
        if !is_executable(&entry) {
            continue;
        }
        let path: PathBuf = entry.path();
        let path = match path.to_str() {
            Some(p) => p.to_string(),
            None => continue,
        };
        out.push((name.to_string(), path));
    }
}

#[cfg(unix)]
fn is_executable(entry: &fs::DirEntry) -> bool {
    use std::os::unix::fs::PermissionsExt;
    // `DirEntry::metadata` is an `lstat` alias and never follows symlinks, so
    // a symlinked executable (e.g. `/usr/bin/awk -> mawk`) would otherwise be
    // misclassified as "not a regular file" and dropped. §4.2 step 3's
    // "if the directory returns an unknown file-type, stat the path" calls
    // for the symlink-following stat, so resolve through `fs::metadata`
    // instead of `entry.metadata()`.
    let metadata = match fs::metadata(entry.path()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    metadata.is_file() && metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(entry: &fs::DirEntry) -> bool {
    fs::metadata(entry.path()).map(|m| m.is_file()).unwrap_or(false)
}

/// Owns the background worker and the once-barrier any caller crosses on
/// first access (§4.2, §5: "the once-barrier on first lookup before the
/// worker finishes"). Built once at startup; never refreshed (§3's
/// Lifecycles: "callers accept a possibly stale view").
pub struct ExecutableIndexHandle {
    worker: Mutex<Option<JoinHandle<ExecutableIndex>>>,
    index: OnceLock<ExecutableIndex>,
}

impl ExecutableIndexHandle {
    pub fn spawn() -> Self {
        let worker = thread::spawn(ExecutableIndex::build);
        ExecutableIndexHandle {
            worker: Mutex::new(Some(worker)),
            index: OnceLock::new(),
        }
    }

    fn get(&self) -> &ExecutableIndex {
        self.index.get_or_init(|| {
            let handle = self
                .worker
                .lock()
                .expect("executable index worker mutex poisoned")
                .take()
                .expect("executable index built more than once");
            handle
                .join()
                .expect("executable index worker thread panicked")
        })
    }

    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.get().lookup(name)
    }

    pub fn prefix_first(&self, prefix: &str) -> Option<usize> {
        self.get().prefix_first(prefix)
    }

    pub fn names_from(&self, start: usize) -> impl Iterator<Item = &str> {
        self.get().names_from(start)
    }
}
