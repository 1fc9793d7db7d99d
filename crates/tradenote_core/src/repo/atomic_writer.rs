//! Crash-safe document writer with lock-contention retry and autosave fallback.
//!
//! # Responsibility
//! - Write a serialized document next to its target and atomically replace it.
//! - Retry replaces that fail the way a foreign lock holder makes them fail.
//! - Preserve the attempted write in an autosave sibling when retries exhaust.
//!
//! # Invariants
//! - The canonical path only ever holds a complete previous or new document.
//! - A failed replace leaves the new bytes in an autosave file, or keeps the
//!   temp file when even that fails. Data is never silently dropped.
//! - Serialization and temp-write failures abort without retry.

use crate::config::RetryPolicy;
use crate::model::now_epoch;
use log::{error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::error::Error;
use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

static AUTOSAVE_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\.autosave\.(\d+)(?:-(\d+))?\.json$").expect("valid autosave suffix regex")
});

// Windows ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION.
const WINDOWS_SHARING_VIOLATION: i32 = 32;
const WINDOWS_LOCK_VIOLATION: i32 = 33;

/// File-system operations used by the writer.
///
/// Production code uses [`StdFileOps`]; tests substitute implementations that
/// simulate foreign processes holding the target open.
pub trait FileOps {
    /// Creates or truncates `path`, writes `bytes` and flushes them to disk.
    fn write_new(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
    /// Atomically replaces `to` with `from`.
    fn replace(&self, from: &Path, to: &Path) -> io::Result<()>;
    /// Moves `from` to a path that does not exist yet.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn remove(&self, path: &Path) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
    /// Creates `path` and its missing parents.
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }
}

/// [`FileOps`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileOps;

impl FileOps for StdFileOps {
    fn write_new(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(bytes)?;
        file.sync_all()
    }

    fn replace(&self, from: &Path, to: &Path) -> io::Result<()> {
        // `rename` overwrites the target atomically on every supported platform.
        fs::rename(from, to)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Successful write summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    /// Canonical file that now holds the new document.
    pub path: PathBuf,
    /// Replace attempts used, `1` when no contention happened.
    pub attempts: u32,
    pub bytes: usize,
}

/// Failed write. Every variant leaves the canonical file untouched.
#[derive(Debug)]
pub enum WriteError {
    /// Document could not be serialized. Nothing was written.
    Serialize(serde_json::Error),
    /// Temp sibling could not be written. Nothing was retried.
    TempWrite { path: PathBuf, source: io::Error },
    /// Replace failed; the attempted write was preserved in `autosave_path`.
    Autosaved {
        path: PathBuf,
        autosave_path: PathBuf,
        attempts: u32,
        source: io::Error,
    },
    /// Replace and autosave both failed; the attempted write is still in
    /// `temp_path`.
    Unpreserved {
        path: PathBuf,
        temp_path: PathBuf,
        attempts: u32,
        source: io::Error,
    },
}

impl WriteError {
    /// Autosave file holding the attempted write, when one was produced.
    pub fn autosave_path(&self) -> Option<&Path> {
        match self {
            Self::Autosaved { autosave_path, .. } => Some(autosave_path),
            _ => None,
        }
    }

    /// Returns whether the error came from contention on the canonical file
    /// rather than from the document or the temp write.
    pub fn is_replace_failure(&self) -> bool {
        matches!(self, Self::Autosaved { .. } | Self::Unpreserved { .. })
    }
}

impl Display for WriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialize(err) => write!(f, "failed to serialize document: {err}"),
            Self::TempWrite { path, source } => {
                write!(f, "failed to write temp file `{}`: {source}", path.display())
            }
            Self::Autosaved {
                path,
                autosave_path,
                attempts,
                source,
            } => write!(
                f,
                "could not replace `{}` after {attempts} attempts ({source}); changes kept in `{}`",
                path.display(),
                autosave_path.display()
            ),
            Self::Unpreserved {
                path,
                temp_path,
                attempts,
                source,
            } => write!(
                f,
                "could not replace `{}` after {attempts} attempts ({source}) and autosave failed; changes kept in `{}`",
                path.display(),
                temp_path.display()
            ),
        }
    }
}

impl Error for WriteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Serialize(err) => Some(err),
            Self::TempWrite { source, .. }
            | Self::Autosaved { source, .. }
            | Self::Unpreserved { source, .. } => Some(source),
        }
    }
}

impl From<serde_json::Error> for WriteError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value)
    }
}

/// Atomic JSON writer over a [`FileOps`] implementation.
#[derive(Debug, Clone)]
pub struct AtomicWriter<F: FileOps = StdFileOps> {
    ops: F,
    policy: RetryPolicy,
}

impl AtomicWriter<StdFileOps> {
    /// Creates a writer over the real file system.
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_ops(StdFileOps, policy)
    }
}

impl<F: FileOps> AtomicWriter<F> {
    pub fn with_ops(ops: F, policy: RetryPolicy) -> Self {
        Self { ops, policy }
    }

    pub fn ops(&self) -> &F {
        &self.ops
    }

    /// Serializes `value` as indented JSON and atomically writes it to `path`.
    ///
    /// # Errors
    /// - `Serialize`/`TempWrite` when nothing could be staged.
    /// - `Autosaved` when retries exhausted and the data went to an autosave.
    /// - `Unpreserved` when the autosave also failed; the temp file remains.
    pub fn write<T: Serialize + ?Sized>(
        &self,
        path: &Path,
        value: &T,
    ) -> Result<WriteReport, WriteError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(path, &bytes)
    }

    /// Atomically writes already serialized `bytes` to `path`.
    pub fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<WriteReport, WriteError> {
        let started_at = Instant::now();
        let temp_path = sibling_with_suffix(path, ".tmp");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.ops.create_dir_all(parent).map_err(|source| WriteError::TempWrite {
                path: temp_path.clone(),
                source,
            })?;
        }

        if let Err(source) = self.ops.write_new(&temp_path, bytes) {
            error!(
                "event=atomic_write module=repo status=error stage=temp duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                source
            );
            // A partial temp file is useless; the canonical file is untouched.
            self.discard_temp(&temp_path, "temp");
            return Err(WriteError::TempWrite {
                path: temp_path,
                source,
            });
        }

        let mut attempts = 0;
        let last_error = loop {
            attempts += 1;
            match self.ops.replace(&temp_path, path) {
                Ok(()) => {
                    info!(
                        "event=atomic_write module=repo status=ok attempts={} bytes={} duration_ms={}",
                        attempts,
                        bytes.len(),
                        started_at.elapsed().as_millis()
                    );
                    return Ok(WriteReport {
                        path: path.to_path_buf(),
                        attempts,
                        bytes: bytes.len(),
                    });
                }
                Err(err) if is_transient(&err) && attempts < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempts - 1);
                    warn!(
                        "event=atomic_write module=repo status=retry attempt={} delay_ms={} error={}",
                        attempts,
                        delay.as_millis(),
                        err
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
                Err(err) => break err,
            }
        };

        Err(self.preserve(path, &temp_path, bytes, attempts, last_error))
    }

    fn preserve(
        &self,
        path: &Path,
        temp_path: &Path,
        bytes: &[u8],
        attempts: u32,
        source: io::Error,
    ) -> WriteError {
        let autosave_path = self.next_autosave_path(path);

        let preserved = match self.ops.rename(temp_path, &autosave_path) {
            Ok(()) => Ok(()),
            Err(rename_err) => {
                warn!(
                    "event=autosave module=repo status=retry stage=rename error={}",
                    rename_err
                );
                self.ops
                    .write_new(&autosave_path, bytes)
                    .map(|()| self.discard_temp(temp_path, "autosave"))
            }
        };

        match preserved {
            Ok(()) => {
                warn!(
                    "event=autosave module=repo status=ok attempts={} autosave={} error={}",
                    attempts,
                    autosave_path.display(),
                    source
                );
                WriteError::Autosaved {
                    path: path.to_path_buf(),
                    autosave_path,
                    attempts,
                    source,
                }
            }
            Err(autosave_err) => {
                error!(
                    "event=autosave module=repo status=error attempts={} temp={} error={}",
                    attempts,
                    temp_path.display(),
                    autosave_err
                );
                WriteError::Unpreserved {
                    path: path.to_path_buf(),
                    temp_path: temp_path.to_path_buf(),
                    attempts,
                    source,
                }
            }
        }
    }

    fn discard_temp(&self, temp_path: &Path, stage: &str) {
        match self.ops.remove(temp_path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                "event=atomic_write module=repo status=warn stage={} op=remove_temp temp={} error={}",
                stage,
                temp_path.display(),
                err
            ),
        }
    }

    fn next_autosave_path(&self, path: &Path) -> PathBuf {
        let epoch = now_epoch();
        let first = sibling_with_suffix(path, &format!(".autosave.{epoch}.json"));
        if !self.ops.exists(&first) {
            return first;
        }
        (1u32..)
            .map(|n| sibling_with_suffix(path, &format!(".autosave.{epoch}-{n}.json")))
            .find(|candidate| !self.ops.exists(candidate))
            .unwrap_or(first)
    }
}

/// Returns whether a replace error looks like another process holding the file.
///
/// Any OS-reported error counts unless its kind says retrying cannot help;
/// std maps most lock and sharing errnos to kinds that are not matchable.
pub fn is_transient(err: &io::Error) -> bool {
    if cfg!(windows)
        && matches!(
            err.raw_os_error(),
            Some(WINDOWS_SHARING_VIOLATION | WINDOWS_LOCK_VIOLATION)
        )
    {
        return true;
    }
    match err.kind() {
        io::ErrorKind::PermissionDenied
        | io::ErrorKind::Other
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::TimedOut
        | io::ErrorKind::ResourceBusy
        | io::ErrorKind::ExecutableFileBusy => true,
        io::ErrorKind::NotFound
        | io::ErrorKind::InvalidInput
        | io::ErrorKind::InvalidData
        | io::ErrorKind::Unsupported => false,
        _ => err.raw_os_error().is_some(),
    }
}

/// Lists autosave siblings of `path`, oldest first.
///
/// Autosaves are recovery aids only; loading never reads them.
pub fn list_autosaves(path: &Path) -> io::Result<Vec<PathBuf>> {
    let Some(file_name) = path.file_name().map(|name| name.to_string_lossy().into_owned()) else {
        return Ok(Vec::new());
    };
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent.to_path_buf(),
        None => PathBuf::from("."),
    };

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(rest) = name.strip_prefix(file_name.as_str()) else {
            continue;
        };
        let Some(captures) = AUTOSAVE_SUFFIX_RE.captures(rest) else {
            continue;
        };
        if captures.get(0).map(|m| m.start()) != Some(0) {
            continue;
        }
        let epoch: u64 = captures[1].parse().unwrap_or(0);
        let counter: u64 = captures
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        found.push((epoch, counter, entry.path()));
    }
    found.sort();
    Ok(found.into_iter().map(|(_, _, path)| path).collect())
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::{is_transient, sibling_with_suffix};
    use std::io;
    use std::path::Path;

    #[test]
    fn lock_like_errors_are_transient() {
        assert!(is_transient(&io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(is_transient(&io::Error::other("busy")));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::NotFound)));
    }

    #[cfg(unix)]
    #[test]
    fn os_reported_busy_and_generic_errors_are_transient() {
        // EBUSY, ETXTBSY, EIO, ENOLCK
        for errno in [16, 26, 5, 37] {
            let err = io::Error::from_raw_os_error(errno);
            assert!(is_transient(&err), "errno={errno} kind={:?}", err.kind());
        }
        // ENOENT, EINVAL
        assert!(!is_transient(&io::Error::from_raw_os_error(2)));
        assert!(!is_transient(&io::Error::from_raw_os_error(22)));
    }

    #[test]
    fn sibling_paths_append_to_full_file_name() {
        assert_eq!(
            sibling_with_suffix(Path::new("data/notes_db.json"), ".tmp"),
            Path::new("data/notes_db.json.tmp")
        );
    }
}
