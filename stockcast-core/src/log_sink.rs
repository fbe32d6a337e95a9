//! Run log: a human-readable, per-run record of symbol outcomes.
//!
//! This is separate from `tracing` diagnostics. The batch driver clears the
//! sink at the start of every run and appends one line per symbol plus a
//! summary, so the sink always holds the latest run only.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub trait LogSink: Send + Sync {
    fn append(&self, message: &str) -> io::Result<()>;
    fn clear(&self) -> io::Result<()>;
}

/// Appends lines to a file on disk.
pub struct FileLogSink {
    path: PathBuf,
    /// Serializes appends from concurrent runs.
    write_lock: Mutex<()>,
}

impl FileLogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_parent(&self) -> io::Result<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
            _ => Ok(()),
        }
    }
}

impl LogSink for FileLogSink {
    fn append(&self, message: &str) -> io::Result<()> {
        let _guard = self.guard();
        self.ensure_parent()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{message}")
    }

    fn clear(&self) -> io::Result<()> {
        let _guard = self.guard();
        self.ensure_parent()?;
        fs::write(&self.path, b"")
    }
}

/// Keeps lines in memory.
#[derive(Default)]
pub struct MemoryLogSink {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LogSink for MemoryLogSink {
    fn append(&self, message: &str) -> io::Result<()> {
        self.lock().push(message.to_string());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        self.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sink_appends_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileLogSink::new(dir.path().join("logs").join("update.log"));

        sink.append("first").unwrap();
        sink.append("second").unwrap();
        let content = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(content, "first\nsecond\n");

        sink.clear().unwrap();
        assert_eq!(fs::read_to_string(sink.path()).unwrap(), "");
    }

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemoryLogSink::new();
        sink.append("a").unwrap();
        sink.append("b").unwrap();
        assert_eq!(sink.lines(), vec!["a", "b"]);
        sink.clear().unwrap();
        assert!(sink.lines().is_empty());
    }
}
