// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-process stdout/stderr files with size-based rotation.
//!
//! Children write to their log files directly (the supervisor opens them
//! append-only and hands the descriptors over at spawn), so rotation
//! happens between runs: `open_pair` shifts oversized files aside before
//! reopening. `tail` reads across the current file and the most recent
//! rotation.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Which of the two per-process streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl LogStream {
    fn extension(self) -> &'static str {
        match self {
            LogStream::Stdout => "out",
            LogStream::Stderr => "err",
        }
    }
}

pub struct LogManager {
    dir: PathBuf,
    rotate_bytes: u64,
    keep: usize,
}

impl LogManager {
    pub fn new(dir: impl Into<PathBuf>, rotate_bytes: u64, keep: usize) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            rotate_bytes,
            keep: keep.max(1),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the current log file for `name`.
    pub fn path(&self, name: &str, stream: LogStream) -> PathBuf {
        self.dir.join(format!("{}.{}", name, stream.extension()))
    }

    /// Open the append-only stdout/stderr pair for a run, rotating
    /// oversized files first. `stdout_override` replaces the derived
    /// stdout path.
    pub fn open_pair(
        &self,
        name: &str,
        stdout_override: Option<&Path>,
    ) -> io::Result<(File, File)> {
        let stdout_path = match stdout_override {
            Some(p) => p.to_path_buf(),
            None => self.path(name, LogStream::Stdout),
        };
        let stderr_path = self.path(name, LogStream::Stderr);

        for path in [&stdout_path, &stderr_path] {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            self.rotate_if_needed(path)?;
        }

        let stdout = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stdout_path)?;
        let stderr = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)?;
        Ok((stdout, stderr))
    }

    /// Shift `path` into the numbered rotation set when it exceeds the size
    /// limit: `file -> file.1 -> file.2 -> …`, dropping `file.keep`.
    pub fn rotate_if_needed(&self, path: &Path) -> io::Result<()> {
        let size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(_) => return Ok(()),
        };
        if size <= self.rotate_bytes {
            return Ok(());
        }

        let oldest = rotated(path, self.keep);
        if oldest.exists() {
            std::fs::remove_file(&oldest)?;
        }
        for i in (1..self.keep).rev() {
            let from = rotated(path, i);
            if from.exists() {
                std::fs::rename(&from, rotated(path, i + 1))?;
            }
        }
        std::fs::rename(path, rotated(path, 1))?;
        tracing::debug!(path = %path.display(), size, "rotated log file");
        Ok(())
    }

    /// Last `lines` lines for a process stream, reaching into the most
    /// recent rotation when the current file is short.
    pub fn tail(&self, name: &str, stream: LogStream, lines: usize) -> io::Result<Vec<String>> {
        self.tail_at(&self.path(name, stream), lines)
    }

    /// `tail` against an explicit path (per-process log overrides).
    pub fn tail_at(&self, path: &Path, lines: usize) -> io::Result<Vec<String>> {
        let mut out = last_lines(path, lines)?;
        if out.len() < lines {
            let previous = rotated(path, 1);
            let mut head = last_lines(&previous, lines - out.len())?;
            head.append(&mut out);
            out = head;
        }
        Ok(out)
    }
}

fn rotated(path: &Path, i: usize) -> PathBuf {
    PathBuf::from(format!("{}.{}", path.display(), i))
}

fn last_lines(path: &Path, n: usize) -> io::Result<Vec<String>> {
    if n == 0 || !path.exists() {
        return Ok(Vec::new());
    }
    let contents = std::fs::read_to_string(path)?;
    let mut lines: Vec<String> = contents.lines().rev().take(n).map(String::from).collect();
    lines.reverse();
    Ok(lines)
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
