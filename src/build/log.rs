// src/build/log.rs

//! Build log capture
//!
//! Subprocesses append to a plain log file. A [`LogTail`] picks up whatever
//! was appended since the last poll and feeds complete lines into the
//! run's [`BuildLog`], which the renderer reads through a [`BuildSink`].

use crate::error::{Error, Result};
use crate::process::open_append;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Append-only sequence of log lines for one run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildLog {
    lines: Vec<String>,
}

impl BuildLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn last(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }
}

/// Receives build progress for display
pub trait BuildSink: Send + Sync {
    /// Called on every poll with the full log so far
    fn render(&self, title: &str, lines: &[String], finished: bool, elapsed: Duration);
}

/// Sink that discards everything
#[derive(Debug, Default)]
pub struct NullSink;

impl BuildSink for NullSink {
    fn render(&self, _title: &str, _lines: &[String], _finished: bool, _elapsed: Duration) {}
}

/// Sink that remembers every title it was shown and the last log state
#[derive(Debug, Default)]
pub struct RecordingSink {
    inner: Mutex<RecordedFrames>,
}

#[derive(Debug, Default, Clone)]
pub struct RecordedFrames {
    pub titles: Vec<String>,
    pub last_lines: Vec<String>,
    pub finished_frames: usize,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn frames(&self) -> RecordedFrames {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl BuildSink for RecordingSink {
    fn render(&self, title: &str, lines: &[String], finished: bool, _elapsed: Duration) {
        let mut frames = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if frames.titles.last().map(String::as_str) != Some(title) {
            frames.titles.push(title.to_string());
        }
        frames.last_lines = lines.to_vec();
        if finished {
            frames.finished_frames += 1;
        }
    }
}

/// Incremental reader over a growing log file
#[derive(Debug)]
pub struct LogTail {
    path: PathBuf,
    offset: u64,
    partial: Vec<u8>,
}

impl LogTail {
    /// Truncate `path` and start tailing it from the beginning
    pub fn create(path: &Path) -> Result<Self> {
        File::create(path)
            .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", path.display())))?;
        Ok(Self::open(path))
    }

    /// Tail an existing file from its beginning
    pub fn open(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            offset: 0,
            partial: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move complete lines appended since the last poll into `log`
    ///
    /// A trailing line without a newline is held back until it is finished.
    pub fn poll(&mut self, log: &mut BuildLog) -> Result<usize> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let len = file.metadata()?.len();
        if len < self.offset {
            // Truncated underneath us
            self.offset = 0;
            self.partial.clear();
        }
        if len == self.offset {
            return Ok(0);
        }

        file.seek(SeekFrom::Start(self.offset))?;
        let read = file.read_to_end(&mut self.partial)?;
        self.offset += read as u64;

        let mut added = 0;
        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            log.push(text.trim_end_matches(['\n', '\r']));
            added += 1;
        }
        Ok(added)
    }

    /// Poll, then flush any unterminated trailing line
    pub fn finish(&mut self, log: &mut BuildLog) -> Result<usize> {
        let mut added = self.poll(log)?;
        if !self.partial.is_empty() {
            let rest = std::mem::take(&mut self.partial);
            log.push(String::from_utf8_lossy(&rest).into_owned());
            added += 1;
        }
        Ok(added)
    }
}

/// Append a marker line to a log file
pub fn append_line(path: &Path, message: &str) -> Result<()> {
    let mut file = open_append(path)?;
    writeln!(file, "{message}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_picks_up_appended_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.log");
        let mut tail = LogTail::create(&path).unwrap();
        let mut log = BuildLog::new();

        assert_eq!(tail.poll(&mut log).unwrap(), 0);

        append_line(&path, "==> Making package").unwrap();
        append_line(&path, "==> Retrieving sources").unwrap();
        assert_eq!(tail.poll(&mut log).unwrap(), 2);

        append_line(&path, "==> Finished").unwrap();
        assert_eq!(tail.poll(&mut log).unwrap(), 1);
        assert_eq!(
            log.lines(),
            ["==> Making package", "==> Retrieving sources", "==> Finished"]
        );
    }

    #[test]
    fn test_partial_line_held_until_finished() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.log");
        let mut tail = LogTail::create(&path).unwrap();
        let mut log = BuildLog::new();

        std::fs::write(&path, "compiling 1/2\r\ncompiling").unwrap();
        tail.poll(&mut log).unwrap();
        assert_eq!(log.lines(), ["compiling 1/2"]);

        let mut file = open_append(&path).unwrap();
        write!(file, " 2/2").unwrap();
        tail.finish(&mut log).unwrap();
        assert_eq!(log.lines(), ["compiling 1/2", "compiling 2/2"]);
    }

    #[test]
    fn test_create_truncates_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.log");
        std::fs::write(&path, "old run\n").unwrap();

        let mut tail = LogTail::create(&path).unwrap();
        let mut log = BuildLog::new();
        tail.poll(&mut log).unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut tail = LogTail::open(&dir.path().join("absent.log"));
        let mut log = BuildLog::new();
        assert_eq!(tail.poll(&mut log).unwrap(), 0);
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.render("Building foo", &["a".to_string()], false, Duration::ZERO);
        sink.render("Building foo", &["a".to_string(), "b".to_string()], true, Duration::ZERO);

        let frames = sink.frames();
        assert_eq!(frames.titles, vec!["Building foo"]);
        assert_eq!(frames.last_lines, vec!["a", "b"]);
        assert_eq!(frames.finished_frames, 1);
    }
}
