// src/build/supervisor.rs

//! Long-running step supervision
//!
//! Each step runs on one scoped worker thread. The calling thread polls the
//! log file at a fixed interval and re-renders until the worker hands its
//! result back over a channel, then joins it before returning.

use super::log::{BuildLog, BuildSink, LogTail, append_line};
use crate::error::{Error, Result};
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::warn;

/// Log state and display for one build run
pub struct TailedRun<'s> {
    tail: LogTail,
    log: BuildLog,
    sink: &'s dyn BuildSink,
    poll_interval: Duration,
    started: Instant,
}

impl<'s> TailedRun<'s> {
    /// Start a run, truncating the log file
    pub fn start(log_file: &Path, sink: &'s dyn BuildSink, poll_interval: Duration) -> Result<Self> {
        Ok(Self {
            tail: LogTail::create(log_file)?,
            log: BuildLog::new(),
            sink,
            poll_interval,
            started: Instant::now(),
        })
    }

    pub fn log_file(&self) -> &Path {
        self.tail.path()
    }

    pub fn log(&self) -> &BuildLog {
        &self.log
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Append a line of our own to the log file
    ///
    /// It shows up on the next poll, in order with subprocess output.
    pub fn note(&mut self, line: impl Into<String>) {
        let line = line.into();
        if let Err(e) = append_line(self.tail.path(), &line) {
            warn!("Failed to write build log: {}", e);
            self.log.push(line);
        }
    }

    /// Pick up new log output and redraw
    pub fn refresh(&mut self, title: &str, finished: bool) {
        if let Err(e) = self.tail.poll(&mut self.log) {
            warn!("Failed to read build log: {}", e);
        }
        self.sink
            .render(title, self.log.lines(), finished, self.started.elapsed());
    }

    /// Run `work` on a worker thread while tailing the log
    ///
    /// Returns the worker's own result; a panicking worker becomes an error.
    pub fn run<T, F>(&mut self, title: &str, work: F) -> Result<T>
    where
        T: Send,
        F: FnOnce() -> Result<T> + Send,
    {
        let (tx, rx) = mpsc::channel();

        std::thread::scope(|scope| {
            let handle = scope.spawn(move || {
                let _ = tx.send(work());
            });

            let received = loop {
                match rx.recv_timeout(self.poll_interval) {
                    Ok(result) => break Some(result),
                    Err(RecvTimeoutError::Timeout) => self.refresh(title, false),
                    Err(RecvTimeoutError::Disconnected) => break None,
                }
            };

            let joined = handle.join();
            if let Err(e) = self.tail.finish(&mut self.log) {
                warn!("Failed to read build log: {}", e);
            }
            self.sink
                .render(title, self.log.lines(), false, self.started.elapsed());

            match (received, joined) {
                (Some(result), _) => result,
                (None, _) => Err(Error::BuildFailed(format!("{title}: worker thread panicked"))),
            }
        })
    }

    /// Draw the final frame
    pub fn finish(&mut self, title: &str) {
        self.refresh(title, true);
    }
}
