// src/commands/progress.rs
//! Terminal feedback for long-running operations
//!
//! Spinners for resolution status and build log tailing, and the
//! interactive recipe reviewer.

use indicatif::{ProgressBar, ProgressStyle};
use pmt::build::{BuildSink, ReviewArtifact, Reviewer};
use pmt::progress::ProgressSink;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

fn spinner(template: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Single status line for resolution and scans
pub struct StatusSpinner {
    bar: ProgressBar,
}

impl StatusSpinner {
    pub fn new() -> Self {
        Self {
            bar: spinner("{spinner:.cyan} {msg}"),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for StatusSpinner {
    fn status(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }
}

/// Renders a tailed build log as a spinner with elapsed time and last line
pub struct SpinnerSink {
    bar: Mutex<Option<ProgressBar>>,
}

impl SpinnerSink {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }
}

impl BuildSink for SpinnerSink {
    fn render(&self, title: &str, lines: &[String], finished: bool, elapsed: Duration) {
        let mut guard = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        let bar = guard.get_or_insert_with(|| spinner("{spinner:.green} {prefix:.bold} {msg}"));

        bar.set_prefix(format!("{title} [{}]", format_elapsed(elapsed)));
        let last = lines
            .iter()
            .rev()
            .find(|line| !line.trim().is_empty())
            .map(|line| line.trim())
            .unwrap_or("");
        bar.set_message(last.to_string());

        if finished {
            bar.finish_with_message(String::new());
            *guard = None;
        }
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Shows each recipe on the terminal and asks for acceptance
pub struct TerminalReviewer;

impl Reviewer for TerminalReviewer {
    fn review(&self, artifact: &ReviewArtifact) -> bool {
        println!();
        match artifact.diff() {
            Some(diff) => {
                println!(
                    "==> PKGBUILD for {} changed since last review:",
                    artifact.package
                );
                print!("{diff}");
            }
            None => {
                println!("==> PKGBUILD for {} ({}):", artifact.package, artifact.group);
                println!("{}", artifact.recipe);
            }
        }
        println!();

        match super::confirm(&format!("Accept PKGBUILD for {}?", artifact.package)) {
            Ok(accepted) => accepted,
            Err(e) => {
                eprintln!("Failed to read answer: {e}");
                false
            }
        }
    }
}

pub(crate) fn flush() {
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_secs(5)), "00:05");
        assert_eq!(format_elapsed(Duration::from_secs(125)), "02:05");
    }
}
