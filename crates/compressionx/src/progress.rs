//! Progress line on stderr.

use std::io::Write;

use compressionx_pipeline::{NoProgress, Progress};

/// A [`Progress`] that can close its line after a stage that never
/// called [`Progress::finish`].
pub trait ProgressSink: Progress {
    /// Terminate any half-drawn progress line.
    fn end_line(&mut self) {}
}

impl ProgressSink for NoProgress {}

/// Redraws `Upscaling with EDSR... 40%` in place on stderr.
#[derive(Debug, Default)]
pub struct StderrProgress {
    line_open: bool,
}

impl ProgressSink for StderrProgress {
    fn end_line(&mut self) {
        if self.line_open {
            eprintln!();
            self.line_open = false;
        }
    }
}

impl Progress for StderrProgress {
    fn update(&mut self, percent: u8, message: &str) {
        eprint!("\r{message} {percent:>3}%");
        std::io::stderr().flush().ok();
        self.line_open = true;
    }

    fn finish(&mut self, message: &str) {
        self.end_line();
        eprintln!("{message}");
    }
}
