//! Operator-facing reporting.
//!
//! The session and exchanges never print directly; they are handed a
//! `Reporter`. Diagnostics go through `tracing` instead.

use std::io::Write;

pub trait Reporter {
    /// Raw output for the operator (listings, help text), written verbatim
    fn output(&mut self, bytes: &[u8]);

    /// Something succeeded
    fn notice(&mut self, message: &str);

    /// Something failed; the session may or may not continue
    fn problem(&mut self, message: &str);
}

impl<T: Reporter + ?Sized> Reporter for &mut T {
    fn output(&mut self, bytes: &[u8]) {
        (**self).output(bytes)
    }

    fn notice(&mut self, message: &str) {
        (**self).notice(message)
    }

    fn problem(&mut self, message: &str) {
        (**self).problem(message)
    }
}

/// Writes output and notices to stdout, problems to stderr
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn output(&mut self, bytes: &[u8]) {
        emit(std::io::stdout().lock(), "stdout", bytes);
    }

    fn notice(&mut self, message: &str) {
        emit(std::io::stdout().lock(), "stdout", format!("{}\n", message).as_bytes());
    }

    fn problem(&mut self, message: &str) {
        emit(std::io::stderr().lock(), "stderr", format!("cix: {}\n", message).as_bytes());
    }
}

/// Write and flush, logging instead of panicking when the stream is gone
fn emit<W: Write>(mut out: W, stream: &str, bytes: &[u8]) {
    if let Err(e) = out.write_all(bytes).and_then(|_| out.flush()) {
        tracing::warn!("failed to write to {}: {}", stream, e);
    }
}

/// Keeps everything in memory; used to inspect what a session reported
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub output: Vec<u8>,
    pub notices: Vec<String>,
    pub problems: Vec<String>,
}

#[cfg(test)]
impl Reporter for RecordingReporter {
    fn output(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    fn notice(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }

    fn problem(&mut self, message: &str) {
        self.problems.push(message.to_string());
    }
}
