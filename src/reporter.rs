//! User-facing progress output.
//!
//! Core operations announce what they are doing through a [`Reporter`] handed to them, so they
//! can run without a terminal in tests. Diagnostics go through `tracing` instead.

use std::io::Write;

use colored::*;

pub trait Reporter: Send + Sync {
    /// A step is starting.
    fn start(&self, msg: &str);
    fn info(&self, msg: &str);
    fn success(&self, msg: &str);
    fn error(&self, msg: &str);
}

/// Prints to the terminal. Errors go to stderr, everything else to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    fn line(&self, msg: String) {
        // Concurrent dispatch tasks report at the same time; keep lines whole.
        let stdout = std::io::stdout();
        let mut guard = stdout.lock();
        let _ = writeln!(guard, "{}", msg);
    }
}

impl Reporter for ConsoleReporter {
    fn start(&self, msg: &str) {
        self.line(format!("{} {}...", "→".cyan(), msg));
    }

    fn info(&self, msg: &str) {
        self.line(format!("{} {}", "→".cyan(), msg));
    }

    fn success(&self, msg: &str) {
        self.line(format!("{} {}", "✓".green(), msg));
    }

    fn error(&self, msg: &str) {
        eprintln!("{} {}", "✗".red(), msg);
    }
}
