//! Operator-facing progress reporting.
//!
//! A `Reporter` is handed to every component that announces progress. It is
//! either enabled (prints to stdout) or quiet; structured diagnostics always
//! go through `tracing` regardless.

use std::fmt::Display;
use std::future::Future;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Where reporter lines end up
#[derive(Clone)]
enum Sink {
    Stdout,
    Quiet,
    #[cfg(test)]
    Memory(Arc<Mutex<Vec<String>>>),
}

/// Progress reporter injected into each orchestration step
#[derive(Clone)]
pub struct Reporter {
    sink: Sink,
    // Serialises "doing X ... ok" pairs from concurrent steps.
    lock: Arc<Mutex<()>>,
}

impl Reporter {
    pub fn new(enabled: bool) -> Self {
        Self {
            sink: if enabled { Sink::Stdout } else { Sink::Quiet },
            lock: Arc::new(Mutex::new(())),
        }
    }

    #[cfg(test)]
    pub fn quiet() -> Self {
        Self::new(false)
    }

    #[cfg(test)]
    pub fn capturing() -> (Self, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let reporter = Self {
            sink: Sink::Memory(lines.clone()),
            lock: Arc::new(Mutex::new(())),
        };
        (reporter, lines)
    }

    /// Print one progress line
    pub fn say(&self, message: impl Display) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        match &self.sink {
            Sink::Stdout => {
                let mut out = std::io::stdout().lock();
                let _ = writeln!(out, "{message}");
            }
            Sink::Quiet => {}
            #[cfg(test)]
            Sink::Memory(lines) => lines
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(message.to_string()),
        }
    }

    /// Run `operation`, announcing `description` and its outcome.
    ///
    /// Prints `<description> ... ok` or `<description> ... failed: <error>`.
    /// If the future is dropped before it finishes (e.g. an interrupt won a
    /// `select!`), prints `<description> ... interrupted`.
    pub async fn step<T, E, F>(&self, description: impl Display, operation: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let description = description.to_string();
        tracing::debug!(step = %description, "starting");
        let mut pending = PendingStep {
            reporter: self,
            description: &description,
            finished: false,
        };

        let result = operation.await;
        pending.finished = true;

        match &result {
            Ok(_) => self.say(format_args!("{description} ... ok")),
            Err(e) => {
                tracing::debug!(step = %description, error = %e, "step failed");
                self.say(format_args!("{description} ... failed: {e}"));
            }
        }
        result
    }
}

/// Reports interruption if a step is dropped mid-flight
struct PendingStep<'a> {
    reporter: &'a Reporter,
    description: &'a str,
    finished: bool,
}

impl Drop for PendingStep<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.reporter
                .say(format_args!("{} ... interrupted", self.description));
        }
    }
}
