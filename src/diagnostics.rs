//! Side channel for decode diagnostics.
//!
//! Decoding never fails; the only thing it reports is a [`Warning`] for each
//! required field it had to leave absent. Where those go is up to the
//! [`DiagnosticSink`]: the log, an in-memory [`Collector`], or both.
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// `log` target used by [`LogSink`].
pub const LOG_TARGET: &str = "softboiled";

/// A required field that was missing from the input and is now absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Name of the record shape being decoded.
    pub record: String,
    pub field: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "required key missing, now absent: '{}'", self.field)
    }
}

/// Receiver of decode warnings. Must never influence the decode result.
pub trait DiagnosticSink {
    fn warn(&self, warning: Warning);
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &S {
    fn warn(&self, warning: Warning) {
        (**self).warn(warning)
    }
}

/// Fan out to two sinks.
impl<A: DiagnosticSink, B: DiagnosticSink> DiagnosticSink for (A, B) {
    fn warn(&self, warning: Warning) {
        self.0.warn(warning.clone());
        self.1.warn(warning);
    }
}

/// Emits every warning through `log::warn!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn warn(&self, warning: Warning) {
        log::warn!(target: LOG_TARGET, "{}: {warning}", warning.record);
    }
}

/// Keeps warnings in memory, in emission order.
#[derive(Debug, Default)]
pub struct Collector {
    warnings: Mutex<Vec<Warning>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.lock().clone()
    }

    /// Field names of the collected warnings.
    pub fn fields(&self) -> Vec<String> {
        self.lock().iter().map(|w| w.field.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Warning>> {
        self.warnings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DiagnosticSink for Collector {
    fn warn(&self, warning: Warning) {
        self.lock().push(warning);
    }
}
