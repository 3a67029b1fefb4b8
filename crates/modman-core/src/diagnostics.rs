//! Diagnostic stream for a single build invocation.
//!
//! Every entry is kept for the caller and also emitted as a `tracing` event,
//! so a subscriber sees the same messages the build log does. The run fails
//! iff at least one error-severity entry was pushed.

use std::fmt;
use std::path::{Path, PathBuf};

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// `Error` for error-reporting policies, `Warning` otherwise.
    #[must_use]
    pub fn for_policy(is_error: bool) -> Self {
        if is_error {
            Self::Error
        } else {
            Self::Warning
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single diagnostic entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// File the diagnostic originates from, usually the project file.
    pub file: Option<PathBuf>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}: {}: {}", file.display(), self.severity, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Collects diagnostics for one run.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    warnings_as_errors: bool,
    default_file: Option<PathBuf>,
}

impl Diagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Upgrade every warning pushed from now on to an error.
    #[must_use]
    pub fn with_warnings_as_errors(mut self, enabled: bool) -> Self {
        self.warnings_as_errors = enabled;
        self
    }

    /// File attributed to diagnostics that do not name one.
    #[must_use]
    pub fn with_default_file(mut self, file: Option<PathBuf>) -> Self {
        self.default_file = file;
        self
    }

    /// Push a diagnostic attributed to the default file.
    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        let file = self.default_file.clone();
        self.push_entry(severity, message.into(), file);
    }

    /// Push a diagnostic attributed to a specific file.
    pub fn push_at(&mut self, severity: Severity, message: impl Into<String>, file: &Path) {
        self.push_entry(severity, message.into(), Some(file.to_path_buf()));
    }

    /// Push a diagnostic attributed to `file`, or to the default file when
    /// `file` is `None`.
    pub fn push_for(&mut self, severity: Severity, message: impl Into<String>, file: Option<&Path>) {
        match file {
            Some(file) => self.push_at(severity, message, file),
            None => self.push(severity, message),
        }
    }

    fn push_entry(&mut self, severity: Severity, message: String, file: Option<PathBuf>) {
        let severity = if self.warnings_as_errors && severity == Severity::Warning {
            Severity::Error
        } else {
            severity
        };

        let location = file.as_deref().map(Path::display);
        match severity {
            Severity::Trace => tracing::trace!(file = ?location, "{message}"),
            Severity::Debug => tracing::debug!(file = ?location, "{message}"),
            Severity::Info => tracing::info!(file = ?location, "{message}"),
            Severity::Warning => tracing::warn!(file = ?location, "{message}"),
            Severity::Error => tracing::error!(file = ?location, "{message}"),
        }

        self.entries.push(Diagnostic {
            severity,
            message,
            file,
        });
    }

    pub fn trace(&mut self, message: impl Into<String>) {
        self.push(Severity::Trace, message);
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        self.push(Severity::Debug, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    /// Whether any error-severity diagnostic was pushed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    /// Number of diagnostics with the given severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|d| d.severity == severity).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }
}
