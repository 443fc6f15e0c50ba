//! Diagnostic records and extraction
//!
//! A diagnostic line looks like `/path/File.swift:10:3: error: message`. The
//! extractor splits it into a free-text location and a message; everything
//! after the severity separator is the message, embedded colons included.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a diagnostic, ordered `Info < Warning < Error < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Literal separator that marks a line as carrying this severity
    pub fn separator(&self) -> &'static str {
        match self {
            Severity::Info => ": note: ",
            Severity::Warning => ": warning: ",
            Severity::Error => ": error: ",
            Severity::Critical => ": fatal error: ",
        }
    }

    /// Errors and critical diagnostics both fail a build
    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error | Severity::Critical)
    }

    /// Parses a minimum-severity threshold; unrecognized values mean `Info`
    /// (no filtering).
    pub fn threshold(value: &str) -> Self {
        value.parse().unwrap_or(Severity::Info)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "info" | "note" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" | "fatal" => Ok(Severity::Critical),
            other => Err(format!(
                "Invalid severity '{}'. Valid options: info, warning, error, critical",
                other
            )),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse category of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticCategory {
    Build,
    Compilation,
    Linking,
    Dependency,
}

/// One extracted error/warning record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub category: DiagnosticCategory,
    pub message: String,
    /// File/line/column as free text, e.g. `/a/b.swift:10:3`
    pub location: String,
    /// 1-based position of the source line within the scanned stream
    pub line_number: usize,
}

impl Diagnostic {
    /// Whether this diagnostic passes a minimum-severity filter
    pub fn should_include(&self, minimum: Severity) -> bool {
        self.severity >= minimum
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] line {}: {} {}",
            self.severity, self.line_number, self.location, self.message
        )
    }
}

/// Turns a diagnostic-tagged line into a [`Diagnostic`]
#[derive(Debug, Default, Clone, Copy)]
pub struct DiagnosticExtractor;

impl DiagnosticExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extracts location and message. Never fails: a line without any `": "`
    /// becomes a diagnostic whose location is the whole line and whose
    /// message is empty.
    pub fn extract(&self, line: &str, severity: Severity, line_number: usize) -> Diagnostic {
        let (location, message) = split_diagnostic(line, severity.separator());

        Diagnostic {
            severity,
            category: DiagnosticCategory::Build,
            message,
            location,
            line_number,
        }
    }
}

fn split_diagnostic(line: &str, separator: &str) -> (String, String) {
    if let Some((location, message)) = line.split_once(separator) {
        return (location.trim().to_string(), message.trim().to_string());
    }

    let mut segments = line.split(": ");
    let location = segments.next().unwrap_or_default().trim().to_string();
    let message = segments.collect::<Vec<_>>().join(": ").trim().to_string();
    (location, message)
}
