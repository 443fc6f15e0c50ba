//! Per-line pattern matching over build output
//!
//! Every category is evaluated independently, so one line can be a phase
//! change and a diagnostic at the same time. Classification borrows the line
//! and never mutates it. Numeric captures that fail to parse are treated as
//! "no match" for that category.

use crate::analysis::diagnostics::Severity;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Keyword → phase label rule; the first rule with any matching keyword wins
#[derive(Debug, Clone, Copy)]
pub struct PhaseRule {
    pub keywords: &'static [&'static str],
    pub label: &'static str,
}

/// Ordered phase rules. More specific markers come before generic ones.
pub const PHASE_RULES: &[PhaseRule] = &[
    PhaseRule {
        keywords: &["PhaseScriptExecution"],
        label: "Running Scripts",
    },
    PhaseRule {
        keywords: &[
            "CompileSwiftSources",
            "CompileSwift ",
            "SwiftCompile ",
            "SwiftDriver",
            "SwiftEmitModule",
        ],
        label: "Compiling Swift",
    },
    PhaseRule {
        keywords: &["CompileC "],
        label: "Compiling C/Objective-C",
    },
    PhaseRule {
        keywords: &["CompileAssetCatalog"],
        label: "Compiling Assets",
    },
    PhaseRule {
        keywords: &["CompileStoryboard", "CompileXIB", "LinkStoryboards"],
        label: "Compiling Interface Files",
    },
    PhaseRule {
        keywords: &["Ld ", "Linking "],
        label: "Linking",
    },
    PhaseRule {
        keywords: &["CopySwiftLibs", "CpResource", "CopyPlistFile", "Copy "],
        label: "Copying Resources",
    },
    PhaseRule {
        keywords: &["ProcessInfoPlistFile", "ProcessProductPackaging"],
        label: "Processing Files",
    },
    PhaseRule {
        keywords: &["CodeSign "],
        label: "Code Signing",
    },
    PhaseRule {
        keywords: &["Resolve Package Graph", "Fetching ", "Resolving "],
        label: "Resolving Dependencies",
    },
    PhaseRule {
        keywords: &["Test Suite ", "Testing "],
        label: "Testing",
    },
    PhaseRule {
        keywords: &["Compiling "],
        label: "Compiling Sources",
    },
];

const START_MARKERS: &[&str] = &[
    "=== BUILD",
    "Build settings from command line",
    "Building for ",
    "Planning build",
];

const SUCCESS_MARKERS: &[&str] = &[
    "** BUILD SUCCEEDED **",
    "** TEST SUCCEEDED **",
    "** ARCHIVE SUCCEEDED **",
    "Build complete!",
];

const FAILURE_MARKERS: &[&str] = &[
    "** BUILD FAILED **",
    "** TEST FAILED **",
    "** ARCHIVE FAILED **",
    "error: fatalError",
];

/// Checked from most to least severe
const DIAGNOSTIC_SEVERITIES: &[Severity] = &[
    Severity::Critical,
    Severity::Error,
    Severity::Warning,
    Severity::Info,
];

/// Build lifecycle marker carried by a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMarker {
    Started,
    Succeeded,
    Failed,
}

/// `Compiling File.swift (current/total)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileProgress {
    pub file: String,
    pub current: u64,
    /// Declared count for the current compilation batch, not the whole build
    pub total: u64,
}

/// Tags produced for one line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineSignals {
    /// New target named by a "build target X of project" line
    pub target: Option<String>,
    pub phase: Option<&'static str>,
    pub file_progress: Option<FileProgress>,
    /// Filename reported by a compile step, with or without a counter
    pub compiled_file: Option<String>,
    /// Fraction in `[0, 1]` taken from an `NN%` token
    pub percent: Option<f64>,
    pub diagnostic: Option<Severity>,
    pub marker: Option<BuildMarker>,
}

impl LineSignals {
    pub fn is_empty(&self) -> bool {
        self.target.is_none()
            && self.phase.is_none()
            && self.file_progress.is_none()
            && self.compiled_file.is_none()
            && self.percent.is_none()
            && self.diagnostic.is_none()
            && self.marker.is_none()
    }

    /// Target, phase, file or percent signal present
    pub fn has_progress_signal(&self) -> bool {
        self.target.is_some()
            || self.phase.is_some()
            || self.file_progress.is_some()
            || self.percent.is_some()
    }
}

fn target_regex() -> &'static Regex {
    static TARGET_REGEX: OnceLock<Regex> = OnceLock::new();
    TARGET_REGEX.get_or_init(|| {
        Regex::new(r"(?i)build target\s+(.+?)\s+of project").expect("valid regex")
    })
}

fn file_progress_regex() -> &'static Regex {
    static FILE_PROGRESS_REGEX: OnceLock<Regex> = OnceLock::new();
    FILE_PROGRESS_REGEX.get_or_init(|| {
        Regex::new(r"Compiling\s+([^\s()]+)\s*\((\d+)\s*/\s*(\d+)\)").expect("valid regex")
    })
}

fn compiling_file_regex() -> &'static Regex {
    static COMPILING_FILE_REGEX: OnceLock<Regex> = OnceLock::new();
    COMPILING_FILE_REGEX.get_or_init(|| {
        Regex::new(r"\bCompiling\s+([^\s()]+\.[A-Za-z0-9+]+)\b").expect("valid regex")
    })
}

fn compile_swift_regex() -> &'static Regex {
    static COMPILE_SWIFT_REGEX: OnceLock<Regex> = OnceLock::new();
    COMPILE_SWIFT_REGEX.get_or_init(|| {
        Regex::new(r"^\s*CompileSwift\s+\S+\s+\S+\s+(\S+\.swift)\b").expect("valid regex")
    })
}

fn percent_regex() -> &'static Regex {
    static PERCENT_REGEX: OnceLock<Regex> = OnceLock::new();
    PERCENT_REGEX.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("valid regex"))
}

/// Stateless line classifier
#[derive(Debug, Default, Clone, Copy)]
pub struct LineClassifier;

impl LineClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, line: &str) -> LineSignals {
        let file_progress = self.file_progress(line);
        let compiled_file = file_progress
            .as_ref()
            .map(|p| p.file.clone())
            .or_else(|| self.compiled_file(line));

        LineSignals {
            target: self.target(line),
            phase: self.phase(line),
            file_progress,
            compiled_file,
            percent: self.percent(line),
            diagnostic: self.diagnostic(line),
            marker: self.marker(line),
        }
    }

    pub fn target(&self, line: &str) -> Option<String> {
        let caps = target_regex().captures(line)?;
        let name = caps.get(1)?.as_str().trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }

    pub fn phase(&self, line: &str) -> Option<&'static str> {
        PHASE_RULES
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| line.contains(k)))
            .map(|rule| rule.label)
    }

    pub fn file_progress(&self, line: &str) -> Option<FileProgress> {
        if !line.contains("Compiling") {
            return None;
        }
        let caps = file_progress_regex().captures(line)?;
        let current = caps.get(2)?.as_str().parse::<u64>().ok()?;
        let total = caps.get(3)?.as_str().parse::<u64>().ok()?;

        Some(FileProgress {
            file: caps.get(1)?.as_str().to_string(),
            current,
            total,
        })
    }

    pub fn compiled_file(&self, line: &str) -> Option<String> {
        compiling_file_regex()
            .captures(line)
            .or_else(|| compile_swift_regex().captures(line))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    pub fn percent(&self, line: &str) -> Option<f64> {
        if !(line.contains("Compiling") || line.contains("Building")) {
            return None;
        }
        let caps = percent_regex().captures(line)?;
        let value = caps.get(1)?.as_str().parse::<f64>().ok()?;
        if !(0.0..=100.0).contains(&value) {
            return None;
        }
        Some(value / 100.0)
    }

    pub fn diagnostic(&self, line: &str) -> Option<Severity> {
        DIAGNOSTIC_SEVERITIES
            .iter()
            .copied()
            .find(|severity| line.contains(severity.separator()))
    }

    pub fn marker(&self, line: &str) -> Option<BuildMarker> {
        if FAILURE_MARKERS.iter().any(|m| line.contains(m)) {
            Some(BuildMarker::Failed)
        } else if SUCCESS_MARKERS.iter().any(|m| line.contains(m)) {
            Some(BuildMarker::Succeeded)
        } else if START_MARKERS.iter().any(|m| line.contains(m)) {
            Some(BuildMarker::Started)
        } else {
            None
        }
    }
}
