// Copyright (c) The logtriage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The issue pattern library and the stack-trace predicate.
//!
//! A [`PatternLibrary`] is an *ordered* sequence of `(kind, regex)`
//! entries. Order is significant: the detector tries patterns in
//! registration order and the first successful match wins, so at most one
//! issue is emitted per line. The library shipped by
//! [`PatternLibrary::with_defaults`] is the one the detector is normally
//! run with; embedders can extend it or build their own from scratch.

use crate::errors::PatternLibraryError;
use logtriage_metadata::IssueKind;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// The named capture group a crash pattern reports the signal through.
///
/// When the group does not participate in a match, the crash is a generic
/// fatal condition and the detector assigns the synthetic signal
/// `"FATAL"`.
pub const SIGNAL_GROUP: &str = "signal";

const DEFAULT_CRASH_PATTERN: &str =
    r"(?:Caught signal:|received signal)\s+(?P<signal>\w+)|Check failed:|\[FATAL\b|FATAL ERROR";

static DEFAULT_LIBRARY: LazyLock<PatternLibrary> = LazyLock::new(|| {
    let mut library = PatternLibrary::new();
    let defaults: &[(IssueKind, &str)] = &[
        (IssueKind::Crash, DEFAULT_CRASH_PATTERN),
        (
            IssueKind::library("sanitizer"),
            r"ERROR: (?:Address|Leak|Memory|Thread|UndefinedBehavior)Sanitizer",
        ),
        (
            IssueKind::library("assert"),
            r"(?i)\bassertion (?:failed|failure)\b",
        ),
        (
            IssueKind::library("timeout"),
            r"(?i)\btimed out\b|\bTIMEOUT\b",
        ),
        (
            IssueKind::library("oom"),
            r"(?i)out of memory|cannot allocate memory",
        ),
    ];
    for (kind, pattern) in defaults {
        library
            .push(kind.clone(), pattern)
            .unwrap_or_else(|error| panic!("default pattern for `{kind}` is valid: {error}"));
    }
    library
});

/// A single `(kind, regex)` entry in a [`PatternLibrary`].
#[derive(Clone, Debug)]
pub struct PatternEntry {
    kind: IssueKind,
    regex: Regex,
}

impl PatternEntry {
    /// The issue kind this entry emits.
    pub fn kind(&self) -> &IssueKind {
        &self.kind
    }

    /// The compiled pattern.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// An ordered mapping from issue kind to compiled pattern.
#[derive(Clone, Debug, Default)]
pub struct PatternLibrary {
    entries: Vec<PatternEntry>,
}

impl PatternLibrary {
    /// Creates an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the library the detector is normally run with.
    ///
    /// Entries, in match order: `crash` (signals, caught-signal reports
    /// and fatal check failures), then the library kinds `sanitizer`,
    /// `assert`, `timeout` and `oom`.
    pub fn with_defaults() -> &'static Self {
        &DEFAULT_LIBRARY
    }

    /// Appends an entry to the library.
    ///
    /// The pattern must compile, and a pattern for [`IssueKind::Crash`]
    /// must define the [`SIGNAL_GROUP`] named capture group.
    pub fn push(&mut self, kind: IssueKind, pattern: &str) -> Result<(), PatternLibraryError> {
        let regex = Regex::new(pattern).map_err(|error| PatternLibraryError::InvalidPattern {
            kind: kind.clone(),
            error: Box::new(error),
        })?;
        if kind == IssueKind::Crash
            && !regex.capture_names().any(|name| name == Some(SIGNAL_GROUP))
        {
            return Err(PatternLibraryError::MissingSignalGroup);
        }
        self.entries.push(PatternEntry { kind, regex });
        Ok(())
    }

    /// Returns the first entry whose pattern matches the line, with its
    /// captures.
    ///
    /// Entries are tried in registration order; the first successful
    /// search terminates the scan.
    pub fn first_match<'l>(&self, line: &'l str) -> Option<(&IssueKind, Captures<'l>)> {
        self.entries
            .iter()
            .find_map(|entry| entry.regex.captures(line).map(|caps| (&entry.kind, caps)))
    }

    /// Iterates over the entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &PatternEntry> + '_ {
        self.entries.iter()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the library has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Classifies lines as stack-trace frames.
///
/// Used by the detector's bounded look-ahead after a crash: a crash
/// followed by stack frames is treated as terminal for its test.
pub trait StackClassifier {
    /// Returns true if the line is part of a stack trace.
    fn is_stack_trace_line(&self, line: &str) -> bool;
}

/// Adapts a plain predicate function into a [`StackClassifier`].
#[derive(Clone, Copy, Debug)]
pub struct StackClassifierFn<F>(pub F);

impl<F: Fn(&str) -> bool> StackClassifier for StackClassifierFn<F> {
    fn is_stack_trace_line(&self, line: &str) -> bool {
        (self.0)(line)
    }
}

static FRAME_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\d+\s+0x[0-9a-fA-F]{4,}\b").unwrap());

/// The default stack classifier: recognizes `#N 0xADDRESS symbol` frame
/// lines, with or without a bracketed log prefix.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameLineClassifier;

impl StackClassifier for FrameLineClassifier {
    fn is_stack_trace_line(&self, line: &str) -> bool {
        FRAME_LINE_REGEX.is_match(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn default_library_order() {
        let library = PatternLibrary::with_defaults();
        let kinds: Vec<&str> = library.iter().map(|entry| entry.kind().as_str()).collect();
        assert_eq!(
            kinds,
            vec!["crash", "sanitizer", "assert", "timeout", "oom"],
        );
    }

    #[test_case("Caught signal: SIGSEGV", Some("SIGSEGV"); "caught signal")]
    #[test_case("process received signal SIGABRT", Some("SIGABRT"); "received signal")]
    #[test_case("Check failed: foo == bar", None; "check failure")]
    #[test_case("[FATAL:main.cc(42)] giving up", None; "fatal log line")]
    fn default_crash_pattern(line: &str, signal: Option<&str>) {
        let library = PatternLibrary::with_defaults();
        let (kind, caps) = library.first_match(line).expect("crash pattern matches");
        assert_eq!(kind, &IssueKind::Crash);
        assert_eq!(caps.name(SIGNAL_GROUP).map(|m| m.as_str()), signal);
    }

    #[test_case("ERROR: AddressSanitizer: heap-use-after-free", "sanitizer")]
    #[test_case("Assertion failed: ptr != NULL", "assert")]
    #[test_case("test timed out after 60s", "timeout")]
    #[test_case("allocator: out of memory trying to allocate 4096 bytes", "oom")]
    fn default_library_kinds(line: &str, kind: &str) {
        let library = PatternLibrary::with_defaults();
        let (matched, _) = library.first_match(line).expect("pattern matches");
        assert_eq!(matched.as_str(), kind);
    }

    #[test]
    fn unmatched_line() {
        assert!(
            PatternLibrary::with_defaults()
                .first_match("[ RUN      ] SuiteA.Test1")
                .is_none()
        );
    }

    #[test]
    fn first_match_wins() {
        let mut library = PatternLibrary::new();
        library
            .push(IssueKind::library("first"), "err")
            .expect("pattern compiles");
        library
            .push(IssueKind::library("second"), "error")
            .expect("pattern compiles");

        let (kind, _) = library.first_match("an error occurred").expect("matches");
        assert_eq!(kind, &IssueKind::library("first"));
    }

    #[test]
    fn push_rejects_invalid_pattern() {
        let mut library = PatternLibrary::new();
        let error = library
            .push(IssueKind::library("broken"), "(unclosed")
            .expect_err("pattern must not compile");
        assert!(matches!(
            error,
            PatternLibraryError::InvalidPattern { .. }
        ));
    }

    #[test]
    fn push_rejects_crash_without_signal_group() {
        let mut library = PatternLibrary::new();
        let error = library
            .push(IssueKind::Crash, "Check failed:")
            .expect_err("crash pattern requires signal group");
        assert!(matches!(error, PatternLibraryError::MissingSignalGroup));
    }

    #[test]
    fn classifier_from_fn() {
        let classifier = StackClassifierFn(|line: &str| line.starts_with("  at "));
        assert!(classifier.is_stack_trace_line("  at frame_zero"));
        assert!(!classifier.is_stack_trace_line("#0 0xabcdef1234"));
    }

    #[test_case("#0 0xabcdef1234 some_function", true; "bare frame")]
    #[test_case("[0405/12:00:03] #1 0x00007f3a base::Run()", true; "prefixed frame")]
    #[test_case("item #3 of 7", false; "ordinal without address")]
    #[test_case("Test result: OK", false; "ordinary line")]
    fn frame_line_classifier(line: &str, expected: bool) {
        assert_eq!(FrameLineClassifier.is_stack_trace_line(line), expected);
    }
}
