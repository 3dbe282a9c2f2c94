// Copyright (c) The logtriage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing of gtest lifecycle markers out of a log.
//!
//! gtest brackets every test case with lifecycle lines:
//!
//! ```text
//! [ RUN      ] SuiteName.TestName
//! [       OK ] SuiteName.TestName (15 ms)
//! [  FAILED  ] SuiteName.TestName (15 ms)
//! [  SKIPPED ] SuiteName.TestName (0 ms)
//! ```
//!
//! [`GtestParser`] scans a [`LogSource`] lazily and yields one [`Marker`]
//! per recognized lifecycle line, in ascending line order. Log lines may
//! carry a bracketed timestamp or log-level prefix before the marker;
//! aggregate lines such as `[  FAILED  ] 2 tests, listed below:` are not
//! markers and are skipped.
//!
//! Scanning stops at the `[==========] ... ran.` end-of-run line. The
//! tear-down summary after it repeats one `[  FAILED  ] SuiteName.TestName`
//! line per failing test (without a timing suffix); treating those as
//! markers would report every failure twice.

use crate::source::LogSource;
use logtriage_metadata::TestId;
use regex::Regex;
use std::sync::LazyLock;

static MARKER_LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\s*(RUN|OK|FAILED|SKIPPED)\s*\]\s+([A-Za-z0-9_/]+\.[A-Za-z0-9_./]+)").unwrap()
});

static RUN_END_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[==========\].*\bran\.").unwrap());

/// The point in the test lifecycle a [`Marker`] describes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum MarkerKind {
    /// The test is starting.
    Run,
    /// The test passed.
    Ok,
    /// The test failed.
    Failed,
    /// The test was skipped.
    Skipped,
}

impl MarkerKind {
    /// Returns true for the kinds that end a test (`Ok`, `Failed`,
    /// `Skipped`).
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Run)
    }
}

/// A structured record of a gtest lifecycle line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Marker {
    /// The lifecycle point.
    pub kind: MarkerKind,
    /// The test the marker refers to.
    pub test: TestId,
    /// The zero-based index of the originating log line.
    pub line: usize,
}

/// A lazy iterator over the gtest markers in a log.
///
/// Markers are yielded in ascending line order, at most one per line.
#[derive(Clone)]
pub struct GtestParser<'a> {
    source: &'a dyn LogSource,
    next_line: usize,
}

impl<'a> GtestParser<'a> {
    /// Creates a parser over the given log source.
    pub fn new(source: &'a dyn LogSource) -> Self {
        Self {
            source,
            next_line: 0,
        }
    }
}

impl std::fmt::Debug for GtestParser<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GtestParser")
            .field("line_count", &self.source.line_count())
            .field("next_line", &self.next_line)
            .finish_non_exhaustive()
    }
}

impl Iterator for GtestParser<'_> {
    type Item = Marker;

    fn next(&mut self) -> Option<Marker> {
        while self.next_line < self.source.line_count() {
            let line = self.next_line;
            self.next_line += 1;

            let text = self.source.line(line);
            if RUN_END_REGEX.is_match(text) {
                // End of the run; everything below is the tear-down
                // summary, which repeats the FAILED lines.
                self.next_line = self.source.line_count();
                return None;
            }
            let Some(captures) = MARKER_LINE_REGEX.captures(text) else {
                continue;
            };
            let kind = match &captures[1] {
                "RUN" => MarkerKind::Run,
                "OK" => MarkerKind::Ok,
                "FAILED" => MarkerKind::Failed,
                "SKIPPED" => MarkerKind::Skipped,
                other => unreachable!("marker regex matched unknown state {other}"),
            };
            return Some(Marker {
                kind,
                test: TestId::new(&captures[2]),
                line,
            });
        }
        None
    }
}
