// Copyright (c) The logtriage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to logtriage machine-readable output.
//!
//! This crate defines the output surface of the logtriage detector: the
//! issue events it emits and the identifiers they refer to. Downstream
//! tooling persists these events and groups them by
//! [`grouping_key`](IssueEvent::grouping_key), so the serialized forms in
//! this crate are compatibility-sensitive: changing a wire name or the
//! canonicalization rules behind the grouping key is a breaking change for
//! any stored issue database.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smol_str::SmolStr;
use std::fmt;

/// An opaque identifier for a test case, as reported by gtest.
///
/// Identity comparison is exact string equality; no normalization is
/// performed. A typical value looks like `SuiteName.TestName`, with
/// parameterized and typed instantiations adding `/`-separated segments.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestId(SmolStr);

impl TestId {
    /// Creates a new test identifier.
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TestId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TestId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// The kind of issue an [`IssueEvent`] describes.
///
/// `Crash`, `GtestFail` and `IncompleteTest` receive dedicated handling in
/// the detector. Every other kind comes from the injected pattern library
/// and shares the same generic handling; such kinds are represented as
/// `Library` with the name the library registered them under.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum IssueKind {
    /// A crash or fatal condition, possibly carrying a signal name.
    Crash,
    /// A test reported as failed by its gtest terminal marker.
    GtestFail,
    /// A test that started but never reached a terminal marker.
    IncompleteTest,
    /// A kind defined by the injected pattern library.
    Library(SmolStr),
}

impl IssueKind {
    /// Creates a library-defined kind with the given name.
    pub fn library(name: impl Into<SmolStr>) -> Self {
        Self::Library(name.into())
    }

    /// Returns the stable wire name for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Crash => "crash",
            Self::GtestFail => "gtest-fail",
            Self::IncompleteTest => "incomplete-test",
            Self::Library(name) => name,
        }
    }

    /// Parses a wire name, mapping the three built-in names to their
    /// dedicated variants and anything else to a library kind.
    pub fn from_name(name: &str) -> Self {
        match name {
            "crash" => Self::Crash,
            "gtest-fail" => Self::GtestFail,
            "incomplete-test" => Self::IncompleteTest,
            other => Self::Library(other.into()),
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for IssueKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for IssueKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = SmolStr::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

/// A single anomaly detected in a build log.
///
/// Events are append-only: the detector never mutates an event after
/// emitting it. Optional fields are populated per kind, as documented on
/// each field.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IssueEvent {
    /// The zero-based index of the line this event was detected on.
    pub line_index: usize,

    /// The kind of issue.
    pub kind: IssueKind,

    /// The test this event is attributed to, if any.
    ///
    /// This is the test whose boundary contains `line_index`, falling back
    /// to the most recently running test for lines in the gaps between
    /// test boundaries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<TestId>,

    /// The original log line, with leading and trailing whitespace
    /// stripped.
    pub raw_line: String,

    /// The structural fingerprint used to collapse repeated, equivalent
    /// issues across runs.
    pub grouping_key: String,

    /// The signal name for crash events (`"FATAL"` when the crash pattern
    /// matched without a signal). Present iff `kind` is
    /// [`IssueKind::Crash`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<SmolStr>,

    /// The line index of the test's `RUN` marker, carried for downstream
    /// diagnostics. Present iff `kind` is [`IssueKind::GtestFail`] and the
    /// test has a known boundary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_start: Option<usize>,

    /// The test's boundary at the time of emission, as a half-open
    /// `[start, end)` line range. Present iff `kind` is
    /// [`IssueKind::IncompleteTest`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<(usize, usize)>,
}
