// Copyright (c) The logtriage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The issue detector: scans a log, classifies anomalies and attributes
//! them to tests.
//!
//! [`IssueDetector`] consumes four injected inputs (the log source, the
//! marker stream, the pattern library and the stack-trace classifier) and
//! produces an ordered list of [`IssueEvent`]s plus the final
//! [`BoundaryMap`]. Detection runs three passes:
//!
//! 1. A line-by-line scan applying the pattern library, with crash
//!    special-casing: a bounded look-ahead for stack-trace frames (which
//!    marks the crash as terminal for its test) and coalescing of the
//!    signal report that follows a fatal condition.
//! 2. A `gtest-fail` event for every `FAILED` marker.
//! 3. Incomplete-test inference for tests that started but never reached
//!    a terminal marker.
//!
//! The pass order is load-bearing: boundary mutation from the first pass
//! must be visible to the incomplete-test pass, so the `context` ranges it
//! reports reflect crashes that kept a test from finishing.
//!
//! Detection is infallible: malformed markers and unrecognized lines are
//! tolerated so that a partially corrupted log still yields a partial
//! report.

use crate::{
    boundary::BoundaryMap,
    gtest::{GtestParser, Marker, MarkerKind},
    patterns::{PatternLibrary, SIGNAL_GROUP, StackClassifier},
    signature,
    source::LogSource,
};
use logtriage_metadata::{IssueEvent, IssueKind, TestId};
use smol_str::SmolStr;
use std::collections::{BTreeSet, HashSet};
use tracing::trace;

/// How many lines after a crash are examined for stack-trace frames.
const STACK_LOOKAHEAD_LINES: usize = 10;

/// How many lines after a `FATAL` crash are examined for the signal
/// report it subsumes.
const SIGNAL_LOOKAHEAD_LINES: usize = 20;

/// The synthetic signal assigned when the crash pattern matches without a
/// captured signal name.
const FATAL_SIGNAL: &str = "FATAL";

const CAUGHT_SIGNAL_NEEDLE: &str = "Caught signal:";
const RECEIVED_SIGNAL_NEEDLE: &str = "received signal";

/// Scans a log for issues and correlates them with test boundaries.
///
/// The detector owns none of its inputs; it is constructed over borrowed
/// sources, driven to completion with [`detect`](Self::detect), and read
/// out. To process multiple logs in parallel, instantiate one detector
/// per log; no state is shared across instances.
pub struct IssueDetector<'a> {
    source: &'a dyn LogSource,
    patterns: &'a PatternLibrary,
    stack: &'a dyn StackClassifier,
    markers: Vec<Marker>,
    boundaries: BoundaryMap,
    events: Vec<IssueEvent>,
    detected: bool,
}

impl<'a> IssueDetector<'a> {
    /// Creates a detector over the given inputs.
    ///
    /// The marker stream is materialized once up front; it feeds both
    /// boundary construction and the secondary passes. Markers must be in
    /// ascending line order and consistent with the log source.
    pub fn new(
        source: &'a dyn LogSource,
        markers: impl IntoIterator<Item = Marker>,
        patterns: &'a PatternLibrary,
        stack: &'a dyn StackClassifier,
    ) -> Self {
        let markers: Vec<Marker> = markers.into_iter().collect();
        let boundaries = BoundaryMap::from_markers(&markers, source.line_count());
        Self {
            source,
            patterns,
            stack,
            markers,
            boundaries,
            events: Vec::new(),
            detected: false,
        }
    }

    /// Creates a detector that parses its own gtest markers out of the
    /// log source.
    pub fn with_gtest_markers(
        source: &'a dyn LogSource,
        patterns: &'a PatternLibrary,
        stack: &'a dyn StackClassifier,
    ) -> Self {
        let markers: Vec<Marker> = GtestParser::new(source).collect();
        Self::new(source, markers, patterns, stack)
    }

    /// Runs detection.
    ///
    /// Never fails; findings are reported as data through
    /// [`events`](Self::events) and [`boundaries`](Self::boundaries).
    /// Calling `detect` a second time is a no-op.
    pub fn detect(&mut self) {
        if self.detected {
            return;
        }
        self.detected = true;

        self.primary_scan();
        self.gtest_failure_pass();
        self.incomplete_test_pass();
    }

    /// The detected events, in emission order: primary-scan events by
    /// ascending line index, then `gtest-fail` events in marker order,
    /// then `incomplete-test` events in marker order.
    pub fn events(&self) -> &[IssueEvent] {
        &self.events
    }

    /// The boundary map, including any extensions applied by crash
    /// handling.
    pub fn boundaries(&self) -> &BoundaryMap {
        &self.boundaries
    }

    /// Consumes the detector, returning the events and the final
    /// boundaries.
    pub fn into_parts(self) -> (Vec<IssueEvent>, BoundaryMap) {
        (self.events, self.boundaries)
    }

    /// The line-by-line pass: applies the pattern library to every line,
    /// first match wins, at most one issue per line.
    fn primary_scan(&mut self) {
        let source = self.source;
        let patterns = self.patterns;
        let line_count = source.line_count();

        // Lines coalesced into an earlier FATAL crash.
        let mut ignored: BTreeSet<usize> = BTreeSet::new();
        // Attribution fallback for lines in the gaps between boundaries.
        // Updated whenever the scan enters a boundary, never cleared.
        let mut last_running_test: Option<TestId> = None;

        for index in 0..line_count {
            if ignored.contains(&index) {
                continue;
            }

            let current_test = self
                .boundaries
                .containing(index)
                .map(|(test, _)| test.clone());
            if let Some(test) = &current_test {
                last_running_test = Some(test.clone());
            }

            let line = source.line(index);
            let Some((kind, captures)) = patterns.first_match(line) else {
                continue;
            };
            let kind = kind.clone();
            let raw_line = line.trim().to_owned();
            let test = current_test.or_else(|| last_running_test.clone());

            if kind == IssueKind::Crash {
                let signal: SmolStr = match captures.name(SIGNAL_GROUP) {
                    Some(name) => name.as_str().into(),
                    None => SmolStr::new_static(FATAL_SIGNAL),
                };
                self.emit_crash(index, raw_line, test, signal, &mut ignored);
            } else {
                let grouping_key = signature::grouping_key(&raw_line);
                self.events.push(IssueEvent {
                    line_index: index,
                    kind,
                    test,
                    raw_line,
                    grouping_key,
                    signal: None,
                    test_start: None,
                    context: None,
                });
            }
        }
    }

    /// Crash handling: stack-trace look-ahead and FATAL/signal
    /// coalescing. The two look-aheads are independent and may both apply
    /// to the same crash.
    fn emit_crash(
        &mut self,
        index: usize,
        raw_line: String,
        test: Option<TestId>,
        signal: SmolStr,
        ignored: &mut BTreeSet<usize>,
    ) {
        let source = self.source;
        let line_count = source.line_count();

        let stack_end = line_count.min(index + 1 + STACK_LOOKAHEAD_LINES);
        let with_stack = (index + 1..stack_end)
            .any(|lookahead| self.stack.is_stack_trace_line(source.line(lookahead)));

        let grouping_key = if with_stack {
            // The crash kept the test from reaching its terminal marker;
            // everything after it belongs to the dying test.
            if let Some(test) = &test
                && self.boundaries.extend_end(test, line_count)
            {
                trace!(
                    test = %test,
                    line = index,
                    "crash with stack trace, extending boundary to end of log",
                );
            }
            // Stacked crashes are never collapsed with each other.
            signature::crash_with_stack_key(&IssueKind::Crash, index)
        } else {
            signature::grouping_key(&raw_line)
        };

        if signal == FATAL_SIGNAL {
            let signal_end = line_count.min(index + 1 + SIGNAL_LOOKAHEAD_LINES);
            for lookahead in index + 1..signal_end {
                let line = source.line(lookahead);
                if line.contains(CAUGHT_SIGNAL_NEEDLE) || line.contains(RECEIVED_SIGNAL_NEEDLE) {
                    trace!(
                        crash_line = index,
                        signal_line = lookahead,
                        "coalescing signal report into fatal crash",
                    );
                    ignored.insert(lookahead);
                    // Only the first follow-up is coalesced.
                    break;
                }
            }
        }

        self.events.push(IssueEvent {
            line_index: index,
            kind: IssueKind::Crash,
            test,
            raw_line,
            grouping_key,
            signal: Some(signal),
            test_start: None,
            context: None,
        });
    }

    /// Emits a `gtest-fail` event for every `FAILED` marker, independent
    /// of whether the primary pass matched anything on that line.
    fn gtest_failure_pass(&mut self) {
        let source = self.source;
        let line_count = source.line_count();

        let failed: Vec<Marker> = self
            .markers
            .iter()
            .filter(|marker| marker.kind == MarkerKind::Failed)
            .cloned()
            .collect();

        for marker in failed {
            let raw_line = if marker.line < line_count {
                source.line(marker.line).trim().to_owned()
            } else {
                String::new()
            };
            let grouping_key = signature::grouping_key(&raw_line);
            let test_start = self.boundaries.get(&marker.test).map(|range| range.start);
            self.events.push(IssueEvent {
                line_index: marker.line,
                kind: IssueKind::GtestFail,
                test: Some(marker.test),
                raw_line,
                grouping_key,
                signal: None,
                test_start,
                context: None,
            });
        }
    }

    /// Emits an `incomplete-test` event for every test that ran but never
    /// reached a terminal marker. The reported context is the boundary as
    /// it stands after crash handling.
    fn incomplete_test_pass(&mut self) {
        let source = self.source;
        let line_count = source.line_count();

        let finished: HashSet<&TestId> = self
            .markers
            .iter()
            .filter(|marker| marker.kind.is_terminal())
            .map(|marker| &marker.test)
            .collect();

        let mut emitted: HashSet<&TestId> = HashSet::new();
        let mut events: Vec<IssueEvent> = Vec::new();
        for marker in &self.markers {
            if marker.kind != MarkerKind::Run
                || finished.contains(&marker.test)
                || !emitted.insert(&marker.test)
            {
                continue;
            }
            let Some(range) = self.boundaries.get(&marker.test) else {
                continue;
            };
            let raw_line = if range.start < line_count {
                source.line(range.start).trim().to_owned()
            } else {
                String::new()
            };
            let grouping_key = signature::grouping_key(&raw_line);
            events.push(IssueEvent {
                line_index: range.start,
                kind: IssueKind::IncompleteTest,
                test: Some(marker.test.clone()),
                raw_line,
                grouping_key,
                signal: None,
                test_start: None,
                context: Some(range.into()),
            });
        }
        self.events.extend(events);
    }
}

impl std::fmt::Debug for IssueDetector<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssueDetector")
            .field("line_count", &self.source.line_count())
            .field("markers", &self.markers)
            .field("boundaries", &self.boundaries)
            .field("events", &self.events)
            .field("detected", &self.detected)
            .finish_non_exhaustive()
    }
}
