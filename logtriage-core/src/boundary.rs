// Copyright (c) The logtriage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test-boundary model: which lines of the log belong to which test.

use crate::gtest::{Marker, MarkerKind};
use indexmap::IndexMap;
use logtriage_metadata::TestId;
use tracing::debug;

/// A half-open range of line indices, `[start, end)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LineRange {
    /// The index of the test's `RUN` marker.
    pub start: usize,
    /// One past the last line attributed to the test. This is the index
    /// just past the terminal marker, or the total line count if the test
    /// never reached one.
    pub end: usize,
}

impl LineRange {
    /// Returns true if the range contains the given line index.
    pub fn contains(&self, line: usize) -> bool {
        self.start <= line && line < self.end
    }
}

impl From<LineRange> for (usize, usize) {
    fn from(range: LineRange) -> Self {
        (range.start, range.end)
    }
}

/// A mapping from test identity to the line range the test occupied.
///
/// Built once from the marker stream, then mutated in place by the
/// detector when a crash with a stack trace implies the test never
/// finished. Entries keep marker order; range extension never disturbs
/// other entries.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BoundaryMap {
    ranges: IndexMap<TestId, LineRange>,
}

impl BoundaryMap {
    /// Builds the boundary map from a marker stream in a single linear
    /// scan.
    ///
    /// A `RUN` marker opens a boundary at its line. A terminal marker
    /// closes the open boundary for its test just past the terminal line,
    /// so attribution sees the terminal line as inside the test. Terminal
    /// markers with no matching open `RUN` are dropped; this tolerates
    /// malformed or interleaved logs without aborting detection. A second
    /// `RUN` for an identity that is still open closes the earlier
    /// boundary at the new `RUN`'s line. Boundaries still open after the
    /// last marker are closed at `line_count`.
    pub fn from_markers(markers: &[Marker], line_count: usize) -> Self {
        let mut open: IndexMap<TestId, usize> = IndexMap::new();
        let mut ranges = IndexMap::new();

        for marker in markers {
            match marker.kind {
                MarkerKind::Run => {
                    if let Some(start) = open.shift_remove(&marker.test) {
                        // Rerun: the earlier attempt never reached a
                        // terminal marker.
                        ranges.insert(
                            marker.test.clone(),
                            LineRange {
                                start,
                                end: marker.line,
                            },
                        );
                    }
                    open.insert(marker.test.clone(), marker.line);
                }
                MarkerKind::Ok | MarkerKind::Failed | MarkerKind::Skipped => {
                    match open.shift_remove(&marker.test) {
                        Some(start) => {
                            ranges.insert(
                                marker.test.clone(),
                                LineRange {
                                    start,
                                    end: marker.line + 1,
                                },
                            );
                        }
                        None => {
                            debug!(
                                test = %marker.test,
                                line = marker.line,
                                "terminal marker without matching RUN, dropping",
                            );
                        }
                    }
                }
            }
        }

        for (test, start) in open {
            ranges.insert(
                test,
                LineRange {
                    start,
                    end: line_count,
                },
            );
        }

        Self { ranges }
    }

    /// Returns the boundary for the given test, if any.
    pub fn get(&self, test: &TestId) -> Option<LineRange> {
        self.ranges.get(test).copied()
    }

    /// Returns the test whose boundary contains the given line, if any.
    pub fn containing(&self, line: usize) -> Option<(&TestId, LineRange)> {
        self.ranges
            .iter()
            .find(|(_, range)| range.contains(line))
            .map(|(test, range)| (test, *range))
    }

    /// Extends the end of a test's boundary in place, if the test has one.
    ///
    /// The end is only ever moved forward. Returns true if the test had a
    /// boundary.
    pub fn extend_end(&mut self, test: &TestId, end: usize) -> bool {
        match self.ranges.get_mut(test) {
            Some(range) => {
                range.end = range.end.max(end);
                true
            }
            None => false,
        }
    }

    /// Iterates over all boundaries in marker order.
    pub fn iter(&self) -> impl Iterator<Item = (&TestId, LineRange)> + '_ {
        self.ranges.iter().map(|(test, range)| (test, *range))
    }

    /// Returns the number of boundaries.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Returns true if the map has no boundaries.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn marker(kind: MarkerKind, test: &str, line: usize) -> Marker {
        Marker {
            kind,
            test: test.into(),
            line,
        }
    }

    #[test]
    fn terminal_closes_past_marker_line() {
        let markers = vec![
            marker(MarkerKind::Run, "Suite.A", 0),
            marker(MarkerKind::Ok, "Suite.A", 5),
            marker(MarkerKind::Run, "Suite.B", 6),
            marker(MarkerKind::Failed, "Suite.B", 9),
        ];
        let boundaries = BoundaryMap::from_markers(&markers, 20);

        assert_eq!(
            boundaries.get(&"Suite.A".into()),
            Some(LineRange { start: 0, end: 6 }),
        );
        assert_eq!(
            boundaries.get(&"Suite.B".into()),
            Some(LineRange { start: 6, end: 10 }),
        );
        // The terminal marker line is inside the test.
        assert_eq!(
            boundaries.containing(5).map(|(t, _)| t.as_str()),
            Some("Suite.A"),
        );
        assert_eq!(boundaries.containing(10), None);
    }

    #[test]
    fn open_boundary_closed_at_line_count() {
        let markers = vec![marker(MarkerKind::Run, "Suite.Hangs", 3)];
        let boundaries = BoundaryMap::from_markers(&markers, 12);
        assert_eq!(
            boundaries.get(&"Suite.Hangs".into()),
            Some(LineRange { start: 3, end: 12 }),
        );
    }

    #[test]
    fn unmatched_terminal_dropped() {
        let markers = vec![
            marker(MarkerKind::Failed, "Suite.Phantom", 2),
            marker(MarkerKind::Run, "Suite.Real", 4),
            marker(MarkerKind::Ok, "Suite.Real", 6),
        ];
        let boundaries = BoundaryMap::from_markers(&markers, 10);
        assert_eq!(boundaries.len(), 1);
        assert_eq!(boundaries.get(&"Suite.Phantom".into()), None);
    }

    #[test]
    fn rerun_closes_earlier_boundary() {
        let markers = vec![
            marker(MarkerKind::Run, "Suite.Flaky", 0),
            marker(MarkerKind::Run, "Suite.Flaky", 7),
            marker(MarkerKind::Ok, "Suite.Flaky", 9),
        ];
        let boundaries = BoundaryMap::from_markers(&markers, 15);
        // The second attempt's boundary wins; the first attempt's window
        // was closed at the second RUN's line and then superseded.
        assert_eq!(
            boundaries.get(&"Suite.Flaky".into()),
            Some(LineRange { start: 7, end: 10 }),
        );
    }

    #[test]
    fn extend_end_moves_forward_only() {
        let markers = vec![
            marker(MarkerKind::Run, "Suite.A", 0),
            marker(MarkerKind::Ok, "Suite.A", 4),
        ];
        let mut boundaries = BoundaryMap::from_markers(&markers, 30);

        assert!(boundaries.extend_end(&"Suite.A".into(), 30));
        assert_eq!(
            boundaries.get(&"Suite.A".into()),
            Some(LineRange { start: 0, end: 30 }),
        );

        // Shrinking is a no-op.
        assert!(boundaries.extend_end(&"Suite.A".into(), 2));
        assert_eq!(
            boundaries.get(&"Suite.A".into()),
            Some(LineRange { start: 0, end: 30 }),
        );

        assert!(!boundaries.extend_end(&"Suite.Missing".into(), 30));
    }

    #[test]
    fn empty_markers() {
        let boundaries = BoundaryMap::from_markers(&[], 0);
        assert!(boundaries.is_empty());
        assert_eq!(boundaries.containing(0), None);
    }
}
