// Copyright (c) The logtriage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Random access over a linearized log.

/// An ordered, finite, index-addressable sequence of log lines.
///
/// The detector performs bounded look-aheads around crash lines, so random
/// access by line index is required rather than one-shot iteration.
/// Implementations are provided for slice references, arrays and vectors
/// of anything string-like, which covers the common case of a log file
/// split into lines up front. Each implementing type is `Sized`, so a
/// reference to it coerces to the `&dyn LogSource` the detector is
/// constructed over.
pub trait LogSource {
    /// Returns the total number of lines.
    fn line_count(&self) -> usize;

    /// Returns the line at the given zero-based index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.line_count()`.
    fn line(&self, index: usize) -> &str;
}

impl<S: AsRef<str>> LogSource for &[S] {
    fn line_count(&self) -> usize {
        self.len()
    }

    fn line(&self, index: usize) -> &str {
        self[index].as_ref()
    }
}

impl<S: AsRef<str>, const N: usize> LogSource for [S; N] {
    fn line_count(&self) -> usize {
        N
    }

    fn line(&self, index: usize) -> &str {
        self[index].as_ref()
    }
}

impl<S: AsRef<str>> LogSource for Vec<S> {
    fn line_count(&self) -> usize {
        self.len()
    }

    fn line(&self, index: usize) -> &str {
        self[index].as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_source() {
        let lines = ["first", "", "  third  "];
        let source: &dyn LogSource = &lines;
        assert_eq!(source.line_count(), 3);
        assert_eq!(source.line(0), "first");
        assert_eq!(source.line(1), "");
        assert_eq!(source.line(2), "  third  ");
    }

    #[test]
    fn slice_reference_source() {
        let lines = vec!["a", "b", "c"];
        let slice: &[&str] = &lines;
        let source: &dyn LogSource = &slice;
        assert_eq!(source.line_count(), 3);
        assert_eq!(source.line(2), "c");
    }

    #[test]
    fn vec_of_strings_source() {
        let lines: Vec<String> = vec!["a".to_owned(), "b".to_owned()];
        let source: &dyn LogSource = &lines;
        assert_eq!(source.line_count(), 2);
        assert_eq!(source.line(1), "b");
    }

    #[test]
    fn empty_source() {
        let lines: [&str; 0] = [];
        let source: &dyn LogSource = &lines;
        assert_eq!(source.line_count(), 0);
    }
}
