// Copyright (c) The logtriage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by logtriage.
//!
//! Detection itself is infallible by design: malformed markers and
//! unmatchable lines are tolerated so that a partially corrupted log still
//! produces a partial report. The only fallible surface is pattern-library
//! construction.

use logtriage_metadata::IssueKind;
use thiserror::Error;

/// An error that occurred while building a [`PatternLibrary`].
///
/// [`PatternLibrary`]: crate::patterns::PatternLibrary
#[derive(Debug, Error)]
pub enum PatternLibraryError {
    /// The pattern for an issue kind failed to compile.
    #[error("failed to compile pattern for issue kind `{kind}`")]
    InvalidPattern {
        /// The kind the pattern was registered under.
        kind: IssueKind,
        /// The underlying regex error.
        #[source]
        error: Box<regex::Error>,
    },

    /// A crash pattern was registered without a `signal` capture group.
    ///
    /// The detector reads the signal name out of the named capture group
    /// `signal`; a crash pattern that cannot carry one would silently
    /// degrade every crash to `FATAL`.
    #[error("crash pattern does not define a `signal` capture group")]
    MissingSignalGroup,
}
