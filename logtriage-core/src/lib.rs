// Copyright (c) The logtriage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core issue detection and test-boundary correlation for gtest build logs.
//!
//! The entry point is [`detector::IssueDetector`]: it scans a linearized
//! log, builds a model of test execution boundaries from gtest lifecycle
//! markers, classifies anomalies (crashes, fatal conditions, signals,
//! incomplete tests, per-test failures), and attributes each anomaly to
//! the test that was running when it occurred. Detected issues are
//! reported as [`logtriage_metadata::IssueEvent`] values; the machine
//! readable forms live in the `logtriage-metadata` crate.
//!
//! The detector owns none of its inputs. The log source, the marker
//! stream, the pattern library and the stack-trace predicate are all
//! injected at construction time, with default implementations for the
//! latter three shipped in [`gtest`] and [`patterns`].

pub mod boundary;
pub mod detector;
pub mod errors;
pub mod gtest;
pub mod patterns;
pub mod signature;
pub mod source;
