// Copyright (c) The logtriage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Grouping-key derivation.
//!
//! The grouping key is the structural fingerprint downstream tools use to
//! collapse repeated, equivalent issues across runs: volatile substrings
//! (addresses, counters, error codes, log metadata) are replaced with
//! fixed tokens so that two occurrences of the same underlying issue
//! produce the same key.
//!
//! These rules are compatibility-sensitive. Persisted issue databases
//! group by the resulting strings, so changing a replacement token or a
//! rule is a breaking change.

use logtriage_metadata::IssueKind;
use regex::Regex;
use std::sync::LazyLock;

// A leading `[...]` group is log metadata (timestamp or level), not part
// of the message.
static BRACKET_PREFIX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[[^\]]*\]\s*").unwrap());
static HEX_RUN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(0[xX])?[0-9a-fA-F]{4,}\b").unwrap());
static NEGATIVE_GROUP_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(-\d+\)").unwrap());
static DECIMAL_RUN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static WHITESPACE_RUN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const HEX_TOKEN: &str = "<HEX>";
const NUM_TOKEN: &str = "<NUM>";
const NEG_TOKEN: &str = "<NEG>";

/// Derives the grouping key for a whitespace-trimmed log line.
///
/// A leading bracketed prefix is stripped, then volatile substrings are
/// canonicalized: hexadecimal runs of length four or more (`0x`-prefixed,
/// or mixing digits and hex letters), parenthesized negative integers
/// such as `(-112)`, and decimal runs each become a fixed token, and
/// whitespace runs collapse to a single space. Lines
/// that differ only in those substrings collapse to the same key; lines
/// that differ in actual message text do not.
pub fn grouping_key(trimmed_line: &str) -> String {
    let base = BRACKET_PREFIX_REGEX.replace(trimmed_line, "");
    // A hex run is only treated as hex when it is `0x`-prefixed or mixes
    // digits and hex letters. Letter-only words ("dead", "face") are kept
    // as text, and pure decimal runs fall through to the decimal rule so
    // counters of any length land in the same group.
    let canonical = HEX_RUN_REGEX.replace_all(&base, |caps: &regex::Captures<'_>| {
        let run = &caps[0];
        if let Some(prefix) = caps.get(1) {
            format!("{}{HEX_TOKEN}", prefix.as_str())
        } else if run.bytes().any(|b| b.is_ascii_digit())
            && run.bytes().any(|b| b.is_ascii_alphabetic())
        {
            HEX_TOKEN.to_owned()
        } else {
            run.to_owned()
        }
    });
    // Parenthesized negatives go before the generic decimal rule so the
    // whole `(-112)` group becomes one token.
    let canonical = NEGATIVE_GROUP_REGEX.replace_all(&canonical, NEG_TOKEN);
    let canonical = DECIMAL_RUN_REGEX.replace_all(&canonical, NUM_TOKEN);
    let canonical = WHITESPACE_RUN_REGEX.replace_all(&canonical, " ");
    canonical.into_owned()
}

/// Derives the synthetic grouping key for a crash that carries a stack
/// trace.
///
/// Crashes with stack traces are deliberately not coalesced with each
/// other, so the key is unique to the occurrence: it is derived from the
/// line index rather than the line text.
pub fn crash_with_stack_key(kind: &IssueKind, line_index: usize) -> String {
    format!("{kind}-with-stack-{line_index}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case(
        "Read error at 0x00001234 after 57 attempts",
        "Read error at 0x<HEX> after <NUM> attempts";
        "hex and decimal runs"
    )]
    #[test_case(
        "[0405/12:00:01] Check failed: foo == bar",
        "Check failed: foo == bar";
        "bracketed prefix stripped"
    )]
    #[test_case(
        "socket closed (-112) during handshake",
        "socket closed <NEG> during handshake";
        "parenthesized negative integer"
    )]
    #[test_case(
        "spaced   out \t message",
        "spaced out message";
        "whitespace runs collapse"
    )]
    #[test_case(
        "worker 7 of 32 died",
        "worker <NUM> of <NUM> died";
        "plain decimal runs"
    )]
    #[test_case("", ""; "empty line")]
    fn canonicalization(input: &str, expected: &str) {
        assert_eq!(grouping_key(input), expected);
    }

    #[test]
    fn equivalent_lines_share_a_key() {
        assert_eq!(
            grouping_key("Read error at 0x00001234 after 57 attempts"),
            grouping_key("Read error at 0xdeadbeef after 912 attempts"),
        );
        assert_ne!(
            grouping_key("Read error at 0x00001234"),
            grouping_key("Write error at 0x00001234"),
        );
    }

    #[test]
    fn only_leading_bracket_group_is_stripped() {
        assert_eq!(
            grouping_key("[ERROR] lost device [gpu] at slot 3"),
            "lost device [gpu] at slot <NUM>",
        );
    }

    #[test]
    fn stack_crash_key_is_per_line() {
        let a = crash_with_stack_key(&IssueKind::Crash, 1);
        let b = crash_with_stack_key(&IssueKind::Crash, 14);
        assert_eq!(a, "crash-with-stack-1");
        assert_ne!(a, b);
    }

    proptest! {
        // Lines that differ only in decimal counters collapse to the same
        // key.
        #[test]
        fn decimal_runs_never_split_groups(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
            prop_assert_eq!(
                grouping_key(&format!("retry {a} exhausted after {a} ms")),
                grouping_key(&format!("retry {b} exhausted after {b} ms")),
            );
        }
    }
}
