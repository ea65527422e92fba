//! Parsing of decision oracle replies.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

/// Verdict extracted from a decision oracle reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// `Decision: 1` — keep the program and stop the loop.
    Accept,
    /// `Decision: 2` — generate again.
    Retry,
}

static DECISION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Decision:\s*(\d)").expect("decision regex should be valid"));

/// Extract the accept/retry verdict from a free-text oracle reply.
///
/// The reply is expected to carry a `Decision: <digit>` label somewhere.
/// A missing label or a digit outside `{1, 2}` falls back to retry with a
/// logged warning; ambiguity must never pass as acceptance.
pub fn parse_decision(reply: &str) -> Decision {
    match DECISION_RE
        .captures(reply)
        .map(|captures| captures[1].to_string())
        .as_deref()
    {
        Some("1") => Decision::Accept,
        Some("2") => Decision::Retry,
        Some(digit) => {
            warn!(digit, "decision digit outside accepted range, defaulting to retry");
            Decision::Retry
        }
        None => {
            warn!("no decision label in oracle reply, defaulting to retry");
            Decision::Retry
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_accept() {
        assert_eq!(
            parse_decision("Decision: 1\nExplanation: ok"),
            Decision::Accept
        );
    }

    #[test]
    fn parses_retry() {
        assert_eq!(
            parse_decision("Decision: 2\nExplanation: output looks wrong"),
            Decision::Retry
        );
    }

    #[test]
    fn missing_label_defaults_to_retry() {
        assert_eq!(parse_decision("looks good to me"), Decision::Retry);
    }

    #[test]
    fn out_of_range_digit_defaults_to_retry() {
        assert_eq!(parse_decision("Decision: 7"), Decision::Retry);
    }

    #[test]
    fn label_is_found_anywhere_in_the_reply() {
        assert_eq!(
            parse_decision("Preamble text.\n\nDecision:1\nExplanation: fine"),
            Decision::Accept
        );
    }

    #[test]
    fn first_label_wins() {
        assert_eq!(
            parse_decision("Decision: 2\nDecision: 1"),
            Decision::Retry
        );
    }
}
