use regex_lite::Regex;
use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

/// A chat message that asks for commands to be generated.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Trigger {
    Pyramid { size: u32 },
    BlockCensus { depth: u32 },
}

impl Display for Trigger {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Pyramid { size } => write!(f, "pyramid {size}"),
            Trigger::BlockCensus { depth } => write!(f, "blocks {depth}"),
        }
    }
}

/// Outcome of scanning one chat message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TriggerMatch {
    Matched(Trigger),
    /// The prefix matched but the number was zero, unparsable or above the limit.
    Rejected { keyword: &'static str, reason: String },
    NoMatch,
}

fn pyramid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^pyramid (\d+)").expect("pyramid pattern compiles"))
}

fn census_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^blocks (\d+)").expect("census pattern compiles"))
}

#[derive(Clone, Debug)]
pub struct TriggerMatcher {
    max_pyramid_size: u32,
    max_census_depth: u32,
}

impl Default for TriggerMatcher {
    fn default() -> Self {
        Self::new(u32::MAX, u32::MAX)
    }
}

impl TriggerMatcher {
    pub fn new(max_pyramid_size: u32, max_census_depth: u32) -> Self {
        Self {
            max_pyramid_size,
            max_census_depth,
        }
    }

    pub fn scan(&self, message: &str) -> TriggerMatch {
        if let Some(value) = capture_number(pyramid_pattern(), message) {
            return match bounded(value, self.max_pyramid_size) {
                Ok(size) => TriggerMatch::Matched(Trigger::Pyramid { size }),
                Err(reason) => TriggerMatch::Rejected {
                    keyword: "pyramid",
                    reason,
                },
            };
        }

        if let Some(value) = capture_number(census_pattern(), message) {
            return match bounded(value, self.max_census_depth) {
                Ok(depth) => TriggerMatch::Matched(Trigger::BlockCensus { depth }),
                Err(reason) => TriggerMatch::Rejected {
                    keyword: "blocks",
                    reason,
                },
            };
        }

        TriggerMatch::NoMatch
    }
}

fn capture_number<'a>(pattern: &Regex, message: &'a str) -> Option<&'a str> {
    pattern
        .captures(message)
        .and_then(|captures| captures.get(1))
        .map(|digits| digits.as_str())
}

fn bounded(digits: &str, max: u32) -> Result<u32, String> {
    let value: u32 = digits
        .parse()
        .map_err(|_| format!("`{digits}` is out of range"))?;
    if value == 0 {
        return Err("size must be a positive integer".to_string());
    }
    if value > max {
        return Err(format!("{value} exceeds the configured limit of {max}"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pyramid_prefix_is_case_insensitive() {
        let matcher = TriggerMatcher::default();
        assert_eq!(
            matcher.scan("PyRaMiD 7 please"),
            TriggerMatch::Matched(Trigger::Pyramid { size: 7 })
        );
        assert_eq!(
            matcher.scan("pyramid 12"),
            TriggerMatch::Matched(Trigger::Pyramid { size: 12 })
        );
    }

    #[test]
    fn trigger_must_be_a_prefix() {
        let matcher = TriggerMatcher::default();
        assert_eq!(matcher.scan("build a pyramid 3"), TriggerMatch::NoMatch);
        assert_eq!(matcher.scan("pyramid"), TriggerMatch::NoMatch);
        assert_eq!(matcher.scan("pyramid x"), TriggerMatch::NoMatch);
        assert_eq!(matcher.scan(""), TriggerMatch::NoMatch);
    }

    #[test]
    fn zero_and_oversized_values_are_rejected() {
        let matcher = TriggerMatcher::new(10, 4);
        assert!(matches!(
            matcher.scan("pyramid 0"),
            TriggerMatch::Rejected { keyword: "pyramid", .. }
        ));
        assert!(matches!(
            matcher.scan("pyramid 11"),
            TriggerMatch::Rejected { keyword: "pyramid", .. }
        ));
        assert!(matches!(
            matcher.scan("pyramid 99999999999999999999"),
            TriggerMatch::Rejected { keyword: "pyramid", .. }
        ));
        assert!(matches!(
            matcher.scan("blocks 5"),
            TriggerMatch::Rejected { keyword: "blocks", .. }
        ));
    }

    #[test]
    fn census_trigger_is_recognised() {
        let matcher = TriggerMatcher::default();
        assert_eq!(
            matcher.scan("Blocks 3"),
            TriggerMatch::Matched(Trigger::BlockCensus { depth: 3 })
        );
    }
}
