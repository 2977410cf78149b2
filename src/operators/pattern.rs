//! Pattern matching operators (@rx, @pm).

use super::traits::{Operator, OperatorResult};
use crate::error::{Error, Result};
use aho_corasick::AhoCorasick;
use regex::Regex;

/// Regex operator (@rx).
///
/// The pattern is compiled together with the rule, so a malformed pattern
/// is rejected before any transaction exists.
pub struct RxOperator {
    regex: Regex,
}

impl RxOperator {
    /// Compile a regex operator.
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(Error::InvalidOperatorArgument {
                operator: "rx".to_string(),
                message: "empty pattern".to_string(),
            });
        }

        let regex = Regex::new(pattern).map_err(|source| Error::RegexCompile {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { regex })
    }
}

impl Operator for RxOperator {
    fn execute(&self, value: &str) -> OperatorResult {
        match self.regex.captures(value) {
            Some(captures) => {
                let matched = captures.get(0).map(|m| m.as_str()).unwrap_or_default();
                let groups: Vec<String> = captures
                    .iter()
                    .skip(1)
                    .map(|c| c.map_or_else(String::new, |m| m.as_str().to_string()))
                    .collect();
                OperatorResult::matched_with_captures(matched, groups)
            }
            None => OperatorResult::no_match(),
        }
    }

    fn name(&self) -> &'static str {
        "rx"
    }

    fn supports_capture(&self) -> bool {
        true
    }
}

/// Phrase match operator (@pm), case-insensitive.
pub struct PmOperator {
    automaton: AhoCorasick,
    patterns: Vec<String>,
}

impl PmOperator {
    /// Create a new phrase match operator from space-separated patterns.
    pub fn new(patterns_str: &str) -> Result<Self> {
        let patterns: Vec<String> = patterns_str
            .split_whitespace()
            .map(|s| s.to_string())
            .collect();
        Self::from_patterns(patterns)
    }

    /// Create a phrase match operator from an explicit phrase list.
    pub fn from_patterns(patterns: Vec<String>) -> Result<Self> {
        if patterns.is_empty() {
            return Err(Error::PatternSet {
                message: "empty pattern list".to_string(),
            });
        }

        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&patterns)
            .map_err(|e| Error::PatternSet {
                message: e.to_string(),
            })?;

        Ok(Self { automaton, patterns })
    }
}

impl Operator for PmOperator {
    fn execute(&self, value: &str) -> OperatorResult {
        match self.automaton.find(value) {
            Some(mat) => OperatorResult::matched(self.patterns[mat.pattern().as_usize()].clone()),
            None => OperatorResult::no_match(),
        }
    }

    fn name(&self) -> &'static str {
        "pm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rx_simple() {
        let op = RxOperator::new("^admin").unwrap();
        assert!(op.execute("admin").matched);
        assert!(!op.execute("user").matched);
    }

    #[test]
    fn test_rx_captures() {
        let op = RxOperator::new(r"user=(\w+)").unwrap();
        let result = op.execute("id=1&user=john");
        assert!(result.matched);
        assert_eq!(result.matched_value.as_deref(), Some("user=john"));
        assert_eq!(result.captures, vec!["john"]);

        let op = RxOperator::new(r"(a)?(b)").unwrap();
        assert_eq!(op.execute("b").captures, vec!["", "b"]);
    }

    #[test]
    fn test_rx_rejected_at_compile_time() {
        assert!(matches!(RxOperator::new("(a"), Err(Error::RegexCompile { .. })));
        assert!(matches!(RxOperator::new(""), Err(Error::InvalidOperatorArgument { .. })));
    }

    #[test]
    fn test_pm_case_insensitive() {
        let op = PmOperator::new("union select").unwrap();
        assert_eq!(op.execute("1 UNION ALL").matched_value.as_deref(), Some("union"));
        assert!(!op.execute("guest").matched);
    }

    #[test]
    fn test_pm_empty_rejected() {
        assert!(matches!(PmOperator::new("   "), Err(Error::PatternSet { .. })));
    }
}
