//! String and numeric comparison operators.

use super::traits::{Operator, OperatorResult};
use crate::error::{Error, Result};

/// How a string operator compares against its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringComparison {
    /// @contains
    Contains,
    /// @containsWord: the argument appears delimited by non-word characters.
    ContainsWord,
    /// @beginsWith
    BeginsWith,
    /// @endsWith
    EndsWith,
    /// @streq
    Equals,
}

/// String operator (@contains, @containsWord, @beginsWith, @endsWith, @streq).
pub struct StringOperator {
    comparison: StringComparison,
    needle: String,
}

impl StringOperator {
    /// Create a string operator.
    pub fn new(comparison: StringComparison, needle: &str) -> Self {
        Self {
            comparison,
            needle: needle.to_string(),
        }
    }
}

impl Operator for StringOperator {
    fn execute(&self, value: &str) -> OperatorResult {
        let matched = match self.comparison {
            StringComparison::Contains => value.contains(&self.needle),
            StringComparison::ContainsWord => contains_word(value, &self.needle),
            StringComparison::BeginsWith => value.starts_with(&self.needle),
            StringComparison::EndsWith => value.ends_with(&self.needle),
            StringComparison::Equals => value == self.needle,
        };

        if matched {
            OperatorResult::matched(self.needle.clone())
        } else {
            OperatorResult::no_match()
        }
    }

    fn name(&self) -> &'static str {
        match self.comparison {
            StringComparison::Contains => "contains",
            StringComparison::ContainsWord => "containsWord",
            StringComparison::BeginsWith => "beginsWith",
            StringComparison::EndsWith => "endsWith",
            StringComparison::Equals => "streq",
        }
    }
}

fn contains_word(value: &str, word: &str) -> bool {
    if word.is_empty() {
        return true;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    value.match_indices(word).any(|(start, _)| {
        let before = value[..start].chars().next_back();
        let after = value[start + word.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

/// Within operator (@within): the value is one of a space-separated list.
pub struct WithinOperator {
    values: Vec<String>,
}

impl WithinOperator {
    /// Create a new within operator.
    pub fn new(values: &str) -> Self {
        Self {
            values: values.split_whitespace().map(|s| s.to_string()).collect(),
        }
    }
}

impl Operator for WithinOperator {
    fn execute(&self, value: &str) -> OperatorResult {
        if self.values.iter().any(|v| v == value) {
            OperatorResult::matched(value)
        } else {
            OperatorResult::no_match()
        }
    }

    fn name(&self) -> &'static str {
        "within"
    }
}

/// Numeric relation of a comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericComparison {
    /// @eq
    Eq,
    /// @ne
    Ne,
    /// @gt
    Gt,
    /// @ge
    Ge,
    /// @lt
    Lt,
    /// @le
    Le,
}

impl NumericComparison {
    fn name(&self) -> &'static str {
        match self {
            NumericComparison::Eq => "eq",
            NumericComparison::Ne => "ne",
            NumericComparison::Gt => "gt",
            NumericComparison::Ge => "ge",
            NumericComparison::Lt => "lt",
            NumericComparison::Le => "le",
        }
    }

    fn holds(&self, value: i64, expected: i64) -> bool {
        match self {
            NumericComparison::Eq => value == expected,
            NumericComparison::Ne => value != expected,
            NumericComparison::Gt => value > expected,
            NumericComparison::Ge => value >= expected,
            NumericComparison::Lt => value < expected,
            NumericComparison::Le => value <= expected,
        }
    }
}

/// Numeric comparison operator.
///
/// The argument must be an integer literal. Values that do not parse as
/// integers are treated as 0, as ModSecurity does.
#[derive(Debug)]
pub struct NumericOperator {
    comparison: NumericComparison,
    expected: i64,
}

impl NumericOperator {
    /// Create a numeric operator, validating the argument.
    pub fn new(comparison: NumericComparison, argument: &str) -> Result<Self> {
        let expected = argument
            .trim()
            .parse()
            .map_err(|_| Error::InvalidOperatorArgument {
                operator: comparison.name().to_string(),
                message: format!("'{}' is not an integer", argument),
            })?;
        Ok(Self {
            comparison,
            expected,
        })
    }
}

impl Operator for NumericOperator {
    fn execute(&self, value: &str) -> OperatorResult {
        let n = value.trim().parse::<i64>().unwrap_or(0);
        if self.comparison.holds(n, self.expected) {
            OperatorResult::matched(value)
        } else {
            OperatorResult::no_match()
        }
    }

    fn name(&self) -> &'static str {
        self.comparison.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        let op = StringOperator::new(StringComparison::Contains, "admin");
        assert!(op.execute("/admin/users").matched);
        assert!(!op.execute("/users").matched);
    }

    #[test]
    fn test_contains_word() {
        let op = StringOperator::new(StringComparison::ContainsWord, "select");
        assert!(op.execute("1 select 2").matched);
        assert!(op.execute("select").matched);
        assert!(!op.execute("preselected").matched);
    }

    #[test]
    fn test_prefix_suffix_equality() {
        let begins = StringOperator::new(StringComparison::BeginsWith, "/admin");
        assert!(begins.execute("/admin/x").matched);
        assert!(!begins.execute("/x/admin").matched);
        let ends = StringOperator::new(StringComparison::EndsWith, ".php");
        assert!(ends.execute("index.php").matched);
        assert!(!StringOperator::new(StringComparison::Equals, "admin").execute("Admin").matched);
    }

    #[test]
    fn test_within() {
        let op = WithinOperator::new("GET HEAD POST");
        assert!(op.execute("HEAD").matched);
        assert!(!op.execute("DELETE").matched);
    }

    #[test]
    fn test_numeric_operators() {
        let eq = NumericOperator::new(NumericComparison::Eq, "10").unwrap();
        assert!(eq.execute("10").matched);
        assert!(!eq.execute("11").matched);

        let gt = NumericOperator::new(NumericComparison::Gt, "10").unwrap();
        assert!(gt.execute("11").matched);
        assert!(!gt.execute("10").matched);

        let ge = NumericOperator::new(NumericComparison::Ge, "5").unwrap();
        assert!(ge.execute("5").matched);

        let le = NumericOperator::new(NumericComparison::Le, "0").unwrap();
        assert!(le.execute("not-a-number").matched);
    }

    #[test]
    fn test_numeric_argument_validated() {
        let err = NumericOperator::new(NumericComparison::Gt, "%{tx.threshold}").unwrap_err();
        assert!(err.is_compile_time());
    }
}
