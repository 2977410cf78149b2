//! Operator trait definition.

/// Result of operator execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorResult {
    /// Whether the operator matched.
    pub matched: bool,
    /// Captured groups from regex.
    pub captures: Vec<String>,
    /// The part of the input that matched.
    pub matched_value: Option<String>,
}

impl OperatorResult {
    /// Create a result indicating no match.
    pub fn no_match() -> Self {
        Self::default()
    }

    /// Create a result indicating a match.
    pub fn matched(value: impl Into<String>) -> Self {
        Self {
            matched: true,
            captures: Vec::new(),
            matched_value: Some(value.into()),
        }
    }

    /// Create a result with captures.
    pub fn matched_with_captures(value: impl Into<String>, captures: Vec<String>) -> Self {
        Self {
            matched: true,
            captures,
            matched_value: Some(value.into()),
        }
    }
}

/// A compiled matcher predicate over a single value.
///
/// Built-in operators hold only data validated when the rule was compiled,
/// so `execute` cannot fail and has no side effects. They are shared across
/// threads through the ruleset.
pub trait Operator: Send + Sync {
    /// Execute the operator against a value.
    fn execute(&self, value: &str) -> OperatorResult;

    /// Execute, reporting failures that prevent a verdict.
    ///
    /// Custom operators backed by external state override this. A failure
    /// aborts the transaction that evaluated the rule.
    fn try_execute(&self, value: &str) -> Result<OperatorResult, String> {
        Ok(self.execute(value))
    }

    /// Get the operator name.
    fn name(&self) -> &'static str;

    /// Whether this operator supports capture groups.
    fn supports_capture(&self) -> bool {
        false
    }
}
