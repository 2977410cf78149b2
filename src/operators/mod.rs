//! Operator implementations: the pluggable matcher semantics.

mod comparison;
mod network;
mod pattern;
mod traits;
mod validation;

pub use comparison::{
    NumericComparison, NumericOperator, StringComparison, StringOperator, WithinOperator,
};
pub use network::IpMatchOperator;
pub use pattern::{PmOperator, RxOperator};
pub use traits::{Operator, OperatorResult};
pub use validation::{ValidateByteRangeOperator, ValidateUrlEncodingOperator};

use crate::error::{Error, Result};
use phf::phf_map;
use std::sync::Arc;

/// Operators known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    /// Regular expression.
    Rx,
    /// Phrase match.
    Pm,
    /// Substring.
    Contains,
    /// Delimited word.
    ContainsWord,
    /// Prefix.
    BeginsWith,
    /// Suffix.
    EndsWith,
    /// String equality.
    StrEq,
    /// Membership in a list.
    Within,
    /// Numeric equality.
    Eq,
    /// Numeric inequality.
    Ne,
    /// Greater than.
    Gt,
    /// Greater or equal.
    Ge,
    /// Less than.
    Lt,
    /// Less or equal.
    Le,
    /// IP address / CIDR membership.
    IpMatch,
    /// Invalid URL encoding.
    ValidateUrlEncoding,
    /// Byte outside the allowed ranges.
    ValidateByteRange,
    /// Always matches.
    UnconditionalMatch,
    /// Never matches.
    NoMatch,
}

/// Perfect hash map for O(1) operator name lookup.
static OPERATOR_MAP: phf::Map<&'static str, OperatorKind> = phf_map! {
    "rx" => OperatorKind::Rx,
    "pm" => OperatorKind::Pm,
    "contains" => OperatorKind::Contains,
    "containsword" => OperatorKind::ContainsWord,
    "beginswith" => OperatorKind::BeginsWith,
    "endswith" => OperatorKind::EndsWith,
    "streq" => OperatorKind::StrEq,
    "within" => OperatorKind::Within,
    "eq" => OperatorKind::Eq,
    "ne" => OperatorKind::Ne,
    "gt" => OperatorKind::Gt,
    "ge" => OperatorKind::Ge,
    "lt" => OperatorKind::Lt,
    "le" => OperatorKind::Le,
    "ipmatch" => OperatorKind::IpMatch,
    "validateurlencoding" => OperatorKind::ValidateUrlEncoding,
    "validatebyterange" => OperatorKind::ValidateByteRange,
    "unconditionalmatch" => OperatorKind::UnconditionalMatch,
    "nomatch" => OperatorKind::NoMatch,
};

impl OperatorKind {
    /// Look up an operator by name, with or without the leading `@`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.strip_prefix('@').unwrap_or(name);
        OPERATOR_MAP.get(name.to_ascii_lowercase().as_str()).copied()
    }

    /// Check if this operator requires an argument.
    pub fn requires_argument(&self) -> bool {
        !matches!(
            self,
            Self::ValidateUrlEncoding | Self::UnconditionalMatch | Self::NoMatch
        )
    }
}

/// Compile an operator by name.
pub fn create_operator(name: &str, argument: &str) -> Result<Arc<dyn Operator>> {
    let kind = OperatorKind::from_name(name).ok_or_else(|| Error::UnknownOperator {
        name: name.to_string(),
    })?;
    compile_operator(kind, argument)
}

/// Compile an operator, validating its argument.
pub fn compile_operator(kind: OperatorKind, argument: &str) -> Result<Arc<dyn Operator>> {
    if kind.requires_argument() && argument.is_empty() {
        return Err(Error::InvalidOperatorArgument {
            operator: format!("{:?}", kind),
            message: "argument required".to_string(),
        });
    }

    let operator: Arc<dyn Operator> = match kind {
        OperatorKind::Rx => Arc::new(RxOperator::new(argument)?),
        OperatorKind::Pm => Arc::new(PmOperator::new(argument)?),
        OperatorKind::Contains => {
            Arc::new(StringOperator::new(StringComparison::Contains, argument))
        }
        OperatorKind::ContainsWord => {
            Arc::new(StringOperator::new(StringComparison::ContainsWord, argument))
        }
        OperatorKind::BeginsWith => {
            Arc::new(StringOperator::new(StringComparison::BeginsWith, argument))
        }
        OperatorKind::EndsWith => {
            Arc::new(StringOperator::new(StringComparison::EndsWith, argument))
        }
        OperatorKind::StrEq => Arc::new(StringOperator::new(StringComparison::Equals, argument)),
        OperatorKind::Within => Arc::new(WithinOperator::new(argument)),
        OperatorKind::Eq => Arc::new(NumericOperator::new(NumericComparison::Eq, argument)?),
        OperatorKind::Ne => Arc::new(NumericOperator::new(NumericComparison::Ne, argument)?),
        OperatorKind::Gt => Arc::new(NumericOperator::new(NumericComparison::Gt, argument)?),
        OperatorKind::Ge => Arc::new(NumericOperator::new(NumericComparison::Ge, argument)?),
        OperatorKind::Lt => Arc::new(NumericOperator::new(NumericComparison::Lt, argument)?),
        OperatorKind::Le => Arc::new(NumericOperator::new(NumericComparison::Le, argument)?),
        OperatorKind::IpMatch => Arc::new(IpMatchOperator::new(argument)?),
        OperatorKind::ValidateUrlEncoding => Arc::new(ValidateUrlEncodingOperator),
        OperatorKind::ValidateByteRange => Arc::new(ValidateByteRangeOperator::new(argument)?),
        OperatorKind::UnconditionalMatch => Arc::new(UnconditionalMatchOperator),
        OperatorKind::NoMatch => Arc::new(NoMatchOperator),
    };
    Ok(operator)
}

/// Operator that never matches.
pub struct NoMatchOperator;

impl Operator for NoMatchOperator {
    fn execute(&self, _value: &str) -> OperatorResult {
        OperatorResult::no_match()
    }

    fn name(&self) -> &'static str {
        "noMatch"
    }
}

/// Operator that always matches.
pub struct UnconditionalMatchOperator;

impl Operator for UnconditionalMatchOperator {
    fn execute(&self, value: &str) -> OperatorResult {
        OperatorResult::matched(value)
    }

    fn name(&self) -> &'static str {
        "unconditionalMatch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(OperatorKind::from_name("@beginsWith"), Some(OperatorKind::BeginsWith));
        assert_eq!(OperatorKind::from_name("RX"), Some(OperatorKind::Rx));
        assert_eq!(OperatorKind::from_name("detectSQLi"), None);
    }

    #[test]
    fn test_create_operator() {
        let op = create_operator("@contains", "/admin").unwrap();
        assert_eq!(op.name(), "contains");
        assert!(op.execute("/admin/panel").matched);
    }

    #[test]
    fn test_unknown_operator() {
        assert!(matches!(
            create_operator("@geoLookup", ""),
            Err(Error::UnknownOperator { .. })
        ));
    }

    #[test]
    fn test_missing_argument() {
        let err = compile_operator(OperatorKind::Contains, "").err().unwrap();
        assert!(err.is_compile_time());
        assert!(compile_operator(OperatorKind::UnconditionalMatch, "").is_ok());
    }
}
