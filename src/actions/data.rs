//! Data actions: `setvar`, `capture` and macro expansion.

use crate::error::{Error, Result};
use crate::variables::{MutableCollection, TxCollection};

/// A `setvar` operation against the TX collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetVarOp {
    /// Variable name inside TX.
    pub name: String,
    /// Operation to perform.
    pub operation: SetVarOperation,
}

/// Type of setvar operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetVarOperation {
    /// Assign a value; macros are expanded when the action runs.
    Set(String),
    /// Add to the current numeric value.
    Increment(i64),
    /// Subtract from the current numeric value.
    Decrement(i64),
    /// Remove the variable.
    Delete,
}

impl SetVarOp {
    /// Assign `value` to `name`.
    pub fn set(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operation: SetVarOperation::Set(value.into()),
        }
    }

    /// Add `delta` to `name`.
    pub fn increment(name: impl Into<String>, delta: i64) -> Self {
        Self {
            name: name.into(),
            operation: SetVarOperation::Increment(delta),
        }
    }

    /// Parse the ModSecurity argument form.
    ///
    /// Accepted shapes: `tx.name=value`, `tx.name=+n`, `tx.name=-n`,
    /// `!tx.name` and bare `tx.name` (sets `1`). Only the TX collection is
    /// writable.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim().trim_matches('\'');
        let (delete, target) = match spec.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, spec),
        };

        let (target, value) = match target.split_once('=') {
            Some((t, v)) => (t, Some(v)),
            None => (target, None),
        };

        let name = match target.split_once('.') {
            Some((collection, name))
                if collection.eq_ignore_ascii_case("tx") && !name.is_empty() =>
            {
                name
            }
            _ => {
                return Err(Error::InvalidAction {
                    action: "setvar",
                    message: format!("'{}' does not name a TX variable", spec),
                })
            }
        };

        let operation = match (delete, value) {
            (true, None) => SetVarOperation::Delete,
            (true, Some(_)) => {
                return Err(Error::InvalidAction {
                    action: "setvar",
                    message: "a delete cannot carry a value".to_string(),
                })
            }
            (false, None) => SetVarOperation::Set("1".to_string()),
            (false, Some(v)) => parse_value(v)?,
        };

        Ok(Self {
            name: name.to_ascii_lowercase(),
            operation,
        })
    }
}

fn parse_value(value: &str) -> Result<SetVarOperation> {
    let delta = |digits: &str| {
        digits.trim().parse::<i64>().map_err(|_| Error::InvalidAction {
            action: "setvar",
            message: format!("'{}' is not a number", digits),
        })
    };

    // `=+%{tx.x}` style increments are not numeric and fall back to Set.
    match value.as_bytes().first() {
        Some(b'+') if !value.contains("%{") => Ok(SetVarOperation::Increment(delta(&value[1..])?)),
        Some(b'-') if !value.contains("%{") => Ok(SetVarOperation::Decrement(delta(&value[1..])?)),
        _ => Ok(SetVarOperation::Set(value.to_string())),
    }
}

/// Apply a setvar operation to the TX collection.
pub fn apply_setvar<C: MutableCollection>(
    collection: &mut C,
    op: &SetVarOp,
    expanded: Option<String>,
) {
    match &op.operation {
        SetVarOperation::Set(value) => {
            collection.set(&op.name, expanded.unwrap_or_else(|| value.clone()))
        }
        SetVarOperation::Increment(delta) => collection.increment(&op.name, *delta),
        SetVarOperation::Decrement(delta) => collection.decrement(&op.name, *delta),
        SetVarOperation::Delete => collection.delete(&op.name),
    }
}

/// Number of TX slots written by `capture`.
pub const MAX_CAPTURES: usize = 10;

/// Store the full match and its groups in TX:0 to TX:9.
/// Slots beyond the captured groups are cleared.
pub fn apply_captures<C: MutableCollection>(collection: &mut C, captures: &[String]) {
    for slot in 0..MAX_CAPTURES {
        let key = slot.to_string();
        match captures.get(slot) {
            Some(value) => collection.set(&key, value.clone()),
            None => collection.delete(&key),
        }
    }
}

/// Values substituted into `%{...}` macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacroContext<'a> {
    /// Name of the matched variable, e.g. `ARGS:id`.
    pub matched_var_name: &'a str,
    /// Value that satisfied the operator.
    pub matched_var: &'a str,
    /// Id of the rule being executed.
    pub rule_id: u64,
}

/// Expand `%{TX.name}`, `%{MATCHED_VAR}`, `%{MATCHED_VAR_NAME}` and
/// `%{RULE.id}`. Unknown macros expand to the empty string.
pub fn expand_macros(value: &str, tx: &TxCollection, ctx: &MacroContext<'_>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("%{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = &after[..end];
        match name.split_once('.') {
            Some((collection, key)) if collection.eq_ignore_ascii_case("tx") => {
                out.push_str(tx.value(key).unwrap_or_default());
            }
            Some((collection, key))
                if collection.eq_ignore_ascii_case("rule") && key.eq_ignore_ascii_case("id") =>
            {
                out.push_str(&ctx.rule_id.to_string());
            }
            _ if name.eq_ignore_ascii_case("matched_var") => out.push_str(ctx.matched_var),
            _ if name.eq_ignore_ascii_case("matched_var_name") => {
                out.push_str(ctx.matched_var_name)
            }
            _ => {}
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}
