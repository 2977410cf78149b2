//! Rule evaluation against a variable snapshot.

use super::ruleset::{Matcher, Rule};
use crate::error::{Error, Result};
use crate::variables::{TxCollection, VariableResolver, VariableStore};
use tracing::trace;

/// A rule whose every chain link matched.
#[derive(Debug, Clone)]
pub struct RuleMatch<'r> {
    /// Chain head.
    pub rule: &'r Rule,
    /// Final link; its actions fire.
    pub last: &'r Rule,
    /// Variable that satisfied the head, e.g. `ARGS:id`.
    pub variable: String,
    /// Transformed value that satisfied the head.
    pub value: String,
    /// Full match then groups from the last link whose operator captured.
    pub captures: Vec<String>,
}

struct LinkHit {
    variable: String,
    value: String,
    captures: Vec<String>,
}

/// Stateless rule evaluator.
///
/// Evaluation only reads the store and TX, so the same snapshot always
/// yields the same verdict.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchEngine;

impl MatchEngine {
    /// Evaluate a rule and its chain.
    ///
    /// Links are walked in order; the first link that fails ends the walk
    /// with no match. Errors come only from operators that cannot reach a
    /// verdict.
    pub fn evaluate<'r>(
        rule: &'r Rule,
        store: &VariableStore,
        tx: &TxCollection,
    ) -> Result<Option<RuleMatch<'r>>> {
        let resolver = VariableResolver::new(store, tx);
        let mut head: Option<LinkHit> = None;
        let mut captures = Vec::new();
        let mut last = rule;

        for link in rule.links() {
            match Self::match_link(link, &resolver)? {
                Some(mut hit) => {
                    trace!(
                        rule_id = rule.id(),
                        link_id = link.id(),
                        variable = %hit.variable,
                        "link matched"
                    );
                    if !hit.captures.is_empty() {
                        captures = std::mem::take(&mut hit.captures);
                    }
                    if head.is_none() {
                        head = Some(hit);
                    }
                    last = link;
                }
                None => return Ok(None),
            }
        }

        Ok(head.map(|hit| RuleMatch {
            rule,
            last,
            variable: hit.variable,
            value: hit.value,
            captures,
        }))
    }

    fn match_link(link: &Rule, resolver: &VariableResolver<'_>) -> Result<Option<LinkHit>> {
        let matcher: &Matcher = link.matcher();
        if matcher.is_unconditional() {
            return Ok(Some(LinkHit {
                variable: String::new(),
                value: String::new(),
                captures: Vec::new(),
            }));
        }

        for target in matcher.targets() {
            for (name, value) in resolver.resolve(target) {
                let transformed = matcher.transformations().apply(&value);
                let result = matcher
                    .operator()
                    .try_execute(&transformed)
                    .map_err(|message| Error::InternalMatchFailure {
                        rule_id: link.id(),
                        message,
                    })?;

                if result.matched != matcher.is_negated() {
                    let captures = match result.matched_value {
                        Some(full) if result.matched && matcher.operator().supports_capture() => {
                            std::iter::once(full).chain(result.captures).collect()
                        }
                        _ => Vec::new(),
                    };
                    return Ok(Some(LinkHit {
                        variable: name,
                        value: transformed.into_owned(),
                        captures,
                    }));
                }
            }
        }
        Ok(None)
    }
}
