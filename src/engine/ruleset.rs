//! Compiled rules and the immutable ruleset shared by transactions.

use crate::actions::{Action, SetVarOp, Severity};
use crate::error::{Error, Result};
use crate::operators::{create_operator, Operator, UnconditionalMatchOperator};
use crate::transformations::{create_transformation, TransformationPipeline};
use crate::variables::Target;

use super::phase::Phase;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// What a rule inspects and how.
#[derive(Clone)]
pub struct Matcher {
    targets: Vec<Target>,
    transformations: TransformationPipeline,
    operator: Arc<dyn Operator>,
    negated: bool,
    unconditional: bool,
}

impl Matcher {
    /// A matcher running `operator` over `targets`.
    pub fn new(targets: Vec<Target>, operator: Arc<dyn Operator>) -> Self {
        Self {
            targets,
            transformations: TransformationPipeline::new(),
            operator,
            negated: false,
            unconditional: false,
        }
    }

    /// A matcher that always matches, for rules that only run actions.
    pub fn unconditional() -> Self {
        Self {
            unconditional: true,
            ..Self::new(Vec::new(), Arc::new(UnconditionalMatchOperator))
        }
    }

    /// Invert the operator result.
    pub fn negated(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Use `pipeline` on every value before the operator.
    pub fn with_transformations(mut self, pipeline: TransformationPipeline) -> Self {
        self.transformations = pipeline;
        self
    }

    /// Inspected targets.
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Transformation pipeline.
    pub fn transformations(&self) -> &TransformationPipeline {
        &self.transformations
    }

    /// Compiled operator.
    pub fn operator(&self) -> &dyn Operator {
        self.operator.as_ref()
    }

    /// Whether the operator result is inverted.
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Whether the matcher ignores its targets and always matches.
    pub fn is_unconditional(&self) -> bool {
        self.unconditional
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("targets", &self.targets)
            .field("transformations", &self.transformations)
            .field("operator", &self.operator.name())
            .field("negated", &self.negated)
            .field("unconditional", &self.unconditional)
            .finish()
    }
}

/// A compiled rule, possibly the head of a chain.
///
/// Chain links share the head's phase. Only the final link carries actions.
#[derive(Debug, Clone)]
pub struct Rule {
    id: u64,
    phase: Phase,
    matcher: Matcher,
    actions: Vec<Action>,
    chain: Option<Box<Rule>>,
}

impl Rule {
    /// Start building a rule.
    pub fn builder(id: u64, phase: Phase) -> RuleBuilder {
        RuleBuilder::new(id, phase)
    }

    /// Rule id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Phase the rule runs in.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Matcher of this link.
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Actions of this link.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Next chain link.
    pub fn chain(&self) -> Option<&Rule> {
        self.chain.as_deref()
    }

    /// This rule followed by its chain links.
    pub fn links(&self) -> Links<'_> {
        Links { next: Some(self) }
    }

    /// The link whose actions fire.
    pub fn final_link(&self) -> &Rule {
        let mut link = self;
        while let Some(next) = link.chain() {
            link = next;
        }
        link
    }

    /// Severity declared on the final link.
    pub fn severity(&self) -> Option<Severity> {
        self.final_link().actions.iter().find_map(|a| match a {
            Action::Severity(s) => Some(*s),
            _ => None,
        })
    }

    fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for link in self.links() {
            if !ids.insert(link.id) {
                return Err(Error::DuplicateRuleId { id: link.id });
            }
            if !link.matcher.unconditional && link.matcher.targets.is_empty() {
                return Err(Error::MissingTargets { id: link.id });
            }
            if link.chain.is_some() && !link.actions.is_empty() {
                return Err(Error::InvalidChainLink { id: link.id });
            }
        }

        let last = self.final_link();
        if last.actions.iter().filter(|a| a.is_disruptive()).count() > 1 {
            return Err(Error::ConflictingDisruptiveActions { id: last.id });
        }
        let disrupts = last.actions.iter().any(|a| a.disruptive_kind().is_some());
        if self.phase == Phase::Logging && disrupts {
            return Err(Error::DisruptiveInLoggingPhase { id: last.id });
        }
        Ok(())
    }
}

/// Iterator over the links of a chain, head first.
pub struct Links<'a> {
    next: Option<&'a Rule>,
}

impl<'a> Iterator for Links<'a> {
    type Item = &'a Rule;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.chain();
        Some(current)
    }
}

/// Builder for [`Rule`].
///
/// Argument errors are kept until [`RuleBuilder::build`], so rule
/// definitions read as one expression.
pub struct RuleBuilder {
    id: u64,
    phase: Phase,
    targets: Vec<Target>,
    operator: Option<Arc<dyn Operator>>,
    negated: bool,
    transformations: TransformationPipeline,
    actions: Vec<Action>,
    links: Vec<RuleBuilder>,
    error: Option<Error>,
}

impl RuleBuilder {
    fn new(id: u64, phase: Phase) -> Self {
        Self {
            id,
            phase,
            targets: Vec::new(),
            operator: None,
            negated: false,
            transformations: TransformationPipeline::new(),
            actions: Vec::new(),
            links: Vec::new(),
            error: None,
        }
    }

    fn fail(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Inspect a target.
    pub fn target(mut self, target: impl Into<Target>) -> Self {
        self.targets.push(target.into());
        self
    }

    /// Inspect targets given in rule-language form, `|` separated:
    /// `ARGS|REQUEST_HEADERS:User-Agent`, `&ARGS`, `ARGS|!ARGS:password`.
    ///
    /// An exclusion applies to the targets of its variable declared before
    /// it, in this call or earlier ones.
    pub fn target_spec(mut self, spec: &str) -> Self {
        for part in spec.split('|').map(str::trim) {
            if let Err(e) = self.push_target(part) {
                self.fail(e);
                break;
            }
        }
        self
    }

    fn push_target(&mut self, spec: &str) -> Result<()> {
        if !spec.starts_with('!') {
            self.targets.push(Target::parse(spec)?);
            return Ok(());
        }

        let (variable, key) = Target::parse_exclusion(spec)?;
        let mut applied = false;
        for target in self.targets.iter_mut().filter(|t| t.variable == variable) {
            target.exclusions.push(key.clone());
            applied = true;
        }
        if !applied {
            return Err(Error::InvalidTarget {
                spec: spec.to_string(),
                message: format!("no {} target to exclude from", variable.name()),
            });
        }
        Ok(())
    }

    /// Set the operator by name. A leading `!` negates it.
    pub fn operator(mut self, name: &str, argument: &str) -> Self {
        let (negated, name) = match name.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, name),
        };
        match create_operator(name, argument) {
            Ok(op) => {
                self.operator = Some(op);
                self.negated = negated;
            }
            Err(e) => self.fail(e),
        }
        self
    }

    /// Use a custom operator.
    pub fn custom_operator(mut self, operator: Arc<dyn Operator>) -> Self {
        self.operator = Some(operator);
        self
    }

    /// Negate the operator.
    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Append a transformation by name.
    pub fn transform(mut self, name: &str) -> Self {
        match create_transformation(name) {
            Ok(t) => self.transformations.push(t),
            Err(e) => self.fail(e),
        }
        self
    }

    /// Append an action.
    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Append a `setvar` given in rule-language form.
    pub fn setvar(mut self, spec: &str) -> Self {
        match SetVarOp::parse(spec) {
            Ok(op) => self.actions.push(Action::SetVar(op)),
            Err(e) => self.fail(e),
        }
        self
    }

    /// Append `msg`.
    pub fn msg(self, msg: impl Into<String>) -> Self {
        self.action(Action::Msg(msg.into()))
    }

    /// Append `severity`.
    pub fn severity(self, severity: Severity) -> Self {
        self.action(Action::Severity(severity))
    }

    /// Append `tag`.
    pub fn tag(self, tag: impl Into<String>) -> Self {
        self.action(Action::Tag(tag.into()))
    }

    /// Attach the next chain link. Its phase is replaced by this rule's.
    pub fn chain(mut self, mut link: RuleBuilder) -> Self {
        let nested = std::mem::take(&mut link.links);
        self.links.push(link);
        self.links.extend(nested);
        self
    }

    /// Compile and validate the rule.
    pub fn build(mut self) -> Result<Rule> {
        let phase = self.phase;
        let mut links = std::mem::take(&mut self.links);

        let mut tail = None;
        while let Some(link) = links.pop() {
            tail = Some(Box::new(link.into_link(phase, tail.take())?));
        }
        let rule = self.into_link(phase, tail)?;

        rule.validate()?;
        Ok(rule)
    }

    fn into_link(self, phase: Phase, chain: Option<Box<Rule>>) -> Result<Rule> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let matcher = match self.operator {
            Some(operator) => Matcher {
                targets: self.targets,
                transformations: self.transformations,
                operator,
                negated: self.negated,
                unconditional: false,
            },
            None if self.targets.is_empty() => Matcher::unconditional(),
            None => {
                return Err(Error::InvalidOperatorArgument {
                    operator: "none".to_string(),
                    message: format!("rule {} has targets but no operator", self.id),
                })
            }
        };

        Ok(Rule {
            id: self.id,
            phase,
            matcher,
            actions: self.actions,
            chain,
        })
    }
}

impl fmt::Debug for RuleBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleBuilder")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("operator", &self.operator.as_ref().map(|op| op.name()))
            .field("links", &self.links.len())
            .finish()
    }
}

/// An immutable, validated set of rules.
///
/// Rules are ordered by phase, then ascending id. A ruleset is shared by
/// every transaction of an engine and never changes after compilation.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    // start index of each phase in `rules`, plus the end sentinel
    offsets: [usize; 8],
}

impl RuleSet {
    /// Build and validate every rule, then index them by phase.
    pub fn compile<I>(builders: I) -> Result<Self>
    where
        I: IntoIterator<Item = RuleBuilder>,
    {
        let rules = builders
            .into_iter()
            .map(RuleBuilder::build)
            .collect::<Result<Vec<_>>>()?;
        Self::from_rules(rules)
    }

    /// Index already built rules, rejecting ids used more than once.
    pub fn from_rules(mut rules: Vec<Rule>) -> Result<Self> {
        let mut seen = HashSet::new();
        for link in rules.iter().flat_map(Rule::links) {
            if !seen.insert(link.id) {
                return Err(Error::DuplicateRuleId { id: link.id });
            }
        }

        rules.sort_by_key(|r| (r.phase, r.id));

        let mut offsets = [rules.len(); 8];
        for (idx, phase) in Phase::all().iter().enumerate() {
            offsets[idx] = rules.partition_point(|r| r.phase < *phase);
        }

        Ok(Self { rules, offsets })
    }

    /// Rules of a phase, in ascending id order.
    pub fn rules_for_phase(&self, phase: Phase) -> &[Rule] {
        let idx = phase.number() as usize;
        &self.rules[self.offsets[idx]..self.offsets[idx + 1]]
    }

    /// Look up a rule by head id.
    pub fn rule(&self, id: u64) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// All rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Number of rules (chains count once).
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Whether the ruleset has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
