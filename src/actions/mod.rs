//! Rule actions and their execution.

mod data;
mod disruptive;
mod metadata;

pub use data::{
    apply_captures, apply_setvar, expand_macros, MacroContext, SetVarOp, SetVarOperation,
    MAX_CAPTURES,
};
pub use disruptive::status_for;
pub use metadata::{RuleMetadata, Severity};

use crate::config::EngineConfig;
use crate::engine::{AnomalyScore, DisruptiveAction, DisruptiveKind, Phase};
use crate::variables::TxCollection;
use tracing::debug;

/// An action attached to a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Block with the default status.
    Block,
    /// Deny the transaction.
    Deny,
    /// Redirect to a URL.
    Redirect(String),
    /// Drop the connection.
    Drop,
    /// Stop inspecting the current phase.
    Allow,
    /// Continue with the next rule.
    Pass,
    /// Status for deny, block and redirect.
    Status(u16),
    /// Add fixed anomaly points.
    Score(i32),
    /// Add anomaly points derived from the rule severity.
    ScoreBySeverity,
    /// Modify the TX collection.
    SetVar(SetVarOp),
    /// Skip the next n rules of the phase.
    Skip(u32),
    /// Store regex captures in TX:0 to TX:9.
    Capture,
    /// Log the match.
    Log,
    /// Do not log the match.
    NoLog,
    /// Rule message.
    Msg(String),
    /// Extra log data.
    LogData(String),
    /// Rule severity.
    Severity(Severity),
    /// Classification tag.
    Tag(String),
}

impl Action {
    /// Action name as written in rules.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Block => "block",
            Action::Deny => "deny",
            Action::Redirect(_) => "redirect",
            Action::Drop => "drop",
            Action::Allow => "allow",
            Action::Pass => "pass",
            Action::Status(_) => "status",
            Action::Score(_) => "score",
            Action::ScoreBySeverity => "scoreBySeverity",
            Action::SetVar(_) => "setvar",
            Action::Skip(_) => "skip",
            Action::Capture => "capture",
            Action::Log => "log",
            Action::NoLog => "nolog",
            Action::Msg(_) => "msg",
            Action::LogData(_) => "logdata",
            Action::Severity(_) => "severity",
            Action::Tag(_) => "tag",
        }
    }

    /// Whether the action belongs to the disruptive group (`pass` included).
    pub fn is_disruptive(&self) -> bool {
        matches!(
            self,
            Action::Block
                | Action::Deny
                | Action::Redirect(_)
                | Action::Drop
                | Action::Allow
                | Action::Pass
        )
    }

    /// Disruptive effect, if any. `pass` has none.
    pub fn disruptive_kind(&self) -> Option<DisruptiveKind> {
        match self {
            Action::Block => Some(DisruptiveKind::Block),
            Action::Deny => Some(DisruptiveKind::Deny),
            Action::Redirect(_) => Some(DisruptiveKind::Redirect),
            Action::Drop => Some(DisruptiveKind::Drop),
            Action::Allow => Some(DisruptiveKind::Allow),
            _ => None,
        }
    }
}

/// Result of running a rule's actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing affects the flow.
    Continue,
    /// A terminal disruptive action was produced.
    Disrupted(DisruptiveAction),
    /// `allow`: the rest of the phase is skipped.
    PhaseSkipped,
    /// `skip`: the next n rules are skipped.
    Skip(u32),
}

/// Mutable state and match details a rule's actions run against.
pub struct ActionContext<'a> {
    /// Rule being executed (the chain head).
    pub rule_id: u64,
    /// Phase being evaluated.
    pub phase: Phase,
    /// Name of the matched variable.
    pub matched_var_name: &'a str,
    /// Value that satisfied the operator.
    pub matched_var: &'a str,
    /// Full match then groups, for `capture`.
    pub captures: &'a [String],
    /// TX collection.
    pub tx: &'a mut TxCollection,
    /// Anomaly score.
    pub score: &'a mut AnomalyScore,
}

impl ActionContext<'_> {
    fn macros(&self) -> MacroContext<'_> {
        MacroContext {
            matched_var_name: self.matched_var_name,
            matched_var: self.matched_var,
            rule_id: self.rule_id,
        }
    }
}

/// Runs action lists against a transaction.
#[derive(Debug, Clone, Copy)]
pub struct ActionExecutor<'c> {
    config: &'c EngineConfig,
}

impl<'c> ActionExecutor<'c> {
    /// Create an executor for the given engine settings.
    pub fn new(config: &'c EngineConfig) -> Self {
        Self { config }
    }

    /// Apply `actions` in declared order.
    ///
    /// Scoring and `setvar` take effect immediately. The disruptive effect,
    /// if any, is decided once all actions ran.
    pub fn apply(&self, actions: &[Action], ctx: &mut ActionContext<'_>) -> Outcome {
        let mut kind = None;
        let mut status = None;
        let mut url = None;
        let mut skip = None;

        if actions.contains(&Action::Capture) {
            apply_captures(&mut *ctx.tx, ctx.captures);
        }

        for action in actions {
            match action {
                Action::Score(points) => self.score(ctx, *points),
                Action::ScoreBySeverity => {
                    let points = severity_of(actions)
                        .map(|s| self.config.scoring.score_for_severity(s.level()))
                        .unwrap_or(0);
                    self.score(ctx, points);
                }
                Action::SetVar(op) => {
                    let expanded = match &op.operation {
                        SetVarOperation::Set(value) => {
                            Some(expand_macros(value, ctx.tx, &ctx.macros()))
                        }
                        _ => None,
                    };
                    apply_setvar(&mut *ctx.tx, op, expanded);
                    debug!(rule_id = ctx.rule_id, var = %op.name, "setvar applied");
                }
                Action::Status(code) => status = Some(*code),
                Action::Skip(n) => skip = Some(*n),
                Action::Redirect(target) => {
                    kind = Some(DisruptiveKind::Redirect);
                    url = Some(expand_macros(target, ctx.tx, &ctx.macros()));
                }
                other => {
                    if let Some(k) = other.disruptive_kind() {
                        kind = Some(k);
                    }
                }
            }
        }
        ctx.score.sync_from_tx(ctx.tx);

        match kind {
            Some(DisruptiveKind::Allow) => Outcome::PhaseSkipped,
            Some(kind) => Outcome::Disrupted(DisruptiveAction {
                kind,
                rule_id: ctx.rule_id,
                phase: ctx.phase,
                reason: self
                    .annotate(actions, ctx)
                    .msg
                    .unwrap_or_else(|| format!("matched {}", ctx.matched_var_name)),
                status: status_for(kind, status, self.config),
                url,
            }),
            None => match skip {
                Some(n) if n > 0 => Outcome::Skip(n),
                _ => Outcome::Continue,
            },
        }
    }

    /// Collect the metadata actions, expanding macros against current TX.
    pub fn annotate(&self, actions: &[Action], ctx: &ActionContext<'_>) -> RuleMetadata {
        let macros = ctx.macros();
        let mut meta = RuleMetadata {
            log: true,
            ..Default::default()
        };

        for action in actions {
            match action {
                Action::Msg(msg) => meta.msg = Some(expand_macros(msg, ctx.tx, &macros)),
                Action::LogData(data) => meta.logdata = Some(expand_macros(data, ctx.tx, &macros)),
                Action::Severity(sev) => meta.severity = Some(*sev),
                Action::Tag(tag) => meta.tags.push(tag.clone()),
                Action::Log => meta.log = true,
                Action::NoLog => meta.log = false,
                _ => {}
            }
        }
        meta
    }

    fn score(&self, ctx: &mut ActionContext<'_>, points: i32) {
        ctx.score.sync_from_tx(ctx.tx);
        ctx.score.add(ctx.rule_id, points);
        ctx.score.sync_to_tx(ctx.tx);
        debug!(
            rule_id = ctx.rule_id,
            points,
            total = ctx.score.total(),
            "anomaly score updated"
        );
    }
}

fn severity_of(actions: &[Action]) -> Option<Severity> {
    actions.iter().rev().find_map(|a| match a {
        Action::Severity(s) => Some(*s),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ANOMALY_SCORE;

    fn run(actions: &[Action], tx: &mut TxCollection, score: &mut AnomalyScore) -> Outcome {
        let config = EngineConfig::default();
        let captures = ["<script>".to_string(), "script".to_string()];
        let mut ctx = ActionContext {
            rule_id: 1001,
            phase: Phase::Uri,
            matched_var_name: "ARGS:q",
            matched_var: "<script>",
            captures: &captures,
            tx,
            score,
        };
        ActionExecutor::new(&config).apply(actions, &mut ctx)
    }

    #[test]
    fn test_deny() {
        let mut tx = TxCollection::new();
        let mut score = AnomalyScore::new();
        let msg = Action::Msg("XSS in %{MATCHED_VAR_NAME}".to_string());
        let outcome = run(&[Action::Deny, msg], &mut tx, &mut score);
        match outcome {
            Outcome::Disrupted(action) => {
                assert_eq!(action.kind, DisruptiveKind::Deny);
                assert_eq!(action.status, 403);
                assert_eq!(action.rule_id, 1001);
                assert_eq!(action.reason, "XSS in ARGS:q");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_explicit_status_and_redirect() {
        let mut tx = TxCollection::new();
        let mut score = AnomalyScore::new();
        let outcome = run(&[Action::Deny, Action::Status(406)], &mut tx, &mut score);
        assert!(matches!(outcome, Outcome::Disrupted(DisruptiveAction { status: 406, .. })));

        let redirect = Action::Redirect("/blocked?r=%{rule.id}".to_string());
        let outcome = run(&[redirect], &mut tx, &mut score);
        match outcome {
            Outcome::Disrupted(action) => {
                assert_eq!(action.status, 302);
                assert_eq!(action.url.as_deref(), Some("/blocked?r=1001"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_flow_outcomes() {
        let mut tx = TxCollection::new();
        let mut score = AnomalyScore::new();
        assert_eq!(run(&[Action::Allow], &mut tx, &mut score), Outcome::PhaseSkipped);
        assert_eq!(run(&[Action::Pass, Action::Skip(2)], &mut tx, &mut score), Outcome::Skip(2));
        assert_eq!(run(&[Action::Pass, Action::Log], &mut tx, &mut score), Outcome::Continue);
    }

    #[test]
    fn test_scoring_mirrors_tx() {
        let mut tx = TxCollection::new();
        let mut score = AnomalyScore::new();
        run(&[Action::Score(3)], &mut tx, &mut score);
        run(
            &[Action::Severity(Severity::Critical), Action::ScoreBySeverity],
            &mut tx,
            &mut score,
        );
        assert_eq!(score.total(), 8);
        assert_eq!(tx.int(ANOMALY_SCORE), 8);

        run(&[Action::SetVar(SetVarOp::increment(ANOMALY_SCORE, 2))], &mut tx, &mut score);
        assert_eq!(score.total(), 10);
    }

    #[test]
    fn test_setvar_expands_macros() {
        let mut tx = TxCollection::new();
        let mut score = AnomalyScore::new();
        let setvar = Action::SetVar(SetVarOp::set("last_match", "%{MATCHED_VAR}"));
        run(&[setvar], &mut tx, &mut score);
        assert_eq!(tx.value("last_match"), Some("<script>"));
    }

    #[test]
    fn test_capture_runs_before_setvar() {
        let mut tx = TxCollection::new();
        let mut score = AnomalyScore::new();
        let setvar = Action::SetVar(SetVarOp::set("tag_name", "%{TX.1}"));
        run(&[setvar.clone(), Action::Capture], &mut tx, &mut score);
        assert_eq!(tx.value("0"), Some("<script>"));
        assert_eq!(tx.value("tag_name"), Some("script"));

        let mut tx = TxCollection::new();
        run(&[setvar], &mut tx, &mut score);
        assert_eq!(tx.value("0"), None);
        assert_eq!(tx.value("tag_name"), Some(""));
    }

    #[test]
    fn test_annotate() {
        let config = EngineConfig::default();
        let mut tx = TxCollection::new();
        let mut score = AnomalyScore::new();
        let ctx = ActionContext {
            rule_id: 7,
            phase: Phase::Uri,
            matched_var_name: "REQUEST_URI",
            matched_var: "/admin",
            captures: &[],
            tx: &mut tx,
            score: &mut score,
        };
        let meta = ActionExecutor::new(&config).annotate(
            &[
                Action::Msg("hit".to_string()),
                Action::LogData("%{MATCHED_VAR}".to_string()),
                Action::Severity(Severity::Warning),
                Action::Tag("a".to_string()),
                Action::NoLog,
            ],
            &ctx,
        );
        assert_eq!(meta.msg.as_deref(), Some("hit"));
        assert_eq!(meta.logdata.as_deref(), Some("/admin"));
        assert_eq!(meta.severity, Some(Severity::Warning));
        assert!(!meta.log);
    }
}
