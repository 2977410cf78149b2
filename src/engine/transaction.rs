//! Per-request transaction state machine.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::audit::{AuditRecord, LogCallback, MatchRecord};
use super::disruption::DisruptiveAction;
use super::match_engine::MatchEngine;
use super::phase::Phase;
use super::ruleset::RuleSet;
use super::scoring::AnomalyScore;
use crate::actions::{ActionContext, ActionExecutor, Outcome};
use crate::config::{EngineConfig, RuleEngineMode};
use crate::error::{Error, Result};
use crate::variables::{PhaseData, TxCollection, VariableStore};
use tracing::{debug, error, info, warn};

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Created; the first data must be for the connection phase.
    New,
    /// Accepting data for the phase, or its successor.
    Active(Phase),
    /// A disruptive action was latched; only logging remains.
    Disrupted,
    /// Evaluation failed; only logging remains.
    Failed,
    /// Logging finished.
    Completed,
}

/// Result of one `advance` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseOutcome {
    /// Phase that was processed.
    pub phase: Phase,
    /// Whether the transaction is disrupted.
    pub disrupted: bool,
    /// The latched action, when disrupted.
    pub action: Option<DisruptiveAction>,
    /// Whether the connector should keep forwarding traffic.
    pub should_continue: bool,
}

/// Inspection state of a single request/response exchange.
///
/// A transaction is driven by one caller through [`Transaction::advance`].
/// It owns all of its mutable state; the ruleset and configuration are
/// shared read-only with the engine.
pub struct Transaction {
    id: String,
    ruleset: Arc<RuleSet>,
    config: Arc<EngineConfig>,
    engine: &'static str,
    connector: Option<String>,
    log_callback: Option<LogCallback>,
    state: TransactionState,
    phase: Phase,
    store: VariableStore,
    tx: TxCollection,
    score: AnomalyScore,
    matches: Vec<MatchRecord>,
    fired: HashSet<u64>,
    skipped: HashSet<u64>,
    allowed: [bool; 7],
    evaluated: Option<(Phase, u64)>,
    disruption: Option<DisruptiveAction>,
    failure: Option<(u64, String)>,
    audit: Option<AuditRecord>,
}

impl Transaction {
    pub(crate) fn new(
        id: String,
        ruleset: Arc<RuleSet>,
        config: Arc<EngineConfig>,
        engine: &'static str,
        connector: Option<String>,
        log_callback: Option<LogCallback>,
    ) -> Self {
        Self {
            id,
            ruleset,
            config,
            engine,
            connector,
            log_callback,
            state: TransactionState::New,
            phase: Phase::Connection,
            store: VariableStore::new(),
            tx: TxCollection::new(),
            score: AnomalyScore::new(),
            matches: Vec::new(),
            fired: HashSet::new(),
            skipped: HashSet::new(),
            allowed: [false; 7],
            evaluated: None,
            disruption: None,
            failure: None,
            audit: None,
        }
    }

    /// Supply `data` for `phase` and evaluate the phase's rules.
    ///
    /// The first call must supply `Connection`. After that, `phase` must be
    /// the current phase (more data for it, e.g. another body chunk) or the
    /// one directly after it. `Logging` is accepted from any state and
    /// completes the transaction.
    pub fn advance(&mut self, phase: Phase, data: PhaseData) -> Result<PhaseOutcome> {
        match self.state {
            TransactionState::Completed => {
                warn!(tx_id = %self.id, phase = %phase, "advance after completion");
                return Err(Error::TransactionCompleted);
            }
            _ if phase == Phase::Logging => return self.finish(data),
            TransactionState::Disrupted => {
                debug!(tx_id = %self.id, phase = %phase, "advance after disruption");
                return match self.disruption.clone() {
                    Some(action) => Err(Error::AlreadyDisrupted { action }),
                    None => Err(Error::TransactionCompleted),
                };
            }
            TransactionState::Failed => {
                let (rule_id, message) = self.failure.clone().unwrap_or_default();
                return Err(Error::InternalMatchFailure { rule_id, message });
            }
            TransactionState::New if phase != Phase::Connection => {
                return Err(self.out_of_order(Phase::Connection, phase));
            }
            TransactionState::New => {}
            TransactionState::Active(current) => {
                if phase != current && current.next() != Some(phase) {
                    return Err(self.out_of_order(current, phase));
                }
            }
        }

        self.store.merge(phase, data)?;
        self.state = TransactionState::Active(phase);
        self.phase = phase;
        self.run_phase(phase)?;
        Ok(self.outcome(phase))
    }

    fn out_of_order(&self, current: Phase, requested: Phase) -> Error {
        warn!(
            tx_id = %self.id,
            current = %current,
            requested = %requested,
            "invalid phase order"
        );
        Error::InvalidPhaseOrder { current, requested }
    }

    fn outcome(&self, phase: Phase) -> PhaseOutcome {
        PhaseOutcome {
            phase,
            disrupted: self.disruption.is_some(),
            action: self.disruption.clone(),
            should_continue: self.disruption.is_none()
                && self.state != TransactionState::Failed,
        }
    }

    fn run_phase(&mut self, phase: Phase) -> Result<()> {
        if self.config.mode == RuleEngineMode::Off || self.allowed[phase.number() as usize] {
            return Ok(());
        }

        let revision = self.store.revision();
        if self.evaluated == Some((phase, revision)) {
            debug!(tx_id = %self.id, phase = %phase, "no new data, phase not re-evaluated");
            return Ok(());
        }
        self.evaluated = Some((phase, revision));

        let ruleset = Arc::clone(&self.ruleset);
        let config = Arc::clone(&self.config);
        let executor = ActionExecutor::new(&config);
        let rules = ruleset.rules_for_phase(phase);

        for (index, rule) in rules.iter().enumerate() {
            if self.skipped.contains(&rule.id()) {
                debug!(tx_id = %self.id, rule_id = rule.id(), "rule skipped");
                continue;
            }
            if self.fired.contains(&rule.id()) {
                continue;
            }

            debug!(tx_id = %self.id, rule_id = rule.id(), phase = %phase, "evaluating rule");
            let hit = match MatchEngine::evaluate(rule, &self.store, &self.tx) {
                Ok(Some(hit)) => hit,
                Ok(None) => continue,
                Err(e) => {
                    error!(
                        tx_id = %self.id,
                        rule_id = rule.id(),
                        phase = %phase,
                        error = %e,
                        "rule evaluation failed"
                    );
                    if let Error::InternalMatchFailure { rule_id, ref message } = e {
                        self.failure = Some((rule_id, message.clone()));
                    }
                    self.state = TransactionState::Failed;
                    return Err(e);
                }
            };
            self.fired.insert(rule.id());

            let mut ctx = ActionContext {
                rule_id: rule.id(),
                phase,
                matched_var_name: &hit.variable,
                matched_var: &hit.value,
                captures: &hit.captures,
                tx: &mut self.tx,
                score: &mut self.score,
            };
            let outcome = executor.apply(hit.last.actions(), &mut ctx);
            let meta = executor.annotate(hit.last.actions(), &ctx);

            let mut record = MatchRecord {
                rule_id: rule.id(),
                phase,
                matched_variable: hit.variable.clone(),
                matched_value: hit.value.clone(),
                ordinal: self.matches.len() + 1,
                message: meta.msg,
                logdata: meta.logdata,
                severity: meta.severity,
                tags: meta.tags,
                logged: meta.log,
                suppressed_action: None,
            };
            match outcome {
                Outcome::Continue => {}
                Outcome::Skip(n) => {
                    let span = rules.iter().skip(index + 1).take(n as usize);
                    self.skipped.extend(span.map(|r| r.id()));
                }
                Outcome::PhaseSkipped => {
                    debug!(
                        tx_id = %self.id,
                        rule_id = rule.id(),
                        phase = %phase,
                        "allow: rest of phase skipped"
                    );
                    self.allowed[phase.number() as usize] = true;
                    self.log_match(&record);
                    self.matches.push(record);
                    break;
                }
                Outcome::Disrupted(action) if config.mode == RuleEngineMode::DetectionOnly => {
                    warn!(
                        tx_id = %self.id,
                        rule_id = rule.id(),
                        phase = %phase,
                        "detection only, not enforcing: {}",
                        action.format_log()
                    );
                    record.suppressed_action = Some(action);
                }
                Outcome::Disrupted(action) => {
                    info!(
                        tx_id = %self.id,
                        rule_id = rule.id(),
                        phase = %phase,
                        "{}",
                        action.format_log()
                    );
                    self.log_match(&record);
                    self.matches.push(record);
                    self.disruption = Some(action);
                    self.state = TransactionState::Disrupted;
                    return Ok(());
                }
            }
            self.log_match(&record);
            self.matches.push(record);
        }

        Ok(())
    }

    /// Emit a logged match, shaped by the configured log properties.
    fn log_match(&self, record: &MatchRecord) {
        if !record.logged {
            return;
        }
        info!(
            tx_id = %self.id,
            rule_id = record.rule_id,
            phase = %record.phase,
            "{}",
            record.format_log()
        );
        if let Some(ref callback) = self.log_callback {
            callback(&record.log_entry(self.config.log_property));
        }
    }

    fn finish(&mut self, data: PhaseData) -> Result<PhaseOutcome> {
        if !data.belongs_to(Phase::Logging) {
            return Err(Error::PhaseDataMismatch {
                phase: Phase::Logging,
                data: data.kind(),
            });
        }

        if let TransactionState::New | TransactionState::Active(_) = self.state {
            // Logging rules cannot disrupt; a failure is kept for the audit.
            if self.run_phase(Phase::Logging).is_err() {
                debug!(tx_id = %self.id, "logging rules aborted");
            }
        }

        let record = AuditRecord {
            transaction_id: self.id.clone(),
            engine: self.engine.to_string(),
            connector: self.connector.clone(),
            final_phase: self.phase,
            disrupted: self.disruption.is_some(),
            action: self.disruption.clone(),
            anomaly_score: self.score.total(),
            matches: self.matches.clone(),
            failure: self
                .failure
                .as_ref()
                .map(|(rule_id, message)| format!("rule {}: {}", rule_id, message)),
        };
        debug!(tx_id = %self.id, "{}", record.format_log());

        self.audit = Some(record);
        self.state = TransactionState::Completed;
        Ok(self.outcome(Phase::Logging))
    }

    /// Transaction id, unique per engine.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Last phase data was supplied for.
    pub fn current_phase(&self) -> Phase {
        self.phase
    }

    /// Lifecycle state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Variables collected so far.
    pub fn variables(&self) -> &VariableStore {
        &self.store
    }

    /// TX collection.
    pub fn tx(&self) -> &TxCollection {
        &self.tx
    }

    /// Matched rules in match order.
    pub fn matches(&self) -> &[MatchRecord] {
        &self.matches
    }

    /// The latched disruptive action.
    pub fn disruptive_action(&self) -> Option<&DisruptiveAction> {
        self.disruption.as_ref()
    }

    /// Current anomaly score.
    pub fn anomaly_score(&self) -> i32 {
        self.score.total()
    }

    /// Audit record, available once logging completed.
    pub fn audit_record(&self) -> Option<&AuditRecord> {
        self.audit.as_ref()
    }

    /// Whether a disruptive action was latched.
    pub fn is_disrupted(&self) -> bool {
        self.disruption.is_some()
    }

    /// Whether logging completed.
    pub fn is_completed(&self) -> bool {
        self.state == TransactionState::Completed
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("phase", &self.phase)
            .field("disrupted", &self.disruption.is_some())
            .field("anomaly_score", &self.score.total())
            .field("matches", &self.matches.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Action;
    use crate::config::LogProperty;
    use crate::engine::audit::LogEntry;
    use crate::engine::Rule;
    use crate::variables::Variable;
    use std::sync::Mutex;

    fn transaction(rules: RuleSet) -> Transaction {
        Transaction::new(
            "tx-test".to_string(),
            Arc::new(rules),
            Arc::new(EngineConfig::default()),
            crate::identity(),
            None,
            None,
        )
    }

    fn logging_transaction(
        rules: RuleSet,
        log_property: LogProperty,
    ) -> (Transaction, Arc<Mutex<Vec<LogEntry>>>) {
        let entries = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&entries);
        let callback: LogCallback = Arc::new(move |entry: &LogEntry| {
            sink.lock().unwrap().push(entry.clone());
        });
        let config = EngineConfig {
            log_property,
            ..EngineConfig::default()
        };
        let tx = Transaction::new(
            "tx-log".to_string(),
            Arc::new(rules),
            Arc::new(config),
            crate::identity(),
            None,
            Some(callback),
        );
        (tx, entries)
    }

    fn admin_deny() -> RuleSet {
        RuleSet::compile([Rule::builder(5, Phase::Uri)
            .target(Variable::RequestUri)
            .operator("@beginsWith", "/admin")
            .msg("admin area")
            .action(Action::Deny)])
        .unwrap()
    }

    fn hit_admin(tx: &mut Transaction) {
        tx.advance(Phase::Connection, PhaseData::Empty).unwrap();
        let outcome = tx
            .advance(Phase::Uri, PhaseData::uri("/admin", "GET", "HTTP/1.1"))
            .unwrap();
        assert!(outcome.disrupted);
    }

    #[test]
    fn test_initial_state() {
        let tx = transaction(admin_deny());
        assert_eq!(tx.state(), TransactionState::New);
        assert_eq!(tx.current_phase(), Phase::Connection);
        assert!(!tx.is_disrupted());
        assert!(tx.audit_record().is_none());
    }

    #[test]
    fn test_first_phase_must_be_connection() {
        let rules = RuleSet::compile([Rule::builder(1, Phase::Connection).action(Action::Deny)])
            .unwrap();
        let mut tx = transaction(rules);

        let err = tx
            .advance(Phase::Uri, PhaseData::uri("/", "GET", "HTTP/1.1"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidPhaseOrder {
                current: Phase::Connection,
                requested: Phase::Uri,
            }
        ));
        assert_eq!(tx.state(), TransactionState::New);
        assert_eq!(tx.variables().revision(), 0);

        let outcome = tx.advance(Phase::Connection, PhaseData::Empty).unwrap();
        assert!(outcome.disrupted);
        assert_eq!(tx.disruptive_action().map(|a| a.rule_id), Some(1));
    }

    #[test]
    fn test_latch_is_terminal() {
        let mut tx = transaction(admin_deny());
        hit_admin(&mut tx);
        assert_eq!(tx.state(), TransactionState::Disrupted);

        let revision = tx.variables().revision();
        let err = tx
            .advance(Phase::Uri, PhaseData::uri("/again", "GET", "HTTP/1.1"))
            .unwrap_err();
        assert_eq!(err.disruption(), tx.disruptive_action());
        assert_eq!(tx.variables().revision(), revision);
    }

    #[test]
    fn test_skip_span_survives_reentry() {
        let rules = RuleSet::compile([
            Rule::builder(1, Phase::RequestBody)
                .target(Variable::RequestBody)
                .operator("@contains", "a")
                .action(Action::Skip(1))
                .action(Action::Pass),
            Rule::builder(2, Phase::RequestBody)
                .target(Variable::RequestBody)
                .operator("@contains", "a")
                .action(Action::Deny),
        ])
        .unwrap();
        let mut tx = transaction(rules);
        tx.advance(Phase::Connection, PhaseData::Empty).unwrap();
        tx.advance(Phase::Uri, PhaseData::uri("/", "POST", "HTTP/1.1"))
            .unwrap();
        tx.advance(Phase::RequestHeaders, PhaseData::Empty).unwrap();

        let first = tx
            .advance(Phase::RequestBody, PhaseData::RequestBody(b"a".to_vec()))
            .unwrap();
        assert!(!first.disrupted);
        let second = tx
            .advance(Phase::RequestBody, PhaseData::RequestBody(b"b".to_vec()))
            .unwrap();
        assert!(!second.disrupted);
        assert_eq!(tx.matches().len(), 1);
        assert_eq!(tx.matches()[0].rule_id, 1);
    }

    #[test]
    fn test_logging_from_connection() {
        let mut tx = transaction(admin_deny());
        let outcome = tx.advance(Phase::Logging, PhaseData::Empty).unwrap();
        assert!(!outcome.disrupted);
        assert!(outcome.should_continue);

        let audit = tx.audit_record().unwrap();
        assert_eq!(audit.final_phase, Phase::Connection);
        assert!(audit.matches.is_empty());
        assert_eq!(tx.state(), TransactionState::Completed);
    }

    #[test]
    fn test_logging_rejects_data() {
        let mut tx = transaction(admin_deny());
        let err = tx
            .advance(Phase::Logging, PhaseData::RequestBody(b"x".to_vec()))
            .unwrap_err();
        assert!(matches!(err, Error::PhaseDataMismatch { phase: Phase::Logging, .. }));
        assert!(!tx.is_completed());
    }

    #[test]
    fn test_text_log_entry() {
        let (mut tx, entries) = logging_transaction(admin_deny(), LogProperty::default());
        hit_admin(&mut tx);

        let entries = entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        match &entries[0] {
            LogEntry::Text(line) => {
                assert!(line.starts_with("[id \"5\"]"));
                assert!(line.contains("[msg \"admin area\"]"));
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_rule_message_log_entry_without_highlight() {
        let (mut tx, entries) = logging_transaction(admin_deny(), LogProperty::RULE_MESSAGE);
        hit_admin(&mut tx);

        let entries = entries.lock().unwrap();
        match &entries[0] {
            LogEntry::RuleMessage(record) => {
                assert_eq!(record.rule_id, 5);
                assert_eq!(record.matched_variable, "REQUEST_URI");
                assert!(record.matched_value.is_empty());
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_rule_message_log_entry_with_highlight() {
        let property = LogProperty::RULE_MESSAGE | LogProperty::INCLUDE_FULL_HIGHLIGHT;
        let (mut tx, entries) = logging_transaction(admin_deny(), property);
        hit_admin(&mut tx);

        let entries = entries.lock().unwrap();
        match &entries[0] {
            LogEntry::RuleMessage(record) => assert_eq!(record.matched_value, "/admin"),
            other => panic!("unexpected entry {:?}", other),
        }
        assert_eq!(tx.matches()[0].matched_value, "/admin");
    }

    #[test]
    fn test_nolog_rules_do_not_reach_callback() {
        let rules = RuleSet::compile([Rule::builder(9, Phase::Connection)
            .action(Action::Pass)
            .action(Action::NoLog)])
        .unwrap();
        let (mut tx, entries) = logging_transaction(rules, LogProperty::default());
        tx.advance(Phase::Connection, PhaseData::Empty).unwrap();

        assert_eq!(tx.matches().len(), 1);
        assert!(entries.lock().unwrap().is_empty());
    }

    #[test]
    fn test_debug_is_compact() {
        let tx = transaction(admin_deny());
        let debug = format!("{:?}", tx);
        assert!(debug.contains("tx-test"));
        assert!(!debug.contains("ruleset"));
    }
}
