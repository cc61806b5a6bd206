use super::rules::{rules_for, Rule};
use super::AnalysisPass;
use crate::config::AnalysisConfig;
use crate::errors::RuleEvaluationError;
use crate::finding::{sort_by_discovery, Finding};
use crate::model::ProgramModel;
use rayon::prelude::*;
use std::cell::Cell;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

thread_local! {
    static IN_PREDICATE: Cell<bool> = const { Cell::new(false) };
}

static QUIET_HOOK: Once = Once::new();

/// Wraps the current panic hook so a predicate panic is reported only through
/// the returned `RuleEvaluationError`. Panics elsewhere reach the old hook.
fn install_quiet_hook() {
    QUIET_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !IN_PREDICATE.with(Cell::get) {
                previous(info);
            }
        }));
    });
}

#[derive(Debug, Clone)]
pub struct PassOutcome {
    pub pass: AnalysisPass,
    pub findings: Vec<Finding>,
    pub rule_errors: Vec<RuleEvaluationError>,
    pub duration: Duration,
}

/// Evaluates rule predicates against one shared model.
pub struct PatternMatcher<'a> {
    model: &'a ProgramModel,
    config: &'a AnalysisConfig,
}

impl<'a> PatternMatcher<'a> {
    pub fn new(model: &'a ProgramModel, config: &'a AnalysisConfig) -> Self {
        Self { model, config }
    }

    fn evaluate(&self, rule: &Rule) -> Result<Vec<Finding>, RuleEvaluationError> {
        let predicate = rule.predicate;
        let model = self.model;
        let config = self.config;

        install_quiet_hook();
        IN_PREDICATE.with(|flag| flag.set(true));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| predicate(model, config)));
        IN_PREDICATE.with(|flag| flag.set(false));
        let detections = match outcome {
            Ok(Ok(detections)) => detections,
            Ok(Err(message)) => {
                return Err(RuleEvaluationError {
                    rule_id: rule.id.to_string(),
                    message,
                })
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "predicate panicked".to_string());
                return Err(RuleEvaluationError {
                    rule_id: rule.id.to_string(),
                    message,
                });
            }
        };

        Ok(detections.into_iter().map(|d| rule.finding(d)).collect())
    }

    /// Runs every rule of `pass`. A failing rule is logged and contributes nothing.
    pub fn run_pass(&self, pass: AnalysisPass) -> PassOutcome {
        self.run_rules(pass, rules_for(pass))
    }

    pub fn run_rules<'r>(&self, pass: AnalysisPass, rules: impl Iterator<Item = &'r Rule>) -> PassOutcome {
        let start = Instant::now();
        let mut findings = Vec::new();
        let mut rule_errors = Vec::new();
        let mut seen = HashSet::new();

        for rule in rules {
            match self.evaluate(rule) {
                Ok(found) => {
                    debug!(rule = rule.id, count = found.len(), "rule evaluated");
                    for finding in found {
                        if seen.insert(finding.id.clone()) {
                            findings.push(finding);
                        }
                    }
                }
                Err(err) => {
                    warn!(rule = %err.rule_id, error = %err.message, "rule evaluation failed");
                    rule_errors.push(err);
                }
            }
        }

        sort_by_discovery(&mut findings);
        PassOutcome {
            pass,
            findings,
            rule_errors,
            duration: start.elapsed(),
        }
    }

    /// Passes run in parallel; outcomes come back in the order requested.
    pub fn run_passes(&self, passes: &[AnalysisPass]) -> Vec<PassOutcome> {
        passes.par_iter().map(|pass| self.run_pass(*pass)).collect()
    }
}
