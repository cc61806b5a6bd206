//! Cross-pass correlation.
//!
//! Each rule looks at the union of the three pass results and may issue a
//! precedence directive for a finding (keep, drop, escalate) and emit compound
//! findings. Rules run independently over the same input, in declaration
//! order; when two rules disagree about one finding the earlier rule wins and
//! the disagreement is reported.

use super::cost::CostEstimator;
use super::rules::{
    MISSING_EVENT_EMISSION, MISSING_TYPE_VALIDATION, REINITIALIZATION, UNCHECKED_ARITHMETIC,
};
use crate::config::AnalysisConfig;
use crate::errors::CorrelationConflictUnresolved;
use crate::finding::{
    sort_by_discovery, Category, Finding, FindingId, FindingLocation, Origin, RecommendationKind,
    Severity,
};
use crate::model::ProgramModel;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

pub const SECURITY_PRECEDENCE: &str = "security-precedence";
pub const EVENT_ESCALATION: &str = "event-escalation";
pub const TYPE_SAFETY_CLOSURE: &str = "type-safety-closure";
pub const OVERFLOW_BUDGET: &str = "overflow-budget";
pub const REINIT_OBSERVABILITY: &str = "reinit-observability";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "directive", rename_all = "snake_case")]
pub enum Directive {
    Keep,
    Drop,
    Escalate { to: Severity },
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Keep => f.write_str("keep"),
            Directive::Drop => f.write_str("drop"),
            Directive::Escalate { to } => write!(f, "escalate to {}", to),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecedenceResolution {
    pub finding: FindingId,
    pub rule: String,
    #[serde(flatten)]
    pub directive: Directive,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct CompoundSpec {
    pub severity: Severity,
    pub title: String,
    pub sources: Vec<FindingId>,
    pub anchor: FindingLocation,
    pub description: String,
    pub recommendation: String,
    pub fix: RecommendationKind,
}

#[derive(Debug, Default)]
pub struct Verdicts {
    pub directives: Vec<(FindingId, Directive, String)>,
    pub compounds: Vec<CompoundSpec>,
}

/// Findings of one run split by pass, derived findings already removed.
pub struct CorrelationContext<'a> {
    pub model: &'a ProgramModel,
    pub config: &'a AnalysisConfig,
    pub security: Vec<&'a Finding>,
    pub convention: Vec<&'a Finding>,
    pub cost: Vec<&'a Finding>,
}

pub trait CorrelationRule: Send + Sync {
    fn id(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn evaluate(&self, ctx: &CorrelationContext<'_>) -> Verdicts;
}

#[derive(Debug, Clone, Default)]
pub struct CorrelationOutcome {
    /// Raw findings with drop and escalate directives applied.
    pub findings: Vec<Finding>,
    pub compound_findings: Vec<Finding>,
    pub resolutions: Vec<PrecedenceResolution>,
    pub conflicts: Vec<CorrelationConflictUnresolved>,
}

pub struct CorrelationEngine {
    rules: Vec<Box<dyn CorrelationRule>>,
}

impl Default for CorrelationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationEngine {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(SecurityPrecedence),
                Box::new(EventEscalation),
                Box::new(TypeSafetyClosure),
                Box::new(OverflowBudget),
                Box::new(ReinitObservability),
            ],
        }
    }

    pub fn with_rules(rules: Vec<Box<dyn CorrelationRule>>) -> Self {
        Self { rules }
    }

    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    /// `findings` may include compound findings from an earlier run; they are
    /// carried through untouched and never matched.
    pub fn correlate(
        &self,
        model: &ProgramModel,
        config: &AnalysisConfig,
        findings: &[Finding],
    ) -> CorrelationOutcome {
        let (prior_compounds, raw): (Vec<&Finding>, Vec<&Finding>) =
            findings.iter().partition(|f| f.is_derived());

        let by_category = |category: Category| -> Vec<&Finding> {
            raw.iter().copied().filter(|f| f.category == category).collect()
        };
        let ctx = CorrelationContext {
            model,
            config,
            security: by_category(Category::Security),
            convention: by_category(Category::Convention),
            cost: by_category(Category::Cost),
        };

        let mut decided: IndexMap<FindingId, (&'static str, Directive)> = IndexMap::new();
        let mut resolutions = Vec::new();
        let mut conflicts = Vec::new();
        let mut compounds: IndexMap<FindingId, Finding> = prior_compounds
            .iter()
            .map(|f| (f.id.clone(), (*f).clone()))
            .collect();

        for rule in &self.rules {
            let verdicts = rule.evaluate(&ctx);
            debug!(
                rule = rule.id(),
                directives = verdicts.directives.len(),
                compounds = verdicts.compounds.len(),
                "correlation rule evaluated"
            );

            for (finding, directive, reason) in verdicts.directives {
                match decided.get(&finding) {
                    None => {
                        decided.insert(finding.clone(), (rule.id(), directive));
                        resolutions.push(PrecedenceResolution {
                            finding,
                            rule: rule.id().to_string(),
                            directive,
                            reason,
                        });
                    }
                    Some((_, existing)) if *existing == directive => {}
                    Some((kept_rule, existing)) => {
                        let conflict = CorrelationConflictUnresolved {
                            finding,
                            kept_rule: kept_rule.to_string(),
                            kept: existing.to_string(),
                            suppressed_rule: rule.id().to_string(),
                            suppressed: directive.to_string(),
                        };
                        warn!(%conflict, "correlation conflict");
                        conflicts.push(conflict);
                    }
                }
            }

            for spec in verdicts.compounds {
                let compound = compound_finding(rule.id(), spec);
                compounds.entry(compound.id.clone()).or_insert(compound);
            }
        }

        let mut out: Vec<Finding> = raw
            .iter()
            .filter_map(|f| match decided.get(&f.id) {
                Some((_, Directive::Drop)) => None,
                Some((_, Directive::Escalate { to })) => Some((*f).clone().with_severity(*to)),
                _ => Some((*f).clone()),
            })
            .collect();
        sort_by_discovery(&mut out);

        let mut compound_findings: Vec<Finding> = compounds.into_values().collect();
        compound_findings.sort_by(|a, b| a.id.cmp(&b.id));

        CorrelationOutcome {
            findings: out,
            compound_findings,
            resolutions,
            conflicts,
        }
    }
}

fn compound_finding(rule: &str, spec: CompoundSpec) -> Finding {
    Finding {
        id: FindingId::compound(rule, &spec.sources),
        rule_id: rule.to_string(),
        title: spec.title,
        category: Category::Security,
        severity: spec.severity,
        base_severity: spec.severity,
        location: spec.anchor,
        description: spec.description,
        recommendation: spec.recommendation,
        fix: spec.fix,
        subject: None,
        origin: Origin::Derived {
            correlation_rule: rule.to_string(),
            sources: spec.sources,
        },
    }
}

/// Rule 1: a security fix that adds a constraint beats a cost fix removing one
/// at the same location.
pub struct SecurityPrecedence;

impl CorrelationRule for SecurityPrecedence {
    fn id(&self) -> &'static str {
        SECURITY_PRECEDENCE
    }

    fn description(&self) -> &'static str {
        "security constraint additions override cost-driven removals at the same location"
    }

    fn evaluate(&self, ctx: &CorrelationContext<'_>) -> Verdicts {
        let mut verdicts = Verdicts::default();
        for cost in ctx.cost.iter().filter(|c| c.fix == RecommendationKind::RemoveConstraint) {
            let winner = ctx.security.iter().find(|s| {
                s.fix == RecommendationKind::AddConstraint && s.location.same_site(&cost.location)
            });
            if let Some(security) = winner {
                verdicts.directives.push((
                    cost.id.clone(),
                    Directive::Drop,
                    format!(
                        "{} adds a constraint at {} that {} would remove",
                        security.rule_id, cost.location, cost.rule_id
                    ),
                ));
            }
        }
        verdicts
    }
}

/// Rule 2: a security issue on a fund-moving instruction that also emits no
/// event is harder to detect after the fact.
pub struct EventEscalation;

impl CorrelationRule for EventEscalation {
    fn id(&self) -> &'static str {
        EVENT_ESCALATION
    }

    fn description(&self) -> &'static str {
        "missing events on fund-moving instructions with security findings are escalated"
    }

    fn evaluate(&self, ctx: &CorrelationContext<'_>) -> Verdicts {
        let mut verdicts = Verdicts::default();

        for event in ctx.convention.iter().filter(|f| f.rule_id == MISSING_EVENT_EMISSION) {
            let name = &event.location.instruction;
            let Some(instruction) = ctx.model.instruction(name) else {
                continue;
            };
            if !ctx.model.is_fund_moving(instruction) {
                continue;
            }
            let mut security: Vec<&&Finding> = ctx
                .security
                .iter()
                .filter(|s| &s.location.instruction == name)
                .collect();
            if security.is_empty() {
                continue;
            }
            security.sort_by(|a, b| b.severity.cmp(&a.severity));

            let to = event.base_severity.escalate_capped();
            verdicts.directives.push((
                event.id.clone(),
                Directive::Escalate { to },
                format!("`{}` moves funds and has {} security finding(s)", name, security.len()),
            ));

            let mut sources: Vec<FindingId> = security.iter().map(|s| s.id.clone()).collect();
            sources.push(event.id.clone());
            let rules: Vec<&str> = security.iter().map(|s| s.rule_id.as_str()).collect();
            verdicts.compounds.push(CompoundSpec {
                severity: Severity::High,
                title: "Unobservable exploit path on fund-moving instruction".to_string(),
                sources,
                anchor: event.location.clone(),
                description: format!(
                    "`{}` moves funds, is exposed to {} and emits no event, so exploitation leaves no on-chain trace for monitoring",
                    name,
                    rules.join(", ")
                ),
                recommendation: "Fix the security finding first, then emit an event for every fund movement.".to_string(),
                fix: security[0].fix,
            });
        }

        verdicts
    }
}

/// Rule 3: unvalidated account types combined with closable accounts allow
/// reuse of stale data from a closed account.
pub struct TypeSafetyClosure;

impl CorrelationRule for TypeSafetyClosure {
    fn id(&self) -> &'static str {
        TYPE_SAFETY_CLOSURE
    }

    fn description(&self) -> &'static str {
        "missing type validation plus closable accounts enables stale-data reuse"
    }

    fn evaluate(&self, ctx: &CorrelationContext<'_>) -> Verdicts {
        let mut verdicts = Verdicts::default();
        let closable: Vec<&str> = ctx
            .model
            .accounts()
            .values()
            .filter(|a| a.constraints.close.is_some())
            .map(|a| a.name.as_str())
            .collect();
        if closable.is_empty() {
            return verdicts;
        }

        for finding in ctx.security.iter().filter(|f| f.rule_id == MISSING_TYPE_VALIDATION) {
            let account = finding.location.account.as_deref().unwrap_or("account");
            verdicts.compounds.push(CompoundSpec {
                severity: Severity::High,
                title: "Stale-data reuse through closed accounts".to_string(),
                sources: vec![finding.id.clone()],
                anchor: finding.location.clone(),
                description: format!(
                    "`{}` is not type-checked while {} can be closed; a closed or revived account can be passed in its place",
                    account,
                    closable.join(", ")
                ),
                recommendation: "Validate the account type so closed accounts are rejected by discriminator.".to_string(),
                fix: finding.fix,
            });
        }
        verdicts
    }
}

/// Rule 4: overflow in an instruction already close to its compute budget.
pub struct OverflowBudget;

impl CorrelationRule for OverflowBudget {
    fn id(&self) -> &'static str {
        OVERFLOW_BUDGET
    }

    fn description(&self) -> &'static str {
        "unchecked arithmetic in instructions near the compute budget"
    }

    fn evaluate(&self, ctx: &CorrelationContext<'_>) -> Verdicts {
        let mut verdicts = Verdicts::default();
        let mut by_instruction: IndexMap<&str, Vec<&Finding>> = IndexMap::new();
        for finding in ctx.security.iter().filter(|f| f.rule_id == UNCHECKED_ARITHMETIC) {
            by_instruction
                .entry(finding.location.instruction.as_str())
                .or_default()
                .push(finding);
        }

        let estimator = CostEstimator::new(ctx.model, &ctx.config.cost_model);
        let limit = ctx.config.budget_pressure_limit();

        for (name, findings) in by_instruction {
            let Some(instruction) = ctx.model.instruction(name) else {
                continue;
            };
            let estimate = estimator.estimate(instruction);
            if estimate.total <= limit {
                continue;
            }
            verdicts.compounds.push(CompoundSpec {
                severity: Severity::High,
                title: "Overflow under compute pressure".to_string(),
                sources: findings.iter().map(|f| f.id.clone()).collect(),
                anchor: findings[0].location.clone(),
                description: format!(
                    "`{}` uses unchecked arithmetic and is estimated at {} of {} compute units; a partial execution can leave inconsistent balances",
                    name, estimate.total, ctx.config.compute_budget
                ),
                recommendation: "Switch to checked arithmetic and reduce the instruction's compute footprint.".to_string(),
                fix: findings[0].fix,
            });
        }
        verdicts
    }
}

/// Rule 5: a reinitializable account on an instruction that emits nothing.
pub struct ReinitObservability;

impl CorrelationRule for ReinitObservability {
    fn id(&self) -> &'static str {
        REINIT_OBSERVABILITY
    }

    fn description(&self) -> &'static str {
        "reinitialization without events makes state resets undetectable"
    }

    fn evaluate(&self, ctx: &CorrelationContext<'_>) -> Verdicts {
        let mut verdicts = Verdicts::default();
        for finding in ctx.security.iter().filter(|f| f.rule_id == REINITIALIZATION) {
            let Some(instruction) = ctx.model.instruction(&finding.location.instruction) else {
                continue;
            };
            if instruction.emits() {
                continue;
            }
            verdicts.compounds.push(CompoundSpec {
                severity: Severity::Medium,
                title: "Undetectable state reset".to_string(),
                sources: vec![finding.id.clone()],
                anchor: finding.location.clone(),
                description: format!(
                    "`{}` can reinitialize accounts and emits no event, so a reset cannot be observed off-chain",
                    instruction.name
                ),
                recommendation: "Prevent reinitialization and emit an event from the initializer.".to_string(),
                fix: finding.fix,
            });
        }
        verdicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ProgramModelBuilder;
    use crate::source_location::{SourceFile, SourceSpan};
    use pretty_assertions::assert_eq;

    fn empty_model() -> ProgramModel {
        ProgramModelBuilder::new(SourceFile::new(None, "").unwrap())
            .build()
            .unwrap()
    }

    fn finding(rule: &str, category: Category, fix: RecommendationKind, start: u32) -> Finding {
        let location = FindingLocation::instruction("withdraw")
            .with_account("vault")
            .at(SourceSpan::new(start, 3), 1);
        Finding {
            id: FindingId::raw(rule, &location),
            rule_id: rule.to_string(),
            title: String::new(),
            category,
            severity: Severity::Medium,
            base_severity: Severity::Medium,
            location,
            description: String::new(),
            recommendation: String::new(),
            fix,
            subject: None,
            origin: Origin::Raw,
        }
    }

    struct Fixed(&'static str, Directive);

    impl CorrelationRule for Fixed {
        fn id(&self) -> &'static str {
            self.0
        }

        fn description(&self) -> &'static str {
            "fixed directive"
        }

        fn evaluate(&self, ctx: &CorrelationContext<'_>) -> Verdicts {
            let mut verdicts = Verdicts::default();
            for f in &ctx.cost {
                verdicts.directives.push((f.id.clone(), self.1, "test".to_string()));
            }
            verdicts
        }
    }

    #[test]
    fn test_security_addition_drops_cost_removal() {
        let model = empty_model();
        let config = AnalysisConfig::default();
        let findings = vec![
            finding("missing-has-one", Category::Security, RecommendationKind::AddConstraint, 10),
            finding("unnecessary-mut", Category::Cost, RecommendationKind::RemoveConstraint, 20),
        ];

        let outcome = CorrelationEngine::new().correlate(&model, &config, &findings);

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].rule_id, "missing-has-one");
        assert_eq!(outcome.resolutions.len(), 1);
        assert_eq!(outcome.resolutions[0].directive, Directive::Drop);
        assert_eq!(outcome.resolutions[0].rule, SECURITY_PRECEDENCE);
        assert!(outcome.conflicts.is_empty());
    }

    #[test]
    fn test_earlier_rule_wins_conflict() {
        let model = empty_model();
        let config = AnalysisConfig::default();
        let findings = vec![finding("unnecessary-mut", Category::Cost, RecommendationKind::RemoveConstraint, 20)];
        let engine = CorrelationEngine::with_rules(vec![
            Box::new(Fixed("first", Directive::Escalate { to: Severity::High })),
            Box::new(Fixed("second", Directive::Drop)),
            Box::new(Fixed("third", Directive::Escalate { to: Severity::High })),
        ]);

        let outcome = engine.correlate(&model, &config, &findings);

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].severity, Severity::High);
        assert_eq!(outcome.findings[0].base_severity, Severity::Medium);
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].kept_rule, "first");
        assert_eq!(outcome.conflicts[0].suppressed_rule, "second");
    }

    #[test]
    fn test_prior_compounds_pass_through() {
        let model = empty_model();
        let config = AnalysisConfig::default();
        let source = finding("reinitialization", Category::Security, RecommendationKind::ReplaceConstraint, 5);
        let compound = compound_finding(
            REINIT_OBSERVABILITY,
            CompoundSpec {
                severity: Severity::Medium,
                title: "t".into(),
                sources: vec![source.id.clone()],
                anchor: source.location.clone(),
                description: String::new(),
                recommendation: String::new(),
                fix: source.fix,
            },
        );

        let outcome = CorrelationEngine::new().correlate(&model, &config, &[source, compound.clone()]);

        assert_eq!(outcome.compound_findings, vec![compound]);
        assert_eq!(outcome.findings.len(), 1);
    }
}
