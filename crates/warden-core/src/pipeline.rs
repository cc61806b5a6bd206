//! One analysis run over a built model: passes, correlation, scoring,
//! remediation planning and optional patching.

use crate::analysis::{
    score, AnalysisPass, CorrelationEngine, CostEstimate, CostEstimator, PassOutcome,
    PatternMatcher, PrecedenceResolution,
};
use crate::config::AnalysisConfig;
use crate::errors::{CorrelationConflictUnresolved, Diagnostic, WardenError};
use crate::finding::Finding;
use crate::model::ProgramModel;
use crate::remediation::{PatchGenerator, PatchOutcome, RemediationPlanItem, RemediationPlanner};
use indexmap::IndexMap;
use tracing::{debug, info_span};

#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub pass_outcomes: Vec<PassOutcome>,
    /// Raw findings after correlation and the severity threshold.
    pub findings: Vec<Finding>,
    pub compound_findings: Vec<Finding>,
    pub resolutions: Vec<PrecedenceResolution>,
    pub conflicts: Vec<CorrelationConflictUnresolved>,
    pub score: u32,
    pub pass_scores: IndexMap<AnalysisPass, u32>,
    pub cost_estimates: Vec<CostEstimate>,
    pub plan: Vec<RemediationPlanItem>,
    pub patch: Option<PatchOutcome>,
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisRun {
    /// Raw and compound findings together, compounds first.
    pub fn all_findings(&self) -> impl Iterator<Item = &Finding> {
        self.compound_findings.iter().chain(self.findings.iter())
    }

    pub fn findings_for(&self, rule_id: &str) -> Vec<&Finding> {
        self.all_findings().filter(|f| f.rule_id == rule_id).collect()
    }
}

pub fn analyze_model(model: &ProgramModel, config: &AnalysisConfig) -> AnalysisRun {
    let span = info_span!("analyze", program = model.program_name().unwrap_or("<anonymous>"));
    let _guard = span.enter();

    let passes = config.pass.passes();
    let matcher = PatternMatcher::new(model, config);
    let pass_outcomes = matcher.run_passes(&passes);

    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let mut merged: Vec<Finding> = Vec::new();
    for outcome in &pass_outcomes {
        debug!(
            pass = %outcome.pass,
            findings = outcome.findings.len(),
            errors = outcome.rule_errors.len(),
            elapsed_us = outcome.duration.as_micros() as u64,
            "pass finished"
        );
        merged.extend(outcome.findings.iter().cloned());
        diagnostics.extend(
            outcome
                .rule_errors
                .iter()
                .map(|e| WardenError::from(e.clone()).to_diagnostic()),
        );
    }

    let correlation = CorrelationEngine::new().correlate(model, config, &merged);
    diagnostics.extend(
        correlation
            .conflicts
            .iter()
            .map(|c| WardenError::from(c.clone()).to_diagnostic()),
    );

    let threshold = config.severity_threshold;
    let findings: Vec<Finding> = correlation
        .findings
        .into_iter()
        .filter(|f| f.severity >= threshold)
        .collect();
    let compound_findings: Vec<Finding> = correlation
        .compound_findings
        .into_iter()
        .filter(|f| f.severity >= threshold)
        .collect();

    let reported: Vec<Finding> = compound_findings.iter().chain(&findings).cloned().collect();
    let total = score(&reported);
    let pass_scores: IndexMap<AnalysisPass, u32> = passes
        .iter()
        .map(|pass| {
            let of_pass: Vec<Finding> = findings
                .iter()
                .filter(|f| f.category == pass.category())
                .cloned()
                .collect();
            (*pass, score(&of_pass))
        })
        .collect();

    let cost_estimates = CostEstimator::new(model, &config.cost_model).estimate_all();

    let plan = RemediationPlanner::new(model, config).plan(&findings, &compound_findings);

    let patch = config.generate_patch.then(|| {
        let outcome = PatchGenerator::new(model.source().text()).apply(&plan);
        diagnostics.extend(
            outcome
                .drift
                .iter()
                .map(|d| WardenError::from(d.clone()).to_diagnostic()),
        );
        outcome
    });

    debug!(
        findings = findings.len(),
        compounds = compound_findings.len(),
        score = total,
        plan = plan.len(),
        "analysis finished"
    );

    AnalysisRun {
        pass_outcomes,
        findings,
        compound_findings,
        resolutions: correlation.resolutions,
        conflicts: correlation.conflicts,
        score: total,
        pass_scores,
        cost_estimates,
        plan,
        patch,
        diagnostics,
    }
}
