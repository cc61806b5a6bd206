//! The serialized output contract of one analysis run.
//!
//! Field names here are the public contract; `score`, `findings`,
//! `compound_findings`, `remediation_plan` and `optimized_code` never change.
//! Everything else is additive.

use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use warden_core::analysis::PrecedenceResolution;
use warden_core::{
    AnalysisRun, Category, CostEstimate, Diagnostic, Finding, FindingId, FindingLocation, Origin,
    Priority, RemediationPlanItem, Severity,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFinding {
    pub id: FindingId,
    pub severity: Severity,
    pub pattern_id: String,
    pub title: String,
    pub category: Category,
    pub location: FindingLocation,
    pub description: String,
    pub recommendation: String,
    /// Rule severity before correlation escalated it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalated_from: Option<Severity>,
}

impl From<&Finding> for ReportFinding {
    fn from(finding: &Finding) -> Self {
        Self {
            id: finding.id.clone(),
            severity: finding.severity,
            pattern_id: finding.rule_id.clone(),
            title: finding.title.clone(),
            category: finding.category,
            location: finding.location.clone(),
            description: finding.description.clone(),
            recommendation: finding.recommendation.clone(),
            escalated_from: (finding.severity != finding.base_severity).then_some(finding.base_severity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundReport {
    pub id: FindingId,
    pub severity: Severity,
    pub title: String,
    pub correlation_rule: String,
    pub source_findings: Vec<FindingId>,
    pub location: FindingLocation,
    pub description: String,
    pub recommendation: String,
}

impl From<&Finding> for CompoundReport {
    fn from(finding: &Finding) -> Self {
        let (correlation_rule, source_findings) = match &finding.origin {
            Origin::Derived {
                correlation_rule,
                sources,
            } => (correlation_rule.clone(), sources.clone()),
            Origin::Raw => (finding.rule_id.clone(), Vec::new()),
        };
        Self {
            id: finding.id.clone(),
            severity: finding.severity,
            title: finding.title.clone(),
            correlation_rule,
            source_findings,
            location: finding.location.clone(),
            description: finding.description.clone(),
            recommendation: finding.recommendation.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub priority: Priority,
    pub finding_refs: Vec<FindingId>,
    pub fix_description: String,
    /// Exact original text the edit replaces; empty for insertions and advisories.
    pub before: String,
    pub after: String,
    pub supersedes: Vec<FindingId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub displaced: Vec<FindingId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl PlanEntry {
    pub fn is_advisory(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }
}

impl From<&RemediationPlanItem> for PlanEntry {
    fn from(item: &RemediationPlanItem) -> Self {
        let (before, after) = match &item.edit {
            Some(edit) => (edit.before.clone(), edit.after.clone()),
            None => (String::new(), String::new()),
        };
        Self {
            priority: item.priority,
            finding_refs: item.finding_refs.clone(),
            fix_description: item.fix_description.clone(),
            before,
            after,
            supersedes: item.supersedes.clone(),
            displaced: item.displaced.clone(),
            notes: item.notes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub score: u32,
    pub findings: Vec<ReportFinding>,
    pub compound_findings: Vec<CompoundReport>,
    pub remediation_plan: Vec<PlanEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimized_code: Option<String>,
    pub pass_scores: IndexMap<String, u32>,
    pub precedence_resolutions: Vec<PrecedenceResolution>,
    #[serde(default)]
    pub cost_estimates: Vec<CostEstimate>,
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisReport {
    pub fn from_run(run: &AnalysisRun) -> Self {
        Self {
            file: None,
            score: run.score,
            findings: run.findings.iter().map(ReportFinding::from).collect(),
            compound_findings: run.compound_findings.iter().map(CompoundReport::from).collect(),
            remediation_plan: run.plan.iter().map(PlanEntry::from).collect(),
            optimized_code: run.patch.as_ref().map(|p| p.code.clone()),
            pass_scores: run
                .pass_scores
                .iter()
                .map(|(pass, score)| (pass.name().to_string(), *score))
                .collect(),
            precedence_resolutions: run.resolutions.clone(),
            cost_estimates: run.cost_estimates.clone(),
            diagnostics: run.diagnostics.clone(),
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Number of raw and compound findings per severity, most severe first.
    pub fn severity_counts(&self) -> IndexMap<Severity, usize> {
        let mut counts: IndexMap<Severity, usize> = [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Info,
        ]
        .into_iter()
        .map(|s| (s, 0))
        .collect();
        let severities = self
            .compound_findings
            .iter()
            .map(|c| c.severity)
            .chain(self.findings.iter().map(|f| f.severity));
        for severity in severities {
            *counts.entry(severity).or_insert(0) += 1;
        }
        counts
    }

    pub fn total_findings(&self) -> usize {
        self.findings.len() + self.compound_findings.len()
    }

    pub fn is_clean(&self) -> bool {
        self.total_findings() == 0
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
