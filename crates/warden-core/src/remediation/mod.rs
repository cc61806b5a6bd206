//! Remediation planning and patch generation.
//!
//! Findings are turned into concrete text edits against the original source
//! ([`templates`]), ordered and de-conflicted ([`planner`]), then applied in a
//! single pass ([`patch`]).

pub mod patch;
pub mod planner;
pub mod templates;

pub use patch::{PatchGenerator, PatchOutcome};
pub use planner::{PlanCandidate, RemediationPlanner};
pub use templates::edit_for;

use crate::finding::{Category, Finding, FindingId, Severity};
use crate::source_location::SourceSpan;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Replace `before` at `span` with `after`. An empty span is an insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub span: SourceSpan,
    pub before: String,
    pub after: String,
}

impl Edit {
    pub fn replace(span: SourceSpan, before: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            span,
            before: before.into(),
            after: after.into(),
        }
    }

    pub fn insert(at: u32, text: impl Into<String>) -> Self {
        Self {
            span: SourceSpan::insertion(at as usize),
            before: String::new(),
            after: text.into(),
        }
    }

    pub fn is_insertion(&self) -> bool {
        self.span.is_empty()
    }
}

/// Plan ordering, most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Compound,
    Critical,
    High,
    Medium,
    Optimization,
    Info,
}

impl Priority {
    pub fn of(finding: &Finding) -> Priority {
        if finding.is_derived() {
            return Priority::Compound;
        }
        if finding.category == Category::Cost {
            return Priority::Optimization;
        }
        match finding.severity {
            Severity::Critical => Priority::Critical,
            Severity::High => Priority::High,
            Severity::Medium => Priority::Medium,
            Severity::Info => Priority::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Compound => "compound",
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Optimization => "optimization",
            Priority::Info => "info",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationPlanItem {
    pub priority: Priority,
    pub finding_refs: Vec<FindingId>,
    pub fix_description: String,
    /// `None` for advisory items that have no mechanical fix.
    pub edit: Option<Edit>,
    /// Lower-priority findings this item's edit also fixes.
    pub supersedes: Vec<FindingId>,
    /// Lower-priority findings whose overlapping edit was dropped unapplied.
    pub displaced: Vec<FindingId>,
    pub notes: Vec<String>,
}

impl RemediationPlanItem {
    pub fn span(&self) -> Option<SourceSpan> {
        self.edit.as_ref().map(|e| e.span)
    }

    pub fn resolves(&self, id: &FindingId) -> bool {
        self.finding_refs.contains(id) || self.supersedes.contains(id)
    }
}
