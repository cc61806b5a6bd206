//! Pattern matching, scoring and cross-pass correlation over a [`ProgramModel`].
//!
//! [`ProgramModel`]: crate::model::ProgramModel

pub mod convention;
pub mod correlation;
pub mod cost;
pub mod matcher;
pub mod optimization;
pub mod rules;
pub mod scoring;
pub mod security;

use crate::finding::Category;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use correlation::{CorrelationEngine, CorrelationOutcome, Directive, PrecedenceResolution};
pub use cost::{CostBreakdown, CostEstimate, CostEstimator};
pub use matcher::{PassOutcome, PatternMatcher};
pub use rules::{rule, rules_for, Detection, Rule, RULES};
pub use scoring::score;

/// The three independent passes. A closed set: adding a pass means adding a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisPass {
    Security,
    Convention,
    Cost,
}

impl AnalysisPass {
    pub const ALL: [AnalysisPass; 3] = [
        AnalysisPass::Security,
        AnalysisPass::Convention,
        AnalysisPass::Cost,
    ];

    pub fn category(&self) -> Category {
        match self {
            AnalysisPass::Security => Category::Security,
            AnalysisPass::Convention => Category::Convention,
            AnalysisPass::Cost => Category::Cost,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnalysisPass::Security => "security",
            AnalysisPass::Convention => "convention",
            AnalysisPass::Cost => "cost",
        }
    }
}

impl fmt::Display for AnalysisPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Field names that hold signing authority over program state.
pub(crate) const PRIVILEGED_NAMES: &[&str] = &[
    "authority",
    "admin",
    "owner",
    "manager",
    "operator",
    "governance",
    "guardian",
    "multisig",
    "payer",
    "fee_authority",
    "update_authority",
    "withdraw_authority",
    "close_authority",
    "freeze_authority",
    "mint_authority",
    "signer",
    "user",
];

pub(crate) fn is_privileged(name: &str) -> bool {
    PRIVILEGED_NAMES
        .iter()
        .any(|p| name == *p || name.ends_with(&format!("_{}", p)))
}
