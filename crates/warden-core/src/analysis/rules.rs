//! The rule database: a process-wide, read-only table.

use super::{convention, optimization, security, AnalysisPass};
use crate::config::AnalysisConfig;
use crate::finding::{Category, Finding, FindingId, FindingLocation, Origin, RecommendationKind, Severity};
use crate::model::ProgramModel;
use std::sync::LazyLock;

pub const MISSING_SIGNER_CHECK: &str = "missing-signer-check";
pub const MISSING_HAS_ONE: &str = "missing-has-one";
pub const UNCHECKED_ARITHMETIC: &str = "unchecked-arithmetic";
pub const UNVALIDATED_PDA: &str = "unvalidated-pda";
pub const HARDCODED_BUMP: &str = "hardcoded-bump";
pub const UNVERIFIED_CPI_TARGET: &str = "unverified-cpi-target";
pub const MISSING_TYPE_VALIDATION: &str = "missing-type-validation";
pub const REINITIALIZATION: &str = "reinitialization";
pub const DUPLICATE_MUTABLE_ACCOUNTS: &str = "duplicate-mutable-accounts";
pub const STATE_AFTER_CPI: &str = "state-after-cpi";

pub const MISSING_EVENT_EMISSION: &str = "missing-event-emission";
pub const MISSING_CHECK_COMMENT: &str = "missing-check-comment";
pub const HARDCODED_SPACE: &str = "hardcoded-space";

pub const REDERIVED_BUMP: &str = "rederived-bump";
pub const UNNECESSARY_MUT: &str = "unnecessary-mut";
pub const REDUNDANT_SIGNER_CONSTRAINT: &str = "redundant-signer-constraint";
pub const COMPUTE_BUDGET_EXCEEDED: &str = "compute-budget-exceeded";

/// Pure predicate over the model. `Err` marks an internal fault of the rule.
pub type Predicate = fn(&ProgramModel, &AnalysisConfig) -> Result<Vec<Detection>, String>;

/// One match of a rule predicate, before it becomes a [`Finding`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub location: FindingLocation,
    pub description: String,
    pub subject: Option<String>,
    /// Overrides the rule's recommendation kind when no concrete fix applies.
    pub fix: Option<RecommendationKind>,
}

impl Detection {
    pub fn new(location: FindingLocation, description: impl Into<String>) -> Self {
        Self {
            location,
            description: description.into(),
            subject: None,
            fix: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn advisory(mut self) -> Self {
        self.fix = Some(RecommendationKind::Advisory);
        self
    }
}

pub struct Rule {
    pub id: &'static str,
    pub title: &'static str,
    pub category: Category,
    pub severity: Severity,
    pub fix: RecommendationKind,
    pub recommendation: &'static str,
    pub predicate: Predicate,
}

impl Rule {
    pub fn pass(&self) -> AnalysisPass {
        match self.category {
            Category::Security => AnalysisPass::Security,
            Category::Convention => AnalysisPass::Convention,
            Category::Cost => AnalysisPass::Cost,
        }
    }

    pub fn finding(&self, detection: Detection) -> Finding {
        Finding {
            id: FindingId::raw(self.id, &detection.location),
            rule_id: self.id.to_string(),
            title: self.title.to_string(),
            category: self.category,
            severity: self.severity,
            base_severity: self.severity,
            location: detection.location,
            description: detection.description,
            recommendation: self.recommendation.to_string(),
            fix: detection.fix.unwrap_or(self.fix),
            subject: detection.subject,
            origin: Origin::Raw,
        }
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("severity", &self.severity)
            .finish()
    }
}

pub static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule {
            id: MISSING_SIGNER_CHECK,
            title: "Missing signer check",
            category: Category::Security,
            severity: Severity::Critical,
            fix: RecommendationKind::ReplaceType,
            recommendation: "Declare the authority account as Signer<'info> so the runtime enforces its signature.",
            predicate: security::missing_signer_check,
        },
        Rule {
            id: MISSING_HAS_ONE,
            title: "Missing has_one constraint",
            category: Category::Security,
            severity: Severity::High,
            fix: RecommendationKind::AddConstraint,
            recommendation: "Bind the stored authority to the signer with a has_one constraint.",
            predicate: security::missing_has_one,
        },
        Rule {
            id: UNCHECKED_ARITHMETIC,
            title: "Unchecked arithmetic",
            category: Category::Security,
            severity: Severity::High,
            fix: RecommendationKind::RewriteExpression,
            recommendation: "Use checked_* arithmetic and surface overflow as an error.",
            predicate: security::unchecked_arithmetic,
        },
        Rule {
            id: UNVALIDATED_PDA,
            title: "Unvalidated PDA seed",
            category: Category::Security,
            severity: Severity::Critical,
            fix: RecommendationKind::AddConstraint,
            recommendation: "Bound the length of caller-supplied seed bytes before deriving the address.",
            predicate: security::unvalidated_pda,
        },
        Rule {
            id: HARDCODED_BUMP,
            title: "Hardcoded PDA bump",
            category: Category::Security,
            severity: Severity::High,
            fix: RecommendationKind::ReplaceConstraint,
            recommendation: "Use the canonical bump, stored at initialization, instead of a literal.",
            predicate: security::hardcoded_bump,
        },
        Rule {
            id: UNVERIFIED_CPI_TARGET,
            title: "Unverified CPI target",
            category: Category::Security,
            severity: Severity::High,
            fix: RecommendationKind::ReplaceType,
            recommendation: "Declare the invoked program as Program<'info, T> or pin its address.",
            predicate: security::unverified_cpi_target,
        },
        Rule {
            id: MISSING_TYPE_VALIDATION,
            title: "Missing account type validation",
            category: Category::Security,
            severity: Severity::High,
            fix: RecommendationKind::ReplaceType,
            recommendation: "Deserialize the account as Account<'info, T> so owner and discriminator are checked.",
            predicate: security::missing_type_validation,
        },
        Rule {
            id: REINITIALIZATION,
            title: "Account reinitialization",
            category: Category::Security,
            severity: Severity::High,
            fix: RecommendationKind::ReplaceConstraint,
            recommendation: "Use init so an existing account cannot be initialized again.",
            predicate: security::reinitialization,
        },
        Rule {
            id: DUPLICATE_MUTABLE_ACCOUNTS,
            title: "Duplicate mutable accounts",
            category: Category::Security,
            severity: Severity::Medium,
            fix: RecommendationKind::AddConstraint,
            recommendation: "Require the two mutable accounts to have different keys.",
            predicate: security::duplicate_mutable_accounts,
        },
        Rule {
            id: STATE_AFTER_CPI,
            title: "State mutation after CPI",
            category: Category::Security,
            severity: Severity::Medium,
            fix: RecommendationKind::Advisory,
            recommendation: "Apply state changes before the cross-program invocation.",
            predicate: security::state_after_cpi,
        },
        Rule {
            id: MISSING_EVENT_EMISSION,
            title: "Missing event emission",
            category: Category::Convention,
            severity: Severity::Medium,
            fix: RecommendationKind::Advisory,
            recommendation: "Emit an event describing the state change so indexers can observe it.",
            predicate: convention::missing_event_emission,
        },
        Rule {
            id: MISSING_CHECK_COMMENT,
            title: "Missing CHECK comment",
            category: Category::Convention,
            severity: Severity::Info,
            fix: RecommendationKind::InsertComment,
            recommendation: "Document why the unchecked account is safe with a /// CHECK: comment.",
            predicate: convention::missing_check_comment,
        },
        Rule {
            id: HARDCODED_SPACE,
            title: "Hardcoded account space",
            category: Category::Convention,
            severity: Severity::Info,
            fix: RecommendationKind::RewriteExpression,
            recommendation: "Derive InitSpace and size the account as 8 + T::INIT_SPACE.",
            predicate: convention::hardcoded_space,
        },
        Rule {
            id: REDERIVED_BUMP,
            title: "Bump re-derived on every call",
            category: Category::Cost,
            severity: Severity::Medium,
            fix: RecommendationKind::ReplaceConstraint,
            recommendation: "Store the canonical bump in the account and pass it back as bump = account.bump.",
            predicate: optimization::rederived_bump,
        },
        Rule {
            id: UNNECESSARY_MUT,
            title: "Unnecessary mut",
            category: Category::Cost,
            severity: Severity::Info,
            fix: RecommendationKind::RemoveConstraint,
            recommendation: "Drop mut from an account that is never written.",
            predicate: optimization::unnecessary_mut,
        },
        Rule {
            id: REDUNDANT_SIGNER_CONSTRAINT,
            title: "Redundant signer constraint",
            category: Category::Cost,
            severity: Severity::Info,
            fix: RecommendationKind::RemoveConstraint,
            recommendation: "Signer<'info> already checks the signature; drop the signer constraint.",
            predicate: optimization::redundant_signer_constraint,
        },
        Rule {
            id: COMPUTE_BUDGET_EXCEEDED,
            title: "Compute budget exceeded",
            category: Category::Cost,
            severity: Severity::Medium,
            fix: RecommendationKind::Advisory,
            recommendation: "Split the instruction or move work out of loops to stay within the compute budget.",
            predicate: optimization::compute_budget_exceeded,
        },
    ]
});

pub fn rule(id: &str) -> Option<&'static Rule> {
    RULES.iter().find(|r| r.id == id)
}

pub fn rules_for(pass: AnalysisPass) -> impl Iterator<Item = &'static Rule> {
    RULES.iter().filter(move |r| r.pass() == pass)
}
