/*! Program model, rule database, correlation and remediation for Anchor programs.
 *
 * A single immutable `ProgramModel` is matched against a closed rule table in three
 * independent passes. Findings from all passes are then correlated to surface risks
 * no single pass sees, scored, and turned into a conflict-free set of source edits.
 */

pub mod analysis;
pub mod builder;
pub mod config;
pub mod errors;
pub mod finding;
pub mod model;
pub mod pipeline;
pub mod remediation;
pub mod source_location;

pub use analysis::{AnalysisPass, CorrelationEngine, CostEstimate, PatternMatcher, Rule, RULES};
pub use builder::{ModelError, ProgramModelBuilder};
pub use config::{AnalysisConfig, CliOverrides, ConfigError, CostModel, PassSelection};
pub use errors::{
    CorrelationConflictUnresolved, Diagnostic, ModelDriftError, ParseError, Result,
    RuleEvaluationError, WardenError,
};
pub use finding::{Category, Finding, FindingId, FindingLocation, Origin, RecommendationKind, Severity};
pub use model::ProgramModel;
pub use pipeline::{analyze_model, AnalysisRun};
pub use remediation::{Edit, PatchOutcome, Priority, RemediationPlanItem};
pub use source_location::{SourceFile, SourceSpan};
