/*! Unified interface for Anchor program analysis.
 *
 * Single import for the whole workflow: building a program model from source, running the
 * security, convention and cost passes, correlating and scoring the findings, planning and
 * applying fixes, and rendering the result. Batteries-included entry point for audit tooling.
 */

pub mod engine;

pub use warden_core as core;
pub use warden_emit as emit;
pub use warden_parser as parser;
pub use warden_transform as transform;

pub use warden_core::{
    analysis::{AnalysisPass, CorrelationEngine, Rule, RULES},
    config::{AnalysisConfig, CliOverrides, ConfigError, CostModel, PassSelection},
    finding::{Category, Finding, FindingId, Severity},
    model::ProgramModel,
    pipeline::AnalysisRun,
    remediation::{PatchOutcome, RemediationPlanItem},
    ParseError, WardenError,
};

pub use warden_emit::{AnalysisReport, EmitterConfig, OutputFormat, ReportEmitter, VerbosityLevel};

pub use engine::{analyze_file, analyze_named, analyze_source, build_model, patch_source, Analysis};
