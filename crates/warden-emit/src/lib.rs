/*! Turn an analysis run into something a reviewer can read.
 *
 * The core hands back findings, compounds and a remediation plan as plain data. This crate
 * freezes that into a stable, serializable report and renders it as JSON for tooling or as
 * plain text and markdown for people, with severity colors when a terminal is attached.
 */

pub mod config;
pub mod emitter;
pub mod output;
pub mod report;
pub mod report_emitter;

pub use config::{EmitterConfig, VerbosityLevel};
pub use emitter::{EmitContext, EmitHelper, EmitResult, Emitter};
pub use output::{JsonFormatter, MarkdownFormatter, OutputFormat, OutputFormatter, OutputStyle, TextFormatter};
pub use report::{AnalysisReport, CompoundReport, PlanEntry, ReportFinding};
pub use report_emitter::ReportEmitter;
