//! Source-to-report orchestration.
//!
//! Every call is an independent run: the model is built from the given text,
//! analyzed once, and dropped with the [`Analysis`] that owns it.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info_span};
use warden_core::{analyze_model, AnalysisConfig, AnalysisRun, ParseError, PatchOutcome, ProgramModel};
use warden_emit::AnalysisReport;
use warden_transform::build_program_model_with_filename;

/// A built model together with the run computed from it.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub file: Option<String>,
    pub model: ProgramModel,
    pub run: AnalysisRun,
}

impl Analysis {
    pub fn report(&self) -> AnalysisReport {
        let report = AnalysisReport::from_run(&self.run);
        match &self.file {
            Some(file) => report.with_file(file.clone()),
            None => report,
        }
    }

    pub fn patched_source(&self) -> Option<&str> {
        self.run.patch.as_ref().map(|p| p.code.as_str())
    }

    /// Rebuilds and re-analyzes the patched source, if a patch was generated.
    pub fn reanalyze_patched(&self, config: &AnalysisConfig) -> Option<Result<Analysis, ParseError>> {
        let code = self.patched_source()?;
        Some(analyze_named(code, self.file.as_deref(), config))
    }
}

/// Builds the program model, reporting malformed source as a [`ParseError`].
pub fn build_model(source: &str, filename: Option<&str>) -> Result<ProgramModel, ParseError> {
    build_program_model_with_filename(source, filename).map_err(ParseError::from)
}

pub fn analyze_source(source: &str, config: &AnalysisConfig) -> Result<Analysis, ParseError> {
    analyze_named(source, None, config)
}

pub fn analyze_named(source: &str, filename: Option<&str>, config: &AnalysisConfig) -> Result<Analysis, ParseError> {
    let _span = info_span!("warden", file = filename.unwrap_or("<input>")).entered();
    let model = build_model(source, filename)?;
    debug!(
        instructions = model.instructions().len(),
        accounts = model.accounts().len(),
        cpis = model.cpi_edges().len(),
        pdas = model.pda_derivations().len(),
        arithmetic = model.arithmetic_sites().len(),
        "model built"
    );
    let run = analyze_model(&model, config);
    Ok(Analysis {
        file: filename.map(str::to_string),
        model,
        run,
    })
}

pub fn analyze_file(path: &Path, config: &AnalysisConfig) -> Result<Analysis> {
    let source = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path.display().to_string();
    analyze_named(&source, Some(&name), config).with_context(|| format!("Failed to analyze {}", name))
}

/// Analyzes with patch generation forced on and returns the patch.
pub fn patch_source(source: &str, config: &AnalysisConfig) -> Result<PatchOutcome, ParseError> {
    let config = AnalysisConfig {
        generate_patch: true,
        ..config.clone()
    };
    let analysis = analyze_source(source, &config)?;
    Ok(analysis.run.patch.unwrap_or_else(|| PatchOutcome {
        code: source.to_string(),
        resolved: Vec::new(),
        drift: Vec::new(),
    }))
}
