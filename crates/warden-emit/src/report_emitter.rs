use crate::config::EmitterConfig;
use crate::emitter::{EmitContext, EmitHelper, EmitResult, Emitter};
use crate::output::{JsonFormatter, MarkdownFormatter, OutputFormat, OutputFormatter, OutputStyle, TextFormatter};
use crate::report::{AnalysisReport, PlanEntry};
use anyhow::Result;
use std::io::Write;

/// Renders an [`AnalysisReport`] in one of the supported formats.
pub struct ReportEmitter {
    format: OutputFormat,
    config: EmitterConfig,
    json_style: OutputStyle,
}

impl ReportEmitter {
    pub fn new(format: OutputFormat, config: EmitterConfig) -> Self {
        Self {
            format,
            config,
            json_style: OutputStyle::Pretty,
        }
    }

    pub fn with_json_style(mut self, style: OutputStyle) -> Self {
        self.json_style = style;
        self
    }

    pub fn render(&self, report: &AnalysisReport) -> Result<String> {
        let mut buffer = Vec::new();
        let mut context = EmitContext::from_config(&self.config);
        self.emit(report, &mut buffer, &mut context)?;
        Ok(String::from_utf8(buffer)?)
    }

    fn emit_document<W: Write>(
        &self,
        report: &AnalysisReport,
        fmt: &dyn OutputFormatter,
        writer: &mut W,
        ctx: &EmitContext,
    ) -> EmitResult {
        let verbosity = self.config.verbosity;
        let title = format!("Warden report: {}", report.file.as_deref().unwrap_or("<input>"));
        EmitHelper::write_line(writer, &fmt.format_title(&title))?;
        writeln!(writer)?;

        let score = EmitHelper::paint(ctx, &format!("{}/100", report.score), EmitHelper::score_color(report.score));
        EmitHelper::write_line(writer, &fmt.format_pair("Score", &score))?;
        EmitHelper::write_line(writer, &fmt.format_pair("Findings", &summary(report)))?;

        if verbosity.should_print_findings() {
            self.emit_compounds(report, fmt, writer, ctx)?;
            self.emit_findings(report, fmt, writer, ctx)?;
            self.emit_plan(report, fmt, writer)?;
        }

        if verbosity.should_print_resolutions() {
            self.emit_analysis_details(report, fmt, writer)?;
        }

        if !report.diagnostics.is_empty() {
            EmitHelper::write_line(writer, &fmt.format_section("Diagnostics"))?;
            let items: Vec<String> = report
                .diagnostics
                .iter()
                .map(|d| match d.line {
                    Some(line) => format!("[{}] line {}: {}", d.kind, line, d.message),
                    None => format!("[{}] {}", d.kind, d.message),
                })
                .collect();
            EmitHelper::write_line(writer, &fmt.format_list(&items))?;
        }

        if self.config.include_patch {
            if let Some(code) = &report.optimized_code {
                EmitHelper::write_line(writer, &fmt.format_section("Patched source"))?;
                EmitHelper::write_line(writer, &fmt.format_code(code, Some("rust")))?;
            }
        }
        Ok(())
    }

    fn emit_compounds<W: Write>(
        &self,
        report: &AnalysisReport,
        fmt: &dyn OutputFormatter,
        writer: &mut W,
        ctx: &EmitContext,
    ) -> EmitResult {
        if report.compound_findings.is_empty() {
            return Ok(());
        }
        EmitHelper::write_line(writer, &fmt.format_section("Compound findings"))?;
        for compound in &report.compound_findings {
            let label = severity_label(ctx, compound.severity);
            let mut headline = format!("{} {} ({})", label, compound.title, compound.correlation_rule);
            if self.config.verbosity.should_print_ids() {
                headline.push_str(&format!(" [{}]", compound.id));
            }
            EmitHelper::write_line(writer, &fmt.format_list(&[headline]))?;
            EmitHelper::write_line(writer, &fmt.format_detail(&compound.description))?;
            let sources: Vec<&str> = compound.source_findings.iter().map(|s| s.as_str()).collect();
            EmitHelper::write_line(writer, &fmt.format_detail(&format!("Sources: {}", sources.join(", "))))?;
            EmitHelper::write_line(writer, &fmt.format_detail(&format!("Fix: {}", compound.recommendation)))?;
        }
        Ok(())
    }

    fn emit_findings<W: Write>(
        &self,
        report: &AnalysisReport,
        fmt: &dyn OutputFormatter,
        writer: &mut W,
        ctx: &EmitContext,
    ) -> EmitResult {
        if report.findings.is_empty() {
            return Ok(());
        }
        EmitHelper::write_line(writer, &fmt.format_section("Findings"))?;
        for finding in &report.findings {
            let label = severity_label(ctx, finding.severity);
            let mut headline = format!(
                "{} {} at {}: {}",
                label, finding.pattern_id, finding.location, finding.title
            );
            if let Some(from) = finding.escalated_from {
                headline.push_str(&format!(" (escalated from {})", from));
            }
            if self.config.verbosity.should_print_ids() {
                headline.push_str(&format!(" [{}]", finding.id));
            }
            EmitHelper::write_line(writer, &fmt.format_list(&[headline]))?;
            EmitHelper::write_line(writer, &fmt.format_detail(&finding.description))?;
            EmitHelper::write_line(writer, &fmt.format_detail(&format!("Fix: {}", finding.recommendation)))?;
        }
        Ok(())
    }

    fn emit_plan<W: Write>(&self, report: &AnalysisReport, fmt: &dyn OutputFormatter, writer: &mut W) -> EmitResult {
        if report.remediation_plan.is_empty() {
            return Ok(());
        }
        EmitHelper::write_line(writer, &fmt.format_section("Remediation plan"))?;
        for (n, entry) in report.remediation_plan.iter().enumerate() {
            let refs: Vec<&str> = entry.finding_refs.iter().map(|r| r.as_str()).collect();
            let headline = format!("{}. [{}] {} ({})", n + 1, entry.priority, entry.fix_description, refs.join(", "));
            EmitHelper::write_line(writer, &fmt.format_list(&[headline]))?;
            if !entry.supersedes.is_empty() {
                let superseded: Vec<&str> = entry.supersedes.iter().map(|r| r.as_str()).collect();
                EmitHelper::write_line(writer, &fmt.format_detail(&format!("Supersedes: {}", superseded.join(", "))))?;
            }
            if !entry.displaced.is_empty() {
                let displaced: Vec<&str> = entry.displaced.iter().map(|r| r.as_str()).collect();
                EmitHelper::write_line(writer, &fmt.format_detail(&format!("Not applied: {}", displaced.join(", "))))?;
            }
            for note in &entry.notes {
                EmitHelper::write_line(writer, &fmt.format_detail(&format!("Note: {}", note)))?;
            }
            if self.config.verbosity.should_print_edits() && !entry.is_advisory() {
                EmitHelper::write_line(writer, &fmt.format_code(&edit_diff(entry), Some("diff")))?;
            }
        }
        Ok(())
    }

    fn emit_analysis_details<W: Write>(
        &self,
        report: &AnalysisReport,
        fmt: &dyn OutputFormatter,
        writer: &mut W,
    ) -> EmitResult {
        if !report.pass_scores.is_empty() {
            EmitHelper::write_line(writer, &fmt.format_section("Pass scores"))?;
            for (pass, score) in &report.pass_scores {
                EmitHelper::write_line(writer, &fmt.format_pair(pass, &score.to_string()))?;
            }
        }

        if !report.precedence_resolutions.is_empty() {
            EmitHelper::write_line(writer, &fmt.format_section("Precedence resolutions"))?;
            let items: Vec<String> = report
                .precedence_resolutions
                .iter()
                .map(|r| format!("{} {} by {}: {}", r.finding, r.directive, r.rule, r.reason))
                .collect();
            EmitHelper::write_line(writer, &fmt.format_list(&items))?;
        }

        if !report.cost_estimates.is_empty() {
            EmitHelper::write_line(writer, &fmt.format_section("Compute estimates"))?;
            let items: Vec<String> = report
                .cost_estimates
                .iter()
                .map(|c| format!("{}: {} CU", c.instruction, c.total))
                .collect();
            EmitHelper::write_line(writer, &fmt.format_list(&items))?;
        }
        Ok(())
    }
}

impl Emitter for ReportEmitter {
    type Item = AnalysisReport;

    fn emit<W: Write>(&self, report: &AnalysisReport, writer: &mut W, context: &mut EmitContext) -> EmitResult {
        match self.format {
            OutputFormat::Json => {
                let value = serde_json::to_value(report)?;
                JsonFormatter::format_object(writer, &value, self.json_style)
            }
            OutputFormat::Text => self.emit_document(report, &TextFormatter, writer, context),
            OutputFormat::Markdown => {
                let mut plain = context.clone();
                plain.use_colors = false;
                self.emit_document(report, &MarkdownFormatter, writer, &plain)
            }
        }
    }
}

fn severity_label(ctx: &EmitContext, severity: warden_core::Severity) -> String {
    let tag = format!("[{}]", severity.as_str().to_uppercase());
    EmitHelper::paint(ctx, &tag, EmitHelper::severity_color(severity))
}

fn summary(report: &AnalysisReport) -> String {
    if report.is_clean() {
        return "none".to_string();
    }
    let parts: Vec<String> = report
        .severity_counts()
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(severity, count)| format!("{} {}", count, severity))
        .collect();
    format!("{} ({})", report.total_findings(), parts.join(", "))
}

fn edit_diff(entry: &PlanEntry) -> String {
    let mut lines = Vec::new();
    lines.extend(entry.before.lines().map(|l| format!("- {}", l)));
    lines.extend(entry.after.lines().map(|l| format!("+ {}", l)));
    lines.join("\n")
}
