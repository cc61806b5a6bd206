use crate::config::EmitterConfig;
use anyhow::Result;
use colored::Colorize;
use std::io::Write;
use warden_core::Severity;

pub type EmitResult = Result<()>;

/// Per-render state handed to every emitter.
#[derive(Debug, Clone)]
pub struct EmitContext {
    pub use_colors: bool,
}

impl EmitContext {
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    pub fn from_config(config: &EmitterConfig) -> Self {
        Self {
            use_colors: config.use_colors,
        }
    }

    pub fn plain() -> Self {
        Self { use_colors: false }
    }
}

impl Default for EmitContext {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Emitter {
    type Item;

    fn emit<W: Write>(&self, item: &Self::Item, writer: &mut W, context: &mut EmitContext) -> EmitResult;

    fn emit_to_string(&self, item: &Self::Item) -> Result<String> {
        let mut buffer = Vec::new();
        let mut context = EmitContext::new();
        self.emit(item, &mut buffer, &mut context)?;
        Ok(String::from_utf8(buffer)?)
    }
}

pub struct EmitHelper;

impl EmitHelper {
    pub fn write_line<W: Write>(writer: &mut W, text: &str) -> EmitResult {
        writeln!(writer, "{}", text)?;
        Ok(())
    }

    /// `text` in `color` when the context allows colors, unchanged otherwise.
    pub fn paint(context: &EmitContext, text: &str, color: &str) -> String {
        if !context.use_colors {
            return text.to_string();
        }
        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "magenta" => text.magenta().to_string(),
            "cyan" => text.cyan().to_string(),
            "bright_red" => text.bright_red().bold().to_string(),
            "dimmed" => text.dimmed().to_string(),
            _ => text.to_string(),
        }
    }

    pub fn severity_color(severity: Severity) -> &'static str {
        match severity {
            Severity::Critical => "bright_red",
            Severity::High => "red",
            Severity::Medium => "yellow",
            Severity::Info => "blue",
        }
    }

    pub fn score_color(score: u32) -> &'static str {
        match score {
            80..=u32::MAX => "green",
            50..=79 => "yellow",
            _ => "red",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_from_config() {
        let ctx = EmitContext::from_config(&EmitterConfig::plain());
        assert!(!ctx.use_colors);
        assert!(EmitContext::new().use_colors);
    }

    #[test]
    fn test_paint_without_colors_is_identity() {
        let ctx = EmitContext::plain();
        assert_eq!(EmitHelper::paint(&ctx, "critical", "bright_red"), "critical");

        let mut buffer = Vec::new();
        let painted = EmitHelper::paint(&ctx, "line", "red");
        EmitHelper::write_line(&mut buffer, &painted).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "line\n");
    }

    #[test]
    fn test_paint_with_colors_wraps_text() {
        colored::control::set_override(true);
        let painted = EmitHelper::paint(&EmitContext::new(), "high", "red");
        colored::control::unset_override();
        assert!(painted.contains("high"));
        assert_ne!(painted, "high");
    }

    #[test]
    fn test_severity_and_score_colors() {
        assert_eq!(EmitHelper::severity_color(Severity::Critical), "bright_red");
        assert_eq!(EmitHelper::severity_color(Severity::Info), "blue");
        assert_eq!(EmitHelper::score_color(100), "green");
        assert_eq!(EmitHelper::score_color(75), "yellow");
        assert_eq!(EmitHelper::score_color(10), "red");
    }
}
