use anyhow::Result;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "markdown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStyle {
    Compact,
    Pretty,
}

pub trait OutputFormatter {
    fn format_title(&self, title: &str) -> String;

    fn format_pair(&self, key: &str, value: &str) -> String;

    fn format_list(&self, items: &[String]) -> String;

    /// Continuation line under the preceding list item.
    fn format_detail(&self, text: &str) -> String;

    fn format_section(&self, title: &str) -> String;

    fn format_code(&self, code: &str, language: Option<&str>) -> String;
}

pub struct TextFormatter;

impl OutputFormatter for TextFormatter {
    fn format_title(&self, title: &str) -> String {
        format!("{}\n{}", title, "=".repeat(title.chars().count()))
    }

    fn format_pair(&self, key: &str, value: &str) -> String {
        format!("{}: {}", key, value)
    }

    fn format_list(&self, items: &[String]) -> String {
        items
            .iter()
            .map(|item| format!("  - {}", item))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn format_detail(&self, text: &str) -> String {
        format!("      {}", text)
    }

    fn format_section(&self, title: &str) -> String {
        format!("\n=== {} ===\n", title)
    }

    fn format_code(&self, code: &str, _language: Option<&str>) -> String {
        code.lines()
            .map(|line| format!("      {}", line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct MarkdownFormatter;

impl OutputFormatter for MarkdownFormatter {
    fn format_title(&self, title: &str) -> String {
        format!("# {}", title)
    }

    fn format_pair(&self, key: &str, value: &str) -> String {
        format!("**{}**: {}  ", key, value)
    }

    fn format_list(&self, items: &[String]) -> String {
        items
            .iter()
            .map(|item| format!("- {}", item))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn format_detail(&self, text: &str) -> String {
        format!("  {}", text)
    }

    fn format_section(&self, title: &str) -> String {
        format!("\n## {}\n", title)
    }

    fn format_code(&self, code: &str, language: Option<&str>) -> String {
        let lang = language.unwrap_or("rust");
        format!("```{}\n{}\n```", lang, code)
    }
}

pub struct JsonFormatter;

impl JsonFormatter {
    pub fn format_object<W: Write>(writer: &mut W, obj: &serde_json::Value, style: OutputStyle) -> Result<()> {
        match style {
            OutputStyle::Pretty => serde_json::to_writer_pretty(&mut *writer, obj)?,
            OutputStyle::Compact => serde_json::to_writer(&mut *writer, obj)?,
        }
        writeln!(writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_format_names() {
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("MD".parse::<OutputFormat>(), Ok(OutputFormat::Markdown));
        assert_eq!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert!("html".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Markdown.to_string(), "markdown");
    }

    #[test]
    fn test_text_and_markdown_lists() {
        let items = vec!["one".to_string(), "two".to_string()];
        assert_eq!(TextFormatter.format_list(&items), "  - one\n  - two");
        assert_eq!(MarkdownFormatter.format_list(&items), "- one\n- two");
        assert_eq!(TextFormatter.format_title("Report"), "Report\n======");
    }

    #[test]
    fn test_code_blocks() {
        assert_eq!(
            MarkdownFormatter.format_code("- a\n+ b", Some("diff")),
            "```diff\n- a\n+ b\n```"
        );
        assert_eq!(TextFormatter.format_code("- a\n+ b", None), "      - a\n      + b");
    }

    #[test]
    fn test_json_styles() {
        let value = serde_json::json!({ "score": 100 });
        let mut compact = Vec::new();
        JsonFormatter::format_object(&mut compact, &value, OutputStyle::Compact).unwrap();
        assert_eq!(String::from_utf8(compact).unwrap(), "{\"score\":100}\n");

        let mut pretty = Vec::new();
        JsonFormatter::format_object(&mut pretty, &value, OutputStyle::Pretty).unwrap();
        assert_eq!(String::from_utf8(pretty).unwrap(), "{\n  \"score\": 100\n}\n");
    }
}
