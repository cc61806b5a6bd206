use super::expression_scanner::{is_constant_operand, path_segments};
use super::TransformError;
use warden_core::model::{Param, ParamClass, SeedComponent, SeedKind};
use warden_core::{SourceFile, SourceSpan};

/// What a seed expression may refer to.
pub struct SeedScope<'a> {
    pub params: &'a [Param],
    /// Maps an expression to the context account it reads, if any.
    pub account_of: &'a dyn Fn(&str) -> Option<String>,
}

impl SeedScope<'_> {
    pub fn classify(&self, text: &str) -> (SeedKind, Option<String>) {
        let text = text.trim();
        let bare = text.trim_start_matches('&').trim_start();

        if bare.starts_with("b\"") || bare.starts_with('"') || bare.starts_with("br\"") || bare.starts_with("br#") {
            return (SeedKind::Literal, None);
        }
        // `&[bump]` style single-byte slices
        if bare.starts_with('[') {
            return (SeedKind::Numeric, None);
        }

        let segments = path_segments(bare);
        let Some(root) = segments.first().copied() else {
            return (SeedKind::Numeric, None);
        };

        let path_head = bare.split('.').next().unwrap_or(bare);
        if is_constant_operand(path_head) || path_head.ends_with("::ID") || path_head == "ID" {
            return (SeedKind::Literal, None);
        }

        if let Some(param) = self.params.iter().find(|p| p.name == root) {
            let kind = match param.class {
                ParamClass::Bytes => SeedKind::UserInput,
                ParamClass::Pubkey => SeedKind::AccountKey,
                ParamClass::Other if bare.contains("as_bytes") => SeedKind::UserInput,
                _ => SeedKind::Numeric,
            };
            return (kind, Some(root.to_string()));
        }

        if let Some(account) = (self.account_of)(bare) {
            return (SeedKind::AccountKey, Some(account));
        }

        if root.ends_with("bump") || segments.iter().any(|s| *s == "bumps") {
            return (SeedKind::Numeric, None);
        }

        if bare.contains("as_bytes") {
            return (SeedKind::UserInput, Some(root.to_string()));
        }
        (SeedKind::Numeric, Some(root.to_string()))
    }

    /// Parses a seed array found at `offset` in `source` into classified components.
    pub fn components(
        &self,
        source: &SourceFile,
        list: &str,
        offset: usize,
    ) -> Result<Vec<SeedComponent>, TransformError> {
        let seeds = warden_parser::parse_seeds(list).map_err(|e| {
            let at = offset + e.offset;
            let (line, column) = source.to_line_col(at);
            TransformError::InvalidAttribute {
                line,
                column,
                message: e.to_string(),
                span: SourceSpan::from_range(at, at),
            }
        })?;

        Ok(seeds
            .into_iter()
            .map(|seed| {
                let (kind, subject) = self.classify(&seed.text);
                SeedComponent {
                    text: seed.text,
                    kind,
                    subject,
                    span: SourceSpan::from_range(offset + seed.span.start, offset + seed.span.end),
                }
            })
            .collect())
    }
}
