use super::RemediationPlanItem;
use crate::errors::ModelDriftError;
use crate::finding::FindingId;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchOutcome {
    pub code: String,
    /// Findings whose fix is in `code`, superseded ones included.
    pub resolved: Vec<FindingId>,
    pub drift: Vec<ModelDriftError>,
}

/// Applies plan edits to the source the plan was computed against.
pub struct PatchGenerator<'a> {
    source: &'a str,
}

impl<'a> PatchGenerator<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    /// Single pass in ascending span order. Offsets always refer to the
    /// original text; an edit whose `before` no longer matches is skipped.
    pub fn apply(&self, plan: &[RemediationPlanItem]) -> PatchOutcome {
        let text = self.source;
        let mut edits: Vec<_> = plan
            .iter()
            .filter_map(|item| item.edit.as_ref().map(|edit| (edit, item)))
            .collect();
        edits.sort_by_key(|(edit, _)| (edit.span.start, edit.span.end()));

        let mut code = String::with_capacity(text.len() + edits.len() * 32);
        let mut resolved = Vec::new();
        let mut drift = Vec::new();
        let mut cursor = 0usize;

        for (edit, item) in edits {
            let range = edit.span.range();
            let found = text.get(range.clone());
            if range.start < cursor || found != Some(edit.before.as_str()) {
                let error = ModelDriftError {
                    span: edit.span,
                    expected: edit.before.clone(),
                    found: if range.start < cursor {
                        "<overlapping edit>".to_string()
                    } else {
                        found.unwrap_or("<out of range>").to_string()
                    },
                    finding_refs: item
                        .finding_refs
                        .iter()
                        .chain(&item.supersedes)
                        .cloned()
                        .collect(),
                };
                warn!(%error, "edit skipped");
                drift.push(error);
                continue;
            }

            code.push_str(&text[cursor..range.start]);
            code.push_str(&edit.after);
            cursor = range.end;
            resolved.extend(item.finding_refs.iter().chain(&item.supersedes).cloned());
        }
        code.push_str(&text[cursor..]);

        debug!(applied = resolved.len(), skipped = drift.len(), "patch generated");
        PatchOutcome { code, resolved, drift }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remediation::{Edit, Priority};
    use crate::source_location::SourceSpan;

    fn item(id: &str, edit: Edit) -> RemediationPlanItem {
        RemediationPlanItem {
            priority: Priority::High,
            finding_refs: vec![FindingId(id.to_string())],
            fix_description: String::new(),
            edit: Some(edit),
            supersedes: Vec::new(),
            displaced: Vec::new(),
            notes: Vec::new(),
        }
    }

    #[test]
    fn test_edits_use_original_offsets() {
        let source = "let total = a + b;\nlet fee = c * d;\n";
        let plan = vec![
            item("second", Edit::replace(SourceSpan::new(29, 5), "c * d", "c.checked_mul(d)?")),
            item("first", Edit::replace(SourceSpan::new(12, 5), "a + b", "a.checked_add(b)?")),
            item("insert", Edit::insert(0, "// patched\n")),
        ];

        let outcome = PatchGenerator::new(source).apply(&plan);

        insta::assert_snapshot!(outcome.code.trim_end(), @r###"
        // patched
        let total = a.checked_add(b)?;
        let fee = c.checked_mul(d)?;
        "###);
        assert_eq!(outcome.resolved.len(), 3);
        assert!(outcome.drift.is_empty());
    }

    #[test]
    fn test_drifted_edit_fails_closed() {
        let source = "let x = a + b;";
        let plan = vec![
            item("stale", Edit::replace(SourceSpan::new(8, 5), "a - b", "a.checked_sub(b)?")),
            item("gone", Edit::replace(SourceSpan::new(40, 2), "zz", "")),
        ];

        let outcome = PatchGenerator::new(source).apply(&plan);

        assert_eq!(outcome.code, source);
        assert_eq!(outcome.drift.len(), 2);
        assert_eq!(outcome.drift[0].found, "a + b");
        assert_eq!(outcome.drift[0].finding_refs, vec![FindingId("stale".into())]);
        assert_eq!(outcome.drift[1].found, "<out of range>");
    }
}
