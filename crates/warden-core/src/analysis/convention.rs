//! Convention pass predicates.

use super::rules::Detection;
use crate::config::AnalysisConfig;
use crate::finding::FindingLocation;
use crate::model::ProgramModel;

pub fn missing_event_emission(model: &ProgramModel, _config: &AnalysisConfig) -> Result<Vec<Detection>, String> {
    Ok(model
        .instructions()
        .iter()
        .filter(|i| (model.is_fund_moving(i) || i.mutates_state()) && !i.emits())
        .map(|i| {
            let what = if model.is_fund_moving(i) { "moves funds" } else { "changes state" };
            Detection::new(
                FindingLocation::instruction(&i.name).at(i.span, i.line),
                format!("`{}` {} without emitting an event", i.name, what),
            )
        })
        .collect())
}

pub fn missing_check_comment(model: &ProgramModel, _config: &AnalysisConfig) -> Result<Vec<Detection>, String> {
    Ok(model
        .accounts()
        .values()
        .filter(|a| a.kind.is_raw() && !a.has_check_comment)
        .map(|a| {
            Detection::new(
                FindingLocation::instruction(model.anchor_instruction(&a.context))
                    .with_account(&a.name)
                    .at(a.field_span, a.line),
                format!("unchecked account `{}` has no /// CHECK: explanation", a.name),
            )
        })
        .collect())
}

fn is_numeric_expression(expr: &str) -> bool {
    !expr.trim().is_empty()
        && expr
            .chars()
            .all(|c| c.is_ascii_digit() || c == '_' || c.is_whitespace() || "+*()".contains(c))
}

pub fn hardcoded_space(model: &ProgramModel, _config: &AnalysisConfig) -> Result<Vec<Detection>, String> {
    let mut out = Vec::new();
    for decl in model.accounts().values() {
        let Some(space) = decl.constraints.space.as_deref() else {
            continue;
        };
        if !decl.constraints.initializes() || !is_numeric_expression(space) {
            continue;
        }
        let Some(layout) = decl.layout.as_ref() else {
            continue;
        };
        let span = decl
            .constraints
            .entry("space")
            .and_then(|e| e.value_span)
            .unwrap_or(decl.type_span);
        let detection = Detection::new(
            FindingLocation::instruction(model.anchor_instruction(&decl.context))
                .with_account(&decl.name)
                .at(span, model.line_of(span)),
            format!("space for `{}` is the literal `{}` and drifts when {} changes", decl.name, space, layout.name),
        )
        .with_subject(&layout.name);
        out.push(if layout.has_init_space { detection } else { detection.advisory() });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_expression() {
        assert!(is_numeric_expression("8 + 32 + 8"));
        assert!(is_numeric_expression("8 + (4 * 10)"));
        assert!(!is_numeric_expression("8 + Vault::INIT_SPACE"));
        assert!(!is_numeric_expression("  "));
    }
}
