//! Fix templates keyed by rule id.
//!
//! Every template works on spans captured at model-build time and reads the
//! `before` text from the same source, so a generated edit always matches the
//! model it was computed from.

use super::Edit;
use crate::analysis::rules::*;
use crate::config::AnalysisConfig;
use crate::finding::{Finding, FindingLocation, RecommendationKind};
use crate::model::{account_key, AccountDecl, ArithExpr, ArithOp, ProgramModel};
use crate::source_location::{SourceFile, SourceSpan};

const OVERFLOW_ERROR: &str = "ProgramError::ArithmeticOverflow";
const SEED_ERROR: &str = "anchor_lang::error::ErrorCode::ConstraintSeeds";
const CHECK_COMMENT: &str = "/// CHECK: not type-checked by Anchor; validate owner and data before use";

/// Concrete edit for a raw finding, or `None` when the fix is advisory or the
/// model no longer has the site the finding points at.
pub fn edit_for(model: &ProgramModel, config: &AnalysisConfig, finding: &Finding) -> Option<Edit> {
    if finding.fix == RecommendationKind::Advisory || finding.is_derived() {
        return None;
    }
    let source = model.source();
    let location = &finding.location;
    let subject = finding.subject.as_deref();

    match finding.rule_id.as_str() {
        MISSING_SIGNER_CHECK => {
            let decl = account_for(model, location)?;
            retype(source, decl, |lifetime| format!("Signer<{}>", lifetime))
        }
        MISSING_TYPE_VALIDATION => {
            let decl = account_for(model, location)?;
            let state = subject?;
            retype(source, decl, |lifetime| format!("Account<{}, {}>", lifetime, state))
        }
        UNVERIFIED_CPI_TARGET => {
            let decl = account_for(model, location)?;
            let program = subject?;
            retype(source, decl, |lifetime| format!("Program<{}, {}>", lifetime, program))
        }
        MISSING_HAS_ONE => {
            let decl = account_for(model, location)?;
            insert_constraint(source, decl, &format!("has_one = {}", subject?))
        }
        DUPLICATE_MUTABLE_ACCOUNTS => {
            let decl = account_for(model, location)?;
            let constraint = format!("constraint = {}.key() != {}.key()", decl.name, subject?);
            insert_constraint(source, decl, &constraint)
        }
        UNVALIDATED_PDA => {
            let seed = subject?;
            let bound = format!("{}.len() <= {}", seed, config.max_seed_len);
            match account_for(model, location) {
                Some(decl) => insert_constraint(source, decl, &format!("constraint = {}", bound)),
                None => {
                    let instruction = model.instruction(&location.instruction)?;
                    let indent = format!("{}    ", source.indent_at(instruction.span.start as usize));
                    Some(Edit::insert(
                        instruction.body_start.end(),
                        format!("\n{}require!({}, {});", indent, bound, SEED_ERROR),
                    ))
                }
            }
        }
        HARDCODED_BUMP | REDERIVED_BUMP => {
            let decl = account_for(model, location)?;
            let span = location.span?;
            let stored = !decl.constraints.initializes()
                && decl.layout.as_ref().map(|l| l.has_field("bump")).unwrap_or(false);
            let after = if stored {
                format!("bump = {}.bump", decl.name)
            } else if finding.rule_id == HARDCODED_BUMP {
                "bump".to_string()
            } else {
                return None;
            };
            replace(source, span, after)
        }
        REINITIALIZATION => {
            let decl = account_for(model, location)?;
            let entry = decl.constraints.entry("init_if_needed")?;
            replace(source, entry.span, "init")
        }
        HARDCODED_SPACE => {
            let span = location.span?;
            replace(source, span, format!("8 + {}::INIT_SPACE", subject?))
        }
        MISSING_CHECK_COMMENT => {
            let decl = account_for(model, location)?;
            let at = decl
                .attribute
                .as_ref()
                .map(|a| a.item_span.start)
                .unwrap_or(decl.field_span.start)
                .min(decl.field_span.start);
            let indent = source.indent_at(decl.field_span.start as usize);
            Some(Edit::insert(at, format!("{}\n{}", CHECK_COMMENT, indent)))
        }
        UNNECESSARY_MUT => remove_constraint(source, account_for(model, location)?, "mut"),
        REDUNDANT_SIGNER_CONSTRAINT => remove_constraint(source, account_for(model, location)?, "signer"),
        UNCHECKED_ARITHMETIC => {
            let span = location.span?;
            let site = model
                .arithmetic_in(&location.instruction)
                .find(|s| s.span == span)?;
            replace(source, span, render_site(source, site)?)
        }
        _ => None,
    }
}

/// Context-field declaration a finding location names.
fn account_for<'a>(model: &'a ProgramModel, location: &FindingLocation) -> Option<&'a AccountDecl> {
    let field = location.account.as_deref()?;
    let context = model
        .instruction(&location.instruction)
        .map(|i| i.context.as_str())
        .unwrap_or(location.instruction.as_str());
    model.account(&account_key(context, field))
}

fn replace(source: &SourceFile, span: SourceSpan, after: impl Into<String>) -> Option<Edit> {
    let before = source.slice(span).ok()?;
    Some(Edit::replace(span, before, after))
}

/// First lifetime in a type, `'info` when none is written.
fn lifetime_of(ty: &str) -> &str {
    let Some(start) = ty.find('\'') else {
        return "'info";
    };
    let rest = &ty[start + 1..];
    let len = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    &ty[start..start + 1 + len]
}

fn retype(source: &SourceFile, decl: &AccountDecl, render: impl Fn(&str) -> String) -> Option<Edit> {
    let before = source.slice(decl.type_span).ok()?;
    let after = render(lifetime_of(before));
    Some(Edit::replace(decl.type_span, before, after))
}

/// Append one entry to the field's `#[account(...)]` list, creating the
/// attribute when the field has none. The inserted text ends the list the
/// same way it started, so two insertions at one point concatenate cleanly.
fn insert_constraint(source: &SourceFile, decl: &AccountDecl, constraint: &str) -> Option<Edit> {
    let Some(site) = decl.attribute.as_ref() else {
        let indent = source.indent_at(decl.field_span.start as usize);
        return Some(Edit::insert(
            decl.field_span.start,
            format!("#[account({})]\n{}", constraint, indent),
        ));
    };

    let content = source.slice(site.content_span).ok()?;
    let trimmed = content.trim_end();
    if trimmed.trim_start().is_empty() {
        return Some(Edit::insert(site.content_span.start, format!("{},", constraint)));
    }

    let at = site.content_span.start + trimmed.len() as u32;
    let text = if content.contains('\n') {
        let last_line = trimmed.rsplit('\n').next().unwrap_or(trimmed);
        let indent: String = last_line.chars().take_while(|c| c.is_whitespace()).collect();
        if trimmed.ends_with(',') {
            format!("\n{}{},", indent, constraint)
        } else {
            format!(",\n{}{}", indent, constraint)
        }
    } else if trimmed.ends_with(',') {
        format!(" {},", constraint)
    } else {
        format!(", {}", constraint)
    };
    Some(Edit::insert(at, text))
}

/// Remove one bare entry with its separating comma. A sole entry takes the
/// whole attribute with it.
fn remove_constraint(source: &SourceFile, decl: &AccountDecl, key: &str) -> Option<Edit> {
    let entries = &decl.constraints.entries;
    let index = entries.iter().position(|e| e.key == key)?;
    let site = decl.attribute.as_ref()?;

    let span = if entries.len() == 1 {
        let text = source.text();
        let end = site.item_span.end() as usize;
        let trailing = text
            .get(end..)
            .map(|rest| rest.len() - rest.trim_start().len())
            .unwrap_or(0);
        SourceSpan::from_range(site.item_span.start as usize, end + trailing)
    } else if let Some(next) = entries.get(index + 1) {
        SourceSpan::from_range(entries[index].span.start as usize, next.span.start as usize)
    } else {
        let prev = &entries[index - 1];
        SourceSpan::from_range(prev.span.end() as usize, entries[index].span.end() as usize)
    };
    replace(source, span, "")
}

fn render_site(source: &SourceFile, site: &ArithOp) -> Option<String> {
    let checked = render_checked(source, &site.expr)?;
    Some(match &site.assign_target {
        Some(target) => format!("{} = {}", target, checked),
        None => checked,
    })
}

fn is_literal(expr: &ArithExpr) -> bool {
    matches!(expr, ArithExpr::Operand { text, .. } if text.starts_with(|c: char| c.is_ascii_digit()))
}

fn has_type_suffix(literal: &str) -> bool {
    ['u', 'i'].iter().any(|c| literal.contains(*c))
}

/// `lhs.checked_op(rhs).ok_or(..)?`, applied bottom-up over the tree.
fn render_checked(source: &SourceFile, expr: &ArithExpr) -> Option<String> {
    match expr {
        ArithExpr::Operand { text, span, nested } => render_operand(source, text, *span, nested),
        ArithExpr::Binary { op, lhs, rhs, .. } => {
            let (receiver, argument) = if is_literal(lhs) && !is_literal(rhs) && op.is_commutative() {
                (rhs.as_ref(), lhs.as_ref())
            } else {
                (lhs.as_ref(), rhs.as_ref())
            };
            let receiver = render_receiver(source, receiver)?;
            let argument = render_checked(source, argument)?;
            Some(format!(
                "{}.{}({}).ok_or({})?",
                receiver,
                op.checked_method(),
                argument,
                OVERFLOW_ERROR
            ))
        }
    }
}

fn render_receiver(source: &SourceFile, expr: &ArithExpr) -> Option<String> {
    let rendered = render_checked(source, expr)?;
    let ArithExpr::Operand { text, .. } = expr else {
        return Some(rendered);
    };
    if is_literal(expr) {
        return Some(if has_type_suffix(text) {
            rendered
        } else {
            format!("{}_u64", rendered)
        });
    }
    let simple = !rendered.contains(char::is_whitespace)
        && !rendered.starts_with(['&', '*', '-', '!'])
        && !rendered.contains(['+', '-', '*', '/', '%', '<', '>', '=', '|']);
    Some(if simple { rendered } else { format!("({})", rendered) })
}

/// Operand text with the arithmetic trees nested inside it rewritten.
fn render_operand(source: &SourceFile, text: &str, span: SourceSpan, nested: &[ArithExpr]) -> Option<String> {
    if nested.is_empty() {
        return Some(text.to_string());
    }
    let mut inner: Vec<&ArithExpr> = nested.iter().collect();
    inner.sort_by_key(|e| e.span().start);

    let mut out = String::with_capacity(text.len() + 64);
    let mut cursor = 0usize;
    for expr in inner {
        let range = expr.span().range();
        let start = range.start.checked_sub(span.start as usize)?;
        let end = range.end.checked_sub(span.start as usize)?;
        if start < cursor {
            continue;
        }
        out.push_str(text.get(cursor..start)?);
        out.push_str(&render_checked(source, expr)?);
        cursor = end;
    }
    out.push_str(text.get(cursor..)?);
    Some(out)
}
