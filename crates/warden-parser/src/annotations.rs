use crate::Rule;
use pest::iterators::{Pair, Pairs};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// One `key` or `key = value` entry. Spans are byte ranges into the parsed
/// text with trailing whitespace trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintAnnotation {
    pub key: String,
    pub value: Option<String>,
    /// Custom error after `@`, e.g. `ErrorCode::Unauthorized`.
    pub error: Option<String>,
    pub span: Range<usize>,
    pub value_span: Option<Range<usize>>,
}

impl ConstraintAnnotation {
    pub fn is_flag(&self) -> bool {
        self.value.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedAnnotation {
    pub text: String,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgAnnotation {
    pub name: String,
    pub ty: String,
    pub span: Range<usize>,
}

/// Text and span of a pair with trailing whitespace removed.
fn trimmed(pair: &Pair<Rule>) -> (String, Range<usize>) {
    let text = pair.as_str().trim_end();
    let start = pair.as_span().start();
    (text.to_string(), start..start + text.len())
}

fn top_level<'i>(pairs: Pairs<'i, Rule>, list: Rule) -> impl Iterator<Item = Pair<'i, Rule>> {
    pairs
        .filter(move |p| p.as_rule() == list)
        .flat_map(|p| p.into_inner())
}

pub fn constraints(pairs: Pairs<Rule>) -> Vec<ConstraintAnnotation> {
    top_level(pairs, Rule::constraint_list)
        .filter(|p| p.as_rule() == Rule::constraint)
        .filter_map(|pair| {
            let start = pair.as_span().start();
            let mut end = start;
            let mut key = None;
            let mut value = None;
            let mut value_span = None;
            let mut error = None;

            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::key => {
                        key = Some(inner.as_str().to_string());
                        end = inner.as_span().end();
                    }
                    Rule::expr => {
                        let (text, span) = trimmed(&inner);
                        end = span.end;
                        value = Some(text);
                        value_span = Some(span);
                    }
                    Rule::error_suffix => {
                        if let Some(expr) = inner.into_inner().find(|p| p.as_rule() == Rule::expr) {
                            let (text, span) = trimmed(&expr);
                            end = span.end;
                            error = Some(text);
                        }
                    }
                    _ => {}
                }
            }

            Some(ConstraintAnnotation {
                key: key?,
                value,
                error,
                span: start..end,
                value_span,
            })
        })
        .collect()
}

pub fn seeds(pairs: Pairs<Rule>) -> Vec<SeedAnnotation> {
    top_level(pairs, Rule::seed_list)
        .filter(|p| p.as_rule() == Rule::seed)
        .filter_map(|seed| seed.into_inner().next())
        .map(|expr| {
            let (text, span) = trimmed(&expr);
            SeedAnnotation { text, span }
        })
        .collect()
}

pub fn args(pairs: Pairs<Rule>) -> Vec<ArgAnnotation> {
    top_level(pairs, Rule::arg_list)
        .filter(|p| p.as_rule() == Rule::arg)
        .filter_map(|pair| {
            let start = pair.as_span().start();
            let mut inner = pair.into_inner();
            let name = inner.next()?.as_str().to_string();
            let ty = inner.next()?;
            let (ty, span) = trimmed(&ty);
            Some(ArgAnnotation {
                name,
                ty,
                span: start..span.end,
            })
        })
        .collect()
}
