/*! Parse Anchor attribute argument lists.
 *
 * Account constraints carry most of an Anchor program's access control, but they live inside
 * attribute token trees that a Rust grammar only sees as opaque tokens. This parser splits
 * `#[account(...)]` lists, `seeds = [...]` arrays and `#[instruction(...)]` arguments into
 * entries with byte spans, so fixes can be written back at exact offsets.
 */

use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

pub mod annotations;

pub use annotations::{ArgAnnotation, ConstraintAnnotation, SeedAnnotation};

#[derive(Parser)]
#[grammar = "constraints.pest"]
pub struct ConstraintParser;

pub type ParseResult<T> = Result<T, Box<pest::error::Error<Rule>>>;

/// A list that does not parse, with the position relative to the list text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {what} at {line}:{column}: {message}")]
pub struct ConstraintParseError {
    pub what: &'static str,
    pub message: String,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl ConstraintParseError {
    fn from_pest(what: &'static str, err: pest::error::Error<Rule>) -> Self {
        let offset = match err.location {
            pest::error::InputLocation::Pos(pos) => pos,
            pest::error::InputLocation::Span((start, _)) => start,
        };
        let (line, column) = match err.line_col {
            pest::error::LineColLocation::Pos(pos) => pos,
            pest::error::LineColLocation::Span(start, _) => start,
        };
        Self {
            what,
            message: err.variant.message().into_owned(),
            offset,
            line,
            column,
        }
    }
}

pub fn parse(rule: Rule, input: &str) -> ParseResult<pest::iterators::Pairs<'_, Rule>> {
    ConstraintParser::parse(rule, input).map_err(Box::new)
}

/// Entries of an `#[account(...)]` argument list (the text between the parentheses).
pub fn parse_constraints(input: &str) -> Result<Vec<ConstraintAnnotation>, ConstraintParseError> {
    let pairs = parse(Rule::constraint_list, input)
        .map_err(|e| ConstraintParseError::from_pest("constraint list", *e))?;
    Ok(annotations::constraints(pairs))
}

/// Components of a seed array, `[a, b]` or `&[a, b]`.
pub fn parse_seeds(input: &str) -> Result<Vec<SeedAnnotation>, ConstraintParseError> {
    let pairs = parse(Rule::seed_list, input)
        .map_err(|e| ConstraintParseError::from_pest("seed list", *e))?;
    Ok(annotations::seeds(pairs))
}

/// Arguments of an `#[instruction(...)]` attribute.
pub fn parse_instruction_args(input: &str) -> Result<Vec<ArgAnnotation>, ConstraintParseError> {
    let pairs = parse(Rule::arg_list, input)
        .map_err(|e| ConstraintParseError::from_pest("instruction arguments", *e))?;
    Ok(annotations::args(pairs))
}

pub fn check(input: &str) -> bool {
    parse(Rule::constraint_list, input).is_ok()
}
