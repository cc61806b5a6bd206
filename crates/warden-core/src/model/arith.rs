use crate::source_location::SourceSpan;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithKind {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl ArithKind {
    pub fn from_operator(op: &str) -> Option<Self> {
        match op.trim_end_matches('=') {
            "+" => Some(ArithKind::Add),
            "-" => Some(ArithKind::Sub),
            "*" => Some(ArithKind::Mul),
            "/" => Some(ArithKind::Div),
            "%" => Some(ArithKind::Rem),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ArithKind::Add => "+",
            ArithKind::Sub => "-",
            ArithKind::Mul => "*",
            ArithKind::Div => "/",
            ArithKind::Rem => "%",
            ArithKind::Pow => "pow",
        }
    }

    pub fn checked_method(&self) -> &'static str {
        match self {
            ArithKind::Add => "checked_add",
            ArithKind::Sub => "checked_sub",
            ArithKind::Mul => "checked_mul",
            ArithKind::Div => "checked_div",
            ArithKind::Rem => "checked_rem",
            ArithKind::Pow => "checked_pow",
        }
    }

    pub fn is_commutative(&self) -> bool {
        matches!(self, ArithKind::Add | ArithKind::Mul)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithMode {
    Checked,
    Saturating,
    Wrapping,
    Unchecked,
}

/// Operator tree of one arithmetic site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum ArithExpr {
    /// A non-arithmetic operand. `nested` holds arithmetic trees found inside
    /// it (call arguments, indexing), each with absolute spans.
    Operand {
        text: String,
        span: SourceSpan,
        nested: Vec<ArithExpr>,
    },
    Binary {
        op: ArithKind,
        lhs: Box<ArithExpr>,
        rhs: Box<ArithExpr>,
        span: SourceSpan,
    },
}

impl ArithExpr {
    pub fn span(&self) -> SourceSpan {
        match self {
            ArithExpr::Operand { span, .. } | ArithExpr::Binary { span, .. } => *span,
        }
    }

    pub fn operators(&self) -> Vec<ArithKind> {
        let mut out = Vec::new();
        self.collect_operators(&mut out);
        out
    }

    fn collect_operators(&self, out: &mut Vec<ArithKind>) {
        match self {
            ArithExpr::Operand { nested, .. } => {
                for inner in nested {
                    inner.collect_operators(out);
                }
            }
            ArithExpr::Binary { op, lhs, rhs, .. } => {
                lhs.collect_operators(out);
                out.push(*op);
                rhs.collect_operators(out);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArithOp {
    pub instruction: String,
    pub span: SourceSpan,
    pub line: u32,
    pub mode: ArithMode,
    pub expr: ArithExpr,
    /// Left-hand side of a compound assignment (`x += y`).
    pub assign_target: Option<String>,
    pub loop_depth: u32,
}

impl ArithOp {
    pub fn is_checked(&self) -> bool {
        matches!(self.mode, ArithMode::Checked | ArithMode::Saturating)
    }
}
