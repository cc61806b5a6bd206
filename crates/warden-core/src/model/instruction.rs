use crate::source_location::SourceSpan;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamClass {
    Integer,
    /// `String`, `Vec<u8>`, `&str`, `&[u8]`: caller controls the length.
    Bytes,
    FixedBytes,
    Pubkey,
    Bool,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: String,
    pub class: ParamClass,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OperationKind {
    StateMutation {
        account: Option<String>,
        target: String,
        lamports: bool,
    },
    CpiCall {
        edge: usize,
    },
    ValidationCheck {
        check: String,
        subjects: Vec<String>,
        length_bounded: Vec<String>,
    },
    Emit {
        event: String,
    },
    Log,
    PdaDerivation {
        pda: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    pub span: SourceSpan,
    pub line: u32,
    pub loop_depth: u32,
}

impl Operation {
    pub fn is_state_mutation(&self) -> bool {
        matches!(self.kind, OperationKind::StateMutation { .. })
    }

    pub fn is_cpi(&self) -> bool {
        matches!(self.kind, OperationKind::CpiCall { .. })
    }

    pub fn mutated_account(&self) -> Option<&str> {
        match &self.kind {
            OperationKind::StateMutation { account, .. } => account.as_deref(),
            _ => None,
        }
    }
}

/// A handler inside the `#[program]` module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionDecl {
    pub name: String,
    pub context: String,
    pub params: Vec<Param>,
    /// Account keys of the context, in declaration order.
    pub accounts: Vec<String>,
    /// Body operations in textual order.
    pub operations: Vec<Operation>,
    pub span: SourceSpan,
    /// Insertion point just after the body's opening brace.
    pub body_start: SourceSpan,
    pub line: u32,
}

impl InstructionDecl {
    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn mutations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter().filter(|op| op.is_state_mutation())
    }

    pub fn mutates_state(&self) -> bool {
        self.operations.iter().any(Operation::is_state_mutation)
    }

    pub fn performs_cpi(&self) -> bool {
        self.operations.iter().any(Operation::is_cpi)
    }

    pub fn mutates(&self, account: &str) -> bool {
        self.mutations().any(|op| op.mutated_account() == Some(account))
    }

    pub fn moves_lamports(&self) -> bool {
        self.operations.iter().any(|op| {
            matches!(
                op.kind,
                OperationKind::StateMutation { lamports: true, .. }
            )
        })
    }

    pub fn emits(&self) -> bool {
        self.operations
            .iter()
            .any(|op| matches!(op.kind, OperationKind::Emit { .. }))
    }

    pub fn cpi_edges(&self) -> impl Iterator<Item = usize> + '_ {
        self.operations.iter().filter_map(|op| match op.kind {
            OperationKind::CpiCall { edge } => Some(edge),
            _ => None,
        })
    }

    pub fn validates(&self, subject: &str) -> bool {
        self.operations.iter().any(|op| match &op.kind {
            OperationKind::ValidationCheck { subjects, .. } => subjects.iter().any(|s| s == subject),
            _ => false,
        })
    }

    pub fn length_guarded(&self, subject: &str) -> bool {
        self.operations.iter().any(|op| match &op.kind {
            OperationKind::ValidationCheck { length_bounded, .. } => {
                length_bounded.iter().any(|s| s == subject)
            }
            _ => false,
        })
    }

    pub fn max_loop_depth(&self) -> u32 {
        self.operations
            .iter()
            .map(|op| op.loop_depth)
            .max()
            .unwrap_or(0)
    }
}
