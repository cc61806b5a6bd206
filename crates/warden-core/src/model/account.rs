use super::state::StateLayout;
use crate::source_location::SourceSpan;
use serde::{Deserialize, Serialize};

/// Wrapper type an accounts-context field is declared with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccountKind {
    Raw,
    Unchecked,
    Typed { wrapper: String, inner: String },
    Signer,
    Program { inner: String },
    Sysvar { inner: String },
    System,
}

impl AccountKind {
    /// Raw account info or `UncheckedAccount`: no owner or discriminator checks.
    pub fn is_raw(&self) -> bool {
        matches!(self, AccountKind::Raw | AccountKind::Unchecked)
    }

    pub fn inner_type(&self) -> Option<&str> {
        match self {
            AccountKind::Typed { inner, .. }
            | AccountKind::Program { inner }
            | AccountKind::Sysvar { inner } => Some(inner),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AccountKind::Raw | AccountKind::Unchecked => "raw",
            AccountKind::Typed { .. } | AccountKind::Sysvar { .. } | AccountKind::System => "typed",
            AccountKind::Signer => "signer",
            AccountKind::Program { .. } => "program",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitMode {
    #[default]
    None,
    Init,
    InitIfNeeded,
}

/// One `key` or `key = value` entry of an `#[account(...)]` list, with absolute spans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintEntry {
    pub key: String,
    pub value: Option<String>,
    pub span: SourceSpan,
    pub value_span: Option<SourceSpan>,
}

/// A `constraint = <expr>` entry and the identifiers it inspects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomConstraint {
    pub expr: String,
    pub subjects: Vec<String>,
    pub length_bounded: Vec<String>,
    pub span: SourceSpan,
}

impl CustomConstraint {
    /// True for `a.key() != b.key()` style guards naming both accounts.
    pub fn separates(&self, a: &str, b: &str) -> bool {
        self.expr.contains("!=")
            && self.subjects.iter().any(|s| s == a)
            && self.subjects.iter().any(|s| s == b)
    }

    pub fn binds_key_of(&self, account: &str) -> bool {
        self.expr.contains("==") && self.subjects.iter().any(|s| s == account)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BumpConstraint {
    Canonical,
    Expr(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSet {
    pub entries: Vec<ConstraintEntry>,
    pub mutable: bool,
    pub init: InitMode,
    pub signer: bool,
    pub seeds: Option<String>,
    pub bump: Option<BumpConstraint>,
    pub has_one: Vec<String>,
    pub close: Option<String>,
    pub owner: Option<String>,
    pub address: Option<String>,
    pub payer: Option<String>,
    pub space: Option<String>,
    pub realloc_payer: Option<String>,
    pub custom: Vec<CustomConstraint>,
}

impl ConstraintSet {
    pub fn entry(&self, key: &str) -> Option<&ConstraintEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn initializes(&self) -> bool {
        self.init != InitMode::None
    }
}

/// Location of the `#[account(...)]` attribute item on a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSite {
    pub item_span: SourceSpan,
    pub content_span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountDecl {
    pub name: String,
    pub context: String,
    pub kind: AccountKind,
    pub ty: String,
    pub constraints: ConstraintSet,
    pub layout: Option<StateLayout>,
    pub has_check_comment: bool,
    pub field_span: SourceSpan,
    pub type_span: SourceSpan,
    pub attribute: Option<AttributeSite>,
    pub line: u32,
}

impl AccountDecl {
    pub fn key(&self) -> String {
        account_key(&self.context, &self.name)
    }

    pub fn is_signer(&self) -> bool {
        self.kind == AccountKind::Signer || self.constraints.signer
    }

    pub fn is_mutable(&self) -> bool {
        self.constraints.mutable || self.constraints.initializes()
    }

    pub fn is_program(&self) -> bool {
        matches!(self.kind, AccountKind::Program { .. })
            || self.name.ends_with("_program")
            || self.name == "program"
    }

    /// Owner or address pinned by a constraint.
    pub fn is_pinned(&self) -> bool {
        self.constraints.owner.is_some() || self.constraints.address.is_some()
    }
}

pub fn account_key(context: &str, field: &str) -> String {
    format!("{}.{}", context, field)
}
