use crate::source_location::SourceSpan;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeedKind {
    Literal,
    AccountKey,
    UserInput,
    Numeric,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedComponent {
    pub text: String,
    pub kind: SeedKind,
    /// Root identifier the seed reads from, if any.
    pub subject: Option<String>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BumpSource {
    Stored,
    Rederived,
    Hardcoded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum PdaOrigin {
    /// `seeds = [...]` on an accounts-context field (account key).
    Constraint { account: String },
    /// `find_program_address` / `create_program_address` in a handler body.
    Derivation { instruction: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdaSpec {
    pub origin: PdaOrigin,
    pub seeds: Vec<SeedComponent>,
    pub bump: BumpSource,
    /// Span of the `bump` constraint entry for constraint PDAs.
    pub bump_span: Option<SourceSpan>,
    pub init: bool,
    pub span: SourceSpan,
    pub line: u32,
}

impl PdaSpec {
    pub fn owner_account(&self) -> Option<&str> {
        match &self.origin {
            PdaOrigin::Constraint { account } => Some(account),
            PdaOrigin::Derivation { .. } => None,
        }
    }

    pub fn user_input_seeds(&self) -> impl Iterator<Item = &SeedComponent> {
        self.seeds.iter().filter(|s| s.kind == SeedKind::UserInput)
    }
}
