use crate::source_location::SourceSpan;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const DISCRIMINATOR_LEN: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticSize {
    Fixed(u32),
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateField {
    pub name: String,
    pub ty: String,
    pub size: SemanticSize,
}

/// Layout of an `#[account]` state struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateLayout {
    pub name: String,
    pub fields: IndexMap<String, StateField>,
    pub has_init_space: bool,
    pub span: SourceSpan,
}

impl StateLayout {
    /// Serialized size including the discriminator, if every field is fixed.
    pub fn fixed_size(&self) -> Option<u32> {
        self.fields
            .values()
            .try_fold(DISCRIMINATOR_LEN, |acc, field| match field.size {
                SemanticSize::Fixed(n) => Some(acc + n),
                SemanticSize::Dynamic => None,
            })
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn stores_pubkey(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .map(|f| f.ty == "Pubkey")
            .unwrap_or(false)
    }
}
