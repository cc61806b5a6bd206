//! Classification of Anchor account, state field and parameter types from their source text.

use warden_core::model::{AccountKind, ParamClass, SemanticSize};

const INTEGER_TYPES: &[&str] = &[
    "u8", "u16", "u32", "u64", "u128", "usize", "i8", "i16", "i32", "i64", "i128", "isize",
];

pub struct TypeResolver;

impl TypeResolver {
    pub fn account_kind(ty: &str) -> AccountKind {
        let ty = strip_box(ty.trim());
        let base = base_name(ty);
        let inner = generic_args(ty).last().map(|arg| base_name(arg).to_string());

        match base {
            "AccountInfo" => AccountKind::Raw,
            "UncheckedAccount" => AccountKind::Unchecked,
            "Signer" => AccountKind::Signer,
            "SystemAccount" => AccountKind::System,
            "Program" | "Interface" => AccountKind::Program {
                inner: inner.unwrap_or_default(),
            },
            "Sysvar" => AccountKind::Sysvar {
                inner: inner.unwrap_or_default(),
            },
            _ => AccountKind::Typed {
                wrapper: base.to_string(),
                inner: inner.unwrap_or_else(|| base.to_string()),
            },
        }
    }

    pub fn param_class(ty: &str) -> ParamClass {
        let ty = ty.trim().trim_start_matches('&').trim_start();
        let ty = ty.strip_prefix("mut ").unwrap_or(ty).trim();
        let base = base_name(ty);

        if INTEGER_TYPES.contains(&base) {
            return ParamClass::Integer;
        }
        match base {
            "bool" => ParamClass::Bool,
            "Pubkey" => ParamClass::Pubkey,
            "String" | "str" | "Vec" => ParamClass::Bytes,
            _ if ty.starts_with('[') => {
                if array_len(ty).is_some() {
                    ParamClass::FixedBytes
                } else {
                    ParamClass::Bytes
                }
            }
            _ => ParamClass::Other,
        }
    }

    /// Serialized size of a state field type, or `Dynamic` when it depends on the value.
    pub fn semantic_size(ty: &str) -> SemanticSize {
        let ty = ty.trim();
        let base = base_name(ty);
        let size = match base {
            "bool" | "u8" | "i8" => Some(1),
            "u16" | "i16" => Some(2),
            "u32" | "i32" | "f32" => Some(4),
            "u64" | "i64" | "f64" => Some(8),
            "u128" | "i128" => Some(16),
            "Pubkey" => Some(32),
            "Option" => generic_args(ty).first().and_then(|inner| match Self::semantic_size(inner) {
                SemanticSize::Fixed(n) => Some(n + 1),
                SemanticSize::Dynamic => None,
            }),
            _ if ty.starts_with('[') => {
                let inner = ty.trim_start_matches('[').split(';').next().unwrap_or("");
                match (Self::semantic_size(inner), array_len(ty)) {
                    (SemanticSize::Fixed(n), Some(len)) => Some(n * len),
                    _ => None,
                }
            }
            _ => None,
        };
        size.map(SemanticSize::Fixed).unwrap_or(SemanticSize::Dynamic)
    }

    /// Accounts struct named by a handler's `Context<...>` parameter.
    pub fn context_name(ty: &str) -> Option<String> {
        let ty = ty.trim();
        if base_name(ty) != "Context" {
            return None;
        }
        generic_args(ty).last().map(|arg| base_name(arg).to_string())
    }
}

fn strip_box(ty: &str) -> &str {
    if base_name(ty) == "Box" {
        if let (Some(open), Some(close)) = (ty.find('<'), ty.rfind('>')) {
            return ty[open + 1..close].trim();
        }
    }
    ty
}

/// Last path segment before any generic arguments: `anchor_lang::prelude::Account<'info, T>` -> `Account`.
pub fn base_name(ty: &str) -> &str {
    let head = ty.split('<').next().unwrap_or(ty).trim();
    head.rsplit("::").next().unwrap_or(head).trim()
}

/// Top-level generic arguments with lifetimes removed.
pub fn generic_args(ty: &str) -> Vec<&str> {
    let (Some(open), Some(close)) = (ty.find('<'), ty.rfind('>')) else {
        return Vec::new();
    };
    if close <= open {
        return Vec::new();
    }
    split_top_level(&ty[open + 1..close])
        .into_iter()
        .filter(|arg| !arg.starts_with('\''))
        .collect()
}

/// Splits on commas outside of brackets, parentheses and angle brackets.
pub fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        match ch {
            '<' | '(' | '[' | '{' => depth += 1,
            '>' | ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        parts.push(tail);
    }
    parts
}

fn array_len(ty: &str) -> Option<u32> {
    let inner = ty.trim().strip_prefix('[')?.strip_suffix(']')?;
    let (_, len) = inner.rsplit_once(';')?;
    len.trim().replace('_', "").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_account_kinds() {
        assert_eq!(TypeResolver::account_kind("AccountInfo<'info>"), AccountKind::Raw);
        assert_eq!(TypeResolver::account_kind("UncheckedAccount<'info>"), AccountKind::Unchecked);
        assert_eq!(TypeResolver::account_kind("Signer<'info>"), AccountKind::Signer);
        assert_eq!(
            TypeResolver::account_kind("Box<Account<'info, Vault>>"),
            AccountKind::Typed {
                wrapper: "Account".into(),
                inner: "Vault".into()
            }
        );
        assert_eq!(
            TypeResolver::account_kind("Program<'info, Token>"),
            AccountKind::Program { inner: "Token".into() }
        );
        assert_eq!(
            TypeResolver::account_kind("Sysvar<'info, Rent>"),
            AccountKind::Sysvar { inner: "Rent".into() }
        );
        assert_eq!(
            TypeResolver::account_kind("InterfaceAccount<'info, token_interface::Mint>"),
            AccountKind::Typed {
                wrapper: "InterfaceAccount".into(),
                inner: "Mint".into()
            }
        );
    }

    #[test]
    fn test_param_classes() {
        assert_eq!(TypeResolver::param_class("u64"), ParamClass::Integer);
        assert_eq!(TypeResolver::param_class("String"), ParamClass::Bytes);
        assert_eq!(TypeResolver::param_class("Vec<u8>"), ParamClass::Bytes);
        assert_eq!(TypeResolver::param_class("&[u8]"), ParamClass::Bytes);
        assert_eq!(TypeResolver::param_class("[u8; 32]"), ParamClass::FixedBytes);
        assert_eq!(TypeResolver::param_class("Pubkey"), ParamClass::Pubkey);
        assert_eq!(TypeResolver::param_class("bool"), ParamClass::Bool);
        assert_eq!(TypeResolver::param_class("OrderSide"), ParamClass::Other);
    }

    #[test]
    fn test_semantic_sizes() {
        assert_eq!(TypeResolver::semantic_size("u64"), SemanticSize::Fixed(8));
        assert_eq!(TypeResolver::semantic_size("Pubkey"), SemanticSize::Fixed(32));
        assert_eq!(TypeResolver::semantic_size("Option<u8>"), SemanticSize::Fixed(2));
        assert_eq!(TypeResolver::semantic_size("[u8; 32]"), SemanticSize::Fixed(32));
        assert_eq!(TypeResolver::semantic_size("[u64; 4]"), SemanticSize::Fixed(32));
        assert_eq!(TypeResolver::semantic_size("String"), SemanticSize::Dynamic);
        assert_eq!(TypeResolver::semantic_size("Vec<Pubkey>"), SemanticSize::Dynamic);
    }

    #[test]
    fn test_context_name() {
        assert_eq!(TypeResolver::context_name("Context<Withdraw>"), Some("Withdraw".into()));
        assert_eq!(
            TypeResolver::context_name("Context<'_, '_, '_, 'info, Deposit<'info>>"),
            Some("Deposit".into())
        );
        assert_eq!(TypeResolver::context_name("u64"), None);
    }
}
