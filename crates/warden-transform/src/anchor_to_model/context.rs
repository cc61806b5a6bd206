use std::collections::HashMap;
use tree_sitter::Node;
use warden_core::SourceSpan;

pub trait NodeText {
    fn get_node_text(&self, node: Node) -> &str;
}

pub struct SimpleContext<'a> {
    pub source: &'a str,
}

impl<'a> SimpleContext<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }
}

impl NodeText for SimpleContext<'_> {
    fn get_node_text(&self, node: Node) -> &str {
        &self.source[node.byte_range()]
    }
}

pub fn span_of(node: Node) -> SourceSpan {
    SourceSpan::from_range(node.start_byte(), node.end_byte())
}

pub fn line_of(node: Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// `CpiContext::new(program, accounts)` bound to a local before the call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CpiBinding {
    pub program: Option<String>,
    pub program_expr: String,
    pub forwarded: Vec<String>,
    pub signer_seeds: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// Local that refers to a context account, e.g. `let vault = &mut ctx.accounts.vault`.
    Account(String),
    CpiContext(CpiBinding),
    /// Accounts struct literal for a CPI, e.g. `let cpi_accounts = Transfer { .. }`.
    Accounts(Vec<String>),
    /// Local holding a built instruction, kept as its initializer text.
    Instruction { callee: Option<String>, text: String },
    /// Any other local; hides outer bindings of the same name.
    Value,
}

#[derive(Debug, Default)]
pub struct Scope {
    bindings: HashMap<String, Binding>,
    parent: Option<Box<Scope>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Scope) -> Self {
        Self {
            bindings: HashMap::new(),
            parent: Some(Box::new(parent)),
        }
    }

    pub fn into_parent(self) -> Option<Scope> {
        self.parent.map(|p| *p)
    }

    pub fn insert(&mut self, name: impl Into<String>, binding: Binding) {
        self.bindings.insert(name.into(), binding);
    }

    /// Shadowing a name with an unrelated value hides outer bindings.
    pub fn shadow(&mut self, name: &str) {
        self.bindings.insert(name.to_string(), Binding::Value);
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.bindings
            .get(name)
            .or_else(|| self.parent.as_ref().and_then(|p| p.lookup(name)))
    }

    pub fn account(&self, name: &str) -> Option<&str> {
        match self.lookup(name)? {
            Binding::Account(field) => Some(field),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_lookup_through_parent() {
        let mut outer = Scope::new();
        outer.insert("vault", Binding::Account("vault".into()));
        let mut inner = Scope::with_parent(outer);
        inner.insert("user", Binding::Account("authority".into()));

        assert_eq!(inner.account("vault"), Some("vault"));
        assert_eq!(inner.account("user"), Some("authority"));

        inner.shadow("vault");
        assert_eq!(inner.account("vault"), None);

        let outer = inner.into_parent().unwrap();
        assert_eq!(outer.account("vault"), Some("vault"));
        assert_eq!(outer.account("user"), None);
    }
}
