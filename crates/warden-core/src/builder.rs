use crate::model::{
    AccountDecl, AccountsContext, ArithOp, CpiCall, InstructionDecl, OperationKind, PdaSpec,
    ProgramModel, StateLayout,
};
use crate::source_location::SourceFile;
use indexmap::IndexMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Duplicate accounts context: {0}")]
    DuplicateContext(String),
    #[error("Duplicate account: {0}")]
    DuplicateAccount(String),
    #[error("Duplicate instruction: {0}")]
    DuplicateInstruction(String),
    #[error("Instruction {instruction} references missing {what} #{index}")]
    DanglingReference {
        instruction: String,
        what: &'static str,
        index: usize,
    },
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// Accumulates declarations while the source is walked, then freezes them
/// into a [`ProgramModel`].
#[derive(Debug)]
pub struct ProgramModelBuilder {
    program_name: Option<String>,
    source: SourceFile,
    contexts: IndexMap<String, AccountsContext>,
    accounts: IndexMap<String, AccountDecl>,
    state_layouts: IndexMap<String, StateLayout>,
    events: Vec<String>,
    instructions: Vec<InstructionDecl>,
    cpi_edges: Vec<CpiCall>,
    pda_derivations: Vec<PdaSpec>,
    arithmetic_sites: Vec<ArithOp>,
}

impl ProgramModelBuilder {
    pub fn new(source: SourceFile) -> Self {
        Self {
            program_name: None,
            source,
            contexts: IndexMap::new(),
            accounts: IndexMap::new(),
            state_layouts: IndexMap::new(),
            events: Vec::new(),
            instructions: Vec::new(),
            cpi_edges: Vec::new(),
            pda_derivations: Vec::new(),
            arithmetic_sites: Vec::new(),
        }
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    pub fn set_program_name(&mut self, name: impl Into<String>) {
        self.program_name = Some(name.into());
    }

    pub fn add_state_layout(&mut self, layout: StateLayout) {
        self.state_layouts.insert(layout.name.clone(), layout);
    }

    pub fn state_layout(&self, name: &str) -> Option<&StateLayout> {
        self.state_layouts.get(name)
    }

    pub fn add_event(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.events.contains(&name) {
            self.events.push(name);
        }
    }

    pub fn add_context(&mut self, context: AccountsContext) -> Result<()> {
        if self.contexts.contains_key(&context.name) {
            return Err(ModelError::DuplicateContext(context.name));
        }
        self.contexts.insert(context.name.clone(), context);
        Ok(())
    }

    pub fn context(&self, name: &str) -> Option<&AccountsContext> {
        self.contexts.get(name)
    }

    pub fn add_account(&mut self, decl: AccountDecl) -> Result<()> {
        let key = decl.key();
        if self.accounts.contains_key(&key) {
            return Err(ModelError::DuplicateAccount(key));
        }
        self.accounts.insert(key, decl);
        Ok(())
    }

    pub fn account(&self, key: &str) -> Option<&AccountDecl> {
        self.accounts.get(key)
    }

    pub fn add_cpi(&mut self, call: CpiCall) -> usize {
        self.cpi_edges.push(call);
        self.cpi_edges.len() - 1
    }

    pub fn add_pda(&mut self, spec: PdaSpec) -> usize {
        self.pda_derivations.push(spec);
        self.pda_derivations.len() - 1
    }

    pub fn add_arithmetic(&mut self, op: ArithOp) {
        self.arithmetic_sites.push(op);
    }

    pub fn add_instruction(&mut self, instruction: InstructionDecl) -> Result<()> {
        if self.instructions.iter().any(|i| i.name == instruction.name) {
            return Err(ModelError::DuplicateInstruction(instruction.name));
        }
        self.instructions.push(instruction);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for instruction in &self.instructions {
            for op in &instruction.operations {
                let (what, index, len) = match op.kind {
                    OperationKind::CpiCall { edge } => ("cpi edge", edge, self.cpi_edges.len()),
                    OperationKind::PdaDerivation { pda } => {
                        ("pda derivation", pda, self.pda_derivations.len())
                    }
                    _ => continue,
                };
                if index >= len {
                    return Err(ModelError::DanglingReference {
                        instruction: instruction.name.clone(),
                        what,
                        index,
                    });
                }
            }
        }
        Ok(())
    }

    /// Resolves cross references and freezes the model.
    pub fn build(mut self) -> Result<ProgramModel> {
        self.validate()?;

        for account in self.accounts.values_mut() {
            if account.layout.is_none() {
                if let Some(inner) = account.kind.inner_type() {
                    account.layout = self.state_layouts.get(inner).cloned();
                }
            }
        }

        for instruction in &mut self.instructions {
            if let Some(context) = self.contexts.get(&instruction.context) {
                instruction.accounts = context.fields.clone();
            }
        }

        for instruction in &self.instructions {
            let mutation_positions: Vec<usize> = instruction
                .operations
                .iter()
                .enumerate()
                .filter(|(_, op)| op.is_state_mutation())
                .map(|(i, _)| i)
                .collect();

            for (op_index, op) in instruction.operations.iter().enumerate() {
                let OperationKind::CpiCall { edge } = op.kind else {
                    continue;
                };
                let call = &mut self.cpi_edges[edge];
                call.op_index = op_index;
                call.mutations_before = mutation_positions.iter().filter(|&&i| i < op_index).count();
                call.mutations_after = mutation_positions.iter().filter(|&&i| i > op_index).count();

                for forwarded in &mut call.forwarded {
                    let key = crate::model::account_key(&instruction.context, &forwarded.name);
                    if let Some(decl) = self.accounts.get(&key) {
                        forwarded.writable = decl.is_mutable();
                        forwarded.signer = decl.is_signer();
                    }
                }
            }
        }

        self.arithmetic_sites.sort_by_key(|a| a.span.start);

        Ok(ProgramModel {
            program_name: self.program_name,
            source: self.source,
            contexts: self.contexts,
            accounts: self.accounts,
            state_layouts: self.state_layouts,
            events: self.events,
            instructions: self.instructions,
            cpi_edges: self.cpi_edges,
            pda_derivations: self.pda_derivations,
            arithmetic_sites: self.arithmetic_sites,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AccountKind, ConstraintSet, CpiStyle, CpiTarget, ForwardedAccount, Operation,
    };
    use crate::source_location::SourceSpan;
    use pretty_assertions::assert_eq;

    fn source() -> SourceFile {
        SourceFile::new(None, "fn main() {}\n").unwrap()
    }

    fn account(context: &str, name: &str, kind: AccountKind, mutable: bool) -> AccountDecl {
        AccountDecl {
            name: name.into(),
            context: context.into(),
            kind,
            ty: String::new(),
            constraints: ConstraintSet {
                mutable,
                ..Default::default()
            },
            layout: None,
            has_check_comment: false,
            field_span: SourceSpan::default(),
            type_span: SourceSpan::default(),
            attribute: None,
            line: 1,
        }
    }

    fn op(kind: OperationKind) -> Operation {
        Operation {
            kind,
            span: SourceSpan::default(),
            line: 1,
            loop_depth: 0,
        }
    }

    #[test]
    fn test_duplicate_account_rejected() {
        let mut builder = ProgramModelBuilder::new(source());
        builder
            .add_account(account("Ctx", "vault", AccountKind::Raw, true))
            .unwrap();
        let err = builder
            .add_account(account("Ctx", "vault", AccountKind::Raw, true))
            .unwrap_err();
        assert_eq!(err, ModelError::DuplicateAccount("Ctx.vault".into()));
    }

    #[test]
    fn test_dangling_cpi_reference() {
        let mut builder = ProgramModelBuilder::new(source());
        builder
            .add_instruction(InstructionDecl {
                name: "run".into(),
                context: "Ctx".into(),
                params: vec![],
                accounts: vec![],
                operations: vec![op(OperationKind::CpiCall { edge: 3 })],
                span: SourceSpan::default(),
                body_start: SourceSpan::default(),
                line: 1,
            })
            .unwrap();
        assert!(matches!(
            builder.build(),
            Err(ModelError::DanglingReference { index: 3, .. })
        ));
    }

    #[test]
    fn test_build_resolves_context_and_cpi_position() {
        let mut builder = ProgramModelBuilder::new(source());
        builder
            .add_context(AccountsContext {
                name: "Ctx".into(),
                instruction_args: vec![],
                fields: vec!["Ctx.vault".into()],
                span: SourceSpan::default(),
            })
            .unwrap();
        builder
            .add_account(account(
                "Ctx",
                "vault",
                AccountKind::Typed {
                    wrapper: "Account".into(),
                    inner: "Vault".into(),
                },
                true,
            ))
            .unwrap();
        let edge = builder.add_cpi(CpiCall {
            instruction: "run".into(),
            callee: "token::transfer".into(),
            style: CpiStyle::CpiContext,
            target: CpiTarget::Unverified {
                account: None,
                expr: "x".into(),
            },
            forwarded: vec![ForwardedAccount {
                name: "vault".into(),
                writable: false,
                signer: false,
            }],
            signer_seeds: None,
            op_index: 0,
            mutations_before: 0,
            mutations_after: 0,
            span: SourceSpan::default(),
            line: 1,
        });
        let mutation = || {
            op(OperationKind::StateMutation {
                account: Some("vault".into()),
                target: "vault.balance".into(),
                lamports: false,
            })
        };
        builder
            .add_instruction(InstructionDecl {
                name: "run".into(),
                context: "Ctx".into(),
                params: vec![],
                accounts: vec![],
                operations: vec![mutation(), op(OperationKind::CpiCall { edge }), mutation(), mutation()],
                span: SourceSpan::default(),
                body_start: SourceSpan::default(),
                line: 1,
            })
            .unwrap();

        let model = builder.build().unwrap();
        assert_eq!(model.instructions()[0].accounts, vec!["Ctx.vault".to_string()]);
        let call = &model.cpi_edges()[0];
        assert_eq!(call.op_index, 1);
        assert_eq!(call.mutations_before, 1);
        assert_eq!(call.mutations_after, 2);
        assert!(call.forwarded[0].writable);
    }
}
