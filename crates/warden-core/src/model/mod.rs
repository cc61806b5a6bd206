//! Structural model of one Anchor program.
//!
//! A `ProgramModel` is built once per run by [`crate::builder::ProgramModelBuilder`]
//! and never mutated afterwards. Every analysis pass, the correlation engine and
//! the remediation planner read the same snapshot.

pub mod account;
pub mod arith;
pub mod cpi;
pub mod instruction;
pub mod pda;
pub mod state;

pub use account::{
    account_key, AccountDecl, AccountKind, AttributeSite, BumpConstraint, ConstraintEntry,
    ConstraintSet, CustomConstraint, InitMode,
};
pub use arith::{ArithExpr, ArithKind, ArithMode, ArithOp};
pub use cpi::{CpiCall, CpiStyle, CpiTarget, ForwardedAccount};
pub use instruction::{InstructionDecl, Operation, OperationKind, Param, ParamClass};
pub use pda::{BumpSource, PdaOrigin, PdaSpec, SeedComponent, SeedKind};
pub use state::{SemanticSize, StateField, StateLayout};

use crate::source_location::{SourceFile, SourceSpan};
use indexmap::IndexMap;
use serde::Serialize;

const FUND_MOVING_NAMES: &[&str] = &[
    "transfer", "withdraw", "deposit", "swap", "pay", "claim", "mint", "burn", "redeem", "stake",
    "borrow", "repay", "liquidate", "send", "refund", "sweep",
];

/// A `#[derive(Accounts)]` struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountsContext {
    pub name: String,
    pub instruction_args: Vec<Param>,
    /// Account keys in field order.
    pub fields: Vec<String>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgramModel {
    pub(crate) program_name: Option<String>,
    #[serde(skip_serializing)]
    pub(crate) source: SourceFile,
    pub(crate) contexts: IndexMap<String, AccountsContext>,
    pub(crate) accounts: IndexMap<String, AccountDecl>,
    pub(crate) state_layouts: IndexMap<String, StateLayout>,
    pub(crate) events: Vec<String>,
    pub(crate) instructions: Vec<InstructionDecl>,
    pub(crate) cpi_edges: Vec<CpiCall>,
    pub(crate) pda_derivations: Vec<PdaSpec>,
    pub(crate) arithmetic_sites: Vec<ArithOp>,
}

impl ProgramModel {
    pub fn program_name(&self) -> Option<&str> {
        self.program_name.as_deref()
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    pub fn contexts(&self) -> &IndexMap<String, AccountsContext> {
        &self.contexts
    }

    pub fn accounts(&self) -> &IndexMap<String, AccountDecl> {
        &self.accounts
    }

    pub fn state_layouts(&self) -> &IndexMap<String, StateLayout> {
        &self.state_layouts
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn instructions(&self) -> &[InstructionDecl] {
        &self.instructions
    }

    pub fn cpi_edges(&self) -> &[CpiCall] {
        &self.cpi_edges
    }

    pub fn pda_derivations(&self) -> &[PdaSpec] {
        &self.pda_derivations
    }

    pub fn arithmetic_sites(&self) -> &[ArithOp] {
        &self.arithmetic_sites
    }

    pub fn account(&self, key: &str) -> Option<&AccountDecl> {
        self.accounts.get(key)
    }

    pub fn instruction(&self, name: &str) -> Option<&InstructionDecl> {
        self.instructions.iter().find(|i| i.name == name)
    }

    /// Field `field` of the context used by `instruction`.
    pub fn account_in(&self, instruction: &InstructionDecl, field: &str) -> Option<&AccountDecl> {
        self.accounts.get(&account_key(&instruction.context, field))
    }

    pub fn context_accounts<'a>(
        &'a self,
        instruction: &'a InstructionDecl,
    ) -> impl Iterator<Item = &'a AccountDecl> + 'a {
        instruction
            .accounts
            .iter()
            .filter_map(move |key| self.accounts.get(key))
    }

    pub fn accounts_of_context<'a>(&'a self, context: &'a str) -> impl Iterator<Item = &'a AccountDecl> + 'a {
        self.accounts.values().filter(move |a| a.context == context)
    }

    pub fn instructions_using<'a>(&'a self, context: &'a str) -> impl Iterator<Item = &'a InstructionDecl> + 'a {
        self.instructions.iter().filter(move |i| i.context == context)
    }

    /// Instruction name findings about a context field are reported under:
    /// the first handler using the context, or the context itself when unused.
    pub fn anchor_instruction(&self, context: &str) -> String {
        self.instructions_using(context)
            .next()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| context.to_string())
    }

    pub fn cpis_of<'a>(&'a self, instruction: &'a InstructionDecl) -> impl Iterator<Item = &'a CpiCall> + 'a {
        instruction.cpi_edges().filter_map(move |edge| self.cpi_edges.get(edge))
    }

    pub fn arithmetic_in<'a>(&'a self, instruction: &'a str) -> impl Iterator<Item = &'a ArithOp> + 'a {
        self.arithmetic_sites
            .iter()
            .filter(move |a| a.instruction == instruction)
    }

    /// PDAs an instruction touches: constraint PDAs of its context plus body derivations.
    pub fn pdas_of<'a>(&'a self, instruction: &'a InstructionDecl) -> impl Iterator<Item = &'a PdaSpec> + 'a {
        self.pda_derivations.iter().filter(move |pda| match &pda.origin {
            PdaOrigin::Constraint { account } => instruction.accounts.contains(account),
            PdaOrigin::Derivation { instruction: name } => *name == instruction.name,
        })
    }

    pub fn is_fund_moving(&self, instruction: &InstructionDecl) -> bool {
        let name = instruction.name.to_ascii_lowercase();
        FUND_MOVING_NAMES.iter().any(|k| name.contains(k))
            || instruction.moves_lamports()
            || self.cpis_of(instruction).any(CpiCall::moves_funds)
    }

    pub fn line_of(&self, span: SourceSpan) -> u32 {
        self.source.line_of(span)
    }
}
