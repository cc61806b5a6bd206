//! Compute-unit estimation per instruction.

use crate::config::CostModel;
use crate::model::{BumpSource, InstructionDecl, OperationKind, PdaOrigin, ProgramModel};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub base: u64,
    pub accounts: u64,
    pub cpis: u64,
    pub pdas: u64,
    pub mutations: u64,
    pub arithmetic: u64,
    pub emits: u64,
    pub logs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub instruction: String,
    pub total: u64,
    pub breakdown: CostBreakdown,
}

pub struct CostEstimator<'a> {
    model: &'a ProgramModel,
    costs: &'a CostModel,
}

impl<'a> CostEstimator<'a> {
    pub fn new(model: &'a ProgramModel, costs: &'a CostModel) -> Self {
        Self { model, costs }
    }

    fn scaled(&self, cost: u64, loop_depth: u32) -> u64 {
        (0..loop_depth).fold(cost, |acc, _| acc.saturating_mul(self.costs.loop_multiplier))
    }

    pub fn estimate(&self, instruction: &InstructionDecl) -> CostEstimate {
        let costs = self.costs;
        let mut b = CostBreakdown {
            base: costs.base,
            accounts: costs.per_account.saturating_mul(instruction.accounts.len() as u64),
            ..Default::default()
        };

        for pda in self.model.pdas_of(instruction) {
            if matches!(pda.origin, PdaOrigin::Constraint { .. }) && pda.bump == BumpSource::Rederived {
                b.pdas = b.pdas.saturating_add(costs.per_rederived_pda);
            }
        }

        for op in &instruction.operations {
            let d = op.loop_depth;
            match &op.kind {
                OperationKind::StateMutation { .. } => {
                    b.mutations = b.mutations.saturating_add(self.scaled(costs.per_state_mutation, d));
                }
                OperationKind::CpiCall { .. } => {
                    b.cpis = b.cpis.saturating_add(self.scaled(costs.per_cpi, d));
                }
                OperationKind::PdaDerivation { pda } => {
                    let full = costs.per_rederived_pda;
                    let cost = match self.model.pda_derivations().get(*pda).map(|p| p.bump) {
                        Some(BumpSource::Rederived) => full,
                        _ => full / 4,
                    };
                    b.pdas = b.pdas.saturating_add(self.scaled(cost, d));
                }
                OperationKind::Emit { .. } => {
                    b.emits = b.emits.saturating_add(self.scaled(costs.per_emit, d));
                }
                OperationKind::Log => {
                    b.logs = b.logs.saturating_add(self.scaled(costs.per_log, d));
                }
                OperationKind::ValidationCheck { .. } => {}
            }
        }

        for site in self.model.arithmetic_in(&instruction.name) {
            let ops = site.expr.operators().len().max(1) as u64;
            let cost = costs.per_arithmetic.saturating_mul(ops);
            b.arithmetic = b.arithmetic.saturating_add(self.scaled(cost, site.loop_depth));
        }

        let total = [b.base, b.accounts, b.cpis, b.pdas, b.mutations, b.arithmetic, b.emits, b.logs]
            .iter()
            .fold(0u64, |acc, v| acc.saturating_add(*v));

        CostEstimate {
            instruction: instruction.name.clone(),
            total,
            breakdown: b,
        }
    }

    pub fn estimate_all(&self) -> Vec<CostEstimate> {
        self.model
            .instructions()
            .iter()
            .map(|i| self.estimate(i))
            .collect()
    }
}
