//! Cost pass predicates.

use super::cost::CostEstimator;
use super::rules::Detection;
use crate::config::AnalysisConfig;
use crate::finding::FindingLocation;
use crate::model::{AccountKind, BumpSource, OperationKind, PdaOrigin, ProgramModel};

pub fn rederived_bump(model: &ProgramModel, _config: &AnalysisConfig) -> Result<Vec<Detection>, String> {
    let mut out = Vec::new();

    for pda in model.pda_derivations() {
        if pda.bump != BumpSource::Rederived || pda.init {
            continue;
        }
        let span = pda.bump_span.unwrap_or(pda.span);
        let line = model.line_of(span);
        match &pda.origin {
            PdaOrigin::Constraint { account } => {
                let Some(owner) = model.account(account) else {
                    continue;
                };
                let stored = owner
                    .layout
                    .as_ref()
                    .map(|l| l.has_field("bump"))
                    .unwrap_or(false);
                let detection = Detection::new(
                    FindingLocation::instruction(model.anchor_instruction(&owner.context))
                        .with_account(&owner.name)
                        .at(span, line),
                    format!(
                        "`{}` re-derives its bump with find_program_address on every call",
                        owner.name
                    ),
                );
                out.push(if stored { detection } else { detection.advisory() });
            }
            PdaOrigin::Derivation { instruction } => {
                out.push(
                    Detection::new(
                        FindingLocation::instruction(instruction).at(span, line),
                        format!("`{}` calls find_program_address instead of reusing a stored bump", instruction),
                    )
                    .advisory(),
                );
            }
        }
    }

    Ok(out)
}

pub fn unnecessary_mut(model: &ProgramModel, _config: &AnalysisConfig) -> Result<Vec<Detection>, String> {
    let mut out = Vec::new();

    for context in model.contexts().values() {
        let users: Vec<_> = model.instructions_using(&context.name).collect();
        if users.is_empty() {
            continue;
        }
        let opaque_writes = users.iter().any(|i| {
            i.operations.iter().any(|op| {
                matches!(&op.kind, OperationKind::StateMutation { account: None, .. })
            })
        });
        if opaque_writes {
            continue;
        }

        let decls: Vec<_> = context.fields.iter().filter_map(|k| model.account(k)).collect();
        let referenced_by_others = |name: &str| {
            decls.iter().any(|d| {
                d.constraints.close.as_deref() == Some(name)
                    || d.constraints.payer.as_deref() == Some(name)
                    || d.constraints.realloc_payer.as_deref() == Some(name)
            })
        };

        for decl in &decls {
            let Some(entry) = decl.constraints.entry("mut") else {
                continue;
            };
            if decl.constraints.initializes()
                || decl.constraints.close.is_some()
                || decl.constraints.realloc_payer.is_some()
                || referenced_by_others(&decl.name)
            {
                continue;
            }
            let written = users.iter().any(|i| {
                i.mutates(&decl.name) || model.cpis_of(i).any(|c| c.forwards(&decl.name))
            });
            if written {
                continue;
            }
            out.push(Detection::new(
                FindingLocation::instruction(model.anchor_instruction(&context.name))
                    .with_account(&decl.name)
                    .at(entry.span, model.line_of(entry.span)),
                format!("`{}` is marked mut but no handler writes or forwards it", decl.name),
            ));
        }
    }

    Ok(out)
}

pub fn redundant_signer_constraint(model: &ProgramModel, _config: &AnalysisConfig) -> Result<Vec<Detection>, String> {
    Ok(model
        .accounts()
        .values()
        .filter(|a| a.kind == AccountKind::Signer)
        .filter_map(|a| a.constraints.entry("signer").map(|e| (a, e)))
        .map(|(a, entry)| {
            Detection::new(
                FindingLocation::instruction(model.anchor_instruction(&a.context))
                    .with_account(&a.name)
                    .at(entry.span, model.line_of(entry.span)),
                format!("`{}` is already a Signer; the signer constraint repeats the check", a.name),
            )
        })
        .collect())
}

pub fn compute_budget_exceeded(model: &ProgramModel, config: &AnalysisConfig) -> Result<Vec<Detection>, String> {
    let estimator = CostEstimator::new(model, &config.cost_model);
    Ok(model
        .instructions()
        .iter()
        .filter_map(|i| {
            let estimate = estimator.estimate(i);
            (estimate.total > config.compute_budget).then(|| {
                Detection::new(
                    FindingLocation::instruction(&i.name).at(i.span, i.line),
                    format!(
                        "`{}` is estimated at {} compute units, above the {} budget",
                        i.name, estimate.total, config.compute_budget
                    ),
                )
            })
        })
        .collect())
}
