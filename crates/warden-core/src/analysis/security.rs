//! Security pass predicates.

use super::is_privileged;
use super::rules::Detection;
use crate::config::AnalysisConfig;
use crate::finding::FindingLocation;
use crate::model::{
    AccountDecl, AccountKind, ArithExpr, BumpSource, CpiStyle, CpiTarget, InitMode, PdaOrigin,
    ProgramModel, SeedComponent,
};
use std::collections::HashSet;

const SYSVAR_NAMES: &[&str] = &["rent", "clock", "instructions", "recent_blockhashes", "slot_hashes"];

fn account_location(model: &ProgramModel, instruction: &str, decl: &AccountDecl) -> FindingLocation {
    FindingLocation::instruction(instruction)
        .with_account(&decl.name)
        .at(decl.type_span, model.line_of(decl.type_span))
}

pub fn missing_signer_check(model: &ProgramModel, _config: &AnalysisConfig) -> Result<Vec<Detection>, String> {
    let mut out = Vec::new();
    let mut reported: HashSet<String> = HashSet::new();

    for instruction in model.instructions() {
        if !(instruction.mutates_state() || instruction.performs_cpi()) {
            continue;
        }
        let accounts: Vec<&AccountDecl> = model.context_accounts(instruction).collect();
        if accounts.is_empty() {
            continue;
        }

        let unsigned_authorities: Vec<&AccountDecl> = accounts
            .iter()
            .copied()
            .filter(|a| a.kind.is_raw() && !a.is_signer())
            .filter(|a| is_privileged(&a.name) && !a.is_program())
            .filter(|a| a.constraints.seeds.is_none())
            .collect();

        for decl in &unsigned_authorities {
            if !reported.insert(decl.key()) {
                continue;
            }
            out.push(
                Detection::new(
                    account_location(model, &instruction.name, decl),
                    format!(
                        "`{}` changes program state but `{}` is a {} account, so anyone can pass it without signing",
                        instruction.name,
                        decl.name,
                        decl.kind.label()
                    ),
                ),
            );
        }

        if unsigned_authorities.is_empty() && !accounts.iter().any(|a| a.is_signer()) {
            let key = format!("{}#instruction", instruction.name);
            if reported.insert(key) {
                out.push(
                    Detection::new(
                        FindingLocation::instruction(&instruction.name)
                            .at(instruction.span, instruction.line),
                        format!(
                            "`{}` changes program state and none of its accounts is required to sign",
                            instruction.name
                        ),
                    )
                    .advisory(),
                );
            }
        }
    }

    Ok(out)
}

pub fn missing_has_one(model: &ProgramModel, _config: &AnalysisConfig) -> Result<Vec<Detection>, String> {
    let mut out = Vec::new();
    let mut reported: HashSet<(String, String)> = HashSet::new();

    for instruction in model.instructions() {
        let signers: Vec<&AccountDecl> = model
            .context_accounts(instruction)
            .filter(|a| a.is_signer())
            .collect();

        for decl in model.context_accounts(instruction) {
            if !instruction.mutates(&decl.name) || decl.constraints.initializes() {
                continue;
            }
            let Some(layout) = decl.layout.as_ref() else {
                continue;
            };
            for signer in &signers {
                if !layout.stores_pubkey(&signer.name) {
                    continue;
                }
                let bound = decl.constraints.has_one.iter().any(|h| h == &signer.name)
                    || decl.constraints.custom.iter().any(|c| c.binds_key_of(&signer.name))
                    || instruction.validates(&signer.name);
                if bound || !reported.insert((decl.key(), signer.name.clone())) {
                    continue;
                }
                out.push(
                    Detection::new(
                        account_location(model, &instruction.name, decl),
                        format!(
                            "`{}` stores `{}` but nothing ties it to the `{}` signer, so any signer can act on it",
                            decl.name, signer.name, signer.name
                        ),
                    )
                    .with_subject(&signer.name),
                );
            }
        }
    }

    Ok(out)
}

pub fn unchecked_arithmetic(model: &ProgramModel, _config: &AnalysisConfig) -> Result<Vec<Detection>, String> {
    Ok(model
        .arithmetic_sites()
        .iter()
        .filter(|site| !site.is_checked())
        .map(|site| {
            let ops: Vec<&str> = site.expr.operators().iter().map(|op| op.symbol()).collect();
            let target = match (&site.assign_target, &site.expr) {
                (Some(target), _) => format!(" on `{}`", target),
                (None, ArithExpr::Operand { text, .. }) => format!(" in `{}`", text),
                (None, ArithExpr::Binary { .. }) => String::new(),
            };
            Detection::new(
                FindingLocation::instruction(&site.instruction).at(site.span, site.line),
                format!(
                    "unchecked `{}`{} can overflow or underflow silently",
                    ops.join(" "),
                    target
                ),
            )
        })
        .collect())
}

fn seed_guarded(model: &ProgramModel, origin: &PdaOrigin, seed: &SeedComponent) -> bool {
    let Some(subject) = seed.subject.as_deref() else {
        return false;
    };
    match origin {
        PdaOrigin::Constraint { account } => {
            let Some(owner) = model.account(account) else {
                return false;
            };
            model
                .accounts_of_context(&owner.context)
                .flat_map(|a| a.constraints.custom.iter())
                .any(|c| c.length_bounded.iter().any(|s| s == subject))
        }
        PdaOrigin::Derivation { instruction } => {
            let Some(decl) = model.instruction(instruction) else {
                return false;
            };
            decl.length_guarded(subject)
                || model
                    .context_accounts(decl)
                    .flat_map(|a| a.constraints.custom.iter())
                    .any(|c| c.length_bounded.iter().any(|s| s == subject))
        }
    }
}

pub fn unvalidated_pda(model: &ProgramModel, _config: &AnalysisConfig) -> Result<Vec<Detection>, String> {
    let mut out = Vec::new();

    for pda in model.pda_derivations() {
        for seed in pda.user_input_seeds() {
            if seed_guarded(model, &pda.origin, seed) {
                continue;
            }
            let subject = seed.subject.clone().unwrap_or_else(|| seed.text.clone());
            let line = model.line_of(seed.span);
            let location = match &pda.origin {
                PdaOrigin::Constraint { account } => {
                    let Some(owner) = model.account(account) else {
                        return Err(format!("PDA references unknown account {}", account));
                    };
                    FindingLocation::instruction(model.anchor_instruction(&owner.context))
                        .with_account(&owner.name)
                        .at(seed.span, line)
                }
                PdaOrigin::Derivation { instruction } => {
                    FindingLocation::instruction(instruction).at(seed.span, line)
                }
            };
            out.push(
                Detection::new(
                    location,
                    format!(
                        "seed `{}` comes from caller-supplied `{}` with no length bound",
                        seed.text, subject
                    ),
                )
                .with_subject(subject),
            );
        }
    }

    Ok(out)
}

pub fn hardcoded_bump(model: &ProgramModel, _config: &AnalysisConfig) -> Result<Vec<Detection>, String> {
    let mut out = Vec::new();
    for pda in model.pda_derivations() {
        if pda.bump != BumpSource::Hardcoded {
            continue;
        }
        let span = pda.bump_span.unwrap_or(pda.span);
        let detection = match &pda.origin {
            PdaOrigin::Constraint { account } => {
                let Some(owner) = model.account(account) else {
                    continue;
                };
                Detection::new(
                    FindingLocation::instruction(model.anchor_instruction(&owner.context))
                        .with_account(&owner.name)
                        .at(span, model.line_of(span)),
                    format!("`{}` is validated against a literal bump, which may not be canonical", owner.name),
                )
            }
            PdaOrigin::Derivation { instruction } => Detection::new(
                FindingLocation::instruction(instruction).at(span, model.line_of(span)),
                "address derived with a literal bump, which may not be canonical",
            )
            .advisory(),
        };
        out.push(detection);
    }
    Ok(out)
}

/// Program wrapper type implied by a CPI callee path.
pub(crate) fn program_type_for_callee(callee: &str) -> Option<&'static str> {
    let head = callee.split("::").next().unwrap_or(callee);
    match head {
        "token" | "spl_token" => Some("Token"),
        "system_program" => Some("System"),
        "associated_token" | "spl_associated_token_account" => Some("AssociatedToken"),
        _ => None,
    }
}

pub fn unverified_cpi_target(model: &ProgramModel, _config: &AnalysisConfig) -> Result<Vec<Detection>, String> {
    let mut out = Vec::new();

    for call in model.cpi_edges() {
        let CpiTarget::Unverified { account, expr } = &call.target else {
            continue;
        };
        let Some(instruction) = model.instruction(&call.instruction) else {
            continue;
        };

        let location = FindingLocation::instruction(&call.instruction);
        let detection = match account {
            Some(name) => {
                let decl = model.account_in(instruction, name);
                let verified = decl
                    .map(|d| d.is_pinned() || matches!(d.kind, AccountKind::Program { .. }))
                    .unwrap_or(false)
                    || instruction.validates(name);
                if verified {
                    continue;
                }
                let description = format!(
                    "`{}` invokes `{}` through `{}` without checking the program id",
                    call.instruction, call.callee, name
                );
                match (decl, program_type_for_callee(&call.callee)) {
                    (Some(decl), Some(program)) if decl.kind.is_raw() => Detection::new(
                        location.with_account(name).at(decl.type_span, decl.line),
                        description,
                    )
                    .with_subject(program),
                    _ => Detection::new(location.with_account(name).at(call.span, call.line), description)
                        .advisory(),
                }
            }
            None => {
                if call.style == CpiStyle::CpiContext {
                    continue;
                }
                Detection::new(
                    location.at(call.span, call.line),
                    format!(
                        "`{}` invokes `{}` on a program id taken from `{}` without checking it",
                        call.instruction, call.callee, expr
                    ),
                )
                .advisory()
            }
        };
        out.push(detection);
    }

    Ok(out)
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// State struct whose snake_case name matches the field name.
pub(crate) fn state_type_for_field<'a>(model: &'a ProgramModel, field: &str) -> Option<&'a str> {
    model
        .state_layouts()
        .keys()
        .find(|name| {
            let snake = snake_case(name);
            field == snake || field.ends_with(&format!("_{}", snake))
        })
        .map(String::as_str)
}

pub fn missing_type_validation(model: &ProgramModel, _config: &AnalysisConfig) -> Result<Vec<Detection>, String> {
    let mut out = Vec::new();

    for decl in model.accounts().values() {
        if !decl.kind.is_raw()
            || decl.is_signer()
            || decl.is_program()
            || decl.is_pinned()
            || is_privileged(&decl.name)
            || decl.constraints.seeds.is_some()
            || decl.constraints.initializes()
            || SYSVAR_NAMES.contains(&decl.name.as_str())
        {
            continue;
        }
        let instruction = model.anchor_instruction(&decl.context);
        let detection = Detection::new(
            account_location(model, &instruction, decl),
            format!(
                "`{}` is a {} account with no owner or discriminator check; a forged account of another type is accepted",
                decl.name,
                decl.kind.label()
            ),
        );
        out.push(match state_type_for_field(model, &decl.name) {
            Some(state) => detection.with_subject(state),
            None => detection.advisory(),
        });
    }

    Ok(out)
}

pub fn reinitialization(model: &ProgramModel, _config: &AnalysisConfig) -> Result<Vec<Detection>, String> {
    let mut out = Vec::new();

    for decl in model.accounts().values() {
        if decl.constraints.init != InitMode::InitIfNeeded {
            continue;
        }
        let span = decl
            .constraints
            .entry("init_if_needed")
            .map(|e| e.span)
            .unwrap_or(decl.type_span);
        out.push(Detection::new(
            FindingLocation::instruction(model.anchor_instruction(&decl.context))
                .with_account(&decl.name)
                .at(span, model.line_of(span)),
            format!(
                "`{}` uses init_if_needed, so an existing account can be reset by calling the initializer again",
                decl.name
            ),
        ));
    }

    for instruction in model.instructions() {
        let name = instruction.name.to_ascii_lowercase();
        if !(name.starts_with("init") || name.starts_with("initialize")) {
            continue;
        }
        for decl in model.context_accounts(instruction) {
            if decl.constraints.initializes()
                || !matches!(decl.kind, AccountKind::Typed { .. })
                || !instruction.mutates(&decl.name)
            {
                continue;
            }
            let checks_flag = instruction.validates("is_initialized") || instruction.validates("initialized");
            if checks_flag {
                continue;
            }
            out.push(
                Detection::new(
                    account_location(model, &instruction.name, decl),
                    format!(
                        "`{}` writes `{}` without init or an initialized-flag check, so it can be re-run",
                        instruction.name, decl.name
                    ),
                )
                .advisory(),
            );
        }
    }

    Ok(out)
}

fn duplicate_group(decl: &AccountDecl) -> Option<String> {
    match &decl.kind {
        AccountKind::Typed { inner, .. } => Some(inner.clone()),
        AccountKind::Raw | AccountKind::Unchecked => Some("AccountInfo".to_string()),
        _ => None,
    }
}

pub fn duplicate_mutable_accounts(model: &ProgramModel, _config: &AnalysisConfig) -> Result<Vec<Detection>, String> {
    let mut out = Vec::new();

    for context in model.contexts().values() {
        let candidates: Vec<&AccountDecl> = context
            .fields
            .iter()
            .filter_map(|key| model.account(key))
            .filter(|a| a.constraints.mutable && !a.constraints.initializes() && !a.is_signer())
            .filter(|a| !a.is_program())
            .collect();

        let guards: Vec<_> = candidates
            .iter()
            .flat_map(|a| a.constraints.custom.iter())
            .collect();

        for (i, second) in candidates.iter().enumerate() {
            for first in &candidates[..i] {
                if duplicate_group(first) != duplicate_group(second) {
                    continue;
                }
                if first.constraints.seeds.is_some() && second.constraints.seeds.is_some() {
                    continue;
                }
                if guards.iter().any(|g| g.separates(&first.name, &second.name)) {
                    continue;
                }
                let instruction = model.anchor_instruction(&context.name);
                out.push(
                    Detection::new(
                        account_location(model, &instruction, second),
                        format!(
                            "`{}` and `{}` are both mutable and may be the same account",
                            first.name, second.name
                        ),
                    )
                    .with_subject(&first.name),
                );
            }
        }
    }

    Ok(out)
}

pub fn state_after_cpi(model: &ProgramModel, _config: &AnalysisConfig) -> Result<Vec<Detection>, String> {
    Ok(model
        .cpi_edges()
        .iter()
        .filter(|call| call.mutations_after > 0)
        .map(|call| {
            Detection::new(
                FindingLocation::instruction(&call.instruction).at(call.span, call.line),
                format!(
                    "`{}` writes state {} time(s) after invoking `{}`",
                    call.instruction, call.mutations_after, call.callee
                ),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("UserProfile"), "user_profile");
        assert_eq!(snake_case("Vault"), "vault");
    }

    #[test]
    fn test_program_type_for_callee() {
        assert_eq!(program_type_for_callee("token::transfer"), Some("Token"));
        assert_eq!(program_type_for_callee("system_program::transfer"), Some("System"));
        assert_eq!(program_type_for_callee("invoke"), None);
    }
}
