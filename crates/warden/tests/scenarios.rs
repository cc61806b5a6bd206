mod common;

use common::{
    CLOSABLE_POSITION, ONE_SIDED_REBALANCE, RAW_DEPOSIT, REBALANCE, REINITIALIZABLE_COUNTER,
    SILENT_WITHDRAW, UNSIGNED_WITHDRAW, USER_SEEDED_PROFILE,
};
use pretty_assertions::assert_eq;
use warden::core::analysis::correlation::{
    OVERFLOW_BUDGET, REINIT_OBSERVABILITY, SECURITY_PRECEDENCE, TYPE_SAFETY_CLOSURE,
};
use warden::core::analysis::rules::{
    DUPLICATE_MUTABLE_ACCOUNTS, MISSING_EVENT_EMISSION, MISSING_HAS_ONE, MISSING_SIGNER_CHECK,
    MISSING_TYPE_VALIDATION, REDERIVED_BUMP, REINITIALIZATION, UNCHECKED_ARITHMETIC,
    UNNECESSARY_MUT, UNVALIDATED_PDA,
};
use warden::core::analysis::Directive;
use warden::core::remediation::planner::{resolve, PlanCandidate};
use warden::core::remediation::PatchGenerator;
use warden::core::{Edit, Origin, Priority, SourceSpan};
use warden::{analyze_source, AnalysisConfig, AnalysisPass, Category, FindingId, PassSelection, Severity};

fn security_only() -> AnalysisConfig {
    AnalysisConfig {
        pass: PassSelection::Security,
        ..AnalysisConfig::default()
    }
}

#[test]
fn test_unsigned_authority_on_fund_moving_instruction() {
    let analysis = analyze_source(UNSIGNED_WITHDRAW, &security_only()).unwrap();
    let run = &analysis.run;

    assert_eq!(run.findings.len(), 1);
    assert!(run.compound_findings.is_empty());

    let finding = &run.findings[0];
    assert_eq!(finding.rule_id, MISSING_SIGNER_CHECK);
    assert_eq!(finding.severity, Severity::Critical);
    assert_eq!(finding.category, Category::Security);
    assert_eq!(finding.location.instruction, "withdraw");
    assert_eq!(finding.location.account.as_deref(), Some("authority"));

    let line = finding.location.line.unwrap() as usize;
    let text = analysis.model.source().get_line(line).unwrap();
    assert!(text.contains("pub authority: AccountInfo<'info>"));

    assert_eq!(run.score, 75);
    assert_eq!(run.pass_scores[&AnalysisPass::Security], 75);
}

#[test]
fn test_unsigned_authority_is_the_only_finding_across_passes() {
    let analysis = analyze_source(UNSIGNED_WITHDRAW, &AnalysisConfig::default()).unwrap();
    let ids: Vec<&str> = analysis.run.all_findings().map(|f| f.rule_id.as_str()).collect();
    assert_eq!(ids, vec![MISSING_SIGNER_CHECK]);
    assert_eq!(analysis.run.score, 75);
}

#[test]
fn test_raw_arithmetic_without_budget_pressure() {
    let analysis = analyze_source(RAW_DEPOSIT, &AnalysisConfig::default()).unwrap();
    let run = &analysis.run;

    let ids: Vec<&str> = run.all_findings().map(|f| f.rule_id.as_str()).collect();
    assert_eq!(ids, vec![UNCHECKED_ARITHMETIC]);
    assert_eq!(run.findings[0].severity, Severity::High);
    assert_eq!(run.findings[0].location.instruction, "deposit");
    assert!(run.compound_findings.is_empty());
    assert!(run.resolutions.is_empty());
    assert_eq!(run.score, 85);

    let estimate = run.cost_estimates.iter().find(|c| c.instruction == "deposit").unwrap();
    assert!(estimate.total < 140_000);
}

#[test]
fn test_missing_signer_escalates_missing_event() {
    let analysis = analyze_source(SILENT_WITHDRAW, &AnalysisConfig::default()).unwrap();
    let run = &analysis.run;

    assert_eq!(run.all_findings().count(), 3);

    let signer = run.findings_for(MISSING_SIGNER_CHECK);
    assert_eq!(signer.len(), 1);
    assert_eq!(signer[0].severity, Severity::Critical);

    let event = run.findings_for(MISSING_EVENT_EMISSION);
    assert_eq!(event.len(), 1);
    assert_eq!(event[0].base_severity, Severity::Medium);
    assert_eq!(event[0].severity, Severity::High);

    assert_eq!(run.compound_findings.len(), 1);
    let compound = &run.compound_findings[0];
    assert_eq!(compound.severity, Severity::High);
    assert_eq!(compound.rule_id, "event-escalation");
    match &compound.origin {
        Origin::Derived { correlation_rule, sources } => {
            assert_eq!(correlation_rule, "event-escalation");
            assert_eq!(sources, &vec![signer[0].id.clone(), event[0].id.clone()]);
        }
        Origin::Raw => panic!("compound finding must be derived"),
    }

    assert_eq!(run.resolutions.len(), 1);
    assert_eq!(run.resolutions[0].finding, event[0].id);
    assert_eq!(run.resolutions[0].directive, Directive::Escalate { to: Severity::High });

    // 100 - critical - high - high
    assert_eq!(run.score, 45);
}

#[test]
fn test_compound_takes_the_signer_edit() {
    let analysis = analyze_source(SILENT_WITHDRAW, &AnalysisConfig::default()).unwrap();
    let plan = &analysis.run.plan;
    let compound = &analysis.run.compound_findings[0];
    let signer = &analysis.run.findings_for(MISSING_SIGNER_CHECK)[0].id;

    assert_eq!(plan[0].priority, Priority::Compound);
    assert_eq!(plan[0].finding_refs, vec![compound.id.clone()]);
    let edit = plan[0].edit.as_ref().unwrap();
    assert_eq!(edit.before, "AccountInfo<'info>");
    assert_eq!(edit.after, "Signer<'info>");
    assert_eq!(plan[0].supersedes, vec![signer.clone()]);

    // The escalated event finding stays as an advisory item.
    assert_eq!(plan.len(), 2);
    assert_eq!(plan[1].priority, Priority::High);
    assert!(plan[1].edit.is_none());
}

#[test]
fn test_unbounded_user_seed_and_rederived_bump() {
    let analysis = analyze_source(USER_SEEDED_PROFILE, &AnalysisConfig::default()).unwrap();
    let run = &analysis.run;

    let pda = run.findings_for(UNVALIDATED_PDA);
    assert_eq!(pda.len(), 1);
    assert_eq!(pda[0].severity, Severity::Critical);
    assert_eq!(pda[0].subject.as_deref(), Some("name"));
    assert_eq!(pda[0].location.instruction, "update_profile");
    assert_eq!(pda[0].location.account.as_deref(), Some("profile"));

    let bump = run.findings_for(REDERIVED_BUMP);
    assert_eq!(bump.len(), 1);
    assert_eq!(bump[0].category, Category::Cost);
    assert_eq!(bump[0].severity, Severity::Medium);

    assert!(run
        .resolutions
        .iter()
        .all(|r| r.finding != bump[0].id || r.directive != Directive::Drop));
    assert_eq!(run.findings.len(), 2);
    assert!(run.compound_findings.is_empty());
}

#[test]
fn test_overlapping_fixes_keep_higher_priority() {
    let source = "let total = amount + fee;\n";
    let candidate = |priority, id: &str, start, before: &str, after: &str| PlanCandidate {
        priority,
        finding: FindingId(id.to_string()),
        description: id.to_string(),
        edit: Some(Edit::replace(
            SourceSpan::new(start, before.len() as u32),
            before,
            after,
        )),
    };

    let candidates = vec![
        candidate(Priority::Medium, "trailing", 23, "e;", "e; // fee"),
        candidate(
            Priority::High,
            "arith",
            12,
            "amount + fee",
            "amount.checked_add(fee).ok_or(ProgramError::ArithmeticOverflow)?",
        ),
        candidate(Priority::Info, "binding", 0, "let", "let mut"),
    ];
    let n = candidates.len();

    let plan = resolve(candidates);
    assert_eq!(plan.len(), n - 1);
    assert_eq!(plan[0].finding_refs, vec![FindingId("arith".into())]);
    assert!(plan[0].supersedes.is_empty());
    assert_eq!(plan[0].displaced, vec![FindingId("trailing".into())]);
    assert_eq!(plan[0].notes.len(), 1);
    assert_eq!(plan[1].finding_refs, vec![FindingId("binding".into())]);

    let patch = PatchGenerator::new(source).apply(&plan);
    assert!(patch.drift.is_empty());
    assert!(!patch.resolved.contains(&FindingId("trailing".into())));
    assert_eq!(
        patch.code,
        "let mut total = amount.checked_add(fee).ok_or(ProgramError::ArithmeticOverflow)?;\n"
    );
}

#[test]
fn test_same_site_constraints_are_merged() {
    let config = AnalysisConfig {
        generate_patch: true,
        ..AnalysisConfig::default()
    };
    let analysis = analyze_source(REBALANCE, &config).unwrap();
    let run = &analysis.run;
    assert_eq!(run.findings_for(MISSING_HAS_ONE).len(), 2);
    let duplicate = &run.findings_for(DUPLICATE_MUTABLE_ACCOUNTS)[0].id;

    let merged = run.plan.iter().find(|item| item.supersedes.contains(duplicate)).unwrap();
    assert_eq!(
        merged.edit.as_ref().unwrap().after,
        ", has_one = authority, constraint = to.key() != from.key()"
    );
    assert!(run.plan.iter().all(|item| item.displaced.is_empty()));

    let patched = analysis.patched_source().unwrap();
    assert!(patched.contains("#[account(mut, has_one = authority)]\n    pub from"));
    assert!(patched.contains("#[account(mut, has_one = authority, constraint = to.key() != from.key())]"));

    let after = analysis.reanalyze_patched(&config).unwrap().unwrap();
    assert!(after.run.findings_for(DUPLICATE_MUTABLE_ACCOUNTS).is_empty());
    assert!(after.run.findings_for(MISSING_HAS_ONE).is_empty());
    assert_eq!(after.run.score, 100);
}

#[test]
fn test_constraint_addition_beats_mut_removal() {
    let analysis = analyze_source(ONE_SIDED_REBALANCE, &AnalysisConfig::default()).unwrap();
    let run = &analysis.run;

    let duplicate = run.findings_for(DUPLICATE_MUTABLE_ACCOUNTS);
    assert_eq!(duplicate.len(), 1);
    assert_eq!(duplicate[0].location.account.as_deref(), Some("to"));
    assert!(run.findings_for(UNNECESSARY_MUT).is_empty());

    assert_eq!(run.resolutions.len(), 1);
    assert_eq!(run.resolutions[0].rule, SECURITY_PRECEDENCE);
    assert_eq!(run.resolutions[0].directive, Directive::Drop);
    assert!(run.resolutions[0].reason.contains(UNNECESSARY_MUT));

    let cost_only = AnalysisConfig {
        pass: PassSelection::Cost,
        ..AnalysisConfig::default()
    };
    let alone = analyze_source(ONE_SIDED_REBALANCE, &cost_only).unwrap();
    assert_eq!(alone.run.findings_for(UNNECESSARY_MUT).len(), 1);
}

#[test]
fn test_unvalidated_account_next_to_closable_account() {
    let analysis = analyze_source(CLOSABLE_POSITION, &AnalysisConfig::default()).unwrap();
    let run = &analysis.run;

    let unvalidated = run.findings_for(MISSING_TYPE_VALIDATION);
    assert_eq!(unvalidated.len(), 1);
    assert_eq!(unvalidated[0].location.account.as_deref(), Some("oracle"));

    let compounds: Vec<_> = run
        .compound_findings
        .iter()
        .filter(|c| c.rule_id == TYPE_SAFETY_CLOSURE)
        .collect();
    assert_eq!(compounds.len(), 1);
    assert_eq!(compounds[0].severity, Severity::High);
    assert_eq!(compounds[0].sources(), &[unvalidated[0].id.clone()][..]);

    let never_closed = CLOSABLE_POSITION.replace(", close = authority", "");
    let analysis = analyze_source(&never_closed, &AnalysisConfig::default()).unwrap();
    assert_eq!(analysis.run.findings_for(MISSING_TYPE_VALIDATION).len(), 1);
    assert!(analysis
        .run
        .compound_findings
        .iter()
        .all(|c| c.rule_id != TYPE_SAFETY_CLOSURE));
}

#[test]
fn test_overflow_under_budget_pressure() {
    let baseline = analyze_source(RAW_DEPOSIT, &AnalysisConfig::default()).unwrap();
    let estimate = baseline
        .run
        .cost_estimates
        .iter()
        .find(|c| c.instruction == "deposit")
        .unwrap()
        .total;
    let unchecked = baseline.run.findings_for(UNCHECKED_ARITHMETIC)[0].id.clone();
    let with_budget = |compute_budget| AnalysisConfig {
        compute_budget,
        ..AnalysisConfig::default()
    };

    // Estimate above 70% of the budget.
    let pressed = analyze_source(RAW_DEPOSIT, &with_budget(estimate)).unwrap();
    let compounds: Vec<_> = pressed
        .run
        .compound_findings
        .iter()
        .filter(|c| c.rule_id == OVERFLOW_BUDGET)
        .collect();
    assert_eq!(compounds.len(), 1);
    assert_eq!(compounds[0].sources(), &[unchecked][..]);
    assert_eq!(compounds[0].location.instruction, "deposit");

    // Estimate at half the budget.
    let relaxed = analyze_source(RAW_DEPOSIT, &with_budget(estimate * 2)).unwrap();
    assert!(relaxed.run.compound_findings.is_empty());
    assert_eq!(relaxed.run.findings_for(UNCHECKED_ARITHMETIC).len(), 1);
}

#[test]
fn test_silent_reinitialization() {
    let analysis = analyze_source(REINITIALIZABLE_COUNTER, &AnalysisConfig::default()).unwrap();
    let run = &analysis.run;

    let reinit = run.findings_for(REINITIALIZATION);
    assert_eq!(reinit.len(), 1);
    assert_eq!(reinit[0].location.instruction, "initialize");

    let compounds: Vec<_> = run
        .compound_findings
        .iter()
        .filter(|c| c.rule_id == REINIT_OBSERVABILITY)
        .collect();
    assert_eq!(compounds.len(), 1);
    assert_eq!(compounds[0].sources(), &[reinit[0].id.clone()][..]);

    let observed = REINITIALIZABLE_COUNTER.replace(
        "counter.count = 0;",
        "counter.count = 0;\n        emit!(CounterReset { count: 0 });",
    );
    let analysis = analyze_source(&observed, &AnalysisConfig::default()).unwrap();
    assert_eq!(analysis.run.findings_for(REINITIALIZATION).len(), 1);
    assert!(analysis
        .run
        .compound_findings
        .iter()
        .all(|c| c.rule_id != REINIT_OBSERVABILITY));
}

#[test]
fn test_threshold_filters_after_correlation() {
    let config = AnalysisConfig {
        severity_threshold: Severity::High,
        ..AnalysisConfig::default()
    };
    let analysis = analyze_source(SILENT_WITHDRAW, &config).unwrap();

    // The event finding survives only because it was escalated first.
    assert_eq!(analysis.run.findings_for(MISSING_EVENT_EMISSION).len(), 1);
    assert_eq!(analysis.run.all_findings().count(), 3);
}

#[test]
fn test_malformed_source_is_a_parse_error() {
    let error = analyze_source("pub fn broken( {", &AnalysisConfig::default()).unwrap_err();
    assert!(!error.to_string().is_empty());
}
