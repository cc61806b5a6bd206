use pretty_assertions::assert_eq;
use warden_parser::{parse_constraints, parse_instruction_args, parse_seeds, ConstraintAnnotation};

fn keys(entries: &[ConstraintAnnotation]) -> Vec<&str> {
    entries.iter().map(|e| e.key.as_str()).collect()
}

#[test]
fn test_init_pda_account() {
    let input = r#"
        init,
        payer = user,
        space = 8 + UserProfile::INIT_SPACE,
        seeds = [b"profile", user.key().as_ref(), name.as_bytes()],
        bump
    "#;
    let entries = parse_constraints(input).unwrap();

    assert_eq!(keys(&entries), vec!["init", "payer", "space", "seeds", "bump"]);
    let seeds = entries[3].value.as_deref().unwrap();
    let components = parse_seeds(seeds).unwrap();
    assert_eq!(components.len(), 3);
    assert_eq!(components[2].text, "name.as_bytes()");
}

#[test]
fn test_spans_round_trip_to_source() {
    let input = "mut, has_one = owner @ VaultError::WrongOwner, close = owner";
    let entries = parse_constraints(input).unwrap();

    let texts: Vec<_> = entries.iter().map(|e| &input[e.span.clone()]).collect();
    assert_eq!(
        texts,
        vec!["mut", "has_one = owner @ VaultError::WrongOwner", "close = owner"]
    );
}

#[test]
fn test_token_account_constraints() {
    let input = "init_if_needed, payer = payer, associated_token::mint = mint, associated_token::authority = owner,";
    let entries = parse_constraints(input).unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[2].key, "associated_token::mint");
    assert_eq!(entries[3].value.as_deref(), Some("owner"));
}

#[test]
fn test_constraint_with_closure_and_strings() {
    let input = r#"constraint = names.iter().all(|n| n.len() <= 32 && n != ","), mut"#;
    let entries = parse_constraints(input).unwrap();
    assert_eq!(keys(&entries), vec!["constraint", "mut"]);
}

#[test]
fn test_instruction_arguments() {
    let args = parse_instruction_args("title: String, seed: [u8; 32], amounts: Vec<(u64, u64)>").unwrap();
    let pairs: Vec<_> = args.iter().map(|a| (a.name.as_str(), a.ty.as_str())).collect();
    assert_eq!(
        pairs,
        vec![("title", "String"), ("seed", "[u8; 32]"), ("amounts", "Vec<(u64, u64)>")]
    );
}

#[test]
fn test_malformed_lists() {
    assert!(parse_constraints("seeds = [b\"a\", ").is_err());
    assert!(parse_constraints("= mut").is_err());
    assert!(parse_seeds("[b\"a\"").is_err());
}
