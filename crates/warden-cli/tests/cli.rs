use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SILENT_WITHDRAW: &str = r#"
use anchor_lang::prelude::*;

#[program]
pub mod vault {
    use super::*;

    pub fn withdraw(ctx: Context<Withdraw>, amount: u64) -> Result<()> {
        let vault = &mut ctx.accounts.vault;
        vault.balance = vault.balance.checked_sub(amount).ok_or(VaultError::Overflow)?;
        Ok(())
    }
}

#[derive(Accounts)]
pub struct Withdraw<'info> {
    #[account(mut)]
    pub vault: Account<'info, Vault>,
    /// CHECK: compared against vault.authority
    pub authority: AccountInfo<'info>,
}

#[account]
pub struct Vault {
    pub authority: Pubkey,
    pub balance: u64,
}
"#;

const BROKEN: &str = "pub fn withdraw(ctx: Context<Withdraw> {";

fn warden(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("warden").unwrap();
    cmd.current_dir(dir)
        .env_remove("WARDEN_PASS")
        .env_remove("WARDEN_SEVERITY_THRESHOLD")
        .env_remove("WARDEN_COMPUTE_BUDGET")
        .env_remove("RUST_LOG");
    cmd
}

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("vault.rs"), SILENT_WITHDRAW).unwrap();
    dir
}

fn json_stdout(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).unwrap()
}

#[test]
fn test_analyze_text() {
    let dir = workspace();
    warden(dir.path())
        .args(["analyze", "vault.rs", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Warden report: vault.rs"))
        .stdout(predicate::str::contains("Score: 45/100"))
        .stdout(predicate::str::contains("missing-signer-check"))
        .stdout(predicate::str::contains("=== Compound findings ==="));
}

#[test]
fn test_analyze_json() {
    let dir = workspace();
    let output = warden(dir.path())
        .args(["analyze", "vault.rs", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report = json_stdout(&output.stdout);
    assert_eq!(report["score"], 45);
    assert_eq!(report["findings"].as_array().unwrap().len(), 2);
    assert_eq!(report["compound_findings"].as_array().unwrap().len(), 1);
    assert!(report.get("optimized_code").is_none());
}

#[test]
fn test_analyze_flags_override_config_file() {
    let dir = workspace();
    fs::write(dir.path().join("strict.toml"), "pass = \"convention\"\nseverity_threshold = \"info\"\n").unwrap();

    let output = warden(dir.path())
        .args(["analyze", "vault.rs", "--format", "json", "--config", "strict.toml", "--pass", "security"])
        .output()
        .unwrap();
    let report = json_stdout(&output.stdout);
    let passes: Vec<&String> = report["pass_scores"].as_object().unwrap().keys().collect();
    assert_eq!(passes, vec!["security"]);
    assert_eq!(report["score"], 75);
}

#[test]
fn test_analyze_reads_default_config_file() {
    let dir = workspace();
    fs::write(dir.path().join("warden.toml"), "severity_threshold = \"critical\"\n").unwrap();

    let output = warden(dir.path())
        .args(["analyze", "vault.rs", "--format", "json"])
        .output()
        .unwrap();
    let report = json_stdout(&output.stdout);
    assert_eq!(report["findings"].as_array().unwrap().len(), 1);
    assert!(report["compound_findings"].as_array().unwrap().is_empty());
}

#[test]
fn test_environment_override() {
    let dir = workspace();
    let output = warden(dir.path())
        .env("WARDEN_PASS", "convention")
        .args(["analyze", "vault.rs", "--format", "json"])
        .output()
        .unwrap();
    let report = json_stdout(&output.stdout);
    let passes: Vec<&String> = report["pass_scores"].as_object().unwrap().keys().collect();
    assert_eq!(passes, vec!["convention"]);
}

#[test]
fn test_invalid_config_fails() {
    let dir = workspace();
    fs::write(dir.path().join("bad.toml"), "compute_budget = 0\n").unwrap();
    warden(dir.path())
        .args(["analyze", "vault.rs", "--config", "bad.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_analyze_directory_with_parse_failure() {
    let dir = workspace();
    fs::create_dir(dir.path().join("nested")).unwrap();
    fs::write(dir.path().join("nested/broken.rs"), BROKEN).unwrap();
    fs::write(dir.path().join("nested/notes.txt"), "not rust").unwrap();

    let output = warden(dir.path())
        .args(["analyze", ".", "--format", "json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("PARSE ERROR"));

    let reports = json_stdout(&output.stdout);
    let reports = reports.as_array().unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0]["file"].as_str().unwrap().ends_with("vault.rs"));
}

#[test]
fn test_analyze_writes_output_file() {
    let dir = workspace();
    warden(dir.path())
        .args(["analyze", "vault.rs", "--format", "markdown", "--patch", "-o", "report.md"])
        .assert()
        .success()
        .stderr(predicate::str::contains("SUCCESS:"));

    let report = fs::read_to_string(dir.path().join("report.md")).unwrap();
    assert!(report.starts_with("# Warden report: vault.rs"));
    assert!(report.contains("## Patched source"));
    assert!(report.contains("pub authority: Signer<'info>,"));
}

#[test]
fn test_patch_command() {
    let dir = workspace();
    warden(dir.path())
        .args(["patch", "vault.rs", "-o", "fixed.rs"])
        .assert()
        .success();

    let fixed = fs::read_to_string(dir.path().join("fixed.rs")).unwrap();
    assert!(fixed.contains("pub authority: Signer<'info>,"));
    assert!(!fixed.contains("AccountInfo<'info>"));
}

#[test]
fn test_patch_parse_failure() {
    let dir = workspace();
    fs::write(dir.path().join("broken.rs"), BROKEN).unwrap();
    warden(dir.path())
        .args(["patch", "broken.rs"])
        .assert()
        .code(2);
}

#[test]
fn test_rules_listing() {
    let dir = workspace();
    warden(dir.path())
        .arg("rules")
        .assert()
        .success()
        .stdout(predicate::str::contains("missing-signer-check"))
        .stdout(predicate::str::contains("rederived-bump"))
        .stdout(predicate::str::contains("event-escalation"));

    warden(dir.path())
        .args(["rules", "--pass", "cost"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unnecessary-mut"))
        .stdout(predicate::str::contains("missing-signer-check").not())
        .stdout(predicate::str::contains("event-escalation").not());
}

#[test]
fn test_model_dump() {
    let dir = workspace();
    let output = warden(dir.path()).args(["model", "vault.rs"]).output().unwrap();
    assert!(output.status.success());
    let dump = String::from_utf8_lossy(&output.stdout);
    assert!(dump.contains("\"withdraw\""));
    assert!(dump.contains("Withdraw.authority"));
}

#[test]
fn test_validate() {
    let dir = workspace();
    fs::write(dir.path().join("broken.rs"), BROKEN).unwrap();

    warden(dir.path())
        .args(["validate", "vault.rs", "-v"])
        .assert()
        .success()
        .stdout(predicate::str::contains("VALID"))
        .stdout(predicate::str::contains("Instructions: 1"));

    warden(dir.path())
        .args(["validate", "broken.rs"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("INVALID"));
}
