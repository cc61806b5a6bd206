use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use warden::{
    AnalysisConfig, AnalysisReport, CliOverrides, EmitterConfig, OutputFormat, PassSelection,
    ReportEmitter, Severity, VerbosityLevel,
};

const DEFAULT_CONFIG_FILE: &str = "warden.toml";
const PARSE_FAILURE: u8 = 2;

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Warden - static analysis and remediation for Anchor programs")]
#[command(version)]
struct Cli {
    /// Raise log and report verbosity (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a program file, or every .rs file under a directory
    Analyze {
        path: PathBuf,

        #[arg(long)]
        pass: Option<PassSelection>,

        #[arg(long)]
        threshold: Option<Severity>,

        #[arg(long)]
        budget: Option<u64>,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Apply the remediation plan and include the patched source
        #[arg(long)]
        patch: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        no_color: bool,
    },

    /// Write the patched source of one file
    Patch {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List the rule database
    Rules {
        #[arg(long)]
        pass: Option<PassSelection>,
    },

    /// Dump the program model as JSON
    Model { input: PathBuf },

    /// Check that a file parses into a program model
    Validate { input: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose > 0 { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Analyze {
            path,
            pass,
            threshold,
            budget,
            config,
            format,
            patch,
            output,
            no_color,
        } => {
            let overrides = CliOverrides {
                pass,
                severity_threshold: threshold,
                compute_budget: budget,
                generate_patch: patch.then_some(true),
            };
            let emitter = EmitterConfig {
                use_colors: !no_color && output.is_none(),
                verbosity: VerbosityLevel::from_occurrences(cli.verbose),
                include_patch: patch,
                ..EmitterConfig::default()
            };
            cmd_analyze(path, config, overrides, format, emitter, output)
        }
        Commands::Patch { input, output, config } => cmd_patch(input, output, config),
        Commands::Rules { pass } => cmd_rules(pass),
        Commands::Model { input } => cmd_model(input),
        Commands::Validate { input } => cmd_validate(input, cli.verbose > 0),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            use colored::*;
            eprintln!("{} {:#}", "error:".bright_red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// `--config` wins; otherwise `warden.toml` in the working directory if present.
fn load_config(config: Option<PathBuf>, overrides: &CliOverrides) -> Result<AnalysisConfig> {
    let path = config.or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.is_file().then_some(default)
    });
    Ok(AnalysisConfig::load(path.as_deref(), Some(overrides))?)
}

fn source_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(path).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
        let is_rust = entry.path().extension().map(|e| e == "rs").unwrap_or(false);
        if entry.file_type().is_file() && is_rust {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn cmd_analyze(
    path: PathBuf,
    config: Option<PathBuf>,
    overrides: CliOverrides,
    format: OutputFormat,
    emitter_config: EmitterConfig,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    use colored::*;

    let config = load_config(config, &overrides)?;
    let files = source_files(&path)?;
    if files.is_empty() {
        eprintln!("{}", format!("No Rust sources found under {}", path.display()).yellow());
        return Ok(ExitCode::SUCCESS);
    }

    let mut reports: Vec<AnalysisReport> = Vec::with_capacity(files.len());
    let mut parse_failures = 0usize;
    for file in &files {
        let source = read_source(file)?;
        let name = file.display().to_string();
        match warden::analyze_named(&source, Some(&name), &config) {
            Ok(analysis) => reports.push(analysis.report()),
            Err(e) => {
                parse_failures += 1;
                eprintln!("{} {}: {}", "PARSE ERROR".bright_red().bold(), name, e);
            }
        }
    }

    let rendered = match format {
        OutputFormat::Json if reports.len() == 1 && files.len() == 1 => reports[0].to_json()?,
        OutputFormat::Json => serde_json::to_string_pretty(&reports)?,
        _ => {
            let emitter = ReportEmitter::new(format, emitter_config);
            let mut parts = Vec::with_capacity(reports.len());
            for report in &reports {
                parts.push(emitter.render(report)?);
            }
            parts.join("\n")
        }
    };

    match output {
        Some(output_path) => {
            std::fs::write(&output_path, &rendered)
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
            eprintln!(
                " {} Report for {} file(s) saved to: {}",
                "SUCCESS:".bright_green().bold(),
                reports.len(),
                output_path.display()
            );
        }
        None => print!("{}", rendered),
    }

    if parse_failures > 0 {
        return Ok(ExitCode::from(PARSE_FAILURE));
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_patch(input: PathBuf, output: Option<PathBuf>, config: Option<PathBuf>) -> Result<ExitCode> {
    use colored::*;

    let config = load_config(config, &CliOverrides::default())?;
    let source = read_source(&input)?;
    let patch = match warden::patch_source(&source, &config) {
        Ok(patch) => patch,
        Err(e) => {
            eprintln!("{} {}: {}", "PARSE ERROR".bright_red().bold(), input.display(), e);
            return Ok(ExitCode::from(PARSE_FAILURE));
        }
    };

    for drift in &patch.drift {
        eprintln!("{} {}", "skipped:".yellow(), drift);
    }

    match output {
        Some(output_path) => {
            std::fs::write(&output_path, &patch.code)
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
            eprintln!(
                " {} {} finding(s) resolved, patched source saved to: {}",
                "SUCCESS:".bright_green().bold(),
                patch.resolved.len(),
                output_path.display()
            );
        }
        None => print!("{}", patch.code),
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_rules(pass: Option<PassSelection>) -> Result<ExitCode> {
    use colored::*;

    let passes = pass.unwrap_or_default().passes();
    for analysis_pass in passes {
        println!("{}", format!(" {} pass", analysis_pass).bright_cyan().bold());
        println!("{}", "=".repeat(60).bright_cyan());
        for rule in warden::core::analysis::rules_for(analysis_pass) {
            println!(
                "  {:<30} {:<9} {}",
                rule.id,
                rule.severity.as_str(),
                rule.title
            );
        }
        println!();
    }

    if pass.map(|p| p == PassSelection::All).unwrap_or(true) {
        println!("{}", " correlation rules".bright_cyan().bold());
        println!("{}", "=".repeat(60).bright_cyan());
        for id in warden::CorrelationEngine::new().rule_ids() {
            println!("  {}", id);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_model(input: PathBuf) -> Result<ExitCode> {
    use colored::*;

    let source = read_source(&input)?;
    let name = input.display().to_string();
    match warden::build_model(&source, Some(&name)) {
        Ok(model) => {
            println!("{}", serde_json::to_string_pretty(&model)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{} {}: {}", "PARSE ERROR".bright_red().bold(), name, e);
            Ok(ExitCode::from(PARSE_FAILURE))
        }
    }
}

fn cmd_validate(input: PathBuf, verbose: bool) -> Result<ExitCode> {
    use colored::*;

    let source = read_source(&input)?;
    match warden::build_model(&source, input.to_str()) {
        Ok(model) => {
            println!("{}", " VALID".bright_green().bold());
            if verbose {
                println!("   Instructions: {}", model.instructions().len());
                println!("   Accounts: {}", model.accounts().len());
                println!("   CPI edges: {}", model.cpi_edges().len());
                println!("   PDA derivations: {}", model.pda_derivations().len());
                println!("   Arithmetic sites: {}", model.arithmetic_sites().len());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("{}", " INVALID".bright_red().bold());
            println!("\n{}", "Parse Error:".bright_red());
            println!("{}", e);
            Ok(ExitCode::from(PARSE_FAILURE))
        }
    }
}
