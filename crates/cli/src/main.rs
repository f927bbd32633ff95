// Appraise CLI - headless valuation worksheets

mod exit_codes;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use appraise_config::settings::MAX_PASSES_LIMIT;
use appraise_config::{ConfigError, Settings};
use appraise_engine::rules::{lint, LintReport};
use appraise_engine::{EngineOptions, Session, WorksheetInput};
use clap::{Parser, Subcommand};

use exit_codes::{
    config_exit_code, EXIT_ERROR, EXIT_INPUT_PARSE, EXIT_INPUT_READ, EXIT_LINT_FINDINGS, EXIT_NOT_CONVERGED,
    EXIT_SUCCESS, EXIT_USAGE, EXIT_WORKSHEET,
};

#[derive(Parser)]
#[command(name = "appraise")]
#[command(about = "Valuation worksheets (WQS and sale adjustment grid), headless")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Settings file (default: <config dir>/appraise/settings.toml)
    #[arg(long, global = true, env = "APPRAISE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override engine.max_passes from settings
    #[arg(long, global = true, value_name = "N")]
    max_passes: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a worksheet, replay its edits and print the final value block
    #[command(after_help = "\
Examples:
  appraise run worksheet.json
  appraise run worksheet.json --report
  appraise run worksheet.json --max-passes 5")]
    Run {
        /// Worksheet description: {method, template, surveys, property, edits}
        worksheet: PathBuf,

        /// Print the last recalculation report to stderr
        #[arg(long)]
        report: bool,
    },

    /// Check a worksheet's rule set for conflicting writers, cycles and forward reads
    #[command(after_help = "\
Examples:
  appraise lint worksheet.json
  appraise lint worksheet.json --json")]
    Lint {
        /// Worksheet description: {method, template, surveys, property}
        worksheet: PathBuf,

        /// Output findings as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = load_settings(cli.config.as_deref()).and_then(|settings| {
        let options = engine_options(&settings, cli.max_passes)?;
        match cli.command {
            None => {
                eprintln!("Usage: appraise <command> [options]");
                eprintln!("       appraise --help for more information");
                Err(CliError::usage(""))
            }
            Some(Commands::Run { worksheet, report }) => cmd_run(&worksheet, options, report),
            Some(Commands::Lint { worksheet, json }) => cmd_lint(&worksheet, options, json),
        }
    });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Explicit settings files must load cleanly; the default location falls
/// back to defaults with a warning. Logging starts as soon as the level is
/// known.
fn load_settings(path: Option<&Path>) -> Result<Settings, CliError> {
    match path {
        Some(path) => {
            let settings = Settings::load_from(path).map_err(CliError::config)?;
            init_logging(&settings);
            Ok(settings)
        }
        None => {
            let (settings, problem) = Settings::load();
            init_logging(&settings);
            if let Some(e) = problem {
                log::warn!("{}; using default settings", e);
            }
            Ok(settings)
        }
    }
}

/// `--max-passes` is held to the same bounds as `engine.max_passes`.
fn engine_options(settings: &Settings, max_passes: Option<usize>) -> Result<EngineOptions, CliError> {
    let mut options = settings.engine_options();
    if let Some(n) = max_passes {
        if !(1..=MAX_PASSES_LIMIT).contains(&n) {
            return Err(CliError::usage(format!(
                "--max-passes must be between 1 and {}, got {}",
                MAX_PASSES_LIMIT, n
            )));
        }
        options.max_passes = n;
    }
    Ok(options)
}

/// `RUST_LOG` wins over the settings level.
fn init_logging(settings: &Settings) {
    let level = settings.logging.level_filter().unwrap_or(log::LevelFilter::Warn);
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    pub fn config(err: ConfigError) -> Self {
        let code = config_exit_code(&err);
        let hint = match &err {
            ConfigError::MaxPasses(_) => Some(format!("engine.max_passes must be in 1..={}", MAX_PASSES_LIMIT)),
            ConfigError::LogLevel(_) => Some("use error, warn, info, debug, trace or off".to_string()),
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn read_worksheet(path: &Path) -> Result<WorksheetInput, CliError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| CliError::new(EXIT_INPUT_READ, format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| {
        CliError::new(EXIT_INPUT_PARSE, format!("{}: {}", path.display(), e))
            .with_hint("expected {method, template, surveys, property, edits}")
    })
}

fn write_json(value: &serde_json::Value) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::io(e.to_string()))?;
    writeln!(handle, "{}", text).map_err(|e| CliError::io(e.to_string()))
}

// ============================================================================
// run
// ============================================================================

fn cmd_run(path: &Path, options: EngineOptions, report: bool) -> Result<(), CliError> {
    let input = read_worksheet(path)?;
    let session = Session::from_input(input, options).map_err(|e| CliError::new(EXIT_WORKSHEET, e.to_string()))?;

    let finals = serde_json::to_value(session.final_values()).map_err(|e| CliError::io(e.to_string()))?;
    write_json(&finals)?;

    let last = session.last_report();
    if report {
        eprintln!("{}", last.log_line());
        for fallback in &last.fallbacks {
            eprintln!("  fallback {}: {}", fallback.target, fallback.reason);
        }
    }
    if !last.converged {
        return Err(CliError::new(
            EXIT_NOT_CONVERGED,
            format!("engine did not settle within {} passes", options.max_passes),
        )
        .with_hint("raise --max-passes or engine.max_passes"));
    }
    Ok(())
}

// ============================================================================
// lint
// ============================================================================

fn cmd_lint(path: &Path, options: EngineOptions, json: bool) -> Result<(), CliError> {
    let input = read_worksheet(path)?;
    let session = Session::generate(input.method, input.template, input.surveys, input.property, options)
        .map_err(|e| CliError::new(EXIT_WORKSHEET, e.to_string()))?;
    let rules = session.worksheet().rules();
    let report = lint(&rules);
    let clean = report.is_clean(options.max_passes);

    if json {
        write_json(&lint_json(&report, rules.len(), clean))?;
    } else {
        print_lint(&report, rules.len(), options.max_passes);
    }

    if clean {
        Ok(())
    } else {
        Err(CliError::new(EXIT_LINT_FINDINGS, ""))
    }
}

fn lint_json(report: &LintReport, rule_count: usize, clean: bool) -> serde_json::Value {
    serde_json::json!({
        "rules": rule_count,
        "clean": clean,
        "passes_to_settle": report.passes_to_settle,
        "duplicate_targets": report.duplicate_targets.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
        "cycles": report.cycles.iter().map(|c| c.message.clone()).collect::<Vec<_>>(),
        "forward_reads": report
            .forward_reads
            .iter()
            .map(|(reader, read)| serde_json::json!({ "reader": reader, "reads": read }))
            .collect::<Vec<_>>(),
    })
}

fn print_lint(report: &LintReport, rule_count: usize, max_passes: usize) {
    println!("{} rules, settles in {} passes (limit {})", rule_count, report.passes_to_settle, max_passes);
    for dup in &report.duplicate_targets {
        println!("  duplicate: {}", dup);
    }
    for cycle in &report.cycles {
        println!("  cycle:     {}", cycle);
    }
    for (reader, read) in &report.forward_reads {
        println!("  forward:   {} reads {} (declared later)", reader, read);
    }
}
