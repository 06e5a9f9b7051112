//! Fieldguide CLI - Command-line interface for the interview session engine
//!
//! Commands:
//! - replay: Replay a session script and print the final session state
//! - validate: Validate a session script line by line
//! - catalog: Print the question catalog at a reading level
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use fieldguide::catalog::Catalog;
use fieldguide::contradiction::RuleTable;
use fieldguide::script::{parse_script, validate_script, validate_script_against, ScriptRunner};
use fieldguide::{ReadingLevel, SessionConfig, SessionError, FIELDGUIDE_VERSION, PRODUCER_NAME};

/// Fieldguide - Adaptive interview session engine
#[derive(Parser)]
#[command(name = "fieldguide")]
#[command(version = FIELDGUIDE_VERSION)]
#[command(about = "Replay and inspect adaptive interview sessions", long_about = None)]
struct Cli {
    /// Log filter (e.g. "info", "fieldguide=debug"); defaults to RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a session script and print the final session state
    Replay {
        /// Input script path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Session policy JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Include the audit log in the output
        #[arg(long)]
        include_audit: bool,
    },

    /// Validate a session script
    Validate {
        /// Input script path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Also check answers against the question catalog
        #[arg(long)]
        strict: bool,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the question catalog
    Catalog {
        /// Reading level for prompts
        #[arg(long, default_value = "standard")]
        level: ReadingLevel,

        /// Only print questions from this module
        #[arg(long)]
        module: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a session policy file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (snapshot line, then one audit event per line)
    Ndjson,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), FieldguideCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            output_format,
            config,
            include_audit,
        } => cmd_replay(&input, &output, output_format, config.as_deref(), include_audit),

        Commands::Validate { input, strict, json } => cmd_validate(&input, strict, json),

        Commands::Catalog { level, module, json } => cmd_catalog(level, module.as_deref(), json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn read_input(input: &Path) -> Result<String, FieldguideCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn load_config(path: Option<&Path>) -> Result<SessionConfig, FieldguideCliError> {
    match path {
        Some(path) => Ok(SessionConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(SessionConfig::default()),
    }
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    output_format: OutputFormat,
    config: Option<&Path>,
    include_audit: bool,
) -> Result<(), FieldguideCliError> {
    let config = load_config(config)?;
    let script = read_input(input)?;

    let lines = parse_script(&script)?;
    if lines.is_empty() {
        return Err(FieldguideCliError::NoEvents);
    }

    let mut runner = ScriptRunner::new(config)?;
    for line in &lines {
        runner.apply(line);
    }

    let mut snapshot = runner.session().snapshot();
    tracing::info!(
        events = lines.len(),
        fatigue = snapshot.fatigue,
        audit_events = snapshot.audit.len(),
        "replay complete"
    );

    let audit = std::mem::take(&mut snapshot.audit);
    let output_data = match output_format {
        OutputFormat::Ndjson => {
            let mut out = serde_json::to_string(&snapshot)? + "\n";
            if include_audit {
                for event in &audit {
                    out.push_str(&serde_json::to_string(event)?);
                    out.push('\n');
                }
            }
            out
        }
        OutputFormat::Json | OutputFormat::JsonPretty => {
            if include_audit {
                snapshot.audit = audit;
            }
            if matches!(output_format, OutputFormat::JsonPretty) {
                serde_json::to_string_pretty(&snapshot)? + "\n"
            } else {
                serde_json::to_string(&snapshot)? + "\n"
            }
        }
    };

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_validate(input: &Path, strict: bool, json: bool) -> Result<(), FieldguideCliError> {
    let script = read_input(input)?;
    let (total, issues) = if strict {
        validate_script_against(&script, &Catalog::default())
    } else {
        validate_script(&script)
    };

    let report = ValidationReport {
        total_lines: total,
        valid_lines: total - issues.len(),
        invalid_lines: issues.len(),
        errors: issues
            .into_iter()
            .map(|i| ValidationErrorDetail {
                line: i.line,
                error: i.error,
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total lines:   {}", report.total_lines);
        println!("Valid lines:   {}", report.valid_lines);
        println!("Invalid lines: {}", report.invalid_lines);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Line {}: {}", err.line, err.error);
            }
        }
    }

    if report.invalid_lines > 0 {
        Err(FieldguideCliError::ValidationFailed(report.invalid_lines))
    } else {
        Ok(())
    }
}

fn cmd_catalog(level: ReadingLevel, module: Option<&str>, json: bool) -> Result<(), FieldguideCliError> {
    let catalog = Catalog::default();

    let entries: Vec<CatalogEntry> = catalog
        .questions()
        .iter()
        .filter(|q| module.map_or(true, |m| q.module == m))
        .map(|q| CatalogEntry {
            id: q.id.clone(),
            module: q.module.clone(),
            prompt: q.prompt(level).to_string(),
            options: q.options.clone(),
        })
        .collect();

    if entries.is_empty() {
        if let Some(module) = module {
            return Err(FieldguideCliError::UnknownModule(module.to_string()));
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        println!("Question Catalog ({})", level);
        println!("==========================");
        for entry in &entries {
            println!("  [{}] {}: {}", entry.module, entry.id, entry.prompt);
            if !entry.options.is_empty() {
                println!("      options: {}", entry.options.join(" | "));
            }
        }
    }

    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), FieldguideCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Fieldguide version {}", FIELDGUIDE_VERSION),
    });

    let catalog = Catalog::default();
    checks.push(DoctorCheck {
        name: "catalog".to_string(),
        status: CheckStatus::Ok,
        message: format!(
            "{} questions across {} modules",
            catalog.questions().len(),
            catalog.modules().len()
        ),
    });

    let rules = RuleTable::default();
    checks.push(DoctorCheck {
        name: "rules".to_string(),
        status: CheckStatus::Ok,
        message: format!(
            "{} contradiction rules ({})",
            rules.len(),
            rules.keys().collect::<Vec<_>>().join(", ")
        ),
    });

    // Check policy file if provided
    if let Some(config_path) = config {
        if config_path.exists() {
            match fs::read_to_string(config_path) {
                Ok(content) => match SessionConfig::from_json(&content) {
                    Ok(config) => {
                        checks.push(DoctorCheck {
                            name: "config".to_string(),
                            status: CheckStatus::Ok,
                            message: format!(
                                "Config valid (hesitation {}ms, fatigue threshold {})",
                                config.hesitation_threshold_ms, config.fatigue_threshold
                            ),
                        });
                    }
                    Err(e) => {
                        checks.push(DoctorCheck {
                            name: "config".to_string(),
                            status: CheckStatus::Error,
                            message: e.to_string(),
                        });
                    }
                },
                Err(e) => {
                    checks.push(DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Cannot read config file: {}", e),
                    });
                }
            }
        } else {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist, defaults will be used".to_string(),
            });
        }
    } else {
        checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using default policy".to_string(),
        });
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay from - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FIELDGUIDE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Fieldguide Doctor Report");
        println!("========================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(FieldguideCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum FieldguideCliError {
    Io(io::Error),
    Session(SessionError),
    Json(serde_json::Error),
    NoEvents,
    UnknownModule(String),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for FieldguideCliError {
    fn from(e: io::Error) -> Self {
        FieldguideCliError::Io(e)
    }
}

impl From<SessionError> for FieldguideCliError {
    fn from(e: SessionError) -> Self {
        FieldguideCliError::Session(e)
    }
}

impl From<serde_json::Error> for FieldguideCliError {
    fn from(e: serde_json::Error) -> Self {
        FieldguideCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<FieldguideCliError> for CliError {
    fn from(e: FieldguideCliError) -> Self {
        match e {
            FieldguideCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            FieldguideCliError::Session(e @ SessionError::InvalidScript { .. }) => CliError {
                code: "SCRIPT_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'fieldguide validate' for details".to_string()),
            },
            FieldguideCliError::Session(e @ SessionError::InvalidConfig(_)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'fieldguide doctor --config <file>' to check the policy".to_string()),
            },
            FieldguideCliError::Session(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check input format".to_string()),
            },
            FieldguideCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            FieldguideCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in script".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            FieldguideCliError::UnknownModule(module) => CliError {
                code: "UNKNOWN_MODULE".to_string(),
                message: format!("No questions in module '{}'", module),
                hint: Some("Run 'fieldguide catalog' to list modules".to_string()),
            },
            FieldguideCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} lines failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            FieldguideCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_lines: usize,
    valid_lines: usize,
    invalid_lines: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    line: usize,
    error: String,
}

#[derive(serde::Serialize)]
struct CatalogEntry {
    id: String,
    module: String,
    prompt: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    options: Vec<String>,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
