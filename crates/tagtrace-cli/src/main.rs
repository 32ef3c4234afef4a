use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use glob::glob;
use tagtrace_core::{DEFAULT_GENERATED_AT, DeviceProfile, Report};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("TAGTRACE_BUILD_COMMIT"),
    ", ",
    env!("TAGTRACE_BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "tagtrace")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Offline decoder for LTAR laser-tag infrared captures.",
    long_about = None,
    after_help = "Examples:\n  tagtrace decode capture.bits --mode bits -o report.json\n  tagtrace decode capture.edges --mode edges --sample-rate 1000000 --stdout"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode an edge or bit capture and generate a versioned JSON report.
    #[command(
        after_help = "Examples:\n  tagtrace decode capture.bits --mode bits --profile smartdevice -o report.json\n  tagtrace decode capture.edges --mode edges --sample-rate 1000000 --strict --stdout"
    )]
    Decode {
        /// Path to a capture file (one record per line)
        input: PathBuf,

        /// Input stream kind
        #[arg(long, value_enum)]
        mode: ModeArg,

        /// Device timing profile
        #[arg(long, value_enum, default_value_t = ProfileArg::Blaster)]
        profile: ProfileArg,

        /// Capture sample rate in Hz (required for edge input)
        #[arg(long, required_if_eq("mode", "edges"))]
        sample_rate: Option<u32>,

        /// Output report path (JSON)
        #[arg(short = 'o', long, required_unless_present = "stdout")]
        report: Option<PathBuf>,

        /// Write JSON report to stdout
        #[arg(long, conflicts_with = "report")]
        stdout: bool,

        /// Pretty-print JSON output
        #[arg(long, conflicts_with = "compact")]
        pretty: bool,

        /// Compact JSON output (default)
        #[arg(long)]
        compact: bool,

        /// Suppress non-error output
        #[arg(long)]
        quiet: bool,

        /// Exit with a non-zero code if protocol errors were recorded
        #[arg(long)]
        strict: bool,

        /// List recorded protocol errors after decoding
        #[arg(long)]
        list_errors: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Edges,
    Bits,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProfileArg {
    Blaster,
    Smartdevice,
}

impl From<ProfileArg> for DeviceProfile {
    fn from(value: ProfileArg) -> Self {
        match value {
            ProfileArg::Blaster => DeviceProfile::Blaster,
            ProfileArg::Smartdevice => DeviceProfile::SmartDevice,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Decode {
            input,
            mode,
            profile,
            sample_rate,
            report,
            stdout,
            pretty,
            compact,
            quiet,
            strict,
            list_errors,
        } => cmd_decode(
            input,
            mode,
            profile,
            sample_rate,
            report,
            stdout,
            pretty,
            compact,
            quiet,
            strict,
            list_errors,
        ),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(err.to_string(), None)
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_decode(
    input: PathBuf,
    mode: ModeArg,
    profile: ProfileArg,
    sample_rate: Option<u32>,
    report: Option<PathBuf>,
    stdout: bool,
    pretty: bool,
    compact: bool,
    quiet: bool,
    strict: bool,
    list_errors: bool,
) -> Result<(), CliError> {
    let resolved_input = resolve_input_path(&input)?;
    validate_input_file(&resolved_input)?;

    let report_path = if stdout {
        None
    } else {
        Some(report.ok_or_else(|| {
            CliError::new(
                "missing output path",
                Some("use -o/--report or --stdout".to_string()),
            )
        })?)
    };

    let profile = DeviceProfile::from(profile);
    let mut rep = match mode {
        ModeArg::Edges => {
            let sample_rate = sample_rate.ok_or_else(|| {
                CliError::new(
                    "missing sample rate",
                    Some("edge input needs --sample-rate".to_string()),
                )
            })?;
            tagtrace_core::decode_edge_file(&resolved_input, profile, sample_rate)
                .context("edge capture decoding failed")?
        }
        ModeArg::Bits => tagtrace_core::decode_bit_file(&resolved_input, profile)
            .context("bit capture decoding failed")?,
    };
    rep.generated_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| DEFAULT_GENERATED_AT.to_string());

    let json = serialize_report(&rep, pretty, compact)?;

    if let Some(report_path) = report_path {
        if let Some(parent) = report_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory: {}", parent.display())
                })?;
            }
        }
        fs::write(&report_path, json)
            .with_context(|| format!("Failed to write report: {}", report_path.display()))?;
        if !quiet {
            eprintln!("OK: report written -> {}", report_path.display());
        }
    } else {
        print!("{}", json);
    }

    if list_errors && !quiet {
        print_errors(&rep);
    }
    if strict && rep.summary.error_count() > 0 {
        return Err(CliError::new(
            format!("{} protocol errors recorded", rep.summary.error_count()),
            Some("use --list-errors to inspect".to_string()),
        ));
    }
    Ok(())
}

fn serialize_report(rep: &Report, pretty: bool, compact: bool) -> Result<String, CliError> {
    if pretty && compact {
        return Err(CliError::new(
            "cannot use --pretty and --compact together",
            Some("choose one output format".to_string()),
        ));
    }
    if pretty {
        serde_json::to_string_pretty(rep)
            .context("JSON serialization failed")
            .map_err(Into::into)
    } else {
        serde_json::to_string(rep)
            .context("JSON serialization failed")
            .map_err(Into::into)
    }
}

fn print_errors(rep: &Report) {
    eprintln!("Protocol errors:");
    for annotation in rep.annotations.iter().filter(|ann| ann.kind.is_error()) {
        let label = annotation
            .labels
            .first()
            .map(String::as_str)
            .unwrap_or("unlabeled");
        eprintln!("  {}..{} {}", annotation.start, annotation.end, label);
    }
}

fn validate_input_file(input: &PathBuf) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("pass an edge or bit capture file".to_string()),
        ));
    }
    if !input.is_file() {
        return Err(CliError::new(
            format!("input is not a file: {}", input.display()),
            Some("pass an edge or bit capture file".to_string()),
        ));
    }
    Ok(())
}

fn resolve_input_path(input: &PathBuf) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.clone());
    }

    let mut matches = Vec::new();
    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    if matches.is_empty() {
        return Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some("check the path or quote the pattern".to_string()),
        ));
    }
    if matches.len() > 1 {
        return Err(CliError::new(
            format!(
                "multiple files match pattern '{}' ({} matches)",
                pattern,
                matches.len()
            ),
            Some("pass a single capture file, or run once per file".to_string()),
        ));
    }

    Ok(matches.remove(0))
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
