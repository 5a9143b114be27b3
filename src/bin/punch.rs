//! Punch CLI - Command-line interface for Punch Flux
//!
//! Commands:
//! - replay: Detect punches in a recorded pose stream (batch mode)
//! - run: Detect punches in pose frames streamed on stdin (streaming mode)
//! - profile: Print the built-in calibration profile or validate one
//! - doctor: Diagnose configuration and profile files

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use punch_flux::adapters::{MoveNetAdapter, NamedJointAdapter, PoseFrameAdapter};
use punch_flux::calibration::CalibrationProfile;
use punch_flux::config::TrackerConfig;
use punch_flux::encoder::{EventEncoder, PunchRecord, RecordBody};
use punch_flux::pipeline::PunchTracker;
use punch_flux::types::Stance;
use punch_flux::{TrackerError, PRODUCER_NAME, PUNCH_FLUX_VERSION};

/// Punch - turn pose keypoint streams into classified punch events
#[derive(Parser)]
#[command(name = "punch")]
#[command(version = PUNCH_FLUX_VERSION)]
#[command(about = "Detect and classify punches from pose keypoints", long_about = None)]
struct Cli {
    /// Log level when RUST_LOG is not set (logs go to stderr)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect punches in a recorded pose stream (batch mode)
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Pose frame layout
        #[arg(long, default_value = "named")]
        frame_format: FrameFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Calibration profile to use instead of built-in thresholds
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Tracker configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Append a session summary record
        #[arg(long)]
        summary: bool,
    },

    /// Detect punches in pose frames streamed on stdin (streaming mode)
    Run {
        /// Pose frame layout
        #[arg(long, default_value = "named")]
        frame_format: FrameFormat,

        /// Calibration profile to use instead of built-in thresholds
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Tracker configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,

        /// Emit a session summary record at end of input
        #[arg(long)]
        summary: bool,
    },

    /// Print the built-in calibration profile, or validate a profile file
    Profile {
        /// Profile file to validate
        #[arg(long)]
        validate: Option<PathBuf>,

        /// Stance for the printed built-in profile
        #[arg(long, value_enum, default_value = "orthodox")]
        stance: StanceArg,
    },

    /// Diagnose configuration and profile files
    Doctor {
        /// Check a calibration profile file
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Check a tracker configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FrameFormat {
    /// Keypoints keyed by joint name
    Named,
    /// MoveNet 17-keypoint [y, x, score] arrays
    Movenet,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum StanceArg {
    Orthodox,
    Southpaw,
}

impl From<StanceArg> for Stance {
    fn from(stance: StanceArg) -> Self {
        match stance {
            StanceArg::Orthodox => Stance::Orthodox,
            StanceArg::Southpaw => Stance::Southpaw,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), PunchCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            frame_format,
            output_format,
            profile,
            config,
            summary,
        } => cmd_replay(
            &input,
            &output,
            frame_format,
            output_format,
            profile.as_deref(),
            config.as_deref(),
            summary,
        ),

        Commands::Run {
            frame_format,
            profile,
            config,
            flush,
            summary,
        } => cmd_run(frame_format, profile.as_deref(), config.as_deref(), flush, summary),

        Commands::Profile { validate, stance } => cmd_profile(validate.as_deref(), stance),

        Commands::Doctor {
            profile,
            config,
            json,
        } => cmd_doctor(profile.as_deref(), config.as_deref(), json),
    }
}

fn adapter_for(format: FrameFormat) -> Box<dyn PoseFrameAdapter> {
    match format {
        FrameFormat::Named => Box::new(NamedJointAdapter),
        FrameFormat::Movenet => Box::new(MoveNetAdapter),
    }
}

/// Build a tracker from optional config and profile files and start a session
fn build_tracker(
    profile: Option<&Path>,
    config: Option<&Path>,
) -> Result<PunchTracker, PunchCliError> {
    let mut tracker = match config {
        Some(path) => PunchTracker::with_config(TrackerConfig::from_json(&fs::read_to_string(path)?)?)?,
        None => PunchTracker::new(),
    };
    if let Some(path) = profile {
        tracker.load_profile(&fs::read_to_string(path)?)?;
    }
    tracker.start_session()?;
    Ok(tracker)
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    frame_format: FrameFormat,
    output_format: OutputFormat,
    profile: Option<&Path>,
    config: Option<&Path>,
    summary: bool,
) -> Result<(), PunchCliError> {
    // Read input
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let frames = adapter_for(frame_format).parse_ndjson(&input_data)?;
    if frames.is_empty() {
        return Err(PunchCliError::NoFrames);
    }
    debug!(frames = frames.len(), "parsed input");

    let mut tracker = build_tracker(profile, config)?;
    let encoder = EventEncoder::new();

    let mut records: Vec<PunchRecord> = tracker
        .process_frames(&frames)?
        .iter()
        .map(|event| encoder.encode_event(event))
        .collect();

    if summary {
        records.push(encoder.encode_summary(&tracker.stop_session()?));
    }
    info!(records = records.len(), "replay complete");

    let output_data = format_output(&records, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(
    frame_format: FrameFormat,
    profile: Option<&Path>,
    config: Option<&Path>,
    flush: bool,
    summary: bool,
) -> Result<(), PunchCliError> {
    let adapter = adapter_for(frame_format);
    let mut tracker = build_tracker(profile, config)?;
    let encoder = EventEncoder::new();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for (idx, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let frame = adapter.parse_frame(trimmed).map_err(|e| {
            PunchCliError::ParseError(format!("line {}: {}", idx + 1, e))
        })?;

        for event in tracker.process_frame(&frame)? {
            writeln!(stdout, "{}", encoder.to_json_line(RecordBody::Punch(event))?)?;
            if flush {
                stdout.flush()?;
            }
        }
    }

    if summary {
        let summary = tracker.stop_session()?;
        writeln!(stdout, "{}", encoder.to_json_line(RecordBody::Summary(summary))?)?;
    }
    stdout.flush()?;

    Ok(())
}

fn cmd_profile(validate: Option<&Path>, stance: StanceArg) -> Result<(), PunchCliError> {
    match validate {
        Some(path) => {
            let profile = CalibrationProfile::from_json(&fs::read_to_string(path)?)?;
            println!(
                "Profile valid: {} punch types, stance {:?}, cooldown {} ms",
                profile.thresholds.len(),
                profile.stance,
                profile.cooldown_ms
            );
        }
        None => {
            let mut profile = CalibrationProfile::builtin();
            profile.stance = stance.into();
            println!("{}", profile.to_json()?);
        }
    }
    Ok(())
}

fn cmd_doctor(
    profile: Option<&Path>,
    config: Option<&Path>,
    json: bool,
) -> Result<(), PunchCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Punch Flux version {}", PUNCH_FLUX_VERSION),
    });

    if let Some(path) = profile {
        checks.push(check_file("profile", path, |content| {
            CalibrationProfile::from_json(content).map(|p| {
                format!(
                    "Profile valid ({} punch types, {})",
                    p.thresholds.len(),
                    if p.calibrated_at.is_some() { "calibrated" } else { "uncalibrated" }
                )
            })
        }));
    }

    if let Some(path) = config {
        checks.push(check_file("config", path, |content| {
            TrackerConfig::from_json(content)
                .map(|c| format!("Config valid (onset {:.2} units/s)", c.effective_onset()))
        }));
    }

    // Check stdin is available (for streaming mode)
    let stdin_message = if atty::is(atty::Stream::Stdin) {
        "stdin is a TTY (interactive mode)"
    } else {
        "stdin is a pipe (streaming mode ready)"
    };
    checks.push(DoctorCheck {
        name: "stdin".to_string(),
        status: CheckStatus::Ok,
        message: stdin_message.to_string(),
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: PUNCH_FLUX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Punch Doctor Report");
        println!("===================");
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
        Err(PunchCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_file(
    name: &str,
    path: &Path,
    validate: impl Fn(&str) -> Result<String, TrackerError>,
) -> DoctorCheck {
    let (status, message) = if !path.exists() {
        (CheckStatus::Warning, format!("{} file does not exist", name))
    } else {
        match fs::read_to_string(path) {
            Ok(content) => match validate(&content) {
                Ok(message) => (CheckStatus::Ok, message),
                Err(e) => (CheckStatus::Error, e.to_string()),
            },
            Err(e) => (CheckStatus::Error, format!("Cannot read {} file: {}", name, e)),
        }
    };
    DoctorCheck {
        name: name.to_string(),
        status,
        message,
    }
}

fn format_output(records: &[PunchRecord], format: &OutputFormat) -> Result<String, PunchCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut out = String::new();
            for record in records {
                out.push_str(&serde_json::to_string(record)?);
                out.push('\n');
            }
            Ok(out)
        }
        OutputFormat::Json => Ok(serde_json::to_string(records)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)?),
    }
}

// Error types

#[derive(Debug)]
enum PunchCliError {
    Io(io::Error),
    Tracker(TrackerError),
    Json(serde_json::Error),
    NoFrames,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for PunchCliError {
    fn from(e: io::Error) -> Self {
        PunchCliError::Io(e)
    }
}

impl From<TrackerError> for PunchCliError {
    fn from(e: TrackerError) -> Self {
        PunchCliError::Tracker(e)
    }
}

impl From<serde_json::Error> for PunchCliError {
    fn from(e: serde_json::Error) -> Self {
        PunchCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PunchCliError> for CliError {
    fn from(e: PunchCliError) -> Self {
        match e {
            PunchCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PunchCliError::Tracker(e) => {
                let (code, hint) = match &e {
                    TrackerError::NonMonotonicTimestamp { .. } | TrackerError::InvalidTimestamp(_) => {
                        ("TIMESTAMP_ERROR", "Frames must carry strictly increasing timestamps")
                    }
                    TrackerError::InvalidProfile(_) => {
                        ("PROFILE_ERROR", "Run 'punch profile --validate <file>' for details")
                    }
                    TrackerError::InvalidConfig(_) => ("CONFIG_ERROR", "Check the tracker configuration file"),
                    _ => ("PARSE_ERROR", "Check --frame-format matches the input"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            PunchCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PunchCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No pose frames found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            PunchCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            PunchCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check --frame-format matches the input".to_string()),
            },
        }
    }
}

// Report types

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
