use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use clap::{Args, Command, FromArgMatches as _, ValueEnum};
use log::info;

use crate::context::Context;
use crate::error::EpiError;
use crate::infection_manager::{run_infection, ContextInfectionExt, ReplayStatistics};
use crate::infection_report;
use crate::log::{set_log_level, LevelFilter};
use crate::meeting_log::MeetingLog;
use crate::parameters::ContextParametersExt;
use crate::random::ContextRandomExt;
use crate::report::ContextReportExt;
use crate::spatial_engine::run_meetings;

/// Default cli arguments for a simulation run
#[derive(Args, Debug, Clone)]
pub struct BaseArgs {
    /// Random seed
    #[arg(short, long, default_value = "0")]
    pub random_seed: u64,

    /// Path of the JSON model configuration
    #[arg(short, long, default_value = "")]
    pub config: String,

    /// Optional path for report output
    #[arg(short, long, default_value = "")]
    pub output_dir: String,

    /// Optional prefix for output file names
    #[arg(short = 'p', long = "prefix", default_value = "")]
    pub file_prefix: String,

    /// Overwrite existing output files
    #[arg(short, long)]
    pub force_overwrite: bool,

    /// Enable logging at the given level (error, warn, info, debug, trace)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Show a progress bar of simulated time
    #[arg(long)]
    pub progress: bool,
}

/// Which part of the pipeline to run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Phase {
    /// Generate the meeting log only
    Meetings,
    /// Replay an existing meeting log
    Infection,
    /// Generate the meeting log, then replay it
    #[default]
    Both,
}

#[derive(Args, Debug, Clone)]
pub struct PhaseArgs {
    #[arg(long, value_enum, default_value_t = Phase::Both)]
    pub phase: Phase,

    /// Meeting log to write or replay. Defaults to `<output-dir>/<prefix>meetings.jsonl`.
    #[arg(short, long)]
    pub meeting_log: Option<PathBuf>,
}

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub meeting_log_path: PathBuf,
    /// Number of records in the generated or replayed log.
    pub meeting_records: usize,
    pub replay: Option<ReplayStatistics>,
}

fn create_cli() -> Command {
    let cli = Command::new("barracks-epi")
        .about("Simulates disease spread among conscripts and civilians in a garrison town");
    PhaseArgs::augment_args(BaseArgs::augment_args(cli))
}

/// Parses the command line and runs the requested phases.
///
/// # Errors
///
/// Returns an error if arguments, configuration or input files are unusable, or if the replay
/// stops on an invariant violation.
pub fn run() -> Result<RunSummary, EpiError> {
    let matches = create_cli().get_matches();
    let base_args = BaseArgs::from_arg_matches(&matches)
        .map_err(|error| EpiError::ConfigurationError(error.to_string()))?;
    let phase_args = PhaseArgs::from_arg_matches(&matches)
        .map_err(|error| EpiError::ConfigurationError(error.to_string()))?;
    run_with_args(&base_args, &phase_args)
}

fn configure_logging(args: &BaseArgs) -> Result<(), EpiError> {
    if let Some(level) = &args.log_level {
        let level = LevelFilter::from_str(level).map_err(|_| {
            EpiError::ConfigurationError(format!("unknown log level {level}"))
        })?;
        set_log_level(level);
        info!("logging enabled at level {level}");
    }
    Ok(())
}

fn meeting_log_path(args: &BaseArgs, phase_args: &PhaseArgs) -> PathBuf {
    phase_args.meeting_log.clone().unwrap_or_else(|| {
        PathBuf::from(&args.output_dir).join(format!("{}meetings.jsonl", args.file_prefix))
    })
}

/// A fresh context with the configuration loaded, report options applied and the random seed
/// set. Each phase gets its own context so the phases do not share random streams.
fn new_context(args: &BaseArgs) -> Result<Context, EpiError> {
    if args.config.is_empty() {
        return Err(EpiError::ConfigurationError(
            "a configuration file is required (--config)".to_string(),
        ));
    }
    let mut context = Context::new();
    info!("loading parameters from {}", args.config);
    context.init_parameters(Path::new(&args.config))?;

    let report_options = context.report_options();
    if !args.output_dir.is_empty() {
        report_options.directory(PathBuf::from(&args.output_dir));
    }
    report_options
        .file_prefix(args.file_prefix.clone())
        .overwrite(args.force_overwrite);

    context.init_random(args.random_seed);
    Ok(context)
}

#[allow(unused_variables)]
fn start_progress(args: &BaseArgs, context: &Context, label: &str) -> Result<(), EpiError> {
    if args.progress {
        #[cfg(feature = "progress_bar")]
        crate::progress::init_timeline_progress_bar(
            label,
            context.get_parameters()?.duration_seconds(),
        );
        #[cfg(not(feature = "progress_bar"))]
        log::warn!("built without the progress_bar feature; --progress is ignored");
    }
    Ok(())
}

fn finish_progress() {
    #[cfg(feature = "progress_bar")]
    crate::progress::finish_timeline_progress();
}

fn generate_meetings(args: &BaseArgs, path: &Path) -> Result<MeetingLog, EpiError> {
    let mut context = new_context(args)?;
    start_progress(args, &context, "Meetings")?;
    let started = Instant::now();
    let log = run_meetings(&mut context);
    finish_progress();
    let log = log?;
    info!(
        "meeting generation took {}",
        humantime::format_duration(started.elapsed())
    );

    if path.exists() && !args.force_overwrite {
        return Err(EpiError::IoError(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!(
                "meeting log {} already exists; use --force-overwrite to replace it",
                path.display()
            ),
        )));
    }
    log.write_json_lines(path)?;
    Ok(log)
}

fn replay_meetings(args: &BaseArgs, log: MeetingLog) -> Result<ReplayStatistics, EpiError> {
    let mut context = new_context(args)?;
    infection_report::init(&mut context)?;
    start_progress(args, &context, "Infection")?;
    let started = Instant::now();
    let result = run_infection(&mut context, log);
    finish_progress();
    result?;
    info!(
        "infection replay took {}",
        humantime::format_duration(started.elapsed())
    );
    Ok(context.replay_statistics())
}

/// Runs the phases selected by `phase_args`.
///
/// # Errors
///
/// See [`run`].
pub fn run_with_args(args: &BaseArgs, phase_args: &PhaseArgs) -> Result<RunSummary, EpiError> {
    configure_logging(args)?;
    let path = meeting_log_path(args, phase_args);

    let log = match phase_args.phase {
        Phase::Meetings | Phase::Both => generate_meetings(args, &path)?,
        Phase::Infection => MeetingLog::read_json_lines(&path)?,
    };
    let mut summary = RunSummary {
        meeting_log_path: path,
        meeting_records: log.len(),
        replay: None,
    };
    if phase_args.phase != Phase::Meetings {
        summary.replay = Some(replay_meetings(args, log)?);
    }
    Ok(summary)
}
