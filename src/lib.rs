pub mod error;
pub mod logger;
pub mod report;

pub use error::CliError;
pub use report::{Format, Report, ReportOptions};

use reprise_core::{load_score, Config};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

pub const USAGE: &str = "\
Usage: reprise [options] <document.musicxml|document.mxl>

Options:
  --no-expand        Report the score as written, without repeat expansion
  --format FORMAT    Output format: yaml (default), json or text
  --config FILE      Read parse and projector defaults from a YAML file
  --notes            Include every timed note
  --events           Include the playback event stream
  --merge-ties       Collapse tied chains into one note_on/note_off pair
  -v, --verbose      Log debug messages to stderr
  -q, --quiet        Only log errors
  -h, --help         Show this message";

#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    pub input: PathBuf,
    pub expand: bool,
    pub verbosity: LevelFilter,
    pub format: Format,
    pub config: Option<PathBuf>,
    pub notes: bool,
    pub events: bool,
    pub merge_ties: bool,
    pub help: bool,
}

/// Parse command-line arguments (without the program name).
pub fn parse_args(args: &[String]) -> Result<Args, CliError> {
    let mut input = None;
    let mut parsed = Args {
        input: PathBuf::new(),
        expand: true,
        verbosity: LevelFilter::WARN,
        format: Format::Yaml,
        config: None,
        notes: false,
        events: false,
        merge_ties: false,
        help: false,
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => parsed.help = true,
            "--no-expand" => parsed.expand = false,
            "-v" | "--verbose" => parsed.verbosity = LevelFilter::DEBUG,
            "-q" | "--quiet" => parsed.verbosity = LevelFilter::ERROR,
            "--notes" => parsed.notes = true,
            "--events" => parsed.events = true,
            "--merge-ties" => parsed.merge_ties = true,
            "--format" => {
                let value = iter
                    .next()
                    .ok_or_else(|| CliError::Usage("--format needs a value".to_string()))?;
                parsed.format = Format::parse(value)
                    .ok_or_else(|| CliError::Usage(format!("Unknown format '{}'", value)))?;
            }
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| CliError::Usage("--config needs a file".to_string()))?;
                parsed.config = Some(PathBuf::from(value));
            }
            flag if flag.starts_with('-') && flag.len() > 1 => {
                return Err(CliError::Usage(format!("Unknown option '{}'", flag)));
            }
            path => {
                if input.is_some() {
                    return Err(CliError::Usage(format!("Unexpected argument '{}'", path)));
                }
                input = Some(PathBuf::from(path));
            }
        }
    }

    match input {
        Some(path) => parsed.input = path,
        None if parsed.help => {}
        None => return Err(CliError::Usage("Missing input document".to_string())),
    }
    Ok(parsed)
}

/// Load the document, build the report and render it.
pub fn run(args: &Args) -> Result<String, CliError> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let score = load_score(&args.input, &config)?;
    for error in &score.errors {
        log::warn!("{}", error);
    }

    let options = ReportOptions {
        expand: args.expand,
        notes: args.notes,
        events: args.events,
        merge_ties: args.merge_ties || config.projector.merge_ties,
    };
    Report::build(&score, &options).render(args.format)
}
