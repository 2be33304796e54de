pub mod api;
pub mod archive;
pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod playback;
pub mod repeats;
pub mod summary;

pub use api::{load_score, performance, performance_from_str, summarize};
pub use archive::load_document;
pub use config::{Config, ParseOptions, ProjectorOptions};
pub use error::{Diagnostics, ScoreError};
pub use model::*;
pub use parser::{parse_file, parse_file_with, parse_str, parse_str_with};
pub use playback::{display_mapping, playback_events, playback_ms, PlaybackEvent, TimedNote};
pub use repeats::{analyze, expand, expand_part, expand_score, Section};
pub use summary::ScoreSummary;
