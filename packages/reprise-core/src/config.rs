//! # Configuration
//!
//! Tunable defaults for parsing and playback, loadable from YAML.
//!
//! ```yaml
//! parse:
//!   default-tempo: 96
//!   default-time-signature: 3/4
//!   keep-grace-notes: false
//! projector:
//!   merge-ties: true
//! ```
//!
//! Every key is optional; missing keys keep the documented defaults.

use crate::error::ScoreError;
use crate::model::TimeSignature;
use serde::Deserialize;
use std::path::Path;

/// Fallback values used while reading a document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOptions {
    pub default_tempo: f64,
    pub default_divisions: u32,
    pub default_time_signature: TimeSignature,
    pub default_repeat_count: u32,
    /// Keep grace notes as zero-length notes instead of dropping them.
    pub keep_grace_notes: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            default_tempo: 120.0,
            default_divisions: 4,
            default_time_signature: TimeSignature::default(),
            default_repeat_count: 2,
            keep_grace_notes: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectorOptions {
    /// Collapse tied chains into one sounding note when generating events.
    pub merge_ties: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub parse: ParseOptions,
    pub projector: ProjectorOptions,
}

/// Raw configuration for YAML deserialization
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
struct RawConfig {
    parse: Option<RawParseOptions>,
    projector: Option<RawProjectorOptions>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
struct RawParseOptions {
    default_tempo: Option<f64>,
    default_divisions: Option<u32>,
    default_time_signature: Option<String>,
    default_repeat_count: Option<u32>,
    keep_grace_notes: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
struct RawProjectorOptions {
    merge_ties: Option<bool>,
}

impl Config {
    /// Parse a YAML configuration document.
    ///
    /// An empty document yields the defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self, ScoreError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| ScoreError::Config(e.to_string()))?;

        let mut config = Config::default();
        if let Some(parse) = raw.parse {
            let defaults = &mut config.parse;
            if let Some(tempo) = parse.default_tempo {
                if !(tempo.is_finite() && tempo > 0.0) {
                    return Err(ScoreError::Config(format!(
                        "default-tempo must be positive, got {}",
                        tempo
                    )));
                }
                defaults.default_tempo = tempo;
            }
            if let Some(divisions) = parse.default_divisions {
                if divisions == 0 {
                    return Err(ScoreError::Config(
                        "default-divisions must be at least 1".to_string(),
                    ));
                }
                defaults.default_divisions = divisions;
            }
            if let Some(ts) = parse.default_time_signature {
                defaults.default_time_signature = TimeSignature::parse(&ts).ok_or_else(|| {
                    ScoreError::Config(format!("Invalid time signature: {}", ts))
                })?;
            }
            if let Some(count) = parse.default_repeat_count {
                defaults.default_repeat_count = count.max(1);
            }
            if let Some(keep) = parse.keep_grace_notes {
                defaults.keep_grace_notes = keep;
            }
        }
        if let Some(projector) = raw.projector {
            if let Some(merge) = projector.merge_ties {
                config.projector.merge_ties = merge;
            }
        }
        Ok(config)
    }

    /// Read a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, ScoreError> {
        if !path.exists() {
            return Err(ScoreError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }
}
