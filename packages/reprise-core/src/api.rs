//! # Public API
//!
//! High-level entry points that run the whole pipeline in one call.
//!
//! ## Pipeline
//! 1. Load the document (plain MusicXML or `.mxl` container)
//! 2. Parse it into a [`Score`] (recoverable problems land in `Score::errors`)
//! 3. Expand repeats and voltas into the performed measure order
//! 4. Project notes onto milliseconds, with display times folded back onto the
//!    written score
//!
//! ## Functions
//! - [`load_score()`] - Steps 1-2 with a [`Config`]
//! - [`performance()`] - Steps 3-4 for an already parsed score
//! - [`performance_from_str()`] - Steps 2-4 from markup
//! - [`summarize()`] - Structural summary, optionally with expansion counts
//!
//! ## Typical Usage
//!
//! ```rust
//! use reprise_core::performance_from_str;
//!
//! let xml = r#"<score-partwise>
//!   <part-list><score-part id="P1"/></part-list>
//!   <part id="P1">
//!     <measure number="1">
//!       <attributes><divisions>2</divisions></attributes>
//!       <note><pitch><step>G</step><octave>4</octave></pitch><duration>8</duration></note>
//!       <barline location="right"><repeat direction="backward"/></barline>
//!     </measure>
//!   </part>
//! </score-partwise>"#;
//!
//! let notes = performance_from_str(xml)?;
//! assert_eq!(notes.len(), 2);
//! assert_eq!(notes[1].iteration, Some(1));
//! # Ok::<(), reprise_core::ScoreError>(())
//! ```

use crate::config::{Config, ParseOptions};
use crate::error::ScoreError;
use crate::model::Score;
use crate::parser::{parse_file_with, parse_str_with};
use crate::playback::{display_mapping, TimedNote};
use crate::repeats::expand_score;
use crate::summary::ScoreSummary;
use std::path::Path;

/// Load and parse a document with the parse section of `config`.
///
/// # Errors
/// Returns [`ScoreError::NotFound`] for a missing path, [`ScoreError::Archive`]
/// for a broken `.mxl` container, and the parser's fatal errors.
pub fn load_score(path: &Path, config: &Config) -> Result<Score, ScoreError> {
    parse_file_with(path, &config.parse)
}

/// Expand a parsed score and time every performed note.
///
/// Each record carries its playback time in the expanded performance and the
/// display time of the same written note, plus the structural iteration.
pub fn performance(score: &Score) -> Vec<TimedNote> {
    let expanded = expand_score(score);
    display_mapping(score, &expanded)
}

/// Parse markup with default options, then [`performance()`].
pub fn performance_from_str(xml: &str) -> Result<Vec<TimedNote>, ScoreError> {
    let score = parse_str_with(xml, &ParseOptions::default())?;
    Ok(performance(&score))
}

/// Summarize a score; with `expand`, add expansion counts and describe the
/// performed (expanded) sequence in the statistics.
///
/// # Example
/// ```rust
/// use reprise_core::{parse_str, summarize};
///
/// let xml = r#"<score-partwise>
///   <work><work-title>Minuet</work-title></work>
///   <part-list><score-part id="P1"/></part-list>
///   <part id="P1">
///     <measure number="1">
///       <attributes><divisions>1</divisions></attributes>
///       <note><pitch><step>D</step><octave>5</octave></pitch><duration>4</duration></note>
///       <barline location="right"><repeat direction="backward"/></barline>
///     </measure>
///   </part>
/// </score-partwise>"#;
///
/// let score = parse_str(xml)?;
/// let summary = summarize(&score, true);
/// assert_eq!(summary.title, "Minuet");
/// assert_eq!(summary.expansion.map(|e| e.expanded_measures), Some(2));
/// # Ok::<(), reprise_core::ScoreError>(())
/// ```
pub fn summarize(score: &Score, expand: bool) -> ScoreSummary {
    let summary = ScoreSummary::from_score(score);
    if expand {
        let expanded = expand_score(score);
        summary.with_expansion(score, &expanded)
    } else {
        summary
    }
}
