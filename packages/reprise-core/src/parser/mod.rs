//! # Parser Module
//!
//! This module reads MusicXML (`score-partwise`) markup into the [`Score`] model.
//!
//! ## Purpose
//! The parser is the first stage of the pipeline. Everything downstream (repeat
//! expansion, playback timing) relies on the exact per-voice timing it computes.
//!
//! ## Two-Pass Parsing Algorithm
//!
//! The markup is parsed once into a tree; both passes walk that same tree.
//!
//! ### First Pass: Header and Roster (`header`)
//! - Title (`work/work-title`, falling back to `movement-title`)
//! - Composer (`identification/creator[@type="composer"]`)
//! - Part roster from `part-list/score-part` (name, instrument, MIDI info)
//!
//! ### Second Pass: Measure Content (`measures`)
//! Per part, per measure:
//! - Barlines first (`barline`): repeat signs and volta endings
//! - Then children in document order: attributes, directions, notes, backup, forward
//! - A measure-local cursor `m_time` and high-water mark `m_dura` track time
//! - Chord notes reuse the previous regular note's start and never advance time
//! - Durations are exact: `ticks / divisions`
//!
//! ## Error Handling
//! Malformed markup, a non-partwise root and a missing `part-list` are fatal.
//! Everything else is recorded in [`Diagnostics`] and parsing continues with the
//! last good value or a default.
//!
//! ## Example
//! ```rust
//! use reprise_core::parse_str;
//!
//! let xml = r#"<score-partwise>
//!   <part-list><score-part id="P1"><part-name>Piano</part-name></score-part></part-list>
//!   <part id="P1">
//!     <measure number="1">
//!       <attributes><divisions>1</divisions></attributes>
//!       <note><pitch><step>C</step><octave>4</octave></pitch><duration>4</duration></note>
//!     </measure>
//!   </part>
//! </score-partwise>"#;
//!
//! let score = parse_str(xml).unwrap();
//! assert_eq!(score.parts[0].measures[0].notes[0].pitch.as_deref(), Some("C4"));
//! ```
//!
//! ## Related Modules
//! - `model` - Types produced here
//! - `archive` - Supplies markup from plain or compressed files
//! - `repeats` - Consumes the repeat and ending flags set here

mod barline;
mod header;
mod measures;

use crate::archive::load_document;
use crate::config::ParseOptions;
use crate::error::{Diagnostics, ScoreError};
use crate::model::Score;
use roxmltree::{Document, Node, ParsingOptions};
use std::path::Path;
use std::str::FromStr;

/// Parse MusicXML markup with default options.
pub fn parse_str(xml: &str) -> Result<Score, ScoreError> {
    parse_str_with(xml, &ParseOptions::default())
}

/// Parse MusicXML markup.
///
/// # Errors
/// Returns a fatal [`ScoreError`] for unparsable markup, a root other than
/// `score-partwise`, or a missing `part-list`. Recoverable problems are listed
/// in `Score::errors` instead.
pub fn parse_str_with(xml: &str, options: &ParseOptions) -> Result<Score, ScoreError> {
    let parsing = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(xml, parsing)
        .map_err(|e| ScoreError::MalformedDocument(e.to_string()))?;

    let root = doc.root_element();
    if root.tag_name().name() != "score-partwise" {
        return Err(ScoreError::MalformedDocument(format!(
            "expected <score-partwise> root, found <{}>",
            root.tag_name().name()
        )));
    }

    let mut diagnostics = Diagnostics::new();

    // Pass 1
    let header = header::read_header(root, &mut diagnostics)?;
    let mut score = Score {
        title: header.title,
        composer: header.composer,
        tempo_bpm: options.default_tempo,
        time_signature: options.default_time_signature,
        ..Score::default()
    };
    let mut roster = header.parts;

    // Pass 2
    for part_node in children(root, "part") {
        let Some(id) = part_node.attribute("id") else {
            diagnostics.warn("part without id attribute skipped");
            continue;
        };
        let Some(index) = roster.iter().position(|p| p.id == id) else {
            diagnostics.warn(format!("part '{}' not declared in part-list, skipped", id));
            continue;
        };
        let part = &mut roster[index];
        let content = measures::read_part(part_node, options, &mut diagnostics);
        part.measures = content.measures;
        if let Some(staves) = content.staves {
            part.staves = staves;
        }
        log::debug!("part {}: {} measures", part.id, part.measures.len());
    }

    score.parts = roster;
    score.apply_defaults_from_first_measure();

    log::info!(
        "parsed '{}': {} parts, {} diagnostics",
        score.title,
        score.parts.len(),
        diagnostics.len()
    );
    score.errors = diagnostics.into_messages();
    Ok(score)
}

/// Load and parse a `.xml`, `.musicxml` or `.mxl` file.
pub fn parse_file(path: &Path) -> Result<Score, ScoreError> {
    parse_file_with(path, &ParseOptions::default())
}

pub fn parse_file_with(path: &Path, options: &ParseOptions) -> Result<Score, ScoreError> {
    let xml = load_document(path)?;
    parse_str_with(&xml, options)
}

// XML helpers shared by both passes

/// Direct element children with the given tag name.
pub(crate) fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

/// First direct element child with the given tag name.
pub(crate) fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

pub(crate) fn has_child(node: Node, name: &str) -> bool {
    child(node, name).is_some()
}

/// Trimmed text of a direct child, if present and non-empty.
pub(crate) fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Parse a child's text, recording a coercion and returning `None` when unusable.
pub(crate) fn child_value<T: FromStr>(
    node: Node,
    name: &str,
    fallback: impl ToString,
    diagnostics: &mut Diagnostics,
) -> Option<T> {
    let text = child_text(node, name)?;
    match text.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            diagnostics.coercion(name, text, fallback);
            None
        }
    }
}

/// Parse a decimal that MusicXML allows for integer-valued fields (`"2.0"`).
pub(crate) fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
