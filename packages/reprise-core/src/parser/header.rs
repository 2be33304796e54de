//! First pass: score header and part roster.

use super::{child, child_text, children};
use crate::error::{Diagnostics, ScoreError};
use crate::model::Part;
use roxmltree::Node;

pub(super) struct Header {
    pub title: String,
    pub composer: String,
    pub parts: Vec<Part>,
}

pub(super) fn read_header(root: Node, diagnostics: &mut Diagnostics) -> Result<Header, ScoreError> {
    let title = child(root, "work")
        .and_then(|work| child_text(work, "work-title"))
        .or_else(|| child_text(root, "movement-title"))
        .unwrap_or("Untitled")
        .to_string();

    let composer = child(root, "identification")
        .and_then(|ident| {
            children(ident, "creator")
                .find(|c| c.attribute("type") == Some("composer"))
                .and_then(|c| c.text())
                .map(str::trim)
                .filter(|t| !t.is_empty())
        })
        .unwrap_or("Unknown")
        .to_string();

    let part_list = child(root, "part-list").ok_or_else(|| {
        ScoreError::MissingStructure("document has no <part-list>".to_string())
    })?;

    let mut parts = Vec::new();
    for score_part in children(part_list, "score-part") {
        let Some(id) = score_part.attribute("id") else {
            diagnostics.warn("score-part without id attribute skipped");
            continue;
        };
        parts.push(read_score_part(score_part, id, diagnostics));
    }

    log::debug!("header: '{}' by {}, {} parts", title, composer, parts.len());
    Ok(Header {
        title,
        composer,
        parts,
    })
}

fn read_score_part(node: Node, id: &str, diagnostics: &mut Diagnostics) -> Part {
    let mut part = Part::new(id);
    part.name = child_text(node, "part-name")
        .map(str::to_string)
        .unwrap_or_else(|| format!("Part {}", id));

    if let Some(name) = child(node, "score-instrument").and_then(|i| child_text(i, "instrument-name")) {
        part.instrument = name.to_string();
    }

    if let Some(midi) = child(node, "midi-instrument") {
        if let Some(text) = child_text(midi, "midi-channel") {
            match text.parse::<u8>() {
                Ok(channel) if (1..=16).contains(&channel) => part.midi_channel = channel,
                _ => diagnostics.coercion("midi-channel", text, part.midi_channel),
            }
        }
        if let Some(text) = child_text(midi, "midi-program") {
            match text.parse::<u8>() {
                Ok(program) if (1..=128).contains(&program) => part.midi_program = program,
                _ => diagnostics.coercion("midi-program", text, part.midi_program),
            }
        }
    }

    part
}
