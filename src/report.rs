//! Report assembly and rendering for the command-line tool.

use crate::error::CliError;
use reprise_core::playback::{display_mapping, playback_events_with, playback_ms};
use reprise_core::summary::PartSummary;
use reprise_core::{expand_score, PlaybackEvent, ProjectorOptions, Score, ScoreSummary, TimedNote};
use serde::Serialize;
use std::fmt::Write;

/// Output format of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
    Text,
}

impl Format {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(Format::Yaml),
            "json" => Some(Format::Json),
            "text" | "txt" => Some(Format::Text),
            _ => None,
        }
    }
}

/// What to put in the report besides the summary.
#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    pub expand: bool,
    pub notes: bool,
    pub events: bool,
    pub merge_ties: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub summary: ScoreSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<TimedNote>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<PlaybackEvent>>,
}

impl Report {
    pub fn build(score: &Score, options: &ReportOptions) -> Self {
        let expanded = options.expand.then(|| expand_score(score));

        let summary = match &expanded {
            Some(expanded) => ScoreSummary::from_score(score).with_expansion(score, expanded),
            None => ScoreSummary::from_score(score),
        };

        let notes = options.notes.then(|| match &expanded {
            Some(expanded) => display_mapping(score, expanded),
            None => playback_ms(score),
        });

        let events = options.events.then(|| {
            let projector = ProjectorOptions {
                merge_ties: options.merge_ties,
            };
            playback_events_with(expanded.as_ref().unwrap_or(score), &projector)
        });

        Self { summary, notes, events }
    }

    pub fn render(&self, format: Format) -> Result<String, CliError> {
        match format {
            Format::Yaml => serde_yaml::to_string(self).map_err(|e| CliError::Render(e.to_string())),
            Format::Json => serde_json::to_string_pretty(self)
                .map(|s| s + "\n")
                .map_err(|e| CliError::Render(e.to_string())),
            Format::Text => self.render_text().map_err(|e| CliError::Render(e.to_string())),
        }
    }

    fn render_text(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        let summary = &self.summary;

        writeln!(out, "Score Information:")?;
        writeln!(out, "   Title: {}", summary.title)?;
        writeln!(out, "   Composer: {}", summary.composer)?;
        writeln!(out, "   Global Tempo: {} BPM", summary.tempo_bpm)?;
        writeln!(out, "   Global Time Signature: {}", summary.time_signature)?;
        writeln!(out, "   Global Key Signature: {} fifths", summary.key_signature)?;
        writeln!(out, "   Parts: {}", summary.parts.len())?;
        if !summary.errors.is_empty() {
            writeln!(out, "   Errors: {}", summary.errors.len())?;
            for error in summary.errors.iter().take(3) {
                writeln!(out, "      - {}", error)?;
            }
            if summary.errors.len() > 3 {
                writeln!(out, "      ... and {} more", summary.errors.len() - 3)?;
            }
        }

        for part in &summary.parts {
            write_part(&mut out, part)?;
        }

        if let Some(expansion) = &summary.expansion {
            writeln!(out, "\nRepeat Expansion:")?;
            writeln!(out, "   Original measures: {}", expansion.original_measures)?;
            writeln!(out, "   Expanded measures: {}", expansion.expanded_measures)?;
            writeln!(out, "   Ratio: {:.2}x", expansion.ratio)?;
            let sequence: Vec<String> = expansion.sequence.iter().map(|n| n.to_string()).collect();
            writeln!(out, "   Sequence: {}", sequence.join(" "))?;
        }

        let stats = &summary.statistics;
        writeln!(out, "\nPlayback:")?;
        writeln!(out, "   Notes: {}", stats.total_notes)?;
        writeln!(out, "   Right Hand (Staff 1): {} notes", stats.right_hand)?;
        writeln!(out, "   Left Hand (Staff 2): {} notes", stats.left_hand)?;
        writeln!(out, "   Tempo changes: {}", stats.tempo_changes)?;
        writeln!(out, "   Note events: {}", stats.note_events)?;
        writeln!(out, "   Length: {} quarter notes, {:.0} ms", stats.duration_quarter_notes, stats.duration_ms)?;

        if let Some(notes) = &self.notes {
            writeln!(out, "\nTimed Notes:")?;
            for (i, note) in notes.iter().enumerate() {
                let pitch = note.pitch.as_deref().unwrap_or("Rest");
                write!(
                    out,
                    "   {:4}. [{:>9.1} ms] {:>4} - {:>7.1} ms - Staff: {} - Measure: {}",
                    i + 1,
                    note.start_time_ms,
                    pitch,
                    note.duration_ms,
                    note.staff,
                    note.measure
                )?;
                if let (Some(display), Some(iteration)) = (note.start_time_display_ms, note.iteration) {
                    write!(out, " - Display: {:.1} ms (pass {})", display, iteration + 1)?;
                }
                writeln!(out)?;
            }
        }

        if let Some(events) = &self.events {
            writeln!(out, "\nEvents:")?;
            for event in events {
                match event {
                    PlaybackEvent::TempoChange { time, tempo } => {
                        writeln!(out, "   {:>8} tempo {} BPM", time.to_string(), tempo)?
                    }
                    PlaybackEvent::NoteOn { time, pitch, staff, measure } => writeln!(
                        out,
                        "   {:>8} on   {:>4} staff {} measure {}",
                        time.to_string(),
                        pitch,
                        staff,
                        measure
                    )?,
                    PlaybackEvent::NoteOff { time, pitch, staff, measure } => writeln!(
                        out,
                        "   {:>8} off  {:>4} staff {} measure {}",
                        time.to_string(),
                        pitch,
                        staff,
                        measure
                    )?,
                }
            }
        }

        Ok(out)
    }
}

fn write_part(out: &mut String, part: &PartSummary) -> std::fmt::Result {
    writeln!(out, "\nPart: {} (ID: {})", part.name, part.id)?;
    writeln!(out, "   Instrument: {}", part.instrument)?;
    writeln!(out, "   Staves: {}", part.staves)?;
    writeln!(out, "   MIDI Channel: {}", part.midi_channel)?;
    writeln!(out, "   Measures: {}", part.measures)?;
    writeln!(out, "   Notes: {}", part.notes)?;
    writeln!(out, "   Rests: {}", part.rests)?;

    writeln!(out, "\n   Repeat Marks:")?;
    if part.repeat_marks.is_empty() {
        writeln!(out, "      none")?;
    }
    for mark in &part.repeat_marks {
        let mut kinds = Vec::new();
        if mark.start {
            kinds.push("start".to_string());
        }
        if let Some(count) = mark.count {
            kinds.push(format!("end x{}", count));
        }
        writeln!(out, "      - Measure {}: {}", mark.measure, kinds.join(", "))?;
    }

    writeln!(out, "   Volta Marks:")?;
    if part.volta_marks.is_empty() {
        writeln!(out, "      none")?;
    }
    for mark in &part.volta_marks {
        let numbers: Vec<String> = mark.numbers.iter().map(|n| n.to_string()).collect();
        writeln!(
            out,
            "      - Measure {}: ending {} ({:?})",
            mark.measure,
            numbers.join(","),
            mark.ending_type
        )?;
    }

    writeln!(out, "   Tempo Changes:")?;
    for change in &part.tempo_changes {
        writeln!(out, "      - Measure {}: {} BPM", change.measure, change.value)?;
    }
    writeln!(out, "   Meter Changes:")?;
    for change in &part.meter_changes {
        writeln!(out, "      - Measure {}: {}", change.measure, change.value)?;
    }
    writeln!(out, "   Key Changes:")?;
    for change in &part.key_changes {
        writeln!(out, "      - Measure {}: {} fifths", change.measure, change.value)?;
    }

    match &part.upbeat {
        Some(upbeat) => writeln!(
            out,
            "   Upbeat: {} of {} quarter notes ({} missing)",
            upbeat.actual, upbeat.expected, upbeat.missing
        ),
        None => writeln!(out, "   Upbeat: none"),
    }
}
