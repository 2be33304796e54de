//! Playback record definitions
//!
//! Output shapes of the timing projector: per-note timing records, the event
//! stream, and the hand partition.

use crate::model::{serialize_fraction, Fraction, Note};
use serde::Serialize;

/// A note (or rest) placed on the millisecond timeline.
///
/// # Fields
/// - `start_time_quarter_notes` / `duration_quarter_notes`: exact musical time
/// - `start_time_ms` / `duration_ms` / `end_time_ms`: wall-clock time, integrated
///   across every tempo change before the note
/// - `tempo_bpm`: tempo in effect at the note's start
/// - `start_time_display_ms`: playback time of the same note in the unexpanded
///   score, identical for every repeat pass (only set by `display_mapping`)
/// - `iteration`: structural pass this occurrence belongs to (only set by
///   `display_mapping`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedNote {
    pub pitch: Option<String>,
    pub is_rest: bool,
    pub staff: u32,
    pub voice: u32,
    pub measure: i32,
    #[serde(serialize_with = "serialize_fraction")]
    pub start_time_quarter_notes: Fraction,
    #[serde(serialize_with = "serialize_fraction")]
    pub duration_quarter_notes: Fraction,
    pub start_time_ms: f64,
    pub duration_ms: f64,
    pub end_time_ms: f64,
    pub tempo_bpm: f64,
    pub tie_start: bool,
    pub tie_stop: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time_display_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<usize>,
}

/// One entry of the playback event stream. Times are in quarter notes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    TempoChange {
        #[serde(serialize_with = "serialize_fraction")]
        time: Fraction,
        tempo: f64,
    },
    NoteOn {
        #[serde(serialize_with = "serialize_fraction")]
        time: Fraction,
        pitch: String,
        staff: u32,
        measure: i32,
    },
    NoteOff {
        #[serde(serialize_with = "serialize_fraction")]
        time: Fraction,
        pitch: String,
        staff: u32,
        measure: i32,
    },
}

impl PlaybackEvent {
    pub fn time(&self) -> Fraction {
        match self {
            PlaybackEvent::TempoChange { time, .. }
            | PlaybackEvent::NoteOn { time, .. }
            | PlaybackEvent::NoteOff { time, .. } => *time,
        }
    }
}

/// Notes split by staff: staff 1 is the right hand, staff 2 the left.
///
/// Notes on any other staff appear in neither list.
#[derive(Debug, Clone, Serialize)]
pub struct NotesByHand<'a> {
    pub right: Vec<&'a Note>,
    pub left: Vec<&'a Note>,
}
