//! Structural summary of a parsed score.
//!
//! Collects what a reader wants to know before playing a file: parts and their
//! note counts, where the repeat signs and volta brackets are, tempo, meter and
//! key changes, whether the piece opens with a pickup measure, and how much the
//! repeats lengthen it.

use crate::model::{serialize_fraction, EndingType, Fraction, Measure, Part, Score};
use crate::playback::{notes_by_hand, playback_events, playback_ms, PlaybackEvent};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepeatMark {
    pub measure: i32,
    pub start: bool,
    pub end: bool,
    /// Passes through the section, only for backward repeats
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoltaMark {
    pub measure: i32,
    pub numbers: Vec<u32>,
    pub ending_type: EndingType,
}

/// A value that takes effect at a measure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change<T> {
    pub measure: i32,
    pub value: T,
}

/// A first measure shorter than its time signature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Upbeat {
    #[serde(serialize_with = "serialize_fraction")]
    pub actual: Fraction,
    #[serde(serialize_with = "serialize_fraction")]
    pub expected: Fraction,
    #[serde(serialize_with = "serialize_fraction")]
    pub missing: Fraction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartSummary {
    pub id: String,
    pub name: String,
    pub instrument: String,
    pub staves: u32,
    pub midi_channel: u8,
    pub midi_program: u8,
    pub measures: usize,
    pub notes: usize,
    pub rests: usize,
    pub repeat_marks: Vec<RepeatMark>,
    pub volta_marks: Vec<VoltaMark>,
    pub tempo_changes: Vec<Change<f64>>,
    pub meter_changes: Vec<Change<String>>,
    pub key_changes: Vec<Change<i8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upbeat: Option<Upbeat>,
}

impl PartSummary {
    pub fn from_part(part: &Part) -> Self {
        let (rests, notes): (Vec<_>, Vec<_>) = part.notes().partition(|n| n.is_rest());

        let repeat_marks = part
            .measures
            .iter()
            .filter(|m| m.repeat_start || m.repeat_end)
            .map(|m| RepeatMark {
                measure: m.number,
                start: m.repeat_start,
                end: m.repeat_end,
                count: m.repeat_end.then_some(m.repeat_count),
            })
            .collect();

        let volta_marks = part
            .measures
            .iter()
            .filter_map(|m| {
                let ending_type = m.ending_type?;
                (!m.ending_numbers.is_empty()).then(|| VoltaMark {
                    measure: m.number,
                    numbers: m.ending_numbers.clone(),
                    ending_type,
                })
            })
            .collect();

        Self {
            id: part.id.clone(),
            name: part.name.clone(),
            instrument: part.instrument.clone(),
            staves: part.staves,
            midi_channel: part.midi_channel,
            midi_program: part.midi_program,
            measures: part.measures.len(),
            notes: notes.len(),
            rests: rests.len(),
            repeat_marks,
            volta_marks,
            tempo_changes: changes(part, |m| m.tempo_bpm),
            meter_changes: changes(part, |m| m.time_signature.to_string()),
            key_changes: changes(part, |m| m.key_signature),
            upbeat: upbeat(part),
        }
    }
}

/// Every measure whose value differs from the previous measure's, starting
/// with the first measure.
fn changes<T: PartialEq>(part: &Part, value: impl Fn(&Measure) -> T) -> Vec<Change<T>> {
    let mut result: Vec<Change<T>> = Vec::new();
    for measure in &part.measures {
        let current = value(measure);
        if result.last().map(|c| c.value != current).unwrap_or(true) {
            result.push(Change {
                measure: measure.number,
                value: current,
            });
        }
    }
    result
}

fn upbeat(part: &Part) -> Option<Upbeat> {
    let first = part.measures.first()?;
    let expected = first.time_signature.measure_duration();
    let actual = first.duration;
    let zero = Fraction::from_integer(0);
    (actual > zero && actual < expected).then(|| Upbeat {
        actual,
        expected,
        missing: expected - actual,
    })
}

/// Measure counts before and after repeat expansion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpansionSummary {
    pub original_measures: usize,
    pub expanded_measures: usize,
    pub ratio: f64,
    /// Measure numbers of the first part in performance order
    pub sequence: Vec<i32>,
}

impl ExpansionSummary {
    pub fn new(original: &Score, expanded: &Score) -> Self {
        let count = |score: &Score| score.parts.iter().map(|p| p.measures.len()).sum::<usize>();
        let original_measures = count(original);
        let expanded_measures = count(expanded);
        let ratio = if original_measures == 0 {
            1.0
        } else {
            expanded_measures as f64 / original_measures as f64
        };
        Self {
            original_measures,
            expanded_measures,
            ratio,
            sequence: expanded
                .parts
                .first()
                .map(|p| p.measures.iter().map(|m| m.number).collect())
                .unwrap_or_default(),
        }
    }
}

/// Counts over the performed note sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackStatistics {
    pub total_notes: usize,
    pub right_hand: usize,
    pub left_hand: usize,
    pub tempo_changes: usize,
    pub note_events: usize,
    #[serde(serialize_with = "serialize_fraction")]
    pub duration_quarter_notes: Fraction,
    pub duration_ms: f64,
}

impl PlaybackStatistics {
    pub fn new(score: &Score) -> Self {
        let hands = notes_by_hand(score);
        let events = playback_events(score);
        let timed = playback_ms(score);

        let tempo_changes = events
            .iter()
            .filter(|e| matches!(e, PlaybackEvent::TempoChange { .. }))
            .count();

        Self {
            total_notes: timed.len(),
            right_hand: hands.right.len(),
            left_hand: hands.left.len(),
            tempo_changes,
            note_events: events.len() - tempo_changes,
            duration_quarter_notes: timed
                .iter()
                .map(|n| n.start_time_quarter_notes + n.duration_quarter_notes)
                .max()
                .unwrap_or_else(|| Fraction::from_integer(0)),
            duration_ms: timed.iter().map(|n| n.end_time_ms).fold(0.0, f64::max),
        }
    }
}

/// Everything `reprise` reports about one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub title: String,
    pub composer: String,
    pub tempo_bpm: f64,
    pub time_signature: String,
    pub key_signature: i8,
    pub errors: Vec<String>,
    pub parts: Vec<PartSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expansion: Option<ExpansionSummary>,
    pub statistics: PlaybackStatistics,
}

impl ScoreSummary {
    /// Summarize a score as written (no repeat expansion).
    pub fn from_score(score: &Score) -> Self {
        Self {
            title: score.title.clone(),
            composer: score.composer.clone(),
            tempo_bpm: score.tempo_bpm,
            time_signature: score.time_signature.to_string(),
            key_signature: score.key_signature,
            errors: score.errors.clone(),
            parts: score.parts.iter().map(PartSummary::from_part).collect(),
            expansion: None,
            statistics: PlaybackStatistics::new(score),
        }
    }

    /// Add expansion counts; statistics then describe the expanded performance.
    pub fn with_expansion(mut self, original: &Score, expanded: &Score) -> Self {
        self.expansion = Some(ExpansionSummary::new(original, expanded));
        self.statistics = PlaybackStatistics::new(expanded);
        self
    }
}
