//! Tempo map and quarter-note/millisecond conversion.

use crate::model::{fraction_to_f64, Fraction, Score};
use std::collections::BTreeMap;

/// Convert a quarter-note span to milliseconds at a fixed tempo.
///
/// One quarter note lasts `60000 / bpm` ms.
pub fn quarter_notes_to_ms(quarter_notes: Fraction, bpm: f64) -> f64 {
    fraction_to_f64(quarter_notes) * 60000.0 / bpm
}

/// Convert milliseconds back to quarter notes at a fixed tempo.
///
/// The result is the closest simple fraction to the exact float value, so
/// `ms_to_quarter_notes(quarter_notes_to_ms(q, bpm), bpm)` recovers `q` for
/// the durations notation actually uses.
pub fn ms_to_quarter_notes(milliseconds: f64, bpm: f64) -> Fraction {
    let quarter_notes = milliseconds * bpm / 60000.0;
    Fraction::approximate_float(quarter_notes).unwrap_or_else(|| Fraction::from_integer(0))
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TempoSegment {
    start: Fraction,
    bpm: f64,
    /// Milliseconds elapsed before `start`
    offset_ms: f64,
}

/// Piecewise-constant tempo over score time.
///
/// Millisecond positions are integrated segment by segment, so a tempo change
/// only affects time after it and `to_ms` is monotonic.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    segments: Vec<TempoSegment>,
}

impl TempoMap {
    pub fn constant(bpm: f64) -> Self {
        Self::from_changes(bpm, std::iter::empty())
    }

    /// Build a map from an initial tempo and `(time, bpm)` changes.
    ///
    /// Changes are applied in time order. A change to the tempo already in
    /// effect is ignored, as is any non-positive or non-finite tempo. A change
    /// at time 0 replaces the initial tempo.
    pub fn from_changes(initial_bpm: f64, changes: impl IntoIterator<Item = (Fraction, f64)>) -> Self {
        let zero = Fraction::from_integer(0);
        let initial_bpm = if is_valid_tempo(initial_bpm) { initial_bpm } else { 120.0 };

        let mut ordered: Vec<(Fraction, f64)> = changes
            .into_iter()
            .filter(|&(_, bpm)| is_valid_tempo(bpm))
            .collect();
        ordered.sort_by_key(|&(time, _)| time);

        let mut points: Vec<(Fraction, f64)> = vec![(zero, initial_bpm)];
        for (time, bpm) in ordered {
            let time = time.max(zero);
            let Some(last) = points.last_mut() else {
                break;
            };
            if time == last.0 {
                last.1 = bpm;
            } else if last.1 != bpm {
                points.push((time, bpm));
            }
        }
        // Replacing a tempo in place can leave two equal neighbours
        points.dedup_by(|next, prev| next.1 == prev.1);

        let mut segments = Vec::with_capacity(points.len());
        let mut offset_ms = 0.0;
        let mut previous: Option<(Fraction, f64)> = None;
        for (start, bpm) in points {
            if let Some((prev_start, prev_bpm)) = previous {
                offset_ms += quarter_notes_to_ms(start - prev_start, prev_bpm);
            }
            segments.push(TempoSegment {
                start,
                bpm,
                offset_ms,
            });
            previous = Some((start, bpm));
        }

        Self { segments }
    }

    /// Tempo map of a score.
    ///
    /// Starts at the score's tempo. A measure whose tempo differs from the
    /// previous measure of the same part adds a change at the measure's start
    /// time. When parts disagree at the same time, the first part wins.
    pub fn from_score(score: &Score) -> Self {
        let mut changes: BTreeMap<Fraction, f64> = BTreeMap::new();

        for part in &score.parts {
            let mut previous: Option<f64> = None;
            for measure in &part.measures {
                if let Some(bpm) = previous {
                    if measure.tempo_bpm != bpm {
                        changes.entry(measure.start_time).or_insert(measure.tempo_bpm);
                    }
                }
                previous = Some(measure.tempo_bpm);
            }
        }

        Self::from_changes(score.tempo_bpm, changes)
    }

    fn segment_at(&self, time: Fraction) -> TempoSegment {
        let index = self.segments.partition_point(|s| s.start <= time);
        self.segments[index.saturating_sub(1)]
    }

    /// Tempo in effect at `time`.
    pub fn tempo_at(&self, time: Fraction) -> f64 {
        self.segment_at(time).bpm
    }

    /// Milliseconds from the start of the score to `time`.
    pub fn to_ms(&self, time: Fraction) -> f64 {
        let segment = self.segment_at(time);
        segment.offset_ms + quarter_notes_to_ms(time - segment.start, segment.bpm)
    }

    /// Every tempo in effect, as `(time, bpm)`, starting with the initial one.
    pub fn changes(&self) -> impl Iterator<Item = (Fraction, f64)> + '_ {
        self.segments.iter().map(|s| (s.start, s.bpm))
    }
}

fn is_valid_tempo(bpm: f64) -> bool {
    bpm.is_finite() && bpm > 0.0
}
