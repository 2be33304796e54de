//! Display-time mapping between an expanded score and its original.
//!
//! A UI that highlights the written score during playback needs every repeat
//! pass of a measure to point at the same place. Each expanded note therefore
//! borrows the playback time of its counterpart in the unexpanded score.

use super::engine::playback_ms;
use super::types::TimedNote;
use crate::model::{Fraction, Score};
use std::collections::{HashMap, HashSet};

/// One measure of a measure timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
struct MeasureVisit {
    /// Index of the written measure
    source: usize,
    start: Fraction,
    iteration: usize,
}

/// Group a measure timeline into structural iterations.
///
/// Measures are identified by the written measure they were expanded from,
/// or by their own position when they were not expanded. A new iteration
/// begins whenever a written measure already played in the current iteration
/// comes around again (a jump back to a repeat start). A timeline without
/// such a jump is a single iteration.
fn measure_visits(score: &Score) -> Vec<MeasureVisit> {
    let Some(part) = score.parts.first() else {
        return Vec::new();
    };

    let mut visits = Vec::with_capacity(part.measures.len());
    let mut seen: HashSet<usize> = HashSet::new();
    let mut iteration = 0;

    for (position, measure) in part.measures.iter().enumerate() {
        let source = measure.origin.unwrap_or(position);
        if !seen.insert(source) {
            iteration += 1;
            seen.clear();
            seen.insert(source);
        }
        visits.push(MeasureVisit {
            source,
            start: measure.start_time,
            iteration,
        });
    }

    visits
}

/// The measure visit containing `time`.
fn visit_at(visits: &[MeasureVisit], time: Fraction) -> Option<&MeasureVisit> {
    let index = visits.partition_point(|visit| visit.start <= time);
    index.checked_sub(1).and_then(|i| visits.get(i))
}

/// Timed notes of `expanded`, each carrying a display time from `original`.
///
/// Within one iteration, the k-th expanded note of a written measure takes
/// the playback time of the k-th original note of that measure (cycling when
/// an iteration holds more notes than the original measure). Counters restart
/// at each iteration, so every pass over a measure reports the same display
/// times. A note whose measure has no original notes keeps its own playback
/// time.
pub fn display_mapping(original: &Score, expanded: &Score) -> Vec<TimedNote> {
    let original_visits = measure_visits(original);
    let mut original_by_source: HashMap<usize, Vec<f64>> = HashMap::new();
    for note in playback_ms(original) {
        if let Some(visit) = visit_at(&original_visits, note.start_time_quarter_notes) {
            original_by_source
                .entry(visit.source)
                .or_default()
                .push(note.start_time_ms);
        }
    }

    let visits = measure_visits(expanded);
    let mut notes = playback_ms(expanded);

    let mut current_iteration = None;
    let mut pointers: HashMap<usize, usize> = HashMap::new();
    let mut fallbacks = 0usize;

    for note in notes.iter_mut() {
        let visit = visit_at(&visits, note.start_time_quarter_notes);
        let iteration = visit.map(|v| v.iteration).unwrap_or(0);
        if current_iteration != Some(iteration) {
            current_iteration = Some(iteration);
            pointers.clear();
        }

        let times = visit.and_then(|v| Some((v.source, original_by_source.get(&v.source)?)));
        let display_ms = match times {
            Some((source, times)) if !times.is_empty() => {
                let pointer = pointers.entry(source).or_insert(0);
                let time = times[*pointer % times.len()];
                *pointer += 1;
                time
            }
            _ => {
                fallbacks += 1;
                note.start_time_ms
            }
        };

        note.start_time_display_ms = Some(display_ms);
        note.iteration = Some(iteration);
    }

    log::debug!(
        "display mapping: {} notes over {} iterations, {} without an original counterpart",
        notes.len(),
        visits.last().map(|v| v.iteration + 1).unwrap_or(0),
        fallbacks
    );
    notes
}
