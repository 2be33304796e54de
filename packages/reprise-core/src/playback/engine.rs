//! Timing projection engine
//!
//! Flattens a score into a time-ordered note sequence and projects it onto
//! milliseconds through the score's tempo map.

use super::tempo::TempoMap;
use super::types::{NotesByHand, PlaybackEvent, TimedNote};
use crate::config::ProjectorOptions;
use crate::model::{Fraction, Note, Score};
use std::collections::HashMap;

/// Every note of every part, ordered by start time.
///
/// The sort is stable: simultaneous notes keep part order, then document order.
pub fn linear_sequence(score: &Score) -> Vec<&Note> {
    let mut notes: Vec<&Note> = score.parts.iter().flat_map(|part| part.notes()).collect();
    notes.sort_by_key(|note| note.start_time);
    notes
}

/// Split the linear sequence by staff (1 = right hand, 2 = left hand).
pub fn notes_by_hand(score: &Score) -> NotesByHand<'_> {
    let (right, left): (Vec<&Note>, Vec<&Note>) = linear_sequence(score)
        .into_iter()
        .filter(|note| note.staff == 1 || note.staff == 2)
        .partition(|note| note.staff == 1);
    NotesByHand { right, left }
}

/// Project every note onto the millisecond timeline.
///
/// # Timing
/// A note's start and end are converted through the score's [`TempoMap`], so a
/// note that spans a tempo change is measured across both tempos and
/// `start_time_ms` never decreases along the sequence. `tempo_bpm` is the tempo
/// in effect at the note's start.
///
/// # Example
/// ```rust
/// use reprise_core::{parse_str, playback::playback_ms};
///
/// let xml = r#"<score-partwise>
///   <part-list><score-part id="P1"/></part-list>
///   <part id="P1"><measure number="1">
///     <attributes><divisions>1</divisions></attributes>
///     <sound tempo="120"/>
///     <note><pitch><step>C</step><octave>4</octave></pitch><duration>2</duration></note>
///     <note><pitch><step>E</step><octave>4</octave></pitch><duration>1</duration></note>
///     <note><pitch><step>G</step><octave>4</octave></pitch><duration>1</duration></note>
///   </measure></part>
/// </score-partwise>"#;
///
/// let score = parse_str(xml).unwrap();
/// let notes = playback_ms(&score);
///
/// let starts: Vec<f64> = notes.iter().map(|n| n.start_time_ms).collect();
/// assert_eq!(starts, vec![0.0, 1000.0, 1500.0]);
/// assert_eq!(notes[2].end_time_ms, 2000.0);
/// ```
pub fn playback_ms(score: &Score) -> Vec<TimedNote> {
    let tempo_map = TempoMap::from_score(score);

    linear_sequence(score)
        .into_iter()
        .map(|note| {
            let start_time_ms = tempo_map.to_ms(note.start_time);
            let end_time_ms = tempo_map.to_ms(note.end_time());
            TimedNote {
                pitch: note.pitch.clone(),
                is_rest: note.is_rest(),
                staff: note.staff,
                voice: note.voice,
                measure: note.measure_number,
                start_time_quarter_notes: note.start_time,
                duration_quarter_notes: note.duration,
                start_time_ms,
                duration_ms: end_time_ms - start_time_ms,
                end_time_ms,
                tempo_bpm: tempo_map.tempo_at(note.start_time),
                tie_start: note.tie_start,
                tie_stop: note.tie_stop,
                start_time_display_ms: None,
                iteration: None,
            }
        })
        .collect()
}

/// Event stream with default options (tied notes sound separately).
pub fn playback_events(score: &Score) -> Vec<PlaybackEvent> {
    playback_events_with(score, &ProjectorOptions::default())
}

/// Sorted event stream: tempo changes, then `note_on`/`note_off` per sounding note.
///
/// The first event is always the initial tempo at time 0. Rests produce no
/// events. With `merge_ties`, a tied chain of the same pitch in the same
/// (staff, voice) produces one `note_on` at the first note and one `note_off`
/// at the end of the last note.
pub fn playback_events_with(score: &Score, options: &ProjectorOptions) -> Vec<PlaybackEvent> {
    let tempo_map = TempoMap::from_score(score);

    let mut events: Vec<PlaybackEvent> = tempo_map
        .changes()
        .map(|(time, tempo)| PlaybackEvent::TempoChange { time, tempo })
        .collect();

    for sounding in sounding_notes(score, options.merge_ties) {
        events.push(PlaybackEvent::NoteOn {
            time: sounding.start,
            pitch: sounding.pitch.clone(),
            staff: sounding.staff,
            measure: sounding.measure,
        });
        events.push(PlaybackEvent::NoteOff {
            time: sounding.end,
            pitch: sounding.pitch,
            staff: sounding.staff,
            measure: sounding.measure,
        });
    }

    events.sort_by_key(|event| event.time());
    events
}

/// A pitched span after optional tie merging.
struct SoundingNote {
    pitch: String,
    staff: u32,
    measure: i32,
    start: Fraction,
    end: Fraction,
}

fn sounding_notes(score: &Score, merge_ties: bool) -> Vec<SoundingNote> {
    let mut sounding: Vec<SoundingNote> = Vec::new();
    // (staff, voice, pitch) -> index of the chain's first note
    let mut pending_tie: HashMap<(u32, u32, String), usize> = HashMap::new();

    for note in linear_sequence(score) {
        let Some(pitch) = note.pitch.as_ref() else {
            continue;
        };

        if merge_ties {
            let key = (note.staff, note.voice, pitch.clone());
            if note.tie_stop {
                if let Some(&index) = pending_tie.get(&key) {
                    sounding[index].end = note.end_time();
                    if !note.tie_start {
                        pending_tie.remove(&key);
                    }
                    continue;
                }
            }
            if note.tie_start {
                pending_tie.insert(key, sounding.len());
            }
        }

        sounding.push(SoundingNote {
            pitch: pitch.clone(),
            staff: note.staff,
            measure: note.measure_number,
            start: note.start_time,
            end: note.end_time(),
        });
    }

    sounding
}
