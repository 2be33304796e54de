//! Flattening of sections into the performed measure order.

use super::analyzer::{analyze, Section};
use crate::model::{Fraction, Measure, Part, Score};
use std::collections::{BTreeMap, HashMap};

/// Materialize the performed measure sequence.
///
/// Measures are cloned with their repeat and ending markers removed, so
/// expanding the result again yields the same sequence. Each clone records
/// the index of the written measure it came from in `origin`. Indices outside
/// `measures` are skipped. Start times are recomputed with [`retime`].
pub fn expand(sections: &[Section], measures: &[Measure]) -> Vec<Measure> {
    let mut expanded = Vec::new();

    for section in sections {
        match section {
            Section::Simple { measure_index } => push_measure(&mut expanded, measures, *measure_index),
            Section::Repeat {
                measures: body,
                voltas,
                repeat_count,
            } => expand_repeat(&mut expanded, measures, body, voltas, *repeat_count),
        }
    }

    retime(&mut expanded);
    expanded
}

fn expand_repeat(
    expanded: &mut Vec<Measure>,
    measures: &[Measure],
    body: &[usize],
    voltas: &BTreeMap<u32, Vec<usize>>,
    repeat_count: u32,
) {
    let passes = repeat_count.max(1);

    let volta_bounds = voltas
        .values()
        .filter_map(|range| Some((*range.first()?, *range.last()?)))
        .fold(None, |acc: Option<(usize, usize)>, (lo, hi)| match acc {
            Some((min, max)) => Some((min.min(lo), max.max(hi))),
            None => Some((lo, hi)),
        });

    let Some((min_volta, max_volta)) = volta_bounds else {
        for _ in 0..passes {
            for &index in body {
                push_measure(expanded, measures, index);
            }
        }
        return;
    };

    let pre: Vec<usize> = body.iter().copied().filter(|&i| i < min_volta).collect();
    let post: Vec<usize> = body.iter().copied().filter(|&i| i > max_volta).collect();

    for pass in 1..=passes {
        for &index in &pre {
            push_measure(expanded, measures, index);
        }
        if let Some(number) = select_volta(voltas, pass) {
            if let Some(range) = voltas.get(&number) {
                if let (Some(&first), Some(&last)) = (range.first(), range.last()) {
                    for index in first..=last {
                        push_measure(expanded, measures, index);
                    }
                }
            }
            log::debug!("pass {} plays volta {}", pass, number);
        }
        for &index in &post {
            push_measure(expanded, measures, index);
        }
    }
}

/// Pick the ending for a pass: exact match, else the highest number below the
/// pass, else the lowest number available.
pub fn select_volta(voltas: &BTreeMap<u32, Vec<usize>>, pass: u32) -> Option<u32> {
    if voltas.contains_key(&pass) {
        return Some(pass);
    }
    voltas
        .keys()
        .rev()
        .find(|&&number| number <= pass)
        .or_else(|| voltas.keys().next())
        .copied()
}

fn push_measure(expanded: &mut Vec<Measure>, measures: &[Measure], index: usize) {
    match measures.get(index) {
        Some(measure) => {
            let mut copy = measure.clone();
            copy.repeat_start = false;
            copy.repeat_end = false;
            copy.ending_numbers.clear();
            copy.ending_type = None;
            copy.origin = measure.origin.or(Some(index));
            expanded.push(copy);
        }
        None => log::debug!("measure index {} out of range, skipped", index),
    }
}

/// Recompute start times across a linear measure sequence.
///
/// Each measure starts where the previous one ended: the furthest end reached
/// by any (staff, voice), and never earlier than the measure's own duration.
/// Within a measure each voice advances by note duration but never starts a
/// note before its notated offset from the barline, so `forward` gaps survive.
/// Chord notes take the start of the voice's previous regular note.
pub fn retime(measures: &mut [Measure]) {
    let zero = Fraction::from_integer(0);
    let mut boundary = zero;

    for measure in measures.iter_mut() {
        let barline = measure.start_time;
        let start = boundary;
        measure.start_time = start;

        let mut cursors: HashMap<(u32, u32), Fraction> = HashMap::new();
        let mut chord_anchor: HashMap<(u32, u32), Fraction> = HashMap::new();
        let mut end = start + measure.effective_duration();

        for note in measure.notes.iter_mut() {
            let key = (note.staff, note.voice);
            let offset = note.start_time - barline;
            let notated = if offset > zero { start + offset } else { start };
            let cursor = cursors.entry(key).or_insert(start);
            if note.is_chord {
                note.start_time = chord_anchor.get(&key).copied().unwrap_or(*cursor);
            } else {
                let begin = if notated > *cursor { notated } else { *cursor };
                note.start_time = begin;
                chord_anchor.insert(key, begin);
                *cursor = begin + note.duration;
            }
            if *cursor > end {
                end = *cursor;
            }
        }

        boundary = end;
    }
}

/// Expand one part's repeats.
pub fn expand_part(part: &Part) -> Part {
    let sections = analyze(&part.measures);
    let measures = expand(&sections, &part.measures);
    log::debug!(
        "part {}: {} measures expanded to {}",
        part.id,
        part.measures.len(),
        measures.len()
    );
    Part {
        id: part.id.clone(),
        name: part.name.clone(),
        instrument: part.instrument.clone(),
        midi_channel: part.midi_channel,
        midi_program: part.midi_program,
        staves: part.staves,
        measures,
    }
}

/// Expand every part; the original score is left untouched.
pub fn expand_score(score: &Score) -> Score {
    Score {
        title: score.title.clone(),
        composer: score.composer.clone(),
        parts: score.parts.iter().map(expand_part).collect(),
        errors: score.errors.clone(),
        tempo_bpm: score.tempo_bpm,
        time_signature: score.time_signature,
        key_signature: score.key_signature,
    }
}
