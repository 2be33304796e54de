//! Repeat structure analysis.
//!
//! A single left-to-right scan classifies a part's measures into ordered
//! [`Section`]s. At most one repeat structure is open at a time.
//!
//! # Rules
//! - If the first backward repeat has no forward repeat at or before it, a
//!   repeat implicitly opens at measure 0.
//! - A forward repeat closes the open structure and opens a new one.
//! - Endings attach to the open structure, keyed by every ending number they
//!   carry. `start` resets the key's measures; `stop`/`discontinue` append.
//! - Endings found after the structure closed attach to the most recent
//!   repeat section. A late `start` reopens that section until its `stop`,
//!   taking in any measures played since it closed. With no earlier repeat,
//!   an ending opens a structure over every measure before it.
//! - A started ending without a stop keeps absorbing unmarked measures.
//! - A backward repeat or a `discontinue` ending closes the open structure.
//! - A backward repeat with nothing open repeats measures 0 through itself.
//! - Measures outside any structure become `Simple` sections.

use crate::model::{EndingType, Measure};
use serde::Serialize;
use std::collections::BTreeMap;

/// One unit of the performance order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Section {
    /// Play one measure once.
    Simple { measure_index: usize },
    /// Play `measures` `repeat_count` times, choosing a volta per pass.
    Repeat {
        measures: Vec<usize>,
        voltas: BTreeMap<u32, Vec<usize>>,
        repeat_count: u32,
    },
}

impl Section {
    pub fn is_repeat(&self) -> bool {
        matches!(self, Section::Repeat { .. })
    }

    /// Every measure index this section references, body and voltas.
    pub fn measure_indices(&self) -> Vec<usize> {
        match self {
            Section::Simple { measure_index } => vec![*measure_index],
            Section::Repeat {
                measures, voltas, ..
            } => {
                let mut all: Vec<usize> = measures
                    .iter()
                    .chain(voltas.values().flatten())
                    .copied()
                    .collect();
                all.sort_unstable();
                all.dedup();
                all
            }
        }
    }
}

/// The structure currently being built.
struct OpenRepeat {
    measures: Vec<usize>,
    voltas: BTreeMap<u32, Vec<usize>>,
    repeat_count: u32,
    /// Ending numbers whose bracket started but has not stopped yet
    open_endings: Vec<u32>,
    /// Reopened by a late volta start; closes at that volta's stop
    reopened: bool,
}

impl OpenRepeat {
    fn new(measures: Vec<usize>) -> Self {
        Self {
            measures,
            voltas: BTreeMap::new(),
            repeat_count: 2,
            open_endings: Vec::new(),
            reopened: false,
        }
    }

    fn reopen(measures: Vec<usize>, voltas: BTreeMap<u32, Vec<usize>>, repeat_count: u32) -> Self {
        Self {
            measures,
            voltas,
            repeat_count,
            open_endings: Vec::new(),
            reopened: true,
        }
    }

    fn attach_ending(&mut self, numbers: &[u32], ending_type: EndingType, index: usize) {
        attach_ending(&mut self.voltas, numbers, ending_type, index);
        match ending_type {
            EndingType::Start => self.open_endings = numbers.to_vec(),
            EndingType::Stop | EndingType::Discontinue => {
                self.open_endings.retain(|n| !numbers.contains(n))
            }
        }
    }

    fn push_measure(&mut self, index: usize, has_ending: bool) {
        if !self.measures.contains(&index) {
            self.measures.push(index);
        }
        if !has_ending {
            for number in &self.open_endings {
                if let Some(range) = self.voltas.get_mut(number) {
                    if range.last() != Some(&index) {
                        range.push(index);
                    }
                }
            }
        }
    }

    fn close(self) -> Section {
        Section::Repeat {
            measures: self.measures,
            voltas: self.voltas,
            repeat_count: self.repeat_count,
        }
    }
}

fn attach_ending(
    voltas: &mut BTreeMap<u32, Vec<usize>>,
    numbers: &[u32],
    ending_type: EndingType,
    index: usize,
) {
    for &number in numbers {
        match ending_type {
            EndingType::Start => {
                voltas.insert(number, vec![index]);
            }
            EndingType::Stop | EndingType::Discontinue => {
                let range = voltas.entry(number).or_default();
                if range.last() != Some(&index) {
                    range.push(index);
                }
            }
        }
    }
}

/// Whether the first backward repeat lacks a forward repeat at or before it.
fn needs_implicit_start(measures: &[Measure]) -> bool {
    match measures.iter().position(|m| m.repeat_end) {
        Some(first_end) => !measures[..=first_end].iter().any(|m| m.repeat_start),
        None => false,
    }
}

/// Remove the run of `Simple` sections at the end of `sections` and return
/// their measure indices in order.
fn take_trailing_simple(sections: &mut Vec<Section>) -> Vec<usize> {
    let mut indices = Vec::new();
    while let Some(Section::Simple { measure_index }) = sections.last() {
        indices.push(*measure_index);
        sections.pop();
    }
    indices.reverse();
    indices
}

/// Classify a part's measures into performance sections.
pub fn analyze(measures: &[Measure]) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut open: Option<OpenRepeat> = None;

    if needs_implicit_start(measures) {
        log::debug!("no forward repeat before the first backward repeat, opening at measure 0");
        open = Some(OpenRepeat::new(Vec::new()));
    }

    for (i, measure) in measures.iter().enumerate() {
        let mut handled = false;

        if measure.repeat_start {
            if let Some(structure) = open.take() {
                sections.push(structure.close());
            }
            open = Some(OpenRepeat::new(Vec::new()));
        }

        let ending = match (measure.ending_numbers.is_empty(), measure.ending_type) {
            (false, Some(ending_type)) => Some((measure.ending_numbers.as_slice(), ending_type)),
            _ => None,
        };

        if let Some((numbers, ending_type)) = ending {
            if open.is_none() {
                match sections.iter().rposition(Section::is_repeat) {
                    Some(last) if ending_type != EndingType::Start => {
                        if let Some(Section::Repeat { voltas, .. }) = sections.get_mut(last) {
                            log::debug!("ending {:?} at measure {} attached to previous repeat", numbers, i);
                            attach_ending(voltas, numbers, ending_type, i);
                            handled = true;
                        }
                    }
                    Some(last) => {
                        let between: Vec<usize> = sections
                            .drain(last + 1..)
                            .filter_map(|section| match section {
                                Section::Simple { measure_index } => Some(measure_index),
                                Section::Repeat { .. } => None,
                            })
                            .collect();
                        if let Some(Section::Repeat {
                            mut measures,
                            voltas,
                            repeat_count,
                        }) = sections.pop()
                        {
                            log::debug!("ending {:?} at measure {} reopens previous repeat", numbers, i);
                            measures.extend(between);
                            open = Some(OpenRepeat::reopen(measures, voltas, repeat_count));
                        }
                    }
                    None => {
                        let body = take_trailing_simple(&mut sections);
                        log::debug!("ending at measure {} with no repeat, repeating {:?}", i, body);
                        open = Some(OpenRepeat::new(body));
                    }
                }
            }
            if let Some(structure) = open.as_mut() {
                structure.attach_ending(numbers, ending_type, i);
            }
        }

        if let Some(structure) = open.as_mut() {
            structure.push_measure(i, ending.is_some());
            handled = true;
        }

        if measure.repeat_end {
            match open.take() {
                Some(mut structure) => {
                    structure.repeat_count = measure.repeat_count;
                    sections.push(structure.close());
                }
                None => {
                    let body: Vec<usize> = (0..=i).collect();
                    log::debug!("backward repeat at measure {} without start, repeating from measure 0", i);
                    let mut structure = OpenRepeat::new(body);
                    structure.repeat_count = measure.repeat_count;
                    sections.push(structure.close());
                    handled = true;
                }
            }
        } else if let Some((_, ending_type)) = ending {
            let closes = match open.as_ref() {
                Some(structure) => {
                    ending_type == EndingType::Discontinue
                        || (structure.reopened && ending_type == EndingType::Stop)
                }
                None => false,
            };
            if closes {
                if let Some(structure) = open.take() {
                    sections.push(structure.close());
                }
            }
        }

        if !handled {
            sections.push(Section::Simple { measure_index: i });
        }
    }

    if let Some(structure) = open.take() {
        sections.push(structure.close());
    }

    log::debug!(
        "{} measures analyzed into {} sections ({} repeats)",
        measures.len(),
        sections.len(),
        sections.iter().filter(|s| s.is_repeat()).count()
    );
    sections
}
