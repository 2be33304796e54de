//! Second pass: timed measure content for one part.
//!
//! Running attributes (divisions, meter, key, tempo) are sticky across measures.
//! Within a measure, `m_time` is the insertion cursor relative to the barline and
//! `m_dura` the furthest time any voice reached:
//!
//! ```text
//! regular note   start = m_time; m_time += d; m_dura = max(m_dura, m_time)
//! chord note     start = start of the previous regular note
//! backup         m_time = max(0, m_time - d)
//! forward        m_time += d; m_dura = max(m_dura, m_time)
//! ```
//!
//! Note start times are absolute: measure start plus the local cursor.

use super::barline::read_barlines;
use super::{child, child_text, child_value, children, has_child, parse_number};
use crate::config::ParseOptions;
use crate::error::Diagnostics;
use crate::model::{Fraction, Measure, Note, TimeSignature};
use num_traits::{CheckedAdd, CheckedDiv, CheckedSub};
use roxmltree::Node;

/// Bounds that keep exact time arithmetic within `i64`.
const MAX_DIVISIONS: u32 = 1 << 20;
const MAX_BEATS: u32 = 1 << 12;
const MAX_BEAT_TYPE: u32 = 1 << 10;
/// Longest single duration, in quarter notes.
const MAX_DURATION_QUARTERS: i64 = 1 << 16;
const MAX_DURATION_DENOMINATOR: i64 = 1 << 24;

pub(super) struct PartContent {
    pub measures: Vec<Measure>,
    /// Staff count declared in the part's attributes, if any.
    pub staves: Option<u32>,
}

struct PartState {
    divisions: u32,
    time_signature: TimeSignature,
    key_signature: i8,
    tempo_bpm: f64,
    /// Absolute time of the next barline
    time: Fraction,
    last_number: Option<i32>,
    last_octave: i32,
    staves: Option<u32>,
}

impl PartState {
    fn new(options: &ParseOptions) -> Self {
        Self {
            divisions: options.default_divisions.max(1),
            time_signature: options.default_time_signature,
            key_signature: 0,
            tempo_bpm: options.default_tempo,
            time: Fraction::from_integer(0),
            last_number: None,
            last_octave: 4,
            staves: None,
        }
    }

    /// Convert a tick count to quarter notes with the running divisions.
    ///
    /// `None` when the result is too long or too finely divided to time.
    fn ticks_to_quarters(&self, ticks: Fraction) -> Option<Fraction> {
        let quarters = ticks.checked_div(&Fraction::from_integer(i64::from(self.divisions)))?;
        let in_range = quarters <= Fraction::from_integer(MAX_DURATION_QUARTERS)
            && *quarters.denom() <= MAX_DURATION_DENOMINATOR;
        in_range.then_some(quarters)
    }
}

struct MeasureCursor {
    m_time: Fraction,
    m_dura: Fraction,
    last_regular_start: Option<Fraction>,
}

impl MeasureCursor {
    fn new() -> Self {
        Self {
            m_time: Fraction::from_integer(0),
            m_dura: Fraction::from_integer(0),
            last_regular_start: None,
        }
    }

    /// Move the cursor forward; `false` (and no change) if the time overflows.
    fn advance(&mut self, by: Fraction) -> bool {
        let Some(m_time) = self.m_time.checked_add(&by) else {
            return false;
        };
        self.m_time = m_time;
        if self.m_time > self.m_dura {
            self.m_dura = self.m_time;
        }
        true
    }

    fn rewind(&mut self, by: Fraction) {
        let zero = Fraction::from_integer(0);
        self.m_time = self.m_time.checked_sub(&by).filter(|t| *t > zero).unwrap_or(zero);
    }
}

pub(super) fn read_part(
    part: Node,
    options: &ParseOptions,
    diagnostics: &mut Diagnostics,
) -> PartContent {
    let mut state = PartState::new(options);
    let mut measures = Vec::new();

    for node in children(part, "measure") {
        let measure = read_measure(node, &mut state, options, diagnostics);
        let next = state.time.checked_add(&measure.duration);
        measures.push(measure);
        match next {
            Some(time) => state.time = time,
            None => {
                diagnostics.warn("Part too long to time, remaining measures dropped");
                break;
            }
        }
    }

    PartContent {
        measures,
        staves: state.staves,
    }
}

fn read_measure(
    node: Node,
    state: &mut PartState,
    options: &ParseOptions,
    diagnostics: &mut Diagnostics,
) -> Measure {
    let number = measure_number(node, state, diagnostics);
    let mut measure = Measure::new(number);
    measure.time_signature = state.time_signature;
    measure.key_signature = state.key_signature;
    measure.divisions = state.divisions;
    measure.tempo_bpm = state.tempo_bpm;
    measure.repeat_count = options.default_repeat_count;
    measure.start_time = state.time;

    // Barlines first, so repeat detection does not depend on where they sit
    let marks = read_barlines(node, options.default_repeat_count, diagnostics);
    measure.repeat_start = marks.repeat_start;
    measure.repeat_end = marks.repeat_end;
    if let Some(count) = marks.repeat_count {
        measure.repeat_count = count;
    }
    measure.ending_numbers = marks.ending_numbers;
    measure.ending_type = marks.ending_type;

    let mut cursor = MeasureCursor::new();
    for element in node.children().filter(|n| n.is_element()) {
        match element.tag_name().name() {
            "attributes" => read_attributes(element, state, &mut measure, diagnostics),
            "direction" => read_direction(element, state, &mut measure, diagnostics),
            "sound" => read_sound(element, state, &mut measure, diagnostics),
            "note" => {
                if let Some(note) = read_note(element, state, &mut cursor, &measure, options, diagnostics) {
                    measure.notes.push(note);
                }
            }
            "backup" => {
                if let Some(d) = tick_duration(element, state, diagnostics) {
                    cursor.rewind(d);
                }
            }
            "forward" => {
                if let Some(d) = tick_duration(element, state, diagnostics) {
                    if !cursor.advance(d) {
                        diagnostics.warn(format!("<forward> overflows measure {}, ignored", measure.number));
                    }
                }
            }
            _ => {}
        }
    }

    measure.duration = if cursor.m_dura > Fraction::from_integer(0) {
        cursor.m_dura
    } else {
        measure.time_signature.measure_duration()
    };
    measure
}

/// Measure numbers are usually integers; strip suffixes like "12a" and number
/// unlabeled measures after their predecessor.
fn measure_number(node: Node, state: &mut PartState, diagnostics: &mut Diagnostics) -> i32 {
    let next = state.last_number.map(|n| n + 1).unwrap_or(1);
    let number = match node.attribute("number").map(str::trim) {
        Some(text) => match text.parse::<i32>() {
            Ok(n) => n,
            Err(_) => {
                let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
                match digits.parse::<i32>() {
                    Ok(n) => {
                        log::debug!("measure number '{}' read as {}", text, n);
                        n
                    }
                    Err(_) => {
                        diagnostics.coercion("measure number", text, next);
                        next
                    }
                }
            }
        },
        None => {
            diagnostics.coercion("measure number", "", next);
            next
        }
    };
    state.last_number = Some(number);
    number
}

fn read_attributes(
    node: Node,
    state: &mut PartState,
    measure: &mut Measure,
    diagnostics: &mut Diagnostics,
) {
    if let Some(text) = child_text(node, "divisions") {
        match parse_number(text) {
            Some(d) if d >= 1.0 && d <= f64::from(MAX_DIVISIONS) && d.fract() == 0.0 => {
                state.divisions = d as u32;
                measure.divisions = state.divisions;
            }
            _ => diagnostics.coercion("divisions", text, state.divisions),
        }
    }

    if let Some(time) = child(node, "time") {
        if !has_child(time, "senza-misura") {
            let beats = child_text(time, "beats").and_then(parse_beats);
            let beat_type = child_text(time, "beat-type").and_then(|t| t.parse::<u32>().ok());
            match (beats, beat_type) {
                (Some(beats), Some(beat_type))
                    if (1..=MAX_BEATS).contains(&beats) && (1..=MAX_BEAT_TYPE).contains(&beat_type) =>
                {
                    state.time_signature = TimeSignature { beats, beat_type };
                    measure.time_signature = state.time_signature;
                }
                _ => diagnostics.coercion(
                    "time signature",
                    &format!(
                        "{}/{}",
                        child_text(time, "beats").unwrap_or("?"),
                        child_text(time, "beat-type").unwrap_or("?")
                    ),
                    state.time_signature,
                ),
            }
        }
    }

    if let Some(key) = child(node, "key") {
        if let Some(fifths) = child_value::<i8>(key, "fifths", state.key_signature, diagnostics) {
            state.key_signature = fifths;
            measure.key_signature = fifths;
        }
    }

    if let Some(text) = child_text(node, "staves") {
        match text.parse::<u32>() {
            Ok(n) if n > 0 => state.staves = Some(n),
            _ => diagnostics.coercion("staves", text, state.staves.unwrap_or(1)),
        }
    }
}

/// Composite meters like "3+2" count as the sum of their terms.
fn parse_beats(text: &str) -> Option<u32> {
    text.split('+')
        .try_fold(0u32, |sum, term| sum.checked_add(term.trim().parse::<u32>().ok()?))
}

fn read_direction(
    node: Node,
    state: &mut PartState,
    measure: &mut Measure,
    diagnostics: &mut Diagnostics,
) {
    let metronome = children(node, "direction-type").find_map(|dt| child(dt, "metronome"));
    if let Some(metronome) = metronome {
        if let Some(bpm) = metronome_bpm(metronome, diagnostics) {
            set_tempo(bpm, state, measure);
        }
    }
    // A playback tempo on the direction's sound overrides the printed mark
    if let Some(sound) = child(node, "sound") {
        read_sound(sound, state, measure, diagnostics);
    }
}

fn read_sound(node: Node, state: &mut PartState, measure: &mut Measure, diagnostics: &mut Diagnostics) {
    if let Some(text) = node.attribute("tempo") {
        match parse_number(text) {
            Some(bpm) if bpm > 0.0 => set_tempo(bpm, state, measure),
            _ => diagnostics.coercion("tempo", text, state.tempo_bpm),
        }
    }
}

fn set_tempo(bpm: f64, state: &mut PartState, measure: &mut Measure) {
    state.tempo_bpm = bpm;
    measure.tempo_bpm = bpm;
}

/// Quarter-note BPM from a metronome mark such as "dotted quarter = 60".
fn metronome_bpm(metronome: Node, diagnostics: &mut Diagnostics) -> Option<f64> {
    let text = child_text(metronome, "per-minute")?;
    let per_minute = match parse_number(text) {
        Some(v) if v > 0.0 => v,
        _ => {
            diagnostics.coercion("per-minute", text, "previous tempo");
            return None;
        }
    };

    let unit = child_text(metronome, "beat-unit").unwrap_or("quarter");
    let mut quarters = match unit {
        "long" => 16.0,
        "breve" => 8.0,
        "whole" => 4.0,
        "half" => 2.0,
        "quarter" => 1.0,
        "eighth" => 0.5,
        "16th" => 0.25,
        "32nd" => 0.125,
        other => {
            diagnostics.coercion("beat-unit", other, "quarter");
            1.0
        }
    };
    let mut dot_value = quarters;
    for _ in children(metronome, "beat-unit-dot") {
        dot_value /= 2.0;
        quarters += dot_value;
    }
    Some(per_minute * quarters)
}

fn read_note(
    node: Node,
    state: &mut PartState,
    cursor: &mut MeasureCursor,
    measure: &Measure,
    options: &ParseOptions,
    diagnostics: &mut Diagnostics,
) -> Option<Note> {
    let is_grace = has_child(node, "grace");
    if is_grace && !options.keep_grace_notes {
        return None;
    }

    let duration = if is_grace {
        Fraction::from_integer(0)
    } else {
        match child_text(node, "duration") {
            Some(text) => match parse_ticks(text).and_then(|ticks| state.ticks_to_quarters(ticks)) {
                Some(quarters) => quarters,
                None => {
                    diagnostics.warn(format!(
                        "Invalid duration '{}' in measure {}, note dropped",
                        text, measure.number
                    ));
                    return None;
                }
            },
            None => {
                diagnostics.warn(format!(
                    "Note missing duration in measure {}, note dropped",
                    measure.number
                ));
                return None;
            }
        }
    };

    let pitch = if has_child(node, "rest") {
        None
    } else {
        child(node, "pitch").and_then(|p| read_pitch(p, state, diagnostics))
    };

    let staff = positive_field(node, "staff", diagnostics);
    let voice = positive_field(node, "voice", diagnostics);
    let (tie_start, tie_stop) = read_ties(node);
    let is_chord = has_child(node, "chord");

    let local_start = if is_chord {
        cursor.last_regular_start.unwrap_or(cursor.m_time)
    } else if is_grace {
        cursor.m_time
    } else {
        let start = cursor.m_time;
        if !cursor.advance(duration) {
            diagnostics.warn(format!("Note overflows measure {}, note dropped", measure.number));
            return None;
        }
        cursor.last_regular_start = Some(start);
        start
    };

    let Some(start_time) = measure.start_time.checked_add(&local_start) else {
        diagnostics.warn(format!("Note in measure {} starts too late to time, note dropped", measure.number));
        return None;
    };

    Some(
        Note::new(pitch, duration, start_time, measure.number)
            .with_voice(staff, voice)
            .with_chord(is_chord)
            .with_ties(tie_start, tie_stop),
    )
}

/// Spell a pitch as step + accidentals + octave, e.g. `F#5` or `Bb3`.
fn read_pitch(pitch: Node, state: &mut PartState, diagnostics: &mut Diagnostics) -> Option<String> {
    let step = match child_text(pitch, "step") {
        Some(s) if matches!(s, "A" | "B" | "C" | "D" | "E" | "F" | "G") => s,
        other => {
            diagnostics.coercion("pitch step", other.unwrap_or(""), "rest");
            return None;
        }
    };

    let alter = match child_text(pitch, "alter") {
        Some(text) => match parse_number(text) {
            Some(v) if (-3.0..=3.0).contains(&v) => v.trunc() as i32,
            _ => {
                diagnostics.coercion("alter", text, 0);
                0
            }
        },
        None => 0,
    };

    let octave = match child_text(pitch, "octave") {
        Some(text) => match text.parse::<i32>() {
            Ok(o) if (0..=9).contains(&o) => {
                state.last_octave = o;
                o
            }
            _ => {
                diagnostics.coercion("octave", text, state.last_octave);
                state.last_octave
            }
        },
        None => {
            diagnostics.coercion("octave", "", state.last_octave);
            state.last_octave
        }
    };

    let accidentals = if alter > 0 {
        "#".repeat(alter as usize)
    } else {
        "b".repeat(alter.unsigned_abs() as usize)
    };
    Some(format!("{}{}{}", step, accidentals, octave))
}

/// Staff and voice numbers default to 1.
fn positive_field(node: Node, name: &str, diagnostics: &mut Diagnostics) -> u32 {
    match child_text(node, name) {
        Some(text) => match text.parse::<u32>() {
            Ok(n) if n > 0 => n,
            _ => {
                diagnostics.coercion(name, text, 1);
                1
            }
        },
        None => 1,
    }
}

/// Ties from `<tie>` (sound) and `<notations><tied>` (notation).
fn read_ties(node: Node) -> (bool, bool) {
    let mut tie_start = false;
    let mut tie_stop = false;
    let notated = children(node, "notations").flat_map(|n| children(n, "tied"));
    for tie in children(node, "tie").chain(notated) {
        match tie.attribute("type").map(str::trim) {
            Some("start") => tie_start = true,
            Some("stop") => tie_stop = true,
            _ => {}
        }
    }
    (tie_start, tie_stop)
}

/// Durations are tick counts; exporters occasionally write decimals.
fn parse_ticks(text: &str) -> Option<Fraction> {
    if let Ok(ticks) = text.parse::<i64>() {
        return (ticks >= 0).then(|| Fraction::from_integer(ticks));
    }
    let value = parse_number(text).filter(|v| *v >= 0.0)?;
    Fraction::approximate_float(value)
}

fn tick_duration(node: Node, state: &PartState, diagnostics: &mut Diagnostics) -> Option<Fraction> {
    let name = node.tag_name().name();
    let Some(text) = child_text(node, "duration") else {
        diagnostics.warn(format!("<{}> without duration ignored", name));
        return None;
    };
    match parse_ticks(text).and_then(|ticks| state.ticks_to_quarters(ticks)) {
        Some(quarters) => Some(quarters),
        None => {
            diagnostics.coercion(&format!("{} duration", name), text, 0);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    fn read(part_xml: &str) -> (PartContent, Diagnostics) {
        read_with(part_xml, &ParseOptions::default())
    }

    fn read_with(part_xml: &str, options: &ParseOptions) -> (PartContent, Diagnostics) {
        let doc = Document::parse(part_xml).unwrap();
        let mut diagnostics = Diagnostics::new();
        let content = read_part(doc.root_element(), options, &mut diagnostics);
        (content, diagnostics)
    }

    fn q(n: i64, d: i64) -> Fraction {
        Fraction::new(n, d)
    }

    #[test]
    fn test_sequential_notes_and_exact_durations() {
        let (content, diagnostics) = read(
            r#"<part id="P1">
  <measure number="1">
    <attributes><divisions>3</divisions></attributes>
    <note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration></note>
    <note><pitch><step>D</step><octave>4</octave></pitch><duration>1</duration></note>
    <note><pitch><step>E</step><octave>4</octave></pitch><duration>1</duration></note>
    <note><rest/><duration>9</duration></note>
  </measure>
</part>"#,
        );
        assert!(diagnostics.is_empty());
        let notes = &content.measures[0].notes;
        assert_eq!(notes[0].duration, q(1, 3));
        assert_eq!(notes[1].start_time, q(1, 3));
        assert_eq!(notes[2].start_time, q(2, 3));
        assert_eq!(notes[3].start_time, q(1, 1));
        assert!(notes[3].is_rest());
        assert_eq!(content.measures[0].duration, q(4, 1));
    }

    #[test]
    fn test_chord_notes_share_start() {
        let (content, _) = read(
            r#"<part id="P1">
  <measure number="1">
    <attributes><divisions>4</divisions></attributes>
    <note><pitch><step>C</step><octave>4</octave></pitch><duration>16</duration></note>
    <note><chord/><pitch><step>E</step><octave>4</octave></pitch><duration>16</duration></note>
    <note><chord/><pitch><step>G</step><octave>4</octave></pitch><duration>16</duration></note>
  </measure>
</part>"#,
        );
        let measure = &content.measures[0];
        assert!(measure.notes.iter().all(|n| n.start_time == q(0, 1)));
        assert!(measure.notes[1].is_chord && measure.notes[2].is_chord);
        assert_eq!(measure.duration, q(4, 1));
    }

    #[test]
    fn test_backup_and_forward() {
        let (content, _) = read(
            r#"<part id="P1">
  <measure number="1">
    <attributes><divisions>2</divisions><staves>2</staves></attributes>
    <note><pitch><step>G</step><octave>4</octave></pitch><duration>8</duration><voice>1</voice><staff>1</staff></note>
    <backup><duration>8</duration></backup>
    <forward><duration>4</duration></forward>
    <note><pitch><step>C</step><octave>3</octave></pitch><duration>4</duration><voice>2</voice><staff>2</staff></note>
    <backup><duration>20</duration></backup>
    <note><rest/><duration>1</duration><voice>3</voice><staff>2</staff></note>
  </measure>
</part>"#,
        );
        assert_eq!(content.staves, Some(2));
        let notes = &content.measures[0].notes;
        assert_eq!(notes[1].start_time, q(2, 1));
        assert_eq!((notes[1].staff, notes[1].voice), (2, 2));
        // Backup past the barline clamps at zero
        assert_eq!(notes[2].start_time, q(0, 1));
        assert_eq!(content.measures[0].duration, q(4, 1));
    }

    #[test]
    fn test_absolute_start_across_measures() {
        let (content, _) = read(
            r#"<part id="P1">
  <measure number="0">
    <attributes><divisions>1</divisions><time><beats>3</beats><beat-type>4</beat-type></time></attributes>
    <note><pitch><step>E</step><octave>5</octave></pitch><duration>1</duration></note>
  </measure>
  <measure number="1">
    <note><pitch><step>A</step><octave>4</octave></pitch><duration>3</duration></note>
  </measure>
  <measure number="2"/>
  <measure number="3">
    <note><pitch><step>B</step><octave>4</octave></pitch><duration>3</duration></note>
  </measure>
</part>"#,
        );
        let m = &content.measures;
        // Pickup measure lasts only as long as its content
        assert_eq!(m[0].duration, q(1, 1));
        assert_eq!(m[1].start_time, q(1, 1));
        assert_eq!(m[1].notes[0].start_time, q(1, 1));
        // Empty measure falls back to the nominal 3/4 length
        assert_eq!(m[2].duration, q(3, 1));
        assert_eq!(m[3].notes[0].start_time, q(7, 1));
        assert_eq!(m[3].time_signature, TimeSignature { beats: 3, beat_type: 4 });
    }

    #[test]
    fn test_pitch_spelling() {
        let (content, _) = read(
            r#"<part id="P1">
  <measure number="1">
    <note><pitch><step>F</step><alter>1</alter><octave>5</octave></pitch><duration>4</duration></note>
    <note><pitch><step>B</step><alter>-1</alter><octave>3</octave></pitch><duration>4</duration></note>
    <note><pitch><step>C</step><alter>2</alter><octave>4</octave></pitch><duration>4</duration></note>
    <note><pitch><step>E</step><alter>-2</alter><octave>2</octave></pitch><duration>4</duration></note>
  </measure>
</part>"#,
        );
        let pitches: Vec<_> = content.measures[0]
            .notes
            .iter()
            .map(|n| n.pitch.clone().unwrap())
            .collect();
        assert_eq!(pitches, vec!["F#5", "Bb3", "C##4", "Ebb2"]);
    }

    #[test]
    fn test_invalid_fields_fall_back() {
        let (content, diagnostics) = read(
            r#"<part id="P1">
  <measure number="1">
    <attributes><divisions>2</divisions></attributes>
    <note><pitch><step>C</step><octave>5</octave></pitch><duration>2</duration></note>
  </measure>
  <measure number="2">
    <attributes><divisions>zero</divisions></attributes>
    <note><pitch><step>D</step><octave>high</octave></pitch><duration>2</duration><staff>x</staff></note>
    <note><pitch><step>E</step><octave>4</octave></pitch></note>
    <note><pitch><step>F</step><octave>4</octave></pitch><duration>-2</duration></note>
  </measure>
</part>"#,
        );
        let m2 = &content.measures[1];
        assert_eq!(m2.divisions, 2);
        assert_eq!(m2.notes.len(), 1);
        assert_eq!(m2.notes[0].pitch.as_deref(), Some("D5"));
        assert_eq!(m2.notes[0].duration, q(1, 1));
        assert_eq!(m2.notes[0].staff, 1);
        // divisions, octave, staff, missing duration, negative duration
        assert_eq!(diagnostics.len(), 5);
    }

    #[test]
    fn test_sticky_tempo_from_metronome_and_sound() {
        let (content, _) = read(
            r#"<part id="P1">
  <measure number="1">
    <direction><direction-type><metronome><beat-unit>half</beat-unit><per-minute>50</per-minute></metronome></direction-type></direction>
    <note><rest/><duration>16</duration></note>
  </measure>
  <measure number="2">
    <note><rest/><duration>16</duration></note>
  </measure>
  <measure number="3">
    <direction>
      <direction-type><metronome><beat-unit>quarter</beat-unit><beat-unit-dot/><per-minute>40</per-minute></metronome></direction-type>
      <sound tempo="72"/>
    </direction>
    <note><rest/><duration>16</duration></note>
  </measure>
  <measure number="4">
    <direction><direction-type><metronome><beat-unit>quarter</beat-unit><beat-unit-dot/><per-minute>40</per-minute></metronome></direction-type></direction>
    <sound tempo="fast"/>
    <note><rest/><duration>16</duration></note>
  </measure>
</part>"#,
        );
        let tempos: Vec<f64> = content.measures.iter().map(|m| m.tempo_bpm).collect();
        assert_eq!(tempos, vec![100.0, 100.0, 72.0, 60.0]);
    }

    #[test]
    fn test_ties_from_tie_and_tied() {
        let (content, _) = read(
            r#"<part id="P1">
  <measure number="1">
    <note><pitch><step>C</step><octave>4</octave></pitch><duration>8</duration><tie type="start"/></note>
    <note><pitch><step>C</step><octave>4</octave></pitch><duration>8</duration><notations><tied type="stop"/><tied type="start"/></notations></note>
  </measure>
</part>"#,
        );
        let notes = &content.measures[0].notes;
        assert!(notes[0].tie_start && !notes[0].tie_stop);
        assert!(notes[1].tie_start && notes[1].tie_stop);
    }

    #[test]
    fn test_grace_notes() {
        let xml = r#"<part id="P1">
  <measure number="1">
    <note><grace/><pitch><step>D</step><octave>5</octave></pitch></note>
    <note><pitch><step>C</step><octave>5</octave></pitch><duration>16</duration></note>
  </measure>
</part>"#;
        let (content, diagnostics) = read(xml);
        assert_eq!(content.measures[0].notes.len(), 1);
        assert!(diagnostics.is_empty());

        let options = ParseOptions {
            keep_grace_notes: true,
            ..ParseOptions::default()
        };
        let (content, _) = read_with(xml, &options);
        let notes = &content.measures[0].notes;
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].duration, q(0, 1));
        assert_eq!(notes[1].start_time, q(0, 1));
    }

    #[test]
    fn test_measure_numbers() {
        let (content, diagnostics) = read(
            r#"<part id="P1">
  <measure number="5"/>
  <measure number="5a"/>
  <measure number="X1"/>
  <measure/>
</part>"#,
        );
        let numbers: Vec<i32> = content.measures.iter().map(|m| m.number).collect();
        assert_eq!(numbers, vec![5, 5, 6, 7]);
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn test_composite_meter() {
        let (content, _) = read(
            r#"<part id="P1">
  <measure number="1"><attributes><time><beats>3+2</beats><beat-type>8</beat-type></time></attributes></measure>
</part>"#,
        );
        assert_eq!(content.measures[0].time_signature, TimeSignature { beats: 5, beat_type: 8 });
        assert_eq!(content.measures[0].duration, q(5, 2));
    }

    #[test]
    fn test_overflowing_meter_is_rejected() {
        let (content, diagnostics) = read(
            r#"<part id="P1">
  <measure number="1"><attributes><time><beats>4294967295+1</beats><beat-type>4</beat-type></time></attributes></measure>
  <measure number="2"><attributes><time><beats>3</beats><beat-type>4294967295</beat-type></time></attributes></measure>
</part>"#,
        );
        assert!(content.measures.iter().all(|m| m.time_signature == TimeSignature::default()));
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn test_huge_durations_are_dropped() {
        let (content, diagnostics) = read(
            r#"<part id="P1">
  <measure number="1">
    <attributes><divisions>1</divisions></attributes>
    <note><rest/><duration>9223372036854775807</duration></note>
    <note><rest/><duration>9223372036854775807</duration></note>
    <forward><duration>9223372036854775807</duration></forward>
    <note><pitch><step>A</step><octave>4</octave></pitch><duration>1</duration></note>
  </measure>
  <measure number="2">
    <attributes><divisions>4294967295</divisions></attributes>
    <note><rest/><duration>1</duration></note>
  </measure>
</part>"#,
        );
        let m1 = &content.measures[0];
        assert_eq!(m1.notes.len(), 1);
        assert_eq!(m1.notes[0].start_time, q(0, 1));
        assert_eq!(m1.duration, q(1, 1));
        assert_eq!(content.measures[1].divisions, 1);
        // two rests, forward, divisions
        assert_eq!(diagnostics.len(), 4);
    }

    #[test]
    fn test_alter_outside_range_falls_back() {
        let (content, diagnostics) = read(
            r#"<part id="P1">
  <measure number="1">
    <note><pitch><step>G</step><alter>1e9</alter><octave>4</octave></pitch><duration>4</duration></note>
    <note><pitch><step>G</step><alter>-4</alter><octave>4</octave></pitch><duration>4</duration></note>
    <note><pitch><step>G</step><alter>3</alter><octave>4</octave></pitch><duration>4</duration></note>
  </measure>
</part>"#,
        );
        let pitches: Vec<_> = content.measures[0]
            .notes
            .iter()
            .map(|n| n.pitch.clone().unwrap())
            .collect();
        assert_eq!(pitches, vec!["G4", "G4", "G###4"]);
        assert_eq!(diagnostics.len(), 2);
    }
}
