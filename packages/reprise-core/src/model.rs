//! # Score Model
//!
//! Plain data types produced by the parser and consumed by the repeat expander
//! and the playback projector.
//!
//! ## Type Hierarchy
//! ```text
//! Score
//!   ├── title, composer, errors
//!   ├── tempo_bpm / time_signature / key_signature (copied from the first measure)
//!   └── Vec<Part>
//!         ├── id, name, instrument, MIDI channel/program, staves
//!         └── Vec<Measure>
//!               ├── number, time signature, key, divisions, tempo
//!               ├── repeat_start / repeat_end / repeat_count
//!               ├── ending_numbers / ending_type
//!               ├── start_time / duration (quarter notes)
//!               └── Vec<Note>
//!                     ├── pitch: Option<String> (None = rest)
//!                     ├── start_time / duration (quarter notes)
//!                     ├── staff, voice, is_chord
//!                     └── tie_start / tie_stop
//! ```
//!
//! ## Timing
//! All times are exact [`Fraction`]s measured in quarter notes. A whole note is
//! `4`, an eighth is `1/2`. Floating point only appears in the playback layer.
//!
//! ## Ownership
//! Notes are owned by their measure and measures by their part. Expansion clones
//! measures into a fresh [`Score`]; nothing is shared between an original score
//! and its expanded copy.

use num_rational::Rational64;
use serde::{Serialize, Serializer};

/// Exact musical time in quarter notes.
pub type Fraction = Rational64;

/// Convert an exact time to floating point (for millisecond math only).
pub fn fraction_to_f64(value: Fraction) -> f64 {
    *value.numer() as f64 / *value.denom() as f64
}

/// Serialize a fraction as `"n/d"` (or `"n"` for integers).
pub fn serialize_fraction<S: Serializer>(value: &Fraction, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Time signature (e.g., 4/4, 3/4, 6/8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSignature {
    pub beats: u32,
    pub beat_type: u32,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beats: 4,
            beat_type: 4,
        }
    }
}

impl TimeSignature {
    /// Parse `"3/4"` style strings.
    pub fn parse(s: &str) -> Option<Self> {
        let (beats, beat_type) = s.trim().split_once('/')?;
        let beats: u32 = beats.trim().parse().ok()?;
        let beat_type: u32 = beat_type.trim().parse().ok()?;
        if beats == 0 || beat_type == 0 {
            return None;
        }
        Some(Self { beats, beat_type })
    }

    /// Nominal measure length in quarter notes (`beats * 4 / beat_type`).
    pub fn measure_duration(&self) -> Fraction {
        Fraction::new(i64::from(self.beats) * 4, i64::from(self.beat_type.max(1)))
    }
}

impl std::fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.beats, self.beat_type)
    }
}

/// Boundary type of a volta bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndingType {
    Start,
    Stop,
    Discontinue,
}

impl EndingType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "start" => Some(EndingType::Start),
            "stop" => Some(EndingType::Stop),
            "discontinue" => Some(EndingType::Discontinue),
            _ => None,
        }
    }

    /// Structural weight when one barline carries several tokens.
    /// A stop closes a bracket, so it outranks everything else.
    pub fn priority(self) -> u8 {
        match self {
            EndingType::Start => 1,
            EndingType::Discontinue => 2,
            EndingType::Stop => 3,
        }
    }
}

/// A sounding note or a rest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    /// Pitch spelled as step, accidentals and octave (`"C4"`, `"F#5"`, `"Bb3"`).
    pub pitch: Option<String>,
    #[serde(serialize_with = "serialize_fraction")]
    pub duration: Fraction,
    #[serde(serialize_with = "serialize_fraction")]
    pub start_time: Fraction,
    pub measure_number: i32,
    pub staff: u32,
    pub voice: u32,
    /// Starts together with the preceding regular note of the same voice.
    pub is_chord: bool,
    pub tie_start: bool,
    pub tie_stop: bool,
    is_rest: bool,
}

impl Note {
    /// Create a note; `pitch == None` makes it a rest.
    pub fn new(
        pitch: Option<String>,
        duration: Fraction,
        start_time: Fraction,
        measure_number: i32,
    ) -> Self {
        let is_rest = pitch.is_none();
        Self {
            pitch,
            duration,
            start_time,
            measure_number,
            staff: 1,
            voice: 1,
            is_chord: false,
            tie_start: false,
            tie_stop: false,
            is_rest,
        }
    }

    pub fn rest(duration: Fraction, start_time: Fraction, measure_number: i32) -> Self {
        Self::new(None, duration, start_time, measure_number)
    }

    pub fn with_voice(mut self, staff: u32, voice: u32) -> Self {
        self.staff = staff;
        self.voice = voice;
        self
    }

    pub fn with_chord(mut self, is_chord: bool) -> Self {
        self.is_chord = is_chord;
        self
    }

    pub fn with_ties(mut self, tie_start: bool, tie_stop: bool) -> Self {
        self.tie_start = tie_start;
        self.tie_stop = tie_stop;
        self
    }

    pub fn is_rest(&self) -> bool {
        self.is_rest
    }

    pub fn end_time(&self) -> Fraction {
        self.start_time + self.duration
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measure {
    pub number: i32,
    pub time_signature: TimeSignature,
    /// Fifths: positive = sharps, negative = flats
    pub key_signature: i8,
    pub divisions: u32,
    pub tempo_bpm: f64,
    pub repeat_start: bool,
    pub repeat_end: bool,
    /// Total passes through the repeated section (2 = play twice).
    pub repeat_count: u32,
    pub ending_numbers: Vec<u32>,
    pub ending_type: Option<EndingType>,
    #[serde(serialize_with = "serialize_fraction")]
    pub start_time: Fraction,
    /// Longest time reached by any voice in this measure.
    #[serde(serialize_with = "serialize_fraction")]
    pub duration: Fraction,
    pub notes: Vec<Note>,
    /// Index of the written measure an expanded copy was made from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<usize>,
}

impl Measure {
    pub fn new(number: i32) -> Self {
        Self {
            number,
            time_signature: TimeSignature::default(),
            key_signature: 0,
            divisions: 4,
            tempo_bpm: 120.0,
            repeat_start: false,
            repeat_end: false,
            repeat_count: 2,
            ending_numbers: Vec::new(),
            ending_type: None,
            start_time: Fraction::from_integer(0),
            duration: Fraction::from_integer(0),
            notes: Vec::new(),
            origin: None,
        }
    }

    /// Whether the measure carries any repeat or volta marker.
    pub fn has_repeat_markers(&self) -> bool {
        self.repeat_start
            || self.repeat_end
            || (!self.ending_numbers.is_empty() && self.ending_type.is_some())
    }

    /// Recorded duration, or the time signature's nominal length for empty measures.
    pub fn effective_duration(&self) -> Fraction {
        if self.duration > Fraction::from_integer(0) {
            self.duration
        } else {
            self.time_signature.measure_duration()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Part {
    pub id: String,
    pub name: String,
    pub instrument: String,
    pub midi_channel: u8,
    pub midi_program: u8,
    pub staves: u32,
    pub measures: Vec<Measure>,
}

impl Part {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            instrument: "Piano".to_string(),
            midi_channel: 1,
            midi_program: 1,
            staves: 1,
            measures: Vec::new(),
        }
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.measures.iter().flat_map(|m| m.notes.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    pub title: String,
    pub composer: String,
    pub parts: Vec<Part>,
    /// Recoverable problems found while parsing.
    pub errors: Vec<String>,
    pub tempo_bpm: f64,
    pub time_signature: TimeSignature,
    pub key_signature: i8,
}

impl Default for Score {
    fn default() -> Self {
        Self {
            title: "Untitled".to_string(),
            composer: "Unknown".to_string(),
            parts: Vec::new(),
            errors: Vec::new(),
            tempo_bpm: 120.0,
            time_signature: TimeSignature::default(),
            key_signature: 0,
        }
    }
}

impl Score {
    /// Copy tempo, meter and key from the first measure of the first part.
    pub fn apply_defaults_from_first_measure(&mut self) {
        if let Some(first) = self.parts.first().and_then(|p| p.measures.first()) {
            self.tempo_bpm = first.tempo_bpm;
            self.time_signature = first.time_signature;
            self.key_signature = first.key_signature;
        }
    }

    pub fn measure_count(&self) -> usize {
        self.parts.first().map(|p| p.measures.len()).unwrap_or(0)
    }
}
