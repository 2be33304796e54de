//! # Playback Module
//!
//! Project a score onto wall-clock time for audio playback and score following.
//!
//! ## Purpose
//! This module turns the exact quarter-note timing of a [`Score`](crate::Score) into:
//! 1. **Timed notes** - milliseconds per note, tempo-aware
//! 2. **Event streams** - `tempo_change` / `note_on` / `note_off` for synthesizers
//! 3. **Display times** - one stable position per written note across repeat passes
//!
//! ## Sub-modules
//! - `types` - TimedNote, PlaybackEvent, NotesByHand
//! - `tempo` - TempoMap and quarter-note/millisecond conversion
//! - `engine` - Linear sequence, hand split, event generation, ms projection
//! - `display` - Iteration detection and display-time mapping
//!
//! ## Key Types
//! - [`TimedNote`] - One note with quarter-note and millisecond timing
//! - [`PlaybackEvent`] - One entry of the sorted event stream
//! - [`TempoMap`] - Piecewise-constant tempo with integrated ms positions
//!
//! ## Entry Points
//! - [`playback_ms()`] - Timed notes for any score (original or expanded)
//! - [`playback_events()`] - Sorted event stream
//! - [`display_mapping()`] - Timed notes of an expanded score with display times
//!
//! ## Two Clocks
//!
//! ### Playback Time (`start_time_ms`)
//! - Real elapsed time in the expanded performance
//! - Strictly follows the repeat order, never decreases
//!
//! ### Display Time (`start_time_display_ms`)
//! - Playback time of the same note in the unexpanded score
//! - Identical for every pass through a repeated measure
//!
//! ## Example
//! ```rust
//! use reprise_core::{parse_str, expand_score, playback::display_mapping};
//!
//! let xml = r#"<score-partwise>
//!   <part-list><score-part id="P1"/></part-list>
//!   <part id="P1">
//!     <measure number="1">
//!       <attributes><divisions>1</divisions></attributes>
//!       <note><pitch><step>C</step><octave>4</octave></pitch><duration>4</duration></note>
//!       <barline location="right"><repeat direction="backward"/></barline>
//!     </measure>
//!   </part>
//! </score-partwise>"#;
//!
//! let score = parse_str(xml).unwrap();
//! let expanded = expand_score(&score);
//! let notes = display_mapping(&score, &expanded);
//!
//! assert_eq!(notes.len(), 2);
//! assert_eq!(notes[1].start_time_ms, 2000.0);
//! assert_eq!(notes[1].start_time_display_ms, Some(0.0));
//! ```
//!
//! ## Related Modules
//! - `repeats` - Produces the expanded score projected here
//! - `config` - `ProjectorOptions` (tie merging for events)

mod display;
mod engine;
mod tempo;
mod types;


pub use display::display_mapping;
pub use engine::{linear_sequence, notes_by_hand, playback_events, playback_events_with, playback_ms};
pub use tempo::{ms_to_quarter_notes, quarter_notes_to_ms, TempoMap};
pub use types::{NotesByHand, PlaybackEvent, TimedNote};
