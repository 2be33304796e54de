//! # Repeats Module
//!
//! Turn notated repeat structure into the linear measure order a performer plays.
//!
//! ## Purpose
//! MusicXML marks repeats sparsely: forward/backward repeat barlines, and volta
//! brackets ("1.", "2.") with start/stop/discontinue boundaries. Encoders also
//! omit markers (no opening repeat at the top of a piece, second endings that
//! hang past the closing barline). This module reconstructs the intended order.
//!
//! ## Sub-modules
//! - `analyzer` - Scan measures into [`Section`]s (`Simple` or `Repeat` with voltas)
//! - `expander` - Flatten sections into cloned measures and retime them
//!
//! ## Expansion of a Repeat Section
//!
//! ```text
//! body:    [pre-volta ...] [volta block ...] [post-volta ...]
//! pass k:   pre-volta, volta chosen for k, post-volta
//! ```
//!
//! The volta for pass `k` is ending `k` if present, otherwise the highest
//! ending below `k`, otherwise the lowest ending.
//!
//! ## Example
//! ```text
//! measures:  0  1  2:|  3   4|:  5  6:|  7   8  9  10
//! endings:         [1]  [2]          [1]  [2]
//! expanded:  0 1 2  0 1 3  4 5 6  4 5 7  8 9 10
//! ```
//!
//! ## Related Modules
//! - `parser` - Sets the repeat and ending flags on measures
//! - `playback` - Projects the expanded score onto milliseconds

mod analyzer;
mod expander;


pub use analyzer::{analyze, Section};
pub use expander::{expand, expand_part, expand_score, retime, select_volta};
