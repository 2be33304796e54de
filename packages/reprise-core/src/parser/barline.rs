//! Repeat signs and volta endings from `<barline>` elements.
//!
//! A measure may carry a left and a right barline, each with its own `<ending>`.
//! When both sides have endings the right side wins. On the winning side the
//! ending type is chosen by [`EndingType::priority`]: stop, then discontinue,
//! then start.

use super::children;
use crate::error::Diagnostics;
use crate::model::EndingType;
use roxmltree::Node;

#[derive(Debug, Default, PartialEq)]
pub(super) struct BarlineMarks {
    pub repeat_start: bool,
    pub repeat_end: bool,
    pub repeat_count: Option<u32>,
    pub ending_numbers: Vec<u32>,
    pub ending_type: Option<EndingType>,
}

#[derive(Default)]
struct SideEndings {
    present: bool,
    numbers: Vec<u32>,
    types: Vec<EndingType>,
}

pub(super) fn read_barlines(
    measure: Node,
    default_repeat_count: u32,
    diagnostics: &mut Diagnostics,
) -> BarlineMarks {
    let mut marks = BarlineMarks::default();
    let mut left = SideEndings::default();
    let mut right = SideEndings::default();

    for barline in children(measure, "barline") {
        for repeat in children(barline, "repeat") {
            match repeat.attribute("direction") {
                Some("forward") => marks.repeat_start = true,
                Some("backward") => {
                    marks.repeat_end = true;
                    marks.repeat_count = Some(repeat_times(repeat, default_repeat_count, diagnostics));
                }
                other => diagnostics.coercion(
                    "repeat direction",
                    other.unwrap_or(""),
                    "no repeat",
                ),
            }
        }

        let side = match barline.attribute("location") {
            Some("left") => &mut left,
            _ => &mut right,
        };
        for ending in children(barline, "ending") {
            side.present = true;
            if let Some(number) = ending.attribute("number") {
                side.numbers.extend(ending_numbers(number, diagnostics));
            }
            match ending.attribute("type") {
                Some(t) => match EndingType::parse(t) {
                    Some(ending_type) => side.types.push(ending_type),
                    None => diagnostics.coercion("ending type", t, "none"),
                },
                None => diagnostics.warn("ending without type attribute ignored"),
            }
        }
    }

    let winner = if right.present { right } else { left };
    let mut numbers = winner.numbers;
    numbers.sort_unstable();
    numbers.dedup();
    marks.ending_numbers = numbers;
    marks.ending_type = winner.types.into_iter().max_by_key(|t| t.priority());
    marks
}

fn repeat_times(repeat: Node, default_count: u32, diagnostics: &mut Diagnostics) -> u32 {
    let Some(times) = repeat.attribute("times") else {
        return default_count;
    };
    match super::parse_number(times) {
        Some(value) if value >= 1.0 => value as u32,
        _ => {
            diagnostics.coercion("repeat times", times, default_count);
            default_count
        }
    }
}

/// Ending numbers are comma and/or space separated (`"1, 2"`, `"1 2"`).
fn ending_numbers(text: &str, diagnostics: &mut Diagnostics) -> Vec<u32> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| match token.trim_end_matches('.').parse::<u32>() {
            Ok(n) if n > 0 => Some(n),
            _ => {
                diagnostics.coercion("ending number", token, "skipped");
                None
            }
        })
        .collect()
}
