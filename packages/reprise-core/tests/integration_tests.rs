//! Integration tests for reprise-core
//!
//! End-to-end scenarios: markup or `.mxl` container in, expanded performance
//! and timing records out.

use reprise_core::archive::document_from_bytes;
use reprise_core::playback::{linear_sequence, notes_by_hand};
use reprise_core::{
    expand_score, load_score, parse_file, parse_str, performance, playback_events, playback_ms,
    summarize, Config, EndingType, Fraction, PlaybackEvent, ScoreError,
};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::ZipWriter;

fn q(n: i64, d: i64) -> Fraction {
    Fraction::new(n, d)
}

/// One 3/8 measure for two staves: three eighths over a dotted quarter.
fn measure(number: u32, left_barline: &str, right_barline: &str) -> String {
    let attributes = if number == 0 {
        r#"<attributes><divisions>2</divisions><key><fifths>0</fifths></key>
             <time><beats>3</beats><beat-type>8</beat-type></time><staves>2</staves></attributes>
           <direction><direction-type><metronome><beat-unit>quarter</beat-unit><per-minute>60</per-minute></metronome></direction-type></direction>"#
    } else {
        ""
    };
    format!(
        r#"<measure number="{number}">{left}{attributes}
             <note><pitch><step>E</step><octave>5</octave></pitch><duration>1</duration><voice>1</voice><staff>1</staff></note>
             <note><pitch><step>D</step><alter>1</alter><octave>5</octave></pitch><duration>1</duration><voice>1</voice><staff>1</staff></note>
             <note><pitch><step>E</step><octave>5</octave></pitch><duration>1</duration><voice>1</voice><staff>1</staff></note>
             <backup><duration>3</duration></backup>
             <note><pitch><step>A</step><octave>3</octave></pitch><duration>3</duration><voice>5</voice><staff>2</staff></note>
           {right}</measure>"#,
        number = number,
        left = left_barline,
        attributes = attributes,
        right = right_barline,
    )
}

fn ending(location: &str, number: &str, kind: &str, repeat: &str) -> String {
    format!(
        r#"<barline location="{}"><ending number="{}" type="{}"/>{}</barline>"#,
        location, number, kind, repeat
    )
}

const BACKWARD: &str = r#"<repeat direction="backward"/>"#;
const FORWARD: &str = r#"<barline location="left"><repeat direction="forward"/></barline>"#;

/// Eleven measures: 0-2 repeated with endings at 2/3, 4-6 repeated with
/// endings at 6/7, then 8-10 once.
fn two_repeats_document() -> String {
    let mut measures = String::new();
    for number in 0..11u32 {
        let (left, right) = match number {
            2 => (ending("left", "1", "start", ""), ending("right", "1", "stop", BACKWARD)),
            3 => (ending("left", "2", "start", ""), ending("right", "2", "discontinue", "")),
            4 => (FORWARD.to_string(), String::new()),
            6 => (ending("left", "1", "start", ""), ending("right", "1", "stop", BACKWARD)),
            7 => (ending("left", "2", "start", ""), ending("right", "2", "stop", "")),
            _ => (String::new(), String::new()),
        };
        measures.push_str(&measure(number, &left, &right));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 3.1 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd">
<score-partwise version="3.1">
  <work><work-title>Two Repeats</work-title></work>
  <identification><creator type="composer">Anon.</creator></identification>
  <part-list>
    <score-part id="P1">
      <part-name>Piano</part-name>
      <score-instrument id="P1-I1"><instrument-name>Acoustic Grand</instrument-name></score-instrument>
      <midi-instrument id="P1-I1"><midi-channel>1</midi-channel><midi-program>1</midi-program></midi-instrument>
    </score-part>
  </part-list>
  <part id="P1">{}</part>
</score-partwise>"#,
        measures
    )
}

fn build_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        let options: FileOptions<()> = FileOptions::default();
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container><rootfiles><rootfile full-path="score.xml"/></rootfiles></container>"#;

#[test]
fn test_parse_header_and_structure() {
    let score = parse_str(&two_repeats_document()).unwrap();

    assert_eq!(score.title, "Two Repeats");
    assert_eq!(score.composer, "Anon.");
    assert!(score.errors.is_empty(), "unexpected diagnostics: {:?}", score.errors);
    assert_eq!(score.tempo_bpm, 60.0);
    assert_eq!(score.time_signature.to_string(), "3/8");

    let part = &score.parts[0];
    assert_eq!(part.instrument, "Acoustic Grand");
    assert_eq!(part.staves, 2);
    assert_eq!(part.measures.len(), 11);
    assert_eq!(part.measures[1].notes[1].pitch.as_deref(), Some("D#5"));
}

#[test]
fn test_barline_endings_right_side_wins() {
    let score = parse_str(&two_repeats_document()).unwrap();
    let measures = &score.parts[0].measures;

    assert_eq!(measures[2].ending_type, Some(EndingType::Stop));
    assert!(measures[2].repeat_end);
    assert_eq!(measures[3].ending_type, Some(EndingType::Discontinue));
    assert_eq!(measures[3].ending_numbers, vec![2]);
    assert!(measures[4].repeat_start);
}

#[test]
fn test_measure_durations_account_for_backup() {
    let score = parse_str(&two_repeats_document()).unwrap();
    for measure in &score.parts[0].measures {
        assert_eq!(measure.duration, q(3, 2));
        let staff_one: Fraction = measure
            .notes
            .iter()
            .filter(|n| n.staff == 1)
            .map(|n| n.duration)
            .sum();
        assert_eq!(staff_one, measure.duration);
        // Left hand starts on the downbeat after the backup
        assert_eq!(measure.notes[3].start_time, measure.start_time);
    }
}

#[test]
fn test_two_repeats_expansion_order() {
    let score = parse_str(&two_repeats_document()).unwrap();
    let expanded = expand_score(&score);

    let numbers: Vec<i32> = expanded.parts[0].measures.iter().map(|m| m.number).collect();
    assert_eq!(numbers, vec![0, 1, 2, 0, 1, 3, 4, 5, 6, 4, 5, 7, 8, 9, 10]);
    assert_eq!(score.parts[0].measures.len(), 11);

    // Idempotent once expanded
    let again = expand_score(&expanded);
    assert_eq!(again, expanded);
}

#[test]
fn test_expanded_voices_are_monotonic() {
    let score = parse_str(&two_repeats_document()).unwrap();
    let expanded = expand_score(&score);

    let mut last_start: HashMap<(u32, u32), Fraction> = HashMap::new();
    for note in expanded.parts[0].notes() {
        let key = (note.staff, note.voice);
        if let Some(previous) = last_start.get(&key) {
            assert!(note.start_time >= *previous);
        }
        last_start.insert(key, note.start_time);
    }
    assert_eq!(expanded.parts[0].measures[14].start_time, q(14 * 3, 2));
}

#[test]
fn test_performance_display_times() {
    let score = parse_str(&two_repeats_document()).unwrap();
    let notes = performance(&score);
    assert_eq!(notes.len(), 15 * 4);

    // Playback never goes backwards
    assert!(notes.windows(2).all(|w| w[0].start_time_ms <= w[1].start_time_ms));

    // Every pass over a measure shows the same display times, note for note
    let mut passes: HashMap<(i32, Option<usize>), Vec<f64>> = HashMap::new();
    for note in &notes {
        passes
            .entry((note.measure, note.iteration))
            .or_default()
            .extend(note.start_time_display_ms);
    }
    let mut by_measure: HashMap<i32, Vec<f64>> = HashMap::new();
    for ((measure, _), displays) in passes {
        assert_eq!(displays.len(), 4);
        if let Some(previous) = by_measure.insert(measure, displays.clone()) {
            assert_eq!(previous, displays, "measure {}", measure);
        }
    }
    assert_eq!(by_measure.len(), 11);

    // Measure 4 first plays in iteration 1 and again in iteration 2
    let measure_four: Vec<(Option<usize>, Option<f64>)> = notes
        .iter()
        .filter(|n| n.measure == 4 && n.staff == 2)
        .map(|n| (n.iteration, n.start_time_display_ms))
        .collect();
    // 60 BPM: measure 4 starts at 4 * 1.5 quarters = 6000 ms in the written score
    assert_eq!(measure_four, vec![(Some(1), Some(6000.0)), (Some(2), Some(6000.0))]);
}

#[test]
fn test_half_and_quarters_at_120() {
    let xml = r#"<score-partwise>
  <part-list><score-part id="P1"/></part-list>
  <part id="P1">
    <measure number="1">
      <attributes><divisions>4</divisions><time><beats>4</beats><beat-type>4</beat-type></time></attributes>
      <sound tempo="120"/>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>8</duration></note>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>4</duration></note>
      <note><pitch><step>E</step><octave>4</octave></pitch><duration>4</duration></note>
    </measure>
  </part>
</score-partwise>"#;
    let notes = playback_ms(&parse_str(xml).unwrap());
    let times: Vec<(f64, f64)> = notes.iter().map(|n| (n.start_time_ms, n.end_time_ms)).collect();
    assert_eq!(times, vec![(0.0, 1000.0), (1000.0, 1500.0), (1500.0, 2000.0)]);
}

#[test]
fn test_tied_notes_stay_separate_records() {
    let xml = r#"<score-partwise>
  <part-list><score-part id="P1"/></part-list>
  <part id="P1">
    <measure number="1">
      <attributes><divisions>1</divisions></attributes>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>4</duration><tie type="start"/>
        <notations><tied type="start"/></notations></note>
    </measure>
    <measure number="2">
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>4</duration><tie type="stop"/>
        <notations><tied type="stop"/></notations></note>
    </measure>
  </part>
</score-partwise>"#;
    let score = parse_str(xml).unwrap();
    let notes = playback_ms(&score);
    assert_eq!(notes.len(), 2);
    assert!(notes[0].tie_start && !notes[0].tie_stop);
    assert!(notes[1].tie_stop);
    assert_eq!(notes[1].start_time_ms, 2000.0);
}

#[test]
fn test_hands_and_events() {
    let score = parse_str(&two_repeats_document()).unwrap();
    assert_eq!(linear_sequence(&score).len(), 44);

    let hands = notes_by_hand(&score);
    assert_eq!(hands.right.len(), 33);
    assert_eq!(hands.left.len(), 11);

    let events = playback_events(&score);
    assert!(matches!(events[0], PlaybackEvent::TempoChange { tempo, .. } if tempo == 60.0));
    assert_eq!(events.len(), 1 + 44 * 2);
    assert!(events.windows(2).all(|w| w[0].time() <= w[1].time()));
}

#[test]
fn test_compressed_archive_in_memory() {
    let document = two_repeats_document();
    let bytes = build_archive(&[
        ("META-INF/container.xml", MANIFEST),
        ("score.xml", document.as_str()),
    ]);
    let xml = document_from_bytes(&bytes).unwrap();
    let score = parse_str(&xml).unwrap();
    assert_eq!(score.parts[0].measures.len(), 11);
}

#[test]
fn test_compressed_archive_on_disk() {
    let document = two_repeats_document();
    let bytes = build_archive(&[
        ("META-INF/container.xml", MANIFEST),
        ("score.xml", document.as_str()),
    ]);
    let mut file = tempfile::Builder::new().suffix(".mxl").tempfile().unwrap();
    file.write_all(&bytes).unwrap();
    file.flush().unwrap();

    let score = parse_file(file.path()).unwrap();
    assert_eq!(score.title, "Two Repeats");
}

#[test]
fn test_fatal_errors() {
    let missing = parse_file(Path::new("/nonexistent/score.musicxml")).unwrap_err();
    assert!(matches!(missing, ScoreError::NotFound(_)));
    assert!(missing.is_fatal());

    let malformed = parse_str("<score-partwise><part-list>").unwrap_err();
    assert!(matches!(malformed, ScoreError::MalformedDocument(_)));

    let wrong_root = parse_str("<score-timewise/>").unwrap_err();
    assert!(matches!(wrong_root, ScoreError::MalformedDocument(_)));

    let no_roster = parse_str("<score-partwise><part id=\"P1\"/></score-partwise>").unwrap_err();
    assert!(matches!(no_roster, ScoreError::MissingStructure(_)));

    let bytes = build_archive(&[("score.xml", "<score-partwise/>")]);
    let no_manifest = document_from_bytes(&bytes).unwrap_err();
    assert!(matches!(no_manifest, ScoreError::Archive(_)));
}

#[test]
fn test_recoverable_errors_keep_score_usable() {
    let xml = r#"<score-partwise>
  <part-list><score-part id="P1"/></part-list>
  <part id="P1">
    <measure number="1">
      <attributes><divisions>zero</divisions></attributes>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>4</duration></note>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>many</duration></note>
      <note><pitch><step>E</step><octave>4</octave></pitch><duration>4</duration></note>
    </measure>
  </part>
  <part id="P9"/>
</score-partwise>"#;
    let score = parse_str(xml).unwrap();

    assert!(score.errors.len() >= 3, "errors: {:?}", score.errors);
    let notes = &score.parts[0].measures[0].notes;
    // Divisions fall back to 4, the unreadable note is dropped
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[1].start_time, q(1, 1));
    assert_eq!(performance(&score).len(), 2);
}

#[test]
fn test_config_file_defaults() {
    let mut config_file = tempfile::NamedTempFile::new().unwrap();
    writeln!(config_file, "parse:\n  default-tempo: 60\n  default-divisions: 1").unwrap();
    config_file.flush().unwrap();
    let config = Config::load(config_file.path()).unwrap();

    let mut score_file = tempfile::Builder::new().suffix(".musicxml").tempfile().unwrap();
    score_file
        .write_all(
            br#"<score-partwise>
  <part-list><score-part id="P1"/></part-list>
  <part id="P1"><measure number="1">
    <note><pitch><step>A</step><octave>4</octave></pitch><duration>1</duration></note>
    <note><pitch><step>B</step><octave>4</octave></pitch><duration>1</duration></note>
  </measure></part>
</score-partwise>"#,
        )
        .unwrap();
    score_file.flush().unwrap();

    let score = load_score(score_file.path(), &config).unwrap();
    let notes = playback_ms(&score);
    assert_eq!(notes[1].start_time_ms, 1000.0);
    assert_eq!(notes[1].tempo_bpm, 60.0);
}

#[test]
fn test_summary_of_document() {
    let score = parse_str(&two_repeats_document()).unwrap();
    let summary = summarize(&score, true);

    let part = &summary.parts[0];
    assert_eq!(part.notes, 44);
    assert_eq!(part.repeat_marks.len(), 3);
    assert_eq!(part.volta_marks.len(), 4);
    assert!(part.upbeat.is_none());

    let expansion = summary.expansion.as_ref().unwrap();
    assert_eq!(expansion.original_measures, 11);
    assert_eq!(expansion.expanded_measures, 15);
    assert_eq!(summary.statistics.total_notes, 60);
    // 15 measures of 1.5 quarters at 60 BPM
    assert_eq!(summary.statistics.duration_ms, 22500.0);

    let yaml = serde_yaml::to_string(&summary).unwrap();
    assert!(yaml.contains("expanded_measures: 15"));
}
