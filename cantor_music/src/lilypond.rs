// LilyPond sheet music output for harmonizations and counterpoint lines.
//
// Converts a `Harmonization` or a `CounterpointLine` (with its cantus firmus)
// into a LilyPond (.ly) document that the LilyPond typesetter can engrave.
// Nothing here invokes LilyPond; callers print or save the text.
//
// Harmonizations are set as a PianoStaff in 2/2 with one half note per chord:
// soprano and alto share the treble staff (stems up/down), tenor and bass
// share the bass staff. Counterpoint is set in 4/4 with one measure per
// cantus note: the generated line on a treble staff, the cantus in whole
// notes on a bass staff.
//
// Pitches are written in absolute mode using their own spelling, so Bb comes
// out as `bes` and A# as `ais`. Durations are kept in quarter notes and
// decomposed into LilyPond note values.

use crate::cantus::{CantusFirmus, CounterpointLine};
use crate::chord::Voice;
use crate::harmony::Harmonization;
use crate::key::{Key, Mode};
use crate::pitch::{Letter, Pitch, PitchClass};
use std::fmt::Write;

/// LilyPond version line emitted at the top of every document.
pub const LY_VERSION: &str = "2.24.4";

/// Octave written as a bare letter in absolute mode (`c` = C3).
const LY_BASE_OCTAVE: i8 = 3;

/// LilyPond note name for a spelled pitch class: `c`, `fis`, `bes`, `ees`
/// (written `es` for E flat and `as` for A flat), `cisis`, `beses`.
pub fn pitch_class_to_ly(pc: PitchClass) -> String {
    let letter = pc.letter.as_char().to_ascii_lowercase();
    let mut name = letter.to_string();
    match pc.accidental {
        a if a > 0 => {
            for _ in 0..a {
                name.push_str("is");
            }
        }
        a if a < 0 => {
            for i in 0..-a {
                let vowel_letter = matches!(pc.letter, Letter::E | Letter::A);
                if i == 0 && vowel_letter {
                    name.push('s');
                } else {
                    name.push_str("es");
                }
            }
        }
        _ => {}
    }
    name
}

/// Absolute LilyPond pitch: `c'` is middle C, `c` is C3, `c,` is C2.
pub fn pitch_to_ly(pitch: Pitch) -> String {
    let mut result = pitch_class_to_ly(pitch.pitch_class());
    let offset = pitch.octave - LY_BASE_OCTAVE;
    let mark = if offset > 0 { '\'' } else { ',' };
    for _ in 0..offset.unsigned_abs() {
        result.push(mark);
    }
    result
}

/// A LilyPond duration: length in quarter notes and its text.
const DURATION_TABLE: [(u8, &str); 4] = [
    (4, "1"),  // whole
    (3, "2."), // dotted half
    (2, "2"),  // half
    (1, "4"),  // quarter
];

/// Decompose a duration in quarter notes into LilyPond values, largest
/// first. Multi-part results are tied by the caller.
pub fn decompose_duration(mut quarters: u8) -> Vec<&'static str> {
    let mut parts = Vec::new();
    for &(value, name) in &DURATION_TABLE {
        while quarters >= value {
            parts.push(name);
            quarters -= value;
        }
    }
    parts
}

/// `\key c \major`, `\key fis \minor`.
pub fn key_to_ly(key: &Key) -> String {
    let mode = match key.mode {
        Mode::Major => "major",
        Mode::Minor => "minor",
    };
    format!("\\key {} \\{}", pitch_class_to_ly(key.tonic), mode)
}

/// Append `pitch` for `quarters`, tying across table values.
fn push_note(out: &mut String, pitch: &str, quarters: u8) {
    let parts = decompose_duration(quarters);
    for (i, dur) in parts.iter().enumerate() {
        if !out.is_empty() {
            out.push(' ');
        }
        let _ = write!(out, "{}{}", pitch, dur);
        if i + 1 < parts.len() {
            out.push('~');
        }
    }
}

fn push_rest(out: &mut String, quarters: u8) {
    for dur in decompose_duration(quarters) {
        if !out.is_empty() {
            out.push(' ');
        }
        let _ = write!(out, "r{}", dur);
    }
}

fn header(ly: &mut String, title: &str, subtitle: &str) {
    let _ = writeln!(ly, "\\version \"{}\"\n", LY_VERSION);
    let _ = write!(
        ly,
        "\\header {{\n  title = \"{}\"\n  subtitle = \"{}\"\n}}\n\n",
        title.replace('"', "\\\""),
        subtitle
    );
}

/// Render one voice of a harmonization as half notes.
fn harmony_voice(result: &Harmonization, voice: Voice) -> String {
    let mut out = String::new();
    for pitch in result.voice(voice) {
        push_note(&mut out, &pitch_to_ly(pitch), 2);
    }
    out
}

/// A complete LilyPond document for a four-voice harmonization.
pub fn harmonization_to_lilypond(result: &Harmonization, title: &str) -> String {
    let mut ly = String::new();
    header(&mut ly, title, &format!("Harmonization in {}", result.key));

    let _ = write!(
        ly,
        "global = {{\n  {} \\time 2/2\n}}\n\n",
        key_to_ly(&result.key)
    );
    for voice in Voice::ALL {
        let _ = write!(
            ly,
            "{} = \\absolute {{\n  \\global\n  {}\n}}\n\n",
            voice.name(),
            harmony_voice(result, voice)
        );
    }

    let analysis = result.labels().join(" ");
    let _ = writeln!(ly, "% {}", analysis);
    ly.push_str("\\score {\n  \\new PianoStaff <<\n");
    ly.push_str(concat!(
        "    \\new Staff = \"upper\" <<\n",
        "      \\clef treble\n",
        "      \\new Voice = \"soprano\" { \\voiceOne \\soprano }\n",
        "      \\new Voice = \"alto\" { \\voiceTwo \\alto }\n",
        "    >>\n",
    ));
    ly.push_str(concat!(
        "    \\new Staff = \"lower\" <<\n",
        "      \\clef bass\n",
        "      \\new Voice = \"tenor\" { \\voiceOne \\tenor }\n",
        "      \\new Voice = \"bass\" { \\voiceTwo \\bass }\n",
        "    >>\n",
    ));
    ly.push_str("  >>\n  \\layout { }\n}\n");
    ly
}

/// A complete LilyPond document for a counterpoint line over its cantus.
pub fn counterpoint_to_lilypond(
    line: &CounterpointLine,
    cantus: &CantusFirmus,
    title: &str,
) -> String {
    let mut ly = String::new();
    header(
        &mut ly,
        title,
        &format!("Counterpoint in {} notes, {}", line.rhythm, line.key),
    );
    let _ = write!(ly, "global = {{\n  {} \\time 4/4\n}}\n\n", key_to_ly(&line.key));

    let mut upper = String::new();
    if let Some(rest) = line.opening_rest {
        push_rest(&mut upper, rest);
    }
    for note in &line.notes {
        push_note(&mut upper, &pitch_to_ly(note.pitch), note.slot.duration);
    }
    let mut lower = String::new();
    for &pitch in cantus.notes() {
        push_note(&mut lower, &pitch_to_ly(pitch), 4);
    }

    let _ = write!(
        ly,
        "counterpoint = \\absolute {{\n  \\global\n  {}\n}}\n\n",
        upper
    );
    let _ = write!(ly, "cantus = \\absolute {{\n  \\global\n  {}\n}}\n\n", lower);
    ly.push_str("\\score {\n  <<\n");
    ly.push_str("    \\new Staff = \"counterpoint\" { \\clef treble \\counterpoint }\n");
    ly.push_str("    \\new Staff = \"cantus\" { \\clef bass \\cantus }\n");
    ly.push_str("  >>\n  \\layout { }\n}\n");
    ly
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cantus::{LineNote, RhythmMode, ToneKind, layout};
    use crate::chord::{Chord, Inversion, Voicing};
    use crate::key::Degree;
    use crate::pitch::parse_pitches;

    fn p(s: &str) -> Pitch {
        s.parse().unwrap()
    }

    #[test]
    fn test_pitch_to_ly_octaves() {
        assert_eq!(pitch_to_ly(p("C4")), "c'");
        assert_eq!(pitch_to_ly(p("C3")), "c");
        assert_eq!(pitch_to_ly(p("G2")), "g,");
        assert_eq!(pitch_to_ly(p("A5")), "a''");
    }

    #[test]
    fn test_pitch_to_ly_spelling() {
        assert_eq!(pitch_to_ly(p("F#3")), "fis");
        assert_eq!(pitch_to_ly(p("Bb3")), "bes");
        assert_eq!(pitch_to_ly(p("Eb4")), "es'");
        assert_eq!(pitch_to_ly(p("Ab4")), "as'");
        assert_eq!(pitch_to_ly(p("A#4")), "ais'");
        assert_eq!(pitch_to_ly(p("Bbb3")), "beses");
        assert_eq!(pitch_to_ly(p("Ebb4")), "eses'");
        assert_eq!(pitch_to_ly(p("C##4")), "cisis'");
    }

    #[test]
    fn test_decompose_duration() {
        assert_eq!(decompose_duration(4), vec!["1"]);
        assert_eq!(decompose_duration(3), vec!["2."]);
        assert_eq!(decompose_duration(2), vec!["2"]);
        assert_eq!(decompose_duration(1), vec!["4"]);
        assert_eq!(decompose_duration(5), vec!["1", "4"]);
        assert_eq!(decompose_duration(0), Vec::<&str>::new());
    }

    #[test]
    fn test_key_to_ly() {
        assert_eq!(key_to_ly(&Key::c_major()), "\\key c \\major");
        assert_eq!(key_to_ly(&Key::parse("Bb", "minor").unwrap()), "\\key bes \\minor");
    }

    #[test]
    fn test_harmonization_document() {
        let key = Key::c_major();
        let chord = Chord {
            triad: key.triad(Degree::I),
            inversion: Inversion::Root,
            voicing: Voicing {
                soprano: p("C5"),
                alto: p("G4"),
                tenor: p("E4"),
                bass: p("C3"),
            },
        };
        let result = Harmonization {
            key,
            chords: vec![chord, chord],
            diagnostics: vec![],
            steps: 2,
        };
        let ly = harmonization_to_lilypond(&result, "Test");
        assert!(ly.starts_with("\\version \"2.24.4\""));
        assert!(ly.contains("\\time 2/2"));
        assert!(ly.contains("\\new PianoStaff"));
        assert!(ly.contains("soprano = \\absolute {\n  \\global\n  c''2 c''2\n}"), "got {}", ly);
        assert!(ly.contains("bass = \\absolute {\n  \\global\n  c2 c2\n}"), "got {}", ly);
        assert!(ly.contains("\\voiceTwo \\alto"));
        assert!(ly.contains("% I I"));
    }

    #[test]
    fn test_counterpoint_document_has_rest_and_cantus() {
        let key = Key::c_major();
        let cantus = CantusFirmus::new(parse_pitches(&["C4", "D4", "C4"]).unwrap()).unwrap();
        let slots = layout(3, RhythmMode::Half);
        let pitches = parse_pitches(&["G4", "F4", "E4", "C5"]).unwrap();
        let line = CounterpointLine {
            key,
            rhythm: RhythmMode::Half,
            opening_rest: Some(2),
            notes: pitches
                .iter()
                .zip(&slots)
                .map(|(&pitch, &slot)| LineNote {
                    pitch,
                    slot,
                    kind: ToneKind::Harmonic,
                })
                .collect(),
            steps: 0,
        };
        let ly = counterpoint_to_lilypond(&line, &cantus, "Species");
        assert!(ly.contains("\\time 4/4"));
        assert!(ly.contains("r2 g'2 f'2 e'2 c''1"), "got {}", ly);
        assert!(ly.contains("c'1 d'1 c'1"), "got {}", ly);
        assert!(ly.contains("\\clef bass \\cantus"));
    }
}
