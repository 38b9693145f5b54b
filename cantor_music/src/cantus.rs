// Cantus firmus, rhythm modes and the rhythmic layout of a counterpoint line.
//
// The cantus firmus (CF) is a non-empty sequence of pitches, one per measure,
// each lasting a whole note. The counterpoint line above it is written in one
// of three rhythm modes:
//
// - Whole: one note per CF note (first species).
// - Half: two notes per measure (second species).
// - Quarter: four notes per measure (third species).
//
// In every mode the final measure holds a single whole note, so both parts
// cadence together. In Half and Quarter mode the line opens with a rest on
// the first downbeat and enters on the next slot, the customary species
// opening; a one-note CF has no room for that and is set as a single whole
// note.
//
// `layout` turns a CF length and mode into the list of `Slot`s the
// counterpoint generator fills, one pitch per slot. Durations are in quarter
// notes (whole = 4).

use crate::error::{GenerateError, ParseError};
use crate::key::Key;
use crate::pitch::{Interval, Pitch};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quarter notes per measure.
pub const MEASURE_QUARTERS: u8 = 4;

/// How many line notes sound against each CF note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RhythmMode {
    Whole,
    Half,
    Quarter,
}

impl RhythmMode {
    pub const ALL: [RhythmMode; 3] = [RhythmMode::Whole, RhythmMode::Half, RhythmMode::Quarter];

    pub fn notes_per_measure(self) -> usize {
        match self {
            RhythmMode::Whole => 1,
            RhythmMode::Half => 2,
            RhythmMode::Quarter => 4,
        }
    }

    /// Length of one line note in quarter notes.
    pub fn note_duration(self) -> u8 {
        MEASURE_QUARTERS / self.notes_per_measure() as u8
    }
}

impl fmt::Display for RhythmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RhythmMode::Whole => "whole",
            RhythmMode::Half => "half",
            RhythmMode::Quarter => "quarter",
        })
    }
}

impl FromStr for RhythmMode {
    type Err = ParseError;

    /// Case-insensitive. `quater` is accepted as a misspelling of `quarter`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whole" => Ok(RhythmMode::Whole),
            "half" => Ok(RhythmMode::Half),
            "quarter" | "quater" => Ok(RhythmMode::Quarter),
            _ => Err(ParseError::Rhythm {
                token: s.trim().to_string(),
            }),
        }
    }
}

/// The fixed lower part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CantusFirmus {
    notes: Vec<Pitch>,
}

impl CantusFirmus {
    pub fn new(notes: Vec<Pitch>) -> Result<Self, GenerateError> {
        if notes.is_empty() {
            return Err(GenerateError::EmptyInput);
        }
        Ok(CantusFirmus { notes })
    }

    pub fn notes(&self) -> &[Pitch] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Always false; a cantus is never empty.
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn final_note(&self) -> Pitch {
        self.notes[self.notes.len() - 1]
    }
}

/// A rhythmic position in the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    /// CF note index sounding under this slot.
    pub measure: usize,
    /// Index of the note within its measure (0 = downbeat).
    pub beat: usize,
    /// Length in quarter notes.
    pub duration: u8,
}

impl Slot {
    pub fn is_strong(self) -> bool {
        self.beat == 0
    }
}

/// Slots of a line over a CF of `len` notes.
pub fn layout(len: usize, rhythm: RhythmMode) -> Vec<Slot> {
    let per_measure = rhythm.notes_per_measure();
    let mut slots = Vec::new();
    for measure in 0..len {
        if measure + 1 == len {
            slots.push(Slot {
                measure,
                beat: 0,
                duration: MEASURE_QUARTERS,
            });
            break;
        }
        for beat in 0..per_measure {
            if measure == 0 && beat == 0 && per_measure > 1 {
                continue;
            }
            slots.push(Slot {
                measure,
                beat,
                duration: rhythm.note_duration(),
            });
        }
    }
    slots
}

/// Length in quarter notes of the opening rest, if the line has one.
pub fn opening_rest(len: usize, rhythm: RhythmMode) -> Option<u8> {
    (len > 1 && rhythm != RhythmMode::Whole).then(|| rhythm.note_duration())
}

/// The role a line note plays against the CF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToneKind {
    /// Consonant with the CF.
    Harmonic,
    /// A dissonance moving on by step in the same direction.
    Passing,
    /// A dissonance returning by step to the note before it.
    Neighbor,
}

/// One note of a generated line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineNote {
    pub pitch: Pitch,
    pub slot: Slot,
    pub kind: ToneKind,
}

/// A generated counterpoint line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterpointLine {
    pub key: Key,
    pub rhythm: RhythmMode,
    /// Opening rest in quarter notes.
    pub opening_rest: Option<u8>,
    pub notes: Vec<LineNote>,
    /// Candidate checks the search spent.
    pub steps: usize,
}

impl CounterpointLine {
    pub fn pitches(&self) -> Vec<Pitch> {
        self.notes.iter().map(|n| n.pitch).collect()
    }
}

/// The role of line note `i` against the CF, judged from `line` alone.
///
/// A dissonance is a neighbor when the line returns to the note before it,
/// and a passing tone otherwise. A consonance on a weak beat, entered by
/// step and left by step in the same direction, is also a passing tone. That
/// last case depends on the note after it, so the result is `None` while
/// that note has not been written yet.
pub fn tone_kind(cantus: &[Pitch], slots: &[Slot], line: &[Pitch], i: usize) -> Option<ToneKind> {
    let slot = slots[i];
    let pitch = line[i];
    let before = i.checked_sub(1).map(|j| line[j]);
    let after = line.get(i + 1).copied();

    if !Interval::between(cantus[slot.measure], pitch).is_consonant() {
        return Some(match (before, after) {
            (Some(b), Some(a)) if b == a => ToneKind::Neighbor,
            _ => ToneKind::Passing,
        });
    }
    let Some(before) = before else {
        return Some(ToneKind::Harmonic);
    };
    let approach = Interval::between(before, pitch);
    if slot.is_strong() || !approach.is_step() {
        return Some(ToneKind::Harmonic);
    }
    let leave = Interval::between(pitch, after?);
    if leave.is_step() && leave.direction() == approach.direction() {
        Some(ToneKind::Passing)
    } else {
        Some(ToneKind::Harmonic)
    }
}

/// Label each note of a finished line as harmonic, passing or neighbor.
pub fn classify_tones(cantus: &[Pitch], slots: &[Slot], line: &[Pitch]) -> Vec<ToneKind> {
    (0..line.len().min(slots.len()))
        .map(|i| tone_kind(cantus, slots, line, i).unwrap_or(ToneKind::Harmonic))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::parse_pitches;

    #[test]
    fn test_rhythm_parsing() {
        assert_eq!("whole".parse::<RhythmMode>().unwrap(), RhythmMode::Whole);
        assert_eq!("HALF".parse::<RhythmMode>().unwrap(), RhythmMode::Half);
        assert_eq!("quater".parse::<RhythmMode>().unwrap(), RhythmMode::Quarter);
        let err = "eighth".parse::<RhythmMode>().unwrap_err();
        assert_eq!(
            err,
            ParseError::Rhythm {
                token: "eighth".to_string()
            }
        );
    }

    #[test]
    fn test_empty_cantus_rejected() {
        assert_eq!(CantusFirmus::new(vec![]).unwrap_err(), GenerateError::EmptyInput);
    }

    #[test]
    fn test_whole_layout_is_one_per_measure() {
        let slots = layout(4, RhythmMode::Whole);
        assert_eq!(slots.len(), 4);
        assert!(slots.iter().all(|s| s.is_strong() && s.duration == 4));
        assert_eq!(opening_rest(4, RhythmMode::Whole), None);
    }

    #[test]
    fn test_half_layout_rests_then_ends_on_whole() {
        let slots = layout(4, RhythmMode::Half);
        // 1 (after rest) + 2 + 2 + 1 final whole note.
        assert_eq!(slots.len(), 6);
        assert_eq!((slots[0].measure, slots[0].beat), (0, 1));
        assert_eq!(slots[5].duration, 4);
        assert_eq!(opening_rest(4, RhythmMode::Half), Some(2));
        let total: u32 = slots.iter().map(|s| s.duration as u32).sum::<u32>() + 2;
        assert_eq!(total, 16);
    }

    #[test]
    fn test_quarter_layout() {
        let slots = layout(3, RhythmMode::Quarter);
        assert_eq!(slots.len(), 3 + 4 + 1);
        assert_eq!(slots.iter().filter(|s| s.is_strong()).count(), 2);
    }

    #[test]
    fn test_single_note_cantus_has_no_rest() {
        for rhythm in RhythmMode::ALL {
            let slots = layout(1, rhythm);
            assert_eq!(slots.len(), 1);
            assert_eq!(slots[0].duration, 4);
            assert_eq!(opening_rest(1, rhythm), None);
        }
    }

    #[test]
    fn test_classify_tones() {
        let cantus = parse_pitches(&["C4", "D4"]).unwrap();
        let slots = layout(2, RhythmMode::Quarter);
        // Rest, then E4 F4 G4 over C4, then F4 over D4.
        let line = parse_pitches(&["E4", "F4", "G4", "F4"]).unwrap();
        let kinds = classify_tones(&cantus, &slots, &line);
        assert_eq!(
            kinds,
            vec![
                ToneKind::Harmonic,
                ToneKind::Passing,
                ToneKind::Harmonic,
                ToneKind::Harmonic
            ]
        );
        let neighbor = parse_pitches(&["E4", "F4", "E4", "F4"]).unwrap();
        assert_eq!(classify_tones(&cantus, &slots, &neighbor)[1], ToneKind::Neighbor);
    }

    #[test]
    fn test_consonant_passing_tone() {
        let cantus = parse_pitches(&["C4", "D4", "C4"]).unwrap();
        let slots = layout(3, RhythmMode::Half);
        // B4 is a sixth over D4 but only passes from A4 to C5.
        let line = parse_pitches(&["G4", "A4", "B4", "C5"]).unwrap();
        assert_eq!(tone_kind(&cantus, &slots, &line[..3], 2), None);
        assert_eq!(tone_kind(&cantus, &slots, &line, 2), Some(ToneKind::Passing));
        assert_eq!(
            classify_tones(&cantus, &slots, &line),
            vec![
                ToneKind::Harmonic,
                ToneKind::Harmonic,
                ToneKind::Passing,
                ToneKind::Harmonic
            ]
        );

        // Turning back instead makes it a chord tone.
        let turned = parse_pitches(&["G4", "A4", "B4", "G4"]).unwrap();
        assert_eq!(tone_kind(&cantus, &slots, &turned, 2), Some(ToneKind::Harmonic));
    }
}
