// Key and scale model for tonal harmony.
//
// A `Key` is a spelled tonic plus a `Mode` (major or minor). Its scale is
// spelled letter by letter from the tonic, so F major gets Bb rather than
// A#, and every degree gets a distinct letter. Minor keys use the harmonic
// form: the seventh degree is raised so that it is a leading tone a half step
// below the tonic, which is what both the dominant triad and the
// leading-tone rule need.
//
// This module provides:
// - Scale degrees (`Degree`, I..VII) and their spelled pitch classes
// - Degree lookup for a sounding pitch (enharmonic-insensitive)
// - Diatonic triads on each degree, with quality (see chord.rs for `Triad`)
// - Spelled diatonic pitches within a semitone range, used as the candidate
//   pool by both generators
//
// Used by chord.rs and harmony.rs for chord enumeration, and by
// counterpoint.rs for the line's candidate pool.

use crate::chord::{Triad, TriadQuality};
use crate::error::ParseError;
use crate::pitch::{Letter, Pitch, PitchClass};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Major or (harmonic) minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Major, Mode::Minor];

    /// Semitones from the tonic to each degree.
    pub fn intervals(self) -> [i16; 7] {
        match self {
            Mode::Major => [0, 2, 4, 5, 7, 9, 11],
            Mode::Minor => [0, 2, 3, 5, 7, 8, 11],
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        })
    }
}

impl FromStr for Mode {
    type Err = ParseError;

    /// Case-insensitive; `MAJOR`, `minor`, `maj` and `min` are all accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" | "maj" => Ok(Mode::Major),
            "minor" | "min" => Ok(Mode::Minor),
            _ => Err(ParseError::Mode {
                token: s.trim().to_string(),
            }),
        }
    }
}

/// A scale degree, I (tonic) through VII (leading tone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Degree {
    I,
    II,
    III,
    IV,
    V,
    VI,
    VII,
}

impl Degree {
    pub const ALL: [Degree; 7] = [
        Degree::I,
        Degree::II,
        Degree::III,
        Degree::IV,
        Degree::V,
        Degree::VI,
        Degree::VII,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// The degree `steps` scale steps away, wrapping around the octave.
    pub fn offset(self, steps: i16) -> Degree {
        Degree::ALL[(self as i16 + steps).rem_euclid(7) as usize]
    }

    pub fn roman(self) -> &'static str {
        ["I", "II", "III", "IV", "V", "VI", "VII"][self as usize]
    }
}

impl fmt::Display for Degree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.roman())
    }
}

/// A tonic and mode. Immutable for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub tonic: PitchClass,
    pub mode: Mode,
}

impl Key {
    pub fn new(tonic: PitchClass, mode: Mode) -> Self {
        Key { tonic, mode }
    }

    /// Parse a tonic token (`C`, `F#`, `Bb`) and a mode token.
    pub fn parse(tonic: &str, mode: &str) -> Result<Self, ParseError> {
        Ok(Key::new(tonic.parse()?, mode.parse()?))
    }

    pub fn c_major() -> Self {
        Key::new(PitchClass::new(Letter::C, 0), Mode::Major)
    }

    /// The seven spelled scale pitch classes, tonic first.
    pub fn scale(&self) -> [PitchClass; 7] {
        let intervals = self.mode.intervals();
        let tonic_semitone = self.tonic.semitone();
        std::array::from_fn(|i| {
            let letter = Letter::from_index(self.tonic.letter.index() + i as i16);
            let target = (tonic_semitone + intervals[i]).rem_euclid(12);
            let mut accidental = (target - letter.natural_semitone()).rem_euclid(12);
            if accidental > 6 {
                accidental -= 12;
            }
            PitchClass::new(letter, accidental as i8)
        })
    }

    pub fn degree(&self, degree: Degree) -> PitchClass {
        self.scale()[degree.index()]
    }

    pub fn leading_tone(&self) -> PitchClass {
        self.degree(Degree::VII)
    }

    /// The degree a pitch sounds in this key, matched by semitone class.
    pub fn degree_of(&self, pitch: Pitch) -> Option<Degree> {
        self.scale()
            .iter()
            .position(|pc| pc.matches(pitch))
            .map(|i| Degree::ALL[i])
    }

    pub fn contains(&self, pitch: Pitch) -> bool {
        self.degree_of(pitch).is_some()
    }

    pub fn is_leading_tone(&self, pitch: Pitch) -> bool {
        self.leading_tone().matches(pitch)
    }

    pub fn is_tonic(&self, pitch: Pitch) -> bool {
        self.tonic.matches(pitch)
    }

    /// The diatonic triad with its root on `degree`.
    pub fn triad(&self, degree: Degree) -> Triad {
        let root = self.degree(degree);
        let third = self.degree(degree.offset(2));
        let fifth = self.degree(degree.offset(4));
        let third_span = (third.semitone() - root.semitone()).rem_euclid(12);
        let fifth_span = (fifth.semitone() - root.semitone()).rem_euclid(12);
        let quality = match (third_span, fifth_span) {
            (4, 8) => TriadQuality::Augmented,
            (4, _) => TriadQuality::Major,
            (_, 6) => TriadQuality::Diminished,
            _ => TriadQuality::Minor,
        };
        Triad {
            degree,
            root,
            third,
            fifth,
            quality,
        }
    }

    /// Spelled diatonic pitches with semitone values in `low..=high`,
    /// ascending.
    pub fn pitches_in_range(&self, low: i16, high: i16) -> Vec<Pitch> {
        let scale = self.scale();
        (low..=high)
            .filter_map(|s| scale.iter().find_map(|pc| pc.at_semitone(s)))
            .collect()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic, self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(tonic: &str, mode: &str) -> Key {
        Key::parse(tonic, mode).unwrap()
    }

    fn names(pcs: &[PitchClass]) -> Vec<String> {
        pcs.iter().map(|pc| pc.to_string()).collect()
    }

    #[test]
    fn test_major_scales_are_spelled() {
        assert_eq!(names(&key("C", "major").scale()), ["C", "D", "E", "F", "G", "A", "B"]);
        assert_eq!(names(&key("F", "major").scale()), ["F", "G", "A", "Bb", "C", "D", "E"]);
        assert_eq!(names(&key("D", "major").scale()), ["D", "E", "F#", "G", "A", "B", "C#"]);
    }

    #[test]
    fn test_minor_uses_raised_seventh() {
        let g_minor = key("G", "MINOR");
        assert_eq!(names(&g_minor.scale()), ["G", "A", "Bb", "C", "D", "Eb", "F#"]);
        assert_eq!(g_minor.leading_tone().to_string(), "F#");
        assert_eq!(key("A", "minor").leading_tone().to_string(), "G#");
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("MAJOR".parse::<Mode>().unwrap(), Mode::Major);
        assert_eq!("Minor".parse::<Mode>().unwrap(), Mode::Minor);
        assert!(matches!("dorian".parse::<Mode>(), Err(ParseError::Mode { .. })));
        assert!(matches!(Key::parse("H", "major"), Err(ParseError::Tonic { .. })));
    }

    #[test]
    fn test_degree_of() {
        let c = Key::c_major();
        assert_eq!(c.degree_of("G3".parse().unwrap()), Some(Degree::V));
        assert_eq!(c.degree_of("B4".parse().unwrap()), Some(Degree::VII));
        assert_eq!(c.degree_of("C#4".parse().unwrap()), None);
        let f = key("F", "major");
        assert_eq!(f.degree_of("A#3".parse().unwrap()), Some(Degree::IV), "enharmonic Bb");
    }

    #[test]
    fn test_triad_qualities() {
        let c = Key::c_major();
        let qualities: Vec<TriadQuality> =
            Degree::ALL.iter().map(|&d| c.triad(d).quality).collect();
        assert_eq!(
            qualities,
            vec![
                TriadQuality::Major,
                TriadQuality::Minor,
                TriadQuality::Minor,
                TriadQuality::Major,
                TriadQuality::Major,
                TriadQuality::Minor,
                TriadQuality::Diminished,
            ]
        );
        let a_minor = key("A", "minor");
        assert_eq!(a_minor.triad(Degree::V).quality, TriadQuality::Major);
        assert_eq!(a_minor.triad(Degree::V).third.to_string(), "G#");
        assert_eq!(a_minor.triad(Degree::III).quality, TriadQuality::Augmented);
        assert_eq!(a_minor.triad(Degree::II).quality, TriadQuality::Diminished);
    }

    #[test]
    fn test_pitches_in_range() {
        let pitches = Key::c_major().pitches_in_range(60, 72);
        let names: Vec<String> = pitches.iter().map(|p| p.to_string()).collect();
        assert_eq!(names, ["C4", "D4", "E4", "F4", "G4", "A4", "B4", "C5"]);
        let d = key("D", "major").pitches_in_range(60, 64);
        let names: Vec<String> = d.iter().map(|p| p.to_string()).collect();
        assert_eq!(names, ["C#4", "D4", "E4"]);
    }

    #[test]
    fn test_degree_offset_wraps() {
        assert_eq!(Degree::VI.offset(2), Degree::I);
        assert_eq!(Degree::II.offset(-4), Degree::V);
    }
}
