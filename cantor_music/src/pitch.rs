// Pitch model: spelled pitches, pitch classes, intervals and motion.
//
// A `Pitch` is a letter, an accidental (semitone offset, flats negative) and a
// scientific-pitch octave, so C4 is middle C with semitone value 60 (the MIDI
// numbering). Spelling is kept because interval quality depends on it (C-E
// is a major third, C-Fb a diminished fourth), but equality, ordering and
// hashing go by semitone value only: F#4 == Gb4.
//
// `Interval` carries both a signed diatonic step count and a signed semitone
// count, from which size (unison..octave after octave reduction), quality and
// consonance follow. `Motion` classifies how two voices move relative to each
// other and is what the parallel/hidden-perfect rules in voice_leading.rs and
// counterpoint_rules.rs are phrased in terms of.
//
// Tokens parse as `<Letter><#...|b...><Octave>`, e.g. `C4`, `F#3`, `Bb2`. At
// most a double sharp or double flat is accepted; anything else (including
// `Cx4`) is a `ParseError`.

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Largest accidental accepted in either direction.
pub const MAX_ACCIDENTAL: i8 = 2;

/// Semitone offsets of the natural letters from C.
const NATURAL_SEMITONES: [i16; 7] = [0, 2, 4, 5, 7, 9, 11];

// ── Letters and pitch classes ──

/// A note letter, in scale order from C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Letter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Letter {
    pub const ALL: [Letter; 7] = [
        Letter::C,
        Letter::D,
        Letter::E,
        Letter::F,
        Letter::G,
        Letter::A,
        Letter::B,
    ];

    /// Position in the C-based letter cycle (C = 0 .. B = 6).
    pub fn index(self) -> i16 {
        self as i16
    }

    /// The letter `index` steps above C, wrapping every seven.
    pub fn from_index(index: i16) -> Letter {
        Letter::ALL[index.rem_euclid(7) as usize]
    }

    pub fn natural_semitone(self) -> i16 {
        NATURAL_SEMITONES[self as usize]
    }

    /// Accepts upper or lower case.
    pub fn from_char(c: char) -> Option<Letter> {
        match c.to_ascii_uppercase() {
            'C' => Some(Letter::C),
            'D' => Some(Letter::D),
            'E' => Some(Letter::E),
            'F' => Some(Letter::F),
            'G' => Some(Letter::G),
            'A' => Some(Letter::A),
            'B' => Some(Letter::B),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        b"CDEFGAB"[self as usize] as char
    }
}

/// A spelled pitch class: letter plus accidental, no octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PitchClass {
    pub letter: Letter,
    pub accidental: i8,
}

impl PitchClass {
    pub const fn new(letter: Letter, accidental: i8) -> Self {
        PitchClass { letter, accidental }
    }

    /// Semitone class 0..12 (C = 0).
    pub fn semitone(self) -> i16 {
        (self.letter.natural_semitone() + self.accidental as i16).rem_euclid(12)
    }

    pub fn in_octave(self, octave: i8) -> Pitch {
        Pitch::new(self.letter, self.accidental, octave)
    }

    /// The pitch spelled with this class whose semitone value is `semitone`,
    /// if the semitone belongs to the class.
    pub fn at_semitone(self, semitone: i16) -> Option<Pitch> {
        let base = self.letter.natural_semitone() + self.accidental as i16;
        let offset = semitone - base;
        if offset.rem_euclid(12) != 0 {
            return None;
        }
        let octave = offset.div_euclid(12) - 1;
        Some(self.in_octave(octave as i8))
    }

    /// Every pitch of this class with a semitone value in `low..=high`.
    pub fn pitches_in_range(self, low: i16, high: i16) -> Vec<Pitch> {
        (low..=high).filter_map(|s| self.at_semitone(s)).collect()
    }

    /// True if `pitch` sounds this class (enharmonics included).
    pub fn matches(self, pitch: Pitch) -> bool {
        pitch.semitone().rem_euclid(12) == self.semitone()
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.letter.as_char(), accidental_text(self.accidental))
    }
}

impl FromStr for PitchClass {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        let fail = |reason| ParseError::Tonic {
            token: token.to_string(),
            reason,
        };
        let mut chars = token.chars();
        let letter = chars
            .next()
            .and_then(Letter::from_char)
            .ok_or_else(|| fail("expected a note letter A-G"))?;
        let accidental = parse_accidentals(chars.as_str()).map_err(fail)?;
        Ok(PitchClass::new(letter, accidental))
    }
}

impl From<PitchClass> for String {
    fn from(pc: PitchClass) -> String {
        pc.to_string()
    }
}

impl TryFrom<String> for PitchClass {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

fn accidental_text(accidental: i8) -> String {
    let symbol = if accidental >= 0 { "#" } else { "b" };
    symbol.repeat(accidental.unsigned_abs() as usize)
}

/// Parse a run of `#` or `b` characters. An empty run is a natural.
fn parse_accidentals(text: &str) -> Result<i8, &'static str> {
    if text.is_empty() {
        return Ok(0);
    }
    let sharps = text.chars().all(|c| c == '#');
    let flats = text.chars().all(|c| c == 'b');
    if !sharps && !flats {
        return Err("accidentals must be all '#' or all 'b'");
    }
    let count = text.chars().count();
    if count > MAX_ACCIDENTAL as usize {
        return Err("at most two accidentals are allowed");
    }
    let count = count as i8;
    Ok(if sharps { count } else { -count })
}

// ── Pitches ──

/// An immutable spelled pitch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Pitch {
    pub letter: Letter,
    pub accidental: i8,
    pub octave: i8,
}

impl Pitch {
    pub const fn new(letter: Letter, accidental: i8, octave: i8) -> Self {
        Pitch {
            letter,
            accidental,
            octave,
        }
    }

    pub const fn natural(letter: Letter, octave: i8) -> Self {
        Pitch::new(letter, 0, octave)
    }

    /// Semitone value; C4 = 60.
    pub fn semitone(self) -> i16 {
        (self.octave as i16 + 1) * 12 + self.letter.natural_semitone() + self.accidental as i16
    }

    /// Diatonic position ignoring accidentals; one unit per letter step.
    pub fn diatonic_index(self) -> i16 {
        self.octave as i16 * 7 + self.letter.index()
    }

    pub fn pitch_class(self) -> PitchClass {
        PitchClass::new(self.letter, self.accidental)
    }

    /// The interval from `self` up (or down) to `other`.
    pub fn interval_to(self, other: Pitch) -> Interval {
        Interval::between(self, other)
    }
}

impl PartialEq for Pitch {
    fn eq(&self, other: &Self) -> bool {
        self.semitone() == other.semitone()
    }
}

impl Eq for Pitch {}

impl Hash for Pitch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.semitone().hash(state);
    }
}

impl PartialOrd for Pitch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pitch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.semitone().cmp(&other.semitone())
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class(), self.octave)
    }
}

impl FromStr for Pitch {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        let fail = |reason| ParseError::Pitch {
            token: token.to_string(),
            reason,
        };
        if token.is_empty() {
            return Err(fail("empty token"));
        }
        let mut chars = token.chars();
        let letter = chars
            .next()
            .and_then(Letter::from_char)
            .ok_or_else(|| fail("expected a note letter A-G"))?;
        let rest = chars.as_str();
        let digits_at = rest
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| fail("missing octave number"))?;
        let (accidentals, octave) = rest.split_at(digits_at);
        let accidental = parse_accidentals(accidentals).map_err(fail)?;
        if !octave.chars().all(|c| c.is_ascii_digit()) {
            return Err(fail("octave must be a number"));
        }
        let octave: i8 = octave
            .parse()
            .ok()
            .filter(|o| (0..=9).contains(o))
            .ok_or_else(|| fail("octave must be between 0 and 9"))?;
        Ok(Pitch::new(letter, accidental, octave))
    }
}

impl From<Pitch> for String {
    fn from(p: Pitch) -> String {
        p.to_string()
    }
}

impl TryFrom<String> for Pitch {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Parse a whole token list, failing on the first malformed token.
pub fn parse_pitches<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<Pitch>, ParseError> {
    tokens.iter().map(|t| t.as_ref().parse()).collect()
}

// ── Intervals ──

/// Interval size after octave reduction. Compound octaves stay `Octave`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntervalSize {
    Unison,
    Second,
    Third,
    Fourth,
    Fifth,
    Sixth,
    Seventh,
    Octave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    Perfect,
    Major,
    Minor,
    Augmented,
    Diminished,
}

impl Quality {
    fn symbol(self) -> &'static str {
        match self {
            Quality::Perfect => "P",
            Quality::Major => "M",
            Quality::Minor => "m",
            Quality::Augmented => "A",
            Quality::Diminished => "d",
        }
    }
}

/// The distance between two spelled pitches, signed from the first to the
/// second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    /// Letter steps (0 = unison, 2 = third, 7 = octave). Negative descends.
    pub steps: i16,
    pub semitones: i16,
}

impl Interval {
    pub fn between(from: Pitch, to: Pitch) -> Interval {
        Interval {
            steps: to.diatonic_index() - from.diatonic_index(),
            semitones: to.semitone() - from.semitone(),
        }
    }

    /// +1 ascending, -1 descending, 0 for a (possibly altered) unison that
    /// does not change pitch.
    pub fn direction(self) -> i16 {
        if self.steps != 0 {
            self.steps.signum()
        } else {
            self.semitones.signum()
        }
    }

    pub fn abs_steps(self) -> i16 {
        self.steps.abs()
    }

    pub fn abs_semitones(self) -> i16 {
        self.semitones.abs()
    }

    /// Interval number: 1 for a unison, 8 for an octave, 10 for a tenth.
    pub fn number(self) -> i16 {
        self.abs_steps() + 1
    }

    pub fn is_step(self) -> bool {
        self.abs_steps() == 1
    }

    pub fn size(self) -> IntervalSize {
        let steps = self.abs_steps();
        if steps == 0 {
            return IntervalSize::Unison;
        }
        match steps % 7 {
            0 => IntervalSize::Octave,
            1 => IntervalSize::Second,
            2 => IntervalSize::Third,
            3 => IntervalSize::Fourth,
            4 => IntervalSize::Fifth,
            5 => IntervalSize::Sixth,
            _ => IntervalSize::Seventh,
        }
    }

    pub fn quality(self) -> Quality {
        let steps = self.abs_steps();
        let simple = (steps % 7) as usize;
        let reference = (steps / 7) * 12 + NATURAL_SEMITONES[simple];
        let span = if self.steps == 0 {
            self.abs_semitones()
        } else {
            self.semitones * self.steps.signum()
        };
        let deviation = span - reference;
        if matches!(simple, 0 | 3 | 4) {
            match deviation.cmp(&0) {
                Ordering::Equal => Quality::Perfect,
                Ordering::Greater => Quality::Augmented,
                Ordering::Less => Quality::Diminished,
            }
        } else {
            match deviation {
                0 => Quality::Major,
                -1 => Quality::Minor,
                d if d > 0 => Quality::Augmented,
                _ => Quality::Diminished,
            }
        }
    }

    /// Unison, fifth or octave (and compounds), perfect quality.
    pub fn is_perfect_consonance(self) -> bool {
        self.quality() == Quality::Perfect
            && matches!(
                self.size(),
                IntervalSize::Unison | IntervalSize::Fifth | IntervalSize::Octave
            )
    }

    /// Perfect unison/fifth/octave or major/minor third/sixth. The perfect
    /// fourth counts as dissonant, as it does above a bass.
    pub fn is_consonant(self) -> bool {
        match self.size() {
            IntervalSize::Unison | IntervalSize::Fifth | IntervalSize::Octave => {
                self.quality() == Quality::Perfect
            }
            IntervalSize::Third | IntervalSize::Sixth => {
                matches!(self.quality(), Quality::Major | Quality::Minor)
            }
            _ => false,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.direction() < 0 { "-" } else { "" };
        write!(f, "{}{}{}", sign, self.quality().symbol(), self.number())
    }
}

// ── Motion ──

/// How two voices move between consecutive sonorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Motion {
    /// Neither voice moves.
    Static,
    /// Exactly one voice moves.
    Oblique,
    /// Both voices move in the same direction.
    Similar,
    /// The voices move in opposite directions.
    Contrary,
}

impl Motion {
    pub fn between(lower: (Pitch, Pitch), upper: (Pitch, Pitch)) -> Motion {
        let lower_dir = (lower.1.semitone() - lower.0.semitone()).signum();
        let upper_dir = (upper.1.semitone() - upper.0.semitone()).signum();
        match (lower_dir, upper_dir) {
            (0, 0) => Motion::Static,
            (0, _) | (_, 0) => Motion::Oblique,
            (l, u) if l == u => Motion::Similar,
            _ => Motion::Contrary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Pitch {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(p("C4").to_string(), "C4");
        assert_eq!(p("F#3").to_string(), "F#3");
        assert_eq!(p("Bbb2").to_string(), "Bbb2");
        assert_eq!(p(" g5 ").to_string(), "G5");
    }

    #[test]
    fn test_semitone_values() {
        assert_eq!(p("C4").semitone(), 60);
        assert_eq!(p("A4").semitone(), 69);
        assert_eq!(p("F#3").semitone(), 54);
        assert_eq!(p("B#3").semitone(), 60);
        assert_eq!(p("Cb4").semitone(), 59);
    }

    #[test]
    fn test_equality_is_enharmonic() {
        assert_eq!(p("F#4"), p("Gb4"));
        assert!(p("B3") < p("C4"));
        assert_eq!(p("Gb4").to_string(), "Gb4", "spelling survives equality");
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        for token in ["Cx4", "H4", "C", "C#b4", "C###4", "", "C4x", "C10"] {
            let err = token.parse::<Pitch>().unwrap_err();
            match err {
                ParseError::Pitch { token: t, .. } => assert_eq!(t, token.trim()),
                other => panic!("expected pitch error for {token}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_pitches_stops_at_bad_token() {
        let err = parse_pitches(&["C4", "Cx4", "D4"]).unwrap_err();
        assert!(err.to_string().contains("Cx4"), "got {}", err);
    }

    #[test]
    fn test_interval_quality_and_name() {
        let cases = [
            ("C4", "G4", "P5"),
            ("C4", "E4", "M3"),
            ("E4", "C4", "-M3"),
            ("A3", "C4", "m3"),
            ("F4", "B4", "A4"),
            ("B3", "F4", "d5"),
            ("C4", "C5", "P8"),
            ("C3", "E4", "M10"),
            ("C4", "C#4", "A1"),
            ("G#3", "F4", "d7"),
            ("C4", "Fb4", "d4"),
        ];
        for (a, b, name) in cases {
            assert_eq!(
                Interval::between(p(a), p(b)).to_string(),
                name,
                "interval {a}->{b}"
            );
        }
    }

    #[test]
    fn test_interval_size_reduces_compounds() {
        assert_eq!(Interval::between(p("C3"), p("G4")).size(), IntervalSize::Fifth);
        assert_eq!(Interval::between(p("C3"), p("C5")).size(), IntervalSize::Octave);
        assert_eq!(Interval::between(p("C4"), p("C4")).size(), IntervalSize::Unison);
    }

    #[test]
    fn test_consonance() {
        assert!(Interval::between(p("C4"), p("E4")).is_consonant());
        assert!(Interval::between(p("C4"), p("A5")).is_consonant());
        assert!(!Interval::between(p("C4"), p("F4")).is_consonant(), "fourth");
        assert!(!Interval::between(p("B3"), p("F4")).is_consonant(), "tritone");
        assert!(!Interval::between(p("C4"), p("D4")).is_consonant());
        assert!(Interval::between(p("C3"), p("G5")).is_perfect_consonance());
        assert!(!Interval::between(p("C4"), p("E4")).is_perfect_consonance());
    }

    #[test]
    fn test_pitch_class_at_semitone() {
        let b_sharp = PitchClass::new(Letter::B, 1);
        assert_eq!(b_sharp.at_semitone(60).map(|x| x.to_string()), Some("B#3".into()));
        let c_flat = PitchClass::new(Letter::C, -1);
        assert_eq!(c_flat.at_semitone(59).map(|x| x.to_string()), Some("Cb4".into()));
        assert!(PitchClass::new(Letter::C, 0).at_semitone(61).is_none());
        let es = PitchClass::new(Letter::E, 0).pitches_in_range(48, 72);
        let names: Vec<String> = es.iter().map(|x| x.to_string()).collect();
        assert_eq!(names, vec!["E3", "E4"]);
    }

    #[test]
    fn test_motion_classification() {
        assert_eq!(Motion::between((p("C3"), p("D3")), (p("E4"), p("F4"))), Motion::Similar);
        assert_eq!(Motion::between((p("C3"), p("D3")), (p("E4"), p("D4"))), Motion::Contrary);
        assert_eq!(Motion::between((p("C3"), p("C3")), (p("E4"), p("D4"))), Motion::Oblique);
        assert_eq!(Motion::between((p("C3"), p("C3")), (p("E4"), p("E4"))), Motion::Static);
    }

    #[test]
    fn test_serde_uses_note_names() {
        let json = serde_json::to_string(&p("F#3")).unwrap();
        assert_eq!(json, "\"F#3\"");
        let back: Pitch = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_string(), "F#3");
        assert!(serde_json::from_str::<Pitch>("\"Cx4\"").is_err());
    }
}
