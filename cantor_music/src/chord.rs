// Chord model: voices, triads, inversions and four-voice voicings.
//
// A `Triad` is the pitch-class template for a scale degree (built by
// `Key::triad`). A `Chord` pairs a triad and an inversion with a concrete
// `Voicing`, one pitch per SATB voice. The bass is always the given input
// note; the upper three voices are what the harmony generator chooses.
//
// Register bands per voice are fixed here and shared with the counterpoint
// generator, whose added line uses the soprano band.
//
// Chords are `Copy` values. The search never edits a chord in place; it
// builds new candidates and discards rejected ones.

use crate::key::Degree;
use crate::pitch::{Pitch, PitchClass};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Voice index in SATB order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Voice {
    Soprano = 0,
    Alto = 1,
    Tenor = 2,
    Bass = 3,
}

impl Voice {
    pub const ALL: [Voice; 4] = [Voice::Soprano, Voice::Alto, Voice::Tenor, Voice::Bass];
    pub const UPPER: [Voice; 3] = [Voice::Soprano, Voice::Alto, Voice::Tenor];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Inclusive semitone band for the voice (C4 = 60).
    pub fn range(self) -> (i16, i16) {
        match self {
            Voice::Soprano => (60, 81), // C4-A5
            Voice::Alto => (53, 74),    // F3-D5
            Voice::Tenor => (48, 69),   // C3-A4
            Voice::Bass => (41, 62),    // F2-D4
        }
    }

    pub fn in_range(self, pitch: Pitch) -> bool {
        let (low, high) = self.range();
        (low..=high).contains(&pitch.semitone())
    }

    pub fn name(self) -> &'static str {
        match self {
            Voice::Soprano => "soprano",
            Voice::Alto => "alto",
            Voice::Tenor => "tenor",
            Voice::Bass => "bass",
        }
    }
}

/// One of the three members of a triad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChordTone {
    Root,
    Third,
    Fifth,
}

impl ChordTone {
    pub const ALL: [ChordTone; 3] = [ChordTone::Root, ChordTone::Third, ChordTone::Fifth];

    /// Scale steps above the root.
    pub fn steps_above_root(self) -> i16 {
        match self {
            ChordTone::Root => 0,
            ChordTone::Third => 2,
            ChordTone::Fifth => 4,
        }
    }
}

/// Which chord tone is in the bass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Inversion {
    Root,
    First,
    Second,
}

impl Inversion {
    pub const ALL: [Inversion; 3] = [Inversion::Root, Inversion::First, Inversion::Second];

    pub fn bass_tone(self) -> ChordTone {
        match self {
            Inversion::Root => ChordTone::Root,
            Inversion::First => ChordTone::Third,
            Inversion::Second => ChordTone::Fifth,
        }
    }

    /// Figured-bass suffix.
    pub fn figure(self) -> &'static str {
        match self {
            Inversion::Root => "",
            Inversion::First => "6",
            Inversion::Second => "64",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriadQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
}

/// A diatonic triad template: degree, spelled members and quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triad {
    pub degree: Degree,
    pub root: PitchClass,
    pub third: PitchClass,
    pub fifth: PitchClass,
    pub quality: TriadQuality,
}

impl Triad {
    pub fn tone(&self, tone: ChordTone) -> PitchClass {
        match tone {
            ChordTone::Root => self.root,
            ChordTone::Third => self.third,
            ChordTone::Fifth => self.fifth,
        }
    }

    /// Which member a sounding pitch is, if any.
    pub fn tone_of(&self, pitch: Pitch) -> Option<ChordTone> {
        ChordTone::ALL
            .into_iter()
            .find(|&t| self.tone(t).matches(pitch))
    }

    /// Roman-numeral label: case follows quality, `°` for diminished, `+`
    /// for augmented.
    pub fn label(&self) -> String {
        let roman = self.degree.roman();
        match self.quality {
            TriadQuality::Major => roman.to_string(),
            TriadQuality::Augmented => format!("{roman}+"),
            TriadQuality::Minor => roman.to_lowercase(),
            TriadQuality::Diminished => format!("{}°", roman.to_lowercase()),
        }
    }
}

/// One pitch per voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Voicing {
    pub soprano: Pitch,
    pub alto: Pitch,
    pub tenor: Pitch,
    pub bass: Pitch,
}

impl Voicing {
    pub fn get(&self, voice: Voice) -> Pitch {
        match voice {
            Voice::Soprano => self.soprano,
            Voice::Alto => self.alto,
            Voice::Tenor => self.tenor,
            Voice::Bass => self.bass,
        }
    }

    /// Pitches in `Voice::ALL` order, top down.
    pub fn pitches(&self) -> [Pitch; 4] {
        [self.soprano, self.alto, self.tenor, self.bass]
    }
}

/// How the four voices cover the three chord tones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Doubling {
    Root,
    Third,
    Fifth,
    /// Three roots and a third, no fifth.
    TripledRoot,
    /// Any other incomplete or non-triadic spread.
    Incomplete,
}

impl Doubling {
    /// Lower is preferred when ordering candidates.
    pub fn preference(self) -> u8 {
        match self {
            Doubling::Root => 0,
            Doubling::Fifth => 1,
            Doubling::TripledRoot => 2,
            Doubling::Third => 3,
            Doubling::Incomplete => 4,
        }
    }
}

/// A voiced triad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chord {
    pub triad: Triad,
    pub inversion: Inversion,
    pub voicing: Voicing,
}

impl Chord {
    pub fn pitch(&self, voice: Voice) -> Pitch {
        self.voicing.get(voice)
    }

    /// Count of voices on root, third and fifth, or `None` if some voice is
    /// not a chord tone.
    pub fn tone_counts(&self) -> Option<[u8; 3]> {
        let mut counts = [0u8; 3];
        for pitch in self.voicing.pitches() {
            let tone = self.triad.tone_of(pitch)?;
            counts[tone as usize] += 1;
        }
        Some(counts)
    }

    pub fn doubling(&self) -> Doubling {
        match self.tone_counts() {
            Some([2, 1, 1]) => Doubling::Root,
            Some([1, 2, 1]) => Doubling::Third,
            Some([1, 1, 2]) => Doubling::Fifth,
            Some([3, 1, 0]) => Doubling::TripledRoot,
            _ => Doubling::Incomplete,
        }
    }

    /// e.g. `V`, `ii6`, `I64`.
    pub fn label(&self) -> String {
        format!("{}{}", self.triad.label(), self.inversion.figure())
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = &self.voicing;
        write!(
            f,
            "{} [{} {} {} {}]",
            self.label(),
            v.bass,
            v.tenor,
            v.alto,
            v.soprano
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Key;

    fn p(s: &str) -> Pitch {
        s.parse().unwrap()
    }

    fn chord(degree: Degree, inversion: Inversion, satb: [&str; 4]) -> Chord {
        Chord {
            triad: Key::c_major().triad(degree),
            inversion,
            voicing: Voicing {
                soprano: p(satb[0]),
                alto: p(satb[1]),
                tenor: p(satb[2]),
                bass: p(satb[3]),
            },
        }
    }

    #[test]
    fn test_voice_ranges() {
        assert!(Voice::Soprano.in_range(p("A5")));
        assert!(!Voice::Soprano.in_range(p("B5")));
        assert!(Voice::Bass.in_range(p("F2")));
        assert!(!Voice::Bass.in_range(p("E2")));
        assert!(Voice::Tenor.in_range(p("C3")));
    }

    #[test]
    fn test_doubling_detection() {
        let root = chord(Degree::I, Inversion::Root, ["C5", "G4", "E4", "C3"]);
        assert_eq!(root.doubling(), Doubling::Root);
        let fifth = chord(Degree::I, Inversion::Root, ["G4", "E4", "G3", "C3"]);
        assert_eq!(fifth.doubling(), Doubling::Fifth);
        let tripled = chord(Degree::I, Inversion::Root, ["C5", "E4", "C4", "C3"]);
        assert_eq!(tripled.doubling(), Doubling::TripledRoot);
        let open_fifth = chord(Degree::I, Inversion::Root, ["C5", "G4", "C4", "C3"]);
        assert_eq!(open_fifth.doubling(), Doubling::Incomplete);
        let foreign = chord(Degree::I, Inversion::Root, ["D5", "G4", "E4", "C3"]);
        assert_eq!(foreign.tone_counts(), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(chord(Degree::V, Inversion::Root, ["D5", "B4", "G4", "G3"]).label(), "V");
        assert_eq!(chord(Degree::II, Inversion::First, ["D5", "A4", "D4", "F3"]).label(), "ii6");
        assert_eq!(
            chord(Degree::VII, Inversion::First, ["B4", "F4", "D4", "D3"]).label(),
            "vii°6"
        );
        assert_eq!(chord(Degree::I, Inversion::Second, ["C5", "E4", "C4", "G2"]).label(), "I64");
    }

    #[test]
    fn test_tone_of_ignores_octave() {
        let triad = Key::c_major().triad(Degree::IV);
        assert_eq!(triad.tone_of(p("A2")), Some(ChordTone::Third));
        assert_eq!(triad.tone_of(p("C6")), Some(ChordTone::Fifth));
        assert_eq!(triad.tone_of(p("B4")), None);
    }
}
