// Voice-leading rules for four-voice harmony.
//
// Every rule is a small struct implementing `HarmonyRule`: a pure predicate
// over a `VoicingContext` (key, position, the chords already accepted, the
// candidate chord, and the next bass note). `HarmonyRules` is an ordered
// collection of boxed rules; the harmony generator only ever asks it for the
// first violation, while tests and `--explain` can ask for all of them.
//
// Rules, roughly in the order they are checked (cheap intra-chord checks
// first so the search rejects most candidates early):
//
// Intra-chord: voice range, strict voice order, spacing, chord membership and
//   completeness, doubling legality, six-four usage.
// Between chords: parallel perfects (any pair), hidden perfects (outer
//   voices), overlap, leading-tone resolution, melodic leaps.
//
// Known gap: a leading tone in V moving to VI is not required to rise. The
// rule skips that step and harmony.rs attaches an `UnsupportedProgression`
// diagnostic when the leading tone in fact does not resolve.

use crate::chord::{Chord, Doubling, Inversion, TriadQuality, Voice};
use crate::diagnostics::RuleViolation;
use crate::key::{Degree, Key};
use crate::pitch::{Interval, Motion, Pitch, Quality};

/// Everything a rule may look at when judging one candidate.
#[derive(Debug, Clone, Copy)]
pub struct VoicingContext<'a> {
    pub key: &'a Key,
    /// Index of the candidate in the progression.
    pub position: usize,
    /// Chords accepted before `position`, in order.
    pub history: &'a [Chord],
    pub candidate: &'a Chord,
    /// Bass note of the following position, if there is one.
    pub next_bass: Option<Pitch>,
}

impl<'a> VoicingContext<'a> {
    pub fn previous(&self) -> Option<&'a Chord> {
        self.history.last()
    }

    /// The chord two positions back.
    pub fn before_previous(&self) -> Option<&'a Chord> {
        self.history.len().checked_sub(2).map(|i| &self.history[i])
    }

    fn violation(&self, rule: &'static str, description: String) -> RuleViolation {
        RuleViolation::new(rule, vec![self.position], description)
    }

    fn step_violation(&self, rule: &'static str, description: String) -> RuleViolation {
        let positions = match self.position.checked_sub(1) {
            Some(prev) => vec![prev, self.position],
            None => vec![self.position],
        };
        RuleViolation::new(rule, positions, description)
    }
}

/// A single voice-leading predicate.
pub trait HarmonyRule {
    fn name(&self) -> &'static str;
    fn evaluate(&self, ctx: &VoicingContext) -> Result<(), RuleViolation>;
}

/// An ordered set of harmony rules.
pub struct HarmonyRules {
    rules: Vec<Box<dyn HarmonyRule>>,
}

impl HarmonyRules {
    /// The full classical rule set.
    pub fn standard() -> Self {
        HarmonyRules {
            rules: vec![
                Box::new(VoiceRange),
                Box::new(VoiceOrder),
                Box::new(Spacing),
                Box::new(ChordMembership),
                Box::new(DoublingRule),
                Box::new(SixFourUsage),
                Box::new(ParallelPerfects),
                Box::new(HiddenPerfects),
                Box::new(VoiceOverlap),
                Box::new(LeadingToneResolution),
                Box::new(MelodicLeaps),
            ],
        }
    }

    pub fn empty() -> Self {
        HarmonyRules { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: Box<dyn HarmonyRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// First violation, in rule order.
    pub fn check(&self, ctx: &VoicingContext) -> Result<(), RuleViolation> {
        self.rules.iter().try_for_each(|rule| rule.evaluate(ctx))
    }

    /// Every violation the candidate triggers.
    pub fn violations(&self, ctx: &VoicingContext) -> Vec<RuleViolation> {
        self.rules
            .iter()
            .filter_map(|rule| rule.evaluate(ctx).err())
            .collect()
    }

    /// Check a whole progression chord by chord.
    pub fn validate(&self, key: &Key, chords: &[Chord]) -> Vec<RuleViolation> {
        (0..chords.len())
            .flat_map(|i| {
                let ctx = VoicingContext {
                    key,
                    position: i,
                    history: &chords[..i],
                    candidate: &chords[i],
                    next_bass: chords.get(i + 1).map(|c| c.voicing.bass),
                };
                self.violations(&ctx)
            })
            .collect()
    }
}

/// Adjacent voice pairs, upper voice first.
const ADJACENT_PAIRS: [(Voice, Voice); 3] = [
    (Voice::Soprano, Voice::Alto),
    (Voice::Alto, Voice::Tenor),
    (Voice::Tenor, Voice::Bass),
];

/// Every voice pair, upper voice first.
const ALL_PAIRS: [(Voice, Voice); 6] = [
    (Voice::Soprano, Voice::Alto),
    (Voice::Soprano, Voice::Tenor),
    (Voice::Soprano, Voice::Bass),
    (Voice::Alto, Voice::Tenor),
    (Voice::Alto, Voice::Bass),
    (Voice::Tenor, Voice::Bass),
];

/// Semitone class (0..12) of the interval from `lower` up to `upper`.
fn interval_class(lower: Pitch, upper: Pitch) -> i16 {
    (upper.semitone() - lower.semitone()).rem_euclid(12)
}

fn perfect_name(class: i16) -> &'static str {
    if class == 7 { "fifths" } else { "octaves" }
}

// ── Intra-chord rules ──

/// Every voice inside its register band.
pub struct VoiceRange;

impl HarmonyRule for VoiceRange {
    fn name(&self) -> &'static str {
        "voice-range"
    }

    fn evaluate(&self, ctx: &VoicingContext) -> Result<(), RuleViolation> {
        for voice in Voice::ALL {
            let pitch = ctx.candidate.pitch(voice);
            if !voice.in_range(pitch) {
                return Err(ctx.violation(
                    self.name(),
                    format!("{} {} is outside its register", voice.name(), pitch),
                ));
            }
        }
        Ok(())
    }
}

/// Soprano > alto > tenor > bass, no unisons or crossings.
pub struct VoiceOrder;

impl HarmonyRule for VoiceOrder {
    fn name(&self) -> &'static str {
        "voice-order"
    }

    fn evaluate(&self, ctx: &VoicingContext) -> Result<(), RuleViolation> {
        for (upper, lower) in ADJACENT_PAIRS {
            let (hi, lo) = (ctx.candidate.pitch(upper), ctx.candidate.pitch(lower));
            if hi <= lo {
                return Err(ctx.violation(
                    self.name(),
                    format!("{} {} is not above {} {}", upper.name(), hi, lower.name(), lo),
                ));
            }
        }
        Ok(())
    }
}

/// Adjacent upper voices at most an octave apart.
pub struct Spacing;

impl HarmonyRule for Spacing {
    fn name(&self) -> &'static str {
        "spacing"
    }

    fn evaluate(&self, ctx: &VoicingContext) -> Result<(), RuleViolation> {
        for (upper, lower) in [(Voice::Soprano, Voice::Alto), (Voice::Alto, Voice::Tenor)] {
            let gap = ctx.candidate.pitch(upper).semitone() - ctx.candidate.pitch(lower).semitone();
            if gap > 12 {
                return Err(ctx.violation(
                    self.name(),
                    format!("{} and {} are more than an octave apart", upper.name(), lower.name()),
                ));
            }
        }
        Ok(())
    }
}

/// Each voice sounds a chord tone, the bass sounds the inversion's tone, and
/// the chord has its root and third. The fifth may only be dropped from a
/// root-position chord with a tripled root.
pub struct ChordMembership;

impl HarmonyRule for ChordMembership {
    fn name(&self) -> &'static str {
        "chord-membership"
    }

    fn evaluate(&self, ctx: &VoicingContext) -> Result<(), RuleViolation> {
        let chord = ctx.candidate;
        for voice in Voice::ALL {
            let pitch = chord.pitch(voice);
            if chord.triad.tone_of(pitch).is_none() {
                return Err(ctx.violation(
                    self.name(),
                    format!("{} {} is not in {}", voice.name(), pitch, chord.triad.label()),
                ));
            }
        }
        let expected = chord.inversion.bass_tone();
        if chord.triad.tone_of(chord.voicing.bass) != Some(expected) {
            return Err(ctx.violation(
                self.name(),
                format!(
                    "bass {} does not match inversion {:?}",
                    chord.voicing.bass, chord.inversion
                ),
            ));
        }
        match chord.doubling() {
            Doubling::Incomplete => Err(ctx.violation(
                self.name(),
                format!("{} is missing its root or third", chord.label()),
            )),
            Doubling::TripledRoot if chord.inversion != Inversion::Root => Err(ctx.violation(
                self.name(),
                format!("{} omits its fifth outside root position", chord.label()),
            )),
            _ => Ok(()),
        }
    }
}

/// Root doubling preferred; third only in first inversion or diminished
/// triads; never the leading tone; never the fifth of a diminished triad.
pub struct DoublingRule;

impl HarmonyRule for DoublingRule {
    fn name(&self) -> &'static str {
        "doubling"
    }

    fn evaluate(&self, ctx: &VoicingContext) -> Result<(), RuleViolation> {
        let chord = ctx.candidate;
        let leading_tones = chord
            .voicing
            .pitches()
            .iter()
            .filter(|&&p| ctx.key.is_leading_tone(p))
            .count();
        if leading_tones > 1 {
            return Err(ctx.violation(
                self.name(),
                format!("leading tone {} is doubled", ctx.key.leading_tone()),
            ));
        }
        let diminished = chord.triad.quality == TriadQuality::Diminished;
        match chord.doubling() {
            Doubling::Third if chord.inversion != Inversion::First && !diminished => {
                Err(ctx.violation(
                    self.name(),
                    format!("third doubled in {} outside first inversion", chord.label()),
                ))
            }
            Doubling::Fifth if diminished => Err(ctx.violation(
                self.name(),
                format!("diminished fifth doubled in {}", chord.label()),
            )),
            _ => Ok(()),
        }
    }
}

/// Second inversion only as a cadential six-four: I64 over a bass that is
/// repeated under a root-position V.
pub struct SixFourUsage;

impl HarmonyRule for SixFourUsage {
    fn name(&self) -> &'static str {
        "six-four"
    }

    fn evaluate(&self, ctx: &VoicingContext) -> Result<(), RuleViolation> {
        let chord = ctx.candidate;
        if chord.inversion == Inversion::Second {
            let bass_repeats = ctx.next_bass == Some(chord.voicing.bass);
            if chord.triad.degree != Degree::I || !bass_repeats {
                return Err(ctx.violation(
                    self.name(),
                    format!("{} is not a cadential six-four", chord.label()),
                ));
            }
        }
        if let Some(prev) = ctx.previous()
            && prev.inversion == Inversion::Second
            && (chord.triad.degree != Degree::V || chord.inversion != Inversion::Root)
        {
            return Err(ctx.step_violation(
                self.name(),
                format!("{} must resolve to V, not {}", prev.label(), chord.label()),
            ));
        }
        Ok(())
    }
}

// ── Rules between consecutive chords ──

/// No consecutive fifths or octaves between any two voices, by parallel or
/// contrary motion.
pub struct ParallelPerfects;

impl HarmonyRule for ParallelPerfects {
    fn name(&self) -> &'static str {
        "parallel-perfects"
    }

    fn evaluate(&self, ctx: &VoicingContext) -> Result<(), RuleViolation> {
        let Some(prev) = ctx.previous() else {
            return Ok(());
        };
        let next = ctx.candidate;
        for (upper, lower) in ALL_PAIRS {
            let motion = Motion::between(
                (prev.pitch(lower), next.pitch(lower)),
                (prev.pitch(upper), next.pitch(upper)),
            );
            if !matches!(motion, Motion::Similar | Motion::Contrary) {
                continue;
            }
            let before = interval_class(prev.pitch(lower), prev.pitch(upper));
            let after = interval_class(next.pitch(lower), next.pitch(upper));
            if before == after && matches!(after, 0 | 7) {
                return Err(ctx.step_violation(
                    self.name(),
                    format!(
                        "consecutive {} between {} and {}",
                        perfect_name(after),
                        upper.name(),
                        lower.name()
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// No perfect fifth or octave entered by similar motion in the outer voices.
pub struct HiddenPerfects;

impl HarmonyRule for HiddenPerfects {
    fn name(&self) -> &'static str {
        "hidden-perfects"
    }

    fn evaluate(&self, ctx: &VoicingContext) -> Result<(), RuleViolation> {
        let Some(prev) = ctx.previous() else {
            return Ok(());
        };
        let next = ctx.candidate;
        let motion = Motion::between(
            (prev.voicing.bass, next.voicing.bass),
            (prev.voicing.soprano, next.voicing.soprano),
        );
        let before = interval_class(prev.voicing.bass, prev.voicing.soprano);
        let after = interval_class(next.voicing.bass, next.voicing.soprano);
        if motion == Motion::Similar && matches!(after, 0 | 7) && before != after {
            return Err(ctx.step_violation(
                self.name(),
                format!("hidden {} between soprano and bass", perfect_name(after)),
            ));
        }
        Ok(())
    }
}

/// No voice moves past where its neighbor just was.
pub struct VoiceOverlap;

impl HarmonyRule for VoiceOverlap {
    fn name(&self) -> &'static str {
        "voice-overlap"
    }

    fn evaluate(&self, ctx: &VoicingContext) -> Result<(), RuleViolation> {
        let Some(prev) = ctx.previous() else {
            return Ok(());
        };
        let next = ctx.candidate;
        for (upper, lower) in ADJACENT_PAIRS {
            if next.pitch(lower) > prev.pitch(upper) {
                return Err(ctx.step_violation(
                    self.name(),
                    format!("{} rises above the previous {}", lower.name(), upper.name()),
                ));
            }
            if next.pitch(upper) < prev.pitch(lower) {
                return Err(ctx.step_violation(
                    self.name(),
                    format!("{} falls below the previous {}", upper.name(), lower.name()),
                ));
            }
        }
        Ok(())
    }
}

/// A leading tone in an upper voice rises a half step to the tonic when the
/// harmony changes. V to VI is exempt (see module comment).
pub struct LeadingToneResolution;

impl LeadingToneResolution {
    /// The exempt V to VI step.
    pub fn is_exempt(prev: &Chord, next: &Chord) -> bool {
        prev.triad.degree == Degree::V && next.triad.degree == Degree::VI
    }

    /// Upper voices whose leading tone in `prev` does not rise to the tonic
    /// in `next`.
    pub fn unresolved_voices(key: &Key, prev: &Chord, next: &Chord) -> Vec<Voice> {
        Voice::UPPER
            .into_iter()
            .filter(|&voice| {
                let from = prev.pitch(voice);
                let to = next.pitch(voice);
                key.is_leading_tone(from)
                    && !(to.semitone() - from.semitone() == 1 && key.is_tonic(to))
            })
            .collect()
    }
}

impl HarmonyRule for LeadingToneResolution {
    fn name(&self) -> &'static str {
        "leading-tone"
    }

    fn evaluate(&self, ctx: &VoicingContext) -> Result<(), RuleViolation> {
        let Some(prev) = ctx.previous() else {
            return Ok(());
        };
        let next = ctx.candidate;
        if prev.triad.degree == next.triad.degree || Self::is_exempt(prev, next) {
            return Ok(());
        }
        match Self::unresolved_voices(ctx.key, prev, next).first() {
            Some(voice) => Err(ctx.step_violation(
                self.name(),
                format!(
                    "leading tone {} in {} does not resolve to the tonic",
                    prev.pitch(*voice),
                    voice.name()
                ),
            )),
            None => Ok(()),
        }
    }
}

/// Upper-voice leaps: at most a major sixth, or an octave recovered by a
/// step the other way; never an augmented interval.
pub struct MelodicLeaps;

impl HarmonyRule for MelodicLeaps {
    fn name(&self) -> &'static str {
        "melodic-leaps"
    }

    fn evaluate(&self, ctx: &VoicingContext) -> Result<(), RuleViolation> {
        let Some(prev) = ctx.previous() else {
            return Ok(());
        };
        for voice in Voice::UPPER {
            let motion = Interval::between(prev.pitch(voice), ctx.candidate.pitch(voice));
            let size = motion.abs_semitones();
            if size > 9 && size != 12 {
                return Err(ctx.step_violation(
                    self.name(),
                    format!("{} leaps {}", voice.name(), motion),
                ));
            }
            if motion.quality() == Quality::Augmented {
                return Err(ctx.step_violation(
                    self.name(),
                    format!("{} moves by augmented interval {}", voice.name(), motion),
                ));
            }
            if let Some(before) = ctx.before_previous() {
                let leap = Interval::between(before.pitch(voice), prev.pitch(voice));
                let recovered = motion.is_step() && motion.direction() == -leap.direction();
                if leap.abs_semitones() == 12 && !recovered {
                    return Err(ctx.step_violation(
                        self.name(),
                        format!("{} octave leap is not recovered by step", voice.name()),
                    ));
                }
            }
        }
        Ok(())
    }
}
