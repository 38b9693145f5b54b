// Species-counterpoint rules for a line written above a cantus firmus.
//
// Each rule implements `LineRule` and judges the *last* note of a line prefix
// (the candidate) against everything before it and the cantus firmus (CF)
// notes under it. Because every prefix of an accepted line has been checked,
// judging only the newest note is enough to keep the whole line legal; rules
// that need to look ahead (what follows a dissonance, the cadence) are
// phrased as constraints on the note that arrives later.
//
// Harmonic rules: register, staying above the CF, perfect-consonance opening,
// consonant strong beats, dissonance only as stepwise passing/neighbor tones
// on weak beats, no parallel or hidden perfects between downbeats or across
// the barline, cadence on a unison or octave reached by step against the
// CF's motion, and no fifth/sixth mix within one measure.
//
// Melodic rules: allowed intervals only, leaps recovered by an opposite step,
// no arpeggiated triads, wide three-note spans must contain a step, and the
// line's total ambitus is bounded.
//
// Positions in `RuleViolation`s are line-note indices.

use crate::cantus::{MEASURE_QUARTERS, RhythmMode, Slot, ToneKind, layout, tone_kind};
use crate::chord::Voice;
use crate::diagnostics::RuleViolation;
use crate::key::Key;
use crate::pitch::{Interval, IntervalSize, Motion, Pitch, Quality};

/// Widest allowed distance above the CF, in diatonic steps (a double octave).
pub const MAX_STEPS_ABOVE_CANTUS: i16 = 14;

/// Widest allowed line span, in diatonic steps (an eleventh).
pub const MAX_AMBITUS_STEPS: i16 = 10;

/// A line prefix under judgement. The candidate is the last note of `line`.
#[derive(Debug, Clone, Copy)]
pub struct LineContext<'a> {
    pub key: &'a Key,
    pub cantus: &'a [Pitch],
    pub rhythm: RhythmMode,
    /// The full slot layout of the line being built.
    pub slots: &'a [Slot],
    /// Accepted notes followed by the candidate. Never empty.
    pub line: &'a [Pitch],
}

impl<'a> LineContext<'a> {
    pub fn index(&self) -> usize {
        self.line.len() - 1
    }

    pub fn candidate(&self) -> Pitch {
        self.line[self.index()]
    }

    pub fn slot(&self, i: usize) -> Slot {
        self.slots[i]
    }

    /// The CF note sounding under line note `i`.
    pub fn cantus_at(&self, i: usize) -> Pitch {
        self.cantus[self.slots[i].measure]
    }

    /// Interval from the CF up to line note `i`.
    pub fn harmonic_interval(&self, i: usize) -> Interval {
        Interval::between(self.cantus_at(i), self.line[i])
    }

    pub fn is_last_slot(&self) -> bool {
        self.index() + 1 == self.slots.len()
    }

    /// The latest strong slot before `i`.
    pub fn previous_downbeat(&self, i: usize) -> Option<usize> {
        (0..i).rev().find(|&j| self.slots[j].is_strong())
    }

    /// Line notes sounding over the CF note before note `i`'s, latest first.
    pub fn previous_measure(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        let measure = self.slots[i].measure;
        (0..i).rev().filter(move |&j| self.slots[j].measure + 1 == measure)
    }

    /// Start of line note `i` in quarter notes from the first barline.
    pub fn onset(&self, i: usize) -> usize {
        let slot = self.slots[i];
        slot.measure * MEASURE_QUARTERS as usize + slot.beat * self.rhythm.note_duration() as usize
    }

    /// Whether note `i` is a chord tone, `None` while that still depends on
    /// the note after it (see `tone_kind`).
    pub fn is_chord_tone(&self, i: usize) -> Option<bool> {
        tone_kind(self.cantus, self.slots, self.line, i).map(|kind| kind == ToneKind::Harmonic)
    }

    /// Notes whose role the candidate settles: the candidate itself when its
    /// role is already known, and the note before it if it was waiting for
    /// the candidate.
    pub fn settled_by_candidate(&self) -> Vec<usize> {
        let i = self.index();
        let mut settled = Vec::new();
        if let Some(prev) = i.checked_sub(1)
            && tone_kind(self.cantus, self.slots, &self.line[..i], prev).is_none()
        {
            settled.push(prev);
        }
        if self.is_chord_tone(i).is_some() {
            settled.push(i);
        }
        settled
    }

    fn violation(&self, rule: &'static str, description: String) -> RuleViolation {
        RuleViolation::new(rule, vec![self.index()], description)
    }

    fn span_violation(
        &self,
        rule: &'static str,
        from: usize,
        description: String,
    ) -> RuleViolation {
        RuleViolation::new(rule, (from..=self.index()).collect(), description)
    }
}

/// A single counterpoint predicate.
pub trait LineRule {
    fn name(&self) -> &'static str;
    fn evaluate(&self, ctx: &LineContext) -> Result<(), RuleViolation>;
}

/// An ordered set of counterpoint rules.
pub struct CounterpointRules {
    rules: Vec<Box<dyn LineRule>>,
}

impl CounterpointRules {
    pub fn standard() -> Self {
        CounterpointRules {
            rules: vec![
                Box::new(Register),
                Box::new(AboveCantus),
                Box::new(MelodicInterval),
                Box::new(Opening),
                Box::new(StrongBeatConsonance),
                Box::new(WeakBeatDissonance),
                Box::new(ParallelPerfects),
                Box::new(HiddenPerfects),
                Box::new(LeapRecovery),
                Box::new(NoArpeggio),
                Box::new(SpanOfThree),
                Box::new(Ambitus),
                Box::new(MeasureHarmony),
                Box::new(Cadence),
            ],
        }
    }

    pub fn empty() -> Self {
        CounterpointRules { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: Box<dyn LineRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn check(&self, ctx: &LineContext) -> Result<(), RuleViolation> {
        self.rules.iter().try_for_each(|rule| rule.evaluate(ctx))
    }

    pub fn violations(&self, ctx: &LineContext) -> Vec<RuleViolation> {
        self.rules
            .iter()
            .filter_map(|rule| rule.evaluate(ctx).err())
            .collect()
    }

    /// Check every prefix of a finished (or partial) line.
    pub fn validate(
        &self,
        key: &Key,
        cantus: &[Pitch],
        rhythm: RhythmMode,
        line: &[Pitch],
    ) -> Vec<RuleViolation> {
        let slots = layout(cantus.len(), rhythm);
        let len = line.len().min(slots.len());
        (1..=len)
            .flat_map(|n| {
                let ctx = LineContext {
                    key,
                    cantus,
                    rhythm,
                    slots: &slots,
                    line: &line[..n],
                };
                self.violations(&ctx)
            })
            .collect()
    }
}

fn interval_class(interval: Interval) -> i16 {
    interval.semitones.rem_euclid(12)
}

/// Semitone classes treated as "the same perfect interval" for parallels:
/// unison/octave, and fifth, where a diminished fifth moving to a perfect
/// fifth also counts.
fn parallel_classes(before: i16, after: i16) -> bool {
    (before == after && matches!(after, 0 | 7)) || matches!((before, after), (6, 7) | (7, 6))
}

/// Earlier line notes to compare a downbeat candidate against for hidden
/// motion: the note across the barline, and the previous downbeat.
fn strong_beat_partners(ctx: &LineContext) -> Vec<usize> {
    let i = ctx.index();
    if !ctx.slot(i).is_strong() || i == 0 {
        return Vec::new();
    }
    let mut partners = vec![i - 1];
    if let Some(j) = ctx.previous_downbeat(i)
        && j != i - 1
    {
        partners.push(j);
    }
    partners
}

fn describe_perfect(class: i16) -> &'static str {
    if class == 0 { "octaves" } else { "fifths" }
}

// ── Harmonic rules ──

/// Soprano band and diatonic to the key.
pub struct Register;

impl LineRule for Register {
    fn name(&self) -> &'static str {
        "register"
    }

    fn evaluate(&self, ctx: &LineContext) -> Result<(), RuleViolation> {
        let pitch = ctx.candidate();
        if !Voice::Soprano.in_range(pitch) {
            return Err(ctx.violation(
                self.name(),
                format!("{} is outside the soprano band", pitch),
            ));
        }
        if !ctx.key.contains(pitch) {
            return Err(ctx.violation(self.name(), format!("{} is not in {}", pitch, ctx.key)));
        }
        Ok(())
    }
}

/// Never below the CF, never more than two octaves above it.
pub struct AboveCantus;

impl LineRule for AboveCantus {
    fn name(&self) -> &'static str {
        "above-cantus"
    }

    fn evaluate(&self, ctx: &LineContext) -> Result<(), RuleViolation> {
        let interval = ctx.harmonic_interval(ctx.index());
        if interval.semitones < 0 || interval.steps < 0 {
            return Err(ctx.violation(
                self.name(),
                format!("{} is below the cantus {}", ctx.candidate(), ctx.cantus_at(ctx.index())),
            ));
        }
        if interval.steps > MAX_STEPS_ABOVE_CANTUS {
            return Err(ctx.violation(
                self.name(),
                format!("{} is more than two octaves above the cantus", ctx.candidate()),
            ));
        }
        Ok(())
    }
}

/// The first note is a perfect consonance.
pub struct Opening;

impl LineRule for Opening {
    fn name(&self) -> &'static str {
        "opening"
    }

    fn evaluate(&self, ctx: &LineContext) -> Result<(), RuleViolation> {
        if ctx.index() != 0 {
            return Ok(());
        }
        let interval = ctx.harmonic_interval(0);
        if interval.is_perfect_consonance() {
            Ok(())
        } else {
            Err(ctx.violation(
                self.name(),
                format!("line opens on {}, not a perfect consonance", interval),
            ))
        }
    }
}

/// Downbeats are consonant.
pub struct StrongBeatConsonance;

impl LineRule for StrongBeatConsonance {
    fn name(&self) -> &'static str {
        "strong-beat-consonance"
    }

    fn evaluate(&self, ctx: &LineContext) -> Result<(), RuleViolation> {
        let i = ctx.index();
        let interval = ctx.harmonic_interval(i);
        if ctx.slot(i).is_strong() && !interval.is_consonant() {
            return Err(ctx.violation(self.name(), format!("dissonant {} on a downbeat", interval)));
        }
        Ok(())
    }
}

/// A weak-beat dissonance is entered by step from a consonance and left by
/// step to a consonance.
pub struct WeakBeatDissonance;

impl LineRule for WeakBeatDissonance {
    fn name(&self) -> &'static str {
        "weak-beat-dissonance"
    }

    fn evaluate(&self, ctx: &LineContext) -> Result<(), RuleViolation> {
        let i = ctx.index();
        let consonant = ctx.harmonic_interval(i).is_consonant();

        if let Some(prev) = i.checked_sub(1)
            && !ctx.harmonic_interval(prev).is_consonant()
        {
            let leaving = Interval::between(ctx.line[prev], ctx.line[i]);
            if !leaving.is_step() || !consonant {
                return Err(ctx.span_violation(
                    self.name(),
                    prev,
                    format!(
                        "dissonance at {} is not resolved by step to a consonance",
                        ctx.line[prev]
                    ),
                ));
            }
        }

        if consonant {
            return Ok(());
        }
        let Some(prev) = i.checked_sub(1) else {
            return Err(ctx.violation(self.name(), "line opens on a dissonance".to_string()));
        };
        let approach = Interval::between(ctx.line[prev], ctx.line[i]);
        if ctx.is_last_slot()
            || !approach.is_step()
            || !ctx.harmonic_interval(prev).is_consonant()
        {
            return Err(ctx.span_violation(
                self.name(),
                prev,
                format!("dissonant {} is not a passing or neighbor tone", ctx.candidate()),
            ));
        }
        Ok(())
    }
}

/// No parallel perfect fifths or octaves between notes less than a measure
/// apart across a barline.
///
/// A downbeat sounds together with a new CF note, so it may not form the
/// same perfect interval as any note of the previous measure when both voices
/// move. A weak-beat note only counts when it and the earlier note are both
/// chord tones and the voices move in the same direction.
pub struct ParallelPerfects;

impl ParallelPerfects {
    /// Notes `j` then `k`, flagged when their motion is one of `motions`.
    fn compare(
        &self,
        ctx: &LineContext,
        j: usize,
        k: usize,
        motions: &[Motion],
    ) -> Result<(), RuleViolation> {
        let before = interval_class(ctx.harmonic_interval(j));
        let after = interval_class(ctx.harmonic_interval(k));
        let motion = Motion::between(
            (ctx.cantus_at(j), ctx.cantus_at(k)),
            (ctx.line[j], ctx.line[k]),
        );
        if motions.contains(&motion) && parallel_classes(before, after) {
            return Err(RuleViolation::new(
                self.name(),
                vec![j, k],
                format!("parallel {} across the barline", describe_perfect(after)),
            ));
        }
        Ok(())
    }
}

impl LineRule for ParallelPerfects {
    fn name(&self) -> &'static str {
        "parallel-perfects"
    }

    fn evaluate(&self, ctx: &LineContext) -> Result<(), RuleViolation> {
        let i = ctx.index();
        if ctx.slot(i).is_strong() {
            for j in ctx.previous_measure(i) {
                self.compare(ctx, j, i, &[Motion::Similar, Motion::Contrary])?;
            }
        }
        for k in ctx.settled_by_candidate() {
            if ctx.slot(k).is_strong() || ctx.is_chord_tone(k) != Some(true) {
                continue;
            }
            let onset = ctx.onset(k);
            for j in ctx.previous_measure(k) {
                let within_measure = onset - ctx.onset(j) <= MEASURE_QUARTERS as usize;
                if within_measure && ctx.is_chord_tone(j) == Some(true) {
                    self.compare(ctx, j, k, &[Motion::Similar])?;
                }
            }
        }
        Ok(())
    }
}

/// No perfect fifth or octave entered by similar motion on a downbeat.
pub struct HiddenPerfects;

impl LineRule for HiddenPerfects {
    fn name(&self) -> &'static str {
        "hidden-perfects"
    }

    fn evaluate(&self, ctx: &LineContext) -> Result<(), RuleViolation> {
        let i = ctx.index();
        let after = interval_class(ctx.harmonic_interval(i));
        if !matches!(after, 0 | 7) {
            return Ok(());
        }
        for j in strong_beat_partners(ctx) {
            let before = interval_class(ctx.harmonic_interval(j));
            let motion = Motion::between(
                (ctx.cantus_at(j), ctx.cantus_at(i)),
                (ctx.line[j], ctx.line[i]),
            );
            if motion == Motion::Similar && before != after {
                return Err(RuleViolation::new(
                    self.name(),
                    vec![j, i],
                    format!("hidden {} by similar motion", describe_perfect(after)),
                ));
            }
        }
        Ok(())
    }
}

/// Final note: unison, octave or double octave above the last CF note,
/// reached by step, against oblique or contrary CF motion.
pub struct Cadence;

impl LineRule for Cadence {
    fn name(&self) -> &'static str {
        "cadence"
    }

    fn evaluate(&self, ctx: &LineContext) -> Result<(), RuleViolation> {
        if !ctx.is_last_slot() {
            return Ok(());
        }
        let i = ctx.index();
        let interval = ctx.harmonic_interval(i);
        if !matches!(interval.semitones, 0 | 12 | 24) || interval.steps % 7 != 0 {
            return Err(ctx.violation(
                self.name(),
                format!("final interval {} is not a unison or octave", interval),
            ));
        }
        let Some(prev) = i.checked_sub(1) else {
            return Ok(());
        };
        if !Interval::between(ctx.line[prev], ctx.line[i]).is_step() {
            return Err(ctx.span_violation(
                self.name(),
                prev,
                "final note is not reached by step".to_string(),
            ));
        }
        let motion = Motion::between(
            (ctx.cantus_at(prev), ctx.cantus_at(i)),
            (ctx.line[prev], ctx.line[i]),
        );
        if motion == Motion::Similar {
            return Err(ctx.span_violation(
                self.name(),
                prev,
                "final note moves with the cantus instead of against it".to_string(),
            ));
        }
        Ok(())
    }
}

/// In one measure the line's chord tones may sit a fifth or a sixth above
/// the CF, not both. Passing and neighbor tones do not count.
pub struct MeasureHarmony;

impl LineRule for MeasureHarmony {
    fn name(&self) -> &'static str {
        "measure-harmony"
    }

    fn evaluate(&self, ctx: &LineContext) -> Result<(), RuleViolation> {
        if ctx.rhythm == RhythmMode::Whole {
            return Ok(());
        }
        let i = ctx.index();
        for n in ctx.settled_by_candidate() {
            if ctx.is_chord_tone(n) != Some(true) {
                continue;
            }
            let clash = match ctx.harmonic_interval(n).size() {
                IntervalSize::Fifth => IntervalSize::Sixth,
                IntervalSize::Sixth => IntervalSize::Fifth,
                _ => continue,
            };
            let measure = ctx.slot(n).measure;
            let other = (0..=i).find(|&j| {
                j != n
                    && ctx.slot(j).measure == measure
                    && ctx.is_chord_tone(j) == Some(true)
                    && ctx.harmonic_interval(j).size() == clash
            });
            if let Some(j) = other {
                return Err(RuleViolation::new(
                    self.name(),
                    vec![j.min(n), j.max(n)],
                    format!("measure {} mixes a fifth and a sixth above the cantus", measure + 1),
                ));
            }
        }
        Ok(())
    }
}

// ── Melodic rules ──

/// Only m2, M2, m3, M3, P4, P5, m6 and P8 between consecutive notes.
pub struct MelodicInterval;

impl MelodicInterval {
    pub fn allowed(interval: Interval) -> bool {
        matches!(
            (interval.abs_steps(), interval.quality()),
            (1, Quality::Minor | Quality::Major)
                | (2, Quality::Minor | Quality::Major)
                | (3, Quality::Perfect)
                | (4, Quality::Perfect)
                | (5, Quality::Minor)
                | (7, Quality::Perfect)
        )
    }
}

impl LineRule for MelodicInterval {
    fn name(&self) -> &'static str {
        "melodic-interval"
    }

    fn evaluate(&self, ctx: &LineContext) -> Result<(), RuleViolation> {
        let i = ctx.index();
        let Some(prev) = i.checked_sub(1) else {
            return Ok(());
        };
        let motion = Interval::between(ctx.line[prev], ctx.line[i]);
        if Self::allowed(motion) {
            Ok(())
        } else {
            Err(ctx.span_violation(self.name(), prev, format!("melodic {} is not allowed", motion)))
        }
    }
}

/// A leap of a fourth or more is followed by a step the other way.
pub struct LeapRecovery;

impl LineRule for LeapRecovery {
    fn name(&self) -> &'static str {
        "leap-recovery"
    }

    fn evaluate(&self, ctx: &LineContext) -> Result<(), RuleViolation> {
        let i = ctx.index();
        if i < 2 {
            return Ok(());
        }
        let leap = Interval::between(ctx.line[i - 2], ctx.line[i - 1]);
        if leap.abs_steps() < 3 {
            return Ok(());
        }
        let next = Interval::between(ctx.line[i - 1], ctx.line[i]);
        if next.is_step() && next.direction() == -leap.direction() {
            Ok(())
        } else {
            Err(ctx.span_violation(
                self.name(),
                i - 2,
                format!("leap {} is not recovered by an opposite step", leap),
            ))
        }
    }
}

/// No three-note outline of a triad: (first motion, total span) in steps.
const ARPEGGIO_SHAPES: [(i16, i16); 5] = [(2, 4), (2, 5), (3, 5), (4, 7), (3, 7)];

pub struct NoArpeggio;

impl LineRule for NoArpeggio {
    fn name(&self) -> &'static str {
        "no-arpeggio"
    }

    fn evaluate(&self, ctx: &LineContext) -> Result<(), RuleViolation> {
        let i = ctx.index();
        if i < 2 {
            return Ok(());
        }
        let first = Interval::between(ctx.line[i - 2], ctx.line[i - 1]).steps;
        let total = Interval::between(ctx.line[i - 2], ctx.line[i]).steps;
        let arpeggio = ARPEGGIO_SHAPES
            .iter()
            .any(|&(a, b)| (first, total) == (a, b) || (first, total) == (-a, -b));
        if arpeggio {
            return Err(ctx.span_violation(
                self.name(),
                i - 2,
                "three notes outline a triad".to_string(),
            ));
        }
        Ok(())
    }
}

/// Three notes spanning a seventh, or more than a ninth, include a step.
pub struct SpanOfThree;

impl LineRule for SpanOfThree {
    fn name(&self) -> &'static str {
        "span-of-three"
    }

    fn evaluate(&self, ctx: &LineContext) -> Result<(), RuleViolation> {
        let i = ctx.index();
        if i < 2 {
            return Ok(());
        }
        let window = &ctx.line[i - 2..=i];
        let indices: Vec<i16> = window.iter().map(|p| p.diatonic_index()).collect();
        let highest = indices.iter().max().copied().unwrap_or(0);
        let lowest = indices.iter().min().copied().unwrap_or(0);
        let span = highest - lowest;
        let has_step = window
            .windows(2)
            .any(|w| Interval::between(w[0], w[1]).is_step());
        if (span == 6 || span > 8) && !has_step {
            return Err(ctx.span_violation(
                self.name(),
                i - 2,
                format!("three notes span {} steps without a step", span),
            ));
        }
        Ok(())
    }
}

/// The whole line fits within an eleventh.
pub struct Ambitus;

impl LineRule for Ambitus {
    fn name(&self) -> &'static str {
        "ambitus"
    }

    fn evaluate(&self, ctx: &LineContext) -> Result<(), RuleViolation> {
        let indices = ctx.line.iter().map(|p| p.diatonic_index());
        let (low, high) = indices.fold((i16::MAX, i16::MIN), |(lo, hi), d| (lo.min(d), hi.max(d)));
        if high - low > MAX_AMBITUS_STEPS {
            return Err(ctx.violation(self.name(), "line spans more than an eleventh".to_string()));
        }
        Ok(())
    }
}
