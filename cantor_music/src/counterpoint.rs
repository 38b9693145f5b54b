// Randomized species-counterpoint generator.
//
// Writes a line above a cantus firmus (CF) one slot at a time (see
// cantus.rs for the slot layout). For each slot the generator takes every
// diatonic pitch in the soprano band, keeps the ones the rule set accepts
// after the current prefix, shuffles them, and stores them in a search frame.
// Drawing from the frame in order is uniform choice without replacement.
//
// Backtracking:
// - A frame with no survivors is discarded at once, and the note chosen by
//   the frame beneath it is taken back so that frame draws again.
// - A frame that has already drawn `retry_budget` candidates is discarded the
//   same way, so a bad early choice is abandoned instead of being searched
//   exhaustively.
// - When the first slot's frame is discarded the search restarts from an
//   empty line with fresh draws.
//
// Every frame charges the size of the pool against `max_steps`; once the
// budget is spent the run fails with `NoSolutionFound`, reporting the deepest
// slot reached. Results differ per seed; the same seed gives the same line.

use crate::cantus::{
    CantusFirmus, CounterpointLine, LineNote, RhythmMode, Slot, classify_tones, layout,
    opening_rest,
};
use crate::chord::Voice;
use crate::counterpoint_rules::{CounterpointRules, LineContext};
use crate::error::GenerateError;
use crate::key::{Key, Mode};
use crate::pitch::Pitch;
use crate::search::{Frame, SearchStack};
use cantor_prng::SearchRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Tunables for the counterpoint search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterpointConfig {
    /// Candidates a single slot may draw before it is abandoned.
    pub retry_budget: usize,
    /// Candidate checks allowed across all restarts.
    pub max_steps: usize,
}

impl Default for CounterpointConfig {
    fn default() -> Self {
        CounterpointConfig {
            retry_budget: 12,
            max_steps: 200_000,
        }
    }
}

/// The major key on the CF's final pitch class.
pub fn default_key(cantus: &CantusFirmus) -> Key {
    Key::new(cantus.final_note().pitch_class(), Mode::Major)
}

/// Pool members that the rules accept after `line`, shuffled.
fn survivors(
    pool: &[Pitch],
    line: &mut Vec<Pitch>,
    ctx_parts: (&Key, &[Pitch], RhythmMode, &[Slot]),
    rules: &CounterpointRules,
    rng: &mut SearchRng,
) -> Vec<Pitch> {
    let (key, cantus, rhythm, slots) = ctx_parts;
    let mut accepted = Vec::new();
    for &pitch in pool {
        line.push(pitch);
        let ctx = LineContext {
            key,
            cantus,
            rhythm,
            slots,
            line: line.as_slice(),
        };
        if rules.check(&ctx).is_ok() {
            accepted.push(pitch);
        }
        line.pop();
    }
    rng.shuffle(&mut accepted);
    accepted
}

/// Generate a line above `cantus` in `rhythm`.
pub fn generate_counterpoint(
    cantus: &CantusFirmus,
    key: &Key,
    rhythm: RhythmMode,
    rules: &CounterpointRules,
    config: &CounterpointConfig,
    rng: &mut SearchRng,
) -> Result<CounterpointLine, GenerateError> {
    let notes = cantus.notes();
    let slots = layout(notes.len(), rhythm);
    let (low, high) = Voice::Soprano.range();
    let pool = key.pitches_in_range(low, high);
    let parts = (key, notes, rhythm, slots.as_slice());

    let mut stack: SearchStack<Pitch> = SearchStack::new();
    let mut line: Vec<Pitch> = Vec::with_capacity(slots.len());
    let mut restarts = 0usize;

    if pool.is_empty() {
        return Err(GenerateError::NoSolutionFound {
            position: 0,
            steps: 0,
        });
    }

    loop {
        if stack.is_empty() {
            if stack.steps > 0 {
                restarts += 1;
                debug!(restarts, steps = stack.steps, "counterpoint restart");
            }
            line.clear();
            if !stack.charge(pool.len(), config.max_steps) {
                break;
            }
            let first = survivors(&pool, &mut line, parts, rules, rng);
            stack.push(Frame::new(0, first));
        }

        let Some(frame) = stack.top_mut() else {
            continue;
        };
        let position = frame.position;
        let drawn = if frame.attempts() < config.retry_budget {
            frame.next_candidate()
        } else {
            None
        };
        let Some(pitch) = drawn else {
            stack.pop();
            line.pop();
            continue;
        };

        line.truncate(position);
        line.push(pitch);
        if line.len() == slots.len() {
            let kinds = classify_tones(notes, &slots, &line);
            let line_notes: Vec<LineNote> = line
                .iter()
                .zip(&slots)
                .zip(kinds)
                .map(|((&pitch, &slot), kind)| LineNote { pitch, slot, kind })
                .collect();
            info!(
                notes = line_notes.len(),
                steps = stack.steps,
                restarts,
                "counterpoint found"
            );
            return Ok(CounterpointLine {
                key: *key,
                rhythm,
                opening_rest: opening_rest(cantus.len(), rhythm),
                notes: line_notes,
                steps: stack.steps,
            });
        }

        if !stack.charge(pool.len(), config.max_steps) {
            break;
        }
        let next = survivors(&pool, &mut line, parts, rules, rng);
        stack.push(Frame::new(position + 1, next));
    }

    warn!(
        steps = stack.steps,
        deepest = stack.deepest,
        restarts,
        "counterpoint step budget exhausted"
    );
    Err(GenerateError::NoSolutionFound {
        position: stack.deepest,
        steps: stack.steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cantus::ToneKind;
    use crate::pitch::parse_pitches;

    fn cantus(tokens: &[&str]) -> CantusFirmus {
        CantusFirmus::new(parse_pitches(tokens).unwrap()).unwrap()
    }

    fn run(
        cf: &CantusFirmus,
        rhythm: RhythmMode,
        seed: u64,
    ) -> Result<CounterpointLine, GenerateError> {
        generate_counterpoint(
            cf,
            &default_key(cf),
            rhythm,
            &CounterpointRules::standard(),
            &CounterpointConfig::default(),
            &mut SearchRng::new(seed),
        )
    }

    #[test]
    fn test_default_key_follows_final() {
        let cf = cantus(&["D4", "F4", "E4", "G3"]);
        assert_eq!(default_key(&cf).to_string(), "G major");
    }

    #[test]
    fn test_first_species_line_is_valid() {
        let cf = cantus(&["C4", "D4", "F4", "E4", "D4", "C4"]);
        let line = run(&cf, RhythmMode::Whole, 11).unwrap();
        assert_eq!(line.notes.len(), 6);
        assert_eq!(line.opening_rest, None);
        let violations = CounterpointRules::standard().validate(
            &line.key,
            cf.notes(),
            RhythmMode::Whole,
            &line.pitches(),
        );
        assert!(violations.is_empty(), "got {:?}", violations);
        assert!(line.notes.iter().all(|n| n.kind == ToneKind::Harmonic));
    }

    #[test]
    fn test_half_notes_open_with_rest() {
        let cf = cantus(&["C4", "D4", "F4", "E4", "D4", "C4"]);
        let line = run(&cf, RhythmMode::Half, 5).unwrap();
        assert_eq!(line.opening_rest, Some(2));
        assert_eq!(line.notes.len(), 1 + 2 * 4 + 1);
        assert_eq!(line.notes.last().map(|n| n.slot.duration), Some(4));
        let violations = CounterpointRules::standard().validate(
            &line.key,
            cf.notes(),
            RhythmMode::Half,
            &line.pitches(),
        );
        assert!(violations.is_empty(), "got {:?}", violations);
    }

    #[test]
    fn test_half_notes_cadence_through_passing_tone() {
        // Over D4 to C4 the only way in is A4 B4 C5, with B4 passing.
        let cf = cantus(&["C4", "D4", "C4"]);
        for seed in 0..4 {
            let line = run(&cf, RhythmMode::Half, seed).unwrap();
            let pitches: Vec<String> = line.pitches().iter().map(|p| p.to_string()).collect();
            assert_eq!(pitches[1..], ["A4", "B4", "C5"], "seed {}", seed);
            assert_eq!(line.notes[2].kind, ToneKind::Passing);
        }
    }

    #[test]
    fn test_single_note_cantus() {
        let cf = cantus(&["C4"]);
        let line = run(&cf, RhythmMode::Quarter, 1).unwrap();
        assert_eq!(line.notes.len(), 1);
        let interval = line.notes[0].pitch.semitone() - 60;
        assert!(matches!(interval, 0 | 12), "got {}", interval);
    }

    #[test]
    fn test_same_seed_same_line() {
        let cf = cantus(&["C4", "D4", "F4", "E4", "D4", "C4"]);
        let a = run(&cf, RhythmMode::Whole, 99).unwrap();
        let b = run(&cf, RhythmMode::Whole, 99).unwrap();
        assert_eq!(a.pitches(), b.pitches());
    }

    #[test]
    fn test_impossible_cantus_exhausts_budget() {
        // Above the soprano band, so no slot can be filled.
        let cf = cantus(&["C6", "D6"]);
        let config = CounterpointConfig {
            retry_budget: 12,
            max_steps: 500,
        };
        let result = generate_counterpoint(
            &cf,
            &Key::c_major(),
            RhythmMode::Whole,
            &CounterpointRules::standard(),
            &config,
            &mut SearchRng::new(3),
        );
        match result {
            Err(GenerateError::NoSolutionFound { position, steps }) => {
                assert_eq!(position, 0);
                assert!(steps > 500, "stops only once the budget is spent, got {}", steps);
            }
            other => panic!("expected NoSolutionFound, got {:?}", other),
        }
    }
}
