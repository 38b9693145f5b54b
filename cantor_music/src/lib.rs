// Cantor: rule-based harmony and counterpoint generation.
//
// Two generative engines share one music-theory model. The harmonizer takes a
// bass line and a key and writes soprano, alto and tenor parts above it under
// classical four-part voice-leading rules. The counterpoint generator takes a
// cantus firmus and writes a species-counterpoint line above it in whole,
// half or quarter notes. Both fill their parts left to right over an explicit
// backtracking stack, asking a rule set to accept or reject each candidate.
//
// Architecture:
// - pitch.rs: Spelled pitches, pitch classes, intervals and motion
// - key.rs: Keys (major / harmonic minor), scale degrees, diatonic triads
// - chord.rs: Voices and register bands, triads, inversions, voicings
// - diagnostics.rs: Rule violations and result diagnostics
// - error.rs: Parse, generation and config errors
// - search.rs: Decision frames and the backtracking stack
// - voice_leading.rs: Four-part harmony rules
// - harmony.rs: Candidate chord enumeration and the harmony search
// - cantus.rs: Cantus firmus, rhythm modes, slot layout, line types
// - counterpoint_rules.rs: Species-counterpoint rules
// - counterpoint.rs: Randomized counterpoint search with retries and restarts
// - lilypond.rs: LilyPond sheet music output
// - config.rs: JSON-loadable search configuration
//
// Output is deterministic given a seed (see the cantor_prng crate).

pub mod cantus;
pub mod chord;
pub mod config;
pub mod counterpoint;
pub mod counterpoint_rules;
pub mod diagnostics;
pub mod error;
pub mod harmony;
pub mod key;
pub mod lilypond;
pub mod pitch;
pub mod search;
pub mod voice_leading;
