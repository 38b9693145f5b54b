// Four-voice harmonization of a bass line.
//
// Given a bass line and a key, choose one triad and one soprano/alto/tenor
// voicing per bass note so that every rule in a `HarmonyRules` set holds for
// every chord and every consecutive pair.
//
// Search is depth-first over an explicit `SearchStack` (search.rs): one frame
// per bass note, holding that note's candidate chords in preference order.
// `accepted` always holds exactly one chord per frame below the top, so
// popping an exhausted frame also pops the chord of the frame beneath it,
// which then moves on to its next candidate. The search is exhaustive within
// `HarmonyConfig::max_steps` candidate checks: if any legal harmonization
// exists and the budget allows, one is found.
//
// Candidate order: root position before first before second inversion, then
// doubling preference (root, fifth, tripled root, third), then smallest total
// upper-voice movement from the previous chord (or from the middle of each
// voice's band for the first chord). Candidates that tie on all three are
// shuffled with the caller's RNG when `shuffle_ties` is set, which is the only
// place randomness enters; the same seed always gives the same result.
//
// A successful result may carry `Diagnostic`s for V to VI steps whose leading
// tone does not rise (the leading-tone rule exempts that step).

use crate::chord::{Chord, Inversion, Voice, Voicing};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::GenerateError;
use crate::key::Key;
use crate::pitch::Pitch;
use crate::search::{Frame, SearchStack};
use crate::voice_leading::{HarmonyRules, LeadingToneResolution, VoicingContext};
use cantor_prng::SearchRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Tunables for the harmony search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonyConfig {
    /// Candidate checks allowed before the search gives up.
    pub max_steps: usize,
    /// Shuffle candidates that tie on inversion, doubling and movement.
    pub shuffle_ties: bool,
}

impl Default for HarmonyConfig {
    fn default() -> Self {
        HarmonyConfig {
            max_steps: 200_000,
            shuffle_ties: true,
        }
    }
}

/// A complete four-voice setting of a bass line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Harmonization {
    pub key: Key,
    /// One chord per bass note, same order.
    pub chords: Vec<Chord>,
    pub diagnostics: Vec<Diagnostic>,
    /// Candidate checks the search spent.
    pub steps: usize,
}

impl Harmonization {
    /// The line sung by one voice.
    pub fn voice(&self, voice: Voice) -> Vec<Pitch> {
        self.chords.iter().map(|c| c.pitch(voice)).collect()
    }

    /// Roman-numeral analysis, e.g. `["I", "IV", "V", "I"]`.
    pub fn labels(&self) -> Vec<String> {
        self.chords.iter().map(|c| c.label()).collect()
    }
}

// ── Candidate enumeration ──

/// Every voicing over `bass` of every diatonic triad that has the bass note
/// as root, third or fifth, with the upper voices in strict S > A > T > bass
/// order and inside their bands. Ordered by inversion, doubling preference,
/// then movement from `previous`.
///
/// A bass note outside the key yields no candidates.
pub fn candidate_chords(key: &Key, bass: Pitch, previous: Option<&Chord>) -> Vec<Chord> {
    let Some(bass_degree) = key.degree_of(bass) else {
        return Vec::new();
    };
    let mut candidates = Vec::new();
    for inversion in Inversion::ALL {
        let root = bass_degree.offset(-inversion.bass_tone().steps_above_root());
        let triad = key.triad(root);
        let pool = |voice: Voice| -> Vec<Pitch> {
            let (low, high) = voice.range();
            let mut pitches: Vec<Pitch> = [triad.root, triad.third, triad.fifth]
                .iter()
                .flat_map(|pc| pc.pitches_in_range(low, high))
                .collect();
            pitches.sort();
            pitches
        };
        let (sopranos, altos, tenors) = (
            pool(Voice::Soprano),
            pool(Voice::Alto),
            pool(Voice::Tenor),
        );
        for &soprano in &sopranos {
            for &alto in altos.iter().filter(|&&a| a < soprano) {
                for &tenor in tenors.iter().filter(|&&t| t < alto && t > bass) {
                    candidates.push(Chord {
                        triad,
                        inversion,
                        voicing: Voicing {
                            soprano,
                            alto,
                            tenor,
                            bass,
                        },
                    });
                }
            }
        }
    }
    candidates.sort_by_key(|c| sort_key(c, previous));
    candidates
}

type SortKey = (Inversion, u8, i16);

fn sort_key(chord: &Chord, previous: Option<&Chord>) -> SortKey {
    (chord.inversion, chord.doubling().preference(), movement(chord, previous))
}

/// Total semitones the upper voices move from `previous`, or their distance
/// from the middle of their bands when there is no previous chord.
fn movement(chord: &Chord, previous: Option<&Chord>) -> i16 {
    Voice::UPPER
        .iter()
        .map(|&voice| {
            let from = match previous {
                Some(prev) => prev.pitch(voice).semitone(),
                None => {
                    let (low, high) = voice.range();
                    (low + high) / 2
                }
            };
            (chord.pitch(voice).semitone() - from).abs()
        })
        .sum()
}

/// `candidate_chords`, with tie groups shuffled when configured.
fn ordered_candidates(
    key: &Key,
    bass: Pitch,
    previous: Option<&Chord>,
    config: &HarmonyConfig,
    rng: &mut SearchRng,
) -> Vec<Chord> {
    let candidates = candidate_chords(key, bass, previous);
    if !config.shuffle_ties {
        return candidates;
    }
    let mut keyed: Vec<(SortKey, Chord)> = candidates
        .into_iter()
        .map(|c| (sort_key(&c, previous), c))
        .collect();
    for group in keyed.chunk_by_mut(|a, b| a.0 == b.0) {
        rng.shuffle(group);
    }
    keyed.into_iter().map(|(_, c)| c).collect()
}

// ── Search ──

/// Harmonize `bass` in `key`.
///
/// Fails with `EmptyInput` for an empty line, and with `NoSolutionFound` when
/// every combination has been ruled out or the step budget runs out; the
/// error's position is the furthest bass note the search reached.
pub fn harmonize(
    bass: &[Pitch],
    key: &Key,
    rules: &HarmonyRules,
    config: &HarmonyConfig,
    rng: &mut SearchRng,
) -> Result<Harmonization, GenerateError> {
    if bass.is_empty() {
        return Err(GenerateError::EmptyInput);
    }

    let mut stack: SearchStack<Chord> = SearchStack::new();
    let mut accepted: Vec<Chord> = Vec::with_capacity(bass.len());
    stack.push(Frame::new(
        0,
        ordered_candidates(key, bass[0], None, config, rng),
    ));

    while let Some(frame) = stack.top_mut() {
        let position = frame.position;
        let Some(candidate) = frame.next_candidate() else {
            stack.pop();
            accepted.pop();
            debug!(position, depth = stack.depth(), "harmony backtrack");
            continue;
        };
        if !stack.charge(1, config.max_steps) {
            warn!(steps = stack.steps, "harmony step budget exhausted");
            break;
        }

        let ctx = VoicingContext {
            key,
            position,
            history: &accepted,
            candidate: &candidate,
            next_bass: bass.get(position + 1).copied(),
        };
        if rules.check(&ctx).is_err() {
            continue;
        }

        accepted.push(candidate);
        if accepted.len() == bass.len() {
            let diagnostics = unsupported_progressions(key, &accepted);
            for diagnostic in &diagnostics {
                warn!(%diagnostic, "result relies on an unenforced progression");
            }
            info!(
                chords = accepted.len(),
                steps = stack.steps,
                "harmonization found"
            );
            return Ok(Harmonization {
                key: *key,
                chords: accepted,
                diagnostics,
                steps: stack.steps,
            });
        }
        let next = position + 1;
        let candidates = ordered_candidates(key, bass[next], Some(&candidate), config, rng);
        stack.push(Frame::new(next, candidates));
    }

    Err(GenerateError::NoSolutionFound {
        position: stack.deepest,
        steps: stack.steps,
    })
}

/// V to VI steps in `chords` whose leading tone does not rise to the tonic.
pub fn unsupported_progressions(key: &Key, chords: &[Chord]) -> Vec<Diagnostic> {
    chords
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| LeadingToneResolution::is_exempt(&pair[0], &pair[1]))
        .filter_map(|(i, pair)| {
            let voices = LeadingToneResolution::unresolved_voices(key, &pair[0], &pair[1]);
            let voice = voices.first()?;
            Some(Diagnostic {
                position: i + 1,
                kind: DiagnosticKind::UnsupportedProgression,
                message: format!(
                    "{} to {}: leading tone {} in {} does not resolve to the tonic",
                    pair[0].label(),
                    pair[1].label(),
                    pair[0].pitch(*voice),
                    voice.name()
                ),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Degree;
    use crate::pitch::parse_pitches;

    fn bass(tokens: &[&str]) -> Vec<Pitch> {
        parse_pitches(tokens).unwrap()
    }

    fn run(tokens: &[&str], key: &Key, seed: u64) -> Result<Harmonization, GenerateError> {
        let mut rng = SearchRng::new(seed);
        harmonize(
            &bass(tokens),
            key,
            &HarmonyRules::standard(),
            &HarmonyConfig::default(),
            &mut rng,
        )
    }

    #[test]
    fn test_empty_bass_is_an_error() {
        assert_eq!(
            run(&[], &Key::c_major(), 1).unwrap_err(),
            GenerateError::EmptyInput
        );
    }

    #[test]
    fn test_candidates_prefer_root_position() {
        let key = Key::c_major();
        let candidates = candidate_chords(&key, "C3".parse().unwrap(), None);
        assert!(!candidates.is_empty());
        let first = candidates[0];
        assert_eq!(first.inversion, Inversion::Root);
        assert_eq!(first.triad.degree, Degree::I);
        for c in &candidates {
            let v = c.voicing;
            assert!(v.soprano > v.alto && v.alto > v.tenor && v.tenor > v.bass, "got {}", c);
        }
        let inversions: Vec<Inversion> = candidates.iter().map(|c| c.inversion).collect();
        assert!(inversions.windows(2).all(|w| w[0] <= w[1]));
        // C is the third of vi and the fifth of IV.
        assert!(candidates.iter().any(|c| c.label() == "vi6"));
        assert!(candidates.iter().any(|c| c.label() == "IV64"));
    }

    #[test]
    fn test_chromatic_bass_has_no_candidates() {
        let key = Key::c_major();
        assert!(candidate_chords(&key, "C#3".parse().unwrap(), None).is_empty());
        match run(&["C3", "C#3"], &key, 1) {
            Err(GenerateError::NoSolutionFound { position, .. }) => assert_eq!(position, 1),
            other => panic!("expected NoSolutionFound, got {:?}", other),
        }
    }

    #[test]
    fn test_cadence_is_harmonized() {
        let key = Key::c_major();
        let result = run(&["C3", "F3", "G3", "C3"], &key, 7).unwrap();
        assert_eq!(result.chords.len(), 4);
        let degrees: Vec<Degree> = result.chords.iter().map(|c| c.triad.degree).collect();
        assert_eq!(degrees, vec![Degree::I, Degree::IV, Degree::V, Degree::I]);
        let violations = HarmonyRules::standard().validate(&key, &result.chords);
        assert!(violations.is_empty(), "got {:?}", violations);
        assert_eq!(result.voice(Voice::Bass), bass(&["C3", "F3", "G3", "C3"]));
    }

    #[test]
    fn test_minor_key_uses_leading_tone() {
        let key = Key::parse("A", "minor").unwrap();
        let result = run(&["A2", "D3", "E3", "A2"], &key, 3).unwrap();
        let dominant = result.chords[2];
        assert_eq!(dominant.triad.degree, Degree::V);
        assert!(
            dominant.voicing.pitches().iter().any(|&p| key.is_leading_tone(p)),
            "V in A minor should contain G#, got {}",
            dominant
        );
        assert!(HarmonyRules::standard().validate(&key, &result.chords).is_empty());
    }

    #[test]
    fn test_same_seed_same_result() {
        let key = Key::c_major();
        let a = run(&["C3", "A2", "F2", "G2", "C3"], &key, 42).unwrap();
        let b = run(&["C3", "A2", "F2", "G2", "C3"], &key, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_step_budget_is_enforced() {
        let key = Key::c_major();
        let config = HarmonyConfig {
            max_steps: 1,
            shuffle_ties: false,
        };
        // Out of the bass band, so every candidate is rejected.
        let result = harmonize(
            &bass(&["C2", "G2"]),
            &key,
            &HarmonyRules::standard(),
            &config,
            &mut SearchRng::new(0),
        );
        match result {
            Err(GenerateError::NoSolutionFound { position, steps }) => {
                assert_eq!(position, 0);
                assert_eq!(steps, 2);
            }
            other => panic!("expected NoSolutionFound, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_progression_reported() {
        let key = Key::c_major();
        let p = |s: &str| -> Pitch { s.parse().unwrap() };
        let dominant = Chord {
            triad: key.triad(Degree::V),
            inversion: Inversion::Root,
            voicing: Voicing {
                soprano: p("D5"),
                alto: p("B4"),
                tenor: p("G4"),
                bass: p("G3"),
            },
        };
        let submediant = Chord {
            triad: key.triad(Degree::VI),
            inversion: Inversion::Root,
            voicing: Voicing {
                soprano: p("C5"),
                alto: p("A4"),
                tenor: p("E4"),
                bass: p("A3"),
            },
        };
        let diagnostics = unsupported_progressions(&key, &[dominant, submediant]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].position, 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::UnsupportedProgression);
        assert!(diagnostics[0].message.contains("alto"), "got {}", diagnostics[0].message);
    }
}
