// Rule outcomes and run diagnostics.
//
// `RuleViolation` is what every harmony and counterpoint rule returns when it
// rejects a candidate. The generators only need the fact of rejection to
// drive backtracking; the rule name, positions and description exist so that
// tests and `--explain` output can say why a voicing or line is illegal.
//
// `Diagnostic` marks a successful result that passed through a known gap in
// the rule set. The only kind is the V to VI leading-tone case, which the
// leading-tone rule deliberately does not enforce (see voice_leading.rs).

use serde::Serialize;
use std::fmt;

/// A rule's rejection of a voicing or line prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleViolation {
    /// Stable rule name, e.g. `"parallel-perfects"`.
    pub rule: &'static str,
    /// Positions involved (chord indices or line-note indices), ascending.
    pub positions: Vec<usize>,
    pub description: String,
}

impl RuleViolation {
    pub fn new(rule: &'static str, positions: Vec<usize>, description: impl Into<String>) -> Self {
        RuleViolation {
            rule,
            positions,
            description: description.into(),
        }
    }
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let positions: Vec<String> = self.positions.iter().map(|p| p.to_string()).collect();
        write!(
            f,
            "[{}] at {}: {}",
            self.rule,
            positions.join(","),
            self.description
        )
    }
}

/// Kinds of known gaps a result can pass through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// A V to VI step whose leading tone does not rise to the tonic.
    UnsupportedProgression,
}

/// A note attached to an otherwise successful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Index of the chord that follows the affected step.
    pub position: usize,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} at chord {}: {}", self.kind, self.position, self.message)
    }
}
