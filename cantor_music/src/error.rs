// Error types for the Cantor engines.
//
// Three families, each a `thiserror` enum:
// - `ParseError`: a malformed input token (pitch, tonic, mode, rhythm). Raised
//   by the `FromStr` impls in pitch.rs, key.rs and cantus.rs before any search
//   starts, and always names the offending token.
// - `GenerateError`: a search that could not produce a result. Returned by
//   harmony.rs and counterpoint.rs.
// - `ConfigError`: the JSON configuration file could not be read or decoded
//   (config.rs).
//
// Rule evaluation never fails; rule outcomes are `RuleViolation` values (see
// diagnostics.rs), not errors.

use thiserror::Error;

/// A malformed input token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid pitch '{token}': {reason}")]
    Pitch { token: String, reason: &'static str },
    #[error("invalid key tonic '{token}': {reason}")]
    Tonic { token: String, reason: &'static str },
    #[error("unknown mode '{token}' (expected major or minor)")]
    Mode { token: String },
    #[error("unknown rhythm '{token}' (expected whole, half or quarter)")]
    Rhythm { token: String },
}

/// A generation run that ended without a solution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("no input notes given")]
    EmptyInput,
    #[error("no solution found: search stopped at position {position} after {steps} checks")]
    NoSolutionFound { position: usize, steps: usize },
}

/// The configuration file could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file '{path}'")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
