// Cantor: CLI entry point.
//
// Harmonizes a bass line in four parts, or writes a species-counterpoint line
// above a cantus firmus, and prints the result as a LilyPond document (or as
// JSON with `--json`).
//
// Usage:
//   cantor harmonize --key C --mode major C4 A3 F3 D3 G3 C3
//   cantor counterpoint --rhythm half C4 A3 G3 E3 F3 A3 G3 E3 D3 C3
//
// `--rhythm` defaults to quarter notes.
//
// Common flags: --seed N, --config FILE.json, --output FILE.ly, --json,
// --explain (chord analysis / tone roles on stderr), -v / -vv (log level).
//
// Logging goes to stderr through tracing-subscriber; `RUST_LOG` overrides the
// level chosen by -v.

use anyhow::{Context, Result};
use cantor_music::cantus::{CantusFirmus, RhythmMode};
use cantor_music::config::CantorConfig;
use cantor_music::counterpoint::{default_key, generate_counterpoint};
use cantor_music::counterpoint_rules::CounterpointRules;
use cantor_music::harmony::harmonize;
use cantor_music::key::{Key, Mode};
use cantor_music::lilypond::{counterpoint_to_lilypond, harmonization_to_lilypond};
use cantor_music::pitch::{Interval, PitchClass, parse_pitches};
use cantor_music::voice_leading::HarmonyRules;
use cantor_prng::{SearchRng, entropy_seed};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Rule-based four-part harmony and species counterpoint
#[derive(Parser)]
#[command(name = "cantor")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Seed for the search RNG (default: a fresh seed every run)
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// JSON file with search settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write the result here instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Print the result structure as JSON instead of LilyPond
    #[arg(long, global = true)]
    json: bool,

    /// Print chord analysis or tone roles to stderr
    #[arg(long, global = true)]
    explain: bool,

    /// Raise the log level (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write soprano, alto and tenor above a bass line
    Harmonize {
        /// Key tonic, e.g. C, F#, Bb
        #[arg(long, default_value = "C")]
        key: String,

        /// major or minor
        #[arg(long, default_value = "major")]
        mode: String,

        /// Override the configured candidate-check budget
        #[arg(long)]
        max_steps: Option<usize>,

        /// Bass notes, e.g. C3 G2 A2
        #[arg(required = true)]
        bass: Vec<String>,
    },

    /// Write a counterpoint line above a cantus firmus
    Counterpoint {
        /// whole, half or quarter notes against each cantus note
        #[arg(long, default_value = "quarter")]
        rhythm: String,

        /// Key tonic (default: the cantus's final note)
        #[arg(long)]
        key: Option<String>,

        /// major or minor (default: major)
        #[arg(long)]
        mode: Option<String>,

        /// Override the configured per-slot retry budget
        #[arg(long)]
        retry_budget: Option<usize>,

        /// Override the configured candidate-check budget
        #[arg(long)]
        max_steps: Option<usize>,

        /// Cantus firmus notes, e.g. C4 D4 F4 E4 D4 C4
        #[arg(required = true)]
        cantus: Vec<String>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => CantorConfig::load(path)?,
        None => CantorConfig::default(),
    };
    let seed = cli.seed.unwrap_or_else(entropy_seed);
    info!(seed, "search seed");
    let mut rng = SearchRng::new(seed);

    let rendered = match &cli.command {
        Commands::Harmonize {
            key,
            mode,
            max_steps,
            bass,
        } => {
            if let Some(n) = max_steps {
                config.harmony.max_steps = *n;
            }
            run_harmonize(&cli, &config, key, mode, bass, &mut rng)?
        }
        Commands::Counterpoint {
            rhythm,
            key,
            mode,
            retry_budget,
            max_steps,
            cantus,
        } => {
            if let Some(n) = retry_budget {
                config.counterpoint.retry_budget = *n;
            }
            if let Some(n) = max_steps {
                config.counterpoint.max_steps = *n;
            }
            let key = (key.as_deref(), mode.as_deref());
            run_counterpoint(&cli, &config, rhythm, key, cantus, &mut rng)?
        }
    };

    match &cli.output {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("writing {}", path.display()))?,
        None => print!("{}", rendered),
    }
    Ok(())
}

fn run_harmonize(
    cli: &Cli,
    config: &CantorConfig,
    tonic: &str,
    mode: &str,
    bass: &[String],
    rng: &mut SearchRng,
) -> Result<String> {
    let key = Key::parse(tonic, mode)?;
    let bass = parse_pitches(bass)?;
    let result = harmonize(&bass, &key, &HarmonyRules::standard(), &config.harmony, rng)
        .with_context(|| format!("harmonizing {} bass notes in {}", bass.len(), key))?;

    if cli.explain {
        eprintln!("{} ({} candidate checks)", key, result.steps);
        for (i, chord) in result.chords.iter().enumerate() {
            eprintln!("{:>3}  {}", i + 1, chord);
        }
        for diagnostic in &result.diagnostics {
            eprintln!("note: {}", diagnostic);
        }
    }

    if cli.json {
        Ok(serde_json::to_string_pretty(&result)? + "\n")
    } else {
        Ok(harmonization_to_lilypond(&result, "Cantor"))
    }
}

fn run_counterpoint(
    cli: &Cli,
    config: &CantorConfig,
    rhythm: &str,
    key: (Option<&str>, Option<&str>),
    cantus: &[String],
    rng: &mut SearchRng,
) -> Result<String> {
    let rhythm: RhythmMode = rhythm.parse()?;
    let cantus = CantusFirmus::new(parse_pitches(cantus)?)?;
    let tonic: PitchClass = match key.0 {
        Some(token) => token.parse()?,
        None => default_key(&cantus).tonic,
    };
    let mode: Mode = match key.1 {
        Some(token) => token.parse()?,
        None => Mode::Major,
    };
    let key = Key::new(tonic, mode);

    let line = generate_counterpoint(
        &cantus,
        &key,
        rhythm,
        &CounterpointRules::standard(),
        &config.counterpoint,
        rng,
    )
    .with_context(|| {
        format!(
            "writing {} counterpoint over {} cantus notes",
            rhythm,
            cantus.len()
        )
    })?;

    if cli.explain {
        eprintln!("{}, {} notes ({} candidate checks)", key, rhythm, line.steps);
        for note in &line.notes {
            let under = cantus.notes()[note.slot.measure];
            eprintln!(
                "{:>3}.{}  {:<4} over {:<4} {:<4} {:?}",
                note.slot.measure + 1,
                note.slot.beat + 1,
                note.pitch.to_string(),
                under.to_string(),
                Interval::between(under, note.pitch).to_string(),
                note.kind
            );
        }
    }

    if cli.json {
        let doc = serde_json::json!({ "cantus": cantus, "line": line });
        Ok(serde_json::to_string_pretty(&doc)? + "\n")
    } else {
        Ok(counterpoint_to_lilypond(&line, &cantus, "Cantor"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counterpoint_rhythm_defaults_to_quarter() {
        let cli = Cli::try_parse_from(["cantor", "counterpoint", "C4", "D4", "C4"]).unwrap();
        match cli.command {
            Commands::Counterpoint { rhythm, .. } => {
                assert_eq!(rhythm.parse::<RhythmMode>().unwrap(), RhythmMode::Quarter);
            }
            _ => panic!("expected the counterpoint subcommand"),
        }
    }
}
