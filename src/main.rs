use anyhow::{Result, bail};
use clap::{ArgAction, Parser};
use note_detector::audio::pitch::{DEFAULT_FMAX_NOTE, DEFAULT_FMIN_NOTE, PitchSettings};
use note_detector::audio::playback::{DevicePlayer, Playback, Silent};
use note_detector::note::Note;
use note_detector::review::{ReviewOptions, Reviewer};
use note_detector::scan::{self, Resolved};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{info, warn};

/// Review WAV files for pitch mismatches.
///
/// Each file's note is read from its name (`something-C#4.wav`), the predominant pitch is
/// detected, and mismatches can be auditioned, renamed or flagged.
#[derive(Debug, Parser)]
#[command(name = "note-detector", version, about)]
struct Cli {
    /// Skip interactive review for octave-only mismatches
    #[arg(long)]
    notes_only: bool,

    /// Play each detected note after analysis
    #[arg(long)]
    play: bool,

    /// Play the original audio file before analysis
    #[arg(long)]
    play_file: bool,

    /// Print the pitch estimate of every analysis frame
    #[arg(long)]
    frames: bool,

    /// Report results only, never prompt for review
    #[arg(long)]
    batch: bool,

    /// Disable all audio output
    #[arg(long)]
    no_audio: bool,

    /// Lowest note considered by the pitch tracker
    #[arg(long, default_value_t = DEFAULT_FMIN_NOTE)]
    fmin: Note,

    /// Highest note considered by the pitch tracker
    #[arg(long, default_value_t = DEFAULT_FMAX_NOTE)]
    fmax: Note,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Files or directories to process
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();
}

fn open_player(cli: &Cli) -> Box<dyn Playback> {
    let wants_audio = cli.play || cli.play_file || !cli.batch;
    if cli.no_audio || !wants_audio {
        return Box::new(Silent);
    }
    match DevicePlayer::new() {
        Ok(player) => {
            info!(sample_rate = player.sample_rate(), "Opened output device");
            Box::new(player)
        }
        Err(e) => {
            warn!("Audio output unavailable, continuing silently: {e:#}");
            eprintln!("Audio output unavailable: {e:#}");
            Box::new(Silent)
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.fmin.midi() >= cli.fmax.midi() {
        bail!("--fmin ({}) must be below --fmax ({})", cli.fmin, cli.fmax);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut candidates = Vec::new();
    for path in &cli.paths {
        match scan::resolve(path) {
            Resolved::Directory(files) => {
                writeln!(out, "Scanning directory: {}", path.display())?;
                candidates.extend(files);
            }
            Resolved::File(file) => candidates.push(file),
            Resolved::Skipped => writeln!(
                out,
                "Skipping {}: Not a valid directory or .wav file",
                path.display()
            )?,
        }
    }

    let options = ReviewOptions {
        notes_only: cli.notes_only,
        play_file: cli.play_file,
        play_detected: cli.play,
        frames: cli.frames,
        interactive: !cli.batch,
    };
    let settings = PitchSettings::with_range(cli.fmin, cli.fmax);
    let player = open_player(&cli);

    let stdin = io::stdin();
    let mut reviewer = Reviewer::new(stdin.lock(), out, player, options, settings);
    let summary = reviewer.review_all(&candidates)?;
    let mut out = reviewer.into_output();

    if !candidates.is_empty() {
        writeln!(
            out,
            "\nSummary: {} matched, {} octave-only, {} mismatched, {} undetected, {} unlabeled, {} failed; {} renamed, {} flagged",
            summary.matched,
            summary.octave_only,
            summary.mismatched,
            summary.undetected,
            summary.unlabeled,
            summary.failed,
            summary.renamed,
            summary.flagged
        )?;
    }
    Ok(())
}
