//! Per-file detection and interactive review.
//!
//! Sample files are expected to carry their note in the name, e.g. `piano-C#4.wav`.
//! Each file is analysed, the median voiced pitch is mapped to a note, and the result is
//! compared with the name. Mismatches can be auditioned and then kept, renamed or
//! flagged with a leading `_`.

use crate::audio::Audio;
use crate::audio::file::AudioFileData;
use crate::audio::pitch::{PitchSettings, PitchTrack};
use crate::audio::playback::Playback;
use crate::note::{Detection, Note, frequency_to_note};
use anyhow::{Context, Result};
use crossterm::style::Stylize;
use regex::Regex;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

static NOTE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)-([A-G][#b]?\d)(\.wav)$").expect("note suffix pattern is valid")
});

static NOTE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[A-G][#b]?\d$").expect("note name pattern is valid"));

const DETECTED_TONE: Duration = Duration::from_secs(1);
const REVIEW_TONE: Duration = Duration::from_secs(2);

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Note encoded in a file name such as `lead-Bb3.wav`.
pub fn expected_note(path: &Path) -> Option<Note> {
    let name = file_name(path);
    let caps = NOTE_SUFFIX.captures(&name)?;
    caps[1].parse().ok()
}

/// `path` with its note suffix replaced by `note`. `None` if the name has no note suffix.
pub fn renamed_path(path: &Path, note: Note) -> Option<PathBuf> {
    let name = file_name(path);
    let caps = NOTE_SUFFIX.captures(&name)?;
    let start = caps.get(0)?.start();
    let renamed = format!("{}-{}{}", &name[..start], note, &caps[2]);
    Some(path.with_file_name(renamed))
}

/// `path` with a leading `_`. `None` if it is already flagged.
pub fn flagged_path(path: &Path) -> Option<PathBuf> {
    let name = file_name(path);
    if name.starts_with('_') {
        return None;
    }
    Some(path.with_file_name(format!("_{name}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Match,
    /// Right pitch class, wrong octave.
    OctaveOnly,
    Mismatch,
    /// Nothing voiced was found in the file.
    Undetected,
}

impl Verdict {
    pub fn classify(expected: Note, detected: Option<Note>) -> Verdict {
        match detected {
            None => Verdict::Undetected,
            Some(note) if note == expected => Verdict::Match,
            Some(note) if note.same_pitch_class(&expected) => Verdict::OctaveOnly,
            Some(_) => Verdict::Mismatch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Keep,
    Rename,
    Manual,
    Flag,
}

impl ReviewAction {
    /// Parses a menu choice. Rename needs a detection and flagging is not offered for
    /// octave-only mismatches.
    pub fn parse(input: &str, can_rename: bool, octave_only: bool) -> Option<ReviewAction> {
        match input.trim().to_lowercase().as_str() {
            "k" => Some(ReviewAction::Keep),
            "r" if can_rename => Some(ReviewAction::Rename),
            "m" => Some(ReviewAction::Manual),
            "f" if !octave_only => Some(ReviewAction::Flag),
            _ => None,
        }
    }

    fn menu(can_rename: bool, octave_only: bool) -> String {
        let mut options = vec!["[k]eep"];
        if can_rename {
            options.push("[r]ename to detected note");
        }
        options.push("[m]anually input");
        if !octave_only {
            options.push("[f]lag for review");
        }
        format!("Choose action {}: ", options.join(", "))
    }
}

/// What happened to the file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Not reviewed: a match, an unlabeled file, or review disabled.
    Unreviewed,
    Kept,
    Renamed(PathBuf),
    Flagged(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub path: PathBuf,
    pub expected: Option<Note>,
    pub detection: Option<Detection>,
    pub verdict: Option<Verdict>,
    pub resolution: Resolution,
}

/// Totals across a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub matched: usize,
    pub octave_only: usize,
    pub mismatched: usize,
    pub undetected: usize,
    pub unlabeled: usize,
    pub failed: usize,
    pub renamed: usize,
    pub flagged: usize,
}

impl Summary {
    pub fn record(&mut self, report: &FileReport) {
        match report.verdict {
            Some(Verdict::Match) => self.matched += 1,
            Some(Verdict::OctaveOnly) => self.octave_only += 1,
            Some(Verdict::Mismatch) => self.mismatched += 1,
            Some(Verdict::Undetected) => self.undetected += 1,
            None => self.unlabeled += 1,
        }
        match report.resolution {
            Resolution::Renamed(_) => self.renamed += 1,
            Resolution::Flagged(_) => self.flagged += 1,
            Resolution::Unreviewed | Resolution::Kept => {}
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewOptions {
    /// Report octave-only mismatches without reviewing them.
    pub notes_only: bool,
    /// Play each file before analysing it.
    pub play_file: bool,
    /// Play a tone at the detected note after analysis.
    pub play_detected: bool,
    /// Print every analysis frame.
    pub frames: bool,
    /// Prompt for review of mismatches.
    pub interactive: bool,
}

pub struct Reviewer<R, W> {
    input: R,
    output: W,
    player: Box<dyn Playback>,
    options: ReviewOptions,
    settings: PitchSettings,
}

impl<R: BufRead, W: Write> Reviewer<R, W> {
    pub fn new(
        input: R,
        output: W,
        player: Box<dyn Playback>,
        options: ReviewOptions,
        settings: PitchSettings,
    ) -> Self {
        Self {
            input,
            output,
            player,
            options,
            settings,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Processes every file in order. A failing file is reported and skipped.
    pub fn review_all(&mut self, paths: &[PathBuf]) -> Result<Summary> {
        let mut summary = Summary::default();
        let total = paths.len();
        if total == 0 {
            writeln!(self.output, "No candidate WAV files found.")?;
            return Ok(summary);
        }
        writeln!(self.output, "Found {total} candidate files.")?;

        for (i, path) in paths.iter().enumerate() {
            let count = i + 1;
            let percent = count as f64 / total as f64 * 100.0;
            writeln!(
                self.output,
                "\nProcessing file {count} of {total} ({percent:.1}% complete)"
            )?;
            match self.process_file(path) {
                Ok(report) => summary.record(&report),
                Err(e) => {
                    warn!(path = %path.display(), "Processing failed: {e:#}");
                    let line = format!("Error processing {}: {e:#}", path.display());
                    writeln!(self.output, "{}", line.red())?;
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    pub fn process_file(&mut self, path: &Path) -> Result<FileReport> {
        let base = file_name(path);
        let expected = expected_note(path);
        match expected {
            Some(note) => writeln!(
                self.output,
                "Processing {} (expected: {note})",
                path.display()
            )?,
            None => writeln!(
                self.output,
                "Processing {} (no expected note in file name)",
                path.display()
            )?,
        }

        let audio = AudioFileData::load(path)?.to_audio();
        if self.options.play_file {
            writeln!(self.output, "Playing original audio file...")?;
            self.play_audio(&audio)?;
        }

        let track = audio.track_pitch(&self.settings);
        if self.options.frames {
            self.print_frames(&track)?;
        }
        let detection = match track.median_f0() {
            Some(f0) => match frequency_to_note(f0) {
                Ok(d) => Some(d),
                Err(e) => {
                    warn!(path = %path.display(), "Median pitch rejected: {e}");
                    None
                }
            },
            None => None,
        };
        debug!(path = %path.display(), ?detection, "Detection complete");

        if let (true, Some(d)) = (self.options.play_detected, detection) {
            writeln!(
                self.output,
                "Playing detected note {} at {:.2}Hz...",
                d.note(),
                d.frequency()
            )?;
            self.play_tone(d.frequency(), DETECTED_TONE)?;
        }

        let mut report = FileReport {
            path: path.to_path_buf(),
            expected,
            detection,
            verdict: None,
            resolution: Resolution::Unreviewed,
        };

        let Some(expected) = expected else {
            match detection {
                Some(d) => writeln!(self.output, "Detected: {base} -> {d}")?,
                None => writeln!(self.output, "Detected: {base} -> None")?,
            }
            return Ok(report);
        };

        let verdict = Verdict::classify(expected, detection.map(|d| d.note()));
        report.verdict = Some(verdict);
        let detected = describe(detection);
        match verdict {
            Verdict::Match => {
                let line = format!("Match: {base} -> {detected}");
                writeln!(self.output, "{}", line.green())?;
                return Ok(report);
            }
            Verdict::OctaveOnly if self.options.notes_only => {
                let line = format!(
                    "Octave-only mismatch (skipped review): {base} (expected {expected}, detected {})",
                    note_name(detection)
                );
                writeln!(self.output, "{}", line.green())?;
                return Ok(report);
            }
            Verdict::OctaveOnly => {
                let line = format!(
                    "Octave-only mismatch: {base} (expected {expected}, detected {})",
                    note_name(detection)
                );
                writeln!(self.output, "{}", line.green())?;
            }
            Verdict::Mismatch | Verdict::Undetected => {
                let line = format!("Mismatch: {base} (expected {expected}, detected {detected})");
                writeln!(self.output, "{}", line.red())?;
            }
        }

        if self.options.interactive {
            report.resolution = self.review(path, &audio, expected, detection, verdict)?;
        }
        Ok(report)
    }

    fn print_frames(&mut self, track: &PitchTrack) -> Result<()> {
        writeln!(self.output, "  time(s)      f0(Hz)  note  cents")?;
        for (time, f0) in track.frames() {
            // Unvoiced frames carry f0 = 0, which the mapper rejects
            match frequency_to_note(f64::from(f0)) {
                Ok(d) => writeln!(
                    self.output,
                    "  {time:7.3}  {f0:10.2}  {:<4}  {:+6.1}",
                    d.note().to_string(),
                    d.cents()
                )?,
                Err(_) => writeln!(
                    self.output,
                    "  {time:7.3}  {:>10}  {:<4}  {:>6}",
                    "-",
                    "-",
                    "-"
                )?,
            }
        }
        Ok(())
    }

    fn review(
        &mut self,
        path: &Path,
        audio: &Audio,
        expected: Note,
        detection: Option<Detection>,
        verdict: Verdict,
    ) -> Result<Resolution> {
        write!(self.output, "Press Enter to review mismatch...")?;
        self.output.flush()?;
        if self.read_line()?.is_none() {
            writeln!(self.output)?;
            return Ok(Resolution::Kept);
        }

        writeln!(self.output, "Playing original WAV file...")?;
        self.play_audio(audio)?;
        writeln!(
            self.output,
            "Playing 2-second tone at expected frequency {:.2} Hz (expected note: {expected})...",
            expected.frequency()
        )?;
        self.play_tone(expected.frequency(), REVIEW_TONE)?;
        writeln!(self.output, "Replaying original WAV file...")?;
        self.play_audio(audio)?;
        match detection {
            Some(d) => {
                writeln!(
                    self.output,
                    "Playing 2-second tone at detected frequency {:.2} Hz (detected note: {})...",
                    d.observed(),
                    d.note()
                )?;
                self.play_tone(d.observed(), REVIEW_TONE)?;
            }
            None => writeln!(
                self.output,
                "No valid detected frequency; skipping tone playback."
            )?,
        }

        let can_rename = detection.is_some();
        let octave_only = verdict == Verdict::OctaveOnly;
        let menu = ReviewAction::menu(can_rename, octave_only);
        loop {
            write!(self.output, "{menu}")?;
            self.output.flush()?;
            let Some(choice) = self.read_line()? else {
                writeln!(self.output, "\nKeeping filename as-is.")?;
                return Ok(Resolution::Kept);
            };
            match ReviewAction::parse(&choice, can_rename, octave_only) {
                Some(ReviewAction::Keep) => {
                    writeln!(self.output, "Keeping filename as-is.")?;
                    return Ok(Resolution::Kept);
                }
                Some(ReviewAction::Rename) => {
                    let Some(d) = detection else { continue };
                    return self.rename_to_note(path, d.note());
                }
                Some(ReviewAction::Manual) => {
                    return match self.prompt_manual_note()? {
                        Some(note) => self.rename_to_note(path, note),
                        None => Ok(Resolution::Kept),
                    };
                }
                Some(ReviewAction::Flag) => return self.flag(path),
                None => writeln!(
                    self.output,
                    "Invalid choice. Please enter one of the offered options."
                )?,
            }
        }
    }

    fn prompt_manual_note(&mut self) -> Result<Option<Note>> {
        loop {
            write!(self.output, "Enter correct note (e.g., A4): ")?;
            self.output.flush()?;
            let Some(line) = self.read_line()? else {
                writeln!(self.output, "\nKeeping filename as-is.")?;
                return Ok(None);
            };
            let candidate = line.trim();
            if NOTE_NAME.is_match(candidate) {
                if let Ok(note) = candidate.parse::<Note>() {
                    return Ok(Some(note));
                }
            }
            writeln!(self.output, "Invalid note format. Try again.")?;
        }
    }

    fn rename_to_note(&mut self, path: &Path, note: Note) -> Result<Resolution> {
        let Some(new_path) = renamed_path(path, note) else {
            writeln!(self.output, "File name has no note to replace; keeping it.")?;
            return Ok(Resolution::Kept);
        };
        if self.refuse_existing(&new_path)? {
            return Ok(Resolution::Kept);
        }
        match fs::rename(path, &new_path) {
            Ok(()) => {
                let line = format!("Renamed file to: {}", new_path.display());
                writeln!(self.output, "{}", line.green())?;
                Ok(Resolution::Renamed(new_path))
            }
            Err(e) => {
                let line = format!("Error renaming file: {e}");
                writeln!(self.output, "{}", line.red())?;
                Ok(Resolution::Kept)
            }
        }
    }

    fn flag(&mut self, path: &Path) -> Result<Resolution> {
        let Some(new_path) = flagged_path(path) else {
            writeln!(self.output, "File is already flagged for review.")?;
            return Ok(Resolution::Kept);
        };
        if self.refuse_existing(&new_path)? {
            return Ok(Resolution::Kept);
        }
        match fs::rename(path, &new_path) {
            Ok(()) => {
                let line = format!("Flagged file for review: {}", new_path.display());
                writeln!(self.output, "{}", line.red())?;
                Ok(Resolution::Flagged(new_path))
            }
            Err(e) => {
                let line = format!("Error renaming file: {e}");
                writeln!(self.output, "{}", line.red())?;
                Ok(Resolution::Kept)
            }
        }
    }

    /// Reports and returns true if `target` is already taken.
    fn refuse_existing(&mut self, target: &Path) -> Result<bool> {
        if !target.exists() {
            return Ok(false);
        }
        warn!(target = %target.display(), "Rename target exists, keeping file");
        let line = format!(
            "Cannot rename: {} already exists; keeping filename as-is.",
            target.display()
        );
        writeln!(self.output, "{}", line.red())?;
        Ok(true)
    }

    /// `None` at end of input.
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("reading from input")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn play_audio(&mut self, audio: &Audio) -> Result<()> {
        if let Err(e) = self.player.play_audio(audio) {
            warn!("Audio playback failed: {e:#}");
            writeln!(self.output, "Error playing audio: {e:#}")?;
        }
        Ok(())
    }

    fn play_tone(&mut self, frequency: f64, duration: Duration) -> Result<()> {
        if let Err(e) = self.player.play_tone(frequency, duration) {
            warn!(frequency, "Tone playback failed: {e:#}");
            writeln!(self.output, "Could not play tone: {e:#}")?;
        }
        Ok(())
    }
}

fn note_name(detection: Option<Detection>) -> String {
    detection
        .map(|d| d.note().to_string())
        .unwrap_or_else(|| "None".to_string())
}

fn describe(detection: Option<Detection>) -> String {
    match detection {
        Some(d) => format!("{} at {:.2}Hz ({:+.1} cents)", d.note(), d.observed(), d.cents()),
        None => "None".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::playback::Silent;
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Played {
        Audio(usize),
        Tone(f64, Duration),
    }

    /// Records what would have been played.
    #[derive(Default, Clone)]
    struct Recorder(Rc<RefCell<Vec<Played>>>);

    impl Playback for Recorder {
        fn play_audio(&mut self, audio: &Audio) -> Result<()> {
            self.0.borrow_mut().push(Played::Audio(audio.length()));
            Ok(())
        }

        fn play_tone(&mut self, frequency: f64, duration: Duration) -> Result<()> {
            self.0.borrow_mut().push(Played::Tone(frequency, duration));
            Ok(())
        }
    }

    fn recording_reviewer(
        input: &str,
        options: ReviewOptions,
    ) -> (Reviewer<Cursor<Vec<u8>>, Vec<u8>>, Recorder) {
        let recorder = Recorder::default();
        let r = Reviewer::new(
            Cursor::new(input.as_bytes().to_vec()),
            Vec::new(),
            Box::new(recorder.clone()),
            options,
            PitchSettings::default(),
        );
        (r, recorder)
    }

    fn note(name: &str) -> Note {
        name.parse().unwrap()
    }

    fn write_tone(path: &Path, freq: f64) {
        let audio = Audio::tone(freq, 0.4, 16000, 0.5);
        AudioFileData::from_audio(&audio).save(path).unwrap();
    }

    fn reviewer(input: &str, interactive: bool) -> Reviewer<Cursor<Vec<u8>>, Vec<u8>> {
        Reviewer::new(
            Cursor::new(input.as_bytes().to_vec()),
            Vec::new(),
            Box::new(Silent),
            ReviewOptions {
                interactive,
                ..ReviewOptions::default()
            },
            PitchSettings::default(),
        )
    }

    #[test]
    fn test_expected_note_from_file_name() {
        assert_eq!(expected_note(Path::new("dir/piano-C4.wav")), Some(note("C4")));
        assert_eq!(expected_note(Path::new("lead-c#5.WAV")), Some(note("C#5")));
        assert_eq!(expected_note(Path::new("bass-Bb2.wav")), Some(note("A#2")));
        assert_eq!(expected_note(Path::new("no-note.wav")), None);
        assert_eq!(expected_note(Path::new("piano-C4.mp3")), None);
        assert_eq!(expected_note(Path::new("pianoC4.wav")), None);
    }

    #[test]
    fn test_renamed_path_replaces_only_the_note() {
        let renamed = renamed_path(Path::new("samples/keys-A-C4.Wav"), note("D#4")).unwrap();
        assert_eq!(renamed, PathBuf::from("samples/keys-A-D#4.Wav"));
        assert_eq!(renamed_path(Path::new("plain.wav"), note("A4")), None);
    }

    #[test]
    fn test_flagged_path_adds_single_prefix() {
        assert_eq!(
            flagged_path(Path::new("a/piano-C4.wav")),
            Some(PathBuf::from("a/_piano-C4.wav"))
        );
        assert_eq!(flagged_path(Path::new("a/_piano-C4.wav")), None);
    }

    #[test]
    fn test_verdicts() {
        let a4 = note("A4");
        assert_eq!(Verdict::classify(a4, Some(note("A4"))), Verdict::Match);
        assert_eq!(Verdict::classify(a4, Some(note("A3"))), Verdict::OctaveOnly);
        assert_eq!(Verdict::classify(a4, Some(note("A#4"))), Verdict::Mismatch);
        assert_eq!(Verdict::classify(a4, None), Verdict::Undetected);
        assert_eq!(Verdict::classify(note("Bb4"), Some(note("A#4"))), Verdict::Match);
    }

    #[test]
    fn test_action_parsing_respects_availability() {
        assert_eq!(ReviewAction::parse(" K \n", true, false), Some(ReviewAction::Keep));
        assert_eq!(ReviewAction::parse("r", true, false), Some(ReviewAction::Rename));
        assert_eq!(ReviewAction::parse("r", false, false), None);
        assert_eq!(ReviewAction::parse("m", false, true), Some(ReviewAction::Manual));
        assert_eq!(ReviewAction::parse("f", true, false), Some(ReviewAction::Flag));
        assert_eq!(ReviewAction::parse("f", true, true), None);
        assert_eq!(ReviewAction::parse("x", true, false), None);
        assert!(!ReviewAction::menu(true, true).contains("[f]lag"));
        assert!(!ReviewAction::menu(false, false).contains("[r]ename"));
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = Summary::default();
        let base = FileReport {
            path: PathBuf::from("x.wav"),
            expected: None,
            detection: None,
            verdict: None,
            resolution: Resolution::Unreviewed,
        };
        summary.record(&base);
        summary.record(&FileReport {
            verdict: Some(Verdict::Mismatch),
            resolution: Resolution::Flagged(PathBuf::from("_x.wav")),
            ..base.clone()
        });
        summary.record(&FileReport {
            verdict: Some(Verdict::Match),
            ..base
        });
        assert_eq!(summary.unlabeled, 1);
        assert_eq!(summary.mismatched, 1);
        assert_eq!(summary.flagged, 1);
        assert_eq!(summary.matched, 1);
    }

    #[test]
    fn test_match_is_not_reviewed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone-A4.wav");
        write_tone(&path, 440.0);

        let mut r = reviewer("", true);
        let report = r.process_file(&path).unwrap();
        assert_eq!(report.verdict, Some(Verdict::Match));
        assert_eq!(report.resolution, Resolution::Unreviewed);
        let out = String::from_utf8(r.into_output()).unwrap();
        assert!(out.contains("Match: tone-A4.wav -> A4"));
    }

    #[test]
    fn test_mismatch_renamed_to_detected_note() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone-C4.wav");
        write_tone(&path, 440.0);

        let mut r = reviewer("\nr\n", true);
        let report = r.process_file(&path).unwrap();
        let expected_path = dir.path().join("tone-A4.wav");
        assert_eq!(report.verdict, Some(Verdict::Mismatch));
        assert_eq!(report.resolution, Resolution::Renamed(expected_path.clone()));
        assert!(expected_path.exists());
        assert!(!path.exists());
    }

    #[test]
    fn test_manual_entry_retries_until_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone-C4.wav");
        write_tone(&path, 440.0);

        let mut r = reviewer("\nm\nH9\nbb4\n", true);
        let report = r.process_file(&path).unwrap();
        let expected_path = dir.path().join("tone-A#4.wav");
        assert_eq!(report.resolution, Resolution::Renamed(expected_path.clone()));
        assert!(expected_path.exists());
        let out = String::from_utf8(r.into_output()).unwrap();
        assert!(out.contains("Invalid note format. Try again."));
    }

    #[test]
    fn test_flag_after_invalid_choice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone-C4.wav");
        write_tone(&path, 440.0);

        let mut r = reviewer("\nz\nf\n", true);
        let report = r.process_file(&path).unwrap();
        let flagged = dir.path().join("_tone-C4.wav");
        assert_eq!(report.resolution, Resolution::Flagged(flagged.clone()));
        assert!(flagged.exists());
        let out = String::from_utf8(r.into_output()).unwrap();
        assert!(out.contains("Invalid choice."));
    }

    #[test]
    fn test_octave_only_skipped_with_notes_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone-A3.wav");
        write_tone(&path, 440.0);

        let mut r = reviewer("", true);
        r.options.notes_only = true;
        let report = r.process_file(&path).unwrap();
        assert_eq!(report.verdict, Some(Verdict::OctaveOnly));
        assert_eq!(report.resolution, Resolution::Unreviewed);
        let out = String::from_utf8(r.into_output()).unwrap();
        assert!(out.contains("Octave-only mismatch (skipped review)"));
    }

    #[test]
    fn test_end_of_input_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone-C4.wav");
        write_tone(&path, 440.0);

        let mut r = reviewer("\n", true);
        let report = r.process_file(&path).unwrap();
        assert_eq!(report.resolution, Resolution::Kept);
        assert!(path.exists());
    }

    #[test]
    fn test_silence_is_undetected_and_cannot_be_renamed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quiet-C4.wav");
        let silence = Audio::new(16000, vec![0.0; 8000], vec![0.0; 8000]);
        AudioFileData::from_audio(&silence).save(&path).unwrap();

        let mut r = reviewer("\nr\nk\n", true);
        let report = r.process_file(&path).unwrap();
        assert_eq!(report.verdict, Some(Verdict::Undetected));
        assert_eq!(report.detection, None);
        assert_eq!(report.resolution, Resolution::Kept);
        let out = String::from_utf8(r.into_output()).unwrap();
        assert!(out.contains("No valid detected frequency"));
        assert!(out.contains("Invalid choice."));
    }

    #[test]
    fn test_frames_mark_unvoiced_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let mut left = vec![0.0; 4000];
        left.extend(Audio::tone(440.0, 0.4, 16000, 0.5).left());
        AudioFileData::from_audio(&Audio::new(16000, left.clone(), left))
            .save(&path)
            .unwrap();

        let mut r = reviewer("", false);
        r.options.frames = true;
        let report = r.process_file(&path).unwrap();
        assert_eq!(report.verdict, None);
        assert_eq!(report.detection.map(|d| d.note()), Some(note("A4")));
        let out = String::from_utf8(r.into_output()).unwrap();
        assert!(out.lines().any(|l| l.trim_start().starts_with("0.064") && l.contains('-')));
        assert!(out.lines().any(|l| l.contains("A4")));
        assert!(out.contains("Detected: tone.wav -> A4"));
    }

    #[test]
    fn test_rename_never_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone-C4.wav");
        write_tone(&path, 440.0);
        let other = dir.path().join("tone-A4.wav");
        fs::write(&other, b"keep me").unwrap();

        let mut r = reviewer("\nr\n", true);
        let report = r.process_file(&path).unwrap();
        assert_eq!(report.resolution, Resolution::Kept);
        assert!(path.exists());
        assert_eq!(fs::read(&other).unwrap(), b"keep me");
        let out = String::from_utf8(r.into_output()).unwrap();
        assert!(out.contains("already exists"));
    }

    #[test]
    fn test_flag_never_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone-C4.wav");
        write_tone(&path, 440.0);
        let other = dir.path().join("_tone-C4.wav");
        fs::write(&other, b"older flag").unwrap();

        let mut r = reviewer("\nf\n", true);
        let report = r.process_file(&path).unwrap();
        assert_eq!(report.resolution, Resolution::Kept);
        assert!(path.exists());
        assert_eq!(fs::read(&other).unwrap(), b"older flag");
    }

    #[test]
    fn test_play_detected_uses_exact_note_frequency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone-A4.wav");
        write_tone(&path, 445.0);

        let options = ReviewOptions {
            play_file: true,
            play_detected: true,
            ..ReviewOptions::default()
        };
        let (mut r, recorder) = recording_reviewer("", options);
        let report = r.process_file(&path).unwrap();
        assert_eq!(report.verdict, Some(Verdict::Match));
        let played = recorder.0.borrow();
        assert_eq!(
            *played,
            vec![Played::Audio(6400), Played::Tone(440.0, DETECTED_TONE)]
        );
    }

    #[test]
    fn test_review_plays_expected_then_observed_tone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone-C4.wav");
        write_tone(&path, 445.0);

        let options = ReviewOptions {
            interactive: true,
            ..ReviewOptions::default()
        };
        let (mut r, recorder) = recording_reviewer("\nk\n", options);
        let report = r.process_file(&path).unwrap();
        assert_eq!(report.resolution, Resolution::Kept);
        let observed = report.detection.unwrap().observed();
        assert!((observed - 445.0).abs() < 2.0);

        let played = recorder.0.borrow();
        assert_eq!(played.len(), 4);
        assert_eq!(played[0], Played::Audio(6400));
        assert_eq!(played[1], Played::Tone(note("C4").frequency(), REVIEW_TONE));
        assert_eq!(played[2], Played::Audio(6400));
        assert_eq!(played[3], Played::Tone(observed, REVIEW_TONE));
    }
}
