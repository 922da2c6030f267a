use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reference pitch for scientific pitch notation.
pub const A4_FREQUENCY: f64 = 440.0;
const A4_MIDI: i32 = 69;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NoteError {
    #[error("invalid frequency: {0} Hz (expected a finite value above zero)")]
    InvalidFrequency(f64),
    #[error("invalid note name: {0:?}")]
    InvalidNoteName(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PitchClass {
    C,
    Cs,
    D,
    Ds,
    E,
    F,
    Fs,
    G,
    Gs,
    A,
    As,
    B,
}

impl PitchClass {
    /// Semitone order starting at the reference pitch A.
    const FROM_A: [PitchClass; 12] = [
        PitchClass::A,
        PitchClass::As,
        PitchClass::B,
        PitchClass::C,
        PitchClass::Cs,
        PitchClass::D,
        PitchClass::Ds,
        PitchClass::E,
        PitchClass::F,
        PitchClass::Fs,
        PitchClass::G,
        PitchClass::Gs,
    ];

    /// Semitones above C within an octave (C = 0, B = 11).
    pub fn semitone(self) -> i32 {
        match self {
            PitchClass::C => 0,
            PitchClass::Cs => 1,
            PitchClass::D => 2,
            PitchClass::Ds => 3,
            PitchClass::E => 4,
            PitchClass::F => 5,
            PitchClass::Fs => 6,
            PitchClass::G => 7,
            PitchClass::Gs => 8,
            PitchClass::A => 9,
            PitchClass::As => 10,
            PitchClass::B => 11,
        }
    }

    fn from_semitone(semitone: i32) -> Self {
        // C is three semitones above A
        Self::FROM_A[(semitone + 3).rem_euclid(12) as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::Cs => "C#",
            PitchClass::D => "D",
            PitchClass::Ds => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Fs => "F#",
            PitchClass::G => "G",
            PitchClass::Gs => "G#",
            PitchClass::A => "A",
            PitchClass::As => "A#",
            PitchClass::B => "B",
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A pitch class with an octave, e.g. `C#5`. Enharmonics are always spelled with sharps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Note {
    pitch_class: PitchClass,
    octave: i32,
}

impl Note {
    pub const fn new(pitch_class: PitchClass, octave: i32) -> Self {
        Self {
            pitch_class,
            octave,
        }
    }

    /// MIDI octaves start at -1, so MIDI 60 is C4.
    pub fn from_midi(midi: i32) -> Self {
        Self {
            pitch_class: PitchClass::from_semitone(midi.rem_euclid(12)),
            octave: midi.div_euclid(12) - 1,
        }
    }

    pub fn pitch_class(&self) -> PitchClass {
        self.pitch_class
    }

    pub fn octave(&self) -> i32 {
        self.octave
    }

    pub fn midi(&self) -> i32 {
        (self.octave + 1) * 12 + self.pitch_class.semitone()
    }

    /// Exact equal-tempered frequency in Hz.
    pub fn frequency(&self) -> f64 {
        A4_FREQUENCY * 2f64.powf(f64::from(self.midi() - A4_MIDI) / 12.0)
    }

    pub fn same_pitch_class(&self, other: &Note) -> bool {
        self.pitch_class == other.pitch_class
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave)
    }
}

impl FromStr for Note {
    type Err = NoteError;

    /// Parses `A4`, `c#5`, `Bb3`, `Fs2`. Flats are respelled as sharps, so `Cb4` becomes `B3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NoteError::InvalidNoteName(s.to_string());
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let letter = chars.next().ok_or_else(invalid)?;
        let natural = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(invalid()),
        };

        let rest = chars.as_str();
        let (accidental, octave) = match rest.chars().next() {
            Some('#' | 's' | 'S') => (1, &rest[1..]),
            Some('b' | 'B') => (-1, &rest[1..]),
            _ => (0, rest),
        };
        if octave.is_empty() {
            return Err(invalid());
        }
        let octave: i32 = octave.parse().map_err(|_| invalid())?;

        let midi = octave
            .checked_add(1)
            .and_then(|o| o.checked_mul(12))
            .and_then(|m| m.checked_add(natural + accidental))
            .ok_or_else(invalid)?;
        Ok(Note::from_midi(midi))
    }
}

/// A frequency matched to its nearest equal-tempered note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    note: Note,
    frequency: f64,
    observed: f64,
    cents: f64,
}

impl Detection {
    pub fn note(&self) -> Note {
        self.note
    }

    /// Exact frequency of the matched note.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Frequency that was passed in.
    pub fn observed(&self) -> f64 {
        self.observed
    }

    /// Signed deviation of the observed frequency from the note, in cents.
    pub fn cents(&self) -> f64 {
        self.cents
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {:.2}Hz ({:+.1} cents from {:.2}Hz)",
            self.note, self.observed, self.cents, self.frequency
        )
    }
}

/// Maps a frequency to the closest note in log-frequency space.
///
/// Fails with [`NoteError::InvalidFrequency`] for zero, negative, NaN or infinite input.
pub fn frequency_to_note(frequency: f64) -> Result<Detection, NoteError> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return Err(NoteError::InvalidFrequency(frequency));
    }
    let semitones = 12.0 * (frequency / A4_FREQUENCY).log2();
    let nearest = semitones.round();
    let cents = (semitones - nearest) * 100.0;

    // Semitone offsets from A4 stay well inside i32 for every finite positive f64
    let offset = nearest as i32;
    let pitch_class = PitchClass::FROM_A[offset.rem_euclid(12) as usize];
    let octave = 4 + (offset + 9).div_euclid(12);
    let note = Note::new(pitch_class, octave);

    Ok(Detection {
        note,
        frequency: note.frequency(),
        observed: frequency,
        cents,
    })
}
