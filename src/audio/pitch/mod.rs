mod track;

pub use track::{PitchTrack, pyin};

use crate::note::{Note, PitchClass};

// Frame constants
pub const FRAME_LENGTH: usize = 2048;
pub const HOP_LENGTH: usize = 256;

// Candidate selection
pub const PYIN_THRESHOLD: f32 = 0.1;
pub const PYIN_SIGMA: f32 = 0.2;

/// Lowest and highest notes searched by default.
pub const DEFAULT_FMIN_NOTE: Note = Note::new(PitchClass::C, 2);
pub const DEFAULT_FMAX_NOTE: Note = Note::new(PitchClass::C, 7);

/// Tunables for the pitch tracker. `Default` searches C2..C7.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchSettings {
    pub frame_length: usize,
    pub hop_length: usize,
    pub fmin: f32,
    pub fmax: f32,
    pub threshold: f32,
    pub sigma: f32,
}

impl PitchSettings {
    /// Default settings with the search range bounded by two notes.
    pub fn with_range(low: Note, high: Note) -> Self {
        Self {
            fmin: low.frequency() as f32,
            fmax: high.frequency() as f32,
            ..Self::default()
        }
    }
}

impl Default for PitchSettings {
    fn default() -> Self {
        Self {
            frame_length: FRAME_LENGTH,
            hop_length: HOP_LENGTH,
            fmin: DEFAULT_FMIN_NOTE.frequency() as f32,
            fmax: DEFAULT_FMAX_NOTE.frequency() as f32,
            threshold: PYIN_THRESHOLD,
            sigma: PYIN_SIGMA,
        }
    }
}
