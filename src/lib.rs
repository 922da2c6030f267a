pub mod audio;
pub mod note;
pub mod review;
pub mod scan;

pub use note::{Detection, Note, NoteError, PitchClass, frequency_to_note};
