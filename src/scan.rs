use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// What a single command-line path resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A directory, with every candidate WAV found beneath it.
    Directory(Vec<PathBuf>),
    /// A WAV file given directly.
    File(PathBuf),
    /// Neither a directory nor a WAV file.
    Skipped,
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("wav"))
}

/// Effects renders (`...fx...`) are never note samples.
fn is_candidate(path: &Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    is_wav(path) && !name.to_string_lossy().to_lowercase().contains("fx")
}

pub fn resolve(path: &Path) -> Resolved {
    if path.is_dir() {
        let files: Vec<PathBuf> = WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {e}", path.display());
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_candidate(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        debug!(dir = %path.display(), found = files.len(), "Scanned directory");
        Resolved::Directory(files)
    } else if path.is_file() && is_wav(path) {
        Resolved::File(path.to_path_buf())
    } else {
        Resolved::Skipped
    }
}
