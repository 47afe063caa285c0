use std::path::{Path, PathBuf};

use crate::error::WorkerError;

/// Collect the reference samples that define a cloned voice.
///
/// Matching files are `reference_*.wav` directly inside `voice_dir`. The
/// result is sorted by file name so the conditioning order is stable across
/// runs regardless of directory iteration order.
pub fn find_reference_wavs(voice_dir: &Path) -> Result<Vec<PathBuf>, WorkerError> {
    let entries = match std::fs::read_dir(voice_dir) {
        Ok(entries) => entries,
        Err(_) => return Err(no_references(voice_dir)),
    };

    let mut wavs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_reference_wav(path))
        .collect();

    if wavs.is_empty() {
        return Err(no_references(voice_dir));
    }

    wavs.sort();
    Ok(wavs)
}

fn is_reference_wav(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with("reference_") && name.ends_with(".wav"))
        .unwrap_or(false)
}

fn no_references(voice_dir: &Path) -> WorkerError {
    WorkerError::NoReferences(voice_dir.display().to_string())
}
