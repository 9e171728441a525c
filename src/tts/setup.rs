use std::path::Path;

use crate::error::AppError;
use crate::tts::voice::is_wav;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SetupReport {
    pub copied: usize,
    pub skipped: usize,
}

/// Copy bundled voice prompts into the voices directory.
///
/// Files already present in `dest` are left untouched.
pub fn setup_voices(source: &Path, dest: &Path) -> Result<SetupReport, AppError> {
    tracing::info!("Source voices directory: {}", source.display());
    tracing::info!("Destination voices directory: {}", dest.display());

    if !dest.exists() {
        tracing::info!("Creating destination directory: {}", dest.display());
        std::fs::create_dir_all(dest)?;
    }

    if !source.exists() {
        return Err(AppError::VoiceSetup(format!(
            "source directory does not exist: {}",
            source.display()
        )));
    }

    let voice_files = list_wav_files(source)?;
    if voice_files.is_empty() {
        return Err(AppError::VoiceSetup(
            "no voice files found in source directory".to_string(),
        ));
    }

    tracing::info!(
        "Found {} voice files: {}",
        voice_files.len(),
        voice_files.join(", ")
    );

    let mut report = SetupReport::default();
    for file in &voice_files {
        let src_file = source.join(file);
        let dst_file = dest.join(file);

        if dst_file.exists() {
            tracing::debug!("Voice file already exists: {}", dst_file.display());
            report.skipped += 1;
            continue;
        }

        tracing::info!("Copying {} to {}", src_file.display(), dst_file.display());
        std::fs::copy(&src_file, &dst_file)?;
        report.copied += 1;
    }

    let dst_files = list_wav_files(dest)?;
    tracing::info!(
        "Destination directory now contains {} voice files: {}",
        dst_files.len(),
        dst_files.join(", ")
    );

    Ok(report)
}

fn list_wav_files(dir: &Path) -> Result<Vec<String>, AppError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_wav(&path) {
            if let Some(name) = path.file_name() {
                files.push(name.to_string_lossy().to_string());
            }
        }
    }
    files.sort();
    Ok(files)
}
