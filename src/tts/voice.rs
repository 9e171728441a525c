use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// A voice prompt discovered on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceEntry {
    pub name: String,
    pub path: PathBuf,
    pub language: Option<String>,
}

/// Item returned by `GET /voices`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VoiceListing {
    pub name: String,
    pub display_name: String,
    pub lang: String,
}

/// Voice prompts keyed by the name derived from their file stem, in
/// alphabetical order of the original file names.
#[derive(Debug, Default)]
pub struct VoiceCatalog {
    entries: Vec<VoiceEntry>,
}

impl VoiceCatalog {
    pub fn scan(voices_dir: &Path) -> Result<Self, AppError> {
        if !voices_dir.exists() {
            tracing::warn!("Voices directory not found at {}", voices_dir.display());
            return Ok(Self::default());
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(voices_dir)? {
            let path = entry?.path();
            if !path.is_file() || !is_wav(&path) {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                files.push((stem.to_string_lossy().to_string(), path));
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let catalog = Self::from_files(files);
        tracing::info!(
            "Found {} voice files in {}",
            catalog.entries.len(),
            voices_dir.display()
        );
        tracing::debug!(
            "Available voices: {}",
            catalog
                .entries
                .iter()
                .map(|e| e.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(catalog)
    }

    /// Build a catalog from `(stem, path)` pairs that are already sorted.
    pub fn from_files(files: Vec<(String, PathBuf)>) -> Self {
        let mut entries: Vec<VoiceEntry> = Vec::with_capacity(files.len());

        for (stem, path) in files {
            let (name, language) = parse_voice_stem(&stem);
            // A later file with the same derived name takes over the slot.
            match entries.iter_mut().find(|e| e.name == name) {
                Some(existing) => {
                    existing.path = path;
                    existing.language = language;
                }
                None => entries.push(VoiceEntry {
                    name,
                    path,
                    language,
                }),
            }
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[VoiceEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a speaker name to a voice prompt.
    ///
    /// Exact name first, then a case-insensitive substring match in either
    /// direction, then the first entry. Only an empty catalog is an error.
    pub fn resolve(&self, speaker: &str) -> Result<&VoiceEntry, AppError> {
        if let Some(entry) = self.entries.iter().find(|e| e.name == speaker) {
            return Ok(entry);
        }

        let speaker_lower = speaker.to_lowercase();
        if let Some(entry) = self.entries.iter().find(|e| {
            let name_lower = e.name.to_lowercase();
            speaker_lower.contains(&name_lower) || name_lower.contains(&speaker_lower)
        }) {
            return Ok(entry);
        }

        let default = self.entries.first().ok_or(AppError::NoVoices)?;
        tracing::warn!(
            "No voice preset found for '{}', using default voice: {}",
            speaker,
            default.path.display()
        );
        Ok(default)
    }

    pub fn listing(&self) -> Vec<VoiceListing> {
        if self.entries.is_empty() {
            return vec![VoiceListing {
                name: "default".to_string(),
                display_name: "Default Voice".to_string(),
                lang: "en".to_string(),
            }];
        }

        self.entries()
            .iter()
            .map(|e| VoiceListing {
                name: e.name.clone(),
                display_name: match &e.language {
                    Some(lang) => format!("{} - {}", lang.to_uppercase(), e.name),
                    None => e.name.clone(),
                },
                lang: e.language.clone().unwrap_or_else(|| "en".to_string()),
            })
            .collect()
    }
}

pub(crate) fn is_wav(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

/// Split a file stem such as `zh-xinran_woman` into `("xinran", Some("zh"))`.
fn parse_voice_stem(stem: &str) -> (String, Option<String>) {
    let name = stem.split('_').next().unwrap_or(stem);

    if name.contains('-') {
        let lang = name.split('-').next().unwrap_or_default();
        let short = name.rsplit('-').next().unwrap_or_default();
        (short.to_string(), Some(lang.to_string()))
    } else {
        (name.to_string(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(stems: &[&str]) -> VoiceCatalog {
        let mut files: Vec<(String, PathBuf)> = stems
            .iter()
            .map(|s| (s.to_string(), PathBuf::from(format!("/voices/{}.wav", s))))
            .collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));
        VoiceCatalog::from_files(files)
    }

    #[test]
    fn test_parse_voice_stem() {
        assert_eq!(parse_voice_stem("alice"), ("alice".to_string(), None));
        assert_eq!(
            parse_voice_stem("en-Alice_woman"),
            ("Alice".to_string(), Some("en".to_string()))
        );
        assert_eq!(
            parse_voice_stem("zh-cn-xinran"),
            ("xinran".to_string(), Some("zh".to_string()))
        );
        assert_eq!(parse_voice_stem("carter_man"), ("carter".to_string(), None));
    }

    #[test]
    fn test_resolve_exact_match() {
        let catalog = catalog(&["en-Alice_woman", "en-Alicia_woman", "zh-Xinran_woman"]);
        let entry = catalog.resolve("Alicia").unwrap();
        assert_eq!(entry.path, PathBuf::from("/voices/en-Alicia_woman.wav"));
        assert_eq!(entry.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_resolve_substring_match() {
        let catalog = catalog(&["en-Carter_man", "zh-Xinran_woman"]);

        // Requested name contains the voice name
        let entry = catalog.resolve("speaker xinran please").unwrap();
        assert_eq!(entry.name, "Xinran");
        assert_eq!(entry.language.as_deref(), Some("zh"));

        // Voice name contains the requested name
        let entry = catalog.resolve("CART").unwrap();
        assert_eq!(entry.name, "Carter");
    }

    #[test]
    fn test_resolve_falls_back_to_first_entry() {
        let catalog = catalog(&["zh-Xinran_woman", "en-Carter_man", "de-Anna"]);
        let entry = catalog.resolve("nobody").unwrap();
        // Alphabetically first file is de-Anna
        assert_eq!(entry.name, "Anna");
        assert_eq!(entry.language.as_deref(), Some("de"));
    }

    #[test]
    fn test_resolve_empty_catalog() {
        let catalog = VoiceCatalog::default();
        assert!(matches!(catalog.resolve("anyone"), Err(AppError::NoVoices)));
    }

    #[test]
    fn test_duplicate_names_keep_first_position() {
        let catalog = catalog(&["a-Bob", "b-Amy", "c-Bob"]);
        let names: Vec<_> = catalog.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Amy"]);
        assert_eq!(catalog.entries()[0].language.as_deref(), Some("c"));
    }

    #[test]
    fn test_listing() {
        let catalog = catalog(&["en-Carter_man", "narrator"]);
        let listing = catalog.listing();
        assert_eq!(listing[0].display_name, "EN - Carter");
        assert_eq!(listing[0].lang, "en");
        assert_eq!(listing[1].display_name, "narrator");
        assert_eq!(listing[1].lang, "en");

        let empty = VoiceCatalog::default().listing();
        assert_eq!(empty.len(), 1);
        assert_eq!(empty[0].name, "default");
    }

    #[test]
    fn test_scan_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("zh-Xinran_woman.wav"), b"").unwrap();
        std::fs::write(dir.path().join("en-Carter_man.WAV"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("nested.wav")).unwrap();

        let catalog = VoiceCatalog::scan(dir.path()).unwrap();
        let names: Vec<_> = catalog.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Carter", "Xinran"]);
    }

    #[test]
    fn test_scan_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = VoiceCatalog::scan(&dir.path().join("missing")).unwrap();
        assert!(catalog.is_empty());
    }
}
