use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use crate::error::AppError;
use crate::tts::model::{
    wav_to_samples, ExpressiveSettings, ModelKey, ModelLoader, Prompt, SpeechModel, Waveform,
};

/// Loads models backed by an external synthesis program.
///
/// The program receives the request as flags and must write a WAV stream
/// to stdout.
pub struct CommandLoader {
    program: PathBuf,
}

impl CommandLoader {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ModelLoader for CommandLoader {
    fn load(&self, key: &ModelKey) -> Result<Arc<dyn SpeechModel>, AppError> {
        let program = which::which(&self.program).map_err(|e| {
            AppError::TtsError(format!(
                "Synthesis program '{}' not found: {}",
                self.program.display(),
                e
            ))
        })?;

        tracing::info!(
            "Initializing {} model for {} on {} via {}",
            if key.is_multilingual() { "multilingual" } else { "english" },
            key.language,
            key.device,
            program.display()
        );

        Ok(Arc::new(CommandModel {
            program,
            key: key.clone(),
        }))
    }
}

pub struct CommandModel {
    program: PathBuf,
    key: ModelKey,
}

impl CommandModel {
    fn base_args(&self, prompt: &Prompt<'_>) -> Vec<String> {
        let mut args = vec![
            "--text".to_string(),
            prompt.text.to_string(),
            "--voice".to_string(),
            prompt.voice.to_string_lossy().to_string(),
            "--cfg".to_string(),
            prompt.cfg_weight.to_string(),
            "--device".to_string(),
            self.key.device.to_string(),
        ];
        if let Some(language) = prompt.language_id {
            args.push("--language".to_string());
            args.push(language.to_string());
        }
        args
    }

    fn run(&self, args: &[String]) -> Result<Waveform, AppError> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| {
                AppError::TtsError(format!(
                    "Failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::TtsError(format!(
                "{} failed: {}",
                self.program.display(),
                stderr.trim()
            )));
        }

        wav_to_samples(&output.stdout)
            .map_err(|e| AppError::TtsError(format!("Unreadable audio from synthesis program: {}", e)))
    }
}

impl SpeechModel for CommandModel {
    fn generate(&self, prompt: &Prompt<'_>) -> Result<Waveform, AppError> {
        self.run(&self.base_args(prompt))
    }

    fn supports_settings(&self) -> bool {
        true
    }

    fn generate_with_settings(
        &self,
        prompt: &Prompt<'_>,
        settings: &ExpressiveSettings,
    ) -> Result<Waveform, AppError> {
        let mut args = self.base_args(prompt);
        args.extend([
            "--exaggeration".to_string(),
            settings.exaggeration.to_string(),
            "--temperature".to_string(),
            settings.temperature.to_string(),
        ]);
        if let Some(seed) = settings.seed {
            args.push("--seed".to_string());
            args.push(seed.to_string());
        }
        self.run(&args)
    }
}
