//! Tone generator used when no synthesis program is configured.
//!
//! It keeps the whole request path working (voice lookup, model cache, file
//! output) on machines without the neural model installed.

use std::f32::consts::PI;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::AppError;
use crate::tts::model::{
    ExpressiveSettings, ModelKey, ModelLoader, Prompt, SpeechModel, Waveform,
};

pub const SAMPLE_RATE: u32 = 22050;

const LOW_HZ: f32 = 220.0;
const HIGH_HZ: f32 = 440.0;
const ZH_HZ: f32 = 330.0;

pub struct SineLoader;

impl ModelLoader for SineLoader {
    fn load(&self, key: &ModelKey) -> Result<Arc<dyn SpeechModel>, AppError> {
        tracing::info!(
            "Initializing tone model for {} on {}",
            key.language,
            key.device
        );
        Ok(Arc::new(SineModel {
            multilingual: key.is_multilingual(),
        }))
    }
}

pub struct SineModel {
    multilingual: bool,
}

impl SineModel {
    fn frequency(&self, prompt: &Prompt<'_>) -> f32 {
        if self.multilingual {
            match prompt.language_id {
                Some("zh") => ZH_HZ,
                _ => LOW_HZ,
            }
        } else if prompt.voice.to_string_lossy().contains("woman") {
            HIGH_HZ
        } else {
            LOW_HZ
        }
    }
}

/// One second per twenty characters, between one and ten seconds.
fn duration_secs(text: &str) -> f32 {
    (text.chars().count() as f32 / 20.0).clamp(1.0, 10.0)
}

fn sine_wave(freq: f32, duration: f32) -> Vec<f32> {
    let len = (SAMPLE_RATE as f32 * duration) as usize;
    (0..len)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            0.5 * (2.0 * PI * freq * t).sin()
        })
        .collect()
}

/// Standard normal sample via Box-Muller.
fn gaussian<R: Rng>(rng: &mut R) -> f32 {
    let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
    let u2: f32 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

impl SpeechModel for SineModel {
    fn generate(&self, prompt: &Prompt<'_>) -> Result<Waveform, AppError> {
        tracing::debug!(
            "Generating tone for {} chars with cfg_weight={}",
            prompt.text.chars().count(),
            prompt.cfg_weight
        );
        Ok(Waveform {
            samples: sine_wave(self.frequency(prompt), duration_secs(prompt.text)),
            sample_rate: SAMPLE_RATE,
        })
    }

    fn supports_settings(&self) -> bool {
        true
    }

    fn generate_with_settings(
        &self,
        prompt: &Prompt<'_>,
        settings: &ExpressiveSettings,
    ) -> Result<Waveform, AppError> {
        let mut waveform = self.generate(prompt)?;

        let amp = 0.5 + settings.exaggeration * 0.5;
        let noise = settings.temperature * 0.2;
        let mut rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        for sample in waveform.samples.iter_mut() {
            let mut value = *sample * amp;
            if noise > 0.0 {
                value += gaussian(&mut rng) * noise;
            }
            *sample = value.clamp(-1.0, 1.0);
        }

        Ok(waveform)
    }
}
