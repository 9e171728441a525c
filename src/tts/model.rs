use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::AppError;
use crate::tts::device::Device;

pub const ENGLISH: &str = "en";

/// Cache key for a loaded model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub device: Device,
    pub language: String,
}

impl ModelKey {
    pub fn new(device: Device, language: &str) -> Self {
        Self {
            device,
            language: language.to_string(),
        }
    }

    /// English gets the dedicated model, everything else the multilingual one.
    pub fn is_multilingual(&self) -> bool {
        self.language != ENGLISH
    }
}

/// Mono audio produced by a model.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Inputs shared by every generation call.
#[derive(Debug, Clone)]
pub struct Prompt<'a> {
    pub text: &'a str,
    pub voice: &'a Path,
    pub cfg_weight: f32,
    /// Only set for non-English languages.
    pub language_id: Option<&'a str>,
}

/// Expressive controls understood by settings-aware models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpressiveSettings {
    pub exaggeration: f32,
    pub temperature: f32,
    pub seed: Option<u64>,
}

pub trait SpeechModel: Send + Sync {
    fn generate(&self, prompt: &Prompt<'_>) -> Result<Waveform, AppError>;

    fn supports_settings(&self) -> bool {
        false
    }

    fn generate_with_settings(
        &self,
        prompt: &Prompt<'_>,
        _settings: &ExpressiveSettings,
    ) -> Result<Waveform, AppError> {
        self.generate(prompt)
    }
}

pub trait ModelLoader: Send + Sync {
    fn load(&self, key: &ModelKey) -> Result<Arc<dyn SpeechModel>, AppError>;
}

/// Encode samples as 16-bit mono PCM WAV.
pub fn samples_to_wav(waveform: &Waveform) -> Result<Vec<u8>, AppError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut buffer = Vec::new();
    {
        let cursor = Cursor::new(&mut buffer);
        let mut writer = WavWriter::new(cursor, spec)?;

        for sample in &waveform.samples {
            let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer.write_sample(scaled)?;
        }

        writer.finalize()?;
    }

    Ok(buffer)
}

/// Decode a WAV stream into mono `f32` samples, averaging channels.
pub fn wav_to_samples(bytes: &[u8]) -> Result<Waveform, AppError> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok(Waveform {
        samples,
        sample_rate: spec.sample_rate,
    })
}
