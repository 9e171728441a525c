pub mod command;
pub mod device;
pub mod model;
pub mod setup;
pub mod sine;
pub mod voice;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::error::AppError;

pub use device::{Device, DevicePreference};
pub use model::{ExpressiveSettings, ModelKey, ModelLoader, Prompt, SpeechModel, Waveform};
use model::{samples_to_wav, ENGLISH};
pub use voice::{VoiceCatalog, VoiceListing};

pub const DEFAULT_CFG: f32 = 0.4;
pub const DEFAULT_EXAGGERATION: f32 = 0.3;
pub const DEFAULT_TEMPERATURE: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub text: String,
    pub voice: String,
    pub cfg: f32,
    pub exaggeration: f32,
    pub temperature: f32,
    /// `None` leaves the model unseeded.
    pub seed: Option<u64>,
}

impl GenerationRequest {
    pub fn new(text: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: voice.into(),
            cfg: DEFAULT_CFG,
            exaggeration: DEFAULT_EXAGGERATION,
            temperature: DEFAULT_TEMPERATURE,
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedAudio {
    pub filename: String,
    pub path: PathBuf,
    pub voice: PathBuf,
    pub language: Option<String>,
    pub elapsed: Duration,
}

/// Lazily loaded models, one per `(device, language)`.
pub struct ModelCache {
    loader: Box<dyn ModelLoader>,
    models: RwLock<HashMap<ModelKey, Arc<dyn SpeechModel>>>,
}

impl ModelCache {
    pub fn new(loader: Box<dyn ModelLoader>) -> Self {
        Self {
            loader,
            models: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, device: Device, language: &str) -> Result<Arc<dyn SpeechModel>, AppError> {
        let key = ModelKey::new(device, language);

        // Check cache
        {
            let models = self.models.read().map_err(|_| poisoned())?;
            if let Some(model) = models.get(&key) {
                return Ok(Arc::clone(model));
            }
        }

        // Load without holding the lock; a concurrent first load of the same
        // key may build twice and the last insert wins.
        let model = self.loader.load(&key)?;

        {
            let mut models = self.models.write().map_err(|_| poisoned())?;
            models.insert(key, Arc::clone(&model));
        }

        Ok(model)
    }

    pub fn len(&self) -> usize {
        self.models.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> AppError {
    AppError::Internal("lock poisoned".to_string())
}

#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub voices_dir: PathBuf,
    pub bundled_voices_dir: PathBuf,
    pub output_dir: PathBuf,
    pub device: DevicePreference,
}

pub struct TtsService {
    config: TtsConfig,
    catalog: RwLock<Arc<VoiceCatalog>>,
    models: ModelCache,
}

impl TtsService {
    pub fn new(config: TtsConfig, loader: Box<dyn ModelLoader>) -> Result<Self, AppError> {
        let catalog = VoiceCatalog::scan(&config.voices_dir)?;
        if catalog.is_empty() {
            tracing::warn!("No voice prompts in {}", config.voices_dir.display());
        }
        Ok(Self {
            config,
            catalog: RwLock::new(Arc::new(catalog)),
            models: ModelCache::new(loader),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    pub fn models(&self) -> &ModelCache {
        &self.models
    }

    pub fn catalog(&self) -> Result<Arc<VoiceCatalog>, AppError> {
        let catalog = self.catalog.read().map_err(|_| poisoned())?;
        Ok(Arc::clone(&catalog))
    }

    /// Rescan the voices directory, seeding it from the bundled voices the
    /// first time it is missing.
    pub fn refresh_voices(&self) -> Result<Arc<VoiceCatalog>, AppError> {
        let voices_dir = &self.config.voices_dir;
        if !voices_dir.exists() {
            tracing::info!("Creating voices directory at {}", voices_dir.display());
            std::fs::create_dir_all(voices_dir)?;

            if self.config.bundled_voices_dir.exists() {
                if let Err(e) = setup::setup_voices(&self.config.bundled_voices_dir, voices_dir) {
                    tracing::warn!("Could not copy bundled voices: {}", e);
                }
            }
        }

        let catalog = Arc::new(VoiceCatalog::scan(voices_dir)?);
        let mut current = self.catalog.write().map_err(|_| poisoned())?;
        *current = Arc::clone(&catalog);
        Ok(catalog)
    }

    pub fn list_voices(&self) -> Result<Vec<VoiceListing>, AppError> {
        let catalog = self.refresh_voices()?;
        let voices = catalog.listing();
        tracing::debug!("Returning {} voices", voices.len());
        Ok(voices)
    }

    /// Generate audio into a uniquely named file in the output directory.
    pub fn generate(&self, request: &GenerationRequest) -> Result<GeneratedAudio, AppError> {
        let filename = format!("output_{}.wav", &Uuid::new_v4().simple().to_string()[..8]);
        self.generate_named(request, &filename)
    }

    pub fn generate_named(
        &self,
        request: &GenerationRequest,
        filename: &str,
    ) -> Result<GeneratedAudio, AppError> {
        let device = self.config.device.resolve();
        tracing::info!("Using device: {}", device);

        let catalog = self.catalog()?;
        let voice = catalog.resolve(&request.voice)?;
        let language = voice.language.as_deref().unwrap_or(ENGLISH);
        tracing::info!(
            "Using voice: {}, Language: {}",
            voice
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            language
        );

        let model = self.models.get(device, language)?;
        tracing::debug!("{} model(s) loaded", self.models.len());

        let prompt = Prompt {
            text: &request.text,
            voice: &voice.path,
            cfg_weight: request.cfg,
            language_id: (language != ENGLISH).then_some(language),
        };

        tracing::info!(
            "Generating audio with cfg_scale={}, exaggeration={}, temperature={}",
            request.cfg,
            request.exaggeration,
            request.temperature
        );
        let start = Instant::now();
        let waveform = if model.supports_settings() {
            model.generate_with_settings(
                &prompt,
                &ExpressiveSettings {
                    exaggeration: request.exaggeration,
                    temperature: request.temperature,
                    seed: request.seed,
                },
            )?
        } else {
            model.generate(&prompt)?
        };
        let elapsed = start.elapsed();
        tracing::info!("Generation time: {:.2} seconds", elapsed.as_secs_f32());

        std::fs::create_dir_all(&self.config.output_dir)?;
        let path = self.config.output_dir.join(filename);
        std::fs::write(&path, samples_to_wav(&waveform)?)?;
        tracing::info!("Saved output to {}", path.display());

        Ok(GeneratedAudio {
            filename: filename.to_string(),
            path,
            voice: voice.path.clone(),
            language: voice.language.clone(),
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountingLoader {
        loads: Arc<AtomicUsize>,
    }

    impl ModelLoader for CountingLoader {
        fn load(&self, key: &ModelKey) -> Result<Arc<dyn SpeechModel>, AppError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            sine::SineLoader.load(key)
        }
    }

    /// Records calls and only offers the baseline generation method.
    #[derive(Default)]
    struct BaselineModel {
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl SpeechModel for BaselineModel {
        fn generate(&self, prompt: &Prompt<'_>) -> Result<Waveform, AppError> {
            self.calls.lock().unwrap().push((
                prompt.voice.to_string_lossy().to_string(),
                prompt.language_id.map(str::to_string),
            ));
            Ok(Waveform {
                samples: vec![0.0; 100],
                sample_rate: 16000,
            })
        }
    }

    struct SharedLoader(Arc<BaselineModel>);

    impl ModelLoader for SharedLoader {
        fn load(&self, _key: &ModelKey) -> Result<Arc<dyn SpeechModel>, AppError> {
            Ok(self.0.clone() as Arc<dyn SpeechModel>)
        }
    }

    fn config(root: &Path) -> TtsConfig {
        TtsConfig {
            voices_dir: root.join("voices"),
            bundled_voices_dir: root.join("bundled"),
            output_dir: root.join("outputs"),
            device: DevicePreference::Fixed(Device::Cpu),
        }
    }

    fn write_voices(root: &Path, names: &[&str]) {
        std::fs::create_dir_all(root.join("voices")).unwrap();
        for name in names {
            std::fs::write(root.join("voices").join(name), b"").unwrap();
        }
    }

    #[test]
    fn test_model_cache_returns_same_instance() {
        let loads = Arc::new(AtomicUsize::new(0));
        let cache = ModelCache::new(Box::new(CountingLoader {
            loads: loads.clone(),
        }));

        let a = cache.get(Device::Cpu, "en").unwrap();
        let b = cache.get(Device::Cpu, "en").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        let c = cache.get(Device::Cpu, "zh").unwrap();
        let d = cache.get(Device::Cuda, "en").unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(!Arc::ptr_eq(&a, &d));
        assert_eq!(loads.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_generate_writes_wav() {
        let root = tempfile::tempdir().unwrap();
        write_voices(root.path(), &["en-Alice_woman.wav", "zh-Xinran_woman.wav"]);
        let service = TtsService::new(config(root.path()), Box::new(sine::SineLoader)).unwrap();

        let audio = service
            .generate(&GenerationRequest::new("Hello world", "alice"))
            .unwrap();

        assert!(audio.filename.starts_with("output_"));
        assert!(audio.filename.ends_with(".wav"));
        assert_eq!(audio.filename.len(), "output_".len() + 8 + ".wav".len());
        assert_eq!(audio.language.as_deref(), Some("en"));

        let reader = hound::WavReader::open(&audio.path).unwrap();
        assert_eq!(reader.spec().sample_rate, sine::SAMPLE_RATE);
        assert_eq!(reader.spec().channels, 1);
    }

    #[test]
    fn test_baseline_generation_gets_language_id_only_for_non_english() {
        let root = tempfile::tempdir().unwrap();
        write_voices(root.path(), &["en-Carter_man.wav", "zh-Xinran_woman.wav"]);
        let model = Arc::new(BaselineModel::default());
        let service =
            TtsService::new(config(root.path()), Box::new(SharedLoader(model.clone()))).unwrap();

        service
            .generate(&GenerationRequest::new("one", "Xinran"))
            .unwrap();
        service
            .generate(&GenerationRequest::new("two", "Carter"))
            .unwrap();

        let calls = model.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].0.ends_with("zh-Xinran_woman.wav"));
        assert_eq!(calls[0].1.as_deref(), Some("zh"));
        assert_eq!(calls[1].1, None);
    }

    #[test]
    fn test_generate_without_voices_fails() {
        let root = tempfile::tempdir().unwrap();
        let service = TtsService::new(config(root.path()), Box::new(sine::SineLoader)).unwrap();
        let result = service.generate(&GenerationRequest::new("Hello", "anyone"));
        assert!(matches!(result, Err(AppError::NoVoices)));
    }

    #[test]
    fn test_refresh_seeds_missing_voices_dir() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("bundled")).unwrap();
        std::fs::write(root.path().join("bundled").join("de-Anna.wav"), b"").unwrap();
        let service = TtsService::new(config(root.path()), Box::new(sine::SineLoader)).unwrap();
        assert!(service.catalog().unwrap().is_empty());

        let voices = service.list_voices().unwrap();
        assert_eq!(voices.len(), 1);
        assert_eq!(voices[0].display_name, "DE - Anna");
        assert!(root.path().join("voices").join("de-Anna.wav").exists());
    }
}
