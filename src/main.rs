use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod error;
mod tts;

use api::routes::{create_router, AppState};
use config::{Args, Command};
use error::AppError;
use tts::setup::setup_voices;
use tts::{GenerationRequest, TtsService};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_filter())),
        )
        .init();

    if let Some(Command::Synth {
        txt_path,
        speaker,
        cfg_scale,
    }) = &args.command
    {
        if let Err(e) = synth(&args, txt_path, speaker, *cfg_scale) {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
        return;
    }

    if !args.skip_setup {
        tracing::info!("Setting up voices directory...");
        match setup_voices(&args.bundled_voices_dir, &args.voices_dir) {
            Ok(report) => tracing::info!(
                "Voice setup completed: {} copied, {} already present",
                report.copied,
                report.skipped
            ),
            Err(e) => tracing::warn!("{}", e),
        }
    }

    std::fs::create_dir_all(&args.output_dir).expect("Failed to create output directory");
    tracing::info!("Output directory: {}", args.output_dir.display());

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .expect("Invalid address");

    tracing::info!("Chatterbox TTS Web Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Starting server on http://{}", addr);
    tracing::info!("Voices directory: {}", args.voices_dir.display());

    let tts = TtsService::new(args.tts_config(), args.loader()).expect("Failed to scan voices");

    let state = Arc::new(AppState {
        tts,
        static_dir: args.static_dir.clone(),
    });

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app).await.expect("Server error");
}

/// One-shot synthesis of a text file into `output.wav`.
fn synth(args: &Args, txt_path: &Path, speaker: &str, cfg_scale: f32) -> Result<(), AppError> {
    if !txt_path.exists() {
        return Err(AppError::BadRequest(format!(
            "txt file not found: {}",
            txt_path.display()
        )));
    }

    tracing::info!("Reading script from: {}", txt_path.display());
    let text = std::fs::read_to_string(txt_path)?;

    let tts = TtsService::new(args.tts_config(), args.loader())?;
    let request = GenerationRequest {
        cfg: cfg_scale,
        ..GenerationRequest::new(text, speaker)
    };

    let audio = tts.generate_named(&request, "output.wav")?;
    tracing::info!(
        "Speaker '{}' -> Voice: {} ({}) in {:.2} seconds, saved to {}",
        speaker,
        audio
            .voice
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        audio.language.as_deref().unwrap_or("en"),
        audio.elapsed.as_secs_f32(),
        audio.path.display()
    );

    Ok(())
}
