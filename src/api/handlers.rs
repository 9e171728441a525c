use axum::{
    body::Bytes,
    extract::{rejection::FormRejection, State},
    Form, Json,
};
use std::collections::HashMap;
use std::sync::Arc;

use super::{GenerateParams, GenerateResponse, HealthResponse};
use crate::api::routes::AppState;
use crate::error::AppError;
use crate::tts::VoiceListing;

/// `POST /generate` from the web form.
pub async fn generate_form(
    State(state): State<Arc<AppState>>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Json<GenerateResponse> {
    let params = match form {
        Ok(Form(fields)) => GenerateParams::from_form(fields),
        Err(e) => {
            tracing::warn!("Unreadable form body: {}", e);
            GenerateParams::default()
        }
    };

    Json(run_generation(state, Ok(params)).await)
}

/// `POST /api/generate` with a JSON body.
pub async fn generate_json(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Json<GenerateResponse> {
    Json(run_generation(state, GenerateParams::from_json(&body)).await)
}

async fn run_generation(
    state: Arc<AppState>,
    params: Result<GenerateParams, AppError>,
) -> GenerateResponse {
    match generate(state, params).await {
        Ok(audio_url) => GenerateResponse::success(audio_url),
        Err(e) => {
            tracing::error!("Generation failed: {} - {}", e.code(), e);
            GenerateResponse::failure(e.to_string())
        }
    }
}

async fn generate(
    state: Arc<AppState>,
    params: Result<GenerateParams, AppError>,
) -> Result<String, AppError> {
    let request = params?.into_request()?;

    // Model loading and inference block
    let audio = tokio::task::spawn_blocking(move || state.tts.generate(&request))
        .await
        .map_err(|e| AppError::Internal(format!("generation task failed: {}", e)))??;

    Ok(format!("/audio/{}", audio.filename))
}

pub async fn list_voices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<VoiceListing>>, AppError> {
    let voices = state.tts.list_voices()?;
    Ok(Json(voices))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
