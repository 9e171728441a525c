use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use super::handlers;
use crate::tts::TtsService;

pub struct AppState {
    pub tts: TtsService,
    pub static_dir: PathBuf,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let audio = ServeDir::new(state.tts.output_dir());
    let ui = ServeDir::new(&state.static_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/voices", get(handlers::list_voices))
        .route("/generate", post(handlers::generate_form))
        .route("/api/generate", post(handlers::generate_json))
        .route("/health", get(handlers::health))
        .nest_service("/audio", audio)
        .fallback_service(ui)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
