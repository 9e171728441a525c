pub mod handlers;
pub mod routes;

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::AppError;
use crate::tts::{
    GenerationRequest, DEFAULT_CFG, DEFAULT_EXAGGERATION, DEFAULT_TEMPERATURE,
};

/// Envelope returned by both generation endpoints.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub error_message: String,
    pub audio_url: String,
}

impl GenerateResponse {
    pub fn success(audio_url: String) -> Self {
        Self {
            success: true,
            error_message: String::new(),
            audio_url,
        }
    }

    pub fn failure(error_message: String) -> Self {
        Self {
            success: false,
            error_message,
            audio_url: String::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Raw generation fields before numeric parsing.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GenerateParams {
    pub text: Option<String>,
    pub voice: Option<String>,
    pub cfg: Option<String>,
    pub exaggeration: Option<String>,
    pub temperature: Option<String>,
    pub seed: Option<String>,
    pub process: bool,
}

impl GenerateParams {
    /// HTML form fields; processing is enabled by a checked `process` box.
    pub fn from_form(mut fields: HashMap<String, String>) -> Self {
        Self {
            text: fields.remove("text"),
            voice: fields.remove("voice"),
            cfg: fields.remove("cfg"),
            exaggeration: fields.remove("exaggeration"),
            temperature: fields.remove("temperature"),
            seed: fields.remove("seed"),
            process: fields.get("process").map(|v| v == "on").unwrap_or(false),
        }
    }

    /// JSON body; processing defaults to enabled.
    pub fn from_json(body: &[u8]) -> Result<Self, AppError> {
        let data = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) if !map.is_empty() => map,
            _ => return Err(AppError::BadRequest("No JSON data provided".into())),
        };

        let field = |name: &str| data.get(name).and_then(scalar_to_string);

        Ok(Self {
            text: field("text"),
            voice: field("voice"),
            cfg: field("cfg"),
            exaggeration: field("exaggeration"),
            temperature: field("temperature"),
            seed: field("seed"),
            process: data.get("process").map(is_truthy).unwrap_or(true),
        })
    }

    pub fn into_request(self) -> Result<GenerationRequest, AppError> {
        let cfg = parse_float("cfg", self.cfg.as_deref(), DEFAULT_CFG)?;
        let exaggeration =
            parse_float("exaggeration", self.exaggeration.as_deref(), DEFAULT_EXAGGERATION)?;
        let temperature =
            parse_float("temperature", self.temperature.as_deref(), DEFAULT_TEMPERATURE)?;
        let seed = parse_seed(self.seed.as_deref())?;

        let text = self.text.unwrap_or_default().trim().to_string();
        if text.is_empty() {
            return Err(AppError::BadRequest("Text is required".into()));
        }

        if !self.process {
            return Err(AppError::BadRequest("Processing is disabled".into()));
        }

        Ok(GenerationRequest {
            text,
            voice: self.voice.unwrap_or_default(),
            cfg,
            exaggeration,
            temperature,
            seed: (seed > 0).then_some(seed as u64),
        })
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn parse_float(name: &str, raw: Option<&str>, default: f32) -> Result<f32, AppError> {
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<f32>().map_err(|_| {
            AppError::BadRequest(format!("could not convert {} to float: '{}'", name, raw))
        }),
    }
}

fn parse_seed(raw: Option<&str>) -> Result<i64, AppError> {
    let Some(raw) = raw else {
        return Ok(0);
    };
    let raw = raw.trim();
    raw.parse::<i64>()
        .or_else(|_| raw.parse::<f64>().map(|f| f.trunc() as i64))
        .map_err(|_| AppError::BadRequest(format!("invalid literal for seed: '{}'", raw)))
}
