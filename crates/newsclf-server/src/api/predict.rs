use std::time::Instant;

use axum::{extract::State, Json};
use newsclf_core::Prediction;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppError;
use crate::state::AppState;

pub const DUMMY_NOTE: &str = "Model not loaded, returning dummy Fake result";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PredictRequest {
    pub text: String,
}

/// Placeholder answer used when the server runs in dummy-fallback mode.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DummyPrediction {
    pub label: u8,
    pub confidence: f32,
    pub note: &'static str,
}

impl Default for DummyPrediction {
    fn default() -> Self {
        Self {
            label: 1,
            confidence: 0.99,
            note: DUMMY_NOTE,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PredictResponse {
    Prediction(Prediction),
    Dummy(DummyPrediction),
}

/// POST /predict
pub async fn predict(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, AppError> {
    let request_id = Uuid::new_v4();

    if state.fallback_active() {
        tracing::warn!(%request_id, "Model not loaded, answering with the dummy result");
        return Ok(Json(PredictResponse::Dummy(DummyPrediction::default())));
    }

    let start = Instant::now();
    let classifier = state.classifier().await?;

    let text = req.text;
    let chars = text.chars().count();
    let inspection = tokio::task::spawn_blocking(move || classifier.inspect(&text)).await??;

    tracing::info!(
        %request_id,
        chars,
        tokens = inspection.tokens.len(),
        label = %inspection.prediction.label,
        confidence = inspection.prediction.confidence,
        latency_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Prediction served"
    );

    Ok(Json(PredictResponse::Prediction(inspection.prediction)))
}
