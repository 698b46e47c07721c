use std::sync::Arc;
use axum::{routing::{get, post}, Router, Json};
use axum::extract::Path;
use tower_http::cors::{CorsLayer, Any};
use serde::{Deserialize, Serialize};
use axum::http::StatusCode;
use tracing::{info, warn};
use crate::code::NormalizedCode;
use crate::engine::{AnalysisResult, CodeAnalysis, Engine, InputKind};
use crate::store::FactStore;

#[derive(Deserialize)]
pub struct ExtractRequest {
    pub text: String,
}

#[derive(Serialize)]
pub struct ExtractResponse {
    pub codes: Vec<NormalizedCode>,
    pub elapsed_ms: f64,
}

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
    #[serde(default)]
    pub input_type: InputKind,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub status: String,
    pub error: String,
}

type Failure = (StatusCode, Json<ErrorResponse>);

fn failure(status: StatusCode, error: impl ToString) -> Failure {
    let error = error.to_string();
    warn!(%error, code=%status.as_u16(), "request failed");
    (status, Json(ErrorResponse { status: "error".into(), error }))
}

fn elapsed_ms(started: std::time::Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

pub fn router(engine: Arc<Engine>, store: Arc<dyn FactStore>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);
    let extract_engine = Arc::clone(&engine);
    let analyze_engine = Arc::clone(&engine);
    let analyze_store = Arc::clone(&store);
    Router::new()
        .route("/v1/extract", post(move |Json(req): Json<ExtractRequest>| {
        let engine = Arc::clone(&extract_engine);
        async move {
            // Extraction is synchronous, so it runs on the blocking pool.
            let started = std::time::Instant::now();
            let codes = tokio::task::spawn_blocking(move || engine.extract_codes(&req.text))
                .await
                .map_err(|e| failure(StatusCode::INTERNAL_SERVER_ERROR, format!("join error: {e}")))?;
            let elapsed_ms = elapsed_ms(started);
            info!(ms=elapsed_ms, codes=codes.len(), "extract complete");
            Ok::<_, Failure>(Json(ExtractResponse { codes, elapsed_ms }))
        }
    }))
        .route("/v1/analyze", post(move |Json(req): Json<AnalyzeRequest>| {
        let engine = Arc::clone(&analyze_engine);
        let store = Arc::clone(&analyze_store);
        async move {
            let started = std::time::Instant::now();
            let result = tokio::task::spawn_blocking(move || engine.analyze(&req.text, req.input_type, store.as_ref()))
                .await
                .map_err(|e| failure(StatusCode::INTERNAL_SERVER_ERROR, format!("join error: {e}")))?;
            match result {
                Ok(result) => {
                    info!(ms=elapsed_ms(started), codes=result.codes.len(), "analyze complete");
                    Ok::<Json<AnalysisResult>, Failure>(Json(result))
                }
                Err(e) => Err(failure(StatusCode::INTERNAL_SERVER_ERROR, e)),
            }
        }
    }))
        .route("/v1/additives/:code", get(move |Path(code): Path<String>| {
        let engine = Arc::clone(&engine);
        let store = Arc::clone(&store);
        async move {
            let started = std::time::Instant::now();
            let lookup = code.clone();
            let result = tokio::task::spawn_blocking(move || engine.lookup(&lookup, store.as_ref()))
                .await
                .map_err(|e| failure(StatusCode::INTERNAL_SERVER_ERROR, format!("join error: {e}")))?;
            match result {
                Ok(Some(analysis)) if analysis.found => {
                    info!(ms=elapsed_ms(started), code=%analysis.code, "lookup complete");
                    Ok::<Json<CodeAnalysis>, Failure>(Json(analysis))
                }
                Ok(Some(_)) => Err(failure(StatusCode::NOT_FOUND, format!("no facts for {code}"))),
                Ok(None) => Err(failure(StatusCode::NOT_FOUND, format!("{code} is not a registered additive"))),
                Err(e) => Err(failure(StatusCode::INTERNAL_SERVER_ERROR, e)),
            }
        }
    }))
    .layer(cors)
}
