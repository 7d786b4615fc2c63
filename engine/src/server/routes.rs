//! Endpoint handlers

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Multipart, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use sdk::errors::EngineError;
use sdk::types::{Decomposition, GeneratedImage, Simulation};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::net::SocketAddr;

use super::error::ApiError;
use super::AppState;
use crate::cache::{CacheNamespace, CacheStats};
use crate::export::{self, ExportRequest, PPTX_CONTENT_TYPE};
use crate::llm::AudioClip;
use crate::service::{
    DeconstructRequest, ImageGenerationRequest, NarrativeRequest, ProviderReport, SimulateRequest,
};

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct DeconstructResponse {
    pub decomposition: Decomposition,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct SimulateResponse {
    pub simulations: Simulation,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub images: Vec<GeneratedImage>,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct NarrativeResponse {
    pub narrative: String,
}

#[derive(Debug, Serialize)]
pub struct TranscriptionResponse {
    pub text: String,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub commit: &'static str,
    pub uptime_secs: u64,
    pub providers: ProviderReport,
}

/// Rate limit key: first `x-forwarded-for` hop, then the peer address
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(hop), _) => hop.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

fn throttle(
    state: &AppState,
    headers: &HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Result<(), EngineError> {
    match &state.limiter {
        Some(limiter) => limiter.check_and_record(&client_key(headers, peer.map(|c| c.0))),
        None => Ok(()),
    }
}

pub async fn deconstruct(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<DeconstructRequest>, JsonRejection>,
) -> ApiResult<Json<DeconstructResponse>> {
    throttle(&state, &headers, peer)?;
    let Json(request) = payload?;
    let result = state.service.deconstruct(&request).await?;
    Ok(Json(DeconstructResponse {
        decomposition: result.value,
        cached: result.cached,
    }))
}

pub async fn simulate(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<SimulateRequest>, JsonRejection>,
) -> ApiResult<Json<SimulateResponse>> {
    throttle(&state, &headers, peer)?;
    let Json(request) = payload?;
    let result = state.service.simulate(&request).await?;
    Ok(Json(SimulateResponse {
        simulations: result.value,
        cached: result.cached,
    }))
}

pub async fn generate_image(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<ImageGenerationRequest>, JsonRejection>,
) -> ApiResult<Json<ImageResponse>> {
    throttle(&state, &headers, peer)?;
    let Json(request) = payload?;
    let result = state.service.generate_image(&request).await?;
    Ok(Json(ImageResponse {
        images: result.value,
        cached: result.cached,
    }))
}

pub async fn narrative(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<NarrativeRequest>, JsonRejection>,
) -> ApiResult<Json<NarrativeResponse>> {
    throttle(&state, &headers, peer)?;
    let Json(request) = payload?;
    let narrative = state.service.narrate(&request).await?;
    Ok(Json(NarrativeResponse { narrative }))
}

/// Multipart upload with the clip in the `audio` field
pub async fn transcribe(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    upload: Result<Multipart, axum::extract::multipart::MultipartRejection>,
) -> ApiResult<Json<TranscriptionResponse>> {
    throttle(&state, &headers, peer)?;
    let mut upload = upload?;

    let mut clip = None;
    while let Some(field) = upload.next_field().await? {
        if field.name() != Some("audio") {
            continue;
        }
        let filename = field.file_name().unwrap_or("audio.webm").to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes: Bytes = field.bytes().await?;
        clip = Some(AudioClip {
            bytes: bytes.to_vec(),
            filename,
            mime_type,
        });
        break;
    }

    let clip = clip.ok_or_else(|| EngineError::validation("audio file is required"))?;
    let result = state.service.transcribe(&clip).await?;
    Ok(Json(TranscriptionResponse {
        text: result.value,
        cached: result.cached,
    }))
}

/// Package collected results as a PowerPoint download
pub async fn export_deck(
    payload: Result<Json<ExportRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    let exported = tokio::task::spawn_blocking(move || export::export_pptx(&request))
        .await
        .map_err(|e| EngineError::Export(e.to_string()))??;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", exported.file_name))
        .map_err(|e| EngineError::Export(e.to_string()))?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(PPTX_CONTENT_TYPE)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        exported.bytes,
    )
        .into_response())
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        commit: env!("GIT_COMMIT_HASH"),
        uptime_secs: state.started.elapsed().as_secs(),
        providers: state.service.provider_report(),
    })
}

pub async fn cache_stats(
    State(state): State<AppState>,
) -> Json<BTreeMap<CacheNamespace, CacheStats>> {
    Json(state.service.cache().stats())
}

pub async fn cache_clear(State(state): State<AppState>) -> Json<Value> {
    state.service.cache().clear();
    tracing::info!("Cache cleared");
    Json(json!({ "cleared": true }))
}
