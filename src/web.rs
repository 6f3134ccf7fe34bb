//! Read-only JSON API over the cache.
//!
//! - `GET /` - 12h forecast properties for the default location
//! - `GET /forecast/:location/:kind` - properties of any cached entry

use crate::cache::{Cache, CacheKey, LoadError};
use crate::config::Config;
use crate::schema::{ForecastEnvelope, Kind};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::io;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    cache: Cache,
    locations: Arc<BTreeSet<String>>,
    default_location: String,
}

impl AppState {
    pub fn new(config: &Config, cache: Cache) -> AppState {
        AppState {
            cache,
            locations: Arc::new(config.locations.keys().cloned().collect()),
            default_location: config.web.default_location.clone(),
        }
    }
}

#[derive(Debug)]
enum ApiError {
    UnknownLocation(String),
    UnknownKind(String),
    NotFound(CacheKey),
    Corrupt(LoadError),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::UnknownLocation(l) => {
                (StatusCode::NOT_FOUND, format!("unknown location {}", l))
            }
            ApiError::UnknownKind(k) => (
                StatusCode::BAD_REQUEST,
                format!("unknown kind {}, expected 12h, hourly or gridpoint", k),
            ),
            ApiError::NotFound(key) => (
                StatusCode::NOT_FOUND,
                format!("no cached {} data for {}", key.kind(), key.location()),
            ),
            ApiError::Corrupt(e) => {
                error!(error = %e, "cache entry unusable");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::Internal(e) => {
                error!(error = %e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/forecast/:location/:kind", get(forecast))
        .with_state(state)
}

pub async fn serve(state: AppState, bind: &str) -> io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "serving forecasts");
    axum::serve(listener, router(state)).await
}

async fn load(cache: Cache, key: CacheKey) -> Result<ForecastEnvelope, ApiError> {
    let lookup = key.clone();
    let loaded = tokio::task::spawn_blocking(move || cache.load(&lookup))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    match loaded {
        Ok(Some(envelope)) => Ok(envelope),
        Ok(None) => Err(ApiError::NotFound(key)),
        Err(e) => Err(ApiError::Corrupt(e)),
    }
}

fn properties(envelope: &ForecastEnvelope) -> Result<Value, ApiError> {
    envelope
        .properties_json()
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    let key = CacheKey::new(state.default_location.clone(), Kind::TwelveHour);
    let body = match load(state.cache.clone(), key).await.and_then(|e| properties(&e)) {
        Ok(properties) => json!({ "weatherData": properties }),
        Err(ApiError::NotFound(_)) => json!({ "error": "No weather data available." }),
        Err(e) => {
            error!(error = ?e, "default forecast unusable");
            json!({ "error": "No weather data available." })
        }
    };
    Json(body)
}

async fn forecast(
    State(state): State<AppState>,
    Path((location, kind)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    if !state.locations.contains(&location) {
        return Err(ApiError::UnknownLocation(location));
    }
    let kind: Kind = kind.parse().map_err(|_| ApiError::UnknownKind(kind.clone()))?;
    let envelope = load(state.cache.clone(), CacheKey::new(location, kind)).await?;
    Ok(Json(properties(&envelope)?))
}
