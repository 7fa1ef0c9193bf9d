use crate::app::DiscoveryService;
use crate::common::error::DiscoveryError;
use crate::common::types::TasteProfile;
use crate::discovery::mood::Mood;
use crate::observability;
use axum::{
    extract::{Path, Query},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post, put},
    Extension, Router,
};
use hyper::Server;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use uuid::Uuid;

/// Maps service errors onto HTTP status codes
pub struct ApiError(DiscoveryError);

impl From<DiscoveryError> for ApiError {
    fn from(err: DiscoveryError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DiscoveryError::NotFound(_) => StatusCode::NOT_FOUND,
            DiscoveryError::InvalidInput(_) | DiscoveryError::MissingField(_) => {
                StatusCode::BAD_REQUEST
            }
            DiscoveryError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            DiscoveryError::Catalog { .. }
            | DiscoveryError::Source { .. }
            | DiscoveryError::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct EventsParams {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LocationParams {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistRequest {
    pub event_id: Uuid,
    pub mood: Option<Mood>,
    pub track_count: Option<usize>,
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "sms-discovery",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        observability::render(),
    )
}

async fn trigger_ingest(Extension(service): Extension<Arc<DiscoveryService>>) -> impl IntoResponse {
    let started = service.run_ingestion();
    let status = if started {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    (status, Json(serde_json::json!({ "started": started })))
}

async fn ingest_status(Extension(service): Extension<Arc<DiscoveryService>>) -> impl IntoResponse {
    Json(service.get_ingestion_status().await)
}

async fn delete_event(
    Extension(service): Extension<Arc<DiscoveryService>>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    service.delete_event(event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_events(
    Extension(service): Extension<Arc<DiscoveryService>>,
    Query(params): Query<EventsParams>,
) -> ApiResult<impl IntoResponse> {
    let events = service
        .query_events(
            params.lat,
            params.lng,
            params.radius_km,
            params.user_id.as_deref(),
        )
        .await?;
    Ok(Json(events))
}

async fn put_taste_profile(
    Extension(service): Extension<Arc<DiscoveryService>>,
    Path(user_id): Path<String>,
    Json(profile): Json<TasteProfile>,
) -> ApiResult<StatusCode> {
    service.put_taste_profile(&user_id, profile).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_moods(Extension(service): Extension<Arc<DiscoveryService>>) -> impl IntoResponse {
    Json(service.list_moods())
}

async fn user_moods(
    Extension(service): Extension<Arc<DiscoveryService>>,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(service.recommended_moods_for_user(&user_id).await?))
}

async fn mood_events(
    Extension(service): Extension<Arc<DiscoveryService>>,
    Path(mood): Path<String>,
    Query(params): Query<LocationParams>,
) -> ApiResult<impl IntoResponse> {
    let mood: Mood = mood.parse()?;
    let events = service
        .mood_events(mood, params.lat, params.lng, params.radius_km)
        .await?;
    Ok(Json(events))
}

async fn generate_playlist(
    Extension(service): Extension<Arc<DiscoveryService>>,
    Json(request): Json<PlaylistRequest>,
) -> ApiResult<impl IntoResponse> {
    let generated = service
        .generate_playlist(request.event_id, request.mood, request.track_count)
        .await?;
    Ok((StatusCode::CREATED, Json(generated)))
}

/// Build the router with every route
pub fn create_server(service: Arc<DiscoveryService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/admin/ingest", post(trigger_ingest))
        .route("/admin/ingest/status", get(ingest_status))
        .route("/admin/events/:id", delete(delete_event))
        .route("/events", get(list_events))
        .route("/users/:user_id/taste-profile", put(put_taste_profile))
        .route("/users/:user_id/moods", get(user_moods))
        .route("/moods", get(list_moods))
        .route("/moods/:mood/events", get(mood_events))
        .route("/playlists", post(generate_playlist))
        .layer(Extension(service))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the specified port
pub async fn start_server(service: Arc<DiscoveryService>, port: u16) -> anyhow::Result<()> {
    let app = create_server(service);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("🚀 HTTP server running on http://localhost:{}", port);
    info!("💚 Health check: http://localhost:{}/health", port);

    Server::bind(&addr).serve(app.into_make_service()).await?;
    Ok(())
}
