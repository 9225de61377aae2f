//! API service routes

use auth::middleware::{AuthSession, auth_middleware};
use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    models::{
        ExplainRequest, ExplainResponseData, NewImage, SettingUpdateRequest, UploadResponse,
        VideoData, VideoRegisterRequest,
    },
    references::CollectionTarget,
};

/// Multipart form field carrying the screenshot
pub const IMAGE_FIELD: &str = "image";

/// Room for multipart boundaries and headers on top of the image itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes + MULTIPART_OVERHEAD);

    let protected_routes = Router::new()
        .route("/api/videos", post(register_video))
        .route("/api/videos/:video_id", get(get_video))
        .route(
            "/api/upload/:video_id",
            post(upload_image).layer(upload_limit),
        )
        .route("/api/explanations", post(explain))
        .route("/api/settings/:id", get(get_setting).put(update_setting))
        .route("/api/statistics/requests", get(request_statistics))
        .route_layer(middleware::from_fn_with_state(
            state.verifier.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(protected_routes)
        .with_state(state)
}

/// Service banner
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "service": "docent-api",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    common::database::health_check(&state.db_pool).await?;

    Ok(Json(json!({
        "status": "healthy",
        "service": "api-service",
    })))
}

/// Register or update a video
///
/// Newly created videos get their references collected in the background.
pub async fn register_video(
    State(state): State<AppState>,
    payload: Result<Json<VideoRegisterRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;
    if payload.video_id.trim().is_empty() {
        return Err(ApiError::BadRequest("videoId is required".to_string()));
    }

    let (video, created) = state.videos.upsert(&payload.into_new_video()).await?;

    let status = if created {
        info!(video_id = %video.video_id, "Registered video");
        state.collector.spawn(CollectionTarget::new(
            &video.video_id,
            &video.title,
            &video.platform,
        ));
        StatusCode::CREATED
    } else {
        info!(video_id = %video.video_id, "Updated video");
        StatusCode::OK
    };

    Ok((
        status,
        Json(json!({
            "success": true,
            "data": VideoData::from(video),
        })),
    ))
}

/// Get a video by id
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let video = state
        .videos
        .get(&video_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Video not found: {}", video_id)))?;

    Ok(Json(json!({
        "success": true,
        "data": VideoData::from(video),
    })))
}

/// Store a screenshot for a registered video
pub async fn upload_image(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    if state.videos.get(&video_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Video not found: {}", video_id)));
    }

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        if let Some(content_type) = field.content_type() {
            if !content_type.starts_with("image/") {
                return Err(ApiError::BadRequest(format!(
                    "Unsupported content type: {}",
                    content_type
                )));
            }
        }

        let filename = field.file_name().unwrap_or("image.jpg").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        if bytes.is_empty() {
            return Err(ApiError::BadRequest("Uploaded image is empty".to_string()));
        }
        if bytes.len() > state.max_upload_bytes {
            return Err(ApiError::BadRequest(format!(
                "Image exceeds the {} byte limit",
                state.max_upload_bytes
            )));
        }

        let image_id = Uuid::new_v4().to_string();
        let path = state
            .storage
            .save(&image_id, &filename, &bytes)
            .await
            .map_err(|e| {
                error!("Failed to store image for video {}: {}", video_id, e);
                ApiError::InternalServerError("Failed to store image".to_string())
            })?;

        let image = state
            .images
            .create(&NewImage {
                image_id,
                video_id,
                file_path: path.display().to_string(),
                original_filename: filename,
                file_size: bytes.len() as i64,
            })
            .await?;

        info!(image_id = %image.image_id, video_id = %image.video_id, size = image.file_size, "Stored image");

        return Ok(Json(UploadResponse {
            success: true,
            image_id: image.image_id,
            filename: image.original_filename,
            size: image.file_size,
        }));
    }

    Err(ApiError::BadRequest(format!(
        "Missing '{}' form field",
        IMAGE_FIELD
    )))
}

/// Explain a subtitle line
pub async fn explain(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    payload: Result<Json<ExplainRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;
    let started = Instant::now();

    let explanation = state
        .explainer
        .explain(&session.session_id, &payload)
        .await?;

    let data = ExplainResponseData {
        explanation,
        cached: false,
        response_time: started.elapsed().as_millis() as u64,
    };

    Ok(Json(json!({
        "success": true,
        "data": data,
    })))
}

/// Get a setting by id
pub async fn get_setting(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let setting = state
        .settings
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Setting not found: {}", id)))?;

    Ok(Json(json!({
        "success": true,
        "data": setting,
    })))
}

/// Replace the value of an existing setting
pub async fn update_setting(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<SettingUpdateRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;
    if !state.settings.update_value(&id, &payload.setting_value).await? {
        return Err(ApiError::NotFound(format!("Setting not found: {}", id)));
    }
    info!("Updated setting {}", id);

    let setting = state
        .settings
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Setting not found: {}", id)))?;

    Ok(Json(json!({
        "success": true,
        "data": setting,
    })))
}

/// Explanation request counts
pub async fn request_statistics(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let statistics = state.requests.statistics().await?;

    Ok(Json(json!({
        "success": true,
        "data": statistics,
    })))
}
