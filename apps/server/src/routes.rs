use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
};
use beonyeok_core::{ContentRecord, RecordListItem, render_html};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    error::{ApiError, Result},
    state::{AppState, Job},
};

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    pub url: String,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    pub job_id: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/translate", post(start_translation))
        .route("/webhooks/video", post(video_webhook))
        .route("/api/status/{job_id}", get(job_status))
        .route("/api/result/{video_id}", get(result))
        .route("/view/{video_id}", get(view))
        .route("/api/list", get(list))
        .with_state(state)
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "healthy")
}

async fn start_translation(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>> {
    let job_id = state.submit(&request.url, request.force).await?;
    Ok(Json(TranslateResponse { job_id }))
}

/// Same trigger as `/api/translate`, for upload notifications from other services.
async fn video_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>> {
    if let Some(expected_secret) = state.webhook_secret() {
        let provided_secret = headers
            .get("x-webhook-secret")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if provided_secret != expected_secret {
            warn!("Invalid webhook secret received");
            return Err(ApiError::Unauthorized);
        }
    }

    let job_id = state.submit(&request.url, request.force).await?;
    Ok(Json(TranslateResponse { job_id }))
}

async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>> {
    state
        .job(&job_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Job not found".into()))
}

async fn find_record(state: &AppState, video_id: &str) -> Result<ContentRecord> {
    state
        .store()
        .get(video_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Result not found".into()))
}

async fn result(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<Json<ContentRecord>> {
    find_record(&state, &video_id).await.map(Json)
}

async fn view(State(state): State<AppState>, Path(video_id): Path<String>) -> Result<Html<String>> {
    let record = find_record(&state, &video_id).await?;
    if record.summary.is_none() {
        return Err(ApiError::NotFound("HTML not found".into()));
    }
    Ok(Html(render_html(&record)))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<RecordListItem>>> {
    Ok(Json(state.store().list().await?))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::Request,
    };
    use beonyeok_core::{
        ContentStore, ContentSummary, Difficulty, Pipeline, PipelineConfig, PipelineError,
        RecordStatus, TextGenerator, Transcript, TranscriptSource, store::MemoryStore,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    struct NoSubtitles;

    #[async_trait]
    impl TranscriptSource for NoSubtitles {
        async fn fetch(&self, video_id: &str) -> beonyeok_core::Result<Transcript> {
            Err(PipelineError::NotFound {
                video_id: video_id.to_string(),
            })
        }
    }

    struct Silent;

    #[async_trait]
    impl TextGenerator for Silent {
        async fn generate(&self, _: &str, _: &str, _: u32) -> beonyeok_core::Result<String> {
            Err(PipelineError::upstream("text generation", "unreachable in tests"))
        }
    }

    fn app_with(store: Arc<MemoryStore>, secret: Option<&str>) -> (AppState, Router) {
        let pipeline = Pipeline::new(
            Arc::new(NoSubtitles),
            Arc::new(Silent),
            store,
            &PipelineConfig::default(),
        );
        let state = AppState::new(Arc::new(pipeline), 2, secret.map(String::from));
        (state.clone(), router(state))
    }

    fn app() -> Router {
        app_with(Arc::new(MemoryStore::new()), None).1
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn translate_returns_short_job_id_and_status_is_queryable() {
        let (state, router) = app_with(Arc::new(MemoryStore::new()), None);

        let response = router
            .clone()
            .oneshot(post_json(
                "/api/translate",
                r#"{"url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let job_id = body_json(response).await["job_id"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(job_id.len(), 8);

        let response = router
            .oneshot(get_request(&format!("/api/status/{job_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let job = body_json(response).await;
        assert_eq!(job["video_id"], "dQw4w9WgXcQ");
        assert!(state.job(&job_id).await.is_some());
    }

    #[tokio::test]
    async fn translate_rejects_urls_without_video_id() {
        let response = app()
            .oneshot(post_json(
                "/api/translate",
                r#"{"url": "https://example.com/nothing-here"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_checks_secret() {
        let router = app_with(Arc::new(MemoryStore::new()), Some("s3cret")).1;
        let body = r#"{"url": "https://youtu.be/dQw4w9WgXcQ"}"#;

        let response = router
            .clone()
            .oneshot(post_json("/webhooks/video", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let mut request = post_json("/webhooks/video", body);
        request
            .headers_mut()
            .insert("x-webhook-secret", "s3cret".parse().unwrap());
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_job_and_missing_result_are_404() {
        let router = app();
        let response = router
            .clone()
            .oneshot(get_request("/api/status/deadbeef"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router
            .oneshot(get_request("/api/result/dQw4w9WgXcQ"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn archived_record_is_listed_viewable_and_fetchable() {
        let store = Arc::new(MemoryStore::new());
        let mut record = ContentRecord::new("dQw4w9WgXcQ");
        record.korean_transcript = Some("번역문".into());
        record.summary = Some(ContentSummary {
            one_liner: "작게 시작하라".into(),
            tags: vec!["습관".into()],
            difficulty: Difficulty::Beginner,
            keywords: vec![],
            key_points: vec![],
            quotes: vec![],
            action_items: vec![],
            related_topics: vec![],
        });
        record.status = RecordStatus::Completed;
        store.upsert(&record).await.unwrap();
        let router = app_with(store, None).1;

        let response = router
            .clone()
            .oneshot(get_request("/api/list"))
            .await
            .unwrap();
        let listed = body_json(response).await;
        assert_eq!(listed[0]["one_liner"], "작게 시작하라");

        let response = router
            .clone()
            .oneshot(get_request("/api/result/dQw4w9WgXcQ"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["status"], "completed");

        let response = router
            .oneshot(get_request("/view/dQw4w9WgXcQ"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("작게 시작하라"));
    }
}
