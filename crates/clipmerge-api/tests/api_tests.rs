//! HTTP shell tests over an in-process router with fake media and storage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use clipmerge_api::{create_router, ApiConfig, AppState};
use clipmerge_media::{
    ExtractionJob, MediaResult, MediaValidator, SegmentConcatenator, SegmentExtractor,
};
use clipmerge_models::RunId;
use clipmerge_pipeline::{MergePipeline, PipelineConfig, SourceAcquisitionManager};
use clipmerge_storage::{ArtifactPublisher, PublishedArtifact, StorageError, StorageResult};

struct AcceptAll;

#[async_trait]
impl MediaValidator for AcceptAll {
    async fn probe(&self, _path: &Path) -> MediaResult<()> {
        Ok(())
    }
}

struct CopyExtractor;

#[async_trait]
impl SegmentExtractor for CopyExtractor {
    async fn extract(&self, job: &ExtractionJob) -> MediaResult<PathBuf> {
        tokio::fs::write(&job.output, job.video_id.as_bytes()).await?;
        Ok(job.output.clone())
    }
}

struct JoinConcatenator;

#[async_trait]
impl SegmentConcatenator for JoinConcatenator {
    async fn concatenate(
        &self,
        segments: &[PathBuf],
        run_id: &RunId,
        out_dir: &Path,
    ) -> MediaResult<PathBuf> {
        let output = out_dir.join(run_id.merged_file_name());
        tokio::fs::write(&output, format!("{} segments", segments.len())).await?;
        Ok(output)
    }
}

struct StubPublisher {
    configured: bool,
}

#[async_trait]
impl ArtifactPublisher for StubPublisher {
    async fn publish(&self, _path: &Path) -> StorageResult<PublishedArtifact> {
        if !self.configured {
            return Err(StorageError::MissingCredentials);
        }
        Ok(PublishedArtifact {
            url: "https://bucket.example/merged_abc_1700000000.mp4?X-Amz-Expires=604800"
                .to_string(),
            object_name: "merged_abc_1700000000.mp4".to_string(),
            key: "merged_abc_1700000000.mp4".to_string(),
        })
    }
}

struct TestApp {
    dir: TempDir,
    router: Router,
}

impl TestApp {
    fn new(publisher_configured: bool) -> Self {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::with_base_dir(dir.path());
        std::fs::create_dir_all(&config.download_dir).unwrap();
        std::fs::create_dir_all(&config.tmp_dir).unwrap();

        // No providers: every source must already be on disk.
        let acquisition =
            SourceAcquisitionManager::new(config.download_dir.clone(), Vec::new(), Arc::new(AcceptAll));
        let pipeline = MergePipeline::new(
            &config,
            acquisition,
            Arc::new(CopyExtractor),
            Arc::new(JoinConcatenator),
            Arc::new(StubPublisher {
                configured: publisher_configured,
            }),
        );
        let router = create_router(AppState::new(ApiConfig::default(), pipeline), None);
        Self { dir, router }
    }

    fn seed_source(&self, video_id: &str) {
        let path = self.dir.path().join("Download").join(format!("{video_id}.mp4"));
        std::fs::write(path, vec![0u8; 4096]).unwrap();
    }

    fn tmp_entries(&self) -> usize {
        std::fs::read_dir(self.dir.path().join("tmp")).unwrap().count()
    }

    async fn post_merge(&self, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/merge-clips")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }
}

#[tokio::test]
async fn test_root_banner() {
    let app = TestApp::new(true);
    let (status, body) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("clipmerge"));
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new(true);
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["ffmpeg_available"], true);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = TestApp::new(true);
    let (status, body) = app.get("/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_merge_success_shape() {
    let app = TestApp::new(true);
    app.seed_source("v1");

    let (status, body) = app
        .post_merge(json!({
            "clips": [{ "videoId": "v1", "startTime": 5, "endTime": 10 }]
        }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], true);
    assert_eq!(body["fileNames3"], "merged_abc_1700000000.mp4");
    assert!(body["s3Url"].as_str().unwrap().starts_with("https://"));
    assert_eq!(body["clipsInfo"][0]["videoId"], "v1");
    assert_eq!(app.tmp_entries(), 0);
    // cleanupDownloads defaults to true
    assert!(!app.dir.path().join("Download/v1.mp4").exists());
}

#[tokio::test]
async fn test_invalid_range_is_400() {
    let app = TestApp::new(true);
    app.seed_source("v1");

    let (status, body) = app
        .post_merge(json!({
            "clips": [{ "videoId": "v1", "startTime": 10, "endTime": 5 }]
        }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
    assert!(body["error"].as_str().unwrap().contains("time range"));
    assert!(app.dir.path().join("Download/v1.mp4").exists());
}

#[tokio::test]
async fn test_empty_clip_list_is_400() {
    let app = TestApp::new(true);
    let (status, body) = app.post_merge(json!({ "clips": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let app = TestApp::new(true);
    let request = Request::builder()
        .method("POST")
        .uri("/merge-clips")
        .header("content-type", "application/json")
        .body(Body::from("{\"clips\": ["))
        .unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
}

#[tokio::test]
async fn test_missing_source_is_500() {
    let app = TestApp::new(true);
    let (status, body) = app
        .post_merge(json!({
            "clips": [{ "videoId": "absent", "startTime": 0, "endTime": 2 }]
        }))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], false);
    assert!(body["error"].as_str().unwrap().contains("absent"));
    assert_eq!(app.tmp_entries(), 0);
}

#[tokio::test]
async fn test_publish_failure_is_500_and_keeps_sources() {
    let app = TestApp::new(false);
    app.seed_source("v1");

    let (status, body) = app
        .post_merge(json!({
            "clips": [
                { "videoId": "v1", "startTime": 0, "endTime": 2 },
                { "videoId": "v1", "startTime": 4, "endTime": 6 }
            ]
        }))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], false);
    assert_eq!(app.tmp_entries(), 0);
    assert!(app.dir.path().join("Download/v1.mp4").exists());
}

#[test]
fn test_default_bind_addr_parses() {
    let config = ApiConfig::default();
    tokio_test::assert_ok!(config.bind_addr().parse::<std::net::SocketAddr>());
}
