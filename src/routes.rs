use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::Method,
    routing::{get, post},
    Json,
    Router,
};
use blob_store::BlobStoreProvider;
use data_model::ObjectKey;
use opentelemetry::KeyValue;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

use crate::{
    http_objects::{
        ApiError,
        DownloadDecision,
        DownloadUrlRequest,
        NamedUploadUrl,
        UploadUrl,
        UploadUrlRequest,
        UploadUrls,
    },
    metrics::api_io_stats,
    readiness::DownloadReadinessResolver,
    upload::UploadUrlMinter,
};

#[derive(OpenApi)]
#[openapi(
        paths(
            download_url,
            upload_url,
        ),
        components(
            schemas(
                DownloadUrlRequest,
                DownloadDecision,
                UploadUrlRequest,
                UploadUrl,
                NamedUploadUrl,
                UploadUrls,
            )
        ),
        tags(
            (name = "download-gate", description = "Presigned download and upload URLs")
        )
    )]
struct ApiDoc;

#[derive(Clone)]
pub struct RouteState {
    pub blob_stores: Arc<dyn BlobStoreProvider>,
    pub resolver: Arc<DownloadReadinessResolver>,
    pub upload_urls: Arc<UploadUrlMinter>,
    pub metrics: Arc<api_io_stats::Metrics>,
}

pub fn create_routes(route_state: RouteState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/docs/openapi.json", get(openapi))
        .route(
            "/download_url",
            post(download_url).with_state(route_state.clone()),
        )
        .route(
            "/upload_url",
            post(upload_url).with_state(route_state.clone()),
        )
        .layer(cors)
}

async fn index() -> &'static str {
    "Download Gate Server"
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Report whether the derived output of an uploaded object can be downloaded
#[utoipa::path(
    post,
    path = "/download_url",
    request_body = DownloadUrlRequest,
    tag = "operations",
    responses(
        (status = 200, description = "Readiness decision; statusCode 1 carries a download url", body = DownloadDecision),
        (status = FORBIDDEN, description = "Storage, credential or request error", body = String)
    ),
)]
pub async fn download_url(
    State(state): State<RouteState>,
    payload: Result<Json<DownloadUrlRequest>, JsonRejection>,
) -> Result<Json<DownloadDecision>, ApiError> {
    state.metrics.record_request("download_url");
    let Json(request) = payload?;

    let store = state.blob_stores.store_for(&request.bucket_name).await?;
    let decision = state
        .resolver
        .resolve(store.as_ref(), &ObjectKey::from(request.file_name))
        .await?;

    state.metrics.decisions.add(
        1,
        &[KeyValue::new("status", decision.status_code.to_string())],
    );
    Ok(Json(decision.into()))
}

/// Mint presigned upload urls under a time-stamped prefix
#[utoipa::path(
    post,
    path = "/upload_url",
    request_body = UploadUrlRequest,
    tag = "operations",
    responses(
        (status = 200, description = "One url for file_name, a list for file_names, null otherwise", body = UploadUrls),
        (status = FORBIDDEN, description = "Storage, credential or request error", body = String)
    ),
)]
pub async fn upload_url(
    State(state): State<RouteState>,
    payload: Result<Json<UploadUrlRequest>, JsonRejection>,
) -> Result<Json<Option<UploadUrls>>, ApiError> {
    state.metrics.record_request("upload_url");
    let Json(request) = payload?;

    let store = state.blob_stores.store_for(&request.bucket_name).await?;
    let urls = state.upload_urls.mint(store.as_ref(), &request).await?;

    let minted = match &urls {
        Some(UploadUrls::Single(_)) => 1,
        Some(UploadUrls::Batch(urls)) => urls.len() as u64,
        None => 0,
    };
    state.metrics.upload_urls.add(minted, &[]);
    Ok(Json(urls))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::IntoResponse,
    };
    use data_model::test_objects::tests::{
        mock_step_state_body,
        TEST_BUCKET,
        TEST_OBJECT_KEY,
    };

    use super::*;
    use crate::testing::TestRouteState;

    fn download_request(bucket: &str, key: &str) -> Result<Json<DownloadUrlRequest>, JsonRejection> {
        Ok(Json(DownloadUrlRequest {
            bucket_name: bucket.to_string(),
            file_name: key.to_string(),
        }))
    }

    #[tokio::test]
    async fn test_download_url_pending_then_ready() {
        let test_state = TestRouteState::new();
        let bucket = test_state.bucket(TEST_BUCKET);

        let Json(decision) = download_url(
            State(test_state.route_state()),
            download_request(TEST_BUCKET, TEST_OBJECT_KEY),
        )
        .await
        .unwrap();
        assert_eq!(decision.status_code, -1);
        assert_eq!(decision.message, "Please retry fail");

        bucket
            .put(
                "step-state-sales_202401011200/sales.xlsx",
                mock_step_state_body("running"),
            )
            .await
            .unwrap();
        let Json(decision) = download_url(
            State(test_state.route_state()),
            download_request(TEST_BUCKET, TEST_OBJECT_KEY),
        )
        .await
        .unwrap();
        assert_eq!(decision.status_code, 0);
        assert_eq!(decision.message, "Step Function Status => running");
        assert_eq!(decision.download_url, None);

        bucket.put("output_sales.csv", "a,b\n").await.unwrap();
        let Json(decision) = download_url(
            State(test_state.route_state()),
            download_request(TEST_BUCKET, TEST_OBJECT_KEY),
        )
        .await
        .unwrap();
        assert_eq!(decision.status_code, 1);
        assert_eq!(
            decision.download_url.as_deref(),
            Some("memory://alice-report-service/output_sales.csv?expires_in=60")
        );
    }

    #[tokio::test]
    async fn test_download_url_malformed_step_state_is_forbidden() {
        let test_state = TestRouteState::new();
        test_state
            .bucket(TEST_BUCKET)
            .put("step-state-sales_202401011200/sales.xlsx", "{oops")
            .await
            .unwrap();

        let err = download_url(
            State(test_state.route_state()),
            download_request(TEST_BUCKET, TEST_OBJECT_KEY),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "malformed_step_state");
        assert!(err.message().contains("step-state-sales_202401011200/sales.xlsx"));
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_download_url_rejects_invalid_bucket() {
        let test_state = TestRouteState::new();
        let err = download_url(
            State(test_state.route_state()),
            download_request("../etc", TEST_OBJECT_KEY),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "storage");
    }

    #[tokio::test]
    async fn test_upload_url_single_and_empty() {
        let test_state = TestRouteState::new();

        let Json(urls) = upload_url(
            State(test_state.route_state()),
            Ok(Json(UploadUrlRequest {
                bucket_name: TEST_BUCKET.to_string(),
                file_name: Some("sales.xlsx".to_string()),
                file_names: vec![],
                metadata: Default::default(),
            })),
        )
        .await
        .unwrap();
        assert_eq!(
            urls,
            Some(UploadUrls::Single(UploadUrl {
                upload_url:
                    "memory://alice-report-service/sales_202401011200/sales.xlsx?expires_in=60"
                        .to_string(),
                object_key: "sales_202401011200/sales.xlsx".to_string(),
            }))
        );

        let Json(urls) = upload_url(
            State(test_state.route_state()),
            Ok(Json(UploadUrlRequest {
                bucket_name: TEST_BUCKET.to_string(),
                file_name: None,
                file_names: vec![],
                metadata: Default::default(),
            })),
        )
        .await
        .unwrap();
        assert_eq!(urls, None);
    }

    #[tokio::test]
    async fn test_router_serves_envelopes_with_cors() {
        use tower::ServiceExt;

        let test_state = TestRouteState::new();
        let app = create_routes(test_state.route_state());

        let response = app
            .clone()
            .oneshot(
                Request::post("/download_url")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::ORIGIN, "https://reports.example")
                    .body(Body::from(r#"{"bucket_name": "alice-report-service"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );

        let response = app
            .oneshot(
                Request::post("/download_url")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::ORIGIN, "https://reports.example")
                    .body(Body::from(
                        r#"{"bucket_name": "alice-report-service", "file_name": "sales_202401011200/sales.xlsx"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let decision: DownloadDecision = serde_json::from_slice(&body).unwrap();
        assert_eq!(decision.status_code, -1);
    }
}
