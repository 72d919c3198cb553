use std::{sync::Arc, time::Duration};

use blob_store::BlobStore;
use chrono::{DateTime, Utc};
use data_model::{Decision, ObjectKey, ObjectMetadata, ReadinessState, StepState, StepStatus};
use tracing::{debug, info};

use super::{Clock, ResolveError, ResolveResult};

pub const DEFAULT_GRACE_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_DOWNLOAD_URL_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessConfig {
    /// How long after the original upload a missing step state still counts
    /// as "not triggered yet" rather than lost.
    pub grace_window: Duration,
    pub download_url_ttl: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            grace_window: DEFAULT_GRACE_WINDOW,
            download_url_ttl: DEFAULT_DOWNLOAD_URL_TTL,
        }
    }
}

/// The first signal found in storage, checked in precedence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    OutputReady,
    StepState(StepStatus),
    Original(ObjectMetadata),
    Nothing,
}

/// Map an observation to a readiness state. Pure; `now` comes from the
/// caller's clock.
pub fn classify(
    observation: &Observation,
    now: DateTime<Utc>,
    grace_window: Duration,
) -> ReadinessState {
    match observation {
        Observation::OutputReady => ReadinessState::Done,
        Observation::StepState(StepStatus::Fail) => ReadinessState::Failed,
        Observation::StepState(StepStatus::InProgress(_)) => ReadinessState::Running,
        Observation::Original(metadata) if metadata.within_window(now, grace_window) => {
            ReadinessState::TriggerWindow
        }
        Observation::Original(_) | Observation::Nothing => ReadinessState::Failed,
    }
}

pub struct DownloadReadinessResolver {
    config: ReadinessConfig,
    clock: Arc<dyn Clock>,
}

impl DownloadReadinessResolver {
    pub fn new(config: ReadinessConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    /// Read storage, stopping at the first signal. Never writes.
    pub async fn observe(
        &self,
        store: &dyn BlobStore,
        object_key: &ObjectKey,
    ) -> ResolveResult<Observation> {
        let output_key = object_key.output_key();
        if store.exists(output_key.get()).await? {
            return Ok(Observation::OutputReady);
        }

        let step_state_key = object_key.step_state_key();
        if store.exists(step_state_key.get()).await? {
            let body = store.get_body(step_state_key.get()).await?;
            let step_state =
                StepState::from_slice(&body).map_err(|source| ResolveError::MalformedStepState {
                    key: step_state_key.to_string(),
                    source,
                })?;
            return Ok(Observation::StepState(step_state.step_status()));
        }

        match store.head_last_modified(object_key.get()).await {
            Ok(last_modified) => Ok(Observation::Original(ObjectMetadata::new(last_modified))),
            Err(err) if err.is_not_found() => Ok(Observation::Nothing),
            Err(err) => Err(err.into()),
        }
    }

    /// Decide the download status of `object_key`. FAIL outcomes are
    /// returned as decisions; only infrastructure failures are errors.
    pub async fn resolve(
        &self,
        store: &dyn BlobStore,
        object_key: &ObjectKey,
    ) -> ResolveResult<Decision> {
        let observation = self.observe(store, object_key).await?;
        let state = classify(&observation, self.clock.now(), self.config.grace_window);
        debug!(
            object_key = %object_key,
            ?observation,
            from = %ReadinessState::default(),
            to = %state,
            terminal = state.is_terminal(),
            "classified readiness"
        );

        let decision = match observation {
            Observation::OutputReady => {
                let output_key = object_key.output_key();
                let url = store
                    .presign_get(output_key.get(), self.config.download_url_ttl)
                    .await?;
                Decision::ready(url.url)
            }
            Observation::StepState(StepStatus::Fail) => Decision::step_failed(),
            Observation::StepState(StepStatus::InProgress(raw)) => Decision::step_running(&raw),
            Observation::Original(_) if state == ReadinessState::TriggerWindow => {
                Decision::awaiting_trigger()
            }
            // Default fallback: stale original or no original at all.
            Observation::Original(_) | Observation::Nothing => Decision::retry(),
        };

        info!(
            object_key = %object_key,
            state = %decision.state,
            status_code = %decision.status_code,
            "resolved download readiness"
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{HashMap, HashSet},
        sync::Mutex,
    };

    use async_trait::async_trait;
    use blob_store::{
        BlobError,
        BlobResult,
        MemoryBlobStoreProvider,
        PresignedUrl,
    };
    use bytes::Bytes;
    use chrono::{TimeDelta, TimeZone};
    use data_model::{
        test_objects::tests::{mock_object_key, mock_step_state_body, TEST_BUCKET},
        StatusCode,
    };

    use super::*;
    use crate::readiness::FixedClock;

    /// Scriptable store: objects with explicit timestamps plus injected
    /// failures.
    #[derive(Default)]
    struct StubStore {
        objects: HashMap<String, (DateTime<Utc>, Bytes)>,
        failing_keys: HashSet<String>,
        fail_presign: bool,
        reads: Mutex<Vec<String>>,
    }

    impl StubStore {
        fn with_object(mut self, key: &str, at: DateTime<Utc>, body: impl Into<Bytes>) -> Self {
            self.objects.insert(key.to_string(), (at, body.into()));
            self
        }

        fn failing(mut self, key: &str) -> Self {
            self.failing_keys.insert(key.to_string());
            self
        }

        fn lookup(&self, key: &str) -> BlobResult<&(DateTime<Utc>, Bytes)> {
            self.reads.lock().unwrap().push(key.to_string());
            if self.failing_keys.contains(key) {
                return Err(BlobError::Other {
                    source: anyhow::anyhow!("connection reset reading {}", key),
                });
            }
            self.objects.get(key).ok_or_else(|| BlobError::NotFound {
                key: key.to_string(),
            })
        }
    }

    #[async_trait]
    impl BlobStore for StubStore {
        async fn head_last_modified(&self, key: &str) -> BlobResult<DateTime<Utc>> {
            Ok(self.lookup(key)?.0)
        }

        async fn get_body(&self, key: &str) -> BlobResult<Bytes> {
            Ok(self.lookup(key)?.1.clone())
        }

        async fn presign_get(&self, key: &str, expires_in: Duration) -> BlobResult<PresignedUrl> {
            if self.fail_presign {
                return Err(BlobError::Presign {
                    key: key.to_string(),
                    reason: "signing key unavailable".to_string(),
                });
            }
            Ok(PresignedUrl::get(
                format!("https://{}.example/{}?ttl={}", TEST_BUCKET, key, expires_in.as_secs()),
                expires_in,
            ))
        }

        async fn presign_put(
            &self,
            key: &str,
            expires_in: Duration,
            _metadata: &HashMap<String, String>,
        ) -> BlobResult<PresignedUrl> {
            Ok(PresignedUrl::put(format!("https://put/{}", key), expires_in))
        }
    }

    fn uploaded_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn resolver_at(now: DateTime<Utc>) -> DownloadReadinessResolver {
        DownloadReadinessResolver::new(ReadinessConfig::default(), Arc::new(FixedClock::new(now)))
    }

    fn seconds_after_upload(secs: i64) -> DownloadReadinessResolver {
        resolver_at(uploaded_at() + TimeDelta::seconds(secs))
    }

    fn output_key() -> String {
        mock_object_key().output_key().get().to_string()
    }

    fn step_key() -> String {
        mock_object_key().step_state_key().get().to_string()
    }

    #[tokio::test]
    async fn test_output_dominates_every_other_signal() {
        let key = mock_object_key();
        let store = StubStore::default()
            .with_object(&output_key(), uploaded_at(), "a,b\n")
            .with_object(&step_key(), uploaded_at(), mock_step_state_body("fail"))
            .with_object(key.get(), uploaded_at(), "xlsx");

        let decision = seconds_after_upload(3600).resolve(&store, &key).await.unwrap();
        assert_eq!(decision.status_code, StatusCode::Success);
        assert_eq!(decision.message, "Success");
        assert_eq!(decision.state, ReadinessState::Done);
        assert_eq!(
            decision.download_url.as_deref(),
            Some("https://alice-report-service.example/output_sales.csv?ttl=60")
        );
        // Nothing past the output check is read.
        assert_eq!(*store.reads.lock().unwrap(), vec![output_key()]);
    }

    #[tokio::test]
    async fn test_step_state_fail() {
        let key = mock_object_key();
        let store = StubStore::default()
            .with_object(&step_key(), uploaded_at(), mock_step_state_body("fail"))
            .with_object(key.get(), uploaded_at(), "xlsx");

        let decision = seconds_after_upload(5).resolve(&store, &key).await.unwrap();
        assert_eq!(decision.status_code, StatusCode::Fail);
        assert_eq!(decision.message, "Step Function Execution Fail");
        assert_eq!(decision.download_url, None);
        assert_eq!(decision.state, ReadinessState::Failed);
    }

    #[tokio::test]
    async fn test_step_state_in_progress_is_reported_verbatim() {
        let key = mock_object_key();
        for status in ["running", "", "unknown", "FAIL"] {
            let store = StubStore::default()
                .with_object(&step_key(), uploaded_at(), mock_step_state_body(status));

            let decision = seconds_after_upload(3600).resolve(&store, &key).await.unwrap();
            assert_eq!(decision.status_code, StatusCode::Pending, "status {:?}", status);
            assert_eq!(decision.message, format!("Step Function Status => {}", status));
            assert_eq!(decision.download_url, None);
            assert_eq!(decision.state, ReadinessState::Running);
        }
    }

    #[tokio::test]
    async fn test_recent_original_is_pending() {
        let key = mock_object_key();
        let store = StubStore::default().with_object(key.get(), uploaded_at(), "xlsx");

        let decision = seconds_after_upload(30).resolve(&store, &key).await.unwrap();
        assert_eq!(decision.status_code, StatusCode::Pending);
        assert_eq!(decision.message, "Wait Step Function Execute");
        assert_eq!(decision.state, ReadinessState::TriggerWindow);
    }

    #[tokio::test]
    async fn test_window_boundary_is_inclusive() {
        let key = mock_object_key();
        let store = StubStore::default().with_object(key.get(), uploaded_at(), "xlsx");

        let at_boundary = seconds_after_upload(60).resolve(&store, &key).await.unwrap();
        assert_eq!(at_boundary.status_code, StatusCode::Pending);

        let past_boundary = resolver_at(uploaded_at() + TimeDelta::milliseconds(60_001))
            .resolve(&store, &key)
            .await
            .unwrap();
        assert_eq!(past_boundary.status_code, StatusCode::Fail);
    }

    #[tokio::test]
    async fn test_stale_original_asks_for_retry() {
        let key = mock_object_key();
        let store = StubStore::default().with_object(key.get(), uploaded_at(), "xlsx");

        let decision = seconds_after_upload(120).resolve(&store, &key).await.unwrap();
        assert_eq!(decision.status_code, StatusCode::Fail);
        assert_eq!(decision.message, "Please retry fail");
        assert_eq!(decision.state, ReadinessState::Failed);
    }

    #[tokio::test]
    async fn test_nothing_exists_asks_for_retry() {
        let decision = seconds_after_upload(0)
            .resolve(&StubStore::default(), &mock_object_key())
            .await
            .unwrap();
        assert_eq!(decision.status_code, StatusCode::Fail);
        assert_eq!(decision.message, "Please retry fail");
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let key = mock_object_key();
        let store = StubStore::default()
            .with_object(&step_key(), uploaded_at(), mock_step_state_body("running"));
        let resolver = seconds_after_upload(10);

        let first = resolver.resolve(&store, &key).await.unwrap();
        let second = resolver.resolve(&store, &key).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_malformed_step_state_is_an_error() {
        let key = mock_object_key();
        let bodies: [&[u8]; 4] = [b"not json", b"[]", b"{}", br#"{"status": 3}"#];
        for body in bodies {
            let store = StubStore::default()
                .with_object(&step_key(), uploaded_at(), Bytes::copy_from_slice(body))
                .with_object(key.get(), uploaded_at(), "xlsx");

            let err = seconds_after_upload(5).resolve(&store, &key).await.unwrap_err();
            match err {
                ResolveError::MalformedStepState { key, .. } => assert_eq!(key, step_key()),
                other => panic!("expected malformed step state, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_storage_errors_propagate_instead_of_failing() {
        let key = mock_object_key();

        let store = StubStore::default().failing(&output_key());
        let err = seconds_after_upload(5).resolve(&store, &key).await.unwrap_err();
        assert!(matches!(err, ResolveError::Storage(_)), "{:?}", err);

        let store = StubStore::default().failing(key.get());
        let err = seconds_after_upload(5).resolve(&store, &key).await.unwrap_err();
        assert!(matches!(err, ResolveError::Storage(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_presign_failure_is_an_error() {
        let key = mock_object_key();
        let store = StubStore {
            fail_presign: true,
            ..Default::default()
        }
        .with_object(&output_key(), uploaded_at(), "a,b\n");

        let err = seconds_after_upload(5).resolve(&store, &key).await.unwrap_err();
        assert!(
            matches!(err, ResolveError::Storage(BlobError::Presign { .. })),
            "{:?}",
            err
        );
    }

    #[test]
    fn test_classify_follows_precedence() {
        let now = uploaded_at();
        let window = DEFAULT_GRACE_WINDOW;
        assert_eq!(
            classify(&Observation::OutputReady, now, window),
            ReadinessState::Done
        );
        assert_eq!(
            classify(&Observation::StepState(StepStatus::Fail), now, window),
            ReadinessState::Failed
        );
        assert_eq!(
            classify(
                &Observation::StepState(StepStatus::InProgress("running".to_string())),
                now,
                window
            ),
            ReadinessState::Running
        );
        assert_eq!(
            classify(&Observation::Original(ObjectMetadata::new(now)), now, window),
            ReadinessState::TriggerWindow
        );
        assert_eq!(
            classify(&Observation::Nothing, now, window),
            ReadinessState::Failed
        );
    }

    #[tokio::test]
    async fn test_reserved_characters_in_keys_are_found() {
        let provider = MemoryBlobStoreProvider::new();
        let bucket = provider.bucket(TEST_BUCKET).unwrap();
        let key = ObjectKey::from("q1#2 50%_202401011200/q1#2 50%.xlsx");

        bucket.put(key.get(), "xlsx").await.unwrap();
        let uploaded = bucket.head_last_modified(key.get()).await.unwrap();
        let resolver = resolver_at(uploaded + TimeDelta::seconds(10));
        let decision = resolver.resolve(&bucket, &key).await.unwrap();
        assert_eq!(decision.state, ReadinessState::TriggerWindow);

        bucket.put("output_q1#2 50%.csv", "a,b\n").await.unwrap();
        let decision = resolver.resolve(&bucket, &key).await.unwrap();
        assert_eq!(decision.status_code, StatusCode::Success);
        assert_eq!(
            decision.download_url.as_deref(),
            Some("memory://alice-report-service/output_q1%232%2050%25.csv?expires_in=60")
        );
    }

    #[tokio::test]
    async fn test_memory_backend_lifecycle() {
        let provider = MemoryBlobStoreProvider::new();
        let bucket = provider.bucket(TEST_BUCKET).unwrap();
        let key = mock_object_key();

        bucket.put(key.get(), "xlsx").await.unwrap();
        let uploaded = bucket.head_last_modified(key.get()).await.unwrap();
        let resolver = resolver_at(uploaded + TimeDelta::seconds(10));

        let decision = resolver.resolve(&bucket, &key).await.unwrap();
        assert_eq!(decision.state, ReadinessState::TriggerWindow);

        bucket
            .put(&step_key(), mock_step_state_body("running"))
            .await
            .unwrap();
        let decision = resolver.resolve(&bucket, &key).await.unwrap();
        assert_eq!(decision.message, "Step Function Status => running");

        bucket.put(&output_key(), "a,b\n").await.unwrap();
        let decision = resolver.resolve(&bucket, &key).await.unwrap();
        assert_eq!(decision.status_code, StatusCode::Success);
        assert_eq!(
            decision.download_url.as_deref(),
            Some("memory://alice-report-service/output_sales.csv?expires_in=60")
        );
    }
}
