use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum_server::Handle;
use blob_store::{build_credentials_provider, provider_from_config, StorageBackend};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use tokio::{self, signal};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{
    config::ServerConfig,
    metrics::{api_io_stats, init_provider},
    middleware::InstanceRequestSpan,
    readiness::{DownloadReadinessResolver, SystemClock},
    routes::{create_routes, RouteState},
    upload::UploadUrlMinter,
};

pub struct Service {
    pub config: Arc<ServerConfig>,
    pub route_state: RouteState,
    meter_provider: Option<SdkMeterProvider>,
}

impl Service {
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let config = Arc::new(config);
        let meter_provider = init_provider(
            config.telemetry.enable_metrics,
            config.telemetry.endpoint.as_ref(),
            config.telemetry.metrics_interval,
            &config.instance_id(),
            env!("CARGO_PKG_VERSION"),
        )?;

        // Credentials are resolved once here and handed to the S3 stores;
        // the other backends don't need any.
        let credentials = match &config.blob_storage.backend {
            StorageBackend::S3(_) => {
                Some(build_credentials_provider(&config.blob_storage.credentials).await)
            }
            _ => None,
        };
        let blob_stores = provider_from_config(&config.blob_storage, credentials)
            .context("error initializing blob storage")?;

        let clock = Arc::new(SystemClock);
        let route_state = RouteState {
            blob_stores,
            resolver: Arc::new(DownloadReadinessResolver::new(
                config.readiness.readiness_config(),
                clock.clone(),
            )),
            upload_urls: Arc::new(UploadUrlMinter::new(
                config.readiness.upload_url_ttl(),
                clock,
            )),
            metrics: Arc::new(api_io_stats::Metrics::new()),
        };

        Ok(Self {
            config,
            route_state,
            meter_provider,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        let handle = Handle::new();
        let handle_sh = handle.clone();
        tokio::spawn(async move {
            shutdown_signal(handle_sh).await;
            info!("graceful shutdown signal received, shutting down server gracefully");
        });

        let addr: SocketAddr = self.config.listen_addr.parse()?;
        info!("server api listening on {}", self.config.listen_addr);
        let routes = create_routes(self.route_state.clone()).layer(
            TraceLayer::new_for_http().make_span_with(InstanceRequestSpan::new(
                &self.config.env,
                &self.config.instance_id(),
            )),
        );
        axum_server::bind(addr)
            .handle(handle)
            .serve(routes.into_make_service())
            .await?;

        if let Some(meter_provider) = &self.meter_provider {
            if let Err(err) = meter_provider.shutdown() {
                error!("error shutting down meter provider: {:?}", err);
            }
        }
        Ok(())
    }
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {:?}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("failed to install signal handler: {:?}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
        },
        _ = terminate => {
        },
    }
    handle.graceful_shutdown(None);
    info!("signal received, shutting down server gracefully");
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, Json};
    use data_model::test_objects::tests::{TEST_BUCKET, TEST_OBJECT_KEY};

    use crate::{http_objects::DownloadUrlRequest, routes::download_url, testing::TestService};

    #[tokio::test]
    async fn test_service_wires_memory_backend() {
        let test_service = TestService::new().await.unwrap();
        let Json(decision) = download_url(
            State(test_service.service.route_state.clone()),
            Ok(Json(DownloadUrlRequest {
                bucket_name: TEST_BUCKET.to_string(),
                file_name: TEST_OBJECT_KEY.to_string(),
            })),
        )
        .await
        .unwrap();
        assert_eq!(decision.status_code, -1);
        assert_eq!(decision.message, "Please retry fail");
    }
}
