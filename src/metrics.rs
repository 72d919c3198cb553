use std::time::Duration;

use anyhow::Result;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{MetricExporter, WithExportConfig};
use opentelemetry_sdk::{
    metrics::{PeriodicReader, SdkMeterProvider},
    Resource,
};

/// Install the global meter provider. Instruments created while metrics are
/// disabled fall back to the no-op provider.
pub fn init_provider(
    enable_metrics: bool,
    endpoint: Option<&String>,
    interval: Duration,
    instance_id: &str,
    service_version: &str,
) -> Result<Option<SdkMeterProvider>> {
    if !enable_metrics {
        return Ok(None);
    }

    let resource = Resource::builder()
        .with_attribute(KeyValue::new("service.namespace", "download-gate"))
        .with_attribute(KeyValue::new("service.name", "download-gate-server"))
        .with_attribute(KeyValue::new(
            "download_gate.instance.id",
            instance_id.to_string(),
        ))
        .with_attribute(KeyValue::new(
            "service.version",
            service_version.to_string(),
        ))
        .build();

    let mut exporter = MetricExporter::builder().with_tonic();
    if let Some(endpoint) = endpoint {
        exporter = exporter.with_endpoint(endpoint.to_owned());
    }
    let exporter = exporter.build()?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(interval)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build();

    opentelemetry::global::set_meter_provider(provider.clone());
    Ok(Some(provider))
}

pub mod api_io_stats {
    use opentelemetry::{metrics::Counter, KeyValue};

    #[derive(Debug)]
    pub struct Metrics {
        pub requests: Counter<u64>,
        pub decisions: Counter<u64>,
        pub upload_urls: Counter<u64>,
    }

    impl Default for Metrics {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Metrics {
        pub fn new() -> Metrics {
            let meter = opentelemetry::global::meter("service-api");
            let requests = meter
                .u64_counter("download_gate.requests")
                .with_description("number of API requests by route")
                .build();
            let decisions = meter
                .u64_counter("download_gate.decisions")
                .with_description("number of readiness decisions by status")
                .build();
            let upload_urls = meter
                .u64_counter("download_gate.upload_urls")
                .with_description("number of presigned upload urls minted")
                .build();
            Metrics {
                requests,
                decisions,
                upload_urls,
            }
        }

        pub fn record_request(&self, route: &'static str) {
            self.requests.add(1, &[KeyValue::new("route", route)]);
        }
    }
}
