use std::{net::SocketAddr, path::Path, time::Duration};

use anyhow::{anyhow, Result};
use blob_store::{BlobStorageConfig, StorageBackend, MAX_PRESIGN_EXPIRY};
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    readiness::ReadinessConfig,
    upload::DEFAULT_UPLOAD_URL_TTL,
};

const LOCAL_ENV: &str = "local";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_env")]
    pub env: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub blob_storage: BlobStorageConfig,
    #[serde(default)]
    pub readiness: ReadinessSettings,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            env: default_env(),
            listen_addr: default_listen_addr(),
            blob_storage: Default::default(),
            readiness: Default::default(),
            telemetry: Default::default(),
        }
    }
}

fn default_env() -> String {
    LOCAL_ENV.to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:8900".to_string()
}

impl ServerConfig {
    pub fn from_path(path: &Path) -> Result<ServerConfig> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("unable to read config {}: {}", path.display(), e))?;
        Self::from_yaml_str(&config_str)
    }

    fn from_yaml_str(config_str: &str) -> Result<ServerConfig> {
        let config: ServerConfig = Figment::new().merge(Yaml::string(config_str)).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(anyhow!("invalid listen address: {}", self.listen_addr));
        }
        match &self.blob_storage.backend {
            StorageBackend::S3(options) if options.region.is_empty() => {
                return Err(anyhow!("s3 blob storage requires a region"));
            }
            StorageBackend::Local(options) if options.root.is_empty() => {
                return Err(anyhow!("local blob storage requires a root directory"));
            }
            _ => {}
        }
        self.readiness.validate()?;
        Ok(())
    }

    pub fn structured_logging(&self) -> bool {
        self.env != LOCAL_ENV
    }

    pub fn instance_id(&self) -> String {
        self.telemetry
            .instance_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.env, Uuid::new_v4()))
    }
}

/// Timing knobs, all in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadinessSettings {
    #[serde(default = "default_sixty")]
    pub grace_window_secs: u64,
    #[serde(default = "default_sixty")]
    pub download_url_ttl_secs: u64,
    #[serde(default = "default_sixty")]
    pub upload_url_ttl_secs: u64,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            grace_window_secs: 60,
            download_url_ttl_secs: 60,
            upload_url_ttl_secs: DEFAULT_UPLOAD_URL_TTL.as_secs(),
        }
    }
}

fn default_sixty() -> u64 {
    60
}

impl ReadinessSettings {
    fn validate(&self) -> Result<()> {
        for (name, secs) in [
            ("download_url_ttl_secs", self.download_url_ttl_secs),
            ("upload_url_ttl_secs", self.upload_url_ttl_secs),
        ] {
            if secs == 0 || Duration::from_secs(secs) > MAX_PRESIGN_EXPIRY {
                return Err(anyhow!(
                    "readiness.{} must be between 1 and {} seconds, got {}",
                    name,
                    MAX_PRESIGN_EXPIRY.as_secs(),
                    secs
                ));
            }
        }
        Ok(())
    }

    pub fn readiness_config(&self) -> ReadinessConfig {
        ReadinessConfig {
            grace_window: Duration::from_secs(self.grace_window_secs),
            download_url_ttl: Duration::from_secs(self.download_url_ttl_secs),
        }
    }

    pub fn upload_url_ttl(&self) -> Duration {
        Duration::from_secs(self.upload_url_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    // Export metrics over OTLP.
    #[serde(default)]
    pub enable_metrics: bool,
    // Export spans over OTLP.
    #[serde(default)]
    pub enable_tracing: bool,
    // OpenTelemetry collector grpc endpoint for both traces and metrics.
    // Defaults to OTEL_EXPORTER_OTLP_ENDPOINT or localhost:4317 if empty.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(with = "duration_serde", default = "default_metrics_interval")]
    pub metrics_interval: Duration,
    // Used as the metric attribute "download_gate.instance.id".
    #[serde(default)]
    pub instance_id: Option<String>,
}

fn default_metrics_interval() -> Duration {
    Duration::from_secs(10)
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enable_metrics: false,
            enable_tracing: false,
            endpoint: None,
            metrics_interval: default_metrics_interval(),
            instance_id: None,
        }
    }
}

mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(seconds))
    }
}
