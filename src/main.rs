use std::path::PathBuf;

use ::tracing::{error, info_span};
use clap::Parser;
use service::Service;

mod config;
mod http_objects;
mod metrics;
mod middleware;
mod readiness;
mod routes;
mod service;
mod tracing;
mod upload;
use tracing::setup_tracing;

#[cfg(test)]
mod testing;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "config file", help = "Path to config file")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => match config::ServerConfig::from_path(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("error loading config: {:?}", err);
                std::process::exit(1);
            }
        },
        None => config::ServerConfig::default(),
    };

    let tracing_provider = match setup_tracing(&config) {
        Ok(provider) => provider,
        Err(err) => {
            eprintln!("error setting up tracing: {:?}", err);
            std::process::exit(1);
        }
    };

    let root_span = info_span!(
        "download-gate",
        env = config.env,
        "download-gate-instance" = config.instance_id()
    );
    let _guard = root_span.enter();

    match Service::new(config).await {
        Ok(mut service) => {
            if let Err(err) = service.start().await {
                error!("Error starting service: {:?}", err);
            }
        }
        Err(err) => error!("Error creating service: {:?}", err),
    }

    // export traces before shutdown
    if let Some(tracer_provider) = tracing_provider {
        if let Err(err) = tracer_provider.force_flush() {
            error!("Error flushing traces: {:?}", err);
        }
        if let Err(err) = tracer_provider.shutdown() {
            error!("Error shutting down tracer provider: {:?}", err);
        }
    }
}
