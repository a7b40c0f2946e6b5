//! MinIO Dynamic Volume Provisioner
//!
//! Bootstrap for the provisioner binary: flag parsing, logging, health
//! endpoint, Kubernetes client construction, and controller startup.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use minio_provisioner::{
    Error, MinioProvisioner, ProvisionerConfig, Result, S3cmdClient, S3cmdConfig,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// MinIO Dynamic Volume Provisioner for s3fs-mounted buckets
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Name of the provisioner. Only claims annotated with this name are
    /// provisioned by this instance
    #[arg(long, env = "PROVISIONER_NAME", default_value = "s3fs.minio.com")]
    provisioner: String,

    /// Identity stamped on provisioned volumes. Defaults to
    /// <provisioner>-<pid> when unset
    #[arg(long, env = "PROVISIONER_IDENTITY")]
    identity: Option<String>,

    /// MinIO endpoint URL recorded on provisioned volumes
    #[arg(long, env = "MINIO_URL", default_value = "")]
    minio_url: String,

    /// MinIO access credential recorded on provisioned volumes
    #[arg(long, env = "MINIO_KEY", default_value = "")]
    minio_key: String,

    /// Path to the s3cmd binary
    #[arg(long, env = "S3CMD_PATH", default_value = "/usr/bin/s3cmd")]
    s3cmd_path: String,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    let config = ProvisionerConfig {
        provisioner_name: args.provisioner.clone(),
        identity: args
            .identity
            .clone()
            .unwrap_or_else(|| format!("{}-{}", args.provisioner, std::process::id())),
        minio_url: args.minio_url.clone(),
        minio_key: args.minio_key.clone(),
    };
    config.validate()?;

    info!("Starting MinIO Dynamic Volume Provisioner");
    info!("  Version: {}", minio_provisioner::VERSION);
    info!("  Provisioner: {}", config.provisioner_name);
    info!("  Identity: {}", config.identity);
    info!("  MinIO URL: {}", config.minio_url);
    info!("  s3cmd: {}", args.s3cmd_path);

    let client = kube::Client::try_default().await?;

    // Start health server
    let health_addr = args.health_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr).await {
            error!("Health server error: {}", e);
        }
    });

    let buckets = Arc::new(S3cmdClient::new(S3cmdConfig {
        binary: args.s3cmd_path.clone(),
        ..Default::default()
    }));
    let provisioner = Arc::new(MinioProvisioner::new(config, buckets));

    info!("Starting claim and volume controllers");
    minio_provisioner::controller::run(client, provisioner).await?;

    info!("Provisioner shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("kube=info".parse().unwrap());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Health Server
// =============================================================================

async fn run_health_server(addr: &str) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Response, Server, StatusCode};

    let make_svc = make_service_fn(|_conn| async {
        Ok::<_, std::convert::Infallible>(service_fn(|req: Request<Body>| async move {
            let response = match req.uri().path() {
                "/healthz" | "/livez" => Response::builder()
                    .status(StatusCode::OK)
                    .body(Body::from("ok"))
                    .unwrap(),
                "/readyz" => Response::builder()
                    .status(StatusCode::OK)
                    .body(Body::from("ok"))
                    .unwrap(),
                _ => Response::builder()
                    .status(StatusCode::NOT_FOUND)
                    .body(Body::from("not found"))
                    .unwrap(),
            };
            Ok::<_, std::convert::Infallible>(response)
        }))
    });

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Internal(format!("Invalid health server address: {}", e)))?;

    info!("Health server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Health server error: {}", e)))?;

    Ok(())
}
