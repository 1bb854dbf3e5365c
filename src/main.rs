use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use clap::{Parser, Subcommand};
use http::{HeaderValue, Method, header};
use tokio::net::TcpListener;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, warn};

use voice_bridge::{
    ServerConfig,
    config::TlsConfig,
    init::{self, InitOptions},
    routes,
    state::AppState,
};

/// Rates at or above this disable the per-IP limiter.
const RATE_LIMIT_DISABLED_AT: u32 = 100_000;

/// Voice bridge - chat, speech-to-text and text-to-speech gateway
#[derive(Parser, Debug)]
#[command(name = "voice-bridge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download the Whisper model to WHISPER_MODEL_PATH
    Init {
        /// Download again even if the model file exists
        #[arg(long)]
        force: bool,

        /// Expected SHA-256 of the model file (hex)
        #[arg(long, value_name = "HEX")]
        sha256: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env must be loaded before the config reads the environment
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    if let Some(Commands::Init { force, sha256 }) = cli.command {
        let options = InitOptions {
            force,
            sha256,
            ..Default::default()
        };
        let path = init::run(&config, &options).await?;
        println!("Whisper model ready at {}", path.display());
        return Ok(());
    }

    let socket_addr: SocketAddr = config
        .address()
        .parse()
        .with_context(|| format!("Invalid server address '{}'", config.address()))?;
    let tls = config.tls.clone();
    let app = build_app(config).await?;

    match tls {
        Some(tls) => serve_tls(app, socket_addr, &tls).await,
        None => {
            info!("Server listening on http://{socket_addr}");
            let listener = TcpListener::bind(&socket_addr).await?;
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await?;
            Ok(())
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            ServerConfig::from_file(path).map_err(|e| anyhow!(e.to_string()))
        }
        None => ServerConfig::from_env().map_err(|e| anyhow!(e.to_string())),
    }
}

/// Shared state, the API routes and the outer middleware stack.
async fn build_app(config: ServerConfig) -> anyhow::Result<Router> {
    let max_upload_bytes = config.max_upload_bytes;
    let cors = cors_layer(config.cors_allowed_origins.as_deref());
    let per_second = config.rate_limit_requests_per_second;
    let burst = config.rate_limit_burst_size;
    let limiter = if per_second < RATE_LIMIT_DISABLED_AT {
        let governor_config = GovernorConfigBuilder::default()
            .per_second(u64::from(per_second))
            .burst_size(burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow!("Invalid rate limit: {per_second}/s with burst {burst}"))?;
        Some(GovernorLayer::new(governor_config))
    } else {
        info!("Rate limiting disabled ({per_second}/s)");
        None
    };

    let state = AppState::new(config)
        .await
        .map_err(|e| anyhow!("Failed to initialize application state: {e}"))?;

    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ));

    Ok(routes::api::create_api_router(max_upload_bytes)
        .with_state(state)
        .layer(cors)
        .layer(tower::util::option_layer(limiter))
        .layer(security_headers))
}

/// `"*"` allows any origin, a comma-separated list allows those origins, and
/// no value keeps the browser's same-origin policy.
fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    match origins {
        Some("*") => base.allow_origin(AllowOrigin::any()),
        Some(list) => {
            let origins: Vec<HeaderValue> = list
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                warn!("CORS_ALLOWED_ORIGINS has no valid origin; cross-origin requests will fail");
            }
            base.allow_origin(origins).allow_credentials(true)
        }
        None => {
            info!("CORS not configured, same-origin requests only");
            base
        }
    }
}

async fn serve_tls(app: Router, addr: SocketAddr, tls: &TlsConfig) -> anyhow::Result<()> {
    let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .with_context(|| {
            format!(
                "Failed to load TLS certificates from {} and {}",
                tls.cert_path.display(),
                tls.key_path.display()
            )
        })?;

    info!("Server listening on https://{addr} (TLS enabled)");
    axum_server::bind_rustls(addr, rustls_config)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("TLS server error")
}
