use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing_subscriber::EnvFilter;

mod error;
mod handlers;
mod logic;
mod pages;
mod state;
mod storage;

use crate::handlers::{create_comment, delete_comment, list_comments, ping_handler, update_comment};
use crate::pages::flush_dirty_pages;
use crate::state::AppState;
use crate::storage::{FileStorage, S3Storage, S3StorageConfig, Storage};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Directory holding one `<page>.bin` file per page. Ignored when `--s3-bucket` is set.
    #[arg(long, env = "NOTEPIN_DATA_DIR")]
    data_dir: Option<PathBuf>,
    #[arg(long, env = "NOTEPIN_PUBLIC_DIR")]
    public_dir: Option<PathBuf>,
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,
    #[arg(long, default_value_t = 60)]
    flush_interval_secs: u64,
    #[arg(long, env = "NOTEPIN_S3_BUCKET")]
    s3_bucket: Option<String>,
    #[arg(long, env = "NOTEPIN_S3_PREFIX")]
    s3_prefix: Option<String>,
    #[arg(long, env = "NOTEPIN_S3_REGION")]
    s3_region: Option<String>,
    #[arg(long, env = "NOTEPIN_S3_ENDPOINT")]
    s3_endpoint: Option<String>,
    #[arg(long)]
    s3_force_path_style: bool,
    #[arg(long, env = "NOTEPIN_S3_ACCESS_KEY_ID")]
    s3_access_key_id: Option<String>,
    #[arg(long, env = "NOTEPIN_S3_SECRET_ACCESS_KEY", hide_env_values = true)]
    s3_secret_access_key: Option<String>,
    #[arg(long, requires = "tls_key")]
    tls_cert: Option<PathBuf>,
    #[arg(long, requires = "tls_cert")]
    tls_key: Option<PathBuf>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

async fn build_storage(args: &Args) -> std::io::Result<Arc<dyn Storage>> {
    if let Some(bucket) = args.s3_bucket.clone() {
        let config = S3StorageConfig {
            prefix: args.s3_prefix.clone(),
            region: args.s3_region.clone(),
            endpoint_url: args.s3_endpoint.clone(),
            force_path_style: args.s3_force_path_style,
            access_key_id: args.s3_access_key_id.clone(),
            secret_access_key: args.s3_secret_access_key.clone(),
            ..S3StorageConfig::new(bucket)
        };
        tracing::info!("storing pages in s3 bucket {}", config.bucket);
        return Ok(Arc::new(S3Storage::new(config).await));
    }
    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../data"));
    tokio::fs::create_dir_all(&data_dir).await?;
    tracing::info!("storing pages in {}", data_dir.display());
    Ok(Arc::new(FileStorage::new(data_dir)))
}

fn router(state: AppState, public_dir: PathBuf) -> Router {
    let api = Router::new()
        .route(
            "/pages/:page/comments",
            get(list_comments).post(create_comment),
        )
        .route(
            "/pages/:page/comments/:id",
            axum::routing::patch(update_comment).delete(delete_comment),
        )
        .route("/ping", get(ping_handler))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));
    Router::new()
        .nest("/api", api)
        .fallback_service(ServeDir::new(public_dir).append_index_html_on_directories(true))
        .with_state(state)
}

async fn shutdown_signal(handle: axum_server::Handle) {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {error}");
        return;
    }
    tracing::info!("shutting down");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_logging();
    let args = Args::parse();

    let state = AppState::new(build_storage(&args).await?);
    let public_dir = args
        .public_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../public"));
    let app = router(state.clone(), public_dir);

    let flush_state = state.clone();
    let flush_every = Duration::from_secs(args.flush_interval_secs.max(1));
    let flusher = tokio::spawn(async move {
        let mut interval = tokio::time::interval(flush_every);
        loop {
            interval.tick().await;
            flush_dirty_pages(&flush_state).await;
        }
    });

    let handle = axum_server::Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    match (&args.tls_cert, &args.tls_key) {
        (Some(cert), Some(key)) => {
            let config = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key).await?;
            tracing::info!("notepin running at https://localhost:{}", args.port);
            axum_server::bind_rustls(addr, config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        _ => {
            tracing::info!("notepin running at http://localhost:{}", args.port);
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    flusher.abort();
    let written = flush_dirty_pages(&state).await;
    tracing::info!("flushed {written} pages before exit");
    Ok(())
}
