mod core;
mod features;
mod modules;
mod shared;

use crate::core::config::{Config, MediaConfig, MetadataBackend};
use crate::core::database;
use crate::core::middleware;
use crate::core::openapi::ApiDoc;
use crate::features::favorites::{routes as favorites_routes, FavoriteService};
use crate::features::files::{
    routes as files_routes, DownloadService, FileService, FileState, ListingService,
    UploadService,
};
use crate::features::stats::{routes as stats_routes, StatsService};
use crate::modules::metadata::{MemoryMetadataStore, MetadataStore, PgMetadataStore};
use crate::modules::storage::{MinIOClient, PresignedUrlIssuer};
use axum::{middleware::from_fn, Router};
use std::sync::Arc;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Every service the HTTP layer dispatches to
pub struct AppServices {
    pub files: FileState,
    pub favorites: Arc<FavoriteService>,
    pub stats: Arc<StatsService>,
}

/// Wire services over one metadata store and one URL issuer
pub fn build_services(
    store: Arc<dyn MetadataStore>,
    issuer: Arc<dyn PresignedUrlIssuer>,
    media: Arc<MediaConfig>,
) -> AppServices {
    let files = FileState {
        upload_service: Arc::new(UploadService::new(
            Arc::clone(&store),
            Arc::clone(&issuer),
            Arc::clone(&media),
        )),
        download_service: Arc::new(DownloadService::new(
            Arc::clone(&store),
            Arc::clone(&issuer),
            Arc::clone(&media),
        )),
        listing_service: Arc::new(ListingService::new(Arc::clone(&store), Arc::clone(&media))),
        file_service: Arc::new(FileService::new(
            Arc::clone(&store),
            Arc::clone(&issuer),
            Arc::clone(&media),
        )),
    };

    AppServices {
        files,
        favorites: Arc::new(FavoriteService::new(
            Arc::clone(&store),
            Arc::clone(&issuer),
            Arc::clone(&media),
        )),
        stats: Arc::new(StatsService::new(store, media)),
    }
}

/// API routes behind the identity middleware
pub fn api_router(services: AppServices) -> Router {
    Router::new()
        .merge(files_routes::routes(services.files))
        .merge(favorites_routes::routes(services.favorites))
        .merge(stats_routes::routes(services.stats))
        .route_layer(from_fn(middleware::identity_middleware))
}

fn main() -> anyhow::Result<()> {
    // Build Tokio runtime with configurable worker threads
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .max_blocking_threads(worker_threads * 4)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(worker_threads))
}

async fn async_main(worker_threads: usize) -> anyhow::Result<()> {
    // Load .env file BEFORE initializing logger so RUST_LOG is available
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    let available_cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);
    tracing::info!(
        "System info: available_cpus={}, tokio_worker_threads={}, pid={}",
        available_cpus,
        worker_threads,
        std::process::id()
    );

    tracing::info!("Configuration loaded successfully");

    let store: Arc<dyn MetadataStore> = match config.database.backend {
        MetadataBackend::Postgres => {
            let pool = database::create_pool(&config.database).await?;
            Arc::new(PgMetadataStore::new(pool))
        }
        MetadataBackend::Memory => {
            tracing::warn!("Using in-memory metadata store; nothing will persist");
            Arc::new(MemoryMetadataStore::new())
        }
    };

    let minio_client = MinIOClient::new(config.minio.clone())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize MinIO client: {}", e))?;
    tracing::info!(
        "MinIO client initialized for bucket: {}",
        minio_client.bucket_name()
    );
    let issuer: Arc<dyn PresignedUrlIssuer> = Arc::new(minio_client);

    let media = Arc::new(config.media.clone());
    tracing::info!(
        "Media limits: max_file_size={}, storage_quota={}, thumbnails={}, batch_concurrency={}",
        media.max_file_size,
        media.storage_quota_bytes,
        media.thumbnails_enabled,
        media.batch_concurrency
    );

    let services = build_services(store, issuer, media);
    tracing::info!("Services initialized");

    let swagger =
        Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // Simple health check endpoint (no identity required)
    async fn health_check() -> axum::http::StatusCode {
        axum::http::StatusCode::OK
    }
    let health_route = Router::new().route("/health", axum::routing::get(health_check));

    let app = Router::new()
        .merge(swagger)
        .merge(api_router(services))
        .merge(health_route)
        .layer(middleware::cors_layer(
            config.app.cors_allowed_origins.clone(),
        ))
        // Propagate X-Request-Id to response headers
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::MakeSpanWithRequestId)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Generate X-Request-Id using UUID v7 (or use client-provided one)
        .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid));

    // Start server
    let addr = config.app.server_address();
    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

    // Use socket2 for TCP listener configuration
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(socket_addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nodelay(true)?;

    #[cfg(target_os = "linux")]
    {
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(std::time::Duration::from_secs(60))
            .with_interval(std::time::Duration::from_secs(10))
            .with_retries(3);
        socket.set_tcp_keepalive(&keepalive)?;
    }
    #[cfg(not(target_os = "linux"))]
    {
        let keepalive = socket2::TcpKeepalive::new().with_time(std::time::Duration::from_secs(60));
        socket.set_tcp_keepalive(&keepalive)?;
    }

    socket.set_nonblocking(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(1024)?;

    let listener = tokio::net::TcpListener::from_std(socket.into())?;
    tracing::info!("Server listening on {}", format!("http://{}", addr));
    tracing::info!(
        "Swagger UI available at {}",
        format!("http://{}/swagger-ui/", addr)
    );

    axum::serve(listener, app).await?;

    Ok(())
}
