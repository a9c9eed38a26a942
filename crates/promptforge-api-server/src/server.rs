// ABOUTME: Axum application assembly — router, middleware stack, graceful shutdown
use crate::config::ApiServerConfig;
use crate::middleware::{cors, logging, rate_limit};
use crate::models::errors::ApiError;
use crate::routes::{cache, health, queue};
use anyhow::Result;
use axum::{routing::get, Router};
use promptforge_core::config::ConfigBuilder;
use promptforge_core::{
    Cache, CacheConfig, HttpOptimizerClient, JobQueue, OptimizationPipeline, OptimizerClient, OptimizerConfig,
    PipelineConfig, QueueConfig, TemplateEngine,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    request_id::{MakeRequestUuid, SetRequestIdLayer},
};
use tracing::{error, info, instrument};

/// Shared state handed to every route handler. Cheap to clone: every field
/// is an `Arc` or an already-`Clone` handle.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TemplateEngine>,
    pub queue: Arc<JobQueue>,
    pub render_cache: Arc<Cache<String>>,
}

pub struct ApiServer {
    config: ApiServerConfig,
    app: Router,
}

impl ApiServer {
    #[instrument(skip(config))]
    pub async fn new(config: ApiServerConfig) -> Result<Self> {
        info!(host = %config.host, port = config.port, "initializing API server");

        let settings = ConfigBuilder::new().with_env().build()?;
        let engine = Arc::new(TemplateEngine::new());

        let optimizer_config = OptimizerConfig {
            timeout: Duration::from_millis(settings.timeout_ms),
            max_retries: settings.retries,
            ..OptimizerConfig::new(settings.service_url.clone(), settings.api_key.clone().unwrap_or_default())
        };
        let optimizer: Arc<dyn OptimizerClient> = Arc::new(HttpOptimizerClient::new(optimizer_config)?);
        let render_cache = Arc::new(Cache::new(CacheConfig {
            max_entries: settings.cache.max_size,
            ttl: Duration::from_secs(settings.cache.ttl_secs),
        }));
        let pipeline = Arc::new(
            OptimizationPipeline::new(
                engine.clone(),
                optimizer,
                PipelineConfig {
                    min_confidence: Some(settings.min_confidence),
                    ..PipelineConfig::default()
                },
            )
            .with_cache(render_cache.clone()),
        );
        let queue = Arc::new(JobQueue::new(
            pipeline,
            QueueConfig {
                max_concurrency: config.max_concurrency,
                ..QueueConfig::default()
            },
        ));

        let state = AppState {
            engine,
            queue,
            render_cache,
        };
        let rate_limit_settings = settings.rate_limiting.clone();
        let app = Self::build_router(state, &rate_limit_settings);

        Ok(Self { config, app })
    }

    fn build_router(state: AppState, rate_limit_settings: &promptforge_core::config::RateLimitSettings) -> Router {
        Router::new()
            .route("/health", get(health::health_check))
            .route("/cache/stats", get(cache::get_cache_stats))
            .route("/queue/stats", get(queue::get_queue_stats))
            .fallback(Self::handle_404)
            .with_state(state)
            .layer(CompressionLayer::new())
            .layer(cors::create_cors_layer())
            .layer(logging::create_trace_layer::<axum::body::Body>())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(CatchPanicLayer::new())
            .layer(rate_limit::create_rate_limit_layer(rate_limit_settings))
    }

    async fn handle_404() -> ApiError {
        ApiError::NotFound {
            resource: "the requested endpoint".to_string(),
        }
    }

    #[instrument(skip(self))]
    pub async fn run(self) -> Result<()> {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(bind_addr, "server listening");

        let shutdown_signal = async {
            let ctrl_c = async {
                tokio::signal::ctrl_c().await.expect("failed to install CTRL+C handler");
            };

            #[cfg(unix)]
            let terminate = async {
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to install SIGTERM handler")
                    .recv()
                    .await;
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => info!("received SIGINT"),
                _ = terminate => info!("received SIGTERM"),
            }
        };

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| {
                error!(error = %e, "server error");
                e
            })?;
        info!("server shutdown complete");
        Ok(())
    }
}

/// Builds an `AppState` wired to an unreachable optimizer backend, for route
/// unit tests that only exercise the stats-reporting endpoints.
#[cfg(test)]
pub fn test_state() -> AppState {
    use promptforge_types::NetworkError;

    let engine = Arc::new(TemplateEngine::new());
    struct Unreachable;
    #[async_trait::async_trait]
    impl OptimizerClient for Unreachable {
        async fn optimize(
            &self,
            _request: &promptforge_types::OptimizationRequest,
        ) -> Result<promptforge_types::OptimizationResult, promptforge_types::ForgeError> {
            Err(NetworkError::Unreachable("test backend".to_string()).into())
        }
    }
    let optimizer: Arc<dyn OptimizerClient> = Arc::new(Unreachable);
    let pipeline = Arc::new(OptimizationPipeline::new(engine.clone(), optimizer, PipelineConfig::default()));
    let queue = Arc::new(JobQueue::new(pipeline, QueueConfig::default()));
    let render_cache = Arc::new(Cache::new(CacheConfig::default()));
    AppState {
        engine,
        queue,
        render_cache,
    }
}
