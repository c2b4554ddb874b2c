// Server module: RPC listener, worker pool, health and shutdown

mod health;
mod ipc;
mod signals;

pub use health::HealthReporter;
pub use ipc::{
    read_frame, write_frame, HealthResponse, IpcClient, RetrieveRequest, RetrieveResponse,
    RpcRequest, RpcResponse, ServingStatus,
};
pub use signals::{ShutdownSignal, SignalHandler};

use crate::cache::CacheManager;
use crate::config::{Config, ServerConfig};
use crate::embedding::{FastEmbedSparseEmbedder, HybridEmbedder, JinaDenseEmbedder};
use crate::error::{BookSearchError, ErrorCode, Result};
use crate::query::LlmFilterExtractor;
use crate::retrieval::{FastEmbedCrossEncoder, FusedRetriever, HybridSearcher, Reranker};
use crate::vector_store::QdrantStore;
use std::future::Future;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::Instrument;

/// Owns the searcher and serves it over TCP
pub struct Server {
    searcher: Arc<HybridSearcher>,
    health: HealthReporter,
    config: ServerConfig,
}

impl Server {
    pub fn new(searcher: Arc<HybridSearcher>, config: ServerConfig) -> Self {
        Self {
            searcher,
            health: HealthReporter::new(),
            config,
        }
    }

    /// Build every collaborator from configuration.
    ///
    /// Models are loaded and the collection is checked here, so a server that
    /// starts is ready to answer.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let dense = JinaDenseEmbedder::from_config(&config.dense)
            .map_err(|e| BookSearchError::Startup(e.to_string()))?;

        let sparse_model = config.sparse.model.clone();
        let sparse = tokio::task::spawn_blocking(move || FastEmbedSparseEmbedder::new(&sparse_model))
            .await
            .map_err(|e| BookSearchError::Startup(format!("Sparse model task failed: {}", e)))?
            .map_err(|e| BookSearchError::Startup(e.to_string()))?;

        let reranker_model = config.reranker.model.clone();
        let cross_encoder =
            tokio::task::spawn_blocking(move || FastEmbedCrossEncoder::new(&reranker_model))
                .await
                .map_err(|e| BookSearchError::Startup(format!("Reranker task failed: {}", e)))?
                .map_err(|e| BookSearchError::Startup(e.to_string()))?;

        let store = QdrantStore::from_config(&config.vector_store)
            .map_err(|e| BookSearchError::Startup(e.to_string()))?;
        store
            .ensure_collection()
            .await
            .map_err(|e| BookSearchError::Startup(e.to_string()))?;

        let extractor = LlmFilterExtractor::from_config(&config.extraction)
            .map_err(|e| BookSearchError::Startup(e.to_string()))?;

        let cache_store = CacheManager::store_from_config(&config.cache)
            .map_err(|e| BookSearchError::Startup(e.to_string()))?;
        let cache = CacheManager::from_config(cache_store, &config.cache);
        if !cache.is_available().await {
            tracing::warn!(
                "Cache store at {} unreachable, serving without cache until it returns",
                config.cache.redis_url
            );
        }

        let retriever = FusedRetriever::new(
            HybridEmbedder::new(Arc::new(dense), Arc::new(sparse)),
            Arc::new(store),
        );

        let searcher = HybridSearcher::new(
            Arc::new(extractor),
            retriever,
            Reranker::new(Arc::new(cross_encoder)),
            cache,
            config.retrieval.clone(),
        );

        Ok(Self::new(Arc::new(searcher), config.server.clone()))
    }

    pub fn health(&self) -> HealthReporter {
        self.health.clone()
    }

    /// Bind the configured address and serve until SIGTERM, SIGINT or SIGHUP
    pub async fn run(&self) -> Result<()> {
        let mut signal_handler = SignalHandler::new()?;

        let listener = TcpListener::bind(&self.config.listen_addr)
            .await
            .map_err(|e| BookSearchError::Io {
                source: e,
                context: format!("Failed to bind to {}", self.config.listen_addr),
            })?;

        self.serve_with_shutdown(listener, async move {
            let signal = signal_handler.wait().await;
            tracing::info!("Shutdown signal received: {:?}", signal);
        })
        .await
    }

    /// Accept connections on `listener` until `shutdown` completes.
    ///
    /// At most `max_workers` connections are handled at once; the rest wait
    /// in the listener backlog. In-flight handlers are left to finish.
    pub async fn serve_with_shutdown<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let workers = Arc::new(Semaphore::new(self.config.max_workers));
        tokio::pin!(shutdown);

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                "Server listening on {} with {} workers",
                addr,
                self.config.max_workers
            );
        }
        self.health.set_serving(true);

        loop {
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = Arc::clone(&workers).acquire_owned() => permit
                    .map_err(|e| BookSearchError::Server(format!("Worker pool closed: {}", e)))?,
            };

            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };

            let searcher = Arc::clone(&self.searcher);
            let health = self.health.clone();
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = handle_client(stream, &searcher, &health).await {
                    tracing::error!("Client handler error ({}): {}", peer, e);
                }
            });
        }

        self.health.set_serving(false);
        tracing::info!("Server stopped accepting connections");
        Ok(())
    }
}

async fn handle_client(
    mut stream: TcpStream,
    searcher: &HybridSearcher,
    health: &HealthReporter,
) -> Result<()> {
    let response = match read_frame::<RpcRequest, _>(&mut stream).await {
        Ok(request) => dispatch(request, searcher, health).await,
        Err(BookSearchError::Json { source, .. }) => {
            RpcResponse::error(ErrorCode::InvalidArgument, format!("Malformed request: {}", source))
        }
        Err(e) => return Err(e),
    };

    write_frame(&mut stream, &response).await
}

async fn dispatch(
    request: RpcRequest,
    searcher: &HybridSearcher,
    health: &HealthReporter,
) -> RpcResponse {
    match request {
        RpcRequest::Health => RpcResponse::ok(&HealthResponse {
            status: health.status(),
        }),
        RpcRequest::Retrieve(retrieve) => {
            let request_id = uuid::Uuid::new_v4();
            let span = tracing::info_span!("retrieve", %request_id);
            handle_retrieve(retrieve, searcher).instrument(span).await
        }
    }
}

async fn handle_retrieve(request: RetrieveRequest, searcher: &HybridSearcher) -> RpcResponse {
    tracing::info!("Retrieve request: {:?}", request);

    if request.query.trim().is_empty() {
        return RpcResponse::ok(&RetrieveResponse::default());
    }

    match searcher.search_with_filter(&request.into()).await {
        Ok(response) => RpcResponse::ok(&RetrieveResponse::from(&response)),
        Err(e) => {
            tracing::error!("Retrieve failed: {}", e);
            RpcResponse::error(e.code(), e.to_string())
        }
    }
}
