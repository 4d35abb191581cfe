//! draft-genie service entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use genie::bucket::BucketReassigner;
use genie::config::Config;
use genie::constants::CORRECTION_VECTOR_COLLECTION;
use genie::drafts::{DraftStore, HttpDraftStore, MemoryDraftStore};
use genie::embedding::HashingEmbedder;
use genie::evaluation::EvaluationEngine;
use genie::events::InProcessBus;
use genie::gateway::{AppState, create_router};
use genie::pipeline::PipelineWorker;
use genie::rag::{GenaiBackend, RagOrchestrator};
use genie::registry::{HttpSpeakerRegistry, MemorySpeakerRegistry, SpeakerRegistry};
use genie::store::{FsEvaluationStore, FsNoteStore, FsTransitionLog, FsVectorStore};
use genie::vector::CorrectionVectorBuilder;
use genie::vectordb::QdrantVectorIndex;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        model = %config.model,
        data_path = %config.data_path.display(),
        "draft-genie starting"
    );

    tokio::fs::create_dir_all(&config.data_path).await?;

    let registry: Arc<dyn SpeakerRegistry> = match &config.registry_url {
        Some(url) => Arc::new(HttpSpeakerRegistry::new(url)?),
        None => {
            tracing::warn!(
                "No GENIE_REGISTRY_URL configured, using an empty in-memory registry"
            );
            Arc::new(MemorySpeakerRegistry::new())
        }
    };
    let drafts: Arc<dyn DraftStore> = match &config.draft_store_url {
        Some(url) => Arc::new(HttpDraftStore::new(url)?),
        None => {
            tracing::warn!(
                "No GENIE_DRAFT_STORE_URL configured, using an empty in-memory draft store"
            );
            Arc::new(MemoryDraftStore::new())
        }
    };

    let vectors = Arc::new(FsVectorStore::new(&config.data_path));
    let notes = Arc::new(FsNoteStore::new(&config.data_path));
    let evaluations = Arc::new(FsEvaluationStore::new(&config.data_path));
    let transitions = Arc::new(FsTransitionLog::new(&config.data_path));

    let embedder = Arc::new(HashingEmbedder::new(config.embedding_dim)?);
    let index = Arc::new(
        QdrantVectorIndex::connect(
            &config.qdrant_url,
            CORRECTION_VECTOR_COLLECTION,
            config.embedding_dim as u64,
        )
        .await?,
    );
    let backend = Arc::new(GenaiBackend::new(config.model.clone()));

    let (bus, stream) = InProcessBus::new(config.event_buffer);
    let bus = Arc::new(bus);

    let builder = CorrectionVectorBuilder::new(
        config.builder,
        embedder.clone(),
        vectors.clone(),
        index.clone(),
        drafts.clone(),
        bus.clone(),
    );
    let orchestrator = RagOrchestrator::new(
        config.orchestrator.clone(),
        registry.clone(),
        drafts.clone(),
        vectors,
        notes.clone(),
        index,
        embedder.clone(),
        backend,
        bus.clone(),
    );
    let engine = EvaluationEngine::new(
        config.evaluation,
        registry.clone(),
        drafts,
        notes.clone(),
        evaluations.clone(),
        embedder,
        bus.clone(),
    );

    let mut worker = PipelineWorker::new(builder, orchestrator, engine, notes, evaluations)
        .with_concurrency(config.worker_concurrency);
    if config.auto_apply_buckets {
        tracing::info!("Bucket proposals will be applied automatically");
        worker = worker.with_auto_apply(BucketReassigner::new(registry, transitions));
    }

    let shutdown = CancellationToken::new();
    let worker_handle = tokio::spawn(worker.run(stream, shutdown.clone()));

    let app = create_router(AppState::new(bus, config.data_path.clone(), shutdown.clone()));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = worker_handle.await {
        tracing::error!(error = %e, "Pipeline worker panicked");
    }

    tracing::info!("draft-genie shutdown complete");
    Ok(())
}

fn run_health_check() -> i32 {
    let port = std::env::var(Config::ENV_PORT)
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let url = format!("http://127.0.0.1:{}/healthz", port);

    let Ok(rt) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    else {
        return 1;
    };

    rt.block_on(async {
        let Ok(client) = reqwest::Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
        else {
            return 1;
        };

        match client.get(&url).send().await {
            Ok(res) if res.status().is_success() => 0,
            _ => 1,
        }
    })
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }

    shutdown.cancel();
}
