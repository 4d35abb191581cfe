//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use genie::bucket::{Bucket, BucketReassigner};
use genie::drafts::{Draft, DraftType, MemoryDraftStore};
use genie::embedding::HashingEmbedder;
use genie::evaluation::{EvaluationConfig, EvaluationEngine};
use genie::events::{EventPublisher, InProcessBus, RecordingPublisher};
use genie::gateway::{AppState, create_router};
use genie::pipeline::PipelineWorker;
use genie::rag::{MockBackend, OrchestratorConfig, RagOrchestrator};
use genie::registry::{MemorySpeakerRegistry, Speaker};
use genie::store::{
    MemoryEvaluationStore, MemoryNoteStore, MemoryTransitionLog, MemoryVectorStore,
};
use genie::vector::{BuilderConfig, CorrectionVectorBuilder};
use genie::vectordb::MockVectorIndex;

pub fn draft(
    id: &str,
    speaker: &str,
    note_key: &str,
    kind: DraftType,
    text: &str,
    secs: i64,
) -> Draft {
    Draft {
        id: id.to_string(),
        speaker_id: speaker.to_string(),
        note_key: note_key.to_string(),
        draft_type: kind,
        text: text.to_string(),
        created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
    }
}

/// Speaker `s`: two corrected dictations, one teaching `diabetis -> diabetes` and
/// one teaching `metformin -> Metformin`, plus a new uncorrected dictation.
pub fn diabetes_history() -> Vec<Draft> {
    vec![
        draft("s-ad-1", "s", "s-n1", DraftType::Asr, "the patient has diabetis", 0),
        draft("s-ifn-1", "s", "s-n1", DraftType::FinalNote, "the patient has diabetes", 5),
        draft("s-ad-2", "s", "s-n2", DraftType::Asr, "taking metformin daily", 10),
        draft("s-ifn-2", "s", "s-n2", DraftType::FinalNote, "taking Metformin daily", 15),
        draft(
            "s-ad-3",
            "s",
            "s-n3",
            DraftType::Asr,
            "the patient has diabetis and is taking metformin daily",
            20,
        ),
    ]
}

pub fn diabetes_ground_truth() -> Draft {
    draft(
        "s-ifn-3",
        "s",
        "s-n3",
        DraftType::FinalNote,
        "the patient has diabetes and is taking Metformin daily",
        30,
    )
}

/// Every component wired against in-memory adapters.
pub struct Stack {
    pub registry: Arc<MemorySpeakerRegistry>,
    pub drafts: Arc<MemoryDraftStore>,
    pub vectors: Arc<MemoryVectorStore>,
    pub notes: Arc<MemoryNoteStore>,
    pub evaluations: Arc<MemoryEvaluationStore>,
    pub transitions: Arc<MemoryTransitionLog>,
    pub index: Arc<MockVectorIndex>,
    pub backend: Arc<MockBackend>,
    pub builder: CorrectionVectorBuilder,
    pub orchestrator: RagOrchestrator,
    pub engine: EvaluationEngine,
}

impl Stack {
    pub fn new(
        speakers: Vec<Speaker>,
        drafts: Vec<Draft>,
        builder_config: BuilderConfig,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let registry = Arc::new(MemorySpeakerRegistry::with_speakers(speakers));
        let drafts = Arc::new(MemoryDraftStore::with_drafts(drafts));
        let vectors = Arc::new(MemoryVectorStore::new());
        let notes = Arc::new(MemoryNoteStore::new());
        let evaluations = Arc::new(MemoryEvaluationStore::new());
        let transitions = Arc::new(MemoryTransitionLog::new());
        let index = Arc::new(MockVectorIndex::new());
        let embedder = Arc::new(HashingEmbedder::default());
        let backend = Arc::new(MockBackend::new());

        let builder = CorrectionVectorBuilder::new(
            builder_config,
            embedder.clone(),
            vectors.clone(),
            index.clone(),
            drafts.clone(),
            publisher.clone(),
        );
        let orchestrator = RagOrchestrator::new(
            OrchestratorConfig::default(),
            registry.clone(),
            drafts.clone(),
            vectors.clone(),
            notes.clone(),
            index.clone(),
            embedder.clone(),
            backend.clone(),
            publisher.clone(),
        );
        let engine = EvaluationEngine::new(
            EvaluationConfig::default(),
            registry.clone(),
            drafts.clone(),
            notes.clone(),
            evaluations.clone(),
            embedder,
            publisher,
        );

        Self {
            registry,
            drafts,
            vectors,
            notes,
            evaluations,
            transitions,
            index,
            backend,
            builder,
            orchestrator,
            engine,
        }
    }

    /// Speaker `s` in bucket GOOD with the diabetes history and threshold 1.
    pub fn diabetes(publisher: Arc<RecordingPublisher>) -> Self {
        Self::new(
            vec![Speaker::new("s", Bucket::Good)],
            diabetes_history(),
            BuilderConfig {
                min_frequency: 1,
                ..BuilderConfig::default()
            },
            publisher,
        )
    }

    pub fn worker(&self, auto_apply: bool) -> PipelineWorker {
        let worker = PipelineWorker::new(
            self.builder.clone(),
            self.orchestrator.clone(),
            self.engine.clone(),
            self.notes.clone(),
            self.evaluations.clone(),
        );
        if auto_apply {
            worker.with_auto_apply(BucketReassigner::new(
                self.registry.clone(),
                self.transitions.clone(),
            ))
        } else {
            worker
        }
    }
}

/// The HTTP surface plus pipeline worker on an ephemeral port.
pub struct TestService {
    pub stack: Stack,
    pub addr: SocketAddr,
    pub shutdown: CancellationToken,
    server: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl TestService {
    pub async fn spawn(speakers: Vec<Speaker>, drafts: Vec<Draft>, builder: BuilderConfig) -> Self {
        let (bus, stream) = InProcessBus::new(256);
        let bus = Arc::new(bus);
        let stack = Stack::new(speakers, drafts, builder, bus.clone());
        let shutdown = CancellationToken::new();

        let worker = tokio::spawn(stack.worker(true).run(stream, shutdown.clone()));

        let data_dir = std::env::temp_dir();
        let app = create_router(AppState::new(bus, data_dir, shutdown.clone()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server_shutdown = shutdown.clone();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
                .await
                .unwrap();
        });

        Self {
            stack,
            addr,
            shutdown,
            server,
            worker,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        self.server.await.unwrap();
        self.worker.await.unwrap();
    }
}

/// Polls `check` every 10ms for up to five seconds.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}
