//! Filesystem record stores.
//!
//! Layout under the data path:
//!
//! ```text
//! vectors/<speaker>/<version:020>.json
//! dfns/<id>.json
//! evaluations/<id>.json
//! transitions/<speaker>.jsonl
//! ```
//!
//! `<speaker>` is a hash of the speaker ID so arbitrary IDs are safe as path segments.
//! Documents are written to a temp file in the target directory, synced, then renamed
//! into place; readers never see a partial record.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::{
    CorrectionVectorStore, EvaluationStore, InsertOutcome, NoteStore, Record, StoreError,
    TransitionLog, sort_records,
};
use crate::bucket::BucketTransition;
use crate::evaluation::Evaluation;
use crate::hashing::derive_record_id;
use crate::rag::DraftGenieNote;
use crate::vector::CorrectionVector;

const JSON_EXTENSION: &str = "json";
const JSONL_EXTENSION: &str = "jsonl";

fn speaker_dir_name(speaker_id: &str) -> String {
    derive_record_id("speaker", &[speaker_id])
}

async fn blocking<T, F>(task: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| StoreError::TaskFailed(e.to_string()))?
}

/// Writes `value` to `path` via temp file + rename.
///
/// With `clobber = false` an existing file is left untouched and `Ok(false)` returned.
fn write_json_atomic<T: Serialize>(
    path: &Path,
    value: &T,
    clobber: bool,
) -> Result<bool, StoreError> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::Io(std::io::Error::other("record path has no parent")))?;
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;

    if clobber {
        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
        return Ok(true);
    }

    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(StoreError::Io(e.error)),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Paths of `*.json` files directly under `dir`; empty when `dir` does not exist.
fn json_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == JSON_EXTENSION) {
            paths.push(path);
        }
    }
    Ok(paths)
}

#[derive(Debug, Clone)]
pub struct FsVectorStore {
    root: PathBuf,
}

impl FsVectorStore {
    pub fn new(data_path: impl AsRef<Path>) -> Self {
        Self {
            root: data_path.as_ref().join("vectors"),
        }
    }

    fn speaker_dir(&self, speaker_id: &str) -> PathBuf {
        self.root.join(speaker_dir_name(speaker_id))
    }

    fn version_path(&self, speaker_id: &str, version: u64) -> PathBuf {
        self.speaker_dir(speaker_id)
            .join(format!("{version:020}.{JSON_EXTENSION}"))
    }

    fn list_versions(dir: &Path) -> Result<Vec<u64>, StoreError> {
        let mut versions: Vec<u64> = json_files(dir)?
            .iter()
            .filter_map(|p| p.file_stem()?.to_str()?.parse::<u64>().ok())
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }
}

#[async_trait]
impl CorrectionVectorStore for FsVectorStore {
    async fn append(&self, vector: &CorrectionVector) -> Result<(), StoreError> {
        let path = self.version_path(&vector.speaker_id, vector.version);
        let vector = vector.clone();
        blocking(move || {
            if write_json_atomic(&path, &vector, false)? {
                debug!(
                    speaker_id = %vector.speaker_id,
                    version = vector.version,
                    path = %path.display(),
                    "Wrote correction vector"
                );
                Ok(())
            } else {
                Err(StoreError::VersionConflict {
                    speaker_id: vector.speaker_id,
                    version: vector.version,
                })
            }
        })
        .await
    }

    async fn latest(&self, speaker_id: &str) -> Result<Option<CorrectionVector>, StoreError> {
        let store = self.clone();
        let speaker_id = speaker_id.to_string();
        blocking(move || {
            let versions = Self::list_versions(&store.speaker_dir(&speaker_id))?;
            match versions.last() {
                Some(&version) => read_json(&store.version_path(&speaker_id, version)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn get(
        &self,
        speaker_id: &str,
        version: u64,
    ) -> Result<Option<CorrectionVector>, StoreError> {
        let path = self.version_path(speaker_id, version);
        blocking(move || read_json(&path)).await
    }

    async fn versions(&self, speaker_id: &str) -> Result<Vec<u64>, StoreError> {
        let dir = self.speaker_dir(speaker_id);
        blocking(move || Self::list_versions(&dir)).await
    }
}

/// One JSON document per record under `<data>/<kind>s/`.
#[derive(Debug)]
pub struct FsRecords<R> {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
    _record: PhantomData<fn() -> R>,
}

pub type FsNoteStore = FsRecords<DraftGenieNote>;
pub type FsEvaluationStore = FsRecords<Evaluation>;

impl<R> Clone for FsRecords<R> {
    fn clone(&self) -> Self {
        Self {
            dir: self.dir.clone(),
            write_lock: Arc::clone(&self.write_lock),
            _record: PhantomData,
        }
    }
}

impl<R: Record> FsRecords<R> {
    pub fn new(data_path: impl AsRef<Path>) -> Self {
        Self {
            dir: data_path.as_ref().join(format!("{}s", R::KIND)),
            write_lock: Arc::new(Mutex::new(())),
            _record: PhantomData,
        }
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{JSON_EXTENSION}"))
    }

    async fn insert_if_absent(&self, record: &R) -> Result<InsertOutcome<R>, StoreError> {
        let path = self.record_path(record.id());
        let record = record.clone();
        blocking(move || {
            if write_json_atomic(&path, &record, false)? {
                return Ok(InsertOutcome::Inserted(record));
            }
            match read_json::<R>(&path)? {
                Some(existing) => Ok(InsertOutcome::Existing(existing)),
                None => Err(StoreError::NotFound {
                    kind: R::KIND,
                    id: record.id().to_string(),
                }),
            }
        })
        .await
    }

    async fn finalize_record(&self, record: &R) -> Result<(), StoreError> {
        let store = self.clone();
        let record = record.clone();
        blocking(move || {
            let _guard = store.write_lock.lock();
            let path = store.record_path(record.id());
            match read_json::<R>(&path)? {
                None => Err(StoreError::NotFound {
                    kind: R::KIND,
                    id: record.id().to_string(),
                }),
                Some(existing) if existing.is_terminal() => Err(StoreError::AlreadyFinalized {
                    kind: R::KIND,
                    id: record.id().to_string(),
                }),
                Some(_) => write_json_atomic(&path, &record, true).map(|_| ()),
            }
        })
        .await
    }

    async fn get_record(&self, id: &str) -> Result<Option<R>, StoreError> {
        let path = self.record_path(id);
        blocking(move || read_json(&path)).await
    }

    async fn list(&self, speaker_id: &str) -> Result<Vec<R>, StoreError> {
        let dir = self.dir.clone();
        let speaker_id = speaker_id.to_string();
        blocking(move || {
            let mut records = Vec::new();
            for path in json_files(&dir)? {
                match read_json::<R>(&path) {
                    Ok(Some(record)) if record.speaker_id() == speaker_id => records.push(record),
                    Ok(_) => {}
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping unreadable record");
                    }
                }
            }
            sort_records(&mut records);
            Ok(records)
        })
        .await
    }
}

#[async_trait]
impl NoteStore for FsRecords<DraftGenieNote> {
    async fn insert_pending(
        &self,
        note: &DraftGenieNote,
    ) -> Result<InsertOutcome<DraftGenieNote>, StoreError> {
        self.insert_if_absent(note).await
    }

    async fn finalize(&self, note: &DraftGenieNote) -> Result<(), StoreError> {
        self.finalize_record(note).await
    }

    async fn get(&self, id: &str) -> Result<Option<DraftGenieNote>, StoreError> {
        self.get_record(id).await
    }

    async fn list_for_speaker(
        &self,
        speaker_id: &str,
    ) -> Result<Vec<DraftGenieNote>, StoreError> {
        self.list(speaker_id).await
    }
}

#[async_trait]
impl EvaluationStore for FsRecords<Evaluation> {
    async fn insert_pending(
        &self,
        evaluation: &Evaluation,
    ) -> Result<InsertOutcome<Evaluation>, StoreError> {
        self.insert_if_absent(evaluation).await
    }

    async fn finalize(&self, evaluation: &Evaluation) -> Result<(), StoreError> {
        self.finalize_record(evaluation).await
    }

    async fn get(&self, id: &str) -> Result<Option<Evaluation>, StoreError> {
        self.get_record(id).await
    }

    async fn list_for_speaker(&self, speaker_id: &str) -> Result<Vec<Evaluation>, StoreError> {
        self.list(speaker_id).await
    }
}

/// Append-only JSON Lines file per speaker.
#[derive(Debug, Clone)]
pub struct FsTransitionLog {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FsTransitionLog {
    pub fn new(data_path: impl AsRef<Path>) -> Self {
        Self {
            dir: data_path.as_ref().join("transitions"),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn log_path(&self, speaker_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{JSONL_EXTENSION}", speaker_dir_name(speaker_id)))
    }
}

#[async_trait]
impl TransitionLog for FsTransitionLog {
    async fn append(&self, transition: &BucketTransition) -> Result<(), StoreError> {
        let log = self.clone();
        let transition = transition.clone();
        blocking(move || {
            let mut line = serde_json::to_vec(&transition)?;
            line.push(b'\n');

            let _guard = log.write_lock.lock();
            fs::create_dir_all(&log.dir)?;
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log.log_path(&transition.speaker_id))?;
            file.write_all(&line)?;
            file.sync_data()?;
            Ok(())
        })
        .await
    }

    async fn history(&self, speaker_id: &str) -> Result<Vec<BucketTransition>, StoreError> {
        let path = self.log_path(speaker_id);
        blocking(move || {
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            };
            content
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| serde_json::from_str(line).map_err(StoreError::from))
                .collect()
        })
        .await
    }
}
