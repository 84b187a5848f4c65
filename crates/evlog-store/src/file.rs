use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use evlog_types::{EventRecord, LogId};

use crate::alloc::next_free_id;
use crate::error::{StoreError, StoreResult};
use crate::frame::{decode_record, encode_record};
use crate::traits::RecordStore;

struct FileState {
    live: BTreeSet<LogId>,
    latest: LogId,
}

/// Directory-backed record store: one file per log, named by its decimal id.
///
/// Each file holds a single CRC-framed record (see [`crate::frame`]). Files
/// are written to a temporary name in the same directory and renamed into
/// place, so a crash never leaves a half-written record under a live id.
pub struct FileRecordStore {
    dir: PathBuf,
    state: Mutex<FileState>,
}

impl FileRecordStore {
    /// Open (or create) a store rooted at `dir`.
    ///
    /// Existing record files are enumerated; files whose names are not the
    /// canonical decimal form of a nonzero 16-bit id (no sign, no leading
    /// zeros) are ignored.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        if dir.exists() && !dir.is_dir() {
            return Err(StoreError::NotADirectory(dir));
        }
        fs::create_dir_all(&dir)?;

        let mut live = BTreeSet::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let parsed = name
                .to_str()
                .and_then(|n| n.parse::<LogId>().ok().filter(|id| id.to_string() == n));
            match parsed {
                Some(id) if id.is_assigned() => {
                    live.insert(id);
                }
                _ => debug!(file = ?name, "ignoring non-log file"),
            }
        }
        let latest = live.iter().next_back().copied().unwrap_or(LogId::UNASSIGNED);

        info!(dir = %dir.display(), count = live.len(), latest = %latest, "record store opened");

        Ok(Self {
            dir,
            state: Mutex::new(FileState { live, latest }),
        })
    }

    /// Directory holding the record files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, log_id: LogId) -> PathBuf {
        self.dir.join(log_id.to_string())
    }

    fn write_atomically(&self, log_id: LogId, bytes: &[u8]) -> StoreResult<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.record_path(log_id)).map_err(|e| e.error)?;
        Ok(())
    }
}

impl RecordStore for FileRecordStore {
    fn create(&self, draft: &EventRecord) -> StoreResult<LogId> {
        if !draft.is_draft() {
            return Err(StoreError::AlreadyAssigned(draft.log_id));
        }

        let mut state = self.state.lock().expect("store mutex poisoned");
        let log_id = next_free_id(state.latest, |id| state.live.contains(&id))?;
        let record = draft.clone().assigned(log_id, Utc::now());
        let bytes = encode_record(&record)?;
        self.write_atomically(log_id, &bytes)?;

        state.live.insert(log_id);
        state.latest = log_id;
        debug!(log_id = %log_id, len = bytes.len(), "record written");
        Ok(log_id)
    }

    fn load(&self, log_id: LogId) -> StoreResult<Option<EventRecord>> {
        let bytes = match fs::read(self.record_path(log_id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        decode_record(log_id, &bytes).map(Some)
    }

    fn delete(&self, log_id: LogId) -> StoreResult<bool> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        let existed = match fs::remove_file(self.record_path(log_id)) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        if !state.live.remove(&log_id) && existed {
            warn!(log_id = %log_id, "deleted a record file the store was not tracking");
        }
        debug!(log_id = %log_id, existed, "record deleted");
        Ok(existed)
    }

    fn log_ids(&self) -> StoreResult<Vec<LogId>> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.live.iter().copied().collect())
    }

    fn latest_log_id(&self) -> LogId {
        self.state.lock().expect("store mutex poisoned").latest
    }

    fn managed_size(&self) -> StoreResult<u64> {
        let ids = self.log_ids()?;
        let mut total = 0;
        for id in ids {
            match fs::metadata(self.record_path(id)) {
                Ok(meta) => total += meta.len(),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }
}

impl std::fmt::Debug for FileRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRecordStore")
            .field("dir", &self.dir)
            .finish()
    }
}
