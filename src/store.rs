// Persistence Gateway - load/save the ledger document
//
// JsonFileStore keeps one pretty-printed JSON document on disk:
//   { "activeTrackingYear": 2025, "cards": [ ... ] }
// Older files that hold a bare array of cards still load; the tracking
// year is then derived by the first reset.

use chrono::Local;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::models::{Card, Ledger};

/// Durable home of the ledger.
pub trait CardStore: Send + Sync {
    /// Load the ledger; a missing or empty document is an empty ledger.
    fn load(&self) -> StoreResult<Ledger>;

    /// Overwrite the stored ledger.
    fn save(&self, ledger: &Ledger) -> StoreResult<()>;

    /// Move a document that failed to load out of the way, so the next
    /// `save` cannot destroy it. Returns where it went, if anywhere.
    fn set_aside(&self) -> StoreResult<Option<PathBuf>> {
        Ok(None)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Legacy(Vec<Card>),
    Ledger(Ledger),
}

impl From<Document> for Ledger {
    fn from(doc: Document) -> Self {
        match doc {
            Document::Legacy(cards) => Ledger::new(cards),
            Document::Ledger(ledger) => ledger,
        }
    }
}

/// Parse a ledger document (current or legacy shape).
pub fn parse_document(contents: &str) -> serde_json::Result<Ledger> {
    if contents.trim().is_empty() {
        return Ok(Ledger::default());
    }
    serde_json::from_str::<Document>(contents).map(Ledger::from)
}

// ============================================================================
// JSON FILE STORE
// ============================================================================

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CardStore for JsonFileStore {
    fn load(&self) -> StoreResult<Ledger> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "data file missing; starting empty");
            return Ok(Ledger::default());
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let ledger = parse_document(&contents).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        debug!(
            path = %self.path.display(),
            cards = ledger.cards.len(),
            "ledger loaded"
        );
        Ok(ledger)
    }

    fn save(&self, ledger: &Ledger) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(ledger).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        // Write beside the target, then rename over it.
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), cards = ledger.cards.len(), "ledger saved");
        Ok(())
    }

    fn set_aside(&self) -> StoreResult<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut target = self.path.clone().into_os_string();
        target.push(format!(
            ".unreadable-{}",
            Local::now().format("%Y%m%dT%H%M%S")
        ));
        let target = PathBuf::from(target);

        fs::rename(&self.path, &target).map_err(|e| self.io_error(e))?;
        warn!(
            path = %self.path.display(),
            moved_to = %target.display(),
            "unreadable data file set aside"
        );
        Ok(Some(target))
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Store that keeps the last saved ledger in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: Mutex<Ledger>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new(ledger: Ledger) -> Self {
        MemoryStore {
            ledger: Mutex::new(ledger),
            ..Default::default()
        }
    }

    /// Make every following `save` fail (or succeed again)
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Last saved ledger
    pub fn snapshot(&self) -> Ledger {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl CardStore for MemoryStore {
    fn load(&self) -> StoreResult<Ledger> {
        Ok(self.snapshot())
    }

    fn save(&self, ledger: &Ledger) -> StoreResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("saves disabled".to_string()));
        }
        *self.ledger.lock().unwrap_or_else(PoisonError::into_inner) = ledger.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
