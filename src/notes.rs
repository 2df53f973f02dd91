//! Free-text notes attached to tree positions.
//!
//! Notes live in a string key-value backend, one JSON array per node, keyed by
//! `prefix + path string` (e.g. `thb_notes::/National Budget/Ministry of Finance`).
//! Reads never fail: a missing, undecodable or unreachable entry reads as no notes.
//! Writes report storage failures to the caller.

use chrono::{DateTime, Local, TimeZone, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use crate::error::NotesError;
use crate::format::escape_html;

/// Key namespace used when none is configured
pub const DEFAULT_PREFIX: &str = "thb_notes::";

/// A single timestamped note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEntry {
    pub text: String,
    /// Milliseconds since the Unix epoch
    #[serde(rename = "ts")]
    pub timestamp: i64,
}

impl NoteEntry {
    /// Timestamp rendered in local time
    pub fn local_time(&self) -> String {
        match Local.timestamp_millis_opt(self.timestamp).single() {
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => self.timestamp.to_string(),
        }
    }
}

/// Document produced by exporting the notes of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotesExport {
    pub path: String,
    pub notes: Vec<NoteEntry>,
}

/// String key-value storage underneath the notes store
pub trait NotesBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, NotesError>;
    fn set(&self, key: &str, value: String) -> Result<(), NotesError>;
    fn remove(&self, key: &str) -> Result<(), NotesError>;
}

/// Process-local backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<String, String>,
}

impl NotesBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, NotesError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: String) -> Result<(), NotesError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), NotesError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Backend persisted as a single JSON object on disk
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    entries: DashMap<String, String>,
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Open (or start) the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, NotesError> {
        let path = path.into();
        let entries = DashMap::new();
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                let stored: BTreeMap<String, String> = serde_json::from_str(&text)
                    .map_err(|e| NotesError::Storage(format!("{}: {e}", path.display())))?;
                for (key, value) in stored {
                    entries.insert(key, value);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Ok(Self {
            path,
            entries,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the store with one key changed, then apply the change in memory.
    ///
    /// `entries` is left untouched when the write fails.
    fn commit(&self, key: &str, value: Option<String>) -> Result<(), NotesError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| NotesError::Storage("notes file lock poisoned".to_string()))?;
        let mut snapshot: BTreeMap<String, String> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        match &value {
            Some(value) => snapshot.insert(key.to_string(), value.clone()),
            None => snapshot.remove(key),
        };
        let text = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&self.path, text)?;

        match value {
            Some(value) => {
                self.entries.insert(key.to_string(), value);
            }
            None => {
                self.entries.remove(key);
            }
        }
        Ok(())
    }
}

impl NotesBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, NotesError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: String) -> Result<(), NotesError> {
        self.commit(key, Some(value))
    }

    fn remove(&self, key: &str) -> Result<(), NotesError> {
        self.commit(key, None)
    }
}

/// Stand-in used when no storage could be opened
#[derive(Debug, Clone)]
pub struct UnavailableBackend {
    reason: String,
}

impl UnavailableBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl NotesBackend for UnavailableBackend {
    fn get(&self, _key: &str) -> Result<Option<String>, NotesError> {
        Err(NotesError::Storage(self.reason.clone()))
    }

    fn set(&self, _key: &str, _value: String) -> Result<(), NotesError> {
        Err(NotesError::Storage(self.reason.clone()))
    }

    fn remove(&self, _key: &str) -> Result<(), NotesError> {
        Err(NotesError::Storage(self.reason.clone()))
    }
}

pub struct NotesStore {
    backend: Box<dyn NotesBackend>,
    prefix: String,
}

impl NotesStore {
    pub fn new(backend: Box<dyn NotesBackend>, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::default()), DEFAULT_PREFIX)
    }

    /// Storage key for a path string
    pub fn key(&self, path: &str) -> String {
        format!("{}{}", self.prefix, path)
    }

    /// Notes for `path`, oldest first. Never fails.
    pub fn list(&self, path: &str) -> Vec<NoteEntry> {
        let key = self.key(path);
        match self.backend.get(&key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(key = %key, error = %err, "discarding undecodable notes");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(key = %key, error = %err, "notes unavailable");
                Vec::new()
            }
        }
    }

    /// Append a note stamped with the current time
    pub fn append(&self, path: &str, text: &str) -> Result<NoteEntry, NotesError> {
        self.append_at(path, text, Utc::now())
    }

    /// Append a note with an explicit timestamp. Text is trimmed; blank text is rejected.
    pub fn append_at(
        &self,
        path: &str,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<NoteEntry, NotesError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(NotesError::EmptyText);
        }

        let entry = NoteEntry {
            text: text.to_string(),
            timestamp: at.timestamp_millis(),
        };
        let mut notes = self.list(path);
        notes.push(entry.clone());
        self.backend
            .set(&self.key(path), serde_json::to_string(&notes)?)?;
        Ok(entry)
    }

    /// Remove every note for `path`
    pub fn clear(&self, path: &str) -> Result<(), NotesError> {
        self.backend.remove(&self.key(path))
    }

    pub fn export(&self, path: &str) -> NotesExport {
        NotesExport {
            path: path.to_string(),
            notes: self.list(path),
        }
    }

    /// Pretty-printed export document
    pub fn export_json(&self, path: &str) -> Result<String, NotesError> {
        Ok(serde_json::to_string_pretty(&self.export(path))?)
    }
}

/// Suggested file name for an export: `notes` + path with `/` replaced by `_` + `.json`
pub fn export_file_name(path: &str) -> String {
    format!("notes{}.json", path.replace('/', "_"))
}

/// HTML fragment listing the notes, with note text escaped
pub fn notes_html(notes: &[NoteEntry]) -> String {
    if notes.is_empty() {
        return r#"<div class="muted">No messages yet. Start the discussion for this node.</div>"#
            .to_string();
    }
    notes
        .iter()
        .map(|n| {
            format!(
                r#"<div class="note">{}<time>{}</time></div>"#,
                escape_html(&n.text),
                n.local_time()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
