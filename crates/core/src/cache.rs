//! Session-scoped storage of enriched snapshots.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::models::{EnrichedSnapshot, Game};

/// Keyed store of one snapshot per username.
///
/// Keys are case-insensitive. Every save replaces the previous snapshot.
pub trait SessionCache: Send + Sync {
    /// Store `games` for `username`, replacing any earlier snapshot.
    fn save(&self, username: &str, games: &[Game]) -> Result<()>;

    /// Full snapshot for `username`, if one is stored and belongs to it.
    fn load_snapshot(&self, username: &str) -> Result<Option<EnrichedSnapshot>>;

    /// Drop the snapshot for `username`.
    fn clear(&self, username: &str) -> Result<()>;

    /// Drop every snapshot.
    fn clear_all(&self) -> Result<()>;

    /// Games stored for `username`, if any.
    fn load(&self, username: &str) -> Result<Option<Vec<Game>>> {
        Ok(self.load_snapshot(username)?.map(|snapshot| snapshot.games))
    }
}

fn cache_key(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Process-local cache.
#[derive(Default)]
pub struct MemorySessionCache {
    entries: RwLock<HashMap<String, EnrichedSnapshot>>,
}

impl MemorySessionCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionCache for MemorySessionCache {
    fn save(&self, username: &str, games: &[Game]) -> Result<()> {
        let snapshot = EnrichedSnapshot::capture(username, games.to_vec());
        self.entries.write().insert(cache_key(username), snapshot);
        Ok(())
    }

    fn load_snapshot(&self, username: &str) -> Result<Option<EnrichedSnapshot>> {
        let entries = self.entries.read();
        Ok(entries
            .get(&cache_key(username))
            .filter(|snapshot| snapshot.belongs_to(username))
            .cloned())
    }

    fn clear(&self, username: &str) -> Result<()> {
        self.entries.write().remove(&cache_key(username));
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }
}

/// Cache persisting each snapshot as a JSON file under a root directory.
///
/// File names are derived from the lowercased username with unsafe characters
/// stripped, so distinct usernames may share a file. Loads check ownership.
pub struct FileSessionCache {
    root: PathBuf,
}

impl FileSessionCache {
    /// Cache rooted at `root`. The directory is created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the snapshot files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, username: &str) -> PathBuf {
        self.root
            .join(format!("{}.json", sanitize_component(&cache_key(username))))
    }

    fn write_snapshot(&self, path: &Path, snapshot: &EnrichedSnapshot) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;
        let serialised = serde_json::to_vec(snapshot)?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, serialised)
            .with_context(|| format!("failed to write {}", staging.display()))?;
        fs::rename(&staging, path)
            .with_context(|| format!("failed to replace {}", path.display()))
    }

    /// An unparsable file counts as absent; only I/O faults are errors.
    fn read_snapshot(&self, path: &Path) -> Result<Option<EnrichedSnapshot>> {
        let content =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        match serde_json::from_slice(&content) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) => {
                warn!(path = %path.display(), "ignoring unreadable snapshot: {err}");
                Ok(None)
            }
        }
    }
}

impl SessionCache for FileSessionCache {
    fn save(&self, username: &str, games: &[Game]) -> Result<()> {
        let path = self.path_for(username);
        let snapshot = EnrichedSnapshot::capture(username, games.to_vec());
        self.write_snapshot(&path, &snapshot)?;
        debug!(username, games = games.len(), "saved session snapshot");
        Ok(())
    }

    fn load_snapshot(&self, username: &str) -> Result<Option<EnrichedSnapshot>> {
        let path = self.path_for(username);
        if !path.is_file() {
            return Ok(None);
        }

        let Some(snapshot) = self.read_snapshot(&path)? else {
            return Ok(None);
        };
        if !snapshot.belongs_to(username) {
            warn!(
                username,
                stored = %snapshot.username,
                "snapshot file belongs to a different user"
            );
            return Ok(None);
        }
        Ok(Some(snapshot))
    }

    fn clear(&self, username: &str) -> Result<()> {
        let path = self.path_for(username);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        }
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        if !self.root.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(&self.root).context("failed to read cache directory")? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if entry.path().extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            fs::remove_file(entry.path())
                .with_context(|| format!("failed to remove {}", entry.path().display()))?;
        }
        Ok(())
    }
}

fn sanitize_component(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_') {
            result.push(ch);
        }
    }
    if result.is_empty() {
        "session".to_string()
    } else {
        result
    }
}
