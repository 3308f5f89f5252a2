//! Playbook persistence: atomic saves, per-version history snapshots, and
//! quarantine of corrupt files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use super::{Playbook, Version};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("playbook I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("playbook serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Where a loaded playbook came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    /// Parsed from the existing on-disk file.
    Existing,
    /// No file existed; a fresh seed was installed.
    Seeded,
    /// The on-disk file failed validation and was quarantined; a fresh seed
    /// was installed. A human decides whether to restore from history.
    Quarantined { quarantined_to: PathBuf },
}

#[derive(Debug)]
pub struct LoadedPlaybook {
    pub playbook: Playbook,
    pub source: LoadSource,
}

/// Loads, validates, and saves the playbook, maintaining immutable history
/// snapshots keyed by version.
pub struct PlaybookStore {
    playbook_path: PathBuf,
    history_dir: PathBuf,
}

impl PlaybookStore {
    pub fn new(playbook_path: PathBuf, history_dir: PathBuf) -> Self {
        Self { playbook_path, history_dir }
    }

    pub fn playbook_path(&self) -> &Path {
        &self.playbook_path
    }

    /// Path of the immutable snapshot for a version.
    pub fn history_path(&self, version: Version) -> PathBuf {
        self.history_dir.join(format!("playbook_v{version}.json"))
    }

    /// Load the current playbook.
    ///
    /// A missing file seeds a fresh playbook; a malformed or invariant-violating
    /// file is quarantined with a `.corrupt` suffix and replaced by a seed.
    /// Neither case is an error to the caller — the loop must continue — but
    /// quarantine is surfaced in the returned [`LoadSource`] and logged.
    pub fn load(&self, now: DateTime<Utc>) -> Result<LoadedPlaybook, StoreError> {
        if !self.playbook_path.exists() {
            info!(path = %self.playbook_path.display(), "no playbook on disk; seeding");
            let playbook = Playbook::seed(now);
            self.save(&playbook)?;
            return Ok(LoadedPlaybook { playbook, source: LoadSource::Seeded });
        }

        let raw = fs::read_to_string(&self.playbook_path).map_err(|source| StoreError::Io {
            path: self.playbook_path.clone(),
            source,
        })?;

        let parsed: Result<Playbook, _> = serde_json::from_str(&raw);
        let corrupt_reason = match parsed {
            Err(e) => Some(format!("parse error: {e}")),
            Ok(playbook) => {
                let violations = playbook.validate();
                if violations.is_empty() {
                    return Ok(LoadedPlaybook { playbook, source: LoadSource::Existing });
                }
                Some(format!(
                    "invariant violations: {}",
                    violations
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join("; ")
                ))
            }
        };

        let quarantined_to = self.quarantine(corrupt_reason.as_deref().unwrap_or("unknown"))?;
        let playbook = Playbook::seed(now);
        self.save(&playbook)?;
        Ok(LoadedPlaybook {
            playbook,
            source: LoadSource::Quarantined { quarantined_to },
        })
    }

    /// Atomic save (write-to-temp + rename). When the version has no snapshot
    /// in history yet, an immutable per-version snapshot is written too.
    pub fn save(&self, playbook: &Playbook) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(playbook)?;
        write_atomic(&self.playbook_path, &json)?;

        let snapshot = self.history_path(playbook.metadata.version);
        if !snapshot.exists() {
            write_atomic(&snapshot, &json)?;
            info!(version = %playbook.metadata.version, "playbook history snapshot written");
        }
        Ok(())
    }

    /// Structural invariant check, delegated to [`Playbook::validate`].
    pub fn validate(playbook: &Playbook) -> Vec<super::Violation> {
        playbook.validate()
    }

    fn quarantine(&self, reason: &str) -> Result<PathBuf, StoreError> {
        let quarantined = self.playbook_path.with_extension("json.corrupt");
        fs::rename(&self.playbook_path, &quarantined).map_err(|source| StoreError::Io {
            path: self.playbook_path.clone(),
            source,
        })?;
        error!(
            quarantined = %quarantined.display(),
            reason,
            "corrupt playbook quarantined; installing fresh seed"
        );
        Ok(quarantined)
    }
}

/// Write-to-temp + rename within the target directory.
fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).map_err(io_err)?;
    if let Err(source) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        warn!(path = %path.display(), "atomic rename failed");
        return Err(StoreError::Io { path: path.to_path_buf(), source });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> PlaybookStore {
        PlaybookStore::new(
            tmp.path().join("data/playbook.json"),
            tmp.path().join("data/history"),
        )
    }

    #[test]
    fn load_missing_file_seeds_and_persists() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        let loaded = store.load(Utc::now()).unwrap();
        assert_eq!(loaded.source, LoadSource::Seeded);
        assert!(store.playbook_path().exists());
        // Seed at v1.0 also lands in history.
        assert!(store.history_path(Version::INITIAL).exists());
    }

    #[test]
    fn save_load_roundtrip_is_structural_identity() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        let mut playbook = Playbook::seed(Utc::now());
        playbook.touch("strat-001", Utc::now());
        store.save(&playbook).unwrap();

        let loaded = store.load(Utc::now()).unwrap();
        assert_eq!(loaded.source, LoadSource::Existing);
        assert_eq!(loaded.playbook, playbook);
    }

    #[test]
    fn malformed_file_is_quarantined_and_seed_installed() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        fs::create_dir_all(tmp.path().join("data")).unwrap();
        fs::write(store.playbook_path(), "{not json at all").unwrap();

        let loaded = store.load(Utc::now()).unwrap();
        let LoadSource::Quarantined { quarantined_to } = loaded.source else {
            panic!("expected quarantine");
        };
        assert!(quarantined_to.to_string_lossy().ends_with(".corrupt"));
        assert!(quarantined_to.exists());
        assert!(loaded.playbook.validate().is_empty());
        // Fresh seed is now the current file.
        let reloaded = store.load(Utc::now()).unwrap();
        assert_eq!(reloaded.source, LoadSource::Existing);
    }

    #[test]
    fn invariant_violation_also_quarantines() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let mut playbook = Playbook::seed(Utc::now());
        playbook.metadata.total_entries = 99; // violates I2
        let json = serde_json::to_string_pretty(&playbook).unwrap();
        fs::create_dir_all(tmp.path().join("data")).unwrap();
        fs::write(store.playbook_path(), json).unwrap();

        let loaded = store.load(Utc::now()).unwrap();
        assert!(matches!(loaded.source, LoadSource::Quarantined { .. }));
    }

    #[test]
    fn new_version_writes_snapshot_and_keeps_old_one() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        let mut playbook = Playbook::seed(Utc::now());
        store.save(&playbook).unwrap();
        let v1 = playbook.metadata.version;

        playbook.metadata.version = v1.bump_minor();
        store.save(&playbook).unwrap();

        assert!(store.history_path(v1).exists());
        assert!(store.history_path(playbook.metadata.version).exists());
    }

    #[test]
    fn existing_snapshot_is_immutable() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        let playbook = Playbook::seed(Utc::now());
        store.save(&playbook).unwrap();
        let snapshot = store.history_path(playbook.metadata.version);
        let original = fs::read_to_string(&snapshot).unwrap();

        // Saving a mutated playbook at the same version must not rewrite
        // the existing snapshot.
        let mut mutated = playbook;
        mutated.touch("strat-001", Utc::now());
        store.save(&mutated).unwrap();
        assert_eq!(fs::read_to_string(&snapshot).unwrap(), original);
    }
}
