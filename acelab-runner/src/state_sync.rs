//! Cross-run state persistence for ephemeral infrastructure.
//!
//! The local filesystem view is a cache; the bundle store is the source of
//! truth. `restore` materializes the latest complete bundle before a cycle,
//! `publish` re-uploads the whole bundle after it. Publish failure is the one
//! fatal error of a cycle.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::paths::Paths;

/// Items of a complete bundle, relative to the state root.
const BUNDLE_ITEMS: [&str; 4] = [
    "data",
    "trading_session",
    "weekly_reflections",
    "artifact_summary.json",
];

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("bundle store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("bundle manifest malformed at {path}: {message}")]
    BadManifest { path: PathBuf, message: String },
}

/// Reference to one stored bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleHandle {
    pub key: String,
    pub created_at: DateTime<Utc>,
}

/// Storage backend for complete state bundles.
pub trait StateBundleStore {
    fn latest(&self) -> Result<Option<BundleHandle>, BundleError>;

    fn download(&self, handle: &BundleHandle, dest: &Path) -> Result<(), BundleError>;

    fn upload(&self, src: &Path, key: &str, now: DateTime<Utc>) -> Result<(), BundleError>;

    /// Delete bundles created before `horizon`, keeping the newest bundle
    /// unconditionally. Returns how many were removed.
    fn prune_older_than(&self, horizon: DateTime<Utc>) -> Result<usize, BundleError>;
}

/// Directory-backed bundle store: one subdirectory per bundle plus a
/// `bundle.json` manifest carrying the key and creation time.
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn manifest_path(&self, key: &str) -> PathBuf {
        self.root.join(key).join("bundle.json")
    }

    fn handles(&self) -> Result<Vec<BundleHandle>, BundleError> {
        let read = match fs::read_dir(&self.root) {
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(BundleError::Io { path: self.root.clone(), source }),
        };
        let mut handles = Vec::new();
        for entry in read {
            let entry = entry.map_err(|source| BundleError::Io {
                path: self.root.clone(),
                source,
            })?;
            let manifest = entry.path().join("bundle.json");
            if !manifest.exists() {
                continue;
            }
            let raw = fs::read_to_string(&manifest)
                .map_err(|source| BundleError::Io { path: manifest.clone(), source })?;
            match serde_json::from_str::<BundleHandle>(&raw) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    warn!(path = %manifest.display(), error = %e, "skipping bad bundle manifest");
                }
            }
        }
        Ok(handles)
    }
}

impl StateBundleStore for LocalDirStore {
    fn latest(&self) -> Result<Option<BundleHandle>, BundleError> {
        let mut handles = self.handles()?;
        handles.sort_by(|a, b| (a.created_at, &a.key).cmp(&(b.created_at, &b.key)));
        Ok(handles.pop())
    }

    fn download(&self, handle: &BundleHandle, dest: &Path) -> Result<(), BundleError> {
        let src = self.root.join(&handle.key);
        for item in BUNDLE_ITEMS {
            let from = src.join(item);
            if from.exists() {
                copy_tree(&from, &dest.join(item))?;
            }
        }
        Ok(())
    }

    fn upload(&self, src: &Path, key: &str, now: DateTime<Utc>) -> Result<(), BundleError> {
        let dest = self.root.join(key);
        for item in BUNDLE_ITEMS {
            let from = src.join(item);
            if from.exists() {
                copy_tree(&from, &dest.join(item))?;
            }
        }
        let handle = BundleHandle { key: key.to_string(), created_at: now };
        let manifest = self.manifest_path(key);
        let json = serde_json::to_string_pretty(&handle).expect("handle serializes");
        fs::create_dir_all(&dest)
            .and_then(|()| fs::write(&manifest, json))
            .map_err(|source| BundleError::Io { path: manifest, source })?;
        Ok(())
    }

    fn prune_older_than(&self, horizon: DateTime<Utc>) -> Result<usize, BundleError> {
        let mut handles = self.handles()?;
        handles.sort_by(|a, b| (a.created_at, &a.key).cmp(&(b.created_at, &b.key)));
        // Keep the newest regardless of age.
        handles.pop();

        let mut removed = 0;
        for handle in handles {
            if handle.created_at < horizon {
                let path = self.root.join(&handle.key);
                fs::remove_dir_all(&path)
                    .map_err(|source| BundleError::Io { path, source })?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn copy_tree(from: &Path, to: &Path) -> Result<(), BundleError> {
    let io_err = |path: &Path, source| BundleError::Io { path: path.to_path_buf(), source };
    if from.is_dir() {
        fs::create_dir_all(to).map_err(|e| io_err(to, e))?;
        for entry in fs::read_dir(from).map_err(|e| io_err(from, e))? {
            let entry = entry.map_err(|e| io_err(from, e))?;
            copy_tree(&entry.path(), &to.join(entry.file_name()))?;
        }
    } else {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        fs::copy(from, to).map_err(|e| io_err(to, e))?;
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("state restore failed: {0}")]
    RestoreFailed(#[source] BundleError),

    #[error("state publish failed: {0}")]
    PublishFailed(#[source] BundleError),
}

/// How a restore resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// No prior bundle: first-run semantics, start from a clean seed.
    FirstRun,
    Restored { key: String },
}

/// Restores the latest bundle before a run and republishes after it.
pub struct StateSynchronizer {
    store: Box<dyn StateBundleStore>,
    paths: Paths,
    retention_days: u32,
    run_number: Option<u64>,
}

impl StateSynchronizer {
    pub fn new(
        store: Box<dyn StateBundleStore>,
        paths: Paths,
        retention_days: u32,
        run_number: Option<u64>,
    ) -> Self {
        Self { store, paths, retention_days, run_number }
    }

    /// Bundle key for this run: run number when the scheduler provides one,
    /// else a UTC timestamp.
    pub fn bundle_key(&self, cycle: &str, now: DateTime<Utc>) -> String {
        match self.run_number {
            Some(n) => format!("ace-{cycle}-{n:06}"),
            None => format!("ace-{cycle}-{}", now.format("%Y%m%dT%H%M%SZ")),
        }
    }

    /// Materialize the most recent complete bundle into the state root.
    pub fn restore(&self) -> Result<RestoreOutcome, SyncError> {
        let latest = self.store.latest().map_err(SyncError::RestoreFailed)?;
        match latest {
            None => {
                info!("no prior state bundle; first-run semantics");
                Ok(RestoreOutcome::FirstRun)
            }
            Some(handle) => {
                self.store
                    .download(&handle, self.paths.root())
                    .map_err(SyncError::RestoreFailed)?;
                info!(key = %handle.key, "state bundle restored");
                Ok(RestoreOutcome::Restored { key: handle.key })
            }
        }
    }

    /// Upload the whole bundle under `key`, then prune expired bundles.
    /// Upload failure is fatal to the cycle; prune failure is not.
    pub fn publish(&self, key: &str, now: DateTime<Utc>) -> Result<(), SyncError> {
        self.store
            .upload(self.paths.root(), key, now)
            .map_err(SyncError::PublishFailed)?;
        info!(%key, "state bundle published");

        let horizon = now - Duration::days(self.retention_days as i64);
        match self.store.prune_older_than(horizon) {
            Ok(0) => {}
            Ok(removed) => info!(removed, "expired bundles pruned"),
            Err(e) => warn!(error = %e, "bundle retention pruning failed"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed_state(root: &Path) {
        fs::create_dir_all(root.join("data/history")).unwrap();
        fs::write(root.join("data/playbook.json"), "{\"v\": 1}").unwrap();
        fs::create_dir_all(root.join("trading_session/2025_10_29")).unwrap();
        fs::write(
            root.join("trading_session/2025_10_29/trading_plan.json"),
            "{}",
        )
        .unwrap();
        fs::write(root.join("artifact_summary.json"), "{}").unwrap();
    }

    #[test]
    fn restore_with_no_bundles_is_first_run() {
        let tmp = TempDir::new().unwrap();
        let sync = StateSynchronizer::new(
            Box::new(LocalDirStore::new(tmp.path().join("store"))),
            Paths::new(tmp.path().join("state")),
            30,
            None,
        );
        assert_eq!(sync.restore().unwrap(), RestoreOutcome::FirstRun);
    }

    #[test]
    fn publish_then_restore_roundtrips_the_bundle() {
        let tmp = TempDir::new().unwrap();
        let state_a = tmp.path().join("state_a");
        let state_b = tmp.path().join("state_b");
        seed_state(&state_a);

        let store_root = tmp.path().join("store");
        let now = Utc::now();

        let sync_a = StateSynchronizer::new(
            Box::new(LocalDirStore::new(&store_root)),
            Paths::new(&state_a),
            30,
            Some(7),
        );
        let key = sync_a.bundle_key("daily", now);
        assert_eq!(key, "ace-daily-000007");
        sync_a.publish(&key, now).unwrap();

        // A fresh "machine" restores the same content.
        let sync_b = StateSynchronizer::new(
            Box::new(LocalDirStore::new(&store_root)),
            Paths::new(&state_b),
            30,
            None,
        );
        let outcome = sync_b.restore().unwrap();
        assert_eq!(outcome, RestoreOutcome::Restored { key });
        assert!(state_b.join("data/playbook.json").exists());
        assert!(state_b
            .join("trading_session/2025_10_29/trading_plan.json")
            .exists());
        assert!(state_b.join("artifact_summary.json").exists());
    }

    #[test]
    fn latest_picks_newest_bundle() {
        let tmp = TempDir::new().unwrap();
        let state = tmp.path().join("state");
        seed_state(&state);
        let store = LocalDirStore::new(tmp.path().join("store"));

        let now = Utc::now();
        store.upload(&state, "ace-daily-000001", now - Duration::days(2)).unwrap();
        store.upload(&state, "ace-daily-000002", now).unwrap();
        store.upload(&state, "ace-daily-000003", now - Duration::days(1)).unwrap();

        assert_eq!(store.latest().unwrap().unwrap().key, "ace-daily-000002");
    }

    #[test]
    fn prune_removes_expired_but_keeps_newest() {
        let tmp = TempDir::new().unwrap();
        let state = tmp.path().join("state");
        seed_state(&state);
        let store = LocalDirStore::new(tmp.path().join("store"));

        let now = Utc::now();
        store.upload(&state, "old-1", now - Duration::days(40)).unwrap();
        store.upload(&state, "old-2", now - Duration::days(35)).unwrap();
        store.upload(&state, "fresh", now).unwrap();

        let removed = store.prune_older_than(now - Duration::days(30)).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.latest().unwrap().unwrap().key, "fresh");
    }

    #[test]
    fn prune_never_deletes_a_lone_stale_bundle() {
        let tmp = TempDir::new().unwrap();
        let state = tmp.path().join("state");
        seed_state(&state);
        let store = LocalDirStore::new(tmp.path().join("store"));

        let now = Utc::now();
        store.upload(&state, "only", now - Duration::days(90)).unwrap();
        let removed = store.prune_older_than(now - Duration::days(30)).unwrap();
        assert_eq!(removed, 0);
        assert!(store.latest().unwrap().is_some());
    }
}
