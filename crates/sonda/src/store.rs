//! Check repositories. The store owns the authoritative list of
//! configured checks; the scheduler is (re)populated from it at startup
//! and after admin mutations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::info;

use crate::check::{parse_checks, render_checks, Check};
use crate::error::Error;
use crate::scheduler::Scheduler;

/// A place checks are kept and, depending on the implementation,
/// persisted. Safe to share behind an `Arc` with the admin API.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or replace the check stored under its key.
    async fn add(&self, check: Arc<Check>) -> Result<(), Error>;

    async fn get(&self, key: &str) -> Result<Option<Arc<Check>>, Error>;

    /// Remove the check stored under `key`; false if it was absent.
    async fn remove(&self, key: &str) -> Result<bool, Error>;

    async fn len(&self) -> Result<usize, Error>;

    /// Every stored check, ordered by key.
    async fn all(&self) -> Result<Vec<Arc<Check>>, Error>;

    /// Drop every stored check.
    async fn clear(&self) -> Result<(), Error>;

    /// Register every stored check with `scheduler`.
    async fn schedule_all(&self, scheduler: &Scheduler) -> Result<(), Error>;
}

/// Keeps checks in memory only; they are gone on restart.
#[derive(Default)]
pub struct MemoryStore {
    checks: Mutex<HashMap<String, Arc<Check>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted(checks: &HashMap<String, Arc<Check>>) -> Vec<Arc<Check>> {
    let mut list: Vec<_> = checks.values().cloned().collect();
    list.sort_by(|a, b| a.key.cmp(&b.key));
    list
}

#[async_trait]
impl Store for MemoryStore {
    async fn add(&self, check: Arc<Check>) -> Result<(), Error> {
        self.checks
            .lock()
            .unwrap()
            .insert(check.key.clone(), check);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Arc<Check>>, Error> {
        Ok(self.checks.lock().unwrap().get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<bool, Error> {
        Ok(self.checks.lock().unwrap().remove(key).is_some())
    }

    async fn len(&self) -> Result<usize, Error> {
        Ok(self.checks.lock().unwrap().len())
    }

    async fn all(&self) -> Result<Vec<Arc<Check>>, Error> {
        Ok(sorted(&self.checks.lock().unwrap()))
    }

    async fn clear(&self) -> Result<(), Error> {
        self.checks.lock().unwrap().clear();
        Ok(())
    }

    async fn schedule_all(&self, scheduler: &Scheduler) -> Result<(), Error> {
        let checks = sorted(&self.checks.lock().unwrap());
        for check in checks {
            scheduler.schedule(check);
        }
        Ok(())
    }
}

/// Checks persisted as a JSON document on disk. Loaded once at startup;
/// every mutation writes the whole list back.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    checks: tokio::sync::Mutex<HashMap<String, Arc<Check>>>,
}

impl FileStore {
    /// Load the check list from `path`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let data = tokio::fs::read(&path).await?;

        let mut checks = HashMap::new();
        for check in parse_checks(&data)? {
            checks.insert(check.key.clone(), Arc::new(check));
        }
        info!(path = %path.display(), checks = checks.len(), "check list loaded");

        Ok(FileStore {
            path,
            checks: tokio::sync::Mutex::new(checks),
        })
    }

    async fn persist(&self, checks: &HashMap<String, Arc<Check>>) -> Result<(), Error> {
        let mut list: Vec<_> = checks.values().cloned().collect();
        list.sort_by(|a, b| a.key.cmp(&b.key));
        let data = render_checks(&list)?;
        tokio::fs::write(&self.path, data).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for FileStore {
    async fn add(&self, check: Arc<Check>) -> Result<(), Error> {
        let mut checks = self.checks.lock().await;
        checks.insert(check.key.clone(), check);
        self.persist(&checks).await
    }

    async fn get(&self, key: &str) -> Result<Option<Arc<Check>>, Error> {
        Ok(self.checks.lock().await.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<bool, Error> {
        let mut checks = self.checks.lock().await;
        let removed = checks.remove(key).is_some();
        if removed {
            self.persist(&checks).await?;
        }
        Ok(removed)
    }

    async fn len(&self) -> Result<usize, Error> {
        Ok(self.checks.lock().await.len())
    }

    async fn all(&self) -> Result<Vec<Arc<Check>>, Error> {
        let checks = self.checks.lock().await;
        Ok(sorted(&checks))
    }

    async fn clear(&self) -> Result<(), Error> {
        let mut checks = self.checks.lock().await;
        checks.clear();
        self.persist(&checks).await
    }

    async fn schedule_all(&self, scheduler: &Scheduler) -> Result<(), Error> {
        let checks = sorted(&*self.checks.lock().await);
        for check in checks {
            scheduler.schedule(check);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    use crate::check::ProbeConfig;

    fn check(key: &str) -> Arc<Check> {
        let probe = ProbeConfig::http("http://example.com/", BTreeMap::new()).unwrap();
        Arc::new(Check::new(
            key,
            Duration::from_secs(10),
            false,
            Duration::ZERO,
            false,
            probe,
        ))
    }

    #[tokio::test]
    async fn memory_store_add_get_remove() {
        let store = MemoryStore::new();
        store.add(check("a")).await.unwrap();
        store.add(check("b")).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 2);
        assert!(store.get("a").await.unwrap().is_some());
        assert!(store.get("missing").await.unwrap().is_none());

        assert!(store.remove("a").await.unwrap());
        assert!(!store.remove("a").await.unwrap());
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn adding_the_same_key_replaces() {
        let store = MemoryStore::new();
        store.add(check("a")).await.unwrap();
        store.add(check("a")).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn all_is_ordered_by_key() {
        let store = MemoryStore::new();
        for key in ["c", "a", "b"] {
            store.add(check(key)).await.unwrap();
        }
        let keys: Vec<_> = store
            .all()
            .await
            .unwrap()
            .iter()
            .map(|c| c.key.clone())
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn schedule_all_registers_every_check() {
        let store = MemoryStore::new();
        store.add(check("a")).await.unwrap();
        store.add(check("b")).await.unwrap();

        let (scheduler, _due) = Scheduler::new();
        store.schedule_all(&scheduler).await.unwrap();
        assert_eq!(scheduler.len(), 2);
    }

    #[tokio::test]
    async fn file_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checks.json");
        tokio::fs::write(
            &path,
            r#"[{"key": "a", "type": "http", "interval": "10s",
                 "config": {"url": "http://a.example.com/"}}]"#,
        )
        .await
        .unwrap();

        let store = FileStore::load(&path).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 1);

        store.add(check("b")).await.unwrap();
        store.remove("a").await.unwrap();

        // A fresh load sees only what was persisted.
        let reloaded = FileStore::load(&path).await.unwrap();
        assert_eq!(reloaded.len().await.unwrap(), 1);
        assert!(reloaded.get("b").await.unwrap().is_some());
        assert!(reloaded.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_requires_an_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileStore::load(dir.path().join("absent.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn file_store_rejects_a_bad_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checks.json");
        tokio::fs::write(&path, r#"[{"key": "a"}]"#).await.unwrap();

        assert!(FileStore::load(&path).await.is_err());
    }
}
