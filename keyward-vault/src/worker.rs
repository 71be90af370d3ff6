//! Async boundary for KDF-bearing work
//!
//! Argon2id with production parameters takes long enough to stall an event
//! loop. [`KeyWorker`] runs manager operations on tokio's blocking pool, one
//! at a time.

use crate::inactivity::{InactivityAction, InactivityMonitor};
use crate::manager::SecurityManager;
use crate::rotation::{RotationItem, RotationResult};
use crate::session::VaultSession;
use crate::{Error, Result};
use chrono::Utc;
use keyward_crypto::SecretShare;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use zeroize::Zeroizing;

/// Serializes manager operations onto the blocking pool
#[derive(Debug, Clone)]
pub struct KeyWorker {
    manager: Arc<SecurityManager>,
    lock: Arc<Mutex<()>>,
}

impl KeyWorker {
    /// Wrap a manager
    pub fn new(manager: Arc<SecurityManager>) -> Self {
        Self {
            manager,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// The wrapped manager
    pub fn manager(&self) -> &Arc<SecurityManager> {
        &self.manager
    }

    /// Run `task` on the blocking pool once no other task is running
    pub async fn run<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&SecurityManager) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let guard = self.lock.clone().lock_owned().await;
        let manager = self.manager.clone();

        let join = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            task(&manager)
        });

        join.await
            .map_err(|e| Error::Worker(format!("key task join error: {}", e)))?
    }

    /// Create the passcode credential
    pub async fn setup_passcode(&self, passcode: Zeroizing<String>) -> Result<()> {
        self.run(move |manager| manager.setup_passcode(&passcode)).await
    }

    /// Unlock the vault
    pub async fn unlock(&self, passcode: Zeroizing<String>) -> Result<VaultSession> {
        self.run(move |manager| manager.unlock(&passcode)).await
    }

    /// Rotate the credential and re-key `items`
    pub async fn rotate(
        &self,
        passcode: Zeroizing<String>,
        items: Vec<RotationItem>,
    ) -> Result<RotationResult> {
        self.run(move |manager| manager.rotate(&passcode, items)).await
    }

    /// Bind a duress passcode
    pub async fn set_duress_passcode(&self, duress_passcode: Zeroizing<String>) -> Result<()> {
        self.run(move |manager| manager.set_duress_passcode(&duress_passcode))
            .await
    }

    /// Split the passcode into a recovery kit
    pub async fn create_emergency_kit(
        &self,
        passcode: Zeroizing<String>,
        total: u8,
        threshold: u8,
        labels: Vec<String>,
    ) -> Result<Vec<SecretShare>> {
        self.run(move |manager| manager.create_emergency_kit(&passcode, total, threshold, &labels))
            .await
    }

    /// Recover the passcode from kit shares
    pub async fn recover_passcode(&self, shares: Vec<SecretShare>) -> Result<Zeroizing<String>> {
        self.run(move |manager| manager.recover_passcode(&shares)).await
    }

    /// Poll the inactivity switch every `period` until the handle is aborted
    ///
    /// Dispatch failures are logged and retried on the next tick.
    pub fn spawn_inactivity_poller(
        &self,
        monitor: InactivityMonitor,
        period: Duration,
    ) -> JoinHandle<()> {
        let worker = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let monitor = monitor.clone();
                let fired: Result<Option<InactivityAction>> = worker
                    .run(move |manager| manager.poll_inactivity(&monitor, Utc::now()))
                    .await;
                match fired {
                    Ok(Some(action)) => tracing::info!(?action, "inactivity action dispatched"),
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, "inactivity poll failed"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use crate::store::MemoryConfigStore;
    use keyward_crypto::KdfParams;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn worker() -> KeyWorker {
        let store = Arc::new(MemoryConfigStore::with_config(SecurityConfig {
            kdf: KdfParams::Argon2id {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            ..SecurityConfig::default()
        }));
        KeyWorker::new(Arc::new(SecurityManager::open(store).unwrap()))
    }

    #[tokio::test]
    async fn test_setup_and_unlock_through_worker() {
        let worker = worker();
        worker
            .setup_passcode(Zeroizing::new("2580".to_string()))
            .await
            .unwrap();

        let session = worker.unlock(Zeroizing::new("2580".to_string())).await.unwrap();
        assert_eq!(session.mode(), crate::session::UnlockMode::Real);

        let err = worker
            .unlock(Zeroizing::new("0852".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authentication));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_tasks_do_not_overlap() {
        let worker = worker();
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let worker = worker.clone();
            let running = running.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                worker
                    .run(move |_| {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(5));
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_task_maps_to_worker_error() {
        let worker = worker();
        let err = worker
            .run(|_| -> Result<()> { panic!("boom") })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Worker(_)));

        // lock released after the panic
        worker.run(|_| Ok(())).await.unwrap();
    }
}
