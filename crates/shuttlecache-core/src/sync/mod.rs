//! Offline write queue.
//!
//! Check-ins are queued in the store first and delivered afterwards, in
//! batches, whenever the backend is reachable. Delivery is at-least-once:
//! a record leaves the queue only after the backend has acknowledged it.

pub mod queue;

pub use queue::PendingQueue;

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::connectivity::Connectivity;
use crate::models::{BatchResult, PendingRecord};
use crate::store::Store;

/// Delivers queued records to the backend.
#[async_trait]
pub trait RecordSender: Send + Sync {
    /// Send one batch. Records listed in the result's failure list were
    /// not accepted; every other record in the batch was.
    async fn send_batch(&self, records: &[PendingRecord]) -> Result<BatchResult>;

    /// Whether the backend currently answers, regardless of the offline flag.
    async fn probe(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Records per `checkInBatch` call.
    pub batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { batch_size: 10 }
    }
}

/// What a completed sync pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Queue length after the pass, including records pushed during it.
    pub remaining: usize,
    /// The pass stopped early because the backend became unreachable.
    pub aborted_offline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Offline,
    NothingToSend,
    AlreadyRunning,
    Completed(SyncReport),
}

/// Resets the running flag when a pass ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SyncManager {
    store: Arc<Mutex<Store>>,
    sender: Arc<dyn RecordSender>,
    connectivity: Connectivity,
    config: SyncConfig,
    running: AtomicBool,
}

impl SyncManager {
    pub fn new(
        store: Arc<Mutex<Store>>,
        sender: Arc<dyn RecordSender>,
        connectivity: Connectivity,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            sender,
            connectivity,
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Queue `record` and try to deliver right away. Returns the record's
    /// queue key and the outcome of the delivery attempt.
    pub async fn push_record(&self, record: PendingRecord) -> Result<(i64, SyncOutcome)> {
        let timestamp = {
            let mut store = self.store.lock().await;
            store.enqueue(record, Utc::now().timestamp_millis())?
        };
        debug!(timestamp, "Record queued");

        let outcome = self.sync().await?;
        Ok((timestamp, outcome))
    }

    /// Deliver the queue in batches.
    ///
    /// Records the backend reports as failed stay queued. When a batch
    /// errors out the pass stops only if the client has gone offline;
    /// otherwise it moves on to the next batch.
    pub async fn sync(&self) -> Result<SyncOutcome> {
        if self.connectivity.is_offline() {
            return Ok(SyncOutcome::Offline);
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Sync already in progress");
            return Ok(SyncOutcome::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        let snapshot: Vec<PendingRecord> = {
            let store = self.store.lock().await;
            store.pending().records().to_vec()
        };
        if snapshot.is_empty() {
            return Ok(SyncOutcome::NothingToSend);
        }

        info!(count = snapshot.len(), "Syncing pending records");
        let mut report = SyncReport::default();

        for batch in snapshot.chunks(self.config.batch_size.max(1)) {
            report.attempted += batch.len();

            match self.sender.send_batch(batch).await {
                Ok(result) => {
                    let failed = result.failed_timestamps();
                    for f in &result.failed {
                        warn!(timestamp = f.timestamp, error = ?f.error, "Record rejected");
                    }

                    let delivered: HashSet<i64> = batch
                        .iter()
                        .map(|r| r.timestamp)
                        .filter(|ts| !failed.contains(ts))
                        .collect();
                    report.failed += batch.iter().filter(|r| failed.contains(&r.timestamp)).count();

                    let removed = self.store.lock().await.remove_delivered(&delivered)?;
                    report.delivered += removed;
                }
                Err(e) => {
                    report.failed += batch.len();
                    warn!(error = %e, size = batch.len(), "Batch failed");
                    if self.connectivity.is_offline() {
                        report.aborted_offline = true;
                        break;
                    }
                }
            }
        }

        report.remaining = self.store.lock().await.pending().len();
        info!(
            delivered = report.delivered,
            failed = report.failed,
            remaining = report.remaining,
            "Sync finished"
        );
        Ok(SyncOutcome::Completed(report))
    }

    /// The backend is reachable again: record that and flush the queue.
    pub async fn on_online(&self) -> Result<SyncOutcome> {
        self.connectivity.set_online(true);
        {
            let mut store = self.store.lock().await;
            if store.status.is_offline {
                store.status.is_offline = false;
                store.save()?;
            }
        }
        self.sync().await
    }

    async fn on_offline(&self) -> Result<()> {
        self.connectivity.set_online(false);
        let mut store = self.store.lock().await;
        if !store.status.is_offline {
            store.status.is_offline = true;
            store.save()?;
        }
        Ok(())
    }

    /// Probe the backend once and react to what changed. Returns the sync
    /// outcome when a sync was run.
    pub async fn check_connection(&self) -> Result<Option<SyncOutcome>> {
        let reachable = self.sender.probe().await;

        if !reachable {
            if self.connectivity.is_online() {
                warn!("Backend stopped answering");
            }
            self.on_offline().await?;
            return Ok(None);
        }

        if self.connectivity.is_offline() {
            info!("Backend reachable again");
            return self.on_online().await.map(Some);
        }

        let pending = self.store.lock().await.pending().len();
        if pending > 0 {
            return self.sync().await.map(Some);
        }
        Ok(None)
    }

    /// Probe every `interval` until `shutdown` resolves.
    pub async fn watch<F>(&self, interval: Duration, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(interval_secs = interval.as_secs(), "Watching connectivity");
        let mut ticker = tokio::time::interval(interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Some(SyncOutcome::Completed(report)) = self.check_connection().await? {
                        debug!(?report, "Watch sync pass");
                    }
                }
            }
        }

        info!("Stopped watching");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailedRecord;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Scripted sender. Each call pops the next scripted response; once the
    /// script runs out every record is accepted.
    #[derive(Default)]
    struct MockSender {
        calls: AtomicUsize,
        batches: std::sync::Mutex<Vec<Vec<i64>>>,
        script: std::sync::Mutex<Vec<Step>>,
        reachable: AtomicBool,
        /// Store to push into while a batch is in flight.
        push_during_send: Option<Arc<Mutex<Store>>>,
        gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    enum Step {
        Reject(Vec<i64>),
        Error { then_offline: Option<Connectivity> },
    }

    #[async_trait]
    impl RecordSender for MockSender {
        async fn send_batch(&self, records: &[PendingRecord]) -> Result<BatchResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batches
                .lock()
                .unwrap()
                .push(records.iter().map(|r| r.timestamp).collect());

            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            if let Some(store) = &self.push_during_send {
                store.lock().await.enqueue(record("late"), 1).unwrap();
            }

            let step = {
                let mut script = self.script.lock().unwrap();
                if script.is_empty() {
                    None
                } else {
                    Some(script.remove(0))
                }
            };
            match step {
                None => Ok(BatchResult::default()),
                Some(Step::Reject(timestamps)) => Ok(BatchResult {
                    failed: timestamps
                        .into_iter()
                        .map(|timestamp| FailedRecord {
                            timestamp,
                            error: Some("sheet locked".to_string()),
                        })
                        .collect(),
                }),
                Some(Step::Error { then_offline }) => {
                    if let Some(connectivity) = then_offline {
                        connectivity.set_online(false);
                    }
                    Err(anyhow::anyhow!("boom"))
                }
            }
        }

        async fn probe(&self) -> bool {
            self.reachable.load(Ordering::SeqCst)
        }
    }

    fn record(id: &str) -> PendingRecord {
        PendingRecord {
            schedule_id: id.to_string(),
            status: None,
            note: None,
            date: "2026-10-19".to_string(),
            facility_id: None,
            vehicle_id: None,
            driver: String::new(),
            attendant: String::new(),
            timestamp: 0,
        }
    }

    fn store_with(dir: &tempfile::TempDir, count: i64) -> Arc<Mutex<Store>> {
        let mut store = Store::open(dir.path().to_path_buf()).unwrap();
        for i in 0..count {
            store.enqueue(record(&format!("S{i}")), 1000 + i).unwrap();
        }
        Arc::new(Mutex::new(store))
    }

    fn manager(store: &Arc<Mutex<Store>>, sender: &Arc<MockSender>, connectivity: &Connectivity) -> SyncManager {
        SyncManager::new(
            store.clone(),
            sender.clone(),
            connectivity.clone(),
            SyncConfig::default(),
        )
    }

    fn completed(outcome: SyncOutcome) -> SyncReport {
        match outcome {
            SyncOutcome::Completed(report) => report,
            other => panic!("expected a completed sync, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sends_in_batches_of_ten() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, 23);
        let sender = Arc::new(MockSender::default());
        let connectivity = Connectivity::default();

        let report = completed(manager(&store, &sender, &connectivity).sync().await.unwrap());

        let sizes: Vec<usize> = sender.batches.lock().unwrap().iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![10, 10, 3]);
        assert_eq!(report.delivered, 23);
        assert_eq!(report.remaining, 0);
        assert!(store.lock().await.pending().is_empty());
    }

    #[tokio::test]
    async fn test_failed_records_stay_queued() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, 3);
        let sender = Arc::new(MockSender::default());
        sender.script.lock().unwrap().push(Step::Reject(vec![1001]));
        let connectivity = Connectivity::default();

        let report = completed(manager(&store, &sender, &connectivity).sync().await.unwrap());
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.remaining, 1);

        let store = store.lock().await;
        assert!(store.pending().contains(1001));
        assert!(!store.pending().contains(1000));
    }

    #[tokio::test]
    async fn test_error_while_offline_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, 25);
        let connectivity = Connectivity::default();
        let sender = Arc::new(MockSender::default());
        sender.script.lock().unwrap().push(Step::Error {
            then_offline: Some(connectivity.clone()),
        });

        let report = completed(manager(&store, &sender, &connectivity).sync().await.unwrap());
        assert!(report.aborted_offline);
        assert_eq!(sender.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.remaining, 25);
    }

    #[tokio::test]
    async fn test_error_while_online_continues() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, 25);
        let connectivity = Connectivity::default();
        let sender = Arc::new(MockSender::default());
        sender.script.lock().unwrap().push(Step::Error { then_offline: None });

        let report = completed(manager(&store, &sender, &connectivity).sync().await.unwrap());
        assert!(!report.aborted_offline);
        assert_eq!(sender.calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.delivered, 15);
        assert_eq!(report.failed, 10);
        assert_eq!(report.remaining, 10);
    }

    #[tokio::test]
    async fn test_noop_when_offline_or_empty() {
        let dir = tempfile::tempdir().unwrap();
        let sender = Arc::new(MockSender::default());

        let empty = store_with(&dir, 0);
        let online = Connectivity::default();
        assert_eq!(
            manager(&empty, &sender, &online).sync().await.unwrap(),
            SyncOutcome::NothingToSend
        );

        let other = tempfile::tempdir().unwrap();
        let queued = store_with(&other, 2);
        let offline = Connectivity::new(false);
        assert_eq!(
            manager(&queued, &sender, &offline).sync().await.unwrap(),
            SyncOutcome::Offline
        );
        assert_eq!(sender.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_push_during_sync_survives() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, 2);
        let sender = Arc::new(MockSender {
            push_during_send: Some(store.clone()),
            ..Default::default()
        });
        let connectivity = Connectivity::default();

        let report = completed(manager(&store, &sender, &connectivity).sync().await.unwrap());
        assert_eq!(report.delivered, 2);
        assert_eq!(report.remaining, 1);

        let store = store.lock().await;
        assert_eq!(store.pending().records()[0].schedule_id, "late");
    }

    #[tokio::test]
    async fn test_push_record_queues_then_delivers() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, 0);
        let sender = Arc::new(MockSender::default());
        let connectivity = Connectivity::default();

        let (timestamp, outcome) = manager(&store, &sender, &connectivity)
            .push_record(record("S1"))
            .await
            .unwrap();
        assert!(timestamp > 0);
        assert_eq!(completed(outcome).delivered, 1);
        assert!(store.lock().await.pending().is_empty());
    }

    #[tokio::test]
    async fn test_push_record_offline_keeps_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, 0);
        let sender = Arc::new(MockSender::default());
        let connectivity = Connectivity::new(false);

        let (_, outcome) = manager(&store, &sender, &connectivity)
            .push_record(record("S1"))
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Offline);
        assert_eq!(store.lock().await.pending().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_sync_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, 1);
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let sender = Arc::new(MockSender {
            gate: Some((entered.clone(), release.clone())),
            ..Default::default()
        });
        let connectivity = Connectivity::default();
        let manager = Arc::new(manager(&store, &sender, &connectivity));

        let first = tokio::spawn({
            let manager = manager.clone();
            async move { manager.sync().await.unwrap() }
        });
        entered.notified().await;

        assert!(manager.is_running());
        assert_eq!(manager.sync().await.unwrap(), SyncOutcome::AlreadyRunning);

        release.notify_one();
        assert_eq!(completed(first.await.unwrap()).delivered, 1);
        assert!(!manager.is_running());
    }

    #[tokio::test]
    async fn test_check_connection_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, 2);
        let sender = Arc::new(MockSender::default());
        let connectivity = Connectivity::default();
        let manager = manager(&store, &sender, &connectivity);

        // Unreachable: goes offline, nothing sent
        assert_eq!(manager.check_connection().await.unwrap(), None);
        assert!(connectivity.is_offline());
        assert!(store.lock().await.status.is_offline);

        // Reachable again: back online and flushed
        sender.reachable.store(true, Ordering::SeqCst);
        let outcome = manager.check_connection().await.unwrap().unwrap();
        assert_eq!(completed(outcome).delivered, 2);
        assert!(connectivity.is_online());
        assert!(!store.lock().await.status.is_offline);

        // Online with an empty queue: nothing to do
        assert_eq!(manager.check_connection().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_keys_from_old_data_counted_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, 0);
        {
            let mut store = store.lock().await;
            let records: Vec<PendingRecord> = [1000, 1000, 1001]
                .into_iter()
                .map(|timestamp| PendingRecord { timestamp, ..record("S") })
                .collect();
            store.data.pending_records = serde_json::from_value(serde_json::json!(records)).unwrap();
        }
        let sender = Arc::new(MockSender::default());
        sender.script.lock().unwrap().push(Step::Reject(vec![1001]));
        let connectivity = Connectivity::default();

        let report = completed(manager(&store, &sender, &connectivity).sync().await.unwrap());
        assert_eq!(report.attempted, 3);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.remaining, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_flushes_on_reconnect_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, 3);
        let sender = Arc::new(MockSender::default());
        sender.reachable.store(true, Ordering::SeqCst);
        let connectivity = Connectivity::default();
        connectivity.set_online(false);
        let manager = manager(&store, &sender, &connectivity);

        // Ticks at 0s and 60s; the shutdown at 90s ends the loop
        let shutdown = tokio::time::sleep(Duration::from_secs(90));
        manager.watch(Duration::from_secs(60), shutdown).await.unwrap();

        assert!(connectivity.is_online());
        assert!(store.lock().await.pending().is_empty());
        assert_eq!(sender.calls.load(Ordering::SeqCst), 1);
    }
}
