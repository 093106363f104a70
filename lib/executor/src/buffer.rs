//! The process-wide output log buffer.
//!
//! An append-only FIFO of pending [`PendingOutputLog`] records, flushed to
//! the store on a fixed cadence and on demand. Append and drain are both
//! taken under the same lock, so the two are atomic with respect to each
//! other and per-`process_log_id` insertion order survives the drain.

use pscheduler_store::{PendingOutputLog, Store, StoreError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Process-wide singleton output buffer. Construct one per process and
/// share it via `Arc` — injected explicitly rather than held as an
/// ambient global.
#[derive(Default)]
pub struct OutputLogBuffer {
    pending: Mutex<VecDeque<PendingOutputLog>>,
}

impl OutputLogBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record. Non-blocking in the sense that it never waits on
    /// I/O — only on the in-memory lock.
    pub async fn log(&self, record: PendingOutputLog) {
        self.pending.lock().await.push_back(record);
    }

    /// Drains the current contents into one transactional insert.
    ///
    /// Returns the number of records flushed. A DB failure leaves the
    /// records unflushed (they're pushed back to the front of the queue)
    /// so the next `flush()` retries on transient database failures.
    pub async fn flush(&self, store: &Store) -> Result<usize, StoreError> {
        let mut guard = self.pending.lock().await;
        if guard.is_empty() {
            return Ok(0);
        }
        let batch: Vec<PendingOutputLog> = guard.drain(..).collect();
        drop(guard);

        let count = batch.len();
        if let Err(e) = store.insert_output_logs(&batch).await {
            let mut guard = self.pending.lock().await;
            for record in batch.into_iter().rev() {
                guard.push_front(record);
            }
            return Err(e);
        }
        Ok(count)
    }

    /// Number of records currently queued (diagnostics/tests only).
    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Whether the buffer currently holds no records.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Copies out the currently pending records without draining them
    /// (test-only; production code only ever drains via `flush`).
    #[cfg(test)]
    pub(crate) async fn snapshot(&self) -> Vec<PendingOutputLog> {
        self.pending.lock().await.iter().cloned().collect()
    }
}

/// Spawns the background task that calls `flush()` every `interval`.
///
/// DB errors inside the periodic flush are logged and swallowed: a
/// persistent outage stalls logging but must not kill the scheduler.
pub fn spawn_periodic_flush(
    buffer: Arc<OutputLogBuffer>,
    store: Store,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match buffer.flush(&store).await {
                Ok(0) => {}
                Ok(count) => tracing::debug!(flushed = count, "periodic output log flush"),
                Err(e) => tracing::warn!(error = %e, "periodic output log flush failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pscheduler_core::{OutputLogId, ProcessLogId};
    use pscheduler_store::OutputStreamKind;

    fn make_line(process_log_id: ProcessLogId, message: &str) -> PendingOutputLog {
        PendingOutputLog {
            output_log_id: OutputLogId::new(),
            process_log_id,
            message: message.to_string(),
            time: Utc::now(),
            kind: OutputStreamKind::Stdout,
        }
    }

    #[tokio::test]
    async fn log_then_len_reflects_pending_count() {
        let buffer = OutputLogBuffer::new();
        assert!(buffer.is_empty().await);
        buffer.log(make_line(ProcessLogId::new(), "hi\n")).await;
        assert_eq!(buffer.len().await, 1);
    }

    #[tokio::test]
    async fn preserves_insertion_order() {
        let buffer = OutputLogBuffer::new();
        let process_log_id = ProcessLogId::new();
        buffer.log(make_line(process_log_id, "one\n")).await;
        buffer.log(make_line(process_log_id, "two\n")).await;
        buffer.log(make_line(process_log_id, "three\n")).await;
        assert_eq!(buffer.len().await, 3);
        // order is verified at the Store::insert_output_logs boundary,
        // which inserts in the slice's iteration order.
    }
}
