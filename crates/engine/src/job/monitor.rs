//! Live, read-only view of a running job.
//!
//! A [`JobMonitor`] is a cloneable handle shared between the job and any number of
//! observers (a management endpoint, a progress bar, a test). The job pushes its
//! report into the monitor; observers either poll [`JobMonitor::snapshot`] or
//! [`subscribe`](JobMonitor::subscribe) to receive every pushed snapshot.
//!
//! ## Update frequency
//!
//! With `monitoring_enabled` the job publishes after every record and on every
//! status change. Without it, only the initial and the final report are published.
//!
//! ## Delivery
//!
//! Fan-out is best effort: each subscriber has its own unbounded channel, and
//! subscribers whose receiving side was dropped are forgotten on the next publish.

use std::sync::{Arc, Mutex, PoisonError, RwLock, mpsc};
use std::time::Duration;

use serde::Serialize;

use forgebatch_core::ExecutionId;
use forgebatch_core::format::NOT_APPLICABLE;

use super::{JobReport, JobStatus};

/// Point-in-time view of a job run, with the attribute set exposed to
/// management tools.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    pub job_name: String,
    pub execution_id: ExecutionId,
    pub data_source: String,
    pub status: JobStatus,
    /// Records the reader announced, if known.
    pub total_count: Option<u64>,
    /// Records pulled so far.
    pub input_count: u64,
    pub read_count: u64,
    pub filtered_count: String,
    pub error_count: String,
    pub success_count: String,
    pub start_time: String,
    pub end_time: String,
    pub progress: String,
}

impl MonitorSnapshot {
    pub fn of(report: &JobReport) -> Self {
        let params = report.parameters();
        let metrics = report.metrics();
        Self {
            job_name: params.name().to_string(),
            execution_id: params.execution_id(),
            data_source: params.data_source().unwrap_or(NOT_APPLICABLE).to_string(),
            status: report.status(),
            total_count: report.total_records(),
            input_count: metrics.pulled_count(),
            read_count: metrics.read_count(),
            filtered_count: report.formatted_filter_count(),
            error_count: report.formatted_error_count(),
            success_count: report.formatted_write_count(),
            start_time: report.formatted_start_time(),
            end_time: report.formatted_end_time(),
            progress: report.formatted_progress(),
        }
    }
}

/// A stream of snapshots pushed by a [`JobMonitor`].
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: mpsc::Receiver<M>,
}

impl<M> Subscription<M> {
    fn new(receiver: mpsc::Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message. Fails once the job and every monitor handle
    /// are gone.
    pub fn recv(&self) -> Result<M, mpsc::RecvError> {
        self.receiver.recv()
    }

    pub fn try_recv(&self) -> Result<M, mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain every message already delivered.
    pub fn try_iter(&self) -> mpsc::TryIter<'_, M> {
        self.receiver.try_iter()
    }
}

#[derive(Debug)]
struct Shared {
    report: RwLock<JobReport>,
    subscribers: Mutex<Vec<mpsc::Sender<MonitorSnapshot>>>,
}

/// Cloneable handle on the live report of one job.
#[derive(Debug, Clone)]
pub struct JobMonitor {
    shared: Arc<Shared>,
}

impl JobMonitor {
    pub(crate) fn new(report: JobReport) -> Self {
        Self {
            shared: Arc::new(Shared {
                report: RwLock::new(report),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Current attributes of the job.
    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot::of(&self.read())
    }

    /// Copy of the latest published report.
    pub fn report(&self) -> JobReport {
        self.read().clone()
    }

    pub fn status(&self) -> JobStatus {
        self.read().status()
    }

    /// Receive every snapshot published from now on.
    pub fn subscribe(&self) -> Subscription<MonitorSnapshot> {
        let (tx, rx) = mpsc::channel();
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        Subscription::new(rx)
    }

    pub(crate) fn publish(&self, report: &JobReport) {
        {
            let mut current = self
                .shared
                .report
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            current.clone_from(report);
        }

        let mut subscribers = self
            .shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if subscribers.is_empty() {
            return;
        }
        let snapshot = MonitorSnapshot::of(report);
        // Drop subscribers whose receiver is gone.
        subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, JobReport> {
        self.shared
            .report
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
