//! Fixed-size thread pool running jobs to completion.
//!
//! Each submitted job becomes one task on a shared queue; `workers` threads pull
//! tasks and run them one at a time. A job never migrates between threads and is
//! never interrupted: [`JobExecutor::shutdown`] stops accepting work, lets queued
//! and running jobs finish, then joins the workers.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;

use forgebatch_core::{ConfigError, ConfigResult};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::job::{Job, JobReport, JobStatus};

pub const ENV_WORKERS: &str = "FORGEBATCH_WORKERS";

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("executor is shut down, job rejected")]
    ShutDown,

    #[error("job {name} panicked")]
    JobPanicked { name: String },

    #[error("job {name} was dropped before reporting")]
    Disconnected { name: String },

    #[error("unable to spawn executor worker")]
    Spawn(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Name for logging and worker thread names
    pub name: String,
    /// Number of worker threads
    pub workers: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: "job-executor".to_string(),
            workers: thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        }
    }
}

impl ExecutorConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Default configuration with `FORGEBATCH_WORKERS` applied when set.
    pub fn from_env() -> ConfigResult<Self> {
        Self::default().apply_env_with(|key| std::env::var(key).ok())
    }

    pub fn apply_env_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        if let Some(raw) = lookup(ENV_WORKERS) {
            self.workers = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid_env(ENV_WORKERS, raw.clone()))?;
        }
        Ok(self)
    }
}

/// Executor runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub running: usize,
}

type Task = Box<dyn FnOnce() + Send>;

/// Pending result of a submitted job.
#[derive(Debug)]
pub struct JobHandle {
    name: String,
    result: mpsc::Receiver<Result<JobReport, ExecutorError>>,
}

impl JobHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until the job has finished.
    pub fn wait(self) -> Result<JobReport, ExecutorError> {
        match self.result.recv() {
            Ok(result) => result,
            Err(_) => Err(ExecutorError::Disconnected { name: self.name }),
        }
    }

    /// The result if the job has already finished.
    pub fn try_wait(&self) -> Option<Result<JobReport, ExecutorError>> {
        match self.result.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(ExecutorError::Disconnected {
                name: self.name.clone(),
            })),
        }
    }
}

/// Runs jobs on a fixed pool of worker threads.
pub struct JobExecutor {
    name: String,
    sender: Mutex<Option<mpsc::Sender<Task>>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    stats: Arc<Mutex<ExecutorStats>>,
}

impl JobExecutor {
    /// Executor with `workers` threads and default naming.
    pub fn new(workers: usize) -> Result<Self, ExecutorError> {
        Self::with_config(ExecutorConfig::default().with_workers(workers))
    }

    pub fn with_config(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        if config.workers < 1 {
            return Err(ConfigError::invalid_argument("executor needs at least one worker").into());
        }

        let (tx, rx) = mpsc::channel::<Task>();
        let rx = Arc::new(Mutex::new(rx));
        let stats = Arc::new(Mutex::new(ExecutorStats::default()));

        let mut workers = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let rx = Arc::clone(&rx);
            let name = config.name.clone();
            let join = thread::Builder::new()
                .name(format!("{}-{}", config.name, index))
                .spawn(move || worker_loop(&name, index, rx))?;
            workers.push(join);
        }

        info!(executor = %config.name, workers = config.workers, "job executor started");
        Ok(Self {
            name: config.name,
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            stats,
        })
    }

    /// Queue a job. The returned handle yields its report once it has run.
    pub fn submit<J: Job + 'static>(&self, mut job: J) -> Result<JobHandle, ExecutorError> {
        let name = job.name().to_string();
        let (result_tx, result_rx) = mpsc::channel();
        let stats = Arc::clone(&self.stats);
        let task_name = name.clone();

        let task: Task = Box::new(move || {
            lock(&stats).running += 1;
            let result = catch_unwind(AssertUnwindSafe(|| job.call()));

            let result = {
                let mut s = lock(&stats);
                s.running = s.running.saturating_sub(1);
                match result {
                    Ok(report) => {
                        match report.status() {
                            JobStatus::Completed => s.completed += 1,
                            _ => s.failed += 1,
                        }
                        Ok(report)
                    }
                    Err(_) => {
                        s.failed += 1;
                        error!(job = %task_name, "job panicked");
                        Err(ExecutorError::JobPanicked { name: task_name })
                    }
                }
            };
            // The caller may have dropped its handle.
            let _ = result_tx.send(result);
        });

        {
            let sender = lock(&self.sender);
            let sender = sender.as_ref().ok_or(ExecutorError::ShutDown)?;
            lock(&self.stats).submitted += 1;
            if sender.send(task).is_err() {
                lock(&self.stats).submitted -= 1;
                return Err(ExecutorError::ShutDown);
            }
        }
        debug!(executor = %self.name, job = %name, "job submitted");

        Ok(JobHandle {
            name,
            result: result_rx,
        })
    }

    /// Queue several jobs, in order.
    pub fn submit_all<J, It>(&self, jobs: It) -> Result<Vec<JobHandle>, ExecutorError>
    where
        J: Job + 'static,
        It: IntoIterator<Item = J>,
    {
        jobs.into_iter().map(|job| self.submit(job)).collect()
    }

    /// Run a job on the pool and block until its report is available.
    pub fn execute<J: Job + 'static>(&self, job: J) -> Result<JobReport, ExecutorError> {
        self.submit(job)?.wait()
    }

    /// Stop accepting jobs, wait for queued and running ones, join the workers.
    ///
    /// Idempotent.
    pub fn shutdown(&self) {
        let sender = lock(&self.sender).take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let workers = std::mem::take(&mut *lock(&self.workers));
        for worker in workers {
            if worker.join().is_err() {
                error!(executor = %self.name, "executor worker panicked");
            }
        }
        info!(executor = %self.name, "job executor stopped");
    }

    pub fn is_shut_down(&self) -> bool {
        lock(&self.sender).is_none()
    }

    /// Get current executor statistics.
    pub fn stats(&self) -> ExecutorStats {
        lock(&self.stats).clone()
    }
}

impl Drop for JobExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(executor: &str, index: usize, tasks: Arc<Mutex<mpsc::Receiver<Task>>>) {
    debug!(executor = %executor, worker = index, "worker started");
    loop {
        // Holding the lock only while waiting lets other workers run tasks.
        let task = lock(&tasks).recv();
        match task {
            Ok(task) => task(),
            Err(_) => break,
        }
    }
    debug!(executor = %executor, worker = index, "worker stopped");
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
