//! The cooperative in-process scheduler (SPEC_FULL §4.F).
//!
//! Grounded in the teacher's `transforms::scanner::initialize_collection_scanner`: a single
//! dispatcher task built on `tokio::time::interval`, with every error from the scanned work
//! caught and logged rather than allowed to escape the loop. Generalized from the teacher's
//! one hardcoded scan into a registry of named, independently-paced jobs with their own
//! state machine, matching `original_source/services/sync_manager_service.py`'s
//! `sync_function` closure pattern (a failing sync is swallowed and recorded, never
//! re-raised).

use crate::models::JobStatus;
use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

pub type JobClosure = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

struct JobState {
    status: JobStatus,
    next_run: DateTime<Utc>,
    last_run: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

pub struct Job {
    pub name: String,
    pub interval: Duration,
    pub timeout: Duration,
    closure: JobClosure,
    state: RwLock<JobState>,
    error_count: AtomicU32,
}

impl Job {
    pub async fn status(&self) -> JobStatus {
        self.state.read().await.status
    }

    pub async fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    pub async fn last_run(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.last_run
    }

    async fn due(&self) -> bool {
        let state = self.state.read().await;
        state.status == JobStatus::Scheduled && state.next_run <= Utc::now()
    }

    /// Atomically checks `due` and flips the job to `Running` under a single write lock, so
    /// two dispatcher ticks can never both observe it `Scheduled` and spawn concurrent runs.
    async fn try_claim(&self) -> bool {
        let mut state = self.state.write().await;
        if state.status == JobStatus::Scheduled && state.next_run <= Utc::now() {
            state.status = JobStatus::Running;
            true
        } else {
            false
        }
    }

    #[tracing::instrument(name = "scheduler.run_job", skip(self), fields(job = %self.name))]
    async fn run(self: &Arc<Self>) {
        let closure = self.closure.clone();
        let result = tokio::time::timeout(self.timeout, closure()).await;

        let mut state = self.state.write().await;
        state.last_run = Some(Utc::now());
        state.next_run = Utc::now() + chrono::Duration::from_std(self.interval).unwrap_or(chrono::Duration::minutes(1));

        match result {
            Ok(Ok(())) => {
                self.error_count.store(0, Ordering::Relaxed);
                state.last_error = None;
                info!(job = %self.name, "job completed");
            }
            Ok(Err(err)) => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
                state.last_error = Some(err.to_string());
                error!(job = %self.name, error = %err, "job failed");
            }
            Err(_) => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
                state.last_error = Some("job timed out".to_string());
                warn!(job = %self.name, timeout_secs = self.timeout.as_secs(), "job timed out");
            }
        }

        if state.status == JobStatus::Running {
            state.status = JobStatus::Scheduled;
        }
    }
}

/// Registry and dispatcher for all scheduled jobs. One dispatcher task drives every job's
/// tick; per-job work runs as its own spawned task so a slow job never delays another.
pub struct Scheduler {
    jobs: RwLock<Vec<Arc<Job>>>,
    tick_interval: Duration,
}

impl Scheduler {
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            jobs: RwLock::new(Vec::new()),
            tick_interval,
        }
    }

    pub async fn register_job(&self, name: impl Into<String>, interval: Duration, timeout: Duration, closure: JobClosure) {
        let job = Arc::new(Job {
            name: name.into(),
            interval,
            timeout,
            closure,
            state: RwLock::new(JobState {
                status: JobStatus::Scheduled,
                next_run: Utc::now(),
                last_run: None,
                last_error: None,
            }),
            error_count: AtomicU32::new(0),
        });
        self.jobs.write().await.push(job);
    }

    pub async fn jobs(&self) -> Vec<Arc<Job>> {
        self.jobs.read().await.clone()
    }

    pub async fn job(&self, name: &str) -> Option<Arc<Job>> {
        self.jobs.read().await.iter().find(|j| j.name == name).cloned()
    }

    pub async fn pause(&self, name: &str) {
        if let Some(job) = self.job(name).await {
            let mut state = job.state.write().await;
            if state.status != JobStatus::Cancelled {
                state.status = JobStatus::Paused;
            }
        }
    }

    pub async fn resume(&self, name: &str) {
        if let Some(job) = self.job(name).await {
            let mut state = job.state.write().await;
            if state.status == JobStatus::Paused {
                state.status = JobStatus::Scheduled;
            }
        }
    }

    pub async fn cancel(&self, name: &str) {
        if let Some(job) = self.job(name).await {
            job.state.write().await.status = JobStatus::Cancelled;
        }
    }

    /// Run a job immediately, out-of-band. Ignored if the job is already `running`; a
    /// `paused` job resumes its paused state once the one-off run completes.
    pub async fn trigger_now(&self, name: &str) {
        let Some(job) = self.job(name).await else { return };
        let was_paused = {
            let mut state = job.state.write().await;
            match state.status {
                JobStatus::Running => return,
                JobStatus::Cancelled => return,
                JobStatus::Paused => {
                    state.status = JobStatus::Running;
                    true
                }
                JobStatus::Scheduled => {
                    state.status = JobStatus::Running;
                    false
                }
            }
        };

        job.run().await;

        if was_paused {
            let mut state = job.state.write().await;
            if state.status != JobStatus::Cancelled {
                state.status = JobStatus::Paused;
            }
        }
    }

    /// Spawns the dispatcher task. Exceptions from job work never escape `Job::run` — any
    /// panic inside a job closure is caught by the `spawn`ed task boundary, and ordinary
    /// errors are recorded on the job rather than propagated.
    #[tracing::instrument(name = "scheduler.start", skip(self))]
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.tick_interval);
            loop {
                ticker.tick().await;
                let jobs = self.jobs.read().await.clone();
                for job in jobs {
                    if job.try_claim().await {
                        tokio::spawn(async move {
                            job.run().await;
                        });
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn trigger_now_runs_a_scheduled_job_once() {
        let scheduler = Scheduler::new(Duration::from_millis(10));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        scheduler
            .register_job(
                "test",
                Duration::from_secs(3600),
                Duration::from_secs(1),
                Arc::new(move || {
                    let calls = calls_clone.clone();
                    Box::pin(async move {
                        calls.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    })
                }),
            )
            .await;

        scheduler.trigger_now("test").await;
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(scheduler.job("test").await.unwrap().status().await, JobStatus::Scheduled);
    }

    #[tokio::test]
    async fn a_failing_job_increments_error_count_without_propagating() {
        let scheduler = Scheduler::new(Duration::from_millis(10));
        scheduler
            .register_job(
                "failing",
                Duration::from_secs(3600),
                Duration::from_secs(1),
                Arc::new(|| Box::pin(async { anyhow::bail!("boom") })),
            )
            .await;

        scheduler.trigger_now("failing").await;
        let job = scheduler.job("failing").await.unwrap();
        assert_eq!(job.error_count().await, 1);
        assert_eq!(job.last_error().await.as_deref(), Some("boom"));
        assert_eq!(job.status().await, JobStatus::Scheduled);
    }

    #[tokio::test]
    async fn try_claim_is_exclusive_across_concurrent_callers() {
        let scheduler = Scheduler::new(Duration::from_millis(10));
        scheduler
            .register_job("claimed", Duration::from_secs(3600), Duration::from_secs(1), Arc::new(|| Box::pin(async { Ok(()) })))
            .await;
        let job = scheduler.job("claimed").await.unwrap();

        let (a, b) = tokio::join!(job.try_claim(), job.try_claim());
        assert_eq!([a, b].iter().filter(|claimed| **claimed).count(), 1);
        assert_eq!(job.status().await, JobStatus::Running);
    }

    #[tokio::test]
    async fn paused_job_is_not_picked_up_by_trigger_now_as_due_but_still_runs_once() {
        let scheduler = Scheduler::new(Duration::from_millis(10));
        scheduler
            .register_job("paused", Duration::from_secs(3600), Duration::from_secs(1), Arc::new(|| Box::pin(async { Ok(()) })))
            .await;
        scheduler.pause("paused").await;
        assert!(!scheduler.job("paused").await.unwrap().due().await);

        scheduler.trigger_now("paused").await;
        assert_eq!(scheduler.job("paused").await.unwrap().status().await, JobStatus::Paused);
    }
}
