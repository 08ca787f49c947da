//! Cron registry: one job per registered source plus the two maintenance
//! jobs, none of which can crash the scheduler — every failure is caught,
//! logged, and handed to an [`ErrorReporter`] tagged with the job name.

mod reporter;

pub use reporter::{ErrorReporter, TracingErrorReporter};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{error, info};

use crate::error::AppError;

/// Cadence for a registered job: either a six-field crontab string or one of
/// the structured helpers below.
#[derive(Debug, Clone)]
pub enum Cadence {
    Crontab(String),
    Daily { hour: u32, minute: u32 },
    Every { minutes: u32 },
}

impl Cadence {
    fn to_crontab(&self) -> String {
        match self {
            Cadence::Crontab(spec) => spec.clone(),
            Cadence::Daily { hour, minute } => format!("0 {minute} {hour} * * *"),
            Cadence::Every { minutes } => format!("0 */{minutes} * * * *"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("a job named {0:?} is already registered")]
    DuplicateName(String),

    #[error("no job named {0:?} is registered")]
    UnknownJob(String),

    #[error(transparent)]
    Backend(#[from] JobSchedulerError),
}

type TaskFn = Arc<dyn Fn() -> BoxFuture<'static, Result<(), AppError>> + Send + Sync>;

#[derive(Clone)]
struct RegisteredJob {
    cadence: Cadence,
    task: TaskFn,
}

/// A named, cron-driven job registry sitting on top of
/// [`tokio_cron_scheduler`]'s executor: runs in a background thread, and each
/// triggered task executes on a worker.
pub struct Scheduler {
    jobs: Mutex<HashMap<String, RegisteredJob>>,
    reporter: Arc<dyn ErrorReporter>,
    backend: Mutex<Option<JobScheduler>>,
}

impl Scheduler {
    pub fn new(reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            reporter,
            backend: Mutex::new(None),
        }
    }

    /// Register `name` to run on `cadence`. Rejects a duplicate name.
    pub fn schedule<F, Fut>(&self, name: &str, cadence: Cadence, task: F) -> Result<(), SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), AppError>> + Send + 'static,
    {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(name) {
            return Err(SchedulerError::DuplicateName(name.to_string()));
        }

        jobs.insert(
            name.to_string(),
            RegisteredJob {
                cadence,
                task: Arc::new(move || Box::pin(task())),
            },
        );
        Ok(())
    }

    pub fn list_jobs(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Run a registered job immediately, bypassing cron entirely.
    pub async fn run_job(&self, name: &str) -> Result<(), SchedulerError> {
        let job = self
            .jobs
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?;

        run_guarded(name.to_string(), job.task, self.reporter.clone()).await;
        Ok(())
    }

    /// Build the backend scheduler from every registered job and start it.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let scheduler = JobScheduler::new().await?;

        let jobs = self.jobs.lock().unwrap().clone();
        for (name, registered) in jobs {
            let crontab = registered.cadence.to_crontab();
            let reporter = self.reporter.clone();
            let task = registered.task.clone();

            let job = Job::new_async(crontab.as_str(), move |_uuid, _lock| {
                let name = name.clone();
                let reporter = reporter.clone();
                let task = task.clone();
                Box::pin(async move {
                    run_guarded(name, task, reporter).await;
                })
            })?;
            scheduler.add(job).await?;
        }

        scheduler.start().await?;
        *self.backend.lock().unwrap() = Some(scheduler);
        info!("scheduler started");
        Ok(())
    }

    /// Stop the backend scheduler; any jobs already running are allowed to
    /// finish.
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        let scheduler = self.backend.lock().unwrap().take();
        if let Some(mut scheduler) = scheduler {
            scheduler.shutdown().await?;
            info!("scheduler stopped");
        }
        Ok(())
    }

    /// Drop every registered job.
    pub fn clear_jobs(&self) {
        self.jobs.lock().unwrap().clear();
    }
}

/// Run `task`, catching any error or panic so a single job failure can never
/// take the scheduler down.
async fn run_guarded(name: String, task: TaskFn, reporter: Arc<dyn ErrorReporter>) {
    info!(job = %name, "job starting");
    match std::panic::AssertUnwindSafe(task()).catch_unwind().await {
        Ok(Ok(())) => info!(job = %name, "job finished"),
        Ok(Err(err)) => {
            error!(job = %name, error = %err, "job failed");
            reporter.report(&name, &err);
        }
        Err(_) => {
            error!(job = %name, "job panicked");
            reporter.report(&name, &PanicError);
        }
    }
}

use futures::FutureExt;

#[derive(Debug)]
struct PanicError;

impl std::fmt::Display for PanicError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job panicked")
    }
}
impl std::error::Error for PanicError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn registering_a_duplicate_name_is_rejected() {
        let scheduler = Scheduler::new(Arc::new(TracingErrorReporter));
        scheduler
            .schedule("purge", Cadence::Daily { hour: 0, minute: 0 }, || async { Ok(()) })
            .unwrap();

        let err = scheduler
            .schedule("purge", Cadence::Daily { hour: 0, minute: 0 }, || async { Ok(()) })
            .unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateName(name) if name == "purge"));
    }

    #[tokio::test]
    async fn run_job_bypasses_cron_and_executes_immediately() {
        let scheduler = Scheduler::new(Arc::new(TracingErrorReporter));
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        scheduler
            .schedule("fill_missing_tags", Cadence::Every { minutes: 5 }, move || {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .unwrap();

        scheduler.run_job("fill_missing_tags").await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn running_unknown_job_is_an_error() {
        let scheduler = Scheduler::new(Arc::new(TracingErrorReporter));
        let err = scheduler.run_job("nope").await.unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownJob(name) if name == "nope"));
    }

    #[tokio::test]
    async fn a_failing_job_is_reported_and_never_panics_the_scheduler() {
        struct CountingReporter(Arc<AtomicUsize>);
        impl ErrorReporter for CountingReporter {
            fn report(&self, _source: &str, _error: &dyn std::error::Error) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let reports = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::new(Arc::new(CountingReporter(reports.clone())));

        scheduler
            .schedule("himalayas", Cadence::Every { minutes: 60 }, || async {
                Err(AppError::Scheduler("simulated source failure".to_string()))
            })
            .unwrap();

        scheduler.run_job("himalayas").await.unwrap();
        assert_eq!(reports.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn crontab_rendering_matches_structured_cadences() {
        assert_eq!(Cadence::Daily { hour: 0, minute: 0 }.to_crontab(), "0 0 0 * * *");
        assert_eq!(Cadence::Every { minutes: 5 }.to_crontab(), "0 */5 * * * *");
    }
}
