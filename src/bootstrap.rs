//! Process wiring: builds the source registry, store, LLM client, and
//! scheduler from a loaded [`Config`], and registers every cron job.
//!
//! Kept separate from `main.rs` so CLI commands that only need a subset
//! (e.g. `fetch`, which never touches the scheduler) can assemble just
//! what they need.

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::llm::LlmTagExtractor;
use crate::orchestrator;
use crate::scheduler::{Cadence, ErrorReporter, Scheduler, TracingErrorReporter};
use crate::sources;
use crate::store::Store;

/// One heavy-throughput source (deep pagination, many requests per run) runs
/// on a separate, less frequent slot than the twice-daily default so its
/// longer runs never crowd out the others.
const HEAVY_THROUGHPUT_SOURCE: &str = "himalayas";

pub struct App {
    pub config: Config,
    pub store: Store,
    pub scheduler: Scheduler,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let store = Store::connect(&config.database_url)?;
        let reporter: Arc<dyn ErrorReporter> = Arc::new(TracingErrorReporter);
        let scheduler = Scheduler::new(reporter);
        let app = Self { config, store, scheduler };
        app.register_jobs()?;
        Ok(app)
    }

    fn register_jobs(&self) -> Result<()> {
        let registry = sources::registry(&self.config);

        for name in registry.keys().copied() {
            let cadence = if name == HEAVY_THROUGHPUT_SOURCE {
                Cadence::Crontab("0 0 2 * * *".to_string())
            } else {
                Cadence::Crontab("0 0 1,13 * * *".to_string())
            };

            let config = self.config.clone();
            let store = self.store.clone();
            let job_name = format!("fetch_{name}");

            self.scheduler.schedule(&job_name, cadence, move || {
                let config = config.clone();
                let store = store.clone();
                async move {
                    let registry = sources::registry(&config);
                    let adapter = registry
                        .get(name)
                        .ok_or_else(|| AppError::UnknownSource(name.to_string()))?;
                    orchestrator::run_source(&store, adapter.as_ref(), &config).await?;
                    Ok(())
                }
            })?;
        }

        {
            let store = self.store.clone();
            let retention_days = self.config.job_age_limit_days;
            self.scheduler.schedule(
                "purge_old_jobs",
                Cadence::Daily { hour: 0, minute: 0 },
                move || {
                    let store = store.clone();
                    async move {
                        store
                            .purge_old_jobs(chrono::Duration::days(retention_days))
                            .await?;
                        Ok(())
                    }
                },
            )?;
        }

        {
            let store = self.store.clone();
            let config = self.config.clone();
            self.scheduler.schedule(
                "fill_missing_tags",
                Cadence::Every { minutes: 5 },
                move || {
                    let store = store.clone();
                    let llm = LlmTagExtractor::new(&config);
                    async move {
                        store.fill_missing_tags(&llm).await?;
                        Ok(())
                    }
                },
            )?;
        }

        info!(jobs = ?self.scheduler.list_jobs(), "registered scheduler jobs");
        Ok(())
    }
}
