//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Initializing storage, the admission gate and the frontier seeds
//! - Running the worker pool over the frontier
//! - Recording outcomes, retries and abandoned requests
//! - Handling suspension and resumption

use crate::admission::{AdmissionGate, CHECKPOINT_KEY};
use crate::config::Config;
use crate::crawler::classifier::{Classifier, Outcome};
use crate::crawler::enqueuer::Enqueuer;
use crate::crawler::extractor::RecordExtractor;
use crate::crawler::fetcher::{build_http_client, fetch_page};
use crate::crawler::parser::CatalogSelectors;
use crate::crawler::scheduler::Scheduler;
use crate::extension::{OutputExtension, SelectorExtension};
use crate::state::{Priority, QueuedTask, RequestState, Role};
use crate::storage::{
    CheckpointStore, Frontier, OutputSink, RunStatus, SqliteStorage, Storage, StorageError,
};
use crate::url::CatalogSite;
use crate::SweepError;
use reqwest::Client;
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::task::{Id, JoinError, JoinSet};

/// How a crawl run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The frontier was drained
    Completed,

    /// The run was suspended and can be resumed
    Suspended,
}

type TaskResult = (QueuedTask, Result<Outcome, SweepError>);

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    scheduler: Scheduler,
    client: Client,
    classifier: Arc<Classifier>,
    gate: Arc<AdmissionGate>,
    in_flight: HashMap<Id, QueuedTask>,
    run_id: i64,
    pages_handled: u64,
    started: Instant,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// The output extension, if any, is built from the `[extension]` section.
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `config_hash` - Hash of the configuration file, stored on the run
    /// * `fresh` - Whether to start a fresh crawl (clears the frontier and checkpoint)
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(SweepError)` - Failed to initialize
    pub fn new(config: Config, config_hash: &str, fresh: bool) -> Result<Self, SweepError> {
        let extension = match &config.extension {
            Some(extension) => Some(
                Arc::new(SelectorExtension::from_config(extension)?) as Arc<dyn OutputExtension>
            ),
            None => None,
        };

        Self::with_extension(config, config_hash, fresh, extension)
    }

    /// Creates a coordinator with an explicit output extension
    pub fn with_extension(
        config: Config,
        config_hash: &str,
        fresh: bool,
        extension: Option<Arc<dyn OutputExtension>>,
    ) -> Result<Self, SweepError> {
        let site = CatalogSite::from_config(&config.site)?;
        let selectors = CatalogSelectors::compile(&config.site.selectors)?;

        // Initialize storage
        let storage_path = Path::new(&config.output.database_path);
        let mut storage = SqliteStorage::new(storage_path)?;

        let reclaimed = storage.reclaim_in_progress()?;
        if reclaimed > 0 {
            tracing::info!("Returned {} interrupted requests to the queue", reclaimed);
        }

        // Create or resume run
        let run_id = if fresh {
            storage.clear_requests()?;
            storage.delete_value(CHECKPOINT_KEY)?;
            tracing::info!("Starting fresh run");
            storage.create_run(config_hash)?
        } else {
            match storage.get_latest_run()? {
                Some(run) if run.status.is_resumable() => {
                    tracing::info!("Resuming {} run {}", run.status.to_db_string(), run.id);
                    storage.update_run_status(run.id, RunStatus::Running)?;
                    run.id
                }
                Some(_) => {
                    tracing::info!("Starting new run");
                    storage.create_run(config_hash)?
                }
                None => {
                    tracing::info!("No previous runs found, starting new run");
                    storage.create_run(config_hash)?
                }
            }
        };

        let gate = Arc::new(AdmissionGate::restore(config.crawler.max_items, &storage)?);
        let storage = Arc::new(Mutex::new(storage));
        let enqueuer = Enqueuer::new(Arc::clone(&storage));

        seed_frontier(&config, &site, &gate, &enqueuer)?;

        let scheduler = Scheduler::new(&config.crawler);
        let client = build_http_client(
            &config.user_agent,
            config.proxy.as_ref(),
            scheduler.page_timeout(),
        )?;

        let classifier = Arc::new(Classifier::new(
            site,
            selectors.clone(),
            Arc::clone(&gate),
            enqueuer,
            RecordExtractor::new(selectors, extension),
        ));

        Ok(Self {
            config: Arc::new(config),
            storage,
            scheduler,
            client,
            classifier,
            gate,
            in_flight: HashMap::new(),
            run_id,
            pages_handled: 0,
            started: Instant::now(),
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Runs the crawl until the frontier is drained or SIGINT/SIGTERM arrives
    pub async fn run(&mut self) -> Result<RunOutcome, SweepError> {
        self.run_until(suspension_signal()).await
    }

    /// Runs the crawl until the frontier is drained or `suspend` resolves
    ///
    /// On suspension the admission counter is checkpointed, in-flight pages
    /// are aborted and the run is marked interrupted. Their requests return
    /// to the queue at the next startup.
    pub async fn run_until<F>(&mut self, suspend: F) -> Result<RunOutcome, SweepError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!("Starting crawl run {}", self.run_id);

        let mut workers = JoinSet::new();
        let result = self.drive(&mut workers, suspend).await;

        if let Err(e) = &result {
            tracing::error!("Crawl run {} failed: {}", self.run_id, e);
            drain(&mut workers).await;
            self.in_flight.clear();
            self.scheduler.reset();

            if let Err(flush_error) = self.gate.flush(&self.storage) {
                tracing::warn!("Failed to checkpoint admissions: {}", flush_error);
            }
            match self.lock_storage() {
                Ok(mut storage) => {
                    if let Err(status_error) =
                        storage.update_run_status(self.run_id, RunStatus::Failed)
                    {
                        tracing::warn!("Failed to mark run as failed: {}", status_error);
                    }
                }
                Err(lock_error) => tracing::warn!("{}", lock_error),
            }
        }

        result
    }

    async fn drive<F>(
        &mut self,
        workers: &mut JoinSet<TaskResult>,
        suspend: F,
    ) -> Result<RunOutcome, SweepError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(suspend);
        self.started = Instant::now();

        loop {
            while self.scheduler.has_capacity() {
                let next = self.lock_storage()?.fetch_next_request()?;
                match next {
                    Some(queued) => self.spawn_task(workers, queued),
                    None => break,
                }
            }

            if workers.is_empty() {
                tracing::info!("Frontier is empty, crawl complete");
                break;
            }

            tokio::select! {
                biased;

                _ = &mut suspend => {
                    return self.suspend(workers).await;
                }

                joined = workers.join_next_with_id() => match joined {
                    Some(Ok((id, (queued, result)))) => {
                        self.in_flight.remove(&id);
                        self.finish_task(queued, result)?;
                    }
                    Some(Err(e)) => self.finish_lost_task(e)?,
                    None => {}
                },
            }
        }

        self.gate.flush(&self.storage)?;
        self.lock_storage()?.complete_run(self.run_id)?;

        tracing::info!(
            "Crawl completed: {} pages handled, {} items admitted in {:?}",
            self.pages_handled,
            self.gate.items_enqueued(),
            self.started.elapsed()
        );

        Ok(RunOutcome::Completed)
    }

    fn spawn_task(&mut self, workers: &mut JoinSet<TaskResult>, queued: QueuedTask) {
        let client = self.client.clone();
        let classifier = Arc::clone(&self.classifier);
        let delay = self.scheduler.request_delay();
        let timeout = self.scheduler.page_timeout();

        self.scheduler.task_started();
        let tracked = queued.clone();
        let handle = workers.spawn(async move {
            let url = queued.url().to_string();

            let handled = tokio::time::timeout(timeout, async {
                tokio::time::sleep(delay).await;
                tracing::info!("Processing {}...", url);

                let page = fetch_page(&client, &url).await?;
                classifier.handle(&queued, &page)
            })
            .await;

            let result = handled.unwrap_or_else(|_| {
                Err(SweepError::Timeout {
                    url: url.clone(),
                    secs: timeout.as_secs(),
                })
            });

            (queued, result)
        });
        self.in_flight.insert(handle.id(), tracked);
    }

    /// Records a worker that ended without returning its task
    ///
    /// A panicked page is retried and abandoned like any other failed page.
    fn finish_lost_task(&mut self, error: JoinError) -> Result<(), SweepError> {
        let Some(queued) = self.in_flight.remove(&error.id()) else {
            self.scheduler.task_finished(false);
            tracing::error!("Untracked worker task failed: {}", error);
            return Ok(());
        };

        let message = if error.is_panic() {
            panic_message(error.into_panic())
        } else {
            error.to_string()
        };
        tracing::error!("Worker handling {} panicked: {}", queued.url(), message);

        let url = queued.url().to_string();
        self.finish_task(queued, Err(SweepError::WorkerPanicked { url, message }))
    }

    /// Records the result of a finished page
    ///
    /// Fatal errors are returned; every other error is retried by the
    /// frontier until the retry budget is spent.
    fn finish_task(
        &mut self,
        queued: QueuedTask,
        result: Result<Outcome, SweepError>,
    ) -> Result<(), SweepError> {
        match result {
            Ok(Outcome::Record(record)) => {
                let mut storage = self.lock_storage()?;
                storage.push_record(self.run_id, queued.url(), &record)?;
                storage.mark_handled(queued.id)?;
                drop(storage);

                self.scheduler.task_finished(true);
                self.page_handled()?;
            }
            Ok(Outcome::Listing(outcome)) => {
                self.lock_storage()?.mark_handled(queued.id)?;
                tracing::debug!(
                    "Listing {} admitted {} items ({} known): {:?}",
                    queued.url(),
                    outcome.items_admitted,
                    outcome.duplicates,
                    outcome.stop
                );

                self.scheduler.task_finished(true);
                self.page_handled()?;
            }
            Err(e) if e.is_fatal() => {
                self.scheduler.task_finished(false);
                return Err(e);
            }
            Err(e) => {
                self.scheduler.task_finished(false);
                let state = self.lock_storage()?.reclaim_or_fail(
                    queued.id,
                    &e.to_string(),
                    self.config.crawler.max_request_retries,
                )?;

                if state == RequestState::Failed {
                    tracing::warn!(
                        "Request {} failed {} times",
                        queued.url(),
                        queued.retry_count + 1
                    );
                } else {
                    tracing::debug!("Retrying {}: {}", queued.url(), e);
                }
            }
        }

        Ok(())
    }

    /// Counts a handled page and logs progress every 10 pages
    fn page_handled(&mut self) -> Result<(), SweepError> {
        self.pages_handled += 1;
        if self.pages_handled % 10 != 0 {
            return Ok(());
        }

        let pending = self.lock_storage()?.pending_count()?;
        let rate = self.pages_handled as f64 / self.started.elapsed().as_secs_f64().max(0.001);
        tracing::info!(
            "Progress: {} pages handled, {} pending, {} items admitted, {:.2} pages/sec",
            self.pages_handled,
            pending,
            self.gate.items_enqueued(),
            rate
        );
        Ok(())
    }

    async fn suspend(
        &mut self,
        workers: &mut JoinSet<TaskResult>,
    ) -> Result<RunOutcome, SweepError> {
        tracing::info!("Suspending crawl run {}", self.run_id);
        self.gate.flush(&self.storage)?;

        drain(workers).await;
        self.in_flight.clear();
        self.scheduler.reset();

        // Workers may have admitted items between the first flush and the abort.
        self.gate.flush(&self.storage)?;
        self.lock_storage()?
            .update_run_status(self.run_id, RunStatus::Interrupted)?;

        tracing::info!(
            "Run {} suspended with {} items admitted",
            self.run_id,
            self.gate.items_enqueued()
        );
        Ok(RunOutcome::Suspended)
    }

    fn lock_storage(&self) -> Result<MutexGuard<'_, SqliteStorage>, SweepError> {
        self.storage.lock().map_err(|e| {
            SweepError::Storage(StorageError::Database(format!(
                "Failed to lock storage: {}",
                e
            )))
        })
    }
}

/// Enqueues the configured start URLs
///
/// Item-detail seeds go through the admission gate; the loop stops as soon
/// as the gate denies. Seeds outside the catalog are skipped.
fn seed_frontier(
    config: &Config,
    site: &CatalogSite,
    gate: &AdmissionGate,
    enqueuer: &Enqueuer,
) -> Result<(), SweepError> {
    for start in &config.start_urls {
        if !gate.admitted() {
            tracing::info!("Item limit reached, ignoring remaining start URLs");
            break;
        }

        match site.classify_seed(&start.url) {
            Some(Role::ItemDetail) => {
                gate.admit(|| {
                    enqueuer.enqueue(&start.url, Role::ItemDetail, Priority::High, None)
                })?;
            }
            Some(role) => {
                enqueuer.enqueue(&start.url, role, Priority::Normal, None)?;
            }
            None => {
                tracing::warn!(
                    "Skipping start URL {} outside {}",
                    start.url,
                    site.base_url()
                );
            }
        }
    }

    Ok(())
}

/// Extracts the payload of a worker panic
fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => message.to_string(),
            Err(_) => "unknown panic".to_string(),
        },
    }
}

/// Aborts every worker and waits for them to stop
async fn drain(workers: &mut JoinSet<TaskResult>) {
    workers.abort_all();
    while workers.join_next().await.is_some() {}
}

/// Resolves on SIGINT or SIGTERM
pub async fn suspension_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Runs the main crawl operation
///
/// This function orchestrates the entire crawl process:
///
/// 1. Open storage and resume the interrupted run, or start a new one
/// 2. Restore the admission counter from the checkpoint
/// 3. Seed the frontier with the start URLs
/// 4. Handle pages until the frontier is drained or a signal arrives
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration file
/// * `fresh` - Whether to discard previous crawl state
///
/// # Returns
///
/// * `Ok(RunOutcome)` - The run completed or was suspended
/// * `Err(SweepError)` - The run failed with a fatal error
///
/// # Example
///
/// ```no_run
/// use catalog_sweep::config::load_config_with_hash;
/// use catalog_sweep::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("config.toml"))?;
/// run_crawl(config, &hash, false).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    config_hash: &str,
    fresh: bool,
) -> Result<RunOutcome, SweepError> {
    let mut coordinator = Coordinator::new(config, config_hash, fresh)?;
    coordinator.run().await
}
