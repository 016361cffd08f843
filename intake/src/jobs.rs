//! Detached visitor enrichment.
//!
//! Request handlers push a [`VisitorJob`] onto a bounded [`VisitorQueue`] and reply
//! right away. A single [`VisitorWorker`] pulls jobs off the queue and runs each one
//! (user-agent parsing, geo-ip lookup, record mapping, store insert) under a semaphore
//! permit. Every job resolves to a [`JobOutcome`], delivered on the job's own
//! [`JobTicket`] and on the worker's optional outcome channel, so callers can await
//! completion instead of racing it.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{debug, error, info, instrument};

use crate::classifier::Visit;
use crate::geoip::GeoIpLookup;
use crate::health::HealthHandle;
use crate::store::Store;
use crate::time::TimeSource;
use crate::user_agent::UserAgentInfo;
use crate::visitor::VisitorRecord;

/// How often an idle worker still reports itself alive.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on in-flight jobs: what a semaphore can hold and what the
/// shutdown drain can acquire in one call.
pub const MAX_CONCURRENT_JOBS: usize = if Semaphore::MAX_PERMITS < u32::MAX as usize {
    Semaphore::MAX_PERMITS
} else {
    u32::MAX as usize
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorJob {
    pub ip: String,
    pub user_agent: String,
}

impl From<Visit> for VisitorJob {
    fn from(visit: Visit) -> Self {
        Self {
            ip: visit.ip,
            user_agent: visit.user_agent,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Saved(VisitorRecord),
    StoreFailed(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("visitor queue is full")]
    Full,
    #[error("visitor queue is closed")]
    Closed,
}

struct QueuedJob {
    job: VisitorJob,
    done: oneshot::Sender<JobOutcome>,
}

/// Sending half, cloned into the router state.
#[derive(Clone)]
pub struct VisitorQueue {
    sender: mpsc::Sender<QueuedJob>,
}

/// Receiving half, owned by the worker.
pub struct PendingJobs {
    receiver: mpsc::Receiver<QueuedJob>,
}

pub struct JobTicket {
    receiver: oneshot::Receiver<JobOutcome>,
}

impl JobTicket {
    /// Resolves once the worker is done with the job, `None` if it was never run.
    pub async fn wait(self) -> Option<JobOutcome> {
        self.receiver.await.ok()
    }
}

impl VisitorQueue {
    pub fn new(capacity: usize) -> (Self, PendingJobs) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, PendingJobs { receiver })
    }

    /// Never waits: a full queue rejects the job.
    pub fn enqueue(&self, job: VisitorJob) -> Result<JobTicket, EnqueueError> {
        let (done, receiver) = oneshot::channel();
        self.sender
            .try_send(QueuedJob { job, done })
            .map_err(|err| match err {
                TrySendError::Full(_) => EnqueueError::Full,
                TrySendError::Closed(_) => EnqueueError::Closed,
            })?;
        Ok(JobTicket { receiver })
    }
}

#[derive(Clone)]
struct Enrichment {
    geoip: Arc<dyn GeoIpLookup + Send + Sync>,
    store: Arc<dyn Store + Send + Sync>,
    timesource: Arc<dyn TimeSource + Send + Sync>,
    outcomes: Option<mpsc::UnboundedSender<JobOutcome>>,
}

impl Enrichment {
    #[instrument(skip_all, fields(ip = %job.ip))]
    async fn process(&self, job: VisitorJob) -> JobOutcome {
        let agent = UserAgentInfo::parse(&job.user_agent);
        let geo = self.geoip.lookup(&job.ip).await;
        let record = VisitorRecord::build(job.ip, &agent, geo, self.timesource.current_time());

        match self.store.insert_visitor(record.clone()).await {
            Ok(()) => {
                metrics::counter!("intake_visitors_saved_total").increment(1);
                debug!("visitor saved");
                JobOutcome::Saved(record)
            }
            Err(err) => {
                crate::prometheus::report_dropped_job("store_error");
                error!("failed to save visitor: {}", err);
                JobOutcome::StoreFailed(err.to_string())
            }
        }
    }

    fn notify(&self, done: oneshot::Sender<JobOutcome>, outcome: JobOutcome) {
        if let Some(outcomes) = &self.outcomes {
            if outcomes.send(outcome.clone()).is_err() {
                debug!("outcome listener is gone");
            }
        }
        // Handlers drop their tickets, a closed receiver is expected
        if done.send(outcome).is_err() {
            debug!("job ticket was dropped before completion");
        }
    }
}

pub struct VisitorWorker {
    jobs: PendingJobs,
    enrichment: Enrichment,
    max_concurrent_jobs: usize,
    liveness: HealthHandle,
}

impl VisitorWorker {
    pub fn new(
        jobs: PendingJobs,
        geoip: Arc<dyn GeoIpLookup + Send + Sync>,
        store: Arc<dyn Store + Send + Sync>,
        timesource: Arc<dyn TimeSource + Send + Sync>,
        max_concurrent_jobs: usize,
        liveness: HealthHandle,
    ) -> Self {
        Self {
            jobs,
            enrichment: Enrichment {
                geoip,
                store,
                timesource,
                outcomes: None,
            },
            max_concurrent_jobs: max_concurrent_jobs.clamp(1, MAX_CONCURRENT_JOBS),
            liveness,
        }
    }

    /// Also publish every outcome on `outcomes`.
    pub fn with_outcomes(mut self, outcomes: mpsc::UnboundedSender<JobOutcome>) -> Self {
        self.enrichment.outcomes = Some(outcomes);
        self
    }

    /// Runs until every [`VisitorQueue`] clone is dropped, then waits for
    /// in-flight jobs before returning.
    pub async fn run(mut self) {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_jobs));
        let report_saturation = |semaphore: &Semaphore| {
            metrics::gauge!("intake_visitor_worker_saturation").set(
                1f64 - semaphore.available_permits() as f64 / self.max_concurrent_jobs as f64,
            );
        };
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);

        loop {
            let queued = tokio::select! {
                _ = heartbeat.tick() => {
                    self.liveness.report_healthy();
                    continue;
                }
                queued = self.jobs.receiver.recv() => queued,
            };
            let Some(QueuedJob { job, done }) = queued else {
                break;
            };

            report_saturation(&semaphore);
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            self.liveness.report_healthy();

            let enrichment = self.enrichment.clone();
            tokio::spawn(async move {
                let outcome = enrichment.process(job).await;
                enrichment.notify(done, outcome);
                drop(permit);
            });
        }

        info!("visitor queue closed, draining in-flight jobs");
        let max_permits = u32::try_from(self.max_concurrent_jobs).unwrap_or(u32::MAX);
        match semaphore.acquire_many(max_permits).await {
            Ok(_permits) => info!("visitor worker stopped"),
            Err(err) => error!("visitor worker stopped before draining: {}", err),
        };
    }
}
