use std::sync::Arc;
use std::time::Duration;
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use log::{info, warn, error};

use crate::config::Config;
use crate::data::fetcher::Fetcher;
use crate::data::parser::ResponseParser;
use crate::data::pubsub::Broadcaster;

/// When poll cycles run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub initial_delay: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl PollSchedule {
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.poll_initial_delay_ms),
            min_delay: Duration::from_millis(config.poll_min_delay_ms),
            max_delay: Duration::from_millis(config.poll_max_delay_ms),
        }
    }

    /// Uniform draw from `[min_delay, max_delay]`, millisecond resolution.
    pub fn next_delay(&self) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = (self.max_delay.as_millis() as u64).max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Broadcast { records: usize, subscribers: usize },
    NoData,
    Failed,
}

/// Drives fetch → parse → broadcast on a jittered schedule.
pub struct Poller {
    fetcher: Fetcher,
    broadcaster: Arc<Broadcaster>,
    index_name: String,
    schedule: PollSchedule,
}

impl Poller {
    pub fn new(fetcher: Fetcher, broadcaster: Arc<Broadcaster>, index_name: String, schedule: PollSchedule) -> Self {
        Self {
            fetcher,
            broadcaster,
            index_name,
            schedule,
        }
    }

    /// One full cycle. Never fails; every error is logged here.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let body = match self.fetcher.fetch(&self.index_name).await {
            Ok(Some(body)) => body,
            Ok(None) => return CycleOutcome::NoData,
            Err(e) => {
                error!("Error fetching NSE data: {}", e);
                return CycleOutcome::Failed;
            }
        };

        let records = match ResponseParser::parse(&body) {
            Some(records) => records,
            None => {
                warn!("NSE response for {} had no usable data array", self.index_name);
                return CycleOutcome::NoData;
            }
        };

        let record_count = records.len();
        let subscribers = self.broadcaster.broadcast(records);
        CycleOutcome::Broadcast { records: record_count, subscribers }
    }

    /// Run cycles until `shutdown` fires. The next sleep only starts once the
    /// previous cycle has returned, so cycles never overlap.
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut delay = self.schedule.initial_delay;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                // also fires if the handle was dropped
                _ = shutdown.changed() => break,
            }

            self.run_cycle().await;

            delay = self.schedule.next_delay();
            info!("Next NSE data fetch scheduled in {} seconds", delay.as_secs());
        }

        info!("🛑 Poller stopped");
    }

    pub fn spawn(self) -> PollerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        info!("🚀 Starting NSE poller for {} (first fetch in {} ms)",
              self.index_name, self.schedule.initial_delay.as_millis());
        let task = tokio::spawn(self.run(shutdown_rx));

        PollerHandle { shutdown_tx, task }
    }
}

pub struct PollerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop scheduling cycles and wait for the loop to exit. A cycle that is
    /// already running is allowed to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            error!("Poller task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
