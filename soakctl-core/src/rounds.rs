//! Round coordinator: fan out a fixed batch of workers, join them all, repeat.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::trace;

use crate::error::{Result, SoakError};
use crate::memory::Sampler;
use crate::worker::QueryWorker;

/// Workers launched per round.
pub const WORKERS_PER_ROUND: usize = 20;

/// Totals for a run that reached its round ceiling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub rounds: u64,
    pub queries: u64,
    pub samples: u64,
}

#[derive(Debug, Clone)]
pub struct RoundCoordinator {
    rounds: u64,
    workers_per_round: usize,
}

impl RoundCoordinator {
    pub fn new(rounds: u64) -> Self {
        Self {
            rounds,
            workers_per_round: WORKERS_PER_ROUND,
        }
    }

    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Run rounds `0..rounds`, handing each completed round to `sampler`.
    ///
    /// Round N+1 is not launched until every worker of round N has been
    /// joined. The first failure ends the run and is returned as-is.
    pub async fn run<W, S>(&self, worker: Arc<W>, sampler: &mut S) -> Result<RunSummary>
    where
        W: QueryWorker + ?Sized + 'static,
        S: Sampler + ?Sized,
    {
        let mut summary = RunSummary::default();

        for round in 0..self.rounds {
            self.run_round(round, &worker).await?;
            summary.rounds += 1;
            summary.queries += self.workers_per_round as u64;

            if sampler.observe(round)? {
                summary.samples += 1;
            }
        }

        Ok(summary)
    }

    async fn run_round<W>(&self, round: u64, worker: &Arc<W>) -> Result<()>
    where
        W: QueryWorker + ?Sized + 'static,
    {
        let mut tasks = JoinSet::new();
        for _ in 0..self.workers_per_round {
            let worker = Arc::clone(worker);
            // the result set is dropped inside the task; only its size leaves
            tasks.spawn(async move { worker.run().await.map(|result| result.len()) });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(rows)) => trace!(round, rows, "worker finished"),
                // dropping `tasks` aborts whatever is still running
                Ok(Err(err)) => return Err(err),
                Err(join_err) => return Err(SoakError::worker(round, join_err.to_string())),
            }
        }

        Ok(())
    }
}
