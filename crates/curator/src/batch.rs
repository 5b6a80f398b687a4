//! The batch orchestrator: one input stream, bounded workers, one outcome
//! per path.

use crate::error::{Error, Result};
use crate::journal::Journal;
use crate::outcome::{BatchCounters, BatchSummary, PrintFlags, WorkOutcome};
use crate::pool::ClientPool;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use depot::{DepotClient, ObjectPath};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc};

/// One check or repair applied to one path on one client connection.
///
/// Implementations journal their own detail and convert their failures
/// into `Failed` outcomes; the runner only inspects outcomes to retry
/// transient connection trouble.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn run(&self, client: &dyn DepotClient, path: &ObjectPath) -> WorkOutcome;
}

/// Reads paths from an input stream and fans them out to worker tasks.
///
/// Worker count and client count are independent: workers contend for
/// pooled client handles. Output lines are written in completion order;
/// only the final counters are a fixed function of the input.
pub struct BatchRunner {
    pool: Arc<ClientPool>,
    num_tasks: usize,
    retries: usize,
    journal: Arc<dyn Journal>,
}

impl BatchRunner {
    pub fn new(
        pool: Arc<ClientPool>,
        num_tasks: usize,
        retries: usize,
        journal: Arc<dyn Journal>,
    ) -> Self {
        BatchRunner {
            pool,
            num_tasks: num_tasks.max(1),
            retries,
            journal,
        }
    }

    /// Process every path in `reader` (one per line, blank lines ignored),
    /// writing the paths of outcomes selected by `flags` to `writer`.
    ///
    /// Every input line yields exactly one outcome; per-path failures are
    /// counted and never stop the batch. Only a failure to read the input
    /// stream itself aborts the run.
    pub async fn run<R, W>(
        &self,
        reader: R,
        writer: W,
        work: Arc<dyn UnitOfWork>,
        flags: PrintFlags,
    ) -> Result<BatchSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let counters = Arc::new(BatchCounters::default());
        let writer = Arc::new(Mutex::new(writer));
        let (tx, rx) = mpsc::channel::<ObjectPath>(self.num_tasks * 2);
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = Vec::with_capacity(self.num_tasks);
        for _ in 0..self.num_tasks {
            let rx = rx.clone();
            let pool = self.pool.clone();
            let work = work.clone();
            let counters = counters.clone();
            let writer = writer.clone();
            let journal = self.journal.clone();
            let retries = self.retries;
            workers.push(tokio::spawn(async move {
                loop {
                    let next = { rx.lock().await.recv().await };
                    let Some(path) = next else { break };
                    let outcome = process_one(&pool, work.as_ref(), &path, retries).await;
                    counters.record(&outcome);
                    if flags.matches(&outcome)
                        && let Err(err) = write_line(&writer, path.as_str()).await
                    {
                        journal.error(Some(&path), &format!("output write failed: {err}"));
                    }
                }
            }));
        }

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match ObjectPath::parse(trimmed) {
                Ok(path) => {
                    if tx.send(path).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    // A malformed line still yields exactly one outcome.
                    self.journal
                        .error(None, &format!("rejected input line {trimmed:?}: {err}"));
                    let outcome = WorkOutcome::Failed(err.into());
                    counters.record(&outcome);
                    if flags.matches(&outcome)
                        && let Err(write_err) = write_line(&writer, trimmed).await
                    {
                        self.journal
                            .error(None, &format!("output write failed: {write_err}"));
                    }
                }
            }
        }
        drop(tx);

        for worker in workers {
            worker.await.expect("batch worker panicked");
        }
        writer.lock().await.flush().await?;

        let summary = counters.summary();
        self.journal.info(
            None,
            &format!(
                "batch complete: {} processed, {} passed, {} repaired, {} errors",
                summary.processed, summary.passed, summary.repaired, summary.errors
            ),
        );
        Ok(summary)
    }
}

async fn write_line<W>(writer: &Mutex<W>, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut writer = writer.lock().await;
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await
}

/// Run one unit of work, retrying transient connection failures a bounded
/// number of times on a fresh client handle.
async fn process_one(
    pool: &ClientPool,
    work: &dyn UnitOfWork,
    path: &ObjectPath,
    retries: usize,
) -> WorkOutcome {
    let attempt = || async {
        let client = pool.acquire().await?;
        match work.run(client.depot(), path).await {
            WorkOutcome::Failed(err) if err.is_transient() => {
                // The connection is suspect; do not return it to the pool.
                client.discard();
                Err(err)
            }
            outcome => Ok(outcome),
        }
    };
    attempt
        .retry(
            ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(50))
                .with_max_times(retries),
        )
        .when(Error::is_transient)
        .await
        .unwrap_or_else(WorkOutcome::Failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::MemoryJournal;
    use depot::MemoryDepot;

    /// Passes when the path exists, fails otherwise; enough to exercise
    /// the runner without any repair logic.
    struct StatWork;

    #[async_trait]
    impl UnitOfWork for StatWork {
        async fn run(&self, client: &dyn DepotClient, path: &ObjectPath) -> WorkOutcome {
            match client.stat(path).await {
                Ok(Some(_)) => WorkOutcome::Passed,
                Ok(None) => WorkOutcome::Failed(Error::Depot(depot::DepotError::NotFound {
                    path: path.clone(),
                })),
                Err(err) => WorkOutcome::Failed(Error::Depot(err)),
            }
        }
    }

    fn runner(depot: &MemoryDepot, clients: usize, tasks: usize) -> BatchRunner {
        let pool = Arc::new(ClientPool::new(depot.factory(), clients));
        BatchRunner::new(pool, tasks, 2, MemoryJournal::new())
    }

    #[tokio::test]
    async fn test_empty_input_yields_empty_summary() {
        let depot = MemoryDepot::new();
        let summary = runner(&depot, 1, 1)
            .run(
                &b""[..],
                Vec::new(),
                Arc::new(StatWork),
                PrintFlags {
                    passed: true,
                    repaired: true,
                    failed: true,
                },
            )
            .await
            .expect("run");
        assert_eq!(summary, BatchSummary::default());
    }

    #[tokio::test]
    async fn test_blank_lines_ignored_and_outcomes_conserved() {
        let depot = MemoryDepot::new();
        depot
            .put_object(
                &ObjectPath::parse("/a/x").expect("path"),
                b"1",
                &["res-a"],
            )
            .await
            .expect("put");

        let input = b"/a/x\n\n   \n/a/missing\nnot-a-path\n";
        let summary = runner(&depot, 2, 4)
            .run(
                &input[..],
                Vec::new(),
                Arc::new(StatWork),
                PrintFlags {
                    passed: false,
                    repaired: false,
                    failed: true,
                },
            )
            .await
            .expect("run");

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.processed, summary.passed + summary.errors);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_faults() {
        let depot = MemoryDepot::new();
        depot
            .put_object(
                &ObjectPath::parse("/a/x").expect("path"),
                b"1",
                &["res-a"],
            )
            .await
            .expect("put");
        // Two transient faults, then healthy: within the retry budget.
        depot.inject_call_faults(2).await;

        let summary = runner(&depot, 1, 1)
            .run(
                &b"/a/x\n"[..],
                Vec::new(),
                Arc::new(StatWork),
                PrintFlags {
                    passed: true,
                    repaired: true,
                    failed: true,
                },
            )
            .await
            .expect("run");
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.errors, 0);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausts_to_failed() {
        let depot = MemoryDepot::new();
        depot
            .put_object(
                &ObjectPath::parse("/a/x").expect("path"),
                b"1",
                &["res-a"],
            )
            .await
            .expect("put");
        // More faults than 1 attempt + 2 retries can absorb.
        depot.inject_call_faults(10).await;

        let summary = runner(&depot, 1, 1)
            .run(
                &b"/a/x\n"[..],
                Vec::new(),
                Arc::new(StatWork),
                PrintFlags {
                    passed: true,
                    repaired: true,
                    failed: true,
                },
            )
            .await
            .expect("run");
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.passed, 0);
    }
}
