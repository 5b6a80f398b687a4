//! The engine facade: one entry point per batch operation, plus copy and
//! safe removal.

use crate::batch::BatchRunner;
use crate::checksum::{ChecksumChecker, ChecksumRecordRepairer, RecordPolicy};
use crate::copy::{CopyEngine, CopyOptions, CopyStats};
use crate::error::Result;
use crate::journal::{EmitJournal, Journal};
use crate::metadata::{MetadataChecker, MetadataRepairer};
use crate::outcome::{BatchSummary, PrintFlags};
use crate::pool::ClientPool;
use crate::remove::{ScriptOptions, write_safe_remove_commands, write_safe_remove_script};
use crate::replicas::{ReplicaChecker, ReplicaRepairer};
use depot::{ClientFactory, ObjectPath};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};

const DEFAULT_RETRIES: usize = 2;

/// Settings common to every batch operation.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Size of the client connection pool.
    pub num_clients: usize,
    /// Number of concurrent worker tasks.
    pub num_tasks: usize,
    /// Bounded retries of transient connection failures per path.
    pub retries: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions {
            num_clients: 1,
            num_tasks: 1,
            retries: DEFAULT_RETRIES,
        }
    }
}

/// Options for [`Curator::check_checksums`].
#[derive(Debug, Clone, Default)]
pub struct CheckChecksumsOptions {
    pub batch: BatchOptions,
    pub record_policy: RecordPolicy,
    /// Print the paths of objects passing the check.
    pub print_pass: bool,
    /// Print the paths of objects failing the check.
    pub print_fail: bool,
}

/// Options for [`Curator::repair_checksums`].
#[derive(Debug, Clone, Default)]
pub struct RepairChecksumsOptions {
    pub batch: BatchOptions,
    /// Print the paths of objects that were repaired.
    pub print_repair: bool,
    /// Print the paths of objects whose repair failed.
    pub print_fail: bool,
}

/// Options for [`Curator::check_replicas`].
#[derive(Debug, Clone)]
pub struct CheckReplicasOptions {
    pub batch: BatchOptions,
    /// Expected number of valid replicas.
    pub num_replicas: usize,
    pub print_pass: bool,
    pub print_fail: bool,
}

impl Default for CheckReplicasOptions {
    fn default() -> Self {
        CheckReplicasOptions {
            batch: BatchOptions::default(),
            num_replicas: 2,
            print_pass: false,
            print_fail: false,
        }
    }
}

/// Options for [`Curator::repair_replicas`].
#[derive(Debug, Clone)]
pub struct RepairReplicasOptions {
    pub batch: BatchOptions,
    /// Target number of valid replicas.
    pub num_replicas: usize,
    /// Candidate resources for new replicas, tried in order.
    pub resources: Vec<String>,
    pub print_repair: bool,
    pub print_fail: bool,
}

impl Default for RepairReplicasOptions {
    fn default() -> Self {
        RepairReplicasOptions {
            batch: BatchOptions::default(),
            num_replicas: 2,
            resources: Vec::new(),
            print_repair: false,
            print_fail: false,
        }
    }
}

/// Options for [`Curator::check_common_metadata`].
#[derive(Debug, Clone, Default)]
pub struct CheckMetadataOptions {
    pub batch: BatchOptions,
    pub print_pass: bool,
    pub print_fail: bool,
}

/// Options for [`Curator::repair_common_metadata`].
#[derive(Debug, Clone, Default)]
pub struct RepairMetadataOptions {
    pub batch: BatchOptions,
    /// Creator recorded when creation metadata is missing; a placeholder
    /// is used when unset.
    pub creator: Option<String>,
    pub print_repair: bool,
    pub print_fail: bool,
}

/// Batch integrity/repair engine over a depot client factory.
///
/// Each batch entry point builds its own client pool and worker set, so
/// concurrency is chosen per invocation, and reads paths from any buffered
/// input stream, one per line.
pub struct Curator {
    factory: Arc<dyn ClientFactory>,
    journal: Arc<dyn Journal>,
}

impl Curator {
    /// An engine journaling through the process-wide diagnostics setup.
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Curator {
            factory,
            journal: Arc::new(EmitJournal),
        }
    }

    /// An engine with an injected journal.
    pub fn with_journal(factory: Arc<dyn ClientFactory>, journal: Arc<dyn Journal>) -> Self {
        Curator { factory, journal }
    }

    fn runner(&self, batch: &BatchOptions) -> BatchRunner {
        let pool = Arc::new(ClientPool::new(self.factory.clone(), batch.num_clients));
        BatchRunner::new(pool, batch.num_tasks, batch.retries, self.journal.clone())
    }

    /// Check that every path has consistent replica checksums matching its
    /// checksum record. Read-only.
    pub async fn check_checksums<R, W>(
        &self,
        reader: R,
        writer: W,
        options: CheckChecksumsOptions,
    ) -> Result<BatchSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let work = Arc::new(ChecksumChecker::new(
            options.record_policy,
            self.journal.clone(),
        ));
        self.runner(&options.batch)
            .run(
                reader,
                writer,
                work,
                PrintFlags {
                    passed: options.print_pass,
                    repaired: options.print_pass,
                    failed: options.print_fail,
                },
            )
            .await
    }

    /// Fill missing checksum records from consistent replica checksums.
    pub async fn repair_checksums<R, W>(
        &self,
        reader: R,
        writer: W,
        options: RepairChecksumsOptions,
    ) -> Result<BatchSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let work = Arc::new(ChecksumRecordRepairer::new(self.journal.clone()));
        self.runner(&options.batch)
            .run(
                reader,
                writer,
                work,
                PrintFlags {
                    passed: false,
                    repaired: options.print_repair,
                    failed: options.print_fail,
                },
            )
            .await
    }

    /// Check that every path has exactly the expected replica set.
    /// Read-only.
    pub async fn check_replicas<R, W>(
        &self,
        reader: R,
        writer: W,
        options: CheckReplicasOptions,
    ) -> Result<BatchSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let work = Arc::new(ReplicaChecker::new(
            options.num_replicas,
            self.journal.clone(),
        ));
        self.runner(&options.batch)
            .run(
                reader,
                writer,
                work,
                PrintFlags {
                    passed: options.print_pass,
                    repaired: options.print_pass,
                    failed: options.print_fail,
                },
            )
            .await
    }

    /// Trim invalid replicas and restore missing valid ones until every
    /// path holds the target count.
    pub async fn repair_replicas<R, W>(
        &self,
        reader: R,
        writer: W,
        options: RepairReplicasOptions,
    ) -> Result<BatchSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let work = Arc::new(ReplicaRepairer::new(
            options.num_replicas,
            options.resources,
            self.journal.clone(),
        ));
        self.runner(&options.batch)
            .run(
                reader,
                writer,
                work,
                PrintFlags {
                    passed: false,
                    repaired: options.print_repair,
                    failed: options.print_fail,
                },
            )
            .await
    }

    /// Check that common metadata is present on every path. Read-only.
    pub async fn check_common_metadata<R, W>(
        &self,
        reader: R,
        writer: W,
        options: CheckMetadataOptions,
    ) -> Result<BatchSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let work = Arc::new(MetadataChecker::new(self.journal.clone()));
        self.runner(&options.batch)
            .run(
                reader,
                writer,
                work,
                PrintFlags {
                    passed: options.print_pass,
                    repaired: options.print_pass,
                    failed: options.print_fail,
                },
            )
            .await
    }

    /// Rewrite absent or incorrect common metadata on every path.
    ///
    /// The run succeeded when the returned summary reports zero errors.
    pub async fn repair_common_metadata<R, W>(
        &self,
        reader: R,
        writer: W,
        options: RepairMetadataOptions,
    ) -> Result<BatchSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let work = Arc::new(MetadataRepairer::new(
            options.creator,
            self.journal.clone(),
        ));
        self.runner(&options.batch)
            .run(
                reader,
                writer,
                work,
                PrintFlags {
                    passed: false,
                    repaired: options.print_repair,
                    failed: options.print_fail,
                },
            )
            .await
    }

    /// Copy a collection or data object, optionally with metadata and ACL,
    /// skipping identical existing destinations when `exist_ok`.
    pub async fn copy(
        &self,
        source: &ObjectPath,
        dest: &ObjectPath,
        options: CopyOptions,
    ) -> Result<CopyStats> {
        let client = self.factory.connect().await?;
        CopyEngine::new(client.as_ref(), self.journal.clone(), options)
            .copy(source, dest)
            .await
    }

    /// Write reviewable removal commands for `target` to `writer`.
    pub async fn write_safe_remove_commands<W>(
        &self,
        target: &ObjectPath,
        writer: &mut W,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let client = self.factory.connect().await?;
        write_safe_remove_commands(client.as_ref(), target, writer).await
    }

    /// Write an executable removal script for `target` to `script_path`.
    pub async fn write_safe_remove_script(
        &self,
        target: &ObjectPath,
        script_path: &Path,
        options: ScriptOptions,
    ) -> Result<()> {
        let client = self.factory.connect().await?;
        write_safe_remove_script(client.as_ref(), target, script_path, options).await
    }
}
