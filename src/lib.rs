//! Concurrency-bounded rebalance execution engine for partitioned,
//! replicated log clusters.
//!
//! Given a batch of execution proposals produced by an upstream optimizer,
//! the [`Executor`] drives the cluster through them safely:
//!
//! - **Caps** — per-broker replica-movement concurrency and cluster-wide
//!   leadership-movement concurrency, adjustable mid-execution.
//! - **Observation** — progress is read back from cluster metadata, never
//!   assumed from submission.
//! - **Cancellation** — a stop request prevents new batches and skips the
//!   leadership phase; already-submitted movements finish, because the
//!   control plane cannot revoke them.
//! - **Dead-task detection** — movements whose destination brokers are
//!   gone, or leadership movements that time out, are marked dead and
//!   stop the execution.
//!
//! The engine decides *how* and *when* to apply proposals, never *what*
//! to move. The proposal optimizer, the metric sampler, and the concrete
//! coordination-store client are external collaborators behind the
//! [`ControlPlane`], [`MetadataSource`], and [`LoadMonitor`] seams.
//!
//! # Example
//!
//! ```rust,no_run
//! use drover::{Executor, ExecutorConfig, ExecutionProposal, TopicPartition};
//! use drover::control::NoopControlPlane;
//! use std::collections::HashSet;
//! use std::sync::Arc;
//!
//! # #[derive(Debug)] struct MySource;
//! # #[async_trait::async_trait]
//! # impl drover::cluster::MetadataSource for MySource {
//! #     async fn fetch(&self) -> drover::Result<drover::cluster::ClusterView> {
//! #         Ok(drover::cluster::ClusterView::default())
//! #     }
//! # }
//! # #[derive(Debug)] struct MyMonitor;
//! # #[async_trait::async_trait]
//! # impl drover::monitor::LoadMonitor for MyMonitor {
//! #     async fn pause_metric_sampling(&self, _: &str) -> drover::Result<()> { Ok(()) }
//! #     async fn resume_metric_sampling(&self, _: &str) {}
//! # }
//! #[tokio::main]
//! async fn main() -> drover::Result<()> {
//!     let executor = Executor::new(
//!         ExecutorConfig::new().with_partition_movement_concurrency(5),
//!         Arc::new(NoopControlPlane),
//!         Arc::new(MySource),
//!     )?;
//!
//!     let proposal = ExecutionProposal::new(
//!         TopicPartition::new("events", 0),
//!         vec![1, 2, 3],
//!         vec![1, 2, 4],
//!         1,
//!         1,
//!         100,
//!     );
//!     executor
//!         .execute_proposals(
//!             vec![proposal],
//!             HashSet::new(),
//!             HashSet::new(),
//!             Arc::new(MyMonitor),
//!             None,
//!             None,
//!             None,
//!         )
//!         .await?;
//!
//!     // Observers poll the published snapshot while the worker runs.
//!     println!("{}", executor.state().phase);
//!     executor.shutdown().await
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              Executor (lifecycle)            │
//! │  execute / stop / shutdown / state()         │
//! └──────────────────────────────────────────────┘
//!                      │ spawns one worker per execution
//!                      ▼
//! ┌──────────────────────────────────────────────┐
//! │   Execution loop: replica phase, then        │
//! │   leadership phase; batch → submit → poll    │
//! └──────────────────────────────────────────────┘
//!        │                │                │
//!        ▼                ▼                ▼
//! ┌────────────┐   ┌─────────────┐   ┌───────────┐
//! │TaskManager │   │ControlPlane │   │ClusterView│
//! │caps, states│   │ submissions │   │ metadata  │
//! └────────────┘   └─────────────┘   └───────────┘
//! ```

pub mod cluster;
pub mod config;
pub mod control;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod monitor;
pub mod testing;
pub mod types;

pub use cluster::{ClusterView, ClusterViewBuilder, MetadataClient, MetadataSource};
pub use config::ExecutorConfig;
pub use control::ControlPlane;
pub use error::{Error, Result};
pub use executor::{
    ExecutionPhase, ExecutionProposal, ExecutionTask, ExecutionTasksSummary, Executor,
    ExecutorState, TaskId, TaskKind, TaskState,
};
pub use metrics::{ExecutorMetrics, ExecutorMetricsSnapshot};
pub use monitor::LoadMonitor;
pub use types::{BrokerId, Clock, PartitionInfo, SystemClock, TopicPartition};
