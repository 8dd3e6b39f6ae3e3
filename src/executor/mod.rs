//! Executor lifecycle and the execution loop.
//!
//! The executor accepts a batch of proposals, hands them to the task
//! manager, and drives the cluster through them on a single worker task:
//! first the replica-movement phase, then the leadership-movement phase.
//! Progress is observed through cluster metadata; snapshots are published
//! after every transition for external observers.

mod history;
mod proposal;
mod state;
pub mod strategy;
mod task;
mod task_manager;

pub use history::HistoryRetainer;
pub use proposal::ExecutionProposal;
pub use state::{ExecutionPhase, ExecutorState};
pub use task::{ExecutionTask, TaskId, TaskKind, TaskState};
pub use task_manager::{ExecutionTasksSummary, TaskManager};

use crate::cluster::{ClusterView, MetadataClient, MetadataSource};
use crate::config::{ExecutorConfig, LEADER_ACTION_TIMEOUT_MS};
use crate::control::ControlPlane;
use crate::error::{Error, Result};
use crate::metrics::ExecutorMetrics;
use crate::monitor::LoadMonitor;
use crate::types::{BrokerId, Clock, SystemClock};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How long `shutdown` waits for the control-plane client to close.
const CONTROL_PLANE_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Default)]
struct Lifecycle {
    execution_id: Option<Uuid>,
    assigner_mode: bool,
    shutting_down: bool,
    worker: Option<JoinHandle<()>>,
}

/// State shared between the executor handle and the execution worker.
#[derive(Debug)]
struct Shared {
    status_check_interval: Duration,
    monitor_ready_max_retries: Option<usize>,
    clock: Arc<dyn Clock>,
    control_plane: Arc<dyn ControlPlane>,
    metadata: MetadataClient,
    task_manager: TaskManager,
    metrics: ExecutorMetrics,
    history: HistoryRetainer,
    published_state: RwLock<Arc<ExecutorState>>,
    stop_requested: AtomicBool,
    has_ongoing_execution: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
}

impl Shared {
    fn publish(&self, state: ExecutorState) {
        *self.published_state.write() = Arc::new(state);
    }

    /// Flip the stop flag. Returns true if this call transitioned it.
    fn stop_execution(&self) -> bool {
        if self
            .stop_requested
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.metrics.execution_stopped.inc();
            true
        } else {
            false
        }
    }
}

/// Drives execution proposals through the cluster.
///
/// At most one execution is in flight per executor instance. Lifecycle
/// operations (`execute_proposals`, `execute_demote_proposals`,
/// `set_execution_mode`, `user_triggered_stop_execution`, `shutdown`) are
/// mutually exclusive; observers read published
/// [`ExecutorState`] snapshots and the broker history key sets
/// concurrently.
#[derive(Debug)]
pub struct Executor {
    shared: Arc<Shared>,
}

impl Executor {
    /// Create an executor using the system clock.
    ///
    /// Must be called within a tokio runtime; the history expiry scan is
    /// spawned immediately.
    pub fn new(
        config: ExecutorConfig,
        control_plane: Arc<dyn ControlPlane>,
        metadata_source: Arc<dyn MetadataSource>,
    ) -> Result<Self> {
        Self::with_clock(config, control_plane, metadata_source, Arc::new(SystemClock))
    }

    /// Create an executor with an injected clock.
    pub fn with_clock(
        config: ExecutorConfig,
        control_plane: Arc<dyn ControlPlane>,
        metadata_source: Arc<dyn MetadataSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate().map_err(Error::InvalidArgument)?;

        let history = HistoryRetainer::new(
            Arc::clone(&clock),
            config.demotion_history_retention,
            config.removal_history_retention,
        );
        let task_manager = TaskManager::new(
            config.num_concurrent_partition_movements_per_broker,
            config.num_concurrent_leadership_movements,
            &config.replica_movement_strategies,
        );
        let initial_state = ExecutorState::no_task_in_progress(
            history.recently_demoted_brokers(),
            history.recently_removed_brokers(),
        );

        Ok(Self {
            shared: Arc::new(Shared {
                status_check_interval: config.progress_check_interval,
                monitor_ready_max_retries: config.monitor_ready_max_retries,
                clock,
                control_plane,
                metadata: MetadataClient::with_backoff(
                    metadata_source,
                    config.metadata_refresh_backoff,
                ),
                task_manager,
                metrics: ExecutorMetrics::new(),
                history,
                published_state: RwLock::new(Arc::new(initial_state)),
                stop_requested: AtomicBool::new(false),
                has_ongoing_execution: AtomicBool::new(false),
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        })
    }

    /// Current executor state snapshot.
    pub fn state(&self) -> Arc<ExecutorState> {
        Arc::clone(&self.shared.published_state.read())
    }

    /// Lifecycle metrics.
    pub fn metrics(&self) -> &ExecutorMetrics {
        &self.shared.metrics
    }

    /// Whether an execution is in flight.
    pub fn has_ongoing_execution(&self) -> bool {
        self.shared.has_ongoing_execution.load(Ordering::SeqCst)
    }

    /// Brokers demoted within the demotion-history retention window.
    pub fn recently_demoted_brokers(&self) -> BTreeSet<BrokerId> {
        self.shared.history.recently_demoted_brokers()
    }

    /// Brokers removed within the removal-history retention window.
    pub fn recently_removed_brokers(&self) -> BTreeSet<BrokerId> {
        self.shared.history.recently_removed_brokers()
    }

    /// Initialize proposal execution and start the execution loop.
    ///
    /// Fails with [`Error::Busy`] while another execution is in flight and
    /// with [`Error::ConcurrentReassignment`] when the control plane
    /// already reports reassignments this executor did not submit; in the
    /// latter case the task manager is cleared and metric sampling is not
    /// touched (it was never paused).
    #[allow(clippy::too_many_arguments)]
    pub async fn execute_proposals(
        &self,
        proposals: Vec<ExecutionProposal>,
        unthrottled_brokers: HashSet<BrokerId>,
        removed_brokers: HashSet<BrokerId>,
        load_monitor: Arc<dyn LoadMonitor>,
        partition_movement_concurrency: Option<usize>,
        leadership_movement_concurrency: Option<usize>,
        execution_id: Option<Uuid>,
    ) -> Result<()> {
        self.start_execution(
            proposals,
            unthrottled_brokers,
            load_monitor,
            partition_movement_concurrency,
            leadership_movement_concurrency,
            execution_id,
            None,
            Some(removed_brokers),
        )
        .await
    }

    /// Initialize proposal execution for a broker demotion.
    ///
    /// Demoted brokers are recorded in the demotion history and excluded
    /// from the per-broker concurrency check: they are being drained
    /// anyway, so over-capping them is acceptable.
    pub async fn execute_demote_proposals(
        &self,
        proposals: Vec<ExecutionProposal>,
        demoted_brokers: HashSet<BrokerId>,
        load_monitor: Arc<dyn LoadMonitor>,
        concurrent_swaps: Option<usize>,
        leadership_movement_concurrency: Option<usize>,
        execution_id: Option<Uuid>,
    ) -> Result<()> {
        self.start_execution(
            proposals,
            demoted_brokers.clone(),
            load_monitor,
            concurrent_swaps,
            leadership_movement_concurrency,
            execution_id,
            Some(demoted_brokers),
            None,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn start_execution(
        &self,
        proposals: Vec<ExecutionProposal>,
        brokers_to_skip_cap: HashSet<BrokerId>,
        load_monitor: Arc<dyn LoadMonitor>,
        partition_movement_concurrency: Option<usize>,
        leadership_movement_concurrency: Option<usize>,
        execution_id: Option<Uuid>,
        demoted_brokers: Option<HashSet<BrokerId>>,
        removed_brokers: Option<HashSet<BrokerId>>,
    ) -> Result<()> {
        // Fetched before entering the critical section; both calls are
        // read-only against external systems.
        let cluster = self.shared.metadata.refresh().await?;
        let in_flight = self.shared.control_plane.partitions_being_reassigned().await?;

        let mut lifecycle = self.shared.lifecycle.lock();
        if lifecycle.shutting_down {
            return Err(Error::Internal("executor is shut down".to_string()));
        }
        if self.shared.has_ongoing_execution.load(Ordering::SeqCst) {
            return Err(Error::Busy);
        }

        self.shared
            .task_manager
            .add_execution_proposals(proposals, &brokers_to_skip_cap, &cluster);
        self.shared
            .task_manager
            .set_requested_partition_movement_concurrency(partition_movement_concurrency);
        self.shared
            .task_manager
            .set_requested_leadership_movement_concurrency(leadership_movement_concurrency);
        if execution_id.is_none() {
            info!("Executing a request triggered by an anomaly detector");
        }
        lifecycle.execution_id = execution_id;

        if !in_flight.is_empty() {
            // Note that metric sampling is not resumed here: it was never
            // paused.
            self.shared.task_manager.clear();
            lifecycle.execution_id = None;
            return Err(Error::ConcurrentReassignment {
                partitions: in_flight.len(),
            });
        }

        if let Some(demoted) = &demoted_brokers {
            self.shared.history.record_demoted(demoted.iter().copied());
        }
        if let Some(removed) = &removed_brokers {
            self.shared.history.record_removed(removed.iter().copied());
        }

        self.shared.has_ongoing_execution.store(true, Ordering::SeqCst);
        self.shared.stop_requested.store(false, Ordering::SeqCst);
        if lifecycle.assigner_mode {
            self.shared.metrics.execution_started_assigner.inc();
        } else {
            self.shared.metrics.execution_started_rebalancer.inc();
        }

        let runner = ExecutionRunner::new(Arc::clone(&self.shared), load_monitor, execution_id);
        lifecycle.worker = Some(tokio::spawn(runner.run()));
        Ok(())
    }

    /// Set the per-broker partition movement cap. Takes effect at the
    /// next batch selection. May be called at any time.
    pub fn set_requested_partition_movement_concurrency(&self, n: Option<usize>) {
        self.shared
            .task_manager
            .set_requested_partition_movement_concurrency(n);
    }

    /// Set the leadership movement cap. Takes effect at the next batch
    /// selection. May be called at any time.
    pub fn set_requested_leadership_movement_concurrency(&self, n: Option<usize>) {
        self.shared
            .task_manager
            .set_requested_leadership_movement_concurrency(n);
    }

    /// Record whether the next execution is started in assigner mode.
    /// Determines which started counter is incremented.
    pub fn set_execution_mode(&self, assigner_mode: bool) {
        self.shared.lifecycle.lock().assigner_mode = assigner_mode;
    }

    /// Request the executor to stop any ongoing execution.
    ///
    /// Already-submitted movements are allowed to finish; no new batches
    /// are dispatched and the leadership phase is skipped.
    pub fn user_triggered_stop_execution(&self) {
        let _lifecycle = self.shared.lifecycle.lock();
        if self.shared.stop_execution() {
            self.shared.metrics.execution_stopped_by_user.inc();
        }
    }

    /// Shut down the executor: wait indefinitely for the execution worker
    /// to exit, then close the control-plane client and stop the history
    /// scan. In-flight reassignments are never interrupted.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down executor");
        let worker = {
            let mut lifecycle = self.shared.lifecycle.lock();
            lifecycle.shutting_down = true;
            if self.shared.has_ongoing_execution.load(Ordering::SeqCst) {
                warn!("Shutdown may take long because an execution is still in progress");
            }
            lifecycle.worker.take()
        };
        if let Some(handle) = worker {
            if let Err(e) = handle.await {
                warn!(error = %e, "Execution worker ended abnormally");
            }
        }
        self.shared
            .control_plane
            .close(CONTROL_PLANE_CLOSE_TIMEOUT)
            .await?;
        self.shared.history.shutdown();
        info!("Executor shutdown completed");
        Ok(())
    }
}

/// The execution worker for one batch of proposals.
///
/// Once spawned, the worker owns the task manager until its cleanup runs;
/// the executor handle keeps only a monitoring view.
struct ExecutionRunner {
    shared: Arc<Shared>,
    load_monitor: Arc<dyn LoadMonitor>,
    execution_id: Option<Uuid>,
    recently_demoted: BTreeSet<BrokerId>,
    recently_removed: BTreeSet<BrokerId>,
    phase: ExecutionPhase,
    finished_partition_movements: usize,
    finished_leadership_movements: usize,
    finished_data_movement_mb: u64,
}

impl ExecutionRunner {
    fn new(shared: Arc<Shared>, load_monitor: Arc<dyn LoadMonitor>, execution_id: Option<Uuid>) -> Self {
        let recently_demoted = shared.history.recently_demoted_brokers();
        let recently_removed = shared.history.recently_removed_brokers();
        Self {
            shared,
            load_monitor,
            execution_id,
            recently_demoted,
            recently_removed,
            phase: ExecutionPhase::NoTaskInProgress,
            finished_partition_movements: 0,
            finished_leadership_movements: 0,
            finished_data_movement_mb: 0,
        }
    }

    async fn run(mut self) {
        info!("Starting executing balancing proposals");
        if let Err(e) = self.execute().await {
            error!(error = %e, "Executor got exception during execution");
        }
        self.cleanup().await;
        info!("Execution finished");
    }

    /// Execute proposals in order: first move replicas, then transfer
    /// leadership.
    async fn execute(&mut self) -> Result<()> {
        self.phase = ExecutionPhase::StartingExecution;
        self.shared.publish(ExecutorState::starting(
            self.execution_id,
            self.recently_demoted.clone(),
            self.recently_removed.clone(),
        ));

        self.pause_metric_sampling().await?;

        if self.phase == ExecutionPhase::StartingExecution {
            self.phase = ExecutionPhase::ReplicaMovementTaskInProgress;
            self.publish_replica_movement_state();
            self.move_replicas().await?;
            self.update_ongoing_state();
        }

        if self.phase == ExecutionPhase::ReplicaMovementTaskInProgress {
            self.phase = ExecutionPhase::LeaderMovementTaskInProgress;
            self.publish_leader_movement_state();
            self.move_leaderships().await?;
            self.update_ongoing_state();
        }

        Ok(())
    }

    /// Pause metric sampling so in-flight movement does not pollute load
    /// measurements. The monitor may be transiently not-ready; retried
    /// with the progress-check interval as backoff, unbounded unless
    /// configured otherwise.
    async fn pause_metric_sampling(&self) -> Result<()> {
        let mut retries = 0usize;
        loop {
            match self
                .load_monitor
                .pause_metric_sampling("paused-before-starting-execution")
                .await
            {
                Ok(()) => return Ok(()),
                Err(Error::MonitorNotReady) => {
                    if let Some(max) = self.shared.monitor_ready_max_retries {
                        retries += 1;
                        if retries > max {
                            return Err(Error::MonitorNotReady);
                        }
                    }
                    debug!("Waiting for the load monitor to be ready to initialize the execution");
                    tokio::time::sleep(self.shared.status_check_interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn cleanup(&mut self) {
        self.load_monitor
            .resume_metric_sampling("resumed-after-completed-execution")
            .await;
        self.shared.task_manager.clear();
        self.shared.lifecycle.lock().execution_id = None;
        self.phase = ExecutionPhase::NoTaskInProgress;
        self.finished_partition_movements = 0;
        self.finished_leadership_movements = 0;
        self.finished_data_movement_mb = 0;
        self.shared.publish(ExecutorState::no_task_in_progress(
            self.recently_demoted.clone(),
            self.recently_removed.clone(),
        ));
        self.shared.has_ongoing_execution.store(false, Ordering::SeqCst);
        self.shared.stop_requested.store(false, Ordering::SeqCst);
    }

    fn stop_requested(&self) -> bool {
        self.shared.stop_requested.load(Ordering::SeqCst)
    }

    fn publish_replica_movement_state(&self) {
        self.shared.publish(ExecutorState::replica_movement_in_progress(
            self.finished_partition_movements,
            self.finished_data_movement_mb,
            self.shared.task_manager.execution_tasks_summary(),
            self.shared.task_manager.partition_movement_concurrency(),
            self.shared.task_manager.leadership_movement_concurrency(),
            self.execution_id,
            self.recently_demoted.clone(),
            self.recently_removed.clone(),
        ));
    }

    fn publish_leader_movement_state(&self) {
        self.shared.publish(ExecutorState::leader_movement_in_progress(
            self.finished_leadership_movements,
            self.shared.task_manager.execution_tasks_summary(),
            self.shared.task_manager.partition_movement_concurrency(),
            self.shared.task_manager.leadership_movement_concurrency(),
            self.execution_id,
            self.recently_demoted.clone(),
            self.recently_removed.clone(),
        ));
    }

    /// Re-publish the snapshot for the current phase, or a stopping
    /// snapshot once a stop was requested.
    fn update_ongoing_state(&mut self) {
        if !self.stop_requested() {
            match self.phase {
                ExecutionPhase::ReplicaMovementTaskInProgress => self.publish_replica_movement_state(),
                ExecutionPhase::LeaderMovementTaskInProgress => self.publish_leader_movement_state(),
                other => warn!(phase = %other, "Unexpected ongoing execution phase"),
            }
        } else {
            self.phase = ExecutionPhase::StoppingExecution;
            self.shared.publish(ExecutorState::stopping(
                self.finished_partition_movements,
                self.finished_leadership_movements,
                self.finished_data_movement_mb,
                self.shared.task_manager.execution_tasks_summary(),
                self.shared.task_manager.partition_movement_concurrency(),
                self.shared.task_manager.leadership_movement_concurrency(),
                self.execution_id,
                self.recently_demoted.clone(),
                self.recently_removed.clone(),
            ));
        }
    }

    async fn move_replicas(&mut self) -> Result<()> {
        let tm = &self.shared.task_manager;
        let total_movements = tm.remaining_replica_movements().len();
        let total_data_mb = tm.remaining_data_to_move_mb();
        info!(total_movements, total_data_mb, "Starting partition movements");

        let mut movements_to_go = total_movements;
        while (movements_to_go > 0 || !self.shared.task_manager.in_execution_tasks(None).is_empty())
            && !self.stop_requested()
        {
            let tasks = self.shared.task_manager.replica_movement_tasks();
            info!(count = tasks.len(), "Executor will execute replica movement task(s)");
            if !tasks.is_empty() {
                self.shared
                    .task_manager
                    .mark_tasks_in_progress(&tasks, self.shared.clock.now_ms());
                self.shared
                    .control_plane
                    .submit_replica_reassignments(&tasks)
                    .await?;
            }
            self.wait_for_tasks_to_finish().await;

            let tm = &self.shared.task_manager;
            movements_to_go = tm.remaining_replica_movements().len();
            let data_to_go = tm.remaining_data_to_move_mb();
            let in_execution = tm.in_execution_tasks(None).len();
            self.finished_partition_movements = total_movements - movements_to_go - in_execution;
            self.finished_data_movement_mb =
                total_data_mb - data_to_go - tm.in_execution_data_to_move_mb();
            info!(
                finished_movements = self.finished_partition_movements,
                total_movements,
                finished_data_mb = self.finished_data_movement_mb,
                total_data_mb,
                "Partition movement progress"
            );
        }

        // After the last batch returns, keep polling until the in-flight
        // set drains. The control plane then has no reassignment state
        // left for this execution, which gives a clean observation point
        // and a clean stop when the execution was stopped mid-way.
        loop {
            let in_execution = self.shared.task_manager.in_execution_tasks(None);
            if in_execution.is_empty() {
                break;
            }
            info!(
                count = in_execution.len(),
                data_mb = self.shared.task_manager.in_execution_data_to_move_mb(),
                "Waiting for in-flight tasks to finish"
            );
            self.wait_for_tasks_to_finish().await;
        }

        if self.shared.task_manager.in_progress_tasks().is_empty() {
            info!("Partition movements finished");
        } else if self.stop_requested() {
            let summary = self.shared.task_manager.execution_tasks_summary();
            info!(
                in_progress = summary.in_progress_tasks.len(),
                pending = summary.remaining_replica_movements.len(),
                aborting = summary.aborting_tasks,
                aborted = summary.aborted_tasks.len(),
                dead = summary.dead_tasks.len(),
                remaining_data_mb = summary.remaining_data_to_move_mb,
                "Partition movements stopped"
            );
        }
        Ok(())
    }

    async fn move_leaderships(&mut self) -> Result<()> {
        let total_movements = self.shared.task_manager.remaining_leadership_movements().len();
        info!(total_movements, "Starting leadership movements");
        self.finished_leadership_movements = 0;
        while !self.shared.task_manager.remaining_leadership_movements().is_empty()
            && !self.stop_requested()
        {
            self.update_ongoing_state();
            self.finished_leadership_movements += self.move_leadership_batch().await?;
            info!(
                finished_movements = self.finished_leadership_movements,
                total_movements,
                "Leadership movement progress"
            );
        }
        info!("Leadership movements finished");
        Ok(())
    }

    async fn move_leadership_batch(&mut self) -> Result<usize> {
        let tasks = self.shared.task_manager.leadership_movement_tasks();
        let batch_size = tasks.len();
        debug!(batch_size, "Executing leadership movements in a batch");
        if !tasks.is_empty() && !self.stop_requested() {
            self.shared
                .task_manager
                .mark_tasks_in_progress(&tasks, self.shared.clock.now_ms());
            self.shared
                .control_plane
                .submit_preferred_leader_election(&tasks)
                .await?;
            debug!("Waiting for leadership movement batch to finish");
            while !self.shared.task_manager.in_progress_tasks().is_empty() && !self.stop_requested()
            {
                self.wait_for_tasks_to_finish().await;
            }
        }
        Ok(batch_size)
    }

    /// One observation pass: re-submit stragglers, sleep one check
    /// interval, refresh metadata, transition every in-flight task that
    /// finished, died, or lost its partition, publish a state snapshot.
    /// Loops until some task finished or nothing is in flight. Transient
    /// control-plane and metadata errors are logged; the next poll
    /// retries.
    async fn wait_for_tasks_to_finish(&mut self) {
        let mut finished: Vec<TaskId> = Vec::new();
        loop {
            if let Err(e) = self.maybe_reexecute_tasks().await {
                warn!(error = %e, "Failed to re-submit in-flight tasks, will retry on next poll");
            }
            tokio::time::sleep(self.shared.status_check_interval).await;

            match self.shared.metadata.refresh().await {
                Ok(cluster) => {
                    let in_execution = self.shared.task_manager.in_execution_tasks(None);
                    debug!(count = in_execution.len(), "Tasks in execution");
                    let mut dead_or_aborted_transition = false;
                    for task in in_execution {
                        if cluster.partition(task.partition()).is_none() {
                            // Topic deleted mid-flight: drain the task.
                            debug!(task = %task, "Task finished because the topic has been deleted");
                            self.shared.task_manager.mark_task_aborting(&task.id);
                            self.shared.task_manager.mark_task_done(&task.id);
                            finished.push(task.id);
                        } else if self.is_task_done(&cluster, &task) {
                            self.shared.task_manager.mark_task_done(&task.id);
                            finished.push(task.id);
                        } else if self.maybe_mark_dead_or_aborting(&cluster, &task) {
                            dead_or_aborted_transition = true;
                            finished.push(task.id);
                        }
                    }
                    // A dead task means the execution as a whole cannot
                    // make safe forward progress; the control plane offers
                    // no rollback, so stop instead.
                    if dead_or_aborted_transition && !self.stop_requested() {
                        self.shared.stop_execution();
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Cluster metadata refresh failed, will retry on next poll");
                }
            }

            self.update_ongoing_state();
            if self.shared.task_manager.in_execution_tasks(None).is_empty() || !finished.is_empty()
            {
                break;
            }
        }
        info!(count = finished.len(), "Completed tasks");
    }

    /// Check task completion against the observed cluster state. The
    /// partition is known to exist in `cluster`.
    fn is_task_done(&self, cluster: &ClusterView, task: &ExecutionTask) -> bool {
        match task.kind() {
            TaskKind::ReplicaAction => {
                let current = cluster
                    .partition(task.partition())
                    .map(|p| p.replicas.as_slice())
                    .unwrap_or(&[]);
                match task.state {
                    TaskState::InProgress => task.proposal.is_completed(current),
                    // An abort may lose the race against the controller;
                    // forward completion is also acceptable.
                    TaskState::Aborting => {
                        task.proposal.is_aborted(current) || task.proposal.is_completed(current)
                    }
                    // Neither forward progress nor rollback is attempted.
                    _ => true,
                }
            }
            TaskKind::LeaderAction => match task.state {
                TaskState::InProgress => {
                    let info = match cluster.partition(task.partition()) {
                        Some(info) => info,
                        None => return true,
                    };
                    match info.leader {
                        Some(leader) if leader == task.proposal.new_leader => true,
                        // No leader right now, or the destination fell out
                        // of the ISR and can never win the election.
                        None => true,
                        Some(_) => !info.is_in_isr(task.proposal.new_leader),
                    }
                }
                _ => true,
            },
        }
    }

    /// Mark a task dead when it can no longer make progress: a leadership
    /// movement whose destination broker is gone or that outlived the
    /// leader-action timeout, or a replica movement with a destination
    /// broker missing from the cluster. Returns whether a transition
    /// happened.
    fn maybe_mark_dead_or_aborting(&self, cluster: &ClusterView, task: &ExecutionTask) -> bool {
        if !matches!(task.state, TaskState::InProgress | TaskState::Aborting) {
            return false;
        }
        match task.kind() {
            TaskKind::LeaderAction => {
                if !cluster.has_broker(task.proposal.new_leader) {
                    self.shared.task_manager.mark_task_dead(&task.id);
                    warn!(task = %task, "Killing task because the target leader is down");
                    return true;
                }
                let started = task.start_time_ms.unwrap_or(0);
                if self.shared.clock.now_ms() > started + LEADER_ACTION_TIMEOUT_MS {
                    self.shared.task_manager.mark_task_dead(&task.id);
                    warn!(
                        task = %task,
                        timeout_ms = LEADER_ACTION_TIMEOUT_MS,
                        "Failed task because it took too long to finish"
                    );
                    return true;
                }
                false
            }
            TaskKind::ReplicaAction => {
                for broker in &task.proposal.new_replicas {
                    if !cluster.has_broker(*broker) {
                        self.shared.task_manager.mark_task_dead(&task.id);
                        warn!(task = %task, broker, "Killing task because a new replica is down");
                        return true;
                    }
                }
                false
            }
        }
    }

    /// The cluster controller may silently drop submitted work. When we
    /// track more in-flight replica movements than the control plane
    /// reports, re-submit them all; task state does not change, so the
    /// re-submission is idempotent. Leadership movements are re-submitted
    /// only while no replica movement runs and no election is ongoing.
    async fn maybe_reexecute_tasks(&self) -> Result<()> {
        let replica_actions = self
            .shared
            .task_manager
            .in_execution_tasks(Some(TaskKind::ReplicaAction));
        if replica_actions.len()
            > self.shared.control_plane.partitions_being_reassigned().await?.len()
        {
            info!(count = replica_actions.len(), "Re-executing replica reassignment tasks");
            self.shared
                .control_plane
                .submit_replica_reassignments(&replica_actions)
                .await?;
        }

        if replica_actions.is_empty()
            && self.shared.control_plane.ongoing_leader_election().await?.is_empty()
        {
            let leader_actions = self
                .shared
                .task_manager
                .in_execution_tasks(Some(TaskKind::LeaderAction));
            if !leader_actions.is_empty() {
                info!(count = leader_actions.len(), "Re-executing leadership movement tasks");
                self.shared
                    .control_plane
                    .submit_preferred_leader_election(&leader_actions)
                    .await?;
            }
        }
        Ok(())
    }
}
