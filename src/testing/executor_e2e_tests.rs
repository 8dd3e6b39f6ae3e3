//! End-to-end tests for the execution engine.
//!
//! Every test drives a real `Executor` against the scriptable mocks: the
//! test mutates the cluster view between polls the way a controller
//! would, and observes progress through published state snapshots,
//! recorded submissions, and lifecycle metrics.

#[cfg(test)]
mod tests {
    use crate::cluster::ClusterViewBuilder;
    use crate::config::ExecutorConfig;
    use crate::error::Error;
    use crate::executor::{ExecutionPhase, ExecutionProposal, Executor};
    use crate::testing::{
        wait_until, ManualClock, MockControlPlane, MockLoadMonitor, MutableClusterSource,
    };
    use crate::types::{BrokerId, PartitionInfo, TopicPartition};
    use std::collections::{BTreeSet, HashSet};
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    const WAIT: Duration = Duration::from_secs(5);

    struct Harness {
        executor: Executor,
        cluster: Arc<MutableClusterSource>,
        control_plane: Arc<MockControlPlane>,
        monitor: Arc<MockLoadMonitor>,
        clock: Arc<ManualClock>,
    }

    fn test_config() -> ExecutorConfig {
        ExecutorConfig::new()
            .with_progress_check_interval(Duration::from_millis(5))
            .with_metadata_refresh_backoff(Duration::ZERO)
    }

    fn harness(cluster: MutableClusterSource) -> Harness {
        harness_with(test_config(), cluster, MockControlPlane::new(), MockLoadMonitor::new())
    }

    fn harness_with(
        config: ExecutorConfig,
        cluster: MutableClusterSource,
        control_plane: MockControlPlane,
        monitor: MockLoadMonitor,
    ) -> Harness {
        let cluster = Arc::new(cluster);
        let control_plane = Arc::new(control_plane);
        let clock = Arc::new(ManualClock::new(1_000_000));
        let executor = Executor::with_clock(
            config,
            Arc::clone(&control_plane) as Arc<dyn crate::control::ControlPlane>,
            Arc::clone(&cluster) as Arc<dyn crate::cluster::MetadataSource>,
            Arc::clone(&clock) as Arc<dyn crate::types::Clock>,
        )
        .expect("valid config");
        Harness {
            executor,
            cluster,
            control_plane,
            monitor: Arc::new(monitor),
            clock,
        }
    }

    impl Harness {
        async fn execute(
            &self,
            proposals: Vec<ExecutionProposal>,
            partition_concurrency: Option<usize>,
        ) -> crate::error::Result<()> {
            self.executor
                .execute_proposals(
                    proposals,
                    HashSet::new(),
                    HashSet::new(),
                    Arc::clone(&self.monitor) as Arc<dyn crate::monitor::LoadMonitor>,
                    partition_concurrency,
                    None,
                    None,
                )
                .await
        }

        /// Let the scripted cluster reach a task's target replica list.
        fn complete_replica_move(&self, tp: &TopicPartition, new_replicas: Vec<BrokerId>) {
            self.cluster.apply_reassignment(tp, new_replicas);
            self.control_plane.finish_reassignment(tp);
        }

        async fn wait_done(&self) {
            assert!(
                wait_until(|| !self.executor.has_ongoing_execution(), WAIT).await,
                "execution did not finish"
            );
        }

        async fn wait_replica_submissions(&self, count: usize) {
            assert!(
                wait_until(|| self.control_plane.replica_submissions().len() >= count, WAIT).await,
                "expected at least {count} replica submissions"
            );
        }
    }

    fn replica_proposal(
        tp: TopicPartition,
        old: Vec<BrokerId>,
        new: Vec<BrokerId>,
        data_mb: u64,
    ) -> ExecutionProposal {
        let old_leader = old[0];
        ExecutionProposal::new(tp, old, new, old_leader, old_leader, data_mb)
    }

    #[tokio::test]
    async fn test_happy_path_single_replica_move() {
        let tp = TopicPartition::new("T", 0);
        let h = harness(MutableClusterSource::new(
            ClusterViewBuilder::new()
                .broker(4)
                .partition(tp.clone(), PartitionInfo::new(vec![1, 2, 3], vec![1, 2, 3], Some(1)))
                .build(),
        ));

        h.execute(
            vec![replica_proposal(tp.clone(), vec![1, 2, 3], vec![1, 2, 4], 100)],
            None,
        )
        .await
        .expect("execution accepted");
        assert!(h.executor.has_ongoing_execution());

        h.wait_replica_submissions(1).await;
        let submissions = h.control_plane.replica_submissions();
        assert_eq!(submissions[0].len(), 1);
        assert_eq!(submissions[0][0].partition, tp);
        assert_eq!(h.executor.state().phase, ExecutionPhase::ReplicaMovementTaskInProgress);

        h.complete_replica_move(&tp, vec![1, 2, 4]);
        h.wait_done().await;

        let state = h.executor.state();
        assert_eq!(state.phase, ExecutionPhase::NoTaskInProgress);
        assert!(h.control_plane.election_submissions().is_empty());
        assert_eq!(h.monitor.pause_count(), 1);
        assert_eq!(h.monitor.resume_count(), 1);

        let metrics = h.executor.metrics().snapshot();
        assert_eq!(metrics.execution_started_rebalancer, 1);
        assert_eq!(metrics.execution_started_assigner, 0);
        assert_eq!(metrics.execution_stopped, 0);
        assert_eq!(metrics.execution_stopped_by_user, 0);
    }

    #[tokio::test]
    async fn test_per_broker_cap_enforced() {
        let tp1 = TopicPartition::new("T", 1);
        let tp2 = TopicPartition::new("T", 2);
        let h = harness(MutableClusterSource::new(
            ClusterViewBuilder::new()
                .broker(5)
                .partition(tp1.clone(), PartitionInfo::new(vec![1], vec![1], Some(1)))
                .partition(tp2.clone(), PartitionInfo::new(vec![2], vec![2], Some(2)))
                .build(),
        ));

        h.execute(
            vec![
                replica_proposal(tp1.clone(), vec![1], vec![5], 10),
                replica_proposal(tp2.clone(), vec![2], vec![5], 10),
            ],
            Some(1),
        )
        .await
        .expect("execution accepted");

        // Only the first task fits: broker 5 is involved in both.
        h.wait_replica_submissions(1).await;
        assert_eq!(h.control_plane.replica_submissions()[0], vec![replica_task_id(&tp1)]);

        // The second stays pending while the first is in flight.
        assert!(
            wait_until(
                || {
                    let state = h.executor.state();
                    state.task_summary.as_ref().is_some_and(|s| {
                        s.in_execution_tasks.len() == 1
                            && s.remaining_replica_movements.len() == 1
                            && s.remaining_replica_movements[0].partition() == &tp2
                    })
                },
                WAIT
            )
            .await,
            "second task should stay pending under the cap"
        );

        h.complete_replica_move(&tp1, vec![5]);
        assert!(
            wait_until(
                || {
                    h.control_plane
                        .replica_submissions()
                        .iter()
                        .any(|s| s == &vec![replica_task_id(&tp2)])
                },
                WAIT
            )
            .await,
            "second task should be dispatched once the first completes"
        );

        // Progress accounting: one finished, one in flight, none pending.
        assert!(
            wait_until(
                || {
                    let state = h.executor.state();
                    state.finished_partition_movements == 1
                        && state.finished_data_movement_mb == 10
                },
                WAIT
            )
            .await,
            "finished counters should reflect the first movement"
        );

        h.complete_replica_move(&tp2, vec![5]);
        h.wait_done().await;

        // The cap kept every batch at one task.
        for submission in h.control_plane.replica_submissions() {
            assert!(submission.len() <= 1);
        }
    }

    fn replica_task_id(tp: &TopicPartition) -> crate::executor::TaskId {
        crate::executor::TaskId {
            partition: tp.clone(),
            kind: crate::executor::TaskKind::ReplicaAction,
        }
    }

    #[tokio::test]
    async fn test_user_stop_skips_remaining_batches_and_leader_phase() {
        let mut builder = ClusterViewBuilder::new();
        let mut proposals = Vec::new();
        for i in 0..10u32 {
            let tp = TopicPartition::new("S", i);
            let old = vec![9, 10 + i as BrokerId];
            let new = vec![9, 20 + i as BrokerId];
            builder = builder.partition(
                tp.clone(),
                PartitionInfo::new(old.clone(), old.clone(), Some(9)),
            );
            builder = builder.broker(20 + i as BrokerId);
            proposals.push(replica_proposal(tp, old, new, 10));
        }
        let h = harness(MutableClusterSource::new(builder.build()));

        // Every proposal involves broker 9; cap 2 makes the first batch 2.
        h.execute(proposals, Some(2)).await.expect("execution accepted");
        h.wait_replica_submissions(1).await;
        let first_batch = h.control_plane.replica_submissions()[0].clone();
        assert_eq!(first_batch.len(), 2);

        h.executor.user_triggered_stop_execution();

        // The two in-flight moves are allowed to finish.
        for (i, id) in first_batch.iter().enumerate() {
            h.complete_replica_move(&id.partition, vec![9, 20 + i as BrokerId]);
        }
        h.wait_done().await;

        // No batch beyond the first two tasks was ever dispatched, and the
        // leadership phase was skipped entirely.
        let first: BTreeSet<_> = first_batch.iter().map(|id| id.partition.clone()).collect();
        for submission in h.control_plane.replica_submissions() {
            for id in submission {
                assert!(first.contains(&id.partition));
            }
        }
        assert!(h.control_plane.election_submissions().is_empty());

        let metrics = h.executor.metrics().snapshot();
        assert_eq!(metrics.execution_stopped_by_user, 1);
        assert_eq!(metrics.execution_stopped, 1);
        assert_eq!(h.executor.state().phase, ExecutionPhase::NoTaskInProgress);
    }

    #[tokio::test]
    async fn test_leader_action_timeout_marks_task_dead_and_stops() {
        let tp = TopicPartition::new("L", 0);
        let h = harness(MutableClusterSource::new(
            ClusterViewBuilder::new()
                .partition(tp.clone(), PartitionInfo::new(vec![1, 2], vec![1, 2], Some(1)))
                .build(),
        ));

        // Leader-only proposal; the destination is in the ISR but is never
        // elected.
        let proposal = ExecutionProposal::new(tp.clone(), vec![1, 2], vec![1, 2], 1, 2, 0);
        h.execute(vec![proposal], None).await.expect("execution accepted");

        assert!(
            wait_until(|| !h.control_plane.election_submissions().is_empty(), WAIT).await,
            "leader election should be submitted"
        );

        h.clock.advance(180_001);
        h.wait_done().await;

        let metrics = h.executor.metrics().snapshot();
        assert_eq!(metrics.execution_stopped, 1);
        assert_eq!(metrics.execution_stopped_by_user, 0);
        assert_eq!(h.executor.state().phase, ExecutionPhase::NoTaskInProgress);
    }

    #[tokio::test]
    async fn test_topic_deletion_aborts_task_without_stopping() {
        let tp0 = TopicPartition::new("D", 0);
        let tp1 = TopicPartition::new("D", 1);
        let h = harness(MutableClusterSource::new(
            ClusterViewBuilder::new()
                .brokers([3, 4])
                .partition(tp0.clone(), PartitionInfo::new(vec![1, 2], vec![1, 2], Some(1)))
                .partition(tp1.clone(), PartitionInfo::new(vec![1, 2], vec![1, 2], Some(1)))
                .build(),
        ));

        h.execute(
            vec![
                replica_proposal(tp0.clone(), vec![1, 2], vec![1, 3], 10),
                replica_proposal(tp1.clone(), vec![1, 2], vec![1, 4], 10),
            ],
            None,
        )
        .await
        .expect("execution accepted");
        h.wait_replica_submissions(1).await;

        // The topic of the first task disappears mid-flight.
        h.cluster.remove_partition(&tp0);
        assert!(
            wait_until(
                || {
                    let state = h.executor.state();
                    state
                        .task_summary
                        .as_ref()
                        .is_some_and(|s| s.aborted_tasks.len() == 1)
                },
                WAIT
            )
            .await,
            "deleted-topic task should drain to aborted"
        );

        // The other task is unaffected and completes normally.
        h.complete_replica_move(&tp1, vec![1, 4]);
        h.wait_done().await;

        let metrics = h.executor.metrics().snapshot();
        assert_eq!(metrics.execution_stopped, 0);
        assert_eq!(metrics.execution_stopped_by_user, 0);
    }

    #[tokio::test]
    async fn test_concurrent_external_reassignment_rejected_at_start() {
        let tp = TopicPartition::new("T", 0);
        let h = harness_with(
            test_config(),
            MutableClusterSource::new(
                ClusterViewBuilder::new()
                    .broker(4)
                    .partition(tp.clone(), PartitionInfo::new(vec![1, 2, 3], vec![1, 2, 3], Some(1)))
                    .build(),
            ),
            MockControlPlane::with_inflight_reassignments([TopicPartition::new("X", 1)]),
            MockLoadMonitor::new(),
        );

        let result = h
            .execute(vec![replica_proposal(tp.clone(), vec![1, 2, 3], vec![1, 2, 4], 100)], None)
            .await;
        assert!(matches!(result, Err(Error::ConcurrentReassignment { partitions: 1 })));

        // Metric sampling was never paused and nothing started.
        assert_eq!(h.monitor.pause_count(), 0);
        assert!(!h.executor.has_ongoing_execution());
        assert_eq!(h.executor.state().phase, ExecutionPhase::NoTaskInProgress);
        let metrics = h.executor.metrics().snapshot();
        assert_eq!(metrics.execution_started_rebalancer, 0);

        // The task manager was rolled back: a retry dispatches exactly one
        // task, not a duplicate.
        h.control_plane.clear_in_flight();
        h.execute(vec![replica_proposal(tp.clone(), vec![1, 2, 3], vec![1, 2, 4], 100)], None)
            .await
            .expect("retry accepted");
        h.wait_replica_submissions(1).await;
        assert_eq!(h.control_plane.replica_submissions()[0].len(), 1);
        h.complete_replica_move(&tp, vec![1, 2, 4]);
        h.wait_done().await;
    }

    #[tokio::test]
    async fn test_second_execution_rejected_while_busy() {
        let tp = TopicPartition::new("T", 0);
        let h = harness(MutableClusterSource::new(
            ClusterViewBuilder::new()
                .broker(4)
                .partition(tp.clone(), PartitionInfo::new(vec![1, 2, 3], vec![1, 2, 3], Some(1)))
                .build(),
        ));

        h.execute(vec![replica_proposal(tp.clone(), vec![1, 2, 3], vec![1, 2, 4], 10)], None)
            .await
            .expect("first execution accepted");
        h.wait_replica_submissions(1).await;

        let second = h
            .execute(vec![replica_proposal(tp.clone(), vec![1, 2, 3], vec![1, 2, 4], 10)], None)
            .await;
        assert!(matches!(second, Err(Error::Busy)));

        h.complete_replica_move(&tp, vec![1, 2, 4]);
        h.wait_done().await;
    }

    #[tokio::test]
    async fn test_demotion_records_history_and_skips_cap() {
        let tp0 = TopicPartition::new("M", 0);
        let tp1 = TopicPartition::new("M", 1);
        let h = harness(MutableClusterSource::new(
            ClusterViewBuilder::new()
                .brokers([3, 4])
                .partition(tp0.clone(), PartitionInfo::new(vec![7, 1], vec![7, 1], Some(7)))
                .partition(tp1.clone(), PartitionInfo::new(vec![7, 2], vec![7, 2], Some(7)))
                .build(),
        ));

        let execution_id = Uuid::new_v4();
        h.executor
            .execute_demote_proposals(
                vec![
                    replica_proposal(tp0.clone(), vec![7, 1], vec![1, 3], 10),
                    replica_proposal(tp1.clone(), vec![7, 2], vec![2, 4], 10),
                ],
                [7].into_iter().collect(),
                Arc::clone(&h.monitor) as Arc<dyn crate::monitor::LoadMonitor>,
                Some(1),
                None,
                Some(execution_id),
            )
            .await
            .expect("demotion accepted");

        assert!(h.executor.recently_demoted_brokers().contains(&7));

        // Broker 7 is being drained, so it does not count against the cap
        // of 1 and both moves fit in the first batch.
        h.wait_replica_submissions(1).await;
        assert_eq!(h.control_plane.replica_submissions()[0].len(), 2);
        assert!(
            wait_until(
                || {
                    let state = h.executor.state();
                    state.execution_id == Some(execution_id)
                        && state.recently_demoted_brokers.contains(&7)
                },
                WAIT
            )
            .await,
            "published state should carry execution id and demotion history"
        );

        h.complete_replica_move(&tp0, vec![1, 3]);
        h.complete_replica_move(&tp1, vec![2, 4]);
        h.wait_done().await;
    }

    #[tokio::test]
    async fn test_assigner_mode_routes_started_counter() {
        let tp = TopicPartition::new("T", 0);
        let h = harness(MutableClusterSource::new(
            ClusterViewBuilder::new()
                .broker(4)
                .partition(tp.clone(), PartitionInfo::new(vec![1, 2, 3], vec![1, 2, 3], Some(1)))
                .build(),
        ));

        h.executor.set_execution_mode(true);
        h.execute(vec![replica_proposal(tp.clone(), vec![1, 2, 3], vec![1, 2, 4], 10)], None)
            .await
            .expect("execution accepted");
        h.complete_replica_move(&tp, vec![1, 2, 4]);
        h.wait_done().await;

        let metrics = h.executor.metrics().snapshot();
        assert_eq!(metrics.execution_started_assigner, 1);
        assert_eq!(metrics.execution_started_rebalancer, 0);
    }

    #[tokio::test]
    async fn test_monitor_not_ready_is_retried() {
        let tp = TopicPartition::new("T", 0);
        let h = harness_with(
            test_config(),
            MutableClusterSource::new(
                ClusterViewBuilder::new()
                    .broker(4)
                    .partition(tp.clone(), PartitionInfo::new(vec![1, 2, 3], vec![1, 2, 3], Some(1)))
                    .build(),
            ),
            MockControlPlane::new(),
            MockLoadMonitor::not_ready_for(2),
        );

        h.execute(vec![replica_proposal(tp.clone(), vec![1, 2, 3], vec![1, 2, 4], 10)], None)
            .await
            .expect("execution accepted");
        h.complete_replica_move(&tp, vec![1, 2, 4]);
        h.wait_done().await;

        // Two not-ready rounds, then one successful pause.
        assert_eq!(h.monitor.pause_count(), 1);
        assert_eq!(h.monitor.resume_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_worker_and_closes_clients() {
        let tp = TopicPartition::new("T", 0);
        let h = harness(MutableClusterSource::new(
            ClusterViewBuilder::new()
                .broker(4)
                .partition(tp.clone(), PartitionInfo::new(vec![1, 2, 3], vec![1, 2, 3], Some(1)))
                .build(),
        ));

        h.execute(vec![replica_proposal(tp.clone(), vec![1, 2, 3], vec![1, 2, 4], 10)], None)
            .await
            .expect("execution accepted");
        h.wait_replica_submissions(1).await;
        h.complete_replica_move(&tp, vec![1, 2, 4]);

        h.executor.shutdown().await.expect("shutdown");
        assert!(!h.executor.has_ongoing_execution());
        assert_eq!(h.control_plane.close_calls(), 1);

        // The executor no longer accepts work.
        let result = h
            .execute(vec![replica_proposal(tp, vec![1, 2, 4], vec![1, 2, 3], 10)], None)
            .await;
        assert!(result.is_err());
    }
}
