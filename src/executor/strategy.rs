//! Ordering strategies for pending replica movements.

use crate::executor::task::ExecutionTask;
use std::cmp::Ordering;

/// Identifier for [`PrioritizeLargeMovementStrategy`].
pub const PRIORITIZE_LARGE_MOVEMENTS: &str = "prioritize-large-movements";
/// Identifier for [`PrioritizeSmallMovementStrategy`].
pub const PRIORITIZE_SMALL_MOVEMENTS: &str = "prioritize-small-movements";

/// Orders pending replica-movement tasks before batch selection.
///
/// Strategies are chained: when a strategy considers two tasks equal, the
/// next strategy in the chain decides, and the proposal input order is the
/// final tie-break.
pub trait ReplicaMovementStrategy: Send + Sync + std::fmt::Debug {
    /// Compare two tasks; `Less` executes earlier.
    fn compare(&self, a: &ExecutionTask, b: &ExecutionTask) -> Ordering;

    /// Identifier used in configuration.
    fn name(&self) -> &'static str;
}

/// Proposal input order.
#[derive(Debug, Default)]
pub struct BaselineStrategy;

impl ReplicaMovementStrategy for BaselineStrategy {
    fn compare(&self, _a: &ExecutionTask, _b: &ExecutionTask) -> Ordering {
        Ordering::Equal
    }

    fn name(&self) -> &'static str {
        "baseline"
    }
}

/// Execute movements with more data to move first.
#[derive(Debug, Default)]
pub struct PrioritizeLargeMovementStrategy;

impl ReplicaMovementStrategy for PrioritizeLargeMovementStrategy {
    fn compare(&self, a: &ExecutionTask, b: &ExecutionTask) -> Ordering {
        b.proposal.data_to_move_mb.cmp(&a.proposal.data_to_move_mb)
    }

    fn name(&self) -> &'static str {
        PRIORITIZE_LARGE_MOVEMENTS
    }
}

/// Execute movements with less data to move first.
#[derive(Debug, Default)]
pub struct PrioritizeSmallMovementStrategy;

impl ReplicaMovementStrategy for PrioritizeSmallMovementStrategy {
    fn compare(&self, a: &ExecutionTask, b: &ExecutionTask) -> Ordering {
        a.proposal.data_to_move_mb.cmp(&b.proposal.data_to_move_mb)
    }

    fn name(&self) -> &'static str {
        PRIORITIZE_SMALL_MOVEMENTS
    }
}

/// Resolve configured strategy identifiers into a chain. Unknown
/// identifiers are skipped with a warning.
pub fn resolve(identifiers: &[String]) -> Vec<Box<dyn ReplicaMovementStrategy>> {
    let mut chain: Vec<Box<dyn ReplicaMovementStrategy>> = Vec::new();
    for id in identifiers {
        match id.as_str() {
            PRIORITIZE_LARGE_MOVEMENTS => chain.push(Box::new(PrioritizeLargeMovementStrategy)),
            PRIORITIZE_SMALL_MOVEMENTS => chain.push(Box::new(PrioritizeSmallMovementStrategy)),
            "baseline" => chain.push(Box::new(BaselineStrategy)),
            other => tracing::warn!(strategy = other, "Unknown replica movement strategy, skipping"),
        }
    }
    chain
}

/// Sort tasks by a strategy chain, keeping the input order as the final
/// tie-break.
pub fn order_tasks(tasks: &mut Vec<ExecutionTask>, chain: &[Box<dyn ReplicaMovementStrategy>]) {
    if chain.is_empty() {
        return;
    }
    tasks.sort_by(|a, b| {
        for strategy in chain {
            let ord = strategy.compare(a, b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::proposal::ExecutionProposal;
    use crate::executor::task::TaskKind;
    use crate::types::TopicPartition;

    fn task(partition: u32, data_mb: u64) -> ExecutionTask {
        ExecutionTask::new(
            TaskKind::ReplicaAction,
            ExecutionProposal::new(
                TopicPartition::new("T", partition),
                vec![1, 2],
                vec![1, 3],
                1,
                1,
                data_mb,
            ),
        )
    }

    #[test]
    fn test_resolve_skips_unknown() {
        let chain = resolve(&[
            "prioritize-large-movements".to_string(),
            "does-not-exist".to_string(),
        ]);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].name(), PRIORITIZE_LARGE_MOVEMENTS);
    }

    #[test]
    fn test_large_movements_first() {
        let mut tasks = vec![task(0, 10), task(1, 500), task(2, 50)];
        let chain = resolve(&[PRIORITIZE_LARGE_MOVEMENTS.to_string()]);
        order_tasks(&mut tasks, &chain);
        let order: Vec<_> = tasks.iter().map(|t| t.partition().partition).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_stable_tie_break_keeps_input_order() {
        let mut tasks = vec![task(5, 100), task(3, 100), task(9, 100)];
        let chain = resolve(&[PRIORITIZE_SMALL_MOVEMENTS.to_string()]);
        order_tasks(&mut tasks, &chain);
        let order: Vec<_> = tasks.iter().map(|t| t.partition().partition).collect();
        assert_eq!(order, vec![5, 3, 9]);
    }

    #[test]
    fn test_empty_chain_preserves_order() {
        let mut tasks = vec![task(2, 1), task(0, 9)];
        order_tasks(&mut tasks, &[]);
        let order: Vec<_> = tasks.iter().map(|t| t.partition().partition).collect();
        assert_eq!(order, vec![2, 0]);
    }
}
