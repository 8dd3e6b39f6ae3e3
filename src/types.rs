//! Core types used throughout the rebalance execution engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Broker identifier in the cluster.
pub type BrokerId = u64;

/// One ordered shard of a topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicPartition {
    /// Topic name.
    pub topic: String,
    /// Partition index within the topic.
    pub partition: u32,
}

impl TopicPartition {
    /// Create a new topic-partition identity.
    pub fn new(topic: impl Into<String>, partition: u32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

/// Per-partition metadata as observed in a cluster snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    /// Ordered replica set. The first entry is the preferred leader.
    pub replicas: Vec<BrokerId>,
    /// In-sync replica set. Only ISR members are election-eligible.
    pub isr: Vec<BrokerId>,
    /// Current leader, if the partition has one.
    pub leader: Option<BrokerId>,
}

impl PartitionInfo {
    /// Create partition metadata.
    pub fn new(replicas: Vec<BrokerId>, isr: Vec<BrokerId>, leader: Option<BrokerId>) -> Self {
        Self {
            replicas,
            isr,
            leader,
        }
    }

    /// Check whether a broker is in the in-sync replica set.
    pub fn is_in_isr(&self, broker: BrokerId) -> bool {
        self.isr.contains(&broker)
    }
}

/// Source of wall-clock time in milliseconds since the Unix epoch.
///
/// Injected so that timeout behavior can be driven deterministically in
/// tests.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_partition_display() {
        let tp = TopicPartition::new("events", 3);
        assert_eq!(tp.to_string(), "events-3");
    }

    #[test]
    fn test_topic_partition_ordering() {
        let a = TopicPartition::new("a", 1);
        let b = TopicPartition::new("a", 2);
        let c = TopicPartition::new("b", 0);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_partition_info_isr() {
        let info = PartitionInfo::new(vec![1, 2, 3], vec![1, 2], Some(1));
        assert!(info.is_in_isr(2));
        assert!(!info.is_in_isr(3));
    }

    #[test]
    fn test_system_clock_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
