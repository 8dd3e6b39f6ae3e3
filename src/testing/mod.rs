//! Test fixtures for exercising the execution engine without a real
//! cluster.
//!
//! The mocks mirror the engine's collaborator seams: a scriptable
//! metadata source, a recording control plane, a load monitor with a
//! programmable not-ready budget, and a manually advanced clock for
//! driving timeout behavior.

mod executor_e2e_tests;
mod mocks;

pub use mocks::{ManualClock, MockControlPlane, MockLoadMonitor, MutableClusterSource};

use std::time::{Duration, Instant};

/// Poll a condition until it holds or the timeout elapses. Returns
/// whether the condition became true.
pub async fn wait_until<F>(mut condition: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    false
}
