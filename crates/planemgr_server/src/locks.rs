use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-chart write leases.
///
/// Writers to the same chart serialize; writers to different charts run in
/// parallel. The registry is owned by the router state, so tests can spin
/// up isolated instances.
#[derive(Default)]
pub struct ChartLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ChartLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the write lease for one chart, waiting for the current holder
    /// if there is one. The lease is held until the guard drops.
    pub async fn acquire(&self, chart_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(chart_id.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }
}
