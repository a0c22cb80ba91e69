//! Per-run deduplication cache
//!
//! Records which request keys have already been published within a run,
//! along with the resources published for them. The cache is a best-effort
//! in-memory optimization: losing it only causes redundant reprocessing.

use crate::core::request::ResourceRequestKey;
use crate::domain::Resource;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Run-scoped store of published keys
///
/// Implementations are shared between concurrent publishers and must
/// synchronize internally.
pub trait RunCache: Send + Sync {
    /// Cached entries for whichever of `keys` were recorded under `run_id`
    fn lookup(
        &self,
        run_id: &str,
        keys: &[ResourceRequestKey],
    ) -> HashMap<ResourceRequestKey, Vec<Resource>>;

    /// Records published keys for `run_id`
    fn record(&self, run_id: &str, entries: HashMap<ResourceRequestKey, Vec<Resource>>);
}

#[derive(Default)]
struct CacheState {
    runs: HashMap<String, HashMap<ResourceRequestKey, Vec<Resource>>>,
    order: VecDeque<String>,
}

/// Bounded in-memory [`RunCache`]
///
/// Keeps at most `max_runs` run ids; recording a new run beyond that evicts
/// the run that was first recorded earliest.
pub struct InMemoryRunCache {
    max_runs: usize,
    state: Mutex<CacheState>,
}

impl InMemoryRunCache {
    pub fn new(max_runs: usize) -> Self {
        Self {
            max_runs: max_runs.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Number of runs currently retained
    pub fn run_count(&self) -> usize {
        self.state().runs.len()
    }

    /// Number of keys retained for `run_id`
    pub fn key_count(&self, run_id: &str) -> usize {
        self.state().runs.get(run_id).map_or(0, HashMap::len)
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RunCache for InMemoryRunCache {
    fn lookup(
        &self,
        run_id: &str,
        keys: &[ResourceRequestKey],
    ) -> HashMap<ResourceRequestKey, Vec<Resource>> {
        let state = self.state();
        let Some(run) = state.runs.get(run_id) else {
            return HashMap::new();
        };
        keys.iter()
            .filter_map(|key| run.get(key).map(|resources| (key.clone(), resources.clone())))
            .collect()
    }

    fn record(&self, run_id: &str, entries: HashMap<ResourceRequestKey, Vec<Resource>>) {
        if entries.is_empty() {
            return;
        }

        let mut state = self.state();
        if !state.runs.contains_key(run_id) {
            while state.order.len() >= self.max_runs {
                let Some(evicted) = state.order.pop_front() else {
                    break;
                };
                state.runs.remove(&evicted);
                tracing::debug!(run_id = %evicted, "Evicted run from publish cache");
            }
            state.order.push_back(run_id.to_string());
        }
        state.runs.entry(run_id.to_string()).or_default().extend(entries);
    }
}

/// [`RunCache`] that never remembers anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRunCache;

impl RunCache for NoopRunCache {
    fn lookup(
        &self,
        _run_id: &str,
        _keys: &[ResourceRequestKey],
    ) -> HashMap<ResourceRequestKey, Vec<Resource>> {
        HashMap::new()
    }

    fn record(&self, _run_id: &str, _entries: HashMap<ResourceRequestKey, Vec<Resource>>) {}
}
