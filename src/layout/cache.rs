// Wed Oct 14 2026 - Alex

use crate::layout::LayoutPlan;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Computed layouts keyed by qualified record name. Shared by the workers
/// that resolve layouts in parallel.
pub struct LayoutCache {
    cache: RwLock<IndexMap<String, Arc<LayoutPlan>>>,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(IndexMap::new()),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<LayoutPlan>> {
        self.cache.read().get(name).cloned()
    }

    /// Keeps the first plan stored under a name; two workers computing the
    /// same layout produce identical plans anyway.
    pub fn insert(&self, plan: LayoutPlan) -> Arc<LayoutPlan> {
        let mut cache = self.cache.write();
        cache.entry(plan.name.clone()).or_insert_with(|| Arc::new(plan)).clone()
    }

    pub fn snapshot(&self) -> IndexMap<String, Arc<LayoutPlan>> {
        self.cache.read().clone()
    }

    pub fn clear(&self) {
        self.cache.write().clear();
    }

    pub fn size(&self) -> usize {
        self.cache.read().len()
    }
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self::new()
    }
}
