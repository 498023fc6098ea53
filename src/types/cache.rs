// Wed Oct 14 2026 - Alex

use crate::types::decl::Declaration;
use crate::types::table::TypeTable;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Read-mostly cache of tag declarations shared by the units of a session.
///
/// Entries are immutable `Arc`s. A forward placeholder may be superseded by
/// a complete definition, which swaps in a new `Arc`; nothing stored is ever
/// mutated, so a unit holding an entry keeps seeing what it adopted.
pub struct SharedTypeCache {
    entries: RwLock<IndexMap<String, Arc<Declaration>>>,
}

impl SharedTypeCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Declaration>> {
        self.entries.read().get(name).cloned()
    }

    /// Publishes `decl` unless the cache already has a definition for the
    /// name. Returns whether the entry was stored.
    pub fn publish(&self, decl: Arc<Declaration>) -> bool {
        let mut entries = self.entries.write();
        match entries.get(decl.name()) {
            Some(existing) if !matches!(existing.as_ref(), Declaration::ForwardRecord { .. }) => false,
            Some(_) if matches!(decl.as_ref(), Declaration::ForwardRecord { .. }) => false,
            _ => {
                entries.insert(decl.name().to_string(), decl);
                true
            }
        }
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn size(&self) -> usize {
        self.entries.read().len()
    }
}

impl Default for SharedTypeCache {
    fn default() -> Self {
        Self::new()
    }
}

/// A unit's private table layered over the shared cache.
pub struct UnitTypeView<'c> {
    cache: &'c SharedTypeCache,
    local: TypeTable,
    adopted: usize,
}

impl<'c> UnitTypeView<'c> {
    pub fn new(cache: &'c SharedTypeCache, local: TypeTable) -> Self {
        Self {
            cache,
            local,
            adopted: 0,
        }
    }

    /// Local entry first, then the shared one.
    pub fn lookup_tag(&self, name: &str) -> Option<Arc<Declaration>> {
        self.local
            .tag_arc(name)
            .cloned()
            .or_else(|| self.cache.get(name))
    }

    pub fn local(&self) -> &TypeTable {
        &self.local
    }

    pub fn adopted(&self) -> usize {
        self.adopted
    }

    /// Completes local forward placeholders from cached definitions, then
    /// publishes the unit's own complete tags. Adopted entries stay shared
    /// until the unit rewrites them.
    pub fn finish(mut self) -> (TypeTable, usize) {
        let forwards: Vec<String> = self
            .local
            .iter()
            .filter(|d| matches!(d, Declaration::ForwardRecord { .. }))
            .map(|d| d.name().to_string())
            .collect();
        for name in forwards {
            if let Some(cached) = self.cache.get(&name) {
                if matches!(cached.as_ref(), Declaration::Record(_)) && self.local.insert_arc(cached).is_ok() {
                    self.adopted += 1;
                }
            }
        }
        for decl in self.local.iter_arcs() {
            if decl.is_tag() && !decl.is_builtin() {
                self.cache.publish(decl.clone());
            }
        }
        (self.local, self.adopted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::decl::RecordDef;
    use crate::types::descriptor::RecordKind;

    fn forward(name: &str) -> Declaration {
        Declaration::ForwardRecord {
            name: name.to_string(),
            kind: RecordKind::Struct,
            pos: None,
        }
    }

    #[test]
    fn test_publish_keeps_first_definition() {
        let cache = SharedTypeCache::new();
        assert!(cache.publish(Arc::new(forward("S"))));
        assert!(cache.publish(Arc::new(Declaration::Record(RecordDef::new("S", RecordKind::Struct)))));
        let mut other = RecordDef::new("S", RecordKind::Class);
        other.usings.push("x".to_string());
        assert!(!cache.publish(Arc::new(Declaration::Record(other))));
        assert!(!cache.publish(Arc::new(forward("S"))));
        assert_eq!(cache.get("S").unwrap().kind(), crate::types::DeclKind::Struct);
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_unit_adopts_cached_definition() {
        let cache = SharedTypeCache::new();
        cache.publish(Arc::new(Declaration::Record(RecordDef::new("_mystruct", RecordKind::Struct))));
        let mut local = TypeTable::new();
        local.insert(forward("_mystruct")).unwrap();
        let view = UnitTypeView::new(&cache, local);
        assert!(view.lookup_tag("_mystruct").is_some());
        let (table, adopted) = view.finish();
        assert_eq!(adopted, 1);
        assert!(table.record("_mystruct").is_some());
        // the adopted entry is the cached allocation itself
        let cached = cache.get("_mystruct").unwrap();
        assert!(Arc::ptr_eq(&cached, table.tag_arc("_mystruct").unwrap()));
    }

    #[test]
    fn test_finish_publishes_local_definitions() {
        let cache = SharedTypeCache::new();
        let mut local = TypeTable::new();
        local
            .insert(Declaration::Record(RecordDef::new("A", RecordKind::Struct)))
            .unwrap();
        UnitTypeView::new(&cache, local).finish();
        assert!(cache.get("A").is_some());
    }
}
