//! Internal storage for the container: the mapping tables of the registry
//! store, the two resolution stacks and the priority-ordered type-finder
//! list. Everything here is plain data; semantics live in the container.

use crate::binding::BindingRecord;
use crate::instance::{ReboundCallback, ReleaseHook, ResolvingHook, ServiceInstance, TypeFinder};
use crate::introspection::TypeHandle;
use fxhash::{FxHashMap, FxHashSet};
use itertools::Itertools;

/// A list ordered by ascending priority; entries with equal priority keep
/// insertion order. Used for the type-finder chain, where lower priorities
/// run first and the default priority runs last.
pub(crate) struct PriorityList<T> {
    entries: Vec<PriorityEntry<T>>,
    next_seq: usize,
}

struct PriorityEntry<T> {
    priority: i32,
    seq: usize,
    item: T,
}

impl<T> Default for PriorityList<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }
}

impl<T> PriorityList<T> {
    pub(crate) fn push(&mut self, priority: i32, item: T) {
        self.entries.push(PriorityEntry {
            priority,
            seq: self.next_seq,
            item,
        });
        self.next_seq += 1;
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries
            .iter()
            .sorted_by_key(|entry| (entry.priority, entry.seq))
            .map(|entry| &entry.item)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.next_seq = 0;
    }
}

/// The container's tables. A single instance of this struct sits behind each
/// container; all invariants between tables are maintained by the container's
/// operations.
#[derive(Default)]
pub(crate) struct RegistryTables {
    pub bindings: FxHashMap<String, BindingRecord>,
    pub aliases: FxHashMap<String, String>,
    pub aliases_reverse: FxHashMap<String, Vec<String>>,
    pub instances: FxHashMap<String, ServiceInstance>,
    pub tags: FxHashMap<String, Vec<String>>,
    pub resolved: FxHashSet<String>,
    pub rebound: FxHashMap<String, Vec<ReboundCallback>>,
    pub resolving: Vec<ResolvingHook>,
    pub release: Vec<ReleaseHook>,
    pub finders: PriorityList<TypeFinder>,
    pub finder_cache: FxHashMap<String, Option<TypeHandle>>,
    pub build_stack: Vec<String>,
    pub argument_stack: Vec<Vec<ServiceInstance>>,
}

impl RegistryTables {
    /// Resolves an alias to its canonical target, exactly once. Names that
    /// are not aliases map to themselves.
    pub fn alias_target(&self, name: &str) -> String {
        self.aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
        self.aliases.clear();
        self.aliases_reverse.clear();
        self.instances.clear();
        self.tags.clear();
        self.resolved.clear();
        self.rebound.clear();
        self.resolving.clear();
        self.release.clear();
        self.finders.clear();
        self.finder_cache.clear();
        self.build_stack.clear();
        self.argument_stack.clear();
    }
}
