//! The `Used` accumulator
//!
//! `UsedSet` is a plain value: marking is idempotent insertion and merging
//! two sets is a pure union, so batches and extractors can run in any order
//! (or be merged from independent workers) without changing the result.
//! `Marker` is the only way extractor output reaches a `UsedSet`; it
//! checks every id against the registry so `Used ⊆ All` always holds.

use std::collections::{BTreeMap, BTreeSet};

use super::extract::ReferenceSource;
use super::registry::AssetRegistry;
use crate::asset::AssetId;

/// Set of assets found to be referenced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsedSet {
    ids: BTreeSet<AssetId>,
}

impl UsedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent insert. Returns `true` if the id was not yet marked.
    pub fn insert(&mut self, id: AssetId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: AssetId) -> bool {
        self.ids.contains(&id)
    }

    /// Pure set union
    pub fn union(mut self, other: UsedSet) -> UsedSet {
        self.ids.extend(other.ids);
        self
    }

    /// Ids in ascending order
    pub fn iter(&self) -> impl Iterator<Item = AssetId> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Membership-checked marking with per-source diagnostics
pub struct Marker<'r> {
    universe: &'r AssetRegistry,
    used: UsedSet,
    by_source: BTreeMap<ReferenceSource, usize>,
    rejected: usize,
}

impl<'r> Marker<'r> {
    pub fn new(universe: &'r AssetRegistry) -> Self {
        Self {
            universe,
            used: UsedSet::new(),
            by_source: BTreeMap::new(),
            rejected: 0,
        }
    }

    /// Mark one id. Ids outside the universe are counted and dropped.
    pub fn mark(&mut self, id: AssetId, source: ReferenceSource) -> bool {
        if !self.universe.contains(id) {
            self.rejected += 1;
            return false;
        }
        *self.by_source.entry(source).or_default() += 1;
        self.used.insert(id)
    }

    /// Mark every id an extractor produced
    pub fn mark_all(&mut self, ids: impl IntoIterator<Item = AssetId>, source: ReferenceSource) {
        for id in ids {
            self.mark(id, source);
        }
    }

    /// Accepted marks per source, duplicates included
    pub fn by_source(&self) -> &BTreeMap<ReferenceSource, usize> {
        &self.by_source
    }

    /// Ids dropped because they are not image assets in the store
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn used(&self) -> &UsedSet {
        &self.used
    }

    pub fn into_used(self) -> UsedSet {
        self.used
    }
}
