//! Routing table: prefix to best known path.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::core::{INFINITY, LOCAL_METRIC, NeighborId, NextHop, Prefix};

/// One row of the routing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// Destination prefix (table key).
    pub prefix: Prefix,
    /// Where traffic for the prefix goes.
    pub next_hop: NextHop,
    /// Hop count, 0..=16. 16 means known but unreachable.
    pub metric: u8,
    /// Last time an update confirmed this entry.
    pub last_refresh: Instant,
}

impl RouteEntry {
    /// A directly attached prefix.
    pub fn local(prefix: Prefix, now: Instant) -> Self {
        Self {
            prefix,
            next_hop: NextHop::Local,
            metric: LOCAL_METRIC,
            last_refresh: now,
        }
    }

    /// A prefix learned from `neighbor`.
    pub fn learned(prefix: Prefix, neighbor: NeighborId, metric: u8, now: Instant) -> Self {
        Self {
            prefix,
            next_hop: NextHop::Neighbor(neighbor),
            metric: metric.min(INFINITY),
            last_refresh: now,
        }
    }

    /// Whether the entry has gone unrefreshed for longer than `ttl`.
    ///
    /// Local entries never expire.
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        !self.next_hop.is_local() && now.saturating_duration_since(self.last_refresh) > ttl
    }
}

/// Mapping prefix to [`RouteEntry`], iterated in prefix order.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    entries: BTreeMap<Prefix, RouteEntry>,
}

impl RoutingTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert local entries for `prefixes`. Returns how many were new.
    pub fn seed_local(&mut self, prefixes: impl IntoIterator<Item = Prefix>, now: Instant) -> usize {
        let before = self.entries.len();
        for prefix in prefixes {
            self.entries
                .insert(prefix, RouteEntry::local(prefix, now));
        }
        self.entries.len() - before
    }

    /// Get the entry for a prefix.
    pub fn get(&self, prefix: &Prefix) -> Option<&RouteEntry> {
        self.entries.get(prefix)
    }

    pub(crate) fn get_mut(&mut self, prefix: &Prefix) -> Option<&mut RouteEntry> {
        self.entries.get_mut(prefix)
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, entry: RouteEntry) -> Option<RouteEntry> {
        self.entries.insert(entry.prefix, entry)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in prefix order.
    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.values()
    }

    /// Refresh the timestamp of every local entry.
    pub fn refresh_local(&mut self, now: Instant) {
        for entry in self.entries.values_mut() {
            if entry.next_hop.is_local() {
                entry.last_refresh = now;
            }
        }
    }

    /// Mark every route through `neighbor` unreachable and refresh it.
    ///
    /// Entries are kept so the unreachability is advertised. Returns the
    /// affected prefixes.
    pub fn poison_via(&mut self, neighbor: &NeighborId, now: Instant) -> Vec<Prefix> {
        let mut poisoned = Vec::new();
        for entry in self.entries.values_mut() {
            if entry.next_hop.is_neighbor(neighbor) {
                entry.metric = INFINITY;
                entry.last_refresh = now;
                poisoned.push(entry.prefix);
            }
        }
        poisoned
    }

    /// Delete every learned entry unrefreshed for longer than `ttl`.
    pub fn expire(&mut self, now: Instant, ttl: Duration) -> Vec<RouteEntry> {
        let expired: Vec<Prefix> = self
            .entries
            .values()
            .filter(|e| e.is_expired(now, ttl))
            .map(|e| e.prefix)
            .collect();
        expired
            .iter()
            .filter_map(|prefix| self.entries.remove(prefix))
            .collect()
    }
}
