use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{Result, TypedexError};

/// Plain snapshot of one index: key to sorted values.
pub type IndexSnapshot = BTreeMap<String, BTreeSet<String>>;

/// Append-only multimap owned by one scanner.
///
/// Value sets grow under the shard lock of their key, so concurrent
/// writers never observe a partially grown set.
#[derive(Debug, Default)]
pub struct Index {
    entries: DashMap<String, HashSet<String>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `key -> value`; returns `true` when the pair is new.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) -> bool {
        self.entries
            .entry(key.into())
            .or_default()
            .insert(value.into())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.entries
            .get(key)
            .map(|values| values.contains(value))
            .unwrap_or(false)
    }

    pub fn keys(&self) -> HashSet<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn values_of(&self, key: &str) -> HashSet<String> {
        self.entries
            .get(key)
            .map(|values| values.clone())
            .unwrap_or_default()
    }

    /// Flattened union of the values of every key in `keys`.
    pub fn values_of_all<I, S>(&self, keys: I) -> HashSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut result = HashSet::new();
        for key in keys {
            if let Some(values) = self.entries.get(key.as_ref()) {
                result.extend(values.iter().cloned());
            }
        }
        result
    }

    pub fn all_values(&self) -> HashSet<String> {
        let mut result = HashSet::new();
        for entry in self.entries.iter() {
            result.extend(entry.value().iter().cloned());
        }
        result
    }

    /// Everything reachable from `keys` by following key -> value edges.
    ///
    /// Each value is expanded at most once, so cyclic relations terminate.
    pub fn recursive_values_excluding_self<I, S>(&self, keys: I) -> HashSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut reached: HashSet<String> = HashSet::new();
        let mut frontier = self.values_of_all(keys);
        while !frontier.is_empty() {
            frontier.retain(|value| !reached.contains(value));
            reached.extend(frontier.iter().cloned());
            frontier = self.values_of_all(&frontier);
        }
        reached
    }

    pub fn recursive_values_including_self<I, S>(&self, keys: I) -> HashSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: Vec<String> = keys.into_iter().map(|key| key.as_ref().to_string()).collect();
        let mut result = self.recursive_values_excluding_self(&keys);
        result.extend(keys);
        result
    }

    pub fn keys_count(&self) -> usize {
        self.entries.len()
    }

    pub fn values_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unions `other` into this index.
    pub fn merge(&self, other: &Index) {
        if std::ptr::eq(self, other) {
            return;
        }
        for entry in other.entries.iter() {
            let mut target = self.entries.entry(entry.key().clone()).or_default();
            target.extend(entry.value().iter().cloned());
        }
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        self.entries
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.value().iter().cloned().collect::<BTreeSet<_>>(),
                )
            })
            .collect()
    }

    pub fn from_snapshot(snapshot: IndexSnapshot) -> Self {
        let index = Index::new();
        for (key, values) in snapshot {
            index
                .entries
                .insert(key, values.into_iter().collect::<HashSet<_>>());
        }
        index
    }
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        self.snapshot() == other.snapshot()
    }
}

/// Plain snapshot of a whole store: scanner name to index snapshot.
pub type StoreSnapshot = BTreeMap<String, IndexSnapshot>;

/// The indices of one scan session, keyed by scanner type name.
#[derive(Debug, Default, Clone)]
pub struct Store {
    indices: BTreeMap<String, Arc<Index>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, scanner: impl Into<String>, index: Arc<Index>) {
        let scanner = scanner.into();
        match self.indices.get(&scanner) {
            Some(existing) => existing.merge(&index),
            None => {
                self.indices.insert(scanner, index);
            }
        }
    }

    /// The index of `scanner`, or an error when no such scanner ran.
    pub fn index(&self, scanner: &str) -> Result<&Index> {
        self.indices
            .get(scanner)
            .map(Arc::as_ref)
            .ok_or_else(|| TypedexError::ScannerNotConfigured(scanner.to_string()))
    }

    pub fn get(&self, scanner: &str) -> Option<&Arc<Index>> {
        self.indices.get(scanner)
    }

    pub fn scanner_names(&self) -> impl Iterator<Item = &str> {
        self.indices.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Index)> {
        self.indices
            .iter()
            .map(|(name, index)| (name.as_str(), index.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Unions every index of `other` into the same-named index here.
    ///
    /// Indices are shared, so a merged-into index is first detached from any
    /// scanner still holding it.
    pub fn merge(&mut self, other: &Store) {
        for (name, index) in &other.indices {
            let target = self
                .indices
                .entry(name.clone())
                .or_insert_with(|| Arc::new(Index::new()));
            if Arc::ptr_eq(target, index) {
                continue;
            }
            if Arc::strong_count(target) > 1 {
                let detached = Index::new();
                detached.merge(target);
                *target = Arc::new(detached);
            }
            target.merge(index);
        }
    }

    pub fn keys_count(&self) -> usize {
        self.indices.values().map(|index| index.keys_count()).sum()
    }

    pub fn values_count(&self) -> usize {
        self.indices.values().map(|index| index.values_count()).sum()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.indices
            .iter()
            .map(|(name, index)| (name.clone(), index.snapshot()))
            .collect()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            indices: snapshot
                .into_iter()
                .map(|(name, index)| (name, Arc::new(Index::from_snapshot(index))))
                .collect(),
        }
    }
}

impl PartialEq for Store {
    fn eq(&self, other: &Self) -> bool {
        self.snapshot() == other.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn chain() -> Index {
        let index = Index::new();
        index.put("C", "B");
        index.put("B", "A");
        index.put("X", "Y");
        index
    }

    #[test]
    fn put_reports_new_pairs_only() {
        let index = Index::new();
        assert!(index.put("k", "v"));
        assert!(!index.put("k", "v"));
        assert!(index.put("k", "w"));
        assert_eq!(index.values_count(), 2);
        assert_eq!(index.keys_count(), 1);
    }

    #[test]
    fn closure_follows_values_transitively() {
        let index = chain();
        let reached = index.recursive_values_excluding_self(["C"]);
        assert_eq!(reached, HashSet::from(["B".to_string(), "A".to_string()]));

        let with_self = index.recursive_values_including_self(["C"]);
        assert_eq!(with_self.len(), 3);
        assert!(with_self.contains("C"));
    }

    #[test]
    fn closure_terminates_on_cycles() {
        let index = Index::new();
        index.put("A", "B");
        index.put("B", "C");
        index.put("C", "A");
        let reached = index.recursive_values_excluding_self(["A"]);
        assert_eq!(reached.len(), 3);
    }

    #[test]
    fn values_of_all_flattens() {
        let index = chain();
        let values = index.values_of_all(["C", "X", "missing"]);
        assert_eq!(values, HashSet::from(["B".to_string(), "Y".to_string()]));
    }

    #[test]
    fn concurrent_writers_lose_nothing() {
        let index = Arc::new(Index::new());
        let writers: Vec<_> = (0..8)
            .map(|writer| {
                let index = Arc::clone(&index);
                thread::spawn(move || {
                    for value in 0..2_000 {
                        index.put(format!("key{}", value % 7), format!("{writer}-{value}"));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().expect("writer thread");
        }
        assert_eq!(index.values_count(), 8 * 2_000);
        assert_eq!(index.keys_count(), 7);
    }

    #[test]
    fn store_merge_unions_same_named_indices() {
        let mut left = Store::new();
        let a = Arc::new(Index::new());
        a.put("k", "1");
        left.insert("SubTypes", a);

        let mut right = Store::new();
        let b = Arc::new(Index::new());
        b.put("k", "2");
        right.insert("SubTypes", b);
        let c = Arc::new(Index::new());
        c.put("r", "x");
        right.insert("Resources", c);

        left.merge(&right);
        assert_eq!(left.len(), 2);
        assert_eq!(
            left.index("SubTypes").unwrap().values_of("k"),
            HashSet::from(["1".to_string(), "2".to_string()])
        );
        assert!(matches!(
            left.index("MemberUsage"),
            Err(TypedexError::ScannerNotConfigured(name)) if name == "MemberUsage"
        ));
    }

    #[test]
    fn snapshot_round_trip_preserves_content() {
        let mut store = Store::new();
        store.insert("SubTypes", Arc::new(chain()));
        let restored = Store::from_snapshot(store.snapshot());
        assert_eq!(restored, store);
    }
}
