//! Frequency tallies with stable top-K ranking
//!
//! Equal values are ranked by the order in which their keys were first seen,
//! so reports are deterministic regardless of hash map iteration order.

use std::collections::HashMap;
use std::hash::Hash;

use crate::models::Ranked;

#[derive(Debug, Clone, Copy)]
struct TallyEntry {
    value: u64,
    seq: u64,
}

/// Multiset of `key -> u64` that remembers discovery order
#[derive(Debug, Clone)]
pub struct FrequencyTally<K> {
    entries: HashMap<K, TallyEntry>,
    next_seq: u64,
}

impl<K: Eq + Hash + Clone> FrequencyTally<K> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Add `amount` to `key`, registering the key on first sight (even for 0)
    pub fn add(&mut self, key: &K, amount: u64) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.value += amount;
            return;
        }
        self.entries.insert(
            key.clone(),
            TallyEntry {
                value: amount,
                seq: self.next_seq,
            },
        );
        self.next_seq += 1;
    }

    /// Set `key` only if it has never been set; returns whether it was stored
    pub fn set_if_absent(&mut self, key: &K, value: u64) -> bool {
        if self.entries.contains_key(key) {
            return false;
        }
        self.add(key, value);
        true
    }

    pub fn get(&self, key: &K) -> Option<u64> {
        self.entries.get(key).map(|e| e.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top `k` keys by value descending, ties in first-seen order
    pub fn top(&self, k: usize) -> Vec<(K, u64)> {
        let mut ranked: Vec<_> = self.entries.iter().collect();
        ranked.sort_by(|a, b| b.1.value.cmp(&a.1.value).then(a.1.seq.cmp(&b.1.seq)));
        ranked
            .into_iter()
            .take(k)
            .map(|(key, entry)| (key.clone(), entry.value))
            .collect()
    }
}

impl<K: Eq + Hash + Clone + ToString> FrequencyTally<K> {
    pub fn top_ranked(&self, k: usize) -> Vec<Ranked> {
        self.top(k)
            .into_iter()
            .map(|(key, value)| Ranked::new(key.to_string(), value))
            .collect()
    }
}

impl<K: Eq + Hash + Clone> Default for FrequencyTally<K> {
    fn default() -> Self {
        Self::new()
    }
}
