//! In-memory reference engine
//!
//! Implements the [`Store`] contract with Redis-compatible semantics:
//! wrong-type guards, lazy key expiry, empty sets and hashes pruned on the
//! spot. Containers are BTree-based so iteration order is deterministic.
//!
//! The engine counts every issued command; laziness tests diff the counter
//! around an observation to prove when the network would have been touched.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use regex::Regex;

use super::errors::{StoreError, StoreResult};
use super::sort;
use super::{SortRequest, Store, StoreWrite};

/// Key/value state behind the lock.
#[derive(Default)]
pub(crate) struct MemoryInner {
    strings: BTreeMap<String, String>,
    sets: BTreeMap<String, BTreeSet<String>>,
    hashes: BTreeMap<String, BTreeMap<String, String>>,
    expires: BTreeMap<String, Instant>,
}

impl MemoryInner {
    /// Drops the key if its expiration deadline has passed.
    fn purge(&mut self, key: &str) {
        if let Some(deadline) = self.expires.get(key) {
            if Instant::now() >= *deadline {
                self.remove_key(key);
            }
        }
    }

    fn remove_key(&mut self, key: &str) -> bool {
        let existed = self.strings.remove(key).is_some()
            | self.sets.remove(key).is_some()
            | self.hashes.remove(key).is_some();
        self.expires.remove(key);
        existed
    }

    fn holds_other_than_string(&self, key: &str) -> bool {
        self.sets.contains_key(key) || self.hashes.contains_key(key)
    }

    fn holds_other_than_set(&self, key: &str) -> bool {
        self.strings.contains_key(key) || self.hashes.contains_key(key)
    }

    fn holds_other_than_hash(&self, key: &str) -> bool {
        self.strings.contains_key(key) || self.sets.contains_key(key)
    }

    fn wrong_type(key: &str) -> StoreError {
        StoreError::WrongType { key: key.to_string() }
    }

    pub(crate) fn exists(&mut self, key: &str) -> bool {
        self.purge(key);
        self.strings.contains_key(key)
            || self.sets.contains_key(key)
            || self.hashes.contains_key(key)
    }

    pub(crate) fn del(&mut self, key: &str) -> bool {
        self.purge(key);
        self.remove_key(key)
    }

    pub(crate) fn expire(&mut self, key: &str, ttl_secs: u64) -> bool {
        if !self.exists(key) {
            return false;
        }
        self.expires
            .insert(key.to_string(), Instant::now() + Duration::from_secs(ttl_secs));
        true
    }

    pub(crate) fn get(&mut self, key: &str) -> StoreResult<Option<String>> {
        self.purge(key);
        if self.holds_other_than_string(key) {
            return Err(Self::wrong_type(key));
        }
        Ok(self.strings.get(key).cloned())
    }

    pub(crate) fn set(&mut self, key: &str, value: &str) {
        // SET replaces whatever the key held before, matching store semantics.
        self.purge(key);
        self.remove_key(key);
        self.strings.insert(key.to_string(), value.to_string());
    }

    pub(crate) fn incr(&mut self, key: &str) -> StoreResult<i64> {
        self.purge(key);
        if self.holds_other_than_string(key) {
            return Err(Self::wrong_type(key));
        }
        let current = match self.strings.get(key) {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| StoreError::NotInteger { key: key.to_string() })?,
            None => 0,
        };
        let next = current + 1;
        self.strings.insert(key.to_string(), next.to_string());
        Ok(next)
    }

    pub(crate) fn sadd(&mut self, key: &str, member: &str) -> StoreResult<bool> {
        self.purge(key);
        if self.holds_other_than_set(key) {
            return Err(Self::wrong_type(key));
        }
        Ok(self
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    pub(crate) fn srem(&mut self, key: &str, member: &str) -> StoreResult<bool> {
        self.purge(key);
        if self.holds_other_than_set(key) {
            return Err(Self::wrong_type(key));
        }
        let Some(set) = self.sets.get_mut(key) else {
            return Ok(false);
        };
        let removed = set.remove(member);
        if set.is_empty() {
            self.remove_key(key);
        }
        Ok(removed)
    }

    pub(crate) fn sismember(&mut self, key: &str, member: &str) -> StoreResult<bool> {
        self.purge(key);
        if self.holds_other_than_set(key) {
            return Err(Self::wrong_type(key));
        }
        Ok(self.sets.get(key).is_some_and(|set| set.contains(member)))
    }

    pub(crate) fn scard(&mut self, key: &str) -> StoreResult<usize> {
        self.purge(key);
        if self.holds_other_than_set(key) {
            return Err(Self::wrong_type(key));
        }
        Ok(self.sets.get(key).map_or(0, BTreeSet::len))
    }

    pub(crate) fn smembers(&mut self, key: &str) -> StoreResult<Vec<String>> {
        self.purge(key);
        if self.holds_other_than_set(key) {
            return Err(Self::wrong_type(key));
        }
        Ok(self
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    pub(crate) fn sinter(&mut self, keys: &[String]) -> StoreResult<Vec<String>> {
        let mut result: Option<BTreeSet<String>> = None;
        for key in keys {
            let members: BTreeSet<String> = self.smembers(key)?.into_iter().collect();
            result = Some(match result {
                None => members,
                Some(acc) => acc.intersection(&members).cloned().collect(),
            });
            if result.as_ref().is_some_and(BTreeSet::is_empty) {
                break;
            }
        }
        Ok(result.unwrap_or_default().into_iter().collect())
    }

    pub(crate) fn sinterstore(&mut self, destination: &str, keys: &[String]) -> StoreResult<usize> {
        let members = self.sinter(keys)?;
        // The destination is replaced; an empty result leaves no key behind.
        self.purge(destination);
        self.remove_key(destination);
        let count = members.len();
        if count > 0 {
            self.sets.insert(destination.to_string(), members.into_iter().collect());
        }
        Ok(count)
    }

    pub(crate) fn hget(&mut self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.purge(key);
        if self.holds_other_than_hash(key) {
            return Err(Self::wrong_type(key));
        }
        Ok(self.hashes.get(key).and_then(|hash| hash.get(field).cloned()))
    }

    pub(crate) fn hset(&mut self, key: &str, field: &str, value: &str) -> StoreResult<bool> {
        self.purge(key);
        if self.holds_other_than_hash(key) {
            return Err(Self::wrong_type(key));
        }
        Ok(self
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string())
            .is_none())
    }

    pub(crate) fn hdel(&mut self, key: &str, fields: &[&str]) -> StoreResult<usize> {
        self.purge(key);
        if self.holds_other_than_hash(key) {
            return Err(Self::wrong_type(key));
        }
        let Some(hash) = self.hashes.get_mut(key) else {
            return Ok(0);
        };
        let mut removed = 0;
        for field in fields {
            if hash.remove(*field).is_some() {
                removed += 1;
            }
        }
        if hash.is_empty() {
            self.remove_key(key);
        }
        Ok(removed)
    }

    pub(crate) fn hgetall(&mut self, key: &str) -> StoreResult<Vec<(String, String)>> {
        self.purge(key);
        if self.holds_other_than_hash(key) {
            return Err(Self::wrong_type(key));
        }
        Ok(self
            .hashes
            .get(key)
            .map(|hash| hash.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    pub(crate) fn hlen(&mut self, key: &str) -> StoreResult<usize> {
        self.purge(key);
        if self.holds_other_than_hash(key) {
            return Err(Self::wrong_type(key));
        }
        Ok(self.hashes.get(key).map_or(0, BTreeMap::len))
    }

    pub(crate) fn hexists(&mut self, key: &str, field: &str) -> StoreResult<bool> {
        self.purge(key);
        if self.holds_other_than_hash(key) {
            return Err(Self::wrong_type(key));
        }
        Ok(self.hashes.get(key).is_some_and(|hash| hash.contains_key(field)))
    }

    pub(crate) fn hscan(&mut self, key: &str, pattern: &str) -> StoreResult<Vec<(String, String)>> {
        let matcher = glob_regex(pattern)?;
        let all = self.hgetall(key)?;
        Ok(all
            .into_iter()
            .filter(|(field, _)| matcher.is_match(field))
            .collect())
    }

    /// Number of live keys, expired entries excluded. Used by leak tests.
    fn live_key_count(&mut self) -> usize {
        let known: Vec<String> = self
            .strings
            .keys()
            .chain(self.sets.keys())
            .chain(self.hashes.keys())
            .cloned()
            .collect();
        for key in &known {
            self.purge(key);
        }
        self.strings.len() + self.sets.len() + self.hashes.len()
    }
}

/// Translates a store glob (`*`, `?`) into an anchored regex.
fn glob_regex(pattern: &str) -> StoreResult<Regex> {
    let mut source = String::with_capacity(pattern.len() + 4);
    source.push('^');
    for c in pattern.chars() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');
    Regex::new(&source).map_err(|_| StoreError::BadPattern {
        pattern: pattern.to_string(),
    })
}

/// In-memory store with a command counter.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    commands: AtomicU64,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of commands issued so far
    pub fn commands_issued(&self) -> u64 {
        self.commands.load(Ordering::SeqCst)
    }

    /// Number of live keys of any type
    pub fn key_count(&self) -> usize {
        self.lock().live_key_count()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        // Recover the data on poisoning; the state itself is still coherent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self) {
        self.commands.fetch_add(1, Ordering::SeqCst);
    }
}

impl Store for MemoryStore {
    fn exists(&self, key: &str) -> StoreResult<bool> {
        self.record();
        Ok(self.lock().exists(key))
    }

    fn del(&self, key: &str) -> StoreResult<bool> {
        self.record();
        Ok(self.lock().del(key))
    }

    fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<bool> {
        self.record();
        Ok(self.lock().expire(key, ttl_secs))
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.record();
        self.lock().get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.record();
        self.lock().set(key, value);
        Ok(())
    }

    fn incr(&self, key: &str) -> StoreResult<i64> {
        self.record();
        self.lock().incr(key)
    }

    fn sadd(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.record();
        self.lock().sadd(key, member)
    }

    fn srem(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.record();
        self.lock().srem(key, member)
    }

    fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.record();
        self.lock().sismember(key, member)
    }

    fn scard(&self, key: &str) -> StoreResult<usize> {
        self.record();
        self.lock().scard(key)
    }

    fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        self.record();
        self.lock().smembers(key)
    }

    fn sinter(&self, keys: &[String]) -> StoreResult<Vec<String>> {
        self.record();
        self.lock().sinter(keys)
    }

    fn sinterstore(&self, destination: &str, keys: &[String]) -> StoreResult<usize> {
        self.record();
        self.lock().sinterstore(destination, keys)
    }

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.record();
        self.lock().hget(key, field)
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<bool> {
        self.record();
        self.lock().hset(key, field, value)
    }

    fn hdel(&self, key: &str, fields: &[&str]) -> StoreResult<usize> {
        self.record();
        self.lock().hdel(key, fields)
    }

    fn hgetall(&self, key: &str) -> StoreResult<Vec<(String, String)>> {
        self.record();
        self.lock().hgetall(key)
    }

    fn hkeys(&self, key: &str) -> StoreResult<Vec<String>> {
        self.record();
        Ok(self
            .lock()
            .hgetall(key)?
            .into_iter()
            .map(|(field, _)| field)
            .collect())
    }

    fn hvals(&self, key: &str) -> StoreResult<Vec<String>> {
        self.record();
        Ok(self
            .lock()
            .hgetall(key)?
            .into_iter()
            .map(|(_, value)| value)
            .collect())
    }

    fn hlen(&self, key: &str) -> StoreResult<usize> {
        self.record();
        self.lock().hlen(key)
    }

    fn hexists(&self, key: &str, field: &str) -> StoreResult<bool> {
        self.record();
        self.lock().hexists(key, field)
    }

    fn hscan(&self, key: &str, pattern: &str) -> StoreResult<Vec<(String, String)>> {
        self.record();
        self.lock().hscan(key, pattern)
    }

    fn sort(&self, key: &str, request: &SortRequest) -> StoreResult<Vec<String>> {
        self.record();
        sort::evaluate(&mut self.lock(), key, request)
    }

    fn atomically(
        &self,
        ops: &mut dyn FnMut(&mut dyn StoreWrite) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let mut inner = self.lock();
        let mut scope = AtomicScope {
            inner: &mut inner,
            commands: &self.commands,
        };
        ops(&mut scope)
    }
}

/// Write handle holding the lock for the duration of a grouped scope.
struct AtomicScope<'a> {
    inner: &'a mut MemoryInner,
    commands: &'a AtomicU64,
}

impl AtomicScope<'_> {
    fn record(&self) {
        self.commands.fetch_add(1, Ordering::SeqCst);
    }
}

impl StoreWrite for AtomicScope<'_> {
    fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.record();
        self.inner.set(key, value);
        Ok(())
    }

    fn del(&mut self, key: &str) -> StoreResult<bool> {
        self.record();
        Ok(self.inner.del(key))
    }

    fn incr(&mut self, key: &str) -> StoreResult<i64> {
        self.record();
        self.inner.incr(key)
    }

    fn sadd(&mut self, key: &str, member: &str) -> StoreResult<bool> {
        self.record();
        self.inner.sadd(key, member)
    }

    fn srem(&mut self, key: &str, member: &str) -> StoreResult<bool> {
        self.record();
        self.inner.srem(key, member)
    }

    fn hset(&mut self, key: &str, field: &str, value: &str) -> StoreResult<bool> {
        self.record();
        self.inner.hset(key, field, value)
    }

    fn hdel(&mut self, key: &str, fields: &[&str]) -> StoreResult<usize> {
        self.record();
        self.inner.hdel(key, fields)
    }
}
