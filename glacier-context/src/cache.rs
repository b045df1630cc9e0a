use crate::element::QueryContextElement;
use crate::error::{Error, Result};
use glacier_protocol::QueryContextDTO;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::mem;

pub const DEFAULT_QUERY_CONTEXT_CACHE_SIZE: usize = 5;

/// QueryContextCache keeps query context entries received from server.
///
/// Entries are merged in rounds, one round per query response:
///
/// 1. Each entry is inserted. An entry with known id replaces the old one
///    only if it is newer, or equally new but with a different priority.
///    An entry with new id replaces the committed entry of same priority,
///    if any.
/// 2. Priorities touched in this round are committed. At most one entry
///    survives per priority.
/// 3. Cache is trimmed to its capacity by evicting entries with the
///    largest priority values.
///
/// A single lock guards the whole structure, so a reader never observes
/// a half-merged round.
#[derive(Debug)]
pub struct QueryContextCache {
    inner: Mutex<Inner>,
}

impl Default for QueryContextCache {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_CONTEXT_CACHE_SIZE)
    }
}

impl QueryContextCache {
    #[inline]
    pub fn new(capacity: usize) -> Self {
        QueryContextCache {
            inner: Mutex::new(Inner::new(capacity)),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.lock().tree_set.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or merge a single entry.
    /// The cache is not consistent until [`sync_priority_map`](Self::sync_priority_map)
    /// is called.
    #[inline]
    pub fn insert(&self, id: i64, read_timestamp: i64, priority: i64, context: Option<String>) {
        let mut inner = self.inner.lock();
        inner.insert(QueryContextElement::new(
            id,
            read_timestamp,
            priority,
            context,
        ));
    }

    #[inline]
    pub fn sync_priority_map(&self) {
        self.inner.lock().sync_priority_map()
    }

    #[inline]
    pub fn trim(&self) {
        self.inner.lock().trim()
    }

    #[inline]
    pub fn clear(&self) {
        self.inner.lock().clear()
    }

    /// Elements ordered by priority.
    #[inline]
    pub fn serialize(&self) -> Vec<QueryContextElement> {
        let inner = self.inner.lock();
        inner.tree_set.iter().cloned().collect()
    }

    /// Wire format of the cache, `{}` if nothing is cached.
    #[inline]
    pub fn serialize_dto(&self) -> QueryContextDTO {
        let inner = self.inner.lock();
        QueryContextDTO {
            entries: inner.tree_set.iter().map(|e| e.to_dto()).collect(),
        }
    }

    /// Merge query context from server response.
    ///
    /// Accepts the `queryContext` object with an `entries` array, or the
    /// array itself. Missing or empty data clears the cache. Malformed data
    /// also clears the cache and is otherwise ignored, none of its entries
    /// is applied.
    pub fn deserialize(&self, data: Option<&Value>) {
        let mut inner = self.inner.lock();
        match data.map(parse_entries).transpose() {
            Ok(Some(elems)) if !elems.is_empty() => inner.merge_round(elems),
            Ok(_) => inner.clear(),
            Err(e) => {
                log::warn!("Drop malformed query context: {}", e);
                inner.clear();
            }
        }
        inner.log_entries();
    }

    /// Merge query context from typed message.
    pub fn deserialize_dto(&self, dto: &QueryContextDTO) {
        let mut inner = self.inner.lock();
        if dto.is_empty() {
            inner.clear();
        } else {
            inner.merge_round(dto.entries.iter().map(QueryContextElement::from).collect());
        }
        inner.log_entries();
    }
}

#[derive(Debug)]
struct Inner {
    capacity: usize,
    id_map: HashMap<i64, QueryContextElement>,
    /// committed priorities.
    priority_map: HashMap<i64, QueryContextElement>,
    /// priorities touched in current round.
    intermediate_priority_map: HashMap<i64, QueryContextElement>,
    tree_set: BTreeSet<QueryContextElement>,
}

impl Inner {
    #[inline]
    fn new(capacity: usize) -> Self {
        Inner {
            capacity,
            id_map: HashMap::new(),
            priority_map: HashMap::new(),
            intermediate_priority_map: HashMap::new(),
            tree_set: BTreeSet::new(),
        }
    }

    #[inline]
    fn merge_round(&mut self, elems: Vec<QueryContextElement>) {
        for elem in elems {
            self.insert(elem);
        }
        self.sync_priority_map();
        self.trim();
    }

    fn insert(&mut self, elem: QueryContextElement) {
        if let Some(old) = self.id_map.get(&elem.id()) {
            let newer = elem.read_timestamp() > old.read_timestamp();
            let reprioritized = elem.read_timestamp() == old.read_timestamp()
                && elem.priority() != old.priority();
            if newer || reprioritized {
                let old = old.clone();
                self.replace(&old, elem);
            }
            return;
        }
        match self.priority_map.get(&elem.priority()).cloned() {
            Some(occupant) => self.replace(&occupant, elem),
            None => self.add(elem),
        }
    }

    #[inline]
    fn add(&mut self, elem: QueryContextElement) {
        // the latter one of same priority wins within a round.
        if let Some(prev) = self.intermediate_priority_map.get(&elem.priority()) {
            if prev.id() != elem.id() {
                let prev = prev.clone();
                self.remove(&prev);
            }
        }
        self.tree_set.insert(elem.clone());
        self.id_map.insert(elem.id(), elem.clone());
        self.intermediate_priority_map.insert(elem.priority(), elem);
    }

    #[inline]
    fn remove(&mut self, elem: &QueryContextElement) {
        self.tree_set.remove(elem);
        self.id_map.remove(&elem.id());
        remove_same_id(&mut self.priority_map, elem);
        remove_same_id(&mut self.intermediate_priority_map, elem);
    }

    #[inline]
    fn replace(&mut self, old: &QueryContextElement, new: QueryContextElement) {
        self.remove(old);
        self.add(new);
    }

    fn sync_priority_map(&mut self) {
        let pending = mem::take(&mut self.intermediate_priority_map);
        for (priority, elem) in pending {
            if let Some(occupant) = self.priority_map.get(&priority) {
                if occupant.id() != elem.id() {
                    let occupant = occupant.clone();
                    self.tree_set.remove(&occupant);
                    self.id_map.remove(&occupant.id());
                }
            }
            self.priority_map.insert(priority, elem);
        }
    }

    fn trim(&mut self) {
        debug_assert!(
            self.intermediate_priority_map.is_empty(),
            "priority map must be synced before trim"
        );
        while self.tree_set.len() > self.capacity {
            let mut iter = self.tree_set.iter().rev();
            let last = match iter.next() {
                Some(last) => last.clone(),
                None => break,
            };
            debug_assert!(
                iter.next().map_or(true, |e| e.priority() != last.priority()),
                "priority must be unique after sync"
            );
            self.remove(&last);
        }
    }

    #[inline]
    fn clear(&mut self) {
        self.id_map.clear();
        self.priority_map.clear();
        self.intermediate_priority_map.clear();
        self.tree_set.clear();
    }

    #[inline]
    fn log_entries(&self) {
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("Query context cache size={}", self.tree_set.len());
            for e in &self.tree_set {
                log::debug!(
                    "Query context entry id={}, read_timestamp={}, priority={}",
                    e.id(),
                    e.read_timestamp(),
                    e.priority()
                );
            }
        }
    }
}

#[inline]
fn remove_same_id(map: &mut HashMap<i64, QueryContextElement>, elem: &QueryContextElement) {
    if map.get(&elem.priority()).map(|e| e.id()) == Some(elem.id()) {
        map.remove(&elem.priority());
    }
}

fn parse_entries(data: &Value) -> Result<Vec<QueryContextElement>> {
    let entries = match data {
        Value::Null => return Ok(vec![]),
        Value::Array(entries) => entries,
        Value::Object(obj) => match obj.get("entries") {
            None | Some(Value::Null) => return Ok(vec![]),
            Some(Value::Array(entries)) => entries,
            Some(_) => return Err(Error::InvalidEntries),
        },
        _ => return Err(Error::InvalidContext),
    };
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| parse_entry(index, entry))
        .collect()
}

fn parse_entry(index: usize, entry: &Value) -> Result<QueryContextElement> {
    let int_field = |field: &'static str| {
        entry
            .get(field)
            .and_then(Value::as_i64)
            .ok_or(Error::InvalidEntryField { index, field })
    };
    let id = int_field("id")?;
    let read_timestamp = int_field("timestamp")?;
    let priority = int_field("priority")?;
    let invalid_context = Error::InvalidEntryField {
        index,
        field: "context",
    };
    let context = match entry.get("context") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(obj)) => match obj.get("base64Data") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(invalid_context),
        },
        Some(_) => return Err(invalid_context),
    };
    Ok(QueryContextElement::new(id, read_timestamp, priority, context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::Rng;
    use serde_json::json;
    use std::sync::Arc;

    fn ids(cache: &QueryContextCache) -> Vec<i64> {
        cache.serialize().iter().map(|e| e.id()).collect()
    }

    fn priorities(cache: &QueryContextCache) -> Vec<i64> {
        cache.serialize().iter().map(|e| e.priority()).collect()
    }

    fn round(cache: &QueryContextCache, elems: &[(i64, i64, i64, Option<&str>)]) {
        for (id, ts, pri, ctx) in elems {
            cache.insert(*id, *ts, *pri, ctx.map(String::from));
        }
        cache.sync_priority_map();
        cache.trim();
    }

    fn assert_consistent(cache: &QueryContextCache) {
        let inner = cache.inner.lock();
        assert!(inner.intermediate_priority_map.is_empty());
        assert_eq!(inner.tree_set.len(), inner.id_map.len());
        assert_eq!(inner.tree_set.len(), inner.priority_map.len());
        for e in &inner.tree_set {
            assert_eq!(inner.id_map.get(&e.id()), Some(e));
            assert_eq!(inner.priority_map.get(&e.priority()), Some(e));
        }
    }

    #[test]
    fn test_capacity_scenario() {
        let cache = QueryContextCache::new(3);
        round(
            &cache,
            &[(1, 100, 0, None), (2, 100, 1, None), (3, 100, 2, None)],
        );
        assert_eq!(cache.len(), 3);
        round(&cache, &[(4, 100, 3, None)]);
        assert_eq!(cache.len(), 3);
        assert_eq!(priorities(&cache), vec![0, 1, 2]);
        assert_eq!(ids(&cache), vec![1, 2, 3]);
        assert_consistent(&cache);
    }

    #[test]
    fn test_trim_evicts_largest_priority() {
        let cache = QueryContextCache::new(3);
        round(
            &cache,
            &[(1, 100, 0, None), (2, 100, 1, None), (3, 100, 3, None)],
        );
        round(&cache, &[(4, 100, 2, None)]);
        assert_eq!(cache.len(), 3);
        assert_eq!(priorities(&cache), vec![0, 1, 2]);
        assert_eq!(ids(&cache), vec![1, 2, 4]);
        assert_consistent(&cache);
    }

    #[test]
    fn test_last_writer_wins() {
        let cache = QueryContextCache::new(5);
        round(&cache, &[(5, 10, 2, Some("a"))]);
        round(&cache, &[(5, 10, 2, Some("b"))]);
        assert_eq!(cache.serialize()[0].context(), Some("a"));
        // older timestamp never wins
        round(&cache, &[(5, 9, 4, Some("c"))]);
        assert_eq!(cache.serialize()[0].context(), Some("a"));
        round(&cache, &[(5, 11, 2, Some("b"))]);
        let elems = cache.serialize();
        assert_eq!(elems.len(), 1);
        assert_eq!(elems[0].context(), Some("b"));
        assert_eq!(elems[0].read_timestamp(), 11);
        // same timestamp with different priority replaces
        round(&cache, &[(5, 11, 7, Some("b"))]);
        assert_eq!(priorities(&cache), vec![7]);
        assert_consistent(&cache);
    }

    #[test]
    fn test_new_id_replaces_committed_priority() {
        let cache = QueryContextCache::new(5);
        round(&cache, &[(1, 100, 0, Some("main")), (2, 100, 1, None)]);
        round(&cache, &[(3, 50, 1, Some("other"))]);
        assert_eq!(ids(&cache), vec![1, 3]);
        assert_consistent(&cache);
    }

    #[test]
    fn test_priority_unique_within_round() {
        let cache = QueryContextCache::new(5);
        round(&cache, &[(1, 100, 4, Some("x")), (2, 100, 4, Some("y"))]);
        let elems = cache.serialize();
        assert_eq!(elems.len(), 1);
        assert_eq!(elems[0].id(), 2);
        assert_consistent(&cache);
    }

    #[test]
    fn test_reprioritized_entry_takes_over_committed_priority() {
        let cache = QueryContextCache::new(5);
        round(&cache, &[(1, 100, 0, None), (2, 100, 1, None)]);
        // id 2 moves to priority 0, which is committed by id 1.
        round(&cache, &[(2, 101, 0, None)]);
        assert_eq!(ids(&cache), vec![2]);
        assert_eq!(priorities(&cache), vec![0]);
        assert_consistent(&cache);
    }

    #[test]
    fn test_random_eviction() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let capacity = rng.gen_range(1..6);
            let cache = QueryContextCache::new(capacity);
            let n = rng.gen_range(0..12);
            let mut pris: Vec<i64> = (0..20).collect();
            pris.shuffle(&mut rng);
            let elems: Vec<_> = (0..n)
                .map(|i| (i as i64, 100, pris[i], None))
                .collect();
            round(&cache, &elems);
            let mut expected: Vec<i64> = elems.iter().map(|e| e.2).collect();
            expected.sort();
            expected.truncate(capacity);
            assert_eq!(priorities(&cache), expected);
            assert_consistent(&cache);
        }
    }

    #[test]
    fn test_deserialize_and_round_trip() {
        let data = json!({"entries": [
            {"id": 0, "timestamp": 123, "priority": 0, "context": {"base64Data": "bWFpbg=="}},
            {"id": 7, "timestamp": 124, "priority": 2, "context": {}},
            {"id": 3, "timestamp": 125, "priority": 1, "context": "cmF3"}
        ]});
        let cache = QueryContextCache::new(5);
        cache.deserialize(Some(&data));
        assert_eq!(ids(&cache), vec![0, 3, 7]);
        assert_consistent(&cache);

        let dto = cache.serialize_dto();
        let mut shuffled = dto.clone();
        shuffled.entries.reverse();
        let other = QueryContextCache::new(5);
        other.deserialize_dto(&shuffled);
        assert_eq!(other.serialize(), cache.serialize());

        let wire = serde_json::to_value(&dto).unwrap();
        let third = QueryContextCache::new(5);
        third.deserialize(Some(&wire));
        assert_eq!(third.serialize(), cache.serialize());
        assert_eq!(third.serialize()[0].context(), Some("bWFpbg=="));
        assert_eq!(third.serialize()[2].context(), None);
    }

    #[test]
    fn test_deserialize_malformed_clears() {
        let cache = QueryContextCache::new(5);
        round(&cache, &[(1, 1, 1, None)]);
        let data = json!({"entries": [
            {"id": 2, "timestamp": 1, "priority": 2},
            {"id": "x", "timestamp": 1, "priority": 3}
        ]});
        cache.deserialize(Some(&data));
        assert!(cache.is_empty());

        round(&cache, &[(1, 1, 1, None)]);
        cache.deserialize(Some(&json!({"entries": [{"id": 1, "timestamp": 2.5, "priority": 1}]})));
        assert!(cache.is_empty());

        round(&cache, &[(1, 1, 1, None)]);
        cache.deserialize(Some(&json!({"entries": [{"id": 1, "timestamp": 2, "priority": 1, "context": 5}]})));
        assert!(cache.is_empty());

        round(&cache, &[(1, 1, 1, None)]);
        cache.deserialize(Some(&json!("entries")));
        assert!(cache.is_empty());
        assert_consistent(&cache);
    }

    #[test]
    fn test_deserialize_empty_clears() {
        let cache = QueryContextCache::new(5);
        for data in [None, Some(json!(null)), Some(json!({})), Some(json!({"entries": []}))] {
            round(&cache, &[(1, 1, 1, None)]);
            cache.deserialize(data.as_ref());
            assert!(cache.is_empty());
        }
    }

    #[test]
    fn test_empty_serialize() {
        let cache = QueryContextCache::default();
        assert_eq!(cache.capacity(), DEFAULT_QUERY_CONTEXT_CACHE_SIZE);
        assert!(cache.serialize().is_empty());
        let dto = cache.serialize_dto();
        assert!(dto.is_empty());
        assert_eq!(serde_json::to_value(&dto).unwrap(), json!({}));
    }

    #[test]
    fn test_concurrent_rounds_are_atomic() {
        let cache = Arc::new(QueryContextCache::new(4));
        let writer = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for ts in 1..500i64 {
                    let entries: Vec<_> = (0..4)
                        .map(|i| json!({"id": i, "timestamp": ts, "priority": i}))
                        .collect();
                    cache.deserialize(Some(&json!({ "entries": entries })));
                }
            })
        };
        let readers: Vec<_> = (0..3)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let elems = cache.serialize();
                        if let Some(first) = elems.first() {
                            assert_eq!(elems.len(), 4);
                            assert!(elems
                                .iter()
                                .all(|e| e.read_timestamp() == first.read_timestamp()));
                        }
                    }
                })
            })
            .collect();
        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(cache.len(), 4);
        assert_consistent(&cache);
    }
}
