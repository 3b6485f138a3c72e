//! An [LruIndex] is the cache's name index and recency order in one structure.
//!
//! This is implemented as a vec-backed doubly linked list, with freed slots threaded onto a free list, plus an auxiliary
//! hash-based index from key to slot.  Lookup, promotion, insertion and removal are all O(1); nothing ever scans the
//! list except [LruIndex::iter].
//!
//! Unlike a capacity-bounded LRU this never evicts by itself.  Each entry carries a cost and the index keeps the total,
//! but deciding when to call [LruIndex::pop_lru] is up to the owner.
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use ahash::RandomState;

struct OccupiedEntry<K, V> {
    key: Arc<K>,
    item: V,
    prev: Option<usize>,
    next: Option<usize>,
    cost: u64,
}

struct EmptyEntry {
    next_empty: Option<usize>,
}

enum LruEntry<K, V> {
    /// This entry is empty, possibly with a pointer at the next empty entry.
    Empty(EmptyEntry),
    /// This entry is occupied, and doubly linked to the previous and next entry.
    Occupied(OccupiedEntry<K, V>),
}

impl<K, V> LruEntry<K, V> {
    fn as_occupied_mut(&mut self) -> &mut OccupiedEntry<K, V> {
        match self {
            Self::Occupied(ref mut x) => x,
            _ => panic!("Entry should be occupied"),
        }
    }

    fn as_occupied(&self) -> &OccupiedEntry<K, V> {
        match self {
            Self::Occupied(ref x) => x,
            _ => panic!("Entry should be occupied"),
        }
    }

    fn as_empty_mut(&mut self) -> &mut EmptyEntry {
        match self {
            Self::Empty(ref mut x) => x,
            _ => panic!("Entry should be empty"),
        }
    }
}

pub struct LruIndex<K: Hash + Eq, V> {
    entries: Vec<LruEntry<K, V>>,
    /// Points at the slot of the key.
    index: HashMap<Arc<K>, usize, RandomState>,
    /// Most recently used.
    head: Option<usize>,
    /// Least recently used.
    tail: Option<usize>,
    empty_head: Option<usize>,
    /// Sum of the costs of every entry.
    cost: u64,
}

impl<K: Hash + Eq, V> Default for LruIndex<K, V> {
    fn default() -> Self {
        LruIndex {
            entries: Default::default(),
            index: Default::default(),
            head: None,
            tail: None,
            empty_head: None,
            cost: 0,
        }
    }
}

impl<K: Hash + Eq + Clone, V> LruIndex<K, V> {
    pub fn new() -> LruIndex<K, V> {
        Default::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Total cost of everything in the index.
    pub fn cost(&self) -> u64 {
        self.cost
    }

    /// Entirely unlink an occupied slot from the list.
    /// Used as a precursor step to lots of things such as patching up the head.
    fn unlink(&mut self, slot: usize) {
        let (prev, next) = {
            let e = self.entries[slot].as_occupied();
            (e.prev, e.next)
        };

        match prev {
            Some(p) => self.entries[p].as_occupied_mut().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.entries[n].as_occupied_mut().prev = prev,
            None => self.tail = prev,
        }

        let e = self.entries[slot].as_occupied_mut();
        e.prev = None;
        e.next = None;
    }

    /// Link an occupied, currently unlinked slot in as the most recent item.
    fn link_front(&mut self, slot: usize) {
        let old_head = self.head;
        self.entries[slot].as_occupied_mut().next = old_head;
        if let Some(h) = old_head {
            self.entries[h].as_occupied_mut().prev = Some(slot);
        }
        self.head = Some(slot);

        // If there's no tail this is the only entry.
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }

    /// Look up `key`, making it the most recently used entry.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let slot = *self.index.get(key)?;
        if self.head != Some(slot) {
            self.unlink(slot);
            self.link_front(slot);
        }
        Some(&self.entries[slot].as_occupied().item)
    }

    /// Look up `key` without touching its recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        let slot = *self.index.get(key)?;
        Some(&self.entries[slot].as_occupied().item)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Make a specific slot become empty, handing back what was in it.
    fn become_empty(&mut self, slot: usize) -> (Arc<K>, V) {
        self.unlink(slot);
        let mut old = LruEntry::Empty(EmptyEntry {
            next_empty: self.empty_head,
        });
        std::mem::swap(&mut old, &mut self.entries[slot]);
        self.empty_head = Some(slot);
        match old {
            LruEntry::Occupied(OccupiedEntry {
                key, item, cost, ..
            }) => {
                self.index.remove(&key);
                self.cost -= cost;
                (key, item)
            }
            _ => panic!("Should have been occupied"),
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = *self.index.get(key)?;
        Some(self.become_empty(slot).1)
    }

    /// Remove and return the least recently used entry.
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        let slot = self.tail?;
        let (key, item) = self.become_empty(slot);
        // The index entry is gone, so this is almost always the last reference.
        let key = Arc::try_unwrap(key).unwrap_or_else(|k| (*k).clone());
        Some((key, item))
    }

    /// The least recently used entry, without touching its recency.
    pub fn peek_lru(&self) -> Option<(&K, &V)> {
        let e = self.entries[self.tail?].as_occupied();
        Some((&*e.key, &e.item))
    }

    /// Find an available empty slot, or make one if necessary.
    fn find_empty(&mut self) -> usize {
        if let Some(e) = self.empty_head {
            self.empty_head = self.entries[e].as_empty_mut().next_empty;
            return e;
        }

        self.entries
            .push(LruEntry::Empty(EmptyEntry { next_empty: None }));
        self.entries.len() - 1
    }

    /// Add an entry as the most recently used.  Return the old value if this key was already present.
    pub fn insert(&mut self, key: K, value: V, cost: u64) -> Option<V> {
        let ret = self.remove(&key);
        let key = Arc::new(key);
        let slot = self.find_empty();

        self.entries[slot] = LruEntry::Occupied(OccupiedEntry {
            key: key.clone(),
            item: value,
            prev: None,
            next: None,
            cost,
        });
        self.link_front(slot);
        self.index.insert(key, slot);
        self.cost += cost;
        ret
    }

    /// Remove everything, returning the values from most to least recently used.
    pub fn clear(&mut self) -> Vec<V> {
        let mut out = Vec::with_capacity(self.len());
        while let Some(h) = self.head {
            out.push(self.become_empty(h).1);
        }
        self.entries.clear();
        self.empty_head = None;
        out
    }

    /// Iterator visiting entries in most-recently-used order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        let mut slot = self.head;
        std::iter::from_fn(move || {
            let next = slot?;
            let ret = self.entries[next].as_occupied();
            slot = ret.next;
            Some((&*ret.key, &ret.item))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use lru::LruCache;
    use proptest::prelude::*;

    /// Simple helper to build proptest strategies so that we can test against [LruCache].
    #[derive(Copy, Clone, Debug, Ord, Eq, PartialOrd, PartialEq)]
    enum CacheCommand {
        Put(u64, u64),
        Get(u64),
        Delete(u64),
        PopLru,
    }

    fn cache_command_strat(
        max_key: std::ops::Range<u64>,
        max_value: std::ops::Range<u64>,
    ) -> prop::strategy::BoxedStrategy<CacheCommand> {
        proptest::prop_oneof![
            max_key.clone().prop_map(CacheCommand::Get),
            (max_key.clone(), max_value).prop_map(|(x, y)| CacheCommand::Put(x, y)),
            max_key.prop_map(CacheCommand::Delete),
            Just(CacheCommand::PopLru),
        ]
        .boxed()
    }

    // An unbounded `LruCache` only ever loses entries through `pop`/`pop_lru`, which is exactly how the cache drives
    // this index, so the two should agree on every answer and on the order.
    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            max_shrink_iters: 10000,
            ..Default::default()
        })]
        #[test]
        fn test_against_lru_cache(
            commands in prop::collection::vec(cache_command_strat(0..50, 0..10000), 0..2000)
        ) {
            let mut known_good = LruCache::<u64, u64>::unbounded();
            let mut ours = LruIndex::<u64, u64>::new();

            for c in commands {
                use CacheCommand::*;

                match c {
                    Get(k) => prop_assert_eq!(known_good.get(&k).cloned(), ours.get(&k).cloned()),
                    Put(k, v) => prop_assert_eq!(known_good.put(k, v), ours.insert(k, v, v)),
                    Delete(k) => prop_assert_eq!(known_good.pop(&k), ours.remove(&k)),
                    PopLru => prop_assert_eq!(known_good.pop_lru(), ours.pop_lru()),
                }

                let good_state = known_good.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>();
                let our_state = ours.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>();
                prop_assert_eq!(&good_state, &our_state);
                // Each value doubles as its own cost.
                prop_assert_eq!(good_state.iter().map(|x| x.1).sum::<u64>(), ours.cost());
                prop_assert_eq!(good_state.len(), ours.len());
            }
        }
    }

    #[test]
    fn test_promotion_order() {
        let mut index = LruIndex::<&str, u32>::new();
        index.insert("a", 1, 10);
        index.insert("b", 2, 20);
        index.insert("c", 3, 30);
        assert_eq!(index.peek_lru(), Some((&"a", &1)));

        // Touching "a" moves it to the front, leaving "b" as the oldest.
        assert_eq!(index.get(&"a"), Some(&1));
        let order = index.iter().map(|x| *x.0).collect::<Vec<_>>();
        assert_eq!(order, vec!["a", "c", "b"]);
        assert_eq!(index.pop_lru(), Some(("b", 2)));
        assert_eq!(index.cost(), 40);

        // Peeking does not promote.
        assert_eq!(index.peek(&"c"), Some(&3));
        assert_eq!(index.pop_lru(), Some(("c", 3)));
    }

    #[test]
    fn test_slot_reuse_and_clear() {
        let mut index = LruIndex::<u32, u32>::new();
        for i in 0..4 {
            index.insert(i, i, 1);
        }
        index.remove(&1);
        index.remove(&2);
        index.insert(7, 7, 1);
        index.insert(8, 8, 1);
        // Freed slots get reused rather than growing the arena.
        assert_eq!(index.entries.len(), 4);

        assert_eq!(index.clear(), vec![8, 7, 3, 0]);
        assert!(index.is_empty());
        assert_eq!(index.cost(), 0);
        assert_eq!(index.pop_lru(), None);

        // Still usable afterwards.
        index.insert(9, 9, 2);
        assert_eq!(index.get(&9), Some(&9));
        assert_eq!(index.cost(), 2);
    }
}
