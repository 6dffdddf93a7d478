//! Per-operator tile cache
//!
//! Published tiles live in a sharded map keyed by (band, tile). Computation
//! is serialized by gates keyed by the compute unit: one band of a tile, or
//! the whole band stack of a tile for stack-mode operators. A gate records
//! a failure so that requesters already waiting on it receive the same
//! error instead of recomputing.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use rasterflow_core::{Error, Tile, TileIndex};

use crate::lock;

const SHARDS: usize = 16;

/// Address of one cached tile within an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub band: usize,
    pub tile: TileIndex,
}

impl TileKey {
    pub fn new(band: usize, tile: TileIndex) -> Self {
        Self { band, tile }
    }
}

/// Unit of one `compute` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Unit {
    Band(usize, TileIndex),
    Stack(TileIndex),
}

/// Per-unit computation lock; holds the failure of the last attempt
pub(crate) type Gate = Mutex<Option<Error>>;

struct Sharded<K, V> {
    shards: Vec<Mutex<HashMap<K, V>>>,
}

impl<K: Hash + Eq, V> Sharded<K, V> {
    fn new() -> Self {
        Self {
            shards: (0..SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, key: &K) -> &Mutex<HashMap<K, V>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[hasher.finish() as usize % SHARDS]
    }
}

/// Published tiles of one operator plus the gates serializing their
/// computation.
pub struct TileCache {
    tiles: Sharded<TileKey, Arc<Tile>>,
    gates: Sharded<Unit, Arc<Gate>>,
}

impl TileCache {
    pub fn new() -> Self {
        Self {
            tiles: Sharded::new(),
            gates: Sharded::new(),
        }
    }

    pub fn get(&self, key: &TileKey) -> Option<Arc<Tile>> {
        lock(self.tiles.shard(key)).get(key).cloned()
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        lock(self.tiles.shard(key)).contains_key(key)
    }

    /// Publish a freshly computed tile. Returns the previous entry, which
    /// is only ever present if the computation lock was bypassed.
    pub(crate) fn publish(&self, key: TileKey, mut tile: Tile) -> (Arc<Tile>, Option<Arc<Tile>>) {
        tile.publish();
        let tile = Arc::new(tile);
        let previous = lock(self.tiles.shard(&key)).insert(key, Arc::clone(&tile));
        (tile, previous)
    }

    /// Explicitly replace a cached tile with a distinct value
    pub fn replace(&self, key: TileKey, tile: Tile) -> Option<Arc<Tile>> {
        self.publish(key, tile).1
    }

    /// Drop a cached tile so the next request recomputes it
    pub fn invalidate(&self, key: &TileKey) -> Option<Arc<Tile>> {
        lock(self.tiles.shard(key)).remove(key)
    }

    pub fn len(&self) -> usize {
        self.tiles.shards.iter().map(|s| lock(s).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release every tile and gate; returns the number of tiles released
    pub fn clear(&self) -> usize {
        let mut released = 0;
        for shard in &self.tiles.shards {
            let mut map = lock(shard);
            released += map.len();
            map.clear();
        }
        for shard in &self.gates.shards {
            lock(shard).clear();
        }
        released
    }

    pub(crate) fn gate(&self, unit: Unit) -> Arc<Gate> {
        let mut map = lock(self.gates.shard(&unit));
        Arc::clone(map.entry(unit).or_insert_with(|| Arc::new(Mutex::new(None))))
    }

    /// Forget `gate` if it is still the current gate for `unit`
    pub(crate) fn release_gate(&self, unit: Unit, gate: &Arc<Gate>) {
        let mut map = lock(self.gates.shard(&unit));
        if map.get(&unit).is_some_and(|current| Arc::ptr_eq(current, gate)) {
            map.remove(&unit);
        }
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rasterflow_core::{DataType, Rect};

    fn tile(value: f64) -> Tile {
        Tile::filled(Rect::new(0, 0, 2, 2), DataType::F64, value).unwrap()
    }

    #[test]
    fn published_tiles_are_frozen() {
        let cache = TileCache::new();
        let key = TileKey::new(0, TileIndex::new(0, 0));
        let (stored, previous) = cache.publish(key, tile(1.0));
        assert!(previous.is_none());
        assert!(stored.is_published());
        assert_eq!(cache.get(&key).unwrap().get_sample(0, 0).unwrap(), 1.0);
    }

    #[test]
    fn explicit_replacement_and_invalidation() {
        let cache = TileCache::new();
        let key = TileKey::new(1, TileIndex::new(2, 3));
        cache.publish(key, tile(1.0));
        let old = cache.replace(key, tile(2.0)).unwrap();
        assert_eq!(old.get_sample(0, 0).unwrap(), 1.0);
        assert_eq!(cache.get(&key).unwrap().get_sample(0, 0).unwrap(), 2.0);
        assert!(cache.invalidate(&key).is_some());
        assert!(!cache.contains(&key));
    }

    #[test]
    fn gates_are_shared_until_released() {
        let cache = TileCache::new();
        let unit = Unit::Band(0, TileIndex::new(0, 0));
        let a = cache.gate(unit);
        let b = cache.gate(unit);
        assert!(Arc::ptr_eq(&a, &b));
        cache.release_gate(unit, &a);
        let c = cache.gate(unit);
        assert!(!Arc::ptr_eq(&a, &c));
        // a stale gate does not evict its successor
        cache.release_gate(unit, &a);
        assert!(Arc::ptr_eq(&c, &cache.gate(unit)));
    }

    #[test]
    fn clear_counts_released_tiles() {
        let cache = TileCache::new();
        for x in 0..5 {
            cache.publish(TileKey::new(0, TileIndex::new(x, 0)), tile(x as f64));
        }
        assert_eq!(cache.len(), 5);
        assert_eq!(cache.clear(), 5);
        assert!(cache.is_empty());
    }
}
