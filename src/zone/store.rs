use super::ZoneSnapshot;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Holds the currently published snapshot.
///
/// Readers clone the `Arc` under a short read lock and resolve against their
/// own handle, so a publish never changes data under an in-flight query. The
/// write lock is taken only to swap the pointer.
pub struct ZoneStore {
    current: RwLock<Published>,
}

struct Published {
    snapshot: Arc<ZoneSnapshot>,
    generation: u64,
}

impl ZoneStore {
    pub fn new(initial: ZoneSnapshot) -> Self {
        Self {
            current: RwLock::new(Published {
                snapshot: Arc::new(initial),
                generation: 0,
            }),
        }
    }

    /// The presently active snapshot
    pub fn current(&self) -> Arc<ZoneSnapshot> {
        Arc::clone(&self.current.read().snapshot)
    }

    /// Number of publishes since the store was created
    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }

    /// Publish `snapshot`, returning the one it replaced
    pub fn apply(&self, snapshot: ZoneSnapshot) -> Arc<ZoneSnapshot> {
        let snapshot = Arc::new(snapshot);
        let (previous, generation) = {
            let mut current = self.current.write();
            current.generation += 1;
            let previous = std::mem::replace(&mut current.snapshot, snapshot);
            (previous, current.generation)
        };
        debug!("Published zone snapshot generation {}", generation);
        previous
    }
}

impl Default for ZoneStore {
    fn default() -> Self {
        Self::new(ZoneSnapshot::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::{ZoneBuilder, ZoneDefinition, ZoneName};

    fn snapshot_with(host: &str) -> ZoneSnapshot {
        let builder = ZoneBuilder::new(ZoneName::parse("localhost").unwrap()).unwrap();
        builder
            .build(&ZoneDefinition::default().with_record("example.com", host, "a", "10.0.0.1"))
            .unwrap()
    }

    #[test]
    fn test_apply_swaps_snapshot() {
        let store = ZoneStore::default();
        assert_eq!(store.current().zone_count(), 0);
        assert_eq!(store.generation(), 0);

        let previous = store.apply(snapshot_with("a.example.com"));
        assert_eq!(previous.zone_count(), 0);
        assert_eq!(store.generation(), 1);
        assert!(
            store
                .current()
                .records(&ZoneName::parse("a.example.com").unwrap())
                .is_some()
        );
    }

    #[test]
    fn test_held_snapshot_survives_publish() {
        let store = ZoneStore::new(snapshot_with("old.example.com"));
        let held = store.current();

        store.apply(snapshot_with("new.example.com"));

        let old = ZoneName::parse("old.example.com").unwrap();
        let new = ZoneName::parse("new.example.com").unwrap();
        assert!(held.records(&old).is_some());
        assert!(held.records(&new).is_none());
        assert!(store.current().records(&new).is_some());
        assert!(store.current().records(&old).is_none());
    }
}
