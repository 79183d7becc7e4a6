//! Per-user cached buddy lists.
//!
//! A read that misses gets a `Ticket` stamped with the slot's generation before it goes to
//! the database. Any invalidation in the meantime moves the slot to a new generation, so the
//! late result is dropped instead of overwriting the newer state.

use buddies_common::db::buddy::BuddyEntry;
use buddies_common::realtime::{ChangeFeed, FeedError, Filter, Table};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub type BuddyViewCache = ViewCache<Vec<BuddyEntry>>;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BuddyView {
    PendingRequests,
    Buddies,
}

impl BuddyView {
    pub const ALL: [BuddyView; 2] = [BuddyView::PendingRequests, BuddyView::Buddies];
}

type SlotKey = (Uuid, BuddyView);

#[derive(Debug)]
pub struct Ticket {
    key: SlotKey,
    generation: u64,
}

pub enum Lookup<V> {
    Hit(Arc<V>),
    Miss(Ticket),
}

struct Slot<V> {
    generation: u64,
    value: Option<Arc<V>>,
}

pub struct ViewCache<V> {
    slots: Mutex<HashMap<SlotKey, Slot<V>>>,
    next_generation: AtomicU64,
    max_entries: usize,
}

impl<V> ViewCache<V> {
    pub fn new(max_entries: usize) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            max_entries: max_entries.max(1),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<SlotKey, Slot<V>>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    // Generations are unique across the whole cache, so a ticket can never match a slot that
    // was dropped and recreated after it was issued
    fn new_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    pub fn lookup(&self, user_id: Uuid, view: BuddyView) -> Lookup<V> {
        let key = (user_id, view);
        let mut slots = self.slots();

        if let Some(slot) = slots.get(&key) {
            return match &slot.value {
                Some(value) => Lookup::Hit(Arc::clone(value)),
                None => Lookup::Miss(Ticket {
                    key,
                    generation: slot.generation,
                }),
            };
        }

        if slots.len() >= self.max_entries {
            log::debug!("View cache reached {} entries, clearing", slots.len());
            slots.clear();
        }

        let generation = self.new_generation();
        slots.insert(
            key,
            Slot {
                generation,
                value: None,
            },
        );

        Lookup::Miss(Ticket { key, generation })
    }

    /// Stores `value` if nothing invalidated the slot since `ticket` was issued. Returns
    /// whether the value was kept.
    pub fn fill(&self, ticket: Ticket, value: Arc<V>) -> bool {
        let mut slots = self.slots();

        match slots.get_mut(&ticket.key) {
            Some(slot) if slot.generation == ticket.generation => {
                slot.value = Some(value);
                true
            }
            _ => false,
        }
    }

    pub fn invalidate(&self, user_id: Uuid, view: BuddyView) {
        let generation = self.new_generation();
        let mut slots = self.slots();

        if let Some(slot) = slots.get_mut(&(user_id, view)) {
            slot.generation = generation;
            slot.value = None;
        }
    }

    pub fn invalidate_user(&self, user_id: Uuid) {
        for view in BuddyView::ALL {
            self.invalidate(user_id, view);
        }
    }

    pub fn clear(&self) {
        self.slots().clear();
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }
}

/// Invalidates both buddy views of every user touched by a change to the buddies table.
/// A lag means changes were missed, so everything is dropped.
pub fn spawn_invalidation_listener<V>(feed: &ChangeFeed, cache: Arc<ViewCache<V>>) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
{
    let mut subscription = feed.subscribe(Table::Buddies, Filter::All);

    tokio::spawn(async move {
        loop {
            match subscription.recv().await {
                Ok(event) => {
                    for user_id in event.affected_users.iter() {
                        cache.invalidate_user(*user_id);
                    }
                }
                Err(FeedError::Lagged(count)) => {
                    log::warn!("View cache listener missed {count} changes, clearing cache");
                    cache.clear();
                }
                Err(FeedError::Closed) => {
                    log::info!("Change feed closed, stopping view cache listener");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use buddies_common::realtime::{ChangeEvent, ChangeKind};
    use std::time::Duration;

    fn expect_miss<V>(lookup: Lookup<V>) -> Ticket {
        match lookup {
            Lookup::Miss(ticket) => ticket,
            Lookup::Hit(_) => panic!("Expected a cache miss"),
        }
    }

    fn expect_hit<V>(lookup: Lookup<V>) -> Arc<V> {
        match lookup {
            Lookup::Hit(value) => value,
            Lookup::Miss(_) => panic!("Expected a cache hit"),
        }
    }

    #[test]
    fn test_fill_then_hit() {
        let cache = ViewCache::<u32>::new(16);
        let user = Uuid::now_v7();

        let ticket = expect_miss(cache.lookup(user, BuddyView::Buddies));
        assert!(cache.fill(ticket, Arc::new(7)));

        assert_eq!(*expect_hit(cache.lookup(user, BuddyView::Buddies)), 7);
        expect_miss(cache.lookup(user, BuddyView::PendingRequests));
    }

    #[test]
    fn test_late_fill_is_discarded() {
        let cache = ViewCache::<&str>::new(16);
        let user = Uuid::now_v7();

        let stale_ticket = expect_miss(cache.lookup(user, BuddyView::Buddies));

        // A change lands while the first read is still in flight
        cache.invalidate(user, BuddyView::Buddies);
        let fresh_ticket = expect_miss(cache.lookup(user, BuddyView::Buddies));

        assert!(cache.fill(fresh_ticket, Arc::new("fresh")));
        assert!(!cache.fill(stale_ticket, Arc::new("stale")));

        assert_eq!(*expect_hit(cache.lookup(user, BuddyView::Buddies)), "fresh");
    }

    #[test]
    fn test_invalidate_drops_value() {
        let cache = ViewCache::<u32>::new(16);
        let user = Uuid::now_v7();
        let other = Uuid::now_v7();

        for u in [user, other] {
            for view in BuddyView::ALL {
                let ticket = expect_miss(cache.lookup(u, view));
                cache.fill(ticket, Arc::new(1));
            }
        }

        cache.invalidate_user(user);

        expect_miss(cache.lookup(user, BuddyView::Buddies));
        expect_miss(cache.lookup(user, BuddyView::PendingRequests));
        expect_hit(cache.lookup(other, BuddyView::Buddies));
        expect_hit(cache.lookup(other, BuddyView::PendingRequests));
    }

    #[test]
    fn test_ticket_from_before_clear_is_discarded() {
        let cache = ViewCache::<u32>::new(16);
        let user = Uuid::now_v7();

        let old_ticket = expect_miss(cache.lookup(user, BuddyView::Buddies));
        cache.clear();
        assert!(!cache.fill(old_ticket, Arc::new(1)));

        let old_ticket = expect_miss(cache.lookup(user, BuddyView::Buddies));
        cache.clear();
        let new_ticket = expect_miss(cache.lookup(user, BuddyView::Buddies));

        assert!(!cache.fill(old_ticket, Arc::new(1)));
        assert!(cache.fill(new_ticket, Arc::new(2)));
        assert_eq!(*expect_hit(cache.lookup(user, BuddyView::Buddies)), 2);
    }

    #[test]
    fn test_clears_when_full() {
        let cache = ViewCache::<u32>::new(3);

        for _ in 0..3 {
            let ticket = expect_miss(cache.lookup(Uuid::now_v7(), BuddyView::Buddies));
            cache.fill(ticket, Arc::new(0));
        }
        assert_eq!(cache.len(), 3);

        expect_miss(cache.lookup(Uuid::now_v7(), BuddyView::Buddies));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_listener_invalidates_affected_users() {
        let feed = ChangeFeed::default();
        let cache = Arc::new(ViewCache::<u32>::new(16));
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();
        let carol = Uuid::now_v7();

        let _listener = spawn_invalidation_listener(&feed, Arc::clone(&cache));
        assert_eq!(feed.subscriber_count(Table::Buddies, Filter::All), 1);

        for user in [alice, bob, carol] {
            let ticket = expect_miss(cache.lookup(user, BuddyView::Buddies));
            cache.fill(ticket, Arc::new(1));
        }

        feed.publish(ChangeEvent::new(
            Table::Buddies,
            ChangeKind::Update,
            Uuid::now_v7(),
            &[alice, bob],
        ));

        let mut invalidated = false;
        for _ in 0..100 {
            let alice_missed = matches!(cache.lookup(alice, BuddyView::Buddies), Lookup::Miss(_));
            let bob_missed = matches!(cache.lookup(bob, BuddyView::Buddies), Lookup::Miss(_));

            if alice_missed && bob_missed {
                invalidated = true;
                break;
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(invalidated);
        expect_hit(cache.lookup(carol, BuddyView::Buddies));
    }
}
