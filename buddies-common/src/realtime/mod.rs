//! In-process publish/subscribe for row changes.
//!
//! Events are only invalidation signals. A receiver never applies an event to state it
//! holds; it re-reads whatever the event touched. Subscribers are grouped by table and by
//! an optional user filter, and each group shares a broadcast channel that lives exactly as
//! long as it has subscribers.

use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Profiles,
    Buddies,
    Posts,
    BuddyRequestPickups,
    Notifications,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Filter {
    All,
    User(Uuid),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub row_id: Uuid,
    pub affected_users: Vec<Uuid>,
}

impl ChangeEvent {
    pub fn new(table: Table, kind: ChangeKind, row_id: Uuid, affected_users: &[Uuid]) -> Self {
        let mut affected_users = affected_users.to_vec();
        affected_users.sort_unstable();
        affected_users.dedup();

        Self {
            table,
            kind,
            row_id,
            affected_users,
        }
    }
}

#[derive(Debug, Eq, PartialEq)]
pub enum FeedError {
    /// The receiver fell behind and missed this many events. Anything derived from the
    /// subscribed table must be treated as stale.
    Lagged(u64),
    Closed,
}

impl std::error::Error for FeedError {}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::Lagged(count) => write!(f, "FeedError: Subscriber missed {count} events"),
            FeedError::Closed => write!(f, "FeedError: Change feed closed"),
        }
    }
}

type ChannelKey = (Table, Filter);

struct Channel {
    sender: broadcast::Sender<ChangeEvent>,
    subscribers: usize,
}

#[derive(Clone)]
pub struct ChangeFeed {
    channels: Arc<Mutex<HashMap<ChannelKey, Channel>>>,
    capacity: usize,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<ChannelKey, Channel>> {
        // The map is always left consistent, so a panic elsewhere doesn't invalidate it
        self.channels.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self, table: Table, filter: Filter) -> Subscription {
        let key = (table, filter);
        let mut channels = self.channels();

        let receiver = match channels.entry(key) {
            Entry::Occupied(mut entry) => {
                let channel = entry.get_mut();
                channel.subscribers += 1;
                channel.sender.subscribe()
            }
            Entry::Vacant(entry) => {
                let (sender, receiver) = broadcast::channel(self.capacity);
                entry.insert(Channel {
                    sender,
                    subscribers: 1,
                });
                receiver
            }
        };

        Subscription {
            key,
            receiver,
            feed: self.clone(),
        }
    }

    /// Delivers the event to the table-wide channel and to the channel of every affected
    /// user. Returns the number of receivers reached.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let channels = self.channels();

        let keys = std::iter::once((event.table, Filter::All)).chain(
            event
                .affected_users
                .iter()
                .map(|user_id| (event.table, Filter::User(*user_id))),
        );

        let mut delivered = 0;
        for key in keys {
            if let Some(channel) = channels.get(&key) {
                // Only fails when every receiver is gone, which is fine for an invalidation
                delivered += channel.sender.send(event.clone()).unwrap_or(0);
            }
        }

        log::trace!(
            "Published {:?} {:?} for row {} to {} receivers",
            event.kind,
            event.table,
            event.row_id,
            delivered,
        );

        delivered
    }

    pub fn subscriber_count(&self, table: Table, filter: Filter) -> usize {
        self.channels()
            .get(&(table, filter))
            .map(|channel| channel.subscribers)
            .unwrap_or(0)
    }

    pub fn channel_count(&self) -> usize {
        self.channels().len()
    }

    fn release(&self, key: ChannelKey) {
        let mut channels = self.channels();

        if let Entry::Occupied(mut entry) = channels.entry(key) {
            let channel = entry.get_mut();
            channel.subscribers = channel.subscribers.saturating_sub(1);

            if channel.subscribers == 0 {
                entry.remove();
            }
        }
    }
}

/// A live subscription. Dropping it unsubscribes.
pub struct Subscription {
    key: ChannelKey,
    receiver: broadcast::Receiver<ChangeEvent>,
    feed: ChangeFeed,
}

impl Subscription {
    pub fn table(&self) -> Table {
        self.key.0
    }

    pub async fn recv(&mut self) -> Result<ChangeEvent, FeedError> {
        match self.receiver.recv().await {
            Ok(event) => Ok(event),
            Err(RecvError::Lagged(count)) => Err(FeedError::Lagged(count)),
            Err(RecvError::Closed) => Err(FeedError::Closed),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.feed.release(self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;
    use tokio::time::timeout;

    async fn recv_now(subscription: &mut Subscription) -> Result<ChangeEvent, FeedError> {
        timeout(Duration::from_secs(1), subscription.recv())
            .await
            .expect("Timed out waiting for change event")
    }

    async fn assert_nothing_pending(subscription: &mut Subscription) {
        assert!(timeout(Duration::from_millis(50), subscription.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_publish_reaches_table_and_affected_users() {
        let feed = ChangeFeed::default();
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();
        let carol = Uuid::now_v7();

        let mut all = feed.subscribe(Table::Buddies, Filter::All);
        let mut alice_sub = feed.subscribe(Table::Buddies, Filter::User(alice));
        let mut bob_sub = feed.subscribe(Table::Buddies, Filter::User(bob));
        let mut carol_sub = feed.subscribe(Table::Buddies, Filter::User(carol));
        let mut alice_notifications = feed.subscribe(Table::Notifications, Filter::User(alice));

        let event = ChangeEvent::new(
            Table::Buddies,
            ChangeKind::Insert,
            Uuid::now_v7(),
            &[alice, bob, alice],
        );
        assert_eq!(event.affected_users.len(), 2);

        assert_eq!(feed.publish(event.clone()), 3);

        assert_eq!(recv_now(&mut all).await.unwrap(), event);
        assert_eq!(recv_now(&mut alice_sub).await.unwrap(), event);
        assert_eq!(recv_now(&mut bob_sub).await.unwrap(), event);

        assert_nothing_pending(&mut alice_sub).await;
        assert_nothing_pending(&mut carol_sub).await;
        assert_nothing_pending(&mut alice_notifications).await;
    }

    #[tokio::test]
    async fn test_channels_are_reference_counted() {
        let feed = ChangeFeed::default();
        let user = Uuid::now_v7();

        let first = feed.subscribe(Table::Posts, Filter::User(user));
        let second = feed.subscribe(Table::Posts, Filter::User(user));
        let _other = feed.subscribe(Table::Posts, Filter::All);

        assert_eq!(feed.subscriber_count(Table::Posts, Filter::User(user)), 2);
        assert_eq!(feed.channel_count(), 2);

        drop(first);
        assert_eq!(feed.subscriber_count(Table::Posts, Filter::User(user)), 1);
        assert_eq!(feed.channel_count(), 2);

        drop(second);
        assert_eq!(feed.subscriber_count(Table::Posts, Filter::User(user)), 0);
        assert_eq!(feed.channel_count(), 1);

        // Publishing to a removed channel is a no-op
        let event = ChangeEvent::new(Table::Posts, ChangeKind::Update, Uuid::now_v7(), &[user]);
        assert_eq!(feed.publish(event), 1);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_is_told() {
        let feed = ChangeFeed::new(2);
        let mut sub = feed.subscribe(Table::Buddies, Filter::All);

        for _ in 0..5 {
            feed.publish(ChangeEvent::new(
                Table::Buddies,
                ChangeKind::Update,
                Uuid::now_v7(),
                &[],
            ));
        }

        assert_eq!(recv_now(&mut sub).await.unwrap_err(), FeedError::Lagged(3));

        // The receiver picks up again at the oldest retained event
        assert!(recv_now(&mut sub).await.is_ok());
        assert!(recv_now(&mut sub).await.is_ok());
        assert_nothing_pending(&mut sub).await;
    }

    #[tokio::test]
    async fn test_subscription_moves_across_tasks() {
        let feed = ChangeFeed::default();
        let user = Uuid::now_v7();
        let mut sub = feed.subscribe(Table::Notifications, Filter::User(user));

        let handle = tokio::spawn(async move { sub.recv().await });

        // Give the task a moment to start waiting
        tokio::time::sleep(Duration::from_millis(20)).await;
        let event = ChangeEvent::new(
            Table::Notifications,
            ChangeKind::Insert,
            Uuid::now_v7(),
            &[user],
        );
        feed.publish(event.clone());

        let received = timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(received, event);
        assert_eq!(feed.channel_count(), 0);
    }
}
