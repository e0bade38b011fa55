//! Fault-isolated fan-out of availability changes.
//!
//! Each registered service owns one [`SubscriptionBroadcaster`]. Consumers
//! append `(on_available, on_unavailable)` pairs through a
//! [`ServiceHandle`](crate::handle::ServiceHandle); the registry announces
//! lifecycle transitions through [`broadcast_available`] and
//! [`broadcast_unavailable`].
//!
//! # Delivery guarantees
//!
//! - Subscribers are called synchronously, in subscription order.
//! - A subscriber that panics is logged and skipped; the remaining subscribers
//!   still receive the event and the registry's transition is unaffected.
//! - A subscriber that arrives while a client is available receives it
//!   immediately, before [`subscribe`] returns, and is never delivered the same
//!   client a second time by a concurrent broadcast.
//! - `on_unavailable` for a client always precedes `on_available` for its
//!   successor.
//!
//! All deliveries for one service are serialized by a re-entrant guard, so a
//! callback may itself subscribe without deadlocking.
//!
//! [`broadcast_available`]: SubscriptionBroadcaster::broadcast_available
//! [`broadcast_unavailable`]: SubscriptionBroadcaster::broadcast_unavailable
//! [`subscribe`]: SubscriptionBroadcaster::subscribe

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use conduit_core::{Failure, ServiceError};
use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, error};

/// Callback invoked with the client when it becomes available.
pub type AvailableFn<C> = Arc<dyn Fn(Arc<C>) + Send + Sync>;

/// Callback invoked when the client stops being available.
pub type UnavailableFn = Arc<dyn Fn() + Send + Sync>;

struct Subscription<C> {
    on_available: AvailableFn<C>,
    on_unavailable: UnavailableFn,
}

impl<C> Clone for Subscription<C> {
    fn clone(&self) -> Self {
        Self {
            on_available: Arc::clone(&self.on_available),
            on_unavailable: Arc::clone(&self.on_unavailable),
        }
    }
}

struct Inner<C> {
    subscribers: Vec<Subscription<C>>,
    /// The client most recently announced as available.
    current: Option<Arc<C>>,
}

/// Ordered set of availability subscribers for one service.
pub struct SubscriptionBroadcaster<C> {
    service: Arc<str>,
    inner: Mutex<Inner<C>>,
    delivery: ReentrantMutex<()>,
}

impl<C: Send + Sync + 'static> SubscriptionBroadcaster<C> {
    /// Creates an empty broadcaster for `service`.
    pub fn new(service: impl Into<Arc<str>>) -> Self {
        Self {
            service: service.into(),
            inner: Mutex::new(Inner {
                subscribers: Vec::new(),
                current: None,
            }),
            delivery: ReentrantMutex::new(()),
        }
    }

    /// The service this broadcaster belongs to.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Number of subscription pairs, duplicates included.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// The currently available client, if any.
    pub fn current(&self) -> Option<Arc<C>> {
        self.inner.lock().current.clone()
    }

    /// Appends a subscription pair.
    ///
    /// If a client is currently available, `on_available` is called with it
    /// before this method returns.
    pub fn subscribe(&self, on_available: AvailableFn<C>, on_unavailable: UnavailableFn) {
        let _delivery = self.delivery.lock();

        let subscription = Subscription {
            on_available,
            on_unavailable,
        };
        let (index, current) = {
            let mut inner = self.inner.lock();
            inner.subscribers.push(subscription.clone());
            (inner.subscribers.len() - 1, inner.current.clone())
        };

        debug!(service = %self.service, subscriber = index, "Subscriber added");

        if let Some(client) = current {
            self.deliver(index, "on_available", || {
                (subscription.on_available)(client)
            });
        }
    }

    /// Announces `client` to every subscriber.
    ///
    /// Only the registry calls this, after the service has reached `Ready`.
    pub(crate) fn broadcast_available(&self, client: Arc<C>) {
        let _delivery = self.delivery.lock();

        let subscribers = {
            let mut inner = self.inner.lock();
            debug_assert!(
                inner.current.is_none(),
                "available broadcast without an intervening unavailable"
            );
            inner.current = Some(Arc::clone(&client));
            inner.subscribers.clone()
        };

        debug!(
            service = %self.service,
            subscribers = subscribers.len(),
            "Broadcasting client available"
        );

        for (index, subscription) in subscribers.iter().enumerate() {
            let client = Arc::clone(&client);
            self.deliver(index, "on_available", || {
                (subscription.on_available)(client)
            });
        }
    }

    /// Announces that the current client is gone.
    ///
    /// Returns the client that was current, or `None` (and notifies nobody)
    /// if no client had been announced.
    pub(crate) fn broadcast_unavailable(&self) -> Option<Arc<C>> {
        let _delivery = self.delivery.lock();

        let (previous, subscribers) = {
            let mut inner = self.inner.lock();
            let previous = inner.current.take();
            if previous.is_none() {
                return None;
            }
            (previous, inner.subscribers.clone())
        };

        debug!(
            service = %self.service,
            subscribers = subscribers.len(),
            "Broadcasting client unavailable"
        );

        for (index, subscription) in subscribers.iter().enumerate() {
            self.deliver(index, "on_unavailable", || (subscription.on_unavailable)());
        }

        previous
    }

    /// Runs one subscriber callback, containing any panic it raises.
    fn deliver(&self, index: usize, callback: &'static str, f: impl FnOnce()) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
            let err = ServiceError::SubscriberCallback {
                service: self.service.to_string(),
                subscriber: index,
                message: Failure::from_panic(payload.as_ref()).into_message(),
            };
            error!(
                service    = %self.service,
                subscriber = index,
                callback,
                error      = %err,
                "Subscriber callback panicked, continuing with remaining subscribers"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, tag: &'static str) -> (AvailableFn<u32>, UnavailableFn) {
        let on_available: AvailableFn<u32> = {
            let log = Arc::clone(log);
            Arc::new(move |client: Arc<u32>| log.lock().push(format!("{tag}:available:{client}")))
        };
        let on_unavailable: UnavailableFn = {
            let log = Arc::clone(log);
            Arc::new(move || log.lock().push(format!("{tag}:unavailable")))
        };
        (on_available, on_unavailable)
    }

    #[test]
    fn test_broadcast_in_subscription_order() {
        let log = Log::default();
        let broadcaster = SubscriptionBroadcaster::<u32>::new("lights");
        let (a1, u1) = recorder(&log, "first");
        let (a2, u2) = recorder(&log, "second");
        broadcaster.subscribe(a1, u1);
        broadcaster.subscribe(a2, u2);

        broadcaster.broadcast_available(Arc::new(7));
        assert_eq!(broadcaster.broadcast_unavailable().as_deref(), Some(&7));

        assert_eq!(
            *log.lock(),
            [
                "first:available:7",
                "second:available:7",
                "first:unavailable",
                "second:unavailable",
            ]
        );
    }

    #[test]
    fn test_late_subscriber_gets_current_client_immediately() {
        let log = Log::default();
        let broadcaster = SubscriptionBroadcaster::<u32>::new("lights");
        broadcaster.broadcast_available(Arc::new(1));

        let (a, u) = recorder(&log, "late");
        broadcaster.subscribe(a, u);

        assert_eq!(*log.lock(), ["late:available:1"]);
    }

    #[test]
    fn test_unavailable_without_client_is_silent() {
        let log = Log::default();
        let broadcaster = SubscriptionBroadcaster::<u32>::new("lights");
        let (a, u) = recorder(&log, "s");
        broadcaster.subscribe(a, u);

        assert!(broadcaster.broadcast_unavailable().is_none());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let log = Log::default();
        let broadcaster = SubscriptionBroadcaster::<u32>::new("lights");
        let boom: AvailableFn<u32> = Arc::new(|_| panic!("consumer bug"));
        let boom_again: UnavailableFn = Arc::new(|| panic!("consumer bug on teardown"));
        broadcaster.subscribe(boom, boom_again);
        let (a, u) = recorder(&log, "healthy");
        broadcaster.subscribe(a, u);

        broadcaster.broadcast_available(Arc::new(3));
        broadcaster.broadcast_unavailable();

        assert_eq!(*log.lock(), ["healthy:available:3", "healthy:unavailable"]);
    }

    #[test]
    fn test_subscribe_from_inside_callback() {
        let log = Log::default();
        let broadcaster = Arc::new(SubscriptionBroadcaster::<u32>::new("lights"));

        let nested = {
            let broadcaster = Arc::clone(&broadcaster);
            let log = Arc::clone(&log);
            Arc::new(move |_: Arc<u32>| {
                let (a, u) = recorder(&log, "nested");
                broadcaster.subscribe(a, u);
            })
        };
        broadcaster.subscribe(nested, Arc::new(|| {}));
        broadcaster.broadcast_available(Arc::new(5));

        // The nested subscriber sees the client exactly once.
        assert_eq!(*log.lock(), ["nested:available:5"]);
        assert_eq!(broadcaster.subscriber_count(), 2);
    }

    #[test]
    fn test_duplicates_are_delivered_twice() {
        let log = Log::default();
        let broadcaster = SubscriptionBroadcaster::<u32>::new("lights");
        let (a, u) = recorder(&log, "dup");
        broadcaster.subscribe(Arc::clone(&a), Arc::clone(&u));
        broadcaster.subscribe(a, u);

        broadcaster.broadcast_available(Arc::new(9));
        assert_eq!(log.lock().len(), 2);
    }
}
