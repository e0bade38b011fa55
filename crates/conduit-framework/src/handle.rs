//! [`ServiceHandle`], the consumer-facing view of a service.

use std::sync::Arc;

use crate::broadcaster::SubscriptionBroadcaster;

/// Handle returned by [`ServiceRegistry::request_handle`].
///
/// A handle only lets a consumer observe a service: it can register
/// availability callbacks and peek at the current client, but it cannot
/// configure, create or stop anything. Subscriptions last for the lifetime
/// of the service instance.
///
/// # Example
///
/// ```rust,ignore
/// if let Some(lights) = registry.request_handle::<LightsClient>("lights") {
///     lights.on_available(|client| client.set_colour("red"));
///     lights.on_unavailable(|| tracing::warn!("lights went away"));
/// }
/// ```
///
/// [`ServiceRegistry::request_handle`]: crate::registry::ServiceRegistry::request_handle
pub struct ServiceHandle<C> {
    broadcaster: Arc<SubscriptionBroadcaster<C>>,
}

impl<C> Clone for ServiceHandle<C> {
    fn clone(&self) -> Self {
        Self {
            broadcaster: Arc::clone(&self.broadcaster),
        }
    }
}

impl<C: Send + Sync + 'static> ServiceHandle<C> {
    pub(crate) fn new(broadcaster: Arc<SubscriptionBroadcaster<C>>) -> Self {
        Self { broadcaster }
    }

    /// Name of the service this handle observes.
    pub fn name(&self) -> &str {
        self.broadcaster.service()
    }

    /// Calls `callback` with the client whenever it becomes available, and
    /// immediately if it already is.
    pub fn on_available<F>(&self, callback: F)
    where
        F: Fn(Arc<C>) + Send + Sync + 'static,
    {
        self.broadcaster.subscribe(Arc::new(callback), Arc::new(|| {}));
    }

    /// Calls `callback` whenever the client stops being available.
    pub fn on_unavailable<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.broadcaster
            .subscribe(Arc::new(|_: Arc<C>| {}), Arc::new(callback));
    }

    /// Registers both callbacks as one subscription.
    pub fn subscribe<A, U>(&self, on_available: A, on_unavailable: U)
    where
        A: Fn(Arc<C>) + Send + Sync + 'static,
        U: Fn() + Send + Sync + 'static,
    {
        self.broadcaster
            .subscribe(Arc::new(on_available), Arc::new(on_unavailable));
    }

    /// The client, if the service is currently available.
    pub fn current_client(&self) -> Option<Arc<C>> {
        self.broadcaster.current()
    }

    /// Returns `true` if the service currently has a live client.
    pub fn is_available(&self) -> bool {
        self.current_client().is_some()
    }
}
