//! Event Emitter
//!
//! Channel-keyed subscriber registry with synchronous fan-out.
//!
//! Delivery contract:
//! - callbacks on a channel run synchronously, in registration order
//! - the first callback returning `Err` stops delivery on that channel and
//!   the error is returned to whoever called [`EventEmitter::emit`]
//! - a `once` callback is removed right before it runs, so it never runs
//!   twice even under concurrent emission
//! - the registry lock is not held while callbacks run; callbacks may
//!   subscribe or unsubscribe freely

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::types::Event;
use crate::{Error, ListenerError, Result};

type Listener = dyn Fn(&Event<'_>) -> std::result::Result<(), ListenerError> + Send + Sync;

/// Handle returned by [`EventEmitter::on`] and [`EventEmitter::once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    once: bool,
    listener: Arc<Listener>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    channels: HashMap<String, Vec<Subscription>>,
}

impl Registry {
    fn insert(&mut self, channel: &str, once: bool, listener: Arc<Listener>) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.channels
            .entry(channel.to_string())
            .or_default()
            .push(Subscription { id, once, listener });
        id
    }

    fn remove(&mut self, channel: &str, id: SubscriptionId) -> bool {
        let Some(subscriptions) = self.channels.get_mut(channel) else {
            return false;
        };

        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        let removed = subscriptions.len() != before;

        if subscriptions.is_empty() {
            self.channels.remove(channel);
        }
        removed
    }
}

/// Multi-channel publish/subscribe registry.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct EventEmitter {
    registry: Arc<RwLock<Registry>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` on `channel`
    pub fn on<F>(&self, channel: &str, listener: F) -> SubscriptionId
    where
        F: Fn(&Event<'_>) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.registry.write().insert(channel, false, Arc::new(listener))
    }

    /// Register `listener` on `channel` for a single delivery
    pub fn once<F>(&self, channel: &str, listener: F) -> SubscriptionId
    where
        F: Fn(&Event<'_>) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.registry.write().insert(channel, true, Arc::new(listener))
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn off(&self, channel: &str, id: SubscriptionId) -> bool {
        self.registry.write().remove(channel, id)
    }

    /// Remove every subscriber on `channel`, or on all channels for `None`
    pub fn remove_all_listeners(&self, channel: Option<&str>) {
        let mut registry = self.registry.write();
        match channel {
            Some(channel) => {
                registry.channels.remove(channel);
            }
            None => registry.channels.clear(),
        }
    }

    pub fn listener_count(&self, channel: &str) -> usize {
        self.registry
            .read()
            .channels
            .get(channel)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Channels with at least one subscriber, sorted by name
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.registry.read().channels.keys().cloned().collect();
        channels.sort();
        channels
    }

    /// Deliver `event` to every subscriber of `channel`.
    ///
    /// Returns `Ok(false)` when the channel has no subscribers.
    pub fn emit(&self, channel: &str, event: &Event<'_>) -> Result<bool> {
        let snapshot = match self.registry.read().channels.get(channel) {
            Some(subscriptions) => subscriptions.clone(),
            None => return Ok(false),
        };

        for subscription in &snapshot {
            if subscription.once && !self.off(channel, subscription.id) {
                continue;
            }

            (subscription.listener)(event).map_err(|source| Error::Listener {
                channel: channel.to_string(),
                source,
            })?;
        }

        Ok(true)
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.read();
        let mut map = f.debug_map();
        for (channel, subscriptions) in &registry.channels {
            map.entry(channel, &subscriptions.len());
        }
        map.finish()
    }
}
