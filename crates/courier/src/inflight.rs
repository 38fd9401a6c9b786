//! # In-Flight Registry
//!
//! Collapses concurrent identical requests into one transport call:
//! - The first caller for a key becomes the leader and performs the call.
//! - Later callers become followers and await the leader's outcome.
//!
//! Each bucket publishes through a `watch` channel. `watch` is level-triggered,
//! so a follower that subscribes right before completion still sees the value.
//! Registration and removal each happen in one step under the registry mutex;
//! the transport call itself never runs while the mutex is held.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::cache::ResourceKey;
use crate::error::TransportError;
use crate::outcome::RawOutcome;

type Slot = watch::Sender<Option<RawOutcome>>;

/// Requests currently executing, keyed by `ResourceKey`
#[derive(Default)]
pub struct InFlightRegistry {
    buckets: Mutex<HashMap<ResourceKey, Slot>>,
}

/// What a caller must do for its request
pub enum Role {
    /// Perform the transport call and complete the bucket
    Leader(LeaderGuard),
    /// Only await the leader's outcome
    Follower(Follower),
}

impl InFlightRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register interest in `key`, deciding leader or follower atomically
    pub fn join_or_begin(self: &Arc<Self>, key: ResourceKey) -> Role {
        let mut buckets = self.buckets.lock();

        if let Some(slot) = buckets.get(&key) {
            debug!(key = %key, waiters = slot.receiver_count() + 1, "Joining in-flight request");
            return Role::Follower(Follower {
                rx: slot.subscribe(),
                key,
            });
        }

        let (tx, _) = watch::channel(None);
        buckets.insert(key.clone(), tx);
        drop(buckets);

        debug!(key = %key, "Starting new request");
        Role::Leader(LeaderGuard {
            registry: Arc::clone(self),
            key,
            completed: false,
        })
    }

    /// Remove the bucket for `key` and publish `outcome` to everyone waiting on it.
    ///
    /// Returns the number of followers that were waiting.
    fn complete(&self, key: &ResourceKey, outcome: RawOutcome) -> usize {
        let Some(slot) = self.buckets.lock().remove(key) else {
            warn!(key = %key, "Completing a request that is not in flight");
            return 0;
        };

        let followers = slot.receiver_count();
        debug!(key = %key, followers, outcome = outcome.kind(), "Fanning out outcome");
        slot.send_replace(Some(outcome));
        followers
    }

    /// Number of keys with a request currently in flight
    pub fn in_flight(&self) -> usize {
        self.buckets.lock().len()
    }

    pub fn is_in_flight(&self, key: &ResourceKey) -> bool {
        self.buckets.lock().contains_key(key)
    }
}

impl std::fmt::Debug for InFlightRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightRegistry")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Obligation to complete a bucket.
///
/// Dropping the guard without calling [`LeaderGuard::complete`] (cancellation,
/// panic) completes the bucket with an aborted transport failure, so followers
/// are never left waiting.
pub struct LeaderGuard {
    registry: Arc<InFlightRegistry>,
    key: ResourceKey,
    completed: bool,
}

impl LeaderGuard {
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Publish the outcome to all followers and remove the bucket
    pub fn complete(mut self, outcome: RawOutcome) -> usize {
        self.completed = true;
        self.registry.complete(&self.key, outcome)
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        if !self.completed {
            warn!(key = %self.key, "Leader dropped before completing, notifying followers");
            self.registry
                .complete(&self.key, RawOutcome::TransportFailure(TransportError::Aborted));
        }
    }
}

/// Handle for awaiting another caller's request
pub struct Follower {
    rx: watch::Receiver<Option<RawOutcome>>,
    key: ResourceKey,
}

impl Follower {
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Wait for the leader's outcome.
    ///
    /// Dropping this future only stops waiting; the leader's call continues.
    pub async fn wait(mut self) -> RawOutcome {
        match self.rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome
                .clone()
                .unwrap_or(RawOutcome::TransportFailure(TransportError::Aborted)),
            // The leader always publishes before its sender goes away
            Err(_) => RawOutcome::TransportFailure(TransportError::Aborted),
        }
    }
}
