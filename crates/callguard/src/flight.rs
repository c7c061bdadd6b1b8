// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Coalescing of concurrent calls that share a key.
//!
//! The first caller for a key becomes the leader: its execution is wrapped in a [`Shared`]
//! future and registered in the group table through a weak handle. Callers arriving while the
//! execution is outstanding become followers and await a clone of the same future, so every
//! waiter observes the same result. The execution runs as long as at least one waiter polls
//! it; once it completes, or every waiter is dropped, the group is removed and the next caller
//! starts a fresh execution.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared, WeakShared};
use parking_lot::Mutex;

use crate::error::CallError;

pub(crate) type Execution<T, E> = Shared<BoxFuture<'static, Result<T, CallError<E>>>>;

type Groups<T, E> = Arc<Mutex<HashMap<String, Group<T, E>>>>;

struct Group<T, E> {
    id: u64,
    execution: WeakShared<BoxFuture<'static, Result<T, CallError<E>>>>,
}

/// Whether a caller started the shared execution or joined an outstanding one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Leader,
    Follower,
}

pub(crate) struct Flights<T, E> {
    groups: Groups<T, E>,
    next_id: AtomicU64,
}

impl<T, E> Flights<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            groups: Arc::default(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Joins the outstanding execution for `key`, or starts one with `start`.
    ///
    /// `start` is only invoked when this caller becomes the leader.
    pub fn join<F>(&self, key: &str, start: F) -> (Execution<T, E>, Role)
    where
        F: FnOnce() -> BoxFuture<'static, Result<T, CallError<E>>>,
    {
        let mut groups = self.groups.lock();

        if let Some(execution) = groups.get(key).and_then(|group| group.execution.upgrade()) {
            return (execution, Role::Follower);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cleanup = GroupCleanup {
            groups: Arc::downgrade(&self.groups),
            key: key.to_owned(),
            id,
        };
        let work = start();
        let execution = async move {
            let _cleanup = cleanup;
            work.await
        }
        .boxed()
        .shared();

        // a fresh `Shared` has not completed yet, so it always downgrades
        if let Some(weak) = execution.downgrade() {
            groups.insert(key.to_owned(), Group { id, execution: weak });
        }

        (execution, Role::Leader)
    }

    #[cfg(test)]
    fn outstanding(&self) -> usize {
        self.groups.lock().len()
    }
}

impl<T, E> fmt::Debug for Flights<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flights").field("outstanding", &self.groups.lock().len()).finish()
    }
}

/// Removes the group entry when its execution completes or is dropped.
///
/// The entry is only removed while it still belongs to this execution; a newer group under the
/// same key is left alone.
struct GroupCleanup<T, E> {
    groups: Weak<Mutex<HashMap<String, Group<T, E>>>>,
    key: String,
    id: u64,
}

impl<T, E> Drop for GroupCleanup<T, E> {
    fn drop(&mut self) {
        let Some(groups) = self.groups.upgrade() else {
            return;
        };

        let mut groups = groups.lock();
        if groups.get(&self.key).is_some_and(|group| group.id == self.id) {
            groups.remove(&self.key);
        }
    }
}
