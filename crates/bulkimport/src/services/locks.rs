//! Keyed write ordering
//!
//! Every dispatched write takes a ticket for its identity. A ticket's turn
//! comes once the previous ticket of the same identity and the latest ticket
//! of its parent identity have been released. Entries live only while their
//! identity has a write in flight.

use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

type Released = Shared<oneshot::Receiver<()>>;

struct Tail {
    ticket: u64,
    released: Released,
}

/// Map of identity to the last ticket issued for it
#[derive(Default)]
pub struct IdentityLocks {
    tails: Mutex<HashMap<String, Tail>>,
    next_ticket: AtomicU64,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next ticket for `identity`, ordered after its predecessor and
    /// after the current ticket of `parent`
    ///
    /// Tickets must be issued in dispatch order.
    pub fn enqueue(self: &Arc<Self>, identity: &str, parent: Option<&str>) -> IdentityTicket {
        let (release, released) = oneshot::channel();
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);

        let mut tails = self.tails.lock();
        let mut waits = Vec::with_capacity(2);
        if let Some(parent) = parent {
            if let Some(tail) = tails.get(parent) {
                waits.push(tail.released.clone());
            }
        }
        let previous = tails.insert(
            identity.to_string(),
            Tail {
                ticket,
                released: released.shared(),
            },
        );
        if let Some(previous) = previous {
            waits.push(previous.released);
        }

        IdentityTicket {
            locks: Arc::clone(self),
            identity: identity.to_string(),
            ticket,
            waits,
            release: Some(release),
        }
    }

    /// Identities with a write in flight
    pub fn len(&self) -> usize {
        self.tails.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, identity: &str, ticket: u64) {
        let mut tails = self.tails.lock();
        if tails.get(identity).map(|tail| tail.ticket) == Some(ticket) {
            tails.remove(identity);
        }
    }
}

/// Place of one write in its identity's queue, released on drop
pub struct IdentityTicket {
    locks: Arc<IdentityLocks>,
    identity: String,
    ticket: u64,
    waits: Vec<Released>,
    release: Option<oneshot::Sender<()>>,
}

impl IdentityTicket {
    /// Wait until every write this ticket is ordered after has been released
    ///
    /// Cancel-safe: an abandoned wait can be resumed by calling `turn` again.
    pub async fn turn(&mut self) {
        while let Some(released) = self.waits.last() {
            // A dropped sender is a release too
            let _ = released.clone().await;
            self.waits.pop();
        }
    }
}

impl Drop for IdentityTicket {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            let _ = release.send(());
        }
        self.locks.release(&self.identity, self.ticket);
    }
}
