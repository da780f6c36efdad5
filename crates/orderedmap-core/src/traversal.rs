//! Traversal: lazy, cancellable in-order iteration on a background thread
//!
//! A producer thread walks the map position by position and hands each
//! entry to the consumer through a zero-capacity channel, so at most one
//! entry is ever in flight. The consumer pulls with [`Iterator::next`].
//!
//! The producer blocks in a `select!` on two events:
//!
//! 1. The consumer takes the next entry
//! 2. The cancellation sender is dropped
//!
//! Whichever comes first wins. Every exit path (exhaustion, cancellation,
//! consumer gone) drops the producer's sender, which closes the channel.
//!
//! Positions are materialized with a fresh read lock each, so this is a
//! best-effort view: entries written mid-traversal may or may not show up,
//! and positions that vanished under a concurrent delete are skipped.
//!
//! Callers that stop early must call [`Traversal::cancel`] or drop the
//! handle. Dropping cancels and joins the producer thread.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{select, Receiver, Sender};
use log::{debug, trace, warn};
use parking_lot::RwLock;

use crate::error::{OmResult, OrderedMapError};
use crate::map::Inner;

/// Why a producer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProducerExit {
    /// Every position up to the starting length was visited
    Exhausted,
    /// The cancellation signal arrived
    Cancelled,
    /// The receiving half was dropped
    Disconnected,
}

/// Handle to a running traversal.
pub struct Traversal<K, V> {
    /// Delivery channel. None once the traversal has ended.
    entries: Option<Receiver<(K, V)>>,
    /// Dropping this sender is the cancellation signal.
    cancel: Option<Sender<()>>,
    /// Producer join handle (None once joined)
    producer: Option<thread::JoinHandle<ProducerExit>>,
    /// Entries handed to the consumer so far
    delivered: usize,
}

impl<K, V> Traversal<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn start(shared: Arc<RwLock<Inner<K, V>>>, thread_name: &str) -> OmResult<Self> {
        let (entry_tx, entry_rx) = crossbeam_channel::bounded(0);
        let (cancel_tx, cancel_rx) = crossbeam_channel::bounded::<()>(1);

        let producer = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || produce(&shared, &entry_tx, &cancel_rx))
            .map_err(|e| OrderedMapError::Spawn {
                message: format!("thread {:?}: {}", thread_name, e),
            })?;

        Ok(Self {
            entries: Some(entry_rx),
            cancel: Some(cancel_tx),
            producer: Some(producer),
            delivered: 0,
        })
    }
}

impl<K, V> Traversal<K, V> {
    /// Stop the traversal. Later calls to `next` return None.
    ///
    /// Never blocks, and calling it again is a no-op. Safe whether the
    /// producer is waiting in the hand-off or has already finished.
    pub fn cancel(&mut self) {
        if let Some(signal) = self.cancel.take() {
            trace!("traversal cancelled after {} entries", self.delivered);
            drop(signal);
        }
        self.entries = None;
    }

    /// Cancel and wait for the producer thread to exit.
    pub fn join(mut self) {
        self.cancel();
        self.wait();
    }

    /// Check if the producer thread has exited.
    pub fn is_finished(&self) -> bool {
        self.producer.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Entries handed to the consumer so far.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    fn wait(&mut self) {
        if let Some(handle) = self.producer.take() {
            if handle.join().is_err() {
                warn!("traversal producer panicked");
            }
        }
    }
}

impl<K, V> Iterator for Traversal<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        let entries = self.entries.as_ref()?;
        match entries.recv() {
            Ok(entry) => {
                self.delivered += 1;
                Some(entry)
            }
            Err(_) => {
                // Producer closed the channel; stay terminated
                self.entries = None;
                self.cancel = None;
                None
            }
        }
    }
}

impl<K, V> Drop for Traversal<K, V> {
    fn drop(&mut self) {
        self.cancel();
        self.wait();
    }
}

impl<K, V> fmt::Debug for Traversal<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traversal")
            .field("delivered", &self.delivered)
            .field("open", &self.entries.is_some())
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Producer loop, runs on the background thread.
fn produce<K: Hash + Eq + Clone, V: Clone>(
    shared: &RwLock<Inner<K, V>>,
    entries: &Sender<(K, V)>,
    cancel: &Receiver<()>,
) -> ProducerExit {
    let max = shared.read().len();
    debug!("traversal producer started over {} positions", max);

    let mut sent = 0usize;
    let exit = 'walk: {
        for index in 0..max {
            // Lock is released before the hand-off can block
            let entry = shared.read().get_index(index);
            let Some(entry) = entry else {
                trace!("traversal skipped vanished position {}", index);
                continue;
            };

            let stopped = select! {
                send(entries, entry) -> res => res.err().map(|_| ProducerExit::Disconnected),
                recv(cancel) -> _ => Some(ProducerExit::Cancelled),
            };
            if let Some(exit) = stopped {
                break 'walk exit;
            }
            sent += 1;
        }
        ProducerExit::Exhausted
    };

    debug!("traversal producer stopped after {} entries: {:?}", sent, exit);
    exit
}
