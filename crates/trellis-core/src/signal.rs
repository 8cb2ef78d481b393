//! Synchronous signal/slot dispatch.
//!
//! A [`Signal`] owns an explicit subscriber table. [`Signal::emit`] invokes
//! every connected slot in connection order, on the calling thread, before
//! returning.
//!
//! Dispatch works on a snapshot of the subscriber table taken when emission
//! starts, so a slot may connect, disconnect or emit again without
//! deadlocking. Slots connected during an emission are first called on the
//! next one.
//!
//! Re-entrant emission of the same signal is allowed up to
//! [`max_reentrant_depth`] levels. Deeper emissions are dropped with a
//! warning, which turns a notification loop between two handlers into a
//! bounded cascade.
//!
//! # Example
//!
//! ```
//! use trellis_core::Signal;
//!
//! let changed = Signal::<String>::new();
//! let id = changed.connect(|name| println!("{name} changed"));
//! changed.emit("Selected".to_string());
//! changed.disconnect(id);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;

new_key_type! {
    /// Identifies one slot connected to a [`Signal`].
    ///
    /// Pass it to [`Signal::disconnect`] to remove the slot.
    pub struct ConnectionId;
}

/// Default nesting limit for re-entrant emission of one signal.
pub const DEFAULT_MAX_REENTRANT_DEPTH: usize = 8;

static MAX_REENTRANT_DEPTH: AtomicUsize = AtomicUsize::new(DEFAULT_MAX_REENTRANT_DEPTH);

/// Set the process-wide nesting limit for re-entrant emission.
///
/// A limit of zero is raised to one so top-level emission always runs.
pub fn set_max_reentrant_depth(depth: usize) {
    MAX_REENTRANT_DEPTH.store(depth.max(1), Ordering::SeqCst);
}

/// Current process-wide nesting limit for re-entrant emission.
pub fn max_reentrant_depth() -> usize {
    MAX_REENTRANT_DEPTH.load(Ordering::SeqCst)
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A typed notification source with an explicit subscriber list.
pub struct Signal<Args> {
    connections: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
    blocked: AtomicBool,
    depth: AtomicUsize,
}

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> Signal<Args> {
    /// Create a signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            blocked: AtomicBool::new(false),
            depth: AtomicUsize::new(0),
        }
    }

    /// Connect a slot, returning its connection id.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connections.lock().insert(Arc::new(slot))
    }

    /// Disconnect a slot. Returns `true` if it was connected.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Disconnect every slot.
    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
    }

    /// Number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Block or unblock emission. While blocked, `emit` does nothing.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Whether emission is blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Invoke every connected slot with `args`.
    #[tracing::instrument(skip_all, target = "trellis_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping emit");
            return;
        }

        let depth = self.depth.fetch_add(1, Ordering::SeqCst);
        let _depth = DepthGuard(&self.depth);
        if depth >= max_reentrant_depth() {
            tracing::warn!(
                target: targets::SIGNAL,
                depth,
                "re-entrant emission exceeds nesting limit, dropping"
            );
            return;
        }

        let slots: Vec<Slot<Args>> = self.connections.lock().values().cloned().collect();
        tracing::trace!(target: targets::SIGNAL, connection_count = slots.len(), depth, "emitting signal");
        for slot in slots {
            slot(&args);
        }
    }
}

struct DepthGuard<'a>(&'a AtomicUsize);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

static_assertions::assert_impl_all!(Signal<()>: Send, Sync);
