//! Signal/observer system for Horizon Twemoji.
//!
//! This module provides a type-safe, Qt-inspired signal mechanism for change
//! notification. A document emits signals when its contents change, and
//! connected observers (callbacks) are invoked in response.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The main signal type for emitting notifications
//! - [`ConnectionId`] - Unique identifier returned when connecting an observer
//! - [`ConnectionGuard`] - RAII guard that disconnects when dropped
//!
//! # Invocation Model
//!
//! Observers are invoked synchronously on the emitting thread, in connection
//! order. The connection table is snapshotted before invocation, so an
//! observer may connect or disconnect observers (including itself) while the
//! signal is being emitted; such changes take effect from the next emission.
//!
//! # Blocking
//!
//! A signal can be blocked with [`Signal::set_blocked`]; while blocked, calls
//! to `emit()` do nothing. Document engines use this to keep programmatic
//! rewrites invisible to outside observers.
//!
//! # Example
//!
//! ```
//! use horizon_twemoji_core::Signal;
//!
//! // Create a signal that passes a string argument
//! let text_changed = Signal::<String>::new();
//!
//! // Connect an observer (closure)
//! let conn_id = text_changed.connect(|text| {
//!     println!("Text changed to: {}", text);
//! });
//!
//! // Emit the signal
//! text_changed.emit("Hello, World!".to_string());
//!
//! // Disconnect when done
//! text_changed.disconnect(conn_id);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;

new_key_type! {
    /// A unique identifier for a signal-observer connection.
    ///
    /// Use this ID to disconnect a specific connection via
    /// [`Signal::disconnect`]. The ID remains valid until the connection is
    /// explicitly disconnected or the signal is dropped; disconnecting a
    /// stale ID is a safe no-op that returns `false`.
    ///
    /// # Related
    ///
    /// - [`Signal::connect`] - Returns a `ConnectionId`
    /// - [`Signal::disconnect`] - Removes a connection by ID
    /// - [`ConnectionGuard`] - RAII alternative that auto-disconnects
    pub struct ConnectionId;
}

/// Internal storage for a single connection.
struct Connection<Args> {
    /// The observer function to invoke (Arc-wrapped so emission can run
    /// outside the connection table lock).
    observer: Arc<dyn Fn(&Args) + Send + Sync>,
}

impl<Args> Clone for Connection<Args> {
    fn clone(&self) -> Self {
        Self {
            observer: self.observer.clone(),
        }
    }
}

/// A type-safe signal that can have multiple connected observers.
///
/// Signals are the external-observer seam of the engine. When a signal is
/// emitted, all connected observers are invoked with a reference to the
/// provided arguments, in connection order.
///
/// # Type Parameter
///
/// - `Args`: The argument type passed to observers. Use `()` for signals
///   with no arguments, or a struct/tuple for richer payloads.
///
/// # Thread Safety
///
/// `Signal<Args>` is `Send + Sync`; the connection table lives behind a
/// mutex and the blocked flag is atomic. Emission itself happens on the
/// calling thread.
///
/// # Related Types
///
/// - [`ConnectionId`] - Returned by [`connect`](Self::connect), used to disconnect
/// - [`ConnectionGuard`] - RAII-style connection that auto-disconnects on drop
pub struct Signal<Args> {
    /// All active connections.
    connections: Mutex<SlotMap<ConnectionId, Connection<Args>>>,
    /// Insertion order of connections (slotmap iteration order is
    /// unspecified; observers must fire in connection order).
    order: Mutex<Vec<ConnectionId>>,
    /// Whether signal emission is temporarily blocked.
    blocked: AtomicBool,
}

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            order: Mutex::new(Vec::new()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connect an observer (closure) to this signal.
    ///
    /// Returns a `ConnectionId` that can be used to disconnect the observer
    /// later.
    ///
    /// # Example
    ///
    /// ```
    /// use horizon_twemoji_core::Signal;
    ///
    /// let signal = Signal::<String>::new();
    /// let id = signal.connect(|s| println!("Got: {}", s));
    /// signal.emit("Hello".to_string());
    /// ```
    pub fn connect<F>(&self, observer: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let connection = Connection {
            observer: Arc::new(observer),
        };
        let id = self.connections.lock().insert(connection);
        self.order.lock().push(id);
        tracing::trace!(target: targets::SIGNAL, ?id, "observer connected");
        id
    }

    /// Disconnect a specific observer by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed, `false` if
    /// the ID was stale.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let removed = self.connections.lock().remove(id).is_some();
        if removed {
            self.order.lock().retain(|entry| *entry != id);
            tracing::trace!(target: targets::SIGNAL, ?id, "observer disconnected");
        }
        removed
    }

    /// Disconnect all observers from this signal.
    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
        self.order.lock().clear();
    }

    /// Get the number of connected observers.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Block signal emission temporarily.
    ///
    /// While blocked, calls to `emit()` do nothing. This is useful during
    /// initialization or batch updates to prevent cascading notifications.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Check if signal emission is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Emit the signal, invoking all connected observers in connection order.
    ///
    /// If the signal is blocked, this does nothing. Observers receive the
    /// arguments by reference. The connection table is snapshotted before
    /// any observer runs, so observers may connect or disconnect during
    /// emission; such changes apply from the next emission.
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping emit");
            return;
        }

        // Snapshot under the lock, invoke outside it. Holding the lock
        // across observer calls would deadlock on re-entrant connect.
        let observers: Vec<Arc<dyn Fn(&Args) + Send + Sync>> = {
            let connections = self.connections.lock();
            let order = self.order.lock();
            order
                .iter()
                .filter_map(|id| connections.get(*id))
                .map(|conn| conn.observer.clone())
                .collect()
        };

        tracing::trace!(
            target: targets::SIGNAL,
            connection_count = observers.len(),
            "emitting signal"
        );

        for observer in observers {
            observer(&args);
        }
    }

    /// Connect an observer with automatic disconnection when the guard is
    /// dropped.
    ///
    /// The guard borrows the signal, so it cannot outlive it; this is the
    /// safe alternative to manual [`disconnect`](Self::disconnect) calls in
    /// scoped code.
    pub fn connect_scoped<F>(&self, observer: F) -> ConnectionGuard<'_, Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let id = self.connect(observer);
        ConnectionGuard { signal: self, id }
    }
}

impl<Args: 'static> std::fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.connections.lock().len())
            .field("blocked", &self.is_blocked())
            .finish()
    }
}

/// A connection guard that automatically disconnects when dropped.
///
/// Created via [`Signal::connect_scoped`]. Useful for RAII-style connection
/// management, ensuring observers are cleaned up when the receiver goes out
/// of scope.
///
/// # Example
///
/// ```
/// use horizon_twemoji_core::Signal;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicI32, Ordering};
///
/// let signal = Signal::<i32>::new();
/// let counter = Arc::new(AtomicI32::new(0));
/// {
///     let counter_clone = counter.clone();
///     let _guard = signal.connect_scoped(move |&n| {
///         counter_clone.fetch_add(n, Ordering::SeqCst);
///     });
///     signal.emit(42); // counter = 42
/// }
/// signal.emit(43); // Nothing happens - connection was dropped
/// assert_eq!(counter.load(Ordering::SeqCst), 42);
/// ```
pub struct ConnectionGuard<'a, Args: 'static> {
    signal: &'a Signal<Args>,
    id: ConnectionId,
}

impl<Args: 'static> ConnectionGuard<'_, Args> {
    /// The ID of the guarded connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl<Args: 'static> Drop for ConnectionGuard<'_, Args> {
    fn drop(&mut self) {
        let _ = self.signal.disconnect(self.id);
    }
}

static_assertions::assert_impl_all!(Signal<String>: Send, Sync);
static_assertions::assert_impl_all!(Signal<()>: Send, Sync, Default);
