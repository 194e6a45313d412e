//! Core systems for Horizon Twemoji.
//!
//! This crate provides the observer plumbing the document engine in
//! `horizon-twemoji` builds on:
//!
//! - **Signals**: type-safe, Qt-inspired change notification with
//!   handle-based connection management ([`Signal`], [`ConnectionId`])
//! - **RAII connections**: scoped observers that disconnect on drop
//!   ([`ConnectionGuard`])
//! - **Logging targets**: `tracing` target constants for filtering
//!   ([`logging::targets`])
//!
//! # Example
//!
//! ```
//! use horizon_twemoji_core::Signal;
//!
//! let changed = Signal::<String>::new();
//!
//! let id = changed.connect(|text| {
//!     println!("document is now: {text}");
//! });
//!
//! changed.emit("hello".to_string());
//!
//! // Stale handles are safe: the second disconnect is a no-op.
//! assert!(changed.disconnect(id));
//! assert!(!changed.disconnect(id));
//! ```

pub mod logging;
pub mod signal;

pub use signal::{ConnectionGuard, ConnectionId, Signal};
