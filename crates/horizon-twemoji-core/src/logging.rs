//! Logging facilities for Horizon Twemoji.
//!
//! The engine is instrumented with the `tracing` crate. To see logs, install
//! a tracing subscriber in your application:
//!
//! ```ignore
//! use tracing_subscriber;
//!
//! fn main() {
//!     // Initialize tracing (you can customize this)
//!     tracing_subscriber::fmt::init();
//!
//!     // Your application code...
//! }
//! ```

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "horizon_twemoji_core";
    /// Signal/observer system target.
    pub const SIGNAL: &str = "horizon_twemoji_core::signal";
}
