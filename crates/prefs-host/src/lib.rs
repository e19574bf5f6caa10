//! prefs-host: tokio host layer for the preference engine.
//!
//! Owns what the runtime-agnostic core deliberately leaves out: session
//! lifecycle (sign-in/sign-out), the background refresh agent (interval
//! timer + visibility signal), the UI-facing handles, and tracing setup.

pub mod handles;
pub mod refresh;
pub mod session;
pub mod telemetry;

pub use handles::{ChannelReadStateHandle, SavedFeedsHandle};
pub use refresh::{RefreshAgent, RefreshConfig};
pub use session::{PrefsService, PrefsSession};
pub use telemetry::init_tracing;
