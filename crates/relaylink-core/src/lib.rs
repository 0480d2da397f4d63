//! Stateful engine between `relaylink-api` and a presentation layer.
//!
//! This crate owns the session logic, domain model, and reactive
//! snapshots for every radio channel of a device:
//!
//! - **[`ChannelRegistry`]**: Knows the configured channels, creates one
//!   [`Session`] per channel on first use, and tracks which channel the UI
//!   is currently showing. Switching channels never disturbs a running
//!   session.
//!
//! - **[`Session`]**: Cloneable handle to one channel's worker task. The
//!   worker owns the transport and runs the observe cycle
//!   (`Idle → Scanning → SnifferActive ⇄ Focused`), including the
//!   background sniffer poll. Operations queue on an `mpsc` channel and
//!   resolve in order, so exchanges on a channel never overlap.
//!
//! - **[`EntityStream`]**: Subscription to a session's network table.
//!   Readers see immutable snapshots, never the table itself.
//!
//! - **[`PortalControl`]**: Idempotent start/stop wrapper around an
//!   externally implemented captive [`Portal`].

pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod portal;
pub mod registry;
pub mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ChannelConfig, ChannelId, ChannelKind, PinMap, SessionTiming};
pub use error::CoreError;
pub use portal::{Portal, PortalControl, PortalCounts};
pub use registry::{ChannelEntry, ChannelRegistry, ChannelRegistryBuilder};
pub use session::{ChannelHealth, PollOutcome, Session, SessionState, SessionStatus};
pub use store::EntitySnapshot;
pub use stream::{EntityStream, EntityWatchStream};

// Re-export model types at the crate root for ergonomics.
pub use model::{Band, EntityKey, HostEntry, MacAddress, NetworkEntity, ProbeEntry};
