//! BLE Chat Core
//!
//! Transport-agnostic core of the BLE chat client: the transport trait with a
//! simulated implementation, scan deduplication, the session status machine,
//! the per-device conversation log and the observable session snapshot.
//!
//! The btleplug transport lives in `blechat-ble`; file-backed history and the
//! command line live in `blechat-cli`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod conversation;
pub mod discovery;
pub mod errors;
pub mod history;
pub mod permissions;
pub mod session;
pub mod transport;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::SimulatorConfig;
pub use conversation::ConversationLog;
pub use discovery::DiscoveredDevices;
pub use errors::{BlechatError, BlechatResult};
pub use history::{HistoryStore, MemoryHistoryStore};
pub use permissions::{AlwaysGranted, PermissionGate, StaticPermission};
pub use session::{SessionBuilder, SessionManager, SessionSnapshot, SessionStatus};
pub use transport::{
    DeviceSender, InboundEvent, InboundSender, SimulatedTransport, Subscription, Transport,
    TransportKind,
};
pub use types::{Device, Message, Origin, SystemTimeSource, TimeSource, Timestamp};
