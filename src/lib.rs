//! Sandboxed widget bridge: the guest-side protocol that lets a host embed an
//! untrusted widget module and exchange ordered events with it.

pub mod bridge;
pub mod config;
pub mod protocol;
pub mod transport;

pub use bridge::context::{MountRoot, WidgetContext};
pub use bridge::error::BridgeError;
pub use bridge::forwarder::{DomObservation, KeyTarget};
pub use bridge::loader::{GuestModule, LoadError, ModuleLoader, ModuleRegistry};
pub use bridge::session::BridgeState;
pub use bridge::stylesheet::{HttpStylesheetLoader, StylesheetError, StylesheetLoader};
pub use bridge::{Bridge, BridgeInput, FrameOutcome};
pub use config::BridgeConfig;
pub use protocol::{Envelope, InboundFrame, InboundMessage, OutboundMessage, SessionToken};
pub use transport::{ChannelPort, HostPort};
