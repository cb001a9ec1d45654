//! Messaging gateway abstractions (QQ today, behind a port).

pub mod observers;
pub mod port;
pub mod types;

pub use port::{EventObserver, Gateway, ObserverRegistry};
pub use types::{GatewayEvent, MessageReceipt};
