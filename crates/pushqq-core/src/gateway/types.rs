/// Receipt for a delivered message.
///
/// The relay itself never inspects this beyond logging; it exists so callers
/// can correlate sends with the protocol client's view of them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MessageReceipt {
    /// Server time of acceptance (unix seconds).
    pub time: i64,
}

/// Inbound protocol events, reduced to what observers care about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayEvent {
    PrivateMessage { sender: u64, text: String },
    GroupMessage { group: u64, sender: u64, text: String },
    Disconnected { reason: String },
}
