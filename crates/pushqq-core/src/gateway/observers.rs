use async_trait::async_trait;
use tracing::{info, warn};

use crate::gateway::{
    port::{EventObserver, Gateway},
    types::GatewayEvent,
};

/// Answers a private "ping" with "pong". Mostly a liveness check for operators.
pub struct PingReply;

#[async_trait]
impl EventObserver for PingReply {
    async fn on_event(&self, gateway: &dyn Gateway, event: &GatewayEvent) {
        let GatewayEvent::PrivateMessage { sender, text } = event else {
            return;
        };
        if text != "ping" {
            return;
        }
        if let Err(e) = gateway.send_private(*sender, "pong").await {
            warn!("ping reply to {sender} failed: {e}");
        }
    }
}

/// Logs transport drops reported by the protocol client.
pub struct DisconnectLogger;

#[async_trait]
impl EventObserver for DisconnectLogger {
    async fn on_event(&self, _gateway: &dyn Gateway, event: &GatewayEvent) {
        if let GatewayEvent::Disconnected { reason } = event {
            info!("connection lost: {reason}");
        }
    }
}
