use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    gateway::types::{GatewayEvent, MessageReceipt},
    Result,
};

/// Port for an already-authenticated messaging client.
///
/// Delivery retries, rate limiting and message encoding are the protocol
/// client's problem; this boundary only carries validated send calls.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn send_private(&self, uin: u64, text: &str) -> Result<MessageReceipt>;
    async fn send_group(&self, uin: u64, text: &str) -> Result<MessageReceipt>;
}

/// Observer of inbound protocol events.
///
/// Each observer receives an immutable event value plus the gateway, so it can
/// perform independent sends (a reply, a forward) without shared state.
#[async_trait]
pub trait EventObserver: Send + Sync {
    async fn on_event(&self, gateway: &dyn Gateway, event: &GatewayEvent);
}

/// Explicit registry of event observers, populated before serving starts.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Vec<Arc<dyn EventObserver>>,
}

impl ObserverRegistry {
    pub fn register(&mut self, observer: Arc<dyn EventObserver>) {
        self.observers.push(observer);
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub async fn dispatch(&self, gateway: &dyn Gateway, event: &GatewayEvent) {
        for observer in &self.observers {
            observer.on_event(gateway, event).await;
        }
    }
}
