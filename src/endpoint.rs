//! Write+notify attribute endpoints.
//!
//! Each capability is served by one endpoint. Subscription state is an
//! independent two-state machine per endpoint; request handling is
//! serialized per endpoint so response sequences never interleave, while
//! distinct endpoints proceed concurrently.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::handler::RequestHandler;
use crate::protocol::Capability;
use crate::protocol::response::ResponseFrame;

/// Callback invoked with notification payloads while subscribed.
pub type NotifyFn = Box<dyn Fn(&[u8]) + Send + Sync>;

pub struct AttributeEndpoint {
    capability: Capability,
    uuid: Uuid,
    handler: Arc<RequestHandler>,
    subscription: Mutex<Option<NotifyFn>>,
    /// Fair async mutex: writes are handled in submission order.
    write_order: AsyncMutex<()>,
}

impl AttributeEndpoint {
    pub fn new(capability: Capability, handler: Arc<RequestHandler>) -> Self {
        Self {
            capability,
            uuid: capability.uuid(),
            handler,
            subscription: Mutex::new(None),
            write_order: AsyncMutex::new(()),
        }
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.lock().is_some()
    }

    /// Enter the Subscribed state, replacing any previous callback.
    pub fn subscribe(&self, callback: NotifyFn) {
        log::info!("Client subscribed to {} notifications", self.capability);
        *self.subscription.lock() = Some(callback);
    }

    /// Return to the Unsubscribed state. In-flight request handling and
    /// cache state are unaffected; only the notify path is cleared.
    pub fn unsubscribe(&self) {
        log::info!("Client unsubscribed from {} notifications", self.capability);
        *self.subscription.lock() = None;
    }

    /// Service a write request: handle it, push the payload to a subscriber
    /// if present, and return the acknowledgement frame. Both signals carry
    /// the identical payload.
    pub async fn write(&self, payload: &[u8]) -> ResponseFrame {
        let _order = self.write_order.lock().await;
        let frame = self.handler.handle(self.capability, payload).await;
        self.push_notification(&frame.payload);
        frame
    }

    fn push_notification(&self, payload: &[u8]) {
        let subscription = self.subscription.lock();
        if let Some(callback) = subscription.as_ref() {
            callback(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CommandOutput, CommandRunner, nmcli};
    use crate::config::{CacheConfig, NetworkConfig};
    use crate::error::{GatewayError, Result};
    use crate::protocol::response::WriteStatus;
    use crate::provider::NetworkProvider;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Runner serving the address query, optionally slowed on first call.
    struct AddressRunner {
        delay_first: Option<Duration>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl CommandRunner for AddressRunner {
        async fn run(&self, command: &str) -> Result<CommandOutput> {
            let first = {
                let mut calls = self.calls.lock();
                *calls += 1;
                *calls == 1
            };
            if first && let Some(delay) = self.delay_first {
                tokio::time::sleep(delay).await;
            }
            if command == nmcli::IP_ADDRESS {
                Ok(CommandOutput {
                    status: 0,
                    stdout: "192.168.1.7\n".to_string(),
                    stderr: String::new(),
                })
            } else {
                Err(GatewayError::ExecError(format!(
                    "unexpected command: {command}"
                )))
            }
        }
    }

    fn endpoint(delay_first: Option<Duration>) -> Arc<AttributeEndpoint> {
        let runner = Arc::new(AddressRunner {
            delay_first,
            calls: Mutex::new(0),
        });
        let provider = Arc::new(NetworkProvider::new(
            runner,
            CacheConfig {
                query_ttl_ms: 10_000,
                health_ttl_ms: 3_600_000,
            },
            NetworkConfig { scan_wait_secs: 5 },
        ));
        let handler = Arc::new(RequestHandler::new(provider, 20));
        Arc::new(AttributeEndpoint::new(Capability::IpAddress, handler))
    }

    #[tokio::test]
    async fn test_write_is_serviced_without_subscription() {
        let endpoint = endpoint(None);
        assert!(!endpoint.is_subscribed());

        let frame = endpoint.write(br#"{"offset": 0}"#).await;
        assert_eq!(frame.status, WriteStatus::Success);
        assert_eq!(frame.payload, b"192.168.1.7".to_vec());
    }

    #[tokio::test]
    async fn test_notification_carries_ack_payload() {
        let endpoint = endpoint(None);
        let (tx, mut rx) = mpsc::unbounded_channel();
        endpoint.subscribe(Box::new(move |payload| {
            let _ = tx.send(payload.to_vec());
        }));
        assert!(endpoint.is_subscribed());

        let frame = endpoint.write(br#"{"offset": 0}"#).await;
        let notified = rx.try_recv().unwrap();
        assert_eq!(notified, frame.payload);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_notifications() {
        let endpoint = endpoint(None);
        let (tx, mut rx) = mpsc::unbounded_channel();
        endpoint.subscribe(Box::new(move |payload| {
            let _ = tx.send(payload.to_vec());
        }));
        endpoint.unsubscribe();
        assert!(!endpoint.is_subscribed());

        endpoint.write(br#"{"offset": 0}"#).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_writes_complete_in_submission_order() {
        let endpoint = endpoint(Some(Duration::from_millis(50)));
        let (tx, mut rx) = mpsc::unbounded_channel();
        endpoint.subscribe(Box::new(move |payload| {
            let _ = tx.send(payload.to_vec());
        }));

        let slow = {
            let endpoint = endpoint.clone();
            tokio::spawn(async move { endpoint.write(br#"{"offset": 0}"#).await })
        };
        // Give the slow write time to take the order lock.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let fast = {
            let endpoint = endpoint.clone();
            tokio::spawn(async move { endpoint.write(br#"{"offset": 4}"#).await })
        };

        slow.await.unwrap();
        fast.await.unwrap();

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first, b"192.168.1.7".to_vec());
        assert_eq!(second, b"168.1.7".to_vec());
    }
}
