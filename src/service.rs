//! Gateway wiring: one provider, one handler, six endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use strum::IntoEnumIterator;
use uuid::Uuid;

use crate::commands::{CommandRunner, ShellRunner};
use crate::config::Config;
use crate::endpoint::AttributeEndpoint;
use crate::handler::RequestHandler;
use crate::protocol::Capability;
use crate::provider::NetworkProvider;

/// The assembled gateway: every capability endpoint over a shared provider.
pub struct GatewayService {
    endpoints: HashMap<Uuid, Arc<AttributeEndpoint>>,
    provider: Arc<NetworkProvider>,
}

impl GatewayService {
    /// Production service backed by the host shell.
    pub fn new(config: &Config) -> Self {
        Self::with_runner(config, Arc::new(ShellRunner))
    }

    /// Service with a caller-supplied command runner.
    pub fn with_runner(config: &Config, runner: Arc<dyn CommandRunner>) -> Self {
        let provider = Arc::new(NetworkProvider::new(
            runner,
            config.cache.clone(),
            config.network.clone(),
        ));
        let handler = Arc::new(RequestHandler::new(
            provider.clone(),
            config.transport.chunk_size(),
        ));

        let endpoints = Capability::iter()
            .map(|capability| {
                let endpoint = Arc::new(AttributeEndpoint::new(capability, handler.clone()));
                (capability.uuid(), endpoint)
            })
            .collect();

        Self {
            endpoints,
            provider,
        }
    }

    /// Endpoint by its 128-bit identifier, as addressed over the transport.
    pub fn endpoint(&self, uuid: &Uuid) -> Option<&Arc<AttributeEndpoint>> {
        self.endpoints.get(uuid)
    }

    /// Endpoint by capability. The table is total by construction.
    pub fn endpoint_for(&self, capability: Capability) -> &Arc<AttributeEndpoint> {
        self.endpoints
            .get(&capability.uuid())
            .expect("endpoint table covers every capability")
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Arc<AttributeEndpoint>> {
        self.endpoints.values()
    }

    pub fn provider(&self) -> &Arc<NetworkProvider> {
        &self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CommandOutput, nmcli};
    use crate::error::{GatewayError, Result};
    use crate::protocol::pager;
    use crate::protocol::response::WriteStatus;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use tokio::sync::mpsc;

    struct StubRunner {
        responses: HashMap<String, CommandOutput>,
        calls: Mutex<Vec<String>>,
    }

    impl StubRunner {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn respond(mut self, command: &str, stdout: &str) -> Self {
            self.responses.insert(
                command.to_string(),
                CommandOutput {
                    status: 0,
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                },
            );
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for StubRunner {
        async fn run(&self, command: &str) -> Result<CommandOutput> {
            self.calls.lock().push(command.to_string());
            self.responses
                .get(command)
                .cloned()
                .ok_or_else(|| GatewayError::ExecError(format!("unexpected command: {command}")))
        }
    }

    fn service(runner: StubRunner) -> (Arc<StubRunner>, GatewayService) {
        let runner = Arc::new(runner);
        let service = GatewayService::with_runner(&Config::default(), runner.clone());
        (runner, service)
    }

    #[test]
    fn test_every_capability_has_an_endpoint() {
        let (_, service) = service(StubRunner::new());
        assert_eq!(service.endpoints().count(), 6);
        for capability in Capability::iter() {
            assert_eq!(
                service.endpoint_for(capability).capability(),
                capability
            );
        }
    }

    #[test]
    fn test_unknown_uuid_has_no_endpoint() {
        let (_, service) = service(StubRunner::new());
        assert!(service.endpoint(&Uuid::nil()).is_none());
    }

    #[tokio::test]
    async fn test_status_offset_scenario_delivers_on_both_channels() {
        let stdout = r#"[{"TYPE": "wifi", "STATE": "connected", "CONNECTION": "home"}]"#;
        let (_, service) = service(
            StubRunner::new()
                .respond(nmcli::JQ_PROBE, "/usr/bin/jq\n")
                .respond(nmcli::CONNECTION_STATUS, stdout),
        );

        let endpoint = service.endpoint_for(Capability::ConnectionStatus);
        let (tx, mut rx) = mpsc::unbounded_channel();
        endpoint.subscribe(Box::new(move |payload| {
            let _ = tx.send(payload.to_vec());
        }));

        let frame = endpoint.write(br#"{"offset": 0}"#).await;

        assert_eq!(frame.status, WriteStatus::Success);
        assert_eq!(frame.payload.len(), 20);
        assert_eq!(rx.try_recv().unwrap(), frame.payload);
    }

    #[tokio::test]
    async fn test_forced_empty_scan_scenario_returns_terminal() {
        let (runner, service) = service(
            StubRunner::new()
                .respond(nmcli::JQ_PROBE, "/usr/bin/jq\n")
                .respond(&nmcli::rescan(5), "")
                .respond(nmcli::WIFI_NETWORKS, "[]"),
        );

        let endpoint = service.endpoint_for(Capability::NetworkList);
        let frame = endpoint.write(br#"{"index": 0, "refresh": true}"#).await;

        assert_eq!(frame.status, WriteStatus::Success);
        assert_eq!(frame.payload, pager::TERMINAL_MARKER.to_vec());
        assert!(runner.calls().contains(&nmcli::rescan(5)));
    }
}
