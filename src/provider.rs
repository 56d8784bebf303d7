//! Host network queries and mutations backing the capability endpoints.
//!
//! Read queries go through the [`CommandCache`]; mutating operations
//! (connect, disconnect, rescan) always execute directly because replaying
//! them is unsafe.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::CommandCache;
use crate::commands::{CommandOutput, CommandRunner, nmcli};
use crate::config::{CacheConfig, NetworkConfig};
use crate::error::{GatewayError, Result};

/// Connected device row, normalized from the status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceStatus {
    #[serde(rename = "TYPE")]
    pub device_type: String,
    #[serde(rename = "STATE")]
    pub state: String,
    #[serde(rename = "CONNECTION")]
    pub connection: String,
}

/// Raw status row as produced by the jq pipeline.
#[derive(Debug, Deserialize)]
struct RawDeviceStatus {
    #[serde(rename = "TYPE", default)]
    device_type: Option<String>,
    #[serde(rename = "STATE", default)]
    state: Option<String>,
    #[serde(rename = "CONNECTION", default)]
    connection: Option<String>,
}

/// Visible Wi-Fi network row as produced by the jq pipeline.
///
/// All fields are optional: the line-splitting pipeline emits null for
/// short rows, and the ssid may legitimately be empty (hidden networks).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WifiNetwork {
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub rate: Option<String>,
    #[serde(default)]
    pub signal: Option<String>,
    #[serde(default)]
    pub bars: Option<String>,
    #[serde(default)]
    pub security: Option<String>,
}

impl WifiNetwork {
    /// Network name, empty when the row has none.
    pub fn ssid(&self) -> &str {
        self.network.as_deref().unwrap_or("")
    }

    /// Numeric signal strength; unparsable values rank last.
    pub fn signal_strength(&self) -> u32 {
        self.signal
            .as_deref()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// Identification of the host itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub hostname: String,
    pub kernel: String,
}

/// Executes the host's network queries and actions through one runner seam.
pub struct NetworkProvider {
    runner: Arc<dyn CommandRunner>,
    cache: CommandCache,
    cache_config: CacheConfig,
    network_config: NetworkConfig,
}

impl NetworkProvider {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        cache_config: CacheConfig,
        network_config: NetworkConfig,
    ) -> Self {
        Self {
            runner,
            cache: CommandCache::new(),
            cache_config,
            network_config,
        }
    }

    /// Cached query; a non-zero exit is an execution failure and never
    /// populates the cache.
    async fn query(&self, command: &str, force_refresh: bool) -> Result<Arc<CommandOutput>> {
        let runner = Arc::clone(&self.runner);
        let line = command.to_string();
        self.cache
            .fetch(command, self.cache_config.query_ttl(), force_refresh, async move {
                let output = runner.run(&line).await?;
                if output.success() {
                    Ok(output)
                } else {
                    Err(GatewayError::ExecError(output.diagnostic().to_string()))
                }
            })
            .await
    }

    /// Uncached mutating execution.
    async fn execute(&self, command: &str) -> Result<CommandOutput> {
        let output = self.runner.run(command).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(GatewayError::ExecError(output.diagnostic().to_string()))
        }
    }

    /// Verify the structured-data extraction adapter (`jq`) is present.
    ///
    /// The probe itself is cached for a much longer window than query
    /// results; a missing adapter keeps answering from the cached probe
    /// instead of re-running `which` on every request.
    pub async fn ensure_extraction_adapter(&self) -> Result<()> {
        let runner = Arc::clone(&self.runner);
        let probe = self
            .cache
            .fetch(
                nmcli::JQ_PROBE,
                self.cache_config.health_ttl(),
                false,
                async move { runner.run(nmcli::JQ_PROBE).await },
            )
            .await?;

        if probe.success() && !probe.stdout.trim().is_empty() {
            Ok(())
        } else {
            Err(GatewayError::DependencyMissing("jq".to_string()))
        }
    }

    /// Connected wifi/ethernet devices.
    pub async fn connection_status(&self, force_refresh: bool) -> Result<Vec<DeviceStatus>> {
        self.ensure_extraction_adapter().await?;
        let output = self.query(nmcli::CONNECTION_STATUS, force_refresh).await?;
        let rows: Vec<RawDeviceStatus> = serde_json::from_str(&output.stdout)
            .map_err(|e| GatewayError::ExecError(format!("unparsable status output: {e}")))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let device_type = row.device_type?;
                Some(DeviceStatus {
                    connection: row.connection.filter(|c| !c.is_empty()).unwrap_or_else(|| device_type.clone()),
                    state: row.state.unwrap_or_else(|| "connected".to_string()),
                    device_type,
                })
            })
            .collect())
    }

    /// Visible Wi-Fi networks ranked by signal strength, descending.
    ///
    /// Rows without a ssid are kept: index paging answers them with the
    /// skip marker so the controller's cursor arithmetic stays simple.
    pub async fn wifi_networks(&self, force_refresh: bool) -> Result<Vec<WifiNetwork>> {
        self.ensure_extraction_adapter().await?;
        let output = self.query(nmcli::WIFI_NETWORKS, force_refresh).await?;
        let mut networks: Vec<WifiNetwork> = serde_json::from_str(&output.stdout)
            .map_err(|e| GatewayError::ExecError(format!("unparsable network list: {e}")))?;

        networks.sort_by(|a, b| b.signal_strength().cmp(&a.signal_strength()));
        Ok(networks)
    }

    /// First private IPv4 address of the host.
    pub async fn ip_address(&self, force_refresh: bool) -> Result<String> {
        let output = self.query(nmcli::IP_ADDRESS, force_refresh).await?;
        let address = output.stdout.trim();
        if address.is_empty() {
            Err(GatewayError::EmptyResult)
        } else {
            Ok(address.to_string())
        }
    }

    /// Hostname and kernel identification.
    pub async fn device_info(&self, force_refresh: bool) -> Result<DeviceInfo> {
        let output = self.query(nmcli::DEVICE_INFO, force_refresh).await?;
        let mut lines = output.stdout.lines();
        let hostname = lines.next().unwrap_or("").trim().to_string();
        if hostname.is_empty() {
            return Err(GatewayError::EmptyResult);
        }
        let kernel = lines.next().unwrap_or("").trim().to_string();
        Ok(DeviceInfo { hostname, kernel })
    }

    /// Connect to a Wi-Fi network. Mutating, never cached.
    pub async fn connect_wifi(&self, ssid: &str, password: &str) -> Result<CommandOutput> {
        log::info!("Connecting to Wi-Fi network '{ssid}' (password withheld)");
        self.execute(&nmcli::connect_wifi(ssid, password)).await
    }

    /// Disconnect from Wi-Fi. Mutating, never cached.
    ///
    /// The radio off/on cycle is the primary path; when it fails, the
    /// fallback locates the connected wifi device and disconnects it
    /// directly, and the fallback's outcome is the operation's outcome.
    pub async fn disconnect_wifi(&self) -> Result<CommandOutput> {
        match self.execute(nmcli::DISCONNECT_RADIO).await {
            Ok(output) => Ok(output),
            Err(radio_err) => {
                log::warn!("Radio cycle failed ({radio_err}); trying device disconnect");

                let listing = self
                    .runner
                    .run(nmcli::CONNECTED_WIFI_DEVICES)
                    .await
                    .map_err(|_| radio_err.clone())?;
                let device = listing
                    .stdout
                    .lines()
                    .find_map(|line| line.split(':').next().filter(|d| !d.trim().is_empty()))
                    .map(str::to_string);

                match device {
                    Some(device) => {
                        log::info!("Found connected wifi device {device}, disconnecting");
                        self.execute(&nmcli::disconnect_device(&device)).await
                    }
                    None => Err(radio_err),
                }
            }
        }
    }

    /// Trigger a Wi-Fi rescan. A failure is logged and swallowed: the
    /// follow-up list query may still serve current scan results.
    pub async fn rescan(&self) {
        if let Err(err) = self
            .execute(&nmcli::rescan(self.network_config.scan_wait_secs))
            .await
        {
            log::warn!("Wi-Fi rescan failed: {err}");
        }
    }
}
