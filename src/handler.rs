//! Request routing: decode, classify, drive the provider and the pager.
//!
//! One handler serves every endpoint; the capability passed with each
//! request selects the routing strategy. All errors are caught here and
//! converted to a single failure frame — nothing a controller sends can
//! take the process down.

use std::sync::Arc;

use serde::Serialize;

use crate::commands::CommandOutput;
use crate::error::{GatewayError, Result};
use crate::protocol::Capability;
use crate::protocol::pager::{self, IndexPage, IndexedItem, Snapshot};
use crate::protocol::request::{ActionRequest, Credentials, Request};
use crate::protocol::response::ResponseFrame;
use crate::provider::NetworkProvider;

pub struct RequestHandler {
    provider: Arc<NetworkProvider>,
    chunk_size: usize,
}

impl RequestHandler {
    pub fn new(provider: Arc<NetworkProvider>, chunk_size: usize) -> Self {
        Self {
            provider,
            chunk_size,
        }
    }

    /// Service one request. At most one response frame per invocation;
    /// every error becomes an Error-status frame with a diagnostic payload.
    pub async fn handle(&self, capability: Capability, payload: &[u8]) -> ResponseFrame {
        match self.dispatch(capability, payload).await {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("{capability} request failed: {err}");
                ResponseFrame::failure(&err)
            }
        }
    }

    async fn dispatch(&self, capability: Capability, payload: &[u8]) -> Result<ResponseFrame> {
        match capability {
            Capability::Credentials => self.submit_credentials(payload).await,
            Capability::NetworkAction => self.run_action(payload).await,
            Capability::ConnectionStatus
            | Capability::NetworkList
            | Capability::IpAddress
            | Capability::DeviceInfo => self.page(capability, payload).await,
        }
    }

    async fn submit_credentials(&self, payload: &[u8]) -> Result<ResponseFrame> {
        let credentials = Credentials::decode(payload)?;
        let output = self
            .provider
            .connect_wifi(&credentials.username, &credentials.password)
            .await?;
        Ok(action_report(&output))
    }

    async fn run_action(&self, payload: &[u8]) -> Result<ResponseFrame> {
        let Request::Action { action } = Request::decode(payload)? else {
            return Err(GatewayError::InvalidParameter(
                "this endpoint accepts actions only".to_string(),
            ));
        };

        match action {
            ActionRequest::Connect { ssid, password } => {
                let output = self.provider.connect_wifi(&ssid, &password).await?;
                Ok(action_report(&output))
            }
            ActionRequest::Disconnect => {
                let output = self.provider.disconnect_wifi().await?;
                Ok(action_report(&output))
            }
            ActionRequest::Rescan => {
                self.provider.rescan().await;
                Ok(ResponseFrame::success(b"rescan started".to_vec()))
            }
        }
    }

    async fn page(&self, capability: Capability, payload: &[u8]) -> Result<ResponseFrame> {
        match Request::decode(payload)? {
            Request::Offset { offset } => {
                let snapshot = self.snapshot(capability, false).await?;
                let chunk = pager::offset_chunk(&snapshot.raw, offset, self.chunk_size);
                Ok(ResponseFrame::success(chunk.to_vec()))
            }
            Request::Index { index, refresh } => {
                // A forced scan-list read means the controller wants the air
                // re-sampled, not just the cache bypassed.
                if refresh && capability == Capability::NetworkList {
                    self.provider.rescan().await;
                }
                let snapshot = self.snapshot(capability, refresh).await?;
                let payload = match pager::index_entry(&snapshot.items, index) {
                    IndexPage::Item(bytes) => bytes.to_vec(),
                    IndexPage::Skip => pager::SKIP_MARKER.to_vec(),
                    IndexPage::End => pager::TERMINAL_MARKER.to_vec(),
                };
                Ok(ResponseFrame::success(payload))
            }
            Request::Action { .. } => Err(GatewayError::InvalidParameter(
                "this endpoint does not accept actions".to_string(),
            )),
        }
    }

    /// Build both paged views from one provider result. Serialization is
    /// deterministic, so re-serializing the same cached result yields the
    /// same bytes and offset slices stay contiguous across calls.
    async fn snapshot(&self, capability: Capability, refresh: bool) -> Result<Snapshot> {
        match capability {
            Capability::ConnectionStatus => {
                let rows = self.provider.connection_status(refresh).await?;
                snapshot_from_rows(&rows, |row| row.connection.clone())
            }
            Capability::NetworkList => {
                let rows = self.provider.wifi_networks(refresh).await?;
                snapshot_from_rows(&rows, |row| row.ssid().to_string())
            }
            Capability::IpAddress => {
                let address = self.provider.ip_address(refresh).await?;
                let raw = address.clone().into_bytes();
                Ok(Snapshot {
                    items: vec![IndexedItem {
                        id: address,
                        payload: raw.clone(),
                    }],
                    raw,
                })
            }
            Capability::DeviceInfo => {
                let info = self.provider.device_info(refresh).await?;
                let raw = serde_json::to_vec(&info)?;
                Ok(Snapshot {
                    items: vec![IndexedItem {
                        id: info.hostname.clone(),
                        payload: raw.clone(),
                    }],
                    raw,
                })
            }
            Capability::Credentials | Capability::NetworkAction => Err(
                GatewayError::InvalidParameter("capability is not paged".to_string()),
            ),
        }
    }
}

fn snapshot_from_rows<T, F>(rows: &[T], id_of: F) -> Result<Snapshot>
where
    T: Serialize,
    F: Fn(&T) -> String,
{
    let raw = serde_json::to_vec(rows)?;
    let items = rows
        .iter()
        .map(|row| {
            Ok(IndexedItem {
                id: id_of(row),
                payload: serde_json::to_vec(row)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Snapshot { raw, items })
}

/// Success frame for a completed mutating operation: the command's own
/// output where it has any, a fixed confirmation otherwise.
fn action_report(output: &CommandOutput) -> ResponseFrame {
    let text = output.stdout.trim();
    if text.is_empty() {
        ResponseFrame::success(b"ok".to_vec())
    } else {
        ResponseFrame::success(text.as_bytes().to_vec())
    }
}
