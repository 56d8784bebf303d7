//! Wire protocol: capability table, request shapes, response frames and the
//! pager that fits oversized results onto the constrained transport.

pub mod pager;
pub mod request;
pub mod response;

use strum::{Display, EnumIter};
use uuid::{Uuid, uuid};

/// Identifier of the primary service exposing all capability endpoints.
pub const SERVICE_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-fffffffffff0");

/// One capability of the gateway, each backed by its own write+notify
/// attribute endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Capability {
    /// Wi-Fi credential submission (mutating).
    Credentials,
    /// Connected-device query (paged).
    ConnectionStatus,
    /// Visible-network query, signal-ranked (paged).
    NetworkList,
    /// Host address query (paged).
    IpAddress,
    /// Network change actions: connect, disconnect, rescan (mutating).
    NetworkAction,
    /// Host identification query (paged).
    DeviceInfo,
}

impl Capability {
    /// Fixed 128-bit endpoint identifier for this capability.
    pub fn uuid(self) -> Uuid {
        match self {
            Capability::Credentials => uuid!("ffffffff-ffff-ffff-ffff-fffffffffff1"),
            Capability::ConnectionStatus => uuid!("ffffffff-ffff-ffff-ffff-fffffffffff2"),
            Capability::NetworkList => uuid!("ffffffff-ffff-ffff-ffff-fffffffffff3"),
            Capability::IpAddress => uuid!("ffffffff-ffff-ffff-ffff-fffffffffff4"),
            Capability::NetworkAction => uuid!("ffffffff-ffff-ffff-ffff-fffffffffff5"),
            Capability::DeviceInfo => uuid!("ffffffff-ffff-ffff-ffff-fffffffffff6"),
        }
    }

    /// Whether this capability answers paged requests (offset or index)
    /// rather than a single mutating action.
    pub fn is_paged(self) -> bool {
        !matches!(self, Capability::Credentials | Capability::NetworkAction)
    }
}
