//! Property store interface consumed by the thermostat engine.
//!
//! The transport (encoding, address resolution, timeouts and retries) lives
//! behind [`PropertyStore`]. The engine only supplies resolved addresses,
//! object references and already-tagged value lists.

use super::object::ObjectRef;
use super::value::{ReadResponse, TaggedValue};
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

/// BACnet "present value" property identifier.
pub const PRESENT_VALUE: u32 = 85;

/// Priority used for every write issued by the bridge.
pub const DEFAULT_WRITE_PRIORITY: u8 = 8;

/// Network address of a remote device.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeviceAddress {
    /// Device reachable directly by host (IP or IP:port)
    Direct { host: String },
    /// Device behind a BACnet router
    Routed { host: String, net: u16, adr: u8 },
}

impl DeviceAddress {
    /// Build an address from configuration values.
    ///
    /// `-1` (or any value that does not fit the field) for either `net` or
    /// `adr` selects direct addressing.
    pub fn from_parts(host: impl Into<String>, net: i64, adr: i64) -> Self {
        let host = host.into();
        match (u16::try_from(net), u8::try_from(adr)) {
            (Ok(net), Ok(adr)) => DeviceAddress::Routed { host, net, adr },
            _ => DeviceAddress::Direct { host },
        }
    }

    pub fn host(&self) -> &str {
        match self {
            DeviceAddress::Direct { host } | DeviceAddress::Routed { host, .. } => host,
        }
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceAddress::Direct { host } => write!(f, "{}", host),
            DeviceAddress::Routed { host, net, adr } => {
                write!(f, "{} (net {}, adr {})", host, net, adr)
            }
        }
    }
}

/// Single-property read/write access to remote BACnet objects.
///
/// Callers never pass an unconfigured [`ObjectRef`].
#[async_trait]
pub trait PropertyStore: Send + Sync + 'static {
    /// Read one property of one object.
    async fn read_property(
        &self,
        address: &DeviceAddress,
        object: &ObjectRef,
        property: u32,
    ) -> Result<ReadResponse>;

    /// Write one property of one object at the given priority.
    async fn write_property(
        &self,
        address: &DeviceAddress,
        object: &ObjectRef,
        property: u32,
        values: &[TaggedValue],
        priority: u8,
    ) -> Result<()>;
}
