// ── Byte-stream transport ──
//
// A Transport is one open link to a remote radio module. It knows nothing
// about lines or commands; the exchange layer builds those on top.

mod memory;
mod serial;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;

pub use memory::{MemoryPeer, MemoryTransport};
pub use serial::{Parity, SerialConnector, SerialPortInfo, SerialSettings, SerialTransport, available_ports};

/// Send/receive byte stream over one physical channel.
///
/// Implementations never retry on their own; callers decide.
#[async_trait]
pub trait Transport: Send {
    /// Write as many bytes as the link accepts, returning the count.
    async fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError>;

    /// Read into `buf`, waiting at most `timeout`. Returns `Ok(0)` when
    /// nothing arrived in time.
    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Discard any received bytes that have not been read yet.
    async fn flush_input(&mut self) -> Result<(), TransportError>;
}

/// Opens fresh [`Transport`]s for one channel.
///
/// Sessions keep a connector rather than a transport so a link that
/// dropped can be reopened on the next command.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError>;

    /// Human-readable endpoint description for logs.
    fn describe(&self) -> String;
}

/// Write the whole buffer, looping over short writes.
pub async fn write_all(transport: &mut dyn Transport, mut bytes: &[u8]) -> Result<(), TransportError> {
    while !bytes.is_empty() {
        let n = transport.write(bytes).await?;
        if n == 0 {
            return Err(TransportError::Disconnected);
        }
        bytes = bytes.get(n..).unwrap_or_default();
    }
    Ok(())
}
