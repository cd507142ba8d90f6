//! Transports that carry one DNS exchange to a resolver.
//!
//! A transport only moves bytes: it sends an already-built query to a
//! `host:port` target and returns the parsed response. Deadlines,
//! cancellation and error classification belong to the caller.

pub mod tcp;
pub mod udp;

#[cfg(test)]
pub(crate) mod mock;

use std::fmt;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use hickory_proto::op::Message;

pub use tcp::TcpExchange;
pub use udp::UdpExchange;

/// Smallest receive buffer, the classic DNS-over-UDP limit.
pub const MIN_DNS_PACKET_SIZE: usize = 512;

/// Sends a query to a resolver and returns its response.
#[async_trait]
pub trait Exchange: Send + Sync + fmt::Debug {
    /// `server` always carries an explicit port.
    async fn exchange(&self, request: &Message, server: &str) -> io::Result<Message>;
}

/// Wire protocol used to reach resolvers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Protocol {
    #[default]
    Udp,
    Tcp,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }

    /// The stock transport for this protocol.
    pub fn transport(self) -> Arc<dyn Exchange> {
        match self {
            Protocol::Tcp => Arc::new(TcpExchange),
            Protocol::Udp => Arc::new(UdpExchange),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn invalid_data<E>(err: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::InvalidData, err)
}

/// Receive buffer large enough for the payload size the query advertised.
pub(crate) fn receive_buffer_len(request: &Message) -> usize {
    request
        .extensions()
        .as_ref()
        .map_or(MIN_DNS_PACKET_SIZE, |edns| usize::from(edns.max_payload()))
        .max(MIN_DNS_PACKET_SIZE)
}
