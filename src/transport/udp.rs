//! UDP transport for DNS queries.
//!
//! Each exchange uses a fresh ephemeral socket connected to the resolver, so
//! the kernel drops datagrams from other sources. Datagrams carrying a
//! different transaction ID (late replies to an earlier attempt) are skipped.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use async_trait::async_trait;
use hickory_proto::op::Message;
use tokio::net::{UdpSocket, lookup_host};

use super::{Exchange, invalid_data, receive_buffer_len};

#[derive(Debug, Default, Clone, Copy)]
pub struct UdpExchange;

#[async_trait]
impl Exchange for UdpExchange {
    async fn exchange(&self, request: &Message, server: &str) -> io::Result<Message> {
        let query = request.to_vec().map_err(invalid_data)?;

        let target = lookup_host(server).await?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{server} did not resolve to an address"),
            )
        })?;
        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(local).await?;
        socket.connect(target).await?;
        socket.send(&query).await?;

        let mut buf = vec![0u8; receive_buffer_len(request)];
        loop {
            let len = socket.recv(&mut buf).await?;
            let response = Message::from_vec(&buf[..len]).map_err(invalid_data)?;
            if response.id() == request.id() {
                return Ok(response);
            }
        }
    }
}
