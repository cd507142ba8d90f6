//! TCP transport for DNS queries.
//!
//! One connection per exchange. TCP DNS messages are prefixed with a 2-byte
//! big-endian length.

use std::io;

use async_trait::async_trait;
use hickory_proto::op::Message;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::{Exchange, invalid_data};

#[derive(Debug, Default, Clone, Copy)]
pub struct TcpExchange;

#[async_trait]
impl Exchange for TcpExchange {
    async fn exchange(&self, request: &Message, server: &str) -> io::Result<Message> {
        let query = request.to_vec().map_err(invalid_data)?;
        let len = u16::try_from(query.len()).map_err(invalid_data)?;

        let mut stream = TcpStream::connect(server).await?;

        let mut framed = Vec::with_capacity(2 + query.len());
        framed.extend_from_slice(&len.to_be_bytes());
        framed.extend_from_slice(&query);
        stream.write_all(&framed).await?;

        let response = read_dns_message(&mut stream).await?;
        if response.id() != request.id() {
            return Err(invalid_data(format!(
                "response id {} does not match query id {}",
                response.id(),
                request.id()
            )));
        }

        Ok(response)
    }
}

/// Read one length-prefixed DNS message from a TCP stream.
async fn read_dns_message(stream: &mut TcpStream) -> io::Result<Message> {
    let mut prefix = [0u8; 2];
    stream.read_exact(&mut prefix).await?;

    let msg_len = usize::from(u16::from_be_bytes(prefix));
    let mut buf = vec![0u8; msg_len];
    stream.read_exact(&mut buf).await?;

    Message::from_vec(&buf).map_err(invalid_data)
}
