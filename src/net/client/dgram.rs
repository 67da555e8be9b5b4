//! A DNS over UDP transport.
#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::boxed::Box;
use std::fmt::Debug;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::trace;

use crate::base::Message;
use crate::net::client::error::Error;
use crate::net::client::request::{GetResponse, RequestMessage, SendRequest};

/// How many times do we try a new random port if we get ‘address in use.’
const RETRY_RANDOM_PORT: usize = 10;

//------------ Connection ----------------------------------------------------

/// A UDP transport connection.
///
/// Each request uses a fresh socket. The connection does not limit how
/// long it waits for an answer; datagrams that aren’t an answer to the
/// request are ignored, so callers need to apply a timeout.
#[derive(Clone, Debug)]
pub struct Connection {
    /// Address of the remote server.
    remote_addr: SocketAddr,
}

impl Connection {
    /// Create a new UDP transport connection.
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self { remote_addr }
    }

    /// Returns the address of the remote server.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Sends `msg` and waits for its answer.
    ///
    /// If `local_port` is not zero, the socket is bound to that port.
    /// Received datagrams are truncated to `recv_size` octets.
    pub async fn exchange(
        &self,
        msg: &Message,
        local_port: u16,
        recv_size: usize,
    ) -> Result<Message, Error> {
        let sock = udp_bind(self.remote_addr.is_ipv4(), local_port).await?;
        sock.connect(self.remote_addr)
            .await
            .map_err(|e| Error::UdpConnect(Arc::new(e)))?;
        let sent = sock
            .send(msg.as_slice())
            .await
            .map_err(|e| Error::UdpSend(Arc::new(e)))?;
        if sent != msg.as_slice().len() {
            return Err(Error::UdpShortSend);
        }
        loop {
            let mut buf = vec![0; recv_size];
            let len = sock
                .recv(&mut buf)
                .await
                .map_err(|e| Error::UdpReceive(Arc::new(e)))?;
            buf.truncate(len);

            // We ignore garbage since there is a timer on this whole thing.
            let answer = match Message::from_octets(Bytes::from(buf)) {
                Ok(answer) => answer,
                Err(_) => {
                    trace!(server = %self.remote_addr, "ignoring garbage datagram");
                    continue;
                }
            };
            if !answer.is_answer(msg) {
                trace!(server = %self.remote_addr, "ignoring unrelated answer");
                continue;
            }
            return Ok(answer);
        }
    }
}

impl SendRequest for Connection {
    fn send_request(
        &self,
        request_msg: RequestMessage,
    ) -> Box<dyn GetResponse + Send> {
        Box::new(Request {
            conn: self.clone(),
            request_msg,
        })
    }
}

//------------ Request -------------------------------------------------------

/// The state of a DNS request over UDP.
#[derive(Debug)]
pub struct Request {
    /// The connection to send the request over.
    conn: Connection,

    /// The request.
    request_msg: RequestMessage,
}

impl Request {
    /// Async function that waits for the response.
    async fn get_response_impl(&mut self) -> Result<Message, Error> {
        let config = self.request_msg.config();
        self.conn
            .exchange(
                self.request_msg.message(),
                config.local_port(),
                config.udp_recv_size(),
            )
            .await
    }
}

impl GetResponse for Request {
    fn get_response(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Message, Error>> + Send + '_>>
    {
        Box::pin(self.get_response_impl())
    }
}

//------------ Helper Functions ----------------------------------------------

/// Binds a local UDP socket.
///
/// With `local_port` zero, the system picks a random port. If binding that
/// fails, e.g., because the port is in use, binding is retried a few times.
/// A fixed port is tried only once.
async fn udp_bind(v4: bool, local_port: u16) -> Result<UdpSocket, Error> {
    let mut i = 0;
    loop {
        let local: SocketAddr = if v4 {
            ([0u8; 4], local_port).into()
        } else {
            ([0u16; 8], local_port).into()
        };
        match UdpSocket::bind(&local).await {
            Ok(sock) => return Ok(sock),
            Err(err) => {
                if local_port != 0 || i == RETRY_RANDOM_PORT {
                    return Err(Error::UdpBind(Arc::new(err)));
                } else {
                    i += 1
                }
            }
        }
    }
}

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn fixed_port_in_use() {
        let taken = UdpSocket::bind("0.0.0.0:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        assert!(matches!(
            udp_bind(true, port).await,
            Err(Error::UdpBind(_))
        ));
        assert!(udp_bind(true, 0).await.is_ok());
    }
}
