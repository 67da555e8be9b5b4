//! A DNS over TCP transport.
//!
//! Messages on a stream are preceded by a 16 bit length in network byte
//! order. Each request opens its own connection which is closed once the
//! answer has been received.
#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::boxed::Box;
use std::fmt::Debug;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::base::Message;
use crate::net::client::error::Error;
use crate::net::client::request::{GetResponse, RequestMessage, SendRequest};

//------------ Connection ----------------------------------------------------

/// A TCP transport connection.
#[derive(Clone, Debug)]
pub struct Connection {
    /// Address of the remote server.
    remote_addr: SocketAddr,
}

impl Connection {
    /// Create a new TCP transport connection.
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self { remote_addr }
    }

    /// Returns the address of the remote server.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Sends `msg` over a new TCP connection and waits for the answer.
    pub async fn exchange(&self, msg: &Message) -> Result<Message, Error> {
        let mut sock = TcpStream::connect(self.remote_addr)
            .await
            .map_err(|e| Error::StreamConnect(Arc::new(e)))?;
        exchange_on(&mut sock, msg).await
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

/// The state of a DNS request over TCP.
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
        self.conn.exchange(self.request_msg.message()).await
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

/// Writes `msg` to `sock` and reads its answer.
///
/// The first message read must be the answer.
pub async fn exchange_on<S>(sock: &mut S, msg: &Message) -> Result<Message, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_message(sock, msg.as_slice())
        .await
        .map_err(|e| Error::StreamWriteError(Arc::new(e)))?;
    let answer = Message::from_octets(read_message(sock).await?)?;
    if !answer.is_answer(msg) {
        return Err(Error::WrongReplyForQuery);
    }
    Ok(answer)
}

/// Writes a length-prefixed message.
pub async fn write_message<S: AsyncWrite + Unpin>(
    sock: &mut S,
    msg: &[u8],
) -> Result<(), io::Error> {
    let len = u16::try_from(msg.len()).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "message too long")
    })?;
    let mut buf = BytesMut::with_capacity(msg.len() + 2);
    buf.put_u16(len);
    buf.put_slice(msg);
    sock.write_all(&buf).await?;
    sock.flush().await
}

/// Reads a length-prefixed message.
pub async fn read_message<S: AsyncRead + Unpin>(
    sock: &mut S,
) -> Result<Bytes, Error> {
    let len = match sock.read_u16().await {
        Ok(len) => usize::from(len),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(Error::StreamUnexpectedEndOfData)
        }
        Err(err) => return Err(Error::StreamReadError(Arc::new(err))),
    };
    if len < Message::HEADER_LEN {
        return Err(Error::ShortMessage);
    }
    let mut buf = vec![0; len];
    match sock.read_exact(&mut buf).await {
        Ok(_) => Ok(buf.into()),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
            Err(Error::StreamUnexpectedEndOfData)
        }
        Err(err) => Err(Error::StreamReadError(Arc::new(err))),
    }
}

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::iana::{Rcode, Rtype};
    use crate::base::name::Dname;
    use crate::base::MessageBuilder;
    use core::str::FromStr;

    #[tokio::test]
    async fn exchange_over_duplex() {
        let name = Dname::from_str("example.com").unwrap();
        let query = MessageBuilder::new_query(&name, Rtype::A)
            .into_message()
            .unwrap();
        let (mut client, mut server) = tokio::io::duplex(1024);

        let answer = MessageBuilder::start_answer(&query, Rcode::NXDOMAIN)
            .into_message()
            .unwrap();
        let server = tokio::spawn(async move {
            let received = read_message(&mut server).await.unwrap();
            let received = Message::from_octets(received).unwrap();
            assert_eq!(received.header().id(), answer.header().id());
            write_message(&mut server, answer.as_slice()).await.unwrap();
        });

        let res = exchange_on(&mut client, &query).await.unwrap();
        assert_eq!(res.rcode(), Rcode::NXDOMAIN);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn closed_stream() {
        let (mut client, server) = tokio::io::duplex(64);
        drop(server);
        assert!(matches!(
            read_message(&mut client).await,
            Err(Error::StreamUnexpectedEndOfData)
        ));
    }
}
