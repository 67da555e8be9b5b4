//! A UDP transport that falls back to TCP if the reply is truncated.
//!
//! This is the transport the resolver uses for every server. Before a
//! request is sent, it is completed according to the configuration
//! snapshot that comes with it: an OPT record is added if EDNS is
//! configured and the request is signed if a TSIG key is configured.
#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::boxed::Box;
use std::fmt::Debug;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use tracing::debug;

use crate::base::{Message, MessageBuilder};
use crate::net::client::dgram;
use crate::net::client::error::Error;
use crate::net::client::request::{GetResponse, RequestMessage, SendRequest};
use crate::net::client::stream;
#[cfg(feature = "tsig")]
use crate::tsig::ClientTransaction;

//------------ Connection ----------------------------------------------------

/// DNS transport connection that first issues a query over a UDP transport
/// and falls back to TCP if the reply is truncated.
#[derive(Clone, Debug)]
pub struct Connection {
    /// The UDP transport connection.
    udp_conn: dgram::Connection,

    /// The TCP transport connection.
    tcp_conn: stream::Connection,
}

impl Connection {
    /// Creates a new connection to the server at `remote_addr`.
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            udp_conn: dgram::Connection::new(remote_addr),
            tcp_conn: stream::Connection::new(remote_addr),
        }
    }

    /// Returns the address of the server.
    pub fn remote_addr(&self) -> SocketAddr {
        self.udp_conn.remote_addr()
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

/// Object that contains the current state of a query.
#[derive(Debug)]
pub struct Request {
    /// The connection.
    conn: Connection,

    /// The request.
    request_msg: RequestMessage,
}

impl Request {
    /// Async function that waits for the response.
    async fn get_response_impl(&mut self) -> Result<Message, Error> {
        let config = self.request_msg.config();
        let query = self.request_msg.message();
        let mut builder = MessageBuilder::from_message(query);
        if let Some(edns) = config.edns() {
            if query.opt().is_none() {
                edns.push(&mut builder)?;
            }
        }
        #[cfg(feature = "tsig")]
        let tran = match config.tsig_key() {
            Some(key) => {
                Some(ClientTransaction::request(key.clone(), &mut builder)?)
            }
            None => None,
        };
        let query = builder.into_message()?;

        let answer = if config.use_tcp() {
            self.conn.tcp_conn.exchange(&query).await?
        } else {
            let answer = self
                .conn
                .udp_conn
                .exchange(&query, config.local_port(), config.udp_recv_size())
                .await?;
            if answer.header().tc() && !config.ignore_truncation() {
                debug!(
                    server = %self.conn.remote_addr(),
                    "truncated answer, retrying over TCP"
                );
                self.conn.tcp_conn.exchange(&query).await?
            } else {
                answer
            }
        };

        #[cfg(feature = "tsig")]
        let answer = match tran {
            Some(tran) => tran.answer(&answer)?,
            None => answer,
        };
        Ok(answer)
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
