//! Traits for request/response transports
#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::boxed::Box;
use std::fmt::Debug;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use crate::base::Message;
use crate::net::client::error::Error;
use crate::net::client::udp_tcp;
use crate::resolv::config::ResolverConfig;

//------------ RequestMessage ------------------------------------------------

/// A query together with the configuration snapshot to send it with.
///
/// The configuration is the snapshot that was current when the logical
/// query started. All attempts for that query use the same snapshot, even
/// if the configuration is changed while they are in flight.
#[derive(Clone, Debug)]
pub struct RequestMessage {
    /// The query.
    message: Message,

    /// The transport configuration.
    config: Arc<ResolverConfig>,
}

impl RequestMessage {
    /// Creates a new request.
    pub fn new(message: Message, config: Arc<ResolverConfig>) -> Self {
        Self { message, config }
    }

    /// Returns the query.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Returns the configuration snapshot.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }
}

//------------ SendRequest ---------------------------------------------------

/// Trait for starting a DNS request.
pub trait SendRequest: Debug + Send + Sync {
    /// Starts a request.
    ///
    /// Nothing happens until the returned value is asked for a response.
    fn send_request(
        &self,
        request_msg: RequestMessage,
    ) -> Box<dyn GetResponse + Send>;
}

//------------ GetResponse ---------------------------------------------------

/// Trait for getting the result of a DNS query.
///
/// In the future, the return type of get_response should become an associated
/// type. However, too many uses of 'dyn GetResponse' currently prevent that.
pub trait GetResponse: Debug {
    /// Get the result of a DNS request.
    ///
    /// This function is intended to be cancel safe.
    fn get_response(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Message, Error>> + Send + '_>>;
}

//------------ Connect -------------------------------------------------------

/// A factory for transports to a given server.
///
/// The resolver calls this whenever it (re)builds the bindings for its
/// servers, i.e., on creation, when servers change, and on reset.
pub trait Connect: Debug + Send + Sync {
    /// Returns a transport for the server at `addr`.
    fn connect(&self, addr: SocketAddr) -> Arc<dyn SendRequest>;
}

//------------ UdpTcpConnect -------------------------------------------------

/// The default factory creating UDP connections with TCP fallback.
#[derive(Clone, Copy, Debug, Default)]
pub struct UdpTcpConnect;

impl Connect for UdpTcpConnect {
    fn connect(&self, addr: SocketAddr) -> Arc<dyn SendRequest> {
        Arc::new(udp_tcp::Connection::new(addr))
    }
}
