//! Sending requests and receiving responses.
//!
//! This module provides the DNS transport protocols the resolver uses to
//! send a single request to a single server and receive the corresponding
//! reply.
//!
//! Sending a request and receiving the reply consists of three steps:
//! 1) Creating a DNS transport for a server,
//! 2) Sending a [RequestMessage][request::RequestMessage] over it, and
//! 3) Waiting for the reply.
//!
//! Transports implement the [SendRequest][request::SendRequest] trait.
//! Sending a request returns a value implementing
//! [GetResponse][request::GetResponse] which, when asked, performs the
//! actual exchange. Dropping it before it is done abandons the request.
//!
//! # Transports
//!
//! The following transports are available:
//! * [dgram] sends the request over UDP,
//! * [stream] sends the request over a new TCP connection, and
//! * [udp_tcp] sends the request over UDP and retries over TCP if the reply
//!   is truncated. It also adds EDNS and TSIG according to the request’s
//!   configuration and is the transport used by the resolver.
//!
//! The resolver doesn’t create transports directly but asks a
//! [Connect][request::Connect] factory for them. The default factory is
//! [UdpTcpConnect][request::UdpTcpConnect]. Other factories can be plugged
//! in, e.g., for testing.
//!
//! # Example
//!
//! ```no_run
//! # use std::str::FromStr;
//! # use std::sync::Arc;
//! # use domain_parallel::base::{Dname, MessageBuilder, Rtype};
//! # use domain_parallel::net::client::request::{
//! #     Connect, RequestMessage, UdpTcpConnect,
//! # };
//! # use domain_parallel::resolv::config::ResolverConfig;
//! # async fn _test() {
//! let name = Dname::from_str("example.com").unwrap();
//! let msg = MessageBuilder::new_query(&name, Rtype::AAAA)
//!     .into_message()
//!     .unwrap();
//! let conn = UdpTcpConnect.connect("127.0.0.1:53".parse().unwrap());
//! let req = RequestMessage::new(msg, Arc::new(ResolverConfig::default()));
//! let reply = conn.send_request(req).get_response().await;
//! # }
//! ```

pub use self::error::Error;

pub mod dgram;
pub mod error;
pub mod request;
pub mod stream;
pub mod udp_tcp;
