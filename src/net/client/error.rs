//! Error type for client transports.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use crate::base::message_builder::PushError;
use crate::base::wire::ParseError;
#[cfg(feature = "tsig")]
use crate::tsig;
use std::error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Error type for client transports.
///
/// Each value describes why a single attempt against a single server
/// failed.
#[derive(Clone, Debug)]
pub enum Error {
    /// PushError from MessageBuilder.
    MessageBuilderPushError(PushError),

    /// ParseError from Message.
    MessageParseError(ParseError),

    /// Octet sequence too short to be a valid DNS message.
    ShortMessage,

    /// The request timed out.
    RequestTimeout,

    /// Connecting a stream failed.
    StreamConnect(Arc<std::io::Error>),

    /// Error reading from a stream.
    StreamReadError(Arc<std::io::Error>),

    /// Error writing to a stream.
    StreamWriteError(Arc<std::io::Error>),

    /// The stream was closed before a complete answer arrived.
    StreamUnexpectedEndOfData,

    /// Binding a UDP socket failed.
    UdpBind(Arc<std::io::Error>),

    /// Connecting a UDP socket failed.
    UdpConnect(Arc<std::io::Error>),

    /// Receiving from a UDP socket failed.
    UdpReceive(Arc<std::io::Error>),

    /// Sending to a UDP socket failed.
    UdpSend(Arc<std::io::Error>),

    /// Only part of the message was sent.
    UdpShortSend,

    /// The reply does not match the query.
    WrongReplyForQuery,

    /// The answer failed TSIG validation.
    #[cfg(feature = "tsig")]
    Authentication(tsig::ValidationError),
}

impl Error {
    /// Returns whether the error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::RequestTimeout)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::MessageParseError(err)
    }
}

impl From<PushError> for Error {
    fn from(err: PushError) -> Self {
        Error::MessageBuilderPushError(err)
    }
}

#[cfg(feature = "tsig")]
impl From<tsig::ValidationError> for Error {
    fn from(err: tsig::ValidationError) -> Self {
        Error::Authentication(err)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Error::MessageBuilderPushError(err) => {
                write!(f, "PushError from MessageBuilder: {}", err)
            }
            Error::MessageParseError(err) => {
                write!(f, "ParseError from Message: {}", err)
            }
            Error::ShortMessage => {
                write!(f, "octet sequence to short to be a valid message")
            }
            Error::RequestTimeout => {
                write!(f, "timeout waiting for response")
            }
            Error::StreamConnect(_) => write!(f, "error connecting stream"),
            Error::StreamReadError(_) => {
                write!(f, "error reading from stream")
            }
            Error::StreamWriteError(_) => {
                write!(f, "error writing to stream")
            }
            Error::StreamUnexpectedEndOfData => {
                write!(f, "unexpected end of data")
            }
            Error::UdpBind(_) => write!(f, "error binding UDP socket"),
            Error::UdpConnect(_) => write!(f, "error connecting UDP socket"),
            Error::UdpReceive(_) => {
                write!(f, "error receiving from UDP socket")
            }
            Error::UdpSend(_) => write!(f, "error sending to UDP socket"),
            Error::UdpShortSend => write!(f, "partial sent to UDP socket"),
            Error::WrongReplyForQuery => {
                write!(f, "reply does not match query")
            }
            #[cfg(feature = "tsig")]
            Error::Authentication(err) => {
                write!(f, "TSIG authentication failed: {}", err)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::MessageBuilderPushError(e) => Some(e),
            Error::MessageParseError(e) => Some(e),
            Error::ShortMessage => None,
            Error::RequestTimeout => None,
            Error::StreamConnect(e) => Some(e),
            Error::StreamReadError(e) => Some(e),
            Error::StreamWriteError(e) => Some(e),
            Error::StreamUnexpectedEndOfData => None,
            Error::UdpBind(e) => Some(e),
            Error::UdpConnect(e) => Some(e),
            Error::UdpReceive(e) => Some(e),
            Error::UdpSend(e) => Some(e),
            Error::UdpShortSend => None,
            Error::WrongReplyForQuery => None,
            #[cfg(feature = "tsig")]
            Error::Authentication(e) => Some(e),
        }
    }
}
