//! Errors returned by the resolver.

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;

use crate::net::client;
use crate::validator::ValidationError;

//------------ Error --------------------------------------------------------

/// A query could not be answered.
///
/// Failures of individual attempts are never reported on their own. If all
/// attempts of a query fail, the first failure is reported.
#[derive(Clone, Debug)]
pub enum Error {
    /// All attempts failed; this is the first transport failure.
    Transport(client::Error),

    /// All attempts failed; the first one received SERVFAIL.
    ServerFailure,

    /// There were no servers to ask.
    NoServers,

    /// The answer failed DNSSEC validation.
    ///
    /// This is never the result of asking another server: once an answer
    /// has been rejected, the query fails.
    Validation(ValidationError),

    /// An asynchronous query was started outside of a Tokio runtime.
    NoRuntime,

    /// The runtime for a blocking query could not be created.
    Runtime(Arc<io::Error>),
}

impl Error {
    /// Returns whether asking again later may succeed.
    ///
    /// Validation failures are not retriable: retrying would only give an
    /// attacker another chance.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::ServerFailure)
    }

    /// Returns whether this is a DNSSEC validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

//--- From

impl From<client::Error> for Error {
    fn from(err: client::Error) -> Self {
        Error::Transport(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

//--- Display and Error

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Transport(ref err) => write!(f, "query failed: {}", err),
            Error::ServerFailure => f.write_str("server failure"),
            Error::NoServers => f.write_str("no servers configured"),
            Error::Validation(ref err) => {
                write!(f, "DNSSEC validation failed: {}", err)
            }
            Error::NoRuntime => f.write_str("not running in a Tokio runtime"),
            Error::Runtime(ref err) => {
                write!(f, "failed to create runtime: {}", err)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Transport(ref err) => Some(err),
            Error::Validation(ref err) => Some(err),
            Error::Runtime(ref err) => Some(err),
            _ => None,
        }
    }
}

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn transport_errors_are_retriable() {
        let err = Error::from(client::Error::RequestTimeout);
        assert!(err.is_retriable());
        assert!(!err.is_validation());
        assert!(err.source().is_some());

        let err = Error::from(ValidationError::Unauthenticated);
        assert!(!err.is_retriable());
        assert!(err.is_validation());
    }
}
