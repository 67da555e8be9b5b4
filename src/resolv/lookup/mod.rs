//! Looking up particular records.
//!
//! The functions in this module send a query through anything implementing
//! [`Resolve`] and extract the records of interest from the answer:
//!
//! * [`lookup_srv`] finds the servers for a service, ordered as described
//!   in RFC 2782,
//! * [`lookup_naptr`] finds the NAPTR records of a domain along with the
//!   SIP transport they are for, and
//! * [`lookup_a`], [`lookup_aaaa`], and [`lookup_addrs`] find the
//!   addresses of a host.
//!
//! Names are always taken as absolute. There is no search list.
//!
//! A DNSSEC validation failure is reported as [`LookupError::Dnssec`] so it
//! cannot be mistaken for the name simply not resolving.

use std::error;
use std::fmt;
use std::str::FromStr;

use crate::base::name::{Dname, NameError};
use crate::base::wire::ParseError;
use crate::base::{Message, MessageBuilder};
use crate::rdata::{answer_data, RecordData};
use crate::resolv::error::Error;
use crate::resolv::resolver::Resolve;
use crate::validator::ValidationError;

pub use self::addr::{lookup_a, lookup_aaaa, lookup_addrs};
pub use self::naptr::{lookup_naptr, NaptrEntry, Transport};
pub use self::srv::lookup_srv;

pub mod addr;
pub mod naptr;
pub mod srv;

//------------ Helpers -------------------------------------------------------

/// Queries `qname` for records of type `T` and returns their data.
///
/// A missing name or missing records result in an empty vec.
async fn query_data<R, T>(resolver: &R, qname: &Dname) -> Result<Vec<T>, LookupError>
where
    R: Resolve + ?Sized,
    T: RecordData,
{
    let query: Message =
        MessageBuilder::new_query(qname, T::RTYPE).into_message()?;
    let answer = resolver.query(query).await?;
    Ok(answer_data(&answer, None)?)
}

fn parse_name(name: &str) -> Result<Dname, LookupError> {
    Dname::from_str(name).map_err(LookupError::Name)
}

//------------ DnssecError ---------------------------------------------------

/// An answer was rejected by DNSSEC validation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DnssecError(ValidationError);

impl DnssecError {
    /// Returns the underlying validation failure.
    pub fn validation_error(&self) -> &ValidationError {
        &self.0
    }
}

impl fmt::Display for DnssecError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DNSSEC validation failed: {}", self.0)
    }
}

impl error::Error for DnssecError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.0)
    }
}

//------------ LookupError ---------------------------------------------------

/// A lookup failed.
#[derive(Clone, Debug)]
pub enum LookupError {
    /// The name to look up is invalid.
    Name(NameError),

    /// The answer contained malformed record data.
    Parse(ParseError),

    /// The answer was rejected by DNSSEC validation.
    Dnssec(DnssecError),

    /// The query failed.
    Resolve(Error),
}

impl From<Error> for LookupError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(err) => LookupError::Dnssec(DnssecError(err)),
            err => LookupError::Resolve(err),
        }
    }
}

impl From<ParseError> for LookupError {
    fn from(err: ParseError) -> Self {
        LookupError::Parse(err)
    }
}

impl From<NameError> for LookupError {
    fn from(err: NameError) -> Self {
        LookupError::Name(err)
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            LookupError::Name(ref err) => write!(f, "invalid name: {}", err),
            LookupError::Parse(ref err) => {
                write!(f, "malformed answer: {}", err)
            }
            LookupError::Dnssec(ref err) => err.fmt(f),
            LookupError::Resolve(ref err) => err.fmt(f),
        }
    }
}

impl error::Error for LookupError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            LookupError::Name(ref err) => Some(err),
            LookupError::Parse(ref err) => Some(err),
            LookupError::Dnssec(ref err) => Some(err),
            LookupError::Resolve(ref err) => Some(err),
        }
    }
}

//============ Testing ======================================================
