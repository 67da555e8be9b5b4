//! Looking up NAPTR records for SIP.

use std::cmp::Ordering;
use std::fmt;

use tracing::trace;

use super::{parse_name, query_data, LookupError};
use crate::base::name::Dname;
use crate::rdata::Naptr;
use crate::resolv::resolver::Resolve;

//------------ Transport -----------------------------------------------------

/// The transport protocol a NAPTR record points to.
///
/// The variants are ordered by preference, most preferred first.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Transport {
    Tls,
    Tcp,
    Udp,
}

impl Transport {
    /// Returns the transport for a NAPTR services field.
    ///
    /// Only the SIP services of RFC 3263 are recognized.
    pub fn from_service(service: &[u8]) -> Option<Self> {
        if service.eq_ignore_ascii_case(b"SIP+D2U") {
            Some(Transport::Udp)
        } else if service.eq_ignore_ascii_case(b"SIP+D2T") {
            Some(Transport::Tcp)
        } else if service.eq_ignore_ascii_case(b"SIPS+D2T") {
            Some(Transport::Tls)
        } else {
            None
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Transport::Tls => "TLS",
            Transport::Tcp => "TCP",
            Transport::Udp => "UDP",
        })
    }
}

//------------ NaptrEntry ----------------------------------------------------

/// A NAPTR record found by [`lookup_naptr`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NaptrEntry {
    order: u16,
    preference: u16,
    transport: Option<Transport>,
    replacement: Dname,
}

impl NaptrEntry {
    fn from_naptr(naptr: &Naptr) -> Self {
        NaptrEntry {
            order: naptr.order(),
            preference: naptr.preference(),
            transport: Transport::from_service(naptr.services()),
            replacement: naptr.replacement().clone(),
        }
    }

    pub fn order(&self) -> u16 {
        self.order
    }

    pub fn preference(&self) -> u16 {
        self.preference
    }

    /// Returns the transport or `None` for services other than SIP’s.
    pub fn transport(&self) -> Option<Transport> {
        self.transport
    }

    /// Returns the name to continue with, usually an SRV name.
    pub fn replacement(&self) -> &Dname {
        &self.replacement
    }

    /// Compares entries by order, preference, and transport.
    ///
    /// Entries with an unknown transport sort after all others.
    fn cmp_priority(&self, other: &Self) -> Ordering {
        self.order
            .cmp(&other.order)
            .then(self.preference.cmp(&other.preference))
            .then_with(|| match (self.transport, other.transport) {
                (Some(left), Some(right)) => left.cmp(&right),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    }
}

//------------ lookup_naptr --------------------------------------------------

/// Looks up the NAPTR records of `domain`.
///
/// The entries are sorted by order and preference, lowest first, and then
/// by transport: TLS before TCP before UDP.
pub async fn lookup_naptr<R: Resolve + ?Sized>(
    resolver: &R,
    domain: &str,
) -> Result<Vec<NaptrEntry>, LookupError> {
    let name = parse_name(domain)?;
    let records = query_data::<_, Naptr>(resolver, &name).await?;
    let mut res: Vec<_> = records.iter().map(NaptrEntry::from_naptr).collect();
    res.sort_by(NaptrEntry::cmp_priority);
    trace!(%name, entries = ?res, "NAPTR lookup done");
    Ok(res)
}

//============ Testing ======================================================
