//! Record data.
//!
//! This module contains types for the record data of the record types the
//! lookup helpers care about: A and AAAA from [RFC 1035] and [RFC 3596],
//! SRV from [RFC 2782], and NAPTR from [RFC 3403].
//!
//! All types implement [`RecordData`] which allows parsing them from a
//! record of a [`Message`] and composing their wire format.
//!
//! [RFC 1035]: https://tools.ietf.org/html/rfc1035
//! [RFC 2782]: https://tools.ietf.org/html/rfc2782
//! [RFC 3403]: https://tools.ietf.org/html/rfc3403
//! [RFC 3596]: https://tools.ietf.org/html/rfc3596

use crate::base::iana::Rtype;
use crate::base::message::{Message, ParsedRecord};
use crate::base::name::Dname;
use crate::base::wire::{ParseError, Parser};
use bytes::{BufMut, Bytes, BytesMut};
use std::net::{Ipv4Addr, Ipv6Addr};

//------------ RecordData ----------------------------------------------------

/// A type representing the data of records of one particular type.
pub trait RecordData: Sized {
    /// The record type of this data.
    const RTYPE: Rtype;

    /// Parses the data from a parser limited to the record data.
    fn parse_data(parser: &mut Parser) -> Result<Self, ParseError>;

    /// Appends the wire format of the data to `target`.
    fn compose_data(&self, target: &mut BytesMut);

    /// Parses the data of `record` which must be part of `message`.
    ///
    /// Returns `Ok(None)` if the record is of a different type.
    fn from_record(
        message: &Message,
        record: &ParsedRecord,
    ) -> Result<Option<Self>, ParseError> {
        if record.rtype() != Self::RTYPE {
            return Ok(None);
        }
        let mut parser = message.data_parser(record)?;
        let res = Self::parse_data(&mut parser)?;
        parser.check_done()?;
        Ok(Some(res))
    }

    /// Returns the wire format of the data.
    fn to_bytes(&self) -> Bytes {
        let mut res = BytesMut::new();
        self.compose_data(&mut res);
        res.freeze()
    }
}

/// Returns the data of all records of type `T` in the answer section.
///
/// Only records owned by `qname` are considered unless `qname` is `None`.
pub fn answer_data<T: RecordData>(
    message: &Message,
    qname: Option<&Dname>,
) -> Result<Vec<T>, ParseError> {
    let mut res = Vec::new();
    for record in message.answer() {
        if let Some(qname) = qname {
            if record.owner() != qname {
                continue;
            }
        }
        if let Some(data) = T::from_record(message, record)? {
            res.push(data)
        }
    }
    Ok(res)
}

//------------ A -------------------------------------------------------------

/// A record data.
///
/// A records convey the IPv4 address of a host.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct A {
    addr: Ipv4Addr,
}

impl A {
    pub fn new(addr: Ipv4Addr) -> Self {
        A { addr }
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }
}

impl RecordData for A {
    const RTYPE: Rtype = Rtype::A;

    fn parse_data(parser: &mut Parser) -> Result<Self, ParseError> {
        let octets = parser.parse_octets(4)?;
        Ok(A::new(Ipv4Addr::new(
            octets[0], octets[1], octets[2], octets[3],
        )))
    }

    fn compose_data(&self, target: &mut BytesMut) {
        target.put_slice(&self.addr.octets())
    }
}

//------------ Aaaa ----------------------------------------------------------

/// AAAA record data.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Aaaa {
    addr: Ipv6Addr,
}

impl Aaaa {
    pub fn new(addr: Ipv6Addr) -> Self {
        Aaaa { addr }
    }

    pub fn addr(&self) -> Ipv6Addr {
        self.addr
    }
}

impl RecordData for Aaaa {
    const RTYPE: Rtype = Rtype::AAAA;

    fn parse_data(parser: &mut Parser) -> Result<Self, ParseError> {
        let mut buf = [0u8; 16];
        buf.copy_from_slice(parser.parse_octets(16)?);
        Ok(Aaaa::new(Ipv6Addr::from(buf)))
    }

    fn compose_data(&self, target: &mut BytesMut) {
        target.put_slice(&self.addr.octets())
    }
}

//------------ Srv -----------------------------------------------------------

/// SRV record data.
///
/// The target name may be compressed in a received message.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Srv {
    priority: u16,
    weight: u16,
    port: u16,
    target: Dname,
}

impl Srv {
    pub fn new(priority: u16, weight: u16, port: u16, target: Dname) -> Self {
        Srv {
            priority,
            weight,
            port,
            target,
        }
    }

    pub fn priority(&self) -> u16 {
        self.priority
    }

    pub fn weight(&self) -> u16 {
        self.weight
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn target(&self) -> &Dname {
        &self.target
    }

    pub fn into_target(self) -> Dname {
        self.target
    }
}

impl RecordData for Srv {
    const RTYPE: Rtype = Rtype::SRV;

    fn parse_data(parser: &mut Parser) -> Result<Self, ParseError> {
        Ok(Srv::new(
            parser.parse_u16()?,
            parser.parse_u16()?,
            parser.parse_u16()?,
            Dname::parse(parser)?,
        ))
    }

    fn compose_data(&self, target: &mut BytesMut) {
        target.put_u16(self.priority);
        target.put_u16(self.weight);
        target.put_u16(self.port);
        self.target.compose(target);
    }
}

//------------ Naptr ---------------------------------------------------------

/// NAPTR record data.
///
/// The flags, services, and regexp fields are character strings. The
/// replacement is a domain name which, unlike all other names in this
/// module, must not be compressed but is parsed leniently anyway.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Naptr {
    order: u16,
    preference: u16,
    flags: Bytes,
    services: Bytes,
    regexp: Bytes,
    replacement: Dname,
}

impl Naptr {
    pub fn new(
        order: u16,
        preference: u16,
        flags: Bytes,
        services: Bytes,
        regexp: Bytes,
        replacement: Dname,
    ) -> Self {
        Naptr {
            order,
            preference,
            flags,
            services,
            regexp,
            replacement,
        }
    }

    pub fn order(&self) -> u16 {
        self.order
    }

    pub fn preference(&self) -> u16 {
        self.preference
    }

    pub fn flags(&self) -> &[u8] {
        self.flags.as_ref()
    }

    pub fn services(&self) -> &[u8] {
        self.services.as_ref()
    }

    pub fn regexp(&self) -> &[u8] {
        self.regexp.as_ref()
    }

    pub fn replacement(&self) -> &Dname {
        &self.replacement
    }
}

impl RecordData for Naptr {
    const RTYPE: Rtype = Rtype::NAPTR;

    fn parse_data(parser: &mut Parser) -> Result<Self, ParseError> {
        Ok(Naptr::new(
            parser.parse_u16()?,
            parser.parse_u16()?,
            Bytes::copy_from_slice(parser.parse_charstr()?),
            Bytes::copy_from_slice(parser.parse_charstr()?),
            Bytes::copy_from_slice(parser.parse_charstr()?),
            Dname::parse(parser)?,
        ))
    }

    fn compose_data(&self, target: &mut BytesMut) {
        target.put_u16(self.order);
        target.put_u16(self.preference);
        for charstr in [&self.flags, &self.services, &self.regexp] {
            // Character strings are limited to 255 octets.
            let len = charstr.len().min(255);
            target.put_u8(len as u8);
            target.put_slice(&charstr[..len]);
        }
        self.replacement.compose(target);
    }
}

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::iana::{Class, Rcode};
    use crate::base::message_builder::{MessageBuilder, Section};
    use core::str::FromStr;

    fn name(s: &str) -> Dname {
        Dname::from_str(s).unwrap()
    }

    #[test]
    fn answer_data_filters() {
        let qname = name("_sip._udp.example.com");
        let query = MessageBuilder::new_query(&qname, Rtype::SRV)
            .into_message()
            .unwrap();
        let srv = Srv::new(10, 60, 5060, name("sip1.example.com"));
        let naptr = Naptr::new(
            100,
            10,
            Bytes::from_static(b"S"),
            Bytes::from_static(b"SIP+D2U"),
            Bytes::new(),
            name("_sip._udp.example.com"),
        );
        let mut answer = MessageBuilder::start_answer(&query, Rcode::NOERROR);
        for (owner, rtype, data) in [
            (&qname, Rtype::SRV, srv.to_bytes()),
            (&qname, Rtype::NAPTR, naptr.to_bytes()),
            (&name("other.example.com"), Rtype::SRV, srv.to_bytes()),
        ] {
            answer
                .push_record(Section::Answer, owner, rtype, Class::IN, 60, &data)
                .unwrap();
        }
        let answer = answer.into_message().unwrap();

        let all: Vec<Srv> = answer_data(&answer, None).unwrap();
        assert_eq!(all.len(), 2);
        let owned: Vec<Srv> = answer_data(&answer, Some(&qname)).unwrap();
        assert_eq!(owned, vec![srv]);
        let naptrs: Vec<Naptr> = answer_data(&answer, Some(&qname)).unwrap();
        assert_eq!(naptrs, vec![naptr]);
    }

    #[test]
    fn short_address() {
        let qname = name("example.com");
        let query = MessageBuilder::new_query(&qname, Rtype::A)
            .into_message()
            .unwrap();
        let mut answer = MessageBuilder::start_answer(&query, Rcode::NOERROR);
        answer
            .push_record(Section::Answer, &qname, Rtype::A, Class::IN, 60, &[1, 2])
            .unwrap();
        let answer = answer.into_message().unwrap();
        assert!(answer_data::<A>(&answer, None).is_err());
        assert!(answer_data::<Aaaa>(&answer, None).unwrap().is_empty());
    }
}
