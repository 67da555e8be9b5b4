//! Record data for OPT records.
//!
//! OPT records are meta records used by EDNS to convey additional data about
//! clients, servers, and the query being performed. Because these records
//! are fundamental for modern DNS operations, they are here instead of in
//! the `rdata` module.
//!
//! The OPT record abuses the class field for the UDP payload size and the
//! TTL field for the extended response code, the EDNS version, and a set of
//! flags. See [RFC 6891] for all the details.
//!
//! [RFC 6891]: https://tools.ietf.org/html/rfc6891

use super::iana::{Class, Rtype};
use super::message::{Message, ParsedRecord};
use super::message_builder::{MessageBuilder, PushError, Section};
use super::name::Dname;
use super::wire::ParseError;
use bytes::{BufMut, Bytes, BytesMut};

//------------ Edns ----------------------------------------------------------

/// The content of an OPT record.
///
/// The same type is used both for the EDNS parameters a resolver is
/// configured with and for those found in a received message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Edns {
    /// The largest UDP payload the sender can reassemble.
    udp_payload_size: u16,

    /// The upper eight bits of the extended response code.
    ext_rcode: u8,

    /// The EDNS version.
    version: u8,

    /// The EDNS flags.
    flags: u16,

    /// The options.
    options: Vec<EdnsOption>,
}

impl Edns {
    /// The DO bit signalling that DNSSEC records are wanted.
    pub const DNSSEC_OK: u16 = 0x8000;

    /// Creates EDNS version 0 parameters with the given payload size.
    pub fn new(udp_payload_size: u16) -> Self {
        Edns {
            udp_payload_size,
            ext_rcode: 0,
            version: 0,
            flags: 0,
            options: Vec::new(),
        }
    }

    pub fn udp_payload_size(&self) -> u16 {
        self.udp_payload_size
    }

    pub fn set_udp_payload_size(&mut self, value: u16) {
        self.udp_payload_size = value
    }

    pub fn ext_rcode(&self) -> u8 {
        self.ext_rcode
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn set_version(&mut self, version: u8) {
        self.version = version
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn set_flags(&mut self, flags: u16) {
        self.flags = flags
    }

    /// Returns whether the DO bit is set.
    pub fn dnssec_ok(&self) -> bool {
        self.flags & Self::DNSSEC_OK != 0
    }

    /// Sets or clears the DO bit.
    pub fn set_dnssec_ok(&mut self, value: bool) {
        if value {
            self.flags |= Self::DNSSEC_OK
        } else {
            self.flags &= !Self::DNSSEC_OK
        }
    }

    pub fn options(&self) -> &[EdnsOption] {
        &self.options
    }

    /// Adds an option.
    pub fn push_option(&mut self, option: EdnsOption) {
        self.options.push(option)
    }

    /// Parses the OPT record `record` of `message`.
    pub fn parse(
        message: &Message,
        record: &ParsedRecord,
    ) -> Result<Self, ParseError> {
        if record.rtype() != Rtype::OPT {
            return Err(ParseError::form_error("not an OPT record"));
        }
        let ttl = record.ttl();
        let mut parser = message.data_parser(record)?;
        let mut options = Vec::new();
        while parser.remaining() > 0 {
            let code = parser.parse_u16()?;
            let len = parser.parse_u16()?;
            let data = parser.parse_octets(usize::from(len))?;
            options.push(EdnsOption::new(code, Bytes::copy_from_slice(data)));
        }
        Ok(Edns {
            udp_payload_size: record.class().to_int(),
            ext_rcode: (ttl >> 24) as u8,
            version: (ttl >> 16) as u8,
            flags: ttl as u16,
            options,
        })
    }

    /// Appends an OPT record with these parameters to the builder.
    pub fn push(&self, builder: &mut MessageBuilder) -> Result<(), PushError> {
        let mut data = BytesMut::new();
        for option in &self.options {
            let len = u16::try_from(option.data.len())
                .map_err(|_| PushError::ShortBuf)?;
            data.put_u16(option.code);
            data.put_u16(len);
            data.put_slice(&option.data);
        }
        let ttl = u32::from(self.ext_rcode) << 24
            | u32::from(self.version) << 16
            | u32::from(self.flags);
        builder.push_record(
            Section::Additional,
            &Dname::root(),
            Rtype::OPT,
            Class::from_int(self.udp_payload_size),
            ttl,
            &data,
        )
    }
}

impl Default for Edns {
    fn default() -> Self {
        Self::new(1232)
    }
}

//------------ EdnsOption ----------------------------------------------------

/// A single EDNS option.
///
/// Options are kept opaque: a code and the option data.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EdnsOption {
    code: u16,
    data: Bytes,
}

impl EdnsOption {
    pub fn new(code: u16, data: Bytes) -> Self {
        EdnsOption { code, data }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }
}

//============ Testing ======================================================
