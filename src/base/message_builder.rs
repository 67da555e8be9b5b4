//! Building a new DNS message.
//!
//! A [`MessageBuilder`] assembles a message section by section. Records can
//! only be added to the current section or to a later one, since going back
//! would require moving everything that follows. Names are never
//! compressed.
//!
//! A builder can also be created from an existing message. It then starts
//! out in the additional section which is what is needed for adding OPT and
//! TSIG records to a query before sending it.

use super::header::{Header, HeaderCounts};
use super::iana::{Class, Rcode, Rtype};
use super::message::Message;
use super::name::Dname;
use super::wire::ParseError;
use bytes::{BufMut, BytesMut};
use core::fmt;

//------------ Section -------------------------------------------------------

/// The sections of a message.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum Section {
    Question,
    Answer,
    Authority,
    Additional,
}

impl Section {
    fn index(self) -> usize {
        self as usize
    }
}

//------------ MessageBuilder ------------------------------------------------

/// Builds a message.
#[derive(Clone, Debug)]
pub struct MessageBuilder {
    header: Header,
    counts: HeaderCounts,

    /// Everything after the header section.
    body: BytesMut,

    /// The section records are currently added to.
    section: Section,
}

impl MessageBuilder {
    /// Creates a builder for an empty message with an all-zero header.
    pub fn new() -> Self {
        MessageBuilder {
            header: Header::new(),
            counts: HeaderCounts::default(),
            body: BytesMut::with_capacity(512),
            section: Section::Question,
        }
    }

    /// Creates a builder for a recursive query of class IN.
    ///
    /// The message gets a random ID and the RD bit set.
    pub fn new_query(qname: &Dname, qtype: Rtype) -> Self {
        let mut res = Self::new();
        res.header.set_random_id();
        res.header.set_rd(true);
        res.push_question(qname, qtype, Class::IN);
        res
    }

    /// Starts an answer to `query`.
    ///
    /// The ID, the RD bit, and the question section are copied from the
    /// query. The QR bit is set and the response code is `rcode`.
    pub fn start_answer(query: &Message, rcode: Rcode) -> Self {
        let mut res = Self::new();
        let query_header = query.header();
        res.header.set_id(query_header.id());
        res.header.set_rd(query_header.rd());
        res.header.set_qr(true);
        res.header.set_rcode(rcode);
        for question in query.questions() {
            res.push_question(
                question.qname(),
                question.qtype(),
                question.qclass(),
            );
        }
        res
    }

    /// Creates a builder that appends to the additional section of `msg`.
    pub fn from_message(msg: &Message) -> Self {
        MessageBuilder {
            header: msg.header(),
            counts: msg.header_counts(),
            body: BytesMut::from(&msg.as_slice()[Message::HEADER_LEN..]),
            section: Section::Additional,
        }
    }

    /// Returns the header of the message.
    pub fn header(&self) -> Header {
        self.header
    }

    /// Returns a mutable reference to the header.
    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// Returns the current header counts.
    pub fn counts(&self) -> HeaderCounts {
        self.counts
    }

    /// Appends a question.
    ///
    /// # Panics
    ///
    /// Panics if records have been added already.
    pub fn push_question(&mut self, qname: &Dname, qtype: Rtype, qclass: Class) {
        assert_eq!(self.section, Section::Question);
        qname.compose(&mut self.body);
        self.body.put_u16(qtype.to_int());
        self.body.put_u16(qclass.to_int());
        self.counts.set_qdcount(self.counts.qdcount() + 1);
    }

    /// Appends a record with the given data to `section`.
    pub fn push_record(
        &mut self,
        section: Section,
        owner: &Dname,
        rtype: Rtype,
        class: Class,
        ttl: u32,
        data: &[u8],
    ) -> Result<(), PushError> {
        if section == Section::Question || section < self.section {
            return Err(PushError::SectionOrder);
        }
        let data_len =
            u16::try_from(data.len()).map_err(|_| PushError::ShortBuf)?;
        let count = self.counts.get(section.index());
        if count == u16::MAX {
            return Err(PushError::ShortBuf);
        }
        if Message::HEADER_LEN + self.body.len() + owner.len() + 10 + data.len()
            > usize::from(u16::MAX)
        {
            return Err(PushError::ShortBuf);
        }
        owner.compose(&mut self.body);
        self.body.put_u16(rtype.to_int());
        self.body.put_u16(class.to_int());
        self.body.put_u32(ttl);
        self.body.put_u16(data_len);
        self.body.put_slice(data);
        self.counts.set(section.index(), count + 1);
        self.section = section;
        Ok(())
    }

    /// Returns the wire format of the message built so far.
    pub fn finish(&self) -> BytesMut {
        let mut res =
            BytesMut::with_capacity(Message::HEADER_LEN + self.body.len());
        res.put_slice(self.header.as_slice());
        res.put_slice(self.counts.as_slice());
        res.put_slice(&self.body);
        res
    }

    /// Converts the builder into a message.
    pub fn into_message(self) -> Result<Message, ParseError> {
        Message::from_octets(self.finish().freeze())
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//------------ PushError -----------------------------------------------------

/// An error happened while adding data to a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PushError {
    /// The message would exceed 65535 octets or a section count overflowed.
    ShortBuf,

    /// A record was pushed to a section before the current one.
    SectionOrder,
}

//--- Display and Error

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PushError::ShortBuf => f.write_str("message too large"),
            PushError::SectionOrder => {
                f.write_str("record pushed to earlier section")
            }
        }
    }
}

impl std::error::Error for PushError {}

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;
    use core::str::FromStr;

    #[test]
    fn query_layout() {
        let name = Dname::from_str("example.com").unwrap();
        let msg = MessageBuilder::new_query(&name, Rtype::NAPTR).finish();
        assert_eq!(&msg[2..12], b"\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00");
        assert_eq!(&msg[12..], b"\x07example\x03com\x00\x00\x23\x00\x01");
    }

    #[test]
    fn section_order() {
        let name = Dname::from_str("example.com").unwrap();
        let mut builder = MessageBuilder::new_query(&name, Rtype::A);
        builder
            .push_record(Section::Authority, &name, Rtype::NS, Class::IN, 0, b"")
            .unwrap();
        assert_eq!(
            builder.push_record(
                Section::Answer,
                &name,
                Rtype::A,
                Class::IN,
                0,
                &[0; 4]
            ),
            Err(PushError::SectionOrder)
        );
    }

    #[test]
    fn append_to_existing() {
        let name = Dname::from_str("example.com").unwrap();
        let query = MessageBuilder::new_query(&name, Rtype::A)
            .into_message()
            .unwrap();
        let mut builder = MessageBuilder::from_message(&query);
        builder.header_mut().set_ad(true);
        builder
            .push_record(
                Section::Additional,
                &Dname::root(),
                Rtype::OPT,
                Class::from_int(1232),
                0,
                b"",
            )
            .unwrap();
        let msg = builder.into_message().unwrap();
        assert_eq!(msg.header().id(), query.header().id());
        assert!(msg.header().ad());
        assert_eq!(msg.header_counts().arcount(), 1);
        assert_eq!(msg.questions(), query.questions());
    }
}
