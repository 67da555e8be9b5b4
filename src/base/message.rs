//! Accessing existing DNS messages.
//!
//! This module defines the [`Message`] type which wraps the octets of a
//! complete DNS message. When created, all sections of the message are
//! walked once so that later access to questions and records cannot fail
//! anymore.

use super::header::{Header, HeaderCounts};
use super::iana::{Class, Rcode, Rtype};
use super::name::Dname;
use super::opt::Edns;
use super::wire::{ParseError, Parser};
use bytes::Bytes;
use core::fmt;

//------------ Message -------------------------------------------------------

/// A DNS message.
///
/// The message keeps its octets as a [`Bytes`] value so it can be cloned
/// cheaply and handed to multiple tasks at once.
#[derive(Clone)]
pub struct Message {
    /// The complete message in wire format.
    octets: Bytes,

    /// The entries of the question section.
    questions: Vec<Question>,

    /// The records of the answer, authority, and additional sections.
    sections: [Vec<ParsedRecord>; 3],
}

impl Message {
    /// The length of the complete header section.
    pub const HEADER_LEN: usize = Header::LEN + HeaderCounts::LEN;

    /// Creates a message from its wire-format octets.
    ///
    /// All sections are parsed eagerly. Data after the last record of the
    /// additional section is an error.
    pub fn from_octets(octets: Bytes) -> Result<Self, ParseError> {
        if octets.len() < Self::HEADER_LEN {
            return Err(ParseError::ShortInput);
        }
        let counts = HeaderCounts::from_message_slice(&octets);
        let mut parser = Parser::new(octets.as_ref());
        parser.advance(Self::HEADER_LEN)?;

        let mut questions = Vec::with_capacity(usize::from(counts.qdcount()));
        for _ in 0..counts.qdcount() {
            questions.push(Question::parse(&mut parser)?);
        }
        let mut sections: [Vec<ParsedRecord>; 3] = Default::default();
        for (idx, section) in sections.iter_mut().enumerate() {
            let count = counts.get(idx + 1);
            section.reserve(usize::from(count));
            for _ in 0..count {
                section.push(ParsedRecord::parse(&mut parser)?);
            }
        }
        parser.check_done()?;
        Ok(Message {
            octets,
            questions,
            sections,
        })
    }

    /// Returns the message header.
    pub fn header(&self) -> Header {
        Header::from_message_slice(&self.octets)
    }

    /// Returns the header counts.
    pub fn header_counts(&self) -> HeaderCounts {
        HeaderCounts::from_message_slice(&self.octets)
    }

    /// Returns the response code of the message.
    pub fn rcode(&self) -> Rcode {
        self.header().rcode()
    }

    /// Returns the message’s octets.
    pub fn as_slice(&self) -> &[u8] {
        self.octets.as_ref()
    }

    /// Returns a reference to the octets.
    pub fn as_octets(&self) -> &Bytes {
        &self.octets
    }

    /// Converts the message into its octets.
    pub fn into_octets(self) -> Bytes {
        self.octets
    }

    /// Returns the entries of the question section.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Returns the first question, if there is one.
    pub fn first_question(&self) -> Option<&Question> {
        self.questions.first()
    }

    /// Returns the records of the answer section.
    pub fn answer(&self) -> &[ParsedRecord] {
        &self.sections[0]
    }

    /// Returns the records of the authority section.
    pub fn authority(&self) -> &[ParsedRecord] {
        &self.sections[1]
    }

    /// Returns the records of the additional section.
    pub fn additional(&self) -> &[ParsedRecord] {
        &self.sections[2]
    }

    /// Returns an iterator over all records in the three record sections.
    pub fn records(&self) -> impl Iterator<Item = &ParsedRecord> {
        self.sections.iter().flatten()
    }

    /// Returns whether the message contains any actual data records.
    ///
    /// The pseudo-records OPT and TSIG are not considered data.
    pub fn has_data_records(&self) -> bool {
        self.records().any(|record| !record.rtype().is_pseudo())
    }

    /// Returns the EDNS information of the OPT record if there is one.
    pub fn opt(&self) -> Option<Result<Edns, ParseError>> {
        self.additional()
            .iter()
            .find(|record| record.rtype() == Rtype::OPT)
            .map(|record| Edns::parse(self, record))
    }

    /// Returns whether `self` is a response to `query`.
    ///
    /// This requires the QR bit to be set, the IDs to match, and the
    /// question sections to be identical.
    pub fn is_answer(&self, query: &Message) -> bool {
        let header = self.header();
        header.qr()
            && header.id() == query.header().id()
            && self.questions == query.questions
    }

    /// Returns a parser for the record data of `record`.
    pub fn data_parser(
        &self,
        record: &ParsedRecord,
    ) -> Result<Parser<'_>, ParseError> {
        Parser::with_range(
            self.as_slice(),
            record.data_start,
            record.data_start + record.data_len,
        )
    }
}

//--- Debug

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let header = self.header();
        let mut s = f.debug_struct("Message");
        s.field("id", &header.id())
            .field("qr", &header.qr())
            .field("rcode", &header.rcode());
        if let Some(question) = self.first_question() {
            s.field("question", question);
        }
        s.field("answer", &self.answer().len())
            .field("authority", &self.authority().len())
            .field("additional", &self.additional().len())
            .finish()
    }
}

//------------ Question ------------------------------------------------------

/// An entry of the question section.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Question {
    qname: Dname,
    qtype: Rtype,
    qclass: Class,
}

impl Question {
    /// Creates a new question from its three components.
    pub fn new(qname: Dname, qtype: Rtype, qclass: Class) -> Self {
        Question {
            qname,
            qtype,
            qclass,
        }
    }

    /// Creates a new question of class IN.
    pub fn new_in(qname: Dname, qtype: Rtype) -> Self {
        Self::new(qname, qtype, Class::IN)
    }

    pub fn qname(&self) -> &Dname {
        &self.qname
    }

    pub fn qtype(&self) -> Rtype {
        self.qtype
    }

    pub fn qclass(&self) -> Class {
        self.qclass
    }

    fn parse(parser: &mut Parser) -> Result<Self, ParseError> {
        Ok(Question {
            qname: Dname::parse(parser)?,
            qtype: parser.parse_u16()?.into(),
            qclass: parser.parse_u16()?.into(),
        })
    }
}

//--- Display

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.qname, self.qclass, self.qtype)
    }
}

//------------ ParsedRecord --------------------------------------------------

/// A record as it appears in a message.
///
/// The record data isn’t interpreted. Instead, its position in the message
/// is kept so it can later be parsed by one of the types in
/// [rdata][crate::rdata] via [`Message::data_parser`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedRecord {
    owner: Dname,
    rtype: Rtype,
    class: Class,
    ttl: u32,

    /// The position of the owner name in the message.
    start: usize,

    /// The position of the record data in the message.
    data_start: usize,

    /// The length of the record data.
    data_len: usize,
}

impl ParsedRecord {
    pub fn owner(&self) -> &Dname {
        &self.owner
    }

    pub fn rtype(&self) -> Rtype {
        self.rtype
    }

    pub fn class(&self) -> Class {
        self.class
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Returns the position in the message where the record starts.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Returns the position in the message right after the record.
    pub fn end(&self) -> usize {
        self.data_start + self.data_len
    }

    /// Returns the raw record data.
    pub fn data<'a>(&self, message: &'a Message) -> &'a [u8] {
        &message.as_slice()[self.data_start..self.end()]
    }

    fn parse(parser: &mut Parser) -> Result<Self, ParseError> {
        let start = parser.pos();
        let owner = Dname::parse(parser)?;
        let rtype = parser.parse_u16()?.into();
        let class = parser.parse_u16()?.into();
        let ttl = parser.parse_u32()?;
        let data_len = usize::from(parser.parse_u16()?);
        let data_start = parser.pos();
        parser.advance(data_len)?;
        Ok(ParsedRecord {
            owner,
            rtype,
            class,
            ttl,
            start,
            data_start,
            data_len,
        })
    }
}

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::message_builder::{MessageBuilder, Section};
    use core::str::FromStr;

    fn name(s: &str) -> Dname {
        Dname::from_str(s).unwrap()
    }

    #[test]
    fn short_message() {
        assert_eq!(
            Message::from_octets(Bytes::from_static(b"\0\0\0")).unwrap_err(),
            ParseError::ShortInput
        );
    }

    #[test]
    fn trailing_data() {
        let mut octets = MessageBuilder::new_query(&name("a.example"), Rtype::A)
            .into_message()
            .unwrap()
            .into_octets()
            .to_vec();
        octets.push(0);
        assert!(Message::from_octets(octets.into()).is_err());
    }

    #[test]
    fn sections_and_answer_matching() {
        let query = MessageBuilder::new_query(&name("a.example"), Rtype::A)
            .into_message()
            .unwrap();
        let mut answer = MessageBuilder::start_answer(&query, Rcode::NOERROR);
        answer
            .push_record(
                Section::Answer,
                &name("a.example"),
                Rtype::A,
                Class::IN,
                300,
                &[192, 0, 2, 1],
            )
            .unwrap();
        answer
            .push_record(
                Section::Additional,
                &Dname::root(),
                Rtype::OPT,
                Class::from_int(1232),
                0,
                b"",
            )
            .unwrap();
        let answer = answer.into_message().unwrap();

        assert!(answer.is_answer(&query));
        assert!(!query.is_answer(&query));
        assert_eq!(answer.answer().len(), 1);
        assert_eq!(answer.additional().len(), 1);
        assert_eq!(answer.answer()[0].data(&answer), &[192, 0, 2, 1]);
        assert!(answer.has_data_records());
        assert_eq!(answer.opt().unwrap().unwrap().udp_payload_size(), 1232);

        let empty = MessageBuilder::start_answer(&query, Rcode::NOERROR)
            .into_message()
            .unwrap();
        assert!(!empty.has_data_records());
        assert_eq!(empty.first_question().unwrap().qtype(), Rtype::A);
    }
}
