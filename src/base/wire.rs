//! Parsing of DNS wire-format data.
//!
//! The [`Parser`] walks over the octets of a complete message. Keeping the
//! whole message around is necessary because domain names may be
//! compressed, i.e., refer back to earlier parts of the message.

use core::fmt;

//------------ Parser --------------------------------------------------------

/// A cursor over the octets of a DNS message.
///
/// The parser always has access to the entire message so compressed names
/// can be followed. Reading is limited to the range between the current
/// position and a limit that can be narrowed temporarily, e.g., to the
/// record data of a single record.
#[derive(Clone, Copy, Debug)]
pub struct Parser<'a> {
    /// The complete message.
    octets: &'a [u8],

    /// The current position.
    pos: usize,

    /// The position reading must not go beyond.
    limit: usize,
}

impl<'a> Parser<'a> {
    /// Creates a parser at the start of the given octets.
    pub fn new(octets: &'a [u8]) -> Self {
        Parser {
            octets,
            pos: 0,
            limit: octets.len(),
        }
    }

    /// Creates a parser for the range `pos..limit` of the message.
    pub fn with_range(
        octets: &'a [u8],
        pos: usize,
        limit: usize,
    ) -> Result<Self, ParseError> {
        if pos > limit || limit > octets.len() {
            return Err(ParseError::ShortInput);
        }
        Ok(Parser { octets, pos, limit })
    }

    /// Returns the complete underlying message.
    pub fn octets(&self) -> &'a [u8] {
        self.octets
    }

    /// Returns the current position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Returns the number of octets left before the limit.
    pub fn remaining(&self) -> usize {
        self.limit - self.pos
    }

    /// Moves the position forward by `len` octets.
    pub fn advance(&mut self, len: usize) -> Result<(), ParseError> {
        if len > self.remaining() {
            return Err(ParseError::ShortInput);
        }
        self.pos += len;
        Ok(())
    }

    /// Takes the next `len` octets.
    pub fn parse_octets(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        let start = self.pos;
        self.advance(len)?;
        Ok(&self.octets[start..self.pos])
    }

    pub fn parse_u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.parse_octets(1)?[0])
    }

    pub fn parse_u16(&mut self) -> Result<u16, ParseError> {
        let octets = self.parse_octets(2)?;
        Ok(u16::from_be_bytes([octets[0], octets[1]]))
    }

    pub fn parse_u32(&mut self) -> Result<u32, ParseError> {
        let octets = self.parse_octets(4)?;
        Ok(u32::from_be_bytes([octets[0], octets[1], octets[2], octets[3]]))
    }

    /// Takes a character string, i.e., a length octet and that many octets.
    pub fn parse_charstr(&mut self) -> Result<&'a [u8], ParseError> {
        let len = self.parse_u8()?;
        self.parse_octets(usize::from(len))
    }

    /// Checks that the parser has reached its limit.
    pub fn check_done(&self) -> Result<(), ParseError> {
        if self.remaining() != 0 {
            Err(ParseError::form_error("trailing data"))
        } else {
            Ok(())
        }
    }
}

//------------ ParseError ----------------------------------------------------

/// An error happened while parsing data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseError {
    /// An attempt was made to go beyond the end of the parser.
    ShortInput,

    /// A formatting error occurred.
    Form(FormError),
}

impl ParseError {
    /// Creates a new parse error as a form error with the given message.
    pub fn form_error(msg: &'static str) -> Self {
        FormError::new(msg).into()
    }
}

//--- From

impl From<FormError> for ParseError {
    fn from(err: FormError) -> Self {
        ParseError::Form(err)
    }
}

//--- Display and Error

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ParseError::ShortInput => f.write_str("unexpected end of input"),
            ParseError::Form(ref err) => err.fmt(f),
        }
    }
}

impl std::error::Error for ParseError {}

//------------ FormError -----------------------------------------------------

/// A formatting error occured.
///
/// This is a generic error for all kinds of error cases that result in data
/// not being accepted. For diagnostics, the error is being given a static
/// string describing the error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FormError(&'static str);

impl FormError {
    /// Creates a new form error value with the given diagnostics string.
    pub fn new(msg: &'static str) -> Self {
        FormError(msg)
    }
}

//--- Display and Error

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for FormError {}

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_ints() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.parse_u8(), Ok(1));
        assert_eq!(parser.parse_u16(), Ok(0x0203));
        assert_eq!(parser.parse_u32(), Ok(0x04050607));
        assert_eq!(parser.parse_u8(), Err(ParseError::ShortInput));
        assert!(parser.check_done().is_ok());
    }

    #[test]
    fn limited_range() {
        let data = [3, b'f', b'o', b'o', 9];
        let mut parser = Parser::with_range(&data, 0, 4).unwrap();
        assert_eq!(parser.parse_charstr(), Ok(&b"foo"[..]));
        assert_eq!(parser.remaining(), 0);
        assert!(Parser::with_range(&data, 3, 9).is_err());
    }
}
