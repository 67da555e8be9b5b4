//! Domain names.
//!
//! The resolver only ever needs absolute names in their uncompressed wire
//! format, so there is a single type for them, [`Dname`]. Names can be
//! created from their textual representation via `FromStr` or parsed from
//! a message, in which case compression pointers are resolved.
//!
//! Comparison of names ignores ASCII case as required by [RFC 4343].
//!
//! [RFC 4343]: https://tools.ietf.org/html/rfc4343

use super::wire::{ParseError, Parser};
use bytes::{BufMut, Bytes, BytesMut};
use core::hash::{Hash, Hasher};
use core::{fmt, str};

//------------ Dname ---------------------------------------------------------

/// An absolute domain name in uncompressed wire format.
///
/// The underlying octets always consist of a sequence of labels, each
/// preceeded by a length octet, terminated by the empty root label.
#[derive(Clone)]
pub struct Dname {
    octets: Bytes,
}

impl Dname {
    /// The maximum length of a label.
    pub const MAX_LABEL_LEN: usize = 63;

    /// The maximum length of a name in wire format.
    pub const MAX_LEN: usize = 255;

    /// The maximum number of compression pointers followed while parsing.
    const MAX_POINTERS: usize = 64;

    /// Returns the root name.
    pub fn root() -> Self {
        Dname {
            octets: Bytes::from_static(b"\0"),
        }
    }

    /// Creates a name from wire-format octets, checking them.
    pub fn from_octets(octets: Bytes) -> Result<Self, NameError> {
        let mut pos = 0;
        loop {
            let len = match octets.get(pos) {
                Some(len) => usize::from(*len),
                None => return Err(NameError::ShortInput),
            };
            if len > Self::MAX_LABEL_LEN {
                return Err(NameError::LongLabel);
            }
            pos += len + 1;
            if pos > Self::MAX_LEN {
                return Err(NameError::LongName);
            }
            if len == 0 {
                break;
            }
        }
        if pos != octets.len() {
            return Err(NameError::TrailingData);
        }
        Ok(Dname { octets })
    }

    /// Returns the wire-format octets of the name.
    pub fn as_slice(&self) -> &[u8] {
        self.octets.as_ref()
    }

    /// Returns the length of the name in wire format.
    pub fn len(&self) -> usize {
        self.octets.len()
    }

    /// Returns whether this is the root name.
    pub fn is_root(&self) -> bool {
        self.octets.len() == 1
    }

    /// Returns an iterator over the labels of the name.
    ///
    /// The final, empty root label is not included.
    pub fn labels(&self) -> LabelIter<'_> {
        LabelIter {
            octets: self.as_slice(),
        }
    }

    /// Returns a new name with `label` prepended to this name.
    pub fn prepend(&self, label: &[u8]) -> Result<Self, NameError> {
        if label.is_empty() {
            return Err(NameError::EmptyLabel);
        }
        if label.len() > Self::MAX_LABEL_LEN {
            return Err(NameError::LongLabel);
        }
        if self.len() + label.len() + 1 > Self::MAX_LEN {
            return Err(NameError::LongName);
        }
        let mut res = BytesMut::with_capacity(self.len() + label.len() + 1);
        res.put_u8(label.len() as u8);
        res.put_slice(label);
        res.put_slice(self.as_slice());
        Ok(Dname {
            octets: res.freeze(),
        })
    }

    /// Appends the wire format of the name to `target`.
    pub fn compose(&self, target: &mut BytesMut) {
        target.put_slice(self.as_slice())
    }

    /// Parses a possibly compressed name.
    ///
    /// The parser is left right behind the name as it appears in the
    /// message, i.e., behind the first compression pointer if there is one.
    pub fn parse(parser: &mut Parser) -> Result<Self, ParseError> {
        let message = parser.octets();
        let mut res = BytesMut::with_capacity(32);
        let mut pos = parser.pos();
        let mut end = None;
        let mut pointers = 0;
        loop {
            let len = *message.get(pos).ok_or(ParseError::ShortInput)?;
            match len & 0xC0 {
                0x00 => {
                    let len = usize::from(len);
                    let label = message
                        .get(pos + 1..pos + 1 + len)
                        .ok_or(ParseError::ShortInput)?;
                    if res.len() + len + 1 > Self::MAX_LEN {
                        return Err(ParseError::form_error("long domain name"));
                    }
                    res.put_u8(len as u8);
                    res.put_slice(label);
                    pos += len + 1;
                    if len == 0 {
                        break;
                    }
                }
                0xC0 => {
                    let low = *message.get(pos + 1).ok_or(ParseError::ShortInput)?;
                    if end.is_none() {
                        end = Some(pos + 2);
                    }
                    pointers += 1;
                    if pointers > Self::MAX_POINTERS {
                        return Err(ParseError::form_error(
                            "too many compression pointers",
                        ));
                    }
                    pos = (usize::from(len & 0x3F) << 8) | usize::from(low);
                }
                _ => {
                    return Err(ParseError::form_error("invalid label type"))
                }
            }
        }
        let end = end.unwrap_or(pos);
        parser.advance(end - parser.pos())?;
        Ok(Dname {
            octets: res.freeze(),
        })
    }

    /// Skips over a possibly compressed name.
    pub fn skip(parser: &mut Parser) -> Result<(), ParseError> {
        loop {
            let len = parser.parse_u8()?;
            match len & 0xC0 {
                0x00 if len == 0 => return Ok(()),
                0x00 => parser.advance(usize::from(len))?,
                0xC0 => return parser.advance(1),
                _ => return Err(ParseError::form_error("invalid label type")),
            }
        }
    }
}

//--- FromStr

impl str::FromStr for Dname {
    type Err = NameError;

    /// Creates a name from its presentation format.
    ///
    /// The trailing dot is optional. Backslash escapes of single
    /// characters and of three digit decimal values are supported.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "." {
            return Ok(Self::root());
        }
        let s = s.strip_suffix('.').unwrap_or(s);
        if s.is_empty() {
            return Err(NameError::EmptyLabel);
        }
        let mut res = BytesMut::with_capacity(s.len() + 2);
        let mut label = Vec::with_capacity(Self::MAX_LABEL_LEN);
        let mut chars = s.bytes();
        while let Some(ch) = chars.next() {
            match ch {
                b'.' => {
                    push_label(&mut res, &label)?;
                    label.clear();
                }
                b'\\' => {
                    let first = chars.next().ok_or(NameError::InvalidEscape)?;
                    if first.is_ascii_digit() {
                        let second =
                            chars.next().ok_or(NameError::InvalidEscape)?;
                        let third =
                            chars.next().ok_or(NameError::InvalidEscape)?;
                        if !second.is_ascii_digit() || !third.is_ascii_digit()
                        {
                            return Err(NameError::InvalidEscape);
                        }
                        let value = u32::from(first - b'0') * 100
                            + u32::from(second - b'0') * 10
                            + u32::from(third - b'0');
                        let value = u8::try_from(value)
                            .map_err(|_| NameError::InvalidEscape)?;
                        label.push(value);
                    } else {
                        label.push(first);
                    }
                }
                b' ' | b'\t' | b'\r' | b'\n' => {
                    return Err(NameError::DisallowedChar)
                }
                _ => label.push(ch),
            }
        }
        push_label(&mut res, &label)?;
        res.put_u8(0);
        if res.len() > Self::MAX_LEN {
            return Err(NameError::LongName);
        }
        Ok(Dname {
            octets: res.freeze(),
        })
    }
}

fn push_label(target: &mut BytesMut, label: &[u8]) -> Result<(), NameError> {
    if label.is_empty() {
        return Err(NameError::EmptyLabel);
    }
    if label.len() > Dname::MAX_LABEL_LEN {
        return Err(NameError::LongLabel);
    }
    target.put_u8(label.len() as u8);
    target.put_slice(label);
    Ok(())
}

//--- PartialEq, Eq, and Hash

impl PartialEq for Dname {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice().eq_ignore_ascii_case(other.as_slice())
    }
}

impl Eq for Dname {}

impl Hash for Dname {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for ch in self.as_slice() {
            state.write_u8(ch.to_ascii_lowercase())
        }
    }
}

//--- Display and Debug

impl fmt::Display for Dname {
    /// Formats the name without the trailing dot.
    ///
    /// The root name is formatted as a single dot.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        for (idx, label) in self.labels().enumerate() {
            if idx > 0 {
                f.write_str(".")?;
            }
            for &ch in label {
                if ch == b'.' || ch == b'\\' {
                    write!(f, "\\{}", ch as char)?;
                } else if ch.is_ascii_graphic() {
                    write!(f, "{}", ch as char)?;
                } else {
                    write!(f, "\\{:03}", ch)?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Dname {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Dname({})", self)
    }
}

//------------ LabelIter -----------------------------------------------------

/// An iterator over the labels of a name.
#[derive(Clone, Debug)]
pub struct LabelIter<'a> {
    octets: &'a [u8],
}

impl<'a> Iterator for LabelIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let (&len, rest) = self.octets.split_first()?;
        let len = usize::from(len);
        if len == 0 || rest.len() < len {
            return None;
        }
        let (label, rest) = rest.split_at(len);
        self.octets = rest;
        Some(label)
    }
}

//------------ NameError -----------------------------------------------------

/// A domain name could not be created.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NameError {
    /// An empty label appeared in the middle of a name.
    EmptyLabel,

    /// A label was longer than 63 octets.
    LongLabel,

    /// The name was longer than 255 octets.
    LongName,

    /// An illegal escape sequence was encountered.
    InvalidEscape,

    /// A character not allowed in a name was encountered.
    DisallowedChar,

    /// The wire-format data ended before the root label.
    ShortInput,

    /// There was data after the root label.
    TrailingData,
}

//--- Display and Error

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            NameError::EmptyLabel => "empty label",
            NameError::LongLabel => "label exceeds 63 octets",
            NameError::LongName => "domain name exceeds 255 octets",
            NameError::InvalidEscape => "invalid escape sequence",
            NameError::DisallowedChar => "disallowed character",
            NameError::ShortInput => "unexpected end of input",
            NameError::TrailingData => "trailing data",
        })
    }
}

impl std::error::Error for NameError {}

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn from_str() {
        let name = Dname::from_str("www.Example.com.").unwrap();
        assert_eq!(name.as_slice(), b"\x03www\x07Example\x03com\x00");
        assert_eq!(name, Dname::from_str("WWW.example.COM").unwrap());
        assert_eq!(name.to_string(), "www.Example.com");
        assert_eq!(Dname::from_str(".").unwrap().to_string(), ".");
        assert_eq!(
            Dname::from_str("a\\.b.c").unwrap().as_slice(),
            b"\x03a.b\x01c\x00"
        );
        assert_eq!(
            Dname::from_str("a\\065.c").unwrap().as_slice(),
            b"\x02aA\x01c\x00"
        );
        assert_eq!(Dname::from_str("a..b"), Err(NameError::EmptyLabel));
        assert_eq!(
            Dname::from_str(&"x".repeat(64)),
            Err(NameError::LongLabel)
        );
    }

    #[test]
    fn parse_compressed() {
        // Name at 0, pointer to it at 13 after the label "ftp".
        let data = b"\x07example\x03com\x00\x03ftp\xC0\x00\xFF";
        let mut parser = Parser::new(data);
        assert_eq!(
            Dname::parse(&mut parser).unwrap(),
            Dname::from_str("example.com").unwrap()
        );
        let name = Dname::parse(&mut parser).unwrap();
        assert_eq!(name.to_string(), "ftp.example.com");
        assert_eq!(parser.remaining(), 1);

        let mut parser = Parser::new(data);
        Dname::skip(&mut parser).unwrap();
        Dname::skip(&mut parser).unwrap();
        assert_eq!(parser.parse_u8(), Ok(0xFF));
    }

    #[test]
    fn pointer_loop() {
        let data = b"\xC0\x00";
        assert!(Dname::parse(&mut Parser::new(data)).is_err());
    }

    #[test]
    fn prepend() {
        let name = Dname::from_str("example.com").unwrap();
        let name = name.prepend(b"_tcp").unwrap().prepend(b"_sip").unwrap();
        assert_eq!(name.to_string(), "_sip._tcp.example.com");
        assert_eq!(name.labels().count(), 4);
    }
}
