//! Support for TSIG.
//!
//! This module provides the client side of message exchanges signed with
//! TSIG as defined in [RFC 8945].
//!
//! The client generates a signature over the request it is about to send
//! using a secret key shared with the server and adds it in a TSIG record
//! to the additional section. The server includes the request’s signature
//! when signing its answer, binding request and answer together. The client
//! then verifies the answer’s signature and strips the TSIG record before
//! handing the answer on.
//!
//! Only the SHA-based algorithms are supported, selected via [`Algorithm`].
//! Keys are managed via the [`Key`] type which ties the secret to an
//! algorithm and a name. A single exchange is handled by
//! [`ClientTransaction`].
//!
//! [RFC 8945]: https://tools.ietf.org/html/rfc8945
#![cfg(feature = "tsig")]
#![cfg_attr(docsrs, doc(cfg(feature = "tsig")))]

use crate::base::iana::{Class, Rcode, Rtype};
use crate::base::message::{Message, ParsedRecord};
use crate::base::message_builder::{MessageBuilder, PushError, Section};
use crate::base::name::Dname;
use crate::base::wire::ParseError;
use bytes::{BufMut, Bytes, BytesMut};
use core::{cmp, fmt, str};
use ring::{constant_time, hkdf::KeyType, hmac};
use std::time::{SystemTime, UNIX_EPOCH};

//------------ Constants -----------------------------------------------------

/// The fudge used for signing requests, in seconds.
pub const FUDGE: u16 = 300;

/// TSIG error codes reported in the error field.
const BADSIG: u16 = 16;
const BADKEY: u16 = 17;
const BADTIME: u16 = 18;

//------------ Key -----------------------------------------------------------

/// A key for creating and validating TSIG signatures.
///
/// Each key knows the algorithm it is used with and its name. It also
/// keeps the truncation policy: [`min_mac_len`][Self::min_mac_len] is the
/// minimum length of an accepted signature and
/// [`signing_len`][Self::signing_len] the length of created signatures.
#[derive(Debug)]
pub struct Key {
    /// The key’s bits and algorithm.
    key: hmac::Key,

    /// The name of the key.
    name: Dname,

    /// Minimum length of received signatures.
    min_mac_len: usize,

    /// The length of a signature created with this key.
    signing_len: usize,
}

impl Key {
    /// Creates a new key from its components.
    ///
    /// If `min_mac_len` or `signing_len` are `None`, the algorithm’s native
    /// length is used. Otherwise they must be at least 10, at least half
    /// the native length, and no larger than the native length.
    pub fn new(
        algorithm: Algorithm,
        secret: &[u8],
        name: Dname,
        min_mac_len: Option<usize>,
        signing_len: Option<usize>,
    ) -> Result<Self, NewKeyError> {
        let min_mac_len = match min_mac_len {
            Some(len) if !algorithm.within_len_bounds(len) => {
                return Err(NewKeyError::BadMinMacLen)
            }
            Some(len) => len,
            None => algorithm.native_len(),
        };
        let signing_len = match signing_len {
            Some(len) if !algorithm.within_len_bounds(len) => {
                return Err(NewKeyError::BadSigningLen)
            }
            Some(len) => len,
            None => algorithm.native_len(),
        };
        Ok(Key {
            key: hmac::Key::new(algorithm.into_hmac_algorithm(), secret),
            name,
            min_mac_len,
            signing_len,
        })
    }

    /// Returns the algorithm of this key.
    pub fn algorithm(&self) -> Algorithm {
        Algorithm::from_hmac_algorithm(self.key.algorithm())
    }

    /// Returns a reference to the name of this key.
    pub fn name(&self) -> &Dname {
        &self.name
    }

    /// Returns the minimum acceptable length of a received signature.
    pub fn min_mac_len(&self) -> usize {
        self.min_mac_len
    }

    /// Returns the length of a signature generated by this key.
    pub fn signing_len(&self) -> usize {
        self.signing_len
    }

    /// Returns the possibly truncated slice of a signature.
    fn signature_slice<'a>(&self, signature: &'a hmac::Tag) -> &'a [u8] {
        &signature.as_ref()[..self.signing_len]
    }

    /// Compares the expected signature to the provided one.
    ///
    /// Truncated signatures are accepted down to `min_mac_len`.
    fn compare_signatures(
        &self,
        expected: &hmac::Tag,
        provided: &[u8],
    ) -> Result<(), ValidationError> {
        if provided.len() < self.min_mac_len {
            return Err(ValidationError::BadTrunc);
        }
        let expected = expected.as_ref();
        let expected = &expected[..cmp::min(provided.len(), expected.len())];
        constant_time::verify_slices_are_equal(expected, provided)
            .map_err(|_| ValidationError::BadSig)
    }
}

impl AsRef<Key> for Key {
    fn as_ref(&self) -> &Self {
        self
    }
}

//------------ ClientTransaction ---------------------------------------------

/// TSIG client transaction state.
///
/// Created by signing a request. The value is then used to validate the
/// answer to that request.
#[derive(Clone, Debug)]
pub struct ClientTransaction<K> {
    key: K,

    /// The MAC of the request as it was sent.
    request_mac: Bytes,
}

impl<K: AsRef<Key>> ClientTransaction<K> {
    /// Signs the request in `builder` with `key`.
    ///
    /// The TSIG record is appended to the additional section, so nothing
    /// may be added to the message afterwards.
    pub fn request(
        key: K,
        builder: &mut MessageBuilder,
    ) -> Result<Self, PushError> {
        Self::request_at(key, builder, now())
    }

    /// Signs the request using `time_signed` as the signing time.
    pub fn request_at(
        key: K,
        builder: &mut MessageBuilder,
        time_signed: u64,
    ) -> Result<Self, PushError> {
        let variables = Variables::new(time_signed, FUDGE, 0);
        let mut context = hmac::Context::with_key(&key.as_ref().key);
        context.update(&builder.finish());
        variables.sign(key.as_ref(), &mut context);
        let signature = context.sign();
        let mac = key.as_ref().signature_slice(&signature);
        let id = builder.header().id();
        variables.push_tsig(key.as_ref(), mac, id, builder)?;
        Ok(ClientTransaction {
            request_mac: Bytes::copy_from_slice(mac),
            key,
        })
    }

    /// Validates an answer.
    ///
    /// On success, returns the answer with the TSIG record removed and the
    /// original message ID restored.
    pub fn answer(&self, message: &Message) -> Result<Message, ValidationError> {
        self.answer_at(message, now())
    }

    /// Validates an answer assuming the current time is `now`.
    pub fn answer_at(
        &self,
        message: &Message,
        now: u64,
    ) -> Result<Message, ValidationError> {
        let key = self.key.as_ref();
        let (record, tsig) = match MessageTsig::from_message(message)? {
            Some(res) => res,
            None => return Err(ValidationError::ServerUnsigned),
        };

        if message.rcode() == Rcode::NOTAUTH {
            match tsig.error {
                BADKEY => return Err(ValidationError::ServerBadKey),
                BADSIG => return Err(ValidationError::ServerBadSig),
                BADTIME => {
                    return Err(ValidationError::ServerBadTime {
                        client: tsig.time_signed,
                        server: tsig.other_time.ok_or(ValidationError::FormErr)?,
                    })
                }
                _ => {}
            }
        }

        if *record.owner() != key.name
            || Algorithm::from_dname(&tsig.algorithm) != Some(key.algorithm())
        {
            return Err(ValidationError::BadKey);
        }

        let stripped = strip_tsig(message, &record, tsig.original_id);
        let mut context = hmac::Context::with_key(&key.key);
        context.update(&(self.request_mac.len() as u16).to_be_bytes());
        context.update(&self.request_mac);
        context.update(&stripped);
        Variables::from_tsig(&tsig).sign(key, &mut context);
        key.compare_signatures(&context.sign(), &tsig.mac)?;

        if !tsig.is_valid_at(now) {
            return Err(ValidationError::BadTime);
        }
        Ok(Message::from_octets(stripped.freeze())?)
    }

    /// Returns a reference to the transaction’s key.
    pub fn key(&self) -> &Key {
        self.key.as_ref()
    }
}

//------------ MessageTsig ---------------------------------------------------

/// The content of the TSIG record of a message.
#[derive(Clone, Debug)]
struct MessageTsig {
    algorithm: Dname,
    time_signed: u64,
    fudge: u16,
    mac: Bytes,
    original_id: u16,
    error: u16,
    other_time: Option<u64>,
}

impl MessageTsig {
    /// Returns the TSIG record if it is the last additional record.
    fn from_message(
        message: &Message,
    ) -> Result<Option<(ParsedRecord, Self)>, ValidationError> {
        let record = match message.additional().last() {
            Some(record) if record.rtype() == Rtype::TSIG => record.clone(),
            _ => return Ok(None),
        };
        let mut parser = message.data_parser(&record)?;
        let algorithm = Dname::parse(&mut parser)?;
        let time_signed = parse_time48(parser.parse_octets(6)?);
        let fudge = parser.parse_u16()?;
        let mac_len = usize::from(parser.parse_u16()?);
        let mac = Bytes::copy_from_slice(parser.parse_octets(mac_len)?);
        let original_id = parser.parse_u16()?;
        let error = parser.parse_u16()?;
        let other_time = match parser.parse_u16()? {
            0 => None,
            6 => Some(parse_time48(parser.parse_octets(6)?)),
            _ => return Err(ValidationError::FormErr),
        };
        parser.check_done()?;
        Ok(Some((
            record,
            MessageTsig {
                algorithm,
                time_signed,
                fudge,
                mac,
                original_id,
                error,
                other_time,
            },
        )))
    }

    fn is_valid_at(&self, now: u64) -> bool {
        now.abs_diff(self.time_signed) <= u64::from(self.fudge)
    }
}

//------------ Variables -----------------------------------------------------

/// The TSIG variables that are digested along with the message.
#[derive(Clone, Debug)]
struct Variables {
    time_signed: u64,
    fudge: u16,
    error: u16,
    other: Option<u64>,
}

impl Variables {
    fn new(time_signed: u64, fudge: u16, error: u16) -> Self {
        Variables {
            time_signed,
            fudge,
            error,
            other: None,
        }
    }

    fn from_tsig(tsig: &MessageTsig) -> Self {
        Variables {
            time_signed: tsig.time_signed,
            fudge: tsig.fudge,
            error: tsig.error,
            other: tsig.other_time,
        }
    }

    /// Appends the TSIG record to the additional section.
    fn push_tsig(
        &self,
        key: &Key,
        mac: &[u8],
        original_id: u16,
        builder: &mut MessageBuilder,
    ) -> Result<(), PushError> {
        let mac_len = u16::try_from(mac.len()).map_err(|_| PushError::ShortBuf)?;
        let mut data = BytesMut::with_capacity(32 + mac.len());
        data.put_slice(key.algorithm().into_wire_slice());
        data.put_slice(&time48_octets(self.time_signed));
        data.put_u16(self.fudge);
        data.put_u16(mac_len);
        data.put_slice(mac);
        data.put_u16(original_id);
        data.put_u16(self.error);
        match self.other {
            Some(time) => {
                data.put_u16(6);
                data.put_slice(&time48_octets(time));
            }
            None => data.put_u16(0),
        }
        builder.push_record(
            Section::Additional,
            &key.name,
            Rtype::TSIG,
            Class::ANY,
            0,
            &data,
        )
    }

    /// Applies the variables to a signing context.
    fn sign(&self, key: &Key, context: &mut hmac::Context) {
        // Key name, in canonical wire format. Length octets are below 64
        // and thus unaffected by lowercasing.
        context.update(&key.name.as_slice().to_ascii_lowercase());
        // CLASS (always ANY) and TTL (always 0).
        context.update(&Class::ANY.to_int().to_be_bytes());
        context.update(&0u32.to_be_bytes());
        context.update(key.algorithm().into_wire_slice());
        context.update(&time48_octets(self.time_signed));
        context.update(&self.fudge.to_be_bytes());
        context.update(&self.error.to_be_bytes());
        match self.other {
            Some(time) => {
                context.update(&6u16.to_be_bytes());
                context.update(&time48_octets(time));
            }
            None => context.update(&0u16.to_be_bytes()),
        }
    }
}

//------------ Algorithm -----------------------------------------------------

/// The supported TSIG algorithms.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Algorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl Algorithm {
    /// Creates a value from its domain name representation.
    pub fn from_dname(name: &Dname) -> Option<Self> {
        [
            Algorithm::Sha1,
            Algorithm::Sha256,
            Algorithm::Sha384,
            Algorithm::Sha512,
        ]
        .into_iter()
        .find(|alg| name.as_slice().eq_ignore_ascii_case(alg.into_wire_slice()))
    }

    fn from_hmac_algorithm(alg: hmac::Algorithm) -> Self {
        if alg == hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY {
            Algorithm::Sha1
        } else if alg == hmac::HMAC_SHA256 {
            Algorithm::Sha256
        } else if alg == hmac::HMAC_SHA384 {
            Algorithm::Sha384
        } else {
            Algorithm::Sha512
        }
    }

    fn into_hmac_algorithm(self) -> hmac::Algorithm {
        match self {
            Algorithm::Sha1 => hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
            Algorithm::Sha256 => hmac::HMAC_SHA256,
            Algorithm::Sha384 => hmac::HMAC_SHA384,
            Algorithm::Sha512 => hmac::HMAC_SHA512,
        }
    }

    /// Returns the wire-format domain name for this value.
    fn into_wire_slice(self) -> &'static [u8] {
        match self {
            Algorithm::Sha1 => b"\x09hmac-sha1\0",
            Algorithm::Sha256 => b"\x0Bhmac-sha256\0",
            Algorithm::Sha384 => b"\x0Bhmac-sha384\0",
            Algorithm::Sha512 => b"\x0Bhmac-sha512\0",
        }
    }

    /// Returns the native length of a signature created with this algorithm.
    pub fn native_len(self) -> usize {
        self.into_hmac_algorithm().len()
    }

    /// Returns whether `len` is an acceptable signature length.
    pub fn within_len_bounds(self, len: usize) -> bool {
        len >= cmp::max(10, self.native_len() / 2) && len <= self.native_len()
    }
}

//--- FromStr and Display

impl str::FromStr for Algorithm {
    type Err = AlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hmac-sha1" => Ok(Algorithm::Sha1),
            "hmac-sha256" => Ok(Algorithm::Sha256),
            "hmac-sha384" => Ok(Algorithm::Sha384),
            "hmac-sha512" => Ok(Algorithm::Sha512),
            _ => Err(AlgorithmError),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Algorithm::Sha1 => "hmac-sha1",
            Algorithm::Sha256 => "hmac-sha256",
            Algorithm::Sha384 => "hmac-sha384",
            Algorithm::Sha512 => "hmac-sha512",
        })
    }
}

//------------ Helper Functions ----------------------------------------------

/// Returns the current time in seconds since the epoch.
fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|dur| dur.as_secs())
        .unwrap_or(0)
}

fn time48_octets(time: u64) -> [u8; 6] {
    let octets = time.to_be_bytes();
    [
        octets[2], octets[3], octets[4], octets[5], octets[6], octets[7],
    ]
}

fn parse_time48(octets: &[u8]) -> u64 {
    octets
        .iter()
        .fold(0u64, |res, octet| (res << 8) | u64::from(*octet))
}

/// Returns the message without its TSIG record and with the original ID.
fn strip_tsig(
    message: &Message,
    record: &ParsedRecord,
    original_id: u16,
) -> BytesMut {
    let mut header = message.header();
    header.set_id(original_id);
    let mut counts = message.header_counts();
    counts.set_arcount(counts.arcount().saturating_sub(1));
    let body = &message.as_slice()[Message::HEADER_LEN..record.start()];
    let mut res = BytesMut::with_capacity(Message::HEADER_LEN + body.len());
    res.put_slice(header.as_slice());
    res.put_slice(counts.as_slice());
    res.put_slice(body);
    res
}

//============ Error Types ===================================================

//------------ NewKeyError ---------------------------------------------------

/// A key couldn’t be created.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NewKeyError {
    BadMinMacLen,
    BadSigningLen,
}

impl fmt::Display for NewKeyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            NewKeyError::BadMinMacLen => {
                f.write_str("minimum signature length out of bounds")
            }
            NewKeyError::BadSigningLen => {
                f.write_str("created signature length out of bounds")
            }
        }
    }
}

impl std::error::Error for NewKeyError {}

//------------ AlgorithmError ------------------------------------------------

/// An invalid algorithm was provided.
#[derive(Clone, Copy, Debug)]
pub struct AlgorithmError;

impl fmt::Display for AlgorithmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("invalid algorithm")
    }
}

impl std::error::Error for AlgorithmError {}

//------------ ValidationError -----------------------------------------------

/// An error happened while validating a TSIG-signed answer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationError {
    BadSig,
    BadTrunc,
    BadKey,
    BadTime,
    FormErr,
    ServerUnsigned,
    ServerBadKey,
    ServerBadSig,
    ServerBadTime { client: u64, server: u64 },
}

impl From<ParseError> for ValidationError {
    fn from(_: ParseError) -> Self {
        ValidationError::FormErr
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ValidationError::BadSig => f.write_str("bad signature"),
            ValidationError::BadTrunc => f.write_str("short signature"),
            ValidationError::BadKey => f.write_str("unknown key"),
            ValidationError::BadTime => f.write_str("bad time"),
            ValidationError::FormErr => f.write_str("format error"),
            ValidationError::ServerUnsigned => f.write_str("unsigned answer"),
            ValidationError::ServerBadKey => {
                f.write_str("unknown key on server")
            }
            ValidationError::ServerBadSig => {
                f.write_str("server failed to verify MAC")
            }
            ValidationError::ServerBadTime { .. } => {
                f.write_str("server reported bad time")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

//============ Testing ======================================================
