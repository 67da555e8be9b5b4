//! Handling of DNS data.
//!
//! This module provides the small subset of DNS data handling the resolver
//! needs: the [message header][header], the [IANA registries][iana] for
//! classes, record types, and response codes, [domain names][name],
//! [parsing][message] and [building][message_builder] of messages, and the
//! [OPT record][opt] used by EDNS.
//!
//! Messages are always kept as complete wire-format octets. Accessing a
//! message never copies record data; the [rdata][crate::rdata] types parse
//! the data they need straight from the message.

//--- Re-exports

pub use self::header::{Header, HeaderCounts};
pub use self::iana::{Class, Rcode, Rtype};
pub use self::message::{Message, ParsedRecord, Question};
pub use self::message_builder::{MessageBuilder, PushError, Section};
pub use self::name::{Dname, NameError};
pub use self::opt::{Edns, EdnsOption};
pub use self::wire::{FormError, ParseError, Parser};

//--- Modules

pub mod header;
pub mod iana;
pub mod message;
pub mod message_builder;
pub mod name;
pub mod opt;
pub mod wire;
