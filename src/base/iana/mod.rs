//! IANA definitions for DNS.
//!
//! This module contains the few IANA-registered parameters the resolver
//! needs to look at: record types, classes, and response codes. Each is a
//! thin newtype around its integer representation so that values without
//! a well-known mnemonic survive a round trip unharmed.

#[macro_use]
mod macros;

pub use self::class::Class;
pub use self::rcode::Rcode;
pub use self::rtype::Rtype;

pub mod class;
pub mod rcode;
pub mod rtype;
