//! A DNS resolver for unreliable networks.
//!
//! This crate provides a stub resolver meant for clients that need to
//! resolve SRV, NAPTR, A, and AAAA records quickly even when the DNS
//! servers configured on the system drop some queries, answer slowly, or
//! give incomplete answers. It normally asks the system’s servers only but
//! starts racing them against backup servers once they let it down, and it
//! goes back to trusting them alone after they have behaved for a while.
//!
//! # Modules
//!
//! * [base] contains the fundamental types for dealing with DNS messages:
//!   domain names, headers, messages and a builder for them, and EDNS.
//! * [rdata] contains the record data types the resolver looks at.
#![cfg_attr(feature = "tsig", doc = "* [tsig]:")]
#![cfg_attr(not(feature = "tsig"), doc = "* tsig:")]
//!   Support for securing DNS transactions with TSIG records.
//! * [net] contains the transports that send a single query to a single
//!   server over UDP or TCP.
//! * [resolv] contains the resolver itself along with its configuration
//!   and lookup functions.
//! * [validator] contains the DNSSEC validation wrapper for resolvers.
//!
//! # Reference of Feature Flags
//!
//! * `tsig`: support for signing queries and validating answers via TSIG.
//!   This enables the
#![cfg_attr(feature = "tsig", doc = "  [tsig]")]
#![cfg_attr(not(feature = "tsig"), doc = "  tsig")]
//!   module and pulls in the [ring](https://github.com/briansmith/ring)
//!   crate. It is enabled by default.

#![allow(renamed_and_removed_lints)]
#![allow(clippy::unknown_clippy_lints)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod base;
pub mod net;
pub mod rdata;
pub mod resolv;
pub mod tsig;
pub mod validator;
