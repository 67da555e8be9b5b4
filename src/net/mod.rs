//! Sending and receiving DNS messages.
//!
//! This module provides types, traits, and function for sending and receiving
//! DNS messages. Currently, there is only the [`client`] sub-module for
//! sending requests to a single server and receiving the responses to them.

pub mod client;
