//! A resolver racing unreliable primary servers against backup servers.
//!
//! The [`ParallelResolver`] sends queries to the primary servers of the
//! system configuration. When these turn out to be slow or to give
//! unsatisfactory answers, it starts sending queries to configured backup
//! servers, too, and uses whichever answer arrives first. Once the primary
//! servers have been fast and useful for a number of consecutive queries,
//! the backup servers are left alone again.
//!
//! The pieces are:
//!
//! * [conf] reads the system configuration from `/etc/resolv.conf`,
//! * [options] reads the tuning options, usually from the environment,
//! * [config] holds the per-query configuration,
//! * [redundancy] decides whether to race against the backup servers,
//! * [racer] runs one query against several servers,
//! * [parallel] ties it all together, and
//! * [lookup] contains functions for looking up particular records.
//!
//! Anything that can answer queries implements [`Resolve`]. Wrap a resolver
//! into a [`ValidatingResolver`][crate::validator::ValidatingResolver] to
//! have its answers checked by DNSSEC.

pub use self::conf::ResolvConf;
pub use self::config::{ConfigError, ResolverConfig};
pub use self::error::Error;
pub use self::options::Options;
pub use self::parallel::{ParallelResolver, QueryHandle};
pub use self::redundancy::{Mode, RedundancyState};
pub use self::resolver::Resolve;

pub mod conf;
pub mod config;
pub mod error;
pub mod lookup;
pub mod options;
pub mod parallel;
pub mod racer;
pub mod redundancy;
pub mod resolver;
