//! The per-query configuration of the resolver.
//!
//! A [`ResolverConfig`] holds everything the transport needs to know when
//! sending a query: the timeout, whether to use TCP right away or ignore
//! truncation, EDNS parameters, an optional TSIG key, and details about
//! the local socket. The resolver keeps the current configuration as an
//! immutable snapshot that is replaced as a whole when a setter is called.
//! Setters validate their input and leave the configuration untouched if
//! it is rejected.

use std::fmt;
use std::time::Duration;

#[cfg(feature = "tsig")]
use std::sync::Arc;

use crate::base::opt::{Edns, EdnsOption};
use crate::resolv::conf::ResolvConf;
#[cfg(feature = "tsig")]
use crate::tsig::Key;

//------------ ResolverConfig ------------------------------------------------

/// The configuration used for sending a query.
#[derive(Clone, Debug)]
pub struct ResolverConfig {
    /// How long to wait for an answer from a single server.
    timeout: Duration,

    /// Use TCP right away instead of trying UDP first.
    use_tcp: bool,

    /// Accept truncated UDP answers instead of retrying over TCP.
    ignore_truncation: bool,

    /// The EDNS parameters to add to queries, if any.
    edns: Option<Edns>,

    /// The key to sign queries with, if any.
    #[cfg(feature = "tsig")]
    tsig_key: Option<Arc<Key>>,

    /// The local port for UDP sockets; zero picks a random port.
    local_port: u16,

    /// The size of the receive buffer for UDP.
    udp_recv_size: usize,
}

impl ResolverConfig {
    /// The default timeout if none is configured.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// The EDNS payload size used if zero is given.
    pub const DEFAULT_PAYLOAD_SIZE: u16 = 1280;

    /// The smallest acceptable EDNS payload size.
    pub const MIN_PAYLOAD_SIZE: u16 = 512;

    /// The default UDP receive buffer size.
    pub const DEFAULT_UDP_RECV_SIZE: usize = 4096;

    /// Creates the configuration described by a `resolv.conf`.
    pub fn from_resolv_conf(conf: &ResolvConf) -> Self {
        let mut res = Self::default();
        if !conf.timeout.is_zero() {
            res.timeout = conf.timeout;
        }
        res.use_tcp = conf.options.use_vc;
        res.ignore_truncation = conf.options.ign_tc;
        if conf.options.use_edns0 {
            res.edns = Some(Edns::new(Self::DEFAULT_PAYLOAD_SIZE));
        }
        res
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sets the per-attempt timeout.
    ///
    /// A zero timeout is rejected.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<(), ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        self.timeout = timeout;
        Ok(())
    }

    pub fn use_tcp(&self) -> bool {
        self.use_tcp
    }

    pub fn set_use_tcp(&mut self, value: bool) {
        self.use_tcp = value
    }

    pub fn ignore_truncation(&self) -> bool {
        self.ignore_truncation
    }

    pub fn set_ignore_truncation(&mut self, value: bool) {
        self.ignore_truncation = value
    }

    /// Returns the EDNS parameters added to queries.
    pub fn edns(&self) -> Option<&Edns> {
        self.edns.as_ref()
    }

    /// Configures EDNS.
    ///
    /// A `level` of -1 disables EDNS and 0 enables EDNS version 0. Other
    /// levels are rejected. A `payload_size` of zero selects the default
    /// of 1280 octets; otherwise it must be at least 512.
    pub fn set_edns(
        &mut self,
        level: i32,
        payload_size: u16,
        flags: u16,
        options: Vec<EdnsOption>,
    ) -> Result<(), ConfigError> {
        match level {
            -1 => {
                self.edns = None;
                Ok(())
            }
            0 => {
                let payload_size = match payload_size {
                    0 => Self::DEFAULT_PAYLOAD_SIZE,
                    size if size < Self::MIN_PAYLOAD_SIZE => {
                        return Err(ConfigError::InvalidPayloadSize(size))
                    }
                    size => size,
                };
                let mut edns = Edns::new(payload_size);
                edns.set_flags(flags);
                for option in options {
                    edns.push_option(option)
                }
                self.edns = Some(edns);
                Ok(())
            }
            level => Err(ConfigError::InvalidEdnsLevel(level)),
        }
    }

    /// Returns the key queries are signed with.
    #[cfg(feature = "tsig")]
    pub fn tsig_key(&self) -> Option<&Arc<Key>> {
        self.tsig_key.as_ref()
    }

    #[cfg(feature = "tsig")]
    pub fn set_tsig_key(&mut self, key: Option<Arc<Key>>) {
        self.tsig_key = key
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn set_local_port(&mut self, port: u16) {
        self.local_port = port
    }

    /// Returns the size of the receive buffer for UDP.
    ///
    /// This is never smaller than the EDNS payload size advertised in
    /// queries.
    pub fn udp_recv_size(&self) -> usize {
        match self.edns {
            Some(ref edns) => self
                .udp_recv_size
                .max(usize::from(edns.udp_payload_size())),
            None => self.udp_recv_size,
        }
    }

    /// Sets the UDP receive buffer size.
    ///
    /// The size is raised to 512 if smaller.
    pub fn set_udp_recv_size(&mut self, size: usize) {
        self.udp_recv_size =
            size.max(usize::from(Self::MIN_PAYLOAD_SIZE))
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            timeout: Self::DEFAULT_TIMEOUT,
            use_tcp: false,
            ignore_truncation: false,
            edns: None,
            #[cfg(feature = "tsig")]
            tsig_key: None,
            local_port: 0,
            udp_recv_size: Self::DEFAULT_UDP_RECV_SIZE,
        }
    }
}

//------------ ConfigError ---------------------------------------------------

/// A configuration value was rejected.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// The timeout was zero.
    InvalidTimeout,

    /// The EDNS level was neither -1 nor 0.
    InvalidEdnsLevel(i32),

    /// The EDNS payload size was below 512.
    InvalidPayloadSize(u16),

    /// An empty list of default servers was given.
    NoServers,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConfigError::InvalidTimeout => f.write_str("timeout must not be zero"),
            ConfigError::InvalidEdnsLevel(level) => {
                write!(f, "invalid EDNS level {} (must be -1 or 0)", level)
            }
            ConfigError::InvalidPayloadSize(size) => {
                write!(f, "invalid EDNS payload size {} (minimum 512)", size)
            }
            ConfigError::NoServers => f.write_str("no servers given"),
        }
    }
}

impl std::error::Error for ConfigError {}

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(-1, 0, Ok(None))]
    #[case(0, 0, Ok(Some(1280)))]
    #[case(0, 4096, Ok(Some(4096)))]
    #[case(0, 511, Err(ConfigError::InvalidPayloadSize(511)))]
    #[case(1, 1232, Err(ConfigError::InvalidEdnsLevel(1)))]
    #[case(-2, 1232, Err(ConfigError::InvalidEdnsLevel(-2)))]
    fn set_edns(
        #[case] level: i32,
        #[case] payload_size: u16,
        #[case] expected: Result<Option<u16>, ConfigError>,
    ) {
        let mut config = ResolverConfig::default();
        let res = config
            .set_edns(level, payload_size, Edns::DNSSEC_OK, Vec::new())
            .map(|_| config.edns().map(Edns::udp_payload_size));
        assert_eq!(res, expected);
    }

    #[test]
    fn recv_size_covers_payload_size() {
        let mut config = ResolverConfig::default();
        assert_eq!(config.udp_recv_size(), 4096);
        config.set_edns(0, 8192, 0, Vec::new()).unwrap();
        assert_eq!(config.udp_recv_size(), 8192);
        config.set_udp_recv_size(1024);
        assert_eq!(config.udp_recv_size(), 8192);
        config.set_edns(-1, 0, 0, Vec::new()).unwrap();
        assert_eq!(config.udp_recv_size(), 1024);
        config.set_udp_recv_size(16384);
        config.set_edns(0, 1232, 0, Vec::new()).unwrap();
        assert_eq!(config.udp_recv_size(), 16384);
    }

    #[test]
    fn rejected_values_keep_config() {
        let mut config = ResolverConfig::default();
        config.set_edns(0, 1232, 0, Vec::new()).unwrap();
        config.set_timeout(Duration::from_secs(2)).unwrap();
        assert!(config.set_edns(3, 1232, 0, Vec::new()).is_err());
        assert_eq!(
            config.set_timeout(Duration::ZERO),
            Err(ConfigError::InvalidTimeout)
        );
        assert_eq!(config.edns().map(Edns::udp_payload_size), Some(1232));
        assert_eq!(config.timeout(), Duration::from_secs(2));
    }

    #[test]
    fn from_resolv_conf() {
        let mut conf = ResolvConf::new();
        conf.timeout = Duration::from_secs(3);
        conf.options.use_vc = true;
        conf.options.use_edns0 = true;
        let config = ResolverConfig::from_resolv_conf(&conf);
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert!(config.use_tcp());
        assert!(!config.ignore_truncation());
        assert_eq!(config.edns().map(Edns::udp_payload_size), Some(1280));
    }
}
