//! Resolver configuration
//!
//! This module contains the global resolver configuration, normally read
//! from the system’s `/etc/resolv.conf`. It provides the name servers that
//! make up the primary chain as well as the defaults for the per-query
//! [`ResolverConfig`][super::config::ResolverConfig].
//!
//! The format is modeled along the lines of glibc’s resolver.

use std::fmt;
use std::fs;
use std::io::{self, BufRead, Read};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::str::SplitWhitespace;
use std::sync::Arc;
use std::time::Duration;

/// The path of the system’s resolver configuration.
pub const SYSTEM_PATH: &str = "/etc/resolv.conf";

//------------ ResolvOptions ------------------------------------------------

/// Options for the resolver configuration.
///
/// Only the flags that influence how queries are sent are kept. Other
/// options of glibc’s resolver are accepted when parsing but ignored.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResolvOptions {
    /// Always use TCP.
    pub use_vc: bool,

    /// Ignore trunactions errors, don’t retry with TCP.
    pub ign_tc: bool,

    /// Use EDNS0.
    pub use_edns0: bool,

    /// Use round-robin selection of name servers.
    pub rotate: bool,
}

//------------ ResolvConf ---------------------------------------------------

/// Resolver configuration.
///
/// After creating a value with `ResolvConf::new()` or parsing, call
/// `finalize()` to make sure the configuration is usable. It mostly just
/// fixes the `servers`.
///
/// The easiest way to get the system resolver configuration is through
/// [`ResolvConf::system`]. This will parse the configuration file or
/// return a default configuration if that fails.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvConf {
    /// Addresses of servers to query.
    pub servers: Vec<SocketAddr>,

    /// Timeout to wait for a response.
    pub timeout: Duration,

    /// Number of retries before giving up.
    pub attempts: usize,

    /// Default options.
    pub options: ResolvOptions,
}

/// # Management
///
impl ResolvConf {
    /// Creates a new, empty configuration.
    ///
    /// Using an empty configuration will fail since it does not contain
    /// any name servers. Call `self.finalize()` to make it usable.
    pub fn new() -> Self {
        ResolvConf {
            servers: Vec::new(),
            timeout: Duration::from_secs(5),
            attempts: 2,
            options: ResolvOptions::default(),
        }
    }

    /// Finalizes the configuration for actual use.
    ///
    /// If `servers` is empty, it adds `127.0.0.1:53`. This is exactly what
    /// glibc does.
    pub fn finalize(&mut self) {
        if self.servers.is_empty() {
            let addr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
            self.servers.push(SocketAddr::new(addr, 53));
        }
    }

    /// Reads the configuration at `path`, falling back to the defaults.
    ///
    /// The returned configuration is always finalized.
    pub fn from_path_or_default<P: AsRef<Path>>(path: P) -> Self {
        let mut res = ResolvConf::new();
        if let Err(err) = res.parse_file(path.as_ref()) {
            tracing::debug!(
                path = %path.as_ref().display(),
                "cannot read resolver configuration: {}", err
            );
            res = ResolvConf::new();
        }
        res.finalize();
        res
    }

    /// Creates the default configuration for this system.
    pub fn system() -> Self {
        Self::from_path_or_default(SYSTEM_PATH)
    }
}

impl Default for ResolvConf {
    fn default() -> Self {
        let mut res = Self::new();
        res.finalize();
        res
    }
}

/// # Parsing Configuration File
///
impl ResolvConf {
    /// Parses the configuration from a file.
    pub fn parse_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        let mut file = fs::File::open(path)?;
        self.parse(&mut file)
    }

    /// Parses the configuration from a reader.
    ///
    /// The format is that of the /etc/resolv.conf file.
    pub fn parse<R: Read>(&mut self, reader: &mut R) -> Result<(), Error> {
        for line in io::BufReader::new(reader).lines() {
            let line = line?;
            let line = line.trim_end();

            if line.is_empty()
                || line.starts_with(';')
                || line.starts_with('#')
            {
                continue;
            }

            let mut words = line.split_whitespace();
            let keyword = words.next();
            match keyword {
                Some("nameserver") => self.parse_nameserver(words)?,
                Some("domain") | Some("search") | Some("sortlist") => {}
                Some("options") => self.parse_options(words)?,
                _ => return Err(Error::ParseError),
            }
        }
        Ok(())
    }

    fn parse_nameserver(
        &mut self,
        mut words: SplitWhitespace,
    ) -> Result<(), Error> {
        let word = next_word(&mut words)?;
        // Scoped IPv6 addresses such as `fe80::1%eth0` lose their scope.
        let addr = word.split('%').next().unwrap_or(word);
        let addr: IpAddr = addr.parse().map_err(|_| Error::ParseError)?;
        self.servers.push(SocketAddr::new(addr, 53));
        no_more_words(words)
    }

    fn parse_options(&mut self, words: SplitWhitespace) -> Result<(), Error> {
        for word in words {
            match split_arg(word)? {
                ("timeout", Some(n)) => {
                    self.timeout = Duration::from_secs(n as u64)
                }
                ("attempts", Some(n)) => self.attempts = n,
                ("rotate", None) => self.options.rotate = true,
                ("edns0", None) => self.options.use_edns0 = true,
                ("use-vc", None) => self.options.use_vc = true,
                ("ign-tc", None) => self.options.ign_tc = true,
                // Ignore unknown or misformated options.
                _ => {}
            }
        }
        Ok(())
    }
}

//--- Display

impl fmt::Display for ResolvConf {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for server in &self.servers {
            if server.port() == 53 {
                writeln!(f, "nameserver {}", server.ip())?;
            } else {
                writeln!(f, "nameserver {}", server)?;
            }
        }

        let mut options = Vec::new();
        if self.timeout != Duration::from_secs(5) {
            options.push(format!("timeout:{}", self.timeout.as_secs()));
        }
        if self.attempts != 2 {
            options.push(format!("attempts:{}", self.attempts));
        }
        if self.options.use_vc {
            options.push("use-vc".into())
        }
        if self.options.ign_tc {
            options.push("ign-tc".into())
        }
        if self.options.use_edns0 {
            options.push("edns0".into())
        }
        if self.options.rotate {
            options.push("rotate".into())
        }
        if !options.is_empty() {
            writeln!(f, "options {}", options.join(" "))?;
        }
        Ok(())
    }
}

//------------ Private Helpers ----------------------------------------------

/// Returns a reference to the next word or an error.
fn next_word<'a>(words: &mut SplitWhitespace<'a>) -> Result<&'a str, Error> {
    words.next().ok_or(Error::ParseError)
}

/// Returns nothing but errors out if there are words left.
fn no_more_words(mut words: SplitWhitespace) -> Result<(), Error> {
    match words.next() {
        Some(..) => Err(Error::ParseError),
        None => Ok(()),
    }
}

/// Splits the name and argument from an option with arguments.
///
/// These options consist of a name followed by a colon followed by a
/// value, which so far is only `usize`, so we do that.
fn split_arg(s: &str) -> Result<(&str, Option<usize>), Error> {
    match s.split_once(':') {
        Some((left, right)) => Ok((
            left,
            Some(right.parse().map_err(|_| Error::ParseError)?),
        )),
        None => Ok((s, None)),
    }
}

//------------ Error --------------------------------------------------------

/// The error that can happen when parsing `resolv.conf`.
#[derive(Clone, Debug)]
pub enum Error {
    /// The file is not a proper file.
    ParseError,

    /// Something happend while reading.
    Io(Arc<io::Error>),
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Error {
        Error::Io(Arc::new(error))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::ParseError => f.write_str("error parsing configuration"),
            Error::Io(ref err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::ParseError => None,
            Error::Io(ref err) => Some(err),
        }
    }
}

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;
    use std::io;

    #[test]
    fn parse_resolv_conf() {
        let mut conf = ResolvConf::new();
        let data = "# comment\n\
                    domain example.com\n\
                    nameserver 192.0.2.1\n\
                    nameserver 2001:db8::1\n\
                    options use-vc timeout:2 ndots:3 edns0\n"
            .to_string();
        conf.parse(&mut io::Cursor::new(data)).unwrap();
        assert_eq!(
            conf.servers,
            vec![
                "192.0.2.1:53".parse().unwrap(),
                "[2001:db8::1]:53".parse().unwrap()
            ]
        );
        assert!(conf.options.use_vc);
        assert!(conf.options.use_edns0);
        assert!(!conf.options.ign_tc);
        assert_eq!(conf.timeout, Duration::from_secs(2));
    }

    #[test]
    fn bad_lines() {
        let mut conf = ResolvConf::new();
        assert!(conf
            .parse(&mut io::Cursor::new("nameserver bogus\n"))
            .is_err());
        assert!(conf
            .parse(&mut io::Cursor::new("nameserver 192.0.2.1 extra\n"))
            .is_err());
        assert!(conf.parse(&mut io::Cursor::new("frobnicate\n")).is_err());
    }

    #[test]
    fn missing_file() {
        let conf =
            ResolvConf::from_path_or_default("/nonexistent/resolv.conf");
        assert_eq!(conf.servers, vec!["127.0.0.1:53".parse().unwrap()]);
        assert_eq!(conf, ResolvConf::default());
    }

    #[test]
    fn display() {
        let mut conf = ResolvConf::new();
        conf.servers.push("192.0.2.1:53".parse().unwrap());
        conf.options.ign_tc = true;
        assert_eq!(
            conf.to_string(),
            "nameserver 192.0.2.1\noptions ign-tc\n"
        );
    }
}
