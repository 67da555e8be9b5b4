//! Process-wide resolver options.
//!
//! These options tune the redundancy behaviour of the resolver and are read
//! when the resolver is created and whenever it is reset. They are looked up
//! by name through an [`OptionSource`], by default the process environment.
//!
//! The recognized options are:
//!
//! * `DNS_PATIENCE`: how long in milliseconds the primary servers get to
//!   answer before the backup servers are queried, default 1500;
//! * `DNS_REDEMPTION`: how many consecutive rounds the primary servers need
//!   to win before the backup servers are no longer queried, default 3;
//! * `DNSSEC_ENABLED`: whether answers need to be validated, default
//!   `false`;
//! * `DNS_BACKUP_RESOLVERS`: a comma separated list of backup servers, each
//!   given as an address with an optional port, e.g.,
//!   `192.0.2.1, 192.0.2.2:5353, [2001:db8::1]:53`, default empty.
//!
//! Values that can’t be parsed are logged and the default is used instead.

use std::collections::HashMap;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tracing::warn;

/// The name of the patience option.
pub const DNS_PATIENCE: &str = "DNS_PATIENCE";

/// The name of the redemption option.
pub const DNS_REDEMPTION: &str = "DNS_REDEMPTION";

/// The name of the DNSSEC option.
pub const DNSSEC_ENABLED: &str = "DNSSEC_ENABLED";

/// The name of the backup servers option.
pub const DNS_BACKUP_RESOLVERS: &str = "DNS_BACKUP_RESOLVERS";

//------------ OptionSource --------------------------------------------------

/// A source for option values.
pub trait OptionSource: Send + Sync {
    /// Returns the raw value of the option `name` if it is set.
    fn get(&self, name: &str) -> Option<String>;
}

/// Options taken from the process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct Environment;

impl OptionSource for Environment {
    fn get(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }
}

impl OptionSource for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

//------------ Options -------------------------------------------------------

/// The resolver options.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Options {
    /// How long the primary gets before backups are queried.
    pub patience: Duration,

    /// Consecutive primary wins needed to leave redundant mode.
    pub redemption: u32,

    /// Whether answers are validated.
    pub dnssec_enabled: bool,

    /// The backup servers.
    pub backup_servers: Vec<SocketAddr>,
}

impl Options {
    /// The default patience.
    pub const DEFAULT_PATIENCE: Duration = Duration::from_millis(1500);

    /// The default redemption threshold.
    pub const DEFAULT_REDEMPTION: u32 = 3;

    /// Reads the options from `source`.
    pub fn from_source(source: &dyn OptionSource) -> Self {
        let mut res = Self::default();
        if let Some(value) = source.get(DNS_PATIENCE) {
            match value.trim().parse::<u64>() {
                Ok(millis) => res.patience = Duration::from_millis(millis),
                Err(_) => warn!(
                    option = DNS_PATIENCE,
                    value = %value,
                    "invalid option value, using default"
                ),
            }
        }
        if let Some(value) = source.get(DNS_REDEMPTION) {
            match value.trim().parse::<u32>() {
                Ok(count) => res.redemption = count,
                Err(_) => warn!(
                    option = DNS_REDEMPTION,
                    value = %value,
                    "invalid option value, using default"
                ),
            }
        }
        if let Some(value) = source.get(DNSSEC_ENABLED) {
            match parse_bool(&value) {
                Some(enabled) => res.dnssec_enabled = enabled,
                None => warn!(
                    option = DNSSEC_ENABLED,
                    value = %value,
                    "invalid option value, using default"
                ),
            }
        }
        if let Some(value) = source.get(DNS_BACKUP_RESOLVERS) {
            res.backup_servers = parse_server_list(&value);
        }
        res
    }

    /// Reads the options from the process environment.
    pub fn from_env() -> Self {
        Self::from_source(&Environment)
    }
}

impl Default for Options {
    fn default() -> Self {
        Options {
            patience: Self::DEFAULT_PATIENCE,
            redemption: Self::DEFAULT_REDEMPTION,
            dnssec_enabled: false,
            backup_servers: Vec::new(),
        }
    }
}

//------------ Helper Functions ----------------------------------------------

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Parses a server address, using port 53 if none is given.
pub fn parse_server(value: &str) -> Option<SocketAddr> {
    let value = value.trim();
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Some(addr);
    }
    let ip = value
        .strip_prefix('[')
        .and_then(|value| value.strip_suffix(']'))
        .unwrap_or(value);
    ip.parse::<IpAddr>().ok().map(|ip| SocketAddr::new(ip, 53))
}

/// Parses a comma separated list of servers.
///
/// Entries that can’t be parsed are logged and skipped.
fn parse_server_list(value: &str) -> Vec<SocketAddr> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| {
            let res = parse_server(item);
            if res.is_none() {
                warn!(
                    option = DNS_BACKUP_RESOLVERS,
                    value = %item,
                    "ignoring invalid server address"
                );
            }
            res
        })
        .collect()
}

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    fn source(items: &[(&str, &str)]) -> HashMap<String, String> {
        items
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let options = Options::from_source(&source(&[]));
        assert_eq!(options, Options::default());
        assert_eq!(options.patience, Duration::from_millis(1500));
        assert_eq!(options.redemption, 3);
        assert!(!options.dnssec_enabled);
    }

    #[rstest]
    #[case(&[(DNS_PATIENCE, "250")], Duration::from_millis(250), 3, false)]
    #[case(&[(DNS_PATIENCE, "soon")], Duration::from_millis(1500), 3, false)]
    #[case(&[(DNS_REDEMPTION, " 5 ")], Duration::from_millis(1500), 5, false)]
    #[case(&[(DNS_REDEMPTION, "-1")], Duration::from_millis(1500), 3, false)]
    #[case(&[(DNSSEC_ENABLED, "TRUE")], Duration::from_millis(1500), 3, true)]
    #[case(&[(DNSSEC_ENABLED, "maybe")], Duration::from_millis(1500), 3, false)]
    fn parse_values(
        #[case] items: &[(&str, &str)],
        #[case] patience: Duration,
        #[case] redemption: u32,
        #[case] dnssec_enabled: bool,
    ) {
        let options = Options::from_source(&source(items));
        assert_eq!(options.patience, patience);
        assert_eq!(options.redemption, redemption);
        assert_eq!(options.dnssec_enabled, dnssec_enabled);
    }

    #[test]
    fn backup_servers() {
        let options = Options::from_source(&source(&[(
            DNS_BACKUP_RESOLVERS,
            "192.0.2.1, 192.0.2.2:5353,,[2001:db8::1]:54, 2001:db8::2, bogus",
        )]));
        assert_eq!(
            options.backup_servers,
            vec![
                "192.0.2.1:53".parse::<SocketAddr>().unwrap(),
                "192.0.2.2:5353".parse().unwrap(),
                "[2001:db8::1]:54".parse().unwrap(),
                "[2001:db8::2]:53".parse().unwrap(),
            ]
        );
    }

    #[test]
    fn parse_bracketed_server() {
        assert_eq!(
            parse_server("[2001:db8::3]"),
            Some("[2001:db8::3]:53".parse().unwrap())
        );
        assert_eq!(parse_server("192.0.2.1:99999"), None);
    }
}
