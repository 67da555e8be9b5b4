//! The resolver racing primary servers against backup servers.
//!
//! A [`ParallelResolver`] normally asks only its primary servers, usually
//! those from the system’s `/etc/resolv.conf`. If they don’t produce a
//! satisfactory answer within the patience timeout, the same query is sent
//! to the backup servers as well and the first acceptable answer is used.
//! From then on, all queries are raced against the backup servers until
//! the primary servers have won a number of consecutive races. See the
//! [redundancy][super::redundancy] module for the details.
//!
//! Configuration changes take effect for queries started afterwards.
//! Queries in flight continue with the configuration and the servers they
//! started with.
//!
//! # Example
//!
//! ```no_run
//! # use std::str::FromStr;
//! # use domain_parallel::base::{Dname, MessageBuilder, Rtype};
//! # use domain_parallel::resolv::ParallelResolver;
//! # async fn _test() {
//! let resolver = ParallelResolver::new();
//! resolver
//!     .set_backup_servers(vec!["192.0.2.53:53".parse().unwrap()]);
//! let name = Dname::from_str("_sip._udp.example.com").unwrap();
//! let query = MessageBuilder::new_query(&name, Rtype::SRV)
//!     .into_message()
//!     .unwrap();
//! let answer = resolver.send(query).await;
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use smallvec::smallvec;
use tokio::runtime;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::base::opt::EdnsOption;
use crate::base::Message;
use crate::net::client::request::{Connect, RequestMessage, UdpTcpConnect};
use crate::resolv::conf::{ResolvConf, SYSTEM_PATH};
use crate::resolv::config::{ConfigError, ResolverConfig};
use crate::resolv::error::Error;
use crate::resolv::options::{Environment, OptionSource, Options};
use crate::resolv::racer::{Chain, PrimaryVerdict, Race, Role, Upstream};
use crate::resolv::redundancy::{
    Controller, Mode, RedundancyState, RoundOutcome,
};
use crate::resolv::resolver::Resolve;
#[cfg(feature = "tsig")]
use crate::tsig::Key;
use crate::validator::{AdFlagValidator, ValidatingResolver};

//------------ ParallelResolver ----------------------------------------------

/// A resolver racing its primary servers against backup servers.
///
/// Values are cheap to clone. All clones share configuration and
/// redundancy state.
#[derive(Clone)]
pub struct ParallelResolver {
    inner: Arc<Inner>,
}

struct Inner {
    /// The current per-query configuration.
    config: ArcSwap<ResolverConfig>,

    /// The current servers with their transports.
    servers: ArcSwap<ServerSet>,

    /// The options read at creation or the last reset.
    options: ArcSwap<Options>,

    controller: Controller,

    /// The server addresses the server set is built from.
    ///
    /// The lock also serializes all configuration changes.
    settings: Mutex<Settings>,

    /// The start of the primary chain if rotation is enabled.
    rotation: AtomicUsize,

    connect: Arc<dyn Connect>,
    source: Box<dyn OptionSource>,
    conf: ConfSource,
}

/// Where the system configuration comes from.
#[derive(Clone, Debug)]
enum ConfSource {
    Path(PathBuf),
    Fixed(ResolvConf),
}

impl ConfSource {
    fn load(&self) -> ResolvConf {
        match *self {
            ConfSource::Path(ref path) => ResolvConf::from_path_or_default(path),
            ConfSource::Fixed(ref conf) => conf.clone(),
        }
    }
}

#[derive(Clone, Debug)]
struct Settings {
    default_servers: Vec<SocketAddr>,
    backup_servers: Vec<SocketAddr>,

    /// Overrides the port of the default servers.
    port: Option<u16>,

    rotate: bool,
}

/// The servers used by queries.
#[derive(Debug, Default)]
struct ServerSet {
    primary: Chain,
    backups: Vec<Upstream>,
    rotate: bool,
}

/// # Creation
///
impl ParallelResolver {
    /// Creates a resolver using the system configuration.
    ///
    /// Primary servers and defaults are taken from `/etc/resolv.conf`,
    /// the options are taken from the environment.
    pub fn new() -> Self {
        Self::from_parts(
            ConfSource::Path(SYSTEM_PATH.into()),
            Box::new(Environment),
            Arc::new(UdpTcpConnect),
        )
    }

    /// Creates a resolver reading the configuration file at `path`.
    ///
    /// The file is read again on every reset.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self::from_parts(
            ConfSource::Path(path.as_ref().into()),
            Box::new(Environment),
            Arc::new(UdpTcpConnect),
        )
    }

    /// Creates a resolver from the given configuration.
    pub fn from_conf(conf: ResolvConf) -> Self {
        Self::from_parts(
            ConfSource::Fixed(conf),
            Box::new(Environment),
            Arc::new(UdpTcpConnect),
        )
    }

    /// Creates a resolver with all its collaborators given explicitly.
    ///
    /// The options are read from `source` and transports for the servers
    /// are created by `connect`.
    pub fn with_parts(
        conf: ResolvConf,
        source: impl OptionSource + 'static,
        connect: impl Connect + 'static,
    ) -> Self {
        Self::from_parts(
            ConfSource::Fixed(conf),
            Box::new(source),
            Arc::new(connect),
        )
    }

    fn from_parts(
        conf: ConfSource,
        source: Box<dyn OptionSource>,
        connect: Arc<dyn Connect>,
    ) -> Self {
        let resolv_conf = conf.load();
        let options = Options::from_source(source.as_ref());
        let settings = Settings {
            default_servers: resolv_conf.servers.clone(),
            backup_servers: options.backup_servers.clone(),
            port: None,
            rotate: resolv_conf.options.rotate,
        };
        let servers = settings.build(connect.as_ref());
        ParallelResolver {
            inner: Arc::new(Inner {
                config: ArcSwap::from_pointee(
                    ResolverConfig::from_resolv_conf(&resolv_conf),
                ),
                servers: ArcSwap::from_pointee(servers),
                controller: Controller::from_options(&options),
                options: ArcSwap::from_pointee(options),
                settings: Mutex::new(settings),
                rotation: AtomicUsize::new(0),
                connect,
                source,
                conf,
            }),
        }
    }

    /// Converts the resolver into one that validates if configured.
    ///
    /// If the `DNSSEC_ENABLED` option is set, the returned resolver
    /// validates all answers with an [`AdFlagValidator`].
    pub fn into_resolver(self) -> Box<dyn Resolve> {
        if self.options().dnssec_enabled {
            Box::new(ValidatingResolver::new(self, AdFlagValidator::new()))
        } else {
            Box::new(self)
        }
    }
}

/// # Queries
///
impl ParallelResolver {
    /// Sends a query and waits for the answer.
    ///
    /// Only the final result of the query is reported. Failures of
    /// individual servers are not.
    pub async fn send(&self, query: Message) -> Result<Message, Error> {
        self.inner.resolve(query).await
    }

    /// Sends a query and blocks the current thread until it is answered.
    ///
    /// This runs the query on a runtime of its own.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous runtime.
    pub fn send_blocking(&self, query: Message) -> Result<Message, Error> {
        let runtime = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| Error::Runtime(Arc::new(err)))?;
        runtime.block_on(self.send(query))
    }

    /// Starts a query and calls `callback` with its result.
    ///
    /// The query runs as a task on the current Tokio runtime. The callback
    /// is called at most once and not at all if the query is cancelled
    /// before it finished.
    pub fn send_async<F>(
        &self,
        query: Message,
        callback: F,
    ) -> Result<QueryHandle, Error>
    where
        F: FnOnce(Result<Message, Error>) + Send + 'static,
    {
        let handle =
            runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let id = query.header().id();
        let inner = self.inner.clone();
        let task = handle.spawn(async move {
            let res = inner.resolve(query).await;
            callback(res)
        });
        Ok(QueryHandle { id, task })
    }
}

/// # Configuration
///
impl ParallelResolver {
    /// Returns the current per-query configuration.
    pub fn config(&self) -> Arc<ResolverConfig> {
        self.inner.config.load_full()
    }

    /// Returns the options in effect.
    pub fn options(&self) -> Arc<Options> {
        self.inner.options.load_full()
    }

    /// Returns the primary servers.
    pub fn default_servers(&self) -> Vec<SocketAddr> {
        self.inner
            .servers
            .load()
            .primary
            .iter()
            .map(Upstream::addr)
            .collect()
    }

    /// Returns the backup servers.
    pub fn backup_servers(&self) -> Vec<SocketAddr> {
        self.inner
            .servers
            .load()
            .backups
            .iter()
            .map(Upstream::addr)
            .collect()
    }

    /// Replaces the primary servers.
    ///
    /// The servers are tried in the given order. The redundancy state is
    /// reset.
    pub fn set_default_servers(
        &self,
        servers: Vec<SocketAddr>,
    ) -> Result<(), ConfigError> {
        if servers.is_empty() {
            return Err(ConfigError::NoServers);
        }
        self.inner.update_servers(|settings| {
            settings.default_servers = servers;
        });
        Ok(())
    }

    /// Replaces the backup servers.
    ///
    /// The redundancy state is reset. An empty list disables racing.
    pub fn set_backup_servers(&self, servers: Vec<SocketAddr>) {
        self.inner.update_servers(|settings| {
            settings.backup_servers = servers;
        })
    }

    /// Sets the port used with the primary servers.
    ///
    /// The redundancy state is reset.
    pub fn set_port(&self, port: u16) {
        self.inner.update_servers(|settings| settings.port = Some(port))
    }

    /// Sets whether to use TCP right away.
    pub fn set_tcp(&self, value: bool) {
        self.inner.update_config(|config| config.set_use_tcp(value))
    }

    /// Sets whether to accept truncated answers.
    pub fn set_ignore_truncation(&self, value: bool) {
        self.inner
            .update_config(|config| config.set_ignore_truncation(value))
    }

    /// Configures EDNS for outgoing queries.
    ///
    /// See [`ResolverConfig::set_edns`] for the meaning of the arguments.
    /// If they are rejected, the configuration stays unchanged.
    pub fn set_edns(
        &self,
        level: i32,
        payload_size: u16,
        flags: u16,
        options: Vec<EdnsOption>,
    ) -> Result<(), ConfigError> {
        self.inner.try_update_config(|config| {
            config.set_edns(level, payload_size, flags, options)
        })
    }

    /// Sets the key to sign queries with.
    #[cfg(feature = "tsig")]
    pub fn set_tsig_key(&self, key: Option<Key>) {
        self.inner
            .update_config(|config| config.set_tsig_key(key.map(Arc::new)))
    }

    /// Sets the timeout for each attempt against a server.
    pub fn set_timeout(&self, timeout: Duration) -> Result<(), ConfigError> {
        self.inner.try_update_config(|config| config.set_timeout(timeout))
    }

    /// Sets the local port for UDP; zero picks a random one.
    pub fn set_local_port(&self, port: u16) {
        self.inner.update_config(|config| config.set_local_port(port))
    }

    /// Sets the patience timeout.
    pub fn set_patience(&self, patience: Duration) {
        self.inner.controller.set_patience(patience)
    }

    /// Sets the redemption threshold.
    pub fn set_redemption(&self, redemption: u32) {
        self.inner.controller.set_redemption(redemption)
    }

    /// Re-reads the system configuration and the options.
    ///
    /// All servers are replaced by the configured ones and their transports
    /// are recreated. The redundancy state is reset. A port set via
    /// [`set_port`][Self::set_port] and the per-query configuration are
    /// kept.
    pub fn reset(&self) {
        let conf = self.inner.conf.load();
        let options = Options::from_source(self.inner.source.as_ref());
        self.inner.controller.set_patience(options.patience);
        self.inner.controller.set_redemption(options.redemption);
        let backups = options.backup_servers.clone();
        self.inner.options.store(Arc::new(options));
        self.inner.update_servers(|settings| {
            settings.default_servers = conf.servers;
            settings.backup_servers = backups;
            settings.rotate = conf.options.rotate;
        });
    }
}

/// # Redundancy State
///
impl ParallelResolver {
    /// Returns the mode the next query will use.
    pub fn mode(&self) -> Mode {
        self.inner.controller.decide_mode()
    }

    /// Returns a snapshot of the redundancy state.
    pub fn redundancy(&self) -> RedundancyState {
        self.inner.controller.state()
    }
}

impl Default for ParallelResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolve for ParallelResolver {
    fn query(
        &self,
        query: Message,
    ) -> Pin<Box<dyn Future<Output = Result<Message, Error>> + Send + '_>> {
        Box::pin(self.send(query))
    }
}

impl fmt::Debug for ParallelResolver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ParallelResolver")
            .field("config", &self.inner.config.load_full())
            .field("servers", &self.inner.servers.load_full())
            .field("redundancy", &self.inner.controller.state())
            .field("conf", &self.inner.conf)
            .finish()
    }
}

//------------ Inner ---------------------------------------------------------

impl Inner {
    async fn resolve(&self, query: Message) -> Result<Message, Error> {
        let config = self.config.load_full();
        let servers = self.servers.load_full();
        let request = RequestMessage::new(query, config);
        let question = request
            .message()
            .first_question()
            .map(ToString::to_string)
            .unwrap_or_default();
        let mut race = Race::new(request);

        let mode = self.controller.decide_mode();
        let outcome = match mode {
            Mode::Normal => {
                race.launch(Role::Primary, self.primary_chain(&servers));
                match race.wait_primary(self.controller.patience()).await {
                    PrimaryVerdict::Accepted { answer, elapsed } => {
                        self.controller
                            .record_outcome(RoundOutcome::primary_only(elapsed));
                        return Ok(answer);
                    }
                    PrimaryVerdict::Escalate(reason) => {
                        self.controller
                            .record_outcome(RoundOutcome::primary_failed());
                        debug!(
                            %question,
                            %reason,
                            backups = servers.backups.len(),
                            "asking backup servers"
                        );
                        Self::launch_backups(&mut race, &servers);
                        race.finish().await
                    }
                }
            }
            Mode::Redundant => {
                race.launch(Role::Primary, self.primary_chain(&servers));
                Self::launch_backups(&mut race, &servers);
                let outcome = race.finish().await;
                self.controller.record_outcome(outcome.round_outcome());
                outcome
            }
        };

        if let Err(ref err) = outcome.result {
            warn!(%question, %mode, "query failed: {}", err);
        }
        outcome.result
    }

    fn primary_chain(&self, servers: &ServerSet) -> Chain {
        let mut chain = servers.primary.clone();
        if servers.rotate && chain.len() > 1 {
            let start = self.rotation.fetch_add(1, Ordering::Relaxed);
            chain.rotate_left(start % servers.primary.len());
        }
        chain
    }

    fn launch_backups(race: &mut Race, servers: &ServerSet) {
        for backup in &servers.backups {
            race.launch(Role::Backup, smallvec![backup.clone()]);
        }
    }

    fn update_config<F: FnOnce(&mut ResolverConfig)>(&self, op: F) {
        let _settings = self.settings.lock();
        let mut config = ResolverConfig::clone(&self.config.load());
        op(&mut config);
        self.config.store(Arc::new(config));
    }

    /// Applies a configuration change that may be rejected.
    ///
    /// The configuration is left untouched if `op` fails.
    fn try_update_config<F>(&self, op: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut ResolverConfig) -> Result<(), ConfigError>,
    {
        let _settings = self.settings.lock();
        let mut config = ResolverConfig::clone(&self.config.load());
        op(&mut config)?;
        self.config.store(Arc::new(config));
        Ok(())
    }

    /// Changes the servers, rebuilds their transports, and resets state.
    fn update_servers<F: FnOnce(&mut Settings)>(&self, op: F) {
        let mut settings = self.settings.lock();
        op(&mut settings);
        self.servers
            .store(Arc::new(settings.build(self.connect.as_ref())));
        self.controller.reset();
    }
}

//------------ Settings ------------------------------------------------------

impl Settings {
    fn build(&self, connect: &dyn Connect) -> ServerSet {
        let port = self.port;
        ServerSet {
            primary: self
                .default_servers
                .iter()
                .map(|addr| {
                    let mut addr = *addr;
                    if let Some(port) = port {
                        addr.set_port(port)
                    }
                    Upstream::new(addr, connect.connect(addr))
                })
                .collect(),
            backups: self
                .backup_servers
                .iter()
                .map(|addr| Upstream::new(*addr, connect.connect(*addr)))
                .collect(),
            rotate: self.rotate,
        }
    }
}

//------------ QueryHandle ---------------------------------------------------

/// A handle to a query started with [`ParallelResolver::send_async`].
#[derive(Debug)]
pub struct QueryHandle {
    id: u16,
    task: JoinHandle<()>,
}

impl QueryHandle {
    /// Returns the message ID of the query.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Returns whether the query has finished.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops waiting for the query.
    ///
    /// Network I/O already underway may continue until its sockets are
    /// dropped.
    pub fn cancel(&self) {
        self.task.abort()
    }
}

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{Dname, MessageBuilder, Rtype};
    use crate::resolv::options::{DNS_BACKUP_RESOLVERS, DNS_PATIENCE};
    use std::collections::HashMap;
    use std::str::FromStr;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    fn resolver(options: &[(&str, &str)]) -> ParallelResolver {
        let mut conf = ResolvConf::new();
        conf.servers.push(addr("192.0.2.1:53"));
        conf.servers.push(addr("192.0.2.2:53"));
        let source: HashMap<String, String> = options
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        ParallelResolver::with_parts(conf, source, UdpTcpConnect)
    }

    #[test]
    fn servers_from_conf_and_options() {
        let resolver = resolver(&[
            (DNS_BACKUP_RESOLVERS, "198.51.100.1, 198.51.100.2:5353"),
            (DNS_PATIENCE, "700"),
        ]);
        assert_eq!(
            resolver.default_servers(),
            vec![addr("192.0.2.1:53"), addr("192.0.2.2:53")]
        );
        assert_eq!(
            resolver.backup_servers(),
            vec![addr("198.51.100.1:53"), addr("198.51.100.2:5353")]
        );
        assert_eq!(resolver.options().patience, Duration::from_millis(700));
        assert_eq!(resolver.mode(), Mode::Normal);
    }

    #[test]
    fn set_port_applies_to_primary() {
        let resolver = resolver(&[(DNS_BACKUP_RESOLVERS, "198.51.100.1")]);
        resolver.set_port(5300);
        assert_eq!(
            resolver.default_servers(),
            vec![addr("192.0.2.1:5300"), addr("192.0.2.2:5300")]
        );
        assert_eq!(resolver.backup_servers(), vec![addr("198.51.100.1:53")]);
        resolver.reset();
        assert_eq!(resolver.default_servers()[0], addr("192.0.2.1:5300"));
    }

    #[test]
    fn rejected_settings_keep_config() {
        let resolver = resolver(&[]);
        resolver.set_timeout(Duration::from_secs(2)).unwrap();
        resolver.set_edns(0, 1232, 0, Vec::new()).unwrap();
        let before = resolver.config();

        assert_eq!(
            resolver.set_timeout(Duration::ZERO),
            Err(ConfigError::InvalidTimeout)
        );
        assert_eq!(
            resolver.set_edns(2, 1232, 0, Vec::new()),
            Err(ConfigError::InvalidEdnsLevel(2))
        );
        assert_eq!(
            resolver.set_default_servers(Vec::new()),
            Err(ConfigError::NoServers)
        );

        let after = resolver.config();
        assert_eq!(after.timeout(), Duration::from_secs(2));
        assert_eq!(after.edns(), before.edns());
        assert_eq!(resolver.default_servers().len(), 2);
    }

    #[test]
    fn setters_replace_snapshot() {
        let resolver = resolver(&[]);
        let old = resolver.config();
        resolver.set_tcp(true);
        resolver.set_ignore_truncation(true);
        resolver.set_local_port(5353);
        assert!(!old.use_tcp());
        let new = resolver.config();
        assert!(new.use_tcp());
        assert!(new.ignore_truncation());
        assert_eq!(new.local_port(), 5353);
    }

    #[test]
    fn send_async_needs_runtime() {
        let resolver = resolver(&[]);
        let name = Dname::from_str("example.com").unwrap();
        let query = MessageBuilder::new_query(&name, Rtype::A)
            .into_message()
            .unwrap();
        let res = resolver.send_async(query, |_| {});
        assert!(matches!(res, Err(Error::NoRuntime)));
    }
}
