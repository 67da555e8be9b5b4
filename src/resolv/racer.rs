//! Racing a query against several servers.
//!
//! A [`Race`] sends one logical query to a number of targets concurrently
//! and produces exactly one result. The primary target is a chain of
//! servers tried in order, every backup server is a target of its own.
//!
//! Answers that carry SERVFAIL count as failed attempts. Backup answers are
//! accepted as soon as they arrive. Primary answers are accepted only if
//! they are [satisfactory][is_satisfactory]; otherwise they are deferred in
//! case something better arrives and returned only if all other attempts
//! fail. If nothing usable arrives at all, the first failure is returned.
//!
//! Dropping a race abandons all attempts still in flight.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use smallvec::SmallVec;
use tokio::time::{self, Instant};
use tracing::{debug, trace};

use crate::base::iana::{Rcode, Rtype};
use crate::base::Message;
use crate::net::client::error::Error as ClientError;
use crate::net::client::request::{RequestMessage, SendRequest};
use crate::resolv::error::Error;
use crate::resolv::redundancy::RoundOutcome;

//------------ Role ----------------------------------------------------------

/// The role of a target in a race.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Role {
    Primary,
    Backup,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Role::Primary => "primary",
            Role::Backup => "backup",
        })
    }
}

//------------ Upstream ------------------------------------------------------

/// A server together with the transport bound to it.
#[derive(Clone, Debug)]
pub struct Upstream {
    addr: SocketAddr,
    conn: Arc<dyn SendRequest>,
}

impl Upstream {
    pub fn new(addr: SocketAddr, conn: Arc<dyn SendRequest>) -> Self {
        Upstream { addr, conn }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Sends `request` to the server, waiting at most its timeout.
    async fn query(&self, request: RequestMessage) -> Result<Message, Error> {
        let timeout = request.config().timeout();
        let mut pending = self.conn.send_request(request);
        match time::timeout(timeout, pending.get_response()).await {
            Ok(Ok(answer)) if answer.rcode() == Rcode::SERVFAIL => {
                Err(Error::ServerFailure)
            }
            Ok(Ok(answer)) => Ok(answer),
            Ok(Err(err)) => Err(Error::Transport(err)),
            Err(_) => Err(Error::Transport(ClientError::RequestTimeout)),
        }
    }
}

/// An ordered list of servers tried one after another.
pub type Chain = SmallVec<[Upstream; 3]>;

//------------ is_satisfactory -----------------------------------------------

/// Returns whether a primary’s answer can be accepted.
///
/// An answer is satisfactory if it contains any data records or if the
/// question is for AAAA or NAPTR records and the server reports that there
/// are none. Many names legitimately don’t have these. A bare NXDOMAIN is
/// not satisfactory, the backups should get a say.
pub fn is_satisfactory(answer: &Message) -> bool {
    match answer.rcode() {
        Rcode::SERVFAIL => false,
        _ if answer.has_data_records() => true,
        Rcode::NOERROR => answer.first_question().map_or(false, |question| {
            matches!(question.qtype(), Rtype::AAAA | Rtype::NAPTR)
        }),
        _ => false,
    }
}

//------------ Attempt -------------------------------------------------------

/// The result of one target of a race.
struct Attempt {
    role: Role,
    server: Option<SocketAddr>,
    result: Result<Message, Error>,
    elapsed: Duration,
}

/// Runs the query against `chain`, one server after another.
fn run_chain(
    role: Role,
    chain: Chain,
    request: RequestMessage,
    start: Instant,
) -> impl Future<Output = Attempt> + Send {
    async move {
        let mut first_error = None;
        for upstream in chain {
            match upstream.query(request.clone()).await {
                Ok(answer) => {
                    let elapsed = start.elapsed();
                    trace!(
                        %role,
                        server = %upstream.addr(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "received answer"
                    );
                    return Attempt {
                        role,
                        server: Some(upstream.addr()),
                        result: Ok(answer),
                        elapsed,
                    };
                }
                Err(err) => {
                    debug!(
                        %role,
                        server = %upstream.addr(),
                        "attempt failed: {}", err
                    );
                    if first_error.is_none() {
                        first_error = Some(err)
                    }
                }
            }
        }
        Attempt {
            role,
            server: None,
            result: Err(first_error.unwrap_or(Error::NoServers)),
            elapsed: start.elapsed(),
        }
    }
}

//------------ PrimaryVerdict ------------------------------------------------

/// What became of the primary while waiting for it alone.
#[derive(Debug)]
pub enum PrimaryVerdict {
    /// The primary produced a satisfactory answer in time.
    Accepted { answer: Message, elapsed: Duration },

    /// The backups need to be asked.
    Escalate(Escalation),
}

/// Why the backups need to be asked.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Escalation {
    /// The primary didn’t answer within the patience timeout.
    Patience,

    /// The primary failed.
    Failed,

    /// The primary’s answer wasn’t satisfactory.
    Unsatisfactory,
}

impl fmt::Display for Escalation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Escalation::Patience => "patience exceeded",
            Escalation::Failed => "primary failed",
            Escalation::Unsatisfactory => "unsatisfactory answer",
        })
    }
}

//------------ RaceOutcome ---------------------------------------------------

/// The result of a finished race.
#[derive(Debug)]
pub struct RaceOutcome {
    /// The answer or the first failure.
    pub result: Result<Message, Error>,

    /// Who produced the accepted answer.
    ///
    /// This is `None` if there was no accepted answer. A deferred
    /// unsatisfactory answer is returned without a winner.
    pub winner: Option<Role>,

    /// How long the primary took to answer if it did.
    pub primary_elapsed: Option<Duration>,
}

impl RaceOutcome {
    /// Returns the outcome for the redundancy controller.
    pub fn round_outcome(&self) -> RoundOutcome {
        RoundOutcome::raced(
            self.primary_elapsed,
            self.winner == Some(Role::Primary),
        )
    }
}

//------------ Race ----------------------------------------------------------

/// A query in flight to one or more targets.
pub struct Race {
    request: RequestMessage,
    attempts: FuturesUnordered<BoxFuture<'static, Attempt>>,
    start: Instant,
    primary_elapsed: Option<Duration>,
    deferred: Option<Message>,
    first_error: Option<Error>,
}

impl Race {
    /// Starts a race for `request`. No targets are launched yet.
    pub fn new(request: RequestMessage) -> Self {
        Race {
            request,
            attempts: FuturesUnordered::new(),
            start: Instant::now(),
            primary_elapsed: None,
            deferred: None,
            first_error: None,
        }
    }

    /// Returns the time since the race was started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Adds a target.
    ///
    /// Empty chains are ignored.
    pub fn launch(&mut self, role: Role, chain: Chain) {
        if chain.is_empty() {
            return;
        }
        self.attempts.push(
            run_chain(role, chain, self.request.clone(), self.start).boxed(),
        );
    }

    /// Waits for the primary alone for up to `patience`.
    ///
    /// This must only be used while the primary is the only target.
    pub async fn wait_primary(&mut self, patience: Duration) -> PrimaryVerdict {
        let deadline = self.start + patience;
        let attempt = match time::timeout_at(deadline, self.attempts.next())
            .await
        {
            Ok(Some(attempt)) => attempt,
            Ok(None) => return PrimaryVerdict::Escalate(Escalation::Failed),
            Err(_) => return PrimaryVerdict::Escalate(Escalation::Patience),
        };
        match attempt.result {
            Ok(answer) => {
                self.primary_elapsed = Some(attempt.elapsed);
                if is_satisfactory(&answer) {
                    PrimaryVerdict::Accepted {
                        answer,
                        elapsed: attempt.elapsed,
                    }
                } else {
                    self.deferred = Some(answer);
                    PrimaryVerdict::Escalate(Escalation::Unsatisfactory)
                }
            }
            Err(err) => {
                self.note_error(err);
                PrimaryVerdict::Escalate(Escalation::Failed)
            }
        }
    }

    /// Waits for the first acceptable answer of all targets.
    ///
    /// If the primary and a backup have answered by the time the first of
    /// them is looked at, the primary wins.
    pub async fn finish(mut self) -> RaceOutcome {
        while let Some(attempt) = self.attempts.next().await {
            let Some((role, answer)) = self.accept(attempt) else {
                continue;
            };
            let (role, answer) = if role == Role::Backup {
                self.prefer_ready_primary(answer)
            } else {
                (role, answer)
            };
            trace!(
                winner = %role,
                elapsed_ms = self.start.elapsed().as_millis() as u64,
                "race decided"
            );
            return RaceOutcome {
                result: Ok(answer),
                winner: Some(role),
                primary_elapsed: self.primary_elapsed,
            };
        }

        let result = match (self.deferred.take(), self.first_error.take()) {
            (Some(answer), _) => Ok(answer),
            (None, Some(err)) => Err(err),
            (None, None) => Err(Error::NoServers),
        };
        RaceOutcome {
            result,
            winner: None,
            primary_elapsed: self.primary_elapsed,
        }
    }

    /// Checks whether a primary answer is ready alongside a backup’s.
    fn prefer_ready_primary(&mut self, backup: Message) -> (Role, Message) {
        while let Some(Some(attempt)) = self.attempts.next().now_or_never() {
            if attempt.role != Role::Primary {
                continue;
            }
            if let Some((role, answer)) = self.accept(attempt) {
                return (role, answer);
            }
        }
        (Role::Backup, backup)
    }

    /// Processes a finished attempt, returning an acceptable answer.
    fn accept(&mut self, attempt: Attempt) -> Option<(Role, Message)> {
        match attempt.result {
            Ok(answer) => match attempt.role {
                Role::Backup => Some((Role::Backup, answer)),
                Role::Primary => {
                    self.primary_elapsed = Some(attempt.elapsed);
                    if is_satisfactory(&answer) {
                        Some((Role::Primary, answer))
                    } else {
                        debug!(
                            server = ?attempt.server,
                            rcode = %answer.rcode(),
                            "deferring unsatisfactory answer"
                        );
                        if self.deferred.is_none() {
                            self.deferred = Some(answer);
                        }
                        None
                    }
                }
            },
            Err(err) => {
                self.note_error(err);
                None
            }
        }
    }

    fn note_error(&mut self, err: Error) {
        if self.first_error.is_none() {
            self.first_error = Some(err)
        }
    }
}

impl fmt::Debug for Race {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Race")
            .field("request", &self.request)
            .field("pending", &self.attempts.len())
            .field("primary_elapsed", &self.primary_elapsed)
            .field("deferred", &self.deferred.is_some())
            .field("first_error", &self.first_error)
            .finish()
    }
}

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::iana::Class;
    use crate::base::message_builder::Section;
    use crate::base::{Dname, MessageBuilder};
    use crate::net::client::request::GetResponse;
    use crate::resolv::config::ResolverConfig;
    use rstest::rstest;
    use std::pin::Pin;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy, Debug)]
    enum Reply {
        Data,
        Empty,
        ServFail,
        Refused,
        Silent,
    }

    #[derive(Debug)]
    struct Scripted {
        delay: Duration,
        reply: Reply,
        requests: AtomicUsize,
    }

    impl Scripted {
        fn upstream(port: u16, delay: u64, reply: Reply) -> (Upstream, Arc<Self>) {
            let conn = Arc::new(Scripted {
                delay: Duration::from_millis(delay),
                reply,
                requests: AtomicUsize::new(0),
            });
            let addr = SocketAddr::from(([192, 0, 2, 1], port));
            (Upstream::new(addr, conn.clone()), conn)
        }
    }

    impl SendRequest for Scripted {
        fn send_request(
            &self,
            request_msg: RequestMessage,
        ) -> Box<dyn GetResponse + Send> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Box::new(ScriptedRequest {
                delay: self.delay,
                reply: self.reply,
                query: request_msg.message().clone(),
            })
        }
    }

    #[derive(Debug)]
    struct ScriptedRequest {
        delay: Duration,
        reply: Reply,
        query: Message,
    }

    impl GetResponse for ScriptedRequest {
        fn get_response(
            &mut self,
        ) -> Pin<Box<dyn Future<Output = Result<Message, ClientError>> + Send + '_>>
        {
            Box::pin(async move {
                time::sleep(self.delay).await;
                match self.reply {
                    Reply::Data => Ok(answer(&self.query, Rcode::NOERROR, true)),
                    Reply::Empty => Ok(answer(&self.query, Rcode::NOERROR, false)),
                    Reply::ServFail => {
                        Ok(answer(&self.query, Rcode::SERVFAIL, false))
                    }
                    Reply::Refused => {
                        Ok(answer(&self.query, Rcode::REFUSED, false))
                    }
                    Reply::Silent => std::future::pending().await,
                }
            })
        }
    }

    fn answer(query: &Message, rcode: Rcode, data: bool) -> Message {
        let mut builder = MessageBuilder::start_answer(query, rcode);
        if data {
            let qname = query.first_question().unwrap().qname().clone();
            builder
                .push_record(
                    Section::Answer,
                    &qname,
                    Rtype::A,
                    Class::IN,
                    300,
                    &[192, 0, 2, 80],
                )
                .unwrap();
        }
        builder.into_message().unwrap()
    }

    fn query(qtype: Rtype) -> Message {
        let name = Dname::from_str("www.example.com").unwrap();
        MessageBuilder::new_query(&name, qtype).into_message().unwrap()
    }

    fn request(timeout: u64) -> RequestMessage {
        let mut config = ResolverConfig::default();
        config.set_timeout(Duration::from_millis(timeout)).unwrap();
        RequestMessage::new(query(Rtype::A), Arc::new(config))
    }

    fn chain(upstreams: &[Upstream]) -> Chain {
        upstreams.iter().cloned().collect()
    }

    #[rstest]
    #[case(Rtype::A, Rcode::NOERROR, true, true)]
    #[case(Rtype::A, Rcode::NOERROR, false, false)]
    #[case(Rtype::AAAA, Rcode::NOERROR, false, true)]
    #[case(Rtype::NAPTR, Rcode::NOERROR, false, true)]
    #[case(Rtype::SRV, Rcode::NXDOMAIN, false, false)]
    #[case(Rtype::SRV, Rcode::NXDOMAIN, true, true)]
    #[case(Rtype::A, Rcode::REFUSED, false, false)]
    #[case(Rtype::A, Rcode::SERVFAIL, true, false)]
    fn satisfactory(
        #[case] qtype: Rtype,
        #[case] rcode: Rcode,
        #[case] data: bool,
        #[case] expected: bool,
    ) {
        assert_eq!(is_satisfactory(&answer(&query(qtype), rcode, data)), expected);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn primary_accepted_in_time() {
        let (primary, _) = Scripted::upstream(53, 100, Reply::Data);
        let mut race = Race::new(request(5000));
        race.launch(Role::Primary, chain(&[primary]));
        match race.wait_primary(Duration::from_millis(1500)).await {
            PrimaryVerdict::Accepted { elapsed, .. } => {
                assert_eq!(elapsed, Duration::from_millis(100))
            }
            other => panic!("unexpected verdict {:?}", other),
        }
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn escalation_reasons() {
        let (slow, _) = Scripted::upstream(53, 2000, Reply::Data);
        let mut race = Race::new(request(5000));
        race.launch(Role::Primary, chain(&[slow]));
        assert!(matches!(
            race.wait_primary(Duration::from_millis(1500)).await,
            PrimaryVerdict::Escalate(Escalation::Patience)
        ));

        let (empty, _) = Scripted::upstream(53, 10, Reply::Empty);
        let mut race = Race::new(request(5000));
        race.launch(Role::Primary, chain(&[empty]));
        assert!(matches!(
            race.wait_primary(Duration::from_millis(1500)).await,
            PrimaryVerdict::Escalate(Escalation::Unsatisfactory)
        ));

        let (failing, _) = Scripted::upstream(53, 10, Reply::ServFail);
        let mut race = Race::new(request(5000));
        race.launch(Role::Primary, chain(&[failing]));
        assert!(matches!(
            race.wait_primary(Duration::from_millis(1500)).await,
            PrimaryVerdict::Escalate(Escalation::Failed)
        ));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn backup_wins_against_slow_primary() {
        let (primary, _) = Scripted::upstream(53, 2000, Reply::Data);
        let (backup, _) = Scripted::upstream(54, 50, Reply::Data);
        let mut race = Race::new(request(5000));
        race.launch(Role::Primary, chain(&[primary]));
        race.launch(Role::Backup, chain(&[backup]));
        let outcome = race.finish().await;
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.winner, Some(Role::Backup));
        assert_eq!(outcome.primary_elapsed, None);
        assert!(!outcome.round_outcome().primary_accepted);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn simultaneous_answers_prefer_primary() {
        let (primary, _) = Scripted::upstream(53, 100, Reply::Data);
        let (backup, _) = Scripted::upstream(54, 100, Reply::Data);
        let mut race = Race::new(request(5000));
        race.launch(Role::Backup, chain(&[backup]));
        race.launch(Role::Primary, chain(&[primary]));
        let outcome = race.finish().await;
        assert_eq!(outcome.winner, Some(Role::Primary));
        assert_eq!(outcome.primary_elapsed, Some(Duration::from_millis(100)));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn unsatisfactory_primary_is_deferred() {
        let (primary, _) = Scripted::upstream(53, 10, Reply::Empty);
        let (backup, _) = Scripted::upstream(54, 50, Reply::Silent);
        let mut race = Race::new(request(1000));
        race.launch(Role::Primary, chain(&[primary]));
        race.launch(Role::Backup, chain(&[backup]));
        let outcome = race.finish().await;
        let answer = outcome.result.unwrap();
        assert_eq!(answer.rcode(), Rcode::NOERROR);
        assert!(!answer.has_data_records());
        assert_eq!(outcome.winner, None);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn all_failing_returns_first_error() {
        let (primary, _) = Scripted::upstream(53, 10, Reply::ServFail);
        let (backup, _) = Scripted::upstream(54, 50, Reply::Silent);
        let mut race = Race::new(request(1000));
        race.launch(Role::Primary, chain(&[primary]));
        race.launch(Role::Backup, chain(&[backup]));
        let outcome = race.finish().await;
        assert!(matches!(outcome.result, Err(Error::ServerFailure)));
        assert_eq!(outcome.winner, None);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn chain_moves_on_after_timeout() {
        let (dead, dead_conn) = Scripted::upstream(53, 0, Reply::Silent);
        let (alive, alive_conn) = Scripted::upstream(54, 10, Reply::Refused);
        let mut race = Race::new(request(300));
        race.launch(Role::Primary, chain(&[dead, alive]));
        let outcome = race.finish().await;
        assert_eq!(outcome.result.unwrap().rcode(), Rcode::REFUSED);
        assert_eq!(outcome.primary_elapsed, Some(Duration::from_millis(310)));
        assert_eq!(dead_conn.requests.load(Ordering::SeqCst), 1);
        assert_eq!(alive_conn.requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn empty_race() {
        let mut race = Race::new(request(300));
        race.launch(Role::Backup, Chain::new());
        assert!(matches!(race.finish().await.result, Err(Error::NoServers)));
    }
}
