//! DNSSEC validation of resolver answers.
//!
//! A [`ValidatingResolver`] wraps another resolver and hands every answer
//! to a [`Validator`] before returning it. If validation fails, the query
//! fails with [`Error::Validation`][crate::resolv::Error::Validation]. That
//! error is final. The wrapped resolver is not asked again and a forged
//! answer is never passed on.
//!
//! This crate doesn’t compute signature chains itself. The provided
//! [`AdFlagValidator`] delegates the work to a validating upstream: it asks
//! for DNSSEC data and accepts only answers the upstream marked as
//! authenticated. Other strategies can be plugged in by implementing
//! [`Validator`].
//!
//! Use [`ParallelResolver::into_resolver`] to get a resolver that
//! validates or not depending on the `DNSSEC_ENABLED` option.
//!
//! [`ParallelResolver::into_resolver`]: crate::resolv::ParallelResolver::into_resolver

use std::error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tracing::warn;

use crate::base::opt::Edns;
use crate::base::wire::ParseError;
use crate::base::{Message, MessageBuilder, PushError};
use crate::resolv::error::Error;
use crate::resolv::resolver::Resolve;

//------------ Validator -----------------------------------------------------

/// A DNSSEC validation strategy.
pub trait Validator: fmt::Debug + Send + Sync {
    /// Prepares a query before it is sent.
    ///
    /// The default implementation leaves the query as it is.
    fn prepare_query(&self, query: Message) -> Result<Message, ValidationError> {
        Ok(query)
    }

    /// Checks `answer` to `query`.
    fn validate<'a>(
        &'a self,
        query: &'a Message,
        answer: &'a Message,
    ) -> Pin<Box<dyn Future<Output = Result<(), ValidationError>> + Send + 'a>>;
}

//------------ AdFlagValidator -----------------------------------------------

/// A validator trusting a validating upstream.
///
/// Queries are sent with the AD bit and the DO bit of EDNS set. Answers
/// are only accepted if they have the AD bit set.
#[derive(Clone, Copy, Debug)]
pub struct AdFlagValidator {
    payload_size: u16,
}

impl AdFlagValidator {
    /// The payload size of the OPT record added to queries without one.
    pub const DEFAULT_PAYLOAD_SIZE: u16 = 1232;

    pub fn new() -> Self {
        AdFlagValidator {
            payload_size: Self::DEFAULT_PAYLOAD_SIZE,
        }
    }

    /// Sets the payload size of OPT records added by the validator.
    pub fn with_payload_size(payload_size: u16) -> Self {
        AdFlagValidator { payload_size }
    }
}

impl Default for AdFlagValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for AdFlagValidator {
    fn prepare_query(&self, query: Message) -> Result<Message, ValidationError> {
        let opt = match query.opt() {
            Some(Ok(opt)) => Some(opt),
            Some(Err(err)) => return Err(err.into()),
            None => None,
        };
        if query.header().ad() && opt.as_ref().map_or(false, Edns::dnssec_ok) {
            return Ok(query);
        }
        let mut builder = MessageBuilder::from_message(&query);
        builder.header_mut().set_ad(true);
        // An existing OPT record is kept as it is.
        if opt.is_none() {
            let mut edns = Edns::new(self.payload_size);
            edns.set_dnssec_ok(true);
            edns.push(&mut builder)?;
        }
        Ok(builder.into_message()?)
    }

    fn validate<'a>(
        &'a self,
        _query: &'a Message,
        answer: &'a Message,
    ) -> Pin<Box<dyn Future<Output = Result<(), ValidationError>> + Send + 'a>>
    {
        Box::pin(async move {
            if answer.header().ad() {
                Ok(())
            } else {
                Err(ValidationError::Unauthenticated)
            }
        })
    }
}

//------------ ValidatingResolver --------------------------------------------

/// A resolver validating the answers of another resolver.
#[derive(Clone, Debug)]
pub struct ValidatingResolver<R, V = AdFlagValidator> {
    resolver: R,
    validator: V,
}

impl<R, V> ValidatingResolver<R, V> {
    pub fn new(resolver: R, validator: V) -> Self {
        ValidatingResolver {
            resolver,
            validator,
        }
    }

    /// Returns a reference to the wrapped resolver.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn validator(&self) -> &V {
        &self.validator
    }
}

impl<R: Resolve, V: Validator> ValidatingResolver<R, V> {
    /// Resolves `query` and validates the answer.
    pub async fn query_validated(&self, query: Message) -> Result<Message, Error> {
        let query = self.validator.prepare_query(query)?;
        let answer = self.resolver.query(query.clone()).await?;
        match self.validator.validate(&query, &answer).await {
            Ok(()) => Ok(answer),
            Err(err) => {
                warn!(
                    question = ?query.first_question().map(|q| q.to_string()),
                    "rejecting answer: {}", err
                );
                Err(Error::Validation(err))
            }
        }
    }
}

impl<R: Resolve, V: Validator> Resolve for ValidatingResolver<R, V> {
    fn query(
        &self,
        query: Message,
    ) -> Pin<Box<dyn Future<Output = Result<Message, Error>> + Send + '_>> {
        Box::pin(self.query_validated(query))
    }
}

//------------ ValidationError -----------------------------------------------

/// An answer was rejected by a validator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ValidationError {
    /// The answer isn’t marked as authenticated.
    Unauthenticated,

    /// A signature didn’t verify.
    BadSignature,

    /// The chain of trust is broken.
    Bogus,

    /// The query couldn’t be prepared for validation.
    Prepare(PushError),

    /// A message couldn’t be parsed.
    Parse(ParseError),
}

impl From<PushError> for ValidationError {
    fn from(err: PushError) -> Self {
        ValidationError::Prepare(err)
    }
}

impl From<ParseError> for ValidationError {
    fn from(err: ParseError) -> Self {
        ValidationError::Parse(err)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ValidationError::Unauthenticated => {
                f.write_str("answer is not authenticated")
            }
            ValidationError::BadSignature => f.write_str("bad signature"),
            ValidationError::Bogus => f.write_str("bogus answer"),
            ValidationError::Prepare(ref err) => {
                write!(f, "cannot prepare query: {}", err)
            }
            ValidationError::Parse(ref err) => {
                write!(f, "cannot parse message: {}", err)
            }
        }
    }
}

impl error::Error for ValidationError {}

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::iana::{Class, Rcode, Rtype};
    use crate::base::message_builder::Section;
    use crate::base::Dname;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every query with one A record, AD set as configured.
    #[derive(Debug)]
    struct FixedResolver {
        ad: bool,
        queries: AtomicUsize,
    }

    impl Resolve for FixedResolver {
        fn query(
            &self,
            query: Message,
        ) -> Pin<Box<dyn Future<Output = Result<Message, Error>> + Send + '_>>
        {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                assert!(query.header().ad());
                let opt = query.opt().unwrap().unwrap();
                assert!(opt.dnssec_ok());
                let mut builder =
                    MessageBuilder::start_answer(&query, Rcode::NOERROR);
                builder.header_mut().set_ad(self.ad);
                let qname = query.first_question().unwrap().qname().clone();
                builder
                    .push_record(
                        Section::Answer,
                        &qname,
                        Rtype::A,
                        Class::IN,
                        60,
                        &[192, 0, 2, 1],
                    )
                    .unwrap();
                Ok(builder.into_message().unwrap())
            })
        }
    }

    fn query() -> Message {
        let name = Dname::from_str("example.com").unwrap();
        MessageBuilder::new_query(&name, Rtype::A)
            .into_message()
            .unwrap()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn authenticated_answer() {
        let resolver = ValidatingResolver::new(
            FixedResolver { ad: true, queries: AtomicUsize::new(0) },
            AdFlagValidator::new(),
        );
        let answer = resolver.query(query()).await.unwrap();
        assert!(answer.header().ad());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unauthenticated_answer() {
        let resolver = ValidatingResolver::new(
            FixedResolver { ad: false, queries: AtomicUsize::new(0) },
            AdFlagValidator::new(),
        );
        let err = resolver.query(query()).await.unwrap_err();
        assert!(err.is_validation());
        assert!(!err.is_retriable());
        assert!(matches!(
            err,
            Error::Validation(ValidationError::Unauthenticated)
        ));
        assert_eq!(resolver.resolver().queries.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn prepare_keeps_existing_opt() {
        let name = Dname::from_str("example.com").unwrap();
        let mut builder = MessageBuilder::new_query(&name, Rtype::A);
        Edns::new(4096).push(&mut builder).unwrap();
        let query = builder.into_message().unwrap();
        let prepared = AdFlagValidator::new().prepare_query(query).unwrap();
        assert!(prepared.header().ad());
        let opt = prepared.opt().unwrap().unwrap();
        assert_eq!(opt.udp_payload_size(), 4096);
        assert_eq!(prepared.additional().len(), 1);
    }
}
