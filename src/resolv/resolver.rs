//! The resolver capability.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::base::Message;
use crate::resolv::error::Error;

//------------ Resolve -------------------------------------------------------

/// A type that can answer DNS queries.
///
/// This is implemented by the plain [`ParallelResolver`] and by the
/// [`ValidatingResolver`] that wraps a plain resolver. The lookup functions
/// work with either.
///
/// [`ParallelResolver`]: super::parallel::ParallelResolver
/// [`ValidatingResolver`]: crate::validator::ValidatingResolver
pub trait Resolve: Send + Sync {
    /// Answers `query`.
    fn query(
        &self,
        query: Message,
    ) -> Pin<Box<dyn Future<Output = Result<Message, Error>> + Send + '_>>;
}

impl<R: Resolve + ?Sized> Resolve for Arc<R> {
    fn query(
        &self,
        query: Message,
    ) -> Pin<Box<dyn Future<Output = Result<Message, Error>> + Send + '_>> {
        (**self).query(query)
    }
}

impl<R: Resolve + ?Sized> Resolve for Box<R> {
    fn query(
        &self,
        query: Message,
    ) -> Pin<Box<dyn Future<Output = Result<Message, Error>> + Send + '_>> {
        (**self).query(query)
    }
}
