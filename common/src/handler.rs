//! [`Handler`] abstractions.

use std::{future::Future, sync::Arc};

/// Executable handler.
///
/// Commands, queries, tasks and backend operations are all expressed as
/// [`Handler`]s of the argument type they accept.
pub trait Handler<Args = ()> {
    /// Type of successful [`Handler`] result.
    type Ok;

    /// Type of this [`Handler`] error.
    type Err;

    /// Executes this [`Handler`] with the provided arguments.
    fn execute(
        &self,
        args: Args,
    ) -> impl Future<Output = Result<Self::Ok, Self::Err>>;
}

impl<Args, H> Handler<Args> for Arc<H>
where
    H: Handler<Args> + ?Sized,
{
    type Ok = H::Ok;
    type Err = H::Err;

    fn execute(
        &self,
        args: Args,
    ) -> impl Future<Output = Result<Self::Ok, Self::Err>> {
        (**self).execute(args)
    }
}

#[cfg(test)]
mod spec {
    use std::{
        convert::Infallible,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use super::Handler;

    #[derive(Debug, Default)]
    struct Counter(AtomicUsize);

    impl Handler<usize> for Counter {
        type Ok = usize;
        type Err = Infallible;

        async fn execute(&self, by: usize) -> Result<usize, Infallible> {
            Ok(self.0.fetch_add(by, Ordering::SeqCst) + by)
        }
    }

    #[tokio::test]
    async fn shared_handler_delegates_to_inner() {
        let counter = Arc::new(Counter::default());
        let shared = Arc::clone(&counter);

        assert_eq!(shared.execute(2).await, Ok(2));
        assert_eq!(counter.execute(3).await, Ok(5));
        assert_eq!(counter.0.load(Ordering::SeqCst), 5);
    }
}
