//! Background environment for running [`Task`]s.

use std::{
    error::Error as StdError,
    future::{Future, IntoFuture},
};

use derive_more::Display;
use futures::{
    future::{self, LocalBoxFuture},
    FutureExt as _,
};
use tokio::task;
use tracing as log;

#[cfg(doc)]
use crate::Task;

/// Background environment for running named [`Task`]s on a single thread.
///
/// Resolves once any [`Task`] stops, with the reason it stopped for.
#[derive(Debug, Default)]
pub struct Background {
    /// Local set the [`Task`]s are spawned onto.
    set: task::LocalSet,

    /// Names and handles of the spawned [`Task`]s.
    tasks: Vec<(&'static str, task::JoinHandle<Result<(), BoxedError>>)>,
}

/// Type-erased error of a [`Task`].
type BoxedError = Box<dyn StdError + 'static>;

impl Background {
    /// Spawns a new [`Task`] with the provided `name` inside this
    /// [`Background`] environment.
    pub fn spawn<F, E>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = Result<(), E>> + 'static,
        E: StdError + 'static,
    {
        log::debug!("background task `{name}` spawned");
        let handle = self.set.spawn_local(async move {
            future.await.map_err(BoxedError::from)
        });
        self.tasks.push((name, handle));
    }

    /// Returns the number of spawned [`Task`]s.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Indicates whether no [`Task`] has been spawned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl IntoFuture for Background {
    type Output = Result<(), Stopped>;
    type IntoFuture = LocalBoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let Self { set, tasks } = self;
        if tasks.is_empty() {
            return set.map(Ok).boxed_local();
        }

        let watched = tasks.into_iter().map(|(name, handle)| {
            handle
                .map(move |res| {
                    let reason = match res {
                        Ok(Ok(())) => None,
                        Ok(Err(e)) => Some(e),
                        Err(e) => Some(BoxedError::from(e)),
                    };
                    match &reason {
                        Some(e) => log::error!("task `{name}` failed: {e}"),
                        None => log::warn!("task `{name}` ended"),
                    }
                    Err::<(), _>(Stopped {
                        task: name,
                        reason,
                    })
                })
                .boxed_local()
        });
        let first = future::select_all(watched).map(|(res, _, _)| res);
        async move { set.run_until(first).await }.boxed_local()
    }
}

/// Error of a [`Background`] environment: one of its [`Task`]s stopped.
#[derive(Debug, Display)]
#[display("background task `{task}` stopped")]
pub struct Stopped {
    /// Name of the stopped [`Task`].
    pub task: &'static str,

    /// Error the [`Task`] failed with, if any.
    pub reason: Option<BoxedError>,
}

impl StdError for Stopped {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.reason.as_deref()
    }
}
