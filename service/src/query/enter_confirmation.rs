//! [`Query`] for entering the confirmation stage of a registration.

use common::DateTime;
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::Stage;
use crate::{
    domain::{
        confirmation::Summary,
        registration::Confirmed,
        stage::{DeepLink, Navigation, Redirect, RedirectReason},
        Catalog,
    },
    infra::backend,
    ErrorKind, Service,
};

use super::{catalog, Query};

/// [`Query`] for entering [`Stage::Confirmation`] by a [`Navigation`].
///
/// Shows the [`Summary`] held by the registration if it matches the
/// [`Navigation`], or resumes it from the [`Navigation`] alone otherwise.
#[derive(Clone, Debug)]
pub struct EnterConfirmation {
    /// [`Navigation`] the stage is entered with.
    pub navigation: Navigation,
}

/// Output of [`EnterConfirmation`] [`Query`].
#[derive(Clone, Debug)]
pub struct Output {
    /// [`Summary`] to show.
    pub summary: Summary,

    /// Indicator whether the [`Summary`] has been rebuilt from the
    /// [`Navigation`] rather than taken from the registration.
    pub resumed: bool,
}

impl<B> Query<EnterConfirmation> for Service<B>
where
    Self: Query<
        catalog::ByToken,
        Ok = Option<Catalog>,
        Err = Traced<backend::Error>,
    >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        EnterConfirmation { navigation }: EnterConfirmation,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let link = navigation.deep_link().map_err(|e| {
            tracerr::new!(E::Redirected(Redirect::login(
                RedirectReason::DeepLink(e)
            )))
        })?;

        if let Some(slot) = self.registry().get(&link.token).await {
            let mut reg = slot.lock().await;
            reg.touch(DateTime::now().coerce());
            if let Some(c) = reg.confirmed().filter(|c| is_linked(c, &link)) {
                return Ok(Output {
                    summary: c.summary.clone(),
                    resumed: false,
                });
            }
        }

        let catalog = self
            .execute(catalog::ByToken::by(link.token.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| {
                tracerr::new!(E::Redirected(Redirect::login(
                    RedirectReason::UnknownStaff
                )))
            })?;

        let shift = link.shift_in(&catalog);
        let stoppage_name = catalog
            .stoppage(shift.map(|s| s.id), link.stoppage)
            .or_else(|| catalog.any_stoppage(link.stoppage))
            .map_or_else(
                || format!("ID: {}", link.stoppage),
                |s| s.name.clone(),
            );
        let summary = Summary {
            staff_name: catalog.profile.name(),
            shift_label: shift
                .map_or_else(|| link.shift.clone(), |s| s.label.clone()),
            stoppage_name,
        };

        log::debug!(
            "confirmation of `{}` resumed from navigation",
            link.token,
        );
        Ok(Output {
            summary,
            resumed: true,
        })
    }
}

/// Checks whether the provided [`Confirmed`] submission is the one the
/// [`DeepLink`] refers to.
fn is_linked(confirmed: &Confirmed, link: &DeepLink) -> bool {
    confirmed.stoppage.id == link.stoppage
        && (confirmed.shift.label.eq_ignore_ascii_case(&link.shift)
            || confirmed.shift.id.to_string() == link.shift)
}

/// Error of [`EnterConfirmation`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Backend`] error.
    ///
    /// [`Backend`]: crate::infra::Backend
    #[display("`Backend` operation failed: {_0}")]
    Backend(backend::Error),

    /// [`Navigation`] cannot be resumed.
    #[display("Redirected to `{}`: {}", _0.to, _0.reason)]
    #[from(ignore)]
    Redirected(#[error(not(source))] Redirect),
}

impl ExecutionError {
    /// Returns [`ErrorKind`] of this [`ExecutionError`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Backend(e) => ErrorKind::of_backend(e),
            Self::Redirected(r) => ErrorKind::of_redirect(r),
        }
    }
}
