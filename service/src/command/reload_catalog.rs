//! [`Command`] for retrying a failed [`Catalog`] load.

use common::operations::{By, Select};
use tracerr::Traced;

use crate::{
    domain::{session, Catalog},
    infra::{backend, Backend},
    read, Service,
};

use super::Command;

pub use super::enter_selection::ExecutionError;

/// [`Command`] for retrying a failed [`Catalog`] load.
///
/// Does nothing if the [`Catalog`] is loaded or loading already.
#[derive(Clone, Debug)]
pub struct ReloadCatalog {
    /// [`session::Token`] of the registration.
    pub token: session::Token,
}

impl<B> Command<ReloadCatalog> for Service<B>
where
    B: Backend<
        Select<By<Option<Catalog>, session::Token>>,
        Ok = Option<Catalog>,
        Err = Traced<backend::Error>,
    >,
{
    type Ok = read::Snapshot;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        ReloadCatalog { token }: ReloadCatalog,
    ) -> Result<Self::Ok, Self::Err> {
        self.load_catalog(&token, true).await
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{enter_selection::spec::verified, EnterSelection},
        infra::backend::memory::Operation,
        read::registration::CatalogView,
        spec::service,
        Command as _,
    };

    use super::ReloadCatalog;

    #[tokio::test]
    async fn retries_failed_load() {
        let (svc, backend) = service();
        let token = verified(&svc).await;
        backend.set_unavailable(true).await;
        _ = svc
            .execute(EnterSelection {
                token: token.clone(),
            })
            .await
            .unwrap_err();
        backend.set_unavailable(false).await;

        let snapshot = svc
            .execute(ReloadCatalog {
                token: token.clone(),
            })
            .await
            .unwrap();
        let again = svc.execute(ReloadCatalog { token }).await.unwrap();

        assert!(matches!(snapshot.catalog, CatalogView::Loaded { .. }));
        assert!(matches!(again.catalog, CatalogView::Loaded { .. }));
        assert_eq!(backend.calls(Operation::Select), 2);
    }
}
