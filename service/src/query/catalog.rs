//! [`Query`] collection related to a [`Catalog`].

use common::operations::By;

use crate::domain::{session, Catalog};
#[cfg(doc)]
use crate::Query;

use super::BackendQuery;

/// Queries the [`Catalog`] of a staff member by a [`session::Token`].
pub type ByToken = BackendQuery<By<Option<Catalog>, session::Token>>;
