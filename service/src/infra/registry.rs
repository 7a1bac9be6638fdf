//! In-memory [`Registry`] of [`Registration`]s in progress.

use std::{collections::HashMap, sync::Arc};

use tokio::{
    sync::{Mutex, MutexGuard, RwLock},
    task::AbortHandle,
};

use crate::domain::{registration, session, Registration};

/// [`Registration`]s in progress, keyed by their [`session::Token`]s.
///
/// A [`Slot`] may be reachable by several [`session::Token`]s once a
/// continuation [`session::Token`] is aliased to it.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    /// [`Slot`]s by their [`session::Token`]s.
    slots: Arc<RwLock<HashMap<session::Token, Arc<Slot>>>>,
}

impl Registry {
    /// Returns the [`Slot`] reachable by the provided [`session::Token`], if
    /// any.
    pub async fn get(&self, token: &session::Token) -> Option<Arc<Slot>> {
        self.slots.read().await.get(token).cloned()
    }

    /// Returns the [`Slot`] reachable by the provided [`session::Token`],
    /// creating a new one if there is none.
    ///
    /// The returned flag indicates whether the [`Slot`] has been created.
    pub async fn get_or_create(
        &self,
        token: &session::Token,
        now: registration::ActivityDateTime,
    ) -> (Arc<Slot>, bool) {
        if let Some(slot) = self.get(token).await {
            return (slot, false);
        }

        let mut slots = self.slots.write().await;
        if let Some(slot) = slots.get(token) {
            return (Arc::clone(slot), false);
        }
        let slot = Arc::new(Slot::new(Registration::new(token.clone(), now)));
        drop(slots.insert(token.clone(), Arc::clone(&slot)));
        (slot, true)
    }

    /// Makes the provided [`Slot`] reachable by the `alias` too.
    ///
    /// Returns `false` if the `alias` is already bound to another [`Slot`],
    /// leaving that binding untouched.
    pub async fn alias(&self, alias: session::Token, slot: &Arc<Slot>) -> bool {
        let mut slots = self.slots.write().await;
        if let Some(bound) = slots.get(&alias) {
            return Arc::ptr_eq(bound, slot);
        }
        drop(slots.insert(alias, Arc::clone(slot)));
        true
    }

    /// Unbinds the `alias` if it's bound to the provided [`Slot`].
    pub async fn unalias(&self, alias: &session::Token, slot: &Arc<Slot>) {
        let mut slots = self.slots.write().await;
        if slots.get(alias).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            drop(slots.remove(alias));
        }
    }

    /// Removes the [`Slot`] reachable by the provided [`session::Token`]
    /// together with all its aliases.
    pub async fn remove(&self, token: &session::Token) -> Option<Arc<Slot>> {
        let mut slots = self.slots.write().await;
        let slot = slots.remove(token)?;
        slots.retain(|_, s| !Arc::ptr_eq(s, &slot));
        Some(slot)
    }

    /// Tears down the [`Slot`] reachable by the provided [`session::Token`]
    /// and removes it together with all its aliases.
    ///
    /// Results of backend calls still in flight for it are discarded.
    pub async fn discard(&self, token: &session::Token) -> Option<Arc<Slot>> {
        let slot = self.remove(token).await?;
        slot.stop_ticker().await;
        slot.lock().await.teardown();
        Some(slot)
    }

    /// Returns all the distinct [`Slot`]s.
    pub async fn slots(&self) -> Vec<Arc<Slot>> {
        let slots = self.slots.read().await;
        let mut distinct: Vec<Arc<Slot>> = Vec::with_capacity(slots.len());
        for slot in slots.values() {
            if !distinct.iter().any(|s| Arc::ptr_eq(s, slot)) {
                distinct.push(Arc::clone(slot));
            }
        }
        distinct
    }

    /// Returns the number of distinct [`Slot`]s.
    pub async fn len(&self) -> usize {
        self.slots().await.len()
    }

    /// Indicates whether there are no [`Slot`]s at all.
    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}

/// Single [`Registration`] in progress.
#[derive(Debug)]
pub struct Slot {
    /// [`Registration`] state.
    ///
    /// Never held across a backend call.
    registration: Mutex<Registration>,

    /// Handle of the running OTP cooldown ticker, if any.
    ticker: Mutex<Option<AbortHandle>>,
}

impl Slot {
    /// Wraps the provided [`Registration`] into a new [`Slot`].
    #[must_use]
    pub fn new(registration: Registration) -> Self {
        Self {
            registration: Mutex::new(registration),
            ticker: Mutex::new(None),
        }
    }

    /// Locks the [`Registration`] of this [`Slot`].
    pub async fn lock(&self) -> MutexGuard<'_, Registration> {
        self.registration.lock().await
    }

    /// Replaces the OTP cooldown ticker, aborting the previous one.
    pub async fn replace_ticker(&self, handle: AbortHandle) {
        if let Some(prev) = self.ticker.lock().await.replace(handle) {
            prev.abort();
        }
    }

    /// Aborts the OTP cooldown ticker, if any.
    pub async fn stop_ticker(&self) {
        if let Some(prev) = self.ticker.lock().await.take() {
            prev.abort();
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.get_mut().take() {
            ticker.abort();
        }
    }
}

#[cfg(test)]
mod spec {
    use std::sync::Arc;

    use common::DateTime;

    use crate::domain::session;

    use super::Registry;

    fn token(s: &str) -> session::Token {
        session::Token::new(s).unwrap()
    }

    #[tokio::test]
    async fn creates_slot_once() {
        let registry = Registry::default();

        let (first, created) =
            registry.get_or_create(&token("U1"), DateTime::now().coerce()).await;
        assert!(created);
        let (second, created) =
            registry.get_or_create(&token("U1"), DateTime::now().coerce()).await;
        assert!(!created);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn removes_slot_with_aliases() {
        let registry = Registry::default();
        let (slot, _) =
            registry.get_or_create(&token("U1"), DateTime::now().coerce()).await;
        assert!(registry.alias(token("17"), &slot).await);

        assert!(registry.get(&token("17")).await.is_some());
        assert_eq!(registry.len().await, 1);

        let removed = registry.remove(&token("17")).await.unwrap();

        assert!(Arc::ptr_eq(&removed, &slot));
        assert!(registry.get(&token("U1")).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn refuses_alias_bound_to_another_slot() {
        let registry = Registry::default();
        let (first, _) =
            registry.get_or_create(&token("U1"), DateTime::now().coerce()).await;
        let (second, _) =
            registry.get_or_create(&token("U2"), DateTime::now().coerce()).await;

        assert!(!registry.alias(token("U1"), &second).await);
        assert!(registry.alias(token("U2"), &second).await);

        let bound = registry.get(&token("U1")).await.unwrap();
        assert!(Arc::ptr_eq(&bound, &first));
        assert_eq!(registry.len().await, 2);

        assert!(registry.alias(token("17"), &second).await);
        registry.unalias(&token("U1"), &second).await;
        registry.unalias(&token("17"), &second).await;

        assert!(registry.get(&token("U1")).await.is_some());
        assert!(registry.get(&token("17")).await.is_none());
        assert!(registry.get(&token("U2")).await.is_some());
    }
}
