//! In-memory canonical resource store.
//!
//! One `ModuleStore` per module, keyed by `(PartyRef, id)`. Readers take
//! snapshots and never block writers beyond the lock hold; all writes to a
//! module go through [`ModuleStore::update_with`], whose closure runs under
//! the partition write lock so a read-modify-write (the downgrade check
//! included) is race-free. Two concurrent PUTs to the same id serialize, and
//! whichever carries the older `last_updated` observes the conflict instead
//! of being silently overwritten.

use crate::model::{ModuleResource, PartyRef};
use crate::utils::content_fingerprint;
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// A live record plus the bookkeeping the store owns: the immutable
/// `created` stamp set at first insert and the content fingerprint.
#[derive(Debug, Clone)]
pub struct Stored<R> {
    pub created: DateTime<Utc>,
    pub etag: String,
    pub resource: R,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

impl UpsertOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, UpsertOutcome::Created)
    }
}

pub struct ModuleStore<R: ModuleResource> {
    entries: RwLock<AHashMap<(PartyRef, R::Id), Stored<R>>>,
}

impl<R: ModuleResource> Default for ModuleStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ModuleResource> ModuleStore<R> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(AHashMap::new()),
        }
    }

    pub fn get(&self, party: &PartyRef, id: &R::Id) -> Option<Stored<R>> {
        let entries = self.entries.read();
        entries.get(&(party.clone(), id.clone())).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of every record whose owning party satisfies `visible`.
    /// Clones under the read lock; enumeration order is unspecified, the
    /// query engine sorts.
    pub fn snapshot<F>(&self, visible: F) -> Vec<Stored<R>>
    where
        F: Fn(&PartyRef) -> bool,
    {
        let entries = self.entries.read();
        entries
            .iter()
            .filter(|((party, _), _)| visible(party))
            .map(|(_, stored)| stored.clone())
            .collect()
    }

    /// First record matching `pred`, for lookups outside the composite key
    /// (the legacy unscoped token path).
    pub fn find<F>(&self, pred: F) -> Option<Stored<R>>
    where
        F: Fn(&R) -> bool,
    {
        let entries = self.entries.read();
        entries
            .values()
            .find(|stored| pred(&stored.resource))
            .cloned()
    }

    /// Read-modify-write under the partition write lock. The closure sees
    /// the current record, if any, and either returns the replacement
    /// resource or an error; on error the store is left untouched. The
    /// `created` stamp survives updates and the fingerprint is recomputed
    /// from the replacement.
    pub fn update_with<E, F>(
        &self,
        party: &PartyRef,
        id: &R::Id,
        apply: F,
    ) -> Result<(UpsertOutcome, Stored<R>), E>
    where
        F: FnOnce(Option<&Stored<R>>) -> Result<R, E>,
    {
        let key = (party.clone(), id.clone());
        let mut entries = self.entries.write();
        let existing = entries.get(&key);
        let replacement = apply(existing)?;

        let outcome = if existing.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        };
        let created = existing.map(|s| s.created).unwrap_or_else(Utc::now);
        let stored = Stored {
            created,
            etag: content_fingerprint(&replacement),
            resource: replacement,
        };
        entries.insert(key, stored.clone());
        Ok((outcome, stored))
    }

    pub fn remove(&self, party: &PartyRef, id: &R::Id) -> Option<Stored<R>> {
        let mut entries = self.entries.write();
        entries.remove(&(party.clone(), id.clone()))
    }
}
