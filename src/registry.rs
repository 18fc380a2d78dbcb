//! Value groups and the store context
//!
//! A value group is a cohesive set of settings keys (registration state,
//! PIN secrets, UI hints, ...) with typed accessors over the shared store.
//! The context is built once at startup, owns the store handle and every
//! registered group, and folds over them for first-launch setup and backup
//! enumeration.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, StoreError};
use crate::store::KeyValueStore;

/// Capability every value group implements
pub trait ValueGroup: Send + Sync {
    /// Short, unique name used in diagnostics
    fn name(&self) -> &'static str;

    /// Seed defaults the first time the app ever runs
    fn on_first_launch(&self, _store: &KeyValueStore) -> Result<()> {
        Ok(())
    }

    /// Keys this group wants included in an external backup
    fn backup_keys(&self) -> Vec<&'static str>;
}

struct Registered {
    group: Arc<dyn ValueGroup>,
    any: Arc<dyn Any + Send + Sync>,
}

/// Process-wide handle to the store and its value groups
pub struct StoreContext {
    store: Arc<KeyValueStore>,
    groups: Vec<Registered>,
}

/// Builder for [`StoreContext`]
pub struct StoreContextBuilder {
    store: Arc<KeyValueStore>,
    groups: Vec<Registered>,

    /// Backup key -> owning group
    claimed: HashMap<&'static str, &'static str>,
}

impl StoreContext {
    pub fn builder(store: Arc<KeyValueStore>) -> StoreContextBuilder {
        StoreContextBuilder {
            store,
            groups: Vec::new(),
            claimed: HashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<KeyValueStore> {
        &self.store
    }

    /// A registered group by its concrete type
    pub fn group<G: ValueGroup + 'static>(&self) -> Option<&G> {
        self.groups
            .iter()
            .find_map(|registered| registered.any.downcast_ref::<G>())
    }

    /// Names of registered groups, in registration order
    pub fn group_names(&self) -> Vec<&'static str> {
        self.groups.iter().map(|r| r.group.name()).collect()
    }

    /// Run every group's first-launch hook in registration order
    ///
    /// Stops at the first failing group.
    pub fn on_first_launch(&self) -> Result<()> {
        for registered in &self.groups {
            tracing::debug!("Running first-launch setup for {}", registered.group.name());
            registered.group.on_first_launch(&self.store)?;
        }
        Ok(())
    }

    /// Every group's backup keys, in registration order, without duplicates
    pub fn enumerate_backup_keys(&self) -> Vec<String> {
        self.groups
            .iter()
            .flat_map(|registered| registered.group.backup_keys())
            .map(str::to_string)
            .collect()
    }

    /// See [`KeyValueStore::block_until_all_writes_finished`]
    pub fn block_until_all_writes_finished(&self) -> Result<()> {
        self.store.block_until_all_writes_finished()
    }
}

impl StoreContextBuilder {
    /// Add a group
    ///
    /// Fails with `KeyCollision` if it claims a backup key another group
    /// already claimed, or lists the same key twice.
    pub fn register<G: ValueGroup + 'static>(mut self, group: G) -> Result<Self> {
        let name = group.name();
        for key in group.backup_keys() {
            if let Some(owner) = self.claimed.insert(key, name) {
                return Err(StoreError::KeyCollision(format!(
                    "'{}' is claimed by both {} and {}",
                    key, owner, name
                )));
            }
        }

        let group = Arc::new(group);
        self.groups.push(Registered {
            group: Arc::clone(&group) as Arc<dyn ValueGroup>,
            any: group as Arc<dyn Any + Send + Sync>,
        });
        Ok(self)
    }

    pub fn build(self) -> StoreContext {
        StoreContext {
            store: self.store,
            groups: self.groups,
        }
    }
}
