//! Tests for value groups and the store context
//!
//! These tests verify:
//! - First-launch defaults seeded by each group
//! - Backup key enumeration across groups
//! - Key collisions rejected at registration
//! - Typed group lookup

use std::sync::Arc;

use sealkv::config::RetryPolicy;
use sealkv::storage::MemoryStore;
use sealkv::{KeyValueStore, Result, StoreContext, StoreError, ValueGroup};

// =============================================================================
// Sample Value Groups
// =============================================================================

struct RegistrationValues {
    store: Arc<KeyValueStore>,
}

impl RegistrationValues {
    const COMPLETE: &'static str = "registration.complete";
    const NUMBER: &'static str = "registration.e164";

    fn is_complete(&self) -> Result<bool> {
        self.store.get_or(Self::COMPLETE, false)
    }

    fn set_complete(&self, number: &str) -> Result<()> {
        let mut tx = self.store.begin_write();
        tx.put(Self::COMPLETE, true).put(Self::NUMBER, number);
        tx.commit_and_wait()
    }
}

impl ValueGroup for RegistrationValues {
    fn name(&self) -> &'static str {
        "registration"
    }

    fn on_first_launch(&self, store: &KeyValueStore) -> Result<()> {
        store.put(Self::COMPLETE, false).wait()
    }

    fn backup_keys(&self) -> Vec<&'static str> {
        vec![Self::NUMBER]
    }
}

struct PinValues {
    store: Arc<KeyValueStore>,
}

impl PinValues {
    const REMINDER_DAYS: &'static str = "pin.reminder_days";
    const KEYBOARD: &'static str = "pin.keyboard_type";

    fn reminder_days(&self) -> Result<i32> {
        self.store.get(Self::REMINDER_DAYS)
    }
}

impl ValueGroup for PinValues {
    fn name(&self) -> &'static str {
        "pin"
    }

    fn on_first_launch(&self, store: &KeyValueStore) -> Result<()> {
        let mut tx = store.begin_write();
        tx.put(Self::REMINDER_DAYS, 14i32).put(Self::KEYBOARD, "numeric");
        tx.commit_and_wait()
    }

    fn backup_keys(&self) -> Vec<&'static str> {
        vec![Self::REMINDER_DAYS, Self::KEYBOARD]
    }
}

/// Claims a key already owned by `PinValues`
struct ConflictingValues;

impl ValueGroup for ConflictingValues {
    fn name(&self) -> &'static str {
        "conflicting"
    }

    fn backup_keys(&self) -> Vec<&'static str> {
        vec![PinValues::KEYBOARD]
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn memory_store() -> Arc<KeyValueStore> {
    Arc::new(
        KeyValueStore::with_backing_store(Box::new(MemoryStore::new()), RetryPolicy::no_retry())
            .unwrap(),
    )
}

fn setup_context() -> StoreContext {
    let store = memory_store();
    StoreContext::builder(Arc::clone(&store))
        .register(RegistrationValues {
            store: Arc::clone(&store),
        })
        .unwrap()
        .register(PinValues {
            store: Arc::clone(&store),
        })
        .unwrap()
        .build()
}

// =============================================================================
// Context Tests
// =============================================================================

#[test]
fn test_first_launch_seeds_defaults() {
    let context = setup_context();
    context.on_first_launch().unwrap();

    let registration = context.group::<RegistrationValues>().unwrap();
    let pin = context.group::<PinValues>().unwrap();

    assert!(!registration.is_complete().unwrap());
    assert_eq!(pin.reminder_days().unwrap(), 14);
    assert_eq!(
        context.store().get::<String>(PinValues::KEYBOARD).unwrap(),
        "numeric"
    );
}

#[test]
fn test_group_accessors_share_the_store() {
    let context = setup_context();
    context.on_first_launch().unwrap();

    let registration = context.group::<RegistrationValues>().unwrap();
    registration.set_complete("+15550100").unwrap();

    assert!(registration.is_complete().unwrap());
    assert_eq!(
        context
            .store()
            .get::<String>(RegistrationValues::NUMBER)
            .unwrap(),
        "+15550100"
    );
}

#[test]
fn test_enumerate_backup_keys_in_registration_order() {
    let context = setup_context();

    assert_eq!(
        context.enumerate_backup_keys(),
        vec![
            "registration.e164".to_string(),
            "pin.reminder_days".to_string(),
            "pin.keyboard_type".to_string(),
        ]
    );
    assert_eq!(context.group_names(), vec!["registration", "pin"]);
}

#[test]
fn test_backup_keys_resolve_after_first_launch() {
    let context = setup_context();
    context.on_first_launch().unwrap();
    context
        .group::<RegistrationValues>()
        .unwrap()
        .set_complete("+15550100")
        .unwrap();

    for key in context.enumerate_backup_keys() {
        assert!(context.store().contains_key(&key).unwrap(), "{} missing", key);
    }
}

#[test]
fn test_colliding_backup_key_is_rejected() {
    let store = memory_store();
    let result = StoreContext::builder(Arc::clone(&store))
        .register(PinValues {
            store: Arc::clone(&store),
        })
        .unwrap()
        .register(ConflictingValues);

    match result {
        Err(StoreError::KeyCollision(message)) => {
            assert!(message.contains(PinValues::KEYBOARD));
        }
        Err(other) => panic!("expected KeyCollision, got {:?}", other),
        Ok(_) => panic!("expected KeyCollision"),
    }
}

#[test]
fn test_unregistered_group_lookup_is_none() {
    let store = memory_store();
    let context = StoreContext::builder(store).register(ConflictingValues).unwrap().build();

    assert!(context.group::<PinValues>().is_none());
    assert!(context.group::<ConflictingValues>().is_some());
}

#[test]
fn test_context_barrier_drains_group_writes() {
    let context = setup_context();
    let store = Arc::clone(context.store());

    for i in 0..20i32 {
        let _ = store.put(PinValues::REMINDER_DAYS, i);
    }
    context.block_until_all_writes_finished().unwrap();

    assert_eq!(store.pending_writes(), 0);
    assert_eq!(context.group::<PinValues>().unwrap().reminder_days().unwrap(), 19);
}
