//! Per-thread slot storage
//!
//! Every thread owns two maps keyed by carrier id: one for provided values
//! and one for provide origins. A carrier is active on a thread exactly when
//! its id has an entry in that thread's origin map.
//!
//! No borrow of either map is held while user code runs. Values removed from
//! a map are dropped after the borrow is released, so a `Drop` impl may use
//! carriers freely.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use threadscope_core::Origin;

/// Process-unique carrier identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CarrierId(u64);

impl CarrierId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        CarrierId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn get(self) -> u64 {
        self.0
    }
}

thread_local! {
    static VALUES: RefCell<HashMap<CarrierId, Rc<dyn Any>>> = RefCell::new(HashMap::new());
    static ORIGINS: RefCell<HashMap<CarrierId, Origin>> = RefCell::new(HashMap::new());
}

/// Fill both slots for `id`, returning whatever was there before.
///
/// During thread teardown the maps may already be gone; the write is then
/// dropped and the carrier stays idle for the rest of the thread's life.
pub(crate) fn store(id: CarrierId, value: Rc<dyn Any>, origin: Origin) -> Option<Origin> {
    let previous_origin = ORIGINS
        .try_with(|origins| origins.borrow_mut().insert(id, origin))
        .ok()
        .flatten();
    let previous_value = VALUES
        .try_with(|values| values.borrow_mut().insert(id, value))
        .ok()
        .flatten();
    drop(previous_value);
    previous_origin
}

/// Empty both slots for `id`. Returns `true` if the carrier was active.
pub(crate) fn clear(id: CarrierId) -> bool {
    let value = VALUES
        .try_with(|values| values.borrow_mut().remove(&id))
        .ok()
        .flatten();
    let origin = ORIGINS
        .try_with(|origins| origins.borrow_mut().remove(&id))
        .ok()
        .flatten();
    drop(value);
    origin.is_some()
}

pub(crate) fn is_active(id: CarrierId) -> bool {
    ORIGINS
        .try_with(|origins| origins.borrow().contains_key(&id))
        .unwrap_or(false)
}

pub(crate) fn origin(id: CarrierId) -> Option<Origin> {
    ORIGINS
        .try_with(|origins| origins.borrow().get(&id).cloned())
        .ok()
        .flatten()
}

pub(crate) fn value(id: CarrierId) -> Option<Rc<dyn Any>> {
    VALUES
        .try_with(|values| values.borrow().get(&id).cloned())
        .ok()
        .flatten()
}

/// Number of active carriers on the calling thread
#[cfg(test)]
pub(crate) fn active_count() -> usize {
    ORIGINS
        .try_with(|origins| origins.borrow().len())
        .unwrap_or(0)
}
