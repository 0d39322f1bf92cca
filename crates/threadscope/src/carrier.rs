//! The scoped value carrier

use std::fmt;
use std::marker::PhantomData;
use std::panic::Location;
use std::rc::Rc;
use std::sync::OnceLock;

use threadscope_core::{CarrierConfig, CarrierError, CarrierResult, Origin};
use tracing::{trace, warn};

use crate::slots::{self, CarrierId};

/// Function-path prefixes of the carrier's own frames, dropped from origins.
const INTERNAL_FRAMES: &[&str] = &[
    concat!(module_path!(), "::Carrier"),
    concat!(module_path!(), "::ScopeGuard"),
    "threadscope::slots",
    "threadscope::unchecked",
];

/// Makes a value available to everything running beneath a
/// [`provide`](Carrier::provide) call on the same thread.
///
/// Each thread sees its own, independent state. Only one value may be
/// provided per carrier per thread at a time; a nested `provide` on the same
/// carrier is rejected with [`CarrierError::AlreadyProvided`].
///
/// Values never leave the thread that provided them, so `T` does not need to
/// be `Send` or `Sync`, and the carrier itself can live in a `static`.
pub struct Carrier<T> {
    id: OnceLock<CarrierId>,
    config: CarrierConfig,
    _value: PhantomData<fn() -> T>,
}

impl<T: 'static> Carrier<T> {
    /// Create a carrier with the default configuration
    pub const fn new() -> Self {
        Self::with_config(CarrierConfig::standard())
    }

    /// Create a carrier with an explicit configuration
    pub const fn with_config(config: CarrierConfig) -> Self {
        Carrier {
            id: OnceLock::new(),
            config,
            _value: PhantomData,
        }
    }

    pub fn config(&self) -> &CarrierConfig {
        &self.config
    }

    /// Identifier used in log events
    pub fn id(&self) -> u64 {
        self.slot_id().get()
    }

    fn slot_id(&self) -> CarrierId {
        *self.id.get_or_init(CarrierId::next)
    }

    /// Provide `value` for the duration of `f`.
    ///
    /// `f` runs synchronously on the calling thread. Both slots are cleared
    /// when `f` returns or unwinds; a panic in `f` propagates unchanged.
    ///
    /// Fails with [`CarrierError::AlreadyProvided`] if this thread is already
    /// inside a `provide` on this carrier. In that case nothing changes and
    /// `f` is not called.
    #[track_caller]
    pub fn provide<R, F>(&self, value: T, f: F) -> CarrierResult<R>
    where
        F: FnOnce() -> R,
    {
        let id = self.slot_id();
        if let Some(active) = slots::origin(id) {
            return Err(CarrierError::AlreadyProvided {
                call_site: active.call_site(),
            });
        }

        let call_site = Location::caller();
        self.occupy(value, call_site);
        let _guard = ScopeGuard { id };
        trace!(carrier = id.get(), %call_site, "value provided");

        Ok(f())
    }

    /// Returns a clone of the value provided on this thread.
    ///
    /// For shared handles such as `Arc<U>` the returned handle points at the
    /// provided allocation.
    pub fn get(&self) -> CarrierResult<T>
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Returns the provided value, or `None` when idle.
    pub fn try_get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.get().ok()
    }

    /// Run `f` with a reference to the value provided on this thread.
    ///
    /// `f` may use this carrier (including nested `provide` attempts) freely.
    pub fn with<R, F>(&self, f: F) -> CarrierResult<R>
    where
        F: FnOnce(&T) -> R,
    {
        let id = self.slot_id();
        if !slots::is_active(id) {
            return Err(CarrierError::NotProvided);
        }

        let value = slots::value(id)
            .and_then(|value| value.downcast::<T>().ok())
            .ok_or(CarrierError::NotProvided)?;
        Ok(f(&*value))
    }

    /// Whether a value is provided on this thread
    pub fn is_provided(&self) -> bool {
        slots::is_active(self.slot_id())
    }

    /// Where the value active on this thread was provided
    pub fn origin_of_provide(&self) -> CarrierResult<Origin> {
        slots::origin(self.slot_id()).ok_or(CarrierError::NotProvided)
    }

    /// Fill both slots without checking the current state.
    ///
    /// Returns `true` if an active value was overwritten.
    pub(crate) fn occupy(&self, value: T, call_site: &'static Location<'static>) -> bool {
        let id = self.slot_id();
        let origin = Origin::capture(call_site, &self.config, INTERNAL_FRAMES);
        let previous = slots::store(id, Rc::new(value), origin);

        if let Some(previous) = &previous {
            warn!(
                carrier = id.get(),
                %call_site,
                previous = %previous.call_site(),
                "overwrote a provided value without a scope"
            );
        }
        previous.is_some()
    }

    /// Empty both slots without checking the current state.
    pub(crate) fn vacate(&self) -> bool {
        slots::clear(self.slot_id())
    }
}

impl<T: 'static> Default for Carrier<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Carrier<T> {
    fn drop(&mut self) {
        // Other threads' slots for this id are dropped with those threads;
        // ids are never reused, so they cannot leak into a new carrier.
        if let Some(id) = self.id.get() {
            slots::clear(*id);
        }
    }
}

impl<T> fmt::Debug for Carrier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.id.get().copied();
        f.debug_struct("Carrier")
            .field("id", &id.map(CarrierId::get))
            .field("provided", &id.map_or(false, slots::is_active))
            .field("config", &self.config)
            .finish()
    }
}

/// Clears the slots when a provide scope ends, including by unwinding.
struct ScopeGuard {
    id: CarrierId,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        slots::clear(self.id);
        trace!(
            carrier = self.id.get(),
            unwinding = std::thread::panicking(),
            "value released"
        );
    }
}
