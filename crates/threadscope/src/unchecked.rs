//! Escape hatches that bypass the provide protocol.
//!
//! [`Unchecked`] writes and clears a carrier's slots directly, without the
//! already-provided guard and without a scope that releases the value. They
//! exist for integration shims that cannot express their lifetime as a
//! closure, e.g. entering a value in one callback and leaving it in another.
//!
//! The caller owns the pairing: every [`force_set`](Unchecked::force_set)
//! must be matched by a [`force_unset`](Unchecked::force_unset) on the same
//! thread. A forced set overwrites any active value, including one provided
//! by an enclosing [`provide`](crate::Carrier::provide), and that scope will
//! clear the forced value when it ends.
//!
//! The trait is not re-exported from the crate root; import it explicitly.

use std::panic::Location;

use tracing::trace;

use crate::Carrier;

/// Direct slot access for a carrier
pub trait Unchecked<T> {
    /// Store `value` as provided on this thread, regardless of state.
    fn force_set(&self, value: T);

    /// Clear this thread's value, regardless of state.
    fn force_unset(&self);
}

impl<T: 'static> Unchecked<T> for Carrier<T> {
    #[track_caller]
    fn force_set(&self, value: T) {
        let call_site = Location::caller();
        let overwrote = self.occupy(value, call_site);
        trace!(carrier = self.id(), %call_site, overwrote, "value force-set");
    }

    fn force_unset(&self) {
        let was_provided = self.vacate();
        trace!(carrier = self.id(), was_provided, "value force-unset");
    }
}
