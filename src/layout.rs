//! The per-output layout generator contract.
//!
//! The tiling algorithm itself lives entirely outside this crate: all the
//! transaction engine needs is something it can ask "arrange these `count`
//! tileable views" and that will eventually call back
//! [`crate::Root::notify_layout_demand_done`], once per output, exactly
//! once per demand.

use std::fmt;

/// An outstanding request to a per-output layout generator, live only while
/// waiting on it to resolve.
#[derive(Debug, Clone, Copy)]
pub struct LayoutDemand {
    /// The exact tileable-view count the demand was started with. Re-issued
    /// unconditionally every time a transaction starts, even if unchanged —
    /// optimizing this away would require assuming the generator is
    /// deterministic for a fixed input, which this crate has no way to
    /// verify.
    pub count: usize,
}

/// Implemented by whatever owns the tiling algorithm for one output.
/// `start_layout_demand` must not call back synchronously: the contract is
/// that `notify_layout_demand_done` arrives on a later event-loop turn (it
/// is legal for it to resolve immediately via an idle callback, but never
/// through a direct re-entrant call from inside `start_layout_demand`
/// itself, or the waiting-on-layout counter bookkeeping breaks).
pub trait LayoutGenerator: fmt::Debug {
    fn start_layout_demand(&mut self, count: usize);
}
