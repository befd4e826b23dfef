//! The seat contract.
//!
//! Input/focus handling itself lives outside this crate; the transaction
//! engine only needs to kick every seat's focus re-evaluation once per
//! `Collecting` phase and to retarget seats away from an output that is
//! about to disappear or refresh cursor state after a commit.

use std::fmt;

use crate::output::OutputId;

pub trait SeatHandle: fmt::Debug {
    /// Re-evaluate keyboard focus against *pending* state. Called once per
    /// seat at the very start of `Collecting`, before anything else moves;
    /// this is the only place the core asks a seat to recompute focus, so
    /// individual mutators never need to call it themselves.
    fn focus_pending(&mut self);

    /// Which output (if any) this seat currently considers focused.
    fn focused_output(&self) -> Option<OutputId>;

    /// Retarget this seat's focused output, e.g. because its previous one
    /// was just removed. `None` means no output remains.
    fn focus_output(&mut self, output: Option<OutputId>);

    /// Refresh any cursor-adjacent state (resize/move grab targets, cursor
    /// image) after a commit, since views may have been reparented or
    /// resized.
    fn refresh_cursor(&mut self);
}
