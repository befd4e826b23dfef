//! Error kinds produced by the core and the policy applied to each.
//!
//! Nothing here is retried. Every entry point that can fail logs at the
//! appropriate level and degrades gracefully instead of propagating a
//! hard failure up into the event loop — a wedged compositor is worse than
//! one imperfect frame or one skipped status update.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Building a configuration object to publish (eg. an output-management
    /// `done` event) failed, typically because of a `wayland-server` global
    /// allocation failure. Logged and the outbound update is skipped; never
    /// fatal.
    #[error("failed to allocate outbound configuration: {0}")]
    AllocationFailure(String),

    /// A newly advertised output could not be initialized by the backend
    /// (renderer context creation, DRM lease, ...). The output is destroyed
    /// and no [`crate::output::OutputData`] entry is ever created for it.
    #[error("output {name} failed to initialize: {reason}")]
    OutputInitFailure { name: String, reason: String },

    /// A head in an output-configuration `apply` request was rejected by the
    /// output itself when the proposed state was committed. The whole
    /// configuration fails; heads that already committed successfully keep
    /// their new state (the protocol explicitly permits partial effects).
    #[error("output {name} rejected the proposed configuration")]
    OutputCommitFailure { name: String },

    /// The configure-wait timer could not be armed on the event loop.
    /// The core does not stall waiting for client acks it has no way of
    /// timing out: it degrades by committing immediately, accepting a
    /// possibly torn frame.
    #[error("failed to arm configure timeout timer: {0}")]
    TimerArmFailure(String),
}
