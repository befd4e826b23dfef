//! Tunables that are part of the transaction protocol itself rather than
//! user-facing configuration — changing them changes what clients can rely
//! on, so unlike [`lattice_compositor_config`] they are not loaded from disk.

use std::time::Duration;

/// How long `send_configures` waits for every inflight view to ack and
/// commit a matching buffer before giving up and committing anyway. The
/// only timeout in the system; it is what keeps one broken client from
/// stalling the compositor.
pub const CONFIGURE_TIMEOUT: Duration = Duration::from_millis(200);
