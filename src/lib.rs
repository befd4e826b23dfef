//! The root coordinator of a tiling Wayland compositor: scene-graph topology,
//! output lifecycle, and the two-phase transaction pipeline that moves window
//! state from *pending* through *inflight* to *current*.
//!
//! Everything outside that pipeline — per-surface protocol handling, input,
//! the tiling layout algorithm itself, cursor rendering, rendering in general
//! — is deliberately out of scope. Those subsystems are modeled here only as
//! the traits in [`view`], [`seat`] and [`layout`] that they must implement
//! to plug into the core.

#[macro_use]
extern crate tracing;

pub mod arena;
pub mod constants;
pub mod error;
pub mod layout;
pub mod list;
pub mod output;
pub mod output_config;
pub mod output_layout;
pub mod scene;
pub mod seat;
pub mod transaction;
pub mod view;

mod root;

pub use error::Error;
pub use root::Root;
pub use view::ViewId;
