//! The per-view state the transaction engine reads and writes.
//!
//! A [`View`] is not a protocol object: the actual XDG/layer-shell/X11
//! surface implementation lives outside this crate and is reached only
//! through [`ViewDelegate`], a consumed interface. Everything the engine
//! itself needs to reason about: per-phase output/tags/float/fullscreen/
//! geometry, the stack links, the saved float and fullscreen boxes is
//! plain data owned right here so the three-phase copy in `Committing` is
//! a few struct assignments.

use std::fmt;

use crate::arena::Key;
use crate::list::Link;
use crate::output::OutputId;

pub type ViewId = Key<View>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn at_origin(w: i32, h: i32) -> Self {
        Self { x: 0, y: 0, w, h }
    }
}

/// The protocol family behind a view, used only to decide configure-ack
/// exemption: X11 views are not counted against the inflight-configures
/// total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewImplKind {
    Xdg,
    X11OverrideRedirect,
    X11,
}

impl ViewImplKind {
    /// True for views whose protocol has no ack/configure round-trip to
    /// wait on, so they are excluded from `inflight_configures`.
    pub fn exempt_from_configure_wait(self) -> bool {
        matches!(self, ViewImplKind::X11 | ViewImplKind::X11OverrideRedirect)
    }
}

/// One of the three snapshots a view carries. Plain data the core copies
/// wholesale between phases; it never reaches into a snapshot without
/// going through the transaction engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewPhaseState {
    pub output: Option<OutputId>,
    pub tags: u32,
    pub float: bool,
    pub fullscreen: bool,
    pub geometry: Rect,
}

/// Per-view callbacks into the real (out-of-scope) surface implementation.
pub trait ViewDelegate: fmt::Debug {
    /// Whether a `configure` needs to be (re-)sent this transaction, e.g.
    /// because the inflight geometry differs from what was last acked.
    fn needs_configure(&mut self) -> bool;
    /// Send the configure event; returns the serial the client must ack.
    fn configure(&mut self) -> u32;
    /// Snapshot the surface's current (pre-commit) buffer tree so a
    /// mid-transaction client commit doesn't visually race the atomic swap.
    fn save_surface_tree(&mut self);
    fn send_frame_done(&mut self);
    /// Apply `current` (already copied into the view) to the live surface:
    /// resize internal decorations, move subsurfaces, etc.
    fn apply_current(&mut self, current: &ViewPhaseState);
    /// Clamp `proposed` to fit inside `output_box`, respecting the view's
    /// own min/max size constraints.
    fn clamp_to_output(&self, proposed: Rect, output_box: Rect) -> Rect;
    fn destroy(&mut self);
}

#[derive(Debug)]
pub struct View {
    pub pending: ViewPhaseState,
    pub inflight: ViewPhaseState,
    pub current: ViewPhaseState,

    /// Geometry to restore when a floating view stops being fullscreen or
    /// (transiently) when it un-floats and re-floats.
    pub float_box: Rect,
    /// Geometry to restore when a view stops being fullscreen.
    pub post_fullscreen_box: Rect,

    /// Serial of the last configure sent this transaction; cleared on
    /// commit once the ack has been observed (or the timeout fired).
    pub inflight_serial: Option<u32>,

    pub mapped: bool,
    pub destroying: bool,
    pub kind: ViewImplKind,

    pub tree: crate::scene::NodeId,
    pub popup_tree: crate::scene::NodeId,

    pub(crate) pending_focus_link: Link<ViewId>,
    pub(crate) pending_wm_link: Link<ViewId>,
    pub(crate) inflight_focus_link: Link<ViewId>,
    pub(crate) inflight_wm_link: Link<ViewId>,
    pub(crate) current_focus_link: Link<ViewId>,
    pub(crate) current_wm_link: Link<ViewId>,

    pub delegate: Box<dyn ViewDelegate>,
}

/// Selects one of a view's six link fields. Passed to [`crate::list::Stack`]
/// operations so they can splice without knowing about `View` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackKind {
    Focus,
    Wm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Inflight,
    Current,
}

impl View {
    pub fn new(
        tree: crate::scene::NodeId,
        popup_tree: crate::scene::NodeId,
        kind: ViewImplKind,
        delegate: Box<dyn ViewDelegate>,
    ) -> Self {
        Self {
            pending: ViewPhaseState::default(),
            inflight: ViewPhaseState::default(),
            current: ViewPhaseState::default(),
            float_box: Rect::default(),
            post_fullscreen_box: Rect::default(),
            inflight_serial: None,
            mapped: false,
            destroying: false,
            kind,
            tree,
            popup_tree,
            pending_focus_link: Link::default(),
            pending_wm_link: Link::default(),
            inflight_focus_link: Link::default(),
            inflight_wm_link: Link::default(),
            current_focus_link: Link::default(),
            current_wm_link: Link::default(),
            delegate,
        }
    }

    pub fn link_mut(&mut self, phase: Phase, kind: StackKind) -> &mut Link<ViewId> {
        match (phase, kind) {
            (Phase::Pending, StackKind::Focus) => &mut self.pending_focus_link,
            (Phase::Pending, StackKind::Wm) => &mut self.pending_wm_link,
            (Phase::Inflight, StackKind::Focus) => &mut self.inflight_focus_link,
            (Phase::Inflight, StackKind::Wm) => &mut self.inflight_wm_link,
            (Phase::Current, StackKind::Focus) => &mut self.current_focus_link,
            (Phase::Current, StackKind::Wm) => &mut self.current_wm_link,
        }
    }

    pub fn link(&self, phase: Phase, kind: StackKind) -> &Link<ViewId> {
        match (phase, kind) {
            (Phase::Pending, StackKind::Focus) => &self.pending_focus_link,
            (Phase::Pending, StackKind::Wm) => &self.pending_wm_link,
            (Phase::Inflight, StackKind::Focus) => &self.inflight_focus_link,
            (Phase::Inflight, StackKind::Wm) => &self.inflight_wm_link,
            (Phase::Current, StackKind::Focus) => &self.current_focus_link,
            (Phase::Current, StackKind::Wm) => &self.current_wm_link,
        }
    }

    /// Copy inflight into current and push the result down to the real
    /// surface.
    pub fn update_current(&mut self) {
        self.current = self.inflight;
        self.delegate.apply_current(&self.current);
    }
}

pub(crate) fn link_selector(phase: Phase, kind: StackKind) -> impl Fn(&mut View) -> &mut Link<ViewId> + Copy {
    move |view: &mut View| view.link_mut(phase, kind)
}

pub(crate) fn link_selector_ref(phase: Phase, kind: StackKind) -> impl Fn(&View) -> &Link<ViewId> + Copy {
    move |view: &View| view.link(phase, kind)
}
