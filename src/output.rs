//! Per-output state and the output registry.
//!
//! An [`OutputData`] is the core's bookkeeping for one physical or virtual
//! display: its scene subtree, its per-layer subtrees, and the three-phase
//! `(tags, fullscreen, focus_stack, wm_stack)` snapshot. The actual display
//! handle — mode setting, DRM lease, whatever the backend needs — is
//! reached only through [`OutputBackend`].

use std::fmt;

use crate::arena::{Arena, Key};
use crate::layout::LayoutDemand;
use crate::list::Stack;
use crate::scene::{NodeId, NodeKind, Point, SceneTopology};
use crate::view::{link_selector, link_selector_ref, Phase, Rect, StackKind, View, ViewId};

pub type OutputId = Key<OutputData>;

/// The handle to the real display. Mode/position/transform/scale are asked
/// for rather than stored redundantly here; `test_state`/`commit_state`
/// implement the accept-or-reject contract an output-configuration request
/// needs.
pub trait OutputBackend: fmt::Debug {
    fn name(&self) -> &str;
    /// Logical (already descaled) size of the current mode. Used to size
    /// fullscreen views and to auto-position outputs left to right.
    fn logical_size(&self) -> (i32, i32);
    fn set_enabled(&mut self, enabled: bool);
    /// Would the backend accept this proposed state, without mutating
    /// anything?
    fn test_state(&self, proposed: &ProposedOutputState) -> bool;
    /// Commit the proposed state. `Ok` on acceptance.
    fn commit_state(&mut self, proposed: &ProposedOutputState) -> Result<(), ()>;
    /// Re-layout this output's layer-shell surfaces against its (possibly
    /// changed) geometry.
    fn arrange_layers(&mut self);
    /// Recompute the background-layer fill rect for this output's (possibly
    /// changed) geometry.
    fn update_background_rect(&mut self);
    /// Push this output's current tag mask to whatever status protocol the
    /// compositor exposes (eg. river-status).
    fn publish_status(&mut self, tags: u32);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProposedOutputState {
    pub enabled: bool,
    pub mode: Option<(i32, i32, u32)>,
    pub position: Point,
    pub transform: u32,
    pub scale_mil: u32,
    pub adaptive_sync: bool,
}

/// One of the per-output Z-ordered layer-shell tiers plus the fullscreen and
/// popup layers.
#[derive(Debug, Clone, Copy)]
pub struct Layers {
    pub background: NodeId,
    pub bottom: NodeId,
    pub layout: NodeId,
    pub float: NodeId,
    pub top: NodeId,
    pub fullscreen: NodeId,
    pub overlay: NodeId,
    pub popups: NodeId,
}

impl Layers {
    fn create(scene: &mut SceneTopology, parent: NodeId) -> Self {
        Self {
            background: scene.create_node(parent, NodeKind::Group),
            bottom: scene.create_node(parent, NodeKind::Group),
            layout: scene.create_node(parent, NodeKind::Group),
            float: scene.create_node(parent, NodeKind::Group),
            top: scene.create_node(parent, NodeKind::Group),
            fullscreen: scene.create_node(parent, NodeKind::Group),
            overlay: scene.create_node(parent, NodeKind::Group),
            popups: scene.create_node(parent, NodeKind::Group),
        }
    }
}

/// One phase's worth of per-output view bookkeeping. [`HiddenState`] reuses
/// this shape too: hidden has no real fullscreen concept, the field just
/// stays `None` there.
#[derive(Debug, Default)]
pub struct OutputPhaseState {
    pub tags: u32,
    pub fullscreen: Option<ViewId>,
    pub focus_stack: Stack<ViewId>,
    pub wm_stack: Stack<ViewId>,
}

#[derive(Debug)]
pub struct OutputData {
    pub backend: Box<dyn OutputBackend>,
    pub tree: NodeId,
    pub layers: Layers,

    pub pending: OutputPhaseState,
    pub inflight: OutputPhaseState,
    pub current: OutputPhaseState,

    pub layout_demand: Option<LayoutDemand>,
    pub layout_generator: Option<Box<dyn crate::layout::LayoutGenerator>>,
}

impl OutputData {
    pub fn new(scene: &mut SceneTopology, backend: Box<dyn OutputBackend>) -> Self {
        let tree = scene.create_node(scene.outputs, NodeKind::Group);
        let layers = Layers::create(scene, tree);
        Self {
            backend,
            tree,
            layers,
            pending: OutputPhaseState::default(),
            inflight: OutputPhaseState::default(),
            current: OutputPhaseState::default(),
            layout_demand: None,
            layout_generator: None,
        }
    }
}

/// Hidden is not a real `Output`, but it is shaped like one: three phases,
/// each with a focus/wm stack pair, plus the tags that get restored on
/// rehotplug.
#[derive(Debug, Default)]
pub struct HiddenState {
    pub tags: u32,
    pub pending: OutputPhaseState,
    pub inflight: OutputPhaseState,
    pub current: OutputPhaseState,
}

impl HiddenState {
    pub fn phase_mut(&mut self, phase: Phase) -> &mut OutputPhaseState {
        match phase {
            Phase::Pending => &mut self.pending,
            Phase::Inflight => &mut self.inflight,
            Phase::Current => &mut self.current,
        }
    }
}

/// The all-outputs / active-outputs split.
#[derive(Debug, Default)]
pub struct OutputRegistry {
    /// Every output the backend has ever advertised that still exists.
    pub all_outputs: Vec<OutputId>,
    /// Currently active (enabled, part of the layout) outputs.
    pub outputs: Vec<OutputId>,
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advertise(&mut self, id: OutputId) {
        if !self.all_outputs.contains(&id) {
            self.all_outputs.push(id);
        }
    }

    pub fn forget(&mut self, id: OutputId) {
        self.all_outputs.retain(|&o| o != id);
    }

    /// Mark `id` active: append it to `outputs` and enable its backend and
    /// scene subtree. The first-output special case (evacuating `hidden`
    /// onto it) is driven by [`crate::root::Root::add_output`] since it
    /// needs the view/hidden arenas and triggers `apply_pending`.
    ///
    /// Returns `true` if this output just became active (newly inserted),
    /// which the caller uses to decide whether to run the first-output
    /// evacuation.
    pub fn add_output(
        &mut self,
        scene: &mut SceneTopology,
        outputs: &mut Arena<OutputData>,
        id: OutputId,
    ) -> bool {
        if self.outputs.contains(&id) {
            return false;
        }
        self.outputs.push(id);
        let data = outputs.get_mut(id).expect("output advertised but missing from arena");
        // Positioning is the layout bridge's job, not this one's: the root
        // calls into `OutputLayoutBridge` right after this and repositions
        // `tree` once it has assigned coordinates.
        data.backend.set_enabled(true);
        scene.set_enabled(data.tree, true);
        true
    }

    pub fn is_first_active(&self) -> bool {
        self.outputs.len() == 1
    }

    pub fn first(&self) -> Option<OutputId> {
        self.outputs.first().copied()
    }

    pub fn contains(&self, id: OutputId) -> bool {
        self.outputs.contains(&id)
    }

    /// Remove `id` from the active set. Seat refocus is driven by the root
    /// (which owns the seat list); view evacuation lives in
    /// [`evacuate_inflight`] / [`evacuate_pending`] since they need the view
    /// arena, hidden state and the scene.
    pub fn remove_output(&mut self, id: OutputId) -> bool {
        if !self.outputs.contains(&id) {
            return false;
        }
        self.outputs.retain(|&o| o != id);
        true
    }
}

/// Move every inflight view off `output` onto hidden's inflight stacks,
/// clearing both its inflight and current output link (the view is being
/// yanked out from under an in-progress transaction, so there is no
/// "current" to preserve either).
pub fn evacuate_inflight(
    views: &mut Arena<View>,
    scene: &mut SceneTopology,
    output: &mut OutputData,
    hidden: &mut HiddenState,
    hidden_tree: NodeId,
) {
    for kind in [StackKind::Focus, StackKind::Wm] {
        let members: Vec<ViewId> = output
            .inflight
            .stack_mut(kind)
            .to_vec(views, link_selector_ref(Phase::Inflight, kind));
        for view_id in members {
            {
                let view = views.get_mut(view_id).expect("dangling view in output stack");
                view.inflight.output = None;
                view.current.output = None;
            }
            scene.reparent(views.get(view_id).unwrap().tree, hidden_tree);
            scene.reparent(views.get(view_id).unwrap().popup_tree, hidden_tree);
        }
    }
    output
        .inflight
        .focus_stack
        .prepend_onto(&mut hidden.inflight.focus_stack, views, link_selector(Phase::Inflight, StackKind::Focus));
    output
        .inflight
        .wm_stack
        .prepend_onto(&mut hidden.inflight.wm_stack, views, link_selector(Phase::Inflight, StackKind::Wm));

    // The output's *current* membership must also move to hidden right now:
    // the output backing `view.current.output` is gone immediately, not at
    // the next commit — an unplug doesn't wait for one. Current usually
    // mirrors inflight membership,
    // but the two can disagree mid-transaction, so this is evacuated
    // separately rather than assumed identical to the inflight pass above.
    for kind in [StackKind::Focus, StackKind::Wm] {
        let members: Vec<ViewId> = output.current.stack_mut(kind).to_vec(views, link_selector_ref(Phase::Current, kind));
        for view_id in members {
            views.get_mut(view_id).expect("dangling view in output stack").current.output = None;
            scene.reparent(views.get(view_id).unwrap().tree, hidden_tree);
            scene.reparent(views.get(view_id).unwrap().popup_tree, hidden_tree);
        }
    }
    output
        .current
        .focus_stack
        .prepend_onto(&mut hidden.current.focus_stack, views, link_selector(Phase::Current, StackKind::Focus));
    output
        .current
        .wm_stack
        .prepend_onto(&mut hidden.current.wm_stack, views, link_selector(Phase::Current, StackKind::Wm));
}

/// Move every pending view off `output`, either onto `fallback` (if
/// another active output remains) or onto hidden's pending stacks (saving
/// `hidden.tags` for later rehotplug).
pub fn evacuate_pending(
    views: &mut Arena<View>,
    outputs: &mut Arena<OutputData>,
    removed: OutputId,
    fallback: Option<OutputId>,
    hidden: &mut HiddenState,
) {
    match fallback {
        Some(fallback_id) => {
            let members: Vec<ViewId> = {
                let removed_output = outputs.get(removed).unwrap();
                removed_output
                    .pending
                    .focus_stack
                    .to_vec(views, link_selector_ref(Phase::Pending, StackKind::Focus))
            };
            for view_id in members {
                set_pending_output(views, outputs, hidden, view_id, Some(fallback_id));
            }
        }
        None => {
            let saved_tags = outputs.get(removed).unwrap().pending.tags;
            hidden.tags = saved_tags;
            let members: Vec<ViewId> = {
                let removed_output = outputs.get(removed).unwrap();
                removed_output
                    .pending
                    .focus_stack
                    .to_vec(views, link_selector_ref(Phase::Pending, StackKind::Focus))
            };
            for view_id in &members {
                views.get_mut(*view_id).unwrap().pending.output = None;
            }
            let removed_output = outputs.get_mut(removed).unwrap();
            removed_output
                .pending
                .focus_stack
                .prepend_onto(&mut hidden.pending.focus_stack, views, link_selector(Phase::Pending, StackKind::Focus));
            removed_output
                .pending
                .wm_stack
                .prepend_onto(&mut hidden.pending.wm_stack, views, link_selector(Phase::Pending, StackKind::Wm));
        }
    }
}

/// Move every pending view off `hidden` onto the first output to appear,
/// restoring the tags it saved when the last output disappeared.
pub fn repopulate_from_hidden(
    views: &mut Arena<View>,
    outputs: &mut Arena<OutputData>,
    hidden: &mut HiddenState,
    target: OutputId,
) {
    outputs.get_mut(target).unwrap().pending.tags = hidden.tags;
    let members: Vec<ViewId> = hidden
        .pending
        .focus_stack
        .to_vec(views, link_selector_ref(Phase::Pending, StackKind::Focus));
    for view_id in members {
        let view = views.get_mut(view_id).unwrap();
        view.pending.output = Some(target);
        hidden.pending.focus_stack.remove(views, view_id, link_selector(Phase::Pending, StackKind::Focus));
        hidden.pending.wm_stack.remove(views, view_id, link_selector(Phase::Pending, StackKind::Wm));
        outputs
            .get_mut(target)
            .unwrap()
            .pending
            .focus_stack
            .push_back(views, view_id, link_selector(Phase::Pending, StackKind::Focus));
        outputs
            .get_mut(target)
            .unwrap()
            .pending
            .wm_stack
            .push_back(views, view_id, link_selector(Phase::Pending, StackKind::Wm));
    }
    debug_assert!(hidden.pending.focus_stack.is_empty());
    debug_assert!(hidden.inflight.focus_stack.is_empty());
}

/// Move `view_id`'s *pending* output link. `new_output == None` means move
/// to hidden. Used by `evacuate_pending`, `add_output`'s first-output path
/// and any external mutator reassigning a mapped view.
pub fn set_pending_output(
    views: &mut Arena<View>,
    outputs: &mut Arena<OutputData>,
    hidden: &mut HiddenState,
    view_id: ViewId,
    new_output: Option<OutputId>,
) {
    let old_output = views.get(view_id).unwrap().pending.output;
    for kind in [StackKind::Focus, StackKind::Wm] {
        match old_output {
            Some(old) => {
                outputs.get_mut(old).unwrap().pending.stack_mut(kind).remove(
                    views,
                    view_id,
                    link_selector(Phase::Pending, kind),
                );
            }
            None => {
                hidden.pending.stack_mut(kind).remove(views, view_id, link_selector(Phase::Pending, kind));
            }
        }
        match new_output {
            Some(new) => {
                outputs.get_mut(new).unwrap().pending.stack_mut(kind).push_back(
                    views,
                    view_id,
                    link_selector(Phase::Pending, kind),
                );
            }
            None => {
                hidden.pending.stack_mut(kind).push_back(views, view_id, link_selector(Phase::Pending, kind));
            }
        }
    }
    views.get_mut(view_id).unwrap().pending.output = new_output;
}

impl OutputPhaseState {
    pub fn stack_mut(&mut self, kind: StackKind) -> &mut Stack<ViewId> {
        match kind {
            StackKind::Focus => &mut self.focus_stack,
            StackKind::Wm => &mut self.wm_stack,
        }
    }

    pub fn stack(&self, kind: StackKind) -> &Stack<ViewId> {
        match kind {
            StackKind::Focus => &self.focus_stack,
            StackKind::Wm => &self.wm_stack,
        }
    }
}

/// `output.<phase>`'s effective resolution at the origin — the box a
/// fullscreen view on this output gets.
pub fn fullscreen_box(output: &OutputData) -> Rect {
    let (w, h) = output.backend.logical_size();
    Rect::at_origin(w, h)
}
