//! The two-phase transaction pipeline (§4.5): `apply_pending`'s state
//! machine, the `Collecting` pending→inflight snapshot, `send_configures`,
//! and `Committing`'s inflight→current promotion.
//!
//! The state (`TransactionState`, the two counters, the dirty flag) lives
//! on [`Root`] itself per §3; this module is the logic that reads and
//! writes it. Suspension only happens at this module's own entry points
//! (`apply_pending`, `notify_layout_demand_done`, `notify_configured`, the
//! timer callback), never inside one (§5).

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::constants::CONFIGURE_TIMEOUT;
use crate::output::{fullscreen_box, OutputId};
use crate::root::Root;
use crate::view::{link_selector, link_selector_ref, Phase, StackKind, ViewId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    Collecting,
    AwaitingLayout,
    AwaitingConfigures,
    Committing,
}

/// §3 "transaction timer" / §7 `TimerArmFailure`. The event loop itself is
/// out of scope; this is the one thing the core needs from it.
pub trait TimerDriver: fmt::Debug {
    fn arm(&mut self, duration: Duration) -> Result<(), crate::Error>;
    fn disarm(&mut self);
}

fn is_tileable(pending: &crate::view::ViewPhaseState, output_tags: u32) -> bool {
    !pending.float && !pending.fullscreen && (pending.tags & output_tags) != 0
}

impl Root {
    /// §4.5.1 single entry point. If a transaction is already running,
    /// latch `pending_state_dirty` and return: pending is always read
    /// fresh, so there is never a need to queue more than one redo.
    pub fn apply_pending(&mut self) {
        if self.state != TransactionState::Idle {
            self.pending_state_dirty = true;
            return;
        }
        self.collecting();
    }

    /// Unlink `view_id` from whichever inflight stack `owner` names
    /// (`None` meaning hidden). The caller must supply the view's *actual*
    /// previous owner, read before anything in this pass overwrote
    /// `inflight.output` — the link itself carries no owner tag, so once
    /// that field changes there's no way to recover where it used to live.
    fn unlink_inflight_from(&mut self, view_id: ViewId, kind: StackKind, owner: Option<OutputId>) {
        match owner {
            Some(output_id) => {
                if let Some(data) = self.outputs.get_mut(output_id) {
                    data.inflight
                        .stack_mut(kind)
                        .remove(&mut self.views, view_id, link_selector(Phase::Inflight, kind));
                }
            }
            None => {
                self.hidden
                    .inflight
                    .stack_mut(kind)
                    .remove(&mut self.views, view_id, link_selector(Phase::Inflight, kind));
            }
        }
    }

    /// §4.5.2 Collecting: pending → inflight.
    fn collecting(&mut self) {
        self.state = TransactionState::Collecting;

        // Step 1: let every seat recompute focus against pending state
        // first; this is the only place the core asks a seat to do so.
        for seat in &mut self.seats {
            seat.focus_pending();
        }
        // Step 2: a seat callback reentering `apply_pending` just latches
        // the dirty flag (we're not Idle), so there's nothing further to
        // guard here beyond continuing this pass.

        // Step 3: drain hidden.pending into hidden.inflight.
        let hidden_members: Vec<ViewId> = self
            .hidden
            .pending
            .focus_stack
            .to_vec(&self.views, link_selector_ref(Phase::Pending, StackKind::Focus));
        for view_id in hidden_members {
            debug_assert!(self.views.get(view_id).unwrap().pending.output.is_none());
            let old_owner = self.views.get(view_id).unwrap().inflight.output;
            self.unlink_inflight_from(view_id, StackKind::Focus, old_owner);
            self.unlink_inflight_from(view_id, StackKind::Wm, old_owner);
            self.views.get_mut(view_id).unwrap().inflight.output = None;
            self.hidden.inflight.focus_stack.push_back(
                &mut self.views,
                view_id,
                link_selector(Phase::Inflight, StackKind::Focus),
            );
            self.hidden.inflight.wm_stack.push_back(
                &mut self.views,
                view_id,
                link_selector(Phase::Inflight, StackKind::Wm),
            );
        }

        // Step 4: per active output, in list order.
        let active_outputs: Vec<OutputId> = self.registry.outputs.clone();
        for &output_id in &active_outputs {
            self.outputs.get_mut(output_id).unwrap().pending.fullscreen = None;

            let members: Vec<ViewId> = self.outputs.get(output_id).unwrap().pending.focus_stack.to_vec(
                &self.views,
                link_selector_ref(Phase::Pending, StackKind::Focus),
            );
            // Snapshot prior inflight ownership before anything in this
            // block starts overwriting `inflight.output`; the deferred
            // wm_stack relink below needs the same values.
            let prior_owner: HashMap<ViewId, Option<OutputId>> = members
                .iter()
                .map(|&id| (id, self.views.get(id).unwrap().inflight.output))
                .collect();

            let output_tags = self.outputs.get(output_id).unwrap().pending.tags;

            for &view_id in &members {
                debug_assert_eq!(self.views.get(view_id).unwrap().pending.output, Some(output_id));

                // Float transition.
                let (was_float, will_float) = {
                    let view = self.views.get(view_id).unwrap();
                    (view.current.float, view.pending.float)
                };
                if was_float && !will_float {
                    let current_box = self.views.get(view_id).unwrap().current.geometry;
                    self.views.get_mut(view_id).unwrap().float_box = current_box;
                } else if !was_float && will_float {
                    let float_box = self.views.get(view_id).unwrap().float_box;
                    let output_box = fullscreen_box(self.outputs.get(output_id).unwrap());
                    let clamped = self
                        .views
                        .get(view_id)
                        .unwrap()
                        .delegate
                        .clamp_to_output(float_box, output_box);
                    self.views.get_mut(view_id).unwrap().pending.geometry = clamped;
                }

                // Fullscreen election: front-to-back focus order means the
                // most-recently-focused eligible view wins, since we only
                // elect while nothing has been elected yet this pass.
                let output = self.outputs.get(output_id).unwrap();
                let view = self.views.get(view_id).unwrap();
                if output.pending.fullscreen.is_none()
                    && view.pending.fullscreen
                    && (view.pending.tags & output.pending.tags) != 0
                {
                    self.outputs.get_mut(output_id).unwrap().pending.fullscreen = Some(view_id);
                }

                // Relink focus_stack into inflight (append, pending order).
                let owner = prior_owner[&view_id];
                self.unlink_inflight_from(view_id, StackKind::Focus, owner);
                self.outputs.get_mut(output_id).unwrap().inflight.focus_stack.push_back(
                    &mut self.views,
                    view_id,
                    link_selector(Phase::Inflight, StackKind::Focus),
                );

                // Copy inflight = pending.
                let pending = self.views.get(view_id).unwrap().pending;
                self.views.get_mut(view_id).unwrap().inflight = pending;
            }

            // If the output's previously-inflight fullscreen view is
            // leaving fullscreen this transaction, restore its saved box.
            let prior_inflight_fullscreen = self.outputs.get(output_id).unwrap().inflight.fullscreen;
            let new_pending_fullscreen = self.outputs.get(output_id).unwrap().pending.fullscreen;
            if let Some(leaving) = prior_inflight_fullscreen {
                if new_pending_fullscreen != Some(leaving) && self.views.contains(leaving) {
                    let restored = self.views.get(leaving).unwrap().post_fullscreen_box;
                    let output_box = fullscreen_box(self.outputs.get(output_id).unwrap());
                    let clamped = self
                        .views
                        .get(leaving)
                        .unwrap()
                        .delegate
                        .clamp_to_output(restored, output_box);
                    self.views.get_mut(leaving).unwrap().pending.geometry = clamped;
                    self.views.get_mut(leaving).unwrap().inflight.geometry = clamped;
                }
            }

            // Relink wm_stack into inflight, in pending order.
            let wm_members: Vec<ViewId> = self.outputs.get(output_id).unwrap().pending.wm_stack.to_vec(
                &self.views,
                link_selector_ref(Phase::Pending, StackKind::Wm),
            );
            for view_id in wm_members {
                let owner = prior_owner.get(&view_id).copied().flatten();
                self.unlink_inflight_from(view_id, StackKind::Wm, owner);
                self.outputs.get_mut(output_id).unwrap().inflight.wm_stack.push_back(
                    &mut self.views,
                    view_id,
                    link_selector(Phase::Inflight, StackKind::Wm),
                );
            }

            self.outputs.get_mut(output_id).unwrap().inflight.tags = output_tags;
        }

        // Step 5: second pass, fullscreen migrating between outputs.
        for &output_id in &active_outputs {
            let pending_fullscreen = self.outputs.get(output_id).unwrap().pending.fullscreen;
            let inflight_fullscreen = self.outputs.get(output_id).unwrap().inflight.fullscreen;
            if pending_fullscreen == inflight_fullscreen {
                continue;
            }
            if let Some(incoming) = pending_fullscreen {
                let current_box = self.views.get(incoming).unwrap().current.geometry;
                self.views.get_mut(incoming).unwrap().post_fullscreen_box = current_box;
                let output_box = fullscreen_box(self.outputs.get(output_id).unwrap());
                self.views.get_mut(incoming).unwrap().pending.geometry = output_box;
                self.views.get_mut(incoming).unwrap().inflight.geometry = output_box;
            }
            self.outputs.get_mut(output_id).unwrap().inflight.fullscreen = pending_fullscreen;
        }

        // Step 6: start layout demands for outputs with a generator and at
        // least one tileable inflight view.
        for &output_id in &active_outputs {
            let output = self.outputs.get(output_id).unwrap();
            if output.layout_generator.is_none() {
                continue;
            }
            let tags = output.inflight.tags;
            let count = output
                .inflight
                .wm_stack
                .iter(&self.views, link_selector_ref(Phase::Inflight, StackKind::Wm))
                .filter(|&id| is_tileable(&self.views.get(id).unwrap().inflight, tags))
                .count();
            if count == 0 {
                continue;
            }
            let output = self.outputs.get_mut(output_id).unwrap();
            output.layout_demand = Some(crate::layout::LayoutDemand { count });
            output.layout_generator.as_mut().unwrap().start_layout_demand(count);
            self.inflight_layout_demands += 1;
        }

        self.state = TransactionState::AwaitingLayout;
        if self.inflight_layout_demands == 0 {
            self.send_configures();
        }
    }

    /// §4.5.1 AwaitingLayout → AwaitingConfigures, driven by the layout
    /// generator's callback, once per output that started a demand.
    pub fn notify_layout_demand_done(&mut self, output: OutputId) {
        if self.state != TransactionState::AwaitingLayout {
            return;
        }
        if let Some(data) = self.outputs.get_mut(output) {
            data.layout_demand = None;
        }
        self.inflight_layout_demands = self.inflight_layout_demands.saturating_sub(1);
        if self.inflight_layout_demands == 0 {
            self.send_configures();
        }
    }

    /// §4.5.1 `send_configures`: walk every inflight view, configure those
    /// that need it, arm the 200ms timeout.
    fn send_configures(&mut self) {
        self.state = TransactionState::AwaitingConfigures;

        let mut all_inflight: Vec<ViewId> = self
            .hidden
            .inflight
            .focus_stack
            .to_vec(&self.views, link_selector_ref(Phase::Inflight, StackKind::Focus));
        for &output_id in &self.registry.outputs {
            all_inflight.extend(self.outputs.get(output_id).unwrap().inflight.focus_stack.to_vec(
                &self.views,
                link_selector_ref(Phase::Inflight, StackKind::Focus),
            ));
        }

        for view_id in all_inflight {
            let view = self.views.get_mut(view_id).unwrap();
            if !view.delegate.needs_configure() {
                continue;
            }
            let serial = view.delegate.configure();
            view.inflight_serial = Some(serial);
            view.delegate.save_surface_tree();
            view.delegate.send_frame_done();
            if !view.kind.exempt_from_configure_wait() {
                self.inflight_configures += 1;
            }
        }

        if self.inflight_configures == 0 {
            self.committing();
            return;
        }

        if let Err(err) = self.timer.arm(CONFIGURE_TIMEOUT) {
            // §7 TimerArmFailure: degrade by committing immediately rather
            // than stalling on a timeout we have no way to schedule.
            error!(%err, "failed to arm configure timeout, committing immediately");
            self.inflight_configures = 0;
            self.committing();
        }
    }

    /// §6 "View implementation" callback: a client acked and committed a
    /// matching buffer for its outstanding configure.
    pub fn notify_configured(&mut self, view: ViewId) {
        if self.state != TransactionState::AwaitingConfigures {
            return;
        }
        let Some(view_data) = self.views.get_mut(view) else {
            return;
        };
        if view_data.kind.exempt_from_configure_wait() {
            return;
        }
        if view_data.inflight_serial.take().is_none() {
            return;
        }
        self.inflight_configures = self.inflight_configures.saturating_sub(1);
        if self.inflight_configures == 0 {
            self.timer.disarm();
            self.committing();
        }
    }

    /// §4.5.4 timeout: the one mechanism that guarantees no client can
    /// stall the compositor.
    pub fn on_configure_timeout(&mut self) {
        if self.state != TransactionState::AwaitingConfigures {
            return;
        }
        warn!(
            inflight_configures = self.inflight_configures,
            "configure timeout expired, committing with imperfect frames"
        );
        self.inflight_configures = 0;
        self.committing();
    }

    /// §4.5.3 Committing: inflight → current.
    fn committing(&mut self) {
        self.state = TransactionState::Committing;

        // Step 1: reclaim/relocate hidden.inflight views.
        let hidden_tree = self.scene.hidden;
        let hidden_members: Vec<ViewId> = self
            .hidden
            .inflight
            .focus_stack
            .to_vec(&self.views, link_selector_ref(Phase::Inflight, StackKind::Focus));
        for &view_id in &hidden_members {
            debug_assert!(self.views.get(view_id).unwrap().inflight.output.is_none());
            self.views.get_mut(view_id).unwrap().current.output = None;
            let tree = self.views.get(view_id).unwrap().tree;
            let popup_tree = self.views.get(view_id).unwrap().popup_tree;
            self.scene.reparent(tree, hidden_tree);
            self.scene.reparent(popup_tree, hidden_tree);
            self.views.get_mut(view_id).unwrap().update_current();
        }

        // Step 2: per active output.
        let active_outputs: Vec<OutputId> = self.registry.outputs.clone();
        for &output_id in &active_outputs {
            let inflight_tags = self.outputs.get(output_id).unwrap().inflight.tags;
            let current_tags = self.outputs.get(output_id).unwrap().current.tags;
            if inflight_tags != current_tags {
                debug!(?output_id, inflight_tags, current_tags, "output tags changed");
            }
            self.outputs.get_mut(output_id).unwrap().current.tags = inflight_tags;

            let inflight_fullscreen = self.outputs.get(output_id).unwrap().inflight.fullscreen;

            let members: Vec<ViewId> = self.outputs.get(output_id).unwrap().inflight.focus_stack.to_vec(
                &self.views,
                link_selector_ref(Phase::Inflight, StackKind::Focus),
            );
            for view_id in members {
                debug_assert_eq!(self.views.get(view_id).unwrap().inflight.output, Some(output_id));

                let was_float_changed = {
                    let view = self.views.get(view_id).unwrap();
                    view.current.float != view.inflight.float
                };
                let output_changed = {
                    let view = self.views.get(view_id).unwrap();
                    view.current.output != view.inflight.output
                };
                let leaving_fullscreen = self.outputs.get(output_id).unwrap().current.fullscreen == Some(view_id)
                    && inflight_fullscreen != Some(view_id);

                self.views.get_mut(view_id).unwrap().inflight_serial = None;

                let target_parent = {
                    let data = self.outputs.get(output_id).unwrap();
                    if self.views.get(view_id).unwrap().inflight.float {
                        data.layers.float
                    } else {
                        data.layers.layout
                    }
                };

                if output_changed || leaving_fullscreen || was_float_changed {
                    let tree = self.views.get(view_id).unwrap().tree;
                    self.scene.reparent(tree, target_parent);
                }
                let popups_parent = self.outputs.get(output_id).unwrap().layers.popups;
                let popup_tree = self.views.get(view_id).unwrap().popup_tree;
                self.scene.reparent(popup_tree, popups_parent);

                self.views.get_mut(view_id).unwrap().update_current();

                let view_tags = self.views.get(view_id).unwrap().current.tags;
                let output_tags = self.outputs.get(output_id).unwrap().current.tags;
                let enabled = (view_tags & output_tags) != 0;
                let tree = self.views.get(view_id).unwrap().tree;
                let popup_tree = self.views.get(view_id).unwrap().popup_tree;
                self.scene.set_enabled(tree, enabled);
                self.scene.set_enabled(popup_tree, enabled);

                if inflight_fullscreen != Some(view_id) {
                    // TODO(§4.5.3): lowering on every commit may over-damage
                    // the renderer. Preserved as specified.
                    let tree = self.views.get(view_id).unwrap().tree;
                    self.scene.lower_to_bottom(tree);
                }
            }

            let current_fullscreen = self.outputs.get(output_id).unwrap().current.fullscreen;
            if inflight_fullscreen != current_fullscreen {
                if let Some(new_fullscreen) = inflight_fullscreen {
                    let tree = self.views.get(new_fullscreen).unwrap().tree;
                    let fullscreen_layer = self.outputs.get(output_id).unwrap().layers.fullscreen;
                    self.scene.reparent(tree, fullscreen_layer);
                }
                self.outputs.get_mut(output_id).unwrap().current.fullscreen = inflight_fullscreen;
                let fullscreen_layer = self.outputs.get(output_id).unwrap().layers.fullscreen;
                self.scene.set_enabled(fullscreen_layer, inflight_fullscreen.is_some());
            }

            // Step 2d: let the output publish its per-protocol status.
            let data = self.outputs.get_mut(output_id).unwrap();
            data.backend.publish_status(data.current.tags);
        }

        // Step 3: refresh every seat's cursor state.
        for seat in &mut self.seats {
            seat.refresh_cursor();
        }

        // Step 4: reclaim destroyed views.
        for view_id in hidden_members {
            if !self.views.contains(view_id) {
                continue;
            }
            let destroying = self.views.get(view_id).unwrap().destroying;
            if !destroying {
                continue;
            }
            self.hidden.inflight.focus_stack.remove(
                &mut self.views,
                view_id,
                link_selector(Phase::Inflight, StackKind::Focus),
            );
            self.hidden.inflight.wm_stack.remove(
                &mut self.views,
                view_id,
                link_selector(Phase::Inflight, StackKind::Wm),
            );
            let (tree, popup_tree) = {
                let view = self.views.get_mut(view_id).unwrap();
                view.delegate.destroy();
                (view.tree, view.popup_tree)
            };
            self.scene.destroy_node(tree);
            self.scene.destroy_node(popup_tree);
            self.views.remove(view_id);
        }

        // Step 5: idle-inhibit is an external collaborator (§1); poking it
        // is a no-op hook kept for symmetry with the design.
        self.poke_idle_inhibit();

        self.state = TransactionState::Idle;

        // Step 6: re-enter if something changed pending mid-transaction.
        if self.pending_state_dirty {
            self.pending_state_dirty = false;
            self.apply_pending();
        }
    }

    fn poke_idle_inhibit(&self) {
        // Out of scope (§1): the idle-inhibit manager is an external
        // collaborator that would be consulted here in a full compositor.
    }
}
