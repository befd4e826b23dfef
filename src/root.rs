//! [`Root`]: the process-singleton that owns the scene graph, the output
//! registry, and the transaction state.
//!
//! Everything else in this crate is either data hung off `Root` (views,
//! outputs) or a pure function/trait that `Root`'s methods call into. This
//! file wires them together and is the only place that holds `&mut Root`
//! for the duration of a whole operation — every other module takes the
//! specific arenas/fields it needs as parameters instead of a `&mut Root`,
//! so that (for instance) `transaction.rs`'s `Collecting` pass and
//! `output.rs`'s evacuation helpers can be unit tested without a full Root.

use std::fmt;

use crate::arena::Arena;
use crate::output::{self, HiddenState, OutputBackend, OutputData, OutputId, OutputRegistry};
use crate::output_layout::{ConfigPublisher, OutputLayoutBridge};
use crate::scene::SceneTopology;
use crate::seat::SeatHandle;
use crate::transaction::{TimerDriver, TransactionState};
use crate::view::{View, ViewId};

pub struct Root {
    pub(crate) scene: SceneTopology,
    pub(crate) views: Arena<View>,
    pub(crate) outputs: Arena<OutputData>,
    pub(crate) registry: OutputRegistry,
    pub(crate) hidden: HiddenState,
    pub(crate) layout: OutputLayoutBridge,
    pub(crate) seats: Vec<Box<dyn SeatHandle>>,
    pub(crate) publisher: Box<dyn ConfigPublisher>,
    pub(crate) timer: Box<dyn TimerDriver>,

    pub(crate) state: TransactionState,
    pub(crate) inflight_layout_demands: usize,
    pub(crate) inflight_configures: usize,
    pub(crate) pending_state_dirty: bool,

    /// The surrounding, user-facing configuration (CLI surfaces and the
    /// rest of the config are out of scope for the engine itself, but the
    /// per-output tag presets it carries are read once, right here, when an
    /// output is first advertised).
    config: lattice_compositor_config::Config,
}

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Root")
            .field("outputs", &self.registry.outputs.len())
            .field("views", &self.views.len())
            .field("state", &self.state)
            .field("inflight_layout_demands", &self.inflight_layout_demands)
            .field("inflight_configures", &self.inflight_configures)
            .field("pending_state_dirty", &self.pending_state_dirty)
            .finish()
    }
}

impl Root {
    pub fn init(
        publisher: Box<dyn ConfigPublisher>,
        timer: Box<dyn TimerDriver>,
        config: lattice_compositor_config::Config,
    ) -> Self {
        Self {
            scene: SceneTopology::new(),
            views: Arena::new(),
            outputs: Arena::new(),
            registry: OutputRegistry::new(),
            hidden: HiddenState::default(),
            layout: OutputLayoutBridge::new(),
            seats: Vec::new(),
            publisher,
            timer,
            state: TransactionState::Idle,
            inflight_layout_demands: 0,
            inflight_configures: 0,
            pending_state_dirty: false,
            config,
        }
    }

    /// Tear down in the reverse order of creation: disarm the timer before
    /// anything it could still reference goes away,
    /// then drop every output (destroying their scene subtrees), then the
    /// scene itself.
    pub fn deinit(mut self) {
        self.timer.disarm();
        for id in self.registry.all_outputs.clone() {
            if let Some(data) = self.outputs.remove(id) {
                self.scene.destroy_node(data.tree);
            }
        }
    }

    pub fn add_seat(&mut self, seat: Box<dyn SeatHandle>) {
        self.seats.push(seat);
    }

    /// Attach (or replace) the tiling algorithm backing one output. `None`
    /// means "no demands are started
    /// for this output", e.g. for a monitor running in a no-layout/manual
    /// float-only mode.
    pub fn set_layout_generator(&mut self, output: OutputId, generator: Option<Box<dyn crate::layout::LayoutGenerator>>) {
        if let Some(data) = self.outputs.get_mut(output) {
            data.layout_generator = generator;
        }
    }

    /// Route an input coordinate to the topmost interactive node.
    pub fn at(&self, lx: i32, ly: i32) -> Option<crate::scene::HitResult> {
        self.scene.hit_test(lx, ly)
    }

    /// Create a view and map it to `hidden` (output = None) in all three
    /// phases. The view's scene subtrees are created
    /// here, parented under `hidden.tree`, and tagged `NodeKind::View(id)`
    /// once the id is known — the tag is what lets [`crate::scene::SceneTopology::hit_test`]
    /// report a view hit back to its owner.
    pub fn create_view(&mut self, kind: crate::view::ViewImplKind, delegate: Box<dyn crate::view::ViewDelegate>) -> ViewId {
        use crate::view::{link_selector, Phase, StackKind};

        let hidden_tree = self.scene.hidden;
        let tree = self.scene.create_node(hidden_tree, crate::scene::NodeKind::Group);
        let popup_tree = self.scene.create_node(hidden_tree, crate::scene::NodeKind::Group);

        let view = View::new(tree, popup_tree, kind, delegate);
        let id = self.views.insert(view);
        self.scene.set_kind(tree, crate::scene::NodeKind::View(id));
        self.scene.set_kind(popup_tree, crate::scene::NodeKind::View(id));

        // Pending is what external code will move first, but inflight and
        // current start out agreeing with it too.
        for phase in [Phase::Pending, Phase::Inflight, Phase::Current] {
            self.hidden
                .phase_mut(phase)
                .focus_stack
                .push_back(&mut self.views, id, link_selector(phase, StackKind::Focus));
            self.hidden
                .phase_mut(phase)
                .wm_stack
                .push_back(&mut self.views, id, link_selector(phase, StackKind::Wm));
        }
        id
    }

    /// Called when the backend emits a new output. The per-output scene
    /// object is created here; whether it becomes *active* is a separate
    /// call to [`Root::add_output`] once the external per-output object is
    /// ready (if that never happens, this entry is simply never activated
    /// and stays in `all_outputs` only until dropped).
    pub fn new_output(&mut self, backend: Box<dyn OutputBackend>) -> OutputId {
        let preset_tags = self
            .config
            .outputs
            .get(backend.name())
            .and_then(|cfg| cfg.tags);
        let mut data = OutputData::new(&mut self.scene, backend);
        if let Some(tags) = preset_tags {
            data.pending.tags = tags;
        }
        let id = self.outputs.insert(data);
        self.registry.advertise(id);
        id
    }

    /// Activate a previously-advertised output.
    pub fn add_output(&mut self, id: OutputId) {
        if self.registry.outputs.contains(&id) {
            return;
        }
        let became_active = self.registry.add_output(&mut self.scene, &mut self.outputs, id);
        if !became_active {
            return;
        }

        let size = self.outputs.get(id).unwrap().backend.logical_size();
        let position = self.layout.auto_position(id, size);
        self.scene.set_location(self.outputs.get(id).unwrap().tree, position);

        if self.registry.is_first_active() {
            output::repopulate_from_hidden(&mut self.views, &mut self.outputs, &mut self.hidden, id);
            debug_assert!(self.hidden.pending.focus_stack.is_empty());
            debug_assert!(self.hidden.inflight.focus_stack.is_empty());
            // The evacuation above and the transaction it feeds are
            // unconditional (every hidden view must resurface on the
            // zero-to-one transition); only the seat refocus itself is
            // gated by config.
            if self.config.focus_new_outputs {
                for seat in &mut self.seats {
                    seat.focus_output(Some(id));
                }
            }
        }

        self.layout.notify_changed(&self.outputs, &self.registry, self.publisher.as_mut());
        self.apply_pending();
    }

    /// Deactivate and forget an output.
    pub fn remove_output(&mut self, id: OutputId) {
        if !self.registry.outputs.contains(&id) {
            return;
        }

        // Step 2: cancel any inflight layout demand and detach the layout
        // generator; the generator itself is destroyed by dropping it.
        if let Some(data) = self.outputs.get_mut(id) {
            if data.layout_demand.take().is_some() {
                self.inflight_layout_demands = self.inflight_layout_demands.saturating_sub(1);
            }
            data.layout_generator = None;
        }

        self.registry.remove_output(id);

        // Step 3: evacuate inflight.
        {
            let hidden_tree = self.scene.hidden;
            let Root { views, scene, outputs, hidden, .. } = self;
            if let Some(data) = outputs.get_mut(id) {
                output::evacuate_inflight(views, scene, data, hidden, hidden_tree);
            }
        }

        // Step 4: evacuate pending, onto the fallback output or hidden.
        let fallback = self.registry.first();
        output::evacuate_pending(&mut self.views, &mut self.outputs, id, fallback, &mut self.hidden);

        // Step 5: destroy every layer-shell scene node on the removed
        // output. Only the four layer-shell tiers (§4.2 step 5); the
        // layout/float/fullscreen/popups tiers hold *views*, which survive a
        // deactivation so the output can be re-enabled without panicking the
        // next time a view gets reparented into them.
        if let Some(data) = self.outputs.get(id) {
            let layers = data.layers;
            for layer in [layers.background, layers.bottom, layers.top, layers.overlay] {
                self.scene.destroy_node(layer);
            }
        }

        // Step 6: refocus seats that were on the removed output.
        for seat in &mut self.seats {
            if seat.focused_output() == Some(id) {
                seat.focus_output(fallback);
            }
        }

        self.layout.remove(id);
        self.layout.notify_changed(&self.outputs, &self.registry, self.publisher.as_mut());

        // Step 7.
        self.apply_pending();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::layout::LayoutGenerator;
    use crate::output::{set_pending_output, OutputBackend, ProposedOutputState};
    use crate::output_layout::{ConfigPublisher, HeadSnapshot};
    use crate::transaction::TransactionState;
    use crate::view::{Rect, ViewDelegate, ViewImplKind, ViewPhaseState};

    #[derive(Debug)]
    struct TestBackend {
        name: String,
        size: (i32, i32),
    }

    impl TestBackend {
        fn new(name: &str, size: (i32, i32)) -> Self {
            Self { name: name.to_string(), size }
        }
    }

    impl OutputBackend for TestBackend {
        fn name(&self) -> &str {
            &self.name
        }
        fn logical_size(&self) -> (i32, i32) {
            self.size
        }
        fn set_enabled(&mut self, _enabled: bool) {}
        fn test_state(&self, _proposed: &ProposedOutputState) -> bool {
            true
        }
        fn commit_state(&mut self, _proposed: &ProposedOutputState) -> Result<(), ()> {
            Ok(())
        }
        fn arrange_layers(&mut self) {}
        fn update_background_rect(&mut self) {}
        fn publish_status(&mut self, _tags: u32) {}
    }

    #[derive(Debug, Default)]
    struct DelegateState {
        needs_configure: bool,
        configure_calls: u32,
        destroyed: bool,
    }

    #[derive(Debug)]
    struct TestDelegate(Rc<RefCell<DelegateState>>);

    impl ViewDelegate for TestDelegate {
        fn needs_configure(&mut self) -> bool {
            self.0.borrow().needs_configure
        }
        fn configure(&mut self) -> u32 {
            let mut state = self.0.borrow_mut();
            state.configure_calls += 1;
            state.configure_calls
        }
        fn save_surface_tree(&mut self) {}
        fn send_frame_done(&mut self) {}
        fn apply_current(&mut self, _current: &ViewPhaseState) {}
        fn clamp_to_output(&self, proposed: Rect, _output_box: Rect) -> Rect {
            proposed
        }
        fn destroy(&mut self) {
            self.0.borrow_mut().destroyed = true;
        }
    }

    #[derive(Debug)]
    struct TestPublisher;

    impl ConfigPublisher for TestPublisher {
        fn publish(&mut self, _heads: &[HeadSnapshot]) -> Result<(), crate::Error> {
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct TimerState {
        armed: bool,
        last_duration: Option<Duration>,
    }

    #[derive(Debug)]
    struct TestTimer(Rc<RefCell<TimerState>>);

    impl crate::transaction::TimerDriver for TestTimer {
        fn arm(&mut self, duration: Duration) -> Result<(), crate::Error> {
            let mut state = self.0.borrow_mut();
            state.armed = true;
            state.last_duration = Some(duration);
            Ok(())
        }
        fn disarm(&mut self) {
            self.0.borrow_mut().armed = false;
        }
    }

    #[derive(Debug)]
    struct TestLayoutGenerator;

    impl LayoutGenerator for TestLayoutGenerator {
        fn start_layout_demand(&mut self, _count: usize) {}
    }

    fn harness() -> (Root, Rc<RefCell<TimerState>>) {
        let timer_state = Rc::new(RefCell::new(TimerState::default()));
        let root = Root::init(
            Box::new(TestPublisher),
            Box::new(TestTimer(timer_state.clone())),
            lattice_compositor_config::Config::default(),
        );
        (root, timer_state)
    }

    #[derive(Debug, Default)]
    struct TestSeatState {
        focused_output: Option<OutputId>,
    }

    #[derive(Debug)]
    struct TestSeat(Rc<RefCell<TestSeatState>>);

    impl crate::seat::SeatHandle for TestSeat {
        fn focus_pending(&mut self) {}
        fn focused_output(&self) -> Option<OutputId> {
            self.0.borrow().focused_output
        }
        fn focus_output(&mut self, output: Option<OutputId>) {
            self.0.borrow_mut().focused_output = output;
        }
        fn refresh_cursor(&mut self) {}
    }

    fn add_active_output(root: &mut Root, name: &str, size: (i32, i32)) -> OutputId {
        let id = root.new_output(Box::new(TestBackend::new(name, size)));
        root.add_output(id);
        id
    }

    fn spawn_view(root: &mut Root) -> (ViewId, Rc<RefCell<DelegateState>>) {
        let state = Rc::new(RefCell::new(DelegateState::default()));
        let id = root.create_view(ViewImplKind::Xdg, Box::new(TestDelegate(state.clone())));
        (id, state)
    }

    fn place_on_output(root: &mut Root, view: ViewId, output: Option<OutputId>) {
        set_pending_output(&mut root.views, &mut root.outputs, &mut root.hidden, view, output);
    }

    /// Single output, one view, tag change. Settle a baseline transaction,
    /// then drive a tag flip through both `AwaitingLayout` and
    /// `AwaitingConfigures` before asserting the commit landed.
    #[test]
    fn single_output_tag_change() {
        let (mut root, _timer) = harness();
        let output = add_active_output(&mut root, "A", (1000, 800));
        root.set_layout_generator(output, Some(Box::new(TestLayoutGenerator)));

        let (view, delegate) = spawn_view(&mut root);
        place_on_output(&mut root, view, Some(output));
        root.views.get_mut(view).unwrap().pending.tags = 0b01;
        root.outputs.get_mut(output).unwrap().pending.tags = 0b01;
        delegate.borrow_mut().needs_configure = true;

        root.apply_pending();
        assert_eq!(root.state, TransactionState::AwaitingLayout);
        root.notify_layout_demand_done(output);
        assert_eq!(root.state, TransactionState::AwaitingConfigures);
        root.notify_configured(view);
        assert_eq!(root.state, TransactionState::Idle);
        assert_eq!(root.outputs.get(output).unwrap().current.tags, 0b01);
        assert_eq!(root.views.get(view).unwrap().current.tags, 0b01);

        // Now the actual mutation under test.
        root.outputs.get_mut(output).unwrap().pending.tags = 0b10;
        root.views.get_mut(view).unwrap().pending.tags = 0b10;
        delegate.borrow_mut().needs_configure = true;

        root.apply_pending();
        assert_eq!(root.state, TransactionState::AwaitingLayout);
        assert_eq!(root.inflight_layout_demands, 1);
        root.notify_layout_demand_done(output);
        assert_eq!(root.state, TransactionState::AwaitingConfigures);
        assert_eq!(root.inflight_configures, 1);
        root.notify_configured(view);

        assert_eq!(root.state, TransactionState::Idle);
        assert_eq!(root.outputs.get(output).unwrap().current.tags, 0b10);
        assert_eq!(root.views.get(view).unwrap().current.tags, 0b10);
        let tree = root.views.get(view).unwrap().tree;
        assert!(root.scene.node(tree).unwrap().enabled);
    }

    /// Float -> fullscreen -> unfullscreen.
    #[test]
    fn float_fullscreen_unfullscreen() {
        let (mut root, _timer) = harness();
        let output = add_active_output(&mut root, "A", (1000, 800));
        let (view, delegate) = spawn_view(&mut root);
        place_on_output(&mut root, view, Some(output));
        {
            let v = root.views.get_mut(view).unwrap();
            v.pending.tags = 1;
            v.pending.float = true;
            // Not-yet-floating -> floating is treated as a transition by
            // `collecting`, which restores `float_box` rather than trusting
            // whatever `pending.geometry` the caller left behind.
            v.float_box = Rect { x: 100, y: 100, w: 400, h: 300 };
        }
        root.outputs.get_mut(output).unwrap().pending.tags = 1;
        delegate.borrow_mut().needs_configure = true;
        root.apply_pending();
        root.notify_configured(view);
        assert_eq!(root.state, TransactionState::Idle);
        assert_eq!(root.views.get(view).unwrap().current.geometry, Rect { x: 100, y: 100, w: 400, h: 300 });

        // Go fullscreen.
        root.views.get_mut(view).unwrap().pending.fullscreen = true;
        delegate.borrow_mut().needs_configure = true;
        root.apply_pending();
        assert_eq!(
            root.views.get(view).unwrap().inflight.geometry,
            Rect { x: 0, y: 0, w: 1000, h: 800 }
        );
        assert_eq!(
            root.views.get(view).unwrap().post_fullscreen_box,
            Rect { x: 100, y: 100, w: 400, h: 300 }
        );
        root.notify_configured(view);
        assert_eq!(root.state, TransactionState::Idle);
        assert_eq!(root.outputs.get(output).unwrap().current.fullscreen, Some(view));
        let fullscreen_layer = root.outputs.get(output).unwrap().layers.fullscreen;
        let tree = root.views.get(view).unwrap().tree;
        assert_eq!(root.scene.parent_of(tree), Some(fullscreen_layer));

        // Leave fullscreen.
        root.views.get_mut(view).unwrap().pending.fullscreen = false;
        delegate.borrow_mut().needs_configure = true;
        root.apply_pending();
        root.notify_configured(view);
        assert_eq!(root.state, TransactionState::Idle);
        assert_eq!(root.outputs.get(output).unwrap().current.fullscreen, None);
        assert_eq!(root.views.get(view).unwrap().current.geometry, Rect { x: 100, y: 100, w: 400, h: 300 });
        let float_layer = root.outputs.get(output).unwrap().layers.float;
        assert_eq!(root.scene.parent_of(tree), Some(float_layer));
    }

    /// Hotplug down to zero then back up, carrying `hidden.tags` across.
    #[test]
    fn hotplug_down_to_zero_then_up() {
        let (mut root, _timer) = harness();
        let a = add_active_output(&mut root, "A", (1000, 800));
        let b = add_active_output(&mut root, "B", (1000, 800));

        let (view, delegate) = spawn_view(&mut root);
        place_on_output(&mut root, view, Some(b));
        root.views.get_mut(view).unwrap().pending.tags = 0b100;
        root.outputs.get_mut(b).unwrap().pending.tags = 0b100;
        delegate.borrow_mut().needs_configure = true;
        root.apply_pending();
        root.notify_configured(view);

        // Remaining transitions are driven entirely by `remove_output`'s own
        // trailing `apply_pending` call; stop demanding configures so each
        // one settles synchronously instead of parking in
        // `AwaitingConfigures` with nothing left to drive it.
        delegate.borrow_mut().needs_configure = false;

        root.remove_output(b);
        assert_eq!(root.state, TransactionState::Idle);
        assert_eq!(root.views.get(view).unwrap().pending.output, Some(a));

        root.outputs.get_mut(a).unwrap().pending.tags = 0b100;
        root.remove_output(a);
        assert_eq!(root.state, TransactionState::Idle);
        assert_eq!(root.views.get(view).unwrap().pending.output, None);
        assert_eq!(root.hidden.tags, 0b100);
        let tree = root.views.get(view).unwrap().tree;
        assert_eq!(root.scene.parent_of(tree), Some(root.scene.hidden));

        let c = add_active_output(&mut root, "C", (1200, 900));
        assert_eq!(root.views.get(view).unwrap().pending.output, Some(c));
        assert_eq!(root.outputs.get(c).unwrap().pending.tags, 0b100);
    }

    /// A client that never acks its configure is committed anyway once
    /// the timeout fires.
    #[test]
    fn slow_client_times_out() {
        let (mut root, timer) = harness();
        let output = add_active_output(&mut root, "A", (1000, 800));
        let (view, delegate) = spawn_view(&mut root);
        place_on_output(&mut root, view, Some(output));
        root.views.get_mut(view).unwrap().pending.tags = 1;
        root.outputs.get_mut(output).unwrap().pending.tags = 1;
        delegate.borrow_mut().needs_configure = true;

        root.apply_pending();
        assert_eq!(root.state, TransactionState::AwaitingConfigures);
        assert_eq!(root.inflight_configures, 1);
        assert!(timer.borrow().armed);

        root.on_configure_timeout();
        assert_eq!(root.state, TransactionState::Idle);
        assert_eq!(root.inflight_configures, 0);
        assert_eq!(root.views.get(view).unwrap().current.tags, 1);
    }

    /// A mutation during `AwaitingConfigures` latches `pending_state_dirty`
    /// and the first transaction still commits; the second one re-runs on
    /// exit from `Committing`.
    #[test]
    fn dirty_mid_transaction_reruns() {
        let (mut root, _timer) = harness();
        let output = add_active_output(&mut root, "A", (1000, 800));
        let (view, delegate) = spawn_view(&mut root);
        place_on_output(&mut root, view, Some(output));
        root.views.get_mut(view).unwrap().pending.tags = 1;
        root.outputs.get_mut(output).unwrap().pending.tags = 1;
        delegate.borrow_mut().needs_configure = true;

        root.apply_pending();
        assert_eq!(root.state, TransactionState::AwaitingConfigures);

        // Mutate pending while the first transaction is still in flight.
        root.views.get_mut(view).unwrap().pending.tags = 0b10;
        root.apply_pending();
        assert!(root.pending_state_dirty);
        assert_eq!(root.state, TransactionState::AwaitingConfigures);

        delegate.borrow_mut().needs_configure = true;
        root.notify_configured(view);

        // The dirty re-entry should have started a second transaction
        // immediately on exit from Committing.
        assert!(!root.pending_state_dirty);
        assert_eq!(root.state, TransactionState::AwaitingConfigures);
        assert_eq!(root.inflight_configures, 1);

        root.notify_configured(view);
        assert_eq!(root.state, TransactionState::Idle);
        assert_eq!(root.views.get(view).unwrap().current.tags, 0b10);
    }

    /// `focus_new_outputs = false` still runs the zero-to-one evacuation
    /// but leaves seats pointed wherever they were.
    #[test]
    fn focus_new_outputs_false_skips_seat_refocus_only() {
        let timer_state = Rc::new(RefCell::new(TimerState::default()));
        let mut config = lattice_compositor_config::Config::default();
        config.focus_new_outputs = false;
        let mut root = Root::init(Box::new(TestPublisher), Box::new(TestTimer(timer_state)), config);

        let seat_state = Rc::new(RefCell::new(TestSeatState::default()));
        root.add_seat(Box::new(TestSeat(seat_state.clone())));

        let (view, _delegate) = spawn_view(&mut root);
        let output = add_active_output(&mut root, "A", (1000, 800));

        assert_eq!(seat_state.borrow().focused_output, None);
        assert_eq!(root.views.get(view).unwrap().pending.output, Some(output));
    }

    /// add_output/remove_output are idempotent.
    #[test]
    fn add_remove_output_idempotent() {
        let (mut root, _timer) = harness();
        let output = add_active_output(&mut root, "A", (1000, 800));
        root.add_output(output);
        assert_eq!(root.registry.outputs, vec![output]);

        root.remove_output(output);
        root.remove_output(output);
        assert!(root.registry.outputs.is_empty());
    }

    /// After a settled transaction, both counters and the dirty flag
    /// are back to their idle values and every phase agrees.
    #[test]
    fn drains_to_idle() {
        let (mut root, _timer) = harness();
        let output = add_active_output(&mut root, "A", (1000, 800));
        let (view, delegate) = spawn_view(&mut root);
        place_on_output(&mut root, view, Some(output));
        root.views.get_mut(view).unwrap().pending.tags = 1;
        root.outputs.get_mut(output).unwrap().pending.tags = 1;
        delegate.borrow_mut().needs_configure = true;

        root.apply_pending();
        root.notify_configured(view);

        assert_eq!(root.inflight_configures, 0);
        assert_eq!(root.inflight_layout_demands, 0);
        assert!(!root.pending_state_dirty);
        let v = root.views.get(view).unwrap();
        assert_eq!(v.pending.tags, v.inflight.tags);
        assert_eq!(v.inflight.tags, v.current.tags);
        let o = root.outputs.get(output).unwrap();
        assert_eq!(o.pending.tags, o.inflight.tags);
        assert_eq!(o.inflight.tags, o.current.tags);
    }

    /// X11 views never show up in `inflight_configures`, per the configure
    /// wait exemption.
    #[test]
    fn x11_views_are_exempt_from_configure_wait() {
        let (mut root, _timer) = harness();
        let output = add_active_output(&mut root, "A", (1000, 800));
        let (view, delegate) = spawn_view(&mut root);
        root.views.get_mut(view).unwrap().kind = ViewImplKind::X11;
        place_on_output(&mut root, view, Some(output));
        root.views.get_mut(view).unwrap().pending.tags = 1;
        root.outputs.get_mut(output).unwrap().pending.tags = 1;
        delegate.borrow_mut().needs_configure = true;

        root.apply_pending();
        assert_eq!(root.state, TransactionState::Idle);
        assert_eq!(root.inflight_configures, 0);
    }

    /// Two tag-matching views both request fullscreen on the same output:
    /// only the one encountered first in focus-stack order is elected, and
    /// the loser stays a normal tiled/floating view.
    #[test]
    fn fullscreen_election_picks_one_of_two_eligible_views() {
        let (mut root, _timer) = harness();
        let output = add_active_output(&mut root, "A", (1000, 800));
        let (first, first_delegate) = spawn_view(&mut root);
        let (second, second_delegate) = spawn_view(&mut root);
        place_on_output(&mut root, first, Some(output));
        place_on_output(&mut root, second, Some(output));

        root.outputs.get_mut(output).unwrap().pending.tags = 1;
        for view in [first, second] {
            let v = root.views.get_mut(view).unwrap();
            v.pending.tags = 1;
            v.pending.fullscreen = true;
        }
        first_delegate.borrow_mut().needs_configure = true;
        second_delegate.borrow_mut().needs_configure = true;

        root.apply_pending();
        root.notify_configured(first);
        root.notify_configured(second);

        assert_eq!(root.state, TransactionState::Idle);
        assert_eq!(root.outputs.get(output).unwrap().current.fullscreen, Some(first));
        let second_tree = root.views.get(second).unwrap().tree;
        let fullscreen_layer = root.outputs.get(output).unwrap().layers.fullscreen;
        assert_ne!(root.scene.parent_of(second_tree), Some(fullscreen_layer));
    }
}
