//! The output-management `test`/`apply` verbs.
//!
//! Both operate on a batch of per-head proposals. `test` never mutates
//! anything; `apply` commits each head in turn, reporting partial success
//! exactly as the wire protocol allows.

use crate::arena::Arena;
use crate::output::{OutputData, OutputId, ProposedOutputState};
use crate::root::Root;

/// One proposed change to one already-advertised output.
#[derive(Debug, Clone)]
pub struct HeadConfig {
    pub output: OutputId,
    pub state: ProposedOutputState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOutcome {
    Succeeded,
    Failed,
}

/// Ask every proposed head whether it would accept its state.
/// Any rejection fails the whole request; nothing is ever mutated here.
pub fn test_configuration(outputs: &Arena<OutputData>, heads: &[HeadConfig]) -> ConfigOutcome {
    for head in heads {
        let Some(data) = outputs.get(head.output) else {
            warn!(?head.output, "test: unknown output in proposed configuration");
            return ConfigOutcome::Failed;
        };
        if !data.backend.test_state(&head.state) {
            return ConfigOutcome::Failed;
        }
    }
    ConfigOutcome::Succeeded
}

/// Detaches `layout`'s change listener for the duration of the mutation so
/// it doesn't see and republish each intermediate step, commits each head,
/// and leaves successfully-applied heads in their new state even if a
/// later head in the same batch is rejected.
pub fn apply_configuration(root: &mut Root, heads: &[HeadConfig]) -> ConfigOutcome {
    let mut outcome = ConfigOutcome::Succeeded;

    root.layout.detach();

    for head in heads {
        let Some(data) = root.outputs.get_mut(head.output) else {
            warn!(?head.output, "apply: unknown output in proposed configuration");
            outcome = ConfigOutcome::Failed;
            continue;
        };

        if data.backend.commit_state(&head.state).is_err() {
            warn!(output = data.backend.name(), "apply: output rejected commit");
            outcome = ConfigOutcome::Failed;
            continue;
        }

        if head.state.enabled {
            // Upsert the output into the layout at its position, enable
            // and position its tree, recompute background, arrange layer
            // surfaces.
            root.layout.set_position(head.output, head.state.position);
            if !root.registry.outputs.contains(&head.output) {
                root.registry.outputs.push(head.output);
            }
            let data = root.outputs.get_mut(head.output).unwrap();
            root.scene.set_enabled(data.tree, true);
            root.scene.set_location(data.tree, head.state.position);
            data.backend.update_background_rect();
            data.backend.arrange_layers();
        } else {
            // Call remove_output, drop from the layout, and disable the
            // tree: goes through the exact same evacuation path as an
            // unplug, so disabling a head mid-session can't leave views
            // stuck on a dead output.
            root.remove_output(head.output);
            let data = root.outputs.get_mut(head.output).unwrap();
            data.backend.set_enabled(false);
            root.scene.set_enabled(data.tree, false);
            root.layout.remove(head.output);
        }
    }

    root.layout.reattach();
    root.layout.notify_changed(&root.outputs, &root.registry, root.publisher.as_mut());

    root.apply_pending();
    outcome
}

/// Blank or unblank an output on request of the power-management protocol. Unlike disabling a head through
/// [`apply_configuration`], this never touches the layout or evacuates
/// views — a blanked display keeps its place in the arrangement and its
/// views, it simply stops scanning out. Returns whether the output was
/// known; there is no partial-failure case here since the backend is not
/// asked to accept or reject a power state the way it is for a full mode
/// commit.
pub fn set_output_power(root: &mut Root, output: OutputId, enabled: bool) -> bool {
    let Some(data) = root.outputs.get_mut(output) else {
        warn!(?output, "power: unknown output");
        return false;
    };
    data.backend.set_enabled(enabled);
    root.scene.set_enabled(data.tree, enabled);
    true
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::output::{OutputBackend, ProposedOutputState};
    use crate::output_layout::{ConfigPublisher, HeadSnapshot};
    use crate::scene::Point;
    use crate::transaction::TimerDriver;

    #[derive(Debug)]
    struct AcceptingBackend {
        name: String,
        size: (i32, i32),
        enabled: bool,
    }

    impl OutputBackend for AcceptingBackend {
        fn name(&self) -> &str {
            &self.name
        }
        fn logical_size(&self) -> (i32, i32) {
            self.size
        }
        fn set_enabled(&mut self, enabled: bool) {
            self.enabled = enabled;
        }
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

    /// A backend that rejects every commit, used to exercise the partial
    /// failure path.
    #[derive(Debug)]
    struct RejectingBackend {
        name: String,
        size: (i32, i32),
    }

    impl OutputBackend for RejectingBackend {
        fn name(&self) -> &str {
            &self.name
        }
        fn logical_size(&self) -> (i32, i32) {
            self.size
        }
        fn set_enabled(&mut self, _enabled: bool) {}
        fn test_state(&self, _proposed: &ProposedOutputState) -> bool {
            false
        }
        fn commit_state(&mut self, _proposed: &ProposedOutputState) -> Result<(), ()> {
            Err(())
        }
        fn arrange_layers(&mut self) {}
        fn update_background_rect(&mut self) {}
        fn publish_status(&mut self, _tags: u32) {}
    }

    #[derive(Debug)]
    struct NoopPublisher;

    impl ConfigPublisher for NoopPublisher {
        fn publish(&mut self, _heads: &[HeadSnapshot]) -> Result<(), crate::Error> {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct NoopTimer;

    impl TimerDriver for NoopTimer {
        fn arm(&mut self, _duration: Duration) -> Result<(), crate::Error> {
            Ok(())
        }
        fn disarm(&mut self) {}
    }

    fn harness() -> Root {
        Root::init(Box::new(NoopPublisher), Box::new(NoopTimer), lattice_compositor_config::Config::default())
    }

    fn proposed(enabled: bool) -> ProposedOutputState {
        ProposedOutputState {
            enabled,
            mode: Some((1920, 1080, 60_000)),
            position: Point { x: 0, y: 0 },
            transform: 0,
            scale_mil: 1000,
            adaptive_sync: false,
        }
    }

    /// Two heads, one acceptable and one rejected. The accepted head's
    /// new state sticks; the whole request still reports failure.
    #[test]
    fn partial_failure_keeps_accepted_head_applied() {
        let mut root = harness();
        let good = root.new_output(Box::new(AcceptingBackend { name: "A".into(), size: (1920, 1080), enabled: false }));
        let bad = root.new_output(Box::new(RejectingBackend { name: "B".into(), size: (1920, 1080) }));
        root.add_output(good);

        let heads = vec![
            HeadConfig { output: good, state: proposed(true) },
            HeadConfig { output: bad, state: proposed(true) },
        ];

        let outcome = apply_configuration(&mut root, &heads);
        assert_eq!(outcome, ConfigOutcome::Failed);
        assert!(root.registry.outputs.contains(&good));
        assert!(!root.registry.outputs.contains(&bad));
    }

    #[test]
    fn test_configuration_never_mutates() {
        let mut root = harness();
        let good = root.new_output(Box::new(AcceptingBackend { name: "A".into(), size: (1920, 1080), enabled: false }));
        let outcome = test_configuration(&root.outputs, &[HeadConfig { output: good, state: proposed(true) }]);
        assert_eq!(outcome, ConfigOutcome::Succeeded);
        assert!(!root.registry.outputs.contains(&good));
    }

    #[test]
    fn test_configuration_fails_on_rejecting_head() {
        let mut root = harness();
        let bad = root.new_output(Box::new(RejectingBackend { name: "B".into(), size: (1920, 1080) }));
        let outcome = test_configuration(&root.outputs, &[HeadConfig { output: bad, state: proposed(true) }]);
        assert_eq!(outcome, ConfigOutcome::Failed);
    }

    #[test]
    fn power_set_mode_toggles_backend_and_tree_without_touching_layout() {
        let mut root = harness();
        let output = root.new_output(Box::new(AcceptingBackend { name: "A".into(), size: (1920, 1080), enabled: false }));
        root.add_output(output);

        assert!(set_output_power(&mut root, output, false));
        assert!(!root.scene.node(root.outputs.get(output).unwrap().tree).unwrap().enabled);
        assert!(root.registry.outputs.contains(&output));

        assert!(set_output_power(&mut root, output, true));
        assert!(root.scene.node(root.outputs.get(output).unwrap().tree).unwrap().enabled);
    }

    #[test]
    fn power_set_mode_on_unknown_output_reports_failure() {
        let mut root = harness();
        let output = root.new_output(Box::new(AcceptingBackend { name: "A".into(), size: (1920, 1080), enabled: false }));
        root.remove_output(output);
        root.outputs.remove(output);
        assert!(!set_output_power(&mut root, output, true));
    }
}
