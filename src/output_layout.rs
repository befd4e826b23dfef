//! Geometric output arrangement.
//!
//! Owns the left-to-right auto-arrangement of outputs and republishes a
//! fresh configuration snapshot whenever that arrangement changes. The
//! reentrancy guard here is what lets [`crate::output_config`]'s `apply`
//! mutate the layout without triggering a second, overlapping publish.

use std::collections::HashMap;
use std::fmt;

use crate::output::OutputId;
use crate::scene::Point;

/// A flattened view of one output's placement, handed to whatever
/// publishes the output-management / xdg-output globals. The actual
/// protocol wiring is out of scope for this crate; this is the contract it
/// is built against.
#[derive(Debug, Clone)]
pub struct HeadSnapshot {
    pub output: OutputId,
    pub name: String,
    pub position: Point,
    pub size: (i32, i32),
    pub enabled: bool,
}

pub trait ConfigPublisher: fmt::Debug {
    /// Push a fresh `currentOutputConfig`-equivalent snapshot. Failure is
    /// logged by the caller and otherwise ignored: skipping one publish is
    /// harmless, the next layout change will try again.
    fn publish(&mut self, heads: &[HeadSnapshot]) -> Result<(), crate::Error>;
}

#[derive(Debug, Default)]
pub struct OutputLayoutBridge {
    positions: HashMap<OutputId, Point>,
    /// Re-entry guard on layout changes: `true` for the duration of
    /// [`crate::output_config::apply_configuration`]. While set,
    /// [`OutputLayoutBridge::notify_changed`] is a no-op, so layout
    /// mutations made by `apply` don't recursively republish a
    /// configuration that `apply` itself hasn't finished building yet.
    detached: bool,
}

impl OutputLayoutBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detach the change listener for the duration of a programmatic
    /// edit, e.g. an output-configuration apply. Must be paired with
    /// [`OutputLayoutBridge::reattach`] on every exit path.
    pub fn detach(&mut self) {
        self.detached = true;
    }

    pub fn reattach(&mut self) {
        self.detached = false;
    }

    /// Auto-position `id` at the right edge of the current arrangement and
    /// return the assigned top-left coordinate.
    pub fn auto_position(&mut self, id: OutputId, size: (i32, i32)) -> Point {
        let x = self
            .positions
            .values()
            .map(|p| p.x)
            .max()
            .map(|max_x| {
                // Find the width of whichever output sits at max_x isn't
                // tracked here; auto-position simply appends past the
                // rightmost known edge using this output's own width as a
                // conservative step, matching a naive left-to-right packer.
                max_x + size.0
            })
            .unwrap_or(0);
        let point = Point { x, y: 0 };
        self.positions.insert(id, point);
        point
    }

    /// Explicit placement, used by the output-configuration apply path.
    pub fn set_position(&mut self, id: OutputId, position: Point) {
        self.positions.insert(id, position);
    }

    pub fn remove(&mut self, id: OutputId) {
        self.positions.remove(&id);
    }

    pub fn position(&self, id: OutputId) -> Option<Point> {
        self.positions.get(&id).copied()
    }

    /// Republish the current arrangement. A no-op between
    /// [`OutputLayoutBridge::detach`] and [`OutputLayoutBridge::reattach`]:
    /// `apply_configuration` mutates the layout head by head and
    /// republishes exactly once itself, after it calls `reattach`.
    pub fn notify_changed(
        &mut self,
        outputs: &crate::arena::Arena<crate::output::OutputData>,
        registry: &crate::output::OutputRegistry,
        publisher: &mut dyn ConfigPublisher,
    ) {
        if self.detached {
            return;
        }
        let heads = registry
            .all_outputs
            .iter()
            .filter_map(|&id| {
                let data = outputs.get(id)?;
                Some(HeadSnapshot {
                    output: id,
                    name: data.backend.name().to_string(),
                    position: self.positions.get(&id).copied().unwrap_or_default(),
                    size: data.backend.logical_size(),
                    enabled: registry.outputs.contains(&id),
                })
            })
            .collect::<Vec<_>>();
        if let Err(err) = publisher.publish(&heads) {
            error!(%err, "failed to publish output configuration");
        }
    }
}
