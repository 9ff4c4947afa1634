//! Upstream cell counts over the flow forest.
//!
//! Post-order walk with an explicit stack: a river chain can be as long as the
//! map, far deeper than any thread stack would allow for one frame per cell.

use tracing::info;

use crate::flood::FlowTree;
use crate::grid::{Grid, step};

/// Per-cell drainage counts. Cells outside the forest stay 0.
pub struct Accumulation {
    pub counts: Grid<u32>,
    /// Largest watershed, i.e. the largest count over all outlets.
    pub max: u32,
}

/// One pending cell on the walk: where it is, which direction to try next,
/// and the running subtree total.
#[derive(Clone, Copy)]
struct Frame {
    x: usize,
    y: usize,
    next_dir: usize,
    sum: u32,
}

impl Frame {
    fn new(x: usize, y: usize) -> Self {
        Self {
            x,
            y,
            next_dir: 0,
            sum: 1,
        }
    }

    /// Advance to the next child not yet descended into.
    fn next_child(&mut self, tree: &FlowTree) -> Option<(usize, usize)> {
        let mask = tree.children.get(self.x, self.y);
        while self.next_dir < 4 {
            let d = self.next_dir;
            self.next_dir += 1;
            if mask.has(d) {
                return step(self.x, self.y, d, tree.children.w, tree.children.h);
            }
        }
        None
    }
}

/// `count(cell) = 1 + sum(count(child))`, written once per traversed cell.
pub fn accumulate(tree: &FlowTree) -> Accumulation {
    let mut counts = Grid::<u32>::new(tree.children.w, tree.children.h);
    let mut max = 0u32;
    let mut stack: Vec<Frame> = Vec::new();

    for &(ox, oy) in &tree.outlets {
        stack.push(Frame::new(ox, oy));

        while let Some(top) = stack.last_mut() {
            if let Some((cx, cy)) = top.next_child(tree) {
                stack.push(Frame::new(cx, cy));
                continue;
            }
            let done = *top;
            stack.pop();
            counts.set(done.x, done.y, done.sum);
            match stack.last_mut() {
                Some(parent) => parent.sum += done.sum,
                None => max = max.max(done.sum),
            }
        }
    }

    info!(max_accumulation = max, "water quantity computed");

    Accumulation { counts, max }
}
