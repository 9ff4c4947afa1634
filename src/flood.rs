//! Priority-flood construction of the drainage forest.
//!
//! Starting from the outlets, cells are popped in non-decreasing key order
//! (elevation plus a random tie-break). Each unvisited land neighbour of the
//! popped cell is admitted, keyed, and recorded as that cell's upstream child.
//! A cell is marked visited the moment it is pushed, so every cell is pushed
//! once and receives exactly one parent.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::{debug, info};

use crate::grid::{ElevationGrid, Grid, step};
use crate::outlets::{Outlets, is_land};
use crate::rng::Perturbation;

const PROGRESS_EVERY: usize = 1_000_000;

/// Priority queue entry: `(elevation + perturbation, x, y)`.
/// Implements Ord reversed for min-heap behaviour.
#[derive(Clone, Copy, Debug)]
pub struct FloodEntry {
    pub key: f64,
    pub x: usize,
    pub y: usize,
}

impl FloodEntry {
    /// Key a freshly admitted cell with one independent draw.
    pub fn new<P: Perturbation + ?Sized>(elev: f32, perturb: &mut P, x: usize, y: usize) -> Self {
        Self {
            key: elev as f64 + perturb.next_unit(),
            x,
            y,
        }
    }
}

impl PartialEq for FloodEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloodEntry {}

impl Ord for FloodEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse: lowest key pops first; coordinates settle exact ties.
        other
            .key
            .total_cmp(&self.key)
            .then_with(|| other.x.cmp(&self.x))
            .then_with(|| other.y.cmp(&self.y))
    }
}

impl PartialOrd for FloodEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Which of the four cardinal neighbours are upstream children.
/// Bit `d` refers to `grid::DIRS4[d]` (W, N, E, S).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChildMask(pub u8);

impl ChildMask {
    #[inline]
    pub fn with(self, d: usize) -> Self {
        Self(self.0 | 1 << d)
    }

    #[inline]
    pub fn has(self, d: usize) -> bool {
        self.0 & (1 << d) != 0
    }

    #[inline]
    pub fn is_leaf(self) -> bool {
        self.0 == 0
    }
}

/// Spanning forest over every land cell reachable from an outlet.
/// Edges are implicit in the per-cell child masks.
pub struct FlowTree {
    pub children: Grid<ChildMask>,
    /// Tree roots, in discovery order.
    pub outlets: Vec<(usize, usize)>,
    /// Number of cells popped from the frontier (outlets included).
    pub traversed: usize,
}

impl FlowTree {
    /// Upstream children of `(x, y)`.
    pub fn children_of(&self, x: usize, y: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        let mask = self.children.get(x, y);
        let (w, h) = (self.children.w, self.children.h);
        (0..4)
            .filter(move |&d| mask.has(d))
            .filter_map(move |d| step(x, y, d, w, h))
    }
}

/// Run the priority flood from `outlets` and record every cell's children.
///
/// The outlets' visited mask is taken over and dropped on return.
pub fn build_flow_tree<P: Perturbation>(
    elev: &ElevationGrid,
    sea_level: f32,
    outlets: Outlets,
    perturb: &mut P,
) -> FlowTree {
    let w = elev.w;
    let h = elev.h;
    let Outlets {
        entries,
        mut visited,
        land_cells,
    } = outlets;

    let roots: Vec<(usize, usize)> = entries.iter().map(|e| (e.x, e.y)).collect();
    let mut heap = BinaryHeap::from(entries);
    let mut children = Grid::<ChildMask>::new(w, h);
    let mut traversed = 0usize;

    info!(to_visit = land_cells, roots = roots.len(), "building flow trees");

    while let Some(FloodEntry { key, x, y }) = heap.pop() {
        let mut mask = ChildMask::default();
        for d in 0..4 {
            let Some((nx, ny)) = step(x, y, d, w, h) else {
                continue;
            };
            let ni = elev.idx(nx, ny);
            if visited.data[ni] || !is_land(elev.data[ni], sea_level) {
                continue;
            }
            visited.data[ni] = true;
            heap.push(FloodEntry::new(elev.data[ni], perturb, nx, ny));
            mask = mask.with(d);
        }
        children.set(x, y, mask);

        traversed += 1;
        if traversed % PROGRESS_EVERY == 0 {
            debug!(
                millions_left = land_cells.saturating_sub(traversed) / PROGRESS_EVERY,
                altitude = key as i64,
                queue = heap.len(),
                "flooding"
            );
        }
    }

    info!(traversed, unreached = land_cells.saturating_sub(traversed), "flow trees built");

    FlowTree {
        children,
        outlets: roots,
        traversed,
    }
}
