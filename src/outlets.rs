//! Outlet discovery: the roots of the drainage forest.
//!
//! Interior cells above sea level with a 4-neighbour at or below sea level are
//! coastal outlets. Every above-sea cell on the map edge is an outlet too: the
//! edge is an open boundary where water leaves the mapped area.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::flood::FloodEntry;
use crate::grid::{ElevationGrid, Grid, neighbors4};
use crate::rng::Perturbation;

const PROGRESS_EVERY: usize = 1_000_000;

/// Land test shared by every stage. NaN compares false, so it is a barrier.
#[inline]
pub fn is_land(elev: f32, sea_level: f32) -> bool {
    elev > sea_level
}

/// Initial frontier plus the visited mask it was marked into.
pub struct Outlets {
    pub entries: Vec<FloodEntry>,
    pub visited: Grid<bool>,
    /// Above-sea cells anywhere on the map (progress reporting only).
    pub land_cells: usize,
}

impl Outlets {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.entries.iter().map(|e| (e.x, e.y))
    }
}

/// Scan the grid once and key every outlet.
///
/// The interior scan runs row-parallel; keys are drawn afterwards in
/// row-major order so a seeded source yields the same frontier every run.
pub fn find_outlets<P: Perturbation>(
    elev: &ElevationGrid,
    sea_level: f32,
    perturb: &mut P,
) -> Outlets {
    let w = elev.w;
    let h = elev.h;
    let mut visited = Grid::<bool>::new(w, h);
    let mut entries = Vec::new();

    // Per row: (land cells, coastal x positions)
    let rows: Vec<(usize, Vec<usize>)> = elev
        .data
        .par_chunks(w)
        .enumerate()
        .map(|(y, row)| {
            if y == 0 || y == h - 1 {
                return (0, Vec::new());
            }
            let mut land = 0;
            let mut coastal = Vec::new();
            for x in 1..w - 1 {
                if !is_land(row[x], sea_level) {
                    continue;
                }
                land += 1;
                if neighbors4(x, y, w, h).any(|(nx, ny)| !is_land(elev.get(nx, ny), sea_level)) {
                    coastal.push(x);
                }
            }
            (land, coastal)
        })
        .collect();

    let mut land_cells = 0;
    for (y, (land, coastal)) in rows.into_iter().enumerate() {
        land_cells += land;
        for x in coastal {
            let i = elev.idx(x, y);
            visited.data[i] = true;
            entries.push(FloodEntry::new(elev.data[i], perturb, x, y));
        }
        if land_cells / PROGRESS_EVERY > (land_cells - land) / PROGRESS_EVERY {
            debug!(millions = land_cells / PROGRESS_EVERY, "land cells found");
        }
    }

    // Open boundary: top/bottom rows in full, then the left/right columns.
    let mut edge = |x: usize, y: usize, visited: &mut Grid<bool>, entries: &mut Vec<FloodEntry>| {
        let i = elev.idx(x, y);
        if is_land(elev.data[i], sea_level) {
            visited.data[i] = true;
            entries.push(FloodEntry::new(elev.data[i], perturb, x, y));
            land_cells += 1;
        }
    };
    for x in 0..w {
        edge(x, 0, &mut visited, &mut entries);
        edge(x, h - 1, &mut visited, &mut entries);
    }
    for y in 1..h - 1 {
        edge(0, y, &mut visited, &mut entries);
        edge(w - 1, y, &mut visited, &mut entries);
    }

    info!(outlets = entries.len(), land_cells, "outlets found");

    Outlets {
        entries,
        visited,
        land_cells,
    }
}
