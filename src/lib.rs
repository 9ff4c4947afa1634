pub mod accumulate;
pub mod config;
pub mod error;
pub mod flood;
pub mod grid;
pub mod io;
pub mod outlets;
pub mod render;
pub mod rng;

use std::time::Instant;

use tracing::{info, info_span};

use config::{Params, Validated};
use error::Result;
use grid::{ElevationGrid, Grid, check_shape};
use render::WidthRaster;
use rng::{Perturbation, Rng};

pub use error::Error;

pub struct RiverMap {
    pub w: usize,
    pub h: usize,
    pub outlets: Vec<(usize, usize)>,
    pub traversed: usize,
    pub accumulation: Grid<u32>,
    pub max_accumulation: u32,
    pub raster: WidthRaster,
}

pub struct Timing {
    pub name: &'static str,
    pub ms: f64,
}

/// Validate, seed the tie-break source from `params.seed` (or OS entropy),
/// and run the full pipeline.
pub fn generate(elevation: &ElevationGrid, params: &Params) -> Result<(RiverMap, Vec<Timing>)> {
    let params = params.validate()?;
    let mut rng = match params.seed {
        Some(seed) => Rng::new(seed),
        None => Rng::from_entropy(),
    };
    generate_with(elevation, &params, &mut rng)
}

/// Pipeline with an injected perturbation source.
pub fn generate_with<P: Perturbation>(
    elevation: &ElevationGrid,
    params: &Validated,
    perturb: &mut P,
) -> Result<(RiverMap, Vec<Timing>)> {
    check_shape(elevation.w, elevation.h)?;
    let w = elevation.w;
    let h = elevation.h;
    let mut timings = Vec::new();
    let total_start = Instant::now();

    // 1. Outlets: coast + open map edge
    let t = Instant::now();
    let outlets = {
        let _stage = info_span!("stage", name = "outlets").entered();
        info!("stage started");
        outlets::find_outlets(elevation, params.sea_level, perturb)
    };
    let roots: Vec<(usize, usize)> = outlets.cells().collect();
    timings.push(Timing {
        name: "outlets",
        ms: t.elapsed().as_secs_f64() * 1000.0,
    });

    // 2. Priority flood -> flow forest (visited mask dropped inside)
    let t = Instant::now();
    let tree = {
        let _stage = info_span!("stage", name = "flow_tree").entered();
        info!("stage started");
        flood::build_flow_tree(elevation, params.sea_level, outlets, perturb)
    };
    timings.push(Timing {
        name: "flow_tree",
        ms: t.elapsed().as_secs_f64() * 1000.0,
    });

    // 3. Upstream counts
    let t = Instant::now();
    let acc = {
        let _stage = info_span!("stage", name = "accumulate").entered();
        info!("stage started");
        accumulate::accumulate(&tree)
    };
    let traversed = tree.traversed;
    drop(tree);
    timings.push(Timing {
        name: "accumulate",
        ms: t.elapsed().as_secs_f64() * 1000.0,
    });

    // 4. Width raster
    let t = Instant::now();
    let raster = {
        let _stage = info_span!("stage", name = "render").entered();
        info!("stage started");
        render::render_width(&acc.counts, acc.max, params)
    };
    timings.push(Timing {
        name: "render",
        ms: t.elapsed().as_secs_f64() * 1000.0,
    });

    let total_ms = total_start.elapsed().as_secs_f64() * 1000.0;
    timings.push(Timing {
        name: "TOTAL",
        ms: total_ms,
    });

    let map = RiverMap {
        w,
        h,
        outlets: roots,
        traversed,
        accumulation: acc.counts,
        max_accumulation: acc.max,
        raster,
    };

    Ok((map, timings))
}
