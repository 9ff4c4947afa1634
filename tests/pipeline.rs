use std::io::Write;
use std::sync::{Arc, Mutex};

use rivermap::config::{BitDepth, Params};
use rivermap::grid::{ElevationGrid, Grid};
use rivermap::io;
use rivermap::rng::{Perturbation, Rng};
use rivermap::{Error, RiverMap, generate, generate_with};

/// Tie-break source that never perturbs: equal elevations fall back to
/// coordinate order.
struct NoPerturbation;

impl Perturbation for NoPerturbation {
    fn next_unit(&mut self) -> f64 {
        0.0
    }
}

fn params(seed: u64) -> Params {
    Params {
        sea_level: 0.0,
        contrast: 1.0,
        river_width_factor: 1.0,
        bit_depth: 8,
        seed: Some(seed),
    }
}

fn run(elev: &ElevationGrid, seed: u64) -> RiverMap {
    generate(elev, &params(seed)).unwrap().0
}

fn outlet_sum(map: &RiverMap) -> usize {
    map.outlets
        .iter()
        .map(|&(x, y)| map.accumulation.get(x, y) as usize)
        .sum()
}

/// 5x5 sea with a peak of 10 at the centre and a diamond of 5 around it.
fn peak_grid() -> ElevationGrid {
    let mut elev = Grid::filled(5, 5, -1.0f32);
    elev.set(2, 2, 10.0);
    for (x, y) in [(2, 1), (1, 2), (3, 2), (2, 3)] {
        elev.set(x, y, 5.0);
    }
    elev
}

/// Land plateau at 1 ringed by a border sitting exactly at sea level.
fn plateau_grid() -> ElevationGrid {
    let mut elev = Grid::filled(5, 5, 0.0f32);
    for y in 1..4 {
        for x in 1..4 {
            elev.set(x, y, 1.0);
        }
    }
    elev
}

#[test]
fn peak_drains_through_one_diamond_outlet() {
    let elev = peak_grid();
    let map = run(&elev, 11);

    let mut outlets = map.outlets.clone();
    outlets.sort();
    assert_eq!(outlets, vec![(1, 2), (2, 1), (2, 3), (3, 2)]);
    assert_eq!(map.traversed, 5);
    assert_eq!(outlet_sum(&map), 5);
    assert_eq!(map.accumulation.get(2, 2), 1);
    assert_eq!(map.max_accumulation, 2);

    // Exactly one diamond cell carries the peak's water and is the widest.
    let mouths: Vec<_> = outlets
        .iter()
        .copied()
        .filter(|&(x, y)| map.accumulation.get(x, y) == 2)
        .collect();
    assert_eq!(mouths.len(), 1);
    let (mx, my) = mouths[0];
    let mouth = map.raster.get(mx, my);
    assert_eq!(mouth, 255);
    assert!(mouth > map.raster.get(2, 2));
    for &(x, y) in outlets.iter().filter(|&&c| c != mouths[0]) {
        assert!(mouth > map.raster.get(x, y));
        assert_eq!(map.raster.get(x, y), map.raster.get(2, 2));
    }
    // Sea renders as nothing.
    assert_eq!(map.raster.get(0, 0), 0);
}

#[test]
fn all_sea_is_a_valid_empty_map() {
    let elev = Grid::filled(6, 4, -3.0f32);
    let map = run(&elev, 0);
    assert!(map.outlets.is_empty());
    assert_eq!(map.traversed, 0);
    assert_eq!(map.max_accumulation, 0);
    for y in 0..4 {
        for x in 0..6 {
            assert_eq!(map.raster.get(x, y), 0);
        }
    }
}

#[test]
fn plateau_cells_drain_straight_to_the_coast() {
    let elev = plateau_grid();
    let map = run(&elev, 5);

    assert_eq!(map.outlets.len(), 8);
    assert_eq!(map.traversed, 9);
    assert_eq!(outlet_sum(&map), 9);
    assert_eq!(map.max_accumulation, 2);
    for (x, y) in [(1, 1), (3, 1), (1, 3), (3, 3)] {
        assert_eq!(map.accumulation.get(x, y), 1);
    }
    let claimed = [(2, 1), (1, 2), (3, 2), (2, 3)]
        .iter()
        .filter(|&&(x, y)| map.accumulation.get(x, y) == 2)
        .count();
    assert_eq!(claimed, 1);

    // Same seed, same claim.
    let again = run(&elev, 5);
    assert_eq!(again.accumulation, map.accumulation);
    assert_eq!(again.raster, map.raster);
}

#[test]
fn injected_source_makes_ties_follow_coordinates() {
    let elev = plateau_grid();
    let p = params(0).validate().unwrap();
    let (map, timings) = generate_with(&elev, &p, &mut NoPerturbation).unwrap();
    // All keys tie at 1.0: (1, 1) pops first but has no free neighbour,
    // then (1, 2) claims the centre.
    assert_eq!(map.accumulation.get(1, 2), 2);
    assert_eq!(map.accumulation.get(2, 2), 1);
    assert_eq!(timings.last().map(|t| t.name), Some("TOTAL"));
}

#[test]
fn conservation_and_monotonic_rendering() {
    let mut rng = Rng::new(2024);
    let (w, h) = (40, 30);
    let elev = Grid::from_vec(w, h, (0..w * h).map(|_| rng.range_f32(-5.0, 20.0)).collect()).unwrap();
    let p = Params {
        sea_level: 0.0,
        contrast: 3.0,
        river_width_factor: 1.5,
        bit_depth: 16,
        seed: Some(8),
    };
    let (map, _) = generate(&elev, &p).unwrap();

    assert_eq!(map.raster.bit_depth(), BitDepth::U16);
    assert_eq!(outlet_sum(&map), map.traversed);
    let land = elev.data.iter().filter(|&&e| e > 0.0).count();
    assert_eq!(map.traversed, land);
    let best = map.outlets.iter().map(|&(x, y)| map.accumulation.get(x, y)).max();
    assert_eq!(best, Some(map.max_accumulation));

    let mut cells: Vec<(u32, u64)> = (0..h)
        .flat_map(|y| (0..w).map(move |x| (x, y)))
        .map(|(x, y)| (map.accumulation.get(x, y), map.raster.get(x, y)))
        .collect();
    cells.sort();
    for pair in cells.windows(2) {
        assert!(pair[0].1 <= pair[1].1, "width drops from {:?} to {:?}", pair[0], pair[1]);
        assert!(pair[1].1 <= u16::MAX as u64);
    }
}

#[test]
fn bad_parameters_fail_before_shape() {
    let tiny = Grid::filled(2, 2, 1.0f32);
    let bad = Params {
        contrast: -1.0,
        ..params(0)
    };
    match generate(&tiny, &bad) {
        Err(Error::InvalidParameter { name, .. }) => assert_eq!(name, "contrast"),
        Err(e) => panic!("unexpected error {e}"),
        Ok(_) => panic!("expected failure"),
    }
    assert!(matches!(
        generate(&tiny, &params(0)),
        Err(Error::InvalidInputShape { width: 2, height: 2, .. })
    ));
    let p = Params {
        bit_depth: 0,
        ..params(0)
    };
    assert!(matches!(
        generate(&peak_grid(), &p),
        Err(Error::InvalidParameter { name: "bit_depth", .. })
    ));
}

#[test]
fn wide_depth_map_is_written_as_tiff() {
    let p = Params {
        bit_depth: 32,
        ..params(11)
    };
    let (map, _) = generate(&peak_grid(), &p).unwrap();
    assert_eq!(map.raster.bit_depth(), BitDepth::U32);
    assert_eq!(map.raster.get(2, 2), u32::MAX as u64 / 2);

    let dir = std::env::temp_dir().join(format!("rivermap-pipeline-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("width.tif");
    io::save_width_raster(&path, &map.raster).unwrap();

    let file = std::fs::File::open(&path).unwrap();
    let mut decoder = tiff::decoder::Decoder::new(std::io::BufReader::new(file)).unwrap();
    assert_eq!(decoder.dimensions().unwrap(), (5, 5));
    let samples = match decoder.read_image().unwrap() {
        tiff::decoder::DecodingResult::U32(v) => v,
        _ => panic!("expected 32-bit samples"),
    };
    assert_eq!(samples.iter().copied().max(), Some(u32::MAX));
    assert_eq!(samples[2 * 5 + 2] as u64, map.raster.get(2, 2));
    std::fs::remove_dir_all(&dir).unwrap();
}

/// Shared in-memory sink for captured log output.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn each_stage_logs_its_start() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        generate(&plateau_grid(), &params(3)).unwrap();
    });

    let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    let started: Vec<&str> = text.lines().filter(|l| l.contains("stage started")).collect();
    assert_eq!(started.len(), 4, "{text}");
    for (line, stage) in started.iter().zip(["outlets", "flow_tree", "accumulate", "render"]) {
        assert!(line.contains(&format!("name=\"{stage}\"")), "{line}");
    }
}
