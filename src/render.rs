use rayon::prelude::*;

use crate::config::{BitDepth, Validated};
use crate::grid::Grid;

/// Quantized river width, stored at the requested depth.
#[derive(Clone, Debug, PartialEq)]
pub enum WidthRaster {
    U8(Grid<u8>),
    U16(Grid<u16>),
    U32(Grid<u32>),
    U64(Grid<u64>),
}

impl WidthRaster {
    pub fn bit_depth(&self) -> BitDepth {
        match self {
            Self::U8(_) => BitDepth::U8,
            Self::U16(_) => BitDepth::U16,
            Self::U32(_) => BitDepth::U32,
            Self::U64(_) => BitDepth::U64,
        }
    }

    pub fn w(&self) -> usize {
        match self {
            Self::U8(g) => g.w,
            Self::U16(g) => g.w,
            Self::U32(g) => g.w,
            Self::U64(g) => g.w,
        }
    }

    pub fn h(&self) -> usize {
        match self {
            Self::U8(g) => g.h,
            Self::U16(g) => g.h,
            Self::U32(g) => g.h,
            Self::U64(g) => g.h,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u64 {
        match self {
            Self::U8(g) => g.get(x, y) as u64,
            Self::U16(g) => g.get(x, y) as u64,
            Self::U32(g) => g.get(x, y) as u64,
            Self::U64(g) => g.get(x, y),
        }
    }

    /// Value as a fraction of the depth's full range.
    #[inline]
    pub fn fraction(&self, x: usize, y: usize) -> f64 {
        self.get(x, y) as f64 / self.bit_depth().max_value()
    }
}

/// Power-law mapping from drainage count to width.
///
/// `width(n) = floor(n^(1/contrast) * coeff * factor)` with
/// `coeff = max_value / max_accumulation^(1/contrast)`, clamped to the depth.
#[derive(Clone, Copy, Debug)]
pub struct WidthCurve {
    power: f64,
    scale: f64,
    max_value: f64,
}

impl WidthCurve {
    pub fn new(max_accumulation: u32, contrast: f64, factor: f64, depth: BitDepth) -> Self {
        let power = 1.0 / contrast;
        let max_value = depth.max_value();
        let scale = if max_accumulation == 0 {
            0.0
        } else {
            max_value / (max_accumulation as f64).powf(power) * factor
        };
        Self {
            power,
            scale,
            max_value,
        }
    }

    #[inline]
    pub fn width(&self, count: u32) -> f64 {
        if count == 0 {
            return 0.0;
        }
        ((count as f64).powf(self.power) * self.scale)
            .floor()
            .clamp(0.0, self.max_value)
    }
}

fn quantize<T, F>(counts: &Grid<u32>, curve: WidthCurve, cast: F) -> Grid<T>
where
    T: Copy + Default + Send,
    F: Fn(f64) -> T + Sync,
{
    let w = counts.w;
    let mut out = Grid::<T>::new(w, counts.h);
    out.data.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            row[x] = cast(curve.width(counts.get(x, y)));
        }
    });
    out
}

/// Compress accumulated counts into a fixed-depth width raster.
/// A zero `max_accumulation` yields an all-zero raster.
pub fn render_width(counts: &Grid<u32>, max_accumulation: u32, params: &Validated) -> WidthRaster {
    let curve = WidthCurve::new(
        max_accumulation,
        params.contrast,
        params.river_width_factor,
        params.bit_depth,
    );
    // Values are already floored and clamped, so the casts are exact
    // (u64 saturates at the top of the range).
    match params.bit_depth {
        BitDepth::U8 => WidthRaster::U8(quantize(counts, curve, |v| v as u8)),
        BitDepth::U16 => WidthRaster::U16(quantize(counts, curve, |v| v as u16)),
        BitDepth::U32 => WidthRaster::U32(quantize(counts, curve, |v| v as u32)),
        BitDepth::U64 => WidthRaster::U64(quantize(counts, curve, |v| v as u64)),
    }
}

#[inline]
fn lerp_color(a: [u8; 4], b: [u8; 4], t: f32) -> [u8; 4] {
    let t = t.clamp(0.0, 1.0);
    [
        (a[0] as f32 + (b[0] as f32 - a[0] as f32) * t).round() as u8,
        (a[1] as f32 + (b[1] as f32 - a[1] as f32) * t).round() as u8,
        (a[2] as f32 + (b[2] as f32 - a[2] as f32) * t).round() as u8,
        255,
    ]
}

/// Diagnostic: grayscale heightmap. Non-finite samples render black.
pub fn render_heightmap(height: &Grid<f32>) -> Vec<u8> {
    let finite = || height.data.iter().copied().filter(|v| v.is_finite());
    let min_h = finite().fold(f32::INFINITY, f32::min);
    let max_h = finite().fold(f32::NEG_INFINITY, f32::max);
    let range = (max_h - min_h).max(1.0);
    let w = height.w;
    let h = height.h;
    let mut rgba = vec![0u8; w * h * 4];
    for i in 0..w * h {
        let t = (height.data[i] - min_h) / range;
        let v = if t.is_finite() { (t * 255.0).clamp(0.0, 255.0) as u8 } else { 0 };
        rgba[i * 4..i * 4 + 4].copy_from_slice(&[v, v, v, 255]);
    }
    rgba
}

// Muted terrain colors for river base map
const RIVER_WATER: [u8; 4] = [30, 45, 65, 255];
const RIVER_LAND_LOW: [u8; 4] = [160, 170, 140, 255];
const RIVER_LAND_HIGH: [u8; 4] = [190, 180, 155, 255];
const RIVER_BLUE: [u8; 4] = [15, 40, 140, 255];

/// Diagnostic: width raster overlaid on muted terrain.
pub fn render_rivers(height: &Grid<f32>, sea_level: f32, width: &WidthRaster) -> Vec<u8> {
    let w = height.w;
    let h = height.h;
    let max_h = height
        .data
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(sea_level, f32::max);
    let relief = (max_h - sea_level).max(f32::EPSILON);
    let mut rgba = vec![0u8; w * h * 4];

    rgba.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let elev = height.get(x, y);
            let base = if elev > sea_level {
                lerp_color(RIVER_LAND_LOW, RIVER_LAND_HIGH, (elev - sea_level) / relief)
            } else {
                RIVER_WATER
            };

            let t = width.fraction(x, y) as f32;
            let color = if t > 0.0 { lerp_color(base, RIVER_BLUE, t) } else { base };

            row[x * 4..x * 4 + 4].copy_from_slice(&color);
        }
    });

    rgba
}
