//! Raster decode/encode at the edges of the pipeline.
//!
//! Image x runs along the width, y down the rows, matching `Grid`.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Pixel};
use tiff::encoder::{TiffEncoder, colortype};
use tracing::info;

use crate::config::BitDepth;
use crate::error::{Error, Result};
use crate::grid::{ElevationGrid, Grid};
use crate::render::WidthRaster;

/// Luminance weights for colour sources.
const LUMA: [f32; 3] = [0.2989, 0.5870, 0.1140];

fn samples<P>(buf: &ImageBuffer<P, Vec<P::Subpixel>>) -> Vec<f32>
where
    P: Pixel,
    P::Subpixel: Into<f32>,
{
    buf.pixels()
        .map(|p| {
            let c = p.channels();
            let ch = |i: usize| -> f32 { c[i].into() };
            if c.len() >= 3 {
                LUMA[0] * ch(0) + LUMA[1] * ch(1) + LUMA[2] * ch(2)
            } else {
                ch(0)
            }
        })
        .collect()
}

/// Single channel as-is; colour reduced by luminance on raw channel values.
pub fn elevation_from_image(img: DynamicImage) -> Result<ElevationGrid> {
    let w = img.width() as usize;
    let h = img.height() as usize;
    let data = match &img {
        DynamicImage::ImageLuma8(b) => samples(b),
        DynamicImage::ImageLumaA8(b) => samples(b),
        DynamicImage::ImageLuma16(b) => samples(b),
        DynamicImage::ImageLumaA16(b) => samples(b),
        DynamicImage::ImageRgb8(b) => samples(b),
        DynamicImage::ImageRgba8(b) => samples(b),
        DynamicImage::ImageRgb16(b) => samples(b),
        DynamicImage::ImageRgba16(b) => samples(b),
        DynamicImage::ImageRgb32F(b) => samples(b),
        DynamicImage::ImageRgba32F(b) => samples(b),
        _ => samples(&img.to_rgb32f()),
    };
    Grid::from_vec(w, h, data)
}

pub fn load_elevation(path: &Path) -> Result<ElevationGrid> {
    let img = image::open(path)?;
    info!(path = %path.display(), width = img.width(), height = img.height(), color = ?img.color(), "input image loaded");
    elevation_from_image(img)
}

fn to_image(raster: &WidthRaster) -> Result<DynamicImage> {
    let (w, h) = (raster.w() as u32, raster.h() as u32);
    let mismatch = || Error::InvalidInputShape {
        width: raster.w(),
        height: raster.h(),
        reason: "raster buffer does not match its dimensions".into(),
    };
    match raster {
        WidthRaster::U8(g) => ImageBuffer::<Luma<u8>, _>::from_raw(w, h, g.data.clone())
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(mismatch),
        WidthRaster::U16(g) => ImageBuffer::<Luma<u16>, _>::from_raw(w, h, g.data.clone())
            .map(DynamicImage::ImageLuma16)
            .ok_or_else(mismatch),
        other => Err(Error::UnsupportedOutputDepth(other.bit_depth().bits())),
    }
}

fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
}

/// Fail early if a raster of `depth` cannot be written to `path`:
/// 32- and 64-bit greyscale only fits in TIFF.
pub fn check_output(path: &Path, depth: BitDepth) -> Result<()> {
    match depth {
        BitDepth::U8 | BitDepth::U16 => Ok(()),
        _ if is_tiff(path) => Ok(()),
        _ => Err(Error::UnsupportedOutputDepth(depth.bits())),
    }
}

fn encode_wide_tiff(raster: &WidthRaster) -> Result<Vec<u8>> {
    let (w, h) = (raster.w() as u32, raster.h() as u32);
    let mut buf = Cursor::new(Vec::new());
    let mut tiff = TiffEncoder::new(&mut buf)?;
    match raster {
        WidthRaster::U32(g) => tiff.write_image::<colortype::Gray32>(w, h, &g.data)?,
        WidthRaster::U64(g) => tiff.write_image::<colortype::Gray64>(w, h, &g.data)?,
        other => return Err(Error::UnsupportedOutputDepth(other.bit_depth().bits())),
    }
    drop(tiff);
    Ok(buf.into_inner())
}

/// Write the width raster; the format follows the file extension.
/// 8/16-bit go through `image`, 32/64-bit need a `.tif` path.
pub fn save_width_raster(path: &Path, raster: &WidthRaster) -> Result<()> {
    check_output(path, raster.bit_depth())?;
    match raster {
        WidthRaster::U8(_) | WidthRaster::U16(_) => to_image(raster)?.save(path)?,
        _ => std::fs::write(path, encode_wide_tiff(raster)?)?,
    }
    info!(path = %path.display(), bits = raster.bit_depth().bits(), "output image saved");
    Ok(())
}

/// In-memory PNG of the width raster.
pub fn encode_png(raster: &WidthRaster) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    to_image(raster)?.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}
