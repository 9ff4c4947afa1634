use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rivermap::config::Params;
use rivermap::{io, render};

/// Derive a drainage network from a heightmap and write it as a width raster.
#[derive(Parser)]
#[command(name = "rivermap", version, about, long_about = None)]
struct Cli {
    /// Input heightmap (any format the image crate reads)
    input: PathBuf,
    /// Output width raster (format from extension; 32/64-bit need .tif)
    output: PathBuf,
    /// JSON file with any subset of the parameters below
    #[arg(long)]
    config: Option<PathBuf>,
    /// Cells at or below this elevation are sea
    #[arg(long, allow_hyphen_values = true)]
    sea_level: Option<f32>,
    /// Inverse exponent of the width curve
    #[arg(long)]
    contrast: Option<f64>,
    /// Output scale multiplier
    #[arg(long)]
    river_width_factor: Option<f64>,
    /// Output bit depth, snapped up to 8/16/32/64
    #[arg(long)]
    bit_depth: Option<u32>,
    /// Fix the tie-break randomness
    #[arg(long)]
    seed: Option<u64>,
    /// Also write heightmap.png and rivers.png previews here
    #[arg(long)]
    preview: Option<PathBuf>,
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn params(&self) -> Result<Params> {
        let mut params = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Params::default(),
        };
        if let Some(v) = self.sea_level {
            params.sea_level = v;
        }
        if let Some(v) = self.contrast {
            params.contrast = v;
        }
        if let Some(v) = self.river_width_factor {
            params.river_width_factor = v;
        }
        if let Some(v) = self.bit_depth {
            params.bit_depth = v;
        }
        if self.seed.is_some() {
            params.seed = self.seed;
        }
        Ok(params)
    }
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let params = cli.params()?;
    // Fail on bad parameters or an unwritable depth before touching the input.
    let validated = params.validate()?;
    io::check_output(&cli.output, validated.bit_depth)
        .with_context(|| format!("cannot write {}", cli.output.display()))?;

    let elevation = io::load_elevation(&cli.input)
        .with_context(|| format!("loading {}", cli.input.display()))?;

    eprintln!(
        "Mapping rivers on {}x{} heightmap, sea_level={}, contrast={}, width_factor={}, bit_depth={}",
        elevation.w, elevation.h, params.sea_level, params.contrast, params.river_width_factor, params.bit_depth
    );

    let (map, timings) = rivermap::generate(&elevation, &params)?;

    eprintln!("\nTimings:");
    for t in &timings {
        eprintln!("  {:20} {:8.1} ms", t.name, t.ms);
    }
    eprintln!(
        "\n{} outlets, {} cells drained, maximal water quantity {}",
        map.outlets.len(),
        map.traversed,
        map.max_accumulation
    );

    io::save_width_raster(&cli.output, &map.raster)
        .with_context(|| format!("writing {}", cli.output.display()))?;
    eprintln!("Saved {}", cli.output.display());

    if let Some(dir) = &cli.preview {
        std::fs::create_dir_all(dir).context("failed to create preview directory")?;
        let save = |name: &str, rgba: &[u8]| -> Result<()> {
            let path = dir.join(name);
            image::save_buffer(&path, rgba, map.w as u32, map.h as u32, image::ColorType::Rgba8)
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Saved {}", path.display());
            Ok(())
        };
        save("heightmap.png", &render::render_heightmap(&elevation))?;
        save("rivers.png", &render::render_rivers(&elevation, params.sea_level, &map.raster))?;
    }

    eprintln!("\nDone.");
    Ok(())
}
