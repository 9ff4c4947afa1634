use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::{Json, Router, routing::post};
use base64::Engine;
use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rivermap::config::Params;
use rivermap::{io, render};

#[derive(Deserialize)]
struct GenerateRequest {
    /// Base64-encoded heightmap image
    heightmap: String,
    sea_level: Option<f32>,
    contrast: Option<f64>,
    river_width_factor: Option<f64>,
    bit_depth: Option<u32>,
    seed: Option<u64>,
}

#[derive(Serialize)]
struct GenerateResponse {
    layers: Vec<Layer>,
    timings: Vec<TimingEntry>,
    width: usize,
    height: usize,
    max_accumulation: u32,
}

#[derive(Serialize)]
struct Layer {
    name: String,
    data_url: String,
}

#[derive(Serialize)]
struct TimingEntry {
    name: String,
    ms: f64,
}

type ApiError = (StatusCode, String);

fn bad_request(e: impl std::fmt::Display) -> ApiError {
    (StatusCode::BAD_REQUEST, e.to_string())
}

fn data_url(png: &[u8]) -> String {
    let b64 = base64::engine::general_purpose::STANDARD.encode(png);
    format!("data:image/png;base64,{}", b64)
}

fn encode_rgba_png(rgba: &[u8], w: usize, h: usize) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(rgba, w as u32, h as u32, image::ExtendedColorType::Rgba8)?;
    Ok(buf)
}

fn run(req: GenerateRequest) -> Result<GenerateResponse, ApiError> {
    let defaults = Params::default();
    let params = Params {
        sea_level: req.sea_level.unwrap_or(defaults.sea_level),
        contrast: req.contrast.unwrap_or(defaults.contrast),
        river_width_factor: req.river_width_factor.unwrap_or(defaults.river_width_factor),
        bit_depth: req.bit_depth.unwrap_or(defaults.bit_depth),
        seed: req.seed,
    };
    params.validate().map_err(bad_request)?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(req.heightmap.as_bytes())
        .map_err(bad_request)?;
    let img = image::load_from_memory(&bytes).map_err(bad_request)?;
    let elevation = io::elevation_from_image(img).map_err(bad_request)?;

    let (map, timings) = rivermap::generate(&elevation, &params).map_err(bad_request)?;
    let (width, height) = (map.w, map.h);

    let internal = |e: image::ImageError| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    let mut layers = vec![
        Layer {
            name: "heightmap".into(),
            data_url: data_url(&encode_rgba_png(&render::render_heightmap(&elevation), width, height).map_err(internal)?),
        },
        Layer {
            name: "rivers".into(),
            data_url: data_url(
                &encode_rgba_png(
                    &render::render_rivers(&elevation, params.sea_level, &map.raster),
                    width,
                    height,
                )
                .map_err(internal)?,
            ),
        },
    ];
    // 32/64-bit rasters have no greyscale PNG form; the preview still shows them.
    match io::encode_png(&map.raster) {
        Ok(png) => layers.push(Layer {
            name: "width".into(),
            data_url: data_url(&png),
        }),
        Err(e) => warn!(error = %e, "width layer skipped"),
    }

    let timing_entries = timings
        .iter()
        .map(|t| TimingEntry {
            name: t.name.to_string(),
            ms: t.ms,
        })
        .collect();

    Ok(GenerateResponse {
        layers,
        timings: timing_entries,
        width,
        height,
        max_accumulation: map.max_accumulation,
    })
}

async fn generate_handler(Json(req): Json<GenerateRequest>) -> Result<Json<GenerateResponse>, ApiError> {
    let response = tokio::task::spawn_blocking(move || run(req))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))??;
    Ok(Json(response))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let frontend = ServeDir::new("frontend");

    let app = Router::new()
        .route("/api/generate", post(generate_handler))
        .fallback_service(frontend);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!("rivermap server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
