use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// All tunable parameters. Exposed as CLI flags, JSON config keys and
/// request fields on the server.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Cells at or below this elevation are barriers (sea).
    pub sea_level: f32,
    /// Inverse exponent of the width curve. Larger = flatter.
    pub contrast: f64,
    /// Output scale multiplier.
    pub river_width_factor: f64,
    /// Requested output depth, snapped up to 8/16/32/64.
    pub bit_depth: u32,
    /// Fixes the tie-break perturbation. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            sea_level: -9.0,
            contrast: 500.0,
            river_width_factor: 0.2,
            bit_depth: 16,
            seed: None,
        }
    }
}

/// Supported output sample widths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitDepth {
    U8,
    U16,
    U32,
    U64,
}

impl BitDepth {
    /// Snap a requested depth up to the nearest supported one.
    pub fn snap(bits: u32) -> Option<Self> {
        match bits {
            1..=8 => Some(Self::U8),
            9..=16 => Some(Self::U16),
            17..=32 => Some(Self::U32),
            33..=64 => Some(Self::U64),
            _ => None,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Self::U8 => 8,
            Self::U16 => 16,
            Self::U32 => 32,
            Self::U64 => 64,
        }
    }

    /// `2^bits - 1` as a float. For 64 bits this rounds up to 2^64, which is
    /// harmless since float-to-int casts saturate.
    pub fn max_value(self) -> f64 {
        match self {
            Self::U8 => u8::MAX as f64,
            Self::U16 => u16::MAX as f64,
            Self::U32 => u32::MAX as f64,
            Self::U64 => u64::MAX as f64,
        }
    }
}

/// Parameters that passed validation. Only this type reaches the pipeline.
#[derive(Clone, Copy, Debug)]
pub struct Validated {
    pub sea_level: f32,
    pub contrast: f64,
    pub river_width_factor: f64,
    pub bit_depth: BitDepth,
    pub seed: Option<u64>,
}

fn invalid(name: &'static str, value: impl ToString, reason: &str) -> Error {
    Error::InvalidParameter {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl Params {
    pub fn validate(&self) -> Result<Validated> {
        if !self.sea_level.is_finite() {
            return Err(invalid("sea_level", self.sea_level, "must be finite"));
        }
        if !(self.contrast.is_finite() && self.contrast > 0.0) {
            return Err(invalid("contrast", self.contrast, "must be a finite value > 0"));
        }
        if !(self.river_width_factor.is_finite() && self.river_width_factor > 0.0) {
            return Err(invalid(
                "river_width_factor",
                self.river_width_factor,
                "must be a finite value > 0",
            ));
        }
        let bit_depth = BitDepth::snap(self.bit_depth)
            .ok_or_else(|| invalid("bit_depth", self.bit_depth, "must be in 1..=64"))?;

        Ok(Validated {
            sea_level: self.sea_level,
            contrast: self.contrast,
            river_width_factor: self.river_width_factor,
            bit_depth,
            seed: self.seed,
        })
    }
}
