/// Deterministic RNG based on splitmix64. Feeds the tie-break perturbation
/// of the priority flood.

#[inline]
pub fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Source of independent draws in `[0, 1)`, one per admitted cell.
pub trait Perturbation {
    fn next_unit(&mut self) -> f64;
}

/// Simple sequential RNG.
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Seed from OS entropy; runs are not reproducible.
    pub fn from_entropy() -> Self {
        Self::new(rand::random::<u64>())
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = splitmix64(self.state);
        self.state
    }

    /// 53 random mantissa bits, so the result is strictly below 1.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    pub fn range_f32(&mut self, lo: f32, hi: f32) -> f32 {
        lo + self.next_f64() as f32 * (hi - lo)
    }
}

impl Perturbation for Rng {
    #[inline]
    fn next_unit(&mut self) -> f64 {
        self.next_f64()
    }
}
