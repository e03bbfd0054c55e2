use serde::{Deserialize, Serialize};

/// How a generated fractal noise map is normalized.
///
/// `Local` remaps the observed value range of one call to [0, 1], which gives
/// maximum contrast for a single standalone map. `Global` divides by the
/// theoretical maximum amplitude sum so that maps generated at different
/// sample centers agree with each other, which is what chunked streaming
/// needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizeMode {
    Local,
    Global,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseParameters {
    pub seed: u32,
    pub scale: f32,
    pub octaves: u32,
    pub persistence: f32,
    pub lacunarity: f32,
    pub offset: (f32, f32),
    pub normalize_mode: NormalizeMode,
}

impl Default for NoiseParameters {
    fn default() -> Self {
        NoiseParameters {
            seed: 0,
            scale: 50.0,
            octaves: 6,
            persistence: 0.6,
            lacunarity: 2.0,
            offset: (0.0, 0.0),
            normalize_mode: NormalizeMode::Global,
        }
    }
}

impl NoiseParameters {
    /// Returns a copy with every field clamped into its usable range.
    /// Generators call this before sampling, so out-of-range values degrade
    /// to the nearest valid setting instead of producing NaNs or divisions
    /// by zero.
    pub fn validated(&self) -> Self {
        NoiseParameters {
            seed: self.seed,
            scale: self.scale.max(0.01),
            octaves: self.octaves.max(1),
            persistence: self.persistence.clamp(0.0, 1.0),
            lacunarity: self.lacunarity.max(1.0),
            offset: self.offset,
            normalize_mode: self.normalize_mode,
        }
    }
}
