use serde::{Deserialize, Serialize};

use super::noise::{generate_fractal, generate_simplex, NoiseParameters};

/// One key of a [`HeightCurve`]: the curve passes through `(position, value)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    pub position: f32,
    pub value: f32,
}

/// Piecewise-linear remapping curve applied to blended noise before the
/// height multiplier.
///
/// Plain value semantics: cloning it is a complete snapshot, so worker
/// threads can evaluate a copy while the consumer thread keeps the
/// authoritative configuration. Evaluation clamps outside the key range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightCurve {
    keys: Vec<CurveKey>,
}

impl HeightCurve {
    pub fn new(mut keys: Vec<CurveKey>) -> Self {
        keys.sort_by(|a, b| a.position.total_cmp(&b.position));
        HeightCurve { keys }
    }

    /// Identity ramp from (0, 0) to (1, 1).
    pub fn linear() -> Self {
        HeightCurve {
            keys: vec![
                CurveKey { position: 0.0, value: 0.0 },
                CurveKey { position: 1.0, value: 1.0 },
            ],
        }
    }

    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    /// True when the keys are non-empty and sorted by position. Curves built
    /// through [`HeightCurve::new`] always are; deserialized ones are checked
    /// at configuration load.
    pub fn is_well_formed(&self) -> bool {
        !self.keys.is_empty() && self.keys.windows(2).all(|w| w[0].position <= w[1].position)
    }

    pub fn evaluate(&self, t: f32) -> f32 {
        let Some(first) = self.keys.first() else {
            return 0.0;
        };
        let Some(last) = self.keys.last() else {
            return 0.0;
        };
        if t <= first.position {
            return first.value;
        }
        if t >= last.position {
            return last.value;
        }

        for pair in self.keys.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.position {
                let span = b.position - a.position;
                if span <= f32::EPSILON {
                    return b.value;
                }
                let fraction = (t - a.position) / span;
                return a.value + (b.value - a.value) * fraction;
            }
        }
        last.value
    }
}

impl Default for HeightCurve {
    fn default() -> Self {
        HeightCurve::linear()
    }
}

/// Settings for one heightfield input: noise parameters, the remapping
/// curve, and the world-space height multiplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightMapSettings {
    #[serde(default)]
    pub noise: NoiseParameters,
    #[serde(default = "default_height_multiplier")]
    pub height_multiplier: f32,
    #[serde(default)]
    pub height_curve: HeightCurve,
}

fn default_height_multiplier() -> f32 {
    1.0
}

impl Default for HeightMapSettings {
    fn default() -> Self {
        HeightMapSettings {
            noise: NoiseParameters::default(),
            height_multiplier: default_height_multiplier(),
            height_curve: HeightCurve::default(),
        }
    }
}

impl HeightMapSettings {
    /// Lowest height this settings object can produce; used downstream for
    /// material mapping.
    pub fn min_height(&self) -> f32 {
        self.height_multiplier * self.height_curve.evaluate(0.0)
    }

    /// Highest height this settings object can produce.
    pub fn max_height(&self) -> f32 {
        self.height_multiplier * self.height_curve.evaluate(1.0)
    }
}

/// A generated heightfield: a row-major grid of elevations plus the value
/// range observed while building it. Immutable after construction.
#[derive(Debug, Clone)]
pub struct HeightMap {
    values: Vec<f32>,
    width: usize,
    height: usize,
    pub min_value: f32,
    pub max_value: f32,
}

impl HeightMap {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[y * self.width + x]
    }
}

/// Builds the heightfield for one chunk. This is the expensive per-chunk
/// geometry input and is safe to run on a worker thread: it reads only the
/// settings snapshots passed in.
///
/// Per cell: `fractal * curve(fractal - 0.5 * simplex) * height_multiplier`.
pub fn generate_height_map(
    width: usize,
    height: usize,
    settings: &HeightMapSettings,
    simplex_settings: &HeightMapSettings,
    sample_center: (f32, f32),
) -> HeightMap {
    let mut values = generate_fractal(width, height, &settings.noise, sample_center);
    let simplex = generate_simplex(width, height, &simplex_settings.noise, sample_center);

    let mut min_value = f32::MAX;
    let mut max_value = f32::MIN;

    for (value, blend) in values.iter_mut().zip(&simplex) {
        *value *= settings.height_curve.evaluate(*value - 0.5 * blend) * settings.height_multiplier;
        min_value = min_value.min(*value);
        max_value = max_value.max(*value);
    }

    HeightMap {
        values,
        width,
        height,
        min_value,
        max_value,
    }
}
