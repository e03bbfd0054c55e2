use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::terrain::heightmap::HeightMapSettings;
use crate::terrain::mesh_settings::{
    MeshSettings, NUM_SUPPORTED_FLAT_SHADED_CHUNK_SIZES, NUM_SUPPORTED_LODS, SUPPORTED_CHUNK_SIZES,
};

/// Configuration rejected before any chunk work begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("detail level list is empty")]
    EmptyDetailLevels,
    #[error("detail level thresholds must be ascending (entry {index})")]
    UnorderedDetailLevels { index: usize },
    #[error("detail level {index} uses unsupported LOD {lod} (supported 0..{max})")]
    UnsupportedLod { index: usize, lod: usize, max: usize },
    #[error("chunk size index {index} out of range (supported 0..{max})")]
    ChunkSizeIndexOutOfRange { index: usize, max: usize },
    #[error("flat-shaded chunk size index {index} out of range (supported 0..{max})")]
    FlatShadedChunkSizeIndexOutOfRange { index: usize, max: usize },
    #[error("collider LOD index {index} out of range for {len} detail levels")]
    ColliderLodOutOfRange { index: usize, len: usize },
    #[error("{field} height curve must have at least one key, sorted by position")]
    MalformedHeightCurve { field: &'static str },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// One rung of the LOD ladder: chunks whose distance to the viewer is at
/// most `visible_distance_threshold` render at `lod` (unless an earlier
/// rung already matched). The last entry's threshold doubles as the
/// maximum view distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LodInfo {
    pub lod: usize,
    pub visible_distance_threshold: f32,
}

impl LodInfo {
    pub fn sqr_visible_distance_threshold(&self) -> f32 {
        self.visible_distance_threshold * self.visible_distance_threshold
    }
}

/// Complete configuration surface for a terrain streamer. Loaded once,
/// validated, and then treated as an immutable snapshot: workers only ever
/// see `Arc`ed copies, never a live mutable settings object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainSettings {
    #[serde(default)]
    pub mesh: MeshSettings,
    /// Primary fractal heightfield input.
    #[serde(default)]
    pub height_map: HeightMapSettings,
    /// Secondary simplex field blended into the height curve argument.
    #[serde(default)]
    pub simplex_height_map: HeightMapSettings,
    pub detail_levels: Vec<LodInfo>,
    #[serde(default)]
    pub collider_lod_index: usize,
    /// Worker threads for the streamer's queue; 0 picks a default from the
    /// CPU count.
    #[serde(default)]
    pub max_threads: usize,
    /// Distance the viewer must move before the chunk neighborhood is
    /// re-scanned.
    #[serde(default = "default_viewer_move_threshold")]
    pub viewer_move_threshold: f32,
}

fn default_viewer_move_threshold() -> f32 {
    25.0
}

impl Default for TerrainSettings {
    fn default() -> Self {
        TerrainSettings {
            mesh: MeshSettings::default(),
            height_map: HeightMapSettings::default(),
            simplex_height_map: HeightMapSettings::default(),
            detail_levels: vec![
                LodInfo { lod: 0, visible_distance_threshold: 200.0 },
                LodInfo { lod: 1, visible_distance_threshold: 400.0 },
                LodInfo { lod: 2, visible_distance_threshold: 600.0 },
            ],
            collider_lod_index: 0,
            max_threads: 0,
            viewer_move_threshold: default_viewer_move_threshold(),
        }
    }
}

impl TerrainSettings {
    /// Checks every configuration invariant. Called by the loaders and by
    /// `TerrainStreamer::new`, so invalid settings never reach the chunk
    /// pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mesh.chunk_size_index >= SUPPORTED_CHUNK_SIZES.len() {
            return Err(ConfigError::ChunkSizeIndexOutOfRange {
                index: self.mesh.chunk_size_index,
                max: SUPPORTED_CHUNK_SIZES.len(),
            });
        }
        if self.mesh.flat_shaded_chunk_size_index >= NUM_SUPPORTED_FLAT_SHADED_CHUNK_SIZES {
            return Err(ConfigError::FlatShadedChunkSizeIndexOutOfRange {
                index: self.mesh.flat_shaded_chunk_size_index,
                max: NUM_SUPPORTED_FLAT_SHADED_CHUNK_SIZES,
            });
        }

        if self.detail_levels.is_empty() {
            return Err(ConfigError::EmptyDetailLevels);
        }
        for (index, level) in self.detail_levels.iter().enumerate() {
            if level.lod >= NUM_SUPPORTED_LODS {
                return Err(ConfigError::UnsupportedLod {
                    index,
                    lod: level.lod,
                    max: NUM_SUPPORTED_LODS,
                });
            }
            if index > 0
                && level.visible_distance_threshold
                    <= self.detail_levels[index - 1].visible_distance_threshold
            {
                return Err(ConfigError::UnorderedDetailLevels { index });
            }
        }
        if self.collider_lod_index >= self.detail_levels.len() {
            return Err(ConfigError::ColliderLodOutOfRange {
                index: self.collider_lod_index,
                len: self.detail_levels.len(),
            });
        }

        if !self.height_map.height_curve.is_well_formed() {
            return Err(ConfigError::MalformedHeightCurve { field: "height_map" });
        }
        if !self.simplex_height_map.height_curve.is_well_formed() {
            return Err(ConfigError::MalformedHeightCurve {
                field: "simplex_height_map",
            });
        }

        Ok(())
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let settings: TerrainSettings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("TerrainSettings: loading config from {path:?}");
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
