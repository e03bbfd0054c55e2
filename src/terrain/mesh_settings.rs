use serde::{Deserialize, Serialize};

/// Chunk sizes (quads per side of the streamed footprint) the mesh pipeline
/// supports. All are multiples of 24 so every LOD skip increment divides
/// them evenly.
pub const SUPPORTED_CHUNK_SIZES: [u32; 9] = [48, 72, 96, 120, 144, 168, 192, 216, 240];

/// Number of supported detail tiers; LOD indices run 0..NUM_SUPPORTED_LODS.
pub const NUM_SUPPORTED_LODS: usize = 5;

/// Flat shading duplicates vertices per triangle, so only the smallest chunk
/// sizes stay within reasonable vertex counts.
pub const NUM_SUPPORTED_FLAT_SHADED_CHUNK_SIZES: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshSettings {
    #[serde(default = "default_mesh_scale")]
    pub mesh_scale: f32,
    #[serde(default)]
    pub use_flat_shading: bool,
    #[serde(default)]
    pub chunk_size_index: usize,
    #[serde(default)]
    pub flat_shaded_chunk_size_index: usize,
}

fn default_mesh_scale() -> f32 {
    2.5
}

impl Default for MeshSettings {
    fn default() -> Self {
        MeshSettings {
            mesh_scale: default_mesh_scale(),
            use_flat_shading: false,
            chunk_size_index: 0,
            flat_shaded_chunk_size_index: 0,
        }
    }
}

impl MeshSettings {
    /// Vertices per heightfield line at LOD 0. Includes the two extra
    /// vertices on each side which are excluded from the final mesh but used
    /// for normal calculation.
    ///
    /// Pure derivation from the settings; callers must not cache it
    /// separately from `mesh_world_size`.
    pub fn num_verts_per_line(&self) -> usize {
        let index = if self.use_flat_shading {
            self.flat_shaded_chunk_size_index
        } else {
            self.chunk_size_index
        };
        SUPPORTED_CHUNK_SIZES[index] as usize + 5
    }

    /// World-space edge length of one chunk.
    pub fn mesh_world_size(&self) -> f32 {
        (self.num_verts_per_line() as f32 - 3.0) * self.mesh_scale
    }
}
