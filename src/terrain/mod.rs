pub mod chunk;
pub mod heightmap;
pub mod mesh_generator;
pub mod mesh_settings;
pub mod noise;
pub mod preview;
pub mod streamer;

pub use chunk::{ChunkCoord, TerrainChunk};
pub use heightmap::{generate_height_map, CurveKey, HeightCurve, HeightMap, HeightMapSettings};
pub use mesh_generator::{generate_terrain_mesh, MeshData};
pub use mesh_settings::MeshSettings;
pub use streamer::{StreamerStats, TerrainStreamer};
