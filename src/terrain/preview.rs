use crate::config::{ConfigError, TerrainSettings};

use super::heightmap::{generate_height_map, HeightMap};
use super::mesh_generator::{generate_terrain_mesh, MeshData};

/// Builds one chunk's heightfield and mesh synchronously at sample center
/// (0, 0), for inspecting a configuration without spinning up a streamer.
/// `lod` indexes the supported detail tiers directly (0 = full detail).
pub fn generate_preview(
    settings: &TerrainSettings,
    lod: usize,
) -> Result<(HeightMap, MeshData), ConfigError> {
    settings.validate()?;

    let num_verts = settings.mesh.num_verts_per_line();
    let height_map = generate_height_map(
        num_verts,
        num_verts,
        &settings.height_map,
        &settings.simplex_height_map,
        (0.0, 0.0),
    );
    let mesh = generate_terrain_mesh(&height_map, &settings.mesh, lod);
    Ok((height_map, mesh))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_builds_a_mesh_for_valid_settings() {
        let settings = TerrainSettings::default();
        let (height_map, mesh) = generate_preview(&settings, 0).expect("defaults are valid");
        assert_eq!(height_map.width(), settings.mesh.num_verts_per_line());
        assert!(!mesh.vertices.is_empty());
        assert!(!mesh.indices.is_empty());
    }

    #[test]
    fn preview_rejects_invalid_settings() {
        let settings = TerrainSettings {
            detail_levels: Vec::new(),
            ..TerrainSettings::default()
        };
        assert!(generate_preview(&settings, 0).is_err());
    }
}
