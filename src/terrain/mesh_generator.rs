use super::heightmap::HeightMap;
use super::mesh_settings::MeshSettings;

/// Triangle mesh ready for submission to a scene host: flat vertex,
/// normal, UV, and index buffers.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Builds the triangle mesh for one chunk at a detail level.
///
/// LOD 0 keeps every heightfield vertex; higher levels subsample the
/// interior with a skip increment of `lod * 2`. The two outermost vertex
/// lines on each side of the heightfield are border geometry: they take
/// part in normal accumulation so edge normals match the neighboring
/// chunk, then get stripped from the emitted buffers. The first and last
/// interior lines land on the skip lattice at every supported chunk size,
/// so meshes of different detail levels share their outer-ring vertex
/// positions and stitch without cracks.
///
/// Pure function over its inputs; safe to run on a worker thread.
pub fn generate_terrain_mesh(
    height_map: &HeightMap,
    settings: &MeshSettings,
    lod: usize,
) -> MeshData {
    let n = settings.num_verts_per_line();
    debug_assert_eq!(height_map.width(), n);
    debug_assert_eq!(height_map.height(), n);

    let skip_increment = if lod == 0 { 1 } else { lod * 2 };
    let world_size = settings.mesh_world_size();
    let interior_span = (n - 5) as f32;

    // Per-axis sample lattice: full-resolution border lines, then the
    // interior every `skip_increment` vertices from 2 through n - 3.
    let mut lattice: Vec<usize> = vec![0, 1];
    let mut i = 2;
    while i <= n - 3 {
        lattice.push(i);
        i += skip_increment;
    }
    if lattice.last() != Some(&(n - 3)) {
        lattice.push(n - 3);
    }
    lattice.push(n - 2);
    lattice.push(n - 1);

    let m = lattice.len();
    let mut positions = Vec::with_capacity(m * m);
    let mut uvs = Vec::with_capacity(m * m);
    let mut is_border = Vec::with_capacity(m * m);

    for &gy in &lattice {
        for &gx in &lattice {
            let percent_x = (gx as f32 - 2.0) / interior_span;
            let percent_y = (gy as f32 - 2.0) / interior_span;
            positions.push([
                (percent_x - 0.5) * world_size,
                height_map.get(gx, gy),
                (percent_y - 0.5) * world_size,
            ]);
            uvs.push([percent_x, percent_y]);
            is_border.push(gx < 2 || gy < 2 || gx > n - 3 || gy > n - 3);
        }
    }

    // Two up-facing triangles per lattice cell.
    let mut triangles = Vec::with_capacity((m - 1) * (m - 1) * 2);
    for row in 0..m - 1 {
        for col in 0..m - 1 {
            let a = row * m + col;
            let b = a + 1;
            let c = a + m;
            let d = c + 1;
            triangles.push([a, c, d]);
            triangles.push([a, d, b]);
        }
    }

    // Area-weighted normal accumulation; border triangles contribute so the
    // normals along the final mesh edge match the neighboring chunk.
    let mut accumulated = vec![[0.0f32; 3]; m * m];
    for tri in &triangles {
        let face = face_normal(positions[tri[0]], positions[tri[1]], positions[tri[2]]);
        for &vertex in tri {
            accumulated[vertex][0] += face[0];
            accumulated[vertex][1] += face[1];
            accumulated[vertex][2] += face[2];
        }
    }

    // Strip border vertices and any triangle touching one.
    let mut remap = vec![u32::MAX; m * m];
    let mut mesh = MeshData::default();
    for index in 0..m * m {
        if !is_border[index] {
            remap[index] = mesh.vertices.len() as u32;
            mesh.vertices.push(positions[index]);
            mesh.normals.push(normalized(accumulated[index]));
            mesh.uvs.push(uvs[index]);
        }
    }
    for tri in &triangles {
        if tri.iter().all(|&vertex| !is_border[vertex]) {
            mesh.indices.extend(tri.iter().map(|&vertex| remap[vertex]));
        }
    }

    if settings.use_flat_shading {
        flat_shaded(&mesh)
    } else {
        mesh
    }
}

/// Re-expands a shared-vertex mesh so every triangle owns three unique
/// vertices carrying the face normal.
fn flat_shaded(mesh: &MeshData) -> MeshData {
    let mut flat = MeshData::default();
    for tri in mesh.indices.chunks_exact(3) {
        let points = [
            mesh.vertices[tri[0] as usize],
            mesh.vertices[tri[1] as usize],
            mesh.vertices[tri[2] as usize],
        ];
        let normal = normalized(face_normal(points[0], points[1], points[2]));
        let base = flat.vertices.len() as u32;
        for (offset, &index) in tri.iter().enumerate() {
            flat.vertices.push(points[offset]);
            flat.normals.push(normal);
            flat.uvs.push(mesh.uvs[index as usize]);
            flat.indices.push(base + offset as u32);
        }
    }
    flat
}

/// Unnormalized face normal; its length is twice the triangle area.
fn face_normal(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [f32; 3] {
    let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ]
}

fn normalized(v: [f32; 3]) -> [f32; 3] {
    let length = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if length <= f32::EPSILON {
        [0.0, 1.0, 0.0]
    } else {
        [v[0] / length, v[1] / length, v[2] / length]
    }
}
