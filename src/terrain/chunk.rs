use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

use log::debug;

use crate::config::LodInfo;
use crate::host::{ObjectHandle, SceneHost};
use crate::terrain::heightmap::{generate_height_map, HeightMap, HeightMapSettings};
use crate::terrain::mesh_generator::{generate_terrain_mesh, MeshData};
use crate::terrain::mesh_settings::MeshSettings;
use crate::threading::AsyncWorkQueue;

/// Chunks closer than this to the viewer get their collision mesh attached.
const COLLIDER_GENERATION_DISTANCE_THRESHOLD: f32 = 5.0;

/// Integer grid index of a chunk on the XZ plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

/// Axis-aligned square footprint of a chunk in world space.
#[derive(Debug, Clone, Copy)]
struct Bounds2 {
    center: [f32; 2],
    extents: f32,
}

impl Bounds2 {
    /// Squared distance from a point to the nearest edge of the square;
    /// zero inside it.
    fn sqr_distance(&self, point: [f32; 2]) -> f32 {
        let dx = ((point[0] - self.center[0]).abs() - self.extents).max(0.0);
        let dz = ((point[1] - self.center[1]).abs() - self.extents).max(0.0);
        dx * dx + dz * dz
    }
}

/// Cache slot for one detail level of one chunk. `requested` is the
/// de-duplication guard: it flips on the first build request and the slot
/// never issues a second one. The mesh, once set, is never regressed.
struct LodMesh {
    lod: usize,
    mesh: Option<MeshData>,
    requested: bool,
}

impl LodMesh {
    fn new(lod: usize) -> Self {
        LodMesh {
            lod,
            mesh: None,
            requested: false,
        }
    }
}

/// Everything chunks share with their streamer: immutable configuration
/// snapshots, the work queue, the scene host, the per-tick viewer position,
/// and the set of currently visible chunk coordinates (which doubles as the
/// visibility-change notification channel back to the streamer).
pub(crate) struct ChunkContext {
    pub(crate) detail_levels: Arc<[LodInfo]>,
    pub(crate) collider_lod_index: usize,
    pub(crate) max_view_distance: f32,
    pub(crate) height_map_settings: Arc<HeightMapSettings>,
    pub(crate) simplex_height_map_settings: Arc<HeightMapSettings>,
    pub(crate) mesh_settings: Arc<MeshSettings>,
    pub(crate) queue: AsyncWorkQueue,
    pub(crate) host: Rc<dyn SceneHost>,
    pub(crate) viewer: Cell<[f32; 2]>,
    pub(crate) visible: RefCell<HashSet<ChunkCoord>>,
}

/// One terrain tile with a fixed world-space footprint.
///
/// Owned by the streamer as `Rc<RefCell<TerrainChunk>>`; the extra shared
/// ownership exists only so drained work-queue callbacks can reach back
/// into the chunk. All access happens on the consumer thread.
pub struct TerrainChunk {
    coordinate: ChunkCoord,
    sample_center: (f32, f32),
    bounds: Bounds2,
    handle: ObjectHandle,
    height_map: Option<Arc<HeightMap>>,
    height_map_requested: bool,
    lod_meshes: Vec<LodMesh>,
    previous_lod_index: Option<usize>,
    has_set_collider: bool,
    visible: bool,
    ctx: Rc<ChunkContext>,
}

impl TerrainChunk {
    pub(crate) fn new(coordinate: ChunkCoord, ctx: Rc<ChunkContext>) -> Rc<RefCell<Self>> {
        let num_verts = ctx.mesh_settings.num_verts_per_line();
        let world_size = ctx.mesh_settings.mesh_world_size();

        // Sample centers advance by the interior span per coordinate step so
        // neighboring chunks sample identical noise along shared edges.
        let sample_step = (num_verts - 5) as f32;
        let sample_center = (
            coordinate.x as f32 * sample_step,
            coordinate.z as f32 * sample_step,
        );

        let position = [
            coordinate.x as f32 * world_size,
            coordinate.z as f32 * world_size,
        ];
        let bounds = Bounds2 {
            center: position,
            extents: world_size / 2.0,
        };

        let handle = ctx.host.create_visual_object([position[0], 0.0, position[1]]);
        ctx.host.set_object_visible(handle, false);

        let lod_meshes = ctx
            .detail_levels
            .iter()
            .map(|level| LodMesh::new(level.lod))
            .collect();

        Rc::new(RefCell::new(TerrainChunk {
            coordinate,
            sample_center,
            bounds,
            handle,
            height_map: None,
            height_map_requested: false,
            lod_meshes,
            previous_lod_index: None,
            has_set_collider: false,
            visible: false,
            ctx,
        }))
    }

    pub fn coordinate(&self) -> ChunkCoord {
        self.coordinate
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn has_height_map(&self) -> bool {
        self.height_map.is_some()
    }

    pub fn active_lod(&self) -> Option<usize> {
        self.previous_lod_index
    }

    pub fn has_collider(&self) -> bool {
        self.has_set_collider
    }

    /// Issues the asynchronous heightfield build. A chunk loads at most
    /// once; repeat calls are no-ops.
    pub(crate) fn load(this: &Rc<RefCell<Self>>) {
        let (ctx, num_verts, settings, simplex_settings, sample_center, coordinate) = {
            let mut chunk = this.borrow_mut();
            if chunk.height_map_requested {
                return;
            }
            chunk.height_map_requested = true;
            (
                Rc::clone(&chunk.ctx),
                chunk.ctx.mesh_settings.num_verts_per_line(),
                Arc::clone(&chunk.ctx.height_map_settings),
                Arc::clone(&chunk.ctx.simplex_height_map_settings),
                chunk.sample_center,
                chunk.coordinate,
            )
        };

        debug!(
            "TerrainChunk ({}, {}): requesting heightfield",
            coordinate.x, coordinate.z
        );

        let chunk = Rc::clone(this);
        ctx.queue.submit(
            move || generate_height_map(num_verts, num_verts, &settings, &simplex_settings, sample_center),
            move |height_map| Self::on_height_map_received(&chunk, height_map),
        );
    }

    fn on_height_map_received(this: &Rc<RefCell<Self>>, height_map: HeightMap) {
        this.borrow_mut().height_map = Some(Arc::new(height_map));
        Self::update(this);
    }

    /// Re-evaluates visibility and the desired LOD against the current
    /// viewer position: swaps in an already-built mesh, or requests the
    /// missing one (once), and reports visibility transitions through the
    /// shared visible set.
    pub(crate) fn update(this: &Rc<RefCell<Self>>) {
        let request;
        {
            let mut chunk = this.borrow_mut();
            if chunk.height_map.is_none() {
                return;
            }

            let viewer = chunk.ctx.viewer.get();
            let distance = chunk.bounds.sqr_distance(viewer).sqrt();
            let was_visible = chunk.visible;
            let visible = distance <= chunk.ctx.max_view_distance;
            request = if visible { chunk.select_lod(distance) } else { None };

            if was_visible != visible {
                chunk.visible = visible;
                chunk.ctx.host.set_object_visible(chunk.handle, visible);
                if visible {
                    chunk.ctx.visible.borrow_mut().insert(chunk.coordinate);
                } else {
                    chunk.ctx.visible.borrow_mut().remove(&chunk.coordinate);
                }
            }
        }

        if let Some(lod_index) = request {
            Self::request_lod_mesh(this, lod_index);
        }
    }

    /// Picks the detail level for the given distance and applies it if its
    /// mesh is ready. Returns the LOD index to request when the desired
    /// mesh is missing and not already pending.
    fn select_lod(&mut self, distance: f32) -> Option<usize> {
        let lod_index = self
            .ctx
            .detail_levels
            .iter()
            .position(|level| distance <= level.visible_distance_threshold)
            .unwrap_or(self.ctx.detail_levels.len() - 1);

        if Some(lod_index) == self.previous_lod_index {
            return None;
        }

        if self.lod_meshes[lod_index].mesh.is_some() {
            self.previous_lod_index = Some(lod_index);
            if let Some(mesh) = self.lod_meshes[lod_index].mesh.as_ref() {
                self.ctx.host.set_mesh_on_object(self.handle, mesh);
            }
            None
        } else if !self.lod_meshes[lod_index].requested {
            Some(lod_index)
        } else {
            None
        }
    }

    fn request_lod_mesh(this: &Rc<RefCell<Self>>, lod_index: usize) {
        let (ctx, height_map, mesh_settings, lod) = {
            let mut chunk = this.borrow_mut();
            let Some(height_map) = chunk.height_map.clone() else {
                return;
            };
            if chunk.lod_meshes[lod_index].requested {
                return;
            }
            chunk.lod_meshes[lod_index].requested = true;
            (
                Rc::clone(&chunk.ctx),
                height_map,
                Arc::clone(&chunk.ctx.mesh_settings),
                chunk.lod_meshes[lod_index].lod,
            )
        };

        let chunk = Rc::clone(this);
        ctx.queue.submit(
            move || generate_terrain_mesh(&height_map, &mesh_settings, lod),
            move |mesh| Self::on_mesh_received(&chunk, lod_index, mesh),
        );
    }

    fn on_mesh_received(this: &Rc<RefCell<Self>>, lod_index: usize, mesh: MeshData) {
        let collider_lod_index = {
            let mut chunk = this.borrow_mut();
            chunk.lod_meshes[lod_index].mesh = Some(mesh);
            chunk.ctx.collider_lod_index
        };

        // The regular update path decides whether this mesh is still the
        // desired one; a stale arrival just stays cached in its slot.
        Self::update(this);
        if lod_index == collider_lod_index {
            Self::update_collision_mesh(this);
        }
    }

    /// Collider policy: request the collider-LOD mesh once the viewer is
    /// inside that level's distance band, attach it once the viewer is
    /// nearly on top of the chunk, and never touch it again afterwards.
    pub(crate) fn update_collision_mesh(this: &Rc<RefCell<Self>>) {
        let request;
        let collider_lod_index;
        {
            let mut chunk = this.borrow_mut();
            if chunk.has_set_collider || chunk.height_map.is_none() {
                return;
            }

            collider_lod_index = chunk.ctx.collider_lod_index;
            let sqr_distance = chunk.bounds.sqr_distance(chunk.ctx.viewer.get());

            request = sqr_distance
                < chunk.ctx.detail_levels[collider_lod_index].sqr_visible_distance_threshold()
                && !chunk.lod_meshes[collider_lod_index].requested;

            let attach_range =
                COLLIDER_GENERATION_DISTANCE_THRESHOLD * COLLIDER_GENERATION_DISTANCE_THRESHOLD;
            if sqr_distance < attach_range {
                if let Some(mesh) = chunk.lod_meshes[collider_lod_index].mesh.as_ref() {
                    chunk.ctx.host.set_collider_on_object(chunk.handle, mesh);
                    chunk.has_set_collider = true;
                    debug!(
                        "TerrainChunk ({}, {}): collider attached",
                        chunk.coordinate.x, chunk.coordinate.z
                    );
                }
            }
        }

        if request {
            Self::request_lod_mesh(this, collider_lod_index);
        }
    }
}
