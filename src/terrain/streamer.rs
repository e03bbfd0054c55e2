use std::cell::{Cell, Ref, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;

use log::info;

use crate::config::{ConfigError, LodInfo, TerrainSettings};
use crate::host::SceneHost;
use crate::terrain::chunk::{ChunkContext, ChunkCoord, TerrainChunk};
use crate::threading::{AsyncWorkQueue, WorkerError};

/// Counters for monitoring a streamer.
#[derive(Debug, Clone, Copy)]
pub struct StreamerStats {
    /// Chunks created so far; chunks are never destroyed.
    pub resident_chunks: usize,
    pub visible_chunks: usize,
    /// Background jobs submitted over the streamer's lifetime.
    pub jobs_submitted: u64,
    /// Jobs still in flight or awaiting their drained callback.
    pub jobs_pending: usize,
}

/// Owns the chunk grid and drives it from the viewer position.
///
/// `update` is the single per-tick entry point: it drains the work queue,
/// re-scans the visible neighborhood when the viewer has moved far enough,
/// and keeps collider evaluation running at finer granularity in between.
/// All state lives on the calling thread; only heightfield and mesh builds
/// leave it.
pub struct TerrainStreamer {
    ctx: Rc<ChunkContext>,
    chunks: HashMap<ChunkCoord, Rc<RefCell<TerrainChunk>>>,
    mesh_world_size: f32,
    chunks_visible_in_view_distance: i32,
    viewer_move_threshold: f32,
    /// Viewer position at the last full neighborhood scan.
    last_scan_position: Option<[f32; 2]>,
}

impl TerrainStreamer {
    /// Validates the settings and builds the streamer around its own work
    /// queue and the given scene host. No chunks exist until the first
    /// `update`.
    pub fn new(settings: TerrainSettings, host: Rc<dyn SceneHost>) -> Result<Self, ConfigError> {
        settings.validate()?;

        let detail_levels: Arc<[LodInfo]> = settings.detail_levels.clone().into();
        let max_view_distance =
            detail_levels[detail_levels.len() - 1].visible_distance_threshold;
        let mesh_world_size = settings.mesh.mesh_world_size();
        let chunks_visible_in_view_distance = (max_view_distance / mesh_world_size).round() as i32;

        info!(
            "TerrainStreamer: mesh world size {mesh_world_size}, {chunks_visible_in_view_distance} chunk rings, max view distance {max_view_distance}"
        );

        let ctx = Rc::new(ChunkContext {
            detail_levels,
            collider_lod_index: settings.collider_lod_index,
            max_view_distance,
            height_map_settings: Arc::new(settings.height_map),
            simplex_height_map_settings: Arc::new(settings.simplex_height_map),
            mesh_settings: Arc::new(settings.mesh),
            queue: AsyncWorkQueue::new(settings.max_threads),
            host,
            viewer: Cell::new([0.0, 0.0]),
            visible: RefCell::new(HashSet::new()),
        });

        Ok(TerrainStreamer {
            ctx,
            chunks: HashMap::new(),
            mesh_world_size,
            chunks_visible_in_view_distance,
            viewer_move_threshold: settings.viewer_move_threshold,
            last_scan_position: None,
        })
    }

    /// Per-tick drive. Never blocks: completed background work is collected
    /// through the queue drain, and heavy work is only ever submitted,
    /// fire-and-forget.
    pub fn update(&mut self, viewer_position: [f32; 2]) -> Result<(), WorkerError> {
        self.ctx.viewer.set(viewer_position);
        self.ctx.queue.drain()?;

        let moved_past_threshold = match self.last_scan_position {
            Some(last) => {
                let dx = viewer_position[0] - last[0];
                let dz = viewer_position[1] - last[1];
                dx * dx + dz * dz > self.viewer_move_threshold * self.viewer_move_threshold
            }
            None => true,
        };

        if moved_past_threshold {
            self.update_visible_chunks(viewer_position);
            self.last_scan_position = Some(viewer_position);
        }

        // Collider activation needs finer-grained distance tracking than
        // LOD switching, so it runs on any movement, not just scan moves.
        if self.last_scan_position != Some(viewer_position) {
            let visible: Vec<ChunkCoord> = self.ctx.visible.borrow().iter().copied().collect();
            for coordinate in visible {
                if let Some(chunk) = self.chunks.get(&coordinate) {
                    TerrainChunk::update_collision_mesh(chunk);
                }
            }
        }

        Ok(())
    }

    /// Full neighborhood scan: every currently visible chunk re-evaluates,
    /// then every coordinate within view range is visited, creating chunks
    /// on first need. Chunks that fell out of range were hidden by their
    /// own update; they stay resident in the map.
    fn update_visible_chunks(&mut self, viewer_position: [f32; 2]) {
        let mut already_updated = HashSet::new();
        let visible: Vec<ChunkCoord> = self.ctx.visible.borrow().iter().copied().collect();
        for coordinate in visible {
            already_updated.insert(coordinate);
            if let Some(chunk) = self.chunks.get(&coordinate) {
                TerrainChunk::update(chunk);
            }
        }

        let current_x = (viewer_position[0] / self.mesh_world_size).round() as i32;
        let current_z = (viewer_position[1] / self.mesh_world_size).round() as i32;
        let range = self.chunks_visible_in_view_distance;

        for z_offset in -range..=range {
            for x_offset in -range..=range {
                let coordinate = ChunkCoord {
                    x: current_x + x_offset,
                    z: current_z + z_offset,
                };
                if already_updated.contains(&coordinate) {
                    continue;
                }

                if let Some(chunk) = self.chunks.get(&coordinate) {
                    TerrainChunk::update(chunk);
                } else {
                    let chunk = TerrainChunk::new(coordinate, Rc::clone(&self.ctx));
                    TerrainChunk::load(&chunk);
                    self.chunks.insert(coordinate, chunk);
                }
            }
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn visible_chunk_count(&self) -> usize {
        self.ctx.visible.borrow().len()
    }

    pub fn has_chunk(&self, coordinate: ChunkCoord) -> bool {
        self.chunks.contains_key(&coordinate)
    }

    pub fn chunk(&self, coordinate: ChunkCoord) -> Option<Ref<'_, TerrainChunk>> {
        self.chunks.get(&coordinate).map(|chunk| chunk.borrow())
    }

    pub fn chunk_coordinates(&self) -> Vec<ChunkCoord> {
        self.chunks.keys().copied().collect()
    }

    pub fn stats(&self) -> StreamerStats {
        StreamerStats {
            resident_chunks: self.chunks.len(),
            visible_chunks: self.ctx.visible.borrow().len(),
            jobs_submitted: self.ctx.queue.submitted(),
            jobs_pending: self.ctx.queue.pending(),
        }
    }
}
