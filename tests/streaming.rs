use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use moraine::config::{ConfigError, LodInfo, TerrainSettings};
use moraine::host::{ObjectHandle, SceneHost};
use moraine::terrain::{ChunkCoord, MeshData, TerrainStreamer};

/// Scene host that records every callback for assertions.
#[derive(Default)]
struct RecordingHost {
    state: RefCell<HostState>,
}

#[derive(Default)]
struct HostState {
    next_id: u64,
    created: Vec<(ObjectHandle, [f32; 3])>,
    mesh_assignments: HashMap<ObjectHandle, usize>,
    collider_assignments: HashMap<ObjectHandle, usize>,
    visibility: HashMap<ObjectHandle, bool>,
}

impl RecordingHost {
    fn created_count(&self) -> usize {
        self.state.borrow().created.len()
    }

    fn total_mesh_assignments(&self) -> usize {
        self.state.borrow().mesh_assignments.values().sum()
    }

    fn total_collider_assignments(&self) -> usize {
        self.state.borrow().collider_assignments.values().sum()
    }
}

impl SceneHost for RecordingHost {
    fn create_visual_object(&self, position: [f32; 3]) -> ObjectHandle {
        let mut state = self.state.borrow_mut();
        let handle = ObjectHandle(state.next_id);
        state.next_id += 1;
        state.created.push((handle, position));
        handle
    }

    fn set_mesh_on_object(&self, handle: ObjectHandle, mesh: &MeshData) {
        assert!(!mesh.vertices.is_empty());
        *self
            .state
            .borrow_mut()
            .mesh_assignments
            .entry(handle)
            .or_insert(0) += 1;
    }

    fn set_collider_on_object(&self, handle: ObjectHandle, mesh: &MeshData) {
        assert!(!mesh.indices.is_empty());
        *self
            .state
            .borrow_mut()
            .collider_assignments
            .entry(handle)
            .or_insert(0) += 1;
    }

    fn set_object_visible(&self, handle: ObjectHandle, visible: bool) {
        self.state.borrow_mut().visibility.insert(handle, visible);
    }

    fn destroy_object(&self, _handle: ObjectHandle) {
        panic!("chunks are never destroyed");
    }
}

/// Settings with a mesh world size of 240 and three chunk rings, the
/// geometry the streaming scenarios are written against.
fn test_settings() -> TerrainSettings {
    let mut settings = TerrainSettings::default();
    settings.mesh.chunk_size_index = 0; // 48 quads -> 53 verts per line
    settings.mesh.mesh_scale = 4.8; // (53 - 3) * 4.8 = 240 world units
    settings.detail_levels = vec![
        LodInfo { lod: 0, visible_distance_threshold: 200.0 },
        LodInfo { lod: 1, visible_distance_threshold: 450.0 },
        LodInfo { lod: 2, visible_distance_threshold: 720.0 },
    ];
    settings.collider_lod_index = 0;
    settings.max_threads = 2;
    settings
}

fn new_streamer(settings: TerrainSettings) -> (TerrainStreamer, Rc<RecordingHost>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let host = Rc::new(RecordingHost::default());
    let streamer = TerrainStreamer::new(settings, host.clone() as Rc<dyn SceneHost>)
        .expect("test settings are valid");
    (streamer, host)
}

/// Ticks the streamer until all background work has drained.
fn settle(streamer: &mut TerrainStreamer, position: [f32; 2]) {
    let deadline = Instant::now() + Duration::from_secs(20);
    loop {
        streamer.update(position).expect("no worker failures");
        if streamer.stats().jobs_pending == 0 {
            streamer.update(position).expect("no worker failures");
            if streamer.stats().jobs_pending == 0 {
                return;
            }
        }
        assert!(Instant::now() < deadline, "streamer never settled");
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn initial_scan_creates_the_full_neighborhood() {
    let (mut streamer, host) = new_streamer(test_settings());
    streamer.update([0.0, 0.0]).expect("no worker failures");

    assert_eq!(streamer.chunk_count(), 49);
    assert_eq!(host.created_count(), 49);
    for x in -3..=3 {
        for z in -3..=3 {
            assert!(streamer.has_chunk(ChunkCoord { x, z }), "missing ({x}, {z})");
        }
    }
    assert!(!streamer.has_chunk(ChunkCoord { x: 4, z: 0 }));
    assert!(!streamer.has_chunk(ChunkCoord { x: 0, z: -4 }));
}

#[test]
fn moving_less_than_the_threshold_creates_nothing() {
    let (mut streamer, _host) = new_streamer(test_settings());
    streamer.update([0.0, 0.0]).expect("no worker failures");
    assert_eq!(streamer.chunk_count(), 49);

    streamer.update([10.0, 0.0]).expect("no worker failures");
    streamer.update([15.0, 12.0]).expect("no worker failures");
    assert_eq!(streamer.chunk_count(), 49);
}

#[test]
fn crossing_the_threshold_streams_the_new_column() {
    let (mut streamer, _host) = new_streamer(test_settings());
    streamer.update([0.0, 0.0]).expect("no worker failures");
    assert_eq!(streamer.chunk_count(), 49);

    // 130 world units: past the move threshold and into chunk column 1.
    streamer.update([130.0, 0.0]).expect("no worker failures");

    assert_eq!(streamer.chunk_count(), 56);
    for z in -3..=3 {
        assert!(streamer.has_chunk(ChunkCoord { x: 4, z }), "missing (4, {z})");
    }
    // The trailing column stays resident even though it left the scan range.
    for z in -3..=3 {
        assert!(streamer.has_chunk(ChunkCoord { x: -3, z }));
    }
}

#[test]
fn meshes_and_colliders_arrive_end_to_end() {
    let (mut streamer, host) = new_streamer(test_settings());
    settle(&mut streamer, [0.0, 0.0]);

    let origin = streamer
        .chunk(ChunkCoord { x: 0, z: 0 })
        .expect("origin chunk exists");
    assert!(origin.has_height_map());
    assert!(origin.is_visible());
    assert_eq!(origin.active_lod(), Some(0));
    // The viewer stands on the origin chunk, so its collider is attached.
    assert!(origin.has_collider());
    drop(origin);

    assert!(streamer.visible_chunk_count() > 0);
    assert!(host.total_mesh_assignments() > 0);
    assert!(host.total_collider_assignments() >= 1);

    // A distant visible chunk settles on a coarser detail level.
    let far = streamer
        .chunk(ChunkCoord { x: 3, z: 0 })
        .expect("far chunk exists");
    assert!(far.is_visible());
    assert_eq!(far.active_lod(), Some(2));
}

#[test]
fn settled_streamer_issues_no_duplicate_requests() {
    let (mut streamer, _host) = new_streamer(test_settings());
    settle(&mut streamer, [0.0, 0.0]);
    let submitted = streamer.stats().jobs_submitted;

    // Small zigzag movement: re-runs collider evaluation every tick but must
    // not re-request any (chunk, LOD) build that already resolved.
    for tick in 0..20 {
        let wobble = if tick % 2 == 0 { 1.0 } else { -1.0 };
        streamer.update([wobble, 0.0]).expect("no worker failures");
    }
    assert_eq!(streamer.stats().jobs_submitted, submitted);
}

#[test]
fn leaving_range_hides_chunks_but_keeps_them_resident() {
    let (mut streamer, _host) = new_streamer(test_settings());
    settle(&mut streamer, [0.0, 0.0]);
    assert!(streamer.visible_chunk_count() > 0);

    // Far enough that the old neighborhood is completely out of view.
    streamer.update([5000.0, 0.0]).expect("no worker failures");

    let origin = streamer
        .chunk(ChunkCoord { x: 0, z: 0 })
        .expect("origin chunk stays resident");
    assert!(!origin.is_visible());
    drop(origin);

    // 49 old + 49 new chunks around the new position, nothing evicted.
    assert_eq!(streamer.chunk_count(), 98);
    assert!(streamer.has_chunk(ChunkCoord { x: 21, z: 0 }));

    settle(&mut streamer, [5000.0, 0.0]);
    assert!(streamer.visible_chunk_count() > 0);
    assert!(!streamer
        .chunk(ChunkCoord { x: 0, z: 0 })
        .expect("still resident")
        .is_visible());
}

#[test]
fn invalid_settings_are_rejected_before_streaming() {
    let mut settings = test_settings();
    settings.detail_levels.clear();
    let host = Rc::new(RecordingHost::default());
    let result = TerrainStreamer::new(settings, host as Rc<dyn SceneHost>);
    assert!(matches!(result, Err(ConfigError::EmptyDetailLevels)));
}
