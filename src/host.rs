use crate::terrain::mesh_generator::MeshData;

/// Opaque identifier for an object owned by the scene host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub u64);

/// Callbacks into the engine/scene layer that owns the rendered objects.
///
/// The terrain core never reasons about transforms or rendering internals;
/// it only creates objects, hands them mesh data, and toggles visibility.
/// Implementations are called from the consumer thread only and are expected
/// to use interior mutability.
pub trait SceneHost {
    /// Creates an (initially empty) renderable object at a world position.
    fn create_visual_object(&self, position: [f32; 3]) -> ObjectHandle;

    /// Assigns the mesh rendered for an object.
    fn set_mesh_on_object(&self, handle: ObjectHandle, mesh: &MeshData);

    /// Assigns the collision mesh for an object.
    fn set_collider_on_object(&self, handle: ObjectHandle, mesh: &MeshData);

    /// Shows or hides an object.
    fn set_object_visible(&self, handle: ObjectHandle, visible: bool);

    /// Destroys an object. Not used by the current chunk lifecycle (chunks
    /// stay resident once created) but part of the host contract.
    fn destroy_object(&self, handle: ObjectHandle);
}
