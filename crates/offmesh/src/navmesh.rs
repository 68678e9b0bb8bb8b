//! Seams toward the navigation system
//!
//! The navigation system owns mesh geometry, tile regeneration, and island
//! assignment. This crate only consumes the handful of queries it needs to
//! resolve link endpoints and to keep the mesh's per-triangle off-mesh
//! index in step with the link tables.

use offmesh_common::{AgentTypeId, MeshId, StaticIslandId, TileId, TriangleId, Vec3};

/// Per-mesh queries and callbacks consumed by the off-mesh navigation
pub trait NavMeshApi {
    /// Nearest triangle containing the location, if any
    fn triangle_at(&self, location: Vec3) -> Option<TriangleId>;

    /// Closest point on the navmesh boundary along the segment from `from`
    /// toward `to`, together with the triangle owning that boundary
    ///
    /// Used to shorten a link whose endpoint overshoots the mesh: `from` is
    /// the link midpoint, `to` the overshooting endpoint.
    fn closest_boundary_point(&self, from: Vec3, to: Vec3) -> Option<(TriangleId, Vec3)>;

    /// Island the triangle was assigned to by the mesh's partitioning
    fn island_for_triangle(&self, triangle: TriangleId) -> StaticIslandId;

    /// Notifies the mesh that a triangle gained its first off-mesh link
    fn add_off_mesh_link_to_tile(&mut self, tile: TileId, triangle: TriangleId, index: u16);

    /// Notifies the mesh that a triangle's first link index moved
    fn update_off_mesh_link_for_tile(&mut self, tile: TileId, triangle: TriangleId, index: u16);

    /// Notifies the mesh that a triangle lost its last off-mesh link
    fn remove_off_mesh_link_from_tile(&mut self, tile: TileId, triangle: TriangleId);
}

/// Mesh lookup and agent-type queries consumed by the manager
pub trait NavigationSystemApi {
    /// Mesh by id
    fn mesh(&self, mesh_id: MeshId) -> Option<&dyn NavMeshApi>;

    /// Mesh by id, mutable
    fn mesh_mut(&mut self, mesh_id: MeshId) -> Option<&mut dyn NavMeshApi>;

    /// Mesh of the given agent type enclosing the position, if any
    fn enclosing_mesh(&self, agent_type: AgentTypeId, position: Vec3) -> Option<MeshId>;

    /// Every agent type the navigation system knows about
    fn agent_types(&self) -> Vec<AgentTypeId>;
}
