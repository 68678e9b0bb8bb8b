//! Opaque identifiers for meshes, tiles, triangles, islands, and links
//!
//! Triangle ids pack a tile id and a triangle index into a single value so
//! the owning tile can always be recovered without a lookup. Tile ids are
//! 1-based so that id 0 stays invalid for every identifier kind.

/// Number of bits reserved for the triangle index within a tile
pub const TILE_INDEX_BITS: u32 = 10;

/// Maximum number of triangles, and thus off-mesh link records, per tile
pub const MAX_TILE_LINKS: usize = 1 << TILE_INDEX_BITS;

/// Identifier of a navigation mesh (1-based, 0 is invalid)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct MeshId(u32);

impl MeshId {
    /// The invalid mesh id sentinel
    pub const INVALID: MeshId = MeshId(0);

    /// Creates a mesh id from a raw value
    pub const fn new(value: u32) -> Self {
        MeshId(value)
    }

    /// Returns the raw value
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns true when the id is not the invalid sentinel
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// Identifier of a navigation mesh tile (1-based, 0 is invalid)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct TileId(u32);

impl TileId {
    /// The invalid tile id sentinel
    pub const INVALID: TileId = TileId(0);

    /// Creates a tile id from a raw value
    pub const fn new(value: u32) -> Self {
        TileId(value)
    }

    /// Returns the raw value
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns true when the id is not the invalid sentinel
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// Identifier of a navigation mesh triangle
///
/// Encodes the owning tile in the upper bits and the triangle index within
/// the tile in the lower [`TILE_INDEX_BITS`] bits. Because tile ids are
/// 1-based, no valid triangle ever encodes to 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct TriangleId(u32);

impl TriangleId {
    /// The invalid triangle id sentinel
    pub const INVALID: TriangleId = TriangleId(0);

    /// Builds a triangle id from a tile id and a triangle index
    pub const fn new(tile: TileId, index: u16) -> Self {
        TriangleId((tile.0 << TILE_INDEX_BITS) | (index as u32 & (MAX_TILE_LINKS as u32 - 1)))
    }

    /// Creates a triangle id from a raw packed value
    pub const fn from_raw(value: u32) -> Self {
        TriangleId(value)
    }

    /// Returns the raw packed value
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Extracts the owning tile id
    pub const fn tile_id(self) -> TileId {
        TileId(self.0 >> TILE_INDEX_BITS)
    }

    /// Extracts the triangle index within the owning tile
    pub const fn index(self) -> u16 {
        (self.0 & (MAX_TILE_LINKS as u32 - 1)) as u16
    }

    /// Returns true when the id is not the invalid sentinel
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// Identifier of a gameplay entity (0 is invalid)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct EntityId(u32);

impl EntityId {
    /// The invalid entity id sentinel
    pub const INVALID: EntityId = EntityId(0);

    /// Creates an entity id from a raw value
    pub const fn new(value: u32) -> Self {
        EntityId(value)
    }

    /// Returns the raw value
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns true when the id is not the invalid sentinel
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// Identifier of a navigation agent type (0 is invalid)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct AgentTypeId(u32);

impl AgentTypeId {
    /// Creates an agent type id from a raw value
    pub const fn new(value: u32) -> Self {
        AgentTypeId(value)
    }

    /// Returns the raw value
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns true when the id is not the invalid sentinel
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// Identifier of an off-mesh link (0 is reserved as invalid)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct OffMeshLinkId(u32);

impl OffMeshLinkId {
    /// The invalid link id sentinel
    pub const INVALID: OffMeshLinkId = OffMeshLinkId(0);

    /// Creates a link id from a raw value
    pub const fn new(value: u32) -> Self {
        OffMeshLinkId(value)
    }

    /// Returns the raw value
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns true when the id is not the invalid sentinel
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// Mesh-local island identifier assigned by the navigation mesh (0 is invalid)
///
/// An island is a maximal set of triangles mutually reachable through
/// ordinary mesh adjacency within one mesh. Island assignment itself is
/// computed by the navigation mesh; this crate only stores the ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct StaticIslandId(u32);

impl StaticIslandId {
    /// The invalid island id sentinel
    pub const INVALID: StaticIslandId = StaticIslandId(0);

    /// Creates an island id from a raw value
    pub const fn new(value: u32) -> Self {
        StaticIslandId(value)
    }

    /// Returns the raw value
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns true when the id is not the invalid sentinel
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// Mesh-qualified island identifier
///
/// Packs the owning mesh id in the upper 32 bits and the mesh-local island
/// id in the lower 32 bits so islands from different meshes never compare
/// equal. The mesh component must match the mesh that owns the island's
/// triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct GlobalIslandId(u64);

impl GlobalIslandId {
    /// The invalid global island id sentinel
    pub const INVALID: GlobalIslandId = GlobalIslandId(0);

    /// Builds a global island id from its mesh and mesh-local components
    pub const fn new(mesh: MeshId, island: StaticIslandId) -> Self {
        GlobalIslandId(((mesh.value() as u64) << 32) | island.value() as u64)
    }

    /// Extracts the owning mesh id
    pub const fn mesh_id(self) -> MeshId {
        MeshId::new((self.0 >> 32) as u32)
    }

    /// Extracts the mesh-local island id
    pub const fn static_island_id(self) -> StaticIslandId {
        StaticIslandId::new(self.0 as u32)
    }

    /// Returns true when both the mesh and island components are valid
    pub const fn is_valid(self) -> bool {
        self.mesh_id().is_valid() && self.static_island_id().is_valid()
    }
}

/// Allocator for process-wide unique off-mesh link ids
///
/// A single allocator is shared by every per-mesh navigation instance so
/// ids never collide across meshes. Ids increase monotonically and the
/// reserved invalid value is skipped on wrap-around.
#[derive(Debug)]
pub struct LinkIdAllocator {
    next: u32,
}

impl Default for LinkIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkIdAllocator {
    /// Creates an allocator whose first allocation is id 1
    pub fn new() -> Self {
        LinkIdAllocator { next: 1 }
    }

    /// Allocates the next link id
    pub fn allocate(&mut self) -> OffMeshLinkId {
        let id = OffMeshLinkId::new(self.next);
        self.next = self.next.wrapping_add(1);
        if self.next == 0 {
            self.next = 1;
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_id_round_trips_tile_and_index() {
        let tile = TileId::new(37);
        let triangle = TriangleId::new(tile, 513);
        assert_eq!(triangle.tile_id(), tile);
        assert_eq!(triangle.index(), 513);
        assert!(triangle.is_valid());
    }

    #[test]
    fn triangle_in_first_tile_is_never_the_invalid_sentinel() {
        let triangle = TriangleId::new(TileId::new(1), 0);
        assert!(triangle.is_valid());
        assert_eq!(triangle.index(), 0);
    }

    #[test]
    fn global_island_id_components() {
        let id = GlobalIslandId::new(MeshId::new(3), StaticIslandId::new(7));
        assert_eq!(id.mesh_id(), MeshId::new(3));
        assert_eq!(id.static_island_id(), StaticIslandId::new(7));
        assert!(id.is_valid());
        assert!(!GlobalIslandId::INVALID.is_valid());
        assert!(!GlobalIslandId::new(MeshId::INVALID, StaticIslandId::new(1)).is_valid());
    }

    #[test]
    fn allocator_skips_the_invalid_id() {
        let mut allocator = LinkIdAllocator::new();
        let first = allocator.allocate();
        assert_eq!(first, OffMeshLinkId::new(1));
        allocator.next = u32::MAX;
        assert_eq!(allocator.allocate(), OffMeshLinkId::new(u32::MAX));
        assert_eq!(allocator.allocate(), OffMeshLinkId::new(1));
    }
}
