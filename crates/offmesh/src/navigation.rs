//! Per-mesh off-mesh link store
//!
//! One [`OffMeshNavigation`] exists per navigation mesh. It owns the tile
//! link tables and the single owning table of link payloads, and keeps the
//! mesh's per-triangle off-mesh index in step with every mutation. Link ids
//! come out of a [`LinkIdAllocator`] shared by all meshes so ids never
//! collide across navigation instances.

use std::collections::HashMap;
use std::sync::Arc;

use offmesh_common::{
    EntityId, Error, LinkIdAllocator, OffMeshLinkId, Result, TileId, TriangleId, MAX_TILE_LINKS,
};

use crate::link::OffMeshLink;
use crate::navmesh::NavMeshApi;
use crate::tile_links::{TileLinks, TriangleLink, TriangleLinkRun};

/// Off-mesh link storage and queries for one navigation mesh
#[derive(Debug)]
pub struct OffMeshNavigation {
    /// Link tables per tile
    tiles: HashMap<TileId, TileLinks>,
    /// The live payload per link id
    links: HashMap<OffMeshLinkId, Arc<dyn OffMeshLink>>,
    /// Capacity bound applied to every tile's tables
    max_links_per_tile: usize,
}

impl Default for OffMeshNavigation {
    fn default() -> Self {
        Self::new()
    }
}

impl OffMeshNavigation {
    /// Creates an empty store with the default per-tile capacity bound
    pub fn new() -> Self {
        Self::with_max_links_per_tile(MAX_TILE_LINKS)
    }

    /// Creates an empty store with an explicit per-tile capacity bound
    pub fn with_max_links_per_tile(max_links_per_tile: usize) -> Self {
        OffMeshNavigation {
            tiles: HashMap::new(),
            links: HashMap::new(),
            max_links_per_tile,
        }
    }

    /// Number of live links in this mesh
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Returns true when no links are stored
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Adds a link between two triangles of the owning mesh
    ///
    /// Allocates a fresh id when `requested_id` is absent or invalid,
    /// inserts the forward record into the start triangle's tile and the
    /// reverse record into the end triangle's tile, stores the payload,
    /// and notifies the mesh's per-triangle index.
    pub fn add_link(
        &mut self,
        mesh: &mut dyn NavMeshApi,
        start_triangle: TriangleId,
        end_triangle: TriangleId,
        link: Arc<dyn OffMeshLink>,
        requested_id: Option<OffMeshLinkId>,
        allocator: &mut LinkIdAllocator,
    ) -> Result<OffMeshLinkId> {
        if !start_triangle.is_valid() || !end_triangle.is_valid() {
            return Err(Error::InvalidParam(
                "off-mesh link endpoints must be valid triangles".to_string(),
            ));
        }

        let link_id = match requested_id {
            Some(id) if id.is_valid() => id,
            _ => allocator.allocate(),
        };
        let record = TriangleLink {
            start_triangle,
            end_triangle,
            link_id,
        };

        let start_tile = start_triangle.tile_id();
        let end_tile = end_triangle.tile_id();
        let max_links = self.max_links_per_tile;

        let start_links = self
            .tiles
            .entry(start_tile)
            .or_insert_with(|| TileLinks::with_max_links(max_links));
        let triangle_had_links = !start_links.links_for_triangle(start_triangle).is_empty();
        start_links.insert_link(start_tile, record)?;

        let end_links = self
            .tiles
            .entry(end_tile)
            .or_insert_with(|| TileLinks::with_max_links(max_links));
        if let Err(err) = end_links.insert_lookup(end_tile, record) {
            // Undo the forward record so the tables stay symmetric.
            if let Some(start_links) = self.tiles.get_mut(&start_tile) {
                start_links.remove_link_records(link_id);
                if start_links.is_empty() {
                    self.tiles.remove(&start_tile);
                }
            }
            return Err(err);
        }

        self.links.insert(link_id, link);

        let first_index = self
            .tiles
            .get(&start_tile)
            .and_then(|tile| tile.first_link_index(start_triangle))
            .unwrap_or(0);
        if triangle_had_links {
            mesh.update_off_mesh_link_for_tile(start_tile, start_triangle, first_index);
        } else {
            mesh.add_off_mesh_link_to_tile(start_tile, start_triangle, first_index);
        }

        Ok(link_id)
    }

    /// Removes the link bound to the given start triangle
    ///
    /// Removes the forward and reverse records atomically together with the
    /// payload, then updates or clears the mesh's per-triangle index
    /// depending on whether other links remain on that triangle.
    pub fn remove_link(
        &mut self,
        mesh: &mut dyn NavMeshApi,
        bound_triangle: TriangleId,
        link_id: OffMeshLinkId,
    ) -> bool {
        let tile = bound_triangle.tile_id();
        let Some(tile_links) = self.tiles.get_mut(&tile) else {
            return false;
        };
        let Some(forward) = tile_links.remove_link_records(link_id) else {
            return false;
        };
        let remaining = tile_links.links_for_triangle(forward.start_triangle).len();
        let first_index = tile_links.first_link_index(forward.start_triangle);
        if tile_links.is_empty() {
            self.tiles.remove(&tile);
        }

        let end_tile = forward.end_triangle.tile_id();
        if let Some(lookup_links) = self.tiles.get_mut(&end_tile) {
            lookup_links.remove_lookup_records(link_id);
            if lookup_links.is_empty() {
                self.tiles.remove(&end_tile);
            }
        }

        self.links.remove(&link_id);

        if remaining > 0 {
            mesh.update_off_mesh_link_for_tile(
                tile,
                forward.start_triangle,
                first_index.unwrap_or(0),
            );
        } else {
            mesh.remove_off_mesh_link_from_tile(tile, forward.start_triangle);
        }
        true
    }

    /// Drops every link whose start triangle belongs to the tile
    ///
    /// Used when the tile is regenerated: the link topology is discarded
    /// (the manager re-adds links from its own cache afterwards) and no
    /// per-triangle index callbacks fire since the tile's index is rebuilt
    /// wholesale by the regeneration. Calling this twice is a no-op the
    /// second time.
    pub fn invalidate_links(&mut self, tile: TileId) -> Vec<OffMeshLinkId> {
        let mut removed = Vec::new();
        let Some(tile_links) = self.tiles.get(&tile) else {
            return removed;
        };
        let forwards: Vec<TriangleLink> = tile_links.all_links().to_vec();
        for record in forwards {
            if let Some(tile_links) = self.tiles.get_mut(&tile) {
                tile_links.remove_link_records(record.link_id);
            }
            let end_tile = record.end_triangle.tile_id();
            if let Some(lookup_links) = self.tiles.get_mut(&end_tile) {
                lookup_links.remove_lookup_records(record.link_id);
                if lookup_links.is_empty() && end_tile != tile {
                    self.tiles.remove(&end_tile);
                }
            }
            self.links.remove(&record.link_id);
            removed.push(record.link_id);
        }
        if self.tiles.get(&tile).is_some_and(|t| t.is_empty()) {
            self.tiles.remove(&tile);
        }
        removed
    }

    /// Cursor over the links leaving the triangle
    pub fn get_links_for_triangle(&self, triangle: TriangleId) -> TriangleLinkRun<'_> {
        self.tiles
            .get(&triangle.tile_id())
            .map(|tile| tile.links_for_triangle(triangle))
            .unwrap_or_else(TriangleLinkRun::empty)
    }

    /// Cursor over the links arriving at the triangle
    pub fn get_lookups_for_triangle(&self, triangle: TriangleId) -> TriangleLinkRun<'_> {
        self.tiles
            .get(&triangle.tile_id())
            .map(|tile| tile.lookups_for_triangle(triangle))
            .unwrap_or_else(TriangleLinkRun::empty)
    }

    /// Payload lookup by link id
    pub fn get_object_link_info(&self, link_id: OffMeshLinkId) -> Option<&Arc<dyn OffMeshLink>> {
        self.links.get(&link_id)
    }

    /// Payload lookup by link id, mutable
    pub fn get_object_link_info_mut(
        &mut self,
        link_id: OffMeshLinkId,
    ) -> Option<&mut Arc<dyn OffMeshLink>> {
        self.links.get_mut(&link_id)
    }

    /// Delegates to the payload's usability predicate
    ///
    /// Returns the traversal cost multiplier when usable; `None` when the
    /// link is absent or the payload rejects the requester.
    pub fn can_use_link(
        &self,
        requester: Option<EntityId>,
        link_id: OffMeshLinkId,
    ) -> Option<f32> {
        self.links
            .get(&link_id)
            .and_then(|link| link.can_use(requester))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::SmartObjectLink;
    use offmesh_common::{StaticIslandId, Vec3};
    use std::collections::HashSet;

    /// Mesh stub recording per-triangle index callbacks
    #[derive(Default)]
    struct IndexSpy {
        added: Vec<(TileId, TriangleId, u16)>,
        updated: Vec<(TileId, TriangleId, u16)>,
        removed: Vec<(TileId, TriangleId)>,
    }

    impl NavMeshApi for IndexSpy {
        fn triangle_at(&self, _location: Vec3) -> Option<TriangleId> {
            None
        }

        fn closest_boundary_point(&self, _from: Vec3, _to: Vec3) -> Option<(TriangleId, Vec3)> {
            None
        }

        fn island_for_triangle(&self, _triangle: TriangleId) -> StaticIslandId {
            StaticIslandId::INVALID
        }

        fn add_off_mesh_link_to_tile(&mut self, tile: TileId, triangle: TriangleId, index: u16) {
            self.added.push((tile, triangle, index));
        }

        fn update_off_mesh_link_for_tile(
            &mut self,
            tile: TileId,
            triangle: TriangleId,
            index: u16,
        ) {
            self.updated.push((tile, triangle, index));
        }

        fn remove_off_mesh_link_from_tile(&mut self, tile: TileId, triangle: TriangleId) {
            self.removed.push((tile, triangle));
        }
    }

    fn tri(tile: u32, index: u16) -> TriangleId {
        TriangleId::new(TileId::new(tile), index)
    }

    fn payload(entity: u32) -> Arc<dyn OffMeshLink> {
        Arc::new(SmartObjectLink::new(
            EntityId::new(entity),
            0xD00D,
            Vec3::ZERO,
            Vec3::ONE,
        ))
    }

    #[test]
    fn add_then_remove_keeps_tables_symmetric() {
        let mut navigation = OffMeshNavigation::new();
        let mut mesh = IndexSpy::default();
        let mut allocator = LinkIdAllocator::new();

        let id = navigation
            .add_link(&mut mesh, tri(1, 0), tri(2, 4), payload(7), None, &mut allocator)
            .unwrap();
        assert!(id.is_valid());
        assert_eq!(navigation.get_links_for_triangle(tri(1, 0)).len(), 1);
        assert_eq!(navigation.get_lookups_for_triangle(tri(2, 4)).len(), 1);
        assert_eq!(mesh.added.len(), 1);

        assert!(navigation.remove_link(&mut mesh, tri(1, 0), id));
        assert!(navigation.get_links_for_triangle(tri(1, 0)).is_empty());
        assert!(navigation.get_lookups_for_triangle(tri(2, 4)).is_empty());
        assert!(navigation.get_object_link_info(id).is_none());
        assert_eq!(mesh.removed, vec![(TileId::new(1), tri(1, 0))]);
        assert!(navigation.is_empty());
    }

    #[test]
    fn second_link_on_a_triangle_updates_instead_of_adding() {
        let mut navigation = OffMeshNavigation::new();
        let mut mesh = IndexSpy::default();
        let mut allocator = LinkIdAllocator::new();

        let first = navigation
            .add_link(&mut mesh, tri(1, 0), tri(2, 0), payload(7), None, &mut allocator)
            .unwrap();
        let _second = navigation
            .add_link(&mut mesh, tri(1, 0), tri(2, 1), payload(7), None, &mut allocator)
            .unwrap();
        assert_eq!(mesh.added.len(), 1);
        assert_eq!(mesh.updated.len(), 1);

        // Removing one link keeps the triangle indexed.
        assert!(navigation.remove_link(&mut mesh, tri(1, 0), first));
        assert_eq!(mesh.updated.len(), 2);
        assert!(mesh.removed.is_empty());
        assert_eq!(navigation.get_links_for_triangle(tri(1, 0)).len(), 1);
    }

    #[test]
    fn ids_stay_unique_across_navigations_sharing_an_allocator() {
        let mut allocator = LinkIdAllocator::new();
        let mut mesh_a = IndexSpy::default();
        let mut mesh_b = IndexSpy::default();
        let mut nav_a = OffMeshNavigation::new();
        let mut nav_b = OffMeshNavigation::new();

        let mut seen = HashSet::new();
        for i in 0..64u16 {
            let a = nav_a
                .add_link(&mut mesh_a, tri(1, i), tri(2, i), payload(1), None, &mut allocator)
                .unwrap();
            let b = nav_b
                .add_link(&mut mesh_b, tri(1, i), tri(2, i), payload(2), None, &mut allocator)
                .unwrap();
            assert!(a.is_valid() && b.is_valid());
            assert!(seen.insert(a));
            assert!(seen.insert(b));
        }
    }

    #[test]
    fn invalidation_is_idempotent() {
        let mut navigation = OffMeshNavigation::new();
        let mut mesh = IndexSpy::default();
        let mut allocator = LinkIdAllocator::new();

        navigation
            .add_link(&mut mesh, tri(1, 0), tri(2, 0), payload(7), None, &mut allocator)
            .unwrap();
        navigation
            .add_link(&mut mesh, tri(1, 1), tri(3, 0), payload(7), None, &mut allocator)
            .unwrap();

        let removed = navigation.invalidate_links(TileId::new(1));
        assert_eq!(removed.len(), 2);
        assert!(navigation.is_empty());
        assert!(navigation.get_lookups_for_triangle(tri(2, 0)).is_empty());

        let removed_again = navigation.invalidate_links(TileId::new(1));
        assert!(removed_again.is_empty());
    }

    #[test]
    fn queries_against_unknown_links_degrade_to_none() {
        let navigation = OffMeshNavigation::new();
        let stale = OffMeshLinkId::new(99);
        assert!(navigation.get_object_link_info(stale).is_none());
        assert_eq!(navigation.can_use_link(None, stale), None);
        assert!(navigation.get_links_for_triangle(tri(1, 0)).is_empty());
    }
}
