//! Island connectivity graph and reachability search
//!
//! Islands are the connected components a navigation mesh assigns to its
//! triangles through ordinary adjacency. Off-mesh links stitch islands
//! together; this module stores those stitches as a directed graph and
//! answers whether one island can reach another through them.
//!
//! The search is best-first with a uniform cost of 1.0 per hop: it decides
//! reachability and yields a concrete chain of islands, but it does not
//! promise the shortest chain when parallel links connect the same pair of
//! islands, because only the first discovered edge into an island is kept
//! in the came-from map (no re-relaxation). Usability cost multipliers are
//! reported by the payloads but intentionally not folded into search cost.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use offmesh_common::{EntityId, GlobalIslandId, MeshId, OffMeshLinkId};

/// Directed edge between two islands, tied back to its off-mesh link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct IslandLink {
    /// Island the edge leads to
    pub to_island: GlobalIslandId,
    /// Off-mesh link providing the traversal
    pub link_id: OffMeshLinkId,
    /// Object whose link created the connection
    pub object_id: EntityId,
}

/// Per-edge traversal filter applied live during the search
///
/// Lets a blocked or requester-incompatible link edge be skipped without
/// removing it from the graph.
pub trait LinkTraversalFilter {
    /// Returns true when the requester may traverse the given link
    fn can_use_link(&self, requester: Option<EntityId>, link_id: OffMeshLinkId) -> bool;
}

/// Filter that accepts every link edge
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllLinks;

impl LinkTraversalFilter for AcceptAllLinks {
    fn can_use_link(&self, _requester: Option<EntityId>, _link_id: OffMeshLinkId) -> bool {
        true
    }
}

/// Open-list entry ordered so the heap pops the lowest accumulated cost
#[derive(Debug, Clone, Copy)]
struct OpenNode {
    cost: f32,
    island: GlobalIslandId,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so BinaryHeap behaves as a min-heap on cost.
        other.cost.total_cmp(&self.cost)
    }
}

/// Directed adjacency map from island to island
///
/// The key set is kept exactly the set of islands with at least one
/// outgoing edge: emptied adjacency lists are pruned from the map.
#[derive(Debug, Default)]
pub struct IslandConnections {
    connections: HashMap<GlobalIslandId, Vec<IslandLink>>,
}

impl IslandConnections {
    /// Creates an empty graph
    pub fn new() -> Self {
        IslandConnections {
            connections: HashMap::new(),
        }
    }

    /// Number of islands with at least one outgoing edge
    pub fn island_count(&self) -> usize {
        self.connections.len()
    }

    /// Outgoing edges of an island
    pub fn edges(&self, island: GlobalIslandId) -> &[IslandLink] {
        self.connections
            .get(&island)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Adds a one-way edge, ignoring exact duplicates
    pub fn set_one_way_connection(&mut self, from_island: GlobalIslandId, link: IslandLink) {
        let edges = self.connections.entry(from_island).or_default();
        if !edges.contains(&link) {
            edges.push(link);
        }
    }

    /// Removes a one-way edge by value, pruning the island when emptied
    pub fn remove_one_way_connection(&mut self, from_island: GlobalIslandId, link: IslandLink) {
        if let Some(edges) = self.connections.get_mut(&from_island) {
            edges.retain(|edge| *edge != link);
            if edges.is_empty() {
                self.connections.remove(&from_island);
            }
        }
    }

    /// Strips every edge the object contributed from the mesh's islands
    pub fn remove_all_connections_for_object(&mut self, mesh: MeshId, object: EntityId) {
        self.connections.retain(|from_island, edges| {
            if from_island.mesh_id() == mesh {
                edges.retain(|edge| edge.object_id != object);
            }
            !edges.is_empty()
        });
    }

    /// Strips every edge the off-mesh link provides, pruning emptied islands
    pub fn remove_all_connections_for_link(&mut self, link: OffMeshLinkId) {
        self.connections.retain(|_, edges| {
            edges.retain(|edge| edge.link_id != link);
            !edges.is_empty()
        });
    }

    /// Clears the entire graph
    pub fn reset(&mut self) {
        self.connections.clear();
    }

    /// Best-first reachability search between two islands
    ///
    /// Fills `out_way` with the chain of islands from `from_island` to
    /// `to_island` when a path exists. Returns true immediately with an
    /// empty way when the islands are equal; returns false with an empty
    /// way when either id is invalid or no path exists.
    pub fn can_navigate_between_islands(
        &self,
        requester: Option<EntityId>,
        from_island: GlobalIslandId,
        to_island: GlobalIslandId,
        filter: &dyn LinkTraversalFilter,
        out_way: &mut Vec<GlobalIslandId>,
    ) -> bool {
        out_way.clear();
        if !from_island.is_valid() || !to_island.is_valid() {
            return false;
        }
        if from_island == to_island {
            return true;
        }

        let mut open = BinaryHeap::new();
        let mut closed: HashSet<GlobalIslandId> = HashSet::new();
        let mut came_from: HashMap<GlobalIslandId, GlobalIslandId> = HashMap::new();
        open.push(OpenNode {
            cost: 0.0,
            island: from_island,
        });

        while let Some(OpenNode { cost, island }) = open.pop() {
            if island == to_island {
                reconstruct_way(&came_from, from_island, to_island, out_way);
                return true;
            }
            if !closed.insert(island) {
                continue;
            }
            let Some(edges) = self.connections.get(&island) else {
                continue;
            };
            for edge in edges {
                // First discovered edge into an island wins; later parallel
                // or longer discoveries are not re-relaxed.
                if edge.to_island == from_island
                    || closed.contains(&edge.to_island)
                    || came_from.contains_key(&edge.to_island)
                {
                    continue;
                }
                if !filter.can_use_link(requester, edge.link_id) {
                    continue;
                }
                came_from.insert(edge.to_island, island);
                open.push(OpenNode {
                    cost: cost + 1.0,
                    island: edge.to_island,
                });
            }
        }
        false
    }
}

fn reconstruct_way(
    came_from: &HashMap<GlobalIslandId, GlobalIslandId>,
    from_island: GlobalIslandId,
    to_island: GlobalIslandId,
    out_way: &mut Vec<GlobalIslandId>,
) {
    let mut current = to_island;
    out_way.push(current);
    while current != from_island {
        match came_from.get(&current) {
            Some(previous) => current = *previous,
            None => break,
        }
        out_way.push(current);
    }
    out_way.reverse();
}

/// Owner of the island graph exposed to movement and debug consumers
#[derive(Debug, Default)]
pub struct IslandConnectionsManager {
    connections: IslandConnections,
}

impl IslandConnectionsManager {
    /// Creates a manager with an empty graph
    pub fn new() -> Self {
        IslandConnectionsManager {
            connections: IslandConnections::new(),
        }
    }

    /// The underlying graph
    pub fn connections(&self) -> &IslandConnections {
        &self.connections
    }

    /// The underlying graph, mutable
    pub fn connections_mut(&mut self) -> &mut IslandConnections {
        &mut self.connections
    }

    /// Clears the graph (navigation system full reset)
    pub fn reset(&mut self) {
        self.connections.reset();
    }

    /// Filtered reachability query, see [`IslandConnections::can_navigate_between_islands`]
    pub fn can_navigate_between_islands(
        &self,
        requester: Option<EntityId>,
        from_island: GlobalIslandId,
        to_island: GlobalIslandId,
        filter: &dyn LinkTraversalFilter,
        out_way: &mut Vec<GlobalIslandId>,
    ) -> bool {
        self.connections
            .can_navigate_between_islands(requester, from_island, to_island, filter, out_way)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offmesh_common::{MeshId, StaticIslandId};

    fn island(mesh: u32, id: u32) -> GlobalIslandId {
        GlobalIslandId::new(MeshId::new(mesh), StaticIslandId::new(id))
    }

    fn edge(to: GlobalIslandId, link: u32, object: u32) -> IslandLink {
        IslandLink {
            to_island: to,
            link_id: OffMeshLinkId::new(link),
            object_id: EntityId::new(object),
        }
    }

    #[test]
    fn duplicate_edges_are_ignored_and_removal_prunes() {
        let mut graph = IslandConnections::new();
        let from = island(1, 1);
        let link = edge(island(1, 2), 10, 100);

        graph.set_one_way_connection(from, link);
        graph.set_one_way_connection(from, link);
        assert_eq!(graph.edges(from).len(), 1);

        graph.remove_one_way_connection(from, link);
        assert_eq!(graph.island_count(), 0);
    }

    #[test]
    fn reachability_is_reflexive_with_an_empty_way() {
        let graph = IslandConnections::new();
        let mut way = vec![island(9, 9)];
        assert!(graph.can_navigate_between_islands(
            None,
            island(1, 1),
            island(1, 1),
            &AcceptAllLinks,
            &mut way
        ));
        assert!(way.is_empty());
    }

    #[test]
    fn invalid_islands_are_never_navigable() {
        let graph = IslandConnections::new();
        let mut way = Vec::new();
        assert!(!graph.can_navigate_between_islands(
            None,
            GlobalIslandId::INVALID,
            island(1, 1),
            &AcceptAllLinks,
            &mut way
        ));
        assert!(!graph.can_navigate_between_islands(
            None,
            island(1, 1),
            GlobalIslandId::INVALID,
            &AcceptAllLinks,
            &mut way
        ));
        assert!(way.is_empty());
    }

    #[test]
    fn search_finds_a_two_hop_way() {
        let mut graph = IslandConnections::new();
        graph.set_one_way_connection(island(1, 1), edge(island(1, 2), 10, 100));
        graph.set_one_way_connection(island(1, 2), edge(island(1, 3), 11, 100));

        let mut way = Vec::new();
        assert!(graph.can_navigate_between_islands(
            None,
            island(1, 1),
            island(1, 3),
            &AcceptAllLinks,
            &mut way
        ));
        assert_eq!(way, vec![island(1, 1), island(1, 2), island(1, 3)]);

        // The graph is directed: the reverse query fails.
        assert!(!graph.can_navigate_between_islands(
            None,
            island(1, 3),
            island(1, 1),
            &AcceptAllLinks,
            &mut way
        ));
        assert!(way.is_empty());
    }

    #[test]
    fn removing_an_objects_edges_only_breaks_its_own_paths() {
        let mut graph = IslandConnections::new();
        // Object 100 connects 1 -> 2; object 200 connects 1 -> 3.
        graph.set_one_way_connection(island(1, 1), edge(island(1, 2), 10, 100));
        graph.set_one_way_connection(island(1, 1), edge(island(1, 3), 11, 200));

        graph.remove_all_connections_for_object(MeshId::new(1), EntityId::new(100));

        let mut way = Vec::new();
        assert!(!graph.can_navigate_between_islands(
            None,
            island(1, 1),
            island(1, 2),
            &AcceptAllLinks,
            &mut way
        ));
        assert!(graph.can_navigate_between_islands(
            None,
            island(1, 1),
            island(1, 3),
            &AcceptAllLinks,
            &mut way
        ));
        assert_eq!(way, vec![island(1, 1), island(1, 3)]);
    }

    #[test]
    fn link_removal_strips_its_edges_everywhere() {
        let mut graph = IslandConnections::new();
        // Link 10 provides edges in two meshes; link 11 shares an island.
        graph.set_one_way_connection(island(1, 1), edge(island(1, 2), 10, 100));
        graph.set_one_way_connection(island(2, 1), edge(island(2, 2), 10, 100));
        graph.set_one_way_connection(island(1, 1), edge(island(1, 3), 11, 100));

        graph.remove_all_connections_for_link(OffMeshLinkId::new(10));

        assert_eq!(graph.island_count(), 1);
        assert_eq!(graph.edges(island(1, 1)).len(), 1);
        assert_eq!(graph.edges(island(1, 1))[0].link_id, OffMeshLinkId::new(11));
        assert!(graph.edges(island(2, 1)).is_empty());
    }

    #[test]
    fn object_removal_is_scoped_to_the_mesh() {
        let mut graph = IslandConnections::new();
        graph.set_one_way_connection(island(1, 1), edge(island(1, 2), 10, 100));
        graph.set_one_way_connection(island(2, 1), edge(island(2, 2), 11, 100));

        graph.remove_all_connections_for_object(MeshId::new(1), EntityId::new(100));

        let mut way = Vec::new();
        assert!(graph.can_navigate_between_islands(
            None,
            island(2, 1),
            island(2, 2),
            &AcceptAllLinks,
            &mut way
        ));
    }

    #[test]
    fn filter_skips_edges_without_removing_them() {
        struct BlockLink(OffMeshLinkId);
        impl LinkTraversalFilter for BlockLink {
            fn can_use_link(&self, _requester: Option<EntityId>, link: OffMeshLinkId) -> bool {
                link != self.0
            }
        }

        let mut graph = IslandConnections::new();
        graph.set_one_way_connection(island(1, 1), edge(island(1, 2), 10, 100));

        let mut way = Vec::new();
        assert!(!graph.can_navigate_between_islands(
            Some(EntityId::new(5)),
            island(1, 1),
            island(1, 2),
            &BlockLink(OffMeshLinkId::new(10)),
            &mut way
        ));
        // The edge is still in the graph and passes an open filter.
        assert!(graph.can_navigate_between_islands(
            Some(EntityId::new(5)),
            island(1, 1),
            island(1, 2),
            &AcceptAllLinks,
            &mut way
        ));
    }

    #[test]
    fn cycles_do_not_hang_the_search() {
        let mut graph = IslandConnections::new();
        graph.set_one_way_connection(island(1, 1), edge(island(1, 2), 10, 100));
        graph.set_one_way_connection(island(1, 2), edge(island(1, 1), 11, 100));
        graph.set_one_way_connection(island(1, 2), edge(island(1, 3), 12, 100));

        let mut way = Vec::new();
        assert!(graph.can_navigate_between_islands(
            None,
            island(1, 1),
            island(1, 3),
            &AcceptAllLinks,
            &mut way
        ));
        assert_eq!(way, vec![island(1, 1), island(1, 2), island(1, 3)]);
    }

    #[test]
    fn reset_clears_every_edge() {
        let mut graph = IslandConnections::new();
        graph.set_one_way_connection(island(1, 1), edge(island(1, 2), 10, 100));
        graph.reset();
        assert_eq!(graph.island_count(), 0);
    }
}
