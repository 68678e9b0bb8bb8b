//! Off-mesh link lifecycle management
//!
//! The manager owns one [`OffMeshNavigation`] per mesh, a global index of
//! committed links, and the island connectivity graph. All structural
//! changes arrive as queued requests and are applied only inside
//! [`OffMeshNavigationManager::process_queued_requests`], called once per
//! navigation-system update tick; queries read the last-committed state.
//! The model is single-threaded and cooperative: there is no locking, and
//! queries must not interleave with the drain itself.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use offmesh_common::{
    AgentTypeId, EntityId, GlobalIslandId, LinkIdAllocator, MeshId, OffMeshLinkId, TileId,
    TriangleId, Vec3,
};

use crate::islands::{IslandConnectionsManager, IslandLink, LinkTraversalFilter};
use crate::link::{OffMeshLink, SmartObjectLink};
use crate::navigation::OffMeshNavigation;
use crate::navmesh::{NavMeshApi, NavigationSystemApi};

/// Callback invoked with the link id once a queued addition commits
pub type LinkAdditionCallback = Box<dyn FnOnce(OffMeshLinkId)>;

/// Manager-level index entry for one committed link
///
/// Routes removal and refresh requests back to the correct mesh and tile
/// without re-deriving them, and caches the payload so a link can be
/// re-added after its tile is regenerated.
#[derive(Debug, Clone)]
pub struct LinkInfo {
    /// Mesh the link lives in
    pub mesh_id: MeshId,
    /// Triangle the link starts from
    pub start_triangle: TriangleId,
    /// Identifier of the link
    pub link_id: OffMeshLinkId,
    /// Cached payload, shared with the per-mesh navigation
    pub link: Arc<dyn OffMeshLink>,
}

/// Deferred request to add a custom off-mesh link
pub struct LinkAdditionRequest {
    /// Id the link will commit under (assigned at queue time when invalid)
    pub link_id: OffMeshLinkId,
    /// Mesh the link belongs to
    pub mesh_id: MeshId,
    /// World position of the start endpoint
    pub start: Vec3,
    /// World position of the end endpoint
    pub end: Vec3,
    /// Payload committed on success
    pub link: Arc<dyn OffMeshLink>,
    /// Shorten endpoints that overshoot the mesh to the nearest boundary
    /// point along the line from the link midpoint
    pub trim_excess: bool,
    /// True when this re-adds cached data after a tile regeneration; only
    /// the cached start triangle is refreshed, no new index entry is made
    pub data_exists: bool,
    /// Invoked once the addition commits; never invoked on failure
    pub callback: Option<LinkAdditionCallback>,
}

impl LinkAdditionRequest {
    /// Creates a plain addition request for the given mesh and endpoints
    pub fn new(mesh_id: MeshId, start: Vec3, end: Vec3, link: Arc<dyn OffMeshLink>) -> Self {
        LinkAdditionRequest {
            link_id: OffMeshLinkId::INVALID,
            mesh_id,
            start,
            end,
            link,
            trim_excess: false,
            data_exists: false,
            callback: None,
        }
    }

    /// Enables boundary trimming for endpoints that overshoot the mesh
    pub fn with_trim_excess(mut self) -> Self {
        self.trim_excess = true;
        self
    }

    /// Attaches a completion callback
    pub fn with_callback(mut self, callback: LinkAdditionCallback) -> Self {
        self.callback = Some(callback);
        self
    }
}

enum QueuedRequest {
    Add(LinkAdditionRequest),
    Remove { link_id: OffMeshLinkId },
}

/// Observer of link lifecycle events
pub trait OffMeshLinkListener {
    /// Called while the link is still committed, before it is torn down
    fn on_off_mesh_link_going_to_be_removed(
        &mut self,
        link_id: OffMeshLinkId,
        mesh_id: MeshId,
        start_triangle: TriangleId,
    );
}

/// Handle identifying a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u32);

/// One navigable traversal contributed by a smart object
#[derive(Debug, Clone)]
pub struct SmartObjectTraversal {
    /// World position of the start helper
    pub start: Vec3,
    /// World position of the end helper
    pub end: Vec3,
    /// Traversal cost multiplier for the resulting link
    pub cost_multiplier: f32,
}

/// Registration data for a smart object contributing off-mesh links
#[derive(Debug, Clone)]
pub struct SmartObjectDescriptor {
    /// Entity owning the smart object
    pub entity_id: EntityId,
    /// Hash of the smart-object class name
    pub class_hash: u32,
    /// Agent types the object's user class is compatible with
    pub user_agent_types: Vec<AgentTypeId>,
    /// Helper point pairs that become links
    pub traversals: Vec<SmartObjectTraversal>,
}

struct ObjectRegistration {
    descriptor: SmartObjectDescriptor,
    link_ids: Vec<OffMeshLinkId>,
}

/// Filter backed by the manager's committed link payloads
///
/// Applied only when a requester is supplied: anonymous reachability
/// queries see every edge.
struct CommittedLinkFilter<'a> {
    links: &'a HashMap<OffMeshLinkId, LinkInfo>,
}

impl LinkTraversalFilter for CommittedLinkFilter<'_> {
    fn can_use_link(&self, requester: Option<EntityId>, link_id: OffMeshLinkId) -> bool {
        if requester.is_none() {
            return true;
        }
        self.links
            .get(&link_id)
            .and_then(|info| info.link.can_use(requester))
            .is_some()
    }
}

/// Owner of per-mesh off-mesh navigations, the request queue, and the
/// island connectivity graph
pub struct OffMeshNavigationManager {
    navigations: HashMap<MeshId, OffMeshNavigation>,
    links: HashMap<OffMeshLinkId, LinkInfo>,
    queue: VecDeque<QueuedRequest>,
    listeners: Vec<(ListenerId, Box<dyn OffMeshLinkListener>)>,
    registrations: HashMap<EntityId, HashMap<u32, ObjectRegistration>>,
    island_connections: IslandConnectionsManager,
    allocator: LinkIdAllocator,
    /// Returned for unknown mesh ids so callers never handle a null mesh
    empty_navigation: OffMeshNavigation,
    next_listener_id: u32,
    object_registration_enabled: bool,
}

impl Default for OffMeshNavigationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl OffMeshNavigationManager {
    /// Creates an empty manager; registration stays disabled until
    /// [`on_navigation_loaded_complete`](Self::on_navigation_loaded_complete)
    pub fn new() -> Self {
        OffMeshNavigationManager {
            navigations: HashMap::new(),
            links: HashMap::new(),
            queue: VecDeque::new(),
            listeners: Vec::new(),
            registrations: HashMap::new(),
            island_connections: IslandConnectionsManager::new(),
            allocator: LinkIdAllocator::new(),
            empty_navigation: OffMeshNavigation::new(),
            next_listener_id: 1,
            object_registration_enabled: false,
        }
    }

    /// The island connectivity graph owner
    pub fn island_connections(&self) -> &IslandConnectionsManager {
        &self.island_connections
    }

    /// The island connectivity graph owner, mutable
    pub fn island_connections_mut(&mut self) -> &mut IslandConnectionsManager {
        &mut self.island_connections
    }

    /// Number of requests waiting for the next drain
    pub fn queued_request_count(&self) -> usize {
        self.queue.len()
    }

    /// Queues a link addition, assigning the link id up front
    ///
    /// The id is returned immediately so callers can reference the link
    /// before the next drain commits it.
    pub fn queue_custom_link_addition(&mut self, mut request: LinkAdditionRequest) -> OffMeshLinkId {
        if !request.link_id.is_valid() {
            request.link_id = self.allocator.allocate();
        }
        let link_id = request.link_id;
        self.queue.push_back(QueuedRequest::Add(request));
        link_id
    }

    /// Queues a link removal
    pub fn queue_custom_link_removal(&mut self, link_id: OffMeshLinkId) {
        self.queue.push_back(QueuedRequest::Remove { link_id });
    }

    /// Drops every queued addition whose payload belongs to the entity
    ///
    /// A queued removal never cancels a queued addition implicitly; this
    /// sweep is the explicit way to retract not-yet-committed additions.
    pub fn remove_all_queued_addition_requests_for_entity(&mut self, entity: EntityId) {
        self.queue.retain(|request| match request {
            QueuedRequest::Add(add) => add.link.entity_id() != entity,
            QueuedRequest::Remove { .. } => true,
        });
    }

    /// Drains the request queue, applying each request in queue order
    ///
    /// Called once per navigation-system update. Draining once yields the
    /// same end state as applying each request immediately in order.
    pub fn process_queued_requests(&mut self, nav: &mut dyn NavigationSystemApi) {
        while let Some(request) = self.queue.pop_front() {
            match request {
                QueuedRequest::Add(request) => {
                    self.add_custom_link(nav, request);
                }
                QueuedRequest::Remove { link_id } => self.remove_custom_link(nav, link_id),
            }
        }
    }

    /// Commits one addition request
    ///
    /// Resolves both endpoints to triangles (trimming overshooting
    /// endpoints to the mesh boundary when requested), rejects degenerate
    /// same-triangle links, commits the link, records the index entry,
    /// and adds the island edge between the endpoint islands. Failures
    /// are silent beyond a log entry; the completion callback only fires
    /// on success.
    fn add_custom_link(
        &mut self,
        nav: &mut dyn NavigationSystemApi,
        request: LinkAdditionRequest,
    ) -> bool {
        let LinkAdditionRequest {
            link_id,
            mesh_id,
            start,
            end,
            link,
            trim_excess,
            data_exists,
            callback,
        } = request;

        let Some(mesh) = nav.mesh_mut(mesh_id) else {
            log::warn!(
                "off-mesh link {:?} targets unknown mesh {:?}",
                link_id,
                mesh_id
            );
            return false;
        };

        let midpoint = (start + end) * 0.5;
        let Some(start_triangle) = resolve_endpoint(&*mesh, midpoint, start, trim_excess) else {
            log::debug!("off-mesh link {:?}: start endpoint is off the mesh", link_id);
            return false;
        };
        let Some(end_triangle) = resolve_endpoint(&*mesh, midpoint, end, trim_excess) else {
            log::debug!("off-mesh link {:?}: end endpoint is off the mesh", link_id);
            return false;
        };
        if start_triangle == end_triangle {
            log::debug!(
                "off-mesh link {:?}: degenerate, both endpoints resolve to {:?}",
                link_id,
                start_triangle
            );
            return false;
        }

        let Some(navigation) = self.navigations.get_mut(&mesh_id) else {
            log::warn!("no off-mesh navigation exists for mesh {:?}", mesh_id);
            return false;
        };
        if let Err(err) = navigation.add_link(
            mesh,
            start_triangle,
            end_triangle,
            link.clone(),
            Some(link_id),
            &mut self.allocator,
        ) {
            log::warn!("off-mesh link {:?} could not be committed: {}", link_id, err);
            return false;
        }

        if data_exists {
            // Refresh of cached data: geometry re-resolves against the new
            // tile, object identity is preserved.
            if let Some(info) = self.links.get_mut(&link_id) {
                info.start_triangle = start_triangle;
            }
        } else {
            self.links.insert(
                link_id,
                LinkInfo {
                    mesh_id,
                    start_triangle,
                    link_id,
                    link: link.clone(),
                },
            );
        }

        let from = GlobalIslandId::new(mesh_id, mesh.island_for_triangle(start_triangle));
        let to = GlobalIslandId::new(mesh_id, mesh.island_for_triangle(end_triangle));
        if from.is_valid() && to.is_valid() && from != to {
            self.island_connections.connections_mut().set_one_way_connection(
                from,
                IslandLink {
                    to_island: to,
                    link_id,
                    object_id: link.entity_id(),
                },
            );
        }

        if let Some(callback) = callback {
            callback(link_id);
        }
        true
    }

    /// Commits one removal request
    ///
    /// Listeners are notified before any state is torn down, then the
    /// object's island edges are stripped and the link is deleted from the
    /// per-mesh navigation and the global index.
    fn remove_custom_link(&mut self, nav: &mut dyn NavigationSystemApi, link_id: OffMeshLinkId) {
        let Some(info) = self.links.get(&link_id) else {
            return;
        };
        let mesh_id = info.mesh_id;
        let start_triangle = info.start_triangle;
        let object_id = info.link.entity_id();

        for (_, listener) in self.listeners.iter_mut() {
            listener.on_off_mesh_link_going_to_be_removed(link_id, mesh_id, start_triangle);
        }

        self.island_connections
            .connections_mut()
            .remove_all_connections_for_object(mesh_id, object_id);

        if let (Some(navigation), Some(mesh)) =
            (self.navigations.get_mut(&mesh_id), nav.mesh_mut(mesh_id))
        {
            navigation.remove_link(mesh, start_triangle, link_id);
        }
        self.links.remove(&link_id);
    }

    /// Off-mesh navigation for the mesh
    ///
    /// An unknown mesh id logs a warning and yields a shared empty
    /// navigation so callers can run queries without null checks.
    pub fn get_off_mesh_navigation(&self, mesh_id: MeshId) -> &OffMeshNavigation {
        match self.navigations.get(&mesh_id) {
            Some(navigation) => navigation,
            None => {
                log::warn!(
                    "off-mesh navigation requested for unknown mesh {:?}",
                    mesh_id
                );
                &self.empty_navigation
            }
        }
    }

    /// Off-mesh navigation for the mesh, mutable
    pub fn get_off_mesh_navigation_mut(
        &mut self,
        mesh_id: MeshId,
    ) -> Option<&mut OffMeshNavigation> {
        self.navigations.get_mut(&mesh_id)
    }

    /// Committed payload for the link, if any
    pub fn get_off_mesh_link(&self, link_id: OffMeshLinkId) -> Option<&Arc<dyn OffMeshLink>> {
        self.links.get(&link_id).map(|info| &info.link)
    }

    /// Manager-level index entry for the link, if committed
    pub fn link_info(&self, link_id: OffMeshLinkId) -> Option<&LinkInfo> {
        self.links.get(&link_id)
    }

    /// Delegates to the committed payload's usability predicate
    pub fn can_use_link(&self, requester: Option<EntityId>, link_id: OffMeshLinkId) -> Option<f32> {
        self.links
            .get(&link_id)
            .and_then(|info| info.link.can_use(requester))
    }

    /// Island reachability filtered through the committed link payloads
    pub fn can_navigate_between_islands(
        &self,
        requester: Option<EntityId>,
        from_island: GlobalIslandId,
        to_island: GlobalIslandId,
        out_way: &mut Vec<GlobalIslandId>,
    ) -> bool {
        let filter = CommittedLinkFilter { links: &self.links };
        self.island_connections
            .can_navigate_between_islands(requester, from_island, to_island, &filter, out_way)
    }

    /// Registers a lifecycle listener
    pub fn register_listener(&mut self, listener: Box<dyn OffMeshLinkListener>) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Removes a lifecycle listener, returning it when it was registered
    pub fn unregister_listener(&mut self, id: ListenerId) -> Option<Box<dyn OffMeshLinkListener>> {
        let at = self.listeners.iter().position(|(key, _)| *key == id)?;
        Some(self.listeners.remove(at).1)
    }

    /// True when the entity has registered links against any mesh
    pub fn is_object_linked_with_navigation_mesh(&self, entity: EntityId) -> bool {
        self.registrations
            .get(&entity)
            .is_some_and(|classes| classes.values().any(|r| !r.link_ids.is_empty()))
    }

    /// Registers a smart object, queuing links for every compatible agent type
    ///
    /// For each agent type the object's user class supports, every helper
    /// point must resolve to the same target mesh; an agent type whose
    /// helpers span meshes is silently abandoned without partial
    /// application. While registration is disabled (before navigation
    /// finishes loading) the descriptor is recorded with no links so a
    /// later tile refresh can re-attempt it.
    pub fn register_smart_object(
        &mut self,
        nav: &dyn NavigationSystemApi,
        descriptor: SmartObjectDescriptor,
    ) {
        let entity = descriptor.entity_id;
        let class = descriptor.class_hash;

        let link_ids = if self.object_registration_enabled {
            self.queue_links_for_registration(nav, &descriptor)
        } else {
            Vec::new()
        };

        let registration = ObjectRegistration {
            descriptor,
            link_ids,
        };
        if let Some(previous) = self
            .registrations
            .entry(entity)
            .or_default()
            .insert(class, registration)
        {
            // Re-registration supersedes the previous links.
            for link_id in previous.link_ids {
                self.queue_custom_link_removal(link_id);
            }
        }
    }

    /// Unregisters a smart-object class, retracting queued and committed links
    pub fn unregister_smart_object(&mut self, entity: EntityId, class_hash: u32) {
        let Some(classes) = self.registrations.get_mut(&entity) else {
            return;
        };
        let Some(registration) = classes.remove(&class_hash) else {
            return;
        };
        if classes.is_empty() {
            self.registrations.remove(&entity);
        }

        self.remove_all_queued_addition_requests_for_entity(entity);
        for link_id in registration.link_ids {
            if self.links.contains_key(&link_id) {
                self.queue_custom_link_removal(link_id);
            }
        }
    }

    fn queue_links_for_registration(
        &mut self,
        nav: &dyn NavigationSystemApi,
        descriptor: &SmartObjectDescriptor,
    ) -> Vec<OffMeshLinkId> {
        let mut link_ids = Vec::new();
        for agent_type in nav.agent_types() {
            if !descriptor.user_agent_types.contains(&agent_type) {
                continue;
            }

            // Every helper point must land on one mesh for this agent type.
            let mut target_mesh: Option<MeshId> = None;
            let mut consistent = true;
            'traversals: for traversal in &descriptor.traversals {
                for position in [traversal.start, traversal.end] {
                    match nav.enclosing_mesh(agent_type, position) {
                        Some(mesh_id) => match target_mesh {
                            None => target_mesh = Some(mesh_id),
                            Some(previous) if previous != mesh_id => {
                                consistent = false;
                                break 'traversals;
                            }
                            Some(_) => {}
                        },
                        None => {
                            consistent = false;
                            break 'traversals;
                        }
                    }
                }
            }
            let Some(mesh_id) = target_mesh else {
                continue;
            };
            if !consistent {
                log::debug!(
                    "smart object {:?} class {:#x}: helpers span meshes for agent type {:?}, skipped",
                    descriptor.entity_id,
                    descriptor.class_hash,
                    agent_type
                );
                continue;
            }

            for traversal in &descriptor.traversals {
                let link: Arc<dyn OffMeshLink> = Arc::new(
                    SmartObjectLink::new(
                        descriptor.entity_id,
                        descriptor.class_hash,
                        traversal.start,
                        traversal.end,
                    )
                    .with_cost_multiplier(traversal.cost_multiplier),
                );
                let link_id = self.queue_custom_link_addition(LinkAdditionRequest::new(
                    mesh_id,
                    traversal.start,
                    traversal.end,
                    link,
                ));
                link_ids.push(link_id);
            }
        }
        link_ids
    }

    /// Creates the off-mesh navigation for a freshly created mesh
    pub fn on_navigation_mesh_created(&mut self, mesh_id: MeshId) {
        log::debug!("off-mesh navigation created for mesh {:?}", mesh_id);
        self.navigations.insert(mesh_id, OffMeshNavigation::new());
    }

    /// Tears down everything associated with a destroyed mesh
    ///
    /// Drops the per-mesh navigation, pending requests against the mesh,
    /// committed links and their island edges, and clears the affected ids
    /// from registration bookkeeping so a later refresh can re-attempt.
    pub fn on_navigation_mesh_destroyed(&mut self, mesh_id: MeshId) {
        self.navigations.remove(&mesh_id);

        // Ids are allocated at queue time, so an addition still queued for
        // another mesh is live bookkeeping even though it has no LinkInfo
        // yet. Prune exactly the ids this mesh takes down with it.
        let mut dropped: HashSet<OffMeshLinkId> = HashSet::new();
        self.queue.retain(|request| match request {
            QueuedRequest::Add(add) if add.mesh_id == mesh_id => {
                dropped.insert(add.link_id);
                false
            }
            _ => true,
        });

        let doomed: Vec<(OffMeshLinkId, EntityId)> = self
            .links
            .values()
            .filter(|info| info.mesh_id == mesh_id)
            .map(|info| (info.link_id, info.link.entity_id()))
            .collect();
        for (link_id, object_id) in doomed {
            self.island_connections
                .connections_mut()
                .remove_all_connections_for_object(mesh_id, object_id);
            self.links.remove(&link_id);
            dropped.insert(link_id);
        }

        for classes in self.registrations.values_mut() {
            for registration in classes.values_mut() {
                registration.link_ids.retain(|id| !dropped.contains(id));
            }
        }
    }

    /// Rebuilds link state for a regenerated tile
    ///
    /// Discards the tile's link topology, re-queues an addition for every
    /// cached link belonging to that mesh and tile (geometry re-resolves
    /// against the new tile, object identity is preserved), and re-attempts
    /// registration for smart-object classes that produced no links so far.
    pub fn refresh_connections(
        &mut self,
        nav: &dyn NavigationSystemApi,
        mesh_id: MeshId,
        tile_id: TileId,
    ) {
        if let Some(navigation) = self.navigations.get_mut(&mesh_id) {
            // The re-queued addition re-adds the edge against the fresh
            // island assignment; a link that fails to resolve against the
            // regenerated tile must not leave a stale edge behind.
            for link_id in navigation.invalidate_links(tile_id) {
                self.island_connections
                    .connections_mut()
                    .remove_all_connections_for_link(link_id);
            }
        }

        let cached: Vec<(OffMeshLinkId, Arc<dyn OffMeshLink>)> = self
            .links
            .values()
            .filter(|info| info.mesh_id == mesh_id && info.start_triangle.tile_id() == tile_id)
            .map(|info| (info.link_id, info.link.clone()))
            .collect();
        for (link_id, link) in cached {
            let start = link.start();
            let end = link.end();
            self.queue.push_back(QueuedRequest::Add(LinkAdditionRequest {
                link_id,
                mesh_id,
                start,
                end,
                link,
                trim_excess: false,
                data_exists: true,
                callback: None,
            }));
        }

        if self.object_registration_enabled {
            let pending: Vec<SmartObjectDescriptor> = self
                .registrations
                .values()
                .flat_map(|classes| classes.values())
                .filter(|registration| registration.link_ids.is_empty())
                .map(|registration| registration.descriptor.clone())
                .collect();
            for descriptor in pending {
                let entity = descriptor.entity_id;
                let class = descriptor.class_hash;
                let link_ids = self.queue_links_for_registration(nav, &descriptor);
                if link_ids.is_empty() {
                    continue;
                }
                if let Some(registration) = self
                    .registrations
                    .get_mut(&entity)
                    .and_then(|classes| classes.get_mut(&class))
                {
                    registration.link_ids = link_ids;
                }
            }
        }
    }

    /// Enables smart-object registration once navigation data is loaded
    ///
    /// Off-mesh links are never serialized with the mesh; they are rebuilt
    /// through registration and queued additions after load.
    pub fn on_navigation_loaded_complete(&mut self) {
        self.object_registration_enabled = true;
    }

    /// True when smart-object registration is currently enabled
    pub fn is_object_registration_enabled(&self) -> bool {
        self.object_registration_enabled
    }

    /// Full reset: drops all links, queues, registrations, and island edges
    pub fn clear(&mut self) {
        self.navigations.clear();
        self.links.clear();
        self.queue.clear();
        self.registrations.clear();
        self.island_connections.reset();
        self.object_registration_enabled = false;
    }
}

/// Resolves a link endpoint to a triangle
///
/// Exact containment wins; with `trim_excess` an off-mesh endpoint is
/// shortened to the closest boundary point along the line from the link
/// midpoint toward the endpoint.
fn resolve_endpoint(
    mesh: &dyn NavMeshApi,
    midpoint: Vec3,
    endpoint: Vec3,
    trim_excess: bool,
) -> Option<TriangleId> {
    if let Some(triangle) = mesh.triangle_at(endpoint) {
        return Some(triangle);
    }
    if trim_excess {
        return mesh
            .closest_boundary_point(midpoint, endpoint)
            .map(|(triangle, _)| triangle);
    }
    None
}
