//! Off-mesh navigation link management and island connectivity
//!
//! Navigation meshes connect triangles through ordinary edge adjacency.
//! Off-mesh links layer a sparse set of special connections on top of that
//! topology: jumps, ladders, doors, and other traversals contributed by
//! gameplay objects. This crate maintains those links per mesh and answers
//! which connected components ("islands") of the mesh graph can reach each
//! other through them.
//!
//! # Features
//!
//! - **Tile Link Tables**: per-tile forward/reverse link records with
//!   contiguous per-triangle runs and an explicit capacity bound
//! - **Per-Mesh Navigation**: link creation, removal, and wholesale
//!   invalidation when a tile is regenerated
//! - **Island Connectivity**: a directed island graph with best-first
//!   reachability queries and path reconstruction
//! - **Deferred Mutation**: link additions and removals are queued and
//!   drained once per update tick
//! - **Smart Objects**: registration bookkeeping for gameplay objects that
//!   contribute links, with bulk unregistration
//!
//! # Architecture
//!
//! - [`TileLinks`]: leaf storage of link records for one tile
//! - [`OffMeshNavigation`]: per-mesh link store and triangle queries
//! - [`IslandConnections`]: directed island graph and reachability search
//! - [`OffMeshNavigationManager`]: request queue, link lifecycle, smart
//!   object registration, and listener notifications
//! - [`NavMeshApi`] / [`NavigationSystemApi`]: seams toward the navigation
//!   system that owns mesh geometry and island assignment

pub mod islands;
pub mod link;
pub mod manager;
pub mod navigation;
pub mod navmesh;
pub mod tile_links;


pub use islands::*;
pub use link::*;
pub use manager::*;
pub use navigation::*;
pub use navmesh::*;
pub use tile_links::*;
