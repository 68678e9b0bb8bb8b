//! Per-tile storage of off-mesh link records
//!
//! Each tile keeps two tables: a forward table keyed by the start triangle
//! ("which links leave this triangle") and a reverse lookup table keyed by
//! the end triangle ("which links arrive at this triangle"). Both tables
//! are kept sorted by their key triangle so the records for one triangle
//! form a contiguous run that can be walked with a restartable cursor.
//! Every forward record has exactly one reverse record with the same link
//! id; the owning navigation inserts and removes them together.

use offmesh_common::{Error, OffMeshLinkId, Result, TileId, TriangleId, MAX_TILE_LINKS};

/// A single off-mesh link record stored in a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct TriangleLink {
    /// Triangle the link leaves from
    pub start_triangle: TriangleId,
    /// Triangle the link arrives at
    pub end_triangle: TriangleId,
    /// Identifier of the off-mesh link owning this record
    pub link_id: OffMeshLinkId,
}

/// Restartable cursor over the contiguous run of records for one triangle
#[derive(Debug, Clone, Copy)]
pub struct TriangleLinkRun<'a> {
    records: &'a [TriangleLink],
    cursor: usize,
}

impl<'a> TriangleLinkRun<'a> {
    /// A cursor over no records
    pub fn empty() -> Self {
        TriangleLinkRun {
            records: &[],
            cursor: 0,
        }
    }

    fn over(records: &'a [TriangleLink]) -> Self {
        TriangleLinkRun { records, cursor: 0 }
    }

    /// Rewinds the cursor to the first record
    pub fn restart(&mut self) {
        self.cursor = 0;
    }

    /// Returns the underlying contiguous run of records
    pub fn records(&self) -> &'a [TriangleLink] {
        self.records
    }

    /// Number of records in the run
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when the run holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Iterator for TriangleLinkRun<'_> {
    type Item = TriangleLink;

    fn next(&mut self) -> Option<TriangleLink> {
        let record = self.records.get(self.cursor).copied();
        if record.is_some() {
            self.cursor += 1;
        }
        record
    }
}

/// Forward and reverse off-mesh link tables for one tile
#[derive(Debug, Clone)]
pub struct TileLinks {
    /// Records sorted by start triangle
    links: Vec<TriangleLink>,
    /// Reverse records sorted by end triangle
    lookups: Vec<TriangleLink>,
    /// Capacity bound applied to either table
    max_links: usize,
}

impl Default for TileLinks {
    fn default() -> Self {
        Self::new()
    }
}

impl TileLinks {
    /// Creates empty tables with the default capacity bound
    pub fn new() -> Self {
        Self::with_max_links(MAX_TILE_LINKS)
    }

    /// Creates empty tables with an explicit capacity bound
    pub fn with_max_links(max_links: usize) -> Self {
        TileLinks {
            links: Vec::new(),
            lookups: Vec::new(),
            max_links,
        }
    }

    /// Number of forward records in the tile
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Number of reverse records in the tile
    pub fn lookup_count(&self) -> usize {
        self.lookups.len()
    }

    /// Returns true when both tables are empty
    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.lookups.is_empty()
    }

    /// All forward records, sorted by start triangle
    pub fn all_links(&self) -> &[TriangleLink] {
        &self.links
    }

    /// Inserts a forward record, keeping records per start triangle contiguous
    ///
    /// Records for a triangle already present are extended at the end of
    /// their run; records for a new triangle open a fresh run in key order.
    pub fn insert_link(&mut self, tile: TileId, record: TriangleLink) -> Result<()> {
        if self.links.len() >= self.max_links {
            return Err(Error::TileLinkCapacity {
                tile,
                capacity: self.max_links,
            });
        }
        let at = self
            .links
            .partition_point(|existing| existing.start_triangle <= record.start_triangle);
        self.links.insert(at, record);
        Ok(())
    }

    /// Inserts a reverse record, keeping records per end triangle contiguous
    pub fn insert_lookup(&mut self, tile: TileId, record: TriangleLink) -> Result<()> {
        if self.lookups.len() >= self.max_links {
            return Err(Error::TileLinkCapacity {
                tile,
                capacity: self.max_links,
            });
        }
        let at = self
            .lookups
            .partition_point(|existing| existing.end_triangle <= record.end_triangle);
        self.lookups.insert(at, record);
        Ok(())
    }

    /// Removes every forward record carrying the link id
    ///
    /// Returns the removed record, if any. Because the table stays sorted,
    /// per-triangle start indices re-derive directly from record order.
    pub fn remove_link_records(&mut self, link_id: OffMeshLinkId) -> Option<TriangleLink> {
        let mut removed = None;
        self.links.retain(|record| {
            if record.link_id == link_id {
                removed = Some(*record);
                false
            } else {
                true
            }
        });
        removed
    }

    /// Removes every reverse record carrying the link id
    pub fn remove_lookup_records(&mut self, link_id: OffMeshLinkId) -> Option<TriangleLink> {
        let mut removed = None;
        self.lookups.retain(|record| {
            if record.link_id == link_id {
                removed = Some(*record);
                false
            } else {
                true
            }
        });
        removed
    }

    /// Cursor over the forward records starting at the triangle
    pub fn links_for_triangle(&self, triangle: TriangleId) -> TriangleLinkRun<'_> {
        let begin = self
            .links
            .partition_point(|record| record.start_triangle < triangle);
        let end = self
            .links
            .partition_point(|record| record.start_triangle <= triangle);
        TriangleLinkRun::over(&self.links[begin..end])
    }

    /// Cursor over the reverse records ending at the triangle
    pub fn lookups_for_triangle(&self, triangle: TriangleId) -> TriangleLinkRun<'_> {
        let begin = self
            .lookups
            .partition_point(|record| record.end_triangle < triangle);
        let end = self
            .lookups
            .partition_point(|record| record.end_triangle <= triangle);
        TriangleLinkRun::over(&self.lookups[begin..end])
    }

    /// Index of the first forward record for the triangle, if it has any
    pub fn first_link_index(&self, triangle: TriangleId) -> Option<u16> {
        let begin = self
            .links
            .partition_point(|record| record.start_triangle < triangle);
        match self.links.get(begin) {
            Some(record) if record.start_triangle == triangle => Some(begin as u16),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offmesh_common::MAX_TILE_LINKS;

    fn tri(tile: u32, index: u16) -> TriangleId {
        TriangleId::new(TileId::new(tile), index)
    }

    fn record(start: TriangleId, end: TriangleId, id: u32) -> TriangleLink {
        TriangleLink {
            start_triangle: start,
            end_triangle: end,
            link_id: OffMeshLinkId::new(id),
        }
    }

    #[test]
    fn records_for_one_triangle_stay_contiguous() {
        let tile = TileId::new(1);
        let mut links = TileLinks::new();

        links.insert_link(tile, record(tri(1, 0), tri(2, 0), 1)).unwrap();
        links.insert_link(tile, record(tri(1, 5), tri(2, 1), 2)).unwrap();
        links.insert_link(tile, record(tri(1, 0), tri(2, 2), 3)).unwrap();
        links.insert_link(tile, record(tri(1, 3), tri(2, 3), 4)).unwrap();

        let run: Vec<_> = links.links_for_triangle(tri(1, 0)).collect();
        assert_eq!(run.len(), 2);
        assert!(run.iter().all(|r| r.start_triangle == tri(1, 0)));

        // The new record for an existing triangle lands after the run.
        assert_eq!(run[0].link_id, OffMeshLinkId::new(1));
        assert_eq!(run[1].link_id, OffMeshLinkId::new(3));

        assert_eq!(links.first_link_index(tri(1, 0)), Some(0));
        assert_eq!(links.first_link_index(tri(1, 3)), Some(2));
        assert_eq!(links.first_link_index(tri(1, 5)), Some(3));
        assert_eq!(links.first_link_index(tri(1, 9)), None);
    }

    #[test]
    fn removal_filters_all_records_for_the_link() {
        let tile = TileId::new(1);
        let mut links = TileLinks::new();
        links.insert_link(tile, record(tri(1, 0), tri(2, 0), 1)).unwrap();
        links.insert_link(tile, record(tri(1, 1), tri(2, 1), 2)).unwrap();
        links.insert_lookup(tile, record(tri(3, 0), tri(1, 0), 1)).unwrap();
        links.insert_lookup(tile, record(tri(3, 1), tri(1, 1), 2)).unwrap();

        let removed = links.remove_link_records(OffMeshLinkId::new(1)).unwrap();
        assert_eq!(removed.start_triangle, tri(1, 0));
        assert!(links.remove_lookup_records(OffMeshLinkId::new(1)).is_some());

        assert_eq!(links.link_count(), 1);
        assert_eq!(links.lookup_count(), 1);
        assert!(links.links_for_triangle(tri(1, 0)).is_empty());
        assert_eq!(links.first_link_index(tri(1, 1)), Some(0));

        // Removing an absent link is a no-op.
        assert!(links.remove_link_records(OffMeshLinkId::new(1)).is_none());
    }

    #[test]
    fn cursor_is_restartable() {
        let tile = TileId::new(1);
        let mut links = TileLinks::new();
        links.insert_link(tile, record(tri(1, 0), tri(2, 0), 1)).unwrap();
        links.insert_link(tile, record(tri(1, 0), tri(2, 1), 2)).unwrap();

        let mut run = links.links_for_triangle(tri(1, 0));
        assert_eq!(run.next().unwrap().link_id, OffMeshLinkId::new(1));
        assert_eq!(run.next().unwrap().link_id, OffMeshLinkId::new(2));
        assert!(run.next().is_none());
        run.restart();
        assert_eq!(run.next().unwrap().link_id, OffMeshLinkId::new(1));
    }

    #[test]
    fn capacity_bound_rejects_the_overflowing_record() {
        let tile = TileId::new(1);
        let mut links = TileLinks::new();
        for i in 0..MAX_TILE_LINKS {
            links
                .insert_link(
                    tile,
                    record(tri(1, (i % MAX_TILE_LINKS) as u16), tri(2, 0), i as u32 + 1),
                )
                .unwrap();
        }
        let overflow = links.insert_link(tile, record(tri(1, 0), tri(2, 0), 4242));
        assert!(matches!(
            overflow,
            Err(Error::TileLinkCapacity { capacity, .. }) if capacity == MAX_TILE_LINKS
        ));
        assert_eq!(links.link_count(), MAX_TILE_LINKS);
    }
}
