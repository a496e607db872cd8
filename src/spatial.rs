//! Nearest-neighbor lookup over the radar grid under the great-circle metric.
//!
//! Cells are embedded on the unit sphere and indexed in an R-tree; Euclidean
//! chord distance is monotone in great-circle distance, so the nearest cell
//! by chord is exactly the nearest by haversine. Queries are batch-oriented:
//! one call covers a whole track.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

#[derive(Debug, Clone, Copy)]
struct GridCell {
    position: [f64; 3],
    index: usize,
}

impl RTreeObject for GridCell {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for GridCell {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        let dz = self.position[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

pub struct SpatialIndex {
    tree: RTree<GridCell>,
}

impl SpatialIndex {
    /// Builds the index from parallel per-cell coordinate slices (degrees).
    pub fn build(lons: &[f64], lats: &[f64]) -> Self {
        debug_assert_eq!(lons.len(), lats.len());
        let cells = lons
            .iter()
            .zip(lats)
            .enumerate()
            .map(|(index, (&lon, &lat))| GridCell {
                position: unit_vector(lon, lat),
                index,
            })
            .collect();
        Self {
            tree: RTree::bulk_load(cells),
        }
    }

    /// Flat index of the cell closest to (lon, lat); `None` on an empty index.
    pub fn nearest(&self, lon: f64, lat: f64) -> Option<usize> {
        self.tree
            .nearest_neighbor(&unit_vector(lon, lat))
            .map(|cell| cell.index)
    }

    /// Batch form of [`nearest`](Self::nearest): one result per query point.
    /// An empty query set (or an empty index) yields an empty result.
    pub fn query(&self, lons: &[f64], lats: &[f64]) -> Vec<usize> {
        debug_assert_eq!(lons.len(), lats.len());
        lons.iter()
            .zip(lats)
            .filter_map(|(&lon, &lat)| self.nearest(lon, lat))
            .collect()
    }
}

fn unit_vector(lon_deg: f64, lat_deg: f64) -> [f64; 3] {
    let lon = lon_deg.to_radians();
    let lat = lat_deg.to_radians();
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}
