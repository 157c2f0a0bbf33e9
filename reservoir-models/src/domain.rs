use std::fs::File;
use std::path::Path;

use nalgebra::DMatrix;
use ndarray::{Array3, ArrayD};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Splits one large spatial grid into a row-major sequence of fixed-size,
/// optionally overlapping subdomains, and reassembles predictions back into
/// the full grid.
///
/// Holds no mutable state; a single divider can be shared read-only across
/// any number of models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankDivider {
    subdomain_layout: [usize; 2],
    rank_dims: [String; 2],
    rank_extent: [usize; 2],
    overlap: usize,
}

impl RankDivider {
    /// Create a divider for a grid of `rank_extent` cells (halo excluded)
    /// split into `subdomain_layout` tiles per dimension, with `overlap`
    /// halo cells on every subdomain edge.
    pub fn new(
        subdomain_layout: [usize; 2],
        rank_dims: [String; 2],
        rank_extent: [usize; 2],
        overlap: usize,
    ) -> Result<Self> {
        for dim in 0..2 {
            if subdomain_layout[dim] == 0 {
                return Err(Error::InvalidConfig(format!(
                    "subdomain layout along '{}' must be nonzero",
                    rank_dims[dim]
                )));
            }
            if rank_extent[dim] % subdomain_layout[dim] != 0 {
                return Err(Error::InvalidConfig(format!(
                    "rank extent {} along '{}' is not divisible by subdomain layout {}",
                    rank_extent[dim], rank_dims[dim], subdomain_layout[dim]
                )));
            }
            let subdomain_extent = rank_extent[dim] / subdomain_layout[dim];
            if overlap > subdomain_extent / 2 {
                return Err(Error::InvalidConfig(format!(
                    "overlap {} exceeds half the subdomain extent {} along '{}'",
                    overlap, subdomain_extent, rank_dims[dim]
                )));
            }
        }
        Ok(Self {
            subdomain_layout,
            rank_dims,
            rank_extent,
            overlap,
        })
    }

    /// Number of subdomains the rank is split into
    #[inline(always)]
    pub fn n_subdomains(&self) -> usize {
        self.subdomain_layout[0] * self.subdomain_layout[1]
    }

    /// Halo width in cells on each subdomain edge
    #[inline(always)]
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Names of the two spatial dimensions, in tiling order
    #[inline(always)]
    pub fn rank_dims(&self) -> &[String; 2] {
        &self.rank_dims
    }

    /// Spatial extent of a single subdomain, with or without its halo
    pub fn subdomain_extent(&self, with_overlap: bool) -> [usize; 2] {
        let pad = if with_overlap { 2 * self.overlap } else { 0 };
        [
            self.rank_extent[0] / self.subdomain_layout[0] + pad,
            self.rank_extent[1] / self.subdomain_layout[1] + pad,
        ]
    }

    /// Flattened feature count of one subdomain column for the given number
    /// of physical features per grid cell
    pub fn n_subdomain_features(&self, n_features: usize, with_overlap: bool) -> usize {
        let extent = self.subdomain_extent(with_overlap);
        n_features * extent[0] * extent[1]
    }

    /// Spatial extent the input array must have, halo included or not
    fn expected_extent(&self, with_overlap: bool) -> [usize; 2] {
        let pad = if with_overlap { 2 * self.overlap } else { 0 };
        [self.rank_extent[0] + pad, self.rank_extent[1] + pad]
    }

    /// Slice an array whose trailing two axes are the spatial dimensions into
    /// subdomain columns.
    ///
    /// Any leading axes are treated as feature axes and flattened into each
    /// column ahead of the spatial content. With `with_overlap` the array
    /// must already carry `overlap` halo cells around the whole rank; each
    /// tile then includes the halo shared with its neighbors. Tiles are
    /// stacked as columns row-major over tile position, the same order
    /// `merge_subdomains` uses.
    pub fn flatten_subdomains_to_columns(
        &self,
        data: &ArrayD<f64>,
        with_overlap: bool,
    ) -> Result<DMatrix<f64>> {
        let ndim = data.ndim();
        if ndim < 2 {
            return Err(Error::ShapeMismatch {
                expected: "at least 2 dimensions with trailing spatial axes".to_string(),
                actual: format!("{} dimensions", ndim),
            });
        }
        let shape = data.shape();
        let spatial = [shape[ndim - 2], shape[ndim - 1]];
        let expected = self.expected_extent(with_overlap);
        if spatial != expected {
            return Err(Error::ShapeMismatch {
                expected: format!(
                    "spatial extent {:?} ({} halo cells per edge)",
                    expected,
                    if with_overlap { self.overlap } else { 0 }
                ),
                actual: format!("spatial extent {:?}", spatial),
            });
        }
        let n_features: usize = shape[..ndim - 2].iter().product();

        // collapse all leading feature axes into one; iteration is in
        // logical order so this is exactly a reshape to (feature, x, y)
        let flat: Vec<f64> = data.iter().copied().collect();
        let arr = Array3::from_shape_vec((n_features, spatial[0], spatial[1]), flat)
            .expect("collapsed feature axis matches element count");

        let sub = self.subdomain_extent(false);
        let tile = self.subdomain_extent(with_overlap);
        let column_len = n_features * tile[0] * tile[1];

        let mut columns = DMatrix::zeros(column_len, self.n_subdomains());
        for ti in 0..self.subdomain_layout[0] {
            for tj in 0..self.subdomain_layout[1] {
                let col = ti * self.subdomain_layout[1] + tj;
                let x0 = ti * sub[0];
                let y0 = tj * sub[1];
                let mut row = 0;
                for f in 0..n_features {
                    for dx in 0..tile[0] {
                        for dy in 0..tile[1] {
                            columns[(row, col)] = arr[(f, x0 + dx, y0 + dy)];
                            row += 1;
                        }
                    }
                }
            }
        }
        Ok(columns)
    }

    /// Reassemble per-subdomain prediction columns into the full rank array
    /// of shape `(n_features, x, y)`.
    ///
    /// Predictions never carry a halo, so this is only defined for columns
    /// produced without overlap. Tile order matches
    /// `flatten_subdomains_to_columns`, making the unpadded flatten/merge
    /// pair bit-exact inverses.
    pub fn merge_subdomains(&self, columns: &DMatrix<f64>) -> Result<ArrayD<f64>> {
        if columns.ncols() != self.n_subdomains() {
            return Err(Error::ShapeMismatch {
                expected: format!("{} subdomain columns", self.n_subdomains()),
                actual: format!("{} columns", columns.ncols()),
            });
        }
        let sub = self.subdomain_extent(false);
        let subdomain_area = sub[0] * sub[1];
        if columns.nrows() % subdomain_area != 0 {
            return Err(Error::ShapeMismatch {
                expected: format!("column length divisible by subdomain area {}", subdomain_area),
                actual: format!("column length {}", columns.nrows()),
            });
        }
        let n_features = columns.nrows() / subdomain_area;

        let mut merged = Array3::zeros((n_features, self.rank_extent[0], self.rank_extent[1]));
        for ti in 0..self.subdomain_layout[0] {
            for tj in 0..self.subdomain_layout[1] {
                let col = ti * self.subdomain_layout[1] + tj;
                let x0 = ti * sub[0];
                let y0 = tj * sub[1];
                let mut row = 0;
                for f in 0..n_features {
                    for dx in 0..sub[0] {
                        for dy in 0..sub[1] {
                            merged[(f, x0 + dx, y0 + dy)] = columns[(row, col)];
                            row += 1;
                        }
                    }
                }
            }
        }
        Ok(merged.into_dyn())
    }

    /// Persist the divider configuration as a small structured record
    pub fn dump(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Load a divider configuration written by [`RankDivider::dump`]
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let divider: RankDivider = serde_json::from_reader(file)?;
        // revalidate so a hand-edited record cannot produce an
        // inconsistent geometry
        RankDivider::new(
            divider.subdomain_layout,
            divider.rank_dims.clone(),
            divider.rank_extent,
            divider.overlap,
        )
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array, Array2, IxDyn};

    use super::*;

    fn xy_dims() -> [String; 2] {
        ["x".to_string(), "y".to_string()]
    }

    fn divider(layout: [usize; 2], extent: [usize; 2], overlap: usize) -> RankDivider {
        RankDivider::new(layout, xy_dims(), extent, overlap).unwrap()
    }

    #[test]
    fn rejects_indivisible_extent() {
        let res = RankDivider::new([3, 3], xy_dims(), [8, 8], 0);
        assert!(matches!(res, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn rejects_oversized_overlap() {
        // subdomain extent 4, half-width 2
        let res = RankDivider::new([2, 2], xy_dims(), [8, 8], 3);
        assert!(matches!(res, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn flatten_requires_halo_when_overlap_requested() {
        let divider = divider([2, 2], [8, 8], 1);
        let unpadded = Array2::<f64>::zeros((8, 8)).into_dyn();
        let res = divider.flatten_subdomains_to_columns(&unpadded, true);
        assert!(matches!(res, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn tile_order_is_row_major() {
        let divider = divider([2, 2], [2, 2], 0);
        // cell (x, y) holds 10 * x + y
        let data =
            Array::from_shape_fn(IxDyn(&[2, 2]), |ix| 10.0 * ix[0] as f64 + ix[1] as f64);
        let columns = divider.flatten_subdomains_to_columns(&data, false).unwrap();
        // tiles iterate (0,0), (0,1), (1,0), (1,1)
        assert_eq!(columns.as_slice(), &[0.0, 1.0, 10.0, 11.0]);
    }

    #[test]
    fn flatten_then_merge_roundtrips_exactly() {
        let divider = divider([2, 2], [8, 8], 0);
        let data = Array::from_shape_fn(IxDyn(&[3, 8, 8]), |ix| {
            (100 * ix[0] + 10 * ix[1] + ix[2]) as f64
        });
        let columns = divider.flatten_subdomains_to_columns(&data, false).unwrap();
        assert_eq!(columns.ncols(), 4);
        assert_eq!(columns.nrows(), 3 * 4 * 4);
        let merged = divider.merge_subdomains(&columns).unwrap();
        assert_eq!(merged, data);
    }

    #[test]
    fn overlap_columns_trim_to_unpadded_columns() {
        let overlap = 1;
        let divider = divider([2, 2], [4, 4], overlap);
        let padded = Array::from_shape_fn(IxDyn(&[6, 6]), |ix| {
            10.0 * ix[0] as f64 + ix[1] as f64
        });
        // interior of the padded array is the unpadded rank
        let unpadded = Array::from_shape_fn(IxDyn(&[4, 4]), |ix| {
            10.0 * (ix[0] + overlap) as f64 + (ix[1] + overlap) as f64
        });

        let with_halo = divider.flatten_subdomains_to_columns(&padded, true).unwrap();
        let without_halo = divider
            .flatten_subdomains_to_columns(&unpadded, false)
            .unwrap();

        let tile = divider.subdomain_extent(true);
        let sub = divider.subdomain_extent(false);
        for col in 0..divider.n_subdomains() {
            for dx in 0..sub[0] {
                for dy in 0..sub[1] {
                    let padded_row = (dx + overlap) * tile[1] + dy + overlap;
                    let unpadded_row = dx * sub[1] + dy;
                    assert_eq!(
                        with_halo[(padded_row, col)],
                        without_halo[(unpadded_row, col)]
                    );
                }
            }
        }
    }

    #[test]
    fn merge_rejects_wrong_column_count() {
        let divider = divider([2, 2], [4, 4], 0);
        let columns = DMatrix::zeros(4, 3);
        assert!(matches!(
            divider.merge_subdomains(&columns),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn dump_load_roundtrip_preserves_behavior() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rank_divider.json");
        let divider = divider([2, 4], [8, 8], 1);
        divider.dump(&path).unwrap();
        let loaded = RankDivider::load(&path).unwrap();
        assert_eq!(loaded, divider);

        let padded = Array::from_shape_fn(IxDyn(&[10, 10]), |ix| (ix[0] * 10 + ix[1]) as f64);
        let a = divider.flatten_subdomains_to_columns(&padded, true).unwrap();
        let b = loaded.flatten_subdomains_to_columns(&padded, true).unwrap();
        assert_eq!(a, b);
    }
}
