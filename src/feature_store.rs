//! A flat, append-only collection of [`Feature`] records.
//!
//! Every other structure in this crate refers to features by their
//! position in a [`FeatureStore`] ([`IndexType`]), never by reference,
//! so grids, clusters and correspondences can be built, shared across
//! threads, and discarded without tying up the features themselves.
//!

use std::ops::{self, Range};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::coordinate::IndexType;
use crate::error::ConfigurationError;
use crate::feature::Feature;
use crate::grid::SpatialGrid;

/// A growable arena of features. Features are only ever appended, so an
/// index handed out by [`FeatureStore::push`] stays valid for the lifetime
/// of the store.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeatureStore {
    features: Vec<Feature>,
}

impl FeatureStore {
    /// Create a new [`FeatureStore`] from an existing `Vec<Feature>`. The
    /// order of `features` is preserved and defines their indices.
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    /// Create a new empty feature store
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            features: Vec::with_capacity(capacity),
        }
    }

    /// Append `feature` to the store, returning its index
    pub fn push(&mut self, feature: Feature) -> IndexType {
        let index = self.features.len() as IndexType;
        self.features.push(feature);
        index
    }

    pub fn get(&self, index: IndexType) -> Option<&Feature> {
        self.features.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn as_slice(&self) -> &[Feature] {
        &self.features
    }

    /// Iterate over references to features
    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// The indices of the `k` most intense features, most intense first.
    /// Equally intense features are ordered by index.
    pub fn top_by_intensity(&self, k: usize) -> Vec<IndexType> {
        let mut indices: Vec<IndexType> = (0..self.features.len() as IndexType).collect();
        indices.sort_by(|a, b| {
            let fa = &self.features[*a as usize];
            let fb = &self.features[*b as usize];
            fb.intensity.total_cmp(&fa.intensity).then_with(|| a.cmp(b))
        });
        indices.truncate(k);
        indices
    }

    fn extent<F: Fn(&Feature) -> f64>(&self, accessor: F) -> Option<Range<f64>> {
        self.features.iter().map(accessor).fold(None, |acc, v| match acc {
            Some(r) => Some(Range {
                start: v.min(r.start),
                end: v.max(r.end),
            }),
            None => Some(v..v),
        })
    }

    /// The smallest and largest retention time in the store
    pub fn rt_range(&self) -> Option<Range<f64>> {
        self.extent(|f| f.rt)
    }

    /// The smallest and largest m/z in the store
    pub fn mz_range(&self) -> Option<Range<f64>> {
        self.extent(|f| f.mz)
    }

    /// Index every feature by its (retention time, m/z) position.
    ///
    /// # Errors
    /// Propagates [`SpatialGrid::new`] and [`SpatialGrid::insert`] failures, notably
    /// when a feature has a non-finite coordinate.
    pub fn build_grid(&self, cell_width: f64, cell_height: f64) -> Result<SpatialGrid, ConfigurationError> {
        let mut grid = SpatialGrid::new(cell_width, cell_height)?;
        for (i, feature) in self.features.iter().enumerate() {
            grid.insert(i as IndexType, feature.position())?;
        }
        Ok(grid)
    }
}

impl ops::Index<usize> for FeatureStore {
    type Output = Feature;

    fn index(&self, i: usize) -> &Self::Output {
        &(self.features[i])
    }
}

impl ops::Deref for FeatureStore {
    type Target = [Feature];

    fn deref(&self) -> &Self::Target {
        &self.features
    }
}

impl AsRef<[Feature]> for FeatureStore {
    fn as_ref(&self) -> &[Feature] {
        &self.features
    }
}

impl From<Vec<Feature>> for FeatureStore {
    fn from(features: Vec<Feature>) -> Self {
        Self::new(features)
    }
}

impl FromIterator<Feature> for FeatureStore {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Extend<Feature> for FeatureStore {
    fn extend<I: IntoIterator<Item = Feature>>(&mut self, iter: I) {
        self.features.extend(iter)
    }
}

impl IntoIterator for FeatureStore {
    type Item = Feature;

    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl<'a> IntoIterator for &'a FeatureStore {
    type Item = &'a Feature;

    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

#[cfg(feature = "rayon")]
mod parallel {
    use super::*;
    use rayon::prelude::*;

    impl FeatureStore {
        pub fn par_iter(&self) -> rayon::slice::Iter<'_, Feature> {
            self.features.par_iter()
        }
    }

    impl FromParallelIterator<Feature> for FeatureStore {
        fn from_par_iter<I>(par_iter: I) -> Self
        where
            I: IntoParallelIterator<Item = Feature>,
        {
            Self::new(par_iter.into_par_iter().collect())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::grid::CellKey;
    use crate::test_data;

    #[test]
    fn test_append_only() {
        let mut store = FeatureStore::empty();
        assert!(store.is_empty());
        assert!(store.rt_range().is_none());

        let a = store.push(Feature::new(10.0, 500.0, 100.0, Some(2), 0));
        let b = store.push(Feature::new(5.0, 450.0, 300.0, None, 1));
        assert_eq!((a, b), (0, 1));
        assert_eq!(store.get(1).unwrap().mz, 450.0);
        assert_eq!(store[0].rt, 10.0);
        assert!(store.get(2).is_none());
        assert_eq!(store.rt_range(), Some(5.0..10.0));
        assert_eq!(store.mz_range(), Some(450.0..500.0));
    }

    #[test]
    fn test_top_by_intensity() {
        let store: FeatureStore = vec![
            Feature::new(1.0, 100.0, 5.0, None, 0),
            Feature::new(2.0, 100.0, 50.0, None, 0),
            Feature::new(3.0, 100.0, 5.0, None, 0),
            Feature::new(4.0, 100.0, 20.0, None, 0),
        ]
        .into();
        assert_eq!(store.top_by_intensity(3), vec![1, 3, 0]);
        assert_eq!(store.top_by_intensity(10).len(), 4);
        assert!(store.top_by_intensity(0).is_empty());
    }

    #[test]
    fn test_build_grid() {
        let store = test_data::shifted_pair(40, 0.0, 7).0;
        let grid = store.build_grid(30.0, 1.0).unwrap();
        assert_eq!(grid.len(), store.len());
        let f = &store[3];
        let key = grid.cell_of(f.position()).unwrap();
        assert!(grid.cell(&key).contains(&3));

        let mut broken = store.clone();
        broken.push(Feature::at(f64::NAN, 100.0));
        assert!(broken.build_grid(30.0, 1.0).is_err());
        assert!(store.build_grid(0.0, 1.0).is_err());
        assert_eq!(
            SpatialGrid::new(1.0, 1.0).unwrap().cell_of((0.5, 0.5)),
            Some(CellKey::new(0, 0))
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serialize() -> Result<(), serde_json::Error> {
        let store = test_data::shifted_pair(10, 0.0, 3).0;
        let text = serde_json::to_string(&store)?;
        let dup: FeatureStore = serde_json::from_str(&text)?;
        assert_eq!(store, dup);
        Ok(())
    }
}
