use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::coordinate::{BoundingBox, IndexType, Span2D};
use crate::feature::Feature;

use super::metric::DistanceMetric;

/// Something that can be placed in the plane and grouped by [`ClusterBuilder`](super::ClusterBuilder).
///
/// Unknown properties (`None`) never veto a grouping.
pub trait ClusterPoint {
    /// A property all members of a cluster must share
    type PropertyA: Copy + Eq + Hash + Debug;
    /// A property no two members of a cluster may share
    type PropertyB: Copy + Eq + Hash + Debug;

    fn position(&self) -> (f64, f64);

    fn property_a(&self) -> Option<Self::PropertyA> {
        None
    }

    fn property_b(&self) -> Option<Self::PropertyB> {
        None
    }
}

/// Features are placed by (retention time, m/z), must agree on charge, and
/// may contribute at most one member per source run.
impl ClusterPoint for Feature {
    type PropertyA = i32;
    type PropertyB = u32;

    #[inline]
    fn position(&self) -> (f64, f64) {
        (self.rt, self.mz)
    }

    #[inline]
    fn property_a(&self) -> Option<i32> {
        self.charge
    }

    #[inline]
    fn property_b(&self) -> Option<u32> {
        Some(self.source_id)
    }
}

impl ClusterPoint for (f64, f64) {
    type PropertyA = ();
    type PropertyB = ();

    #[inline]
    fn position(&self) -> (f64, f64) {
        *self
    }
}

impl<T: ClusterPoint> ClusterPoint for &T {
    type PropertyA = T::PropertyA;
    type PropertyB = T::PropertyB;

    fn position(&self) -> (f64, f64) {
        (*self).position()
    }

    fn property_a(&self) -> Option<Self::PropertyA> {
        (*self).property_a()
    }

    fn property_b(&self) -> Option<Self::PropertyB> {
        (*self).property_b()
    }
}

/// Which membership constraints are enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraints {
    pub property_a: bool,
    pub property_b: bool,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            property_a: true,
            property_b: true,
        }
    }
}

/// A group of points, referenced by index, believed to represent the same analyte.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cluster<A: Eq + Hash, B: Eq + Hash> {
    centroid: (f64, f64),
    sum: (f64, f64),
    bbox: BoundingBox,
    members: Vec<IndexType>,
    property_a: Option<A>,
    properties_b: HashSet<B>,
    quality: Option<f64>,
}

impl<A: Copy + Eq + Hash, B: Copy + Eq + Hash> Cluster<A, B> {
    /// Start a new cluster from a single point
    pub fn seed<P: ClusterPoint<PropertyA = A, PropertyB = B>>(index: IndexType, point: &P) -> Self {
        let position = point.position();
        let mut properties_b = HashSet::new();
        if let Some(b) = point.property_b() {
            properties_b.insert(b);
        }
        Self {
            centroid: position,
            sum: position,
            bbox: BoundingBox::from_point(position),
            members: vec![index],
            property_a: point.property_a(),
            properties_b,
            quality: None,
        }
    }

    /// Check whether `point` may join without violating the enabled `constraints`
    pub fn admits<P: ClusterPoint<PropertyA = A, PropertyB = B>>(
        &self,
        point: &P,
        constraints: Constraints,
    ) -> bool {
        if constraints.property_a {
            if let (Some(a), Some(b)) = (self.property_a, point.property_a()) {
                if a != b {
                    return false;
                }
            }
        }
        if constraints.property_b {
            if let Some(b) = point.property_b() {
                if self.properties_b.contains(&b) {
                    return false;
                }
            }
        }
        true
    }

    /// Add a member, updating the centroid, bounding box and property sets.
    ///
    /// This does not check constraints, see [`Cluster::admits`].
    pub fn add<P: ClusterPoint<PropertyA = A, PropertyB = B>>(&mut self, index: IndexType, point: &P) {
        let position = point.position();
        self.members.push(index);
        self.sum.0 += position.0;
        self.sum.1 += position.1;
        let n = self.members.len() as f64;
        self.centroid = (self.sum.0 / n, self.sum.1 / n);
        self.bbox.enlarge(position);
        if self.property_a.is_none() {
            self.property_a = point.property_a();
        }
        if let Some(b) = point.property_b() {
            self.properties_b.insert(b);
        }
    }

    /// Check whether the members of `other` may join this cluster without
    /// violating the enabled `constraints`
    pub fn can_merge(&self, other: &Self, constraints: Constraints) -> bool {
        if constraints.property_a {
            if let (Some(a), Some(b)) = (self.property_a, other.property_a) {
                if a != b {
                    return false;
                }
            }
        }
        !(constraints.property_b && !self.properties_b.is_disjoint(&other.properties_b))
    }

    /// Whether the retention time extents of the two clusters overlap
    pub fn overlaps_rt(&self, other: &Self) -> bool {
        self.bbox.start.0 <= other.bbox.end.0 && other.bbox.start.0 <= self.bbox.end.0
    }

    /// Absorb all the members of `other`, recomputing the centroid and bounding box.
    ///
    /// This does not check constraints, see [`Cluster::can_merge`]. Any quality
    /// computed for either cluster no longer applies and is cleared.
    pub fn merge(&mut self, other: Self) {
        self.members.extend(other.members);
        self.sum.0 += other.sum.0;
        self.sum.1 += other.sum.1;
        let n = self.members.len() as f64;
        self.centroid = (self.sum.0 / n, self.sum.1 / n);
        self.bbox = self.bbox.union(&other.bbox);
        if self.property_a.is_none() {
            self.property_a = other.property_a;
        }
        self.properties_b.extend(other.properties_b);
        self.quality = None;
    }

    /// The centroid this cluster would have if `position` were added to it
    pub fn centroid_with(&self, position: (f64, f64)) -> (f64, f64) {
        let n = (self.members.len() + 1) as f64;
        ((self.sum.0 + position.0) / n, (self.sum.1 + position.1) / n)
    }

    pub fn centroid(&self) -> (f64, f64) {
        self.centroid
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// The indices of the members, in the order they joined
    pub fn members(&self) -> &[IndexType] {
        &self.members
    }

    pub fn contains(&self, index: IndexType) -> bool {
        self.members.contains(&index)
    }

    pub fn property_a(&self) -> Option<A> {
        self.property_a
    }

    pub fn properties_b(&self) -> &HashSet<B> {
        &self.properties_b
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The smallest member index, used to break ties between equally good clusters
    pub fn min_member(&self) -> IndexType {
        self.members.iter().copied().min().unwrap_or(IndexType::MAX)
    }

    /// The mean silhouette width of the members, if it was computed
    pub fn quality(&self) -> Option<f64> {
        self.quality
    }

    pub(crate) fn set_quality(&mut self, quality: Option<f64>) {
        self.quality = quality;
    }

    /// Check that every member lies within `(x_threshold, y_threshold)` of `center`
    /// on both axes independently
    pub fn within_threshold<P: ClusterPoint>(
        &self,
        points: &[P],
        center: (f64, f64),
        x_threshold: f64,
        y_threshold: f64,
    ) -> bool {
        self.members.iter().all(|i| {
            let (x, y) = points[*i as usize].position();
            (x - center.0).abs() <= x_threshold && (y - center.1).abs() <= y_threshold
        })
    }

    /// The mean pairwise distance between members, zero for a single member
    pub fn mean_intra_distance<P: ClusterPoint, M: DistanceMetric>(&self, points: &[P], metric: &M) -> f64 {
        let n = self.members.len();
        if n < 2 {
            return 0.0;
        }
        let mut total = 0.0;
        for (k, i) in self.members.iter().enumerate() {
            let pi = points[*i as usize].position();
            for j in self.members[k + 1..].iter() {
                total += metric.distance(pi, points[*j as usize].position());
            }
        }
        total / (n * (n - 1) / 2) as f64
    }
}

impl<A: Eq + Hash, B: Eq + Hash> Span2D for Cluster<A, B> {
    fn start(&self) -> (f64, f64) {
        self.bbox.start
    }

    fn end(&self) -> (f64, f64) {
        self.bbox.end
    }
}
