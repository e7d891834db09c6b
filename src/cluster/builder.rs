use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::hash::Hash;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::coordinate::{IndexType, Span2D};
use crate::error::{ClusteringError, ConfigurationError};
use crate::grid::SpatialGrid;

use super::cluster::{Cluster, ClusterPoint, Constraints};
use super::metric::{DistanceMetric, ScaledEuclidean};
use super::silhouette;

/// How many threshold-sized cells away a cluster's centroid may be and still be
/// considered when computing [`Cluster::quality`]
const QUALITY_SEARCH_RADIUS: u32 = 2;

/// Parameters controlling [`ClusterBuilder`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ClusteringParameters {
    /// The largest retention time distance between a member and its cluster's centroid
    pub rt_threshold: f64,
    /// The largest m/z distance between a member and its cluster's centroid
    pub mz_threshold: f64,
    /// Clusters with fewer members are not formed, their features are reported as unclustered
    pub min_cluster_size: usize,
    /// Refuse to cluster fewer features than this
    pub min_input_features: usize,
    /// Require all members to share [`ClusterPoint::property_a`]
    pub use_property_a: bool,
    /// Require members to have distinct [`ClusterPoint::property_b`]
    pub use_property_b: bool,
    /// The most clusters to extract. Defaults to the number of features.
    pub max_rounds: Option<usize>,
    /// The most candidate rebuilds after extractions. Defaults to 32 times the
    /// number of features.
    pub max_regenerations: Option<usize>,
    /// Wall clock limit on the extraction loop
    pub time_budget: Option<Duration>,
    /// Compute the silhouette-based [`Cluster::quality`] of each cluster, comparing
    /// each member only with clusters centered within two threshold-sized cells
    pub compute_quality: bool,
}

impl Default for ClusteringParameters {
    fn default() -> Self {
        Self {
            rt_threshold: 5.0,
            mz_threshold: 0.01,
            min_cluster_size: 1,
            min_input_features: 2,
            use_property_a: true,
            use_property_b: true,
            max_rounds: None,
            max_regenerations: None,
            time_budget: None,
            compute_quality: false,
        }
    }
}

impl ClusteringParameters {
    pub fn new(rt_threshold: f64, mz_threshold: f64) -> Self {
        Self {
            rt_threshold,
            mz_threshold,
            ..Default::default()
        }
    }

    pub fn min_cluster_size(mut self, min_cluster_size: usize) -> Self {
        self.min_cluster_size = min_cluster_size;
        self
    }

    pub fn min_input_features(mut self, min_input_features: usize) -> Self {
        self.min_input_features = min_input_features;
        self
    }

    pub fn constraints(mut self, use_property_a: bool, use_property_b: bool) -> Self {
        self.use_property_a = use_property_a;
        self.use_property_b = use_property_b;
        self
    }

    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }

    pub fn max_regenerations(mut self, max_regenerations: usize) -> Self {
        self.max_regenerations = Some(max_regenerations);
        self
    }

    pub fn time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn compute_quality(mut self, compute_quality: bool) -> Self {
        self.compute_quality = compute_quality;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        ConfigurationError::positive("rt_threshold", self.rt_threshold)?;
        ConfigurationError::positive("mz_threshold", self.mz_threshold)?;
        if self.min_cluster_size == 0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "min_cluster_size",
                value: 0.0,
                reason: "clusters have at least one member",
            });
        }
        Ok(())
    }

    /// The membership constraints these parameters enforce
    pub fn constraint_set(&self) -> Constraints {
        Constraints {
            property_a: self.use_property_a,
            property_b: self.use_property_b,
        }
    }
}

/// The budget that stopped an extraction early
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Budget {
    Rounds(usize),
    Regenerations(usize),
    Time(Duration),
}

/// Reported when the extraction loop ran out of budget. The partition
/// returned alongside it is valid but incomplete: features not yet placed
/// are listed as unclustered.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NonConvergence {
    pub budget: Budget,
    pub rounds: usize,
    pub regenerations: usize,
    pub elapsed: Duration,
    /// Features that were still eligible for clustering when the loop stopped
    pub remaining: usize,
}

/// The partition produced by [`ClusterBuilder::cluster`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusteringResult<A: Eq + Hash, B: Eq + Hash> {
    /// Disjoint clusters, in extraction order
    pub clusters: Vec<Cluster<A, B>>,
    /// Indices of features that belong to no cluster, ascending
    pub unclustered: Vec<IndexType>,
    pub rounds: usize,
    pub regenerations: usize,
    pub non_convergence: Option<NonConvergence>,
}

impl<A: Copy + Eq + Hash, B: Copy + Eq + Hash> ClusteringResult<A, B> {
    pub fn is_converged(&self) -> bool {
        self.non_convergence.is_none()
    }

    /// Map each of `n` point indices to the position of its cluster in
    /// [`ClusteringResult::clusters`]
    pub fn assignments(&self, n: usize) -> Vec<Option<usize>> {
        let mut assigned = vec![None; n];
        for (ci, cluster) in self.clusters.iter().enumerate() {
            for i in cluster.members() {
                if let Some(slot) = assigned.get_mut(*i as usize) {
                    *slot = Some(ci);
                }
            }
        }
        assigned
    }

    /// Dissolve clusters whose m/z extent is narrower than `min_extent`, moving their
    /// members to [`ClusteringResult::unclustered`]
    pub fn remove_small_clusters_mz(&mut self, min_extent: f64) {
        let (kept, removed): (Vec<_>, Vec<_>) = self
            .clusters
            .drain(..)
            .partition(|c| c.height() >= min_extent);
        self.clusters = kept;
        for cluster in removed {
            self.unclustered.extend_from_slice(cluster.members());
        }
        self.unclustered.sort_unstable();
    }

    /// Merge clusters that were split along m/z within the same retention time
    /// column.
    ///
    /// Clusters are binned into columns `rt_column_width` wide by their centroid.
    /// Within a column they are visited in m/z order, and each one is merged into
    /// its predecessor when their retention time extents overlap and the combined
    /// cluster still satisfies `constraints`. A merged cluster takes the place of
    /// its earliest extracted part, with its centroid and bounding box recomputed
    /// and its quality cleared. Returns the number of merges.
    pub fn extend_clusters_mz(
        &mut self,
        rt_column_width: f64,
        constraints: Constraints,
    ) -> Result<usize, ConfigurationError> {
        let columns_grid = SpatialGrid::new(rt_column_width, rt_column_width)?;
        let mut columns: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (ci, cluster) in self.clusters.iter().enumerate() {
            let (rt, mz) = cluster.centroid();
            let key = columns_grid
                .cell_of((rt, 0.0))
                .ok_or(ConfigurationError::NonFiniteCoordinate {
                    index: ci as IndexType,
                    x: rt,
                    y: mz,
                })?;
            columns.entry(key.x).or_default().push(ci);
        }

        let mut slots: Vec<Option<Cluster<A, B>>> = self.clusters.drain(..).map(Some).collect();
        let mut merges = 0;
        for (_, mut column) in columns {
            if column.len() < 2 {
                continue;
            }
            column.sort_by(|a, b| {
                let (ca, cb) = (&slots[*a], &slots[*b]);
                let ya = ca.as_ref().map_or(0.0, |c| c.centroid().1);
                let yb = cb.as_ref().map_or(0.0, |c| c.centroid().1);
                ya.total_cmp(&yb).then_with(|| a.cmp(b))
            });

            // `head` is the slot holding the merged cluster being grown
            let mut head = column[0];
            for next in column[1..].iter().copied() {
                let merged = match (slots[head].take(), slots[next].take()) {
                    (Some(mut current), Some(candidate))
                        if current.overlaps_rt(&candidate)
                            && current.can_merge(&candidate, constraints) =>
                    {
                        current.merge(candidate);
                        current
                    }
                    (current, candidate) => {
                        slots[head] = current;
                        slots[next] = candidate;
                        head = next;
                        continue;
                    }
                };
                let target = head.min(next);
                trace!(
                    "Merging clusters {} and {} at {:?}",
                    head,
                    next,
                    merged.centroid()
                );
                slots[target] = Some(merged);
                head = target;
                merges += 1;
            }
        }
        self.clusters = slots.into_iter().flatten().collect();
        debug!("Merged {} cluster pairs along m/z", merges);
        Ok(merges)
    }
}

struct Candidate<A: Eq + Hash, B: Eq + Hash> {
    cluster: Cluster<A, B>,
    mean_intra: f64,
    version: u32,
}

/// The ordering key of a candidate in the extraction heap: larger clusters first, then
/// tighter ones, then the one holding the lowest index.
#[derive(Debug, Clone, Copy)]
struct Rank {
    size: usize,
    mean_intra: f64,
    min_member: IndexType,
    seed: IndexType,
    version: u32,
}

impl PartialEq for Rank {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Rank {}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.size
            .cmp(&other.size)
            .then_with(|| other.mean_intra.total_cmp(&self.mean_intra))
            .then_with(|| other.min_member.cmp(&self.min_member))
            .then_with(|| other.seed.cmp(&self.seed))
    }
}

impl<A: Copy + Eq + Hash, B: Copy + Eq + Hash> Candidate<A, B> {
    fn rank(&self, seed: IndexType) -> Rank {
        Rank {
            size: self.cluster.members().len(),
            mean_intra: self.mean_intra,
            min_member: self.cluster.min_member(),
            seed,
            version: self.version,
        }
    }
}

/// Greedy, constraint-aware clustering over a [`SpatialGrid`].
///
/// Every unclustered feature seeds a candidate cluster grown from its nearest
/// compatible neighbors. The best candidate is extracted, its members are
/// marked as used, and only the candidates that shared a member with it are
/// rebuilt. This repeats until every feature is placed or no candidate of
/// [`ClusteringParameters::min_cluster_size`] remains.
#[derive(Debug, Clone)]
pub struct ClusterBuilder<M: DistanceMetric = ScaledEuclidean> {
    params: ClusteringParameters,
    metric: M,
}

impl ClusterBuilder<ScaledEuclidean> {
    /// Create a builder measuring distances in units of the two thresholds
    pub fn new(params: ClusteringParameters) -> Result<Self, ConfigurationError> {
        let metric = ScaledEuclidean::new(params.rt_threshold, params.mz_threshold);
        Self::with_metric(params, metric)
    }
}

impl<M: DistanceMetric + Sync> ClusterBuilder<M> {
    pub fn with_metric(params: ClusteringParameters, metric: M) -> Result<Self, ConfigurationError> {
        params.validate()?;
        Ok(Self { params, metric })
    }

    pub fn params(&self) -> &ClusteringParameters {
        &self.params
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }

    /// Build the grid [`ClusterBuilder::cluster_with_grid`] expects for `points`
    pub fn build_grid<P: ClusterPoint>(&self, points: &[P]) -> Result<SpatialGrid, ConfigurationError> {
        let mut grid = SpatialGrid::new(self.params.rt_threshold, self.params.mz_threshold)?;
        for (i, p) in points.iter().enumerate() {
            grid.insert(i as IndexType, p.position())?;
        }
        Ok(grid)
    }

    /// Partition `points` into clusters.
    ///
    /// # Errors
    /// [`ClusteringError::InsufficientInput`] if there are fewer points than
    /// [`ClusteringParameters::min_input_features`] or
    /// [`ClusteringParameters::min_cluster_size`], and
    /// [`ClusteringError::Configuration`] if a point has a non-finite coordinate.
    pub fn cluster<P: ClusterPoint + Sync>(
        &self,
        points: &[P],
    ) -> Result<ClusteringResult<P::PropertyA, P::PropertyB>, ClusteringError>
    where
        P::PropertyA: Send + Sync,
        P::PropertyB: Send + Sync,
    {
        self.check_input_size(points.len())?;
        let grid = self.build_grid(points)?;
        self.cluster_with_grid(points, &grid)
    }

    /// Partition `points` using a grid already built over them, such as one
    /// from [`ClusterBuilder::build_grid`] or [`FeatureStore::build_grid`](crate::FeatureStore::build_grid).
    ///
    /// The grid's cells must be at least as large as the thresholds, otherwise
    /// admissible neighbors could be missed.
    pub fn cluster_with_grid<P: ClusterPoint + Sync>(
        &self,
        points: &[P],
        grid: &SpatialGrid,
    ) -> Result<ClusteringResult<P::PropertyA, P::PropertyB>, ClusteringError>
    where
        P::PropertyA: Send + Sync,
        P::PropertyB: Send + Sync,
    {
        self.check_input_size(points.len())?;
        if grid.cell_width() < self.params.rt_threshold {
            return Err(ConfigurationError::InvalidParameter {
                name: "cell_width",
                value: grid.cell_width(),
                reason: "grid cells must be at least as wide as rt_threshold",
            }
            .into());
        }
        if grid.cell_height() < self.params.mz_threshold {
            return Err(ConfigurationError::InvalidParameter {
                name: "cell_height",
                value: grid.cell_height(),
                reason: "grid cells must be at least as tall as mz_threshold",
            }
            .into());
        }
        if grid.len() != points.len() {
            return Err(ConfigurationError::InvalidParameter {
                name: "grid",
                value: grid.len() as f64,
                reason: "grid must index every point exactly once",
            }
            .into());
        }

        let mut result = Extraction::new(self, points, grid).run();

        if self.params.compute_quality {
            let scores = silhouette::local_silhouette_scores(
                points,
                &result.clusters,
                &self.metric,
                (self.params.rt_threshold, self.params.mz_threshold),
                QUALITY_SEARCH_RADIUS,
            )?;
            for cluster in result.clusters.iter_mut() {
                let member_scores: Vec<f64> = cluster
                    .members()
                    .iter()
                    .filter_map(|i| scores[*i as usize])
                    .collect();
                let quality = if member_scores.is_empty() {
                    None
                } else {
                    Some(member_scores.iter().sum::<f64>() / member_scores.len() as f64)
                };
                cluster.set_quality(quality);
            }
        }
        Ok(result)
    }

    /// Compute the silhouette width of every point under `result`, see
    /// [`silhouette_scores`](super::silhouette_scores)
    pub fn silhouette_scores<P: ClusterPoint>(
        &self,
        points: &[P],
        result: &ClusteringResult<P::PropertyA, P::PropertyB>,
    ) -> Vec<Option<f64>> {
        silhouette::silhouette_scores(points, &result.clusters, &self.metric)
    }

    fn check_input_size(&self, found: usize) -> Result<(), ClusteringError> {
        let required = self
            .params
            .min_input_features
            .max(self.params.min_cluster_size);
        if found < required {
            return Err(ClusteringError::InsufficientInput { found, required });
        }
        Ok(())
    }

    /// Grow a candidate cluster from `seed`, admitting the closest compatible
    /// unused neighbor of the current centroid until none fits.
    fn grow<P: ClusterPoint>(
        &self,
        seed: IndexType,
        points: &[P],
        grid: &SpatialGrid,
        used: &[bool],
    ) -> Cluster<P::PropertyA, P::PropertyB> {
        let rt_threshold = self.params.rt_threshold;
        let mz_threshold = self.params.mz_threshold;
        let constraints = self.params.constraint_set();
        let mut cluster = Cluster::seed(seed, &points[seed as usize]);
        let mut options: Vec<(f64, IndexType)> = Vec::new();
        loop {
            let center = cluster.centroid();
            options.clear();
            options.extend(
                grid.neighbors(center, 1)
                    .filter(|j| !used[*j as usize] && !cluster.contains(*j))
                    .filter_map(|j| {
                        let p = &points[j as usize];
                        let (x, y) = p.position();
                        let in_box = (x - center.0).abs() <= rt_threshold
                            && (y - center.1).abs() <= mz_threshold;
                        if in_box && cluster.admits(p, constraints) {
                            Some((self.metric.distance(center, (x, y)), j))
                        } else {
                            None
                        }
                    }),
            );
            options.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

            let admitted = options.iter().find(|(_, j)| {
                let position = points[*j as usize].position();
                let shifted = cluster.centroid_with(position);
                (position.0 - shifted.0).abs() <= rt_threshold
                    && (position.1 - shifted.1).abs() <= mz_threshold
                    && cluster.within_threshold(points, shifted, rt_threshold, mz_threshold)
            });
            match admitted {
                Some((_, j)) => cluster.add(*j, &points[*j as usize]),
                None => break,
            }
        }
        cluster
    }

    fn build_candidates<P: ClusterPoint + Sync>(
        &self,
        seeds: &[IndexType],
        points: &[P],
        grid: &SpatialGrid,
        used: &[bool],
    ) -> Vec<(IndexType, Candidate<P::PropertyA, P::PropertyB>)>
    where
        P::PropertyA: Send + Sync,
        P::PropertyB: Send + Sync,
    {
        let build = |seed: &IndexType| {
            let cluster = self.grow(*seed, points, grid, used);
            let mean_intra = cluster.mean_intra_distance(points, &self.metric);
            (
                *seed,
                Candidate {
                    cluster,
                    mean_intra,
                    version: 0,
                },
            )
        };
        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            seeds.par_iter().map(build).collect()
        }
        #[cfg(not(feature = "rayon"))]
        {
            seeds.iter().map(build).collect()
        }
    }
}

/// The mutable state of one run of the extraction loop
struct Extraction<'a, M: DistanceMetric, P: ClusterPoint> {
    builder: &'a ClusterBuilder<M>,
    points: &'a [P],
    grid: &'a SpatialGrid,
    used: Vec<bool>,
    candidates: Vec<Option<Candidate<P::PropertyA, P::PropertyB>>>,
    versions: Vec<u32>,
    /// For each point, the seeds whose candidate contained it when built
    holders: Vec<Vec<IndexType>>,
    heap: BinaryHeap<Rank>,
}

impl<'a, M: DistanceMetric + Sync, P: ClusterPoint + Sync> Extraction<'a, M, P>
where
    P::PropertyA: Send + Sync,
    P::PropertyB: Send + Sync,
{
    fn new(builder: &'a ClusterBuilder<M>, points: &'a [P], grid: &'a SpatialGrid) -> Self {
        let n = points.len();
        Self {
            builder,
            points,
            grid,
            used: vec![false; n],
            candidates: (0..n).map(|_| None).collect(),
            versions: vec![0; n],
            holders: vec![Vec::new(); n],
            heap: BinaryHeap::with_capacity(n),
        }
    }

    fn install(&mut self, built: Vec<(IndexType, Candidate<P::PropertyA, P::PropertyB>)>) {
        for (seed, mut candidate) in built {
            let s = seed as usize;
            self.versions[s] += 1;
            candidate.version = self.versions[s];
            for m in candidate.cluster.members() {
                self.holders[*m as usize].push(seed);
            }
            self.heap.push(candidate.rank(seed));
            self.candidates[s] = Some(candidate);
        }
    }

    fn run(mut self) -> ClusteringResult<P::PropertyA, P::PropertyB> {
        let n = self.points.len();
        let builder = self.builder;
        let params = &builder.params;
        let max_rounds = params.max_rounds.unwrap_or(n);
        let max_regenerations = params.max_regenerations.unwrap_or(n.saturating_mul(32));
        let started = Instant::now();

        let seeds: Vec<IndexType> = (0..n as IndexType).collect();
        let built = self
            .builder
            .build_candidates(&seeds, self.points, self.grid, &self.used);
        self.install(built);
        debug!("Built {} seed candidates", n);

        let mut clusters = Vec::new();
        let mut rounds = 0usize;
        let mut regenerations = 0usize;
        let mut stopped_by = None;

        while let Some(rank) = self.heap.pop() {
            let s = rank.seed as usize;
            if self.used[s] || rank.version != self.versions[s] {
                continue;
            }
            if rank.size < params.min_cluster_size {
                break;
            }
            if rounds >= max_rounds {
                stopped_by = Some(Budget::Rounds(max_rounds));
                break;
            }
            if let Some(limit) = params.time_budget {
                if started.elapsed() >= limit {
                    stopped_by = Some(Budget::Time(limit));
                    break;
                }
            }
            let Some(candidate) = self.candidates[s].take() else {
                continue;
            };
            rounds += 1;
            let cluster = candidate.cluster;
            trace!(
                "Extracting cluster of {} seeded by {} at {:?}",
                cluster.len(),
                s,
                cluster.centroid()
            );

            let mut affected = BTreeSet::new();
            for m in cluster.members() {
                let m = *m as usize;
                self.used[m] = true;
                affected.extend(self.holders[m].drain(..));
            }

            let mut stale = Vec::new();
            for seed in affected {
                let si = seed as usize;
                if self.used[si] {
                    self.candidates[si] = None;
                    continue;
                }
                let intersects = match &self.candidates[si] {
                    Some(c) => c.cluster.members().iter().any(|m| self.used[*m as usize]),
                    None => false,
                };
                if intersects {
                    stale.push(seed);
                }
            }
            clusters.push(cluster);

            if regenerations + stale.len() > max_regenerations {
                stopped_by = Some(Budget::Regenerations(max_regenerations));
                break;
            }
            regenerations += stale.len();
            let rebuilt = self
                .builder
                .build_candidates(&stale, self.points, self.grid, &self.used);
            self.install(rebuilt);
        }

        let unclustered: Vec<IndexType> = (0..n as IndexType)
            .filter(|i| !self.used[*i as usize])
            .collect();

        let non_convergence = stopped_by.map(|budget| {
            let nc = NonConvergence {
                budget,
                rounds,
                regenerations,
                elapsed: started.elapsed(),
                remaining: unclustered.len(),
            };
            warn!(
                "Clustering stopped early by {:?} after {} rounds, {} features left unclustered",
                nc.budget, nc.rounds, nc.remaining
            );
            nc
        });

        debug!(
            "Extracted {} clusters in {} rounds with {} regenerations, {} features unclustered",
            clusters.len(),
            rounds,
            regenerations,
            unclustered.len()
        );

        ClusteringResult {
            clusters,
            unclustered,
            rounds,
            regenerations,
            non_convergence,
        }
    }
}
