//! Silhouette widths measure how well each point sits in its cluster relative
//! to the nearest other cluster, from -1 (misplaced) to 1 (well separated).

use std::hash::Hash;

use crate::coordinate::IndexType;
use crate::error::ConfigurationError;
use crate::grid::SpatialGrid;

use super::cluster::{Cluster, ClusterPoint};
use super::metric::DistanceMetric;

fn mean_distance<P: ClusterPoint, M: DistanceMetric>(
    points: &[P],
    from: (f64, f64),
    members: &[IndexType],
    skip: Option<IndexType>,
    metric: &M,
) -> Option<f64> {
    let mut total = 0.0;
    let mut count = 0usize;
    for m in members.iter().filter(|m| Some(**m) != skip) {
        total += metric.distance(from, points[*m as usize].position());
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(total / count as f64)
    }
}

/// The width of `member` of `clusters[own]`, taking `b` as the smallest mean
/// distance to the members of any cluster in `others`. `None` if `others` names
/// no cluster besides `own`.
fn member_width<A, B, P, M>(
    points: &[P],
    clusters: &[Cluster<A, B>],
    own: usize,
    member: IndexType,
    others: impl IntoIterator<Item = usize>,
    metric: &M,
) -> Option<f64>
where
    A: Copy + Eq + Hash,
    B: Copy + Eq + Hash,
    P: ClusterPoint,
    M: DistanceMetric,
{
    let position = points[member as usize].position();
    let b = others
        .into_iter()
        .filter(|j| *j != own)
        .filter_map(|j| mean_distance(points, position, clusters[j].members(), None, metric))
        .min_by(|x, y| x.total_cmp(y))?;
    let a = mean_distance(points, position, clusters[own].members(), Some(member), metric)
        .unwrap_or(0.0);
    let scale = a.max(b);
    if scale > 0.0 {
        Some((b - a) / scale)
    } else {
        Some(0.0)
    }
}

/// Compute the silhouette width of every point under the partition `clusters`.
///
/// For each point, `b` is the smallest mean distance to the members of any
/// other cluster. Points in no cluster get `None`. Members of singleton
/// clusters, and every point when there is only one cluster, get a width of
/// zero.
pub fn silhouette_scores<P: ClusterPoint, M: DistanceMetric>(
    points: &[P],
    clusters: &[Cluster<P::PropertyA, P::PropertyB>],
    metric: &M,
) -> Vec<Option<f64>> {
    let mut scores = vec![None; points.len()];
    for (ci, cluster) in clusters.iter().enumerate() {
        for m in cluster.members() {
            let score = if cluster.len() < 2 {
                0.0
            } else {
                member_width(points, clusters, ci, *m, 0..clusters.len(), metric).unwrap_or(0.0)
            };
            if let Some(slot) = scores.get_mut(*m as usize) {
                *slot = Some(score);
            }
        }
    }
    scores
}

/// Like [`silhouette_scores`], but each point is only compared with clusters
/// whose centroid lies within `radius_cells` cells of it on a grid of
/// `cell_size` cells.
///
/// A point with no other cluster in reach is considered fully separated and
/// gets a width of one, unless there is only one cluster at all.
pub(crate) fn local_silhouette_scores<P: ClusterPoint, M: DistanceMetric>(
    points: &[P],
    clusters: &[Cluster<P::PropertyA, P::PropertyB>],
    metric: &M,
    cell_size: (f64, f64),
    radius_cells: u32,
) -> Result<Vec<Option<f64>>, ConfigurationError> {
    let mut centroids = SpatialGrid::new(cell_size.0, cell_size.1)?;
    for (ci, cluster) in clusters.iter().enumerate() {
        centroids.insert(ci as IndexType, cluster.centroid())?;
    }
    let isolated = if clusters.len() > 1 { 1.0 } else { 0.0 };

    let mut scores = vec![None; points.len()];
    for (ci, cluster) in clusters.iter().enumerate() {
        for m in cluster.members() {
            let score = if cluster.len() < 2 {
                0.0
            } else {
                let nearby = centroids
                    .neighbors(points[*m as usize].position(), radius_cells)
                    .map(|j| j as usize);
                member_width(points, clusters, ci, *m, nearby, metric).unwrap_or(isolated)
            };
            if let Some(slot) = scores.get_mut(*m as usize) {
                *slot = Some(score);
            }
        }
    }
    Ok(scores)
}

/// The mean silhouette width over all clustered points, or `None` if no point
/// is clustered
pub fn average_silhouette_width(scores: &[Option<f64>]) -> Option<f64> {
    let (total, count) = scores
        .iter()
        .flatten()
        .copied()
        .fold((0.0f64, 0usize), |(t, c), s| (t + s, c + 1));
    if count == 0 {
        None
    } else {
        Some(total / count as f64)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cluster::ScaledEuclidean;

    fn build(points: &[(f64, f64)], groups: &[&[IndexType]]) -> Vec<Cluster<(), ()>> {
        groups
            .iter()
            .map(|members| {
                let mut cluster = Cluster::seed(members[0], &points[members[0] as usize]);
                for m in members[1..].iter() {
                    cluster.add(*m, &points[*m as usize]);
                }
                cluster
            })
            .collect()
    }

    fn two_groups() -> (Vec<(f64, f64)>, Vec<Cluster<(), ()>>) {
        let points = vec![(0.0, 0.0), (1.0, 0.0), (10.0, 0.0), (11.0, 0.0), (50.0, 50.0)];
        let clusters = build(&points, &[&[0, 1], &[2, 3]]);
        (points, clusters)
    }

    #[test]
    fn test_separated_groups() {
        let (points, clusters) = two_groups();
        let scores = silhouette_scores(&points, &clusters, &ScaledEuclidean::default());
        // a = 1, b = mean(10, 11) = 10.5 for point 0
        let s0 = scores[0].unwrap();
        assert!((s0 - (10.5 - 1.0) / 10.5).abs() < 1e-12);
        // point 1: a = 1, b = mean(9, 10)
        let s1 = scores[1].unwrap();
        assert!((s1 - (9.5 - 1.0) / 9.5).abs() < 1e-12);
        assert_eq!(scores[4], None);

        let avg = average_silhouette_width(&scores).unwrap();
        assert!(avg > 0.85 && avg < 1.0);
    }

    #[test]
    fn test_nearest_cluster_chosen_per_point() {
        // The wide cluster's centroid sits on top of the first cluster, but its
        // members are far away. The tight cluster at 6 is nearer by mean distance.
        let points = vec![(0.0, 0.0), (1.0, 0.0), (-20.0, 0.0), (21.0, 0.0), (6.0, 0.0), (6.0, 0.0)];
        let clusters = build(&points, &[&[0, 1], &[2, 3], &[4, 5]]);
        let scores = silhouette_scores(&points, &clusters, &ScaledEuclidean::default());
        // point 0: a = 1, b = min(20.5, 6)
        assert!((scores[0].unwrap() - 5.0 / 6.0).abs() < 1e-12);
        // point 1: a = 1, b = min(20.5, 5)
        assert!((scores[1].unwrap() - 4.0 / 5.0).abs() < 1e-12);
        // point 4: a = 0, b = min(5.5, 20.5)
        assert_eq!(scores[4], Some(1.0));
    }

    #[test]
    fn test_local_scores() {
        let (points, clusters) = two_groups();
        let metric = ScaledEuclidean::default();
        let exact = silhouette_scores(&points, &clusters, &metric);

        // Both centroids within reach: the same as the exact scores
        let local = local_silhouette_scores(&points, &clusters, &metric, (5.0, 5.0), 2).unwrap();
        assert_eq!(local, exact);

        // Neither centroid within reach of the other group
        let local = local_silhouette_scores(&points, &clusters, &metric, (1.0, 1.0), 1).unwrap();
        assert_eq!(local[0], Some(1.0));
        assert_eq!(local[3], Some(1.0));
        assert_eq!(local[4], None);

        let local = local_silhouette_scores(&points, &clusters[..1], &metric, (1.0, 1.0), 1).unwrap();
        assert_eq!(local[0], Some(0.0));

        assert!(local_silhouette_scores(&points, &clusters, &metric, (0.0, 1.0), 1).is_err());
    }

    #[test]
    fn test_degenerate_partitions() {
        let (points, clusters) = two_groups();
        let metric = ScaledEuclidean::default();

        let scores = silhouette_scores(&points, &clusters[..1], &metric);
        assert_eq!(scores[0], Some(0.0));
        assert_eq!(scores[1], Some(0.0));
        assert_eq!(scores[2], None);

        let singleton = vec![Cluster::seed(4, &points[4]), clusters[0].clone()];
        let scores = silhouette_scores(&points, &singleton, &metric);
        assert_eq!(scores[4], Some(0.0));
        assert!(scores[0].unwrap() > 0.9);

        assert_eq!(average_silhouette_width(&[None, None]), None);
    }
}
