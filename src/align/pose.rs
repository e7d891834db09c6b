use std::collections::BTreeSet;
use std::fmt::Display;

use log::{debug, trace, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::coordinate::IndexType;
use crate::error::{AlignmentError, ConfigurationError};
use crate::feature::Feature;
use crate::feature_store::FeatureStore;
use crate::grid::SpatialGrid;

use super::model::TransformationModel;
use super::params::AlignmentParameters;

/// The phases of a [`PoseClusteringRun`]. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlignmentState {
    Unstarted,
    CandidatesGenerated,
    Voted,
    ConsensusFound,
    Refined,
    Done,
    Failed,
}

impl AlignmentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl Display for AlignmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A pairing of a reference feature with a scene feature believed to be the
/// same analyte
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Correspondence {
    pub reference: IndexType,
    pub scene: IndexType,
    pub reference_rt: f64,
    pub scene_rt: f64,
}

impl Correspondence {
    fn new(reference: IndexType, scene: IndexType, r: &Feature, s: &Feature) -> Self {
        Self {
            reference,
            scene,
            reference_rt: r.rt,
            scene_rt: s.rt,
        }
    }

    /// The `(scene_rt, reference_rt)` pair a [`TransformationModel`] is fit on
    pub fn as_pair(&self) -> (f64, f64) {
        (self.scene_rt, self.reference_rt)
    }

    /// The shift this correspondence implies on its own
    pub fn shift(&self) -> f64 {
        self.reference_rt - self.scene_rt
    }
}

/// The transformation the most heavily voted neighborhood agrees on, before
/// refinement. The shift is measured at the scene's retention time center
/// when a scale is estimated.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Consensus {
    pub shift: f64,
    pub scale: f64,
    /// The number of votes in the winning neighborhood
    pub votes: usize,
}

/// Counts describing how an alignment was reached
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VotingSummary {
    pub reference_used: usize,
    pub scene_used: usize,
    /// m/z-compatible feature pairs
    pub candidates: usize,
    pub votes: usize,
    /// Whether affine vote generation stopped at [`AlignmentParameters::max_pair_votes`]
    pub truncated: bool,
    /// Correspondences dropped by residual pruning
    pub pruned: usize,
}

/// The outcome of a successful alignment
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Alignment<M> {
    /// The fitted model mapping scene retention times onto the reference
    pub model: M,
    /// The correspondences the model was fit on, ordered by reference then scene index
    pub correspondences: Vec<Correspondence>,
    pub consensus: Consensus,
    pub summary: VotingSummary,
}

impl<M: TransformationModel> Alignment<M> {
    /// Map a scene retention time into the reference's frame
    pub fn transform(&self, rt: f64) -> f64 {
        self.model.apply(rt)
    }
}

#[derive(Debug, Clone, Copy)]
struct Vote {
    shift: f64,
    scale: f64,
    /// The candidate correspondences that cast this vote, equal for shift votes
    first: u32,
    second: u32,
}

/// Estimate the dominant retention time transformation between two feature maps
/// by pose clustering.
///
/// See the [module documentation](crate::align) for an outline.
#[derive(Debug, Clone)]
pub struct PoseClusteringAligner {
    params: AlignmentParameters,
}

impl PoseClusteringAligner {
    pub fn new(params: AlignmentParameters) -> Result<Self, ConfigurationError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &AlignmentParameters {
        &self.params
    }

    /// Prepare an alignment of `scene` onto `reference` that can be driven one
    /// phase at a time
    pub fn start<'a, M: TransformationModel>(
        &'a self,
        reference: &'a FeatureStore,
        scene: &'a FeatureStore,
    ) -> PoseClusteringRun<'a, M> {
        PoseClusteringRun::new(&self.params, reference, scene)
    }

    /// Align `scene` onto `reference`, fitting a model of type `M` to the
    /// consensus correspondences.
    ///
    /// # Errors
    /// [`AlignmentError::InsufficientCorrespondences`] if too few correspondences
    /// support the winning transformation, which includes the case where no
    /// features are m/z-compatible at all. [`AlignmentError::Configuration`] if a
    /// feature has a non-finite coordinate, and [`AlignmentError::ModelFit`] if
    /// `M` cannot be fit.
    pub fn align<M: TransformationModel>(
        &self,
        reference: &FeatureStore,
        scene: &FeatureStore,
    ) -> Result<Alignment<M>, AlignmentError> {
        self.start(reference, scene).run()
    }
}

/// One alignment in progress. Each call to [`PoseClusteringRun::step`] advances
/// it by one phase.
#[derive(Debug)]
pub struct PoseClusteringRun<'a, M> {
    params: &'a AlignmentParameters,
    reference: &'a FeatureStore,
    scene: &'a FeatureStore,
    state: AlignmentState,
    summary: VotingSummary,
    candidates: Vec<Correspondence>,
    votes: Vec<Vote>,
    vote_grid: Option<SpatialGrid>,
    consensus: Option<Consensus>,
    accepted: Vec<Correspondence>,
    model: Option<M>,
    error: Option<AlignmentError>,
}

impl<'a, M: TransformationModel> PoseClusteringRun<'a, M> {
    fn new(params: &'a AlignmentParameters, reference: &'a FeatureStore, scene: &'a FeatureStore) -> Self {
        Self {
            params,
            reference,
            scene,
            state: AlignmentState::Unstarted,
            summary: VotingSummary::default(),
            candidates: Vec::new(),
            votes: Vec::new(),
            vote_grid: None,
            consensus: None,
            accepted: Vec::new(),
            model: None,
            error: None,
        }
    }

    pub fn state(&self) -> AlignmentState {
        self.state
    }

    pub fn summary(&self) -> &VotingSummary {
        &self.summary
    }

    /// The m/z-compatible feature pairs, once generated
    pub fn candidates(&self) -> &[Correspondence] {
        &self.candidates
    }

    /// The winning transformation, once voting has been tallied
    pub fn consensus(&self) -> Option<&Consensus> {
        self.consensus.as_ref()
    }

    /// Advance to the next phase, returning the state reached.
    ///
    /// A failed run keeps returning the error that stopped it, and a finished run
    /// stays [`AlignmentState::Done`].
    pub fn step(&mut self) -> Result<AlignmentState, AlignmentError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let outcome = match self.state {
            AlignmentState::Unstarted => self
                .generate_candidates()
                .map(|_| AlignmentState::CandidatesGenerated),
            AlignmentState::CandidatesGenerated => self.vote().map(|_| AlignmentState::Voted),
            AlignmentState::Voted => self.find_consensus().map(|_| AlignmentState::ConsensusFound),
            AlignmentState::ConsensusFound => self.refine().map(|_| AlignmentState::Refined),
            AlignmentState::Refined | AlignmentState::Done => Ok(AlignmentState::Done),
            AlignmentState::Failed => Ok(AlignmentState::Failed),
        };
        match outcome {
            Ok(state) => {
                self.state = state;
                Ok(state)
            }
            Err(err) => {
                debug!("Alignment failed in state {}: {}", self.state, err);
                self.state = AlignmentState::Failed;
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Drive the run to completion
    pub fn run(mut self) -> Result<Alignment<M>, AlignmentError> {
        while !self.state.is_terminal() {
            self.step()?;
        }
        match (self.model, self.consensus) {
            (Some(model), Some(consensus)) => Ok(Alignment {
                model,
                correspondences: self.accepted,
                consensus,
                summary: self.summary,
            }),
            _ => Err(self.error.unwrap_or(AlignmentError::InsufficientCorrespondences {
                found: self.accepted.len(),
                required: self.params.min_correspondences,
                candidates: self.summary.candidates,
                votes: self.summary.votes,
            })),
        }
    }

    fn select(&self, store: &FeatureStore) -> Result<Vec<IndexType>, ConfigurationError> {
        let mut used = match self.params.num_used_points {
            Some(k) if k < store.len() => store.top_by_intensity(k),
            _ => (0..store.len() as IndexType).collect(),
        };
        used.sort_unstable();
        for i in used.iter() {
            let f = &store[*i as usize];
            if !f.is_finite() {
                return Err(ConfigurationError::NonFiniteCoordinate {
                    index: *i,
                    x: f.rt,
                    y: f.mz,
                });
            }
        }
        Ok(used)
    }

    fn generate_candidates(&mut self) -> Result<(), AlignmentError> {
        let reference_used = self.select(self.reference)?;
        let scene_used = self.select(self.scene)?;
        self.summary.reference_used = reference_used.len();
        self.summary.scene_used = scene_used.len();
        if reference_used.is_empty() || scene_used.is_empty() {
            debug!("One of the maps is empty, no candidate correspondences");
            return Ok(());
        }

        let max_mz = reference_used
            .iter()
            .map(|i| self.reference[*i as usize].mz)
            .chain(scene_used.iter().map(|i| self.scene[*i as usize].mz))
            .fold(0.0f64, |acc, mz| acc.max(mz.abs()));
        let tolerance = self.params.mz_tolerance;
        let max_shift = self.params.max_shift;

        let mz_width = tolerance.width_at(max_mz);
        if !(mz_width.is_finite() && mz_width > 0.0) {
            debug!("The m/z tolerance has no width at m/z {}, no candidate correspondences", max_mz);
            return Ok(());
        }
        let mut scene_grid = SpatialGrid::new(max_shift, mz_width)?;
        for i in scene_used.iter() {
            scene_grid.insert(*i, self.scene[*i as usize].position())?;
        }

        let reference = self.reference;
        let scene = self.scene;
        let pair_up = |r_idx: &IndexType| -> Vec<Correspondence> {
            let r = &reference[*r_idx as usize];
            let mut matches: Vec<Correspondence> = scene_grid
                .neighbors(r.position(), 1)
                .filter_map(|s_idx| {
                    let s = &scene[s_idx as usize];
                    if tolerance.test(s.mz, r.mz) && (r.rt - s.rt).abs() <= max_shift {
                        Some(Correspondence::new(*r_idx, s_idx, r, s))
                    } else {
                        None
                    }
                })
                .collect();
            matches.sort_by_key(|c| c.scene);
            matches
        };

        #[cfg(feature = "rayon")]
        let per_reference: Vec<Vec<Correspondence>> = {
            use rayon::prelude::*;
            reference_used.par_iter().map(pair_up).collect()
        };
        #[cfg(not(feature = "rayon"))]
        let per_reference: Vec<Vec<Correspondence>> = reference_used.iter().map(pair_up).collect();

        self.candidates = per_reference.into_iter().flatten().collect();
        self.summary.candidates = self.candidates.len();
        debug!(
            "Found {} candidate correspondences between {} reference and {} scene features",
            self.candidates.len(),
            reference_used.len(),
            scene_used.len()
        );
        Ok(())
    }

    fn rt_span(store: &FeatureStore, indices: impl Iterator<Item = IndexType>) -> f64 {
        let (lo, hi) = indices.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), i| {
            let rt = store[i as usize].rt;
            (lo.min(rt), hi.max(rt))
        });
        if hi >= lo {
            hi - lo
        } else {
            0.0
        }
    }

    fn shift_votes(&self) -> Vec<Vote> {
        self.candidates
            .iter()
            .enumerate()
            .map(|(i, c)| Vote {
                shift: c.shift(),
                scale: 1.0,
                first: i as u32,
                second: i as u32,
            })
            .collect()
    }

    /// Every pair of candidates far enough apart in both maps implies a scale and
    /// a shift. Votes are generated in candidate order until `max_pair_votes`.
    fn affine_votes(&mut self) -> Vec<Vote> {
        let candidates = &self.candidates;
        let reference_span = Self::rt_span(self.reference, candidates.iter().map(|c| c.reference));
        let scene_span = Self::rt_span(self.scene, candidates.iter().map(|c| c.scene));
        let min_reference_gap = self.params.rt_pair_distance_fraction * reference_span;
        let min_scene_gap = self.params.rt_pair_distance_fraction * scene_span;
        let max_scaling = self.params.max_scaling;
        let limit = self.params.max_pair_votes;
        let center = candidates.iter().map(|c| c.scene_rt).sum::<f64>() / candidates.len().max(1) as f64;

        let mut votes = Vec::new();
        'outer: for (i, a) in candidates.iter().enumerate() {
            for (j, b) in candidates.iter().enumerate().skip(i + 1) {
                if a.reference == b.reference || a.scene == b.scene {
                    continue;
                }
                let dr = b.reference_rt - a.reference_rt;
                let ds = b.scene_rt - a.scene_rt;
                if dr.abs() < min_reference_gap || ds.abs() < min_scene_gap || ds == 0.0 {
                    continue;
                }
                let scale = dr / ds;
                if !(scale >= 1.0 / max_scaling && scale <= max_scaling) {
                    continue;
                }
                if votes.len() >= limit {
                    self.summary.truncated = true;
                    break 'outer;
                }
                let shift = a.reference_rt + scale * (center - a.scene_rt) - center;
                votes.push(Vote {
                    shift,
                    scale,
                    first: i as u32,
                    second: j as u32,
                });
            }
        }
        if self.summary.truncated {
            warn!(
                "Affine vote generation stopped after {} votes from {} candidates",
                votes.len(),
                candidates.len()
            );
        }
        votes
    }

    fn vote(&mut self) -> Result<(), AlignmentError> {
        let votes = if self.params.affine {
            self.affine_votes()
        } else {
            self.shift_votes()
        };
        let empty = SpatialGrid::new(self.params.shift_bucket_size, self.params.scale_bucket_size)?;

        #[cfg(feature = "rayon")]
        let grid = {
            use rayon::prelude::*;
            votes
                .par_iter()
                .enumerate()
                .try_fold(
                    || empty.clone(),
                    |mut grid, (i, v)| {
                        grid.insert(i as IndexType, (v.shift, v.scale))?;
                        Ok::<_, ConfigurationError>(grid)
                    },
                )
                .try_reduce(
                    || empty.clone(),
                    |mut a, b| {
                        a.merge(b)?;
                        Ok(a)
                    },
                )?
        };
        #[cfg(not(feature = "rayon"))]
        let grid = {
            let mut grid = empty;
            for (i, v) in votes.iter().enumerate() {
                grid.insert(i as IndexType, (v.shift, v.scale))?;
            }
            grid
        };

        self.summary.votes = votes.len();
        debug!(
            "Cast {} votes into {} buckets",
            votes.len(),
            grid.cell_count()
        );
        self.votes = votes;
        self.vote_grid = Some(grid);
        Ok(())
    }

    fn insufficient(&self, found: usize) -> AlignmentError {
        AlignmentError::InsufficientCorrespondences {
            found,
            required: self.params.min_correspondences,
            candidates: self.summary.candidates,
            votes: self.summary.votes,
        }
    }

    fn find_consensus(&mut self) -> Result<(), AlignmentError> {
        let window = self.params.bucket_window;
        let Some(grid) = self.vote_grid.as_ref() else {
            return Err(self.insufficient(0));
        };
        let Some((key, count)) = grid.densest_cell(window) else {
            return Err(self.insufficient(0));
        };
        trace!("Winning bucket {:?} holds {} votes in its neighborhood", key, count);

        let mut shift = 0.0;
        let mut scale = 0.0;
        let mut supporting = BTreeSet::new();
        for v in grid.neighbors_of_cell(key, window) {
            let vote = &self.votes[v as usize];
            shift += vote.shift;
            scale += vote.scale;
            supporting.insert(vote.first);
            supporting.insert(vote.second);
        }
        let consensus = Consensus {
            shift: shift / count as f64,
            scale: scale / count as f64,
            votes: count,
        };

        let mut accepted: Vec<Correspondence> = supporting
            .into_iter()
            .map(|i| self.candidates[i as usize])
            .collect();
        accepted.sort_by(|a, b| a.reference.cmp(&b.reference).then_with(|| a.scene.cmp(&b.scene)));
        debug!(
            "Consensus shift {:.3} scale {:.4} from {} votes, {} supporting correspondences",
            consensus.shift,
            consensus.scale,
            consensus.votes,
            accepted.len()
        );

        if accepted.len() < self.params.min_correspondences {
            return Err(self.insufficient(accepted.len()));
        }
        self.consensus = Some(consensus);
        self.accepted = accepted;
        self.vote_grid = None;
        Ok(())
    }

    fn refine(&mut self) -> Result<(), AlignmentError> {
        let pairs: Vec<(f64, f64)> = self.accepted.iter().map(|c| c.as_pair()).collect();
        let model = M::fit(&pairs)?;

        let cutoff = self.params.residual_cutoff();
        let kept: Vec<Correspondence> = self
            .accepted
            .iter()
            .filter(|c| model.residual(c.as_pair()) <= cutoff)
            .copied()
            .collect();

        if kept.len() == self.accepted.len() {
            self.model = Some(model);
            return Ok(());
        }
        if kept.len() < self.params.min_correspondences {
            warn!(
                "Pruning residuals above {} would leave {} of {} correspondences, keeping all of them",
                cutoff,
                kept.len(),
                self.accepted.len()
            );
            self.model = Some(model);
            return Ok(());
        }

        let pairs: Vec<(f64, f64)> = kept.iter().map(|c| c.as_pair()).collect();
        let model = M::fit(&pairs)?;
        self.summary.pruned = self.accepted.len() - kept.len();
        debug!(
            "Pruned {} correspondences with residuals above {} and refit",
            self.summary.pruned, cutoff
        );
        self.accepted = kept;
        self.model = Some(model);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::align::{LinearModel, ShiftModel};
    use crate::mass_error::Tolerance;
    use crate::test_data;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn store(points: &[(f64, f64)]) -> FeatureStore {
        points.iter().map(|(rt, mz)| Feature::at(*rt, *mz)).collect()
    }

    #[test]
    fn test_simple_shift() {
        init_logging();
        let reference = store(&[(100.0, 500.0), (200.0, 600.0), (300.0, 700.0)]);
        let scene = store(&[(105.0, 500.0), (205.0, 600.0), (305.0, 700.0)]);
        let aligner = PoseClusteringAligner::new(AlignmentParameters::default()).unwrap();
        let alignment = aligner.align::<ShiftModel>(&reference, &scene).unwrap();

        assert!((alignment.model.shift + 5.0).abs() < 1e-9);
        assert!((alignment.consensus.shift + 5.0).abs() < 1e-9);
        assert_eq!(alignment.consensus.scale, 1.0);
        assert_eq!(alignment.correspondences.len(), 3);
        for (i, c) in alignment.correspondences.iter().enumerate() {
            assert_eq!(c.reference, i as IndexType);
            assert_eq!(c.scene, i as IndexType);
        }
        assert_eq!(alignment.summary.candidates, 3);
        assert_eq!(alignment.summary.pruned, 0);
        assert!(!alignment.summary.truncated);
    }

    #[test]
    fn test_state_machine() {
        let reference = store(&[(100.0, 500.0), (200.0, 600.0), (300.0, 700.0)]);
        let scene = store(&[(105.0, 500.0), (205.0, 600.0), (305.0, 700.0)]);
        let aligner = PoseClusteringAligner::new(AlignmentParameters::default()).unwrap();
        let mut run = aligner.start::<ShiftModel>(&reference, &scene);
        assert_eq!(run.state(), AlignmentState::Unstarted);
        assert_eq!(run.step().unwrap(), AlignmentState::CandidatesGenerated);
        assert_eq!(run.candidates().len(), 3);
        assert_eq!(run.step().unwrap(), AlignmentState::Voted);
        assert_eq!(run.summary().votes, 3);
        assert_eq!(run.step().unwrap(), AlignmentState::ConsensusFound);
        assert_eq!(run.consensus().unwrap().votes, 3);
        assert_eq!(run.step().unwrap(), AlignmentState::Refined);
        assert_eq!(run.step().unwrap(), AlignmentState::Done);
        assert_eq!(run.step().unwrap(), AlignmentState::Done);
        let alignment = run.run().unwrap();
        assert_eq!(alignment.transform(305.0), 300.0);
    }

    #[test]
    fn test_no_compatible_pairs() {
        let reference = store(&[(100.0, 500.0), (200.0, 600.0)]);
        let scene = store(&[(100.0, 900.0), (200.0, 950.0)]);
        let aligner = PoseClusteringAligner::new(AlignmentParameters::default()).unwrap();
        let mut run = aligner.start::<ShiftModel>(&reference, &scene);
        run.step().unwrap();
        run.step().unwrap();
        let err = run.step().unwrap_err();
        assert!(matches!(
            err,
            AlignmentError::InsufficientCorrespondences {
                found: 0,
                required: 2,
                candidates: 0,
                votes: 0
            }
        ));
        assert_eq!(run.state(), AlignmentState::Failed);
        assert_eq!(run.step().unwrap_err(), err);
        assert_eq!(run.run().unwrap_err(), err);

        let empty = FeatureStore::empty();
        assert!(matches!(
            aligner.align::<ShiftModel>(&empty, &scene),
            Err(AlignmentError::InsufficientCorrespondences { found: 0, .. })
        ));
    }

    #[test]
    fn test_non_finite_feature() {
        let reference = store(&[(100.0, 500.0), (f64::NAN, 600.0)]);
        let scene = store(&[(105.0, 500.0), (205.0, 600.0)]);
        let aligner = PoseClusteringAligner::new(AlignmentParameters::default()).unwrap();
        assert!(matches!(
            aligner.align::<ShiftModel>(&reference, &scene),
            Err(AlignmentError::Configuration(
                ConfigurationError::NonFiniteCoordinate { index: 1, .. }
            ))
        ));
    }

    #[test]
    fn test_recovers_shifts() {
        init_logging();
        let aligner = PoseClusteringAligner::new(AlignmentParameters::default()).unwrap();
        for (k, delta) in [-500.0, -240.0, -37.5, 0.0, 12.0, 333.0, 500.0].iter().enumerate() {
            let (reference, scene) = test_data::shifted_pair(200, *delta, k as u64);
            let alignment = aligner.align::<ShiftModel>(&reference, &scene).unwrap();
            assert!(
                (alignment.model.shift - delta).abs() < 0.25,
                "expected {delta}, got {}",
                alignment.model.shift
            );
            assert!(alignment.correspondences.len() >= 190);
            for c in alignment.correspondences.iter() {
                assert_eq!(c.reference, c.scene);
                assert!((alignment.transform(c.scene_rt) - c.reference_rt).abs() < 1.0);
            }
        }
    }

    #[test]
    fn test_top_k_prefilter() {
        let (reference, scene) = test_data::shifted_pair(300, 75.0, 42);
        let aligner = PoseClusteringAligner::new(
            AlignmentParameters::default().num_used_points(Some(100)),
        )
        .unwrap();
        let alignment = aligner.align::<ShiftModel>(&reference, &scene).unwrap();
        assert_eq!(alignment.summary.reference_used, 100);
        assert_eq!(alignment.summary.scene_used, 100);
        assert!((alignment.model.shift - 75.0).abs() < 0.25);
    }

    #[test]
    fn test_decoys_outvoted() {
        let (mut reference, scene) = test_data::shifted_pair(100, -120.0, 3);
        let mut rng = StdRng::seed_from_u64(9);
        // Unrelated features m/z-compatible with scene features, displaced away from the true shift
        let decoys: Vec<Feature> = scene
            .iter()
            .step_by(3)
            .map(|s| Feature::at(s.rt + rng.gen_range(0.0..900.0), s.mz + 0.1))
            .collect();
        reference.extend(decoys);
        let aligner = PoseClusteringAligner::new(AlignmentParameters::default()).unwrap();
        let alignment = aligner.align::<ShiftModel>(&reference, &scene).unwrap();
        assert!((alignment.model.shift + 120.0).abs() < 0.25);
        assert!(alignment.summary.candidates > 100);
        assert!(alignment.correspondences.iter().all(|c| c.reference < 100));
    }

    #[test]
    fn test_residual_pruning() {
        let reference = store(&[
            (100.0, 500.0),
            (200.0, 550.0),
            (300.0, 600.0),
            (400.0, 650.0),
            (500.0, 700.0),
            (600.0, 750.0),
        ]);
        let scene = store(&[
            (105.0, 500.0),
            (205.0, 550.0),
            (305.0, 600.0),
            (405.0, 650.0),
            (505.0, 700.0),
            (607.0, 750.0),
        ]);
        let aligner = PoseClusteringAligner::new(
            AlignmentParameters::default().residual_threshold(1.0),
        )
        .unwrap();
        let alignment = aligner.align::<ShiftModel>(&reference, &scene).unwrap();
        assert_eq!(alignment.summary.pruned, 1);
        assert_eq!(alignment.correspondences.len(), 5);
        assert!((alignment.model.shift + 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_pruning_skipped_when_too_few_remain() {
        let reference = store(&[(100.0, 500.0), (600.0, 750.0)]);
        let scene = store(&[(105.0, 500.0), (607.0, 750.0)]);
        let aligner = PoseClusteringAligner::new(
            AlignmentParameters::default().residual_threshold(0.5),
        )
        .unwrap();
        let alignment = aligner.align::<ShiftModel>(&reference, &scene).unwrap();
        assert_eq!(alignment.summary.pruned, 0);
        assert_eq!(alignment.correspondences.len(), 2);
        assert!((alignment.model.shift + 6.0).abs() < 1e-9);
    }

    fn affine_pair(n: usize, scale: f64, offset: f64) -> (FeatureStore, FeatureStore) {
        let mut rng = StdRng::seed_from_u64(17);
        let mut reference = FeatureStore::with_capacity(n);
        let mut scene = FeatureStore::with_capacity(n);
        for i in 0..n {
            let rt = rng.gen_range(600.0..2400.0);
            let mz = 300.0 + i as f64 * 10.0;
            reference.push(Feature::at(rt, mz));
            scene.push(Feature::at((rt - offset) / scale, mz));
        }
        (reference, scene)
    }

    #[test]
    fn test_affine() {
        init_logging();
        let (reference, scene) = affine_pair(40, 1.03, 20.0);
        let params = AlignmentParameters::default().affine(1.5, 0.005);
        let aligner = PoseClusteringAligner::new(params).unwrap();
        let alignment = aligner.align::<LinearModel>(&reference, &scene).unwrap();
        assert!((alignment.consensus.scale - 1.03).abs() < 1e-6);
        assert!((alignment.model.slope - 1.03).abs() < 1e-9);
        assert!((alignment.model.intercept - 20.0).abs() < 1e-6);
        assert_eq!(alignment.correspondences.len(), 40);
        assert!(!alignment.summary.truncated);
    }

    #[test]
    fn test_affine_truncation() {
        let (reference, scene) = affine_pair(40, 0.98, -10.0);
        let params = AlignmentParameters::default()
            .affine(1.5, 0.005)
            .max_pair_votes(25);
        let aligner = PoseClusteringAligner::new(params).unwrap();
        let alignment = aligner.align::<LinearModel>(&reference, &scene).unwrap();
        assert!(alignment.summary.truncated);
        assert_eq!(alignment.summary.votes, 25);
        assert!((alignment.model.slope - 0.98).abs() < 1e-9);
    }

    #[test]
    fn test_ppm_tolerance() {
        let reference = store(&[(100.0, 500.0), (200.0, 600.0), (300.0, 700.0)]);
        let scene = store(&[(90.0, 500.004), (190.0, 600.004), (290.0, 700.02)]);
        let params = AlignmentParameters::default().mz_tolerance(Tolerance::PPM(10.0));
        let aligner = PoseClusteringAligner::new(params).unwrap();
        let alignment = aligner.align::<ShiftModel>(&reference, &scene).unwrap();
        // 700.02 is ~29 ppm away from 700 and so never becomes a candidate
        assert_eq!(alignment.summary.candidates, 2);
        assert!((alignment.model.shift - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_ppm_tolerance_at_zero_mz() {
        let reference = store(&[(100.0, 0.0), (200.0, 0.0)]);
        let scene = store(&[(105.0, 0.0), (205.0, 0.0)]);
        let params = AlignmentParameters::default().mz_tolerance(Tolerance::PPM(10.0));
        let aligner = PoseClusteringAligner::new(params).unwrap();
        let mut run = aligner.start::<ShiftModel>(&reference, &scene);
        assert_eq!(run.step().unwrap(), AlignmentState::CandidatesGenerated);
        assert!(run.candidates().is_empty());
        assert!(matches!(
            run.run(),
            Err(AlignmentError::InsufficientCorrespondences {
                found: 0,
                candidates: 0,
                ..
            })
        ));
    }
}
