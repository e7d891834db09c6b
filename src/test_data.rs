use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::feature::Feature;
use crate::feature_store::FeatureStore;

/// Build a reference map of `n` features and a scene map holding the same
/// analytes with their retention times displaced by `shift` plus a small jitter.
pub(crate) fn shifted_pair(n: usize, shift: f64, seed: u64) -> (FeatureStore, FeatureStore) {
    let mut rng = StdRng::seed_from_u64(seed);
    let step = 1300.0 / n.max(1) as f64;
    let mut reference = FeatureStore::with_capacity(n);
    let mut scene = FeatureStore::with_capacity(n);
    for i in 0..n {
        let rt = rng.gen_range(600.0..2400.0);
        let mz = 200.0 + i as f64 * step + rng.gen_range(0.0..step * 0.2);
        let intensity = rng.gen_range(1e3..1e6);
        let charge = Some(rng.gen_range(1..=4));
        reference.push(Feature::new(rt, mz, intensity, charge, 0));
        scene.push(Feature::new(
            rt - shift + rng.gen_range(-0.5..0.5),
            mz + rng.gen_range(-0.002..0.002),
            intensity * rng.gen_range(0.8..1.2),
            charge,
            1,
        ));
    }
    (reference, scene)
}

/// Simulate `n_runs` replicate observations of `n_analytes` well separated
/// analytes. Feature `i` belongs to analyte `i / n_runs` and run `i % n_runs`.
pub(crate) fn replicate_runs(n_analytes: usize, n_runs: u32, seed: u64) -> FeatureStore {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut store = FeatureStore::with_capacity(n_analytes * n_runs as usize);
    for a in 0..n_analytes {
        let rt = 100.0 + (a % 20) as f64 * 60.0;
        let mz = 300.0 + (a / 20) as f64 * 25.0 + rng.gen_range(0.0..5.0);
        let charge = Some(1 + (a % 3) as i32);
        for run in 0..n_runs {
            store.push(Feature::new(
                rt + rng.gen_range(-2.0..2.0),
                mz + rng.gen_range(-0.005..0.005),
                rng.gen_range(1e4..1e6),
                charge,
                run,
            ));
        }
    }
    store
}
