//! SMOTE-style minority oversampling.
//!
//! Synthetic rows are interpolations `x + gap * (nn - x)` between a minority
//! row and one of its `k` nearest minority neighbours (squared Euclidean
//! distance in TF-IDF space), `gap ~ U[0, 1)`. Base rows are taken round-robin
//! so every minority example seeds new ones; neighbour choice and gap come
//! from a seeded RNG. Output = input rows followed by the synthetic ones.

use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::debug;

use crate::dataset::{Label, TrainingSet};
use crate::error::TrainingFailed;
use crate::vectorize::FeatureVector;

/// Class-balancing step applied to the training split only.
pub trait Resampler: Send + Sync {
    fn resample(&self, set: TrainingSet) -> Result<TrainingSet, TrainingFailed>;
}

#[derive(Debug, Clone, Copy)]
pub struct Smote {
    pub k_neighbors: usize,
    pub seed: u64,
}

impl Default for Smote {
    fn default() -> Self {
        Self {
            k_neighbors: 5,
            seed: 42,
        }
    }
}

impl Resampler for Smote {
    fn resample(&self, set: TrainingSet) -> Result<TrainingSet, TrainingFailed> {
        let counts = set.class_counts();
        if counts.normal == 0 || counts.offensive == 0 {
            return Err(TrainingFailed::dataset(format!(
                "training split has a single class {counts}; cannot resample"
            )));
        }
        if counts.is_balanced() {
            return Ok(set);
        }

        let (minority, n_missing) = if counts.normal < counts.offensive {
            (Label::Normal, counts.offensive - counts.normal)
        } else {
            (Label::Offensive, counts.normal - counts.offensive)
        };

        let (mut features, mut labels) = set.into_parts();
        let pool: Vec<&FeatureVector> = features
            .iter()
            .zip(&labels)
            .filter(|(_, l)| **l == minority)
            .map(|(x, _)| x)
            .collect();

        let k = self.k_neighbors.min(pool.len() - 1);
        let neighbors = nearest_neighbors(&pool, k);
        debug!(target: "training", ?minority, n_missing, k, "smote neighbours ready");

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut synthetic = Vec::with_capacity(n_missing);
        for s in 0..n_missing {
            let base = s % pool.len();
            let row = if k == 0 {
                // a lone minority example can only be repeated
                pool[base].clone()
            } else {
                let nn = neighbors[base][rng.random_range(0..k)];
                let gap: f64 = rng.random();
                pool[base].interpolate(pool[nn], gap)
            };
            synthetic.push(row);
        }

        features.extend(synthetic);
        labels.extend(std::iter::repeat(minority).take(n_missing));
        TrainingSet::new(features, labels)
    }
}

/// For each pool row, the indices of its `k` nearest other rows
/// (ties broken by index).
fn nearest_neighbors(pool: &[&FeatureVector], k: usize) -> Vec<Vec<usize>> {
    if k == 0 {
        return vec![Vec::new(); pool.len()];
    }
    let by_distance = |a: &(f64, usize), b: &(f64, usize)| -> Ordering {
        a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
    };
    pool.par_iter()
        .enumerate()
        .map(|(i, x)| {
            let mut cands: Vec<(f64, usize)> = pool
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(j, y)| (x.squared_distance(y), j))
                .collect();
            if cands.len() > k {
                cands.select_nth_unstable_by(k - 1, by_distance);
                cands.truncate(k);
            }
            cands.sort_by(by_distance);
            cands.into_iter().map(|(_, j)| j).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(dense: &[f64]) -> FeatureVector {
        FeatureVector::from_pairs(dense.len(), dense.iter().copied().enumerate())
    }

    fn skewed() -> TrainingSet {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..12 {
            features.push(fv(&[1.0, i as f64 * 0.1, 0.0]));
            labels.push(Label::Offensive);
        }
        for i in 0..4 {
            features.push(fv(&[0.0, 0.0, 1.0 + i as f64]));
            labels.push(Label::Normal);
        }
        TrainingSet::new(features, labels).unwrap()
    }

    #[test]
    fn balances_classes() {
        let out = Smote::default().resample(skewed()).unwrap();
        let c = out.class_counts();
        assert_eq!(c.normal, 12);
        assert_eq!(c.offensive, 12);
        assert_eq!(out.len(), 24);
    }

    #[test]
    fn keeps_originals_and_interpolates_within_minority_hull() {
        let input = skewed();
        let originals = input.features().to_vec();
        let out = Smote::default().resample(input).unwrap();
        assert_eq!(&out.features()[..16], &originals[..]);
        for (x, l) in out.features()[16..].iter().zip(&out.labels()[16..]) {
            assert_eq!(*l, Label::Normal);
            let d = x.to_dense();
            assert_eq!(d[0], 0.0);
            assert_eq!(d[1], 0.0);
            assert!((1.0..=4.0).contains(&d[2]), "outside hull: {d:?}");
            assert_eq!(x.len(), 3);
        }
    }

    #[test]
    fn seeded_and_deterministic() {
        let a = Smote::default().resample(skewed()).unwrap();
        let b = Smote::default().resample(skewed()).unwrap();
        assert_eq!(a.features(), b.features());
        let c = Smote { seed: 7, ..Smote::default() }.resample(skewed()).unwrap();
        assert_ne!(a.features(), c.features());
    }

    #[test]
    fn balanced_input_is_untouched() {
        let set = TrainingSet::new(
            vec![fv(&[1.0]), fv(&[0.5])],
            vec![Label::Normal, Label::Offensive],
        )
        .unwrap();
        let out = Smote::default().resample(set.clone()).unwrap();
        assert_eq!(out.features(), set.features());
    }

    #[test]
    fn single_minority_example_is_repeated() {
        let set = TrainingSet::new(
            vec![fv(&[1.0, 0.0]), fv(&[0.0, 1.0]), fv(&[0.0, 0.9]), fv(&[0.0, 0.8])],
            vec![Label::Normal, Label::Offensive, Label::Offensive, Label::Offensive],
        )
        .unwrap();
        let out = Smote::default().resample(set).unwrap();
        assert_eq!(out.class_counts().normal, 3);
        assert!(out.features()[4..].iter().all(|x| x.to_dense() == vec![1.0, 0.0]));
    }

    #[test]
    fn single_class_is_rejected() {
        let set = TrainingSet::new(vec![fv(&[1.0])], vec![Label::Normal]).unwrap();
        assert!(matches!(
            Smote::default().resample(set),
            Err(TrainingFailed::DatasetInvalid(_))
        ));
    }

    #[test]
    fn neighbours_are_sorted_by_distance() {
        let rows = [fv(&[0.0]), fv(&[1.0]), fv(&[3.0]), fv(&[10.0])];
        let pool: Vec<&FeatureVector> = rows.iter().collect();
        let nn = nearest_neighbors(&pool, 2);
        assert_eq!(nn[0], vec![1, 2]);
        assert_eq!(nn[3], vec![2, 1]);
    }
}
