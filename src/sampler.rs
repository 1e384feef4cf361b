//! Sampling of MF activation patterns.
//!
//! Two generative models are supported:
//! - independent activation (correlation radius 0): exactly `round(f_mf * N_mf)` MFs are ON,
//!   chosen uniformly without replacement;
//! - spatially correlated activation (positive radius): a latent Gaussian vector `t = R^T z`,
//!   with `z` standard normal, is thresholded at `-g`. The operator and threshold reproduce the
//!   target pairwise correlations, not the target count: the number of ON MFs is emergent and
//!   only matches `f_mf * N_mf` on average.
//!
//! Sampling never touches a global generator. Every pattern is drawn from a [`ChaCha8Rng`]
//! seeded with the run seed, so the same inputs always give the same pattern.
//!
//! # Examples
//!
//! ```rust
//! use rusty_gcl::sampler::ActivationSampler;
//!
//! let sampler = ActivationSampler::independent(187);
//! let pattern = sampler.sample_seeded(0.5, 42).unwrap();
//!
//! assert_eq!(pattern.num_on(), 94);
//! assert_eq!(pattern, sampler.sample_seeded(0.5, 42).unwrap());
//! ```
use nalgebra::DVector;
use rand::seq::index;
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::correlation::CorrelationStructure;
use crate::error::GclError;

/// The ON/OFF state of every MF for one run.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ActivationPattern {
    active: Vec<bool>,
}

impl ActivationPattern {
    /// Create a pattern of `num_mf` MFs where exactly the given MFs are ON.
    /// Returns an error if an index is out of bounds.
    pub fn from_on_indices(num_mf: usize, on_indices: &[usize]) -> Result<Self, GclError> {
        let mut active = vec![false; num_mf];
        for &mf_id in on_indices {
            match active.get_mut(mf_id) {
                Some(state) => *state = true,
                None => {
                    return Err(GclError::OutOfBounds(format!(
                        "MF {} does not exist among {} MFs",
                        mf_id, num_mf
                    )))
                }
            }
        }
        Ok(ActivationPattern { active })
    }

    /// The number of MFs.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Whether the given MF is ON.
    pub fn is_on(&self, mf_id: usize) -> bool {
        self.active.get(mf_id).copied().unwrap_or(false)
    }

    /// The realized number of ON MFs.
    pub fn num_on(&self) -> usize {
        self.active.iter().filter(|&&on| on).count()
    }

    /// The ON MFs, in increasing order.
    pub fn on_indices(&self) -> Vec<usize> {
        self.indices(true)
    }

    /// The OFF MFs, in increasing order.
    pub fn off_indices(&self) -> Vec<usize> {
        self.indices(false)
    }

    fn indices(&self, state: bool) -> Vec<usize> {
        self.active
            .iter()
            .enumerate()
            .filter_map(|(mf_id, &on)| (on == state).then_some(mf_id))
            .collect()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.active
    }
}

/// The generative model behind an [`ActivationSampler`].
#[derive(Debug, Clone, Copy)]
pub enum ActivationModel<'a> {
    /// Every MF is equally likely to be ON, with an exact ON count.
    Independent,
    /// MFs are ON according to a thresholded, spatially correlated Gaussian field.
    Correlated(&'a CorrelationStructure),
}

/// Draws activation patterns over a fixed MF population.
#[derive(Debug, Clone)]
pub struct ActivationSampler<'a> {
    num_mf: usize,
    model: ActivationModel<'a>,
}

impl<'a> ActivationSampler<'a> {
    /// A sampler for the independent model.
    pub fn independent(num_mf: usize) -> Self {
        ActivationSampler {
            num_mf,
            model: ActivationModel::Independent,
        }
    }

    /// A sampler for the correlated model, acting on all MFs of the structure.
    pub fn correlated(structure: &'a CorrelationStructure) -> Self {
        ActivationSampler {
            num_mf: structure.num_mf(),
            model: ActivationModel::Correlated(structure),
        }
    }

    /// A sampler for `num_mf` MFs: independent without a correlation structure, correlated otherwise.
    /// Returns an error if the structure does not act on exactly `num_mf` MFs.
    pub fn new(
        num_mf: usize,
        structure: Option<&'a CorrelationStructure>,
    ) -> Result<Self, GclError> {
        match structure {
            None => Ok(ActivationSampler::independent(num_mf)),
            Some(structure) if structure.num_mf() == num_mf => {
                Ok(ActivationSampler::correlated(structure))
            }
            Some(structure) => Err(GclError::IncompatibleShapes(format!(
                "The correlation structure (radius {}) acts on {} MFs, but the network has {}",
                structure.radius(),
                structure.num_mf(),
                num_mf
            ))),
        }
    }

    pub fn num_mf(&self) -> usize {
        self.num_mf
    }

    /// The correlation radius, 0 for the independent model.
    pub fn radius(&self) -> u32 {
        match self.model {
            ActivationModel::Independent => 0,
            ActivationModel::Correlated(structure) => structure.radius(),
        }
    }

    /// Draw the pattern of a run from a generator freshly seeded with `seed`.
    pub fn sample_seeded(&self, f_mf: f64, seed: u64) -> Result<ActivationPattern, GclError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        self.sample(f_mf, &mut rng)
    }

    /// Draw a pattern with the target activation fraction `f_mf`.
    pub fn sample<R: Rng>(&self, f_mf: f64, rng: &mut R) -> Result<ActivationPattern, GclError> {
        if !(0.0..=1.0).contains(&f_mf) {
            return Err(GclError::InvalidParameter(format!(
                "The activation fraction must be in [0, 1], got {}",
                f_mf
            )));
        }

        let pattern = match self.model {
            ActivationModel::Independent => self.sample_independent(f_mf, rng),
            ActivationModel::Correlated(structure) => {
                self.sample_correlated(structure, f_mf, rng)?
            }
        };
        log::trace!(
            "Sampled {} ON MFs out of {} (target fraction {}, radius {})",
            pattern.num_on(),
            self.num_mf,
            f_mf,
            self.radius()
        );
        Ok(pattern)
    }

    fn sample_independent<R: Rng>(&self, f_mf: f64, rng: &mut R) -> ActivationPattern {
        let num_on = (f_mf * self.num_mf as f64).round() as usize;
        let mut on_indices = index::sample(rng, self.num_mf, num_on.min(self.num_mf)).into_vec();
        on_indices.sort_unstable();

        let mut active = vec![false; self.num_mf];
        on_indices.into_iter().for_each(|mf_id| active[mf_id] = true);
        ActivationPattern { active }
    }

    fn sample_correlated<R: Rng>(
        &self,
        structure: &CorrelationStructure,
        f_mf: f64,
        rng: &mut R,
    ) -> Result<ActivationPattern, GclError> {
        let bin = structure.lookup(f_mf)?;
        let z = DVector::<f64>::from_iterator(
            self.num_mf,
            (0..self.num_mf).map(|_| StandardNormal.sample(rng)),
        );
        let t = bin.operator().tr_mul(&z);
        let active = t.iter().map(|&ti| ti > -bin.threshold()).collect();
        Ok(ActivationPattern { active })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NUM_FRACTION_BINS;
    use nalgebra::DMatrix;

    const SEED: u64 = 42;

    fn rank_one_structure(num_mf: usize) -> CorrelationStructure {
        // Every latent variable equals the first normal draw.
        let mut operator = DMatrix::zeros(num_mf, num_mf);
        operator.row_mut(0).fill(1.0);
        let bins = (0..NUM_FRACTION_BINS).map(|_| (operator.clone(), 0.0)).collect();
        CorrelationStructure::build(30, bins).unwrap()
    }

    fn identity_structure(num_mf: usize) -> CorrelationStructure {
        let bins = (0..NUM_FRACTION_BINS)
            .map(|i| (DMatrix::identity(num_mf, num_mf), -1.5 + 0.15 * i as f64))
            .collect();
        CorrelationStructure::build(5, bins).unwrap()
    }

    /// Every MF mixes a latent component shared by all MFs, with weight `shared`, with a private
    /// component that differs between fraction bins.
    fn shared_latent_structure(num_mf: usize, radius: u32, shared: f64) -> CorrelationStructure {
        let private = (1.0 - shared * shared).sqrt();
        let bins = (0..NUM_FRACTION_BINS)
            .map(|bin| {
                let mut operator = DMatrix::zeros(num_mf, num_mf);
                for mf_id in 0..num_mf {
                    operator[(0, mf_id)] = shared;
                    operator[(1 + (mf_id + 7 * bin) % (num_mf - 1), mf_id)] = private;
                }
                let f_mf = 0.05 * (bin + 1) as f64;
                (operator, 2.5 * (f_mf - 0.5))
            })
            .collect();
        CorrelationStructure::build(radius, bins).unwrap()
    }

    fn agreement(pattern_1: &ActivationPattern, pattern_2: &ActivationPattern) -> f64 {
        let num_equal = pattern_1
            .as_slice()
            .iter()
            .zip(pattern_2.as_slice())
            .filter(|(a, b)| a == b)
            .count();
        num_equal as f64 / pattern_1.len() as f64
    }

    #[test]
    fn test_pattern_indices() {
        let pattern = ActivationPattern::from_on_indices(5, &[3, 0]).unwrap();
        assert_eq!(pattern.on_indices(), vec![0, 3]);
        assert_eq!(pattern.off_indices(), vec![1, 2, 4]);
        assert_eq!(pattern.num_on(), 2);
        assert!(pattern.is_on(3));
        assert!(!pattern.is_on(7));
        assert!(ActivationPattern::from_on_indices(5, &[5]).is_err());
    }

    #[test]
    fn test_independent_exact_count() {
        for &num_mf in [1, 4, 10, 187].iter() {
            let sampler = ActivationSampler::independent(num_mf);
            for &f_mf in [0.0, 0.05, 0.1, 0.33, 0.5, 0.9, 1.0].iter() {
                for seed in 0..5 {
                    let pattern = sampler.sample_seeded(f_mf, seed).unwrap();
                    assert_eq!(pattern.len(), num_mf);
                    assert_eq!(pattern.num_on(), (f_mf * num_mf as f64).round() as usize);
                }
            }
        }
    }

    #[test]
    fn test_independent_deterministic() {
        let sampler = ActivationSampler::independent(187);
        let pattern_1 = sampler.sample_seeded(0.3, SEED).unwrap();
        let pattern_2 = sampler.sample_seeded(0.3, SEED).unwrap();
        assert_eq!(pattern_1.on_indices(), pattern_2.on_indices());

        let pattern_3 = sampler.sample_seeded(0.3, SEED + 1).unwrap();
        assert_ne!(pattern_1, pattern_3);
    }

    #[test]
    fn test_independent_small_network() {
        let sampler = ActivationSampler::independent(4);
        let pattern = sampler.sample_seeded(0.5, 7).unwrap();
        assert_eq!(pattern.num_on(), 2);
        assert_eq!(pattern.on_indices().len() + pattern.off_indices().len(), 4);
    }

    #[test]
    fn test_invalid_fraction() {
        let sampler = ActivationSampler::independent(10);
        assert!(matches!(
            sampler.sample_seeded(1.5, SEED),
            Err(GclError::InvalidParameter(_))
        ));
        assert!(matches!(
            sampler.sample_seeded(f64::NAN, SEED),
            Err(GclError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_new_checks_shapes() {
        let structure = identity_structure(6);
        assert_eq!(ActivationSampler::new(6, Some(&structure)).unwrap().radius(), 5);
        assert_eq!(ActivationSampler::new(6, None).unwrap().radius(), 0);
        assert!(matches!(
            ActivationSampler::new(7, Some(&structure)),
            Err(GclError::IncompatibleShapes(_))
        ));
    }

    #[test]
    fn test_correlated_deterministic() {
        let structure = identity_structure(50);
        let sampler = ActivationSampler::correlated(&structure);
        for seed in 0..10 {
            assert_eq!(
                sampler.sample_seeded(0.4, seed).unwrap(),
                sampler.sample_seeded(0.4, seed).unwrap()
            );
        }
    }

    #[test]
    fn test_correlated_threshold() {
        let structure = identity_structure(20);
        let sampler = ActivationSampler::correlated(&structure);

        // With an identity operator, the latent vector is the normal draw itself.
        let mut rng = ChaCha8Rng::seed_from_u64(SEED);
        let z: Vec<f64> = (0..20).map(|_| StandardNormal.sample(&mut rng)).collect();
        let g = structure.lookup(0.5).unwrap().threshold();

        let pattern = sampler.sample_seeded(0.5, SEED).unwrap();
        for (mf_id, zi) in z.iter().enumerate() {
            assert_eq!(pattern.is_on(mf_id), *zi > -g);
        }
    }

    #[test]
    fn test_agreement_across_fractions_grows_with_radius() {
        let num_mf = 200;
        let structures: Vec<CorrelationStructure> = [(5, 0.0), (10, 0.6), (20, 0.9)]
            .iter()
            .map(|&(radius, shared)| shared_latent_structure(num_mf, radius, shared))
            .collect();

        let mean_agreements: Vec<f64> = structures
            .iter()
            .map(|structure| {
                let sampler = ActivationSampler::correlated(structure);
                let total: f64 = (0..50)
                    .map(|seed| {
                        let low = sampler.sample_seeded(0.3, seed).unwrap();
                        let high = sampler.sample_seeded(0.5, seed).unwrap();
                        agreement(&low, &high)
                    })
                    .sum();
                total / 50.0
            })
            .collect();

        assert!(mean_agreements.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_correlated_fully_coherent() {
        let structure = rank_one_structure(30);
        let sampler = ActivationSampler::correlated(&structure);
        for seed in 0..20 {
            let num_on = sampler.sample_seeded(0.5, seed).unwrap().num_on();
            assert!(num_on == 0 || num_on == 30);
        }
    }
}
