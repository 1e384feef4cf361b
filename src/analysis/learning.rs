//! Learnability probe: how fast a single-layer sigmoid classifier learns random labels of a
//! population code.
//!
//! The classifier has no hidden unit and a bias input. It is trained by stochastic gradient
//! descent on the squared error, one pattern at a time, in an order reshuffled every epoch.
use nalgebra::{DMatrix, DVector};
use rand::distributions::{Distribution, Uniform};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::LearningConfig;
use crate::error::GclError;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Index of the first maximum of a vector.
fn argmax(values: &DVector<f64>) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best_i, best), (i, &v)| {
            if v > best {
                (i, v)
            } else {
                (best_i, best)
            }
        })
        .0
}

/// One-hot targets (classes x patterns), each pattern belonging to a uniformly drawn class.
pub fn random_targets<R: Rng>(
    num_classes: usize,
    num_patterns: usize,
    rng: &mut R,
) -> DMatrix<f64> {
    let mut targets = DMatrix::zeros(num_classes, num_patterns);
    if num_classes > 0 {
        for k in 0..num_patterns {
            targets[(rng.gen_range(0..num_classes), k)] = 1.0;
        }
    }
    targets
}

/// Learning speed of an error curve: `1 / (e + 1)` with `e` the first (0-based) epoch whose error
/// is at most `cutoff`, or 0 if the error never gets that low.
///
/// # Examples
///
/// ```rust
/// use rusty_gcl::analysis::learning::learning_speed;
///
/// assert_eq!(learning_speed(&[0.5, 0.3, 0.2, 0.1], 0.2), 1.0 / 3.0);
/// assert_eq!(learning_speed(&[0.5, 0.3], 0.2), 0.0);
/// ```
pub fn learning_speed(curve: &[f64], cutoff: f64) -> f64 {
    curve
        .iter()
        .position(|err| *err <= cutoff)
        .map_or(0.0, |epoch| 1.0 / (epoch + 1) as f64)
}

/// Per-epoch error curves of a training session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LearningCurves {
    /// Mean over patterns of the RMS output error.
    pub rms: Vec<f64>,
    /// Fraction of patterns whose most active output is the target class.
    pub matches: Vec<f64>,
}

impl LearningCurves {
    pub fn num_epochs(&self) -> usize {
        self.rms.len()
    }

    pub fn speed(&self, cutoff: f64) -> f64 {
        learning_speed(&self.rms, cutoff)
    }

    pub fn final_rms(&self) -> f64 {
        self.rms.last().copied().unwrap_or(f64::NAN)
    }

    /// The match rate of the last epoch.
    pub fn classification_score(&self) -> f64 {
        self.matches.last().copied().unwrap_or(f64::NAN)
    }
}

/// A single-layer sigmoid classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Perceptron {
    /// Weights from the inputs (last row being the bias) to the outputs.
    weights: DMatrix<f64>,
    learning_rate: f64,
}

impl Perceptron {
    /// Create a classifier with weights drawn uniformly in `(-1, 1) / (num_inputs + 1)`.
    pub fn new<R: Rng>(
        num_inputs: usize,
        num_outputs: usize,
        learning_rate: f64,
        rng: &mut R,
    ) -> Result<Self, GclError> {
        if num_outputs == 0 {
            return Err(GclError::InvalidParameter(
                "The classifier needs at least one output".to_string(),
            ));
        }
        if !(learning_rate > 0.0) {
            return Err(GclError::InvalidParameter(format!(
                "The learning rate must be positive, got {}",
                learning_rate
            )));
        }
        let scale = 1.0 / (num_inputs + 1) as f64;
        let dist = Uniform::new(-scale, scale);
        let weights = DMatrix::from_fn(num_inputs + 1, num_outputs, |_, _| dist.sample(rng));
        Ok(Perceptron {
            weights,
            learning_rate,
        })
    }

    pub fn num_inputs(&self) -> usize {
        self.weights.nrows() - 1
    }

    pub fn num_outputs(&self) -> usize {
        self.weights.ncols()
    }

    pub fn weights(&self) -> &DMatrix<f64> {
        &self.weights
    }

    fn with_bias(input: &[f64]) -> DVector<f64> {
        DVector::from_iterator(
            input.len() + 1,
            input.iter().copied().chain(std::iter::once(1.0)),
        )
    }

    fn forward_biased(&self, biased: &DVector<f64>) -> DVector<f64> {
        self.weights.tr_mul(biased).map(sigmoid)
    }

    /// The output activations for an input pattern.
    pub fn forward(&self, input: &[f64]) -> DVector<f64> {
        self.forward_biased(&Perceptron::with_bias(input))
    }

    /// One gradient step on a pattern. Returns the RMS error of the output before the update and
    /// whether the most active output was the target class.
    pub fn step(&mut self, input: &[f64], target: &DVector<f64>) -> (f64, bool) {
        let biased = Perceptron::with_bias(input);
        let output = self.forward_biased(&biased);
        let err = &output - target;
        let delta = output.zip_map(&err, |o, e| o * (1.0 - o) * e);
        self.weights.ger(-self.learning_rate, &biased, &delta, 1.0);

        let rms = (err.norm_squared() / err.len() as f64).sqrt();
        (rms, argmax(&output) == argmax(target))
    }

    /// Train on the columns of `samples` (inputs x patterns) against `targets` (outputs x patterns).
    pub fn train<R: Rng>(
        &mut self,
        samples: &DMatrix<f64>,
        targets: &DMatrix<f64>,
        num_epochs: usize,
        rng: &mut R,
    ) -> Result<LearningCurves, GclError> {
        if samples.nrows() != self.num_inputs()
            || targets.nrows() != self.num_outputs()
            || samples.ncols() != targets.ncols()
        {
            return Err(GclError::IncompatibleShapes(format!(
                "Cannot train a {} -> {} classifier on ({} x {}) samples with ({} x {}) targets",
                self.num_inputs(),
                self.num_outputs(),
                samples.nrows(),
                samples.ncols(),
                targets.nrows(),
                targets.ncols()
            )));
        }
        let num_patterns = samples.ncols();
        if num_patterns == 0 {
            return Err(GclError::InvalidParameter(
                "Cannot train without any pattern".to_string(),
            ));
        }

        let inputs: Vec<Vec<f64>> = samples
            .column_iter()
            .map(|column| column.iter().copied().collect())
            .collect();
        let outputs: Vec<DVector<f64>> = targets.column_iter().map(|c| c.into_owned()).collect();

        let mut order: Vec<usize> = (0..num_patterns).collect();
        order.shuffle(rng);

        let mut curves = LearningCurves::default();
        for epoch in 0..num_epochs {
            let mut rms_sum = 0.0;
            let mut num_matches = 0usize;
            for &k in order.iter() {
                let (rms, matched) = self.step(&inputs[k], &outputs[k]);
                rms_sum += rms;
                num_matches += matched as usize;
            }
            curves.rms.push(rms_sum / num_patterns as f64);
            curves.matches.push(num_matches as f64 / num_patterns as f64);
            order.shuffle(rng);

            if epoch % 1000 == 0 {
                log::trace!("Epoch {}: RMS error {:.4}", epoch, curves.rms[epoch]);
            }
        }
        Ok(curves)
    }
}

/// Learning curves of the MF and GC codes of one configuration, trained on the same labels.
#[derive(Debug, Clone, PartialEq)]
pub struct LearnabilityProbe {
    pub mf: LearningCurves,
    pub grc: LearningCurves,
}

impl LearnabilityProbe {
    /// Draw random labels and train one classifier on each population.
    pub fn run(
        samples_mf: &DMatrix<f64>,
        samples_grc: &DMatrix<f64>,
        config: &LearningConfig,
        seed: u64,
    ) -> Result<Self, GclError> {
        if samples_mf.ncols() != samples_grc.ncols() {
            return Err(GclError::IncompatibleShapes(format!(
                "MF and GC samples hold {} and {} patterns",
                samples_mf.ncols(),
                samples_grc.ncols()
            )));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let targets = random_targets(config.num_classes, samples_mf.ncols(), &mut rng);

        let mut train = |samples: &DMatrix<f64>| -> Result<LearningCurves, GclError> {
            let mut classifier = Perceptron::new(
                samples.nrows(),
                config.num_classes,
                config.learning_rate,
                &mut rng,
            )?;
            classifier.train(samples, &targets, config.num_epochs, &mut rng)
        };
        let mf = train(samples_mf)?;
        let grc = train(samples_grc)?;
        Ok(LearnabilityProbe { mf, grc })
    }

    /// Summary row: MF and GC learning speeds, final RMS errors and classification scores.
    pub fn summary(&self, cutoff: f64) -> Vec<f64> {
        vec![
            self.mf.speed(cutoff),
            self.grc.speed(cutoff),
            self.mf.final_rms(),
            self.grc.final_rms(),
            self.mf.classification_score(),
            self.grc.classification_score(),
        ]
    }

    /// Per-epoch rows: MF RMS, GC RMS, MF match rate, GC match rate.
    pub fn curve_rows(&self) -> Vec<Vec<f64>> {
        (0..self.mf.num_epochs().min(self.grc.num_epochs()))
            .map(|e| vec![self.mf.rms[e], self.grc.rms[e], self.mf.matches[e], self.grc.matches[e]])
            .collect()
    }
}
