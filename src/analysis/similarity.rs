//! Time-resolved spike-train similarity: SPIKE-synchronization and SPIKE-distance.
//!
//! Both measures are restricted to an analysis window. For SPIKE-distance the window bounds act as
//! auxiliary spikes so that the first and last inter-spike intervals are well defined; for
//! SPIKE-synchronization the coincidence window only depends on real inter-spike intervals.
//!
//! Trial sets are interleaved: the reference train of trial `k` is at index `2k` and the real
//! train at index `2k + 1`.
use itertools::Itertools;
use nalgebra::DMatrix;

use crate::error::GclError;
use crate::utils::nan_mean;

/// The time interval over which spike trains are compared (ms).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisWindow {
    start: f64,
    end: f64,
}

impl AnalysisWindow {
    /// Create a window, which must have a positive length.
    pub fn new(start: f64, end: f64) -> Result<Self, GclError> {
        if !(start < end) {
            return Err(GclError::InvalidParameter(format!(
                "Invalid analysis window ({}, {})",
                start, end
            )));
        }
        Ok(AnalysisWindow { start, end })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    /// The (sorted) spikes of a train inside the window.
    pub fn clip(&self, times: &[f64]) -> Vec<f64> {
        let mut clipped: Vec<f64> = times
            .iter()
            .copied()
            .filter(|t| (self.start..=self.end).contains(t))
            .collect();
        clipped.sort_by(|a, b| a.total_cmp(b));
        clipped
    }

    /// The spikes inside the window, with the window bounds added as auxiliary spikes.
    fn with_edges(&self, times: &[f64]) -> Vec<f64> {
        let mut extended = self.clip(times);
        if extended.first() != Some(&self.start) {
            extended.insert(0, self.start);
        }
        if extended.last() != Some(&self.end) {
            extended.push(self.end);
        }
        extended
    }
}

/// The spike-train similarity measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpikeMeasure {
    /// SPIKE-synchronization, from 0 (no coincidence) to 1 (every spike coincident).
    Synchronization,
    /// SPIKE-distance, from 0 (identical trains) upwards.
    Distance,
}

impl SpikeMeasure {
    pub fn evaluate(&self, times_1: &[f64], times_2: &[f64], window: &AnalysisWindow) -> f64 {
        match self {
            SpikeMeasure::Synchronization => spike_sync(times_1, times_2, window),
            SpikeMeasure::Distance => spike_distance(times_1, times_2, window),
        }
    }

    /// The value of a train compared with itself.
    fn self_value(&self) -> f64 {
        match self {
            SpikeMeasure::Synchronization => 1.0,
            SpikeMeasure::Distance => 0.0,
        }
    }
}

/// Distance from `t` to the closest element of a non-empty sorted slice.
fn nearest_distance(sorted: &[f64], t: f64) -> f64 {
    let pos = sorted.partition_point(|s| *s < t);
    let after = sorted.get(pos).map(|s| s - t);
    let before = pos.checked_sub(1).map(|i| t - sorted[i]);
    after
        .into_iter()
        .chain(before)
        .fold(f64::INFINITY, f64::min)
}

/// The local dissimilarity of one train on an interval without spikes of that train inside.
struct LocalProfile {
    previous: f64,
    following: f64,
    /// Distance from the previous spike to the closest spike of the other train.
    dist_previous: f64,
    /// Distance from the following spike to the closest spike of the other train.
    dist_following: f64,
}

impl LocalProfile {
    /// Profile of `extended` on the interval starting at `from`, compared with `other`.
    /// Both trains must include the window bounds and `from` must be before the window end.
    fn new(extended: &[f64], other: &[f64], from: f64) -> Self {
        let pos = extended.partition_point(|s| *s <= from) - 1;
        let previous = extended[pos];
        let following = extended[pos + 1];
        LocalProfile {
            previous,
            following,
            dist_previous: nearest_distance(other, previous),
            dist_following: nearest_distance(other, following),
        }
    }

    fn isi(&self) -> f64 {
        self.following - self.previous
    }

    fn at(&self, t: f64) -> f64 {
        (self.dist_previous * (self.following - t) + self.dist_following * (t - self.previous))
            / self.isi()
    }
}

/// SPIKE-distance between two spike trains over a window.
///
/// The dissimilarity profile is piecewise linear between the merged spike times, so its average
/// is computed exactly with the trapezoidal rule.
///
/// # Examples
///
/// ```rust
/// use approx::assert_relative_eq;
/// use rusty_gcl::analysis::similarity::{spike_distance, AnalysisWindow};
///
/// let window = AnalysisWindow::new(0.0, 10.0).unwrap();
/// assert_relative_eq!(spike_distance(&[2.0, 7.0], &[2.0, 7.0], &window), 0.0);
/// assert_relative_eq!(spike_distance(&[5.0], &[], &window), 2.0 / 9.0, epsilon = 1e-12);
/// ```
pub fn spike_distance(times_1: &[f64], times_2: &[f64], window: &AnalysisWindow) -> f64 {
    let extended_1 = window.with_edges(times_1);
    let extended_2 = window.with_edges(times_2);

    let mut knots: Vec<f64> = extended_1.iter().chain(extended_2.iter()).copied().collect();
    knots.sort_by(|a, b| a.total_cmp(b));
    knots.dedup();

    let integral: f64 = knots
        .iter()
        .tuple_windows()
        .map(|(&from, &to)| {
            let profile_1 = LocalProfile::new(&extended_1, &extended_2, from);
            let profile_2 = LocalProfile::new(&extended_2, &extended_1, from);
            let (isi_1, isi_2) = (profile_1.isi(), profile_2.isi());
            let norm = 0.5 * (isi_1 + isi_2).powi(2);
            let dissimilarity =
                |t: f64| (profile_1.at(t) * isi_2 + profile_2.at(t) * isi_1) / norm;
            0.5 * (dissimilarity(from) + dissimilarity(to)) * (to - from)
        })
        .sum();

    integral / window.length()
}

/// Inter-spike intervals on both sides of spike `pos` of a train. Empty intervals and the
/// missing neighbors of the first and last spikes are left out.
fn neighbor_isis(times: &[f64], pos: usize) -> [Option<f64>; 2] {
    let t = times[pos];
    let previous = pos.checked_sub(1).map(|i| t - times[i]);
    let following = times.get(pos + 1).map(|s| s - t);
    [previous, following].map(|isi| isi.filter(|isi| *isi > 0.0))
}

/// Number of spikes of `times_1` with a coincident spike in `times_2`.
fn num_coincidences(times_1: &[f64], times_2: &[f64], window: &AnalysisWindow) -> usize {
    if times_2.is_empty() {
        return 0;
    }
    (0..times_1.len())
        .filter(|&i| {
            let t = times_1[i];
            let pos = times_2.partition_point(|s| *s < t);
            let j = match pos {
                0 => 0,
                p if p == times_2.len() => p - 1,
                p if times_2[p] - t < t - times_2[p - 1] => p,
                p => p - 1,
            };
            let tau = neighbor_isis(times_1, i)
                .into_iter()
                .chain(neighbor_isis(times_2, j))
                .flatten()
                .fold(window.length(), f64::min)
                / 2.0;
            (t - times_2[j]).abs() < tau
        })
        .count()
}

/// SPIKE-synchronization between two spike trains over a window.
///
/// Two spikes are coincident if they are closer than half the smallest of their neighboring
/// inter-spike intervals, the window length bounding the intervals of isolated spikes. The result
/// is the fraction of coincident spikes, 1 for two silent trains.
pub fn spike_sync(times_1: &[f64], times_2: &[f64], window: &AnalysisWindow) -> f64 {
    let times_1 = window.clip(times_1);
    let times_2 = window.clip(times_2);
    let num_spikes = times_1.len() + times_2.len();
    if num_spikes == 0 {
        return 1.0;
    }
    let coincidences = num_coincidences(&times_1, &times_2, window)
        + num_coincidences(&times_2, &times_1, window);
    coincidences as f64 / num_spikes as f64
}

/// Symmetric matrix of a measure between every pair of trains.
pub fn similarity_matrix(
    trains: &[Vec<f64>],
    window: &AnalysisWindow,
    measure: SpikeMeasure,
) -> DMatrix<f64> {
    let n = trains.len();
    let mut matrix = DMatrix::from_element(n, n, measure.self_value());
    for (i, j) in (0..n).tuple_combinations() {
        let value = measure.evaluate(&trains[i], &trains[j], window);
        matrix[(i, j)] = value;
        matrix[(j, i)] = value;
    }
    matrix
}

/// Averages of a measure over matched pairs `(2k, 2k + 1)` and over every pair of reference
/// trains (even indices).
pub fn trial_set_averages(matrix: &DMatrix<f64>) -> (f64, f64) {
    let num_trials = matrix.nrows() / 2;
    let matched: Vec<f64> = (0..num_trials).map(|k| matrix[(2 * k, 2 * k + 1)]).collect();
    let reference: Vec<f64> = (0..matrix.nrows())
        .step_by(2)
        .tuple_combinations()
        .map(|(i, j)| matrix[(i, j)])
        .collect();
    (nan_mean(&matched), nan_mean(&reference))
}

/// Synchronization and distance summaries of an interleaved trial set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialSetSimilarity {
    /// Mean SPIKE-synchronization of matched (reference, real) pairs.
    pub sync: f64,
    /// Mean SPIKE-synchronization between reference trains.
    pub reference_sync: f64,
    /// Mean SPIKE-distance of matched (reference, real) pairs.
    pub distance: f64,
    /// Mean SPIKE-distance between reference trains.
    pub reference_distance: f64,
}

impl TrialSetSimilarity {
    /// Returns an error if there is not a single complete trial.
    pub fn from_trains(trains: &[Vec<f64>], window: &AnalysisWindow) -> Result<Self, GclError> {
        if trains.len() < 2 {
            return Err(GclError::InvalidParameter(format!(
                "A trial set needs at least one (reference, real) pair of trains, got {} train(s)",
                trains.len()
            )));
        }
        if trains.len() % 2 == 1 {
            log::warn!(
                "Odd number of trains ({}), the last one is only used as a reference",
                trains.len()
            );
        }
        let (sync, reference_sync) =
            trial_set_averages(&similarity_matrix(trains, window, SpikeMeasure::Synchronization));
        let (distance, reference_distance) =
            trial_set_averages(&similarity_matrix(trains, window, SpikeMeasure::Distance));
        Ok(TrialSetSimilarity {
            sync,
            reference_sync,
            distance,
            reference_distance,
        })
    }
}

/// Group file names by the prefix before their first `_`, e.g., the condition of `ko_150Hz.txt`.
/// Groups and the names inside each group are sorted.
pub fn group_by_prefix(mut names: Vec<String>) -> Vec<(String, Vec<String>)> {
    names.sort();
    let prefix = |name: &String| name.split('_').next().unwrap_or_default().to_string();
    names.sort_by_key(prefix);
    let chunks = names.into_iter().chunk_by(prefix);
    let groups = chunks
        .into_iter()
        .map(|(key, group)| (key, group.collect()))
        .collect();
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn window() -> AnalysisWindow {
        AnalysisWindow::new(0.0, 100.0).unwrap()
    }

    #[test]
    fn test_window() {
        assert!(AnalysisWindow::new(10.0, 10.0).is_err());
        let window = AnalysisWindow::new(100.0, 1100.0).unwrap();
        assert_eq!(window.length(), 1000.0);
        assert_eq!(window.clip(&[1200.0, 50.0, 500.0, 100.0]), vec![100.0, 500.0]);
        assert_eq!(window.with_edges(&[100.0, 500.0]), vec![100.0, 500.0, 1100.0]);
        assert_eq!(window.with_edges(&[]), vec![100.0, 1100.0]);
    }

    #[test]
    fn test_nearest_distance() {
        let sorted = [0.0, 4.0, 10.0];
        assert_eq!(nearest_distance(&sorted, 3.0), 1.0);
        assert_eq!(nearest_distance(&sorted, 12.0), 2.0);
        assert_eq!(nearest_distance(&sorted, -1.0), 1.0);
        assert_eq!(nearest_distance(&sorted, 4.0), 0.0);
    }

    #[test]
    fn test_spike_distance() {
        let short = AnalysisWindow::new(0.0, 10.0).unwrap();
        assert_relative_eq!(spike_distance(&[5.0], &[], &short), 2.0 / 9.0, epsilon = 1e-12);
        assert_relative_eq!(spike_distance(&[], &[5.0], &short), 2.0 / 9.0, epsilon = 1e-12);
        assert_relative_eq!(spike_distance(&[], &[], &short), 0.0);

        let times_1 = [3.0, 18.0, 40.0, 41.0, 77.0];
        let times_2 = [5.0, 20.0, 55.0, 90.0];
        assert_relative_eq!(spike_distance(&times_1, &times_1, &window()), 0.0);
        let d_12 = spike_distance(&times_1, &times_2, &window());
        let d_21 = spike_distance(&times_2, &times_1, &window());
        assert_relative_eq!(d_12, d_21, epsilon = 1e-12);
        assert!(d_12 > 0.0 && d_12 < 1.0);

        // A small jitter is closer than a large one.
        let shifted = |dt: f64| times_1.iter().map(|t| t + dt).collect::<Vec<f64>>();
        assert!(
            spike_distance(&times_1, &shifted(0.5), &window())
                < spike_distance(&times_1, &shifted(2.0), &window())
        );
    }

    #[test]
    fn test_spike_sync() {
        assert_relative_eq!(spike_sync(&[10.0, 20.0], &[10.5, 40.0], &window()), 0.5);
        assert_relative_eq!(spike_sync(&[10.0, 20.0], &[10.0, 20.0], &window()), 1.0);
        assert_relative_eq!(spike_sync(&[], &[], &window()), 1.0);
        assert_relative_eq!(spike_sync(&[10.0, 20.0], &[], &window()), 0.0);
        // Spikes outside the window are ignored.
        assert_relative_eq!(spike_sync(&[10.0, 150.0], &[10.5, -3.0], &window()), 1.0);
    }

    #[test]
    fn test_spike_sync_shift_invariant() {
        for t in [2.0, 50.0, 97.0] {
            assert_relative_eq!(spike_sync(&[t], &[t + 2.5], &window()), 1.0);
        }
        // Isolated spikes farther apart than half the window are not coincident.
        assert_relative_eq!(spike_sync(&[10.0], &[70.0], &window()), 0.0);

        let times_1 = [20.0, 40.0];
        let times_2 = [21.0, 55.0];
        let shifted = |times: &[f64], dt: f64| times.iter().map(|t| t + dt).collect::<Vec<f64>>();
        let sync = spike_sync(&times_1, &times_2, &window());
        assert_relative_eq!(sync, 0.5);
        for dt in [-18.0, 30.0, 40.0] {
            assert_relative_eq!(
                spike_sync(&shifted(&times_1, dt), &shifted(&times_2, dt), &window()),
                sync
            );
        }
    }

    #[test]
    fn test_similarity_matrix() {
        let trains = vec![vec![10.0, 20.0], vec![10.5, 40.0], vec![]];
        let matrix = similarity_matrix(&trains, &window(), SpikeMeasure::Synchronization);
        assert_eq!(matrix.shape(), (3, 3));
        assert_eq!(matrix[(0, 0)], 1.0);
        assert_relative_eq!(matrix[(0, 1)], 0.5);
        assert_relative_eq!(matrix[(1, 0)], 0.5);
        assert_relative_eq!(matrix[(2, 1)], 0.0);

        let matrix = similarity_matrix(&trains, &window(), SpikeMeasure::Distance);
        assert_eq!(matrix[(2, 2)], 0.0);
        assert_relative_eq!(matrix[(0, 2)], matrix[(2, 0)]);
    }

    #[test]
    fn test_trial_set_averages() {
        #[rustfmt::skip]
        let matrix = DMatrix::from_row_slice(4, 4, &[
            1.0, 0.8, 0.3, 0.0,
            0.8, 1.0, 0.0, 0.0,
            0.3, 0.0, 1.0, 0.6,
            0.0, 0.0, 0.6, 1.0,
        ]);
        let (matched, reference) = trial_set_averages(&matrix);
        assert_relative_eq!(matched, 0.7);
        assert_relative_eq!(reference, 0.3);
    }

    #[test]
    fn test_trial_set_similarity() {
        let reference_0 = vec![12.0, 30.0, 61.0];
        let reference_1 = vec![20.0, 45.0, 80.0];
        let trains = vec![
            reference_0.clone(),
            reference_0.clone(),
            reference_1.clone(),
            reference_1.clone(),
        ];
        let similarity = TrialSetSimilarity::from_trains(&trains, &window()).unwrap();
        assert_relative_eq!(similarity.sync, 1.0);
        assert_relative_eq!(similarity.distance, 0.0);
        assert_relative_eq!(
            similarity.reference_sync,
            spike_sync(&reference_0, &reference_1, &window())
        );
        assert_relative_eq!(
            similarity.reference_distance,
            spike_distance(&reference_0, &reference_1, &window())
        );

        assert!(TrialSetSimilarity::from_trains(&trains[..1], &window()).is_err());
    }

    #[test]
    fn test_group_by_prefix() {
        let names = vec![
            "ko_200Hz.txt".to_string(),
            "orig_100Hz.txt".to_string(),
            "ko_100Hz.txt".to_string(),
            "orig_050Hz.txt".to_string(),
        ];
        assert_eq!(
            group_by_prefix(names),
            vec![
                (
                    "ko".to_string(),
                    vec!["ko_100Hz.txt".to_string(), "ko_200Hz.txt".to_string()]
                ),
                (
                    "orig".to_string(),
                    vec!["orig_050Hz.txt".to_string(), "orig_100Hz.txt".to_string()]
                ),
            ]
        );
    }
}
