//! Lloyd's K-means over normalized feature vectors.
//!
//! Centroids start uniformly at random in `[0, 1)` per coordinate, which is
//! only meaningful because the input has been min-max scaled into that
//! range. Use [`Init::KMeansPlusPlus`] for data on any other scale.
//!
//! A cluster that receives no points is reseeded uniformly at random rather
//! than dropped, so a run never ends with permanently dead clusters. Runs are
//! reproducible only for a fixed random source.

use crate::error::{Error, Result};
use crate::features::validate_matrix;
use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::Rng;

/// How the initial centroids are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Init {
    /// Every coordinate drawn from `[0, 1)`.
    #[default]
    Uniform,
    /// D² sampling from the data points.
    KMeansPlusPlus,
}

/// K-means parameters. One value describes one run; the run itself owns all
/// of its buffers.
#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    max_iter: usize,
    tol: f64,
    init: Init,
}

/// Outcome of one K-means run.
#[derive(Debug, Clone)]
pub struct KMeansResult {
    /// Cluster id in `[0, k)` for every point.
    pub assignments: Vec<usize>,
    /// `k x d` centroid matrix.
    pub centroids: Array2<f64>,
    /// Iterations consumed; equals `max_iter` when the run did not converge.
    pub iterations: usize,
    /// Sum of squared distances from each point to its centroid.
    pub inertia: f64,
    /// Whether the largest centroid shift fell below the tolerance.
    pub converged: bool,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(3)
    }
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: 100,
            tol: 1e-4,
            init: Init::Uniform,
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Stop once no centroid moves further than `tol` (Euclidean).
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_init(mut self, init: Init) -> Self {
        self.init = init;
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    pub fn tol(&self) -> f64 {
        self.tol
    }

    pub fn init(&self) -> Init {
        self.init
    }

    fn validate(&self, data: ArrayView2<'_, f64>) -> Result<()> {
        validate_matrix(data)?;
        if self.k == 0 {
            return Err(Error::InvalidClusterCount { requested: self.k });
        }
        if self.max_iter == 0 {
            return Err(Error::invalid_parameter("max_iter", "must be at least 1"));
        }
        if !self.tol.is_finite() || self.tol < 0.0 {
            return Err(Error::invalid_parameter(
                "tol",
                format!("must be finite and non-negative, got {}", self.tol),
            ));
        }
        Ok(())
    }

    /// Run Lloyd's algorithm on the rows of `data`.
    ///
    /// `k` larger than the number of points is allowed; the surplus clusters
    /// stay empty and keep being reseeded. Hitting `max_iter` is not an
    /// error, the state at that point is returned.
    pub fn cluster<R: Rng + ?Sized>(
        &self,
        data: ArrayView2<'_, f64>,
        rng: &mut R,
    ) -> Result<KMeansResult> {
        self.validate(data)?;

        let (n, d) = data.dim();
        let k = self.k;

        let mut centroids = match self.init {
            Init::Uniform => uniform_centroids(k, d, rng),
            Init::KMeansPlusPlus => plus_plus_centroids(k, data, rng),
        };
        // Second buffer receives each iteration's new centroid set; the two
        // are swapped so the shift is always measured old -> new.
        let mut next = Array2::<f64>::zeros((k, d));
        let mut counts = vec![0usize; k];
        let mut assignments = vec![0usize; n];

        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iter && !converged {
            // Step 1: assign points to nearest centroid
            for (label, point) in assignments.iter_mut().zip(data.outer_iter()) {
                *label = nearest(&point, &centroids);
            }

            // Step 2: update centroids as mean of assigned points
            next.fill(0.0);
            counts.fill(0);
            for (point, &c) in data.outer_iter().zip(&assignments) {
                let mut row = next.row_mut(c);
                row += &point;
                counts[c] += 1;
            }
            for (c, mut row) in next.outer_iter_mut().enumerate() {
                if counts[c] > 0 {
                    row /= counts[c] as f64;
                } else {
                    tracing::trace!(cluster = c, iteration = iterations, "reseeding empty cluster");
                    row.mapv_inplace(|_| rng.gen::<f64>());
                }
            }

            // Step 3: largest Euclidean shift across centroids
            let shift = centroids
                .outer_iter()
                .zip(next.outer_iter())
                .map(|(old, new)| e_dist(&old, &new))
                .fold(0.0_f64, f64::max);

            converged = shift < self.tol;
            std::mem::swap(&mut centroids, &mut next);
            iterations += 1;
        }

        let inertia = data
            .outer_iter()
            .zip(&assignments)
            .map(|(point, &c)| sq_dist(&point, &centroids.row(c)))
            .sum::<f64>();

        if converged {
            tracing::debug!(k, iterations, inertia, "k-means converged");
        } else {
            tracing::warn!(k, iterations, inertia, "k-means stopped at iteration limit");
        }

        Ok(KMeansResult {
            assignments,
            centroids,
            iterations,
            inertia,
            converged,
        })
    }
}

impl KMeansResult {
    pub fn k(&self) -> usize {
        self.centroids.nrows()
    }

    /// Number of points assigned to each cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.k()];
        for &c in &self.assignments {
            sizes[c] += 1;
        }
        sizes
    }

    /// Assign new points to the nearest of the fitted centroids.
    pub fn predict(&self, data: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        validate_matrix(data)?;
        if data.ncols() != self.centroids.ncols() {
            return Err(Error::DimensionMismatch {
                expected: self.centroids.ncols(),
                found: data.ncols(),
            });
        }
        Ok(data
            .outer_iter()
            .map(|point| nearest(&point, &self.centroids))
            .collect())
    }
}

/// Squared Euclidean distance
#[inline]
pub(crate) fn sq_dist(a: &ArrayView1<'_, f64>, b: &ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Euclidean distance
#[inline]
pub(crate) fn e_dist(a: &ArrayView1<'_, f64>, b: &ArrayView1<'_, f64>) -> f64 {
    sq_dist(a, b).sqrt()
}

/// Index of the closest centroid. Strict `<` keeps the lowest index on ties.
fn nearest(point: &ArrayView1<'_, f64>, centroids: &Array2<f64>) -> usize {
    let mut best_cluster = 0;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.outer_iter().enumerate() {
        let dist = sq_dist(point, &centroid);
        if dist < best_dist {
            best_dist = dist;
            best_cluster = c;
        }
    }
    best_cluster
}

fn uniform_centroids<R: Rng + ?Sized>(k: usize, d: usize, rng: &mut R) -> Array2<f64> {
    Array2::from_shape_simple_fn((k, d), || rng.gen::<f64>())
}

fn plus_plus_centroids<R: Rng + ?Sized>(
    k: usize,
    data: ArrayView2<'_, f64>,
    rng: &mut R,
) -> Array2<f64> {
    let n = data.nrows();
    let mut centroids = Array2::zeros((k, data.ncols()));

    let first = rng.gen_range(0..n);
    centroids.row_mut(0).assign(&data.row(first));

    let mut distances = vec![0.0_f64; n];
    for i in 1..k {
        for (dist, point) in distances.iter_mut().zip(data.outer_iter()) {
            *dist = (0..i)
                .map(|c| sq_dist(&point, &centroids.row(c)))
                .fold(f64::INFINITY, f64::min);
        }

        let total: f64 = distances.iter().sum();
        let selected = if total <= 0.0 {
            rng.gen_range(0..n)
        } else {
            let threshold = rng.gen::<f64>() * total;
            let mut cumsum = 0.0;
            distances
                .iter()
                .position(|&d| {
                    cumsum += d;
                    cumsum >= threshold
                })
                .unwrap_or(n - 1)
        };
        centroids.row_mut(i).assign(&data.row(selected));
    }

    centroids
}
