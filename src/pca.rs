//! Principal component analysis by power iteration with deflation.
//!
//! # Algorithm
//!
//! 1. Center the data on its column means (kept for inverse transforms).
//! 2. Sample covariance `C = Xᵀ X / (N - 1)`.
//! 3. For each requested component, power-iterate on the working matrix from
//!    the all-ones vector until the eigenvalue estimate moves by less than
//!    `tol`, then deflate: `C ← C - λ v vᵀ`. Every iterate is also
//!    orthogonalized against the components already found, so rounding left
//!    over by deflation cannot pull later vectors back toward earlier ones.
//! 4. Project the centered data onto the retained eigenvectors.
//!
//! # Variance ratios
//!
//! `variance_ratios` divides each eigenvalue by the sum of the *retained*
//! eigenvalues, so they always sum to 1 even when the retained components
//! explain only part of the variance. This is not the textbook
//! explained-variance ratio; that one, relative to the covariance trace, is
//! reported separately as `trace_variance_ratios`.
//!
//! Eigenvector signs are arbitrary.

use crate::error::{Error, Result};
use crate::features::validate_matrix;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::Serialize;

/// Norms below this fraction of the covariance scale count as zero.
const RELATIVE_ZERO: f64 = 1e-10;

/// PCA parameters.
#[derive(Debug, Clone)]
pub struct Pca {
    n_components: usize,
    max_iter: usize,
    tol: f64,
}

/// One retained component.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalComponent {
    pub eigenvalue: f64,
    /// Unit-norm direction in feature space.
    pub eigenvector: Vec<f64>,
    pub variance_ratio: f64,
    /// Power-iteration steps spent on this component.
    #[serde(skip)]
    pub iterations: usize,
    #[serde(skip)]
    pub converged: bool,
}

#[derive(Debug, Clone)]
pub struct PcaResult {
    /// `N x m` coordinates of the centered input on the components.
    pub projected: Array2<f64>,
    pub components: Vec<PrincipalComponent>,
    /// Eigenvalue over the sum of retained eigenvalues.
    pub variance_ratios: Vec<f64>,
    /// Eigenvalue over the covariance trace.
    pub trace_variance_ratios: Vec<f64>,
    /// Sum of retained eigenvalues.
    pub total_variance: f64,
    /// Column means subtracted before projection.
    pub mean: Array1<f64>,
}

/// Outcome of a single power iteration.
#[derive(Debug, Clone)]
struct EigenPair {
    eigenvalue: f64,
    eigenvector: Array1<f64>,
    iterations: usize,
    converged: bool,
}

impl Default for Pca {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Pca {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            max_iter: 1000,
            tol: 1e-6,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    fn validate(&self, data: ArrayView2<'_, f64>) -> Result<()> {
        validate_matrix(data)?;
        let (n, d) = data.dim();
        if n <= 1 {
            return Err(Error::DegenerateData(format!(
                "covariance needs at least 2 points, got {n}"
            )));
        }
        if self.n_components == 0 || self.n_components > d {
            return Err(Error::invalid_parameter(
                "n_components",
                format!("must be in 1..={d}, got {}", self.n_components),
            ));
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

    /// Fit the components on the rows of `data` and project it.
    pub fn project(&self, data: ArrayView2<'_, f64>) -> Result<PcaResult> {
        self.validate(data)?;

        let mean = column_mean(data);
        let centered = &data - &mean;
        let covariance = covariance(centered.view());

        let trace = covariance.diag().sum();
        let scale = covariance.iter().map(|x| x * x).sum::<f64>().sqrt();
        let zero_norm = RELATIVE_ZERO * scale;

        let mut working = covariance;
        let mut pairs: Vec<EigenPair> = Vec::with_capacity(self.n_components);
        for i in 0..self.n_components {
            let found: Vec<ArrayView1<'_, f64>> =
                pairs.iter().map(|p| p.eigenvector.view()).collect();
            let pair =
                power_iteration(working.view(), &found, self.max_iter, self.tol, zero_norm);
            tracing::debug!(
                component = i + 1,
                eigenvalue = pair.eigenvalue,
                iterations = pair.iterations,
                "principal component"
            );
            if !pair.converged {
                tracing::warn!(
                    component = i + 1,
                    iterations = pair.iterations,
                    "power iteration stopped at iteration limit"
                );
            }
            if i + 1 < self.n_components {
                deflate(&mut working, pair.eigenvalue, pair.eigenvector.view());
            }
            pairs.push(pair);
        }

        let total_variance: f64 = pairs.iter().map(|p| p.eigenvalue).sum();
        let variance_ratios = ratios(&pairs, total_variance);
        let trace_variance_ratios = ratios(&pairs, trace);
        if total_variance <= 0.0 {
            tracing::warn!("retained components carry no variance; ratios reported as 0");
        }

        let basis = Array2::from_shape_fn((pairs.len(), data.ncols()), |(c, j)| {
            pairs[c].eigenvector[j]
        });
        let projected = centered.dot(&basis.t());

        let components = pairs
            .into_iter()
            .zip(&variance_ratios)
            .map(|(p, &variance_ratio)| PrincipalComponent {
                eigenvalue: p.eigenvalue,
                eigenvector: p.eigenvector.to_vec(),
                variance_ratio,
                iterations: p.iterations,
                converged: p.converged,
            })
            .collect();

        Ok(PcaResult {
            projected,
            components,
            variance_ratios,
            trace_variance_ratios,
            total_variance,
            mean,
        })
    }
}

impl PcaResult {
    /// `m x d` matrix whose rows are the eigenvectors.
    pub fn basis(&self) -> Array2<f64> {
        let d = self.mean.len();
        Array2::from_shape_fn((self.components.len(), d), |(c, j)| {
            self.components[c].eigenvector[j]
        })
    }

    /// Project new points with the fitted mean and components.
    pub fn transform(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        validate_matrix(data)?;
        if data.ncols() != self.mean.len() {
            return Err(Error::DimensionMismatch {
                expected: self.mean.len(),
                found: data.ncols(),
            });
        }
        let centered = &data - &self.mean;
        Ok(centered.dot(&self.basis().t()))
    }

    /// Map component coordinates back into feature space.
    pub fn inverse_transform(&self, coords: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if coords.ncols() != self.components.len() {
            return Err(Error::DimensionMismatch {
                expected: self.components.len(),
                found: coords.ncols(),
            });
        }
        Ok(coords.dot(&self.basis()) + &self.mean)
    }
}

fn column_mean(data: ArrayView2<'_, f64>) -> Array1<f64> {
    data.sum_axis(Axis(0)) / data.nrows() as f64
}

/// Unbiased sample covariance of already-centered rows.
fn covariance(centered: ArrayView2<'_, f64>) -> Array2<f64> {
    let n = centered.nrows() as f64;
    centered.t().dot(&centered) / (n - 1.0)
}

fn ratios(pairs: &[EigenPair], denominator: f64) -> Vec<f64> {
    pairs
        .iter()
        .map(|p| {
            if denominator > 0.0 {
                p.eigenvalue / denominator
            } else {
                0.0
            }
        })
        .collect()
}

/// Remove a found eigenpair from `matrix` in place.
fn deflate(matrix: &mut Array2<f64>, eigenvalue: f64, v: ArrayView1<'_, f64>) {
    for ((i, j), x) in matrix.indexed_iter_mut() {
        *x -= eigenvalue * v[i] * v[j];
    }
}

fn norm(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}

/// Candidate directions in a fixed order: all-ones first, then the axes.
fn seed_vectors(d: usize) -> impl Iterator<Item = Array1<f64>> {
    std::iter::once(Array1::ones(d)).chain((0..d).map(move |i| {
        let mut e = Array1::zeros(d);
        e[i] = 1.0;
        e
    }))
}

/// Gram-Schmidt step: remove from `v` its projection on each unit vector.
fn remove_found(v: &mut Array1<f64>, found: &[ArrayView1<'_, f64>]) {
    for u in found {
        let overlap = v.dot(u);
        v.scaled_add(-overlap, u);
    }
}

/// Unit vector orthogonal to every vector in `found`.
fn orthogonal_unit(found: &[ArrayView1<'_, f64>], d: usize) -> Array1<f64> {
    for mut candidate in seed_vectors(d) {
        remove_found(&mut candidate, found);
        let len = norm(&candidate);
        if len > 1e-8 {
            return candidate / len;
        }
    }
    let mut e = Array1::zeros(d);
    e[0] = 1.0;
    e
}

/// Dominant eigenpair of a symmetric matrix.
///
/// Starts from the all-ones vector. The eigenvalue estimate is
/// `(v'·Av) / (v'·v)` with `v' = Av / |Av|`; iteration stops when it moves by
/// less than `tol` or after `max_iter` steps, and whatever estimate exists at
/// that point is returned.
///
/// Each product is orthogonalized against `found` before it is normalized.
///
/// When the matrix maps the all-ones vector to zero the axes are tried in
/// turn. A matrix that annihilates all of them is zero: the result is
/// eigenvalue 0 with a unit vector orthogonal to `found`.
fn power_iteration(
    matrix: ArrayView2<'_, f64>,
    found: &[ArrayView1<'_, f64>],
    max_iter: usize,
    tol: f64,
    zero_norm: f64,
) -> EigenPair {
    let d = matrix.nrows();
    let step = |v: &Array1<f64>| {
        let mut product = matrix.dot(v);
        remove_found(&mut product, found);
        product
    };
    let start = seed_vectors(d).find(|v| norm(&step(v)) > zero_norm);
    let mut vector = match start {
        Some(v) => v,
        None => {
            return EigenPair {
                eigenvalue: 0.0,
                eigenvector: orthogonal_unit(found, d),
                iterations: 0,
                converged: true,
            }
        }
    };

    let mut eigenvalue = 0.0;
    for iter in 0..max_iter {
        let product = step(&vector);
        let len = norm(&product);
        if len <= zero_norm {
            return EigenPair {
                eigenvalue: 0.0,
                eigenvector: orthogonal_unit(found, d),
                iterations: iter + 1,
                converged: true,
            };
        }
        let normalized = &product / len;

        let numerator = normalized.dot(&product);
        let denominator = normalized.dot(&vector);
        let estimate = if denominator.abs() > f64::EPSILON {
            numerator / denominator
        } else {
            numerator
        };

        if (estimate - eigenvalue).abs() < tol {
            return EigenPair {
                eigenvalue: estimate,
                eigenvector: normalized,
                iterations: iter + 1,
                converged: true,
            };
        }

        eigenvalue = estimate;
        vector = normalized;
    }

    // the start vector is only non-unit before the first step
    let len = norm(&vector);
    EigenPair {
        eigenvalue,
        eigenvector: vector / len,
        iterations: max_iter,
        converged: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::{array, ArrayBase, Data, Ix2};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn assert_close<S1, S2>(a: &ArrayBase<S1, Ix2>, b: &ArrayBase<S2, Ix2>, eps: f64)
    where
        S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
    {
        assert_eq!(a.shape(), b.shape());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() <= eps, "{x} != {y} (eps {eps})\n{a}\n{b}");
        }
    }

    /// Points with independent spreads along each axis, scaled so the
    /// eigenvalues are well separated.
    fn anisotropic(n: usize, scales: &[f64], seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array2::from_shape_fn((n, scales.len()), |(_, j)| {
            scales[j] * (rng.gen::<f64>() - 0.5)
        })
    }

    #[test]
    fn test_line_along_x_axis() {
        let data = array![[1.0, 0.0], [-1.0, 0.0], [0.0, 0.0]];
        let res = Pca::new(2).project(data.view()).unwrap();

        assert_close(&res.mean.view().insert_axis(Axis(0)), &array![[0.0, 0.0]], 1e-12);
        let pc1 = &res.components[0];
        assert_relative_eq!(pc1.eigenvalue, 1.0, epsilon = 1e-9);
        assert_relative_eq!(pc1.eigenvector[0].abs(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pc1.eigenvector[1], 0.0, epsilon = 1e-9);
        assert_relative_eq!(res.variance_ratios[0], 1.0, epsilon = 1e-9);

        let pc2 = &res.components[1];
        assert_abs_diff_eq!(pc2.eigenvalue, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pc2.eigenvector[0], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(res.variance_ratios[1], 0.0, epsilon = 1e-12);

        let sign = pc1.eigenvector[0].signum();
        assert_abs_diff_eq!(res.projected[[0, 0]], sign, epsilon = 1e-9);
        assert_abs_diff_eq!(res.projected[[1, 0]], -sign, epsilon = 1e-9);
        assert_abs_diff_eq!(res.projected[[2, 0]], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_covariance_is_unbiased() {
        let data = array![[1.0, 2.0], [3.0, 6.0]];
        let mean = column_mean(data.view());
        let cov = covariance((&data - &mean).view());
        // deviations are ±1 and ±2, divided by N - 1 = 1
        assert_close(&cov, &array![[2.0, 4.0], [4.0, 8.0]], 1e-12);
    }

    #[test]
    fn test_deflate_removes_component() {
        let mut m = array![[2.0, 0.0], [0.0, 1.0]];
        deflate(&mut m, 2.0, array![1.0, 0.0].view());
        assert_close(&m, &array![[0.0, 0.0], [0.0, 1.0]], 1e-12);
    }

    #[test]
    fn test_ones_vector_in_null_space() {
        // covariance is proportional to [[1,-1],[-1,1]], which maps (1,1) to zero
        let data = array![[0.0, 1.0], [1.0, 0.0]];
        let res = Pca::new(1).project(data.view()).unwrap();
        let pc = &res.components[0];
        assert_relative_eq!(pc.eigenvalue, 1.0, epsilon = 1e-9);
        assert_relative_eq!(pc.eigenvector[0], -pc.eigenvector[1], epsilon = 1e-9);
        assert_relative_eq!(pc.eigenvector[0].abs(), 0.5_f64.sqrt(), epsilon = 1e-9);
        assert!(pc.converged);
    }

    #[test]
    fn test_planar_data_explains_all_variance() {
        // rows are a*u + b*w + c for orthonormal u, w in 5-D
        let u = array![0.5, 0.5, 0.5, 0.5, 0.0];
        let w = array![0.5, -0.5, 0.5, -0.5, 0.0];
        let c = array![0.3, 0.2, 0.1, 0.4, 0.5];
        let mut rows = Vec::new();
        for i in 0..12 {
            let a = (i as f64 - 5.5) * 0.4;
            let b = ((i * 7 % 12) as f64 - 5.5) * 0.1;
            let p = &u * a + &w * b + &c;
            rows.extend(p.iter().copied());
        }
        let data = Array2::from_shape_vec((12, 5), rows).unwrap();
        let res = Pca::new(2).project(data.view()).unwrap();

        assert_relative_eq!(res.variance_ratios.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(
            res.trace_variance_ratios.iter().sum::<f64>(),
            1.0,
            epsilon = 1e-4
        );
        assert!(res.components[0].eigenvalue > res.components[1].eigenvalue);
        // the constant fifth coordinate carries no variance
        for pc in &res.components {
            assert!(pc.eigenvector[4].abs() < 1e-9);
        }

        // two components reconstruct planar data
        let back = res.inverse_transform(res.projected.view()).unwrap();
        assert_close(&back, &data, 1e-3);
    }

    #[test]
    fn test_eigenvectors_orthonormal_after_deflation() {
        let data = anisotropic(200, &[10.0, 3.0, 1.0, 0.3, 0.1], 17);
        let res = Pca::new(3).project(data.view()).unwrap();

        for (i, a) in res.components.iter().enumerate() {
            let a = ArrayView1::from(&a.eigenvector);
            assert_relative_eq!(a.dot(&a), 1.0, epsilon = 1e-9);
            for b in &res.components[i + 1..] {
                let b = ArrayView1::from(&b.eigenvector);
                assert!(a.dot(&b).abs() < 1e-3, "dot = {}", a.dot(&b));
            }
        }
        let eig: Vec<f64> = res.components.iter().map(|c| c.eigenvalue).collect();
        assert!(eig[0] > eig[1] && eig[1] > eig[2], "{eig:?}");
        assert!(res.trace_variance_ratios.iter().sum::<f64>() < 1.0);
    }

    #[test]
    fn test_orthonormal_with_close_eigenvalues() {
        // few points in the unit cube: eigenvalues of similar size
        for (n, seed) in [(5, 1), (6, 3), (6, 11), (12, 5), (30, 8)] {
            let mut rng = StdRng::seed_from_u64(seed);
            let data = Array2::from_shape_fn((n, 5), |_| rng.gen::<f64>());
            for pca in [Pca::default(), Pca::new(5)] {
                let res = pca.project(data.view()).unwrap();
                for (i, a) in res.components.iter().enumerate() {
                    let a = ArrayView1::from(&a.eigenvector);
                    assert_relative_eq!(a.dot(&a), 1.0, epsilon = 1e-9);
                    for (j, b) in res.components.iter().enumerate().skip(i + 1) {
                        let b = ArrayView1::from(&b.eigenvector);
                        let dot = a.dot(&b);
                        assert!(dot.abs() < 1e-6, "n={n} seed={seed} pc{i}·pc{j} = {dot}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_projection_is_deterministic() {
        let data = anisotropic(50, &[1.0, 0.5, 0.2], 3);
        let a = Pca::new(2).project(data.view()).unwrap();
        let b = Pca::new(2).project(data.view()).unwrap();
        assert_eq!(a.projected, b.projected);
        assert_eq!(a.components, b.components);
    }

    #[test]
    fn test_transform_matches_projection() {
        let data = anisotropic(30, &[1.0, 0.5, 0.2], 8);
        let res = Pca::new(2).project(data.view()).unwrap();
        let again = res.transform(data.view()).unwrap();
        assert_close(&again, &res.projected, 1e-12);
        assert!(matches!(
            res.transform(array![[0.0, 0.0]].view()),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_identical_points_report_zero_ratios() {
        let data = array![[0.5, 0.5, 0.5], [0.5, 0.5, 0.5], [0.5, 0.5, 0.5]];
        let res = Pca::new(2).project(data.view()).unwrap();
        assert_eq!(res.total_variance, 0.0);
        assert_eq!(res.variance_ratios, vec![0.0, 0.0]);
        let a = ArrayView1::from(&res.components[0].eigenvector);
        let b = ArrayView1::from(&res.components[1].eigenvector);
        assert_abs_diff_eq!(a.dot(&b), 0.0, epsilon = 1e-12);
        assert!(res.projected.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_iteration_limit_is_tolerated() {
        let data = anisotropic(40, &[1.0, 0.9, 0.8], 4);
        let res = Pca::new(1).with_max_iter(1).project(data.view()).unwrap();
        assert_eq!(res.components[0].iterations, 1);
        assert!(!res.components[0].converged);
        let v = ArrayView1::from(&res.components[0].eigenvector);
        assert_relative_eq!(v.dot(&v), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_input_errors() {
        let one = array![[0.1, 0.2]];
        assert!(matches!(
            Pca::new(1).project(one.view()),
            Err(Error::DegenerateData(_))
        ));
        let two = array![[0.1, 0.2], [0.3, 0.4]];
        assert!(matches!(
            Pca::new(3).project(two.view()),
            Err(Error::InvalidParameter {
                name: "n_components",
                ..
            })
        ));
        assert!(matches!(
            Pca::new(0).project(two.view()),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
