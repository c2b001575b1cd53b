//! Cluster-count selection by the elbow method.
//!
//! The knee is taken where the discrete second difference of the inertia
//! curve peaks. This is an approximation: noisy curves can produce a false
//! elbow, and no statistical guarantee is attached to the chosen `k`.

use crate::error::{Error, Result};
use crate::kmeans::KMeans;
use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Cluster count reported when the curve shows no elbow.
pub const FALLBACK_K: usize = 3;

/// One trial of the curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElbowPoint {
    pub k: usize,
    pub inertia: f64,
    pub iterations: usize,
}

/// Inertia for `k = 1..=max_k`, ascending by `k`.
pub type ElbowCurve = Vec<ElbowPoint>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElbowResult {
    pub optimal_k: usize,
    pub elbow_data: ElbowCurve,
}

/// Runs one K-means trial per candidate `k` and picks the elbow.
#[derive(Debug, Clone)]
pub struct ElbowSelector {
    max_k: usize,
    kmeans: KMeans,
}

impl Default for ElbowSelector {
    fn default() -> Self {
        Self {
            max_k: 10,
            kmeans: KMeans::default(),
        }
    }
}

impl ElbowSelector {
    pub fn new(max_k: usize) -> Self {
        Self {
            max_k,
            ..Self::default()
        }
    }

    /// Trial parameters; the `k` of the template is ignored.
    pub fn with_kmeans(mut self, kmeans: KMeans) -> Self {
        self.kmeans = kmeans;
        self
    }

    pub fn max_k(&self) -> usize {
        self.max_k
    }

    /// Cluster `data` for every `k` in `1..=max_k` and return the curve with
    /// the selected `k`.
    ///
    /// Each trial gets its own generator seeded from `rng` before any trial
    /// runs, so the curve does not depend on whether trials run in parallel.
    pub fn find_optimal_k<R: Rng + ?Sized>(
        &self,
        data: ArrayView2<'_, f64>,
        rng: &mut R,
    ) -> Result<ElbowResult> {
        if self.max_k == 0 {
            return Err(Error::invalid_parameter("max_k", "must be at least 1"));
        }

        let seeds: Vec<u64> = (0..self.max_k).map(|_| rng.gen()).collect();
        let trial = |(i, seed): (usize, &u64)| -> Result<ElbowPoint> {
            let k = i + 1;
            let mut trial_rng = StdRng::seed_from_u64(*seed);
            let res = self.kmeans.clone().with_k(k).cluster(data, &mut trial_rng)?;
            Ok(ElbowPoint {
                k,
                inertia: res.inertia,
                iterations: res.iterations,
            })
        };

        #[cfg(feature = "parallel")]
        let elbow_data = seeds
            .par_iter()
            .enumerate()
            .map(trial)
            .collect::<Result<ElbowCurve>>()?;

        #[cfg(not(feature = "parallel"))]
        let elbow_data = seeds
            .iter()
            .enumerate()
            .map(trial)
            .collect::<Result<ElbowCurve>>()?;

        let optimal_k = select_elbow(&elbow_data).unwrap_or(FALLBACK_K.min(self.max_k));
        tracing::debug!(optimal_k, max_k = self.max_k, "elbow selected");

        Ok(ElbowResult {
            optimal_k,
            elbow_data,
        })
    }
}

/// `(inertia[i-1] - inertia[i]) - (inertia[i] - inertia[i+1])` for every
/// interior point, paired with that point's `k`.
pub fn elbow_scores(curve: &[ElbowPoint]) -> Vec<(usize, f64)> {
    curve
        .windows(3)
        .map(|w| {
            let before = w[0].inertia - w[1].inertia;
            let after = w[1].inertia - w[2].inertia;
            (w[1].k, before - after)
        })
        .collect()
}

/// `k` with the largest positive elbow score; the first one wins on ties.
/// `None` when the curve has fewer than three points or no positive score.
pub fn select_elbow(curve: &[ElbowPoint]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (k, score) in elbow_scores(curve) {
        if score > best.map_or(0.0, |(_, s)| s) {
            best = Some((k, score));
        }
    }
    best.map(|(k, _)| k)
}
