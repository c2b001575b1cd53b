//! Records in, clustered and projected records out.
//!
//! The pipeline reads the configured features from every record, picks `k`
//! by the elbow method when none is given, clusters, projects the same
//! vectors with PCA and merges cluster label and coordinates back onto each
//! record. Every run allocates its own buffers and random source, so
//! concurrent runs never interfere; pair with [`crate::request::RequestGate`]
//! to drop stale results.

use crate::elbow::{ElbowResult, ElbowSelector};
use crate::error::Result;
use crate::features::{json_number, records_to_matrix, FeatureList, Record};
use crate::kmeans::{KMeans, KMeansResult};
use crate::pca::{Pca, PcaResult, PrincipalComponent};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::Value;

/// Everything a pipeline run needs besides the records.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub features: FeatureList,
    /// Explicit cluster count; `None` selects one by the elbow method.
    pub k: Option<usize>,
    /// Largest `k` tried by the elbow method.
    pub max_k: usize,
    /// K-means parameters; its `k` is replaced by the resolved count.
    pub kmeans: KMeans,
    pub pca: Pca,
    /// Seed for the run's generator; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            features: FeatureList::default(),
            k: None,
            max_k: 10,
            kmeans: KMeans::default(),
            pca: Pca::default(),
            seed: None,
        }
    }
}

impl PipelineConfig {
    pub fn new(features: FeatureList) -> Self {
        Self {
            features,
            ..Self::default()
        }
    }

    pub fn with_k(mut self, k: Option<usize>) -> Self {
        self.k = k;
        self
    }

    pub fn with_max_k(mut self, max_k: usize) -> Self {
        self.max_k = max_k;
        self
    }

    pub fn with_kmeans(mut self, kmeans: KMeans) -> Self {
        self.kmeans = kmeans;
        self
    }

    pub fn with_pca(mut self, pca: Pca) -> Self {
        self.pca = pca;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// Clustering half of the output, in the shape renderers expect.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusteringOutput {
    /// Input records each with a `cluster` field.
    pub clustered_data: Vec<Record>,
    pub centroids: Vec<Vec<f64>>,
    pub k: usize,
    pub iterations: usize,
    pub inertia: f64,
    pub features: FeatureList,
}

/// Projection half of the output, in the shape renderers expect.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PcaOutput {
    /// Clustered records each with `pc1`, `pc2`, ... fields added.
    pub data: Vec<Record>,
    pub principal_components: Vec<PrincipalComponent>,
    pub variance_ratios: Vec<f64>,
    pub trace_variance_ratios: Vec<f64>,
    pub total_variance: f64,
    pub mean: Vec<f64>,
    pub features: FeatureList,
    pub projected_data: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    pub clustering: ClusteringOutput,
    pub pca: PcaOutput,
    /// Present when `k` was chosen by the elbow method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elbow: Option<ElbowResult>,
}

#[derive(Debug, Clone)]
pub struct ClusteringPipeline {
    config: PipelineConfig,
}

impl ClusteringPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run with a generator built from the configured seed.
    pub fn run(&self, records: &[Record]) -> Result<PipelineOutput> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.run_with_rng(records, &mut rng)
    }

    pub fn run_with_rng<R: Rng + ?Sized>(
        &self,
        records: &[Record],
        rng: &mut R,
    ) -> Result<PipelineOutput> {
        let cfg = &self.config;
        let data = records_to_matrix(records, &cfg.features)?;
        tracing::info!(
            points = data.nrows(),
            features = data.ncols(),
            "starting clustering"
        );

        let (k, elbow) = match cfg.k {
            Some(k) => (k, None),
            None => {
                let elbow = ElbowSelector::new(cfg.max_k)
                    .with_kmeans(cfg.kmeans.clone())
                    .find_optimal_k(data.view(), rng)?;
                tracing::info!(k = elbow.optimal_k, "cluster count chosen by elbow method");
                (elbow.optimal_k, Some(elbow))
            }
        };

        let clusters = cfg.kmeans.clone().with_k(k).cluster(data.view(), rng)?;
        tracing::info!(
            k,
            iterations = clusters.iterations,
            inertia = clusters.inertia,
            "clustering finished"
        );

        let projection = cfg.pca.project(data.view())?;
        tracing::info!(
            variance_ratios = ?projection.variance_ratios,
            "projection finished"
        );

        Ok(merge(records, &cfg.features, k, clusters, projection, elbow))
    }
}

fn rows(m: &Array2<f64>) -> Vec<Vec<f64>> {
    m.outer_iter().map(|r| r.to_vec()).collect()
}

fn with_coordinates(record: &Record, coords: &[f64]) -> Record {
    let mut item = record.clone();
    for (i, &c) in coords.iter().enumerate() {
        item.insert(format!("pc{}", i + 1), json_number(c));
    }
    item
}

fn merge(
    records: &[Record],
    features: &FeatureList,
    k: usize,
    clusters: KMeansResult,
    projection: PcaResult,
    elbow: Option<ElbowResult>,
) -> PipelineOutput {
    let projected_data = rows(&projection.projected);

    let clustered_data: Vec<Record> = records
        .iter()
        .zip(&clusters.assignments)
        .map(|(record, &c)| {
            let mut item = record.clone();
            item.insert("cluster".into(), Value::from(c));
            item
        })
        .collect();

    // renderers color projected points by `pca.data[i].cluster`
    let data: Vec<Record> = clustered_data
        .iter()
        .zip(&projected_data)
        .map(|(record, coords)| with_coordinates(record, coords))
        .collect();

    PipelineOutput {
        clustering: ClusteringOutput {
            clustered_data,
            centroids: rows(&clusters.centroids),
            k,
            iterations: clusters.iterations,
            inertia: clusters.inertia,
            features: features.clone(),
        },
        pca: PcaOutput {
            data,
            principal_components: projection.components,
            variance_ratios: projection.variance_ratios,
            trace_variance_ratios: projection.trace_variance_ratios,
            total_variance: projection.total_variance,
            mean: projection.mean.to_vec(),
            features: features.clone(),
            projected_data,
        },
        elbow,
    }
}
