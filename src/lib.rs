//! # game_cluster
//!
//! Groups games by their normalized feature vectors and projects them onto a
//! plane for display.
//!
//! - [`kmeans`]: Lloyd's algorithm with uniform or k-means++ seeding.
//! - [`elbow`]: picks the cluster count from the inertia curve.
//! - [`pca`]: top principal components by power iteration and deflation.
//! - [`pipeline`]: records in, labelled and projected records out.
//!
//! Every stochastic operation takes its random source as a parameter, so a
//! seeded generator reproduces a run exactly.
//!
//! ```rust
//! use game_cluster::{KMeans, Pca};
//! use ndarray::array;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let data = array![[0.0, 0.0], [0.0, 0.1], [1.0, 1.0], [1.0, 0.9]];
//! let mut rng = StdRng::seed_from_u64(42);
//!
//! let clusters = KMeans::new(2).cluster(data.view(), &mut rng).unwrap();
//! assert_eq!(clusters.assignments[0], clusters.assignments[1]);
//! assert_ne!(clusters.assignments[0], clusters.assignments[2]);
//!
//! let projection = Pca::new(2).project(data.view()).unwrap();
//! assert_eq!(projection.projected.dim(), (4, 2));
//! ```

pub mod dataset;
pub mod elbow;
pub mod error;
pub mod features;
pub mod kmeans;
pub mod normalize;
pub mod pca;
pub mod pipeline;
pub mod request;

pub use dataset::DataSet;
pub use elbow::{ElbowCurve, ElbowPoint, ElbowResult, ElbowSelector};
pub use error::{Error, Result};
pub use features::{records_to_matrix, vectors_to_matrix, FeatureList, Record, GAME_FEATURES};
pub use kmeans::{Init, KMeans, KMeansResult};
pub use normalize::{denormalize, normalize, Normalized, ScalingParams, ScalingTable};
pub use pca::{Pca, PcaResult, PrincipalComponent};
pub use pipeline::{ClusteringPipeline, PipelineConfig, PipelineOutput};
pub use request::{RequestGate, RequestTicket};
