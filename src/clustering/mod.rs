/// Clustering models and the actors built on them
///
/// A `Clusterer` assigns numeric instances to clusters and reports a
/// membership distribution. Updateable clusterers can learn from instances
/// one at a time. The `ClusterData` actor wraps a clusterer and emits a
/// clustering container per instance; post-processors then extend that
/// container under declared keys.

pub mod actors;
pub mod kmeans;
pub mod leader;
pub mod postprocess;

pub use actors::{ClusterData, PostProcessClustering};
pub use kmeans::KMeans;
pub use leader::Leader;
pub use postprocess::ClusteringPostProcessor;

use crate::runtime::container::Key;
use crate::runtime::token::Instance;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;

/// Keys of the container produced by `ClusterData`
pub const MODEL: Key<ClusterModel> = Key::new("Model");
pub const INSTANCE: Key<Instance> = Key::new("Instance");
pub const CLUSTER: Key<i64> = Key::new("Cluster");
pub const DISTRIBUTION: Key<Vec<f64>> = Key::new("Distribution");

/// Snapshot of a clusterer's state at prediction time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterModel {
    /// Algorithm that produced the model
    pub clusterer: String,
    pub centroids: Vec<Vec<f64>>,
    /// Number of instances each cluster has absorbed
    pub counts: Vec<u64>,
}

impl ClusterModel {
    pub fn number_of_clusters(&self) -> usize {
        self.centroids.len()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterError {
    #[error("{clusterer} has no clusters yet")]
    NoClusters { clusterer: &'static str },

    #[error("instance has {actual} attributes, model expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{0} cannot be updated incrementally")]
    NotUpdateable(&'static str),

    #[error("invalid model: {0}")]
    InvalidModel(String),
}

/// A fitted clustering model
pub trait Clusterer: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn number_of_clusters(&self) -> usize;

    /// Index of the cluster the instance belongs to
    fn cluster_instance(&self, instance: &Instance) -> Result<usize, ClusterError> {
        let distribution = self.distribution_for_instance(instance)?;
        // first maximum wins on ties
        let mut best = 0;
        for (i, p) in distribution.iter().enumerate() {
            if *p > distribution[best] {
                best = i;
            }
        }
        Ok(best)
    }

    /// Membership probabilities, one per cluster, summing to 1
    fn distribution_for_instance(&self, instance: &Instance) -> Result<Vec<f64>, ClusterError>;

    fn model(&self) -> ClusterModel;

    fn is_updateable(&self) -> bool {
        false
    }

    /// Learn from one more instance
    fn update_clusterer(&mut self, _instance: &Instance) -> Result<(), ClusterError> {
        Err(ClusterError::NotUpdateable(self.name()))
    }
}

/// Normalised inverse squared distance to each centroid
///
/// An instance that coincides with a centroid gets all of the mass (first
/// matching centroid).
pub fn inverse_distance_distribution(
    clusterer: &'static str,
    centroids: &[Vec<f64>],
    instance: &Instance,
) -> Result<Vec<f64>, ClusterError> {
    if centroids.is_empty() {
        return Err(ClusterError::NoClusters { clusterer });
    }

    let mut distances: Vec<f64> = Vec::with_capacity(centroids.len());
    for centroid in centroids {
        let d = instance
            .squared_distance(centroid)
            .ok_or(ClusterError::DimensionMismatch {
                expected: centroid.len(),
                actual: instance.len(),
            })?;
        distances.push(d);
    }

    if let Some(exact) = distances.iter().position(|d| *d == 0.0) {
        let mut one_hot = vec![0.0; centroids.len()];
        one_hot[exact] = 1.0;
        return Ok(one_hot);
    }

    // the ratios are scale invariant, so overflowing distances are recomputed
    // on values divided by the largest magnitude involved
    if distances.iter().any(|d| d.is_infinite()) {
        distances = rescaled_distances(centroids, instance);
    }

    let nearest = nearest_index(&distances);
    let d_min = distances[nearest];
    let weights: Vec<f64> = distances.iter().map(|d| d_min / d).collect();
    let total: f64 = weights.iter().sum();
    if !d_min.is_finite() || !total.is_finite() || total <= 0.0 {
        let mut one_hot = vec![0.0; centroids.len()];
        one_hot[nearest] = 1.0;
        return Ok(one_hot);
    }
    Ok(weights.into_iter().map(|w| w / total).collect())
}

fn rescaled_distances(centroids: &[Vec<f64>], instance: &Instance) -> Vec<f64> {
    let scale = centroids
        .iter()
        .flatten()
        .chain(instance.values.iter())
        .fold(0.0_f64, |max, v| max.max(v.abs()));
    centroids
        .iter()
        .map(|centroid| {
            centroid
                .iter()
                .zip(&instance.values)
                .map(|(c, x)| {
                    let diff = x / scale - c / scale;
                    diff * diff
                })
                .sum()
        })
        .collect()
}

/// Index of the smallest distance, NaN distances lose
fn nearest_index(distances: &[f64]) -> usize {
    distances
        .iter()
        .enumerate()
        .filter(|(_, d)| !d.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
            Some((_, bd)) if bd <= *d => best,
            _ => Some((i, *d)),
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Check that all centroids share one dimension
fn validate_centroids(centroids: &[Vec<f64>]) -> Result<(), ClusterError> {
    if let Some(first) = centroids.first() {
        if first.is_empty() {
            return Err(ClusterError::InvalidModel("centroids must not be empty".into()));
        }
        if let Some(bad) = centroids.iter().find(|c| c.len() != first.len()) {
            return Err(ClusterError::InvalidModel(format!(
                "centroid dimensions differ ({} vs {})",
                first.len(),
                bad.len()
            )));
        }
    }
    Ok(())
}
