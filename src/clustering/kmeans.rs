/// Incremental k-means with fixed k
use super::{inverse_distance_distribution, validate_centroids, ClusterError, ClusterModel, Clusterer};
use crate::runtime::token::Instance;

/// K-means over seeded centroids
///
/// Each seed counts as one observation, an update moves the nearest centroid
/// to the running mean of everything it absorbed.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    centroids: Vec<Vec<f64>>,
    counts: Vec<u64>,
}

impl KMeans {
    pub fn new(centroids: Vec<Vec<f64>>) -> Result<Self, ClusterError> {
        if centroids.is_empty() {
            return Err(ClusterError::InvalidModel("k-means needs at least one centroid".into()));
        }
        validate_centroids(&centroids)?;
        let counts = vec![1; centroids.len()];
        Ok(Self { centroids, counts })
    }

    pub fn centroids(&self) -> &[Vec<f64>] {
        &self.centroids
    }
}

impl Clusterer for KMeans {
    fn name(&self) -> &'static str {
        "kmeans"
    }

    fn number_of_clusters(&self) -> usize {
        self.centroids.len()
    }

    fn distribution_for_instance(&self, instance: &Instance) -> Result<Vec<f64>, ClusterError> {
        inverse_distance_distribution(self.name(), &self.centroids, instance)
    }

    fn model(&self) -> ClusterModel {
        ClusterModel {
            clusterer: self.name().to_string(),
            centroids: self.centroids.clone(),
            counts: self.counts.clone(),
        }
    }

    fn is_updateable(&self) -> bool {
        true
    }

    fn update_clusterer(&mut self, instance: &Instance) -> Result<(), ClusterError> {
        let nearest = self.cluster_instance(instance)?;
        self.counts[nearest] += 1;
        let n = self.counts[nearest] as f64;
        for (c, x) in self.centroids[nearest].iter_mut().zip(&instance.values) {
            *c += (x - *c) / n;
        }
        Ok(())
    }
}
