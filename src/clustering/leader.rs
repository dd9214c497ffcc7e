/// Leader clustering
use super::{inverse_distance_distribution, validate_centroids, ClusterError, ClusterModel, Clusterer};
use crate::runtime::token::Instance;

/// Single-pass leader algorithm
///
/// The first instance of a cluster becomes its leader. An update joins the
/// nearest leader within `threshold` (euclidean distance) or opens a new
/// cluster. Leaders never move.
#[derive(Debug, Clone, PartialEq)]
pub struct Leader {
    threshold: f64,
    leaders: Vec<Vec<f64>>,
    counts: Vec<u64>,
}

impl Leader {
    pub fn new(threshold: f64, leaders: Vec<Vec<f64>>) -> Result<Self, ClusterError> {
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(ClusterError::InvalidModel(format!(
                "threshold must be positive, got {}",
                threshold
            )));
        }
        validate_centroids(&leaders)?;
        let counts = vec![1; leaders.len()];
        Ok(Self {
            threshold,
            leaders,
            counts,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Clusterer for Leader {
    fn name(&self) -> &'static str {
        "leader"
    }

    fn number_of_clusters(&self) -> usize {
        self.leaders.len()
    }

    fn distribution_for_instance(&self, instance: &Instance) -> Result<Vec<f64>, ClusterError> {
        inverse_distance_distribution(self.name(), &self.leaders, instance)
    }

    fn model(&self) -> ClusterModel {
        ClusterModel {
            clusterer: self.name().to_string(),
            centroids: self.leaders.clone(),
            counts: self.counts.clone(),
        }
    }

    fn is_updateable(&self) -> bool {
        true
    }

    fn update_clusterer(&mut self, instance: &Instance) -> Result<(), ClusterError> {
        if let Some(first) = self.leaders.first() {
            if first.len() != instance.len() {
                return Err(ClusterError::DimensionMismatch {
                    expected: first.len(),
                    actual: instance.len(),
                });
            }
        }

        let nearest = self
            .leaders
            .iter()
            .enumerate()
            .filter_map(|(i, l)| instance.squared_distance(l).map(|d| (i, d.sqrt())))
            .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                Some((_, bd)) if bd <= d => best,
                _ => Some((i, d)),
            });

        match nearest {
            Some((i, d)) if d <= self.threshold => self.counts[i] += 1,
            _ => {
                tracing::debug!("🆕 Leader opens cluster {}", self.leaders.len());
                self.leaders.push(instance.values.clone());
                self.counts.push(1);
            }
        }
        Ok(())
    }
}
