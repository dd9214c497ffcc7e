/// Post-processors for clustering containers
///
/// A post-processor declares which keys it reads, which keys it adds and
/// which existing keys it rewrites. `post_process` enforces that contract:
/// all values are computed against the unchanged container first and only
/// written once every check has passed, so a failure never leaves a
/// half-processed container behind.

use crate::clustering::{CLUSTER, DISTRIBUTION, INSTANCE, MODEL};
use crate::runtime::container::{Container, ContainerError, ContainerValue, Key};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub const ENTROPY: Key<f64> = Key::new("Entropy");
pub const MARGIN: Key<f64> = Key::new("Margin");
pub const DISTANCE: Key<f64> = Key::new("Distance");

/// Values computed by a post-processor, in insertion order
pub type Computed = Vec<(String, ContainerValue)>;

pub trait ClusteringPostProcessor: Send + Sync + Debug {
    fn name(&self) -> String;

    /// Keys that must be present before processing
    fn required_keys(&self) -> Vec<&'static str>;

    /// Keys that are added; none of them may exist yet
    fn added_keys(&self) -> Vec<&'static str>;

    /// Existing keys that are overwritten
    fn modified_keys(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Compute the new values without touching the container
    fn compute(&self, container: &Container) -> Result<Computed, ContainerError>;

    fn post_process(&self, container: &mut Container) -> Result<(), ContainerError> {
        container.require(&self.required_keys())?;
        let computed = self.compute(container)?;

        let added = self.added_keys();
        let modified = self.modified_keys();
        for (key, _) in &computed {
            if added.contains(&key.as_str()) {
                if container.has(key) {
                    return Err(ContainerError::DuplicateKey { key: key.clone() });
                }
            } else if !modified.contains(&key.as_str()) {
                return Err(ContainerError::UndeclaredKey {
                    key: key.clone(),
                    processor: self.name(),
                });
            }
        }

        for (key, value) in computed {
            if added.contains(&key.as_str()) {
                container.insert_value(&key, value)?;
            } else {
                container.replace_value(&key, value);
            }
        }
        Ok(())
    }
}

fn distribution(container: &Container) -> Result<&Vec<f64>, ContainerError> {
    let dist = container.get(DISTRIBUTION)?;
    if dist.is_empty() {
        return Err(ContainerError::Computation {
            key: DISTRIBUTION.name().to_string(),
            message: "distribution is empty".into(),
        });
    }
    Ok(dist)
}

/// Entropy (in bits) of the cluster membership distribution
#[derive(Debug, Clone, Default)]
pub struct DistributionEntropy;

impl ClusteringPostProcessor for DistributionEntropy {
    fn name(&self) -> String {
        "entropy".into()
    }

    fn required_keys(&self) -> Vec<&'static str> {
        vec![DISTRIBUTION.name()]
    }

    fn added_keys(&self) -> Vec<&'static str> {
        vec![ENTROPY.name()]
    }

    fn compute(&self, container: &Container) -> Result<Computed, ContainerError> {
        let entropy: f64 = distribution(container)?
            .iter()
            .filter(|p| **p > 0.0)
            .map(|p| -p * p.log2())
            .sum();
        Ok(vec![(ENTROPY.name().to_string(), ContainerValue::Double(entropy))])
    }
}

/// Difference between the two highest membership probabilities
#[derive(Debug, Clone, Default)]
pub struct DistributionMargin;

impl ClusteringPostProcessor for DistributionMargin {
    fn name(&self) -> String {
        "margin".into()
    }

    fn required_keys(&self) -> Vec<&'static str> {
        vec![DISTRIBUTION.name()]
    }

    fn added_keys(&self) -> Vec<&'static str> {
        vec![MARGIN.name()]
    }

    fn compute(&self, container: &Container) -> Result<Computed, ContainerError> {
        let mut sorted = distribution(container)?.clone();
        sorted.sort_by(|a, b| b.total_cmp(a));
        let margin = sorted[0] - sorted.get(1).copied().unwrap_or(0.0);
        Ok(vec![(MARGIN.name().to_string(), ContainerValue::Double(margin))])
    }
}

/// Euclidean distance between the instance and its cluster's centroid
#[derive(Debug, Clone, Default)]
pub struct CentroidDistance;

impl ClusteringPostProcessor for CentroidDistance {
    fn name(&self) -> String {
        "distance".into()
    }

    fn required_keys(&self) -> Vec<&'static str> {
        vec![MODEL.name(), INSTANCE.name(), CLUSTER.name()]
    }

    fn added_keys(&self) -> Vec<&'static str> {
        vec![DISTANCE.name()]
    }

    fn compute(&self, container: &Container) -> Result<Computed, ContainerError> {
        let model = container.get(MODEL)?;
        let instance = container.get(INSTANCE)?;
        let cluster = *container.get(CLUSTER)?;

        let failed = |message: String| ContainerError::Computation {
            key: DISTANCE.name().to_string(),
            message,
        };
        let centroid = usize::try_from(cluster)
            .ok()
            .and_then(|i| model.centroids.get(i))
            .ok_or_else(|| failed(format!("cluster {} not in model", cluster)))?;
        let squared = instance
            .squared_distance(centroid)
            .ok_or_else(|| failed("instance and centroid differ in dimension".into()))?;

        Ok(vec![(DISTANCE.name().to_string(), ContainerValue::Double(squared.sqrt()))])
    }
}

/// Applies several post-processors in order
///
/// The contract is the union of the members' contracts, minus required keys
/// that an earlier member adds itself.
#[derive(Debug, Default)]
pub struct MultiPostProcessor {
    processors: Vec<Box<dyn ClusteringPostProcessor>>,
}

impl MultiPostProcessor {
    pub fn new(processors: Vec<Box<dyn ClusteringPostProcessor>>) -> Self {
        Self { processors }
    }
}

impl ClusteringPostProcessor for MultiPostProcessor {
    fn name(&self) -> String {
        let names: Vec<String> = self.processors.iter().map(|p| p.name()).collect();
        format!("multi[{}]", names.join(","))
    }

    fn required_keys(&self) -> Vec<&'static str> {
        let mut provided: Vec<&'static str> = Vec::new();
        let mut required: Vec<&'static str> = Vec::new();
        for p in &self.processors {
            for key in p.required_keys() {
                if !provided.contains(&key) && !required.contains(&key) {
                    required.push(key);
                }
            }
            provided.extend(p.added_keys());
        }
        required
    }

    fn added_keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        for key in self.processors.iter().flat_map(|p| p.added_keys()) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    fn modified_keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        for key in self.processors.iter().flat_map(|p| p.modified_keys()) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    fn compute(&self, container: &Container) -> Result<Computed, ContainerError> {
        let mut scratch = container.clone();
        for p in &self.processors {
            p.post_process(&mut scratch)?;
        }

        let mut computed = Vec::new();
        for key in self.added_keys().into_iter().chain(self.modified_keys()) {
            if let Ok(value) = scratch.value(key) {
                computed.push((key.to_string(), value.clone()));
            }
        }
        Ok(computed)
    }
}

/// Serialized form of a post-processor in flow definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostProcessorConfig {
    Entropy,
    Margin,
    Distance,
    Multi { processors: Vec<PostProcessorConfig> },
}

impl PostProcessorConfig {
    pub fn build(&self) -> Box<dyn ClusteringPostProcessor> {
        match self {
            PostProcessorConfig::Entropy => Box::new(DistributionEntropy),
            PostProcessorConfig::Margin => Box::new(DistributionMargin),
            PostProcessorConfig::Distance => Box::new(CentroidDistance),
            PostProcessorConfig::Multi { processors } => Box::new(MultiPostProcessor::new(
                processors.iter().map(PostProcessorConfig::build).collect(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::ClusterModel;
    use crate::runtime::container::ContainerKind;
    use crate::runtime::token::Instance;

    fn clustered() -> Container {
        let mut c = Container::new(ContainerKind::Clustering);
        c.insert(
            MODEL,
            ClusterModel {
                clusterer: "kmeans".into(),
                centroids: vec![vec![0.0, 0.0], vec![3.0, 4.0]],
                counts: vec![1, 1],
            },
        )
        .unwrap();
        c.insert(INSTANCE, Instance::new(vec![0.0, 0.0])).unwrap();
        c.insert(CLUSTER, 1).unwrap();
        c.insert(DISTRIBUTION, vec![0.25, 0.75]).unwrap();
        c
    }

    #[test]
    fn entropy_and_margin() {
        let mut c = clustered();
        DistributionEntropy.post_process(&mut c).unwrap();
        DistributionMargin.post_process(&mut c).unwrap();

        let entropy = *c.get(ENTROPY).unwrap();
        let expected = -(0.25f64 * 0.25f64.log2() + 0.75 * 0.75f64.log2());
        assert!((entropy - expected).abs() < 1e-12);
        assert_eq!(*c.get(MARGIN).unwrap(), 0.5);
    }

    #[test]
    fn distance_uses_assigned_centroid() {
        let mut c = clustered();
        CentroidDistance.post_process(&mut c).unwrap();
        assert_eq!(*c.get(DISTANCE).unwrap(), 5.0);
    }

    #[test]
    fn missing_required_key_leaves_container_untouched() {
        let mut c = Container::new(ContainerKind::Clustering);
        c.insert(DISTRIBUTION, vec![1.0]).unwrap();
        let before = c.clone();

        let err = CentroidDistance.post_process(&mut c).unwrap_err();

        assert!(matches!(err, ContainerError::MissingKey { ref key, .. } if key == "Model"));
        assert_eq!(c, before);
    }

    #[test]
    fn adding_existing_key_is_refused() {
        let mut c = clustered();
        DistributionEntropy.post_process(&mut c).unwrap();
        let before = c.clone();
        assert_eq!(
            DistributionEntropy.post_process(&mut c).unwrap_err(),
            ContainerError::DuplicateKey { key: "Entropy".into() }
        );
        assert_eq!(c, before);
    }

    #[test]
    fn failing_member_rolls_back_whole_chain() {
        let mut c = clustered();
        c.replace_value("Cluster", ContainerValue::Integer(9));
        let before = c.clone();
        let multi = MultiPostProcessor::new(vec![Box::new(DistributionEntropy), Box::new(CentroidDistance)]);

        assert!(multi.post_process(&mut c).is_err());
        assert_eq!(c, before);
        assert!(!c.has("Entropy"));
    }

    #[test]
    fn multi_contract_is_union() {
        let multi = PostProcessorConfig::Multi {
            processors: vec![PostProcessorConfig::Entropy, PostProcessorConfig::Distance],
        }
        .build();
        assert_eq!(multi.required_keys(), vec!["Distribution", "Model", "Instance", "Cluster"]);
        assert_eq!(multi.added_keys(), vec!["Entropy", "Distance"]);

        let mut c = clustered();
        multi.post_process(&mut c).unwrap();
        assert!(c.has("Entropy") && c.has("Distance"));
    }

    #[derive(Debug)]
    struct Sneaky;

    impl ClusteringPostProcessor for Sneaky {
        fn name(&self) -> String {
            "sneaky".into()
        }
        fn required_keys(&self) -> Vec<&'static str> {
            Vec::new()
        }
        fn added_keys(&self) -> Vec<&'static str> {
            Vec::new()
        }
        fn compute(&self, _container: &Container) -> Result<Computed, ContainerError> {
            Ok(vec![("Cluster".into(), ContainerValue::Integer(0))])
        }
    }

    #[test]
    fn undeclared_write_is_rejected() {
        let mut c = clustered();
        let err = Sneaky.post_process(&mut c).unwrap_err();
        assert!(matches!(err, ContainerError::UndeclaredKey { .. }));
        assert_eq!(*c.get(CLUSTER).unwrap(), 1);
    }
}
