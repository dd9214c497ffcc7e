/// Actors producing and extending clustering containers
use crate::clustering::{
    postprocess::{ClusteringPostProcessor, PostProcessorConfig},
    ClusterError, Clusterer, KMeans, Leader, CLUSTER, DISTRIBUTION, INSTANCE, MODEL,
};
use crate::runtime::{
    actor::{Actor, ActorCore},
    container::{Container, ContainerError, ContainerKind},
    context::FlowContext,
    error::{ActorError, ActorResult},
    token::{DataType, Instance, Payload, Token},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which clusterer to build and its seed model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum ClustererParams {
    Kmeans {
        centroids: Vec<Vec<f64>>,
    },
    Leader {
        threshold: f64,
        #[serde(default)]
        leaders: Vec<Vec<f64>>,
    },
}

impl ClustererParams {
    pub fn build(&self) -> Result<Box<dyn Clusterer>, ClusterError> {
        Ok(match self {
            ClustererParams::Kmeans { centroids } => Box::new(KMeans::new(centroids.clone())?),
            ClustererParams::Leader { threshold, leaders } => {
                Box::new(Leader::new(*threshold, leaders.clone())?)
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDataParams {
    pub clusterer: ClustererParams,
    /// Learn from every instance after predicting it
    #[serde(default)]
    pub update_model: bool,
}

/// Clusters incoming instances and emits a clustering container per instance
///
/// The container holds the model snapshot used for the prediction, the
/// instance, the cluster index and the distribution. With `update_model` the
/// clusterer learns from the instance only after the container is complete.
#[derive(Debug)]
pub struct ClusterData {
    core: ActorCore,
    params: ClusterDataParams,
    clusterer: Option<Box<dyn Clusterer>>,
    input: Option<Instance>,
    output: Option<Token>,
}

impl ClusterData {
    pub fn new(name: impl Into<String>, params: ClusterDataParams) -> Self {
        Self {
            core: ActorCore::new(name),
            params,
            clusterer: None,
            input: None,
            output: None,
        }
    }

    /// Current model, `None` before set-up
    pub fn clusterer(&self) -> Option<&dyn Clusterer> {
        self.clusterer.as_deref()
    }
}

#[async_trait]
impl Actor for ClusterData {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "cluster_data"
    }

    fn accepts(&self) -> Vec<DataType> {
        vec![DataType::Instance]
    }

    fn generates(&self) -> Vec<DataType> {
        vec![DataType::Container(ContainerKind::Clustering)]
    }

    async fn configure(&mut self, _ctx: &FlowContext) -> ActorResult<()> {
        let clusterer = self
            .params
            .clusterer
            .build()
            .map_err(|e| ActorError::configuration(self.core.full_name(), e.to_string()))?;
        if self.params.update_model && !clusterer.is_updateable() {
            return Err(ActorError::configuration(
                self.core.full_name(),
                format!("{} cannot be updated incrementally", clusterer.name()),
            ));
        }
        tracing::debug!(
            "🧮 '{}' uses {} with {} cluster(s)",
            self.core.full_name(),
            clusterer.name(),
            clusterer.number_of_clusters()
        );
        self.clusterer = Some(clusterer);
        Ok(())
    }

    fn accept_input(&mut self, token: Token) -> ActorResult<()> {
        match token.into_payload() {
            Payload::Instance(instance) => {
                self.input = Some(instance);
                Ok(())
            }
            other => Err(ActorError::execution(
                self.core.full_name(),
                format!("expected an instance, got {}", other.data_type()),
            )),
        }
    }

    async fn do_execute(&mut self, _ctx: &FlowContext) -> ActorResult<()> {
        let actor = self.core.full_name().to_string();
        let instance = self
            .input
            .take()
            .ok_or_else(|| ActorError::execution(&actor, "no instance to cluster"))?;
        let clusterer = self
            .clusterer
            .as_mut()
            .ok_or_else(|| ActorError::execution(&actor, "clusterer not built"))?;
        let failed = |e: ClusterError| ActorError::execution(&actor, e.to_string());

        // predict
        let model = clusterer.model();
        let distribution = clusterer.distribution_for_instance(&instance).map_err(failed)?;
        let cluster = clusterer.cluster_instance(&instance).map_err(failed)?;

        let contract = |e: ContainerError| ActorError::container(&actor, e);
        let mut container = Container::new(ContainerKind::Clustering);
        container.insert(MODEL, model).map_err(contract)?;
        container.insert(INSTANCE, instance.clone()).map_err(contract)?;
        container.insert(CLUSTER, cluster as i64).map_err(contract)?;
        container.insert(DISTRIBUTION, distribution).map_err(contract)?;
        self.output = Some(Token::new(Payload::Container(container)));

        // then learn
        if self.params.update_model {
            clusterer.update_clusterer(&instance).map_err(failed)?;
        }
        Ok(())
    }

    fn has_pending_output(&self) -> bool {
        self.output.is_some()
    }

    fn output(&mut self) -> Option<Token> {
        self.output.take()
    }

    fn on_wrap_up(&mut self) {
        self.input = None;
        self.output = None;
    }

    fn on_clean_up(&mut self) {
        self.clusterer = None;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostProcessClusteringParams {
    pub post_processor: PostProcessorConfig,
}

/// Applies a post-processor to clustering containers
#[derive(Debug)]
pub struct PostProcessClustering {
    core: ActorCore,
    params: PostProcessClusteringParams,
    processor: Option<Box<dyn ClusteringPostProcessor>>,
    input: Option<Container>,
    output: Option<Token>,
}

impl PostProcessClustering {
    pub fn new(name: impl Into<String>, params: PostProcessClusteringParams) -> Self {
        Self {
            core: ActorCore::new(name),
            params,
            processor: None,
            input: None,
            output: None,
        }
    }
}

#[async_trait]
impl Actor for PostProcessClustering {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "post_process_clustering"
    }

    fn accepts(&self) -> Vec<DataType> {
        vec![DataType::Container(ContainerKind::Clustering)]
    }

    fn generates(&self) -> Vec<DataType> {
        vec![DataType::Container(ContainerKind::Clustering)]
    }

    async fn configure(&mut self, _ctx: &FlowContext) -> ActorResult<()> {
        self.processor = Some(self.params.post_processor.build());
        Ok(())
    }

    fn accept_input(&mut self, token: Token) -> ActorResult<()> {
        match token.into_payload() {
            Payload::Container(container) => {
                self.input = Some(container);
                Ok(())
            }
            other => Err(ActorError::execution(
                self.core.full_name(),
                format!("expected a container, got {}", other.data_type()),
            )),
        }
    }

    async fn do_execute(&mut self, _ctx: &FlowContext) -> ActorResult<()> {
        let actor = self.core.full_name();
        let mut container = self
            .input
            .take()
            .ok_or_else(|| ActorError::execution(actor, "no container to process"))?;
        let processor = self
            .processor
            .as_ref()
            .ok_or_else(|| ActorError::execution(actor, "post-processor not built"))?;

        processor
            .post_process(&mut container)
            .map_err(|e| ActorError::container(actor, e))?;
        tracing::trace!("'{}' applied {}", actor, processor.name());
        self.output = Some(Token::new(Payload::Container(container)));
        Ok(())
    }

    fn has_pending_output(&self) -> bool {
        self.output.is_some()
    }

    fn output(&mut self) -> Option<Token> {
        self.output.take()
    }

    fn on_wrap_up(&mut self) {
        self.input = None;
        self.output = None;
    }

    fn on_clean_up(&mut self) {
        self.processor = None;
    }
}
