// Read/write access to the cluster, narrowed to the three operations the
// reconciler needs. Kept behind a trait so the tick logic can be driven
// against an in-memory cluster in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{DeleteParams, ListParams};
use kube::{Api, Client};
use thiserror::Error;
use tracing::warn;

/// A node as seen at one tick.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A pod as seen at one tick.
#[derive(Debug, Clone)]
pub struct PodRecord {
    pub name: String,
    pub namespace: String,
    /// None while the pod is unscheduled.
    pub node_name: Option<String>,
    pub phase: String,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("listing nodes: {0}")]
    ListNodes(#[source] kube::Error),
    #[error("listing pods: {0}")]
    ListPods(#[source] kube::Error),
    #[error("deleting node {name}: {source}")]
    DeleteNode {
        name: String,
        #[source]
        source: kube::Error,
    },
}

#[async_trait]
pub trait ClusterGateway {
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, Error>;

    /// Lists pods across all namespaces.
    async fn list_pods(&self) -> Result<Vec<PodRecord>, Error>;

    /// Deletes a node. A node that is already gone counts as success.
    async fn delete_node(&self, name: &str) -> Result<(), Error>;
}

pub struct KubeGateway {
    nodes: Api<Node>,
    pods: Api<Pod>,
}

impl KubeGateway {
    pub fn new(client: Client) -> Self {
        Self {
            nodes: Api::all(client.clone()),
            pods: Api::all(client),
        }
    }
}

#[async_trait]
impl ClusterGateway for KubeGateway {
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, Error> {
        let nodes = self
            .nodes
            .list(&ListParams::default())
            .await
            .map_err(Error::ListNodes)?;

        let mut records = Vec::with_capacity(nodes.items.len());
        for node in nodes {
            let Some(name) = node.metadata.name else {
                warn!("skipping node without a name");
                continue;
            };
            let Some(created) = node.metadata.creation_timestamp else {
                warn!(node = %name, "skipping node without a creation timestamp");
                continue;
            };
            records.push(NodeRecord {
                name,
                created_at: created.0,
            });
        }
        Ok(records)
    }

    async fn list_pods(&self) -> Result<Vec<PodRecord>, Error> {
        let pods = self
            .pods
            .list(&ListParams::default())
            .await
            .map_err(Error::ListPods)?;

        let mut records = Vec::with_capacity(pods.items.len());
        for pod in pods {
            let name = pod.metadata.name.unwrap_or_default();
            let namespace = pod.metadata.namespace.unwrap_or_default();
            let node_name = pod.spec.and_then(|s| s.node_name);
            let phase = pod.status.and_then(|s| s.phase).unwrap_or_default();
            records.push(PodRecord {
                name,
                namespace,
                node_name,
                phase,
            });
        }
        Ok(records)
    }

    async fn delete_node(&self, name: &str) -> Result<(), Error> {
        match self.nodes.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            // Already deleted out from under us, which is the end state we want.
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                warn!(node = %name, "node was already gone when deleting");
                Ok(())
            }
            Err(e) => Err(Error::DeleteNode {
                name: name.to_string(),
                source: e,
            }),
        }
    }
}
