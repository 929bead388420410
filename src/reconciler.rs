// The polling reconciliation loop. Each tick reads one node snapshot and one
// cluster-wide pod snapshot, classifies every node as occupied or idle, and
// deletes nodes whose unbroken idle streak has outlived the allowed idle
// time. Level-triggered: every decision is recomputed from current cluster
// state, so a missed tick only delays an eviction, it never loses one.

use crate::gateway::{ClusterGateway, Error, NodeRecord, PodRecord};
use crate::idle::IdleTracker;
use crate::Policy;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct Reconciler<G> {
    gateway: G,
    policy: Policy,
    tracker: IdleTracker,
}

/// What one tick did, for the progress log and for tests.
#[derive(Debug, Default)]
pub struct TickSummary {
    pub nodes_examined: usize,
    pub nodes_skipped_young: usize,
    pub evicted: Vec<String>,
}

impl<G: ClusterGateway> Reconciler<G> {
    pub fn new(gateway: G, policy: Policy) -> Self {
        Self {
            gateway,
            policy,
            tracker: IdleTracker::new(),
        }
    }

    /// Runs ticks separated by `poll_interval` until `shutdown` is cancelled.
    /// Cancellation is consulted only between ticks; an in-progress tick
    /// always completes. The first tick error ends the loop.
    pub async fn run(
        &mut self,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Result<(), Error> {
        while !shutdown.is_cancelled() {
            let summary = self.tick(Utc::now()).await?;
            info!(
                examined = summary.nodes_examined,
                young = summary.nodes_skipped_young,
                evicted = summary.evicted.len(),
                "tick complete"
            );

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
        info!("shutting down");
        Ok(())
    }

    /// One full reconciliation pass over the cluster.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<TickSummary, Error> {
        let nodes = self.gateway.list_nodes().await?;
        let pods = self.gateway.list_pods().await?;

        let mut summary = TickSummary {
            nodes_examined: nodes.len(),
            ..Default::default()
        };

        for node in &nodes {
            self.evaluate_node(node, &pods, now, &mut summary).await?;
        }

        // Nodes deleted outside our control would otherwise leave their
        // streaks behind forever.
        let current: HashSet<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
        self.tracker.retain_nodes(|name| current.contains(name));

        Ok(summary)
    }

    /// Applies the eviction policy to a single node. Young nodes are skipped
    /// without touching the tracker.
    async fn evaluate_node(
        &mut self,
        node: &NodeRecord,
        pods: &[PodRecord],
        now: DateTime<Utc>,
        summary: &mut TickSummary,
    ) -> Result<(), Error> {
        let age = now - node.created_at;
        if age < self.policy.min_node_age {
            debug!(node = %node.name, age_secs = age.num_seconds(), "node too young, skipping");
            summary.nodes_skipped_young += 1;
            return Ok(());
        }

        let occupants: Vec<&PodRecord> = pods
            .iter()
            .filter(|pod| self.qualifies(pod, &node.name))
            .collect();
        for pod in &occupants {
            debug!(node = %node.name, pod = %pod.name, namespace = %pod.namespace, "qualifying pod");
        }

        let idle_for = self.tracker.observe(&node.name, !occupants.is_empty(), now);

        if !occupants.is_empty() {
            info!(node = %node.name, pods = occupants.len(), "node occupied, retained");
            return Ok(());
        }

        if idle_for >= self.policy.allowed_idle_time {
            info!(
                node = %node.name,
                idle_secs = idle_for.num_seconds(),
                "allowed idle time is up, deleting node"
            );
            self.gateway.delete_node(&node.name).await?;
            self.tracker.forget(&node.name);
            summary.evicted.push(node.name.clone());
            info!(node = %node.name, "node removed");
        } else {
            info!(
                node = %node.name,
                idle_secs = idle_for.num_seconds(),
                "node idle, within grace period"
            );
        }
        Ok(())
    }

    /// A pod holds a node occupied iff it is assigned to that node, is
    /// Running, and is not in an ignored namespace.
    fn qualifies(&self, pod: &PodRecord, node_name: &str) -> bool {
        if self.policy.ignore_namespaces.contains(pod.namespace.trim()) {
            return false;
        }
        if pod.node_name.as_deref() != Some(node_name) {
            return false;
        }
        pod.phase == "Running"
    }

    #[cfg(test)]
    fn tracker(&self) -> &IdleTracker {
        &self.tracker
    }
}
