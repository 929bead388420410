use chrono::Duration;
use clap::Parser;
use std::collections::HashSet;

pub mod gateway;
pub mod health;
pub mod idle;
pub mod reconciler;

/// Process configuration, settable via flags or environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "nodegc", version, about = "Deletes cluster nodes that have carried no workload for longer than the allowed idle time")]
pub struct Config {
    /// Pods running in these namespaces do not keep a node occupied.
    #[arg(
        long,
        env = "IGNORE_NAMESPACES",
        value_delimiter = ',',
        default_value = "gke-managed-cim,gmp-system,kube-system"
    )]
    pub ignore_namespaces: Vec<String>,

    /// Nodes younger than this are exempt from idle accounting.
    #[arg(long, env = "MIN_NODE_AGE_SECONDS", default_value_t = 300)]
    pub min_node_age_seconds: u64,

    /// Time to sleep between reconciliation ticks.
    #[arg(long, env = "SLEEP_SECONDS", default_value_t = 20)]
    pub sleep_seconds: u64,

    /// Continuous idle time a node must accumulate before it is deleted.
    #[arg(long, env = "ALLOWED_IDLE_SECONDS", default_value_t = 180)]
    pub allowed_idle_seconds: u64,

    /// Port the liveness endpoint listens on.
    #[arg(long, env = "HEALTHCHECK_PORT", default_value_t = 9200)]
    pub healthcheck_port: u16,
}

impl Config {
    pub fn policy(&self) -> Policy {
        Policy {
            ignore_namespaces: self
                .ignore_namespaces
                .iter()
                .map(|ns| ns.trim().to_string())
                .filter(|ns| !ns.is_empty())
                .collect(),
            min_node_age: Duration::seconds(self.min_node_age_seconds as i64),
            allowed_idle_time: Duration::seconds(self.allowed_idle_seconds as i64),
        }
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sleep_seconds)
    }
}

/// The eviction policy values, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct Policy {
    pub ignore_namespaces: HashSet<String>,
    pub min_node_age: Duration,
    pub allowed_idle_time: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::parse_from(["nodegc"]);
        assert_eq!(config.min_node_age_seconds, 300);
        assert_eq!(config.sleep_seconds, 20);
        assert_eq!(config.allowed_idle_seconds, 180);
        assert_eq!(config.healthcheck_port, 9200);
        assert_eq!(
            config.ignore_namespaces,
            vec!["gke-managed-cim", "gmp-system", "kube-system"]
        );
    }

    #[test]
    fn policy_trims_and_dedupes_namespaces() {
        let config = Config::parse_from([
            "nodegc",
            "--ignore-namespaces",
            " kube-system ,monitoring,kube-system,",
        ]);
        let policy = config.policy();
        assert_eq!(policy.ignore_namespaces.len(), 2);
        assert!(policy.ignore_namespaces.contains("kube-system"));
        assert!(policy.ignore_namespaces.contains("monitoring"));
    }

    #[test]
    fn policy_durations() {
        let config = Config::parse_from(["nodegc", "--allowed-idle-seconds", "60"]);
        let policy = config.policy();
        assert_eq!(policy.allowed_idle_time, Duration::seconds(60));
        assert_eq!(policy.min_node_age, Duration::seconds(300));
        assert_eq!(config.poll_interval(), std::time::Duration::from_secs(20));
    }
}
