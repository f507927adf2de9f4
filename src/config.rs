//! Runtime configuration shared by the node and client launchers.
//!
//! Every value has a default that works for a local cluster; each can be
//! overridden through a `SHARD_ROUTER_*` environment variable.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Size of the fixed partition space `[0, partitions_count)`.
    pub partitions_count: u32,
    /// Virtual split points each node contributes to the hash ring.
    pub split_points_per_node: usize,
    /// Logical client id space used by the client container and the test
    /// payload producer.
    pub clients_count: u32,
    /// Interval between automatic client spawns in the client container.
    pub spawn_delay: Duration,
    /// Interval between automatic client decommissions.
    pub decommission_delay: Duration,
    /// Interval between generated relay payloads on a node.
    pub produce_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            partitions_count: 256,
            split_points_per_node: 16,
            clients_count: 100,
            spawn_delay: Duration::from_millis(3_000),
            decommission_delay: Duration::from_millis(10_000),
            produce_delay: Duration::from_millis(2_000),
        }
    }
}

impl Config {
    /// Loads the default configuration with any environment overrides applied.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            partitions_count: env_u64("SHARD_ROUTER_PARTITIONS")
                .map(|v| v as u32)
                .unwrap_or(defaults.partitions_count),
            split_points_per_node: env_u64("SHARD_ROUTER_SPLIT_POINTS")
                .map(|v| v as usize)
                .unwrap_or(defaults.split_points_per_node),
            clients_count: env_u64("SHARD_ROUTER_CLIENTS")
                .map(|v| v as u32)
                .unwrap_or(defaults.clients_count),
            spawn_delay: env_u64("SHARD_ROUTER_SPAWN_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.spawn_delay),
            decommission_delay: env_u64("SHARD_ROUTER_DECOMMISSION_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.decommission_delay),
            produce_delay: env_u64("SHARD_ROUTER_PRODUCE_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.produce_delay),
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring non-numeric {} value {:?}", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = Config::default();
        assert!(config.partitions_count > 0);
        assert!(config.split_points_per_node > 0);
        assert!(config.split_points_per_node < config.partitions_count as usize);
        assert!(config.clients_count > 0);
    }
}
