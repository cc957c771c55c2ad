// Copyright 2025 The HeronMQ Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use cheetah_string::CheetahString;
use serde::Deserialize;
use serde::Serialize;

/// Controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Cluster name, used for log correlation
    pub cluster_name: CheetahString,

    /// Pause between rounds of the ISR compare-and-swap retry loop when the
    /// previous round hit a version conflict. Zero retries immediately.
    pub isr_update_retry_backoff_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cluster_name: CheetahString::from_static_str("DefaultCluster"),
            isr_update_retry_backoff_ms: 0,
        }
    }
}

impl ControllerConfig {
    pub fn with_cluster_name(mut self, cluster_name: impl Into<CheetahString>) -> Self {
        self.cluster_name = cluster_name.into();
        self
    }

    pub fn with_isr_update_retry_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.isr_update_retry_backoff_ms = backoff_ms;
        self
    }

    /// Configuration for unit and integration tests.
    pub fn test_config() -> Self {
        Self::default().with_cluster_name("test-cluster")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_backoff() {
        let config = ControllerConfig::default();
        assert_eq!(config.isr_update_retry_backoff_ms, 0);
        assert_eq!(config.cluster_name.as_str(), "DefaultCluster");
    }

    #[test]
    fn builders_override_fields() {
        let config = ControllerConfig::default()
            .with_cluster_name("prod")
            .with_isr_update_retry_backoff_ms(50);
        assert_eq!(config.cluster_name.as_str(), "prod");
        assert_eq!(config.isr_update_retry_backoff_ms, 50);
    }
}
