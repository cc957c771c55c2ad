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

//! In-memory coordination-store backend.
//!
//! Single-process stand-in with real compare-and-swap semantics: version
//! compare, controller-epoch fencing, and no-node failures behave exactly
//! as a remote store's would. Used for embedded deployments and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use heronmq_common::LeaderAndIsr;
use heronmq_common::TopicPartition;

use crate::error::ControllerError;
use crate::error::Result;
use crate::store::decode_partition_state;
use crate::store::encode_partition_state;
use crate::store::CoordinationStore;
use crate::store::StateNodeResponse;
use crate::store::StateNodeResponseKind;
use crate::store::UpdateLeaderAndIsrResult;

#[derive(Debug, Clone)]
struct StoredNode {
    data: Bytes,
    version: i32,
}

/// `DashMap`-backed node table keyed by partition.
#[derive(Debug, Default)]
pub struct InMemoryCoordinationStore {
    nodes: DashMap<TopicPartition, StoredNode>,
}

impl InMemoryCoordinationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite a partition-state node, resetting its version.
    ///
    /// This is the bootstrap path (partition creation is driven by the
    /// partition state machine, not modeled here) and the test seam.
    pub fn seed_partition_state(
        &self,
        partition: TopicPartition,
        leader_and_isr: &LeaderAndIsr,
        controller_epoch: i32,
    ) -> Result<()> {
        let data = encode_partition_state(leader_and_isr, controller_epoch)?;
        self.nodes.insert(
            partition,
            StoredNode {
                data,
                version: leader_and_isr.partition_epoch,
            },
        );
        Ok(())
    }

    /// Authoritative state currently held for a partition, if any.
    pub fn partition_state(
        &self,
        partition: &TopicPartition,
    ) -> Option<heronmq_common::LeaderIsrAndControllerEpoch> {
        let node = self.nodes.get(partition)?;
        decode_partition_state(&node.data, node.version).ok().flatten()
    }

    pub fn delete_partition_state(&self, partition: &TopicPartition) {
        self.nodes.remove(partition);
    }
}

#[async_trait]
impl CoordinationStore for InMemoryCoordinationStore {
    async fn get_partition_states(
        &self,
        partitions: &[TopicPartition],
    ) -> Result<Vec<StateNodeResponse>> {
        Ok(partitions
            .iter()
            .map(|partition| {
                let kind = match self.nodes.get(partition) {
                    Some(node) => StateNodeResponseKind::Found {
                        data: node.data.clone(),
                        version: node.version,
                    },
                    None => StateNodeResponseKind::Missing,
                };
                StateNodeResponse {
                    partition: partition.clone(),
                    kind,
                }
            })
            .collect())
    }

    async fn update_leader_and_isr(
        &self,
        proposals: HashMap<TopicPartition, LeaderAndIsr>,
        controller_epoch: i32,
    ) -> Result<UpdateLeaderAndIsrResult> {
        let mut result = UpdateLeaderAndIsrResult::default();

        for (partition, proposal) in proposals {
            let Some(mut node) = self.nodes.get_mut(&partition) else {
                result
                    .failed
                    .insert(partition.clone(), ControllerError::StateNodeMissing(partition));
                continue;
            };

            let stored_epoch = decode_partition_state(&node.data, node.version)?
                .map(|state| state.controller_epoch)
                .unwrap_or(controller_epoch);
            if stored_epoch > controller_epoch {
                result.failed.insert(
                    partition,
                    ControllerError::ControllerMoved {
                        current_epoch: controller_epoch,
                        store_epoch: stored_epoch,
                    },
                );
                continue;
            }

            if node.version != proposal.partition_epoch {
                result.to_retry.push(partition);
                continue;
            }

            let new_version = node.version + 1;
            node.data = encode_partition_state(&proposal, controller_epoch)?;
            node.version = new_version;
            result
                .finished
                .insert(partition, proposal.with_partition_epoch(new_version));
        }

        Ok(result)
    }
}
